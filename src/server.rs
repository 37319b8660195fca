//! HTTP front end for [`AnswerService`].

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State, multipart::MultipartRejection},
    routing::post,
};
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::{
    answer::{AnswerService, error::AnswerError, submission::Submission},
    prelude::*,
};

/// Path of our only endpoint.
pub const ANSWER_PATH: &str = "/api/ai-ocr";

/// Shared state for request handlers. Nothing in here is mutable.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AnswerService>,
}

/// Successful response body.
#[derive(Debug, Deserialize, Serialize)]
pub struct AnswerResponse {
    pub answer: String,
}

/// Build our router.
///
/// `max_upload_bytes` limits the size of the whole multipart body, which
/// includes the file.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route(ANSWER_PATH, post(answer_question))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

/// Answer a question about an uploaded file.
///
/// Expects a multipart body with a `file` part and a `prompt` part. Only one
/// file is processed per request.
async fn answer_question(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AnswerResponse>, AnswerError> {
    let multipart = multipart.map_err(AnswerError::from_multipart_rejection)?;
    let submission = Submission::from_multipart(multipart).await?;
    let answer = state.service.answer(submission).await?;
    Ok(Json(AnswerResponse { answer }))
}

/// Serve `router` until we receive Ctrl+C or SIGTERM.
pub async fn serve(listener: TcpListener, router: Router) -> Result<()> {
    let addr = listener.local_addr().context("cannot get listen address")?;
    info!("Listening on http://{}{}", addr, ANSWER_PATH);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server failed")
}

/// Wait for a shutdown signal (SIGTERM or Ctrl+C).
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("cannot listen for Ctrl+C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!("cannot listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
