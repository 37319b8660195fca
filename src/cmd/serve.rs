//! The `serve` subcommand.

use std::sync::Arc;

use clap::Args;
use tokio::net::TcpListener;

use crate::{
    answer::AnswerService,
    completion::{LlmOpts, OpenAiCompletionClient},
    ocr::MediaTypeOcrEngine,
    prelude::*,
    server::{self, AppState},
};

/// Options for the `serve` subcommand.
#[derive(Args, Clone, Debug)]
pub struct ServeOpts {
    /// Address to listen on.
    #[clap(long, env = "OCR_ANSWER_LISTEN", default_value = "127.0.0.1:3001")]
    pub listen: String,

    /// OCR language hint, in tesseract format (`eng`, `eng+deu`, ...).
    #[clap(long, env = "OCR_ANSWER_LANGUAGE", default_value = "eng")]
    pub ocr_language: String,

    /// Directory for temporary copies of uploads. Defaults to the system
    /// temporary directory.
    #[clap(long, env = "OCR_ANSWER_UPLOAD_DIR")]
    pub upload_dir: Option<PathBuf>,

    /// Largest accepted request body, in bytes.
    #[clap(long, default_value = "20971520")]
    pub max_upload_bytes: usize,

    #[clap(flatten)]
    pub llm_opts: LlmOpts,
}

/// Run the `serve` subcommand.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_serve(opts: &ServeOpts) -> Result<()> {
    let completions = OpenAiCompletionClient::new(&opts.llm_opts)?;
    info!(
        model = %opts.llm_opts.model,
        api_base = %opts.llm_opts.api_base,
        "Using completion service"
    );

    if let Some(dir) = &opts.upload_dir {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("cannot create upload directory {}", dir.display()))?;
    }

    let service = AnswerService::new(
        Arc::new(MediaTypeOcrEngine::new(&opts.ocr_language)),
        Arc::new(completions),
        opts.llm_opts.model.clone(),
        opts.llm_opts.max_tokens,
        opts.upload_dir.clone(),
    );
    let state = AppState {
        service: Arc::new(service),
    };
    let router = server::router(state, opts.max_upload_bytes);

    let listener = TcpListener::bind(&opts.listen)
        .await
        .with_context(|| format!("cannot listen on {}", opts.listen))?;
    server::serve(listener, router).await
}
