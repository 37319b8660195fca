use std::str::FromStr;

use clap::{Parser, Subcommand};
use tracing_subscriber::{
    EnvFilter, Layer as _, filter::Directive, fmt::format::FmtSpan, layer::SubscriberExt,
    util::SubscriberInitExt as _,
};

use self::{prelude::*, ui::Ui};

mod answer;
mod async_utils;
mod cmd;
mod completion;
mod form;
mod ocr;
mod prelude;
mod server;
mod ui;

/// Ask questions about images and documents.
#[derive(Debug, Parser)]
#[clap(
    version,
    author,
    after_help = r#"
Environment Variables:
  - OPENAI_API_BASE (optional): Override the completion server URL.
  - OPENAI_API_KEY: The API key for the completion server.
  - RUST_LOG (optional): Logging filter, such as `debug`.

  These variables may be set in a standard `.env` file.

External Tools:
  `serve` needs `tesseract` for images and `pdftotext` for PDFs.
"#
)]
struct Opts {
    #[clap(subcommand)]
    subcmd: Cmd,
}

/// The subcommands we support.
#[derive(Debug, Subcommand)]
enum Cmd {
    /// Run the answer server, with `POST /api/ai-ocr`.
    Serve(cmd::serve::ServeOpts),
    /// Send a file and a question to a running server, and print the answer.
    Ask(cmd::ask::AskOpts),
}

/// Our entry point, which can return an error. [`anyhow::Result`] will
/// automatically print a nice error message with optional backtrace.
#[tokio::main]
async fn main() -> Result<()> {
    let ui = Ui::init();

    // Initialize tracing.
    let directive =
        Directive::from_str("info").expect("built-in directive should be valid");
    let env_filter = EnvFilter::builder()
        .with_default_directive(directive)
        .from_env_lossy();

    let subscriber = tracing_subscriber::fmt::layer()
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(ui.get_stderr_writer())
        .with_filter(env_filter);

    tracing_subscriber::registry().with(subscriber).init();

    // Call our real `main` function now that logging is set up.
    real_main(ui).await
}

/// Our real entry point.
#[instrument(level = "debug", name = "main", skip_all)]
async fn real_main(ui: Ui) -> Result<()> {
    // Load environment variables from a `.env` file, if it exists.
    dotenvy::dotenv().ok();

    let opts = Opts::parse();
    // Don't log `opts` itself; it may contain an API key.
    debug!("Parsed options");

    match &opts.subcmd {
        Cmd::Serve(serve_opts) => cmd::serve::cmd_serve(serve_opts).await,
        Cmd::Ask(ask_opts) => cmd::ask::cmd_ask(ui, ask_opts).await,
    }
}
