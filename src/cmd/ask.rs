//! The `ask` subcommand.

use chrono::Local;
use clap::Args;

use crate::{
    form::{
        FormState, SelectedFile, client::AnswerClient, grid::FileGrid,
        preview::PreviewRegistry,
    },
    prelude::*,
    ui::{ProgressConfig, Ui},
};

/// Options for the `ask` subcommand.
#[derive(Args, Clone, Debug)]
pub struct AskOpts {
    /// URL of a running `serve` instance.
    #[clap(long, env = "OCR_ANSWER_SERVER", default_value = "http://localhost:3001")]
    pub server: String,

    /// The question to ask about the file.
    #[clap(short, long, default_value = "")]
    pub prompt: String,

    /// Images or PDFs. Only the first one is sent to the server.
    pub files: Vec<PathBuf>,
}

/// Run the `ask` subcommand.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_ask(ui: Ui, opts: &AskOpts) -> Result<()> {
    let registry = PreviewRegistry::default();

    let mut files = Vec::with_capacity(opts.files.len());
    for path in &opts.files {
        files.push(SelectedFile::from_path(path).await?);
    }

    let mut state = FormState::default();
    if !files.is_empty() {
        state = state.select_files(&registry, files, Local::now());
    }
    if state.files().len() > 1 {
        warn!(
            "Only the first file is sent; ignoring {} other file(s)",
            state.files().len() - 1
        );
    }
    if state.prompt_enabled() {
        state = state.with_prompt(opts.prompt.as_str());
    }
    eprintln!("{}", FileGrid::from_state(&state));

    let (state, request) = state.submit();
    let Some(request) = request else {
        return Err(anyhow!(
            "{}",
            state.error().unwrap_or("cannot submit this form")
        ));
    };

    let client = AnswerClient::new(&opts.server);
    let spinner = ui.new_spinner(&ProgressConfig {
        emoji: "🔎",
        msg: "Asking the AI",
        done_msg: "Asked the AI",
    });
    debug!(pending = state.is_pending(), "Submitting");
    let outcome = client.submit(&request).await;
    spinner.finish_and_clear();

    let state = state.complete(outcome);
    debug!(
        can_submit = state.can_submit(),
        live_previews = registry.live_count(),
        "Submission finished"
    );
    match (state.answer(), state.error()) {
        (Some(answer), _) => {
            println!("{answer}");
            Ok(())
        }
        (None, Some(error)) => Err(anyhow!("{error}")),
        (None, None) => Err(anyhow!("no answer or error received")),
    }
}
