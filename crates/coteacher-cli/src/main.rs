use anyhow::{Context, Result};
use clap::Parser;
use coteacher_core::{ResponseStyle, Settings, Subject};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

mod app;
mod commands;
mod theme;

#[derive(Parser)]
#[command(name = "coteacher")]
#[command(about = "CoTeacher - a teaching assistant backed by a local Ollama model")]
#[command(version)]
struct Cli {
    /// Run a single prompt and exit
    #[arg(short, long)]
    prompt: Option<String>,

    /// Ollama model to use
    #[arg(short, long)]
    model: Option<String>,

    /// Subject focus (e.g. mathematics, social-studies)
    #[arg(short, long)]
    subject: Option<Subject>,

    /// Response style (concise, balanced, detailed)
    #[arg(long)]
    style: Option<ResponseStyle>,

    /// Ollama server URL
    #[arg(long)]
    base_url: Option<String>,

    /// Settings file to use instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,

    /// Color theme (classroom, chalkboard, basic)
    #[arg(long, default_value = "classroom")]
    theme: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.prompt.is_none());

    let mut settings = match cli.config {
        Some(ref path) => Settings::load_from(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => Settings::load(),
    };

    if let Some(ref model) = cli.model {
        settings.llm.model = model.clone();
    }
    if let Some(subject) = cli.subject {
        settings.session.subject = subject;
    }
    if let Some(style) = cli.style {
        settings.session.style = style;
    }
    if let Some(ref base_url) = cli.base_url {
        settings.llm.base_url = base_url.clone();
    }

    if let Some(prompt) = cli.prompt {
        app::run_single_prompt(&settings, &prompt).await?;
    } else {
        app::run_tui(settings, &cli.theme).await?;
    }

    Ok(())
}

/// Log to stderr, or to a file while the full-screen UI owns the terminal.
fn init_tracing(full_screen: bool) {
    let log_file = full_screen
        .then(|| dirs::cache_dir().map(|dir| dir.join("coteacher")))
        .flatten()
        .and_then(|dir| {
            std::fs::create_dir_all(&dir).ok()?;
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(dir.join("coteacher.log"))
                .ok()
        });

    let writer = match log_file {
        Some(file) => BoxMakeWriter::new(Mutex::new(file)),
        None if full_screen => BoxMakeWriter::new(std::io::sink),
        None => BoxMakeWriter::new(std::io::stderr),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_ansi(!full_screen)
        .with_writer(writer)
        .init();
}
