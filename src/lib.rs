pub mod api;
pub mod chat;
mod commands;
pub mod config;
pub mod knowledge;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use config::AppSettings;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rag-desk", version, about = "Ask the knowledge base and feed it documents")]
struct Cli {
    /// Settings file to use instead of the per-user default.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive streaming chat.
    Chat,
    /// Ask one question and print the streamed answer.
    Ask {
        #[arg(required = true)]
        question: Vec<String>,
    },
    /// Upload documents to the knowledge base.
    Upload {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Display name sent with the file; defaults to the file name.
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Print the effective settings.
    Settings,
}

pub fn run() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let Cli { config, command } = Cli::parse();
    let settings = match AppSettings::load(config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
    };

    let runtime = tokio::runtime::Runtime::new().expect("failed to start tokio runtime");
    let result = runtime.block_on(async {
        match command {
            Command::Chat => commands::chat::chat(&settings).await,
            Command::Ask { question } => commands::chat::ask(&settings, &question.join(" ")).await,
            Command::Upload {
                paths,
                name,
                description,
            } => commands::knowledge::upload(&settings, &paths, name, description).await,
            Command::Settings => commands::settings::show(&settings, config.as_deref()),
        }
    });

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
