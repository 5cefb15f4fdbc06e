//! Binary entrypoint for the pastel palette.
use std::{path::PathBuf, process};

use clap::{Parser, Subcommand};
use logging::{self as logshared};
use tracing::{debug, error};

/// One-shot subcommands and the `run` loop.
mod commands;
/// Headless palette: reacts to activations and logs task outcomes.
mod controller;

#[derive(Parser, Debug)]
#[command(
    name = "pastel",
    about = "Transform the selected text with a command and paste it back",
    version
)]
/// Command-line interface for the `pastel` binary.
struct Cli {
    /// Subcommand; defaults to `run`.
    #[command(subcommand)]
    command: Option<Command>,

    /// Logging controls
    #[command(flatten)]
    log: logshared::LogArgs,

    /// Optional path to the config file
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
/// Top-level CLI subcommands.
enum Command {
    /// Listen for the activation chord and run the pipeline.
    Run {
        /// Input device to read (defaults to the config, then the first keyboard)
        #[arg(long, value_name = "PATH")]
        device: Option<PathBuf>,

        /// Command to submit on every activation
        #[arg(long, value_name = "ID")]
        command: Option<String>,
    },

    /// Run one command and print its answers.
    Exec {
        /// Command id, e.g. `text:upper` or `math:evaluate`
        id: String,

        /// Input text (defaults to the current selection)
        #[arg(long)]
        text: Option<String>,

        /// Palette query, used by `math:query` and `ai:ask`
        #[arg(long)]
        query: Option<String>,

        /// Paste the first answer into the focused window
        #[arg(long)]
        paste: bool,
    },

    /// Print the commands in palette order.
    List,

    /// Load and validate the configuration then exit.
    Check {
        /// Path to configuration file to check (defaults to ~/.config/pastel/config.ron)
        path: Option<PathBuf>,

        /// Dump the effective configuration as RON to stdout
        #[arg(long)]
        dump: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let spec = logshared::init(&cli.log);
    debug!(filter = %spec, "logging_initialised");

    if let Some(Command::Check { path, dump }) = &cli.command {
        let explicit = path.as_deref().or(cli.config.as_deref());
        process::exit(commands::check(explicit, *dump));
    }

    let cfg = match config::load(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{}", e.pretty());
            process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            process::exit(1);
        }
    };

    let code = runtime.block_on(async move {
        match cli.command {
            None => commands::run(&cfg, None, None).await,
            Some(Command::Run { device, command }) => {
                commands::run(&cfg, device.as_deref(), command).await
            }
            Some(Command::Exec {
                id,
                text,
                query,
                paste,
            }) => commands::exec(&cfg, &id, text, query, paste).await,
            Some(Command::List) => commands::list(&cfg),
            Some(Command::Check { .. }) => 0,
        }
    });
    process::exit(code);
}

