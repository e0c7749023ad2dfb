//! # glimpse CLI
//!
//! Runs the glimpse preview engine for an editor host over stdin/stdout, or
//! renders a single file from the command line.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "glimpse")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(long, global = true, default_value = "glimpse.yml")]
    config: PathBuf,

    /// Directory relative document paths are read from
    #[arg(long, global = true, env = "GLIMPSE_ROOT")]
    root: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Speak the preview protocol on stdin/stdout (the default)
    Serve,

    /// Render one document to stdout
    Render {
        /// Document path
        path: String,

        /// Capability to request (repeatable; all capabilities when omitted)
        #[arg(long = "capability", value_name = "NAME")]
        capabilities: Vec<String>,
    },

    /// List the capabilities the engine advertises
    Capabilities {
        /// Print a JSON array
        #[arg(long)]
        json: bool,
    },
}

/// Log to stderr; stdout carries protocol frames and rendered output.
fn init_tracing(verbose: bool) -> anyhow::Result<()> {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let config = commands::load_config(&cli.config, cli.root.as_deref())?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let code = commands::serve(&config).await?;
            // Stdin is read on a blocking thread that would hold up runtime shutdown.
            std::process::exit(code);
        }
        Commands::Render { path, capabilities } => {
            commands::render_file(&config, &path, &capabilities).await
        }
        Commands::Capabilities { json } => commands::list_capabilities(&config, json),
    }
}
