//! Prism - elicit constraints in conversation, then draft a specification.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod live;

use commands::Context;

/// Prism - turn a conversation into a specification
#[derive(Parser)]
#[command(name = "prism")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use a prism-server at this URL instead of calling the model directly
    #[arg(long, global = true, env = "PRISM_ENDPOINT")]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Talk to the assistant; constraints it identifies are recorded
    Chat,

    /// Draft the specification document from the recorded constraints
    Generate {
        /// Extra drafting instruction
        #[arg(short, long)]
        prompt: Option<String>,
    },

    /// List recorded constraints, grouped by category
    Constraints {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the current document
    Document,

    /// Replace the document with the contents of a file
    SetDocument { file: std::path::PathBuf },

    /// Remove all constraints, keeping the document
    ClearConstraints,

    /// Discard constraints and document
    Reset,

    /// Write the project to a dated JSON file
    Export {
        /// Directory to write into
        #[arg(long, default_value = ".")]
        dir: std::path::PathBuf,
    },

    /// Replace the project with one from an exported file
    Import { file: std::path::PathBuf },

    /// Show or change model settings
    Config {
        #[command(subcommand)]
        action: commands::ConfigAction,
    },

    /// Print the JSON Schema of the project file
    Schema,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // stdout carries chat and document text; logs go to stderr
    let filter = if cli.verbose {
        "prism=debug,prism_suggest=debug,prism_core=debug,warn"
    } else {
        "prism=warn,prism_suggest=warn,prism_core=warn,error"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let ctx = Context::new(cli.endpoint);

    match cli.command {
        Commands::Chat => commands::chat(&ctx).await,
        Commands::Generate { prompt } => commands::generate(&ctx, prompt.as_deref()).await,
        Commands::Constraints { json } => commands::constraints(&ctx, json),
        Commands::Document => commands::document(&ctx),
        Commands::SetDocument { file } => commands::set_document(&ctx, &file),
        Commands::ClearConstraints => commands::clear_constraints(&ctx),
        Commands::Reset => commands::reset(&ctx),
        Commands::Export { dir } => commands::export(&ctx, &dir),
        Commands::Import { file } => commands::import(&ctx, &file),
        Commands::Config { action } => commands::config(action),
        Commands::Schema => commands::schema(),
    }
}
