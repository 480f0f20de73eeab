use std::net::SocketAddr;

use clap::Parser;
use prism_server::AppState;

/// Prism chat and document endpoints
#[derive(Parser)]
#[command(name = "prism-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(long, env = "PRISM_BIND", default_value = "127.0.0.1:3000")]
    bind: SocketAddr,

    /// Model provider (overrides settings.json)
    #[arg(long, env = "PRISM_PROVIDER")]
    provider: Option<String>,

    /// Model name (overrides settings.json)
    #[arg(long, env = "PRISM_MODEL")]
    model: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let filter = if args.verbose {
        "prism_server=debug,prism_suggest=debug,prism_core=debug,info"
    } else {
        "prism_server=info,prism_suggest=info,prism_core=info,warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut settings = prism_core::read_settings();
    if let Some(provider) = args.provider {
        settings.provider = provider;
    }
    if let Some(model) = args.model {
        settings.model = model;
    }

    let state = AppState::from_settings(settings)?;
    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    tracing::info!(addr = %args.bind, "prism-server listening");

    axum::serve(listener, prism_server::router(state))
        .await
        .inspect_err(|e| tracing::error!(error = %e, "server error"))?;
    Ok(())
}
