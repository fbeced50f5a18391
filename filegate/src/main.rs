//! filegate - presigned-URL file handlers for an object storage bucket
//!
//! Runs one handler as a Lambda function through the Runtime API, or all of
//! them behind a local HTTP server.

mod backend;
mod config;
mod router;

use anyhow::Context;
use clap::{Parser, Subcommand};
use filegate_handlers::HandlerKind;
use filegate_runtime::{Runtime, RuntimeApiClient};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::backend::{build_handler, Backend};
use crate::config::Config;

/// Handler name Lambda passes to custom runtimes
const LAMBDA_HANDLER_ENV: &str = "_HANDLER";

#[derive(Parser, Debug)]
#[command(name = "filegate")]
#[command(about = "Presigned-URL file handlers for an object storage bucket", long_about = None)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "FILEGATE_LOG_LEVEL")]
    log_level: String,

    /// Configuration file (defaults to ./filegate.{toml,yaml,json} if present)
    #[arg(short, long, env = "FILEGATE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve one handler through the Lambda Runtime API
    Run {
        /// upload, download, delete or list
        #[arg(long, env = "FILEGATE_HANDLER")]
        handler: Option<String>,
    },

    /// Serve every handler over HTTP
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0", env = "FILEGATE_HOST")]
        host: String,

        /// Port to listen on
        #[arg(short, long, default_value = "4566", env = "FILEGATE_PORT")]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let lambda = matches!(args.command, Command::Run { .. });

    // Initialize tracing; CloudWatch shows escape codes verbatim
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("filegate={},tower_http=debug", args.log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_ansi(!lambda))
        .init();

    match args.command {
        Command::Run { handler } => run_lambda(args.config.as_deref(), handler).await,
        Command::Serve { host, port } => serve(args.config.as_deref(), &host, port).await,
    }
}

fn resolve_handler(flag: Option<String>) -> anyhow::Result<HandlerKind> {
    let name = flag
        .or_else(|| std::env::var(LAMBDA_HANDLER_ENV).ok())
        .context("No handler given: pass --handler or set FILEGATE_HANDLER")?;
    name.parse::<HandlerKind>().map_err(anyhow::Error::msg)
}

async fn run_lambda(config_path: Option<&std::path::Path>, handler: Option<String>) -> anyhow::Result<()> {
    let client = RuntimeApiClient::from_env()?;

    let init = async {
        let kind = resolve_handler(handler)?;
        let config = Config::load(config_path)?;
        build_handler(kind, &config).await
    };

    let handler = match init.await {
        Ok(handler) => handler,
        Err(e) => {
            let message = format!("{:#}", e);
            error!(error = %message, "Initialization failed");
            if let Err(report_err) = client.send_init_error("Runtime.ConfigError", &message).await {
                error!(error = %report_err, "Failed to report initialization error");
            }
            return Err(e);
        }
    };

    info!(handler = handler.name(), "Starting filegate Lambda runtime");
    Runtime::new(client, handler).run().await?;
    Ok(())
}

async fn serve(config_path: Option<&std::path::Path>, host: &str, port: u16) -> anyhow::Result<()> {
    let config = Config::load(config_path)?;

    // Presigned URLs have to point back at this server
    let local_endpoint = format!("http://localhost:{}", port);
    let backend = Backend::connect(&config, Some(local_endpoint.as_str())).await?;

    info!("Starting filegate...");
    info!("  Bucket: {}", backend.store.bucket());
    info!(
        "  Store: {}",
        if backend.ephemeral.is_some() { "ephemeral" } else { "s3" }
    );
    info!(
        "  List: {}",
        if config.list.enabled { "enabled" } else { "placeholder" }
    );

    let app = router::create_router(router::AppState::new(backend, &config));

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
