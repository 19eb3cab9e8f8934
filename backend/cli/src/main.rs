mod api;
mod run_cmd;
mod selector;
mod session;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{TimeDelta, Utc};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use sketchnote_config::{load_and_prepare, resolve_config_path, validate, SketchnoteConfig};
use sketchnote_core::{AspectRatio, ImageSize};
use sketchnote_logging::init_logger;

use api::AppState;
use run_cmd::RunOptions;
use session::SessionStore;

/// How often idle sessions are looked for.
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Parser)]
#[command(name = "sketchnote")]
#[command(about = "Turn a photographed note into a hand-drawn style sketchnote")]
#[command(version)]
struct Cli {
    /// Config file (defaults to $SKETCHNOTE_CONFIG or ~/.sketchnote/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Answer with canned results instead of calling the provider
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the wizard HTTP API
    Serve {
        /// Port to bind the HTTP server to
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run one photo through the whole wizard
    Run {
        /// Photo of the note to beautify
        image: PathBuf,
        /// Aspect ratio of the sketchnote (1:1, 2:3, 3:2, 3:4, 4:3, 9:16, 16:9, 21:9)
        #[arg(short, long)]
        aspect_ratio: Option<AspectRatio>,
        /// Resolution of the sketchnote (1K, 2K, 4K)
        #[arg(short, long)]
        image_size: Option<ImageSize>,
        /// Where to save the image
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Check whether a server is running
    Status {
        /// Port the server listens on
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let path = resolve_config_path(cli.config.as_deref());
    let mut config = load_and_prepare(&path)
        .await
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    if cli.offline {
        config.provider.offline = true;
    }

    init_logger(&config.logging.to_settings());
    for warning in validate(&config).warnings {
        warn!(path = %warning.path, message = %warning.message, "Config warning");
    }

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            run_server(config).await?;
        }
        Commands::Run {
            image,
            aspect_ratio,
            image_size,
            out,
        } => {
            let options = RunOptions {
                image,
                aspect_ratio,
                image_size,
                out,
            };
            let saved = run_cmd::run(&config, options).await?;
            println!("Saved {}", saved.display());
        }
        Commands::Status { port } => {
            let port = port.unwrap_or(config.server.port);
            let client = reqwest::Client::new();
            match client
                .get(format!("http://localhost:{port}/api/health"))
                .send()
                .await
            {
                Ok(resp) => {
                    let body: serde_json::Value = resp.json().await?;
                    println!("{}", serde_json::to_string_pretty(&body)?);
                }
                Err(_) => {
                    println!("sketchnote is not running on port {port}");
                }
            }
        }
    }

    Ok(())
}

async fn run_server(config: SketchnoteConfig) -> Result<()> {
    let address = config.server.address();
    info!(
        address = %address,
        offline = config.provider.offline,
        analysis_model = %config.provider.analysis_model,
        image_model = %config.provider.image_model,
        key_configured = config.provider.api_key.is_some(),
        "Starting sketchnote server"
    );

    let state = Arc::new(AppState {
        sessions: SessionStore::from_config(&config),
        offline: config.provider.offline,
    });
    spawn_session_sweeper(Arc::clone(&state), config.server.session_idle_secs);

    let app = api::build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!(address = %address, "sketchnote listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %e, "Server error");
        return Err(e.into());
    }
    info!("sketchnote stopped");
    Ok(())
}

/// Periodically drop sessions a closed browser tab left behind.
fn spawn_session_sweeper(state: Arc<AppState>, idle_secs: u32) {
    if idle_secs == 0 {
        return;
    }
    let max_idle = TimeDelta::seconds(i64::from(idle_secs));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let evicted = state.sessions.evict_idle(max_idle, Utc::now()).await;
            if evicted > 0 {
                let remaining = state.sessions.len().await;
                info!(evicted, remaining, "Evicted idle sessions");
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
}
