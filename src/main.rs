use anyhow::{Context, Result};
use axum::{extract::FromRef, Router};
use clap::Parser;
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tokio::net::TcpListener;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{
    cli::{Cli, Command},
    config::Settings,
    dataset::Dataset,
    session::SessionStore,
};

// Declare modules
mod cleaner;
mod cli;
mod config;
mod dashboard;
mod dataset;
mod error;
mod models;
mod routes;
mod session;

// Shared state for the dashboard server. The dataset is read-only; mutable
// state is confined to the per-session entries of the store.
#[derive(Clone, FromRef)]
struct AppState {
    settings: Arc<Settings>,
    dataset: Arc<Dataset>,
    sessions: Arc<SessionStore>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file first. Ignore errors (e.g., file not found)
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "service_pricing=info,tower_http=info".into()),
        )
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let settings = match Settings::new() {
        Ok(s) => {
            tracing::info!("Configuration loaded successfully.");
            s
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };

    match cli.command {
        Command::Clean { input, output } => {
            let input = input.unwrap_or_else(|| PathBuf::from(&settings.raw_dataset_path));
            let output = output.unwrap_or_else(|| PathBuf::from(&settings.cleaned_dataset_path));
            // File I/O only; keep it off the async workers
            let report = tokio::task::spawn_blocking(move || cleaner::clean_dataset(&input, &output))
                .await
                .context("Cleaning task panicked")??;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Command::Serve { dataset, address } => {
            let mut settings = settings;
            if let Some(dataset) = dataset {
                settings.cleaned_dataset_path = dataset.display().to_string();
            }
            if let Some(address) = address {
                settings.server_address = address;
            }
            serve(settings).await
        }
    }
}

async fn serve(settings: Settings) -> Result<()> {
    tracing::info!("Initializing pricing dashboard server...");

    let dataset_path = PathBuf::from(&settings.cleaned_dataset_path);
    let dataset = tokio::task::spawn_blocking(move || dataset::load_dataset(&dataset_path))
        .await
        .context("Dataset load task panicked")?
        .context("Failed to load cleaned dataset")?;

    let app_state = AppState {
        sessions: Arc::new(SessionStore::from_settings(&settings)),
        settings: Arc::new(settings),
        dataset,
    };

    let router: Router = routes::create_router(app_state.clone());
    let app = router
        .nest_service("/static", ServeDir::new("static"))
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = match app_state.settings.server_address.parse() {
        Ok(a) => a,
        Err(e) => {
            tracing::error!(
                "Invalid server address format in configuration ('{}'): {}",
                app_state.settings.server_address,
                e
            );
            return Err(anyhow::anyhow!(
                "Invalid server address format: {}",
                app_state.settings.server_address
            ));
        }
    };

    let listener = match TcpListener::bind(&addr).await {
        Ok(l) => {
            tracing::info!("Server listening on {}", addr);
            l
        }
        Err(e) => {
            tracing::error!("Failed to bind to address {}: {}", addr, e);
            return Err(e.into());
        }
    };

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
