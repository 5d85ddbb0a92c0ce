//! Batch video generation binary.
//!
//! Loads images from `VGEN_INPUT_DIR` and prompts from `VGEN_PROMPTS_FILE`,
//! optionally writes prompts for them, generates a video for every item and
//! saves the results plus a zip archive into `VGEN_OUTPUT_DIR`. Ctrl-C
//! cancels the running pool; finished videos are still saved.

use std::path::Path;
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vgen_client::GeminiClient;
use vgen_worker::{KeyStore, RunOutcome, Studio, WorkerConfig, WorkerError};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        eprintln!("rustls crypto provider was already installed");
    }

    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vgen=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting vgen-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    let store = KeyStore::new(config.keys_file.clone());
    let keys = match store.load().await {
        Ok(keys) => keys,
        Err(e) => {
            error!("Failed to read API keys from {}: {}", store.path().display(), e);
            std::process::exit(1);
        }
    };

    let backend = match GeminiClient::from_env() {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to create Gemini client: {}", e);
            std::process::exit(1);
        }
    };

    let output_dir = config.output_dir.clone();
    let studio = Arc::new(Studio::new(config.clone(), Arc::new(backend), keys));

    if let Err(e) = load_inputs(&studio, &config).await {
        error!("Failed to load inputs: {}", e);
        std::process::exit(1);
    }

    // Ctrl-C cancels whichever pool is running
    let signal_studio = Arc::clone(&studio);
    let signal_handle = tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            info!("Received interrupt signal");
            signal_studio.cancel_prompts();
            signal_studio.cancel_generation();
        }
    });

    let mut cancelled = false;
    if config.generate_prompts {
        match studio.generate_prompts().await {
            Ok(summary) => {
                info!("{}", summary.status_message());
                cancelled = summary.outcome == RunOutcome::Cancelled;
            }
            Err(e) => exit_on_startup_failure(e),
        }
    }

    if !cancelled {
        match studio.generate_all().await {
            Ok(summary) => info!("{}", summary.status_message()),
            Err(e) => exit_on_startup_failure(e),
        }
    }

    signal_handle.abort();
    save_results(&studio, &output_dir).await;

    info!("Session complete");
}

fn exit_on_startup_failure(err: WorkerError) {
    error!("{}", err);
    if err.is_startup_failure() {
        std::process::exit(1);
    }
}

async fn load_inputs(studio: &Studio, config: &WorkerConfig) -> Result<(), WorkerError> {
    if let Some(dir) = &config.input_dir {
        let mut entries = tokio::fs::read_dir(dir).await?;
        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                paths.push(entry.path());
            }
        }
        paths.sort();

        for path in paths {
            match studio.add_image_file(&path, None).await {
                Ok(id) => info!(item_id = %id, "Queued image {}", path.display()),
                Err(e) => warn!("Skipping {}: {}", path.display(), e),
            }
        }
    }

    if let Some(file) = &config.prompts_file {
        let text = tokio::fs::read_to_string(file).await?;
        for prompt in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            studio.add_prompt(prompt).await?;
        }
    }

    info!("Queued {} item(s)", studio.queue().len().await);
    Ok(())
}

async fn save_results(studio: &Studio, output_dir: &Path) {
    match studio.collector().save_all(output_dir).await {
        Ok(paths) if !paths.is_empty() => info!("Saved {} video(s) to {}", paths.len(), output_dir.display()),
        Ok(_) => {}
        Err(e) => error!("Failed to save videos: {}", e),
    }

    if studio.collector().is_empty() {
        warn!("No completed videos to archive");
        return;
    }
    if let Err(e) = studio.download_all(&output_dir.join("videos.zip")).await {
        error!("Failed to write archive: {}", e);
    }
}
