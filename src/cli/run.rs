use crate::config::parse::load_config;
use crate::config::Config;
use crate::estimator::Estimate;
use crate::pipeline::{PipelineError, ResultStream};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] crate::config::parse::ConfigError),

    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("output error: {0}")]
    Output(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub async fn run(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = match config_path {
        Some(path) => path,
        None => {
            eprintln!("Error: config not found");
            eprintln!("Searched locations:");
            eprintln!("  ~/.config/streamstat/config.yml");
            eprintln!("  {}", crate::config::SYSTEM_CONFIG_PATH);
            eprintln!("\nUse --config <path> to specify a config file, or run 'streamstat config init' to generate one.");
            std::process::exit(1);
        }
    };

    run_pipeline(&config_path).await.map_err(|e| e.into())
}

async fn run_pipeline(config_path: &Path) -> Result<(), RunError> {
    info!(config_path = %config_path.display(), "Loading configuration");
    let config = load_config(config_path)?;

    let cancel = CancellationToken::new();

    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received");
                ctrl_c_token.cancel();
            }
            Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
        }
    });

    let stream = ResultStream::from_config(&config, cancel)?;
    info!("Pipeline started, press Ctrl+C to shutdown");

    let mut stdout = std::io::stdout();
    let result = print_estimates(stream, &config, &mut stdout).await;

    info!("Pipeline shutdown complete");
    result
}

/// Write every estimate as one JSON line until the stream ends
async fn print_estimates(
    mut stream: ResultStream,
    config: &Config,
    out: &mut impl Write,
) -> Result<(), RunError> {
    // Repeating estimates are paced so an idle reservoir does not flood stdout
    let pace = stream.may_repeat().then_some(config.source.poll_interval);
    let cancel = stream.cancellation_token();

    while let Some(estimate) = stream.next().await {
        if let Err(e) = write_estimate(out, &estimate) {
            // Stop the background tasks before reporting, e.g. on a closed stdout pipe
            stream.shutdown().await;
            return Err(e);
        }

        if let Some(pace) = pace {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(pace) => {}
            }
        }
    }

    stream.shutdown().await;
    Ok(())
}

fn write_estimate(out: &mut impl Write, estimate: &Estimate) -> Result<(), RunError> {
    let mut line = serde_json::to_vec(estimate)?;
    line.push(b'\n');
    out.write_all(&line)?;
    out.flush()?;
    Ok(())
}
