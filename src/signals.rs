use anyhow::Result;
use arc_swap::ArcSwap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

use crate::config::{load_config, Config};
use crate::pricing::{engine_from_config, PricingEngine};

/// Shutdown signal types
#[derive(Debug, Clone, Copy)]
pub enum ShutdownSignal {
    /// Graceful shutdown (drain connections, clean up)
    Graceful,
}

/// Setup signal handlers for the server
///
/// Returns a broadcast sender for shutdown signals and a join handle for the signal task
///
/// Handles:
/// - SIGTERM/SIGINT: Graceful shutdown
/// - SIGHUP: Reload configuration from `config_path` and rebuild the pricing engine
#[cfg(unix)]
pub fn setup_signal_handlers(
    config_path: PathBuf,
    config: Arc<ArcSwap<Config>>,
    engine: Arc<ArcSwap<PricingEngine>>,
) -> (broadcast::Sender<ShutdownSignal>, tokio::task::JoinHandle<()>) {
    let (shutdown_tx, _) = broadcast::channel(16);
    let tx_clone = shutdown_tx.clone();

    let handle = tokio::spawn(async move {
        let streams = (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
            signal(SignalKind::hangup()),
        );
        let (mut sigterm, mut sigint, mut sighup) = match streams {
            (Ok(term), Ok(int), Ok(hup)) => (term, int, hup),
            _ => {
                error!("Failed to install unix signal handlers, falling back to Ctrl+C only");
                wait_for_ctrl_c(tx_clone).await;
                return;
            }
        };

        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("SIGTERM received, initiating graceful shutdown");
                    let _ = tx_clone.send(ShutdownSignal::Graceful);
                    break;
                }
                _ = sigint.recv() => {
                    info!("SIGINT received, initiating graceful shutdown");
                    let _ = tx_clone.send(ShutdownSignal::Graceful);
                    break;
                }
                _ = sighup.recv() => {
                    info!("SIGHUP received, reloading configuration");
                    if let Err(e) = reload_config(&config_path, &config, &engine) {
                        error!("Failed to reload configuration: {}", e);
                    } else {
                        info!("Configuration reloaded successfully");
                    }
                }
            }
        }
    });

    (shutdown_tx, handle)
}

/// Windows placeholder - only Ctrl+C is supported, no reload
#[cfg(not(unix))]
pub fn setup_signal_handlers(
    _config_path: PathBuf,
    _config: Arc<ArcSwap<Config>>,
    _engine: Arc<ArcSwap<PricingEngine>>,
) -> (broadcast::Sender<ShutdownSignal>, tokio::task::JoinHandle<()>) {
    let (shutdown_tx, _) = broadcast::channel(16);
    let tx_clone = shutdown_tx.clone();

    let handle = tokio::spawn(wait_for_ctrl_c(tx_clone));

    (shutdown_tx, handle)
}

async fn wait_for_ctrl_c(tx: broadcast::Sender<ShutdownSignal>) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("Ctrl+C received, initiating shutdown");
            let _ = tx.send(ShutdownSignal::Graceful);
        }
        Err(e) => {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
    }
}

/// Reload configuration and pricing engine together
///
/// The new configuration is loaded, validated and turned into a pricing
/// engine before anything is swapped. On any failure the running
/// configuration stays in place. Listener address, upload directory and
/// payment gateway are fixed at startup and need a restart to change.
pub fn reload_config(
    path: &Path,
    config: &ArcSwap<Config>,
    engine: &ArcSwap<PricingEngine>,
) -> Result<()> {
    info!(path = %path.display(), "Loading new configuration...");

    let new_config = load_config(path)?;
    let new_engine = engine_from_config(&new_config)?;

    info!(
        materials = new_engine.catalog().len(),
        default_material = %new_engine.catalog().default_profile().key,
        machine_rate_per_hour = new_engine.rates().machine_rate_per_hour,
        "New configuration loaded"
    );

    engine.store(Arc::new(new_engine));
    config.store(Arc::new(new_config));

    info!("Configuration and pricing engine swapped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::{ModelAnalysis, OrderOptions};
    use std::io::Write;

    #[tokio::test]
    async fn test_setup_signal_handlers() {
        let config = Arc::new(ArcSwap::from_pointee(Config::default()));
        let engine = Arc::new(ArcSwap::from_pointee(PricingEngine::default()));
        let (shutdown_tx, _handle) =
            setup_signal_handlers(PathBuf::from("config.toml"), config, engine);

        let mut rx = shutdown_tx.subscribe();
        shutdown_tx.send(ShutdownSignal::Graceful).unwrap();

        let received = rx.recv().await.unwrap();
        assert!(matches!(received, ShutdownSignal::Graceful));
    }

    #[test]
    fn test_reload_swaps_engine() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[pricing]\nmachine_rate_per_hour = 10.0").unwrap();

        let config = ArcSwap::from_pointee(Config::default());
        let engine = ArcSwap::from_pointee(PricingEngine::default());

        reload_config(file.path(), &config, &engine).unwrap();

        assert_eq!(config.load().pricing.machine_rate_per_hour, 10.0);
        let quote = engine
            .load()
            .try_calculate(
                &ModelAnalysis::for_pricing(0.0, 60.0, 50.0),
                "PLA",
                OrderOptions::default(),
            )
            .unwrap();
        assert!((quote.time_cost - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_reload_keeps_old_config_on_error() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[pricing]\noverhead_rate = -1.0").unwrap();

        let config = ArcSwap::from_pointee(Config::default());
        let engine = ArcSwap::from_pointee(PricingEngine::default());

        assert!(reload_config(file.path(), &config, &engine).is_err());
        assert_eq!(config.load().pricing.overhead_rate, 0.10);
    }
}
