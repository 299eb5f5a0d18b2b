use anyhow::Context;
use swap_engine::engine::{SwapEngine, SwapEngineBuilder};
use swap_engine::utils::{config::Config, logger};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("loading configuration")?;
    logger::init(&config.logging.level);
    info!("Starting swap engine");

    config.validate().context("validating configuration")?;

    let mut engine = SwapEngineBuilder::new()
        .with_config(config)
        .build()
        .await
        .context("building swap engine")?;

    for pool in engine.pools() {
        info!(
            "Pool {} ({}): {} / {} at {} bps",
            pool.pool_id, pool.pair, pool.reserve_base, pool.reserve_quote, pool.fee_bps
        );
    }

    engine.start().await?;
    setup_graceful_shutdown(engine).await
}

/// Run until Ctrl-C or SIGTERM, then stop background loops
async fn setup_graceful_shutdown(mut engine: SwapEngine) -> anyhow::Result<()> {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl-C, shutting down gracefully...");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        },
    }

    if let Err(e) = engine.stop().await {
        error!("Error during shutdown: {}", e);
        return Err(e.into());
    }

    let stats = engine.stats();
    info!(
        "Swap engine shutdown complete ({} settled, {} duplicates, {:.2}% success)",
        stats.execution.settled,
        stats.execution.duplicates,
        stats.execution.success_rate()
    );
    Ok(())
}
