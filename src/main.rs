//! MTA coin - coordinator and miner entry point

use clap::Parser;
use mtacoin::{
    APP_NAME, APP_VERSION, Config, Coordinator, Error, Miner, Result,
    channel::{ChannelName, Transport},
    config::{Args, RoleConfig, load_difficulty},
    utils::init_logging,
};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[cfg(unix)]
use mtacoin::channel::FifoTransport;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match Config::from_args(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if args.print_config {
        return match config.to_json() {
            Ok(json) => {
                println!("{}", json);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{}", e);
                ExitCode::FAILURE
            }
        };
    }

    let _guard = match init_logging(&config.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("Starting {} v{}", APP_NAME, APP_VERSION);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Fatal {} error: {}", e.category(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<()> {
    let transport = open_transport(&config.pipe_dir)?;

    match config.role {
        RoleConfig::Server { config_file } => run_server(transport, &config_file).await,
        RoleConfig::Miner { pool_size } => run_miner(transport, pool_size).await,
    }
}

#[cfg(unix)]
fn open_transport(pipe_dir: &Path) -> Result<Arc<dyn Transport>> {
    Ok(Arc::new(FifoTransport::new(pipe_dir)))
}

#[cfg(not(unix))]
fn open_transport(_pipe_dir: &Path) -> Result<Arc<dyn Transport>> {
    Err(Error::config("Named pipes are only supported on Unix"))
}

async fn run_server(transport: Arc<dyn Transport>, config_file: &Path) -> Result<()> {
    let setting = load_difficulty(config_file);
    let mut coordinator = Coordinator::new(transport, setting.difficulty);
    let inbound = coordinator.open_inbound().await?;

    let served = tokio::select! {
        result = coordinator.run(inbound, None) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, stopping coordinator");
            Ok(())
        }
    };
    served?;

    let stats = coordinator.stats();
    info!(
        "Coordinator stopped: chain length {}, {} accepted, {} rejected, {} subscriptions",
        coordinator.chain().len(),
        stats.accepted,
        stats.rejected(),
        stats.subscriptions
    );
    Ok(())
}

async fn run_miner(transport: Arc<dyn Transport>, pool_size: u32) -> Result<()> {
    let miner = Miner::join(transport.clone(), pool_size).await?;
    let channel: ChannelName = miner.channel().clone();
    let cancel = CancellationToken::new();
    let mut mining = tokio::spawn(miner.run(cancel.clone()));

    let joined = tokio::select! {
        joined = &mut mining => joined,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, stopping miner");
            cancel.cancel();
            mining.await
        }
    };
    let result = joined.map_err(|e| Error::worker(format!("Miner task failed: {}", e)))?;

    if let Err(e) = transport.remove(&channel).await {
        warn!("Failed to remove {}: {}", channel, e);
    }

    let stats = result?;
    info!("Miner finished: {}", stats);
    Ok(())
}
