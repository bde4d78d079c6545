//! devhostd - devhost plugin IPC host daemon

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use devhost_host::prelude::*;
use tracing::info;

#[derive(Parser)]
#[command(name = "devhostd")]
#[command(about = "devhost plugin IPC and shared-memory data plane host")]
#[command(version)]
struct Cli {
    /// Path to the host's TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the host daemon until interrupted.
    Run,
    /// Validate the configuration file without starting the host.
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("devhost=debug,info").init();

    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(HostConfig::default_config_path);

    match cli.command {
        Commands::CheckConfig => {
            let config = HostConfig::load_from_path(&config_path).await?;
            config.validate()?;
            println!("{config_path:?} is valid");
            Ok(())
        }
        Commands::Run => run(config_path).await,
    }
}

async fn run(config_path: PathBuf) -> Result<()> {
    info!(version = env!("CARGO_PKG_VERSION"), "starting devhost");

    let config = HostConfig::load_from_path(&config_path).await?;
    config.validate()?;

    let shared_memory = devhost_shmem::SharedMemoryManager::new(config.shared_memory.to_manager_config())?;
    let _watchdog = shared_memory.initialize();

    let events: Arc<EventBus<HostEvent>> = Arc::new(EventBus::new());
    let registry = Arc::new(PluginRegistry::new());
    let streams = Arc::new(devhost_streams::MessageStreamService::new(config.message_stream.max_messages_per_session));
    let supervisor = Arc::new(SessionHostSupervisor::new(config.pipe_timeouts.ready()));
    let coordinator = Arc::new(DeviceSessionCoordinator::new(shared_memory.clone(), registry.clone(), events.clone()));
    let pump = Arc::new(FramePump::new(shared_memory.clone(), streams.clone(), events.clone()));

    let byte_counter_coordinator = coordinator.clone();
    events.subscribe(move |event| match event {
        HostEvent::DataReceived(e) => byte_counter_coordinator.record_received(&e.session_id, e.byte_len as u64),
        HostEvent::DataSent(e) => byte_counter_coordinator.record_sent(&e.session_id, e.byte_len as u64),
        _ => {}
    });

    let _dispatcher = CapabilityDispatcher::new(registry, supervisor, coordinator);

    let backpressure_pump = pump.clone();
    let mut backpressure_events = shared_memory.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = backpressure_events.recv().await {
            backpressure_pump.apply_backpressure(&event.session_id, event.level);
        }
    });

    let shutdown_signal = async {
        tokio::signal::ctrl_c().await.expect("failed to install ctrl-c handler");
        info!("received shutdown signal");
    };

    shutdown_signal.await;
    pump.shutdown().await;
    info!("devhost stopped");
    Ok(())
}
