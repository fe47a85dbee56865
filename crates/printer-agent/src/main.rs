use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use infrastructure::config::AgentConfig;
use infrastructure::{IdentityStore, SerialPortRegistry};
use printer_agent::{Agent, list_ports};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to config directory
    #[arg(long, default_value = "config")]
    config_dir: String,

    /// Override the configured port
    #[arg(long)]
    port: Option<String>,

    /// Override the configured baud rate
    #[arg(long)]
    baud_rate: Option<u32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List USB serial ports with their vendor/product ids
    Ports,
    /// Send files to the printer, one command buffer per file
    Print {
        /// Find the printer by its saved identity instead of the configured port
        #[arg(long)]
        reconnect: bool,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Log whatever the printer sends until Ctrl-C
    Monitor {
        #[arg(long)]
        reconnect: bool,
    },
}

async fn run() -> Result<()> {
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,printer_agent=debug,application=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Loading configuration...");
    let mut config = AgentConfig::load(&args.config_dir)?;

    // Override with CLI args if present
    if let Some(port) = args.port {
        config.device.port = Some(port);
    }
    if let Some(baud_rate) = args.baud_rate {
        config.serial.baud_rate = Some(baud_rate);
    }

    let registry = Arc::new(SerialPortRegistry::new(config.device.port.clone()));

    let (reconnect, files) = match args.command {
        Command::Ports => {
            for port in list_ports(registry.as_ref()).await? {
                println!("{}\t{}", port.name, port.identity);
            }
            return Ok(());
        }
        Command::Print { reconnect, files } => (reconnect, Some(files)),
        Command::Monitor { reconnect } => (reconnect, None),
    };

    let watcher_token = CancellationToken::new();
    let watcher = registry.spawn_watcher(
        Duration::from_millis(config.watch_interval_ms),
        watcher_token.clone(),
    );

    let store = IdentityStore::new(format!("{}/{}", args.config_dir, config.identity_file));
    let agent = Agent::new(registry, config.serial, store, config.device.identity())?;

    let identity = agent.connect(reconnect).await?;
    info!(identity = %identity, "✅ Printer connected");

    let outcome = match files {
        Some(files) => agent.print_files(&files).await.map(|_| ()),
        None => {
            agent
                .monitor(async {
                    match tokio::signal::ctrl_c().await {
                        Ok(()) => info!("🛑 Shutting down..."),
                        Err(err) => warn!(error = %err, "Unable to listen for shutdown signal"),
                    }
                })
                .await
        }
    };

    agent.shutdown().await;
    watcher_token.cancel();
    let _ = watcher.await;

    info!("👋 Good bye!");
    outcome
}

fn main() {
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("❌ Failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = rt.block_on(run()) {
        eprintln!("\n❌ CRITICAL ERROR: {:?}", e);
        std::process::exit(1);
    }
}
