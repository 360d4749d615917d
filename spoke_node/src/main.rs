//! # Spoke Node Binary
//!
//! Runs one drum node on the UDP-emulated bus, with a debug console on
//! stdin.
//!
//! # Usage
//!
//! ```bash
//! # Simulated hardware, config from the default location
//! spoke_node --simulate
//!
//! # Explicit config and device id, verbose logging
//! spoke_node --config config/node.toml --device-id 5 -v
//!
//! # JSON logs, no console
//! spoke_node --json --no-console
//! ```

use clap::Parser;
use spoke_common::bus::UdpBus;
use spoke_common::config::ConfigLoader;
use spoke_common::node::config::NodeConfig;
use spoke_node::console::Console;
use spoke_node::{HardwareRegistry, LoopSettings, NodeContext, NodeCore};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

/// Spoke drum node - encoder-verified rotary dispenser
#[derive(Parser, Debug)]
#[command(name = "spoke_node")]
#[command(version)]
#[command(about = "Rotary drum actuator node with encoder-verified motion")]
#[command(long_about = None)]
struct Args {
    /// Path to the node configuration file
    #[arg(short, long, default_value = "config/node.toml")]
    config: PathBuf,

    /// Override `[node] device_id`
    #[arg(short, long)]
    device_id: Option<u8>,

    /// Force the simulation driver
    #[arg(short = 's', long)]
    simulate: bool,

    /// Do not read console commands from stdin
    #[arg(long)]
    no_console: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = run() {
        error!("Node failed: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(&args);

    let level = match &config {
        Ok(config) => config
            .node
            .log_level
            .as_directive()
            .parse()
            .unwrap_or(Level::INFO),
        Err(_) => Level::INFO,
    };
    setup_tracing(&args, level);

    let config = config?;
    info!(
        "Spoke node v{} starting as device {}",
        env!("CARGO_PKG_VERSION"),
        config.node.device_id
    );

    let registry = HardwareRegistry::with_builtin();
    info!("Available drivers: {:?}", registry.list_drivers());
    let caps = registry.create(&config)?;
    let ctx = NodeContext::boot(&config, caps)?;

    let bus = UdpBus::bind(config.bus.bind, config.bus.peers.clone())?;
    info!("Bus bound to {}, {} peers", bus.local_addr()?, config.bus.peers.len());

    let mut core = NodeCore::new(ctx, bus, LoopSettings::from(&config.node));
    if !args.no_console {
        core = core.with_console(spawn_console());
    }

    let running = core.running_flag();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        running.store(false, Ordering::SeqCst);
    })?;

    core.run()?;

    info!("Spoke node shutdown complete");
    Ok(())
}

/// Load the config file and apply CLI overrides.
fn load_config(args: &Args) -> Result<NodeConfig, Box<dyn std::error::Error>> {
    let mut config = NodeConfig::load(&args.config)?;
    if let Some(device_id) = args.device_id {
        config.node.device_id = device_id;
    }
    if args.simulate {
        config.hardware.driver = "simulation".to_string();
    }
    config.validate()?;
    Ok(config)
}

/// Feed stdin lines to the console on a reader thread.
fn spawn_console() -> Console {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });
    Console::new(rx, Box::new(std::io::stdout()))
}

/// Setup tracing subscriber based on CLI arguments.
fn setup_tracing(args: &Args, configured: Level) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        configured
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
