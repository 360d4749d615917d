//! # Spoke Control CLI
//!
//! Supervisory side of the bus: sends one command to a drum node and waits
//! for its reply, printing any status events seen meanwhile.
//!
//! # Usage
//!
//! ```bash
//! spoke_ctl --device 4 status
//! spoke_ctl --device 4 dispense
//! spoke_ctl --device 4 dispense --slot 3
//! spoke_ctl --device 4 set-param spokes 6
//! spoke_ctl --device 4 set-slot 2 empty
//! spoke_ctl listen --seconds 10
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use spoke_common::bus::{BusClient, UdpBus};
use spoke_common::protocol::{Command, Parameter, Reply};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

/// Spoke control - talk to drum nodes over the emulated bus
#[derive(Parser, Debug)]
#[command(name = "spoke_ctl")]
#[command(version)]
#[command(about = "Send commands to Spoke drum nodes")]
#[command(long_about = None)]
struct Args {
    /// Local socket address
    #[arg(long, default_value = "127.0.0.1:47100")]
    bind: SocketAddr,

    /// Node socket address (repeat for several nodes)
    #[arg(long = "peer", default_value = "127.0.0.1:47000")]
    peers: Vec<SocketAddr>,

    /// Target device id
    #[arg(short, long, default_value_t = 4)]
    device: u8,

    /// Reply timeout in milliseconds
    #[arg(short, long, default_value_t = 1000)]
    timeout_ms: u64,

    /// Print replies and events as JSON where possible
    #[arg(long)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Request a status snapshot
    Status,
    /// Dispense the nearest filled slot, or a specific one
    Dispense {
        /// Slot to dispense
        #[arg(long)]
        slot: Option<u8>,
    },
    /// Return an item into the nearest empty slot
    Return,
    /// Capture the current encoder reading as zero
    Zero,
    /// Write a runtime parameter
    SetParam {
        /// Parameter to write
        name: ParamName,
        /// New value
        value: String,
    },
    /// Override the occupancy of one slot
    SetSlot {
        /// Slot index
        index: u8,
        /// New occupancy
        state: SlotState,
    },
    /// Print status events for a while
    Listen {
        /// How long to listen
        #[arg(long, default_value_t = 5)]
        seconds: u64,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ParamName {
    StepsPerRev,
    DegPerSec,
    DirCwHigh,
    Spokes,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SlotState {
    Filled,
    Empty,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = run() {
        error!("spoke_ctl failed: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    setup_tracing(&args);

    let bus = UdpBus::bind(args.bind, args.peers.clone())?;
    let mut client = BusClient::new(bus);
    let json = args.json;
    let mut on_event = |device: u8, reply: Reply| print_reply(device, &reply, json, "event");

    let command = match args.action {
        Action::Listen { seconds } => {
            info!("Listening for {}s", seconds);
            client.listen(Duration::from_secs(seconds), &mut on_event)?;
            return Ok(());
        }
        Action::Status => Command::GetStatus,
        Action::Dispense { slot: None } => Command::DispenseNearest,
        Action::Dispense { slot: Some(index) } => Command::DispenseToSlot(index),
        Action::Return => Command::ReturnNearest,
        Action::Zero => Command::SetZeroHere,
        Action::SetParam { name, value } => Command::SetParameter(parse_parameter(name, &value)?),
        Action::SetSlot { index, state } => Command::SetSlot {
            index,
            filled: matches!(state, SlotState::Filled),
        },
    };

    let timeout = Duration::from_millis(args.timeout_ms);
    info!("Sending {:?} to device {}", command, args.device);
    let reply = client.request(args.device, &command, timeout, &mut on_event)?;
    print_reply(args.device, &reply, json, "reply");

    if reply.ok() == Some(false) || reply == Reply::Error {
        return Err(format!("device {} refused {:?}", args.device, command).into());
    }
    Ok(())
}

fn parse_parameter(name: ParamName, value: &str) -> Result<Parameter, Box<dyn std::error::Error>> {
    Ok(match name {
        ParamName::StepsPerRev => Parameter::StepsPerRev(value.parse()?),
        ParamName::DegPerSec => Parameter::DegPerSec(value.parse()?),
        ParamName::DirCwHigh => Parameter::DirCwHigh(value.parse()?),
        ParamName::Spokes => Parameter::SpokeCount(value.parse()?),
    })
}

fn print_reply(device: u8, reply: &Reply, json: bool, kind: &str) {
    match reply {
        Reply::Status(status) if json => match serde_json::to_string(status) {
            Ok(text) => println!("{}", text),
            Err(e) => error!("JSON encoding failed: {}", e),
        },
        Reply::Status(status) => {
            let slots: String = (0..status.spoke_count)
                .map(|i| if status.is_filled(i) { '1' } else { '0' })
                .collect();
            println!(
                "{} from {}: window={} slots={} N={} spr={} dirCWHigh={}",
                kind,
                device,
                status.window_index,
                slots,
                status.spoke_count,
                status.steps_per_rev,
                u8::from(status.dir_cw_high)
            );
        }
        other => println!("{} from {}: {:?}", kind, device, other),
    }
}

/// Setup tracing subscriber based on CLI arguments.
fn setup_tracing(args: &Args) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
