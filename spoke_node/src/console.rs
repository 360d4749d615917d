//! Line-oriented debug console.
//!
//! Informational commands for bench work. Lines arrive over a channel (the
//! binary feeds it from stdin) and are answered with plain text.
//!
//! ```text
//! help          list commands
//! stat          one-line summary
//! slots         per-slot occupancy
//! angle         raw reading, zero and single-turn angle
//! zero          capture the current reading as zero
//! test <deg>    rotate by <deg> wheel degrees, inventory untouched
//! disp          dispense nearest
//! ret           return nearest
//! mode [cw|bi]  show or switch the routing mode
//! json          status snapshot as JSON
//! ```

use crate::drum::OPEN_INDEX;
use crate::error::{NodeError, OperationError};
use crate::node::NodeContext;
use std::io::Write;
use std::sync::mpsc::{Receiver, TryRecvError};
use tracing::debug;

const HELP: &str = "commands: help, stat, slots, angle, zero, test <deg>, disp, ret, mode [cw|bi], json";

/// Console input and output.
pub struct Console {
    input: Receiver<String>,
    output: Box<dyn Write + Send>,
}

impl Console {
    /// Console reading lines from `input` and writing answers to `output`.
    pub fn new(input: Receiver<String>, output: Box<dyn Write + Send>) -> Self {
        Self { input, output }
    }

    /// Answer at most one pending line.
    ///
    /// Returns `Ok(false)` once the input side has hung up.
    pub fn service(&mut self, ctx: &mut NodeContext) -> Result<bool, NodeError> {
        let line = match self.input.try_recv() {
            Ok(line) => line,
            Err(TryRecvError::Empty) => return Ok(true),
            Err(TryRecvError::Disconnected) => return Ok(false),
        };
        let answer = execute(ctx, &line)?;
        if !answer.is_empty() {
            if let Err(e) = writeln!(self.output, "{}", answer).and_then(|_| self.output.flush()) {
                debug!("Console write failed: {}", e);
            }
        }
        Ok(true)
    }
}

/// Run one console line against the node and return the answer.
///
/// # Errors
/// Only a persistence failure, which is fatal to the node.
pub fn execute(ctx: &mut NodeContext, line: &str) -> Result<String, NodeError> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(String::new());
    };

    let answer = match command.to_ascii_lowercase().as_str() {
        "help" => HELP.to_string(),
        "stat" => stat(ctx),
        "slots" => slots(ctx),
        "angle" => {
            ctx.poll_encoder();
            let enc = ctx.encoder();
            format!(
                "raw {} zero {} angle {:.2}° multi-turn {}",
                enc.last_raw(),
                enc.zero_raw(),
                enc.angle_degrees(),
                enc.multi_turn()
            )
        }
        "zero" => match ctx.set_zero_here() {
            Ok(zero) => format!("zero set to raw {}", zero),
            Err(OperationError::Persistence(e)) => return Err(e.into()),
            Err(e) => format!("zero failed: {}", e),
        },
        "test" => match words.next().map(str::parse::<f32>) {
            Some(Ok(degrees)) => match ctx.test_move(degrees) {
                Ok(report) => format!(
                    "moved {:.2}°: {} steps, expected {} ticks, measured {}",
                    degrees, report.steps, report.expected_ticks, report.actual_ticks
                ),
                Err(e) => format!("move failed: {}", e),
            },
            _ => "usage: test <deg>".to_string(),
        },
        "disp" => match ctx.dispense_nearest() {
            Ok(window) => format!("dispensed, window {}", window),
            Err(OperationError::Persistence(e)) => return Err(e.into()),
            Err(e) => format!("dispense failed: {}", e),
        },
        "ret" => match ctx.return_nearest() {
            Ok(window) => format!("returned, window {}", window),
            Err(OperationError::Persistence(e)) => return Err(e.into()),
            Err(e) => format!("return failed: {}", e),
        },
        "mode" => {
            match words.next() {
                Some("cw") => ctx.set_clockwise_only(true),
                Some("bi") => ctx.set_clockwise_only(false),
                Some(other) => return Ok(format!("unknown mode '{}', use cw or bi", other)),
                None => {}
            }
            format!(
                "mode {}",
                if ctx.clockwise_only() { "cw" } else { "bi" }
            )
        }
        "json" => serde_json::to_string(&ctx.status())
            .unwrap_or_else(|e| format!("json encoding failed: {}", e)),
        other => format!("unknown command '{}', try 'help'", other),
    };
    Ok(answer)
}

fn stat(ctx: &NodeContext) -> String {
    let drum = ctx.drum();
    let motion = ctx.motion();
    format!(
        "dev {} | N={} window={} filled={} | spr={} {:.1}°/s dirCWHigh={} | {:?}",
        ctx.device_id(),
        drum.spoke_count(),
        drum.window_index(),
        drum.filled_count(),
        motion.steps_per_rev,
        motion.deg_per_sec,
        u8::from(motion.dir_cw_high),
        ctx.state()
    )
}

fn slots(ctx: &NodeContext) -> String {
    let drum = ctx.drum();
    drum.slots()
        .iter()
        .enumerate()
        .map(|(i, filled)| {
            let marker = if i == usize::from(drum.window_index()) { "*" } else { "" };
            let state = if i == usize::from(OPEN_INDEX) {
                "open"
            } else if *filled {
                "filled"
            } else {
                "empty"
            };
            format!("{}{}:{}", marker, i, state)
        })
        .collect::<Vec<_>>()
        .join(" ")
}
