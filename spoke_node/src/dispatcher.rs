//! Command dispatcher.
//!
//! Turns one addressed bus frame into exactly one reply:
//!
//! | Command | Reply |
//! |---------|-------|
//! | dispense-nearest | `0x11` ok, window |
//! | dispense-to-slot | `0x12` ok, window |
//! | return-nearest | `0x13` ok, window |
//! | set-zero-here | `0x21` zero (BE) |
//! | set-parameter | `0x22` sub, ok |
//! | set-slot | `0x23` index, ok |
//! | get-status | `0x80` snapshot |
//! | gantry / undecodable | `0xFE` |
//!
//! Frames for other identifiers produce no reply. A refused or failed
//! operation is answered with `ok = 0`; only a persistence failure escapes
//! as a [`NodeError`].

use crate::error::{NodeError, OperationError};
use crate::node::NodeContext;
use spoke_common::protocol::{Command, Frame, Reply, command_id};
use tracing::{debug, warn};

/// Dispatcher counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Frames addressed to this node.
    pub commands: u64,
    /// Frames for other identifiers.
    pub ignored: u64,
    /// Frames answered with the error reply.
    pub rejected: u64,
    /// Operations answered with `ok = 0`.
    pub failed: u64,
}

/// Routes decoded commands to the node context.
#[derive(Debug, Default)]
pub struct Dispatcher {
    stats: DispatchStats,
}

impl Dispatcher {
    /// Create a dispatcher with zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters since creation.
    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    /// Handle one received frame.
    ///
    /// Returns `Ok(None)` for frames not addressed to this node.
    ///
    /// # Errors
    /// `NodeError::Persistence` when an operation succeeded but its state
    /// could not be written. The node must stop.
    pub fn handle_frame(
        &mut self,
        ctx: &mut NodeContext,
        frame: &Frame,
    ) -> Result<Option<Reply>, NodeError> {
        if frame.id() != command_id(ctx.device_id()) {
            self.stats.ignored += 1;
            return Ok(None);
        }

        match Command::from_frame(frame) {
            Ok(command) => self.execute(ctx, command).map(Some),
            Err(e) => {
                warn!("Rejected frame {:02X?}: {}", frame.data(), e);
                self.stats.commands += 1;
                self.stats.rejected += 1;
                Ok(Some(Reply::Error))
            }
        }
    }

    /// Execute a decoded command and build its reply.
    pub fn execute(
        &mut self,
        ctx: &mut NodeContext,
        command: Command,
    ) -> Result<Reply, NodeError> {
        self.stats.commands += 1;
        debug!("Executing {:?}", command);

        let reply = match command {
            Command::DispenseNearest => {
                let ok = self.settle(ctx.dispense_nearest())?;
                Reply::DispenseNearest {
                    ok,
                    window: ctx.drum().window_index(),
                }
            }
            Command::DispenseToSlot(index) => {
                let ok = self.settle(ctx.dispense_to_slot(index))?;
                Reply::DispenseToSlot {
                    ok,
                    window: ctx.drum().window_index(),
                }
            }
            Command::ReturnNearest => {
                let ok = self.settle(ctx.return_nearest())?;
                Reply::ReturnNearest {
                    ok,
                    window: ctx.drum().window_index(),
                }
            }
            Command::SetZeroHere => match ctx.set_zero_here() {
                Ok(zero) => Reply::Zero(zero),
                Err(e) => {
                    self.settle(Err::<(), _>(e))?;
                    Reply::Error
                }
            },
            Command::SetParameter(parameter) => Reply::Param {
                sub: parameter.sub_id(),
                ok: self.settle(ctx.set_parameter(parameter))?,
            },
            Command::SetSlot { index, filled } => Reply::Slot {
                index,
                ok: self.settle(ctx.set_slot(index, filled))?,
            },
            Command::GetStatus => Reply::Status(ctx.status()),
            Command::GantryHome | Command::GantryMoveTo { .. } | Command::GantryClamp(_) => {
                debug!("Gantry command {:?} not handled by a drum node", command);
                self.stats.rejected += 1;
                Reply::Error
            }
        };
        Ok(reply)
    }

    fn settle<T>(&mut self, result: Result<T, OperationError>) -> Result<bool, NodeError> {
        match result {
            Ok(_) => Ok(true),
            Err(OperationError::Persistence(e)) => Err(NodeError::Persistence(e)),
            Err(e) => {
                warn!("Operation failed: {}", e);
                self.stats.failed += 1;
                Ok(false)
            }
        }
    }
}
