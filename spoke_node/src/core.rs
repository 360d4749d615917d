//! NodeCore struct and cooperative loop.
//!
//! One iteration of [`NodeCore::step`]:
//!
//! 1. Take at most one frame from the bus and reply to it
//! 2. Answer at most one console line
//! 3. Refresh the encoder every `encoder_poll_ms`
//! 4. Emit status events (periodic and after state changes)
//!
//! [`NodeCore::run`] repeats this at `loop_tick_us` until the running flag
//! is cleared or a fatal error occurs. A move blocks the loop for its whole
//! duration.

use crate::console::Console;
use crate::dispatcher::Dispatcher;
use crate::error::NodeError;
use crate::node::NodeContext;
use spoke_common::bus::{Bus, BusError};
use spoke_common::node::config::NodeSection;
use spoke_common::protocol::Reply;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Loop timing taken from `[node]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSettings {
    /// Target iteration period.
    pub tick: Duration,
    /// Encoder refresh period while idle.
    pub encoder_poll: Duration,
    /// Period of unsolicited status events; `None` disables them.
    pub status_interval: Option<Duration>,
    /// Emit a status event after every persisted change.
    pub announce_changes: bool,
}

impl From<&NodeSection> for LoopSettings {
    fn from(node: &NodeSection) -> Self {
        Self {
            tick: Duration::from_micros(node.loop_tick_us),
            encoder_poll: Duration::from_millis(node.encoder_poll_ms),
            status_interval: (node.status_interval_ms > 0)
                .then(|| Duration::from_millis(node.status_interval_ms)),
            announce_changes: node.announce_changes,
        }
    }
}

/// Loop counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    /// Iterations executed.
    pub iterations: u64,
    /// Frames taken from the bus.
    pub frames_received: u64,
    /// Frames that failed to decode at the transport.
    pub malformed_frames: u64,
    /// Replies transmitted.
    pub replies_sent: u64,
    /// Unsolicited status events transmitted.
    pub events_sent: u64,
    /// Frames the bus refused to send.
    pub transmit_failures: u64,
    /// Longest iteration observed.
    pub max_iteration_us: u64,
}

/// Owns one node and services its bus.
pub struct NodeCore<B: Bus> {
    ctx: NodeContext,
    dispatcher: Dispatcher,
    bus: B,
    console: Option<Console>,
    running: Arc<AtomicBool>,
    settings: LoopSettings,
    stats: LoopStats,
    last_encoder_poll: Instant,
    last_status: Instant,
    announced_revision: u64,
}

impl<B: Bus> NodeCore<B> {
    /// Create a core around a booted node.
    pub fn new(ctx: NodeContext, bus: B, settings: LoopSettings) -> Self {
        info!(
            "NodeCore created for device {} (tick={}us, status every {:?})",
            ctx.device_id(),
            settings.tick.as_micros(),
            settings.status_interval
        );
        let now = Instant::now();
        let announced_revision = ctx.revision();
        Self {
            ctx,
            dispatcher: Dispatcher::new(),
            bus,
            console: None,
            running: Arc::new(AtomicBool::new(true)),
            settings,
            stats: LoopStats::default(),
            last_encoder_poll: now,
            last_status: now,
            announced_revision,
        }
    }

    /// Attach a debug console.
    pub fn with_console(mut self, console: Console) -> Self {
        self.console = Some(console);
        self
    }

    /// Get the running flag for signal handlers.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// The node served by this core.
    pub fn context(&self) -> &NodeContext {
        &self.ctx
    }

    /// Dispatcher counters.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Loop counters.
    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    /// Run until the running flag is cleared.
    ///
    /// # Errors
    /// Returns the fatal error that stopped the loop.
    pub fn run(&mut self) -> Result<(), NodeError> {
        info!("Node {} loop started", self.ctx.device_id());

        while self.running.load(Ordering::SeqCst) {
            let started = Instant::now();
            self.step()?;

            let elapsed = started.elapsed();
            self.stats.max_iteration_us = self
                .stats
                .max_iteration_us
                .max(elapsed.as_micros() as u64);
            if elapsed < self.settings.tick {
                std::thread::sleep(self.settings.tick - elapsed);
            }

            if self.stats.iterations % 10_000 == 0 {
                debug!(
                    "Loop: {} iterations, {} frames, max={}us",
                    self.stats.iterations, self.stats.frames_received, self.stats.max_iteration_us
                );
            }
        }

        info!(
            "Node {} loop stopped after {} iterations ({} frames, {} replies)",
            self.ctx.device_id(),
            self.stats.iterations,
            self.stats.frames_received,
            self.stats.replies_sent
        );
        Ok(())
    }

    /// One loop iteration.
    pub fn step(&mut self) -> Result<(), NodeError> {
        self.stats.iterations += 1;

        match self.bus.try_recv() {
            Ok(Some(frame)) => {
                self.stats.frames_received += 1;
                debug!("rx id={} data={:02X?}", frame.id(), frame.data());
                if let Some(reply) = self.dispatcher.handle_frame(&mut self.ctx, &frame)? {
                    if self.transmit(&reply) {
                        self.stats.replies_sent += 1;
                    }
                }
            }
            Ok(None) => {}
            Err(BusError::Malformed(e)) => {
                warn!("Dropping malformed frame: {}", e);
                self.stats.malformed_frames += 1;
            }
            Err(e) => return Err(e.into()),
        }

        if let Some(console) = self.console.as_mut() {
            if !console.service(&mut self.ctx)? {
                info!("Console input closed");
                self.console = None;
            }
        }

        if self.last_encoder_poll.elapsed() >= self.settings.encoder_poll {
            self.ctx.poll_encoder();
            self.last_encoder_poll = Instant::now();
        }

        self.emit_events();
        Ok(())
    }

    fn emit_events(&mut self) {
        let periodic_due = self
            .settings
            .status_interval
            .is_some_and(|interval| self.last_status.elapsed() >= interval);
        let changed =
            self.settings.announce_changes && self.ctx.revision() != self.announced_revision;

        if periodic_due || changed {
            let status = Reply::Status(self.ctx.status());
            if self.transmit(&status) {
                self.stats.events_sent += 1;
            }
            self.last_status = Instant::now();
            self.announced_revision = self.ctx.revision();
        }
    }

    fn transmit(&mut self, reply: &Reply) -> bool {
        let frame = match reply.to_frame(self.ctx.device_id()) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Cannot encode {:?}: {}", reply, e);
                return false;
            }
        };
        match self.bus.try_send(&frame) {
            Ok(()) => {
                debug!("tx id={} data={:02X?}", frame.id(), frame.data());
                true
            }
            Err(e) => {
                warn!("Transmit failed: {}", e);
                self.stats.transmit_failures += 1;
                false
            }
        }
    }
}
