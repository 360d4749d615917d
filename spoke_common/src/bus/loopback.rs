//! In-process bus.
//!
//! All endpoints share one hub. A frame sent by one endpoint is queued for
//! every other live endpoint, never echoed back to the sender.

use super::{Bus, BusError};
use crate::protocol::Frame;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Frames kept per endpoint before the oldest are dropped.
const QUEUE_DEPTH: usize = 256;

#[derive(Debug, Default)]
struct Hub {
    queues: Vec<Option<VecDeque<Frame>>>,
}

/// Handle to an in-process bus; cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct LoopbackBus {
    hub: Arc<Mutex<Hub>>,
}

impl LoopbackBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new endpoint.
    pub fn endpoint(&self) -> LoopbackEndpoint {
        let mut hub = self.hub.lock();
        let slot = hub.queues.len();
        hub.queues.push(Some(VecDeque::new()));
        LoopbackEndpoint {
            hub: Arc::clone(&self.hub),
            slot,
            fail_transmit: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Number of attached endpoints.
    pub fn endpoint_count(&self) -> usize {
        self.hub.lock().queues.iter().filter(|q| q.is_some()).count()
    }
}

/// One participant on a [`LoopbackBus`].
#[derive(Debug)]
pub struct LoopbackEndpoint {
    hub: Arc<Mutex<Hub>>,
    slot: usize,
    fail_transmit: Arc<AtomicBool>,
}

impl LoopbackEndpoint {
    /// Shared switch that makes `try_send` fail while set (fault injection).
    pub fn transmit_fault(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.fail_transmit)
    }
}

impl Bus for LoopbackEndpoint {
    fn try_send(&mut self, frame: &Frame) -> Result<(), BusError> {
        if self.fail_transmit.load(Ordering::Relaxed) {
            return Err(BusError::TransmitFailure(format!(
                "endpoint {} transmit disabled",
                self.slot
            )));
        }

        let mut hub = self.hub.lock();
        for (slot, queue) in hub.queues.iter_mut().enumerate() {
            if slot == self.slot {
                continue;
            }
            if let Some(queue) = queue {
                if queue.len() >= QUEUE_DEPTH {
                    queue.pop_front();
                }
                queue.push_back(frame.clone());
            }
        }
        Ok(())
    }

    fn try_recv(&mut self) -> Result<Option<Frame>, BusError> {
        let mut hub = self.hub.lock();
        Ok(hub
            .queues
            .get_mut(self.slot)
            .and_then(|q| q.as_mut())
            .and_then(|q| q.pop_front()))
    }
}

impl Drop for LoopbackEndpoint {
    fn drop(&mut self) {
        if let Some(queue) = self.hub.lock().queues.get_mut(self.slot) {
            *queue = None;
        }
    }
}
