//! Supervisory request/reply helper.
//!
//! A request transmits one command frame and then polls the bus until the
//! addressed device answers or the deadline passes. There is no retry: a
//! timeout leaves the outcome indeterminate and the caller decides whether
//! to re-issue.

use super::{Bus, RequestError};
use crate::protocol::{Command, Opcode, Reply, ReplyCode, device_of_reply, reply_id};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Default pause between empty polls.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Reply code a node answers `opcode` with on success or refusal.
pub fn expected_reply(opcode: Opcode) -> ReplyCode {
    match opcode {
        Opcode::DispenseNearest => ReplyCode::DispenseNearest,
        Opcode::ReturnNearest => ReplyCode::ReturnNearest,
        Opcode::SetZeroHere => ReplyCode::SetZero,
        Opcode::SetParameter => ReplyCode::SetParameter,
        Opcode::SetSlot => ReplyCode::SetSlot,
        Opcode::GetStatus => ReplyCode::Status,
        Opcode::DispenseToSlot => ReplyCode::DispenseToSlot,
        Opcode::GantryHome | Opcode::GantryMoveTo | Opcode::GantryClamp => ReplyCode::GantryAck,
    }
}

/// Request/reply client over any [`Bus`].
pub struct BusClient<B: Bus> {
    bus: B,
    poll_interval: Duration,
}

impl<B: Bus> BusClient<B> {
    /// Wrap a bus endpoint.
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Override the pause between empty polls.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Borrow the underlying bus.
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Send `command` to `device` and wait up to `timeout` for its reply.
    ///
    /// Frames from other devices, and frames from `device` that do not
    /// answer this command (such as status events), go to `events` as
    /// `(device id, reply)`.
    ///
    /// # Errors
    /// - `TransmitFailure` if the bus refused the frame
    /// - `Timeout` if no matching reply arrived in time
    /// - `Decode` if the command cannot be encoded or the reply is garbled
    /// - `Receive` on transport failure while waiting
    pub fn request(
        &mut self,
        device: u8,
        command: &Command,
        timeout: Duration,
        events: &mut dyn FnMut(u8, Reply),
    ) -> Result<Reply, RequestError> {
        let frame = command.to_frame(device)?;
        let expected = expected_reply(command.opcode());
        let reply_to = reply_id(device);

        self.bus
            .try_send(&frame)
            .map_err(RequestError::TransmitFailure)?;
        debug!("tx device={} {:?}", device, command);

        let start = Instant::now();
        while start.elapsed() < timeout {
            let Some(frame) = self.bus.try_recv().map_err(RequestError::Receive)? else {
                std::thread::sleep(self.poll_interval);
                continue;
            };

            let Some(sender) = device_of_reply(frame.id()) else {
                trace!("ignoring command-range frame id={}", frame.id());
                continue;
            };

            if frame.id() == reply_to {
                let reply = Reply::from_frame(&frame)?;
                if reply.code() == expected || reply.code() == ReplyCode::Error {
                    debug!("rx device={} {:?} after {:?}", device, reply, start.elapsed());
                    return Ok(reply);
                }
                events(sender, reply);
                continue;
            }

            match Reply::from_frame(&frame) {
                Ok(reply) => events(sender, reply),
                Err(e) => warn!("Undecodable event from device {}: {}", sender, e),
            }
        }

        Err(RequestError::Timeout {
            device,
            waited: start.elapsed(),
        })
    }

    /// Collect unsolicited events for `duration`.
    pub fn listen(
        &mut self,
        duration: Duration,
        events: &mut dyn FnMut(u8, Reply),
    ) -> Result<(), RequestError> {
        let start = Instant::now();
        while start.elapsed() < duration {
            match self.bus.try_recv().map_err(RequestError::Receive)? {
                Some(frame) => {
                    if let Some(sender) = device_of_reply(frame.id()) {
                        match Reply::from_frame(&frame) {
                            Ok(reply) => events(sender, reply),
                            Err(e) => warn!("Undecodable event from device {}: {}", sender, e),
                        }
                    }
                }
                None => std::thread::sleep(self.poll_interval),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{Bus, LoopbackBus};
    use crate::protocol::{Frame, StatusSnapshot};
    use std::sync::atomic::Ordering;
    use std::thread;

    fn no_events() -> impl FnMut(u8, Reply) {
        |_, _| {}
    }

    #[test]
    fn times_out_without_responder() {
        let bus = LoopbackBus::new();
        let mut client = BusClient::new(bus.endpoint());
        let _silent = bus.endpoint();

        let result = client.request(
            4,
            &Command::GetStatus,
            Duration::from_millis(20),
            &mut no_events(),
        );
        assert!(matches!(result, Err(RequestError::Timeout { device: 4, .. })));
    }

    #[test]
    fn transmit_failure_is_reported() {
        let bus = LoopbackBus::new();
        let endpoint = bus.endpoint();
        endpoint.transmit_fault().store(true, Ordering::Relaxed);
        let mut client = BusClient::new(endpoint);

        let result = client.request(
            4,
            &Command::GetStatus,
            Duration::from_millis(20),
            &mut no_events(),
        );
        assert!(matches!(result, Err(RequestError::TransmitFailure(_))));
    }

    #[test]
    fn status_event_is_forwarded_not_taken_as_reply() {
        let bus = LoopbackBus::new();
        let mut client = BusClient::new(bus.endpoint());
        let mut responder = bus.endpoint();

        let handle = thread::spawn(move || {
            loop {
                if let Some(frame) = responder.try_recv().unwrap() {
                    assert_eq!(frame.data(), &[0x01]);
                    let status = Reply::Status(StatusSnapshot {
                        window_index: 0,
                        slot_bitmap: 0b11110,
                        spoke_count: 5,
                        steps_per_rev: 1600,
                        dir_cw_high: true,
                        device_id: 4,
                    });
                    responder.try_send(&status.to_frame(4).unwrap()).unwrap();
                    responder
                        .try_send(&Frame::new(107, &[0x80, 0, 0, 3, 0x06, 0x40, 1, 7]).unwrap())
                        .unwrap();
                    let ack = Reply::DispenseNearest { ok: true, window: 1 };
                    responder.try_send(&ack.to_frame(4).unwrap()).unwrap();
                    break;
                }
                thread::sleep(Duration::from_millis(1));
            }
        });

        let mut seen = Vec::new();
        let reply = client
            .request(
                4,
                &Command::DispenseNearest,
                Duration::from_secs(2),
                &mut |dev, reply| seen.push((dev, reply.code())),
            )
            .unwrap();
        handle.join().unwrap();

        assert_eq!(reply, Reply::DispenseNearest { ok: true, window: 1 });
        assert_eq!(seen, vec![(4, ReplyCode::Status), (7, ReplyCode::Status)]);
    }

    #[test]
    fn expected_reply_table() {
        assert_eq!(expected_reply(Opcode::GetStatus), ReplyCode::Status);
        assert_eq!(expected_reply(Opcode::SetSlot), ReplyCode::SetSlot);
        assert_eq!(expected_reply(Opcode::GantryClamp), ReplyCode::GantryAck);
    }
}
