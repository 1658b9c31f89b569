use super::{InputSink, SinkError, SlotIdentity};
use crate::pads::types::{Axis, Button, PadState};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

/// One synced sample of a slot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PadReport {
    pub slot: usize,
    pub state: PadState,
    pub timestamp: DateTime<Local>,
}

// Events delivered to the consumer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum InputEvent {
    Attached(SlotIdentity),
    Report(PadReport),
    Detached { slot: usize },
}

/// Sink that forwards synced samples over a tokio channel
///
/// Reports accumulate per slot and become one [`PadReport`] on
/// [`sync`](InputSink::sync). Sending never waits, the poll path must not
/// block. While the channel is full, attach/detach events queue up in order
/// and each slot keeps only its newest undelivered report. Everything queued
/// goes out, oldest first, as soon as the consumer makes room, so the last
/// sample of a slot (a clear included) always reaches the consumer.
pub struct ChannelSink {
    sender: mpsc::Sender<InputEvent>,
    pending: BTreeMap<usize, PadState>,
    lifecycle: VecDeque<InputEvent>,
    unsent: BTreeMap<usize, PadReport>,
    dropped: u64,
}

impl ChannelSink {
    pub fn new(sender: mpsc::Sender<InputEvent>) -> Self {
        Self {
            sender,
            pending: BTreeMap::new(),
            lifecycle: VecDeque::new(),
            unsent: BTreeMap::new(),
            dropped: 0,
        }
    }

    /// Create a sink together with the receiving end
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<InputEvent>) {
        let (sender, receiver) = mpsc::channel(capacity);
        debug!("Created input event channel with buffer capacity {}", capacity);
        (Self::new(sender), receiver)
    }

    /// Reports replaced by a newer sample before delivery, or lost to a
    /// closed channel
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Events waiting for room in the channel
    pub fn backlog(&self) -> usize {
        self.lifecycle.len() + self.unsent.len()
    }

    fn count_dropped(&mut self, count: u64, reason: &str) {
        for _ in 0..count {
            self.dropped += 1;
            // Only log the first drop and then every 1000th
            if self.dropped % 1000 == 1 {
                warn!(
                    "Input report dropped ({} dropped so far): {}",
                    self.dropped, reason
                );
            }
        }
    }

    /// Send queued events until the channel is full
    fn flush(&mut self) {
        loop {
            if self.lifecycle.is_empty() && self.unsent.is_empty() {
                return;
            }

            let permit = match self.sender.try_reserve() {
                Ok(permit) => permit,
                Err(TrySendError::Full(())) => return,
                Err(TrySendError::Closed(())) => break,
            };

            let event = match self.lifecycle.pop_front() {
                Some(event) => event,
                None => match self.unsent.pop_first() {
                    Some((_, report)) => InputEvent::Report(report),
                    None => return,
                },
            };
            permit.send(event);
        }

        // Consumer is gone
        let lost = self.unsent.len() as u64;
        self.unsent.clear();
        self.lifecycle.clear();
        self.count_dropped(lost, "event channel closed");
    }
}

impl InputSink for ChannelSink {
    fn register(&mut self, identity: &SlotIdentity) -> Result<(), SinkError> {
        if self.sender.is_closed() {
            return Err(SinkError::RegistrationError {
                slot: identity.slot,
                reason: "event channel closed".to_string(),
            });
        }

        self.pending.insert(identity.slot, PadState::default());
        info!(
            "Registered {} as {} (slot {})",
            identity.name, identity.phys, identity.slot
        );
        self.lifecycle.push_back(InputEvent::Attached(identity.clone()));
        self.flush();
        Ok(())
    }

    fn unregister(&mut self, slot: usize) {
        if self.pending.remove(&slot).is_some() {
            info!("Unregistered slot {}", slot);
            // Queued reports first, the detach closes the slot
            self.flush();
            self.unsent.remove(&slot);
            self.lifecycle.push_back(InputEvent::Detached { slot });
            self.flush();
        }
    }

    fn report_button(&mut self, slot: usize, button: Button, pressed: bool) {
        if let Some(state) = self.pending.get_mut(&slot) {
            state.buttons.set(button, pressed);
        }
    }

    fn report_axis(&mut self, slot: usize, axis: Axis, value: i8) {
        if let Some(state) = self.pending.get_mut(&slot) {
            state.set_axis(axis, value);
        }
    }

    fn sync(&mut self, slot: usize) {
        let Some(state) = self.pending.get(&slot).copied() else {
            debug!("Sync for unregistered slot {} ignored", slot);
            return;
        };

        // Older samples go out before this one
        self.flush();
        let report = PadReport {
            slot,
            state,
            timestamp: Local::now(),
        };
        if self.unsent.insert(slot, report).is_some() {
            self.count_dropped(1, "event channel full, replaced by a newer sample");
        }
        self.flush();
    }
}
