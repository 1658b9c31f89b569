//! Sink that records every call, for tests and dry runs

use super::{InputSink, SinkError, SlotIdentity};
use crate::pads::types::{Axis, Button};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedEvent {
    Registered(usize),
    Unregistered(usize),
    Button(usize, Button, bool),
    Axis(usize, Axis, i8),
    Sync(usize),
}

impl RecordedEvent {
    pub fn slot(&self) -> usize {
        match self {
            RecordedEvent::Registered(slot)
            | RecordedEvent::Unregistered(slot)
            | RecordedEvent::Button(slot, _, _)
            | RecordedEvent::Axis(slot, _, _)
            | RecordedEvent::Sync(slot) => *slot,
        }
    }
}

#[derive(Debug, Default)]
struct Recording {
    events: Vec<RecordedEvent>,
    fail_registration: Option<usize>,
}

/// Clones share one recording
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    inner: Arc<Mutex<Recording>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Recording> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Refuse the registration of `slot`
    pub fn fail_registration_at(&self, slot: usize) {
        self.lock().fail_registration = Some(slot);
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.lock().events.clone()
    }

    pub fn events_for(&self, slot: usize) -> Vec<RecordedEvent> {
        self.lock()
            .events
            .iter()
            .filter(|e| e.slot() == slot)
            .cloned()
            .collect()
    }

    /// Return and forget everything recorded so far
    pub fn take_events(&self) -> Vec<RecordedEvent> {
        std::mem::take(&mut self.lock().events)
    }

    pub fn sync_count(&self, slot: usize) -> usize {
        self.lock()
            .events
            .iter()
            .filter(|e| **e == RecordedEvent::Sync(slot))
            .count()
    }
}

impl InputSink for RecordingSink {
    fn register(&mut self, identity: &SlotIdentity) -> Result<(), SinkError> {
        let mut recording = self.lock();
        if recording.fail_registration == Some(identity.slot) {
            return Err(SinkError::RegistrationError {
                slot: identity.slot,
                reason: "refused by recording sink".to_string(),
            });
        }
        recording.events.push(RecordedEvent::Registered(identity.slot));
        Ok(())
    }

    fn unregister(&mut self, slot: usize) {
        self.lock().events.push(RecordedEvent::Unregistered(slot));
    }

    fn report_button(&mut self, slot: usize, button: Button, pressed: bool) {
        self.lock()
            .events
            .push(RecordedEvent::Button(slot, button, pressed));
    }

    fn report_axis(&mut self, slot: usize, axis: Axis, value: i8) {
        self.lock().events.push(RecordedEvent::Axis(slot, axis, value));
    }

    fn sync(&mut self, slot: usize) {
        self.lock().events.push(RecordedEvent::Sync(slot));
    }
}
