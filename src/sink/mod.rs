//! Input sink - where decoded pad state ends up
//!
//! A sink owns one logical input device per pad slot. The bus registers the
//! slots once at startup, then reports buttons and axes per slot and closes
//! each sample with [`InputSink::sync`].
//!
//! ```text
//! PadBus ──► report_button / report_axis ──► sync ──► consumer
//!              (per slot, accumulated)        (one unit)
//! ```

pub mod channel;
pub mod recording;

pub use channel::{ChannelSink, InputEvent, PadReport};
pub use recording::{RecordedEvent, RecordingSink};

use crate::pads::types::{Axis, Button};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable identity a slot is registered with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotIdentity {
    pub slot: usize,
    pub name: String,
    /// Device path presented to userspace, `input_<slot>`
    pub phys: String,
    pub vendor: u16,
    pub product: u16,
    pub version: u16,
}

impl SlotIdentity {
    pub fn new(slot: usize, name: &str) -> Self {
        Self {
            slot,
            name: name.to_string(),
            phys: format!("input_{}", slot),
            vendor: 0x0001,
            product: 1,
            version: 0x0100,
        }
    }
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Could not register device no {slot}: {reason}")]
    RegistrationError { slot: usize, reason: String },
}

/// Consumer of decoded pad state
pub trait InputSink: Send {
    fn register(&mut self, identity: &SlotIdentity) -> Result<(), SinkError>;

    fn unregister(&mut self, slot: usize);

    fn report_button(&mut self, slot: usize, button: Button, pressed: bool);

    /// `value` is -1, 0 or 1
    fn report_axis(&mut self, slot: usize, axis: Axis, value: i8);

    /// Mark the reports since the last sync of `slot` as one sample
    fn sync(&mut self, slot: usize);
}
