//! Pad bus subsystem
//!
//! Implements the read-decode-dispatch pipeline for NES/SNES pads on a
//! shared shift-register bus:
//!
//! 1. [`reader`] - clocks the shift registers and captures a 24-sample frame
//! 2. [`decoder`] - classifies each data line (NES, SNES, FourScore) and
//!    extracts buttons and axes
//! 3. [`multiplexer`] - reconciles the player mode and clears dropped slots
//! 4. [`bus`] - owns the pieces and runs one cycle per poll
//!
//! # Architecture
//!
//! ```text
//! GPIO ──► Reader ──► Decoder ──► Multiplexer ──► InputSink
//!          (Frame)    (Readings)  (dispatch/clear)
//! ```

pub mod bus;
pub mod decoder;
pub mod multiplexer;
pub mod reader;
pub mod types;

pub use bus::{BusError, BusLayout, PadBus, PadBusState};
pub use decoder::{BusMode, Decoded, Decoder};
pub use multiplexer::{DeviceSlot, Multiplexer, PlayerMode};
pub use reader::BitStreamReader;
pub use types::{Axis, Button, ButtonSet, Frame, PadKind, PadReading, PadState};
