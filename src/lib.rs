//! snescon - NES/SNES gamepad driver for shift-register pads on GPIO
//!
//! Up to five NES or SNES pads (or four behind a FourScore adapter) share one
//! clock and one latch line, each pad on its own data line. A poll task
//! clocks the bus at a fixed interval, decodes every line and reports the
//! result to an [`sink::InputSink`] while at least one consumer is attached.

pub mod config;
pub mod driver;
pub mod gpio;
pub mod pads;
pub mod poller;
pub mod sink;

pub use config::{DriverConfig, FourScoreFlag};
pub use driver::{Driver, DriverError};
