//! GPIO backend abstraction for the pad bus
//!
//! The pad bus only needs a handful of pin-level operations: drive the clock
//! and latch lines, switch pin directions, enable pull-ups and read every
//! line at once. Those operations are collected in [`GpioBackend`] so the
//! bus can run on real hardware ([`RppalGpio`]) or on a scripted bus
//! ([`SimulatedGpio`]).
//!
//! All line state is exchanged as a [`PinMask`] where bit `n` stands for
//! GPIO `n`.

pub mod rppal_backend;
pub mod simulated;

pub use rppal_backend::RppalGpio;
pub use simulated::{SimulatedGpio, SimulatedOp};

use thiserror::Error;

/// Bit vector over all GPIO lines, bit `n` is GPIO `n`
pub type PinMask = u32;

/// All GPIOs available on the Raspberry Pi P1 header
pub const VALID_PINS: [u8; 28] = [
    0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25,
    26, 27,
];

/// Returns true if `pin` may be used by the driver
pub fn pin_valid(pin: u8) -> bool {
    VALID_PINS.contains(&pin)
}

/// The mask bit that GPIO `pin` occupies in a [`PinMask`]
pub fn pin_bit(pin: u8) -> PinMask {
    1 << pin
}

/// Iterates over the GPIO numbers whose bits are set in `mask`
pub fn pins_in(mask: PinMask) -> impl Iterator<Item = u8> {
    (0..32u8).filter(move |pin| mask & (1 << pin) != 0)
}

#[derive(Debug, Error)]
pub enum GpioError {
    #[error("Failed to open GPIO controller: {0}")]
    InitializationError(String),

    #[error("Failed to acquire GPIO {pin}: {reason}")]
    PinUnavailable { pin: u8, reason: String },

    #[error("GPIO {0} has not been configured")]
    PinNotConfigured(u8),
}

/// Pin-level access to the GPIO controller
///
/// Direction and pull-up changes may fail because they acquire the pin.
/// Once a pin is acquired, driving and sampling it can no longer fail, so
/// [`set`](GpioBackend::set), [`clear`](GpioBackend::clear) and
/// [`read_all`](GpioBackend::read_all) are infallible. The bit-stream reader
/// relies on that to keep the capture path free of error handling.
pub trait GpioBackend: Send {
    /// Drive every output line in `mask` high
    fn set(&mut self, mask: PinMask);

    /// Drive every output line in `mask` low
    fn clear(&mut self, mask: PinMask);

    fn configure_input(&mut self, pin: u8) -> Result<(), GpioError>;

    fn configure_output(&mut self, pin: u8) -> Result<(), GpioError>;

    fn enable_pullup(&mut self, pin: u8) -> Result<(), GpioError>;

    /// Sample all lines. A set bit means the line currently reads LOW.
    ///
    /// The pads pull their data lines low for a pressed button, so negating
    /// here makes "bit set" mean "active" everywhere downstream.
    fn read_all(&mut self) -> PinMask;
}
