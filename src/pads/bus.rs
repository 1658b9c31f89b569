//! Pad bus with statum state machine for bring-up
//!
//! The bus owns the GPIO backend, the input sink and the per-slot state.
//! Bring-up happens in two fallible steps with compile-time state safety:
//!
//! ```text
//! Configured ──register_slots──► Registered ──setup_gpio──► Ready ──teardown──► (dropped)
//!      │                              │
//!      └──── error: roll back ◄───────┘
//! ```
//!
//! Only a `PadBus<Ready>` can be polled. Every failure on the way up
//! unregisters the slots registered so far and drops the backend, which
//! releases the pins.

use super::decoder::{BusMode, Decoder};
use super::multiplexer::{DeviceSlot, Multiplexer};
use super::reader::BitStreamReader;
use crate::config::FourScoreFlag;
use crate::gpio::{pin_bit, GpioBackend, GpioError};
use crate::sink::{InputSink, SinkError, SlotIdentity};
use statum::{machine, state};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info};

/// Data lines that get the internal pull-up; later lines are driven
/// externally
const PULLED_UP_DATA_LINES: usize = 3;

/// Pin assignment and timing of one bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusLayout {
    pub clock: u8,
    pub latch: u8,
    pub data_lines: Vec<u8>,
    /// Registered pad slots, at least one per data line
    pub slots: usize,
    pub device_name: String,
    pub bit_delay: Duration,
}

#[derive(Debug, Error)]
pub enum BusError {
    #[error("Setup of input device failed: {0}")]
    RegistrationError(#[from] SinkError),

    #[error("Setup of GPIO pins failed: {0}")]
    GpioError(#[from] GpioError),
}

/// What one poll cycle did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleOutcome {
    pub mode: BusMode,
    pub player_mode: usize,
    pub cleared: Vec<usize>,
}

#[state]
#[derive(Debug, Clone)]
pub enum PadBusState {
    Configured,
    Registered,
    Ready,
}

#[machine]
pub struct PadBus<S: PadBusState> {
    layout: BusLayout,
    gpio: Box<dyn GpioBackend>,
    sink: Box<dyn InputSink>,
    reader: BitStreamReader,
    decoder: Decoder,
    multiplexer: Multiplexer,
    fourscore: FourScoreFlag,
    registered: Vec<usize>,
}

impl<S: PadBusState> PadBus<S> {
    pub fn layout(&self) -> &BusLayout {
        &self.layout
    }

    pub fn fourscore_flag(&self) -> FourScoreFlag {
        self.fourscore.clone()
    }

    /// Slots currently registered with the sink
    pub fn registered_slots(&self) -> &[usize] {
        &self.registered
    }

    fn unregister_all(&mut self) {
        for slot in self.registered.drain(..) {
            debug!("Unregistering slot {}", slot);
            self.sink.unregister(slot);
        }
    }
}

impl PadBus<Configured> {
    pub fn create(
        layout: BusLayout,
        gpio: Box<dyn GpioBackend>,
        sink: Box<dyn InputSink>,
        fourscore: FourScoreFlag,
    ) -> Self {
        info!(
            "Creating pad bus: clock {}, latch {}, data lines {:?}, {} slots",
            layout.clock, layout.latch, layout.data_lines, layout.slots
        );

        let reader = BitStreamReader::new(
            pin_bit(layout.clock),
            pin_bit(layout.latch),
            layout.bit_delay,
        );
        let decoder = Decoder::new(
            layout.data_lines.iter().map(|pin| pin_bit(*pin)).collect(),
            layout.slots,
        );
        let multiplexer = Multiplexer::new(layout.slots);

        Self::new(
            layout,
            gpio,
            sink,
            reader,
            decoder,
            multiplexer,
            fourscore,
            Vec::new(), // registered
        )
    }

    /// Register one input device per slot
    ///
    /// Stops at the first failure, unregisters the slots already registered
    /// and releases the backend.
    pub fn register_slots(mut self) -> Result<PadBus<Registered>, BusError> {
        for slot in 0..self.layout.slots {
            let identity = SlotIdentity::new(slot, &self.layout.device_name);
            match self.sink.register(&identity) {
                Ok(()) => {
                    debug!("Registered {} ({})", identity.name, identity.phys);
                    self.registered.push(slot);
                }
                Err(e) => {
                    error!("Could not register device no {}: {}", slot, e);
                    self.unregister_all();
                    return Err(e.into());
                }
            }
        }

        info!("Registered {} pad slots", self.registered.len());
        Ok(self.transition())
    }
}

impl PadBus<Registered> {
    /// Clock and latch become outputs, data lines inputs
    pub fn setup_gpio(mut self) -> Result<PadBus<Ready>, BusError> {
        if let Err(e) = self.configure_pins() {
            error!("Setup of the gpio pins failed: {}", e);
            self.unregister_all();
            return Err(e.into());
        }

        info!("GPIO pins configured, pad bus ready");
        Ok(self.transition())
    }

    fn configure_pins(&mut self) -> Result<(), GpioError> {
        self.gpio.configure_output(self.layout.clock)?;
        self.gpio.configure_output(self.layout.latch)?;

        for (line, pin) in self.layout.data_lines.iter().enumerate() {
            self.gpio.configure_input(*pin)?;
            if line < PULLED_UP_DATA_LINES {
                self.gpio.enable_pullup(*pin)?;
            }
        }
        Ok(())
    }
}

impl PadBus<Ready> {
    /// Capture, decode and dispatch one frame
    pub fn update(&mut self) -> CycleOutcome {
        let frame = self.reader.capture_frame(self.gpio.as_mut());
        let decoded = self.decoder.decode(&frame, self.fourscore.is_enabled());
        let cleared = self.multiplexer.apply(&decoded, self.sink.as_mut());

        CycleOutcome {
            mode: decoded.mode,
            player_mode: self.multiplexer.player_mode(),
            cleared,
        }
    }

    pub fn player_mode(&self) -> usize {
        self.multiplexer.player_mode()
    }

    pub fn slots(&self) -> &[DeviceSlot] {
        self.multiplexer.slots()
    }

    /// Unregister every slot and release the backend
    pub fn teardown(mut self) {
        info!("Tearing down pad bus");
        self.unregister_all();
    }
}
