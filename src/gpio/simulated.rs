//! Scripted GPIO bus for tests and hardware-less runs
//!
//! [`SimulatedGpio`] behaves like a chain of shift registers: raising the
//! latch reloads the scripted frame, and every falling clock edge presents
//! the next sample on [`read_all`](GpioBackend::read_all). The most recent
//! [`OPS_LOG_CAPACITY`] operations are logged so tests can check the exact
//! clock/latch ordering.
//!
//! The handle is cheap to clone; clones share the same bus state, so a test
//! can keep one handle while the pad bus owns another.

use super::{GpioBackend, GpioError, PinMask};
use crate::pads::types::{Frame, FRAME_LEN};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

/// Most recent operations kept in the log
pub const OPS_LOG_CAPACITY: usize = 4096;

/// One recorded backend call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulatedOp {
    Set(PinMask),
    Clear(PinMask),
    Read(PinMask),
    ConfigureInput(u8),
    ConfigureOutput(u8),
    EnablePullup(u8),
}

#[derive(Debug, Default)]
struct BusState {
    clock: PinMask,
    latch: PinMask,
    frame: Frame,
    position: usize,
    clock_fell: bool,
    ops: VecDeque<SimulatedOp>,
    op_count: u64,
    latches: usize,
    unavailable: Vec<u8>,
}

impl BusState {
    fn record(&mut self, op: SimulatedOp) {
        if self.ops.len() == OPS_LOG_CAPACITY {
            self.ops.pop_front();
        }
        self.ops.push_back(op);
        self.op_count += 1;
        self.clock_fell = matches!(op, SimulatedOp::Clear(mask) if mask & self.clock != 0);
    }
}

#[derive(Debug, Clone)]
pub struct SimulatedGpio {
    state: Arc<Mutex<BusState>>,
}

impl SimulatedGpio {
    pub fn new(clock: u8, latch: u8) -> Self {
        let state = BusState {
            clock: 1 << clock,
            latch: 1 << latch,
            ..Default::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BusState> {
        // A panicking test thread must not hide the bus from the others
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Script the samples returned for every following capture
    pub fn load_frame(&self, frame: Frame) {
        self.lock().frame = frame;
    }

    /// Make pin acquisition fail for `pin`
    pub fn make_unavailable(&self, pin: u8) {
        self.lock().unavailable.push(pin);
    }

    /// The last [`OPS_LOG_CAPACITY`] operations, oldest first
    pub fn ops(&self) -> Vec<SimulatedOp> {
        self.lock().ops.iter().copied().collect()
    }

    /// Operations seen since creation or the last [`clear_ops`](Self::clear_ops)
    pub fn op_count(&self) -> u64 {
        self.lock().op_count
    }

    pub fn clear_ops(&self) {
        let mut state = self.lock();
        state.ops.clear();
        state.op_count = 0;
    }

    /// Number of latch pulses seen, one per captured frame
    pub fn latch_count(&self) -> usize {
        self.lock().latches
    }

    fn check_available(state: &BusState, pin: u8) -> Result<(), GpioError> {
        if state.unavailable.contains(&pin) {
            return Err(GpioError::PinUnavailable {
                pin,
                reason: "marked unavailable".to_string(),
            });
        }
        Ok(())
    }
}

impl GpioBackend for SimulatedGpio {
    fn set(&mut self, mask: PinMask) {
        let mut state = self.lock();
        state.record(SimulatedOp::Set(mask));
        if mask & state.latch != 0 {
            state.position = 0;
            state.latches += 1;
        }
    }

    fn clear(&mut self, mask: PinMask) {
        let mut state = self.lock();
        state.record(SimulatedOp::Clear(mask));
    }

    fn configure_input(&mut self, pin: u8) -> Result<(), GpioError> {
        let mut state = self.lock();
        Self::check_available(&state, pin)?;
        state.record(SimulatedOp::ConfigureInput(pin));
        Ok(())
    }

    fn configure_output(&mut self, pin: u8) -> Result<(), GpioError> {
        let mut state = self.lock();
        Self::check_available(&state, pin)?;
        state.record(SimulatedOp::ConfigureOutput(pin));
        Ok(())
    }

    fn enable_pullup(&mut self, pin: u8) -> Result<(), GpioError> {
        let mut state = self.lock();
        Self::check_available(&state, pin)?;
        state.record(SimulatedOp::EnablePullup(pin));
        Ok(())
    }

    fn read_all(&mut self) -> PinMask {
        let mut state = self.lock();
        // Shift position advances on the falling clock edge preceding the read
        let sample = if state.position < FRAME_LEN {
            state.frame[state.position]
        } else {
            0
        };
        if state.clock_fell {
            state.position += 1;
        }
        state.record(SimulatedOp::Read(sample));
        sample
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pads::reader::BitStreamReader;
    use std::time::Duration;

    #[test]
    fn latch_rewinds_the_script() {
        let mut gpio = SimulatedGpio::new(2, 3);
        let mut frame = [0; FRAME_LEN];
        frame[0] = 0b1;
        frame[1] = 0b10;
        gpio.load_frame(frame);

        gpio.set((1 << 2) | (1 << 3));
        gpio.clear(1 << 3);
        gpio.clear(1 << 2);
        assert_eq!(gpio.read_all(), 0b1);
        gpio.set(1 << 2);
        gpio.clear(1 << 2);
        assert_eq!(gpio.read_all(), 0b10);

        gpio.set((1 << 2) | (1 << 3));
        gpio.clear(1 << 3);
        gpio.clear(1 << 2);
        assert_eq!(gpio.read_all(), 0b1);
        assert_eq!(gpio.latch_count(), 2);
    }

    #[test]
    fn op_log_stays_bounded() {
        let mut gpio = SimulatedGpio::new(2, 3);
        let reader = BitStreamReader::new(1 << 2, 1 << 3, Duration::ZERO);
        for _ in 0..10_000 {
            reader.capture_frame(&mut gpio);
        }

        assert_eq!(gpio.ops().len(), OPS_LOG_CAPACITY);
        assert_eq!(gpio.op_count(), 10_000 * (2 + 3 * FRAME_LEN as u64));
        assert_eq!(gpio.latch_count(), 10_000);
        assert_eq!(gpio.ops().last(), Some(&SimulatedOp::Set(1 << 2)));
    }

    #[test]
    fn unavailable_pins_fail_configuration() {
        let mut gpio = SimulatedGpio::new(2, 3);
        gpio.make_unavailable(9);
        assert!(gpio.configure_input(4).is_ok());
        assert!(matches!(
            gpio.configure_input(9),
            Err(GpioError::PinUnavailable { pin: 9, .. })
        ));
    }
}
