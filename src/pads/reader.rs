//! Bit-stream capture
//!
//! The pads are parallel-in/serial-out shift registers sharing one clock and
//! one latch line. A latch pulse loads the button levels, then each falling
//! clock edge presents the next bit on every data line at once. The order of
//! the steps below is what the registers' hold and settle times require and
//! must not change.

use super::types::{Frame, FRAME_LEN};
use crate::gpio::{GpioBackend, PinMask};
use std::time::{Duration, Instant};

/// Default half clock period
pub const DEFAULT_BIT_DELAY: Duration = Duration::from_micros(6);

/// Clock and latch lines plus the half clock period
#[derive(Debug, Clone, Copy)]
pub struct BitStreamReader {
    clock: PinMask,
    latch: PinMask,
    delay: Duration,
}

impl BitStreamReader {
    pub fn new(clock: PinMask, latch: PinMask, delay: Duration) -> Self {
        Self {
            clock,
            latch,
            delay,
        }
    }

    /// Latch the pads and clock out one full frame
    pub fn capture_frame<G: GpioBackend + ?Sized>(&self, gpio: &mut G) -> Frame {
        let mut frame = [0; FRAME_LEN];

        gpio.set(self.clock | self.latch);
        spin_for(self.delay * 2);
        gpio.clear(self.latch);

        for sample in frame.iter_mut() {
            spin_for(self.delay);
            gpio.clear(self.clock);
            *sample = gpio.read_all();
            spin_for(self.delay);
            gpio.set(self.clock);
        }

        frame
    }
}

/// Busy-wait for `delay`
///
/// Delays are a few microseconds, far below scheduler resolution, so the
/// thread spins instead of sleeping.
fn spin_for(delay: Duration) {
    let start = Instant::now();
    while start.elapsed() < delay {
        std::hint::spin_loop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpio::{SimulatedGpio, SimulatedOp};

    const CLOCK: u8 = 2;
    const LATCH: u8 = 3;

    #[test]
    fn capture_follows_latch_then_clock_sequence() {
        let mut gpio = SimulatedGpio::new(CLOCK, LATCH);
        let reader = BitStreamReader::new(1 << CLOCK, 1 << LATCH, Duration::ZERO);

        reader.capture_frame(&mut gpio);
        let ops = gpio.ops();

        assert_eq!(ops.len(), 2 + FRAME_LEN * 3);
        assert_eq!(ops[0], SimulatedOp::Set((1 << CLOCK) | (1 << LATCH)));
        assert_eq!(ops[1], SimulatedOp::Clear(1 << LATCH));
        for cycle in ops[2..].chunks(3) {
            assert_eq!(cycle[0], SimulatedOp::Clear(1 << CLOCK));
            assert!(matches!(cycle[1], SimulatedOp::Read(_)));
            assert_eq!(cycle[2], SimulatedOp::Set(1 << CLOCK));
        }
    }

    #[test]
    fn capture_returns_samples_in_clock_order() {
        let mut gpio = SimulatedGpio::new(CLOCK, LATCH);
        let mut scripted = [0; FRAME_LEN];
        for (i, sample) in scripted.iter_mut().enumerate() {
            *sample = (i as PinMask) << 4;
        }
        gpio.load_frame(scripted);

        let reader = BitStreamReader::new(1 << CLOCK, 1 << LATCH, Duration::ZERO);
        assert_eq!(reader.capture_frame(&mut gpio), scripted);
        // A second poll starts again at sample 0
        assert_eq!(reader.capture_frame(&mut gpio), scripted);
        assert_eq!(gpio.latch_count(), 2);
    }

    #[test]
    fn spin_waits_at_least_the_delay() {
        let start = Instant::now();
        spin_for(Duration::from_micros(50));
        assert!(start.elapsed() >= Duration::from_micros(50));
    }
}
