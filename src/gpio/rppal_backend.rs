use super::{pin_bit, pins_in, GpioBackend, GpioError, PinMask};
use rppal::gpio::{Bias, Gpio, IoPin, Mode};
use std::collections::BTreeMap;
use tracing::{debug, error, info};

/// Raspberry Pi GPIO backend built on `rppal`
///
/// Pins are acquired lazily the first time their direction is configured and
/// kept as [`IoPin`]s so direction and bias can be changed later. rppal has
/// no single-write mask access, so `set`/`clear` walk the mask and drive each
/// acquired pin in ascending GPIO order. Dropping the backend releases every
/// pin and restores its previous mode.
pub struct RppalGpio {
    gpio: Gpio,
    pins: BTreeMap<u8, IoPin>,
}

impl RppalGpio {
    pub fn new() -> Result<Self, GpioError> {
        info!("Opening Raspberry Pi GPIO controller");
        let gpio = match Gpio::new() {
            Ok(g) => g,
            Err(e) => {
                error!("Failed to open GPIO controller: {}", e);
                return Err(GpioError::InitializationError(e.to_string()));
            }
        };

        Ok(Self {
            gpio,
            pins: BTreeMap::new(),
        })
    }

    fn pin_with_mode(&mut self, pin: u8, mode: Mode) -> Result<&mut IoPin, GpioError> {
        if !self.pins.contains_key(&pin) {
            let acquired = self
                .gpio
                .get(pin)
                .map_err(|e| GpioError::PinUnavailable {
                    pin,
                    reason: e.to_string(),
                })?
                .into_io(mode);
            debug!("Acquired GPIO {} as {:?}", pin, mode);
            self.pins.insert(pin, acquired);
        }

        let io = self
            .pins
            .get_mut(&pin)
            .ok_or(GpioError::PinNotConfigured(pin))?;
        io.set_mode(mode);
        Ok(io)
    }
}

impl GpioBackend for RppalGpio {
    fn set(&mut self, mask: PinMask) {
        for pin in pins_in(mask) {
            if let Some(io) = self.pins.get_mut(&pin) {
                io.set_high();
            }
        }
    }

    fn clear(&mut self, mask: PinMask) {
        for pin in pins_in(mask) {
            if let Some(io) = self.pins.get_mut(&pin) {
                io.set_low();
            }
        }
    }

    fn configure_input(&mut self, pin: u8) -> Result<(), GpioError> {
        self.pin_with_mode(pin, Mode::Input).map(|_| ())
    }

    fn configure_output(&mut self, pin: u8) -> Result<(), GpioError> {
        self.pin_with_mode(pin, Mode::Output).map(|_| ())
    }

    fn enable_pullup(&mut self, pin: u8) -> Result<(), GpioError> {
        let io = self
            .pins
            .get_mut(&pin)
            .ok_or(GpioError::PinNotConfigured(pin))?;
        io.set_bias(Bias::PullUp);
        debug!("Enabled pull-up on GPIO {}", pin);
        Ok(())
    }

    fn read_all(&mut self) -> PinMask {
        self.pins
            .iter()
            .filter(|(_, io)| io.is_low())
            .fold(0, |mask, (pin, _)| mask | pin_bit(*pin))
    }
}
