//! Driver handle - unified API for the pad bus
//!
//! Ties configuration, GPIO backend, pad bus and poll scheduler together.
//! Bring-up order is fixed: validate the configuration, acquire the GPIO
//! controller, register the slots, configure the pins. Any failure undoes
//! the earlier steps and no polling ever starts.
//!
//! ```rust,no_run
//! use snescon::config::DriverConfig;
//! use snescon::driver::Driver;
//! use snescon::sink::ChannelSink;
//!
//! # async fn run() -> Result<(), snescon::driver::DriverError> {
//! let (sink, mut events) = ChannelSink::channel(100);
//! let driver = Driver::from_config(&DriverConfig::default(), Box::new(sink))?;
//!
//! driver.open().await?;
//! while let Some(event) = events.recv().await {
//!     println!("{:?}", event);
//! }
//! driver.close().await;
//! driver.shutdown().await;
//! # Ok(())
//! # }
//! ```

use crate::config::{ConfigError, DriverConfig, FourScoreFlag};
use crate::gpio::{GpioBackend, GpioError, RppalGpio, SimulatedGpio};
use crate::pads::bus::{BusError, BusLayout, PadBus};
use crate::pads::types::FOURSCORE_PLAYERS;
use crate::poller::{PollScheduler, SchedulerError};
use crate::sink::InputSink;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Configuration rejected: {0}")]
    Config(#[from] ConfigError),

    #[error("GPIO controller unavailable: {0}")]
    Gpio(#[from] GpioError),

    #[error("Pad bus setup failed: {0}")]
    Bus(#[from] BusError),

    #[error("Polling failed: {0}")]
    Scheduler(#[from] SchedulerError),
}

pub struct Driver {
    layout: BusLayout,
    fourscore: FourScoreFlag,
    scheduler: PollScheduler,
}

impl Driver {
    /// Bring up the bus on the backend the configuration asks for
    pub fn from_config(
        config: &DriverConfig,
        sink: Box<dyn InputSink>,
    ) -> Result<Self, DriverError> {
        // Validate before touching the GPIO controller
        let layout = config.layout()?;

        let gpio: Box<dyn GpioBackend> = if config.simulate {
            info!("Using simulated GPIO backend");
            Box::new(SimulatedGpio::new(layout.clock, layout.latch))
        } else {
            Box::new(RppalGpio::new()?)
        };

        Self::start(config, gpio, sink)
    }

    /// Bring up the bus on an already opened backend
    pub fn start(
        config: &DriverConfig,
        gpio: Box<dyn GpioBackend>,
        sink: Box<dyn InputSink>,
    ) -> Result<Self, DriverError> {
        let layout = config.layout()?;
        let fourscore = FourScoreFlag::new(config.fourscore);

        let bus = PadBus::create(layout.clone(), gpio, sink, fourscore.clone())
            .register_slots()?
            .setup_gpio()?;

        info!(
            "Driver started with {} slots, FourScore {}",
            layout.slots,
            if config.fourscore { "enabled" } else { "disabled" }
        );

        Ok(Self {
            layout,
            fourscore,
            scheduler: PollScheduler::new(bus, config.poll_interval()),
        })
    }

    pub fn layout(&self) -> &BusLayout {
        &self.layout
    }

    /// A consumer attached; polling runs while at least one is attached
    pub async fn open(&self) -> Result<(), DriverError> {
        self.scheduler.open().await?;
        Ok(())
    }

    /// A consumer detached; waits for the poll task when it was the last one
    pub async fn close(&self) {
        self.scheduler.close().await;
    }

    pub async fn is_polling(&self) -> bool {
        self.scheduler.is_running().await
    }

    /// Toggle FourScore detection; picked up on the next poll
    pub fn set_fourscore(&self, enabled: bool) {
        if enabled && self.layout.slots < FOURSCORE_PLAYERS {
            warn!(
                "Only {} slots registered, FourScore readings will be ignored",
                self.layout.slots
            );
        }
        debug!("FourScore {}", if enabled { "enabled" } else { "disabled" });
        self.fourscore.set(enabled);
    }

    pub fn fourscore_enabled(&self) -> bool {
        self.fourscore.is_enabled()
    }

    /// Stop polling, unregister every slot and release the pins
    pub async fn shutdown(self) {
        info!("Shutting down driver");
        match self.scheduler.into_bus().await {
            Some(bus) => bus.teardown(),
            None => warn!("Pad bus already lost, nothing to tear down"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{RecordedEvent, RecordingSink};

    fn simulated_config(gpio: &[u8]) -> DriverConfig {
        DriverConfig {
            gpio: gpio.to_vec(),
            simulate: true,
            poll_interval_ms: 1,
            ..Default::default()
        }
    }

    #[test]
    fn invalid_config_never_touches_gpio() {
        let gpio = SimulatedGpio::new(2, 3);
        let sink = RecordingSink::new();

        let result = Driver::start(
            &simulated_config(&[2, 3]),
            Box::new(gpio.clone()),
            Box::new(sink.clone()),
        );
        assert!(matches!(
            result,
            Err(DriverError::Config(ConfigError::TooFewPins(2)))
        ));
        assert!(gpio.ops().is_empty());
        assert!(sink.events().is_empty());
    }

    #[test]
    fn failed_pin_setup_unregisters() {
        let gpio = SimulatedGpio::new(2, 3);
        gpio.make_unavailable(4);
        let sink = RecordingSink::new();

        let result = Driver::start(
            &simulated_config(&[2, 3, 4]),
            Box::new(gpio),
            Box::new(sink.clone()),
        );
        assert!(matches!(result, Err(DriverError::Bus(BusError::GpioError(_)))));
        assert_eq!(
            sink.events(),
            vec![RecordedEvent::Registered(0), RecordedEvent::Unregistered(0)]
        );
    }

    #[tokio::test]
    async fn shutdown_unregisters_every_slot() {
        let sink = RecordingSink::new();
        let driver =
            Driver::from_config(&simulated_config(&[2, 3, 4, 7]), Box::new(sink.clone())).unwrap();

        driver.open().await.unwrap();
        assert!(driver.is_polling().await);
        driver.close().await;
        assert!(!driver.is_polling().await);

        driver.shutdown().await;
        let events = sink.events();
        assert!(events.ends_with(&[RecordedEvent::Unregistered(0), RecordedEvent::Unregistered(1)]));
    }

    #[test]
    fn fourscore_flag_follows_config() {
        let mut config = simulated_config(&[2, 3, 4, 7]);
        config.fourscore = true;
        let driver = Driver::from_config(&config, Box::new(RecordingSink::new())).unwrap();
        assert!(driver.fourscore_enabled());
        assert_eq!(driver.layout().slots, 4);

        driver.set_fourscore(false);
        assert!(!driver.fourscore_enabled());
    }
}
