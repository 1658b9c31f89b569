use color_eyre::{eyre::eyre, Result};
use snescon::config::DriverConfig;
use snescon::driver::Driver;
use snescon::pads::types::PadState;
use snescon::sink::{ChannelSink, InputEvent};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

const EVENT_BUFFER: usize = 1000;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = DriverConfig::load_or_default(config_path.as_deref())?;
    info!("Loaded configuration: {:?}", config);

    let (sink, events) = ChannelSink::channel(EVENT_BUFFER);

    let driver = Driver::from_config(&config, Box::new(sink))
        .map_err(|e| eyre!("Failed to start driver: {}", e))?;

    let consumer = tokio::spawn(log_events(events));

    driver.open().await?;
    info!("Polling pads, press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    info!("Interrupt received");

    driver.close().await;
    driver.shutdown().await;

    // The sink went away with the bus, so the channel is closed now
    consumer.await?;
    Ok(())
}

/// Log attach/detach and every change of a slot's state
async fn log_events(mut events: mpsc::Receiver<InputEvent>) {
    let mut last: HashMap<usize, PadState> = HashMap::new();

    while let Some(event) = events.recv().await {
        match event {
            InputEvent::Attached(identity) => {
                info!("{} attached as {}", identity.name, identity.phys);
            }
            InputEvent::Detached { slot } => {
                info!("Slot {} detached", slot);
                last.remove(&slot);
            }
            InputEvent::Report(report) => {
                if last.get(&report.slot) == Some(&report.state) {
                    continue;
                }
                let pressed: Vec<_> = report.state.buttons.pressed().collect();
                info!(
                    "Slot {}: buttons {:?}, x {}, y {}",
                    report.slot, pressed, report.state.horizontal, report.state.vertical
                );
                last.insert(report.slot, report.state);
            }
        }
    }

    debug!("Event channel closed");
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
