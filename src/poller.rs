//! Poll scheduler - runs the pad bus while someone is listening
//!
//! Consumers call [`PollScheduler::open`] and [`PollScheduler::close`]. The
//! first open spawns the poll task, the last close cancels it and waits for
//! it to finish. Open/close and the task status share one lock; the poll
//! task itself never takes it.
//!
//! ```text
//! open ──► count 0→1 ──► spawn task ──► [sleep period ─► update] ─► ...
//! close ─► count 1→0 ──► cancel ──► await task ──► bus handed back
//! ```
//!
//! The task owns the bus while it runs and returns it when it stops, so the
//! player mode survives a close/open cycle.

use crate::pads::bus::{PadBus, Ready};
use crate::pads::decoder::BusMode;
use chrono::Local;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Pad bus lost: {0}")]
    BusLost(String),
}

struct PollTask {
    token: CancellationToken,
    handle: JoinHandle<PadBus<Ready>>,
}

struct Usage {
    count: usize,
    bus: Option<PadBus<Ready>>,
    task: Option<PollTask>,
    starts: u64,
    stops: u64,
}

pub struct PollScheduler {
    usage: Mutex<Usage>,
    period: Duration,
}

impl PollScheduler {
    pub fn new(bus: PadBus<Ready>, period: Duration) -> Self {
        info!("Poll scheduler created with {:?} period", period);
        Self {
            usage: Mutex::new(Usage {
                count: 0,
                bus: Some(bus),
                task: None,
                starts: 0,
                stops: 0,
            }),
            period,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Register one consumer, starting the poll task if it is the first
    pub async fn open(&self) -> Result<usize, SchedulerError> {
        let mut usage = self.usage.lock().await;

        if usage.task.is_none() {
            let bus = usage.bus.take().ok_or_else(|| {
                error!("Cannot start polling, pad bus was lost");
                SchedulerError::BusLost("poll task terminated abnormally".to_string())
            })?;

            let token = CancellationToken::new();
            let handle = tokio::spawn(run_poll_loop(bus, self.period, token.clone()));
            usage.task = Some(PollTask { token, handle });
            usage.starts += 1;
            info!("Poll task started");
        }

        usage.count += 1;
        debug!("Consumer opened, usage count {}", usage.count);
        Ok(usage.count)
    }

    /// Drop one consumer; the last one stops the poll task and waits for an
    /// in-flight cycle to finish
    pub async fn close(&self) -> usize {
        let mut usage = self.usage.lock().await;

        if usage.count == 0 {
            warn!("Close without matching open ignored");
            return 0;
        }

        usage.count -= 1;
        debug!("Consumer closed, usage count {}", usage.count);

        if usage.count == 0 {
            Self::stop(&mut usage).await;
        }
        usage.count
    }

    async fn stop(usage: &mut Usage) {
        let Some(task) = usage.task.take() else {
            return;
        };

        debug!("Cancelling poll task");
        task.token.cancel();
        match task.handle.await {
            Ok(bus) => {
                usage.bus = Some(bus);
                info!("Poll task stopped");
            }
            Err(e) => {
                error!("Poll task terminated abnormally: {}", e);
            }
        }
        usage.stops += 1;
    }

    pub async fn is_running(&self) -> bool {
        self.usage.lock().await.task.is_some()
    }

    pub async fn usage_count(&self) -> usize {
        self.usage.lock().await.count
    }

    /// How often the poll task was started and stopped
    pub async fn start_stop_counts(&self) -> (u64, u64) {
        let usage = self.usage.lock().await;
        (usage.starts, usage.stops)
    }

    /// Stop polling regardless of open consumers and hand back the bus
    pub async fn into_bus(mut self) -> Option<PadBus<Ready>> {
        let usage = self.usage.get_mut();
        if usage.count > 0 {
            warn!("Shutting down with {} open consumers", usage.count);
            usage.count = 0;
        }
        Self::stop(usage).await;
        usage.bus.take()
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        if let Some(task) = &self.usage.get_mut().task {
            task.token.cancel();
        }
    }
}

/// Poll loop: wait one period, run one cycle, repeat until cancelled
async fn run_poll_loop(
    mut bus: PadBus<Ready>,
    period: Duration,
    token: CancellationToken,
) -> PadBus<Ready> {
    info!("Entering poll loop with {:?} period", period);

    // Stats for performance monitoring
    let mut cycles: u64 = 0;
    let mut fourscore_cycles: u64 = 0;
    let mut last_stats_time = Local::now();
    let stats_interval = chrono::Duration::seconds(30);

    loop {
        tokio::select! {
            biased;

            _ = token.cancelled() => {
                debug!("Cancellation received, leaving poll loop");
                break;
            }

            _ = tokio::time::sleep(period) => {
                let outcome = bus.update();
                cycles += 1;
                if outcome.mode == BusMode::FourScore {
                    fourscore_cycles += 1;
                }

                let now = Local::now();
                if now - last_stats_time > stats_interval {
                    info!(
                        "Poll stats: {} cycles ({} FourScore) in {} seconds, player mode {}",
                        cycles,
                        fourscore_cycles,
                        (now - last_stats_time).num_seconds(),
                        outcome.player_mode
                    );
                    cycles = 0;
                    fourscore_cycles = 0;
                    last_stats_time = now;
                }
            }
        }
    }

    bus
}
