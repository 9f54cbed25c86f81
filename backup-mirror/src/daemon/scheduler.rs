//! Daily trigger loop.
//!
//! The scheduler polls the clock every `poll_interval` and starts a pass when
//! the UTC hour equals the configured start hour. After a pass it stays idle
//! for `cooldown` so the same hour cannot trigger twice. A day whose trigger
//! hour is missed (process down, pass still running) is simply skipped.

use crate::utils::Clock;
use chrono::Timelike;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Triggered,
    CoolingDown,
}

pub struct DailyScheduler {
    start_hour: u32,
    poll_interval: Duration,
    cooldown: Duration,
    clock: Arc<dyn Clock>,
}

impl DailyScheduler {
    pub fn new(start_hour: u32, poll_interval: Duration, cooldown: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            start_hour,
            poll_interval,
            cooldown,
            clock,
        }
    }

    /// Whether the clock currently sits in the trigger hour.
    pub fn is_trigger_hour(&self) -> bool {
        self.clock.now().hour() == self.start_hour
    }

    /// Drive `pass` until `cancel` fires. Each pass is awaited to completion
    /// before the cooldown starts.
    pub async fn run<F, Fut>(&self, cancel: CancellationToken, mut pass: F)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        info!(
            start_hour_utc = self.start_hour,
            poll_secs = self.poll_interval.as_secs(),
            cooldown_secs = self.cooldown.as_secs(),
            "Scheduler started"
        );

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }

            if !self.is_trigger_hour() {
                debug!(state = ?SchedulerState::Idle, "Not the trigger hour");
                continue;
            }

            info!(state = ?SchedulerState::Triggered, "Starting backup process");
            pass().await;

            info!(state = ?SchedulerState::CoolingDown, secs = self.cooldown.as_secs(), "Cooling down");
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.cooldown) => {}
            }
            interval.reset();
            info!(state = ?SchedulerState::Idle, "Waiting for next trigger hour");
        }

        info!("Scheduler stopped");
    }
}
