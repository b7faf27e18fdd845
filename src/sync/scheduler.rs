//! # Flush Scheduler
//!
//! Decides when the periodic queue flush is due. The interval defaults to
//! 60 seconds and widens to 120 when the reduce-sync-frequency setting is
//! active; enqueue and online-transition triggers bypass the schedule
//! entirely.

use std::time::{Duration, Instant};

use tokio::sync::RwLock;

/// Periodic flush gate
#[derive(Debug)]
pub struct FlushScheduler {
    /// Last flush time
    last_flush: RwLock<Option<Instant>>,
    /// Interval between periodic flushes
    interval: Duration,
}

impl FlushScheduler {
    /// Create a scheduler with the given periodic interval
    pub fn new(interval: Duration) -> Self {
        Self {
            last_flush: RwLock::new(None),
            interval,
        }
    }

    /// Whether a periodic flush is due now
    pub async fn should_flush(&self) -> bool {
        match *self.last_flush.read().await {
            Some(at) => at.elapsed() >= self.interval,
            None => true, // First flush
        }
    }

    /// Record a completed flush
    pub async fn record_flush(&self) {
        *self.last_flush.write().await = Some(Instant::now());
    }

    /// Time until the next periodic flush is due. Zero when overdue or
    /// never flushed.
    pub async fn time_until_next_flush(&self) -> Duration {
        match *self.last_flush.read().await {
            None => Duration::ZERO,
            Some(at) => {
                let elapsed = at.elapsed();
                if elapsed >= self.interval {
                    Duration::ZERO
                } else {
                    self.interval - elapsed
                }
            }
        }
    }

    /// The configured periodic interval
    pub fn interval(&self) -> Duration {
        self.interval
    }
}
