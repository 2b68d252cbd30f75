//! Cyclic polling of the controller.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::dispatch::Dispatcher;
use crate::transport::BulkReader;

/// Totals for one poll cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub readings: usize,
    pub published: usize,
    pub written: usize,
    pub failed: usize,
}

/// Reads everything, routes every reading, sleeps, repeats.
///
/// Cycles never overlap: the next read starts only after the previous batch
/// has been fully dispatched and the delay has elapsed.
pub struct Poller {
    reader: Arc<dyn BulkReader>,
    dispatcher: Arc<Dispatcher>,
    interval: Duration,
    started: Instant,
}

impl Poller {
    pub fn new(reader: Arc<dyn BulkReader>, dispatcher: Arc<Dispatcher>, interval: Duration) -> Self {
        Self {
            reader,
            dispatcher,
            interval,
            started: Instant::now(),
        }
    }

    /// Run the polling loop until the task is aborted.
    pub async fn run(self) {
        info!(interval_ms = self.interval.as_millis() as u64, "Starting poll loop");

        loop {
            let stats = self.poll_once().await;
            debug!(
                readings = stats.readings,
                published = stats.published,
                written = stats.written,
                failed = stats.failed,
                "Poll cycle complete"
            );

            tokio::time::sleep(self.interval).await;
        }
    }

    /// Perform a single poll cycle. Failures are logged per entry and never abort the batch.
    pub async fn poll_once(&self) -> CycleStats {
        let mut stats = CycleStats::default();

        let readings = match self.reader.read_all().await {
            Ok(readings) => readings,
            Err(e) => {
                error!(error = %e, "Bulk read failed, skipping cycle");
                return stats;
            }
        };

        let now_ms = self.now_ms();
        let mut batch: Vec<_> = readings.into_iter().collect();
        batch.sort_by(|a, b| a.0.cmp(&b.0));

        for (topic, value) in batch {
            stats.readings += 1;
            match self.dispatcher.handle_reading(&topic, value, now_ms).await {
                Ok(effects) => {
                    stats.published += usize::from(effects.published);
                    stats.written += usize::from(effects.written);
                }
                Err(e) => {
                    stats.failed += 1;
                    warn!(topic = %topic, error = %e, "Failed to handle reading");
                }
            }
        }

        stats
    }

    /// Milliseconds since the poller was created, from a monotonic clock.
    fn now_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}
