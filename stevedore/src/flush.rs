//! The background flush worker.
//!
//! Drains the cache on a fixed interval and writes each drained point to
//! the backend, one write per point, in buffer order. A failed write is
//! logged and the point re-appended to the live cache, making delivery
//! at-least-once: under retry a duplicate write is possible, a silent
//! loss is not, short of the cache's own overflow bound.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use stevedore_sink::Backend;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::cache::Cache;
use crate::shutdown;

/// Periodically drains a [`Cache`] into a [`Backend`].
#[derive(Debug)]
pub struct Worker<B> {
    cache: Arc<Cache>,
    backend: Arc<B>,
    database: String,
    interval: Duration,
    stop: shutdown::Watcher,
}

impl<B> Worker<B>
where
    B: Backend,
{
    /// Create a worker draining `cache` into `backend` every `interval`;
    /// a zero `interval` is treated as one millisecond.
    pub fn new(
        cache: Arc<Cache>,
        backend: Arc<B>,
        database: String,
        interval: Duration,
        stop: shutdown::Watcher,
    ) -> Self {
        Self {
            cache,
            backend,
            database,
            interval: interval.max(Duration::from_millis(1)),
            stop,
        }
    }

    /// Run the flush loop to completion.
    ///
    /// Flushes once per interval until the stop notice arrives, then
    /// flushes one final time so points buffered after the last tick are
    /// not stranded.
    pub async fn spin(self) {
        let Self {
            cache,
            backend,
            database,
            interval,
            stop,
        } = self;

        let mut ticker = interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let stop_wait = stop.recv();
        tokio::pin!(stop_wait);

        loop {
            tokio::select! {
                biased;

                () = &mut stop_wait => {
                    info!("stop notice received, draining once more");
                    break;
                }
                _ = ticker.tick() => {
                    flush_once(&cache, backend.as_ref(), &database).await;
                }
            }
        }

        flush_once(&cache, backend.as_ref(), &database).await;
    }
}

/// Drain the cache and write every drained point.
///
/// Tables are visited in cache order, points within a table in buffer
/// order. A failed write re-buffers its point and moves on; one point's
/// failure never skips the rest of the batch.
pub(crate) async fn flush_once<B>(cache: &Cache, backend: &B, database: &str)
where
    B: Backend,
{
    let mut batch = cache.drain();
    for table in cache.tables() {
        let Some(points) = batch.remove(table) else {
            continue;
        };
        if points.is_empty() {
            continue;
        }
        debug!(table = &**table, points = points.len(), "flushing table");
        for point in points {
            match backend.write_records(database, table, &point).await {
                Ok(()) => {
                    counter!("points_flushed", "table" => table.to_string()).increment(1);
                }
                Err(err) => {
                    warn!(table = &**table, error = %err, "write failed, point re-buffered");
                    counter!("write_failures", "table" => table.to_string()).increment(1);
                    cache.append(table, point);
                }
            }
        }
    }
    counter!("flush_cycles").increment(1);
}
