//! Per-table buffering of points awaiting flush.
//!
//! The cache is the only state shared between event handlers and the
//! flush worker. Handlers append under a mutex held just long enough for
//! the push; the worker swaps the whole table map for a fresh one in a
//! single step, so an append racing a drain lands entirely in the new
//! map, never split across the two. No point is lost at the handoff.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use metrics::counter;
use rustc_hash::FxHashMap;
use stevedore_sink::DataPoint;
use tracing::debug;

/// A drained set of buckets, keyed by table name.
pub type Batch = FxHashMap<Arc<str>, VecDeque<DataPoint>>;

/// Points buffered per destination table.
#[derive(Debug)]
pub struct Cache {
    tables: Vec<Arc<str>>,
    max_pending: usize,
    buckets: Mutex<Batch>,
}

impl Cache {
    /// Create a cache with one empty bucket per name in `tables`.
    ///
    /// `max_pending` bounds each bucket; a bound of zero is treated as
    /// one.
    #[must_use]
    pub fn new(tables: Vec<Arc<str>>, max_pending: usize) -> Self {
        let buckets = Self::fresh(&tables);
        Self {
            tables,
            max_pending: max_pending.max(1),
            buckets: Mutex::new(buckets),
        }
    }

    fn fresh(tables: &[Arc<str>]) -> Batch {
        tables
            .iter()
            .map(|table| (Arc::clone(table), VecDeque::new()))
            .collect()
    }

    /// Table names this cache buckets by, in flush order.
    #[must_use]
    pub fn tables(&self) -> &[Arc<str>] {
        &self.tables
    }

    /// Append `point` to the bucket for `table`.
    ///
    /// A full bucket evicts its oldest point to make room, trading the
    /// stalest data for bounded memory while the backend is down. Points
    /// for tables this cache was not built with are discarded.
    pub fn append(&self, table: &str, point: DataPoint) {
        let mut evicted = false;
        {
            let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
            let Some(bucket) = buckets.get_mut(table) else {
                debug!(table, "point for unknown table discarded");
                return;
            };
            if bucket.len() >= self.max_pending {
                bucket.pop_front();
                evicted = true;
            }
            bucket.push_back(point);
        }
        counter!("points_buffered", "table" => table.to_string()).increment(1);
        if evicted {
            counter!("points_dropped", "table" => table.to_string()).increment(1);
            debug!(table, "bucket full, evicted oldest point");
        }
    }

    /// Swap every bucket for a fresh empty one and return the previous
    /// contents. The swap is a single step under the lock.
    #[must_use]
    pub fn drain(&self) -> Batch {
        let fresh = Self::fresh(&self.tables);
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *buckets, fresh)
    }

    /// Number of points currently buffered across all tables.
    #[must_use]
    pub fn pending(&self) -> usize {
        let buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        buckets.values().map(VecDeque::len).sum()
    }
}
