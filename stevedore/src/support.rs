//! Test support: an in-memory backend double.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use stevedore_sink::{Backend, DataPoint, Error, Retention};

#[derive(Debug, Default)]
struct State {
    databases: Vec<String>,
    tables: Vec<(String, String, Retention)>,
    writes: Vec<(String, DataPoint)>,
    failed_writes: usize,
    fail_for: FxHashMap<String, usize>,
    fail_creates: bool,
}

/// Records every backend call. Duplicate creates report conflicts like
/// the real store; writes can be scripted to fail per table.
#[derive(Debug, Default)]
pub(crate) struct FakeBackend {
    state: Mutex<State>,
}

impl FakeBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The next `count` writes to `table` fail with a 503.
    pub(crate) fn fail_next_writes(&self, table: &str, count: usize) {
        self.state().fail_for.insert(table.to_string(), count);
    }

    /// Every subsequent create call fails with a 500.
    pub(crate) fn fail_creates(&self) {
        self.state().fail_creates = true;
    }

    pub(crate) fn created_databases(&self) -> Vec<String> {
        self.state().databases.clone()
    }

    pub(crate) fn created_tables(&self) -> Vec<(String, String, Retention)> {
        self.state().tables.clone()
    }

    pub(crate) fn writes_for(&self, table: &str) -> Vec<DataPoint> {
        self.state()
            .writes
            .iter()
            .filter(|(t, _)| t == table)
            .map(|(_, point)| point.clone())
            .collect()
    }

    pub(crate) fn total_writes(&self) -> usize {
        self.state().writes.len()
    }

    pub(crate) fn failed_writes(&self) -> usize {
        self.state().failed_writes
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn create_database(&self, database: &str) -> Result<(), Error> {
        let mut state = self.state();
        if state.fail_creates {
            return Err(Error::Status {
                status: 500,
                body: "creates disabled".to_string(),
            });
        }
        if state.databases.iter().any(|d| d == database) {
            return Err(Error::AlreadyExists);
        }
        state.databases.push(database.to_string());
        Ok(())
    }

    async fn create_table(
        &self,
        database: &str,
        table: &str,
        retention: Retention,
    ) -> Result<(), Error> {
        let mut state = self.state();
        if state.fail_creates {
            return Err(Error::Status {
                status: 500,
                body: "creates disabled".to_string(),
            });
        }
        if state
            .tables
            .iter()
            .any(|(d, t, _)| d == database && t == table)
        {
            return Err(Error::AlreadyExists);
        }
        state
            .tables
            .push((database.to_string(), table.to_string(), retention));
        Ok(())
    }

    async fn write_records(
        &self,
        _database: &str,
        table: &str,
        point: &DataPoint,
    ) -> Result<(), Error> {
        let mut state = self.state();
        if let Some(remaining) = state.fail_for.get_mut(table) {
            if *remaining > 0 {
                *remaining -= 1;
                state.failed_writes += 1;
                return Err(Error::Status {
                    status: 503,
                    body: "scripted write failure".to_string(),
                });
            }
        }
        state.writes.push((table.to_string(), point.clone()));
        Ok(())
    }
}
