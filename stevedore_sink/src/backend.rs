//! The backend write surface.
//!
//! [`Backend`] abstracts the time-series store: provisioning of databases
//! and tables plus per-point record writes. The pipeline is written
//! against this trait so tests can substitute an in-memory double for the
//! HTTP client.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::point::DataPoint;

/// Errors produced by [`Backend`] operations.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The database or table already exists. Provisioning treats this as
    /// success.
    #[error("resource already exists")]
    AlreadyExists,
    /// The backend rejected the request.
    #[error("backend returned status {status}: {body}")]
    Status {
        /// HTTP status code of the rejection.
        status: u16,
        /// Response body, as text.
        body: String,
    },
    /// The request could not be delivered.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// The HTTP client could not be constructed.
    #[error("building HTTP client: {0}")]
    BuildClient(#[source] reqwest::Error),
}

/// Retention windows applied to a table at creation.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Retention {
    /// Hours the table keeps data in fast, recent storage.
    pub hot_tier_hours: u64,
    /// Days the table keeps data in slow, historical storage.
    pub cold_tier_days: u64,
}

/// A time-series store that can be provisioned and written to.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Create `database`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyExists`] when the database is already
    /// present, any other variant when creation fails outright.
    async fn create_database(&self, database: &str) -> Result<(), Error>;

    /// Create `table` inside `database` with the given retention windows.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyExists`] when the table is already present,
    /// any other variant when creation fails outright.
    async fn create_table(
        &self,
        database: &str,
        table: &str,
        retention: Retention,
    ) -> Result<(), Error>;

    /// Write one point's records to `table` inside `database`.
    ///
    /// # Errors
    ///
    /// Returns an error when the write is rejected or cannot be delivered.
    /// The caller decides whether to retry; this call makes at most one
    /// delivery.
    async fn write_records(
        &self,
        database: &str,
        table: &str,
        point: &DataPoint,
    ) -> Result<(), Error>;
}

#[async_trait]
impl<B> Backend for Arc<B>
where
    B: Backend + ?Sized,
{
    async fn create_database(&self, database: &str) -> Result<(), Error> {
        (**self).create_database(database).await
    }

    async fn create_table(
        &self,
        database: &str,
        table: &str,
        retention: Retention,
    ) -> Result<(), Error> {
        (**self).create_table(database, table, retention).await
    }

    async fn write_records(
        &self,
        database: &str,
        table: &str,
        point: &DataPoint,
    ) -> Result<(), Error> {
        (**self).write_records(database, table, point).await
    }
}
