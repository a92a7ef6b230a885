//! Listener configuration.
//!
//! [`Settings`] is meant to be embedded in the host harness's own
//! configuration file. Every field has a default, so an empty mapping is
//! a complete configuration pointing at a local backend.

use rustc_hash::FxHashMap;
use serde::Deserialize;
use stevedore_sink::{http, Retention};

fn default_database() -> String {
    "loadtest".to_string()
}

fn default_events_table() -> String {
    "events".to_string()
}

fn default_requests_table() -> String {
    "requests".to_string()
}

fn default_exceptions_table() -> String {
    "exceptions".to_string()
}

fn default_hot_retention_hours() -> u64 {
    24
}

fn default_cold_retention_days() -> u64 {
    7
}

fn default_interval_ms() -> u64 {
    1_000
}

fn default_max_pending_points() -> usize {
    100_000
}

/// Configuration of [`crate::TelemetryListener`].
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Backend connection parameters.
    #[serde(default)]
    pub backend: http::Config,
    /// Database holding the three tables.
    #[serde(default = "default_database")]
    pub database: String,
    /// Table receiving lifecycle event points.
    #[serde(default = "default_events_table")]
    pub events_table: String,
    /// Table receiving request points.
    #[serde(default = "default_requests_table")]
    pub requests_table: String,
    /// Table receiving user-error points.
    #[serde(default = "default_exceptions_table")]
    pub exceptions_table: String,
    /// Hours of hot-tier retention requested at table creation.
    #[serde(default = "default_hot_retention_hours")]
    pub hot_retention_hours: u64,
    /// Days of cold-tier retention requested at table creation.
    #[serde(default = "default_cold_retention_days")]
    pub cold_retention_days: u64,
    /// Milliseconds between flush cycles.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Pending points held per table before the oldest is evicted.
    #[serde(default = "default_max_pending_points")]
    pub max_pending_points: usize,
    /// Operator-supplied dimensions stamped onto every point, appended in
    /// key order after the per-event dimensions.
    #[serde(default)]
    pub extra_dimensions: FxHashMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend: http::Config::default(),
            database: default_database(),
            events_table: default_events_table(),
            requests_table: default_requests_table(),
            exceptions_table: default_exceptions_table(),
            hot_retention_hours: default_hot_retention_hours(),
            cold_retention_days: default_cold_retention_days(),
            interval_ms: default_interval_ms(),
            max_pending_points: default_max_pending_points(),
            extra_dimensions: FxHashMap::default(),
        }
    }
}

impl Settings {
    /// Retention windows requested at table creation.
    #[must_use]
    pub fn retention(&self) -> Retention {
        Retention {
            hot_tier_hours: self.hot_retention_hours,
            cold_tier_days: self.cold_retention_days,
        }
    }

    /// The three table names in provisioning and flush order.
    #[must_use]
    pub fn table_names(&self) -> [&str; 3] {
        [
            &self.events_table,
            &self.requests_table,
            &self.exceptions_table,
        ]
    }
}
