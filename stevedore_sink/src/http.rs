//! HTTP implementation of the [`Backend`] surface.
//!
//! Speaks JSON to a Timestream-shaped REST API: `POST /v1/databases`,
//! `POST /v1/databases/{db}/tables` and
//! `POST /v1/databases/{db}/tables/{table}/records`. Delivery failures of
//! a transient nature are retried in place with a short fixed pause;
//! everything else surfaces as an error for the caller to handle.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::backend::{Backend, Error, Retention};
use crate::point::DataPoint;

/// Pause between delivery attempts of the same request.
const RETRY_DELAY: Duration = Duration::from_millis(100);

fn default_endpoint() -> String {
    "http://127.0.0.1:8098".to_string()
}

fn default_read_timeout_secs() -> u64 {
    20
}

fn default_max_pool_connections() -> usize {
    5_000
}

fn default_max_attempts() -> u32 {
    10
}

/// Configuration of [`HttpBackend`].
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Base URL of the backend.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Seconds to wait for a response before the attempt counts as failed.
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,
    /// Maximum idle connections kept around per host.
    #[serde(default = "default_max_pool_connections")]
    pub max_pool_connections: usize,
    /// Delivery attempts per request before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            read_timeout_secs: default_read_timeout_secs(),
            max_pool_connections: default_max_pool_connections(),
            max_attempts: default_max_attempts(),
        }
    }
}

#[derive(Serialize)]
struct CreateDatabase<'a> {
    name: &'a str,
}

#[derive(Serialize)]
struct CreateTable<'a> {
    name: &'a str,
    retention: Retention,
}

/// [`Backend`] implementation over a JSON REST API.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    endpoint: String,
    max_attempts: u32,
}

impl HttpBackend {
    /// Build a client per `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BuildClient`] when the underlying HTTP client
    /// cannot be constructed.
    pub fn new(config: &Config) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.read_timeout_secs))
            .pool_max_idle_per_host(config.max_pool_connections)
            .build()
            .map_err(Error::BuildClient)?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            max_attempts: config.max_attempts.max(1),
        })
    }

    async fn post_json<T>(&self, url: &str, body: &T) -> Result<(), Error>
    where
        T: Serialize + Sync,
    {
        let mut attempt: u32 = 1;
        loop {
            match self.client.post(url).json(body).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(());
                    }
                    if status == StatusCode::CONFLICT {
                        return Err(Error::AlreadyExists);
                    }
                    if transient_status(status) && attempt < self.max_attempts {
                        debug!(
                            url,
                            attempt,
                            status = u64::from(status.as_u16()),
                            "transient status, retrying"
                        );
                        attempt += 1;
                        tokio::time::sleep(RETRY_DELAY).await;
                        continue;
                    }
                    let body = response.text().await.unwrap_or_default();
                    return Err(Error::Status {
                        status: status.as_u16(),
                        body,
                    });
                }
                Err(err) if transient_error(&err) && attempt < self.max_attempts => {
                    debug!(url, attempt, error = %err, "transient error, retrying");
                    attempt += 1;
                    tokio::time::sleep(RETRY_DELAY).await;
                }
                Err(err) => return Err(Error::Transport(err)),
            }
        }
    }
}

fn transient_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 502 | 503 | 504)
}

fn transient_error(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout()
}

#[async_trait]
impl Backend for HttpBackend {
    async fn create_database(&self, database: &str) -> Result<(), Error> {
        let url = format!("{endpoint}/v1/databases", endpoint = self.endpoint);
        self.post_json(&url, &CreateDatabase { name: database })
            .await
    }

    async fn create_table(
        &self,
        database: &str,
        table: &str,
        retention: Retention,
    ) -> Result<(), Error> {
        let url = format!(
            "{endpoint}/v1/databases/{database}/tables",
            endpoint = self.endpoint
        );
        self.post_json(
            &url,
            &CreateTable {
                name: table,
                retention,
            },
        )
        .await
    }

    async fn write_records(
        &self,
        database: &str,
        table: &str,
        point: &DataPoint,
    ) -> Result<(), Error> {
        let url = format!(
            "{endpoint}/v1/databases/{database}/tables/{table}/records",
            endpoint = self.endpoint
        );
        self.post_json(&url, point).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use warp::Filter;

    use super::*;
    use crate::point::{encode, Value};

    fn backend_at(addr: std::net::SocketAddr, max_attempts: u32) -> HttpBackend {
        HttpBackend::new(&Config {
            endpoint: format!("http://{addr}"),
            max_attempts,
            ..Config::default()
        })
        .expect("client builds")
    }

    #[tokio::test]
    async fn create_database_conflict_maps_to_already_exists() {
        let filter = warp::post()
            .and(warp::path!("v1" / "databases"))
            .map(|| warp::reply::with_status("conflict", warp::http::StatusCode::CONFLICT));
        let (addr, serve_fut) = warp::serve(filter).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(serve_fut);

        let backend = backend_at(addr, 3);
        let res = backend.create_database("loadtest").await;
        assert!(matches!(res, Err(Error::AlreadyExists)));
    }

    #[tokio::test]
    async fn create_table_sends_name_and_retention() {
        let received: Arc<Mutex<Vec<(String, serde_json::Value)>>> =
            Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        let filter = warp::post()
            .and(warp::path!("v1" / "databases" / String / "tables"))
            .and(warp::body::json())
            .map(move |database: String, body: serde_json::Value| {
                sink.lock().expect("not poisoned").push((database, body));
                warp::reply::with_status("", warp::http::StatusCode::OK)
            });
        let (addr, serve_fut) = warp::serve(filter).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(serve_fut);

        let backend = backend_at(addr, 3);
        backend
            .create_table(
                "loadtest",
                "requests",
                Retention {
                    hot_tier_hours: 24,
                    cold_tier_days: 7,
                },
            )
            .await
            .expect("create succeeds");

        let received = received.lock().expect("not poisoned");
        assert_eq!(received.len(), 1);
        let (database, body) = &received[0];
        assert_eq!(database, "loadtest");
        assert_eq!(
            body,
            &serde_json::json!({
                "name": "requests",
                "retention": {"hot_tier_hours": 24, "cold_tier_days": 7},
            })
        );
    }

    #[tokio::test]
    async fn write_records_posts_point_to_table_path() {
        let received: Arc<Mutex<Vec<(String, String, serde_json::Value)>>> =
            Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        let filter = warp::post()
            .and(warp::path!(
                "v1" / "databases" / String / "tables" / String / "records"
            ))
            .and(warp::body::json())
            .map(
                move |database: String, table: String, body: serde_json::Value| {
                    sink.lock()
                        .expect("not poisoned")
                        .push((database, table, body));
                    warp::reply::with_status("", warp::http::StatusCode::OK)
                },
            );
        let (addr, serve_fut) = warp::serve(filter).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(serve_fut);

        let backend = backend_at(addr, 3);
        let point = encode(
            &[("name", Value::from("/"))],
            &[("counter", Value::Unsigned(1))],
            std::time::UNIX_EPOCH + Duration::from_millis(5),
        );
        backend
            .write_records("loadtest", "requests", &point)
            .await
            .expect("write succeeds");

        let received = received.lock().expect("not poisoned");
        assert_eq!(received.len(), 1);
        let (database, table, body) = &received[0];
        assert_eq!(database, "loadtest");
        assert_eq!(table, "requests");
        assert_eq!(body["common_attributes"]["time"], "5");
        assert_eq!(body["records"][0]["measure_name"], "counter");
    }

    #[tokio::test]
    async fn transient_status_is_retried_until_success() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let filter = warp::post().and(warp::path!("v1" / "databases")).map(move || {
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            if attempt < 2 {
                warp::reply::with_status("unavailable", warp::http::StatusCode::SERVICE_UNAVAILABLE)
            } else {
                warp::reply::with_status("", warp::http::StatusCode::OK)
            }
        });
        let (addr, serve_fut) = warp::serve(filter).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(serve_fut);

        let backend = backend_at(addr, 5);
        backend
            .create_database("loadtest")
            .await
            .expect("retries through transient statuses");
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn transient_status_gives_up_after_max_attempts() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let filter = warp::post().and(warp::path!("v1" / "databases")).map(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            warp::reply::with_status("unavailable", warp::http::StatusCode::SERVICE_UNAVAILABLE)
        });
        let (addr, serve_fut) = warp::serve(filter).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(serve_fut);

        let backend = backend_at(addr, 3);
        let res = backend.create_database("loadtest").await;
        match res {
            Err(Error::Status { status, .. }) => assert_eq!(status, 503),
            other => panic!("expected status error, got {other:?}"),
        }
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let filter = warp::post().and(warp::path!("v1" / "databases")).map(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            warp::reply::with_status("bad payload", warp::http::StatusCode::BAD_REQUEST)
        });
        let (addr, serve_fut) = warp::serve(filter).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(serve_fut);

        let backend = backend_at(addr, 5);
        let res = backend.create_database("loadtest").await;
        match res {
            Err(Error::Status { status, body }) => {
                assert_eq!(status, 400);
                assert_eq!(body, "bad payload");
            }
            other => panic!("expected status error, got {other:?}"),
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn config_defaults() {
        let config: Config = serde_json::from_str("{}").expect("empty config parses");
        assert_eq!(config, Config::default());
        assert_eq!(config.endpoint, "http://127.0.0.1:8098");
        assert_eq!(config.read_timeout_secs, 20);
        assert_eq!(config.max_pool_connections, 5_000);
        assert_eq!(config.max_attempts, 10);
    }

    #[test]
    fn endpoint_trailing_slash_is_trimmed() {
        let backend = HttpBackend::new(&Config {
            endpoint: "http://localhost:8098/".to_string(),
            ..Config::default()
        })
        .expect("client builds");
        assert_eq!(backend.endpoint, "http://localhost:8098");
    }
}
