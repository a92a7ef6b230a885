//! The telemetry listener.
//!
//! [`TelemetryListener`] is the single point of contact between the host
//! harness and the pipeline. Construction provisions the backend, spawns
//! the flush worker, registers one handler per event channel and records
//! the synthetic `test_started` point. The `quitting` event, an explicit
//! [`TelemetryListener::shutdown`] call or dropping the listener all trip
//! the stop notice; the worker drains the cache once more before exiting.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime};

use stevedore_sink::{encode, Backend, Error as SinkError, HttpBackend, Value};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::cache::Cache;
use crate::config::Settings;
use crate::event::{
    EventBus, Quitting, RequestError, RequestFailure, RequestSuccess, SpawningComplete, TestStop,
    UserError,
};
use crate::flush;
use crate::node::NodeRole;
use crate::shutdown;

/// Errors produced by [`TelemetryListener`] construction.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The backend client could not be built.
    #[error("backend client: {0}")]
    Backend(#[from] SinkError),
}

/// Encodes events into points and pushes them into the cache.
///
/// One instance is shared by every registered handler. Methods here run
/// on the thread that fired the event and do no I/O.
struct Recorder {
    cache: Arc<Cache>,
    node_id: Arc<str>,
    /// Operator-supplied dimensions, key-sorted.
    extra: Vec<(String, String)>,
    events_table: Arc<str>,
    requests_table: Arc<str>,
    exceptions_table: Arc<str>,
}

impl Recorder {
    fn append<'a>(
        &'a self,
        table: &str,
        mut tags: Vec<(&'a str, Value)>,
        fields: &[(&'a str, Value)],
    ) {
        for (name, value) in &self.extra {
            tags.push((name.as_str(), Value::from(value.as_str())));
        }
        self.cache
            .append(table, encode(&tags, fields, SystemTime::now()));
    }

    fn request(
        &self,
        request_type: &str,
        name: &str,
        response_time: f64,
        response_length: u64,
        error: Option<&RequestError>,
    ) {
        let mut tags: Vec<(&str, Value)> = vec![
            ("node_id", Value::from(&*self.node_id)),
            ("request_type", Value::from(request_type)),
            ("name", Value::from(name)),
            ("success", Value::Bool(error.is_none())),
            (
                "exception",
                error.map_or(Value::None, |e| Value::from(e.to_string())),
            ),
        ];
        if let Some(RequestError::Http { status, .. }) = error {
            tags.push(("code", Value::Unsigned(u64::from(*status))));
        }
        let fields = [
            ("response_time", Value::Float(response_time)),
            ("response_length", Value::Unsigned(response_length)),
            ("counter", Value::Unsigned(1)),
        ];
        self.append(&self.requests_table, tags, &fields);
    }

    fn exception(&self, user: &str, error: &str, traceback: &str) {
        let tags = vec![("exception_tag", Value::from(error))];
        let fields = [
            ("node_id", Value::from(&*self.node_id)),
            ("user_instance", Value::from(user)),
            ("exception", Value::from(error)),
            ("traceback", Value::from(traceback)),
        ];
        self.append(&self.exceptions_table, tags, &fields);
    }

    fn lifecycle(&self, event: &str, user_count: u64) {
        let fields = [
            ("node_id", Value::from(&*self.node_id)),
            ("event", Value::from(event)),
            ("user_count", Value::Unsigned(user_count)),
        ];
        self.append(&self.events_table, Vec::new(), &fields);
    }
}

/// Subscribes to an [`EventBus`] and ships its events as data points.
#[derive(Debug)]
pub struct TelemetryListener {
    stop: Arc<Mutex<Option<shutdown::Broadcaster>>>,
    worker: Option<JoinHandle<()>>,
}

impl TelemetryListener {
    /// Attach a listener to `bus`, shipping to the HTTP backend described
    /// by `settings.backend`.
    ///
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be built. The host
    /// should log and carry on; load generation does not depend on this
    /// listener.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub async fn new(bus: &EventBus, settings: Settings, role: NodeRole) -> Result<Self, Error> {
        let backend = HttpBackend::new(&settings.backend)?;
        Ok(Self::with_backend(bus, settings, backend, role).await)
    }

    /// Attach a listener to `bus` using `backend` for provisioning and
    /// writes.
    ///
    /// Provisioning happens before any handler is registered: the
    /// database, then each table in events, requests, exceptions order.
    /// Conflicts mean somebody provisioned first and are logged as
    /// success; other provisioning failures are logged and tolerated.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub async fn with_backend<B>(
        bus: &EventBus,
        settings: Settings,
        backend: B,
        role: NodeRole,
    ) -> Self
    where
        B: Backend + 'static,
    {
        let backend = Arc::new(backend);
        provision(backend.as_ref(), &settings).await;

        let events_table: Arc<str> = Arc::from(settings.events_table.as_str());
        let requests_table: Arc<str> = Arc::from(settings.requests_table.as_str());
        let exceptions_table: Arc<str> = Arc::from(settings.exceptions_table.as_str());

        let cache = Arc::new(Cache::new(
            vec![
                Arc::clone(&events_table),
                Arc::clone(&requests_table),
                Arc::clone(&exceptions_table),
            ],
            settings.max_pending_points,
        ));

        let mut extra: Vec<(String, String)> = settings.extra_dimensions.into_iter().collect();
        extra.sort();

        let recorder = Arc::new(Recorder {
            cache: Arc::clone(&cache),
            node_id: Arc::from(role.as_str()),
            extra,
            events_table,
            requests_table,
            exceptions_table,
        });

        let (watcher, broadcaster) = shutdown::signal();
        let worker = flush::Worker::new(
            cache,
            backend,
            settings.database,
            Duration::from_millis(settings.interval_ms),
            watcher,
        );
        let handle = tokio::spawn(worker.spin());
        let stop = Arc::new(Mutex::new(Some(broadcaster)));

        {
            let recorder = Arc::clone(&recorder);
            bus.request_success.add_listener(move |event: &RequestSuccess| {
                recorder.request(
                    &event.request_type,
                    &event.name,
                    event.response_time,
                    event.response_length,
                    None,
                );
            });
        }
        {
            let recorder = Arc::clone(&recorder);
            bus.request_failure.add_listener(move |event: &RequestFailure| {
                recorder.request(
                    &event.request_type,
                    &event.name,
                    event.response_time,
                    event.response_length,
                    Some(&event.error),
                );
            });
        }
        {
            let recorder = Arc::clone(&recorder);
            bus.user_error.add_listener(move |event: &UserError| {
                recorder.exception(&event.user, &event.error, &event.traceback);
            });
        }
        {
            let recorder = Arc::clone(&recorder);
            bus.spawning_complete
                .add_listener(move |event: &SpawningComplete| {
                    recorder.lifecycle("spawning_complete", event.user_count);
                });
        }
        {
            let recorder = Arc::clone(&recorder);
            bus.test_stop.add_listener(move |_: &TestStop| {
                recorder.lifecycle("test_stopped", 0);
            });
        }
        {
            let recorder = Arc::clone(&recorder);
            let stop = Arc::clone(&stop);
            bus.quitting.add_listener(move |_: &Quitting| {
                recorder.lifecycle("quitting", 0);
                if let Some(broadcaster) = stop
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take()
                {
                    broadcaster.signal();
                }
            });
        }

        // The listener coming up is the test starting.
        recorder.lifecycle("test_started", 0);
        info!(node_id = role.as_str(), "telemetry listener attached");

        Self {
            stop,
            worker: Some(handle),
        }
    }

    /// Trip the stop notice and wait for the worker's final drain.
    ///
    /// Idempotent with the `quitting` event: whichever fires first stops
    /// the worker. Await this before process exit so the last buffered
    /// points reach the backend.
    pub async fn shutdown(mut self) {
        self.signal_stop();
        if let Some(worker) = self.worker.take() {
            if let Err(err) = worker.await {
                error!(error = %err, "flush worker task failed");
            }
        }
    }

    fn signal_stop(&self) {
        if let Some(broadcaster) = self
            .stop
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            broadcaster.signal();
        }
    }
}

impl Drop for TelemetryListener {
    fn drop(&mut self) {
        // A listener dropped without `shutdown` still stops the worker;
        // the final drain runs detached on the runtime.
        self.signal_stop();
    }
}

/// Ensure the database and the three tables exist.
async fn provision<B>(backend: &B, settings: &Settings)
where
    B: Backend,
{
    match backend.create_database(&settings.database).await {
        Ok(()) => info!(database = %settings.database, "database created"),
        Err(SinkError::AlreadyExists) => {
            info!(database = %settings.database, "database exists, skipping creation");
        }
        Err(err) => {
            warn!(database = %settings.database, error = %err, "database creation failed");
        }
    }

    let retention = settings.retention();
    for table in settings.table_names() {
        match backend
            .create_table(&settings.database, table, retention)
            .await
        {
            Ok(()) => info!(table, "table created"),
            Err(SinkError::AlreadyExists) => info!(table, "table exists, skipping creation"),
            Err(err) => warn!(table, error = %err, "table creation failed"),
        }
    }
}
