//! The event surface of the load-generation harness.
//!
//! The harness owns an [`EventBus`] and fires events into it as the test
//! runs; interested parties register handlers on the individual hooks.
//! Handlers run synchronously on whatever thread fires the event, in
//! registration order, so they must return quickly and must not panic.
//! The telemetry listener's handlers only encode a point and push it into
//! the cache; all I/O happens elsewhere.

use std::fmt;
use std::sync::{PoisonError, RwLock};

/// A successful request observation.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSuccess {
    /// Protocol or method label, `GET` and the like.
    pub request_type: String,
    /// Request name, typically the path.
    pub name: String,
    /// Response latency in milliseconds.
    pub response_time: f64,
    /// Response body length in bytes.
    pub response_length: u64,
}

/// A failed request observation.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestFailure {
    /// Protocol or method label, `GET` and the like.
    pub request_type: String,
    /// Request name, typically the path.
    pub name: String,
    /// Latency until the failure, in milliseconds.
    pub response_time: f64,
    /// Response body length in bytes, zero when nothing arrived.
    pub response_length: u64,
    /// What went wrong.
    pub error: RequestError,
}

/// The failure carried by a [`RequestFailure`] event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// The server answered with an error status.
    Http {
        /// Status code the server answered with.
        status: u16,
        /// Human-readable description.
        message: String,
    },
    /// Anything else: connection refused, timeout, protocol violation.
    Other {
        /// Human-readable description.
        message: String,
    },
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::Http { status, message } => write!(f, "HTTPError({status}): {message}"),
            RequestError::Other { message } => f.write_str(message),
        }
    }
}

/// An error raised by a simulated user outside the request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserError {
    /// Description of the user instance that raised.
    pub user: String,
    /// Description of the error.
    pub error: String,
    /// Formatted stack trace, empty when none was captured.
    pub traceback: String,
}

/// All requested users have finished spawning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpawningComplete {
    /// Number of users now running.
    pub user_count: u64,
}

/// The test has stopped; users are winding down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestStop {
    /// Number of users running when the stop was requested.
    pub user_count: u64,
}

/// The process is about to exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Quitting;

type Callback<T> = Box<dyn Fn(&T) + Send + Sync>;

/// A registration point for handlers of one event type.
pub struct Hook<T> {
    listeners: RwLock<Vec<Callback<T>>>,
}

impl<T> fmt::Debug for Hook<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        f.debug_struct("Hook").field("listeners", &len).finish()
    }
}

impl<T> Default for Hook<T> {
    fn default() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
        }
    }
}

impl<T> Hook<T> {
    /// Register `listener` to run on every subsequent fire.
    pub fn add_listener<F>(&self, listener: F)
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(listener));
    }

    /// Run every registered listener against `event`, in registration
    /// order. Firing with no listeners is a no-op.
    pub fn fire(&self, event: &T) {
        let listeners = self.listeners.read().unwrap_or_else(PoisonError::into_inner);
        for listener in listeners.iter() {
            listener(event);
        }
    }
}

/// The set of event channels the harness exposes.
#[derive(Debug, Default)]
pub struct EventBus {
    /// Fired on every successful request.
    pub request_success: Hook<RequestSuccess>,
    /// Fired on every failed request.
    pub request_failure: Hook<RequestFailure>,
    /// Fired when a simulated user raises outside the request path.
    pub user_error: Hook<UserError>,
    /// Fired once all requested users have spawned.
    pub spawning_complete: Hook<SpawningComplete>,
    /// Fired when the test stops.
    pub test_stop: Hook<TestStop>,
    /// Fired when the process is about to exit.
    pub quitting: Hook<Quitting>,
}

impl EventBus {
    /// A bus with no listeners registered on any channel.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}
