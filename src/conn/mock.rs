//! Mock connections and connectors for exercising peers without a network.

use std::fmt;
use std::future::{pending, ready};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::FutureExt as _;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::trace;

use super::{CallOptions, Connection, ConnectionOptions, ConnectionState, Connector};
use crate::{BoxFuture, CallContext, HostPort};

static IDENT: AtomicUsize = AtomicUsize::new(1);

/// Identifies a mock connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(usize);

impl ConnectionId {
    fn new() -> Self {
        Self(IDENT.fetch_add(1, Ordering::SeqCst))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Error returned by [`MockConnector`] when configured to fail.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("connection error")]
pub struct MockConnectionError;

/// Error returned by [`MockConnection`] when configured to fail calls.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("mock call error")]
pub struct MockCallError;

/// A call started on a [`MockConnection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    /// The connection which carried the call.
    pub connection: ConnectionId,
    /// Service name.
    pub service: String,
    /// Operation name.
    pub operation: String,
    /// Options the call was started with.
    pub options: CallOptions,
}

/// A connection whose state is set by the test.
#[derive(Debug)]
pub struct MockConnection {
    ident: ConnectionId,
    host_port: Option<HostPort>,
    state: Mutex<ConnectionState>,
    fail_calls: AtomicBool,
    hang_calls: AtomicBool,
    calls: AtomicUsize,
    closes: AtomicUsize,
}

impl MockConnection {
    /// A new connection in `state`.
    pub fn new(state: ConnectionState) -> Self {
        let conn = Self {
            ident: ConnectionId::new(),
            host_port: None,
            state: Mutex::new(state),
            fail_calls: AtomicBool::new(false),
            hang_calls: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
        };
        trace!(id=%conn.id(), %state, "creating connection");
        conn
    }

    /// A new active connection.
    pub fn active() -> Self {
        Self::new(ConnectionState::Active)
    }

    fn dialed(host_port: HostPort, state: ConnectionState) -> Self {
        Self {
            host_port: Some(host_port),
            ..Self::new(state)
        }
    }

    /// The connection's identity.
    pub fn id(&self) -> ConnectionId {
        self.ident
    }

    /// The address this connection was dialed to, if it came from a [`MockConnector`].
    pub fn host_port(&self) -> Option<&HostPort> {
        self.host_port.as_ref()
    }

    /// Move the connection to `state`.
    pub fn set_state(&self, state: ConnectionState) {
        *self.state.lock() = state;
    }

    /// Make every following `begin_call` fail.
    pub fn fail_calls(&self) {
        self.fail_calls.store(true, Ordering::SeqCst);
    }

    /// Make every following `begin_call` wait forever.
    pub fn hang_calls(&self) {
        self.hang_calls.store(true, Ordering::SeqCst);
    }

    /// Number of calls started on this connection.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of times `close` was invoked.
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl Connection for MockConnection {
    type Call = MockCall;
    type Error = MockCallError;

    fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    fn begin_call(
        &self,
        _ctx: &CallContext,
        service: &str,
        options: &CallOptions,
        operation: &str,
    ) -> BoxFuture<'static, Result<MockCall, MockCallError>> {
        if self.fail_calls.load(Ordering::SeqCst) {
            return ready(Err(MockCallError)).boxed();
        }

        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hang_calls.load(Ordering::SeqCst) {
            return pending().boxed();
        }

        ready(Ok(MockCall {
            connection: self.ident,
            service: service.to_owned(),
            operation: operation.to_owned(),
            options: options.clone(),
        }))
        .boxed()
    }

    fn close(&self) {
        trace!(id=%self.ident, "closing connection");
        self.closes.fetch_add(1, Ordering::SeqCst);
        *self.state.lock() = ConnectionState::Closed;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectMode {
    Produce(ConnectionState),
    Error,
    Hang,
}

/// A connector which counts dials and produces [`MockConnection`]s.
#[derive(Debug)]
pub struct MockConnector {
    mode: Mutex<ConnectMode>,
    delay: Option<Duration>,
    options: ConnectionOptions,
    connects: AtomicUsize,
    dialed: Mutex<Vec<(HostPort, ConnectionOptions)>>,
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl MockConnector {
    fn with_mode(mode: ConnectMode) -> Self {
        Self {
            mode: Mutex::new(mode),
            delay: None,
            options: ConnectionOptions::default(),
            connects: AtomicUsize::new(0),
            dialed: Mutex::new(Vec::new()),
        }
    }

    /// A connector producing active connections.
    pub fn new() -> Self {
        Self::with_mode(ConnectMode::Produce(ConnectionState::Active))
    }

    /// A connector whose dials always fail.
    pub fn error() -> Self {
        Self::with_mode(ConnectMode::Error)
    }

    /// A connector whose dials never complete.
    pub fn hang() -> Self {
        Self::with_mode(ConnectMode::Hang)
    }

    /// A connector producing connections already in `state`.
    pub fn producing(state: ConnectionState) -> Self {
        Self::with_mode(ConnectMode::Produce(state))
    }

    /// Wait `delay` before each dial completes.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Report `options` from [`Connector::connection_options`].
    pub fn options(mut self, options: ConnectionOptions) -> Self {
        self.options = options;
        self
    }

    /// Make following dials fail.
    pub fn fail(&self) {
        *self.mode.lock() = ConnectMode::Error;
    }

    /// Number of dials attempted.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Every address dialed so far, with the options used.
    pub fn dialed(&self) -> Vec<(HostPort, ConnectionOptions)> {
        self.dialed.lock().clone()
    }
}

impl Connector for MockConnector {
    type Connection = MockConnection;
    type Error = MockConnectionError;

    fn connect(
        &self,
        _ctx: &CallContext,
        host_port: &HostPort,
        options: &ConnectionOptions,
    ) -> BoxFuture<'static, Result<MockConnection, MockConnectionError>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.dialed
            .lock()
            .push((host_port.clone(), options.clone()));

        let mode = *self.mode.lock();
        let delay = self.delay;
        let host_port = host_port.clone();

        async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            match mode {
                ConnectMode::Produce(state) => Ok(MockConnection::dialed(host_port, state)),
                ConnectMode::Error => Err(MockConnectionError),
                ConnectMode::Hang => pending().await,
            }
        }
        .boxed()
    }

    fn connection_options(&self) -> ConnectionOptions {
        self.options.clone()
    }
}

#[test]
fn verify_mock() {
    let conn = MockConnection::active();
    assert!(conn.is_active());
    assert_eq!(conn.close_count(), 0);

    conn.close();
    assert_eq!(conn.state(), ConnectionState::Closed);
    assert_eq!(conn.close_count(), 1);

    let other = MockConnection::new(ConnectionState::StartClose);
    assert_ne!(conn.id(), other.id());
    assert!(!other.is_active());

    let dbg = format!("{:?}", other);
    assert!(dbg.starts_with("MockConnection { "));
}
