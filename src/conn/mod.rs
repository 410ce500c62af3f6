//! Collaborator contracts for connections and connectors.
//!
//! The peer registry does not frame messages or drive a connection's lifecycle. It needs three
//! things from the transport underneath it:
//!
//! ## Connection
//!
//! A single bidirectional link to a remote address. Connections implement the [`Connection`] trait,
//! which reports a [`ConnectionState`], begins outbound calls, and closes the link. Peers hold their
//! connections behind an [`Arc`][std::sync::Arc] and hand out shared references to callers.
//!
//! ## Connector
//!
//! The capability to dial a new connection to an address. Connectors implement the [`Connector`]
//! trait. Any `tower::Service` accepting a [`ConnectRequest`] can be used as a connector with
//! [`ServiceConnector`].
//!
//! ## Options
//!
//! [`ConnectionOptions`] are handed to the connector on every dial, and [`CallOptions`] to the
//! connection on every call.

use std::fmt;

use crate::{BoxError, BoxFuture, CallContext, HostPort};

#[cfg(any(test, feature = "mocks"))]
pub mod mock;
mod options;
mod service;

pub use self::options::{CallOptions, ChecksumType, ConnectionOptions, Format};
pub use self::service::{ConnectRequest, ServiceConnector};

/// Lifecycle state of a [`Connection`], as observed at a single instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ConnectionState {
    /// The connection can carry new calls.
    Active,

    /// The connection has begun closing; calls already in flight may finish.
    StartClose,

    /// The remote side has stopped sending, outbound calls may still drain.
    InboundClosed,

    /// The connection is closed.
    Closed,
}

impl ConnectionState {
    /// Returns `true` if new calls may be started on the connection.
    pub fn is_active(self) -> bool {
        matches!(self, ConnectionState::Active)
    }

    /// Returns `true` if a peer will accept a connection in this state into its pool.
    pub fn can_register(self) -> bool {
        matches!(self, ConnectionState::Active | ConnectionState::StartClose)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Active => f.write_str("active"),
            ConnectionState::StartClose => f.write_str("start-close"),
            ConnectionState::InboundClosed => f.write_str("inbound-closed"),
            ConnectionState::Closed => f.write_str("closed"),
        }
    }
}

/// A physical connection to one remote address.
///
/// Connections are shared between a peer's pool and any number of callers, so every method
/// takes `&self`.
pub trait Connection: Send + Sync + 'static {
    /// Handle to a call in flight, used to write the call's arguments.
    type Call: Send + 'static;

    /// The error type returned when a call can't be started.
    type Error: Into<BoxError> + Send + 'static;

    /// The current lifecycle state.
    fn state(&self) -> ConnectionState;

    /// Returns `true` if the connection can carry new calls.
    fn is_active(&self) -> bool {
        self.state().is_active()
    }

    /// Start a call to `operation` on `service`.
    fn begin_call(
        &self,
        ctx: &CallContext,
        service: &str,
        options: &CallOptions,
        operation: &str,
    ) -> BoxFuture<'static, Result<Self::Call, Self::Error>>;

    /// Close the connection.
    fn close(&self);
}

/// Capability to establish new outbound connections.
///
/// This is usually implemented by the channel or transport which owns the root
/// [`PeerList`][crate::PeerList].
pub trait Connector: Send + Sync + 'static {
    /// The connection type produced.
    type Connection: Connection;

    /// The error type returned when a connection can't be established.
    type Error: Into<BoxError> + Send + 'static;

    /// Dial `host_port` with the given options.
    fn connect(
        &self,
        ctx: &CallContext,
        host_port: &HostPort,
        options: &ConnectionOptions,
    ) -> BoxFuture<'static, Result<Self::Connection, Self::Error>>;

    /// The options new connections should currently be made with.
    fn connection_options(&self) -> ConnectionOptions;
}

/// Call type produced by a connector's connections.
pub type CallOf<C> = <<C as Connector>::Connection as Connection>::Call;

/// Connection type produced by a connector.
pub type ConnectionOf<C> = <C as Connector>::Connection;
