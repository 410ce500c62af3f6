//! Peers and peer lists.
//!
//! A [`Peer`] is the logical view of one remote `host:port` and the physical connections to it.
//! Peers are created by the root of a [`PeerList`] tree and shared by reference with every other
//! list in the tree, so one address never maps to two connection pools.
//!
//! Asking a peer for a connection prefers one which is already active, choosing uniformly at
//! random when there are several (for example, an accepted inbound connection and a dialed
//! outbound one). Only when none are active does the peer dial a new outbound connection.
//!
//! Peer behavior is configured with [`PeerConfig`], and the choice of peer within a list is
//! delegated to a [`PeerSelector`].

use std::fmt;
use std::sync::Arc;

use futures_util::FutureExt as _;
use parking_lot::RwLock;
use tracing::{debug, trace, warn};

use crate::conn::{CallOf, CallOptions, Connection as _, ConnectionOf, Connector};
use crate::{CallContext, Error, HostPort, SharedRng};

mod connections;
mod list;
mod selector;

use self::connections::{Connections, Direction};
pub use self::list::{Builder, PeerList};
pub use self::selector::{PeerSelector, PreferActive, RandomSelector, RoundRobin};

/// Configuration for the peers created by a [`PeerList`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct PeerConfig {
    /// Remove closed connections from a peer's lists while looking for an active one.
    ///
    /// When `false`, connections stay in the lists for the life of the peer and only
    /// [`Peer::prune_closed`] removes them.
    pub prune_closed: bool,
}

impl PeerConfig {
    /// Configuration which prunes closed connections on access.
    pub fn pruning() -> Self {
        Self { prune_closed: true }
    }
}

/// Number of connections a peer holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionCount {
    /// Connections accepted from the remote side.
    pub inbound: usize,
    /// Connections dialed to the remote side.
    pub outbound: usize,
    /// Connections, of either direction, which are currently active.
    pub active: usize,
}

/// A remote service or client with a unique `host:port`, and its connections.
///
/// `Peer` is a handle: clones refer to the same peer. Use [`Peer::ptr_eq`] to test identity.
pub struct Peer<C: Connector> {
    inner: Arc<PeerInner<C>>,
}

struct PeerInner<C: Connector> {
    connector: Arc<C>,
    host_port: HostPort,
    config: PeerConfig,
    connections: RwLock<Connections<ConnectionOf<C>>>,
}

impl<C: Connector> Clone for Peer<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<C: Connector> fmt::Debug for Peer<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.connection_count();
        f.debug_struct("Peer")
            .field("host_port", &self.inner.host_port)
            .field("inbound", &count.inbound)
            .field("outbound", &count.outbound)
            .finish()
    }
}

impl<C: Connector> Peer<C> {
    pub(crate) fn new(connector: Arc<C>, host_port: HostPort, config: PeerConfig) -> Self {
        trace!(%host_port, "creating peer");
        Self {
            inner: Arc::new(PeerInner {
                connector,
                host_port,
                config,
                connections: RwLock::new(Connections::default()),
            }),
        }
    }

    /// The `host:port` used to connect to this peer.
    pub fn host_port(&self) -> &HostPort {
        &self.inner.host_port
    }

    /// Returns `true` if both handles refer to the same peer.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Arc::ptr_eq(&this.inner, &other.inner)
    }

    /// Counts of this peer's connections.
    pub fn connection_count(&self) -> ConnectionCount {
        let connections = self.inner.connections.read();
        ConnectionCount {
            inbound: connections.inbound_len(),
            outbound: connections.outbound_len(),
            active: connections.iter().filter(|c| c.is_active()).count(),
        }
    }

    /// Returns `true` if at least one connection to this peer is active.
    pub fn has_active_connection(&self) -> bool {
        self.inner
            .connections
            .read()
            .iter()
            .any(|c| c.is_active())
    }

    /// Remove connections which are closed, returning how many were removed.
    pub fn prune_closed(&self) -> usize {
        let removed = self.inner.connections.write().prune_closed();
        if removed > 0 {
            debug!(host_port = %self.inner.host_port, removed, "pruned closed connections");
        }
        removed
    }

    fn active_connections(&self) -> Vec<Arc<ConnectionOf<C>>> {
        if self.inner.config.prune_closed {
            let mut connections = self.inner.connections.write();
            connections.prune_closed();
            connections.active()
        } else {
            self.inner.connections.read().active()
        }
    }

    /// Returns an active connection to this peer.
    ///
    /// If several connections are active, one is chosen at random. If none are, a new outbound
    /// connection is dialed and returned. Dial failures are returned as-is, never retried.
    #[cfg_attr(not(tarpaulin), tracing::instrument(skip_all, fields(host_port = %self.inner.host_port), level = "debug"))]
    pub async fn get_connection(&self, ctx: &CallContext) -> Result<Arc<ConnectionOf<C>>, Error> {
        let mut active = self.active_connections();
        if !active.is_empty() {
            trace!(candidates = active.len(), "reusing active connection");
            let index = SharedRng::global().index(active.len());
            return Ok(active.swap_remove(index));
        }

        trace!("no active connections, connecting");
        self.connect(ctx).await
    }

    /// Dial a new outbound connection to this peer and add it to the peer's connections.
    #[cfg_attr(not(tarpaulin), tracing::instrument(skip_all, fields(host_port = %self.inner.host_port), level = "debug"))]
    pub async fn connect(&self, ctx: &CallContext) -> Result<Arc<ConnectionOf<C>>, Error> {
        ctx.check()?;

        let options = self.inner.connector.connection_options();
        let connecting = self
            .inner
            .connector
            .connect(ctx, &self.inner.host_port, &options)
            .map(|outcome| outcome.map_err(|error| Error::Connecting(error.into())));

        let connection = Arc::new(ctx.bound(connecting).await.inspect_err(|error| {
            debug!(%error, "connection failed");
        })?);

        if let Err(error) = self.add_outbound_connection(connection.clone()) {
            warn!(state = %connection.state(), "dialed connection is not usable");
            connection.close();
            return Err(error);
        }

        debug!("connected");
        Ok(connection)
    }

    /// Add a connection accepted from the remote side.
    ///
    /// Fails with [`Error::InvalidConnectionState`] unless the connection is active or starting to close.
    pub fn add_inbound_connection(
        &self,
        connection: impl Into<Arc<ConnectionOf<C>>>,
    ) -> Result<(), Error> {
        self.add_connection(Direction::Inbound, connection.into())
    }

    /// Add a connection dialed to the remote side.
    ///
    /// Fails with [`Error::InvalidConnectionState`] unless the connection is active or starting to close.
    pub fn add_outbound_connection(
        &self,
        connection: impl Into<Arc<ConnectionOf<C>>>,
    ) -> Result<(), Error> {
        self.add_connection(Direction::Outbound, connection.into())
    }

    fn add_connection(
        &self,
        direction: Direction,
        connection: Arc<ConnectionOf<C>>,
    ) -> Result<(), Error> {
        let state = connection.state();
        if !state.can_register() {
            trace!(host_port = %self.inner.host_port, ?direction, %state, "rejecting connection");
            return Err(Error::InvalidConnectionState(state));
        }

        trace!(host_port = %self.inner.host_port, ?direction, %state, "adding connection");
        self.inner.connections.write().push(direction, connection);
        Ok(())
    }

    /// Start a call to `operation` on `service` over a connection to this peer.
    ///
    /// Uses [`CallOptions::default`] when `options` is `None`.
    #[cfg_attr(not(tarpaulin), tracing::instrument(skip_all, fields(host_port = %self.inner.host_port, %service, %operation), level = "debug"))]
    pub async fn begin_call(
        &self,
        ctx: &CallContext,
        service: &str,
        operation: &str,
        options: Option<&CallOptions>,
    ) -> Result<CallOf<C>, Error> {
        let connection = self.get_connection(ctx).await?;
        ctx.check()?;

        let options = options.cloned().unwrap_or_default();
        let call = connection
            .begin_call(ctx, service, &options, operation)
            .map(|outcome| outcome.map_err(|error| Error::Call(error.into())));

        ctx.bound(call).await
    }

    /// Close every connection to this peer, inbound first.
    ///
    /// The connections stay in the peer's lists.
    pub fn close(&self) {
        let connections: Vec<_> = self.inner.connections.read().iter().cloned().collect();
        debug!(host_port = %self.inner.host_port, connections = connections.len(), "closing peer");

        for connection in connections {
            connection.close();
        }
    }
}
