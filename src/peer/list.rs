use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};

use super::selector::{PeerSelector, RandomSelector};
use super::{Peer, PeerConfig};
use crate::conn::Connector;
use crate::{DebugLiteral, Error, HostPort};

/// A concurrent registry of [`Peer`]s, keyed by `host:port`.
///
/// Lists form a tree. The root list is the only one which creates peers; every other list
/// asks its parent, and so ultimately the root, for the peer and keeps a reference to it in its
/// own index. A given address therefore maps to exactly one [`Peer`] across the whole tree, and
/// one set of physical connections, no matter how many lists index it.
///
/// - A [child][PeerList::new_child] list's peers are always a subset of its parent's.
/// - A [sibling][PeerList::new_sibling] list shares the creator's root but starts with an empty
///   index of its own.
///
/// `PeerList` is a handle: clones refer to the same list.
pub struct PeerList<C: Connector> {
    inner: Arc<ListInner<C>>,
}

struct ListInner<C: Connector> {
    connector: Arc<C>,
    parent: Option<PeerList<C>>,
    selector: Arc<dyn PeerSelector<C>>,
    config: PeerConfig,
    peers: RwLock<Peers<C>>,
}

struct Peers<C: Connector> {
    by_host_port: HashMap<HostPort, Peer<C>>,
    ordered: Vec<Peer<C>>,
}

impl<C: Connector> Default for Peers<C> {
    fn default() -> Self {
        Self {
            by_host_port: HashMap::new(),
            ordered: Vec::new(),
        }
    }
}

impl<C: Connector> Peers<C> {
    fn get(&self, host_port: &str) -> Option<&Peer<C>> {
        self.by_host_port.get(host_port)
    }

    fn insert(&mut self, peer: Peer<C>) {
        self.by_host_port
            .insert(peer.host_port().clone(), peer.clone());
        self.ordered.push(peer);
    }
}

impl<C: Connector> Clone for PeerList<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<C: Connector> fmt::Debug for PeerList<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_root() { "root" } else { "derived" };
        f.debug_struct("PeerList")
            .field("kind", &DebugLiteral(kind))
            .field("peers", &self.len())
            .field("selector", &self.inner.selector)
            .finish()
    }
}

impl<C: Connector> PeerList<C> {
    /// Create a root list which dials through `connector` and selects peers at random.
    pub fn new(connector: C) -> Self {
        Builder::new(connector).build()
    }

    /// Create a builder for a root list.
    pub fn builder(connector: C) -> Builder<C> {
        Builder::new(connector)
    }

    fn derive(&self, parent: PeerList<C>) -> Self {
        Self {
            inner: Arc::new(ListInner {
                connector: self.inner.connector.clone(),
                parent: Some(parent),
                selector: self.inner.selector.clone(),
                config: self.inner.config.clone(),
                peers: RwLock::new(Peers::default()),
            }),
        }
    }

    /// Create a list whose peers are always also indexed by this list.
    ///
    /// Every peer added to the child is added to this list first.
    pub fn new_child(&self) -> Self {
        self.derive(self.clone())
    }

    /// Create a list with its own empty index which shares this list's root.
    ///
    /// The sibling has the same parent as this list, or this list as its parent when this list
    /// is the root, so it never creates peers of its own.
    pub fn new_sibling(&self) -> Self {
        let parent = self.inner.parent.clone().unwrap_or_else(|| self.clone());
        self.derive(parent)
    }

    /// Returns `true` if this list has no parent.
    pub fn is_root(&self) -> bool {
        self.inner.parent.is_none()
    }

    /// The root of this list's tree.
    pub fn root(&self) -> PeerList<C> {
        let mut list = self.clone();
        while let Some(parent) = list.inner.parent.clone() {
            list = parent;
        }
        list
    }

    /// The connector this list's peers dial through.
    pub fn connector(&self) -> &Arc<C> {
        &self.inner.connector
    }

    /// Returns `true` if both handles refer to the same list.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Arc::ptr_eq(&this.inner, &other.inner)
    }

    /// Number of peers indexed by this list.
    pub fn len(&self) -> usize {
        self.inner.peers.read().ordered.len()
    }

    /// Returns `true` if this list indexes no peers.
    pub fn is_empty(&self) -> bool {
        self.inner.peers.read().ordered.is_empty()
    }

    /// Returns `true` if this list indexes a peer for `host_port`.
    pub fn contains(&self, host_port: &str) -> bool {
        self.inner.peers.read().get(host_port).is_some()
    }

    fn lookup(&self, host_port: &str) -> Option<Peer<C>> {
        self.inner.peers.read().get(host_port).cloned()
    }

    /// Add a peer for `host_port` to this list, or return the peer already indexed.
    ///
    /// Only the root list creates peers. Other lists add the address to their parent and index
    /// the peer it returns, so concurrent calls for the same address anywhere in the tree
    /// converge on the same peer.
    pub fn add(&self, host_port: impl Into<HostPort>) -> Peer<C> {
        let host_port = host_port.into();

        if let Some(peer) = self.lookup(host_port.as_str()) {
            trace!(%host_port, "found existing peer");
            return peer;
        }

        let peer = match &self.inner.parent {
            None => {
                let mut peers = self.inner.peers.write();

                // Another thread may have inserted between the read and write locks.
                if let Some(peer) = peers.get(host_port.as_str()) {
                    trace!(%host_port, "peer added concurrently");
                    return peer.clone();
                }

                let peer = Peer::new(
                    self.inner.connector.clone(),
                    host_port,
                    self.inner.config.clone(),
                );
                peers.insert(peer.clone());
                return peer;
            }
            Some(parent) => {
                trace!(%host_port, "adding peer through parent");
                parent.add(host_port)
            }
        };

        let mut peers = self.inner.peers.write();
        if let Some(existing) = peers.get(peer.host_port().as_str()) {
            trace!(host_port = %peer.host_port(), "peer added concurrently");
            return existing.clone();
        }

        peers.insert(peer.clone());
        peer
    }

    /// Choose a peer with this list's [`PeerSelector`].
    ///
    /// Fails with [`Error::NoPeers`] when the list is empty.
    pub fn get(&self) -> Result<Peer<C>, Error> {
        let peers = self.inner.peers.read();

        if peers.ordered.is_empty() {
            trace!("no peers to choose from");
            return Err(Error::NoPeers);
        }

        Ok(self.inner.selector.choose_peer(&peers.ordered))
    }

    /// Return the peer indexed for `host_port`, adding one if there is none.
    pub fn get_or_add(&self, host_port: impl Into<HostPort>) -> Peer<C> {
        let host_port = host_port.into();
        match self.lookup(host_port.as_str()) {
            Some(peer) => peer,
            None => self.add(host_port),
        }
    }

    /// A copy of this list's index, from address to peer.
    ///
    /// Changing the returned map does not change the list.
    pub fn snapshot(&self) -> HashMap<HostPort, Peer<C>> {
        self.inner.peers.read().by_host_port.clone()
    }

    /// This list's peers, in the order they were added.
    pub fn peers(&self) -> Vec<Peer<C>> {
        self.inner.peers.read().ordered.clone()
    }

    /// Close the connections of every peer this list indexes.
    ///
    /// Peers are shared, so this also closes them for every other list in the tree which indexes
    /// them. The peers stay indexed.
    pub fn close(&self) {
        let peers = self.peers();
        debug!(peers = peers.len(), "closing peer list");

        for peer in peers {
            peer.close();
        }
    }
}

/// Builder for a root [`PeerList`].
pub struct Builder<C: Connector> {
    connector: Arc<C>,
    selector: Option<Arc<dyn PeerSelector<C>>>,
    config: PeerConfig,
}

impl<C: Connector> fmt::Debug for Builder<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("selector", &self.selector)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<C: Connector> Builder<C> {
    /// Create a builder dialing through `connector`.
    pub fn new(connector: C) -> Self {
        Self::shared(Arc::new(connector))
    }

    /// Create a builder dialing through a connector which is shared with its owner.
    pub fn shared(connector: Arc<C>) -> Self {
        Self {
            connector,
            selector: None,
            config: PeerConfig::default(),
        }
    }

    /// Use `selector` to choose peers. Lists derived from the built list inherit it.
    pub fn selector<S>(mut self, selector: S) -> Self
    where
        S: PeerSelector<C> + 'static,
    {
        let selector: Arc<dyn PeerSelector<C>> = Arc::new(selector);
        self.selector = Some(selector);
        self
    }

    /// Configure the peers this list creates.
    pub fn peer_config(mut self, config: PeerConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the root list.
    pub fn build(self) -> PeerList<C> {
        let selector: Arc<dyn PeerSelector<C>> = match self.selector {
            Some(selector) => selector,
            None => Arc::new(RandomSelector::new()),
        };

        PeerList {
            inner: Arc::new(ListInner {
                connector: self.connector,
                parent: None,
                selector,
                config: self.config,
                peers: RwLock::new(Peers::default()),
            }),
        }
    }
}
