//! Strategies for choosing one peer out of a list.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::Peer;
use crate::conn::Connector;
use crate::SharedRng;

/// Chooses the peer which will carry a call.
///
/// [`PeerList::get`][super::PeerList::get] calls [`PeerSelector::choose_peer`] with the list's
/// peers in insertion order, and never with an empty slice.
///
/// # Note
///
/// `choose_peer` runs while the list's index is locked. Selectors must not call back into the
/// [`PeerList`][super::PeerList] they choose for.
pub trait PeerSelector<C: Connector>: Send + Sync + fmt::Debug {
    /// Choose one of `peers`.
    fn choose_peer(&self, peers: &[Peer<C>]) -> Peer<C>;
}

#[derive(Clone, Default)]
struct Source(Option<Arc<SharedRng>>);

impl Source {
    fn index(&self, len: usize) -> usize {
        match &self.0 {
            Some(rng) => rng.index(len),
            None => SharedRng::global().index(len),
        }
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(_) => f.write_str("seeded"),
            None => f.write_str("global"),
        }
    }
}

/// Chooses uniformly at random. This is the default selector.
#[derive(Debug, Clone, Default)]
pub struct RandomSelector {
    source: Source,
}

impl RandomSelector {
    /// A selector drawing from the process-wide random source.
    pub fn new() -> Self {
        Self::default()
    }

    /// A selector with its own seeded random source.
    pub fn seeded(seed: u64) -> Self {
        Self {
            source: Source(Some(Arc::new(SharedRng::seeded(seed)))),
        }
    }
}

impl<C: Connector> PeerSelector<C> for RandomSelector {
    fn choose_peer(&self, peers: &[Peer<C>]) -> Peer<C> {
        peers[self.source.index(peers.len())].clone()
    }
}

/// Walks the peers in insertion order, wrapping around.
///
/// The cursor is shared by every list using this selector.
#[derive(Debug, Default)]
pub struct RoundRobin {
    next: AtomicUsize,
}

impl RoundRobin {
    /// A selector starting from the first peer.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<C: Connector> PeerSelector<C> for RoundRobin {
    fn choose_peer(&self, peers: &[Peer<C>]) -> Peer<C> {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % peers.len();
        peers[index].clone()
    }
}

/// Chooses at random among peers with an active connection, so calls avoid a dial when one
/// can be avoided. Falls back to every peer when none are connected.
#[derive(Debug, Clone, Default)]
pub struct PreferActive {
    source: Source,
}

impl PreferActive {
    /// A selector drawing from the process-wide random source.
    pub fn new() -> Self {
        Self::default()
    }

    /// A selector with its own seeded random source.
    pub fn seeded(seed: u64) -> Self {
        Self {
            source: Source(Some(Arc::new(SharedRng::seeded(seed)))),
        }
    }
}

impl<C: Connector> PeerSelector<C> for PreferActive {
    fn choose_peer(&self, peers: &[Peer<C>]) -> Peer<C> {
        let connected: Vec<&Peer<C>> = peers
            .iter()
            .filter(|peer| peer.has_active_connection())
            .collect();

        if connected.is_empty() {
            return peers[self.source.index(peers.len())].clone();
        }

        connected[self.source.index(connected.len())].clone()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use static_assertions::assert_impl_all;

    use super::*;
    use crate::conn::mock::{MockConnection, MockConnector};
    use crate::PeerConfig;

    assert_impl_all!(RandomSelector: PeerSelector<MockConnector>, Clone);
    assert_impl_all!(RoundRobin: PeerSelector<MockConnector>);
    assert_impl_all!(PreferActive: PeerSelector<MockConnector>, Clone);

    fn peers(n: usize) -> Vec<Peer<MockConnector>> {
        let connector = Arc::new(MockConnector::new());
        (0..n)
            .map(|i| {
                Peer::new(
                    connector.clone(),
                    format!("10.0.0.{i}:4040").into(),
                    PeerConfig::default(),
                )
            })
            .collect()
    }

    #[test]
    fn round_robin_wraps() {
        let peers = peers(3);
        let selector = RoundRobin::new();

        let chosen: Vec<_> = (0..6)
            .map(|_| selector.choose_peer(&peers).host_port().to_string())
            .collect();

        assert_eq!(
            chosen,
            vec![
                "10.0.0.0:4040",
                "10.0.0.1:4040",
                "10.0.0.2:4040",
                "10.0.0.0:4040",
                "10.0.0.1:4040",
                "10.0.0.2:4040",
            ]
        );
    }

    #[test]
    fn random_covers_all() {
        let peers = peers(4);
        let selector = RandomSelector::seeded(42);

        let seen: HashSet<_> = (0..200)
            .map(|_| selector.choose_peer(&peers).host_port().clone())
            .collect();
        assert_eq!(seen.len(), 4);
    }

    #[test]
    fn random_single() {
        let peers = peers(1);
        let chosen = RandomSelector::new().choose_peer(&peers);
        assert!(Peer::ptr_eq(&chosen, &peers[0]));
    }

    #[test]
    fn prefer_active() {
        let peers = peers(4);
        peers[2]
            .add_outbound_connection(MockConnection::active())
            .unwrap();

        let selector = PreferActive::seeded(7);
        for _ in 0..50 {
            assert!(Peer::ptr_eq(&selector.choose_peer(&peers), &peers[2]));
        }
    }

    #[test]
    fn prefer_active_falls_back() {
        let peers = peers(3);
        let selector = PreferActive::seeded(7);

        let seen: HashSet<_> = (0..100)
            .map(|_| selector.choose_peer(&peers).host_port().clone())
            .collect();
        assert_eq!(seen.len(), 3);
    }
}
