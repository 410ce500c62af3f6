use std::sync::Arc;

use tracing::trace;

use crate::conn::{Connection, ConnectionState};

/// Which side opened a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Direction {
    Inbound,
    Outbound,
}

/// The inbound and outbound connections held by a peer, in the order they were added.
#[derive(Debug)]
pub(super) struct Connections<T> {
    inbound: Vec<Arc<T>>,
    outbound: Vec<Arc<T>>,
}

impl<T> Default for Connections<T> {
    fn default() -> Self {
        Self {
            inbound: Vec::new(),
            outbound: Vec::new(),
        }
    }
}

impl<T> Connections<T> {
    pub(super) fn push(&mut self, direction: Direction, connection: Arc<T>) {
        match direction {
            Direction::Inbound => self.inbound.push(connection),
            Direction::Outbound => self.outbound.push(connection),
        }
    }

    /// Every connection, inbound first.
    pub(super) fn iter(&self) -> impl Iterator<Item = &Arc<T>> {
        self.inbound.iter().chain(self.outbound.iter())
    }

    pub(super) fn inbound_len(&self) -> usize {
        self.inbound.len()
    }

    pub(super) fn outbound_len(&self) -> usize {
        self.outbound.len()
    }

    pub(super) fn len(&self) -> usize {
        self.inbound.len() + self.outbound.len()
    }
}

impl<T> Connections<T>
where
    T: Connection,
{
    pub(super) fn active(&self) -> Vec<Arc<T>> {
        self.iter().filter(|c| c.is_active()).cloned().collect()
    }

    /// Drop connections which report [`ConnectionState::Closed`], returning how many were removed.
    pub(super) fn prune_closed(&mut self) -> usize {
        let before = self.len();

        for list in [&mut self.inbound, &mut self.outbound] {
            list.retain(|c| {
                let closed = c.state() == ConnectionState::Closed;
                if closed {
                    trace!("found closed connection");
                }
                !closed
            });
        }

        before - self.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::conn::mock::MockConnection;

    #[test]
    fn verify_connections() {
        let mut conns = Connections::default();
        assert_eq!(conns.len(), 0);

        let dbg = format!("{:?}", conns);
        assert_eq!(dbg, "Connections { inbound: [], outbound: [] }");

        conns.push(Direction::Outbound, Arc::new(MockConnection::active()));
        conns.push(Direction::Inbound, Arc::new(MockConnection::active()));

        assert_eq!(conns.inbound_len(), 1);
        assert_eq!(conns.outbound_len(), 1);
        assert_eq!(conns.len(), 2);
    }

    #[test]
    fn inbound_iterated_first() {
        let mut conns = Connections::default();
        let outbound = Arc::new(MockConnection::active());
        let inbound = Arc::new(MockConnection::active());

        conns.push(Direction::Outbound, outbound.clone());
        conns.push(Direction::Inbound, inbound.clone());

        let order: Vec<_> = conns.iter().map(|c| c.id()).collect();
        assert_eq!(order, vec![inbound.id(), outbound.id()]);
    }

    #[test]
    fn active_filters() {
        let mut conns = Connections::default();
        let active = Arc::new(MockConnection::active());
        let closing = Arc::new(MockConnection::new(ConnectionState::StartClose));

        conns.push(Direction::Outbound, active.clone());
        conns.push(Direction::Outbound, closing);

        let found = conns.active();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id(), active.id());
    }

    #[test]
    fn prune_only_closed() {
        let mut conns = Connections::default();
        let closed = Arc::new(MockConnection::active());
        closed.close();

        conns.push(Direction::Inbound, closed);
        conns.push(
            Direction::Inbound,
            Arc::new(MockConnection::new(ConnectionState::StartClose)),
        );
        conns.push(Direction::Outbound, Arc::new(MockConnection::active()));

        assert_eq!(conns.prune_closed(), 1);
        assert_eq!(conns.inbound_len(), 1);
        assert_eq!(conns.outbound_len(), 1);
        assert_eq!(conns.prune_closed(), 0);
    }
}
