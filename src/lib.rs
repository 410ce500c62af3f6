//! Switchyard
//!
//! Peer and connection management for RPC transport clients.
//!
//! A [`PeerList`] is a concurrent registry of [`Peer`]s keyed by `host:port`. Lists compose into a tree
//! (a root, its children, and siblings) so that several call-routing scopes can share one physical
//! set of connections: only the root list ever creates a [`Peer`], and every other list indexes the
//! root's instances by reference.
//!
//! A [`Peer`] owns the inbound and outbound connections to one remote address. Asking a peer for a
//! connection reuses an active one when it can, and otherwise dials a new outbound connection through
//! the [`Connector`][conn::Connector] the list was built with.
//!
//! ```no_run
//! # use switchyard::{CallContext, PeerList};
//! # use switchyard::conn::Connector;
//! # async fn run<C: Connector>(connector: C) -> Result<(), switchyard::Error> {
//! let peers = PeerList::new(connector);
//! peers.add("10.0.0.1:4040");
//!
//! let ctx = CallContext::with_timeout(std::time::Duration::from_secs(1));
//! let peer = peers.get()?;
//! let call = peer.begin_call(&ctx, "keyvalue", "KeyValue::get", None).await?;
//! # drop(call);
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

use std::fmt;

pub mod conn;
mod context;
mod error;
mod host_port;
pub mod peer;
mod rng;

pub use self::context::CallContext;
pub use self::error::Error;
pub use self::host_port::{HostPort, HostPortError};
pub use self::peer::{Peer, PeerConfig, PeerList};
pub use self::rng::SharedRng;

/// Boxed error type used for failures coming from external collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Boxed future type used by the collaborator traits.
pub type BoxFuture<'a, T> = futures_util::future::BoxFuture<'a, T>;

pub(crate) struct DebugLiteral<T: fmt::Display>(T);

impl<T: fmt::Display> fmt::Debug for DebugLiteral<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
