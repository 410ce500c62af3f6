use thiserror::Error;

use crate::conn::ConnectionState;
use crate::BoxError;

/// Errors returned by peer lists and peers.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The peer list has no peers to choose from.
    #[error("no peers available")]
    NoPeers,

    /// A connection was offered to a peer while not active or closing.
    #[error("connection is in an invalid state: {0}")]
    InvalidConnectionState(ConnectionState),

    /// The connector failed to establish a new connection.
    #[error("connecting: {0}")]
    Connecting(#[source] BoxError),

    /// The connection failed to begin a call.
    #[error("call: {0}")]
    Call(#[source] BoxError),

    /// The caller's context was canceled.
    #[error("context canceled")]
    Canceled,

    /// The caller's deadline passed.
    #[error("deadline exceeded")]
    Timeout,
}

impl Error {
    /// Returns `true` if this error came from the caller's context rather than the remote peer.
    pub fn is_context(&self) -> bool {
        matches!(self, Error::Canceled | Error::Timeout)
    }
}
