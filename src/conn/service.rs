//! Adapts `tower` services into [`Connector`]s.

use std::fmt;

use futures_util::FutureExt as _;
use parking_lot::RwLock;
use tower::ServiceExt as _;

use super::{Connection, ConnectionOptions, Connector};
use crate::{BoxError, BoxFuture, CallContext, HostPort};

/// Request handed to a connecting service: where to dial and how.
#[derive(Debug, Clone)]
pub struct ConnectRequest {
    host_port: HostPort,
    options: ConnectionOptions,
    context: CallContext,
}

impl ConnectRequest {
    /// Create a new connection request.
    pub fn new(host_port: HostPort, options: ConnectionOptions, context: CallContext) -> Self {
        Self {
            host_port,
            options,
            context,
        }
    }

    /// The address to dial.
    pub fn host_port(&self) -> &HostPort {
        &self.host_port
    }

    /// Options for the new connection.
    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    /// The caller's context.
    pub fn context(&self) -> &CallContext {
        &self.context
    }
}

/// A [`Connector`] backed by a `tower::Service` which accepts a [`ConnectRequest`] and returns
/// a connection.
///
/// The service is cloned for each dial and driven with `oneshot`, so readiness is respected.
pub struct ServiceConnector<S> {
    service: S,
    options: RwLock<ConnectionOptions>,
}

impl<S> ServiceConnector<S> {
    /// Wrap `service`, dialing with default connection options.
    pub fn new(service: S) -> Self {
        Self::with_options(service, ConnectionOptions::default())
    }

    /// Wrap `service`, dialing with `options`.
    pub fn with_options(service: S, options: ConnectionOptions) -> Self {
        Self {
            service,
            options: RwLock::new(options),
        }
    }

    /// Replace the options used for connections dialed from now on.
    pub fn set_connection_options(&self, options: ConnectionOptions) {
        *self.options.write() = options;
    }

    /// The wrapped service.
    pub fn service(&self) -> &S {
        &self.service
    }
}

impl<S> fmt::Debug for ServiceConnector<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConnector")
            .field("options", &*self.options.read())
            .finish_non_exhaustive()
    }
}

impl<S, C> Connector for ServiceConnector<S>
where
    S: tower::Service<ConnectRequest, Response = C> + Clone + Send + Sync + 'static,
    S::Future: Send + 'static,
    S::Error: Into<BoxError> + Send + 'static,
    C: Connection,
{
    type Connection = C;
    type Error = S::Error;

    fn connect(
        &self,
        ctx: &CallContext,
        host_port: &HostPort,
        options: &ConnectionOptions,
    ) -> BoxFuture<'static, Result<C, S::Error>> {
        let request = ConnectRequest::new(host_port.clone(), options.clone(), ctx.clone());
        self.service.clone().oneshot(request).boxed()
    }

    fn connection_options(&self) -> ConnectionOptions {
        self.options.read().clone()
    }
}
