use std::net::SocketAddr;
use tokio::sync::mpsc::Sender;

#[cfg(test)]
use mockall::*;

use crate::error::Result;
use crate::frame::events::ServerEvent;
use crate::future::BoxFuture;
use crate::transport::CqlTransport;

/// Manages establishing connections to nodes.
pub trait ConnectionManager<T: CqlTransport>: Send + Sync {
    /// Tries to establish a new, ready to use connection with an optional server event handler.
    /// Handshake failures are returned without retrying.
    fn connection(&self, event_handler: Option<Sender<ServerEvent>>, addr: SocketAddr)
        -> BoxFuture<Result<T>>;

    /// Creates a connection which establishes itself in the background, retrying according to
    /// the reconnection policy.
    fn open(&self, addr: SocketAddr) -> T;
}

#[cfg(test)]
mock! {
    pub ConnectionManager<T: CqlTransport + 'static> {
    }

    impl<T: CqlTransport + 'static> ConnectionManager<T> for ConnectionManager<T> {
        fn connection(
            &self,
            event_handler: Option<Sender<ServerEvent>>,
            addr: SocketAddr,
        ) -> BoxFuture<'static, Result<T>>;

        fn open(&self, addr: SocketAddr) -> T;
    }
}
