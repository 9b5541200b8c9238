use futures::FutureExt;
use std::net::SocketAddr;
use tokio::sync::mpsc::Sender;

use crate::cluster::connection_manager::ConnectionManager;
use crate::cluster::NodeConnectionConfig;
use crate::error::Result;
use crate::frame::events::ServerEvent;
use crate::future::BoxFuture;
use crate::transport::NodeConnection;

/// Creates plain TCP [`NodeConnection`]s sharing one configuration.
#[derive(Clone, Debug)]
pub struct TcpConnectionManager {
    config: NodeConnectionConfig,
}

impl ConnectionManager<NodeConnection> for TcpConnectionManager {
    fn connection(
        &self,
        event_handler: Option<Sender<ServerEvent>>,
        addr: SocketAddr,
    ) -> BoxFuture<Result<NodeConnection>> {
        NodeConnection::connect(addr, self.config.clone(), event_handler).boxed()
    }

    #[inline]
    fn open(&self, addr: SocketAddr) -> NodeConnection {
        NodeConnection::open(addr, self.config.clone(), None)
    }
}

impl TcpConnectionManager {
    pub fn new(config: NodeConnectionConfig) -> Self {
        TcpConnectionManager { config }
    }

    #[inline]
    pub fn config(&self) -> &NodeConnectionConfig {
        &self.config
    }
}
