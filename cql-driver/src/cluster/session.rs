use arc_swap::ArcSwap;
use itertools::Itertools;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::*;

use crate::cluster::control_connection::ControlConnection;
use crate::cluster::metadata::ClusterMetadata;
use crate::cluster::{ConnectionManager, SessionBuilder, SessionConfig, TcpConnectionManager};
use crate::consistency::Consistency;
use crate::error::{Error, Result};
use crate::frame::events::ServerEvent;
use crate::frame::message_result::ResResultBody;
use crate::load_balancing::{LoadBalancingStrategy, RoundRobinLoadBalancingStrategy};
use crate::transport::{CqlTransport, NodeConnection};
use crate::types::rows::{IntoRustByName, Row};

const PEERS_QUERY: &str = "SELECT * FROM system.peers";

/// Session with plain TCP connections and round-robin balancing.
pub type TcpSession = Session<NodeConnection, RoundRobinLoadBalancingStrategy>;

/// Pool of node connections: one per known node, with the first reachable contact point
/// also listening for server events. Requests are spread over ready connections by the load
/// balancing strategy, and the pool follows topology changes pushed by the cluster.
pub struct Session<T: CqlTransport + 'static, LB: LoadBalancingStrategy<T> + Send + Sync> {
    connections: Arc<ArcSwap<Vec<Arc<T>>>>,
    load_balancing: LB,
    consistency: Consistency,
    event_sender: broadcast::Sender<ServerEvent>,
    control_handle: JoinHandle<()>,
}

impl<T: CqlTransport + 'static, LB: LoadBalancingStrategy<T> + Send + Sync> Session<T, LB> {
    /// Connects to the first contact point which completes a handshake, discovers its peers from
    /// `system.peers` and opens a connection to each of them. Peer connections establish
    /// themselves in the background, so their failures don't fail the bootstrap.
    pub async fn bootstrap<CM: ConnectionManager<T> + 'static>(
        config: SessionConfig,
        connection_manager: CM,
        load_balancing: LB,
    ) -> Result<Self> {
        // both channel kinds panic on zero capacity
        let event_channel_capacity = config.event_channel_capacity.max(1);
        let (event_sender, _) = broadcast::channel(event_channel_capacity);
        let (event_handler, event_receiver) = mpsc::channel(event_channel_capacity);

        let mut seed = None;
        for addr in &config.contact_points {
            match connection_manager
                .connection(Some(event_handler.clone()), *addr)
                .await
            {
                Ok(connection) => {
                    debug!(%addr, "Connected to contact point.");
                    seed = Some(Arc::new(connection));
                    break;
                }
                Err(error) => {
                    warn!(%error, %addr, "Failed to connect to contact point.");
                }
            }
        }

        drop(event_handler);

        let seed = seed.ok_or(Error::NoLiveNodes)?;

        let peers = seed.query(PEERS_QUERY, Consistency::One).await?;
        let peers = peers
            .into_rows()
            .ok_or_else(|| Error::General("Peers query didn't return rows!".into()))?;

        let mut connections = vec![seed.clone()];
        for addr in peer_addresses(&peers, config.port) {
            if connections
                .iter()
                .any(|connection| connection.address().ip() == addr.ip())
            {
                continue;
            }

            debug!(%addr, "Opening connection to peer.");
            connections.push(Arc::new(connection_manager.open(addr)));
        }

        info!(nodes = connections.len(), "Session established.");

        let connections = Arc::new(ArcSwap::from_pointee(connections));
        let control = ControlConnection::new(
            connections.clone(),
            Arc::new(connection_manager),
            event_sender.clone(),
            config.port,
        );
        let control_handle = tokio::spawn(control.run(event_receiver));

        Ok(Session {
            connections,
            load_balancing,
            consistency: config.consistency,
            event_sender,
            control_handle,
        })
    }

    /// Executes a query on the next ready connection with the session's default consistency.
    pub async fn execute(&self, query: &str) -> Result<ResResultBody> {
        self.execute_with_consistency(query, self.consistency).await
    }

    pub async fn execute_with_consistency(
        &self,
        query: &str,
        consistency: Consistency,
    ) -> Result<ResResultBody> {
        let connection = self
            .load_balancing
            .pick(&self.connections.load())
            .ok_or(Error::NoConnectionsAvailable)?;

        connection.query(query, consistency).await
    }

    /// Receives every server event pushed to the session from the moment of subscribing.
    pub fn subscribe_events(&self) -> broadcast::Receiver<ServerEvent> {
        self.event_sender.subscribe()
    }

    pub fn metadata(&self) -> ClusterMetadata<'_, T, LB> {
        ClusterMetadata::new(self)
    }

    /// Current connections, in pool order.
    pub fn connections(&self) -> Arc<Vec<Arc<T>>> {
        self.connections.load_full()
    }

    #[inline]
    pub fn consistency(&self) -> Consistency {
        self.consistency
    }

    /// Stops processing events and closes every connection.
    pub fn shutdown(&self) {
        self.control_handle.abort();

        for connection in self.connections.load().iter() {
            connection.close();
        }

        debug!("Session shut down.");
    }
}

impl<T: CqlTransport + 'static, LB: LoadBalancingStrategy<T> + Send + Sync> Drop
    for Session<T, LB>
{
    fn drop(&mut self) {
        self.control_handle.abort();
    }
}

impl SessionBuilder {
    /// Resolves contact points and bootstraps a TCP session with round-robin balancing.
    pub async fn build(self) -> Result<TcpSession> {
        let config = self.build_config().await?;
        let connection_manager = TcpConnectionManager::new(config.connection_config.clone());

        Session::bootstrap(
            config,
            connection_manager,
            RoundRobinLoadBalancingStrategy::new(),
        )
        .await
    }
}

/// Address of a peer: its `rpc_address`, unless that is missing or unspecified, in which case
/// the `peer` column is used instead.
fn peer_address(row: &Row, port: u16) -> Option<SocketAddr> {
    let rpc_address: Option<IpAddr> = row.get_by_name("rpc_address").ok().flatten();
    let ip = match rpc_address {
        Some(ip) if !ip.is_unspecified() => ip,
        _ => row.get_by_name("peer").ok().flatten()?,
    };

    Some(SocketAddr::new(ip, port))
}

fn peer_addresses(rows: &[Row], port: u16) -> Vec<SocketAddr> {
    rows.iter()
        .filter_map(|row| {
            let addr = peer_address(row, port);
            if addr.is_none() {
                warn!("Ignoring peer without an address.");
            }

            addr
        })
        .unique()
        .collect()
}
