use derivative::Derivative;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::lookup_host;

use crate::consistency::Consistency;
use crate::error::{Error, Result};
use crate::retry::{ExponentialReconnectionPolicy, ReconnectionPolicy};

/// Default native protocol port.
pub const DEFAULT_PORT: u16 = 9042;

const DEFAULT_WRITE_BUFFER_SIZE: usize = 128;
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 128;

/// Representation of a node address. Can be a direct socket address or a hostname. In the latter
/// case, the host is resolved with the session port and can yield multiple addresses.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub enum NodeAddress {
    Direct(SocketAddr),
    Hostname(String),
}

impl NodeAddress {
    /// Resolves the address into socket addresses, using `port` for hostnames.
    pub async fn resolve(&self, port: u16) -> Result<Vec<SocketAddr>> {
        match self {
            NodeAddress::Direct(addr) => Ok(vec![*addr]),
            NodeAddress::Hostname(hostname) => lookup_host((hostname.as_str(), port))
                .await
                .map(|addrs| addrs.collect())
                .map_err(Into::into),
        }
    }
}

impl From<SocketAddr> for NodeAddress {
    fn from(addr: SocketAddr) -> Self {
        NodeAddress::Direct(addr)
    }
}

impl From<String> for NodeAddress {
    fn from(value: String) -> Self {
        NodeAddress::Hostname(value)
    }
}

impl From<&str> for NodeAddress {
    fn from(value: &str) -> Self {
        NodeAddress::Hostname(value.to_string())
    }
}

/// Settings shared by every connection a session opens.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct NodeConnectionConfig {
    #[derivative(Debug = "ignore")]
    pub reconnection_policy: Arc<dyn ReconnectionPolicy + Send + Sync>,
    pub tcp_nodelay: bool,
    /// Capacity of the queue of frames waiting to be written to the socket.
    pub write_buffer_size: usize,
    /// When set, a request finding all streams busy waits this long for one to free up instead of
    /// failing immediately.
    pub stream_wait_timeout: Option<Duration>,
}

impl Default for NodeConnectionConfig {
    fn default() -> Self {
        NodeConnectionConfigBuilder::new().build()
    }
}

/// Builder structure that helps to configure node connections.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct NodeConnectionConfigBuilder {
    #[derivative(Debug = "ignore")]
    reconnection_policy: Arc<dyn ReconnectionPolicy + Send + Sync>,
    tcp_nodelay: bool,
    write_buffer_size: usize,
    stream_wait_timeout: Option<Duration>,
}

impl Default for NodeConnectionConfigBuilder {
    fn default() -> Self {
        NodeConnectionConfigBuilder {
            reconnection_policy: Arc::new(ExponentialReconnectionPolicy::default()),
            tcp_nodelay: true,
            write_buffer_size: DEFAULT_WRITE_BUFFER_SIZE,
            stream_wait_timeout: None,
        }
    }
}

impl NodeConnectionConfigBuilder {
    pub fn new() -> NodeConnectionConfigBuilder {
        Default::default()
    }

    /// Sets new reconnection policy.
    pub fn with_reconnection_policy(
        mut self,
        reconnection_policy: Arc<dyn ReconnectionPolicy + Send + Sync>,
    ) -> Self {
        self.reconnection_policy = reconnection_policy;
        self
    }

    /// Sets TCP nodelay flag.
    pub fn with_tcp_nodelay(mut self, tcp_nodelay: bool) -> Self {
        self.tcp_nodelay = tcp_nodelay;
        self
    }

    /// Sets the write queue capacity. Values below 1 are raised to 1.
    pub fn with_write_buffer_size(mut self, write_buffer_size: usize) -> Self {
        self.write_buffer_size = write_buffer_size.max(1);
        self
    }

    /// Makes requests wait up to `timeout` for a free stream instead of failing immediately.
    pub fn with_stream_wait_timeout(mut self, timeout: Duration) -> Self {
        self.stream_wait_timeout = Some(timeout);
        self
    }

    /// Finalizes building process
    pub fn build(self) -> NodeConnectionConfig {
        NodeConnectionConfig {
            reconnection_policy: self.reconnection_policy,
            tcp_nodelay: self.tcp_nodelay,
            write_buffer_size: self.write_buffer_size,
            stream_wait_timeout: self.stream_wait_timeout,
        }
    }
}

/// Resolved session configuration.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Seed addresses, tried in order during bootstrap.
    pub contact_points: Vec<SocketAddr>,
    /// Port used for peers discovered through `system.peers` and topology events.
    pub port: u16,
    pub consistency: Consistency,
    /// Capacity of the event channels; zero is treated as one.
    pub event_channel_capacity: usize,
    pub connection_config: NodeConnectionConfig,
}

/// Builder structure that helps to configure and start a session.
#[derive(Debug)]
pub struct SessionBuilder {
    contact_points: Vec<NodeAddress>,
    port: u16,
    consistency: Consistency,
    event_channel_capacity: usize,
    connection_config: NodeConnectionConfig,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        SessionBuilder {
            contact_points: vec![],
            port: DEFAULT_PORT,
            consistency: Consistency::Quorum,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            connection_config: Default::default(),
        }
    }
}

impl SessionBuilder {
    pub fn new() -> SessionBuilder {
        Default::default()
    }

    /// Adds a seed node.
    pub fn with_contact_point(mut self, addr: NodeAddress) -> Self {
        self.contact_points.push(addr);
        self
    }

    /// Sets the native protocol port of the cluster.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the consistency used by `Session::execute`.
    pub fn with_consistency(mut self, consistency: Consistency) -> Self {
        self.consistency = consistency;
        self
    }

    /// Sets the capacity of the broadcast channel carrying server events to subscribers.
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    pub fn with_connection_config(mut self, connection_config: NodeConnectionConfig) -> Self {
        self.connection_config = connection_config;
        self
    }

    /// Resolves contact points and produces the final config. Fails with `NoLiveNodes` when no
    /// contact point resolves to an address.
    pub async fn build_config(self) -> Result<SessionConfig> {
        // replace with map() when async lambdas become available
        let mut contact_points = Vec::with_capacity(self.contact_points.len());
        for addr in &self.contact_points {
            contact_points.append(&mut addr.resolve(self.port).await?);
        }

        if contact_points.is_empty() {
            return Err(Error::NoLiveNodes);
        }

        Ok(SessionConfig {
            contact_points,
            port: self.port,
            consistency: self.consistency,
            event_channel_capacity: self.event_channel_capacity,
            connection_config: self.connection_config,
        })
    }
}
