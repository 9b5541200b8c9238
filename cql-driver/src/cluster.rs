pub use crate::cluster::config::{
    NodeAddress, NodeConnectionConfig, NodeConnectionConfigBuilder, SessionBuilder, SessionConfig,
    DEFAULT_PORT,
};
pub use crate::cluster::connection_manager::ConnectionManager;
pub use crate::cluster::metadata::ClusterMetadata;
pub use crate::cluster::session::{Session, TcpSession};
pub use crate::cluster::tcp_connection_manager::TcpConnectionManager;

mod config;
mod connection_manager;
mod control_connection;
mod metadata;
pub mod session;
mod tcp_connection_manager;
