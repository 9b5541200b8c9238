//! **cql-driver** is an async client for Cassandra nodes speaking the CQL native protocol v2.
//!
//! ## Getting started
//!
//! ```no_run
//! use cql_driver::cluster::SessionBuilder;
//!
//! #[tokio::main]
//! async fn main() {
//!     let session = SessionBuilder::new()
//!         .with_contact_point("127.0.0.1".into())
//!         .build()
//!         .await
//!         .unwrap();
//!
//!     let rows = session
//!         .execute("SELECT * FROM system.local")
//!         .await
//!         .unwrap()
//!         .into_rows();
//!
//!     println!("{rows:?}");
//!     session.shutdown();
//! }
//! ```
//!
//! ## Connections
//!
//! A [`Session`](crate::cluster::Session) keeps one multiplexed
//! [`NodeConnection`](crate::transport::NodeConnection) per node. Lost connections are
//! re-established according to a [reconnection policy](crate::retry), and the set of nodes
//! follows topology events pushed by the cluster.

pub mod cluster;
pub mod load_balancing;

pub mod future;
pub mod retry;
pub mod transport;

pub use cql_protocol::consistency;
pub use cql_protocol::error;
pub use cql_protocol::frame;
pub use cql_protocol::types;

pub type Error = error::Error;
pub type Result<T> = error::Result<T>;
