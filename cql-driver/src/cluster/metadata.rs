use derive_more::Constructor;

use crate::cluster::Session;
use crate::error::{Error, Result};
use crate::load_balancing::LoadBalancingStrategy;
use crate::transport::CqlTransport;
use crate::types::rows::{IntoRustByName, Row};

const PEERS_QUERY: &str = "SELECT * FROM system.peers";
const LOCAL_QUERY: &str = "SELECT * FROM system.local";

/// Cluster information read from system tables through a session.
#[derive(Constructor)]
pub struct ClusterMetadata<'a, T: CqlTransport + 'static, LB: LoadBalancingStrategy<T> + Send + Sync>
{
    session: &'a Session<T, LB>,
}

impl<T: CqlTransport + 'static, LB: LoadBalancingStrategy<T> + Send + Sync>
    ClusterMetadata<'_, T, LB>
{
    /// Rows of `system.peers`, as seen by whichever node serves the request.
    pub async fn all_hosts(&self) -> Result<Vec<Row>> {
        self.rows(PEERS_QUERY).await
    }

    pub async fn cluster_name(&self) -> Result<String> {
        self.rows(LOCAL_QUERY)
            .await?
            .first()
            .ok_or_else(|| Error::General("system.local returned no rows".into()))?
            .get_r_by_name("cluster_name")
    }

    async fn rows(&self, query: &str) -> Result<Vec<Row>> {
        self.session
            .execute(query)
            .await?
            .into_rows()
            .ok_or_else(|| Error::General(format!("Query didn't return rows: {query}")))
    }
}
