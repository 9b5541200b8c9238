mod round_robin;

pub use self::round_robin::RoundRobinLoadBalancingStrategy;

use std::sync::Arc;

use crate::transport::CqlTransport;

/// Load balancing strategy, used for picking the connection which serves the next request.
pub trait LoadBalancingStrategy<T: CqlTransport> {
    /// Returns the connection for the next request, or `None` if no connection can take it.
    fn pick(&self, connections: &[Arc<T>]) -> Option<Arc<T>>;
}
