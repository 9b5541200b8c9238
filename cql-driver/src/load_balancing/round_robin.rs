use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::load_balancing::LoadBalancingStrategy;
use crate::transport::CqlTransport;

/// Simple round-robin load balancing. Connections which are not ready are skipped, but at most
/// one full cycle is made before giving up.
#[derive(Default, Debug)]
pub struct RoundRobinLoadBalancingStrategy {
    prev_idx: AtomicUsize,
}

impl RoundRobinLoadBalancingStrategy {
    pub fn new() -> Self {
        Default::default()
    }
}

impl<T: CqlTransport> LoadBalancingStrategy<T> for RoundRobinLoadBalancingStrategy {
    fn pick(&self, connections: &[Arc<T>]) -> Option<Arc<T>> {
        (0..connections.len())
            .map(|_| self.prev_idx.fetch_add(1, Ordering::Relaxed) % connections.len())
            .map(|idx| &connections[idx])
            .find(|connection| connection.is_ready())
            .cloned()
    }
}
