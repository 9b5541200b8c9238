use derive_more::Constructor;
#[cfg(test)]
use mockall::automock;
use std::time::Duration;

const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(300);

/// Determines the time for the next reconnection attempt when trying to reconnect to a node.
pub trait ReconnectionSchedule {
    /// Returns next reconnect delay or `None` if not attempt should be made.
    fn next_delay(&mut self) -> Option<Duration>;
}

/// Creates reconnection schedules when trying to re-establish connections.
#[cfg_attr(test, automock)]
pub trait ReconnectionPolicy {
    /// Creates new schedule when a connection needs to be re-established.
    fn new_node_schedule(&self) -> Box<dyn ReconnectionSchedule + Send + Sync>;
}

/// Schedules reconnection at constant interval.
#[derive(Copy, Clone, Constructor, Debug, Ord, PartialOrd, Eq, PartialEq, Hash)]
pub struct ConstantReconnectionPolicy {
    base_delay: Duration,
}

impl Default for ConstantReconnectionPolicy {
    fn default() -> Self {
        ConstantReconnectionPolicy::new(DEFAULT_BASE_DELAY)
    }
}

impl ReconnectionPolicy for ConstantReconnectionPolicy {
    fn new_node_schedule(&self) -> Box<dyn ReconnectionSchedule + Send + Sync> {
        Box::new(ConstantReconnectionSchedule::new(self.base_delay))
    }
}

#[derive(Constructor)]
struct ConstantReconnectionSchedule {
    base_delay: Duration,
}

impl ReconnectionSchedule for ConstantReconnectionSchedule {
    fn next_delay(&mut self) -> Option<Duration> {
        Some(self.base_delay)
    }
}

/// Never schedules reconnections. A lost connection stays down until closed.
#[derive(Default, Copy, Clone, Debug, PartialEq, Ord, PartialOrd, Eq, Hash)]
pub struct NeverReconnectionPolicy;

impl ReconnectionPolicy for NeverReconnectionPolicy {
    fn new_node_schedule(&self) -> Box<dyn ReconnectionSchedule + Send + Sync> {
        Box::new(NeverReconnectionSchedule)
    }
}

struct NeverReconnectionSchedule;

impl ReconnectionSchedule for NeverReconnectionSchedule {
    fn next_delay(&mut self) -> Option<Duration> {
        None
    }
}

/// A reconnection policy that doubles the delay after every failed attempt, starting from the base
/// delay, and keeps a constant delay once the maximum is reached. Attempt `n` waits
/// `min(base * 2^(n-1), max)`.
#[derive(Copy, Clone, Constructor, Debug, Ord, PartialOrd, Eq, PartialEq, Hash)]
pub struct ExponentialReconnectionPolicy {
    base_delay: Duration,
    max_delay: Duration,
}

impl ReconnectionPolicy for ExponentialReconnectionPolicy {
    fn new_node_schedule(&self) -> Box<dyn ReconnectionSchedule + Send + Sync> {
        Box::new(ExponentialReconnectionSchedule::new(
            self.base_delay,
            self.max_delay,
        ))
    }
}

impl Default for ExponentialReconnectionPolicy {
    fn default() -> Self {
        ExponentialReconnectionPolicy::new(DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY)
    }
}

struct ExponentialReconnectionSchedule {
    base_delay: Duration,
    max_delay: Duration,
    attempt: u32,
}

impl ReconnectionSchedule for ExponentialReconnectionSchedule {
    fn next_delay(&mut self) -> Option<Duration> {
        let factor = 1u32.checked_shl(self.attempt).unwrap_or(u32::MAX);
        self.attempt = self.attempt.saturating_add(1);

        Some(self.base_delay.saturating_mul(factor).min(self.max_delay))
    }
}

impl ExponentialReconnectionSchedule {
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        ExponentialReconnectionSchedule {
            base_delay,
            max_delay,
            attempt: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delays(schedule: &mut dyn ReconnectionSchedule, count: usize) -> Vec<u64> {
        (0..count)
            .map(|_| schedule.next_delay().unwrap().as_secs())
            .collect()
    }

    #[test]
    fn should_double_exponential_delay_up_to_max() {
        let mut schedule = ExponentialReconnectionPolicy::default().new_node_schedule();

        assert_eq!(
            delays(schedule.as_mut(), 11),
            vec![1, 2, 4, 8, 16, 32, 64, 128, 256, 300, 300]
        );
    }

    #[test]
    fn should_start_over_with_new_schedule() {
        let policy = ExponentialReconnectionPolicy::default();

        let mut first = policy.new_node_schedule();
        delays(first.as_mut(), 5);

        let mut second = policy.new_node_schedule();
        assert_eq!(delays(second.as_mut(), 3), vec![1, 2, 4]);
    }

    #[test]
    fn should_reach_max_exponential_delay_without_panic() {
        let mut schedule = ExponentialReconnectionSchedule {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(300),
            attempt: u32::MAX - 1,
        };

        assert_eq!(schedule.next_delay(), Some(Duration::from_secs(300)));
        assert_eq!(schedule.next_delay(), Some(Duration::from_secs(300)));
    }

    #[test]
    fn should_keep_constant_delay() {
        let mut schedule =
            ConstantReconnectionPolicy::new(Duration::from_millis(50)).new_node_schedule();

        assert_eq!(schedule.next_delay(), Some(Duration::from_millis(50)));
        assert_eq!(schedule.next_delay(), Some(Duration::from_millis(50)));
    }

    #[test]
    fn should_never_reconnect() {
        let mut schedule = NeverReconnectionPolicy.new_node_schedule();
        assert_eq!(schedule.next_delay(), None);
    }
}
