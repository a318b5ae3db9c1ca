//! Dispatcher-wide tunables (ambient configuration, not part of the task
//! data model proper).

use crate::priority::PriorityPolicy;

/// Configuration for one [`crate::dispatch::Dispatcher`] instance.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// How many times `get_task_to_run` retries a lost claim race before
    /// giving up and handing the taxi a `sleep` pseudo-task (spec §4.4,
    /// §9 Open Questions).
    pub max_claim_retries: u32,

    /// Priority assignment policy applied at `initialize_new_job_pool` time
    /// unless a caller overrides it per-pool.
    pub default_priority_policy: PriorityPolicy,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_claim_retries: 5,
            default_priority_policy: PriorityPolicy::Tree,
        }
    }
}

impl DispatcherConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_claim_retries(mut self, retries: u32) -> Self {
        self.max_claim_retries = retries;
        self
    }

    pub fn default_priority_policy(mut self, policy: PriorityPolicy) -> Self {
        self.default_priority_policy = policy;
        self
    }
}
