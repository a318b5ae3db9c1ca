//! The worker side of the selection protocol (spec §5 "Taxi").
//!
//! A taxi is whatever process calls [`crate::dispatch::Dispatcher::get_task_to_run`]
//! and later reports back through [`crate::dispatch::Dispatcher::finalize_task_run`].
//! The dispatcher never runs a task itself; it only decides which one a taxi
//! gets next.

use std::time::Duration;

use async_trait::async_trait;

/// A worker identity known to the dispatcher (spec §3 "Taxi").
#[derive(Debug, Clone)]
pub struct Taxi {
    name: String,
    pool_name: String,
    time_limit: Duration,
    start_time: u64,
    task_start_time: Option<f64>,
    task_finish_time: Option<f64>,
}

impl Taxi {
    /// `start_time` is the wall-clock second (since epoch, or since whatever
    /// origin the caller's `now` values share) at which the taxi process
    /// began; [`Taxi::seconds_remaining`] measures elapsed time from it
    /// (spec §3 "Taxi").
    pub fn new(
        name: impl Into<String>,
        pool_name: impl Into<String>,
        time_limit: Duration,
        start_time: u64,
    ) -> Self {
        Self {
            name: name.into(),
            pool_name: pool_name.into(),
            time_limit,
            start_time,
            task_start_time: None,
            task_finish_time: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pool_name(&self) -> &str {
        &self.pool_name
    }

    pub fn time_limit(&self) -> Duration {
        self.time_limit
    }

    /// Seconds remaining before `time_limit` elapses, measured from
    /// `start_time`. Used by callers deciding whether to request another
    /// task or let the taxi wind down (spec §5).
    pub fn seconds_remaining(&self, now: u64) -> i64 {
        let elapsed = now.saturating_sub(self.start_time);
        self.time_limit.as_secs() as i64 - elapsed as i64
    }

    /// Set by the taxi right before it calls `execute_task` (spec §6). Read
    /// back by [`crate::dispatch::Dispatcher::finalize_task_run`] to compute
    /// `run_time`.
    pub fn record_task_start(&mut self, now: f64) {
        self.task_start_time = Some(now);
        self.task_finish_time = None;
    }

    /// Set by the taxi right after `execute_task` returns (spec §6).
    pub fn record_task_finish(&mut self, now: f64) {
        self.task_finish_time = Some(now);
    }

    pub fn task_start_time(&self) -> Option<f64> {
        self.task_start_time
    }

    pub fn task_finish_time(&self) -> Option<f64> {
        self.task_finish_time
    }
}

/// The set of live taxis a dispatch deployment tracks, distinct from task
/// storage (spec §3 "WorkerPool" — not persisted task state, just which
/// taxis currently exist).
#[async_trait]
pub trait WorkerPool: Send + Sync {
    async fn register_taxi(&self, taxi: Taxi);

    /// Tell the pool which task store a registered taxi should consult
    /// (spec §6: `my_pool.update_taxi_dispatch(my_taxi, self.db_path)`).
    async fn update_taxi_dispatch(&self, taxi: &Taxi, store_path: &str);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seconds_remaining_counts_down_from_start() {
        let taxi = Taxi::new("taxi-1", "pool-a", Duration::from_secs(100), 10);
        assert_eq!(taxi.seconds_remaining(10), 100);
        assert_eq!(taxi.seconds_remaining(60), 50);
        assert_eq!(taxi.seconds_remaining(200), -90);
    }

    #[test]
    fn task_timing_round_trips_through_record_calls() {
        let mut taxi = Taxi::new("taxi-1", "pool-a", Duration::from_secs(100), 0);
        assert_eq!(taxi.task_start_time(), None);

        taxi.record_task_start(10.0);
        assert_eq!(taxi.task_start_time(), Some(10.0));
        assert_eq!(taxi.task_finish_time(), None);

        taxi.record_task_finish(14.5);
        assert_eq!(taxi.task_finish_time(), Some(14.5));
    }
}
