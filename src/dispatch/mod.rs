//! The dispatcher: owns a [`TaskStore`] and drives job-pool initialization,
//! task selection (C5), and completion (C6).

use std::collections::HashMap;

use tracing::{info, instrument, warn};

use crate::config::DispatcherConfig;
use crate::error::{DispatcherError, Result};
use crate::job::{build_forest, Job, JobHandle};
use crate::priority::{assign_priorities, PriorityPolicy};
use crate::store::TaskStore;
use crate::task::{Task, TaskId, TaskStatus, TaskType};
use crate::taxi::Taxi;

/// How a taxi's run of a task went, reported back through
/// [`Dispatcher::finalize_task_run`]. The original inferred this from a
/// status field set by convention; here it is an explicit parameter so the
/// caller cannot forget to report it (spec §9 REDESIGN FLAGS).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Succeeded,
    Failed,
}

/// Manages a pool of tasks backed by `S` and hands them out to taxis.
pub struct Dispatcher<S: TaskStore> {
    store: S,
    config: DispatcherConfig,
}

impl<S: TaskStore> Dispatcher<S> {
    pub fn new(store: S, config: DispatcherConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Compile `jobs` into tasks, assign priorities and ids, and persist them
    /// (spec §4.1–4.3). Returns the ids assigned, in `jobs` order.
    #[instrument(skip(self, jobs))]
    pub async fn initialize_new_job_pool(
        &self,
        mut jobs: Vec<Job>,
        priority_policy: Option<PriorityPolicy>,
    ) -> Result<Vec<TaskId>> {
        self.store.ensure_schema().await?;

        let forest = build_forest(&jobs)?;
        assign_priorities(
            &mut jobs,
            &forest,
            priority_policy.unwrap_or(self.config.default_priority_policy),
        )?;

        let start_id = self.store.get_max_id().await?.0;
        let id_of: HashMap<JobHandle, TaskId> = jobs
            .iter()
            .enumerate()
            .map(|(i, job)| (job.handle(), TaskId(start_id + i as u64 + 1)))
            .collect();

        let mut ids = Vec::with_capacity(jobs.len());
        for job in jobs {
            let id = id_of[&job.handle()];
            let task = job.compile(id, &id_of)?;
            self.store.insert(task).await?;
            ids.push(id);
        }

        info!(count = ids.len(), "initialized new job pool");
        Ok(ids)
    }

    /// Select the next task for `taxi` to run (spec §4.5). Returns a
    /// `die` pseudo-task if no pending work exists at all, or `sleep` if work
    /// exists but nothing is currently ready, or a claimed, `active` task.
    #[instrument(skip(self, taxi), fields(taxi = taxi.name()))]
    pub async fn get_task_to_run(&self, taxi: &Taxi, now: u64) -> Result<Task> {
        let mut attempts = 0u32;

        loop {
            let blob = self.store.get_blob(Some(taxi.name()), false).await?;

            if blob.is_empty() {
                return self.insert_pseudo_task(TaskType::Die, taxi).await;
            }

            let by_id: HashMap<TaskId, &Task> = blob.iter().map(|t| (t.id, t)).collect();
            let mut ordered: Vec<&Task> = blob.iter().collect();
            ordered.sort_by_key(|t| (t.priority, t.id));

            let mut n_pending = 0u32;
            let mut ready = None;

            for task in ordered {
                if task.status != TaskStatus::Pending {
                    continue;
                }
                n_pending += 1;

                let (n_unresolved, n_failed) = count_unresolved_dependencies(task, &by_id);
                if n_failed > 0 {
                    warn!(
                        task_id = task.id.0,
                        n_failed, "task blocked on failed dependency; will never become ready"
                    );
                }

                let sufficient_time = taxi.seconds_remaining(now) > task.req_time as i64;
                if n_unresolved > 0 || !sufficient_time {
                    continue;
                }

                ready = Some(task.id);
                break;
            }

            if n_pending == 0 {
                info!("work complete: no tasks pending");
                return self.insert_pseudo_task(TaskType::Die, taxi).await;
            }

            let Some(task_id) = ready else {
                info!(n_pending, "no tasks ready; sleeping taxi");
                return self.insert_pseudo_task(TaskType::Sleep, taxi).await;
            };

            match self.store.claim(taxi.name(), task_id).await {
                Ok(()) => {
                    let mut task = by_id[&task_id].clone();
                    task.status = TaskStatus::Active;
                    task.by_taxi = Some(taxi.name().to_string());
                    return Ok(task);
                }
                Err(DispatcherError::ClaimContention(_)) => {
                    attempts += 1;
                    if attempts > self.config.max_claim_retries {
                        warn!(
                            task_id = task_id.0,
                            attempts, "claim retries exhausted; sleeping taxi"
                        );
                        return self.insert_pseudo_task(TaskType::Sleep, taxi).await;
                    }
                }
                Err(other) => return Err(other),
            }
        }
    }

    /// Record the outcome of a finished task run (spec §4.6). Recurring
    /// tasks that succeeded go back to `pending`; everything else either
    /// completes or fails. `run_time` is computed from the taxi's own
    /// `task_start_time`/`task_finish_time`, which the taxi collaborator sets
    /// around its call to `execute_task` (spec §6).
    #[instrument(skip(self, taxi, task))]
    pub async fn finalize_task_run(
        &self,
        taxi: &Taxi,
        task: &Task,
        outcome: TaskOutcome,
    ) -> Result<()> {
        let start_time = taxi.task_start_time().unwrap_or(0.0);
        let finish_time = taxi.task_finish_time().unwrap_or(start_time);

        let mut task = task.clone();
        task.status = match outcome {
            TaskOutcome::Failed => TaskStatus::Failed,
            TaskOutcome::Succeeded if task.is_recurring => TaskStatus::Pending,
            TaskOutcome::Succeeded => TaskStatus::Complete,
        };
        task.start_time = Some(start_time);
        task.run_time = Some(finish_time - start_time);
        task.by_taxi = Some(taxi.name().to_string());

        self.store.update(task).await
    }

    async fn insert_pseudo_task(&self, task_type: TaskType, taxi: &Taxi) -> Result<Task> {
        let next_id = TaskId(self.store.get_max_id().await?.0 + 1);
        let by_taxi = Some(taxi.name().to_string());
        let task = match task_type {
            TaskType::Die => Task::die(next_id, by_taxi),
            TaskType::Sleep => Task::sleep(next_id, by_taxi),
            other => unreachable!("insert_pseudo_task called with non-terminal type {other:?}"),
        };
        self.store.insert(task.clone()).await?;
        Ok(task)
    }
}

/// Count dependencies of `task` that are not complete, and among those, how
/// many are `failed`. Dependencies absent from `by_id` are assumed complete
/// (the blob query excludes completed tasks — spec §4.5 step 3).
fn count_unresolved_dependencies(task: &Task, by_id: &HashMap<TaskId, &Task>) -> (u32, u32) {
    let mut n_unresolved = 0;
    let mut n_failed = 0;

    for dep_id in &task.depends_on {
        let Some(dep) = by_id.get(dep_id) else {
            continue;
        };
        if dep.status != TaskStatus::Complete {
            n_unresolved += 1;
        }
        if dep.status == TaskStatus::Failed {
            n_failed += 1;
        }
    }

    (n_unresolved, n_failed)
}
