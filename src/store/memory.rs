use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::{DispatcherError, Result};
use crate::store::TaskStore;
use crate::task::{Task, TaskId, TaskStatus};

/// In-memory task store backed by [`DashMap`]. Each shard carries its own
/// lock, so [`TaskStore::claim`]'s read-check-write sequence is made atomic
/// with a single `get_mut` rather than an external mutex (spec §4.4).
#[derive(Debug, Default)]
pub struct MemoryTaskStore {
    tasks: DashMap<TaskId, Task>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self {
            tasks: DashMap::new(),
        }
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn insert(&self, task: Task) -> Result<()> {
        self.tasks.insert(task.id, task);
        Ok(())
    }

    async fn get_max_id(&self) -> Result<TaskId> {
        Ok(self
            .tasks
            .iter()
            .map(|entry| *entry.key())
            .max()
            .unwrap_or(TaskId(0)))
    }

    async fn get_blob(&self, taxi: Option<&str>, include_complete: bool) -> Result<Vec<Task>> {
        let mut blob: Vec<Task> = self
            .tasks
            .iter()
            .map(|entry| entry.value().clone())
            .filter(|task| match &task.for_taxi {
                Some(reserved) => Some(reserved.as_str()) == taxi,
                None => true,
            })
            .filter(|task| include_complete || task.status != TaskStatus::Complete)
            .collect();
        blob.sort_by_key(|task| task.id);
        Ok(blob)
    }

    async fn check_status(&self, id: TaskId) -> Result<Option<TaskStatus>> {
        Ok(self.tasks.get(&id).map(|entry| entry.status))
    }

    async fn update(&self, task: Task) -> Result<()> {
        self.tasks.insert(task.id, task);
        Ok(())
    }

    async fn claim(&self, taxi: &str, id: TaskId) -> Result<()> {
        let Some(mut entry) = self.tasks.get_mut(&id) else {
            return Err(DispatcherError::ClaimContention(id));
        };
        if entry.status != TaskStatus::Pending {
            return Err(DispatcherError::ClaimContention(id));
        }
        entry.status = TaskStatus::Active;
        entry.by_taxi = Some(taxi.to_string());
        Ok(())
    }
}
