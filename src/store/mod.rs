//! Task persistence (C1 storage) and the atomic claim primitive selection
//! and completion (C4, C5) are built on.

mod memory;
mod sqlite;

pub use memory::MemoryTaskStore;
pub use sqlite::SqliteTaskStore;

use async_trait::async_trait;

use crate::error::Result;
use crate::task::{Task, TaskId, TaskStatus};

/// Storage backend for tasks. Implementations must make [`TaskStore::claim`]
/// atomic: concurrent claims on the same task must leave exactly one caller
/// with `Ok(true)` (spec §4.4 "Atomic claim").
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Create any backing tables/collections this store needs. Safe to call
    /// on an already-initialized store.
    async fn ensure_schema(&self) -> Result<()>;

    /// Persist a newly compiled task. The task's id must not already exist.
    async fn insert(&self, task: Task) -> Result<()>;

    /// The highest id currently in the store, or `0` if it is empty (spec
    /// §4.1, used to assign ids to a freshly compiled job pool).
    async fn get_max_id(&self) -> Result<TaskId>;

    /// Every task eligible for `taxi` to see: unclaimed-for-this-taxi tasks
    /// plus tasks explicitly reserved for it. When `include_complete` is
    /// false, only `complete` tasks are omitted (spec §4.5 step 1) — `failed`
    /// tasks stay visible so dependents can keep counting them as
    /// unresolved, which is what makes a failed dependency block its
    /// descendants forever.
    async fn get_blob(&self, taxi: Option<&str>, include_complete: bool) -> Result<Vec<Task>>;

    /// Current status of one task, or `None` if it no longer exists.
    async fn check_status(&self, id: TaskId) -> Result<Option<TaskStatus>>;

    /// Overwrite a task wholesale. Used by the completion protocol (C6) and
    /// by respawn/recurrence handling.
    async fn update(&self, task: Task) -> Result<()>;

    /// Attempt to move `id` from `pending` to `active` on behalf of `taxi`.
    /// `Ok(())` means this call won the race. `Err(DispatcherError::ClaimContention)`
    /// means another caller claimed it first, or it was never pending to begin
    /// with (spec §4.4's `claim(taxi, id) → void | TaskClaimException`).
    async fn claim(&self, taxi: &str, id: TaskId) -> Result<()>;
}
