use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};

use crate::error::{DispatcherError, Result};
use crate::task::{Task, TaskId, TaskStatus};

/// SQLite-backed task store, for deployments that want the selection and
/// completion protocols to survive a process restart.
///
/// Every column beyond `id`, `status`, and `for_taxi` is carried as a single
/// JSON blob (`data`); those three are broken out because [`TaskStore::claim`]
/// and [`TaskStore::get_blob`] filter on them directly (spec §4.4, §4.5).
pub struct SqliteTaskStore {
    pool: SqlitePool,
}

impl SqliteTaskStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn status_str(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Pending => "pending",
        TaskStatus::Active => "active",
        TaskStatus::Complete => "complete",
        TaskStatus::Failed => "failed",
        TaskStatus::Recurring => "recurring",
    }
}

fn parse_status(raw: &str) -> Result<TaskStatus> {
    match raw {
        "pending" => Ok(TaskStatus::Pending),
        "active" => Ok(TaskStatus::Active),
        "complete" => Ok(TaskStatus::Complete),
        "failed" => Ok(TaskStatus::Failed),
        "recurring" => Ok(TaskStatus::Recurring),
        other => Err(DispatcherError::StoreIo(anyhow::anyhow!(
            "unrecognized task status in store: {other}"
        ))),
    }
}

#[async_trait]
impl super::TaskStore for SqliteTaskStore {
    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY,
                status TEXT NOT NULL,
                for_taxi TEXT,
                data TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert(&self, task: Task) -> Result<()> {
        let data = serde_json::to_string(&task)
            .map_err(|e| DispatcherError::StoreIo(e.into()))?;
        sqlx::query("INSERT INTO tasks (id, status, for_taxi, data) VALUES (?, ?, ?, ?)")
            .bind(task.id.0 as i64)
            .bind(status_str(task.status))
            .bind(task.for_taxi.as_deref())
            .bind(data)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_max_id(&self) -> Result<TaskId> {
        let row = sqlx::query("SELECT COALESCE(MAX(id), 0) AS max_id FROM tasks")
            .fetch_one(&self.pool)
            .await?;
        let max_id: i64 = row.try_get("max_id").map_err(|e| DispatcherError::StoreIo(e.into()))?;
        Ok(TaskId(max_id as u64))
    }

    async fn get_blob(&self, taxi: Option<&str>, include_complete: bool) -> Result<Vec<Task>> {
        let rows = match taxi {
            Some(name) => {
                sqlx::query("SELECT data FROM tasks WHERE for_taxi IS NULL OR for_taxi = ? ORDER BY id")
                    .bind(name)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query("SELECT data FROM tasks WHERE for_taxi IS NULL ORDER BY id")
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        let mut tasks = Vec::with_capacity(rows.len());
        for row in rows {
            let data: String = row.try_get("data").map_err(|e| DispatcherError::StoreIo(e.into()))?;
            let task: Task =
                serde_json::from_str(&data).map_err(|e| DispatcherError::StoreIo(e.into()))?;
            if include_complete || task.status != TaskStatus::Complete {
                tasks.push(task);
            }
        }
        Ok(tasks)
    }

    async fn check_status(&self, id: TaskId) -> Result<Option<TaskStatus>> {
        let row = sqlx::query("SELECT status FROM tasks WHERE id = ?")
            .bind(id.0 as i64)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let status: String =
                    row.try_get("status").map_err(|e| DispatcherError::StoreIo(e.into()))?;
                Ok(Some(parse_status(&status)?))
            }
            None => Ok(None),
        }
    }

    async fn update(&self, task: Task) -> Result<()> {
        let data = serde_json::to_string(&task)
            .map_err(|e| DispatcherError::StoreIo(e.into()))?;
        sqlx::query("UPDATE tasks SET status = ?, for_taxi = ?, data = ? WHERE id = ?")
            .bind(status_str(task.status))
            .bind(task.for_taxi.as_deref())
            .bind(data)
            .bind(task.id.0 as i64)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn claim(&self, taxi: &str, id: TaskId) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT data FROM tasks WHERE id = ? AND status = 'pending'")
            .bind(id.0 as i64)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = row else {
            return Err(DispatcherError::ClaimContention(id));
        };
        let data: String = row.try_get("data").map_err(|e| DispatcherError::StoreIo(e.into()))?;
        let mut task: Task =
            serde_json::from_str(&data).map_err(|e| DispatcherError::StoreIo(e.into()))?;
        task.status = TaskStatus::Active;
        task.by_taxi = Some(taxi.to_string());
        let updated_data =
            serde_json::to_string(&task).map_err(|e| DispatcherError::StoreIo(e.into()))?;

        let result = sqlx::query(
            "UPDATE tasks SET status = 'active', data = ? WHERE id = ? AND status = 'pending'",
        )
        .bind(updated_data)
        .bind(id.0 as i64)
        .execute(&mut *tx)
        .await?;

        let won = result.rows_affected() == 1;
        tx.commit().await?;
        if won {
            Ok(())
        } else {
            Err(DispatcherError::ClaimContention(id))
        }
    }
}
