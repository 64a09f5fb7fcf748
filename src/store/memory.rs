//! In-memory task store backend.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Task, TaskStatus, TaskStore};
use crate::error::StoreError;

/// Process-local store. Good for a single-instance deployment and for
/// tests; the `TaskStore` trait is the seam where a database backend
/// would slot in.
#[derive(Default)]
pub struct MemoryStore {
    tasks: RwLock<HashMap<Uuid, Task>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn add_task(&self, task: Task) -> Result<(), StoreError> {
        let mut tasks = self.tasks.write().await;
        if tasks.contains_key(&task.id) {
            return Err(StoreError::Duplicate { id: task.id });
        }
        tasks.insert(task.id, task);
        Ok(())
    }

    async fn get_task(&self, id: Uuid) -> Result<Option<Task>, StoreError> {
        Ok(self.tasks.read().await.get(&id).cloned())
    }

    async fn all_pending(&self) -> Result<Vec<Task>, StoreError> {
        let tasks = self.tasks.read().await;
        let mut pending: Vec<Task> = tasks
            .values()
            .filter(|t| t.status == TaskStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|t| t.created_at);
        Ok(pending)
    }

    async fn claim(&self, id: Uuid) -> Result<Task, StoreError> {
        let mut tasks = self.tasks.write().await;
        let task = tasks.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if task.status != TaskStatus::Pending {
            return Err(StoreError::NotClaimable {
                id,
                state: task.status.to_string(),
            });
        }
        task.status = TaskStatus::Running;
        Ok(task.clone())
    }

    async fn release(&self, id: Uuid) -> Result<(), StoreError> {
        let mut tasks = self.tasks.write().await;
        let task = tasks.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if task.status != TaskStatus::Running {
            return Err(StoreError::NotClaimable {
                id,
                state: task.status.to_string(),
            });
        }
        if !task.log.is_empty() {
            // An attempt that logged anything is no longer releasable.
            return Err(StoreError::InvalidTransition {
                id,
                from: task.status.to_string(),
                to: TaskStatus::Pending.to_string(),
            });
        }
        task.status = TaskStatus::Pending;
        Ok(())
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: TaskStatus,
        log: &str,
    ) -> Result<(), StoreError> {
        let mut tasks = self.tasks.write().await;
        let task = tasks.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if !task.status.can_transition_to(status) {
            return Err(StoreError::InvalidTransition {
                id,
                from: task.status.to_string(),
                to: status.to_string(),
            });
        }
        if !log.starts_with(task.log.as_str()) {
            return Err(StoreError::LogRewind { id });
        }
        task.status = status;
        task.log = log.to_string();
        Ok(())
    }
}
