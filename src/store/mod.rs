//! Task model and store trait.
//!
//! Tasks are the persisted unit of deferred work. The store guarantees
//! two properties the execution engine leans on: status transitions are
//! monotonic along `pending -> running -> {success, failed}`, and a
//! task's log only ever grows within an execution attempt. `claim` gives
//! the dispatcher an atomic pending->running transition so a trigger
//! firing twice cannot hand the same task to two executors.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;

/// Kind discriminator for dispatch. One variant today; adding a kind
/// means adding a variant and a handler arm, not new dispatch plumbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskKind {
    SnipeMemeCoins,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SnipeMemeCoins => "snipeMemeCoins",
        }
    }
}

/// Task lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Success,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }

    /// Whether `next` is reachable from this state. Re-asserting the
    /// current state is always legal so status+log persists can repeat.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        match (self, next) {
            (a, b) if a == b => true,
            (Pending, Running) | (Pending, Failed) => true,
            (Running, Success) | (Running, Failed) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted background task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: TaskKind,
    /// Serialized spend-permission payload, exactly as registered.
    pub payload: String,
    pub status: TaskStatus,
    /// Newline-delimited display log, append-only per attempt.
    pub log: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(id: Uuid, kind: TaskKind, payload: String, user_id: String) -> Self {
        Self {
            id,
            kind,
            payload,
            status: TaskStatus::Pending,
            log: String::new(),
            user_id,
            created_at: Utc::now(),
        }
    }
}

/// Durable record of tasks keyed by id.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Persist a new task in `pending`.
    async fn add_task(&self, task: Task) -> Result<(), StoreError>;

    /// Fetch a task by id.
    async fn get_task(&self, id: Uuid) -> Result<Option<Task>, StoreError>;

    /// All tasks currently in `pending`, oldest first.
    async fn all_pending(&self) -> Result<Vec<Task>, StoreError>;

    /// Atomically transition `pending -> running` and return the claimed
    /// task. Fails for any other state, so at most one caller wins.
    async fn claim(&self, id: Uuid) -> Result<Task, StoreError>;

    /// Undo a claim that produced no observable work: `running -> pending`,
    /// legal only while the attempt's log is still empty.
    async fn release(&self, id: Uuid) -> Result<(), StoreError>;

    /// Atomically set status and log. The transition must be monotonic
    /// and the new log must extend the stored one.
    async fn update_status(
        &self,
        id: Uuid,
        status: TaskStatus,
        log: &str,
    ) -> Result<(), StoreError>;
}
