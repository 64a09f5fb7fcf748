//! Request/response types for the gateway API.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::{TaskKind, TaskStatus};

/// Task intake request. The id is caller-supplied when the client wants
/// to poll under a request id it already holds; otherwise one is minted.
#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub id: Option<Uuid>,
    #[serde(rename = "type")]
    pub kind: TaskKind,
    /// Serialized spend-permission payload, stored verbatim.
    pub payload: String,
}

#[derive(Debug, Serialize)]
pub struct CreateTaskResponse {
    pub id: Uuid,
    pub status: TaskStatus,
}

#[derive(Debug, Serialize)]
pub struct CronResponse {
    pub success: bool,
    /// Number of tasks claimed and handed to the engine this pass.
    pub dispatched: usize,
}
