//! HTTP gateway: task intake, status reads and the trigger endpoint.
//!
//! Three routes:
//! - `POST /api/tasks` registers a task in `pending`.
//! - `GET /api/tasks/{id}` returns the full task, log included, scoped
//!   to the owning caller.
//! - `GET /api/cron` is the credential-gated trigger: it claims every
//!   pending task and dispatches each to the engine, returning
//!   immediately while executions run in the background.
//!
//! Caller identity is the opaque `x-user-id` header; there is no
//! authentication layer here beyond the cron bearer secret.

pub mod types;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
};
use secrecy::{ExposeSecret, SecretString};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::dispatch;
use crate::engine::TaskEngine;
use crate::store::{Task, TaskStore};
use types::{CreateTaskRequest, CreateTaskResponse, CronResponse};

const USER_HEADER: &str = "x-user-id";
const DEFAULT_USER: &str = "local";

/// Shared state behind every handler.
pub struct GatewayState {
    pub store: Arc<dyn TaskStore>,
    pub engine: Arc<TaskEngine>,
    pub cron_secret: SecretString,
}

/// Build the gateway router.
pub fn router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/api/tasks", post(create_task_handler))
        .route("/api/tasks/{id}", get(task_status_handler))
        .route("/api/cron", get(cron_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn caller_id(headers: &HeaderMap) -> String {
    headers
        .get(USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_USER)
        .to_string()
}

async fn create_task_handler(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Json(request): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<CreateTaskResponse>), (StatusCode, String)> {
    if request.payload.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "payload and type are required".to_string(),
        ));
    }

    let task = Task::new(
        request.id.unwrap_or_else(Uuid::new_v4),
        request.kind,
        request.payload,
        caller_id(&headers),
    );
    let response = CreateTaskResponse {
        id: task.id,
        status: task.status,
    };

    state.store.add_task(task).await.map_err(|e| match e {
        crate::error::StoreError::Duplicate { id } => {
            (StatusCode::CONFLICT, format!("task {id} already exists"))
        }
        other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    })?;

    tracing::info!(task_id = %response.id, "background task registered");
    Ok((StatusCode::OK, Json(response)))
}

async fn task_status_handler(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Task>, (StatusCode, String)> {
    let task = state
        .store
        .get_task(id)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .ok_or((StatusCode::NOT_FOUND, "Task not found".to_string()))?;

    if task.user_id != caller_id(&headers) {
        return Err((StatusCode::FORBIDDEN, "Not your task".to_string()));
    }

    Ok(Json(task))
}

async fn cron_handler(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
) -> Result<Json<CronResponse>, (StatusCode, String)> {
    let expected = format!("Bearer {}", state.cron_secret.expose_secret());
    let presented = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if presented != expected {
        return Err((StatusCode::UNAUTHORIZED, "Unauthorized".to_string()));
    }

    let handles = dispatch::run_pending(state.store.clone(), state.engine.clone())
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    let dispatched = handles.len();
    // Executions continue in the background; the trigger does not wait.
    drop(handles);

    Ok(Json(CronResponse {
        success: true,
        dispatched,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{ChainConnector, ChainSession};
    use crate::config::EngineConfig;
    use crate::discovery::{DiscoveredAsset, TokenDiscovery};
    use crate::error::{ChainError, DiscoveryError};
    use crate::store::{MemoryStore, TaskKind, TaskStatus};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use std::time::Duration;
    use tower::ServiceExt;

    struct EmptyDiscovery;

    #[async_trait]
    impl TokenDiscovery for EmptyDiscovery {
        async fn latest_tokens(&self) -> Result<Vec<DiscoveredAsset>, DiscoveryError> {
            Ok(Vec::new())
        }
    }

    struct UnreachableConnector;

    #[async_trait]
    impl ChainConnector for UnreachableConnector {
        async fn connect(&self) -> Result<ChainSession, ChainError> {
            Err(ChainError::Transport("rpc unreachable".to_string()))
        }
    }

    fn test_state() -> Arc<GatewayState> {
        let store: Arc<dyn TaskStore> = Arc::new(MemoryStore::new());
        let engine = Arc::new(TaskEngine::new(
            store.clone(),
            Arc::new(EmptyDiscovery),
            Arc::new(UnreachableConnector),
            EngineConfig {
                settlement_delay: Duration::ZERO,
                post_spend_delay: Duration::ZERO,
                max_trade_targets: 4,
            },
            "base",
        ));
        Arc::new(GatewayState {
            store,
            engine,
            cron_secret: SecretString::from("cron-secret"),
        })
    }

    fn signed_payload() -> String {
        serde_json::json!({
            "account": "0x1111111111111111111111111111111111111111",
            "spender": "0x2222222222222222222222222222222222222222",
            "token": "0xEeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE",
            "allowance": "1000000000000000",
            "period": 86400,
            "start": 1700000000,
            "end": 1700086400,
            "salt": "1700000000",
            "extraData": "0x",
            "signature": "0xdeadbeef"
        })
        .to_string()
    }

    fn intake_body(payload: &str) -> String {
        serde_json::json!({
            "type": "snipeMemeCoins",
            "payload": payload,
        })
        .to_string()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1 << 20)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn intake_then_status_roundtrip() {
        let state = test_state();
        let app = router(state);

        let response = app
            .clone()
            .oneshot(
                Request::post("/api/tasks")
                    .header("content-type", "application/json")
                    .header(USER_HEADER, "alice")
                    .body(Body::from(intake_body("{\"account\":\"0x0\"}")))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let created = body_json(response).await;
        let id = created["id"].as_str().unwrap().to_string();
        assert_eq!(created["status"], "pending");

        let response = app
            .oneshot(
                Request::get(format!("/api/tasks/{id}"))
                    .header(USER_HEADER, "alice")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let task = body_json(response).await;
        assert_eq!(task["status"], "pending");
        assert_eq!(task["log"], "");
        assert_eq!(task["type"], "snipeMemeCoins");
    }

    #[tokio::test]
    async fn intake_rejects_empty_payload() {
        let app = router(test_state());

        let response = app
            .oneshot(
                Request::post("/api/tasks")
                    .header("content-type", "application/json")
                    .body(Body::from(intake_body("  ")))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn status_read_is_owner_scoped() {
        let state = test_state();
        let app = router(state.clone());

        let response = app
            .clone()
            .oneshot(
                Request::post("/api/tasks")
                    .header("content-type", "application/json")
                    .header(USER_HEADER, "alice")
                    .body(Body::from(intake_body("{}")))
                    .unwrap(),
            )
            .await
            .unwrap();
        let id = body_json(response).await["id"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(
                Request::get(format!("/api/tasks/{id}"))
                    .header(USER_HEADER, "mallory")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .oneshot(
                Request::get(format!("/api/tasks/{}", Uuid::new_v4()))
                    .header(USER_HEADER, "alice")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cron_requires_the_bearer_secret() {
        let app = router(test_state());

        let response = app
            .clone()
            .oneshot(Request::get("/api/cron").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .clone()
            .oneshot(
                Request::get("/api/cron")
                    .header("authorization", "Bearer wrong")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(
                Request::get("/api/cron")
                    .header("authorization", "Bearer cron-secret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["dispatched"], 0);
    }

    #[tokio::test]
    async fn cron_dispatches_pending_tasks_and_releases_skips() {
        let state = test_state();
        let app = router(state.clone());

        let task = Task::new(
            Uuid::new_v4(),
            TaskKind::SnipeMemeCoins,
            signed_payload(),
            "alice".to_string(),
        );
        state.store.add_task(task.clone()).await.unwrap();

        let response = app
            .oneshot(
                Request::get("/api/cron")
                    .header("authorization", "Bearer cron-secret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["dispatched"], 1);

        // The connector is unreachable, so the execution skips and the
        // claim is released. Wait for the background task to settle.
        let mut status = TaskStatus::Running;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            status = state
                .store
                .get_task(task.id)
                .await
                .unwrap()
                .unwrap()
                .status;
            if status == TaskStatus::Pending {
                break;
            }
        }
        assert_eq!(status, TaskStatus::Pending);
    }
}
