//! Pending-task dispatch.
//!
//! One trigger pass loads every pending task, claims each one, and
//! spawns the matching handler by kind. The claim is what makes a
//! double-firing trigger safe: the second pass loses every claim race
//! and dispatches nothing. A handler that reports `Skipped` did no
//! observable work, so its claim is released and the task returns to
//! the retry pool.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::engine::{RunOutcome, TaskEngine};
use crate::error::Error;
use crate::store::{TaskKind, TaskStore};

/// Claim and dispatch every pending task, returning one handle per
/// spawned execution. Callers that need the outcomes await the handles;
/// callers that fire-and-forget (the cron endpoint) drop them.
pub async fn run_pending(
    store: Arc<dyn TaskStore>,
    engine: Arc<TaskEngine>,
) -> Result<Vec<JoinHandle<RunOutcome>>, Error> {
    let pending = store.all_pending().await?;
    let mut handles = Vec::with_capacity(pending.len());

    for task in pending {
        let claimed = match store.claim(task.id).await {
            Ok(task) => task,
            Err(err) => {
                // Another trigger pass won the race; nothing to do.
                tracing::debug!(task_id = %task.id, error = %err, "task no longer claimable");
                continue;
            }
        };

        match claimed.kind {
            TaskKind::SnipeMemeCoins => {
                let engine = engine.clone();
                let store = store.clone();
                handles.push(tokio::spawn(async move {
                    let outcome = engine.execute(&claimed).await;
                    if outcome == RunOutcome::Skipped {
                        if let Err(err) = store.release(claimed.id).await {
                            tracing::warn!(
                                task_id = %claimed.id,
                                error = %err,
                                "failed to release skipped task"
                            );
                        }
                    }
                    outcome
                }));
            }
        }
    }

    Ok(handles)
}
