//! The task execution engine.
//!
//! Drives a claimed task through the full on-chain sequence: decode the
//! signed permission, connect the spender wallet, discover candidate
//! tokens, approve and consume the permission, then buy each allocated
//! token and forward the proceeds to the granting account. Every
//! externally observable step appends to the task's log and persists
//! `running` before the next step starts, so the log reconstructs the
//! attempt even if the process dies mid-sequence.
//!
//! Failures never escape [`TaskEngine::execute`]. Anything raised after
//! the first on-chain submission is appended to the accumulated log and
//! the task ends `failed`; there are no compensating transactions, so a
//! failed task's log is the reconciliation record for funds that may
//! already have moved.

use std::sync::Arc;

use alloy::primitives::{Address, U256, utils::format_ether};
use uuid::Uuid;

use crate::allocation::AllocationPlan;
use crate::chain::{ChainConnector, ChainSession};
use crate::config::EngineConfig;
use crate::discovery::{self, DiscoveredAsset, TokenDiscovery};
use crate::error::{DiscoveryError, Error, TaskError};
use crate::permission::SpendPermission;
use crate::store::{Task, TaskKind, TaskStatus, TaskStore};

/// Fee-unit rounding on reported swap outputs can overstate the realized
/// amount by one base unit; the engine shaves it off before moving funds.
const FEE_ROUNDING_MARGIN: u64 = 1;

/// How an execution attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every step finished; the task is `success`.
    Completed,
    /// Benign early abort (wallet setup failed or nothing to trade):
    /// no on-chain effect, no log written, task eligible for retry.
    Skipped,
    /// A step raised; the error text is in the task log and the task is
    /// `failed`.
    Failed,
}

/// Orchestrates one task execution at a time; holds no cross-task state,
/// so distinct task ids may execute concurrently on clones of the
/// surrounding `Arc`s.
pub struct TaskEngine {
    store: Arc<dyn TaskStore>,
    discovery: Arc<dyn TokenDiscovery>,
    connector: Arc<dyn ChainConnector>,
    config: EngineConfig,
    target_network: String,
}

impl TaskEngine {
    pub fn new(
        store: Arc<dyn TaskStore>,
        discovery: Arc<dyn TokenDiscovery>,
        connector: Arc<dyn ChainConnector>,
        config: EngineConfig,
        target_network: impl Into<String>,
    ) -> Self {
        Self {
            store,
            discovery,
            connector,
            config,
            target_network: target_network.into(),
        }
    }

    /// Execute a claimed task to completion or caught failure.
    pub async fn execute(&self, task: &Task) -> RunOutcome {
        let mut log = TaskLog::new(self.store.clone(), task.id, task.log.clone());

        // Pure validation: a bad task ends failed before any side effect.
        let permission = match validate(task) {
            Ok(permission) => permission,
            Err(err) => {
                tracing::warn!(task_id = %task.id, error = %err, "task failed validation");
                log.fail(&err.to_string()).await;
                return RunOutcome::Failed;
            }
        };

        // Wallet capability. Failing here means nothing started; abort
        // silently rather than record a running state for a task that
        // never touched the chain. The dispatcher releases the claim.
        let session = match self.connector.connect().await {
            Ok(session) => session,
            Err(err) => {
                tracing::warn!(
                    task_id = %task.id,
                    error = %err,
                    "wallet setup failed, leaving task for retry"
                );
                return RunOutcome::Skipped;
            }
        };

        // Discovery before any spend: an empty feed is a no-op outcome,
        // not a failure, and must leave the permission unconsumed.
        let assets = match self.discovery.latest_tokens().await {
            Ok(all) => discovery::on_network(all, &self.target_network),
            Err(err) => {
                tracing::error!(task_id = %task.id, error = %err, "asset discovery failed");
                log.fail(&Error::from(err).to_string()).await;
                return RunOutcome::Failed;
            }
        };
        if assets.is_empty() {
            tracing::info!(
                task_id = %task.id,
                network = %self.target_network,
                "no eligible assets, skipping"
            );
            return RunOutcome::Skipped;
        }

        match self.run_pipeline(&permission, &assets, &session, &mut log).await {
            Ok(()) => {
                if let Err(err) = log.finish(TaskStatus::Success).await {
                    tracing::error!(task_id = %task.id, error = %err, "failed to persist success");
                    return RunOutcome::Failed;
                }
                tracing::info!(task_id = %task.id, "task completed");
                RunOutcome::Completed
            }
            Err(err) => {
                tracing::error!(task_id = %task.id, error = %err, "task failed");
                log.fail(&err.to_string()).await;
                RunOutcome::Failed
            }
        }
    }

    /// The fallible on-chain sequence. Each `?` is a step boundary; the
    /// caller owns the single failure catch.
    async fn run_pipeline(
        &self,
        permission: &SpendPermission,
        assets: &[DiscoveredAsset],
        session: &ChainSession,
        log: &mut TaskLog,
    ) -> Result<(), Error> {
        let approve_hash = session.ledger.approve_with_signature(permission).await?;
        log.append(format!("Approve Hash: {approve_hash}")).await?;

        // Let the approval get indexed before the dependent spend reads it.
        tokio::time::sleep(self.config.settlement_delay).await;

        let spend_hash = session.ledger.spend(permission, permission.allowance).await?;
        log.append(format!("Spend Hash: {spend_hash}")).await?;

        tokio::time::sleep(self.config.post_spend_delay).await;

        let plan = AllocationPlan::split(
            permission.allowance,
            assets,
            self.config.max_trade_targets,
        );
        let total = plan.len();
        for (index, allocation) in plan.entries().iter().enumerate() {
            let symbol = allocation.asset.display_symbol();
            let token = parse_asset_address(&allocation.asset)?;

            let buy = session.wallet.buy(allocation.amount, token).await?;
            log.append(format!(
                "Trade {}/{}: buying {} with {} ETH: {}",
                index + 1,
                total,
                symbol,
                format_ether(allocation.amount),
                buy.tx_hash
            ))
            .await?;

            let realized = buy.amount_out.saturating_sub(U256::from(FEE_ROUNDING_MARGIN));
            log.append(format!("Trade completed, received {realized} {symbol}"))
                .await?;

            let transfer_hash = session
                .wallet
                .transfer(realized, token, permission.account)
                .await?;
            log.append(format!(
                "Transferring {realized} {symbol} to {}: {transfer_hash}",
                permission.account
            ))
            .await?;
            log.append("Transfer completed").await?;
        }

        Ok(())
    }
}

/// Check the discriminator and decode the payload; no side effects.
fn validate(task: &Task) -> Result<SpendPermission, TaskError> {
    match task.kind {
        TaskKind::SnipeMemeCoins => {}
    }
    if task.payload.trim().is_empty() {
        return Err(TaskError::MissingPayload);
    }
    SpendPermission::from_json(&task.payload)
}

fn parse_asset_address(asset: &DiscoveredAsset) -> Result<Address, Error> {
    asset
        .token_address
        .parse()
        .map_err(|_| {
            Error::from(DiscoveryError::InvalidAsset {
                address: asset.token_address.clone(),
            })
        })
}

/// Accumulates the task's display log and persists every append.
struct TaskLog {
    store: Arc<dyn TaskStore>,
    task_id: Uuid,
    lines: String,
}

impl TaskLog {
    fn new(store: Arc<dyn TaskStore>, task_id: Uuid, existing: String) -> Self {
        Self {
            store,
            task_id,
            lines: existing,
        }
    }

    fn push(&mut self, line: &str) {
        self.lines.push_str(line);
        self.lines.push('\n');
    }

    /// Append a line and persist status=running before proceeding.
    async fn append(&mut self, line: impl AsRef<str>) -> Result<(), Error> {
        self.push(line.as_ref());
        self.store
            .update_status(self.task_id, TaskStatus::Running, &self.lines)
            .await?;
        Ok(())
    }

    /// Persist a terminal success with the accumulated log.
    async fn finish(self, status: TaskStatus) -> Result<(), Error> {
        self.store
            .update_status(self.task_id, status, &self.lines)
            .await?;
        Ok(())
    }

    /// Append the error text to whatever already accumulated and persist
    /// the terminal failure. Best effort: a store error at this point is
    /// only traced, the task outcome is already decided.
    async fn fail(mut self, error_text: &str) {
        self.push(error_text);
        if let Err(err) = self
            .store
            .update_status(self.task_id, TaskStatus::Failed, &self.lines)
            .await
        {
            tracing::error!(task_id = %self.task_id, error = %err, "failed to persist failure");
        }
    }
}
