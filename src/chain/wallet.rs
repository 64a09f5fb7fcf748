//! Trade wallet adapter: buys and destination transfers for one wallet.

use std::sync::Arc;

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, U256};
use alloy::providers::{DynProvider, Provider};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;

use super::{Erc20, PermissionLedger, RpcPermissionLedger, SwapRouter, TxHash};
use crate::config::{ChainConfig, SpenderConfig};
use crate::error::ChainError;
use crate::permission::NATIVE_TOKEN;

/// Tolerated quote-to-execution slippage, in basis points.
const SLIPPAGE_BPS: u64 = 100;
/// How long a submitted swap stays valid.
const SWAP_DEADLINE_SECS: i64 = 300;

/// Result of a buy: the broadcast hash and the realized output amount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeOutcome {
    pub tx_hash: TxHash,
    pub amount_out: U256,
}

/// Executes buys and transfers for a single wallet identity.
#[async_trait]
pub trait TradeWallet: Send + Sync {
    /// Swap `amount_in` of native value into `token`.
    async fn buy(&self, amount_in: U256, token: Address) -> Result<TradeOutcome, ChainError>;

    /// Move `amount` of `token` (native sentinel supported) to `to`.
    async fn transfer(
        &self,
        amount: U256,
        token: Address,
        to: Address,
    ) -> Result<TxHash, ChainError>;
}

/// The pair of adapters a task execution works through, bound to one
/// freshly constructed wallet session.
pub struct ChainSession {
    pub ledger: Arc<dyn PermissionLedger>,
    pub wallet: Arc<dyn TradeWallet>,
}

/// Connects a wallet session for one task execution.
///
/// Construction failure (malformed key, unreachable RPC, wrong chain)
/// is the engine's silent-abort path: the task stays pending and the
/// next trigger run retries it. A session is never reused across tasks.
#[async_trait]
pub trait ChainConnector: Send + Sync {
    async fn connect(&self) -> Result<ChainSession, ChainError>;
}

/// Production connector building an RPC-backed session from config.
pub struct RpcConnector {
    chain: ChainConfig,
    spender: SpenderConfig,
}

impl RpcConnector {
    pub fn new(chain: ChainConfig, spender: SpenderConfig) -> Self {
        Self { chain, spender }
    }
}

#[async_trait]
impl ChainConnector for RpcConnector {
    async fn connect(&self) -> Result<ChainSession, ChainError> {
        let (provider, spender_address) = super::connect_provider(&self.chain, &self.spender)?;
        super::verify_chain(&provider, self.chain.chain_id).await?;

        let ledger = Arc::new(RpcPermissionLedger::new(
            self.chain.permission_manager,
            provider.clone(),
        ));
        let wallet = Arc::new(RpcTradeWallet {
            provider,
            router: self.chain.swap_router,
            wrapped_native: self.chain.wrapped_native,
            spender: spender_address,
        });
        Ok(ChainSession { ledger, wallet })
    }
}

/// RPC-backed trade wallet swapping through a V2-style router.
pub struct RpcTradeWallet {
    provider: DynProvider,
    router: Address,
    wrapped_native: Address,
    spender: Address,
}

#[async_trait]
impl TradeWallet for RpcTradeWallet {
    async fn buy(&self, amount_in: U256, token: Address) -> Result<TradeOutcome, ChainError> {
        let router = SwapRouter::new(self.router, self.provider.clone());
        let path = vec![self.wrapped_native, token];

        let amounts = router
            .getAmountsOut(amount_in, path.clone())
            .call()
            .await
            .map_err(|e| ChainError::Quote {
                token: token.to_string(),
                reason: e.to_string(),
            })?;
        let quoted_out = amounts.last().copied().unwrap_or_default();
        let min_out = quoted_out - quoted_out * U256::from(SLIPPAGE_BPS) / U256::from(10_000u64);

        let deadline = swap_deadline(chrono::Utc::now().timestamp());
        let pending = router
            .swapExactETHForTokens(min_out, path, self.spender, deadline)
            .value(amount_in)
            .send()
            .await
            .map_err(|e| ChainError::Submission {
                call: "swapExactETHForTokens",
                reason: e.to_string(),
            })?;

        Ok(TradeOutcome {
            tx_hash: *pending.tx_hash(),
            amount_out: quoted_out,
        })
    }

    async fn transfer(
        &self,
        amount: U256,
        token: Address,
        to: Address,
    ) -> Result<TxHash, ChainError> {
        if token == NATIVE_TOKEN {
            let request = TransactionRequest::default().with_to(to).with_value(amount);
            let pending = self
                .provider
                .send_transaction(request)
                .await
                .map_err(|e| ChainError::Submission {
                    call: "transfer",
                    reason: e.to_string(),
                })?;
            return Ok(*pending.tx_hash());
        }

        let pending = Erc20::new(token, self.provider.clone())
            .transfer(to, amount)
            .send()
            .await
            .map_err(|e| ChainError::Submission {
                call: "transfer",
                reason: e.to_string(),
            })?;
        Ok(*pending.tx_hash())
    }
}

fn swap_deadline(now: i64) -> U256 {
    U256::from(now.max(0) as u64 + SWAP_DEADLINE_SECS as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadline_is_offset_from_now() {
        assert_eq!(swap_deadline(1_700_000_000), U256::from(1_700_000_300u64));
        // A clock before the epoch clamps instead of underflowing.
        assert_eq!(swap_deadline(-5), U256::from(SWAP_DEADLINE_SECS as u64));
    }
}
