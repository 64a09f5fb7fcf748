//! Permission ledger adapter: the two permission-consuming contract calls.

use alloy::primitives::U256;
use alloy::primitives::aliases::{U48, U160};
use alloy::providers::DynProvider;
use async_trait::async_trait;

use super::{SpendPermissionManager, TxHash};
use crate::error::ChainError;
use crate::permission::SpendPermission;

/// Submits the approve and spend calls against the permission manager.
///
/// Each operation is a single attempt with no built-in retry, and the
/// returned hash is taken at broadcast; settlement is the caller's
/// concern.
#[async_trait]
pub trait PermissionLedger: Send + Sync {
    /// Register the signed permission on chain.
    async fn approve_with_signature(
        &self,
        permission: &SpendPermission,
    ) -> Result<TxHash, ChainError>;

    /// Pull `value` of the allowance from the granting account.
    async fn spend(&self, permission: &SpendPermission, value: U256) -> Result<TxHash, ChainError>;
}

/// RPC-backed ledger bound to one SpendPermissionManager deployment.
pub struct RpcPermissionLedger {
    contract: SpendPermissionManager::SpendPermissionManagerInstance<DynProvider>,
}

impl RpcPermissionLedger {
    pub fn new(manager: alloy::primitives::Address, provider: DynProvider) -> Self {
        Self {
            contract: SpendPermissionManager::new(manager, provider),
        }
    }
}

#[async_trait]
impl PermissionLedger for RpcPermissionLedger {
    async fn approve_with_signature(
        &self,
        permission: &SpendPermission,
    ) -> Result<TxHash, ChainError> {
        let pending = self
            .contract
            .approveWithSignature(onchain_permission(permission), permission.signature.clone())
            .send()
            .await
            .map_err(|e| ChainError::Submission {
                call: "approveWithSignature",
                reason: e.to_string(),
            })?;
        Ok(*pending.tx_hash())
    }

    async fn spend(&self, permission: &SpendPermission, value: U256) -> Result<TxHash, ChainError> {
        if value.bit_len() > 160 {
            return Err(ChainError::Submission {
                call: "spend",
                reason: format!("value {value} exceeds uint160"),
            });
        }
        let pending = self
            .contract
            .spend(onchain_permission(permission), value.to::<U160>())
            .send()
            .await
            .map_err(|e| ChainError::Submission {
                call: "spend",
                reason: e.to_string(),
            })?;
        Ok(*pending.tx_hash())
    }
}

/// Rebuild the exact tuple the signature was computed over.
///
/// Width conversions are infallible here because `SpendPermission`
/// validated every field against its on-chain type at decode time.
fn onchain_permission(p: &SpendPermission) -> SpendPermissionManager::SpendPermission {
    SpendPermissionManager::SpendPermission {
        account: p.account,
        spender: p.spender,
        token: p.token,
        allowance: p.allowance.to::<U160>(),
        period: U48::from(p.period),
        start: U48::from(p.start),
        end: U48::from(p.end),
        salt: p.salt,
        extraData: p.extra_data.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Bytes, address};

    #[test]
    fn onchain_tuple_preserves_every_field() {
        let permission = SpendPermission {
            account: address!("1111111111111111111111111111111111111111"),
            spender: address!("2222222222222222222222222222222222222222"),
            token: crate::permission::NATIVE_TOKEN,
            allowance: U256::from(1_000_000_000_000_000u64),
            period: 86_400,
            start: 1_700_000_000,
            end: 1_700_086_400,
            salt: U256::from(1_700_000_000u64),
            extra_data: Bytes::new(),
            signature: Bytes::from(vec![0xde, 0xad]),
        };

        let tuple = onchain_permission(&permission);
        assert_eq!(tuple.account, permission.account);
        assert_eq!(tuple.spender, permission.spender);
        assert_eq!(tuple.token, permission.token);
        assert_eq!(tuple.allowance, U160::from(1_000_000_000_000_000u64));
        assert_eq!(tuple.period, U48::from(86_400u64));
        assert_eq!(tuple.start, U48::from(1_700_000_000u64));
        assert_eq!(tuple.end, U48::from(1_700_086_400u64));
        assert_eq!(tuple.salt, permission.salt);
        assert!(tuple.extraData.is_empty());
    }
}
