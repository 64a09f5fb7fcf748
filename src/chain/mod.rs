//! On-chain plumbing: contract bindings, provider construction and the
//! two execution adapters (permission ledger, trade wallet).

pub mod ledger;
pub mod wallet;

pub use ledger::{PermissionLedger, RpcPermissionLedger};
pub use wallet::{ChainConnector, ChainSession, RpcConnector, TradeOutcome, TradeWallet};

use alloy::network::EthereumWallet;
use alloy::primitives::{Address, B256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol;
use secrecy::ExposeSecret;

use crate::config::{ChainConfig, SpenderConfig};
use crate::error::ChainError;

/// Transaction hash as returned at broadcast time.
pub type TxHash = B256;

sol! {
    #[sol(rpc)]
    contract SpendPermissionManager {
        /// Field order and widths match the signed EIP-712 struct; any
        /// deviation makes the on-chain signature check fail.
        struct SpendPermission {
            address account;
            address spender;
            address token;
            uint160 allowance;
            uint48 period;
            uint48 start;
            uint48 end;
            uint256 salt;
            bytes extraData;
        }

        function approveWithSignature(SpendPermission calldata spendPermission, bytes calldata signature) external returns (bool);
        function spend(SpendPermission calldata spendPermission, uint160 value) external;
    }

    #[sol(rpc)]
    contract SwapRouter {
        function swapExactETHForTokens(uint256 amountOutMin, address[] calldata path, address to, uint256 deadline) external payable returns (uint256[] memory amounts);
        function getAmountsOut(uint256 amountIn, address[] calldata path) external view returns (uint256[] memory amounts);
    }

    #[sol(rpc)]
    contract Erc20 {
        function transfer(address to, uint256 amount) external returns (bool);
        function balanceOf(address owner) external view returns (uint256);
    }
}

/// Build a provider with the spender's signer attached.
///
/// Key parsing happens here, per connection, so a malformed key surfaces
/// as a setup failure for the task being executed instead of at startup.
pub(crate) fn connect_provider(
    chain: &ChainConfig,
    spender: &SpenderConfig,
) -> Result<(DynProvider, Address), ChainError> {
    let signer: PrivateKeySigner = spender
        .private_key
        .expose_secret()
        .parse()
        .map_err(|e| ChainError::InvalidKey(format!("{e}")))?;
    let spender_address = signer.address();
    let wallet = EthereumWallet::from(signer);
    let provider = ProviderBuilder::new()
        .wallet(wallet)
        .connect_http(chain.rpc_url.clone())
        .erased();
    Ok((provider, spender_address))
}

/// Check the RPC endpoint answers and serves the configured chain.
pub(crate) async fn verify_chain(
    provider: &DynProvider,
    expected_chain_id: u64,
) -> Result<(), ChainError> {
    let chain_id = provider
        .get_chain_id()
        .await
        .map_err(|e| ChainError::Transport(e.to_string()))?;
    if chain_id != expected_chain_id {
        return Err(ChainError::Transport(format!(
            "RPC serves chain {chain_id}, expected {expected_chain_id}"
        )));
    }
    Ok(())
}
