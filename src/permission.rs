//! Signed spend-permission payloads.
//!
//! The wire format is the exact camelCase JSON the signing UI produced
//! when the user authorized the spend, and the field set mirrors the
//! EIP-712 `SpendPermission` struct the signature was computed over.
//! Anything that changes a field's value or width here breaks signature
//! verification on chain, so decoding is strict: bad addresses, oversized
//! integers and inverted validity windows are rejected before any
//! submission is attempted.

use alloy::primitives::{Address, Bytes, U256, address};
use serde::{Deserialize, Serialize};

use crate::error::TaskError;

/// Sentinel address the permission manager uses for the native token.
pub const NATIVE_TOKEN: Address = address!("EeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE");

/// `allowance` is a uint160 on chain.
const UINT160_BITS: usize = 160;
/// `period`, `start` and `end` are uint48 on chain.
const UINT48_MAX: u64 = (1 << 48) - 1;

/// Wire shape of the task payload, exactly as signed and registered.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePayload {
    account: String,
    spender: String,
    token: String,
    allowance: String,
    period: u64,
    start: u64,
    end: u64,
    salt: String,
    extra_data: String,
    signature: String,
}

/// A decoded, validated spend permission plus its authorization proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpendPermission {
    pub account: Address,
    pub spender: Address,
    pub token: Address,
    /// Maximum spendable amount in the token's smallest unit (uint160).
    pub allowance: U256,
    /// Recurring window length in seconds (uint48).
    pub period: u64,
    /// Validity window start, seconds since epoch (uint48).
    pub start: u64,
    /// Validity window end, seconds since epoch (uint48).
    pub end: u64,
    pub salt: U256,
    pub extra_data: Bytes,
    pub signature: Bytes,
}

impl SpendPermission {
    /// Decode a serialized task payload.
    pub fn from_json(payload: &str) -> Result<Self, TaskError> {
        let wire: WirePayload = serde_json::from_str(payload)
            .map_err(|e| TaskError::InvalidPayload(format!("malformed payload JSON: {e}")))?;

        let permission = Self {
            account: parse_address("account", &wire.account)?,
            spender: parse_address("spender", &wire.spender)?,
            token: parse_address("token", &wire.token)?,
            allowance: parse_u256("allowance", &wire.allowance)?,
            period: wire.period,
            start: wire.start,
            end: wire.end,
            salt: parse_u256("salt", &wire.salt)?,
            extra_data: parse_bytes("extraData", &wire.extra_data)?,
            signature: parse_bytes("signature", &wire.signature)?,
        };
        permission.validate()?;
        Ok(permission)
    }

    /// Check the ranges the on-chain struct enforces by type width.
    fn validate(&self) -> Result<(), TaskError> {
        if self.start > self.end {
            return Err(TaskError::InvalidPayload(format!(
                "start {} is after end {}",
                self.start, self.end
            )));
        }
        if self.allowance.bit_len() > UINT160_BITS {
            return Err(TaskError::InvalidPayload(
                "allowance exceeds uint160".to_string(),
            ));
        }
        for (name, value) in [
            ("period", self.period),
            ("start", self.start),
            ("end", self.end),
        ] {
            if value > UINT48_MAX {
                return Err(TaskError::InvalidPayload(format!(
                    "{name} {value} exceeds uint48"
                )));
            }
        }
        Ok(())
    }

    /// Whether the permission spends the native token.
    pub fn is_native(&self) -> bool {
        self.token == NATIVE_TOKEN
    }
}

fn parse_address(field: &str, raw: &str) -> Result<Address, TaskError> {
    raw.parse()
        .map_err(|e| TaskError::InvalidPayload(format!("invalid {field} '{raw}': {e}")))
}

fn parse_u256(field: &str, raw: &str) -> Result<U256, TaskError> {
    raw.parse()
        .map_err(|e| TaskError::InvalidPayload(format!("invalid {field} '{raw}': {e}")))
}

fn parse_bytes(field: &str, raw: &str) -> Result<Bytes, TaskError> {
    raw.parse()
        .map_err(|e| TaskError::InvalidPayload(format!("invalid {field} '{raw}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload_json() -> String {
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

    #[test]
    fn decodes_signed_payload() {
        let permission = SpendPermission::from_json(&payload_json()).unwrap();

        assert!(permission.is_native());
        assert_eq!(permission.allowance, U256::from(1_000_000_000_000_000u64));
        assert_eq!(permission.period, 86400);
        assert_eq!(permission.salt, U256::from(1_700_000_000u64));
        assert!(permission.extra_data.is_empty());
        assert_eq!(permission.signature.as_ref(), &[0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn rejects_inverted_window() {
        let raw = payload_json().replace("1700086400", "1600000000");
        let err = SpendPermission::from_json(&raw).unwrap_err();
        assert!(err.to_string().contains("after end"));
    }

    #[test]
    fn rejects_allowance_wider_than_uint160() {
        // 2^160 exactly, one past the widest legal allowance.
        let raw = payload_json().replace(
            "\"1000000000000000\"",
            "\"1461501637330902918203684832716283019655932542976\"",
        );
        let err = SpendPermission::from_json(&raw).unwrap_err();
        assert!(err.to_string().contains("uint160"));
    }

    #[test]
    fn rejects_malformed_address() {
        let raw = payload_json().replace("0x1111111111111111111111111111111111111111", "0x123");
        let err = SpendPermission::from_json(&raw).unwrap_err();
        assert!(err.to_string().contains("invalid account"));
    }

    #[test]
    fn rejects_missing_fields() {
        let err = SpendPermission::from_json("{}").unwrap_err();
        assert!(matches!(err, TaskError::InvalidPayload(_)));
    }
}
