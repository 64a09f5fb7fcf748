//! Error types for sniperd.

use uuid::Uuid;

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),

    #[error("Task error: {0}")]
    Task(#[from] TaskError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Task store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Task not found: {0}")]
    NotFound(Uuid),

    #[error("Task {id} already exists")]
    Duplicate { id: Uuid },

    #[error("Task {id} cannot transition from {from} to {to}")]
    InvalidTransition { id: Uuid, from: String, to: String },

    #[error("Task {id} is not claimable in state {state}")]
    NotClaimable { id: Uuid, state: String },

    #[error("Task {id} log update would drop recorded lines")]
    LogRewind { id: Uuid },
}

/// Asset discovery errors.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("Feed request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Feed returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Feed returned unusable asset address: {address}")]
    InvalidAsset { address: String },
}

/// On-chain submission and wallet errors.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("Invalid spender key: {0}")]
    InvalidKey(String),

    #[error("RPC transport error: {0}")]
    Transport(String),

    #[error("{call} submission failed: {reason}")]
    Submission { call: &'static str, reason: String },

    #[error("Quote for {token} failed: {reason}")]
    Quote { token: String, reason: String },
}

/// Task payload and lifecycle errors.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("Invalid task: unexpected kind {kind}")]
    UnexpectedKind { kind: String },

    #[error("Invalid task: payload is missing")]
    MissingPayload,

    #[error("Invalid permission payload: {0}")]
    InvalidPayload(String),
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
