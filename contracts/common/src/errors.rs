//! Error Types for the UrbanCycle contracts
//!
//! Every failure carries a distinguishable kind and a stable code so the
//! reporting layer never has to render a bare generic failure.

use thiserror::Error;

use crate::types::Address;

/// Result type alias for UrbanCycle operations
pub type UrbanResult<T> = Result<T, UrbanError>;

/// Main error enum for all UrbanCycle contract errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrbanError {
    // ============ Authorization Errors ============
    /// Caller lacks the required privilege (minter, bound manager, admin or owner)
    #[error("caller {} is not authorized (expected {})", hex::encode(.actual), hex::encode(.expected))]
    Unauthorized { expected: Address, actual: Address },

    /// The provenance registry already has a bound manager
    #[error("registry is already bound to manager {}", hex::encode(.manager))]
    AlreadyBound { manager: Address },

    /// The manager is not an authorized minter on the reward token
    #[error("manager {} is not an authorized minter", hex::encode(.manager))]
    MintAuthorizationMissing { manager: Address },

    /// A bootstrap authorization edge is missing
    #[error("bootstrap incomplete: {missing}")]
    BootstrapIncomplete { missing: &'static str },

    // ============ Input Errors ============
    /// Invalid amount provided
    #[error("invalid amount {amount}: {reason:?}")]
    InvalidAmount { amount: u64, reason: AmountErrorReason },

    /// Malformed or out-of-range collection event
    #[error("invalid event field `{field}`: {reason}")]
    InvalidEvent { field: &'static str, reason: &'static str },

    /// Invalid address (e.g., zero address)
    #[error("invalid address: {reason}")]
    InvalidAddress { reason: &'static str },

    // ============ State Errors ============
    /// Submission id was already settled
    #[error("submission `{submission_id}` was already settled")]
    DuplicateSubmission { submission_id: String },

    /// Unknown record, entry or account lookup
    #[error("{what} not found")]
    NotFound { what: &'static str },

    /// Insufficient balance for operation
    #[error("insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance { available: u64, requested: u64 },

    /// Invalid state transition
    #[error("invalid state transition")]
    InvalidStateTransition,

    // ============ Execution Errors ============
    /// The host's per-run execution budget ran out
    #[error("execution budget exhausted at stage {stage}")]
    ExecutionTimeout { stage: &'static str },

    /// Stablecoin distribution failed (non-fatal, retryable)
    #[error("payment failed: {reason}")]
    PaymentFailed { reason: String },

    // ============ Math Errors ============
    /// Arithmetic overflow occurred
    #[error("arithmetic overflow")]
    Overflow,
}

/// Reasons for amount-related errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountErrorReason {
    /// Amount is zero when non-zero required
    Zero,
    /// Amount exceeds maximum
    TooLarge,
}

impl UrbanError {
    /// Returns a human-readable error code for logging/debugging
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized { .. } => "E020_UNAUTHORIZED",
            Self::AlreadyBound { .. } => "E021_ALREADY_BOUND",
            Self::MintAuthorizationMissing { .. } => "E022_MINT_AUTH_MISSING",
            Self::BootstrapIncomplete { .. } => "E023_BOOTSTRAP_INCOMPLETE",
            Self::InvalidAmount { .. } => "E010_INVALID_AMOUNT",
            Self::InvalidEvent { .. } => "E011_INVALID_EVENT",
            Self::InvalidAddress { .. } => "E012_INVALID_ADDRESS",
            Self::DuplicateSubmission { .. } => "E030_DUPLICATE_SUBMISSION",
            Self::NotFound { .. } => "E031_NOT_FOUND",
            Self::InsufficientBalance { .. } => "E032_INSUFFICIENT_BALANCE",
            Self::InvalidStateTransition => "E033_INVALID_STATE",
            Self::ExecutionTimeout { .. } => "E040_EXECUTION_TIMEOUT",
            Self::PaymentFailed { .. } => "E041_PAYMENT_FAILED",
            Self::Overflow => "E080_OVERFLOW",
        }
    }

    /// Returns true if the caller can correct the input and try again
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InvalidAmount { .. }
                | Self::InvalidEvent { .. }
                | Self::InvalidAddress { .. }
                | Self::InsufficientBalance { .. }
                | Self::ExecutionTimeout { .. }
        )
    }

    /// Returns true if the same call may succeed later without changes
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::PaymentFailed { .. } | Self::ExecutionTimeout { .. })
    }
}
