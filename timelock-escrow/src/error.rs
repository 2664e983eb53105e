//! Error types for the escrow ledger
//!
//! Every ledger operation either applies completely or fails with one of
//! these errors and leaves buckets and token balances untouched.

use crate::token::TokenError;
use thiserror::Error;
use timelock_core::{Address, AddressError, BucketKey, TokenAmount, UnixTimestamp};

/// Main error type for escrow operations
#[derive(Error, Debug)]
pub enum EscrowError {
    /// Deposit pull failed: missing approval or depositor balance
    #[error("Transfer not authorized for {depositor} ({amount} units): {source}")]
    TransferNotAuthorized {
        depositor: Address,
        amount: TokenAmount,
        #[source]
        source: TokenError,
    },

    /// Batch sequences differ in length
    #[error("Malformed batch: {timestamps} timestamps but {amounts} amounts")]
    MalformedBatch { timestamps: usize, amounts: usize },

    /// A batch entry unlocks after the current time
    #[error("Bucket {key} is still locked (current time {now})")]
    StillLocked { key: BucketKey, now: UnixTimestamp },

    /// A batch entry requests more than its bucket holds at that point in the batch
    #[error("Insufficient balance in bucket {key}: requested {requested}, available {available}")]
    InsufficientBucketBalance {
        key: BucketKey,
        requested: TokenAmount,
        available: TokenAmount,
    },

    /// The escrow's own account used as depositor or recipient
    #[error("Escrow address {address} cannot act as {role}")]
    EscrowAddressNotAllowed { address: Address, role: &'static str },

    /// Forced release attempted by someone other than the admin
    #[error("Unauthorized: {caller} is not the escrow admin")]
    Unauthorized { caller: Address },

    /// Push transfer to the recipient failed
    #[error("Token transfer error: {0}")]
    TokenTransfer(#[from] TokenError),

    /// Arithmetic overflow on a bucket or batch total
    #[error("Amount overflow: {0}")]
    AmountOverflow(String),

    /// Restored buckets do not match the escrow's token balance
    #[error("Snapshot mismatch: buckets hold {buckets}, escrow token balance is {token_balance}")]
    SnapshotMismatch {
        buckets: TokenAmount,
        token_balance: TokenAmount,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EscrowError {
    /// Create an amount overflow error
    pub fn amount_overflow<S: Into<String>>(msg: S) -> Self {
        Self::AmountOverflow(msg.into())
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the error is a rejected request rather than an infrastructure failure
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::TransferNotAuthorized { .. }
                | Self::MalformedBatch { .. }
                | Self::StillLocked { .. }
                | Self::InsufficientBucketBalance { .. }
                | Self::Unauthorized { .. }
                | Self::EscrowAddressNotAllowed { .. }
        )
    }
}

impl From<::config::ConfigError> for EscrowError {
    fn from(err: ::config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<AddressError> for EscrowError {
    fn from(err: AddressError) -> Self {
        Self::Config(format!("invalid address: {}", err))
    }
}
