//! Core types shared across the timelock escrow workspace
//!
//! Addresses, timestamps, token amounts and the bucket key used by the
//! escrow ledger to group deposits.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Seconds since the Unix epoch
pub type UnixTimestamp = u64;

/// Token units held in escrow
pub type TokenAmount = u128;

/// Errors produced when parsing core types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("Address cannot be empty")]
    Empty,

    #[error("Address contains whitespace: {0:?}")]
    Whitespace(String),
}

/// Account address on the token ledger
///
/// Opaque to the escrow: only equality and ordering matter. An address is
/// never empty and never contains whitespace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Parse an address
    pub fn new<S: Into<String>>(value: S) -> Result<Self, AddressError> {
        let value = value.into();
        if value.is_empty() {
            return Err(AddressError::Empty);
        }
        if value.chars().any(char::is_whitespace) {
            return Err(AddressError::Whitespace(value));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for Address {
    type Error = AddressError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl std::str::FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Key of a bucket: one recipient, one unlock time
///
/// Ordered by recipient first so a recipient's buckets form a contiguous
/// range sorted by unlock time.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BucketKey {
    pub recipient: Address,
    pub unlock_time: UnixTimestamp,
}

impl BucketKey {
    pub fn new(recipient: Address, unlock_time: UnixTimestamp) -> Self {
        Self {
            recipient,
            unlock_time,
        }
    }

    /// Whether the bucket can be released at `now`
    pub fn is_unlocked_at(&self, now: UnixTimestamp) -> bool {
        self.unlock_time <= now
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.recipient, self.unlock_time)
    }
}
