//! Data models returned by the escrow ledger
//!
//! Receipts for completed operations, read-only bucket views, release
//! plans and the serializable ledger snapshot.

use serde::{Deserialize, Serialize};
use timelock_core::{Address, BucketKey, TokenAmount, UnixTimestamp};
use uuid::Uuid;

/// Result of a successful deposit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositReceipt {
    pub id: Uuid,
    pub depositor: Address,
    pub bucket: BucketKey,
    pub amount: TokenAmount,
    /// Bucket balance after the deposit
    pub bucket_total: TokenAmount,
    pub recorded_at: UnixTimestamp,
}

/// Who initiated a release
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseKind {
    /// Recipient withdrew their own buckets
    Recipient,
    /// Admin pushed the buckets to the recipient
    Forced,
}

/// One debited batch entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseEntry {
    pub unlock_time: UnixTimestamp,
    pub amount: TokenAmount,
}

/// Result of a successful release batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseReceipt {
    pub id: Uuid,
    pub kind: ReleaseKind,
    pub recipient: Address,
    pub released_by: Address,
    /// Entries in batch order, duplicates preserved
    pub entries: Vec<ReleaseEntry>,
    /// Amount pushed to the recipient
    pub total: TokenAmount,
    pub recorded_at: UnixTimestamp,
}

/// Non-empty bucket belonging to a recipient
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketBalance {
    pub unlock_time: UnixTimestamp,
    pub amount: TokenAmount,
}

/// Batch that would release every unlocked bucket of a recipient
///
/// `timestamps` and `amounts` can be passed straight to
/// [`EscrowLedger::release`](crate::ledger::EscrowLedger::release).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReleasePlan {
    pub timestamps: Vec<UnixTimestamp>,
    pub amounts: Vec<TokenAmount>,
    pub total: TokenAmount,
}

impl ReleasePlan {
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// Serialized bucket row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotBucket {
    pub recipient: Address,
    pub unlock_time: UnixTimestamp,
    pub amount: TokenAmount,
}

/// Point-in-time copy of the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub escrow_address: Address,
    pub admin: Address,
    pub buckets: Vec<SnapshotBucket>,
}

impl LedgerSnapshot {
    pub fn to_json(&self) -> crate::EscrowResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> crate::EscrowResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
