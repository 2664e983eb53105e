//! Escrow Ledger - timelocked buckets keyed by recipient and unlock time
//!
//! Deposits pull tokens from the caller and credit the bucket
//! `(recipient, unlock_time)`. Releases debit one or more unlocked buckets
//! of a single recipient and push the batch total to that recipient.
//!
//! Every operation runs under the ledger's write lock from first check to
//! last mutation, including the token call, so operations are totally
//! ordered and a failed operation leaves no trace. Release batches are
//! simulated entry by entry against a transient copy of the touched
//! buckets; only a fully valid batch whose push transfer succeeds is
//! committed.

use crate::{
    EscrowResult,
    clock::Clock,
    error::EscrowError,
    models::{
        BucketBalance, DepositReceipt, LedgerSnapshot, ReleaseEntry, ReleaseKind, ReleasePlan,
        ReleaseReceipt, SnapshotBucket,
    },
    settings::LedgerConfig,
    token::{FungibleToken, TokenError},
};
use std::{collections::BTreeMap, sync::Arc};
use timelock_core::{Address, BucketKey, TokenAmount, UnixTimestamp};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

type Buckets = BTreeMap<BucketKey, TokenAmount>;

/// Timelocked escrow for a single fungible token
pub struct EscrowLedger {
    /// Account holding escrowed tokens on the token ledger
    escrow_address: Address,
    /// Only principal allowed to force releases
    admin: Address,
    token: Arc<dyn FungibleToken>,
    clock: Arc<dyn Clock>,
    /// Non-zero buckets only; absent keys read as zero
    buckets: RwLock<Buckets>,
}

impl EscrowLedger {
    /// Create an empty ledger
    pub fn new(
        token: Arc<dyn FungibleToken>,
        escrow_address: Address,
        admin: Address,
        clock: Arc<dyn Clock>,
    ) -> Self {
        info!(
            "Initializing escrow ledger {} (admin: {})",
            escrow_address, admin
        );

        Self {
            escrow_address,
            admin,
            token,
            clock,
            buckets: RwLock::new(BTreeMap::new()),
        }
    }

    /// Create an empty ledger wired from configuration
    pub fn from_config(config: &LedgerConfig, token: Arc<dyn FungibleToken>) -> Self {
        Self::new(
            token,
            config.escrow_address.clone(),
            config.admin_address.clone(),
            config.build_clock(),
        )
    }

    /// Rebuild a ledger from a snapshot
    ///
    /// Fails with [`EscrowError::SnapshotMismatch`] unless the snapshot's
    /// buckets add up to exactly what the escrow address holds on the token.
    pub async fn restore(
        snapshot: LedgerSnapshot,
        token: Arc<dyn FungibleToken>,
        clock: Arc<dyn Clock>,
    ) -> EscrowResult<Self> {
        let mut buckets = Buckets::new();
        let mut sum: TokenAmount = 0;

        for row in snapshot.buckets {
            sum = sum
                .checked_add(row.amount)
                .ok_or_else(|| EscrowError::amount_overflow("snapshot total exceeds u128"))?;
            if row.amount == 0 {
                continue;
            }

            let key = BucketKey::new(row.recipient, row.unlock_time);
            let entry = buckets.entry(key).or_insert(0);
            // Cannot overflow: bounded by `sum`
            *entry += row.amount;
        }

        let token_balance = token.balance_of(&snapshot.escrow_address).await;
        if sum != token_balance {
            return Err(EscrowError::SnapshotMismatch {
                buckets: sum,
                token_balance,
            });
        }

        info!(
            "Restored escrow ledger {} with {} buckets holding {}",
            snapshot.escrow_address,
            buckets.len(),
            sum
        );

        Ok(Self {
            escrow_address: snapshot.escrow_address,
            admin: snapshot.admin,
            token,
            clock,
            buckets: RwLock::new(buckets),
        })
    }

    pub fn escrow_address(&self) -> &Address {
        &self.escrow_address
    }

    pub fn admin(&self) -> &Address {
        &self.admin
    }

    /// Current time as seen by the unlock checks
    pub fn now(&self) -> UnixTimestamp {
        self.clock.now()
    }

    /// Pull `amount` from `caller` and credit bucket `(recipient, unlock_time)`
    ///
    /// The caller must have approved the escrow address for at least
    /// `amount`. Unlock times in the past produce an immediately
    /// releasable bucket.
    pub async fn deposit(
        &self,
        caller: &Address,
        recipient: &Address,
        unlock_time: UnixTimestamp,
        amount: TokenAmount,
    ) -> EscrowResult<DepositReceipt> {
        self.ensure_not_escrow(caller, "depositor")?;
        self.ensure_not_escrow(recipient, "recipient")?;

        let mut buckets = self.buckets.write().await;
        let key = BucketKey::new(recipient.clone(), unlock_time);

        let current = buckets.get(&key).copied().unwrap_or(0);
        let bucket_total = current.checked_add(amount).ok_or_else(|| {
            EscrowError::amount_overflow(format!("bucket {} cannot hold {} more", key, amount))
        })?;

        if let Err(source) = self
            .token
            .transfer_from(&self.escrow_address, caller, &self.escrow_address, amount)
            .await
        {
            warn!(
                "Rejected deposit of {} from {} into {}: {}",
                amount, caller, key, source
            );
            return Err(match source {
                TokenError::InsufficientAllowance { .. } | TokenError::InsufficientBalance { .. } => {
                    EscrowError::TransferNotAuthorized {
                        depositor: caller.clone(),
                        amount,
                        source,
                    }
                }
                other => EscrowError::TokenTransfer(other),
            });
        }

        if bucket_total > 0 {
            buckets.insert(key.clone(), bucket_total);
        }

        info!(
            "Deposited {} from {} into bucket {} (total {})",
            amount, caller, key, bucket_total
        );

        Ok(DepositReceipt {
            id: Uuid::new_v4(),
            depositor: caller.clone(),
            bucket: key,
            amount,
            bucket_total,
            recorded_at: self.clock.now(),
        })
    }

    /// Withdraw unlocked buckets belonging to `caller`
    ///
    /// `timestamps[i]` pairs with `amounts[i]`. The batch applies entirely or
    /// not at all.
    pub async fn release(
        &self,
        caller: &Address,
        timestamps: &[UnixTimestamp],
        amounts: &[TokenAmount],
    ) -> EscrowResult<ReleaseReceipt> {
        self.release_batch(caller, caller, ReleaseKind::Recipient, timestamps, amounts)
            .await
    }

    /// Push unlocked buckets of `recipient` to them on the admin's authority
    ///
    /// Time locks still apply; only the recipient-as-caller requirement is
    /// lifted.
    pub async fn release_force(
        &self,
        caller: &Address,
        recipient: &Address,
        timestamps: &[UnixTimestamp],
        amounts: &[TokenAmount],
    ) -> EscrowResult<ReleaseReceipt> {
        if caller != &self.admin {
            warn!(
                "Rejected forced release for {}: {} is not the admin",
                recipient, caller
            );
            return Err(EscrowError::Unauthorized {
                caller: caller.clone(),
            });
        }

        self.release_batch(recipient, caller, ReleaseKind::Forced, timestamps, amounts)
            .await
    }

    /// The token moves nothing when the escrow pays itself, so buckets
    /// would drift from the escrow's balance
    fn ensure_not_escrow(&self, address: &Address, role: &'static str) -> EscrowResult<()> {
        if address == &self.escrow_address {
            warn!("Rejected operation with escrow address as {}", role);
            return Err(EscrowError::EscrowAddressNotAllowed {
                address: address.clone(),
                role,
            });
        }
        Ok(())
    }

    async fn release_batch(
        &self,
        recipient: &Address,
        released_by: &Address,
        kind: ReleaseKind,
        timestamps: &[UnixTimestamp],
        amounts: &[TokenAmount],
    ) -> EscrowResult<ReleaseReceipt> {
        self.ensure_not_escrow(recipient, "recipient")?;

        let mut buckets = self.buckets.write().await;
        let now = self.clock.now();

        let (debited, total) = match simulate_batch(&buckets, recipient, timestamps, amounts, now)
        {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(
                    "Rejected {:?} release of {} entries for {}: {}",
                    kind,
                    timestamps.len(),
                    recipient,
                    err
                );
                return Err(err);
            }
        };

        if total > 0 {
            if let Err(err) = self
                .token
                .transfer(&self.escrow_address, recipient, total)
                .await
            {
                warn!("Push of {} to {} failed: {}", total, recipient, err);
                return Err(EscrowError::TokenTransfer(err));
            }
        }

        for (key, remaining) in debited {
            if remaining == 0 {
                buckets.remove(&key);
            } else {
                buckets.insert(key, remaining);
            }
        }

        info!(
            "Released {} to {} from {} buckets ({:?}, by {})",
            total,
            recipient,
            timestamps.len(),
            kind,
            released_by
        );

        Ok(ReleaseReceipt {
            id: Uuid::new_v4(),
            kind,
            recipient: recipient.clone(),
            released_by: released_by.clone(),
            entries: timestamps
                .iter()
                .zip(amounts)
                .map(|(&unlock_time, &amount)| ReleaseEntry {
                    unlock_time,
                    amount,
                })
                .collect(),
            total,
            recorded_at: now,
        })
    }

    /// Balance of bucket `(recipient, unlock_time)`, zero when never funded
    pub async fn bucket_balance(
        &self,
        recipient: &Address,
        unlock_time: UnixTimestamp,
    ) -> TokenAmount {
        self.buckets
            .read()
            .await
            .get(&BucketKey::new(recipient.clone(), unlock_time))
            .copied()
            .unwrap_or(0)
    }

    /// Non-empty buckets of `recipient` ordered by unlock time
    pub async fn buckets_of(&self, recipient: &Address) -> Vec<BucketBalance> {
        let buckets = self.buckets.read().await;
        recipient_range(&buckets, recipient)
            .map(|(key, &amount)| BucketBalance {
                unlock_time: key.unlock_time,
                amount,
            })
            .collect()
    }

    /// Batch releasing every bucket of `recipient` unlocked right now
    pub async fn releasable(&self, recipient: &Address) -> EscrowResult<ReleasePlan> {
        let buckets = self.buckets.read().await;
        let now = self.clock.now();
        let mut plan = ReleasePlan::default();

        for (key, &amount) in recipient_range(&buckets, recipient) {
            if !key.is_unlocked_at(now) {
                break;
            }
            plan.timestamps.push(key.unlock_time);
            plan.amounts.push(amount);
            plan.total = plan
                .total
                .checked_add(amount)
                .ok_or_else(|| EscrowError::amount_overflow("releasable total exceeds u128"))?;
        }

        debug!(
            "{} has {} releasable across {} buckets",
            recipient,
            plan.total,
            plan.timestamps.len()
        );
        Ok(plan)
    }

    /// Sum of all buckets; equals the escrow's token balance
    pub async fn total_locked(&self) -> EscrowResult<TokenAmount> {
        self.buckets
            .read()
            .await
            .values()
            .try_fold(0 as TokenAmount, |acc, &amount| acc.checked_add(amount))
            .ok_or_else(|| EscrowError::amount_overflow("ledger total exceeds u128"))
    }

    /// Copy of every non-empty bucket
    pub async fn snapshot(&self) -> LedgerSnapshot {
        let buckets = self.buckets.read().await;
        LedgerSnapshot {
            escrow_address: self.escrow_address.clone(),
            admin: self.admin.clone(),
            buckets: buckets
                .iter()
                .map(|(key, &amount)| SnapshotBucket {
                    recipient: key.recipient.clone(),
                    unlock_time: key.unlock_time,
                    amount,
                })
                .collect(),
        }
    }
}

fn recipient_range<'a>(
    buckets: &'a Buckets,
    recipient: &Address,
) -> impl Iterator<Item = (&'a BucketKey, &'a TokenAmount)> + 'a {
    let start = BucketKey::new(recipient.clone(), UnixTimestamp::MIN);
    let end = BucketKey::new(recipient.clone(), UnixTimestamp::MAX);
    buckets.range(start..=end)
}

/// Validate a release batch without touching `buckets`
///
/// Returns the post-batch balance of every touched bucket and the batch
/// total. Lengths are checked first, then every time lock, then balances
/// entry by entry in input order so repeated timestamps see the balance
/// left by earlier entries.
fn simulate_batch(
    buckets: &Buckets,
    recipient: &Address,
    timestamps: &[UnixTimestamp],
    amounts: &[TokenAmount],
    now: UnixTimestamp,
) -> EscrowResult<(Buckets, TokenAmount)> {
    if timestamps.len() != amounts.len() {
        return Err(EscrowError::MalformedBatch {
            timestamps: timestamps.len(),
            amounts: amounts.len(),
        });
    }

    if let Some(&locked) = timestamps.iter().find(|&&t| t > now) {
        return Err(EscrowError::StillLocked {
            key: BucketKey::new(recipient.clone(), locked),
            now,
        });
    }

    let mut debited = Buckets::new();
    let mut total: TokenAmount = 0;

    for (&unlock_time, &amount) in timestamps.iter().zip(amounts) {
        let key = BucketKey::new(recipient.clone(), unlock_time);
        let available = match debited.get(&key) {
            Some(&remaining) => remaining,
            None => buckets.get(&key).copied().unwrap_or(0),
        };

        if available < amount {
            return Err(EscrowError::InsufficientBucketBalance {
                key,
                requested: amount,
                available,
            });
        }

        total = total
            .checked_add(amount)
            .ok_or_else(|| EscrowError::amount_overflow("batch total exceeds u128"))?;
        debited.insert(key, available - amount);
    }

    Ok((debited, total))
}
