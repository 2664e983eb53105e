//! Timelocked escrow ledger for a single fungible token
//!
//! Holders deposit tokens earmarked for a recipient and an unlock time.
//! Deposits sharing a recipient and unlock time accumulate in one bucket.
//! Once unlocked, the recipient withdraws any subset of their buckets in a
//! single all-or-nothing batch, or the admin pushes them on the
//! recipient's behalf.
//!
//! - [`ledger::EscrowLedger`] owns the buckets
//! - [`token::FungibleToken`] is the token boundary
//! - [`clock::Clock`] supplies the time used by unlock checks

pub mod clock;
pub mod error;
pub mod ledger;
pub mod models;
pub mod settings;
pub mod telemetry;
pub mod token;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::EscrowError;
pub use ledger::EscrowLedger;
pub use settings::{ClockMode, LedgerConfig};
pub use token::{FungibleToken, InMemoryToken, TokenError};

/// Result type alias for escrow operations
pub type EscrowResult<T> = Result<T, EscrowError>;
