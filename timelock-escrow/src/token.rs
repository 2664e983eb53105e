//! Fungible token boundary
//!
//! The escrow talks to its token through [`FungibleToken`]: it pulls from
//! depositors with `transfer_from` and pushes to recipients with `transfer`.
//! [`InMemoryToken`] follows ERC20 allowance rules and backs tests and
//! local simulations.

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use timelock_core::{Address, TokenAmount};
use tokio::sync::RwLock;
use tracing::debug;

/// Errors reported by the token
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Insufficient balance: {owner} holds {available}, needs {required}")]
    InsufficientBalance {
        owner: Address,
        available: TokenAmount,
        required: TokenAmount,
    },

    #[error("Insufficient allowance: {owner} approved {spender} for {available}, needs {required}")]
    InsufficientAllowance {
        owner: Address,
        spender: Address,
        available: TokenAmount,
        required: TokenAmount,
    },

    #[error("Balance overflow for {0}")]
    Overflow(Address),
}

pub type TokenResult<T> = Result<T, TokenError>;

/// Standard fungible token operations used by the escrow
#[async_trait]
pub trait FungibleToken: Send + Sync {
    /// Balance held by `owner`
    async fn balance_of(&self, owner: &Address) -> TokenAmount;

    /// Amount `spender` may still pull from `owner`
    async fn allowance(&self, owner: &Address, spender: &Address) -> TokenAmount;

    /// Set the amount `spender` may pull from `owner`
    async fn approve(
        &self,
        owner: &Address,
        spender: &Address,
        amount: TokenAmount,
    ) -> TokenResult<()>;

    /// Move `amount` from `from` to `to`
    async fn transfer(
        &self,
        from: &Address,
        to: &Address,
        amount: TokenAmount,
    ) -> TokenResult<()>;

    /// Move `amount` from `owner` to `to` on behalf of `spender`, consuming allowance
    async fn transfer_from(
        &self,
        spender: &Address,
        owner: &Address,
        to: &Address,
        amount: TokenAmount,
    ) -> TokenResult<()>;
}

#[derive(Debug, Default)]
struct TokenState {
    balances: HashMap<Address, TokenAmount>,
    allowances: HashMap<(Address, Address), TokenAmount>,
    total_supply: TokenAmount,
}

impl TokenState {
    fn balance(&self, owner: &Address) -> TokenAmount {
        self.balances.get(owner).copied().unwrap_or(0)
    }

    fn move_balance(&mut self, from: &Address, to: &Address, amount: TokenAmount) -> TokenResult<()> {
        let available = self.balance(from);
        if available < amount {
            return Err(TokenError::InsufficientBalance {
                owner: from.clone(),
                available,
                required: amount,
            });
        }
        if from == to {
            return Ok(());
        }

        let credited = self
            .balance(to)
            .checked_add(amount)
            .ok_or_else(|| TokenError::Overflow(to.clone()))?;

        self.balances.insert(from.clone(), available - amount);
        self.balances.insert(to.clone(), credited);
        Ok(())
    }
}

/// In-process token ledger with ERC20 semantics
#[derive(Debug, Default)]
pub struct InMemoryToken {
    state: RwLock<TokenState>,
}

impl InMemoryToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a token whose entire initial supply belongs to `owner`
    pub fn with_supply(owner: Address, supply: TokenAmount) -> Self {
        let mut state = TokenState::default();
        state.balances.insert(owner, supply);
        state.total_supply = supply;
        Self {
            state: RwLock::new(state),
        }
    }

    /// Create new units for `to`
    pub async fn mint(&self, to: &Address, amount: TokenAmount) -> TokenResult<()> {
        let mut state = self.state.write().await;
        let supply = state
            .total_supply
            .checked_add(amount)
            .ok_or_else(|| TokenError::Overflow(to.clone()))?;
        let balance = state
            .balance(to)
            .checked_add(amount)
            .ok_or_else(|| TokenError::Overflow(to.clone()))?;

        state.balances.insert(to.clone(), balance);
        state.total_supply = supply;
        debug!("Minted {} to {}", amount, to);
        Ok(())
    }

    pub async fn total_supply(&self) -> TokenAmount {
        self.state.read().await.total_supply
    }
}

#[async_trait]
impl FungibleToken for InMemoryToken {
    async fn balance_of(&self, owner: &Address) -> TokenAmount {
        self.state.read().await.balance(owner)
    }

    async fn allowance(&self, owner: &Address, spender: &Address) -> TokenAmount {
        self.state
            .read()
            .await
            .allowances
            .get(&(owner.clone(), spender.clone()))
            .copied()
            .unwrap_or(0)
    }

    async fn approve(
        &self,
        owner: &Address,
        spender: &Address,
        amount: TokenAmount,
    ) -> TokenResult<()> {
        self.state
            .write()
            .await
            .allowances
            .insert((owner.clone(), spender.clone()), amount);
        debug!("{} approved {} for {}", owner, spender, amount);
        Ok(())
    }

    async fn transfer(
        &self,
        from: &Address,
        to: &Address,
        amount: TokenAmount,
    ) -> TokenResult<()> {
        self.state.write().await.move_balance(from, to, amount)
    }

    async fn transfer_from(
        &self,
        spender: &Address,
        owner: &Address,
        to: &Address,
        amount: TokenAmount,
    ) -> TokenResult<()> {
        let mut state = self.state.write().await;

        let allowance_key = (owner.clone(), spender.clone());
        let allowed = state.allowances.get(&allowance_key).copied().unwrap_or(0);
        if allowed < amount {
            return Err(TokenError::InsufficientAllowance {
                owner: owner.clone(),
                spender: spender.clone(),
                available: allowed,
                required: amount,
            });
        }

        // Balance is checked before the allowance is consumed
        state.move_balance(owner, to, amount)?;
        state.allowances.insert(allowance_key, allowed - amount);
        Ok(())
    }
}
