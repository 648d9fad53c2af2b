//! The three-currency resource pool.
//!
//! The pool is only ever changed through [`ResourcePool::try_debit`] and
//! [`ResourcePool::credit`]. A debit is a single check-then-act: when the
//! balance is too low nothing is touched and an [`InsufficientBalance`] is
//! returned.

use crate::fixed::Fixed64;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the three counters held by a [`ResourcePool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    /// Spent to grow the graph. Trickles in passively.
    Build,
    /// Friction byproduct of flow.
    Flux,
    /// Bought with flux; spent on meta-progression.
    Prestige,
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Currency::Build => f.write_str("build currency"),
            Currency::Flux => f.write_str("flux"),
            Currency::Prestige => f.write_str("prestige"),
        }
    }
}

/// A debit was refused because the balance is below the requested amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("insufficient {currency}: need {needed}, have {available}")]
pub struct InsufficientBalance {
    pub currency: Currency,
    pub needed: Fixed64,
    pub available: Fixed64,
}

/// Build currency, flux, and prestige counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcePool {
    build: Fixed64,
    flux: Fixed64,
    prestige: Fixed64,
}

impl ResourcePool {
    /// Create a pool with explicit starting balances.
    pub fn new(build: Fixed64, flux: Fixed64, prestige: Fixed64) -> Self {
        Self {
            build,
            flux,
            prestige,
        }
    }

    pub fn build(&self) -> Fixed64 {
        self.build
    }

    pub fn flux(&self) -> Fixed64 {
        self.flux
    }

    pub fn prestige(&self) -> Fixed64 {
        self.prestige
    }

    /// Current balance of one currency.
    pub fn balance(&self, currency: Currency) -> Fixed64 {
        match currency {
            Currency::Build => self.build,
            Currency::Flux => self.flux,
            Currency::Prestige => self.prestige,
        }
    }

    fn slot_mut(&mut self, currency: Currency) -> &mut Fixed64 {
        match currency {
            Currency::Build => &mut self.build,
            Currency::Flux => &mut self.flux,
            Currency::Prestige => &mut self.prestige,
        }
    }

    /// Whether `amount` of `currency` could be debited right now.
    pub fn can_afford(&self, currency: Currency, amount: Fixed64) -> bool {
        self.balance(currency) >= amount
    }

    /// Debit `amount` of `currency`, or leave the pool untouched and report
    /// the shortfall.
    pub fn try_debit(
        &mut self,
        currency: Currency,
        amount: Fixed64,
    ) -> Result<(), InsufficientBalance> {
        let available = self.balance(currency);
        if available < amount {
            return Err(InsufficientBalance {
                currency,
                needed: amount,
                available,
            });
        }
        *self.slot_mut(currency) = available - amount;
        Ok(())
    }

    /// Credit `amount` of `currency`. Saturates at the numeric maximum.
    pub fn credit(&mut self, currency: Currency, amount: Fixed64) {
        let slot = self.slot_mut(currency);
        *slot = slot.saturating_add(amount);
    }
}
