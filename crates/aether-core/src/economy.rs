//! Economy bridge: folds solver output and passive income into the pool and
//! converts flux into prestige.

use crate::fixed::Fixed64;
use crate::pool::{Currency, InsufficientBalance, ResourcePool};
use serde::{Deserialize, Serialize};
use tracing::debug;

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Economy tuning constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EconomyParams {
    /// Build currency granted every tick, independent of `dt`.
    pub passive_trickle: Fixed64,
    /// Flux consumed by one exchange.
    pub exchange_flux_cost: Fixed64,
    /// Prestige granted by one exchange.
    pub exchange_prestige_yield: Fixed64,
}

impl Default for EconomyParams {
    fn default() -> Self {
        Self {
            passive_trickle: Fixed64::from_num(0.1),
            exchange_flux_cost: Fixed64::from_num(100),
            exchange_prestige_yield: Fixed64::ONE,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors and receipts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EconomyError {
    #[error("not enough flux to exchange: need {needed}, have {available}")]
    InsufficientFlux { needed: Fixed64, available: Fixed64 },
}

impl From<InsufficientBalance> for EconomyError {
    fn from(e: InsufficientBalance) -> Self {
        EconomyError::InsufficientFlux {
            needed: e.needed,
            available: e.available,
        }
    }
}

/// What one successful exchange moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeReceipt {
    pub flux_spent: Fixed64,
    pub prestige_gained: Fixed64,
}

/// Pool credits applied by one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickIncome {
    pub flux: Fixed64,
    pub build: Fixed64,
}

// ---------------------------------------------------------------------------
// EconomyBridge
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EconomyBridge {
    params: EconomyParams,
}

impl EconomyBridge {
    pub fn new(params: EconomyParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &EconomyParams {
        &self.params
    }

    /// Credit this tick's byproduct as flux and the passive trickle as build
    /// currency. A negative byproduct is treated as zero.
    pub fn apply_tick(&self, pool: &mut ResourcePool, byproduct: Fixed64) -> TickIncome {
        let flux = byproduct.max(Fixed64::ZERO);
        pool.credit(Currency::Flux, flux);
        pool.credit(Currency::Build, self.params.passive_trickle);
        TickIncome {
            flux,
            build: self.params.passive_trickle,
        }
    }

    /// Trade one exchange's worth of flux for prestige. Leaves the pool
    /// untouched when flux is short.
    pub fn exchange(&self, pool: &mut ResourcePool) -> Result<ExchangeReceipt, EconomyError> {
        let cost = self.params.exchange_flux_cost;
        if let Err(e) = pool.try_debit(Currency::Flux, cost) {
            debug!(needed = %e.needed, available = %e.available, "exchange rejected");
            return Err(e.into());
        }
        pool.credit(Currency::Prestige, self.params.exchange_prestige_yield);
        Ok(ExchangeReceipt {
            flux_spent: cost,
            prestige_gained: self.params.exchange_prestige_yield,
        })
    }

    /// How many exchanges the pool's flux could pay for right now.
    pub fn exchanges_available(&self, pool: &ResourcePool) -> u64 {
        let cost = self.params.exchange_flux_cost;
        if cost <= Fixed64::ZERO || pool.flux() < cost {
            return 0;
        }
        (pool.flux() / cost).to_num::<u64>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{assert_approx, fixed};

    fn pool(build: f64, flux: f64, prestige: f64) -> ResourcePool {
        ResourcePool::new(fixed(build), fixed(flux), fixed(prestige))
    }

    #[test]
    fn apply_tick_credits_flux_and_trickle() {
        let bridge = EconomyBridge::default();
        let mut p = pool(25.0, 0.0, 0.0);

        let income = bridge.apply_tick(&mut p, fixed(0.75));

        assert_approx(p.flux(), 0.75);
        assert_eq!(p.build(), fixed(25.0) + fixed(0.1));
        assert_eq!(income.flux, fixed(0.75));
        assert_eq!(income.build, fixed(0.1));
    }

    #[test]
    fn trickle_applies_with_zero_byproduct() {
        let bridge = EconomyBridge::default();
        let mut p = ResourcePool::default();
        for _ in 0..10 {
            bridge.apply_tick(&mut p, Fixed64::ZERO);
        }
        assert_approx(p.build(), 1.0);
        assert_eq!(p.flux(), Fixed64::ZERO);
    }

    #[test]
    fn negative_byproduct_is_ignored() {
        let bridge = EconomyBridge::default();
        let mut p = pool(0.0, 5.0, 0.0);
        bridge.apply_tick(&mut p, fixed(-3.0));
        assert_eq!(p.flux(), fixed(5.0));
    }

    #[test]
    fn exchange_at_threshold() {
        let bridge = EconomyBridge::default();
        let mut p = pool(0.0, 100.0, 0.0);

        let receipt = bridge.exchange(&mut p).unwrap();

        assert_eq!(receipt.flux_spent, fixed(100.0));
        assert_eq!(receipt.prestige_gained, fixed(1.0));
        assert_eq!(p.flux(), Fixed64::ZERO);
        assert_eq!(p.prestige(), fixed(1.0));
    }

    #[test]
    fn exchange_keeps_surplus_flux() {
        let bridge = EconomyBridge::default();
        let mut p = pool(0.0, 250.5, 2.0);
        bridge.exchange(&mut p).unwrap();
        assert_eq!(p.flux(), fixed(150.5));
        assert_eq!(p.prestige(), fixed(3.0));
    }

    #[test]
    fn exchange_below_threshold_is_noop() {
        let bridge = EconomyBridge::default();
        let mut p = pool(7.0, 99.9, 4.0);
        let before = p;

        let err = bridge.exchange(&mut p).unwrap_err();

        assert!(matches!(err, EconomyError::InsufficientFlux { .. }));
        assert_eq!(p, before);
    }

    #[test]
    fn exchanges_available_counts_whole_trades() {
        let bridge = EconomyBridge::default();
        assert_eq!(bridge.exchanges_available(&pool(0.0, 99.0, 0.0)), 0);
        assert_eq!(bridge.exchanges_available(&pool(0.0, 100.0, 0.0)), 1);
        assert_eq!(bridge.exchanges_available(&pool(0.0, 399.9, 0.0)), 3);
    }

    #[test]
    fn custom_exchange_rate() {
        let bridge = EconomyBridge::new(EconomyParams {
            passive_trickle: Fixed64::ZERO,
            exchange_flux_cost: fixed(10.0),
            exchange_prestige_yield: fixed(2.5),
        });
        let mut p = pool(0.0, 10.0, 0.0);
        bridge.exchange(&mut p).unwrap();
        assert_eq!(p.prestige(), fixed(2.5));
    }

    #[test]
    fn error_message_names_flux() {
        let err = EconomyError::InsufficientFlux {
            needed: fixed(100.0),
            available: fixed(12.0),
        };
        assert_eq!(
            err.to_string(),
            "not enough flux to exchange: need 100, have 12"
        );
    }
}
