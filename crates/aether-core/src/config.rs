//! Simulation configuration.
//!
//! [`SimConfig`] bundles every tunable constant. `Default` reproduces the
//! stock game balance; data files loaded through `aether-data` override
//! individual fields.

use crate::economy::EconomyParams;
use crate::fixed::Fixed64;
use crate::graph::{EntityDefaults, Prices};
use crate::pool::ResourcePool;
use crate::solver::SolverParams;
use serde::{Deserialize, Serialize};

/// A configuration value outside its permitted range.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be positive, got {value}")]
    NotPositive { field: &'static str, value: Fixed64 },
    #[error("{field} must not be negative, got {value}")]
    Negative { field: &'static str, value: Fixed64 },
    #[error("{field} must be in [{min}, {max}), got {value}")]
    OutOfRange {
        field: &'static str,
        value: Fixed64,
        min: Fixed64,
        max: Fixed64,
    },
}

/// Every tunable constant of a simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimConfig {
    pub solver: SolverParams,
    pub economy: EconomyParams,
    pub prices: Prices,
    pub defaults: EntityDefaults,
    /// Pool contents after construction and after every reset.
    pub seed: ResourcePool,
    /// Duration of one fixed simulation step, in seconds.
    pub fixed_step: Fixed64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            solver: SolverParams::default(),
            economy: EconomyParams::default(),
            prices: Prices::default(),
            defaults: EntityDefaults::default(),
            seed: ResourcePool::new(Fixed64::from_num(25), Fixed64::ZERO, Fixed64::ZERO),
            fixed_step: Fixed64::from_num(1) / Fixed64::from_num(60),
        }
    }
}

fn positive(field: &'static str, value: Fixed64) -> Result<(), ConfigError> {
    if value > Fixed64::ZERO {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { field, value })
    }
}

fn non_negative(field: &'static str, value: Fixed64) -> Result<(), ConfigError> {
    if value >= Fixed64::ZERO {
        Ok(())
    } else {
        Err(ConfigError::Negative { field, value })
    }
}

impl SimConfig {
    /// Check every field. Returns the first violation found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.solver;
        if s.ether_drag < Fixed64::ZERO || s.ether_drag >= Fixed64::ONE {
            return Err(ConfigError::OutOfRange {
                field: "solver.ether_drag",
                value: s.ether_drag,
                min: Fixed64::ZERO,
                max: Fixed64::ONE,
            });
        }
        non_negative("solver.flow_multiplier", s.flow_multiplier)?;
        non_negative("solver.friction_coefficient", s.friction_coefficient)?;
        non_negative("solver.dead_zone", s.dead_zone)?;
        non_negative("solver.source_regen_rate", s.source_regen_rate)?;

        let e = &self.economy;
        non_negative("economy.passive_trickle", e.passive_trickle)?;
        positive("economy.exchange_flux_cost", e.exchange_flux_cost)?;
        non_negative("economy.exchange_prestige_yield", e.exchange_prestige_yield)?;

        non_negative("prices.node", self.prices.node)?;
        non_negative("prices.edge", self.prices.edge)?;

        positive("defaults.node_capacity", self.defaults.node_capacity)?;
        positive("defaults.edge_resistance", self.defaults.edge_resistance)?;

        non_negative("seed.build", self.seed.build())?;
        non_negative("seed.flux", self.seed.flux())?;
        non_negative("seed.prestige", self.seed.prestige())?;

        positive("fixed_step", self.fixed_step)?;
        Ok(())
    }
}
