//! On-disk shape of a simulation config file.
//!
//! Every section and every field is optional. Absent values fall back to
//! the stock balance from [`SimConfig::default`]. Unknown fields are
//! rejected so a typo never silently keeps a default.

use aether_core::config::SimConfig;
use aether_core::economy::EconomyParams;
use aether_core::fixed::{Fixed64, checked_from_f64, fixed64_to_f64};
use aether_core::graph::{EntityDefaults, Prices};
use aether_core::pool::ResourcePool;
use aether_core::solver::SolverParams;
use serde::Deserialize;

/// A decimal that does not fit the simulation's fixed-point range.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{field} = {value} is not representable")]
pub struct InvalidNumber {
    pub field: &'static str,
    pub value: f64,
}

fn to_fixed(field: &'static str, value: f64) -> Result<Fixed64, InvalidNumber> {
    checked_from_f64(value).ok_or(InvalidNumber { field, value })
}

// ===========================================================================
// Sections
// ===========================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolverData {
    pub ether_drag: f64,
    pub flow_multiplier: f64,
    pub friction_coefficient: f64,
    pub dead_zone: f64,
    pub source_regen_rate: f64,
}

impl Default for SolverData {
    fn default() -> Self {
        let p = SolverParams::default();
        Self {
            ether_drag: fixed64_to_f64(p.ether_drag),
            flow_multiplier: fixed64_to_f64(p.flow_multiplier),
            friction_coefficient: fixed64_to_f64(p.friction_coefficient),
            dead_zone: fixed64_to_f64(p.dead_zone),
            source_regen_rate: fixed64_to_f64(p.source_regen_rate),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EconomyData {
    pub passive_trickle: f64,
    pub exchange_flux_cost: f64,
    pub exchange_prestige_yield: f64,
}

impl Default for EconomyData {
    fn default() -> Self {
        let p = EconomyParams::default();
        Self {
            passive_trickle: fixed64_to_f64(p.passive_trickle),
            exchange_flux_cost: fixed64_to_f64(p.exchange_flux_cost),
            exchange_prestige_yield: fixed64_to_f64(p.exchange_prestige_yield),
        }
    }
}

/// Build currency prices.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PricesData {
    pub node: f64,
    pub edge: f64,
}

impl Default for PricesData {
    fn default() -> Self {
        let p = Prices::default();
        Self {
            node: fixed64_to_f64(p.node),
            edge: fixed64_to_f64(p.edge),
        }
    }
}

/// Attributes given to newly placed entities.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DefaultsData {
    pub node_capacity: f64,
    pub edge_resistance: f64,
}

impl Default for DefaultsData {
    fn default() -> Self {
        let d = EntityDefaults::default();
        Self {
            node_capacity: fixed64_to_f64(d.node_capacity),
            edge_resistance: fixed64_to_f64(d.edge_resistance),
        }
    }
}

/// Starting pool, also restored by every reset.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SeedData {
    pub build: f64,
    pub flux: f64,
    pub prestige: f64,
}

impl Default for SeedData {
    fn default() -> Self {
        let s = SimConfig::default().seed;
        Self {
            build: fixed64_to_f64(s.build()),
            flux: fixed64_to_f64(s.flux()),
            prestige: fixed64_to_f64(s.prestige()),
        }
    }
}

// ===========================================================================
// Top level
// ===========================================================================

/// A whole config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigData {
    pub solver: SolverData,
    pub economy: EconomyData,
    pub prices: PricesData,
    pub defaults: DefaultsData,
    pub seed: SeedData,
    /// Seconds per fixed step.
    pub fixed_step: f64,
}

impl Default for ConfigData {
    fn default() -> Self {
        Self {
            solver: SolverData::default(),
            economy: EconomyData::default(),
            prices: PricesData::default(),
            defaults: DefaultsData::default(),
            seed: SeedData::default(),
            fixed_step: fixed64_to_f64(SimConfig::default().fixed_step),
        }
    }
}

impl ConfigData {
    /// Convert every decimal to fixed-point. Range checks are left to
    /// [`SimConfig::validate`].
    pub fn to_config(&self) -> Result<SimConfig, InvalidNumber> {
        let s = &self.solver;
        let e = &self.economy;
        Ok(SimConfig {
            solver: SolverParams {
                ether_drag: to_fixed("solver.ether_drag", s.ether_drag)?,
                flow_multiplier: to_fixed("solver.flow_multiplier", s.flow_multiplier)?,
                friction_coefficient: to_fixed(
                    "solver.friction_coefficient",
                    s.friction_coefficient,
                )?,
                dead_zone: to_fixed("solver.dead_zone", s.dead_zone)?,
                source_regen_rate: to_fixed("solver.source_regen_rate", s.source_regen_rate)?,
            },
            economy: EconomyParams {
                passive_trickle: to_fixed("economy.passive_trickle", e.passive_trickle)?,
                exchange_flux_cost: to_fixed("economy.exchange_flux_cost", e.exchange_flux_cost)?,
                exchange_prestige_yield: to_fixed(
                    "economy.exchange_prestige_yield",
                    e.exchange_prestige_yield,
                )?,
            },
            prices: Prices {
                node: to_fixed("prices.node", self.prices.node)?,
                edge: to_fixed("prices.edge", self.prices.edge)?,
            },
            defaults: EntityDefaults {
                node_capacity: to_fixed("defaults.node_capacity", self.defaults.node_capacity)?,
                edge_resistance: to_fixed(
                    "defaults.edge_resistance",
                    self.defaults.edge_resistance,
                )?,
            },
            seed: ResourcePool::new(
                to_fixed("seed.build", self.seed.build)?,
                to_fixed("seed.flux", self.seed.flux)?,
                to_fixed("seed.prestige", self.seed.prestige)?,
            ),
            fixed_step: to_fixed("fixed_step", self.fixed_step)?,
        })
    }
}
