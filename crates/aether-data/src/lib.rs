//! Data-driven configuration for `aether-core`.
//!
//! Balance constants live in a RON, TOML or JSON file. Values are plain
//! decimals on disk, converted to fixed-point on load; missing fields keep
//! the stock values, and the resulting [`SimConfig`](aether_core::config::SimConfig)
//! is validated before it is returned.

pub mod loader;
pub mod schema;

pub use loader::{DataLoadError, load_config, load_config_from_dir};
