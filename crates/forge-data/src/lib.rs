//! Data-driven setup for the Forge simulation.
//!
//! Reads simulation tuning (`sim_config`) and building prototypes
//! (`buildings`) from RON, TOML, or JSON files, and places prototype copies
//! into a [`World`](forge_core::world::World).

pub mod config;
pub mod loader;
pub mod prototype;

pub use config::{PersistenceConfig, SimConfig, load_sim_config};
pub use loader::DataLoadError;
pub use prototype::{PlacementError, Prototype, PrototypeCatalog, spawn_building};
