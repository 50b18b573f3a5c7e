//! Resource networks for the Forge simulation.
//!
//! Power grids and pipe systems share one shape: distributor entities (poles,
//! pipes) link to each other and to the producers, consumers, and storage
//! entities around them. Connected distributors and their attachments form a
//! [`Network`] that pools one resource.
//!
//! This crate holds the parts both instances share:
//!
//! - [`Topology`] -- how a concrete resource finds distributors, their links,
//!   and their attachments in the world.
//! - [`discover`] -- breadth-first flood fill from scratch over a topology.
//! - [`NetworkSet`] -- the `Clean -> Dirty -> Clean` state machine, network id
//!   reuse across rebuilds, and the entity -> network membership index.
//! - [`balance`] / [`settle`] -- per-tick equilibrium: production against
//!   demand, storage charge and discharge, uniform satisfaction, and producer
//!   throttling with hysteresis against storage fill.
//!
//! `forge-power` and `forge-fluid` supply the components and systems.

pub mod balance;
pub mod discovery;
pub mod network;
pub mod set;
pub mod topology;

pub use balance::{Balance, Settlement, StorageCell, Throttle, balance, settle};
pub use discovery::{Discovered, discover};
pub use network::{Network, NetworkTotals, Transition};
pub use set::{NetworkSet, RevisionWatch, TopologyState};
pub use topology::{Roles, Topology};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one network. Ids survive rebuilds where the network does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NetworkId(pub u32);

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "net#{}", self.0)
    }
}
