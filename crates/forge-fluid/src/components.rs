//! Fluid components.
//!
//! As with power, each carries a `network` field the fluid system stamps
//! after every rebuild. Rates are per second; amounts are volumes.

use forge_core::entity::Entity;
use forge_core::fixed::{Fixed64, unit_ratio};
use forge_network::NetworkId;
use serde::{Deserialize, Serialize};

/// Identifies a kind of fluid (water, crude oil, steam).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FluidType(pub u32);

/// A pipe segment. Pipes link only through their explicit `connections`;
/// connections to non-pipe entities attach those entities to the network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipe {
    pub connections: Vec<Entity>,
    /// Volume the segment holds when full.
    pub capacity: Fixed64,
    /// Volume shown in the segment, derived from the network's fill each tick.
    pub contents: Fixed64,
    pub network: Option<NetworkId>,
}

impl Pipe {
    pub fn new(capacity: Fixed64) -> Self {
        Self {
            connections: Vec::new(),
            capacity,
            contents: Fixed64::ZERO,
            network: None,
        }
    }

    /// Add a connection unless it is already present. Returns whether it was added.
    ///
    /// Outside this crate, connections are edited with
    /// [`connect_pipes`](crate::topology::connect_pipes) and
    /// [`disconnect_pipes`](crate::topology::disconnect_pipes), which the
    /// network rebuild check can see.
    pub(crate) fn connect(&mut self, other: Entity) -> bool {
        if self.connections.contains(&other) {
            return false;
        }
        self.connections.push(other);
        true
    }

    pub(crate) fn disconnect(&mut self, other: Entity) -> bool {
        let before = self.connections.len();
        self.connections.retain(|&e| e != other);
        self.connections.len() != before
    }
}

/// Pumps fluid into a network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FluidProducer {
    pub fluid: FluidType,
    pub rate: Fixed64,
    /// Whether the producer pumped last tick.
    pub active: bool,
    pub network: Option<NetworkId>,
}

impl FluidProducer {
    pub fn new(fluid: FluidType, rate: Fixed64) -> Self {
        Self {
            fluid,
            rate,
            active: false,
            network: None,
        }
    }
}

/// Draws fluid from a network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FluidConsumer {
    pub fluid: FluidType,
    pub rate: Fixed64,
    /// Share of `rate` the network met last tick.
    pub pressure: Fixed64,
    /// Volume delivered last tick.
    pub received: Fixed64,
    pub network: Option<NetworkId>,
}

impl FluidConsumer {
    pub fn new(fluid: FluidType, rate: Fixed64) -> Self {
        Self {
            fluid,
            rate,
            pressure: Fixed64::ZERO,
            received: Fixed64::ZERO,
            network: None,
        }
    }
}

/// Stores fluid. An empty tank takes whatever fluid its network carries;
/// a filled tank holds one fluid until it empties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FluidTank {
    pub fluid: Option<FluidType>,
    pub capacity: Fixed64,
    /// Stored volume, kept within `[0, capacity]`.
    pub amount: Fixed64,
    /// Maximum fill or drain rate.
    pub flow_rate: Fixed64,
    pub network: Option<NetworkId>,
}

impl FluidTank {
    pub fn new(capacity: Fixed64, flow_rate: Fixed64) -> Self {
        Self {
            fluid: None,
            capacity,
            amount: Fixed64::ZERO,
            flow_rate,
            network: None,
        }
    }

    pub fn filled_with(mut self, fluid: FluidType, amount: Fixed64) -> Self {
        self.amount = amount.clamp(Fixed64::ZERO, self.capacity.max(Fixed64::ZERO));
        self.fluid = (self.amount > Fixed64::ZERO).then_some(fluid);
        self
    }

    /// Fill level in `[0, 1]`. A zero-capacity tank reads as empty.
    pub fn fill_percentage(&self) -> Fixed64 {
        if self.capacity <= Fixed64::ZERO {
            return Fixed64::ZERO;
        }
        unit_ratio(self.amount, self.capacity)
    }

    pub fn is_full(&self) -> bool {
        self.capacity > Fixed64::ZERO && self.amount >= self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.amount <= Fixed64::ZERO
    }

    /// Whether this tank can take part in a network carrying `fluid`.
    pub fn accepts(&self, fluid: FluidType) -> bool {
        self.is_empty() || self.fluid.is_none_or(|f| f == fluid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_core::test_utils::fixed;

    const WATER: FluidType = FluidType(0);
    const OIL: FluidType = FluidType(1);

    #[test]
    fn pipe_connections_are_unique() {
        let mut pipe = Pipe::new(fixed(100.0));
        let other = Entity::from_raw_parts(3, 0);
        assert!(pipe.connect(other));
        assert!(!pipe.connect(other));
        assert_eq!(pipe.connections, vec![other]);
        assert!(pipe.disconnect(other));
        assert!(!pipe.disconnect(other));
    }

    #[test]
    fn tank_fill_percentage() {
        let tank = FluidTank::new(fixed(200.0), fixed(10.0)).filled_with(WATER, fixed(50.0));
        assert_eq!(tank.fill_percentage(), fixed(0.25));
        assert_eq!(tank.fluid, Some(WATER));
        assert!(!tank.is_full());
    }

    #[test]
    fn zero_capacity_tank_reads_empty() {
        let tank = FluidTank::new(Fixed64::ZERO, fixed(10.0));
        assert_eq!(tank.fill_percentage(), Fixed64::ZERO);
        assert!(!tank.is_full());
    }

    #[test]
    fn filled_tank_only_accepts_its_fluid() {
        let tank = FluidTank::new(fixed(100.0), fixed(10.0)).filled_with(OIL, fixed(1.0));
        assert!(tank.accepts(OIL));
        assert!(!tank.accepts(WATER));
        assert!(FluidTank::new(fixed(100.0), fixed(10.0)).accepts(WATER));
    }
}
