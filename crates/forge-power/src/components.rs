//! Power components.
//!
//! Each carries a `network` field the power system stamps after every
//! rebuild: `Some(id)` while the entity is part of a network, `None`
//! otherwise. Rates are per second; stored energy is in rate-seconds.

use forge_core::fixed::{Fixed64, unit_ratio};
use forge_network::NetworkId;
use serde::{Deserialize, Serialize};

/// A pole. Poles within wire reach of each other connect; the pole powers
/// every producer, consumer, and accumulator within its supply area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerPole {
    /// Maximum wire length to another pole, in tiles. Two poles connect when
    /// their distance is within the shorter of their reaches.
    pub wire_reach: Fixed64,
    /// Radius, in tiles, of the area this pole supplies.
    pub supply_area: Fixed64,
    pub network: Option<NetworkId>,
}

impl PowerPole {
    pub fn new(wire_reach: Fixed64, supply_area: Fixed64) -> Self {
        Self {
            wire_reach,
            supply_area,
            network: None,
        }
    }
}

/// Produces power. Fuelled generators stop once their fuel runs out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Generator {
    /// Output at full load.
    pub output: Fixed64,
    /// Seconds of full-load running left. `None` needs no fuel.
    pub fuel: Option<Fixed64>,
    /// Whether the generator ran last tick.
    pub active: bool,
    /// Fraction of output drawn last tick.
    pub load: Fixed64,
    pub network: Option<NetworkId>,
}

impl Generator {
    pub fn new(output: Fixed64) -> Self {
        Self {
            output,
            fuel: None,
            active: false,
            load: Fixed64::ZERO,
            network: None,
        }
    }

    pub fn with_fuel(output: Fixed64, seconds: Fixed64) -> Self {
        Self {
            fuel: Some(seconds),
            ..Self::new(output)
        }
    }

    pub fn can_run(&self) -> bool {
        self.fuel.is_none_or(|f| f > Fixed64::ZERO)
    }

    /// Share of a `dt`-second tick the remaining fuel covers at full load.
    pub fn fuel_share(&self, dt: Fixed64) -> Fixed64 {
        match self.fuel {
            None => Fixed64::ONE,
            Some(fuel) if dt > Fixed64::ZERO => unit_ratio(fuel, dt),
            Some(_) if self.can_run() => Fixed64::ONE,
            Some(_) => Fixed64::ZERO,
        }
    }

    /// Output this generator can offer over a `dt`-second tick. A generator
    /// with less than `dt` seconds of fuel offers only what that fuel covers.
    pub fn available_output(&self, dt: Fixed64) -> Fixed64 {
        self.output.max(Fixed64::ZERO).saturating_mul(self.fuel_share(dt))
    }
}

/// Draws power. `satisfaction` is the share of `demand` the network met last tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerConsumer {
    pub demand: Fixed64,
    pub satisfaction: Fixed64,
    pub network: Option<NetworkId>,
}

impl PowerConsumer {
    pub fn new(demand: Fixed64) -> Self {
        Self {
            demand,
            satisfaction: Fixed64::ZERO,
            network: None,
        }
    }

    /// Power actually delivered last tick.
    pub fn delivered(&self) -> Fixed64 {
        self.demand.saturating_mul(self.satisfaction)
    }
}

/// Buffers surplus power and releases it during shortfalls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accumulator {
    pub capacity: Fixed64,
    /// Stored energy, kept within `[0, capacity]`.
    pub charge: Fixed64,
    /// Maximum charge or discharge rate.
    pub charge_rate: Fixed64,
    pub network: Option<NetworkId>,
}

impl Accumulator {
    pub fn new(capacity: Fixed64, charge_rate: Fixed64) -> Self {
        Self {
            capacity,
            charge: Fixed64::ZERO,
            charge_rate,
            network: None,
        }
    }

    pub fn with_charge(mut self, charge: Fixed64) -> Self {
        self.charge = charge.clamp(Fixed64::ZERO, self.capacity.max(Fixed64::ZERO));
        self
    }

    pub fn fill(&self) -> Fixed64 {
        unit_ratio(self.charge, self.capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_core::test_utils::fixed;

    #[test]
    fn unfuelled_generator_always_runs() {
        let g = Generator::new(fixed(100.0));
        assert!(g.can_run());
        assert_eq!(g.available_output(Fixed64::ONE), fixed(100.0));
        assert_eq!(g.available_output(Fixed64::ZERO), fixed(100.0));
    }

    #[test]
    fn empty_fuel_stops_generator() {
        let g = Generator::with_fuel(fixed(100.0), Fixed64::ZERO);
        assert!(!g.can_run());
        assert_eq!(g.available_output(Fixed64::ONE), Fixed64::ZERO);
        assert_eq!(g.available_output(Fixed64::ZERO), Fixed64::ZERO);
    }

    #[test]
    fn last_fuel_covers_part_of_a_tick() {
        let g = Generator::with_fuel(fixed(100.0), fixed(0.5));
        assert_eq!(g.fuel_share(Fixed64::ONE), fixed(0.5));
        assert_eq!(g.available_output(Fixed64::ONE), fixed(50.0));
        assert_eq!(g.available_output(fixed(0.25)), fixed(100.0));
    }

    #[test]
    fn accumulator_charge_is_clamped() {
        let a = Accumulator::new(fixed(100.0), fixed(10.0)).with_charge(fixed(250.0));
        assert_eq!(a.charge, fixed(100.0));
        assert_eq!(a.fill(), Fixed64::ONE);
    }

    #[test]
    fn delivered_scales_with_satisfaction() {
        let mut c = PowerConsumer::new(fixed(80.0));
        c.satisfaction = fixed(0.5);
        assert_eq!(c.delivered(), fixed(40.0));
    }
}
