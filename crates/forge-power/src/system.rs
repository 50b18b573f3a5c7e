//! The power system: rebuilds power networks when their layout changes and
//! balances every network once per tick.

use crate::components::{Accumulator, Generator, PowerConsumer, PowerPole};
use crate::topology::PowerTopology;
use forge_core::fixed::{Fixed64, Ticks, over};
use forge_core::scheduler::{System, priority};
use forge_core::world::World;
use forge_network::{NetworkId, NetworkSet, StorageCell, Throttle, Topology, Transition, settle};
use serde::{Deserialize, Serialize};
use std::any::Any;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerConfig {
    /// Accumulator fill band that switches generators off and on.
    pub throttle: Throttle,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Events emitted by the power system on state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PowerEvent {
    /// A network went from fully supplied to short.
    PowerGridBrownout {
        network: NetworkId,
        /// Demand minus available supply.
        deficit: Fixed64,
        tick: Ticks,
    },
    /// A network went from short back to fully supplied.
    PowerGridRestored { network: NetworkId, tick: Ticks },
}

// ---------------------------------------------------------------------------
// PowerSystem
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct PowerSystem {
    networks: NetworkSet,
    topology: PowerTopology,
    config: PowerConfig,
    events: Vec<PowerEvent>,
    tick: Ticks,
}

impl Default for PowerSystem {
    fn default() -> Self {
        Self::new(PowerConfig::default())
    }
}

impl PowerSystem {
    pub fn new(config: PowerConfig) -> Self {
        let topology = PowerTopology;
        Self {
            networks: NetworkSet::new(topology.watched()),
            topology,
            config,
            events: Vec::new(),
            tick: 0,
        }
    }

    pub fn config(&self) -> &PowerConfig {
        &self.config
    }

    pub fn networks(&self) -> &NetworkSet {
        &self.networks
    }

    /// Satisfaction of a network as of the last tick.
    pub fn satisfaction(&self, network: NetworkId) -> Option<Fixed64> {
        self.networks.network(network).map(|n| n.satisfaction)
    }

    /// Force a rebuild on the next update, e.g. after moving a pole.
    pub fn mark_dirty(&mut self) {
        self.networks.mark_dirty();
    }

    /// Take the events emitted since the last drain.
    pub fn drain_events(&mut self) -> Vec<PowerEvent> {
        std::mem::take(&mut self.events)
    }

    /// Ticks processed so far.
    pub fn ticks(&self) -> Ticks {
        self.tick
    }

    /// Write each member's network onto its components. Entities outside
    /// every network get no network, no satisfaction, and stopped generators.
    fn stamp_membership(&self, world: &mut World) {
        let nets = &self.networks;
        world.for_each_mut::<PowerPole>(|e, pole| pole.network = nets.network_of(e));
        world.for_each_mut::<Accumulator>(|e, acc| acc.network = nets.network_of(e));
        world.for_each_mut::<Generator>(|e, generator| {
            generator.network = nets.network_of(e);
            if generator.network.is_none() {
                generator.active = false;
                generator.load = Fixed64::ZERO;
            }
        });
        world.for_each_mut::<PowerConsumer>(|e, consumer| {
            consumer.network = nets.network_of(e);
            if consumer.network.is_none() {
                consumer.satisfaction = Fixed64::ZERO;
            }
        });
    }

    /// Balance every network for `dt` seconds.
    fn equilibrate(&mut self, world: &mut World, dt: Fixed64) {
        for network in self.networks.iter_mut() {
            let production = network
                .producers
                .iter()
                .filter_map(|&e| world.get::<Generator>(e))
                .fold(Fixed64::ZERO, |acc, g| acc.saturating_add(g.available_output(dt)));
            let consumption = network
                .consumers
                .iter()
                .filter_map(|&e| world.get::<PowerConsumer>(e))
                .fold(Fixed64::ZERO, |acc, c| acc.saturating_add(c.demand.max(Fixed64::ZERO)));
            let cells: Vec<StorageCell> = network
                .storage
                .iter()
                .map(|&e| match world.get::<Accumulator>(e) {
                    Some(acc) => StorageCell {
                        stored: acc.charge,
                        capacity: acc.capacity,
                        rate: acc.charge_rate,
                    },
                    None => StorageCell {
                        stored: Fixed64::ZERO,
                        capacity: Fixed64::ZERO,
                        rate: Fixed64::ZERO,
                    },
                })
                .collect();

            let settlement = settle(
                production,
                consumption,
                &cells,
                dt,
                network.producers_engaged,
                &self.config.throttle,
            );
            let balance = &settlement.balance;

            let mut capacity = Fixed64::ZERO;
            let mut stored = Fixed64::ZERO;
            for (&e, flow) in network.storage.iter().zip(&balance.storage_flow) {
                if let Some(acc) = world.get_mut::<Accumulator>(e) {
                    let ceiling = acc.capacity.max(Fixed64::ZERO);
                    acc.charge = acc.charge.saturating_add(*flow).clamp(Fixed64::ZERO, ceiling);
                    acc.network = Some(network.id);
                    capacity = capacity.saturating_add(ceiling);
                    stored = stored.saturating_add(acc.charge);
                }
            }

            for &e in &network.producers {
                if let Some(generator) = world.get_mut::<Generator>(e) {
                    generator.network = Some(network.id);
                    generator.active = settlement.engaged && generator.can_run();
                    generator.load = if generator.active {
                        balance.producer_load
                    } else {
                        Fixed64::ZERO
                    };
                    let burn = over(generator.load.saturating_mul(generator.fuel_share(dt)), dt);
                    if let Some(fuel) = generator.fuel.as_mut() {
                        *fuel = (*fuel - burn).max(Fixed64::ZERO);
                    }
                }
            }

            for &e in &network.consumers {
                if let Some(consumer) = world.get_mut::<PowerConsumer>(e) {
                    consumer.network = Some(network.id);
                    consumer.satisfaction = balance.satisfaction;
                }
            }

            network.apply(balance, capacity, stored);
            network.producers_engaged = settlement.engaged_next;

            match network.record_shortage(balance.is_short()) {
                Some(Transition::Began) => {
                    let deficit = (consumption - balance.available_supply).max(Fixed64::ZERO);
                    log::info!(
                        "power brownout on {}: satisfaction {}, deficit {}",
                        network.id,
                        balance.satisfaction,
                        deficit
                    );
                    self.events.push(PowerEvent::PowerGridBrownout {
                        network: network.id,
                        deficit,
                        tick: self.tick,
                    });
                }
                Some(Transition::Ended) => {
                    log::info!("power restored on {}", network.id);
                    self.events.push(PowerEvent::PowerGridRestored {
                        network: network.id,
                        tick: self.tick,
                    });
                }
                None => {}
            }
        }
    }
}

impl System for PowerSystem {
    fn name(&self) -> &str {
        "power"
    }

    fn priority(&self) -> i32 {
        priority::POWER
    }

    fn update(&mut self, world: &mut World, dt: Fixed64) {
        if self.networks.refresh(world, &self.topology) {
            self.stamp_membership(world);
        }
        self.equilibrate(world, dt);
        self.tick += 1;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ===========================================================================
// Tests
// ===========================================================================
