//! A single resource network and its per-tick totals.

use crate::NetworkId;
use crate::balance::Balance;
use forge_core::entity::Entity;
use forge_core::fixed::Fixed64;

/// Aggregates from the last equilibrium pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkTotals {
    /// Production rate offered by active producers.
    pub production: Fixed64,
    /// Demand rate of all consumers.
    pub consumption: Fixed64,
    /// Production plus storage release rate.
    pub available_supply: Fixed64,
    /// Storage capacity of all storage members.
    pub capacity: Fixed64,
    /// Amount held by storage members after this tick's flows.
    pub stored: Fixed64,
    /// Amount moved in or out of storage this tick.
    pub throughput: Fixed64,
}

/// Shortage state changes reported by [`Network::record_shortage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Consumers went from fully served to short.
    Began,
    /// Consumers went from short back to fully served.
    Ended,
}

/// A connected set of distributors and the members they serve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    pub id: NetworkId,
    pub distributors: Vec<Entity>,
    pub producers: Vec<Entity>,
    pub consumers: Vec<Entity>,
    pub storage: Vec<Entity>,
    pub totals: NetworkTotals,
    /// Uniform share of demand every consumer received last tick.
    pub satisfaction: Fixed64,
    /// Whether producers run on the next tick.
    pub producers_engaged: bool,
    was_short: bool,
}

impl Network {
    pub fn new(id: NetworkId) -> Self {
        Self {
            id,
            distributors: Vec::new(),
            producers: Vec::new(),
            consumers: Vec::new(),
            storage: Vec::new(),
            totals: NetworkTotals::default(),
            satisfaction: Fixed64::ONE,
            producers_engaged: true,
            was_short: false,
        }
    }

    /// Every member, distributors first. An entity with several roles
    /// appears once per role.
    pub fn members(&self) -> impl Iterator<Item = Entity> + '_ {
        self.distributors
            .iter()
            .chain(&self.producers)
            .chain(&self.consumers)
            .chain(&self.storage)
            .copied()
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.members().any(|e| e == entity)
    }

    pub fn is_short(&self) -> bool {
        self.was_short
    }

    /// Fraction of storage capacity in use. `None` without storage.
    pub fn fill(&self) -> Option<Fixed64> {
        if self.totals.capacity <= Fixed64::ZERO {
            return None;
        }
        Some(forge_core::fixed::unit_ratio(self.totals.stored, self.totals.capacity))
    }

    /// Copy a finished balance into the network's totals.
    pub fn apply(&mut self, balance: &Balance, capacity: Fixed64, stored: Fixed64) {
        self.satisfaction = balance.satisfaction;
        self.totals = NetworkTotals {
            production: balance.production,
            consumption: balance.consumption,
            available_supply: balance.available_supply,
            capacity,
            stored,
            throughput: balance.throughput(),
        };
    }

    /// Record whether consumers are short this tick. Returns the transition,
    /// if any, so callers emit events only on change.
    pub fn record_shortage(&mut self, short: bool) -> Option<Transition> {
        let transition = match (self.was_short, short) {
            (false, true) => Some(Transition::Began),
            (true, false) => Some(Transition::Ended),
            _ => None,
        };
        self.was_short = short;
        transition
    }

    /// Carry throttling and shortage state over from the network this one replaces.
    pub(crate) fn inherit(&mut self, previous: &Network) {
        self.producers_engaged = previous.producers_engaged;
        self.was_short = previous.was_short;
        self.satisfaction = previous.satisfaction;
    }
}
