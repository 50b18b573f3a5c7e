//! The collection of networks for one resource, and when to rebuild it.
//!
//! A [`NetworkSet`] is `Clean` while its networks match the world and
//! `Dirty` once a watched component store has changed shape (an entity
//! carrying a watched component was spawned, despawned, or had the
//! component added or removed, moved through `World::set_position`, or
//! edited through `World::modify`). Refreshing a dirty set rebuilds every
//! network from scratch.
//!
//! Edits made through `World::get_mut` are not seen. Callers that relink
//! members that way call [`NetworkSet::mark_dirty`].

use crate::discovery::discover;
use crate::network::Network;
use crate::topology::Topology;
use crate::NetworkId;
use forge_core::entity::Entity;
use forge_core::world::World;
use std::any::TypeId;
use std::collections::{BTreeMap, BTreeSet};

// ---------------------------------------------------------------------------
// RevisionWatch
// ---------------------------------------------------------------------------

/// Remembers the world revision of a fixed list of component stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionWatch {
    types: Vec<TypeId>,
    seen: Vec<u64>,
}

impl RevisionWatch {
    pub fn new(types: Vec<TypeId>) -> Self {
        let seen = vec![0; types.len()];
        Self { types, seen }
    }

    /// Whether any watched store changed since the last call. Records the
    /// current revisions either way.
    pub fn changed(&mut self, world: &World) -> bool {
        let mut changed = false;
        for (type_id, seen) in self.types.iter().zip(&mut self.seen) {
            let now = world.revision_of_type(*type_id);
            if now != *seen {
                *seen = now;
                changed = true;
            }
        }
        changed
    }
}

// ---------------------------------------------------------------------------
// NetworkSet
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopologyState {
    Clean,
    Dirty,
}

#[derive(Debug, Clone)]
pub struct NetworkSet {
    networks: BTreeMap<NetworkId, Network>,
    membership: BTreeMap<Entity, NetworkId>,
    next_id: u32,
    state: TopologyState,
    watch: RevisionWatch,
    rebuilds: u64,
}

impl NetworkSet {
    /// An empty set watching `watched` stores. Starts dirty so the first
    /// refresh builds the networks.
    pub fn new(watched: Vec<TypeId>) -> Self {
        Self {
            networks: BTreeMap::new(),
            membership: BTreeMap::new(),
            next_id: 0,
            state: TopologyState::Dirty,
            watch: RevisionWatch::new(watched),
            rebuilds: 0,
        }
    }

    pub fn state(&self) -> TopologyState {
        self.state
    }

    pub fn mark_dirty(&mut self) {
        self.state = TopologyState::Dirty;
    }

    /// How many times the networks have been rebuilt.
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }

    /// Rebuild if a watched store changed or the set was marked dirty.
    /// Returns whether a rebuild happened.
    pub fn refresh<T: Topology + ?Sized>(&mut self, world: &World, topology: &T) -> bool {
        if self.watch.changed(world) {
            self.state = TopologyState::Dirty;
        }
        if self.state == TopologyState::Clean {
            return false;
        }
        self.rebuild(world, topology);
        true
    }

    /// Rebuild every network from scratch.
    ///
    /// A new network keeps the id of the old network its seed distributor
    /// belonged to, unless another new network has already taken that id,
    /// and inherits that network's throttling and shortage state.
    pub fn rebuild<T: Topology + ?Sized>(&mut self, world: &World, topology: &T) {
        let mut previous = std::mem::take(&mut self.networks);
        let old_membership = std::mem::take(&mut self.membership);

        for found in discover(world, topology) {
            let reused = found
                .seed()
                .and_then(|seed| old_membership.get(&seed).copied())
                .filter(|id| !self.networks.contains_key(id));
            let id = reused.unwrap_or_else(|| {
                let id = NetworkId(self.next_id);
                self.next_id += 1;
                id
            });

            let mut network = Network::new(id);
            if let Some(old) = reused.and_then(|id| previous.remove(&id)) {
                network.inherit(&old);
            }
            for member in found.members() {
                self.membership.insert(member, id);
            }
            network.distributors = found.distributors;
            network.producers = found.producers;
            network.consumers = found.consumers;
            network.storage = found.storage;
            self.networks.insert(id, network);
        }

        self.state = TopologyState::Clean;
        self.watch.changed(world);
        self.rebuilds += 1;

        let members: usize = self.networks.values().map(|n| n.members().count()).sum();
        log::debug!(
            "rebuilt {} networks ({} memberships, {} retired)",
            self.networks.len(),
            members,
            previous.len()
        );
    }

    pub fn network(&self, id: NetworkId) -> Option<&Network> {
        self.networks.get(&id)
    }

    pub fn network_mut(&mut self, id: NetworkId) -> Option<&mut Network> {
        self.networks.get_mut(&id)
    }

    /// Network `entity` belongs to, as of the last rebuild.
    pub fn network_of(&self, entity: Entity) -> Option<NetworkId> {
        self.membership.get(&entity).copied()
    }

    /// Networks in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Network> {
        self.networks.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Network> {
        self.networks.values_mut()
    }

    pub fn ids(&self) -> Vec<NetworkId> {
        self.networks.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.networks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }

    /// Every entity placed in some network.
    pub fn members(&self) -> BTreeSet<Entity> {
        self.membership.keys().copied().collect()
    }
}
