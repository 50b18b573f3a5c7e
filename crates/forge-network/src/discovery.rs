//! Flood-fill network discovery.
//!
//! Networks are always rebuilt from scratch: collect every distributor,
//! repeatedly pop the lowest unvisited one as a seed, and walk distributor
//! links breadth-first. Each walk is one network. Attachments of the visited
//! distributors are then classified by role. An entity in reach of several
//! networks joins the first network that reaches it.

use crate::topology::Topology;
use forge_core::entity::Entity;
use forge_core::world::World;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// One connected component found by [`discover`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovered {
    /// Distributors in breadth-first order from the seed.
    pub distributors: Vec<Entity>,
    pub producers: Vec<Entity>,
    pub consumers: Vec<Entity>,
    pub storage: Vec<Entity>,
}

impl Discovered {
    /// The distributor the flood fill started from.
    pub fn seed(&self) -> Option<Entity> {
        self.distributors.first().copied()
    }

    /// Every entity that takes part in this component, each once.
    pub fn members(&self) -> BTreeSet<Entity> {
        self.distributors
            .iter()
            .chain(&self.producers)
            .chain(&self.consumers)
            .chain(&self.storage)
            .copied()
            .collect()
    }
}

/// Partition the world's distributors into connected components.
pub fn discover<T: Topology + ?Sized>(world: &World, topology: &T) -> Vec<Discovered> {
    let mut unvisited: BTreeSet<Entity> = topology.distributors(world).into_iter().collect();

    let mut adjacency: BTreeMap<Entity, BTreeSet<Entity>> = BTreeMap::new();
    for &d in &unvisited {
        for link in topology.links(world, d) {
            if link == d || !unvisited.contains(&link) {
                continue;
            }
            adjacency.entry(d).or_default().insert(link);
            adjacency.entry(link).or_default().insert(d);
        }
    }

    let mut claimed: BTreeSet<Entity> = BTreeSet::new();
    let mut found = Vec::new();

    while let Some(seed) = unvisited.pop_first() {
        let mut component = Discovered::default();
        let mut frontier = VecDeque::from([seed]);

        while let Some(d) = frontier.pop_front() {
            component.distributors.push(d);
            if let Some(neighbors) = adjacency.get(&d) {
                for &n in neighbors {
                    if unvisited.remove(&n) {
                        frontier.push_back(n);
                    }
                }
            }
        }

        for i in 0..component.distributors.len() {
            let d = component.distributors[i];
            for member in topology.attachments(world, d) {
                if claimed.contains(&member) {
                    continue;
                }
                let roles = topology.roles(world, member);
                if roles.is_empty() {
                    continue;
                }
                claimed.insert(member);
                if roles.producer {
                    component.producers.push(member);
                }
                if roles.consumer {
                    component.consumers.push(member);
                }
                if roles.storage {
                    component.storage.push(member);
                }
            }
        }

        found.push(component);
    }

    found
}
