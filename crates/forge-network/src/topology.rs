//! How a concrete resource lays out its networks in the world.

use forge_core::entity::Entity;
use forge_core::world::World;
use std::any::TypeId;

/// Which pools an attached entity takes part in. An entity may hold several
/// roles at once (a tank that also consumes, for example).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Roles {
    pub producer: bool,
    pub consumer: bool,
    pub storage: bool,
}

impl Roles {
    pub fn is_empty(&self) -> bool {
        !(self.producer || self.consumer || self.storage)
    }
}

/// The resource-specific half of network discovery.
///
/// Implementations answer questions about the current world; they hold no
/// state of their own between rebuilds.
pub trait Topology {
    /// Component types whose stores changing shape invalidate the networks.
    fn watched(&self) -> Vec<TypeId>;

    /// Every distributor entity (pole, pipe).
    fn distributors(&self, world: &World) -> Vec<Entity>;

    /// Distributors directly linked to `distributor`. Links need only be
    /// reported from one side; discovery treats them as undirected.
    fn links(&self, world: &World, distributor: Entity) -> Vec<Entity>;

    /// Non-distributor entities served by `distributor`.
    fn attachments(&self, world: &World, distributor: Entity) -> Vec<Entity>;

    /// Roles `entity` plays, decided by which components it carries.
    fn roles(&self, world: &World, entity: Entity) -> Roles;
}
