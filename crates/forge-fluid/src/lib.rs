//! Fluid networks for the Forge simulation.
//!
//! Pipes connect through explicit connection lists; pumps, tanks, and
//! consumers join a network by being connected to one of its pipes. Each
//! tick the [`FluidSystem`] balances every network the same way power is
//! balanced, with pressure playing the role of satisfaction.
//!
//! A network carries a single fluid, chosen by its first pump (or, with no
//! pumps, by its first non-empty tank). Members of any other fluid stay in
//! the network but take no part in the balance.

pub mod components;
pub mod system;
pub mod topology;

pub use components::{FluidConsumer, FluidProducer, FluidTank, FluidType, Pipe};
pub use system::{FluidConfig, FluidEvent, FluidSystem};
pub use topology::{FluidTopology, connect_adjacent, connect_pipes, disconnect_pipes};

use forge_core::persist::PersistRegistry;

/// Add the fluid components to the persistence allow-list.
pub fn register_components(registry: PersistRegistry) -> PersistRegistry {
    registry
        .register::<Pipe>("pipe")
        .register::<FluidProducer>("fluid_producer")
        .register::<FluidConsumer>("fluid_consumer")
        .register::<FluidTank>("fluid_tank")
}
