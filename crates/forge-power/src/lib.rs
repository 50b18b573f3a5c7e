//! Power networks for the Forge simulation.
//!
//! Poles wire themselves to other poles in reach and supply every generator,
//! consumer, and accumulator inside their supply area. Each tick the
//! [`PowerSystem`] balances every network: generators against demand, with
//! accumulators absorbing surplus and covering shortfalls. Every consumer on
//! a network receives the same satisfaction ratio.
//!
//! # Design
//!
//! - Network membership is derived state, rebuilt from the world whenever a
//!   power component is added to or removed from any entity.
//! - Components carry their network id and per-tick results (satisfaction,
//!   generator load, accumulator charge) so other systems read them directly.
//! - Events fire only on *transitions*, not every tick.
//! - Generators switch off while accumulators are nearly full and back on
//!   once they drain, with a hysteresis band from [`PowerConfig`].

pub mod components;
pub mod system;
pub mod topology;

pub use components::{Accumulator, Generator, PowerConsumer, PowerPole};
pub use system::{PowerConfig, PowerEvent, PowerSystem};
pub use topology::PowerTopology;

use forge_core::persist::PersistRegistry;

/// Add the power components to the persistence allow-list.
pub fn register_components(registry: PersistRegistry) -> PersistRegistry {
    registry
        .register::<PowerPole>("power_pole")
        .register::<Generator>("generator")
        .register::<PowerConsumer>("power_consumer")
        .register::<Accumulator>("accumulator")
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_core::scheduler::{CleanupSystem, Scheduler, System};
    use forge_core::test_utils::{fixed, spawn_at};
    use forge_core::world::World;

    #[test]
    fn power_components_survive_save_and_load() {
        let registry = register_components(PersistRegistry::with_core_components());
        let mut world = World::new();
        let p = spawn_at(&mut world, 0, 0);
        world.add(p, PowerPole::new(fixed(7.5), fixed(2.5)));
        let g = spawn_at(&mut world, 1, 0);
        world.add(g, Generator::with_fuel(fixed(60.0), fixed(30.0)));
        let c = spawn_at(&mut world, 0, 1);
        world.add(c, PowerConsumer::new(fixed(30.0)));
        let a = spawn_at(&mut world, -1, 0);
        world.add(a, Accumulator::new(fixed(500.0), fixed(50.0)));

        let mut power = PowerSystem::default();
        power.update(&mut world, fixed(1.0));

        let data = world.serialize(&registry).unwrap();
        let mut loaded = World::new();
        let report = loaded.deserialize(&data, &registry);
        assert!(report.is_clean());
        assert_eq!(loaded.get::<Generator>(g), world.get::<Generator>(g));
        assert_eq!(loaded.get::<Accumulator>(a), world.get::<Accumulator>(a));

        // Networks are rebuilt from the loaded components.
        let mut reloaded_power = PowerSystem::default();
        reloaded_power.update(&mut loaded, fixed(1.0));
        assert_eq!(reloaded_power.networks().len(), 1);
        assert_eq!(
            loaded.get::<PowerConsumer>(c).map(|c| c.satisfaction),
            Some(fixed(1.0))
        );
    }

    #[test]
    fn power_runs_under_scheduler() {
        let mut world = World::new();
        let p = spawn_at(&mut world, 0, 0);
        world.add(p, PowerPole::new(fixed(7.5), fixed(2.5)));
        let g = spawn_at(&mut world, 1, 0);
        world.add(g, Generator::new(fixed(10.0)));
        let c = spawn_at(&mut world, 0, 1);
        world.add(c, PowerConsumer::new(fixed(40.0)));

        let mut scheduler = Scheduler::new();
        scheduler.register(CleanupSystem);
        let id = scheduler.register(PowerSystem::default());
        assert_eq!(scheduler.system_names(), vec!["power", "cleanup"]);

        scheduler.update(&mut world, fixed(1.0) / 60);

        assert_eq!(
            world.get::<PowerConsumer>(c).map(|c| c.satisfaction),
            Some(fixed(0.25))
        );
        let power = scheduler.system_mut::<PowerSystem>(id).unwrap();
        assert_eq!(power.drain_events().len(), 1);
    }
}
