//! Save/load across every crate's components, and the background staging
//! queues feeding saves to the tick thread.

use forge_core::components::{PlayerControlled, Position, Sprite};
use forge_core::entity::Entity;
use forge_core::fixed::Fixed64;
use forge_core::persist::{PersistError, PersistRegistry, WorldData};
use forge_core::scheduler::System;
use forge_core::staging::{Inbox, LoadQueue, SaveQueue};
use forge_core::test_utils::{fixed, spawn_at, spawn_building};
use forge_core::world::World;
use forge_fluid::{FluidConsumer, FluidProducer, FluidSystem, FluidTank, FluidType, Pipe, connect_adjacent};
use forge_power::{Accumulator, Generator, PowerConsumer, PowerPole, PowerSystem};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

fn registry() -> PersistRegistry {
    forge_fluid::register_components(forge_power::register_components(
        PersistRegistry::with_core_components(),
    ))
}

/// A small powered and plumbed factory, run for a few ticks so every
/// component carries live state.
fn factory() -> (World, Entity, Entity) {
    let mut world = World::new();

    let p = spawn_at(&mut world, 0, 0);
    world.add(p, PowerPole::new(fixed(7.5), fixed(2.5)));
    let g = spawn_building(&mut world, "steam-engine", 1, 0, 1, 1);
    world.add(g, Generator::with_fuel(fixed(40.0), fixed(100.0)));
    let a = spawn_at(&mut world, -1, 0);
    world.add(a, Accumulator::new(fixed(200.0), fixed(20.0)));
    let lamp = spawn_at(&mut world, 0, 1);
    world.add(lamp, PowerConsumer::new(fixed(30.0)));

    let pipes: Vec<Entity> = (10..13)
        .map(|x| {
            let e = spawn_at(&mut world, x, 0);
            world.add(e, Pipe::new(fixed(100.0)));
            e
        })
        .collect();
    let pump = spawn_at(&mut world, 10, 1);
    world.add(pump, FluidProducer::new(FluidType(0), fixed(50.0)));
    let tank = spawn_at(&mut world, 11, 1);
    world.add(tank, FluidTank::new(fixed(400.0), fixed(25.0)));
    let sink = spawn_at(&mut world, 12, 1);
    world.add(sink, FluidConsumer::new(FluidType(0), fixed(20.0)));
    for &pipe in &pipes {
        connect_adjacent(&mut world, pipe);
    }

    let player = spawn_at(&mut world, 5, 5);
    world.add(player, PlayerControlled);

    let mut power = PowerSystem::default();
    let mut fluid = FluidSystem::default();
    for _ in 0..3 {
        power.update(&mut world, Fixed64::ONE);
        fluid.update(&mut world, Fixed64::ONE);
    }
    (world, player, lamp)
}

#[test]
fn whole_factory_round_trips_without_the_player() {
    let registry = registry();
    let (world, player, _) = factory();

    let bytes = world.serialize(&registry).unwrap().to_bytes().unwrap();
    let mut loaded = World::new();
    let report = loaded.deserialize(&WorldData::from_bytes(&bytes).unwrap(), &registry);

    assert!(report.is_clean());
    assert_eq!(loaded.entity_count(), world.entity_count() - 1);
    assert!(!loaded.is_alive(player));
    for e in world.entities().filter(|&e| e != player) {
        assert!(loaded.is_alive(e));
        assert_eq!(loaded.get::<Position>(e), world.get::<Position>(e));
        assert_eq!(loaded.get::<Sprite>(e), world.get::<Sprite>(e));
        assert_eq!(loaded.get::<Generator>(e), world.get::<Generator>(e));
        assert_eq!(loaded.get::<Accumulator>(e), world.get::<Accumulator>(e));
        assert_eq!(loaded.get::<Pipe>(e), world.get::<Pipe>(e));
        assert_eq!(loaded.get::<FluidTank>(e), world.get::<FluidTank>(e));
    }
}

#[test]
fn reloaded_world_keeps_simulating_identically() {
    let registry = registry();
    let (mut world, _, lamp) = factory();
    let data = world.serialize(&registry).unwrap();
    let mut loaded = World::new();
    loaded.deserialize(&data, &registry);

    let mut power = PowerSystem::default();
    let mut reloaded_power = PowerSystem::default();
    for _ in 0..5 {
        power.update(&mut world, Fixed64::ONE);
        reloaded_power.update(&mut loaded, Fixed64::ONE);
    }

    assert_eq!(
        loaded.get::<PowerConsumer>(lamp).map(|c| c.satisfaction),
        world.get::<PowerConsumer>(lamp).map(|c| c.satisfaction)
    );
    let charges = |w: &World| -> Vec<Fixed64> {
        w.entities_with::<Accumulator>()
            .into_iter()
            .filter_map(|e| w.get::<Accumulator>(e).map(|a| a.charge))
            .collect()
    };
    assert_eq!(charges(&loaded), charges(&world));
}

#[test]
fn component_outside_the_allow_list_is_not_saved() {
    let (world, _, _) = factory();
    let power_only = forge_power::register_components(PersistRegistry::with_core_components());

    let data = world.serialize(&power_only).unwrap();
    let mut loaded = World::new();
    let report = loaded.deserialize(&data, &registry());

    assert!(report.is_clean());
    assert!(loaded.entities_with::<Pipe>().is_empty());
    assert!(!loaded.entities_with::<Generator>().is_empty());
}

#[test]
fn corrupted_blob_is_rejected() {
    let (world, _, _) = factory();
    let mut bytes = world.serialize(&registry()).unwrap().to_bytes().unwrap();
    bytes[0] ^= 0xFF;
    assert!(matches!(
        WorldData::from_bytes(&bytes),
        Err(PersistError::InvalidMagic(_))
    ));
    assert!(WorldData::from_bytes(&bytes[..4]).is_err());
}

// ---------------------------------------------------------------------------
// Staging
// ---------------------------------------------------------------------------

/// Integrate until `queue` has nothing in flight, or fail after a few seconds.
fn drain<K, V>(queue: &mut LoadQueue<K, V>, mut apply: impl FnMut(K, V))
where
    K: Eq + std::hash::Hash + Clone + Send + 'static,
    V: Send + 'static,
{
    let deadline = Instant::now() + Duration::from_secs(5);
    while queue.in_flight() > 0 {
        assert!(Instant::now() < deadline, "background loads never finished");
        queue.integrate(8, &mut apply);
        std::thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn saves_flow_through_the_queue_and_load_in_the_background() {
    let registry = registry();
    let (world, _, _) = factory();

    // Two "slots" saved in batches of one per tick.
    let mut saves: SaveQueue<&'static str> = SaveQueue::new();
    assert!(saves.push("auto"));
    assert!(saves.push("manual"));
    assert!(!saves.push("auto"));
    let mut disk: BTreeMap<&'static str, Vec<u8>> = BTreeMap::new();
    while !saves.is_empty() {
        for slot in saves.drain_batch(1) {
            let blob = world.serialize(&registry).unwrap().to_bytes().unwrap();
            disk.insert(slot, blob);
        }
    }
    assert_eq!(disk.len(), 2);

    // Workers decode the blob; the tick thread applies it.
    let blob = disk["auto"].clone();
    let mut loads = LoadQueue::new(2, move |_: &&'static str| WorldData::from_bytes(&blob)).unwrap();
    assert!(loads.request("auto").unwrap());
    assert!(!loads.request("auto").unwrap());

    let mut loaded = World::new();
    let mut applied = 0;
    drain(&mut loads, |_, data| {
        loaded.deserialize(&data.unwrap(), &registry);
        applied += 1;
    });

    assert_eq!(applied, 1);
    assert_eq!(loaded.entity_count(), world.entity_count() - 1);
}

#[test]
fn inbox_hands_placements_to_the_tick_thread() {
    let inbox: Inbox<(i32, i32)> = Inbox::new();
    let handles: Vec<_> = (0..3)
        .map(|i| {
            let sender = inbox.sender();
            std::thread::spawn(move || sender.send((i, 0)).unwrap())
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let mut world = World::new();
    let mut placed: Vec<(i32, i32)> = inbox.drain();
    placed.sort();
    for &(x, y) in &placed {
        spawn_at(&mut world, x, y);
    }

    assert_eq!(placed, vec![(0, 0), (1, 0), (2, 0)]);
    assert_eq!(world.entity_count(), 3);
    assert_eq!(inbox.pending(), 0);
}
