//! Priority-ordered system scheduler.
//!
//! Systems are the per-tick update units of the simulation. Each declares an
//! integer priority; lower runs first. Systems with equal priority run in
//! registration order. The sorted order is cached and recomputed only when
//! the set of systems changes.

use crate::fixed::Fixed64;
use crate::world::World;
use std::any::Any;

// ---------------------------------------------------------------------------
// Priority bands
// ---------------------------------------------------------------------------

/// Conventional priority bands. Systems may use any integer; these leave
/// room for systems that need to slot between two bands.
pub mod priority {
    pub const INPUT: i32 = 0;
    pub const PHYSICS: i32 = 100;
    pub const RESOURCE_EXTRACTION: i32 = 200;
    pub const LOGISTICS: i32 = 300;
    pub const PRODUCTION: i32 = 400;
    pub const POWER: i32 = 500;
    pub const RESEARCH: i32 = 600;
    pub const ENVIRONMENT: i32 = 700;
    pub const AI: i32 = 800;
    pub const COMBAT: i32 = 900;
    pub const CLEANUP: i32 = 1000;
}

// ---------------------------------------------------------------------------
// System trait
// ---------------------------------------------------------------------------

/// A unit of per-tick simulation work.
pub trait System: Send {
    /// Human-readable name, used in logs and debugging.
    fn name(&self) -> &str;

    /// Execution priority. Lower runs first.
    fn priority(&self) -> i32;

    /// Advance this system by `dt` seconds.
    fn update(&mut self, world: &mut World, dt: Fixed64);

    /// Downcast to `&dyn Any` for access to the concrete system.
    fn as_any(&self) -> &dyn Any;

    /// Downcast to `&mut dyn Any` for mutable access to the concrete system.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Handle to a registered system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SystemId(u32);

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

struct Entry {
    id: SystemId,
    system: Box<dyn System>,
}

#[derive(Default)]
pub struct Scheduler {
    entries: Vec<Entry>,
    next_id: u32,
    needs_sort: bool,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("systems", &self.system_names())
            .finish()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, system: impl System + 'static) -> SystemId {
        self.register_boxed(Box::new(system))
    }

    pub fn register_boxed(&mut self, system: Box<dyn System>) -> SystemId {
        let id = SystemId(self.next_id);
        self.next_id += 1;
        log::debug!(
            "registered system `{}` at priority {}",
            system.name(),
            system.priority()
        );
        self.entries.push(Entry { id, system });
        self.needs_sort = true;
        id
    }

    /// Remove a system. Returns it so the caller can inspect final state.
    pub fn unregister(&mut self, id: SystemId) -> Option<Box<dyn System>> {
        let pos = self.entries.iter().position(|e| e.id == id)?;
        // `Vec::remove` keeps the remaining order intact; no resort needed.
        Some(self.entries.remove(pos).system)
    }

    fn sort_if_needed(&mut self) {
        if self.needs_sort {
            // Stable: equal priorities keep registration order.
            self.entries.sort_by_key(|e| e.system.priority());
            self.needs_sort = false;
        }
    }

    /// Run every system once, lowest priority first.
    pub fn update(&mut self, world: &mut World, dt: Fixed64) {
        self.sort_if_needed();
        for entry in &mut self.entries {
            log::trace!("dispatch {} at priority {}", entry.system.name(), entry.system.priority());
            entry.system.update(world, dt);
        }
    }

    /// Names in execution order.
    pub fn system_names(&self) -> Vec<&str> {
        let mut entries: Vec<&Entry> = self.entries.iter().collect();
        if self.needs_sort {
            entries.sort_by_key(|e| e.system.priority());
        }
        entries.iter().map(|e| e.system.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Borrow a registered system as its concrete type.
    pub fn system<S: System + 'static>(&self, id: SystemId) -> Option<&S> {
        self.entries
            .iter()
            .find(|e| e.id == id)
            .and_then(|e| e.system.as_any().downcast_ref())
    }

    pub fn system_mut<S: System + 'static>(&mut self, id: SystemId) -> Option<&mut S> {
        self.entries
            .iter_mut()
            .find(|e| e.id == id)
            .and_then(|e| e.system.as_any_mut().downcast_mut())
    }
}

// ---------------------------------------------------------------------------
// Built-in systems
// ---------------------------------------------------------------------------

/// Applies deferred despawns at the end of the tick.
#[derive(Debug, Default, Clone, Copy)]
pub struct CleanupSystem;

impl System for CleanupSystem {
    fn name(&self) -> &str {
        "cleanup"
    }

    fn priority(&self) -> i32 {
        priority::CLEANUP
    }

    fn update(&mut self, world: &mut World, _dt: Fixed64) {
        let removed = world.process_pending();
        if removed > 0 {
            log::trace!("cleanup despawned {removed} entities");
        }
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<String>>>;

    struct Recorder {
        name: String,
        priority: i32,
        log: Log,
        runs: u32,
    }

    impl Recorder {
        fn new(name: &str, priority: i32, log: &Log) -> Self {
            Self {
                name: name.to_string(),
                priority,
                log: Arc::clone(log),
                runs: 0,
            }
        }
    }

    impl System for Recorder {
        fn name(&self) -> &str {
            &self.name
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn update(&mut self, _world: &mut World, _dt: Fixed64) {
            self.runs += 1;
            self.log.lock().unwrap().push(self.name.clone());
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn dt() -> Fixed64 {
        Fixed64::from_num(1) / 60
    }

    #[test]
    fn runs_in_priority_order() {
        let log = Log::default();
        let mut scheduler = Scheduler::new();
        scheduler.register(Recorder::new("B", 500, &log));
        scheduler.register(Recorder::new("A", 100, &log));
        scheduler.register(Recorder::new("C", 500, &log));

        scheduler.update(&mut World::new(), dt());

        assert_eq!(*log.lock().unwrap(), vec!["A", "B", "C"]);
        assert_eq!(scheduler.system_names(), vec!["A", "B", "C"]);
    }

    #[test]
    fn order_holds_across_ticks() {
        let log = Log::default();
        let mut scheduler = Scheduler::new();
        scheduler.register(Recorder::new("late", priority::CLEANUP, &log));
        scheduler.register(Recorder::new("early", priority::INPUT, &log));
        let mut world = World::new();

        scheduler.update(&mut world, dt());
        scheduler.update(&mut world, dt());

        assert_eq!(*log.lock().unwrap(), vec!["early", "late", "early", "late"]);
    }

    #[test]
    fn registering_mid_run_resorts() {
        let log = Log::default();
        let mut scheduler = Scheduler::new();
        let mut world = World::new();
        scheduler.register(Recorder::new("power", priority::POWER, &log));
        scheduler.update(&mut world, dt());

        scheduler.register(Recorder::new("input", priority::INPUT, &log));
        log.lock().unwrap().clear();
        scheduler.update(&mut world, dt());

        assert_eq!(*log.lock().unwrap(), vec!["input", "power"]);
    }

    #[test]
    fn unregister_stops_system() {
        let log = Log::default();
        let mut scheduler = Scheduler::new();
        let a = scheduler.register(Recorder::new("A", 1, &log));
        scheduler.register(Recorder::new("B", 2, &log));

        assert!(scheduler.unregister(a).is_some());
        assert!(scheduler.unregister(a).is_none());
        scheduler.update(&mut World::new(), dt());

        assert_eq!(*log.lock().unwrap(), vec!["B"]);
        assert_eq!(scheduler.len(), 1);
    }

    #[test]
    fn downcast_to_concrete_system() {
        let log = Log::default();
        let mut scheduler = Scheduler::new();
        let id = scheduler.register(Recorder::new("A", 1, &log));
        scheduler.update(&mut World::new(), dt());

        assert_eq!(scheduler.system::<Recorder>(id).map(|r| r.runs), Some(1));
        assert!(scheduler.system::<CleanupSystem>(id).is_none());
        if let Some(r) = scheduler.system_mut::<Recorder>(id) {
            r.runs = 0;
        }
        assert_eq!(scheduler.system::<Recorder>(id).map(|r| r.runs), Some(0));
    }

    #[test]
    fn cleanup_system_applies_deferred_despawns() {
        let mut world = World::new();
        let e = world.spawn();
        world.despawn_deferred(e);

        let mut scheduler = Scheduler::new();
        scheduler.register(CleanupSystem);
        scheduler.update(&mut world, dt());

        assert!(!world.is_alive(e));
    }

    #[test]
    fn empty_scheduler_is_noop() {
        let mut scheduler = Scheduler::new();
        assert!(scheduler.is_empty());
        scheduler.update(&mut World::new(), dt());
    }
}
