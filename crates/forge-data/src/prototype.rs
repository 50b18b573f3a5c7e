//! Building prototypes and placing them in the world.
//!
//! `buildings.{ron,toml,json}` lists the fluids in play and every building
//! with its footprint and the network roles it carries:
//!
//! ```text
//! (
//!     fluids: ["water", "steam"],
//!     buildings: [
//!         (name: "small-pole", power_pole: (wire_reach: 7.5, supply_area: 2.5)),
//!         (name: "pump", fluid_producer: (fluid: "water", rate: 1200.0)),
//!         (name: "tank", width: 3, height: 3, fluid_tank: (capacity: 25000.0, flow_rate: 1000.0)),
//!     ],
//! )
//! ```

use crate::loader::{DataLoadError, check_duplicate, deserialize_file, require_data_file, resolve_name};
use forge_core::components::{Position, Sprite};
use forge_core::entity::Entity;
use forge_core::fixed::f64_to_fixed64;
use forge_core::spatial::TilePos;
use forge_core::world::World;
use forge_fluid::{FluidConsumer, FluidProducer, FluidTank, FluidType, Pipe, connect_adjacent};
use forge_power::{Accumulator, Generator, PowerConsumer, PowerPole};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Base name of the prototype file.
pub const BUILDINGS_FILE: &str = "buildings";

// ===========================================================================
// File schema
// ===========================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogData {
    #[serde(default)]
    pub fluids: Vec<String>,
    #[serde(default)]
    pub buildings: Vec<BuildingData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuildingData {
    pub name: String,
    #[serde(default = "one")]
    pub width: u32,
    #[serde(default = "one")]
    pub height: u32,
    #[serde(default)]
    pub power_pole: Option<PowerPoleData>,
    #[serde(default)]
    pub generator: Option<GeneratorData>,
    #[serde(default)]
    pub power_consumer: Option<PowerConsumerData>,
    #[serde(default)]
    pub accumulator: Option<AccumulatorData>,
    #[serde(default)]
    pub pipe: Option<PipeData>,
    #[serde(default)]
    pub fluid_producer: Option<FluidFlowData>,
    #[serde(default)]
    pub fluid_consumer: Option<FluidFlowData>,
    #[serde(default)]
    pub fluid_tank: Option<FluidTankData>,
}

fn one() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct PowerPoleData {
    pub wire_reach: f64,
    pub supply_area: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratorData {
    pub output: f64,
    /// Seconds of full-load fuel. Absent means the generator needs none.
    #[serde(default)]
    pub fuel: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PowerConsumerData {
    pub demand: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccumulatorData {
    pub capacity: f64,
    pub charge_rate: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipeData {
    pub capacity: f64,
}

/// A pump or a fluid-drinking machine.
#[derive(Debug, Clone, Deserialize)]
pub struct FluidFlowData {
    pub fluid: String,
    pub rate: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FluidTankData {
    pub capacity: f64,
    pub flow_rate: f64,
}

// ===========================================================================
// Prototypes
// ===========================================================================

/// A resolved building: its footprint plus the components every placed
/// copy starts with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prototype {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub power_pole: Option<PowerPole>,
    pub generator: Option<Generator>,
    pub power_consumer: Option<PowerConsumer>,
    pub accumulator: Option<Accumulator>,
    pub pipe: Option<Pipe>,
    pub fluid_producer: Option<FluidProducer>,
    pub fluid_consumer: Option<FluidConsumer>,
    pub fluid_tank: Option<FluidTank>,
}

impl Prototype {
    /// Tiles covered when anchored at `origin`.
    pub fn footprint(&self, origin: TilePos) -> impl Iterator<Item = TilePos> + '_ {
        (0..self.height).flat_map(move |dy| {
            (0..self.width).map(move |dx| origin.offset(dx as i32, dy as i32))
        })
    }

    /// Tiles edge-adjacent to the footprint anchored at `origin`.
    pub fn border(&self, origin: TilePos) -> Vec<TilePos> {
        let (w, h) = (self.width as i32, self.height as i32);
        let mut tiles = Vec::with_capacity(2 * (w + h) as usize);
        for dx in 0..w {
            tiles.push(origin.offset(dx, -1));
            tiles.push(origin.offset(dx, h));
        }
        for dy in 0..h {
            tiles.push(origin.offset(-1, dy));
            tiles.push(origin.offset(w, dy));
        }
        tiles
    }

    fn has_fluid_role(&self) -> bool {
        self.fluid_producer.is_some() || self.fluid_consumer.is_some() || self.fluid_tank.is_some()
    }
}

fn non_negative(values: &[(&str, f64)], building: &str, path: &Path) -> Result<(), DataLoadError> {
    for &(field, value) in values {
        if !value.is_finite() || value < 0.0 {
            return Err(DataLoadError::Invalid {
                file: path.to_path_buf(),
                detail: format!("{building}: {field} must be a non-negative number, got {value}"),
            });
        }
    }
    Ok(())
}

// ===========================================================================
// Catalog
// ===========================================================================

/// Every known building prototype, by name, plus the fluid name table.
#[derive(Debug, Clone, Default)]
pub struct PrototypeCatalog {
    prototypes: BTreeMap<String, Prototype>,
    fluids: Vec<String>,
}

impl PrototypeCatalog {
    /// Load `buildings.{ron,toml,json}` from `dir`. The file is required.
    pub fn load(dir: &Path) -> Result<Self, DataLoadError> {
        let path = require_data_file(dir, BUILDINGS_FILE)?;
        let data: CatalogData = deserialize_file(&path)?;
        let catalog = Self::from_data(&data, &path)?;
        log::debug!(
            "loaded {} building prototypes and {} fluids from {}",
            catalog.len(),
            catalog.fluids.len(),
            path.display()
        );
        Ok(catalog)
    }

    /// Resolve parsed data. `path` labels errors.
    pub fn from_data(data: &CatalogData, path: &Path) -> Result<Self, DataLoadError> {
        let mut fluid_ids: HashMap<String, FluidType> = HashMap::new();
        for (i, name) in data.fluids.iter().enumerate() {
            check_duplicate(&fluid_ids, name, path)?;
            fluid_ids.insert(name.clone(), FluidType(i as u32));
        }

        let mut prototypes: HashMap<String, Prototype> = HashMap::new();
        for building in &data.buildings {
            check_duplicate(&prototypes, &building.name, path)?;
            let prototype = Self::resolve(building, &fluid_ids, path)?;
            prototypes.insert(building.name.clone(), prototype);
        }

        Ok(Self {
            prototypes: prototypes.into_iter().collect(),
            fluids: data.fluids.clone(),
        })
    }

    fn resolve(
        b: &BuildingData,
        fluids: &HashMap<String, FluidType>,
        path: &Path,
    ) -> Result<Prototype, DataLoadError> {
        if b.width == 0 || b.height == 0 {
            return Err(DataLoadError::Invalid {
                file: path.to_path_buf(),
                detail: format!("{}: footprint must be at least 1x1", b.name),
            });
        }
        let fx = f64_to_fixed64;

        let power_pole = match &b.power_pole {
            Some(d) => {
                non_negative(&[("wire_reach", d.wire_reach), ("supply_area", d.supply_area)], &b.name, path)?;
                Some(PowerPole::new(fx(d.wire_reach), fx(d.supply_area)))
            }
            None => None,
        };
        let generator = match &b.generator {
            Some(d) => {
                non_negative(&[("output", d.output), ("fuel", d.fuel.unwrap_or(0.0))], &b.name, path)?;
                Some(match d.fuel {
                    Some(fuel) => Generator::with_fuel(fx(d.output), fx(fuel)),
                    None => Generator::new(fx(d.output)),
                })
            }
            None => None,
        };
        let power_consumer = match &b.power_consumer {
            Some(d) => {
                non_negative(&[("demand", d.demand)], &b.name, path)?;
                Some(PowerConsumer::new(fx(d.demand)))
            }
            None => None,
        };
        let accumulator = match &b.accumulator {
            Some(d) => {
                non_negative(&[("capacity", d.capacity), ("charge_rate", d.charge_rate)], &b.name, path)?;
                Some(Accumulator::new(fx(d.capacity), fx(d.charge_rate)))
            }
            None => None,
        };
        let pipe = match &b.pipe {
            Some(d) => {
                non_negative(&[("capacity", d.capacity)], &b.name, path)?;
                Some(Pipe::new(fx(d.capacity)))
            }
            None => None,
        };
        let fluid_producer = match &b.fluid_producer {
            Some(d) => {
                non_negative(&[("rate", d.rate)], &b.name, path)?;
                let fluid = *resolve_name(fluids, &d.fluid, path, "fluid")?;
                Some(FluidProducer::new(fluid, fx(d.rate)))
            }
            None => None,
        };
        let fluid_consumer = match &b.fluid_consumer {
            Some(d) => {
                non_negative(&[("rate", d.rate)], &b.name, path)?;
                let fluid = *resolve_name(fluids, &d.fluid, path, "fluid")?;
                Some(FluidConsumer::new(fluid, fx(d.rate)))
            }
            None => None,
        };
        let fluid_tank = match &b.fluid_tank {
            Some(d) => {
                non_negative(&[("capacity", d.capacity), ("flow_rate", d.flow_rate)], &b.name, path)?;
                Some(FluidTank::new(fx(d.capacity), fx(d.flow_rate)))
            }
            None => None,
        };

        Ok(Prototype {
            name: b.name.clone(),
            width: b.width,
            height: b.height,
            power_pole,
            generator,
            power_consumer,
            accumulator,
            pipe,
            fluid_producer,
            fluid_consumer,
            fluid_tank,
        })
    }

    pub fn get(&self, name: &str) -> Option<&Prototype> {
        self.prototypes.get(name)
    }

    /// Prototype names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.prototypes.keys().map(String::as_str)
    }

    pub fn fluid(&self, name: &str) -> Option<FluidType> {
        self.fluids
            .iter()
            .position(|f| f == name)
            .map(|i| FluidType(i as u32))
    }

    pub fn fluid_name(&self, fluid: FluidType) -> Option<&str> {
        self.fluids.get(fluid.0 as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.prototypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prototypes.is_empty()
    }
}

// ===========================================================================
// Placement
// ===========================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlacementError {
    #[error("unknown building prototype '{0}'")]
    UnknownPrototype(String),

    #[error("tile ({}, {}) is occupied by {by}", .tile.x, .tile.y)]
    Occupied { tile: TilePos, by: Entity },
}

/// Place a copy of the prototype `name` with its top-left tile at `tile`.
///
/// Fails without touching the world if any footprint tile is taken. Placed
/// pipes connect to fluid entities around them; placed pumps, tanks, and
/// fluid consumers are picked up by the pipes around their footprint.
pub fn spawn_building(
    world: &mut World,
    catalog: &PrototypeCatalog,
    name: &str,
    tile: TilePos,
) -> Result<Entity, PlacementError> {
    let proto = catalog
        .get(name)
        .ok_or_else(|| PlacementError::UnknownPrototype(name.to_string()))?;
    if let Some((tile, by)) = proto
        .footprint(tile)
        .find_map(|t| world.get_entity_at(t).map(|by| (t, by)))
    {
        return Err(PlacementError::Occupied { tile, by });
    }

    let entity = world.spawn();
    world.add(entity, Position { tile });
    world.add(entity, Sprite::new(proto.name.clone(), proto.width, proto.height));
    if let Some(c) = &proto.power_pole {
        world.add(entity, c.clone());
    }
    if let Some(c) = &proto.generator {
        world.add(entity, c.clone());
    }
    if let Some(c) = &proto.power_consumer {
        world.add(entity, c.clone());
    }
    if let Some(c) = &proto.accumulator {
        world.add(entity, c.clone());
    }
    if let Some(c) = &proto.pipe {
        world.add(entity, c.clone());
    }
    if let Some(c) = &proto.fluid_producer {
        world.add(entity, c.clone());
    }
    if let Some(c) = &proto.fluid_consumer {
        world.add(entity, c.clone());
    }
    if let Some(c) = &proto.fluid_tank {
        world.add(entity, c.clone());
    }

    if proto.pipe.is_some() {
        connect_adjacent(world, entity);
    } else if proto.has_fluid_role() {
        for border in proto.border(tile) {
            if let Some(pipe) = world.get_entity_at(border).filter(|&e| world.has::<Pipe>(e)) {
                connect_adjacent(world, pipe);
            }
        }
    }

    log::trace!("placed {name} as {entity} at ({}, {})", tile.x, tile.y);
    Ok(entity)
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::tests::{cleanup, make_test_dir};
    use forge_core::test_utils::fixed;
    use std::fs;

    const BUILDINGS_RON: &str = r#"(
        fluids: ["water", "steam"],
        buildings: [
            (name: "pole", power_pole: (wire_reach: 7.5, supply_area: 2.5)),
            (name: "engine", width: 3, height: 5, generator: (output: 900.0, fuel: 60.0),
             fluid_consumer: (fluid: "steam", rate: 30.0)),
            (name: "lamp", power_consumer: (demand: 5.0)),
            (name: "battery", width: 2, height: 2, accumulator: (capacity: 5000.0, charge_rate: 300.0)),
            (name: "pipe", pipe: (capacity: 100.0)),
            (name: "pump", fluid_producer: (fluid: "water", rate: 1200.0)),
            (name: "tank", width: 3, height: 3, fluid_tank: (capacity: 25000.0, flow_rate: 1000.0)),
        ],
    )"#;

    fn catalog() -> PrototypeCatalog {
        let data: CatalogData = ron::from_str(BUILDINGS_RON).unwrap();
        PrototypeCatalog::from_data(&data, Path::new("buildings.ron")).unwrap()
    }

    // -----------------------------------------------------------------------
    // Catalog
    // -----------------------------------------------------------------------

    #[test]
    fn catalog_resolves_roles_and_fluids() {
        let catalog = catalog();
        assert_eq!(catalog.len(), 7);
        assert_eq!(catalog.fluid("steam"), Some(FluidType(1)));
        assert_eq!(catalog.fluid_name(FluidType(0)), Some("water"));
        assert_eq!(catalog.fluid("lava"), None);

        let engine = catalog.get("engine").unwrap();
        assert_eq!((engine.width, engine.height), (3, 5));
        assert_eq!(engine.generator.as_ref().unwrap().fuel, Some(fixed(60.0)));
        assert_eq!(engine.fluid_consumer.as_ref().unwrap().fluid, FluidType(1));
        assert!(engine.power_pole.is_none());

        let pole = catalog.get("pole").unwrap();
        assert_eq!(pole.power_pole, Some(PowerPole::new(fixed(7.5), fixed(2.5))));
        assert_eq!((pole.width, pole.height), (1, 1));
    }

    #[test]
    fn duplicate_building_is_an_error() {
        let data: CatalogData =
            ron::from_str(r#"(buildings: [(name: "pipe"), (name: "pipe")])"#).unwrap();
        let err = PrototypeCatalog::from_data(&data, Path::new("buildings.ron")).unwrap_err();
        assert!(matches!(err, DataLoadError::DuplicateName { ref name, .. } if name == "pipe"));
    }

    #[test]
    fn duplicate_fluid_is_an_error() {
        let data: CatalogData = ron::from_str(r#"(fluids: ["water", "water"])"#).unwrap();
        assert!(PrototypeCatalog::from_data(&data, Path::new("buildings.ron")).is_err());
    }

    #[test]
    fn unknown_fluid_is_an_error() {
        let data: CatalogData = ron::from_str(
            r#"(fluids: ["water"], buildings: [(name: "pump", fluid_producer: (fluid: "oil", rate: 1.0))])"#,
        )
        .unwrap();
        let err = PrototypeCatalog::from_data(&data, Path::new("buildings.ron")).unwrap_err();
        assert!(matches!(err, DataLoadError::UnknownName { kind: "fluid", .. }));
    }

    #[test]
    fn negative_values_are_rejected() {
        let data: CatalogData =
            ron::from_str(r#"(buildings: [(name: "lamp", power_consumer: (demand: -1.0))])"#).unwrap();
        let err = PrototypeCatalog::from_data(&data, Path::new("buildings.ron")).unwrap_err();
        assert!(err.to_string().contains("demand"));
    }

    #[test]
    fn catalog_loads_from_toml() {
        let dir = make_test_dir("catalog_toml");
        fs::write(
            dir.join("buildings.toml"),
            r#"
fluids = ["water"]

[[buildings]]
name = "pipe"
pipe = { capacity = 100.0 }

[[buildings]]
name = "pump"
fluid_producer = { fluid = "water", rate = 20.0 }
"#,
        )
        .unwrap();

        let catalog = PrototypeCatalog::load(&dir).unwrap();

        assert_eq!(catalog.names().collect::<Vec<_>>(), vec!["pipe", "pump"]);
        cleanup(&dir);
    }

    #[test]
    fn missing_catalog_is_an_error() {
        let dir = make_test_dir("catalog_missing");
        assert!(matches!(
            PrototypeCatalog::load(&dir),
            Err(DataLoadError::MissingRequired { .. })
        ));
        cleanup(&dir);
    }

    // -----------------------------------------------------------------------
    // Placement
    // -----------------------------------------------------------------------

    #[test]
    fn placed_building_carries_prototype_components() {
        let catalog = catalog();
        let mut world = World::new();

        let e = spawn_building(&mut world, &catalog, "battery", TilePos::new(4, 4)).unwrap();

        assert_eq!(world.get::<Position>(e), Some(&Position::at(4, 4)));
        assert_eq!(world.get::<Sprite>(e), Some(&Sprite::new("battery", 2, 2)));
        assert!(world.has::<Accumulator>(e));
        assert_eq!(world.get_entity_at(TilePos::new(5, 5)), Some(e));
    }

    #[test]
    fn overlapping_placement_is_refused() {
        let catalog = catalog();
        let mut world = World::new();
        let tank = spawn_building(&mut world, &catalog, "tank", TilePos::new(0, 0)).unwrap();
        let before = world.entity_count();

        let err = spawn_building(&mut world, &catalog, "battery", TilePos::new(2, 2)).unwrap_err();

        assert_eq!(
            err,
            PlacementError::Occupied {
                tile: TilePos::new(2, 2),
                by: tank
            }
        );
        assert_eq!(world.entity_count(), before);
    }

    #[test]
    fn unknown_prototype_is_refused() {
        let mut world = World::new();
        let err = spawn_building(&mut world, &catalog(), "reactor", TilePos::new(0, 0)).unwrap_err();
        assert_eq!(err, PlacementError::UnknownPrototype("reactor".into()));
    }

    #[test]
    fn pipes_connect_to_their_neighbors() {
        let catalog = catalog();
        let mut world = World::new();
        let pump = spawn_building(&mut world, &catalog, "pump", TilePos::new(0, 0)).unwrap();
        let a = spawn_building(&mut world, &catalog, "pipe", TilePos::new(1, 0)).unwrap();
        let b = spawn_building(&mut world, &catalog, "pipe", TilePos::new(2, 0)).unwrap();

        assert_eq!(world.get::<Pipe>(a).unwrap().connections, vec![pump, b]);
        assert_eq!(world.get::<Pipe>(b).unwrap().connections, vec![a]);
    }

    #[test]
    fn tank_placed_next_to_pipe_is_connected() {
        let catalog = catalog();
        let mut world = World::new();
        let pipe = spawn_building(&mut world, &catalog, "pipe", TilePos::new(0, 1)).unwrap();

        let tank = spawn_building(&mut world, &catalog, "tank", TilePos::new(1, 0)).unwrap();

        assert_eq!(world.get::<Pipe>(pipe).unwrap().connections, vec![tank]);
    }

    #[test]
    fn border_surrounds_footprint() {
        let proto = catalog().get("battery").cloned().unwrap();
        let border = proto.border(TilePos::new(0, 0));
        assert_eq!(border.len(), 8);
        assert!(border.contains(&TilePos::new(-1, 1)));
        assert!(border.contains(&TilePos::new(2, 0)));
        assert!(!border.contains(&TilePos::new(-1, -1)));
        assert_eq!(proto.footprint(TilePos::new(0, 0)).count(), 4);
    }
}
