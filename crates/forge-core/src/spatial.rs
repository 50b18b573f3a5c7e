//! Tile-keyed spatial index.
//!
//! Maps integer tile coordinates to the entities whose [`Position`] origin
//! lies on that tile. Multi-tile buildings are indexed by their origin tile
//! only; the world resolves the rest of their footprint with a bounds check
//! on lookup miss.
//!
//! [`Position`]: crate::components::Position

use crate::entity::Entity;
use crate::fixed::Fixed64;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A position on the tile grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct TilePos {
    pub x: i32,
    pub y: i32,
}

impl TilePos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Tile shifted by `(dx, dy)`.
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x.saturating_add(dx), self.y.saturating_add(dy))
    }

    /// Squared Euclidean distance in tiles.
    pub fn distance_squared(self, other: TilePos) -> i64 {
        let dx = i64::from(self.x) - i64::from(other.x);
        let dy = i64::from(self.y) - i64::from(other.y);
        dx * dx + dy * dy
    }

    /// Whether `other` lies within Euclidean `radius` of this tile.
    pub fn within(self, other: TilePos, radius: Fixed64) -> bool {
        if radius < Fixed64::ZERO {
            return false;
        }
        let reach = radius.saturating_mul(radius);
        let d2 = self.distance_squared(other);
        match Fixed64::checked_from_num(d2) {
            Some(d2) => d2 <= reach,
            None => false,
        }
    }

    /// The four edge-adjacent tiles.
    pub fn neighbors_4(self) -> [TilePos; 4] {
        Direction::all().map(|dir| {
            let (dx, dy) = dir.offset();
            self.offset(dx, dy)
        })
    }
}

/// Cardinal directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    pub fn all() -> [Direction; 4] {
        [
            Direction::North,
            Direction::East,
            Direction::South,
            Direction::West,
        ]
    }

    /// Offset for this direction. North is negative y.
    pub fn offset(&self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::East => (1, 0),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
        }
    }
}

// ---------------------------------------------------------------------------
// SpatialIndex
// ---------------------------------------------------------------------------

/// Tile -> occupant map, with the reverse entity -> tile mapping.
///
/// A tile normally holds one entity. When several entities stand on the same
/// tile (a character on top of a building) they are kept in arrival order and
/// the earliest is reported as the occupant.
#[derive(Debug, Clone, Default)]
pub struct SpatialIndex {
    tiles: BTreeMap<TilePos, Vec<Entity>>,
    placed: BTreeMap<Entity, TilePos>,
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put `entity` on `tile`, moving it off whatever tile it was on before.
    pub fn place(&mut self, entity: Entity, tile: TilePos) {
        if let Some(previous) = self.placed.insert(entity, tile) {
            if previous == tile {
                return;
            }
            self.detach(previous, entity);
        }
        self.tiles.entry(tile).or_default().push(entity);
    }

    /// Take `entity` off the grid. Returns the tile it occupied.
    pub fn unplace(&mut self, entity: Entity) -> Option<TilePos> {
        let tile = self.placed.remove(&entity)?;
        self.detach(tile, entity);
        Some(tile)
    }

    fn detach(&mut self, tile: TilePos, entity: Entity) {
        if let Some(occupants) = self.tiles.get_mut(&tile) {
            occupants.retain(|&e| e != entity);
            if occupants.is_empty() {
                self.tiles.remove(&tile);
            }
        }
    }

    /// The occupant of `tile`, if any.
    pub fn get(&self, tile: TilePos) -> Option<Entity> {
        self.tiles.get(&tile).and_then(|o| o.first().copied())
    }

    /// Every entity registered on `tile`, earliest first.
    pub fn occupants(&self, tile: TilePos) -> &[Entity] {
        self.tiles.get(&tile).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The tile `entity` is registered on.
    pub fn tile_of(&self, entity: Entity) -> Option<TilePos> {
        self.placed.get(&entity).copied()
    }

    /// All `(tile, entity)` pairs inside the inclusive rectangle, column by column.
    pub fn entities_in_rect(&self, min: TilePos, max: TilePos) -> Vec<(TilePos, Entity)> {
        let mut result = Vec::new();
        if min.x > max.x || min.y > max.y {
            return result;
        }
        // Tiles order by x then y, so one range covers every column; rows
        // outside the rect are skipped.
        for (&tile, occupants) in self.tiles.range(min..=max) {
            if (min.y..=max.y).contains(&tile.y) {
                result.extend(occupants.iter().map(|&e| (tile, e)));
            }
        }
        result
    }

    /// Number of entities on the grid.
    pub fn len(&self) -> usize {
        self.placed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placed.is_empty()
    }

    /// Number of occupied tiles.
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn clear(&mut self) {
        self.tiles.clear();
        self.placed.clear();
    }
}
