//! Components owned by the core: placement, appearance, and the player marker.
//!
//! Resource-network components live in their own crates (`forge-power`,
//! `forge-fluid`) and register themselves for persistence there.

use crate::spatial::TilePos;
use serde::{Deserialize, Serialize};

/// Where an entity stands. Multi-tile entities are anchored at their
/// top-left tile.
///
/// The world mirrors this component into its spatial index. Move entities
/// with [`World::set_position`](crate::world::World::set_position) (or by
/// re-adding the component) so the index follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub tile: TilePos,
}

impl Position {
    pub const fn at(x: i32, y: i32) -> Self {
        Self {
            tile: TilePos::new(x, y),
        }
    }
}

/// What the renderer draws, and how many tiles it covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sprite {
    pub texture: String,
    pub width: u32,
    pub height: u32,
}

impl Sprite {
    pub fn new(texture: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            texture: texture.into(),
            width,
            height,
        }
    }

    /// Whether `tile` falls inside this sprite's footprint when anchored at `origin`.
    pub fn covers(&self, origin: TilePos, tile: TilePos) -> bool {
        let dx = i64::from(tile.x) - i64::from(origin.x);
        let dy = i64::from(tile.y) - i64::from(origin.y);
        (0..i64::from(self.width)).contains(&dx) && (0..i64::from(self.height)).contains(&dy)
    }
}

/// Marks the character the local player controls. Such entities are
/// persisted separately and never written into world saves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlayerControlled;
