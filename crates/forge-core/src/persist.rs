//! World persistence.
//!
//! A save holds, for each live entity, the encoded bytes of every component
//! on the [`PersistRegistry`] allow-list, keyed by a stable component name.
//! Components are encoded individually with `bitcode`, so one component
//! whose schema changed does not take the rest of the save down with it:
//! unknown names are ignored on load and undecodable components are skipped
//! and reported.
//!
//! Entities are restored with their original `(index, generation)` pair, so
//! entity handles stored inside components (pipe connections, for example)
//! stay valid across a save/load cycle. Networks are never persisted; the
//! network systems rebuild them from the restored components.

use crate::components::{PlayerControlled, Position, Sprite};
use crate::entity::Entity;
use crate::storage::Component;
use crate::world::World;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic number identifying a Forge world save.
pub const SAVE_MAGIC: u32 = 0xF06E_5A7E;

/// Current save format version. Increment when the envelope changes.
pub const FORMAT_VERSION: u32 = 1;

const HEADER_LEN: usize = 8;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("failed to encode component `{component}` of {entity}: {reason}")]
    EncodeComponent {
        entity: Entity,
        component: String,
        reason: String,
    },
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
    #[error("data too short for save header")]
    TooShort,
    #[error("invalid magic number: expected 0x{:08X}, got 0x{:08X}", SAVE_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("unsupported format version: expected {}, got {}", FORMAT_VERSION, .0)]
    UnsupportedVersion(u32),
    #[error("save from future version {0} (this build supports up to {FORMAT_VERSION})")]
    FutureVersion(u32),
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

type EncodeFn = fn(&World, Entity) -> Option<Result<Vec<u8>, String>>;
type DecodeFn = fn(&mut World, Entity, &[u8]) -> Result<(), String>;

fn encode_component<T: Component + Serialize>(
    world: &World,
    entity: Entity,
) -> Option<Result<Vec<u8>, String>> {
    let value = world.get::<T>(entity)?;
    Some(bitcode::serialize(value).map_err(|e| e.to_string()))
}

fn decode_component<T: Component + DeserializeOwned>(
    world: &mut World,
    entity: Entity,
    bytes: &[u8],
) -> Result<(), String> {
    let value: T = bitcode::deserialize(bytes).map_err(|e| e.to_string())?;
    world.add(entity, value);
    Ok(())
}

struct PersistedType {
    name: String,
    encode: EncodeFn,
    decode: DecodeFn,
}

/// The allow-list of component types written to and read from saves.
///
/// Built once at startup; each crate contributes its own types:
///
/// ```rust,ignore
/// let registry = PersistRegistry::with_core_components()
///     .register::<Generator>("generator")
///     .register::<PowerPole>("power_pole");
/// ```
#[derive(Default)]
pub struct PersistRegistry {
    types: Vec<PersistedType>,
}

impl std::fmt::Debug for PersistRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl PersistRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the core's own persistable components.
    pub fn with_core_components() -> Self {
        Self::new()
            .register::<Position>("position")
            .register::<Sprite>("sprite")
    }

    /// Add `T` under `name`. Re-registering a name replaces the earlier entry.
    pub fn register<T>(mut self, name: &str) -> Self
    where
        T: Component + Serialize + DeserializeOwned,
    {
        let entry = PersistedType {
            name: name.to_string(),
            encode: encode_component::<T>,
            decode: decode_component::<T>,
        };
        match self.types.iter_mut().find(|t| t.name == name) {
            Some(existing) => {
                log::warn!("persisted component `{name}` registered twice; keeping the later type");
                *existing = entry;
            }
            None => self.types.push(entry),
        }
        self
    }

    /// Registered names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.iter().map(|t| t.name.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.iter().any(|t| t.name == name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    fn decoder(&self, name: &str) -> Option<DecodeFn> {
        self.types.iter().find(|t| t.name == name).map(|t| t.decode)
    }
}

// ---------------------------------------------------------------------------
// Save data
// ---------------------------------------------------------------------------

/// Encoded components of one entity, keyed by component name.
pub type EntityRecord = BTreeMap<String, Vec<u8>>;

/// The persisted form of a world.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct WorldData {
    pub entities: BTreeMap<Entity, EntityRecord>,
}

impl WorldData {
    /// Encode into a self-describing blob: a magic + version header followed
    /// by the bitcode payload.
    pub fn to_bytes(&self) -> Result<Vec<u8>, PersistError> {
        let payload = bitcode::serialize(self).map_err(|e| PersistError::Encode(e.to_string()))?;
        let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
        bytes.extend_from_slice(&SAVE_MAGIC.to_le_bytes());
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&payload);
        Ok(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PersistError> {
        let header = SaveHeader::read(bytes)?;
        header.validate()?;
        bitcode::deserialize(&bytes[HEADER_LEN..]).map_err(|e| PersistError::Decode(e.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Header at the front of every encoded [`WorldData`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveHeader {
    pub magic: u32,
    pub version: u32,
}

impl SaveHeader {
    /// Read the header without decoding the payload.
    pub fn read(bytes: &[u8]) -> Result<Self, PersistError> {
        let (Some(magic), Some(version)) = (bytes.get(0..4), bytes.get(4..HEADER_LEN)) else {
            return Err(PersistError::TooShort);
        };
        let word = |b: &[u8]| u32::from_le_bytes([b[0], b[1], b[2], b[3]]);
        Ok(Self {
            magic: word(magic),
            version: word(version),
        })
    }

    pub fn validate(&self) -> Result<(), PersistError> {
        if self.magic != SAVE_MAGIC {
            return Err(PersistError::InvalidMagic(self.magic));
        }
        if self.version > FORMAT_VERSION {
            return Err(PersistError::FutureVersion(self.version));
        }
        if self.version < FORMAT_VERSION {
            return Err(PersistError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

/// A component that could not be restored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedComponent {
    pub entity: Entity,
    pub component: String,
    pub reason: String,
}

/// Outcome of [`World::deserialize`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub entities: usize,
    pub components: usize,
    /// Components whose name is not on the allow-list.
    pub ignored: usize,
    pub skipped: Vec<SkippedComponent>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}

// ---------------------------------------------------------------------------
// World integration
// ---------------------------------------------------------------------------

impl World {
    /// Encode every live entity's allow-listed components.
    ///
    /// Entities marked [`PlayerControlled`] are left out; the player is
    /// persisted separately.
    pub fn serialize(&self, registry: &PersistRegistry) -> Result<WorldData, PersistError> {
        let mut data = WorldData::default();
        for entity in self.entities() {
            if self.has::<PlayerControlled>(entity) {
                continue;
            }
            let mut record = EntityRecord::new();
            for ty in &registry.types {
                match (ty.encode)(self, entity) {
                    Some(Ok(bytes)) => {
                        record.insert(ty.name.clone(), bytes);
                    }
                    Some(Err(reason)) => {
                        return Err(PersistError::EncodeComponent {
                            entity,
                            component: ty.name.clone(),
                            reason,
                        });
                    }
                    None => {}
                }
            }
            data.entities.insert(entity, record);
        }
        log::debug!("serialized {} entities", data.entities.len());
        Ok(data)
    }

    /// Replace the world's contents with `data`.
    ///
    /// Every entity is recreated with its saved id before any component is
    /// decoded. Components that fail to decode are skipped and reported; the
    /// entity keeps the rest.
    pub fn deserialize(&mut self, data: &WorldData, registry: &PersistRegistry) -> LoadReport {
        self.clear();
        let mut report = LoadReport::default();

        for &entity in data.entities.keys() {
            if self.restore_entity(entity) {
                report.entities += 1;
            } else {
                log::warn!("save lists entity {entity} twice; keeping the first");
            }
        }

        for (&entity, record) in &data.entities {
            for (name, bytes) in record {
                let Some(decode) = registry.decoder(name) else {
                    log::debug!("ignoring unknown component `{name}` on {entity}");
                    report.ignored += 1;
                    continue;
                };
                match decode(self, entity, bytes) {
                    Ok(()) => report.components += 1,
                    Err(reason) => {
                        log::warn!("skipping component `{name}` on {entity}: {reason}");
                        report.skipped.push(SkippedComponent {
                            entity,
                            component: name.clone(),
                            reason,
                        });
                    }
                }
            }
        }

        log::debug!(
            "restored {} entities, {} components ({} skipped, {} ignored)",
            report.entities,
            report.components,
            report.skipped.len(),
            report.ignored
        );
        report
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::TilePos;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Label(String);

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Link(Entity);

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Unlisted(u8);

    fn registry() -> PersistRegistry {
        PersistRegistry::with_core_components()
            .register::<Label>("label")
            .register::<Link>("link")
    }

    #[test]
    fn round_trip_preserves_components_and_ids() {
        let mut world = World::new();
        let dead = world.spawn();
        let a = world.spawn();
        let b = world.spawn();
        world.despawn(dead);
        world.add(a, Position::at(1, 2));
        world.add(a, Label("furnace".into()));
        world.add(b, Link(a));
        world.add(b, Sprite::new("belt", 1, 1));

        let data = world.serialize(&registry()).unwrap();
        let mut loaded = World::new();
        let report = loaded.deserialize(&data, &registry());

        assert!(report.is_clean());
        assert_eq!(report.entities, 2);
        assert_eq!(report.components, 4);
        assert!(loaded.is_alive(a));
        assert!(loaded.is_alive(b));
        assert!(!loaded.is_alive(dead));
        assert_eq!(loaded.get::<Label>(a), Some(&Label("furnace".into())));
        assert_eq!(loaded.get::<Link>(b), Some(&Link(a)));
        assert_eq!(loaded.get_entity_at(TilePos::new(1, 2)), Some(a));
    }

    #[test]
    fn player_entity_is_excluded() {
        let mut world = World::new();
        let player = world.spawn();
        world.add(player, PlayerControlled);
        world.add(player, Position::at(0, 0));
        let chest = world.spawn();
        world.add(chest, Position::at(3, 3));

        let data = world.serialize(&registry()).unwrap();
        assert_eq!(data.len(), 1);
        assert!(data.entities.contains_key(&chest));
    }

    #[test]
    fn components_off_the_allow_list_are_not_saved() {
        let mut world = World::new();
        let e = world.spawn();
        world.add(e, Unlisted(7));
        world.add(e, Label("x".into()));

        let data = world.serialize(&registry()).unwrap();
        let record = &data.entities[&e];
        assert_eq!(record.keys().collect::<Vec<_>>(), vec!["label"]);
    }

    #[test]
    fn corrupt_component_is_skipped_not_fatal() {
        let mut world = World::new();
        let e = world.spawn();
        world.add(e, Position::at(4, 4));
        world.add(e, Label("ok".into()));
        let mut data = world.serialize(&registry()).unwrap();
        if let Some(record) = data.entities.get_mut(&e) {
            record.insert("label".into(), vec![0xFF]);
        }

        let mut loaded = World::new();
        let report = loaded.deserialize(&data, &registry());

        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].component, "label");
        assert!(loaded.is_alive(e));
        assert!(loaded.get::<Label>(e).is_none());
        assert_eq!(loaded.get::<Position>(e), Some(&Position::at(4, 4)));
    }

    #[test]
    fn unknown_component_names_are_ignored() {
        let mut data = WorldData::default();
        let e = Entity::from_raw_parts(5, 2);
        let mut record = EntityRecord::new();
        record.insert("from_a_newer_build".into(), vec![1, 2, 3]);
        data.entities.insert(e, record);

        let mut world = World::new();
        let report = world.deserialize(&data, &registry());

        assert_eq!(report.ignored, 1);
        assert!(report.is_clean());
        assert!(world.is_alive(e));
        // Skipped indices are reusable after load.
        let fresh = world.spawn();
        assert!(fresh.index() < 5);
    }

    #[test]
    fn deserialize_replaces_existing_contents() {
        let mut world = World::new();
        let old = world.spawn();
        world.add(old, Label("stale".into()));

        let report = world.deserialize(&WorldData::default(), &registry());

        assert_eq!(report.entities, 0);
        assert_eq!(world.entity_count(), 0);
        assert!(world.get::<Label>(old).is_none());
    }

    #[test]
    fn blob_round_trip() {
        let mut world = World::new();
        let e = world.spawn();
        world.add(e, Label("boiler".into()));
        let data = world.serialize(&registry()).unwrap();

        let bytes = data.to_bytes().unwrap();
        assert_eq!(WorldData::from_bytes(&bytes).unwrap(), data);
    }

    #[test]
    fn blob_header_is_validated() {
        let bytes = WorldData::default().to_bytes().unwrap();

        let mut wrong_magic = bytes.clone();
        wrong_magic[0] ^= 0xFF;
        assert!(matches!(
            WorldData::from_bytes(&wrong_magic),
            Err(PersistError::InvalidMagic(_))
        ));

        let mut future = bytes.clone();
        future[4..8].copy_from_slice(&(FORMAT_VERSION + 1).to_le_bytes());
        assert!(matches!(
            WorldData::from_bytes(&future),
            Err(PersistError::FutureVersion(_))
        ));

        assert!(matches!(
            WorldData::from_bytes(&bytes[..3]),
            Err(PersistError::TooShort)
        ));
    }

    #[test]
    fn registering_a_name_twice_keeps_one_entry() {
        let registry = PersistRegistry::new()
            .register::<Label>("tag")
            .register::<Link>("tag");
        assert_eq!(registry.len(), 1);
        assert!(registry.contains("tag"));
    }
}
