//! Farm records and the in-memory farm registry.
//!
//! A farm is a named region of a world, described by two corner points and a
//! spawn point. The registry is loaded from `farms.json` at startup and
//! written back whenever a farm is created or replaced. Resets never modify a
//! record; they only apply its spawn to the freshly generated world.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{FarmResetError, Result};

const MAX_FARM_NAME_LEN: usize = 32;

/// A position inside a named world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub world: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default)]
    pub yaw: f32,
    #[serde(default)]
    pub pitch: f32,
}

impl Location {
    pub fn new(world: impl Into<String>, x: f64, y: f64, z: f64) -> Self {
        Self {
            world: world.into(),
            x,
            y,
            z,
            yaw: 0.0,
            pitch: 0.0,
        }
    }

    pub fn with_facing(mut self, yaw: f32, pitch: f32) -> Self {
        self.yaw = yaw;
        self.pitch = pitch;
        self
    }

    /// Compact `X: 1.0, Y: 2.0, Z: 3.0` rendering used in replies and logs.
    pub fn describe(&self) -> String {
        format!("X: {:.1}, Y: {:.1}, Z: {:.1}", self.x, self.y, self.z)
    }
}

/// A registered farm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FarmRecord {
    #[serde(skip)]
    pub name: String,
    pub spawn: Location,
    pub pos1: Location,
    pub pos2: Location,
}

impl FarmRecord {
    /// Name of the world this farm lives in.
    pub fn world(&self) -> &str {
        &self.spawn.world
    }
}

/// Build a farm from two corners, placing its spawn at their midpoint.
///
/// The spawn takes the facing (`yaw`, `pitch`) of whoever created the farm.
pub fn create_farm(
    name: &str,
    pos1: Option<&Location>,
    pos2: Option<&Location>,
    facing: (f32, f32),
) -> Result<FarmRecord> {
    validate_farm_name(name)?;
    let pos1 = pos1.ok_or(FarmResetError::MissingCorner(1))?;
    let pos2 = pos2.ok_or(FarmResetError::MissingCorner(2))?;
    if pos1.world != pos2.world {
        return Err(FarmResetError::InvalidFarm(format!(
            "corners are in different worlds ('{}' and '{}')",
            pos1.world, pos2.world
        )));
    }

    let spawn = Location::new(
        pos1.world.clone(),
        (pos1.x + pos2.x) / 2.0,
        (pos1.y + pos2.y) / 2.0,
        (pos1.z + pos2.z) / 2.0,
    )
    .with_facing(facing.0, facing.1);

    Ok(FarmRecord {
        name: name.to_string(),
        spawn,
        pos1: pos1.clone(),
        pos2: pos2.clone(),
    })
}

fn validate_farm_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(FarmResetError::InvalidFarm("name cannot be empty".into()));
    }
    if name.len() > MAX_FARM_NAME_LEN {
        return Err(FarmResetError::InvalidFarm(format!(
            "name too long (max {} characters)",
            MAX_FARM_NAME_LEN
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(FarmResetError::InvalidFarm(
            "name may only contain letters, digits, '_' and '-'".into(),
        ));
    }
    Ok(())
}

/// All known farms, keyed and iterated by name.
#[derive(Debug, Clone, Default)]
pub struct FarmRegistry {
    farms: BTreeMap<String, FarmRecord>,
}

impl FarmRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = FarmRecord>) -> Self {
        let mut registry = Self::new();
        for record in records {
            registry.insert(record);
        }
        registry
    }

    pub fn get(&self, name: &str) -> Option<&FarmRecord> {
        self.farms.get(name)
    }

    /// Insert or replace a farm. Returns the previous record of that name.
    pub fn insert(&mut self, farm: FarmRecord) -> Option<FarmRecord> {
        self.farms.insert(farm.name.clone(), farm)
    }

    pub fn all(&self) -> impl Iterator<Item = &FarmRecord> {
        self.farms.values()
    }

    /// First farm (by name) whose spawn lies in `world`.
    pub fn find_by_world(&self, world: &str) -> Option<&FarmRecord> {
        self.farms.values().find(|f| f.world() == world)
    }

    pub fn len(&self) -> usize {
        self.farms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.farms.is_empty()
    }
}

/// Corner points players have picked but not yet turned into a farm.
#[derive(Debug, Default)]
pub struct CornerSelection {
    pos1: HashMap<Uuid, Location>,
    pos2: HashMap<Uuid, Location>,
}

impl CornerSelection {
    pub fn set_pos1(&mut self, player: Uuid, location: Location) {
        self.pos1.insert(player, location);
    }

    pub fn set_pos2(&mut self, player: Uuid, location: Location) {
        self.pos2.insert(player, location);
    }

    pub fn pos1(&self, player: &Uuid) -> Option<&Location> {
        self.pos1.get(player)
    }

    pub fn pos2(&self, player: &Uuid) -> Option<&Location> {
        self.pos2.get(player)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_is_corner_midpoint_with_creator_facing() {
        let a = Location::new("farm", 0.0, 60.0, 10.0);
        let b = Location::new("farm", 100.0, 80.0, -10.0);
        let farm = create_farm("alpha", Some(&a), Some(&b), (90.0, 15.0)).unwrap();
        assert_eq!(farm.spawn.world, "farm");
        assert_eq!(farm.spawn.x, 50.0);
        assert_eq!(farm.spawn.y, 70.0);
        assert_eq!(farm.spawn.z, 0.0);
        assert_eq!(farm.spawn.yaw, 90.0);
        assert_eq!(farm.spawn.pitch, 15.0);
    }

    #[test]
    fn corners_must_share_a_world() {
        let a = Location::new("farm", 0.0, 60.0, 0.0);
        let b = Location::new("world", 10.0, 60.0, 10.0);
        let err = create_farm("alpha", Some(&a), Some(&b), (0.0, 0.0)).unwrap_err();
        assert!(matches!(err, FarmResetError::InvalidFarm(_)));
    }

    #[test]
    fn missing_corner_is_reported() {
        let a = Location::new("farm", 0.0, 60.0, 0.0);
        let err = create_farm("alpha", Some(&a), None, (0.0, 0.0)).unwrap_err();
        assert!(matches!(err, FarmResetError::MissingCorner(2)));
        let err = create_farm("alpha", None, Some(&a), (0.0, 0.0)).unwrap_err();
        assert!(matches!(err, FarmResetError::MissingCorner(1)));
    }

    #[test]
    fn rejects_bad_names() {
        let a = Location::new("farm", 0.0, 60.0, 0.0);
        for name in ["", "has space", "../etc", &"x".repeat(40)] {
            assert!(
                create_farm(name, Some(&a), Some(&a), (0.0, 0.0)).is_err(),
                "name {:?} should be rejected",
                name
            );
        }
    }

    #[test]
    fn insert_replaces_same_name() {
        let a = Location::new("farm", 0.0, 60.0, 0.0);
        let b = Location::new("farm2", 0.0, 60.0, 0.0);
        let mut registry = FarmRegistry::new();
        registry.insert(create_farm("alpha", Some(&a), Some(&a), (0.0, 0.0)).unwrap());
        let old = registry.insert(create_farm("alpha", Some(&b), Some(&b), (0.0, 0.0)).unwrap());
        assert!(old.is_some());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("alpha").unwrap().world(), "farm2");
        assert_eq!(registry.find_by_world("farm2").unwrap().name, "alpha");
        assert!(registry.find_by_world("farm").is_none());
    }
}
