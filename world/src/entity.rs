//! Entities: positioned actors owned by a stage.

use std::{collections::BTreeMap, fmt};

use glam::Vec2;
use gridstage_core::{
    Color, EntityId, EntityKind, EntityStatus, GridCoord, MapId, Orientation, StageId,
    StageStatus, Surface,
};

use crate::{
    grid::GridMap,
    navigation::Step,
    stage::{EntitySlot, MapSlot},
};

/// Value stored in an entity's [`Control`] scratch map.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ControlValue {
    /// Integer value.
    Int(i64),
    /// Floating point value.
    Float(f64),
    /// Boolean flag.
    Flag(bool),
    /// Tile coordinate.
    Coord(GridCoord),
    /// Facing direction.
    Orientation(Orientation),
}

/// Free-form scratch values a behaviour keeps between ticks.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Control {
    values: BTreeMap<String, ControlValue>,
}

impl Control {
    /// Stores a value, returning the one it replaced.
    pub fn insert(&mut self, key: impl Into<String>, value: ControlValue) -> Option<ControlValue> {
        self.values.insert(key.into(), value)
    }

    /// Value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<ControlValue> {
        self.values.get(key).copied()
    }

    /// Removes and returns the value stored under `key`.
    pub fn remove(&mut self, key: &str) -> Option<ControlValue> {
        self.values.remove(key)
    }

    /// Coordinate stored under `key`, if that is what it holds.
    #[must_use]
    pub fn coord(&self, key: &str) -> Option<GridCoord> {
        match self.get(key) {
            Some(ControlValue::Coord(coord)) => Some(coord),
            _ => None,
        }
    }

    /// Orientation stored under `key`, if that is what it holds.
    #[must_use]
    pub fn orientation(&self, key: &str) -> Option<Orientation> {
        match self.get(key) {
            Some(ControlValue::Orientation(orientation)) => Some(orientation),
            _ => None,
        }
    }

    /// Reports whether no values are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterator over stored keys and values in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, ControlValue)> {
        self.values
            .iter()
            .map(|(key, value)| (key.as_str(), *value))
    }
}

/// Update and draw behaviour attached to an [`Entity`].
pub trait EntityBehavior: CloneEntityBehavior {
    /// Advances the entity. Skipped while the entity or its stage is paused.
    ///
    /// Maps are writable through [`SceneView::map_mut`]; other entities are not.
    fn update(&mut self, _entity: &mut Entity, _scene: &mut SceneView<'_>) {}

    /// Draws the entity. Called every tick that is not skipped by the stage hook.
    fn draw(&mut self, _entity: &Entity, _surface: &mut dyn Surface) {}
}

/// Object-safe cloning for boxed entity behaviours.
pub trait CloneEntityBehavior {
    /// Clones the behaviour into a new box.
    fn clone_box(&self) -> Box<dyn EntityBehavior>;
}

impl<T> CloneEntityBehavior for T
where
    T: EntityBehavior + Clone + 'static,
{
    fn clone_box(&self) -> Box<dyn EntityBehavior> {
        Box::new(self.clone())
    }
}

impl Clone for Box<dyn EntityBehavior> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Entity behaviour that neither updates nor draws.
#[derive(Clone, Copy, Debug, Default)]
pub struct InertEntity;

impl EntityBehavior for InertEntity {}

/// Construction parameters for an [`Entity`].
///
/// Stages keep the config so [`Stage::reset`](crate::Stage::reset) can rebuild
/// the entity exactly as it was created.
#[derive(Clone)]
pub struct EntityConfig {
    /// Surface position; replaced by the tile center when `location` is set.
    pub position: Vec2,
    /// Width and height in surface units.
    pub size: Vec2,
    /// Role tag.
    pub kind: EntityKind,
    /// Identifying color.
    pub color: Color,
    /// Initial status.
    pub status: EntityStatus,
    /// Initial facing direction.
    pub orientation: Orientation,
    /// Movement speed in surface units per update.
    pub speed: f32,
    /// Map the entity is bound to.
    pub location: Option<MapId>,
    /// Starting tile when bound to a map.
    pub coord: GridCoord,
    /// Initial automatic path.
    pub path: Vec<Step>,
    /// Initial target tile.
    pub vector: Option<GridCoord>,
    /// Number of ticks between recomputations of the entity's frame counter.
    pub frames: u32,
    /// Initial countdown.
    pub timeout: u32,
    /// Initial scratch values.
    pub control: Control,
    /// Update and draw behaviour.
    pub behavior: Box<dyn EntityBehavior>,
}

impl EntityConfig {
    /// Places an unbound entity at a surface position.
    #[must_use]
    pub fn at(position: Vec2) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// Binds the entity to a tile of the given map.
    #[must_use]
    pub fn on_map(map: MapId, coord: GridCoord) -> Self {
        Self {
            location: Some(map),
            coord,
            ..Self::default()
        }
    }

    /// Sets the role tag.
    #[must_use]
    pub fn with_kind(mut self, kind: EntityKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets width and height.
    #[must_use]
    pub fn with_size(mut self, size: Vec2) -> Self {
        self.size = size;
        self
    }

    /// Sets the frame divisor.
    #[must_use]
    pub fn with_frames(mut self, frames: u32) -> Self {
        self.frames = frames;
        self
    }

    /// Attaches the entity's behaviour.
    #[must_use]
    pub fn with_behavior(mut self, behavior: impl EntityBehavior + 'static) -> Self {
        self.behavior = Box::new(behavior);
        self
    }
}

impl Default for EntityConfig {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            size: Vec2::splat(20.0),
            kind: EntityKind::Free,
            color: Color::RED,
            status: EntityStatus::Normal,
            orientation: Orientation::Right,
            speed: 0.0,
            location: None,
            coord: GridCoord::default(),
            path: Vec::new(),
            vector: None,
            frames: 1,
            timeout: 0,
            control: Control::default(),
            behavior: Box::new(InertEntity),
        }
    }
}

impl fmt::Debug for EntityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityConfig")
            .field("position", &self.position)
            .field("size", &self.size)
            .field("kind", &self.kind)
            .field("status", &self.status)
            .field("location", &self.location)
            .field("coord", &self.coord)
            .field("frames", &self.frames)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Positioned, stateful actor.
///
/// Behaviours mutate the public fields directly. `coord` and `offset` are
/// refreshed from `position` every active tick while the entity is bound to a
/// map; unbound entities only have `position`.
#[derive(Clone, Debug, PartialEq)]
pub struct Entity {
    id: EntityId,
    stage: StageId,
    /// Surface position of the entity's center.
    pub position: Vec2,
    /// Width and height in surface units.
    pub size: Vec2,
    /// Role tag.
    pub kind: EntityKind,
    /// Identifying color.
    pub color: Color,
    /// Lifecycle status.
    pub status: EntityStatus,
    /// Facing direction.
    pub orientation: Orientation,
    /// Movement speed in surface units per update.
    pub speed: f32,
    /// Map the entity is bound to.
    pub location: Option<MapId>,
    /// Tile occupied on the bound map.
    pub coord: GridCoord,
    /// Distance from the center of `coord`.
    pub offset: f32,
    /// Automatic path, next tile first.
    pub path: Vec<Step>,
    /// Target tile.
    pub vector: Option<GridCoord>,
    /// Frame divisor; treated as `1` when zero.
    pub frames: u32,
    times: u64,
    /// Countdown decremented once per active tick while positive.
    pub timeout: u32,
    /// Scratch values owned by the behaviour.
    pub control: Control,
}

impl Entity {
    pub(crate) fn from_config(
        id: EntityId,
        stage: StageId,
        config: &EntityConfig,
        map: Option<&GridMap>,
    ) -> Self {
        let position = map.map_or(config.position, |map| map.coord_to_surface(config.coord));
        Self {
            id,
            stage,
            position,
            size: config.size,
            kind: config.kind,
            color: config.color,
            status: config.status,
            orientation: config.orientation,
            speed: config.speed,
            location: config.location,
            coord: config.coord,
            offset: 0.0,
            path: config.path.clone(),
            vector: config.vector,
            frames: config.frames,
            times: 0,
            timeout: config.timeout,
            control: config.control.clone(),
        }
    }

    /// Index assigned by the owning stage.
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// Stage that owns the entity.
    #[must_use]
    pub const fn stage(&self) -> StageId {
        self.stage
    }

    /// Derived frame counter, `frame / frames` as of the last divisible frame.
    #[must_use]
    pub const fn times(&self) -> u64 {
        self.times
    }

    /// Reports whether `point` falls inside the entity's box.
    #[must_use]
    pub fn contains(&self, point: Vec2) -> bool {
        (point.x - self.position.x).abs() < self.size.x / 2.0
            && (point.y - self.position.y).abs() < self.size.y / 2.0
    }

    pub(crate) fn record_frame(&mut self, frame: u64) {
        let frames = u64::from(self.frames.max(1));
        if frame % frames == 0 {
            self.times = frame / frames;
        }
    }

    pub(crate) fn tick_timeout(&mut self) {
        self.timeout = self.timeout.saturating_sub(1);
    }
}

/// View of the rest of the stage handed to entity updates: writable maps and
/// read-only access to the other entities.
pub struct SceneView<'a> {
    frame: u64,
    stage: StageId,
    status: StageStatus,
    maps: &'a mut [MapSlot],
    before: &'a [EntitySlot],
    after: &'a [EntitySlot],
}

impl<'a> SceneView<'a> {
    pub(crate) fn new(
        frame: u64,
        stage: StageId,
        status: StageStatus,
        maps: &'a mut [MapSlot],
        before: &'a [EntitySlot],
        after: &'a [EntitySlot],
    ) -> Self {
        Self {
            frame,
            stage,
            status,
            maps,
            before,
            after,
        }
    }

    /// Frame counter of the running tick.
    #[must_use]
    pub const fn frame(&self) -> u64 {
        self.frame
    }

    /// Stage being updated.
    #[must_use]
    pub const fn stage(&self) -> StageId {
        self.stage
    }

    /// Status of the stage being updated.
    #[must_use]
    pub const fn status(&self) -> StageStatus {
        self.status
    }

    /// Map with the provided id.
    #[must_use]
    pub fn map(&self, id: MapId) -> Option<&GridMap> {
        self.maps.get(id.index()).map(|slot| &slot.map)
    }

    /// Mutable map with the provided id, e.g. to rewrite tiles under an entity.
    pub fn map_mut(&mut self, id: MapId) -> Option<&mut GridMap> {
        self.maps.get_mut(id.index()).map(|slot| &mut slot.map)
    }

    /// Every map of the stage in creation order.
    pub fn maps(&self) -> impl Iterator<Item = &GridMap> {
        self.maps.iter().map(|slot| &slot.map)
    }

    /// Every other entity of the stage in creation order.
    pub fn others(&self) -> impl Iterator<Item = &'a Entity> {
        self.before
            .iter()
            .chain(self.after.iter())
            .map(|slot| &slot.entity)
    }

    /// Other entities of the given kind in creation order.
    pub fn others_by_kind(&self, kind: EntityKind) -> impl Iterator<Item = &'a Entity> {
        self.others().filter(move |entity| entity.kind == kind)
    }

    /// Another entity by id; `None` for the entity being updated.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&'a Entity> {
        self.others().find(|entity| entity.id == id)
    }
}

impl fmt::Debug for SceneView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneView")
            .field("frame", &self.frame)
            .field("stage", &self.stage)
            .field("status", &self.status)
            .field("maps", &self.maps.len())
            .field("others", &(self.before.len() + self.after.len()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_a_fresh_red_square() {
        let entity = Entity::from_config(
            EntityId::new(0),
            StageId::new(0),
            &EntityConfig::default(),
            None,
        );
        assert_eq!(entity.size, Vec2::splat(20.0));
        assert_eq!(entity.color, Color::RED);
        assert_eq!(entity.status, EntityStatus::Normal);
        assert_eq!(entity.orientation, Orientation::Right);
        assert_eq!(entity.frames, 1);
        assert!(entity.control.is_empty());
    }

    #[test]
    fn hit_box_is_half_extent_per_axis() {
        let config = EntityConfig::at(Vec2::new(100.0, 50.0)).with_size(Vec2::new(20.0, 10.0));
        let entity = Entity::from_config(EntityId::new(0), StageId::new(0), &config, None);
        assert!(entity.contains(Vec2::new(109.0, 54.0)));
        assert!(!entity.contains(Vec2::new(110.0, 50.0)));
        assert!(!entity.contains(Vec2::new(100.0, 45.0)));
    }

    #[test]
    fn zero_frame_divisor_behaves_like_one() {
        let config = EntityConfig::default().with_frames(0);
        let mut entity = Entity::from_config(EntityId::new(0), StageId::new(0), &config, None);
        entity.record_frame(7);
        assert_eq!(entity.times(), 7);
    }

    #[test]
    fn control_values_are_typed_on_read() {
        let mut control = Control::default();
        assert_eq!(
            control.insert("home", ControlValue::Coord(GridCoord::new(2, 3))),
            None
        );
        let _ = control.insert("facing", ControlValue::Orientation(Orientation::Up));
        assert_eq!(control.coord("home"), Some(GridCoord::new(2, 3)));
        assert_eq!(control.orientation("home"), None);
        assert_eq!(control.orientation("facing"), Some(Orientation::Up));
        assert_eq!(control.iter().count(), 2);
        assert!(control.remove("home").is_some());
        assert_eq!(control.coord("home"), None);
    }
}
