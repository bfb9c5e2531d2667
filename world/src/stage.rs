//! Stages own the maps and entities of one scene.

use std::fmt;

use gridstage_core::{
    EngineError, EntityId, EntityKind, MapId, StageId, StageStatus, Transition, UpdateSignal,
};
use tracing::debug;

use crate::{
    entity::{Entity, EntityBehavior, EntityConfig},
    grid::{GridMap, MapBehavior, MapConfig},
};

/// Per-tick hook run before a stage updates its maps and entities.
///
/// Returning [`UpdateSignal::Skip`] ends the tick without touching maps or
/// entities. Closures taking a `&mut StageContext<'_>` implement the trait.
pub trait StageHook: CloneStageHook {
    /// Inspects or adjusts the stage and decides whether the tick proceeds.
    fn update(&mut self, context: &mut StageContext<'_>) -> UpdateSignal;
}

/// Object-safe cloning for boxed stage hooks.
pub trait CloneStageHook {
    /// Clones the hook into a new box.
    fn clone_box(&self) -> Box<dyn StageHook>;
}

impl<T> CloneStageHook for T
where
    T: StageHook + Clone + 'static,
{
    fn clone_box(&self) -> Box<dyn StageHook> {
        Box::new(self.clone())
    }
}

impl Clone for Box<dyn StageHook> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

impl<F> StageHook for F
where
    F: FnMut(&mut StageContext<'_>) -> UpdateSignal + Clone + 'static,
{
    fn update(&mut self, context: &mut StageContext<'_>) -> UpdateSignal {
        self(context)
    }
}

/// Hook that always lets the tick proceed.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProceedHook;

impl StageHook for ProceedHook {
    fn update(&mut self, _context: &mut StageContext<'_>) -> UpdateSignal {
        UpdateSignal::Proceed
    }
}

/// Construction parameters for a [`Stage`].
#[derive(Clone)]
pub struct StageConfig {
    /// Countdown restored on every reset.
    pub timeout: u32,
    /// Hook template; reset installs a fresh clone.
    pub hook: Box<dyn StageHook>,
}

impl StageConfig {
    /// Sets the countdown restored on reset.
    #[must_use]
    pub fn with_timeout(mut self, timeout: u32) -> Self {
        self.timeout = timeout;
        self
    }

    /// Attaches the stage hook.
    #[must_use]
    pub fn with_hook(mut self, hook: impl StageHook + 'static) -> Self {
        self.hook = Box::new(hook);
        self
    }
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            timeout: 0,
            hook: Box::new(ProceedHook),
        }
    }
}

impl fmt::Debug for StageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageConfig")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

pub(crate) struct MapSlot {
    pub(crate) map: GridMap,
    pub(crate) behavior: Box<dyn MapBehavior>,
    pub(crate) config: MapConfig,
}

impl MapSlot {
    fn reset(&mut self) {
        self.map.restore(&self.config);
        self.behavior = self.config.behavior.clone();
    }
}

pub(crate) struct EntitySlot {
    pub(crate) entity: Entity,
    pub(crate) behavior: Box<dyn EntityBehavior>,
    pub(crate) config: EntityConfig,
}

impl EntitySlot {
    fn reset(&mut self, maps: &[MapSlot]) {
        let map = bound_map(maps, self.config.location);
        self.entity = Entity::from_config(self.entity.id(), self.entity.stage(), &self.config, map);
        self.behavior = self.config.behavior.clone();
    }
}

fn bound_map(maps: &[MapSlot], location: Option<MapId>) -> Option<&GridMap> {
    location.and_then(|id| maps.get(id.index()).map(|slot| &slot.map))
}

/// Self-contained scene owning ordered maps and entities.
pub struct Stage {
    id: StageId,
    pub(crate) status: StageStatus,
    pub(crate) timeout: u32,
    config: StageConfig,
    pub(crate) hook: Box<dyn StageHook>,
    pub(crate) maps: Vec<MapSlot>,
    pub(crate) entities: Vec<EntitySlot>,
    pub(crate) pending: Vec<Transition>,
}

impl Stage {
    /// Creates an inactive stage with no maps or entities.
    #[must_use]
    pub fn new(id: StageId, config: StageConfig) -> Self {
        Self {
            id,
            status: StageStatus::Inactive,
            timeout: config.timeout,
            hook: config.hook.clone(),
            config,
            maps: Vec::new(),
            entities: Vec::new(),
            pending: Vec::new(),
        }
    }

    /// Index assigned by the engine.
    #[must_use]
    pub const fn id(&self) -> StageId {
        self.id
    }

    /// Current lifecycle status.
    #[must_use]
    pub const fn status(&self) -> StageStatus {
        self.status
    }

    /// Overrides the lifecycle status.
    pub fn set_status(&mut self, status: StageStatus) {
        self.status = status;
    }

    /// Remaining countdown.
    #[must_use]
    pub const fn timeout(&self) -> u32 {
        self.timeout
    }

    /// Overrides the countdown.
    pub fn set_timeout(&mut self, timeout: u32) {
        self.timeout = timeout;
    }

    /// Builds a map from the template and appends it.
    pub fn create_map(&mut self, config: MapConfig) -> MapId {
        let id = MapId::new(dense_index(self.maps.len()));
        let map = GridMap::from_config(id, &config);
        debug!(
            stage = %self.id,
            map = %id,
            width = map.x_length(),
            height = map.y_length(),
            cache = map.is_cached(),
            "created map"
        );
        self.maps.push(MapSlot {
            map,
            behavior: config.behavior.clone(),
            config,
        });
        id
    }

    /// Builds an entity from the config and appends it.
    ///
    /// Bound entities are placed at the center of their starting tile.
    pub fn create_entity(&mut self, config: EntityConfig) -> Result<EntityId, EngineError> {
        if let Some(map) = config.location {
            if map.index() >= self.maps.len() {
                return Err(EngineError::UnknownMap { map });
            }
        }

        let id = EntityId::new(dense_index(self.entities.len()));
        let entity = Entity::from_config(
            id,
            self.id,
            &config,
            bound_map(&self.maps, config.location),
        );
        debug!(stage = %self.id, entity = %id, kind = ?entity.kind, "created entity");
        self.entities.push(EntitySlot {
            entity,
            behavior: config.behavior.clone(),
            config,
        });
        Ok(id)
    }

    /// Map with the provided id.
    #[must_use]
    pub fn map(&self, id: MapId) -> Option<&GridMap> {
        self.maps.get(id.index()).map(|slot| &slot.map)
    }

    /// Mutable access to the map with the provided id.
    pub fn map_mut(&mut self, id: MapId) -> Option<&mut GridMap> {
        self.maps.get_mut(id.index()).map(|slot| &mut slot.map)
    }

    /// Every map in creation order.
    pub fn maps(&self) -> impl Iterator<Item = &GridMap> {
        self.maps.iter().map(|slot| &slot.map)
    }

    /// Entity with the provided id.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id.index()).map(|slot| &slot.entity)
    }

    /// Mutable access to the entity with the provided id.
    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(id.index()).map(|slot| &mut slot.entity)
    }

    /// Every entity in creation order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter().map(|slot| &slot.entity)
    }

    /// Entities of the given kind in creation order.
    pub fn entities_by_kind(&self, kind: EntityKind) -> impl Iterator<Item = &Entity> {
        self.entities().filter(move |entity| entity.kind == kind)
    }

    /// Restores the stage to its constructed state.
    ///
    /// Status becomes normal, the countdown and hook come from the stage
    /// config, then entities and maps are rebuilt in that order.
    pub fn reset(&mut self) {
        self.status = StageStatus::Normal;
        self.timeout = self.config.timeout;
        self.hook = self.config.hook.clone();
        self.pending.clear();
        self.reset_entities();
        self.reset_maps();
        debug!(stage = %self.id, "reset stage");
    }

    /// Rebuilds every entity from its config.
    pub fn reset_entities(&mut self) {
        let maps = &self.maps;
        for slot in &mut self.entities {
            slot.reset(maps);
        }
    }

    /// Restores every map's template tiles and clears cached snapshots.
    pub fn reset_maps(&mut self) {
        for slot in &mut self.maps {
            slot.reset();
        }
    }

    /// Context for adjusting the stage outside the frame loop, such as from
    /// an input handler. Requested transitions queue until
    /// [`Stage::take_transitions`].
    pub fn context(&mut self, frame: u64) -> StageContext<'_> {
        StageContext {
            frame,
            stage: self.id,
            status: &mut self.status,
            timeout: &mut self.timeout,
            maps: &mut self.maps,
            entities: &mut self.entities,
            pending: &mut self.pending,
        }
    }

    pub(crate) fn run_hook(&mut self, frame: u64) -> UpdateSignal {
        let mut context = StageContext {
            frame,
            stage: self.id,
            status: &mut self.status,
            timeout: &mut self.timeout,
            maps: &mut self.maps,
            entities: &mut self.entities,
            pending: &mut self.pending,
        };
        self.hook.update(&mut context)
    }

    /// Drains transitions requested since the last call.
    pub fn take_transitions(&mut self) -> Vec<Transition> {
        std::mem::take(&mut self.pending)
    }
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("id", &self.id)
            .field("status", &self.status)
            .field("timeout", &self.timeout)
            .field("maps", &self.maps.len())
            .field("entities", &self.entities.len())
            .finish_non_exhaustive()
    }
}

fn dense_index(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

/// Mutable view of a stage handed to hooks and input handlers.
pub struct StageContext<'a> {
    frame: u64,
    stage: StageId,
    status: &'a mut StageStatus,
    timeout: &'a mut u32,
    maps: &'a mut [MapSlot],
    entities: &'a mut [EntitySlot],
    pending: &'a mut Vec<Transition>,
}

impl StageContext<'_> {
    /// Frame counter of the running tick.
    #[must_use]
    pub const fn frame(&self) -> u64 {
        self.frame
    }

    /// Stage being driven.
    #[must_use]
    pub const fn stage(&self) -> StageId {
        self.stage
    }

    /// Current stage status.
    #[must_use]
    pub fn status(&self) -> StageStatus {
        *self.status
    }

    /// Overrides the stage status, e.g. to pause entity updates.
    pub fn set_status(&mut self, status: StageStatus) {
        *self.status = status;
    }

    /// Remaining stage countdown.
    #[must_use]
    pub fn timeout(&self) -> u32 {
        *self.timeout
    }

    /// Overrides the stage countdown.
    pub fn set_timeout(&mut self, timeout: u32) {
        *self.timeout = timeout;
    }

    /// Map with the provided id.
    #[must_use]
    pub fn map(&self, id: MapId) -> Option<&GridMap> {
        self.maps.get(id.index()).map(|slot| &slot.map)
    }

    /// Mutable access to the map with the provided id.
    pub fn map_mut(&mut self, id: MapId) -> Option<&mut GridMap> {
        self.maps.get_mut(id.index()).map(|slot| &mut slot.map)
    }

    /// Entity with the provided id.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id.index()).map(|slot| &slot.entity)
    }

    /// Mutable access to the entity with the provided id.
    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities
            .get_mut(id.index())
            .map(|slot| &mut slot.entity)
    }

    /// Every entity in creation order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter().map(|slot| &slot.entity)
    }

    /// Entities of the given kind in creation order.
    pub fn entities_by_kind(&self, kind: EntityKind) -> impl Iterator<Item = &Entity> {
        self.entities().filter(move |entity| entity.kind == kind)
    }

    /// Queues a stage transition for the engine to apply after the tick.
    pub fn request(&mut self, transition: Transition) {
        self.pending.push(transition);
    }
}

impl fmt::Debug for StageContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageContext")
            .field("frame", &self.frame)
            .field("stage", &self.stage)
            .field("status", &self.status)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec2;
    use gridstage_core::{EntityStatus, GridCoord};

    use super::*;
    use crate::grid::TileGrid;

    fn stage_with_map() -> (Stage, MapId) {
        let mut stage = Stage::new(StageId::new(0), StageConfig::default().with_timeout(4));
        let map = stage.create_map(
            MapConfig::new(TileGrid::filled(5, 5, 0)).with_origin(Vec2::new(100.0, 0.0)),
        );
        (stage, map)
    }

    #[test]
    fn new_stages_start_inactive() {
        let (stage, _) = stage_with_map();
        assert_eq!(stage.status(), StageStatus::Inactive);
        assert_eq!(stage.timeout(), 4);
    }

    #[test]
    fn indices_are_dense_and_sequential() {
        let (mut stage, map) = stage_with_map();
        let second = stage.create_map(MapConfig::new(TileGrid::filled(1, 1, 0)));
        assert_eq!(map, MapId::new(0));
        assert_eq!(second, MapId::new(1));

        let ids: Vec<_> = (0..3)
            .map(|_| stage.create_entity(EntityConfig::default()))
            .collect::<Result<_, _>>()
            .expect("unbound entities");
        assert_eq!(ids, vec![EntityId::new(0), EntityId::new(1), EntityId::new(2)]);
    }

    #[test]
    fn bound_entities_start_on_their_tile_center() {
        let (mut stage, map) = stage_with_map();
        let id = stage
            .create_entity(EntityConfig::on_map(map, GridCoord::new(2, 1)))
            .expect("bound entity");
        let entity = stage.entity(id).expect("entity exists");
        assert_eq!(entity.position, Vec2::new(150.0, 30.0));
        assert_eq!(entity.stage(), stage.id());
    }

    #[test]
    fn binding_to_missing_map_fails() {
        let (mut stage, _) = stage_with_map();
        let missing = MapId::new(3);
        let error = stage
            .create_entity(EntityConfig::on_map(missing, GridCoord::new(0, 0)))
            .expect_err("map 3 does not exist");
        assert_eq!(error, EngineError::UnknownMap { map: missing });
        assert_eq!(stage.entities().count(), 0);
    }

    #[test]
    fn entities_by_kind_keeps_list_order() {
        let (mut stage, _) = stage_with_map();
        for kind in [
            EntityKind::Program,
            EntityKind::Player,
            EntityKind::Program,
            EntityKind::Free,
        ] {
            let _ = stage
                .create_entity(EntityConfig::default().with_kind(kind))
                .expect("unbound entity");
        }
        let programs: Vec<_> = stage
            .entities_by_kind(EntityKind::Program)
            .map(Entity::id)
            .collect();
        assert_eq!(programs, vec![EntityId::new(0), EntityId::new(2)]);
    }

    #[test]
    fn reset_restores_entities_maps_and_status() {
        let (mut stage, map) = stage_with_map();
        let id = stage
            .create_entity(
                EntityConfig::on_map(map, GridCoord::new(1, 1)).with_size(Vec2::new(8.0, 8.0)),
            )
            .expect("bound entity");

        {
            let entity = stage.entity_mut(id).expect("entity exists");
            entity.position = Vec2::new(-50.0, 900.0);
            entity.size = Vec2::ONE;
            entity.timeout = 99;
            entity.status = EntityStatus::Paused;
        }
        stage.map_mut(map).expect("map exists").set(3, 3, 1);
        stage.set_timeout(0);
        stage.set_status(StageStatus::Paused);

        stage.reset();

        let entity = stage.entity(id).expect("entity exists");
        assert_eq!(entity.position, Vec2::new(130.0, 30.0));
        assert_eq!(entity.size, Vec2::new(8.0, 8.0));
        assert_eq!(entity.timeout, 0);
        assert_eq!(entity.status, EntityStatus::Normal);
        assert_eq!(stage.map(map).expect("map exists").get(3, 3), 0);
        assert_eq!(stage.status(), StageStatus::Normal);
        assert_eq!(stage.timeout(), 4);
    }

    #[test]
    fn context_requests_queue_until_taken() {
        let (mut stage, _) = stage_with_map();
        {
            let mut context = stage.context(7);
            assert_eq!(context.frame(), 7);
            context.set_timeout(1);
            context.request(Transition::Next);
            context.request(Transition::Stop);
        }
        assert_eq!(stage.timeout(), 1);
        assert_eq!(
            stage.take_transitions(),
            vec![Transition::Next, Transition::Stop]
        );
        assert!(stage.take_transitions().is_empty());
    }
}
