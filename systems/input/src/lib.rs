#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Routes external input events to the entities and stage that registered for them.

use std::{collections::HashMap, fmt};

use gridstage_core::{EntityId, InputEvent, InputKind, StageId};
use gridstage_world::{Entity, Stage, StageContext};
use tracing::trace;

/// Handler invoked for an entity hit by a positioned event.
pub type EntityHandler = Box<dyn FnMut(&mut Entity, &InputEvent)>;

/// Handler invoked for the active stage.
pub type StageHandler = Box<dyn FnMut(&mut StageContext<'_>, &InputEvent)>;

/// Per-engine table of input handlers.
///
/// Entity handlers are keyed by `(kind, stage, entity)` and stage handlers by
/// `(kind, stage)`. Registering a handler for a key that already has one
/// replaces it.
#[derive(Default)]
pub struct InputRouter {
    entity_handlers: HashMap<(InputKind, StageId, EntityId), EntityHandler>,
    stage_handlers: HashMap<(InputKind, StageId), StageHandler>,
}

impl InputRouter {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the handler run when a `kind` event hits `entity` of `stage`.
    pub fn bind_entity<F>(&mut self, kind: InputKind, stage: StageId, entity: EntityId, handler: F)
    where
        F: FnMut(&mut Entity, &InputEvent) + 'static,
    {
        if self
            .entity_handlers
            .insert((kind, stage, entity), Box::new(handler))
            .is_some()
        {
            trace!(?kind, %stage, %entity, "replaced entity input handler");
        }
    }

    /// Registers the handler run for every `kind` event while `stage` is active.
    pub fn bind_stage<F>(&mut self, kind: InputKind, stage: StageId, handler: F)
    where
        F: FnMut(&mut StageContext<'_>, &InputEvent) + 'static,
    {
        if self
            .stage_handlers
            .insert((kind, stage), Box::new(handler))
            .is_some()
        {
            trace!(?kind, %stage, "replaced stage input handler");
        }
    }

    /// Removes the entity handler for the key, reporting whether one existed.
    pub fn unbind_entity(&mut self, kind: InputKind, stage: StageId, entity: EntityId) -> bool {
        self.entity_handlers
            .remove(&(kind, stage, entity))
            .is_some()
    }

    /// Removes the stage handler for the key, reporting whether one existed.
    pub fn unbind_stage(&mut self, kind: InputKind, stage: StageId) -> bool {
        self.stage_handlers.remove(&(kind, stage)).is_some()
    }

    /// Reports whether an entity handler is registered for the key.
    #[must_use]
    pub fn has_entity_handler(&self, kind: InputKind, stage: StageId, entity: EntityId) -> bool {
        self.entity_handlers.contains_key(&(kind, stage, entity))
    }

    /// Reports whether a stage handler is registered for the key.
    #[must_use]
    pub fn has_stage_handler(&self, kind: InputKind, stage: StageId) -> bool {
        self.stage_handlers.contains_key(&(kind, stage))
    }

    /// Delivers an event to `stage` and returns how many handlers ran.
    ///
    /// Positioned events first reach every entity whose hit box contains the
    /// point and that has a handler for the event kind, in entity order. The
    /// stage handler for the kind runs last, for every event.
    pub fn dispatch(&mut self, stage: &mut Stage, event: &InputEvent, frame: u64) -> usize {
        let stage_id = stage.id();
        let mut invoked = 0;

        if let Some(point) = event.position {
            let hits: Vec<EntityId> = stage
                .entities()
                .filter(|entity| entity.contains(point))
                .map(Entity::id)
                .filter(|id| {
                    self.entity_handlers
                        .contains_key(&(event.kind, stage_id, *id))
                })
                .collect();

            for id in hits {
                let handler = self.entity_handlers.get_mut(&(event.kind, stage_id, id));
                if let (Some(handler), Some(entity)) = (handler, stage.entity_mut(id)) {
                    handler(entity, event);
                    invoked += 1;
                }
            }
        }

        if let Some(handler) = self.stage_handlers.get_mut(&(event.kind, stage_id)) {
            handler(&mut stage.context(frame), event);
            invoked += 1;
        }

        trace!(kind = ?event.kind, stage = %stage_id, invoked, "dispatched input event");
        invoked
    }
}

impl fmt::Debug for InputRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputRouter")
            .field("entity_handlers", &self.entity_handlers.len())
            .field("stage_handlers", &self.stage_handlers.len())
            .finish()
    }
}
