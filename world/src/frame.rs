//! One tick of a stage: hook, maps, then entities.

use gridstage_core::{EntityStatus, StageStatus, Surface, Transition, UpdateSignal};
use tracing::trace;

use crate::{entity::SceneView, stage::Stage};

/// What happened during [`Stage::tick`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// `false` when the stage hook skipped the tick.
    pub drawn: bool,
    /// Transitions requested during the tick, in request order.
    pub transitions: Vec<Transition>,
}

impl Stage {
    /// Runs one tick with the provided frame counter.
    ///
    /// The surface is expected to already hold the background. The countdown
    /// drops first, then the hook may skip the rest of the tick. Maps are
    /// processed before entities and both in creation order.
    pub fn tick(&mut self, frame: u64, surface: &mut dyn Surface) -> FrameReport {
        self.timeout = self.timeout.saturating_sub(1);

        let stage = self.id();
        if self.run_hook(frame) == UpdateSignal::Skip {
            trace!(%stage, frame, "stage hook skipped tick");
            return FrameReport {
                drawn: false,
                transitions: self.take_transitions(),
            };
        }

        self.tick_maps(frame, surface);
        self.tick_entities(frame, surface);

        FrameReport {
            drawn: true,
            transitions: self.take_transitions(),
        }
    }

    fn tick_maps(&mut self, frame: u64, surface: &mut dyn Surface) {
        for slot in &mut self.maps {
            slot.map.record_frame(frame);
            if !slot.map.is_cached() {
                slot.behavior.update(&mut slot.map);
                slot.behavior.draw(&slot.map, surface);
                continue;
            }

            match slot.map.snapshot() {
                Some(snapshot) => surface.restore(snapshot),
                None => {
                    slot.behavior.draw(&slot.map, surface);
                    slot.map.store_snapshot(surface.snapshot());
                    trace!(map = %slot.map.id(), frame, "cached map snapshot");
                }
            }
        }
    }

    fn tick_entities(&mut self, frame: u64, surface: &mut dyn Surface) {
        let stage = self.id();
        let status = self.status;
        let maps = &mut self.maps;
        for index in 0..self.entities.len() {
            let (before, rest) = self.entities.split_at_mut(index);
            let Some((slot, after)) = rest.split_first_mut() else {
                break;
            };

            slot.entity.record_frame(frame);
            if status == StageStatus::Normal && slot.entity.status != EntityStatus::Paused {
                let bound = slot
                    .entity
                    .location
                    .and_then(|id| maps.get(id.index()))
                    .map(|map| map.map.surface_to_coord(slot.entity.position));
                if let Some(location) = bound {
                    slot.entity.coord = location.coord;
                    slot.entity.offset = location.offset;
                }
                slot.entity.tick_timeout();

                let mut scene =
                    SceneView::new(frame, stage, status, maps.as_mut_slice(), before, after);
                slot.behavior.update(&mut slot.entity, &mut scene);
            }
            slot.behavior.draw(&slot.entity, surface);
        }
    }
}
