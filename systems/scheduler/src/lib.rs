#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Frame scheduler that owns the stage list and drives the active stage one tick at a time.

use gridstage_core::{
    Color, EngineError, EntityId, InputEvent, InputKind, StageId, StageStatus, Surface,
    Transition,
};
use gridstage_system_input::InputRouter;
use gridstage_world::{Entity, Stage, StageConfig, StageContext};
use tracing::{debug, trace, warn};

/// Surface size and background used by the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Surface width in pixels.
    pub width: u32,
    /// Surface height in pixels.
    pub height: u32,
    /// Color every tick starts from.
    pub background: Color,
}

impl EngineConfig {
    /// Creates a configuration for a surface of the given size.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            background: Color::BLACK,
        }
    }

    /// Sets the background color.
    #[must_use]
    pub const fn with_background(mut self, background: Color) -> Self {
        self.background = background;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(960, 640)
    }
}

/// Whether the host should keep scheduling ticks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RunState {
    /// Ticks are ignored.
    #[default]
    Stopped,
    /// Every tick advances the frame counter.
    Running,
}

/// Result of a single [`Engine::tick`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// The engine was stopped; nothing happened.
    Stopped,
    /// The frame was counted but the stage hook skipped updating and drawing,
    /// or no stage was active.
    Skipped {
        /// Frame counter of the tick.
        frame: u64,
    },
    /// Maps and entities were updated and drawn.
    Drawn {
        /// Frame counter of the tick.
        frame: u64,
    },
}

/// Owns the stages, the active index, the run state and the input table.
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    stages: Vec<Stage>,
    active: Option<StageId>,
    state: RunState,
    frame: u64,
    input: InputRouter,
}

impl Engine {
    /// Creates a stopped engine without stages.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            stages: Vec::new(),
            active: None,
            state: RunState::Stopped,
            frame: 0,
            input: InputRouter::new(),
        }
    }

    /// Surface size and background.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current run state.
    #[must_use]
    pub const fn state(&self) -> RunState {
        self.state
    }

    /// Reports whether the host should schedule another tick.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == RunState::Running
    }

    /// Frame counter of the most recent tick since the last start.
    #[must_use]
    pub const fn frame(&self) -> u64 {
        self.frame
    }

    /// Appends an inactive stage and returns its index.
    pub fn create_stage(&mut self, config: StageConfig) -> StageId {
        let id = StageId::new(u32::try_from(self.stages.len()).unwrap_or(u32::MAX));
        self.stages.push(Stage::new(id, config));
        debug!(stage = %id, "created stage");
        id
    }

    /// Every stage in creation order.
    pub fn stages(&self) -> impl Iterator<Item = &Stage> {
        self.stages.iter()
    }

    /// Stage with the provided index.
    #[must_use]
    pub fn stage(&self, id: StageId) -> Option<&Stage> {
        self.stages.get(id.index())
    }

    /// Mutable access to the stage with the provided index.
    pub fn stage_mut(&mut self, id: StageId) -> Option<&mut Stage> {
        self.stages.get_mut(id.index())
    }

    /// Index of the active stage; `None` before the first selection.
    #[must_use]
    pub const fn active_stage_id(&self) -> Option<StageId> {
        self.active
    }

    /// The active stage, if one was selected.
    #[must_use]
    pub fn active_stage(&self) -> Option<&Stage> {
        self.active.and_then(|id| self.stage(id))
    }

    /// Mutable access to the active stage.
    pub fn active_stage_mut(&mut self) -> Option<&mut Stage> {
        let id = self.active?;
        self.stage_mut(id)
    }

    /// Makes `id` the active stage.
    ///
    /// The previous stage becomes inactive; the new one is set to normal and
    /// fully reset. An unknown index leaves everything untouched.
    pub fn set_stage(&mut self, id: StageId) -> Result<&mut Stage, EngineError> {
        if id.index() >= self.stages.len() {
            return Err(EngineError::UnknownStage { stage: id });
        }

        if let Some(previous) = self.active_stage_mut() {
            previous.set_status(StageStatus::Inactive);
        }
        self.active = Some(id);
        debug!(stage = %id, "activated stage");

        let stage = self
            .stages
            .get_mut(id.index())
            .ok_or(EngineError::UnknownStage { stage: id })?;
        stage.set_status(StageStatus::Normal);
        stage.reset();
        Ok(stage)
    }

    /// Activates the stage after the active one.
    ///
    /// Before any stage was selected this activates the first stage. Fails
    /// without side effects when the active stage is the last.
    pub fn next_stage(&mut self) -> Result<&mut Stage, EngineError> {
        let next = match self.active {
            Some(current) => {
                let next = StageId::new(current.get().saturating_add(1));
                if next.index() >= self.stages.len() {
                    return Err(EngineError::NoFurtherStage { current });
                }
                next
            }
            None if self.stages.is_empty() => return Err(EngineError::NoStages),
            None => StageId::new(0),
        };
        self.set_stage(next)
    }

    /// Activates and resets the first stage, then starts the engine.
    pub fn init(&mut self) -> Result<(), EngineError> {
        if self.stages.is_empty() {
            return Err(EngineError::NoStages);
        }
        let _ = self.set_stage(StageId::new(0))?;
        self.start();
        Ok(())
    }

    /// Starts the frame loop; the next tick is frame 1. No-op while running.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }
        self.state = RunState::Running;
        self.frame = 0;
        debug!("engine started");
    }

    /// Stops the frame loop. Stopping a stopped engine does nothing.
    pub fn stop(&mut self) {
        if !self.is_running() {
            return;
        }
        self.state = RunState::Stopped;
        debug!(frame = self.frame, "engine stopped");
    }

    /// Runs one frame of the active stage onto `surface`.
    ///
    /// Transitions requested during the tick are applied once it completes;
    /// the first one that fails is returned as the error and the rest are
    /// dropped.
    pub fn tick(&mut self, surface: &mut dyn Surface) -> Result<TickOutcome, EngineError> {
        if !self.is_running() {
            return Ok(TickOutcome::Stopped);
        }

        surface.clear(self.config.background);
        self.frame += 1;
        let frame = self.frame;
        trace!(frame, "tick");

        let Some(stage) = self.active_stage_mut() else {
            return Ok(TickOutcome::Skipped { frame });
        };
        let report = stage.tick(frame, surface);

        self.apply_transitions(report.transitions)?;
        Ok(if report.drawn {
            TickOutcome::Drawn { frame }
        } else {
            TickOutcome::Skipped { frame }
        })
    }

    /// Registers an entity input handler.
    pub fn bind_entity<F>(&mut self, kind: InputKind, stage: StageId, entity: EntityId, handler: F)
    where
        F: FnMut(&mut Entity, &InputEvent) + 'static,
    {
        self.input.bind_entity(kind, stage, entity, handler);
    }

    /// Registers a stage input handler.
    pub fn bind_stage<F>(&mut self, kind: InputKind, stage: StageId, handler: F)
    where
        F: FnMut(&mut StageContext<'_>, &InputEvent) + 'static,
    {
        self.input.bind_stage(kind, stage, handler);
    }

    /// Input handler table.
    pub fn input_mut(&mut self) -> &mut InputRouter {
        &mut self.input
    }

    /// Delivers an event to the active stage and returns how many handlers ran.
    ///
    /// Transitions requested by stage handlers are applied immediately after.
    pub fn dispatch(&mut self, event: &InputEvent) -> Result<usize, EngineError> {
        let frame = self.frame;
        let Some(id) = self.active else {
            return Ok(0);
        };
        let Some(stage) = self.stages.get_mut(id.index()) else {
            return Ok(0);
        };

        let invoked = self.input.dispatch(stage, event, frame);
        let transitions = stage.take_transitions();
        self.apply_transitions(transitions)?;
        Ok(invoked)
    }

    fn apply_transitions(&mut self, transitions: Vec<Transition>) -> Result<(), EngineError> {
        for transition in transitions {
            let result = match transition {
                Transition::Next => self.next_stage().map(|_| ()),
                Transition::Goto(id) => self.set_stage(id).map(|_| ()),
                Transition::Stop => {
                    self.stop();
                    Ok(())
                }
            };
            if let Err(error) = result {
                warn!(?transition, %error, "stage transition failed");
                return Err(error);
            }
        }
        Ok(())
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
