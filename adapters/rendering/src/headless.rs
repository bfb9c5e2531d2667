use std::collections::BTreeMap;

use anyhow::Result as AnyResult;
use gridstage_core::{InputEvent, Surface};
use gridstage_system_scheduler::{Engine, TickOutcome};
use tracing::info;

use crate::{drive_frame, FrameInput, PixelSurface, Presentation, RenderingBackend};

/// Totals reported after a headless run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeadlessSummary {
    /// Host frames that ticked a running engine.
    pub ticks: u64,
    /// Ticks that updated and drew the active stage.
    pub drawn: u64,
    /// Ticks skipped by the stage hook or without an active stage.
    pub skipped: u64,
    /// Whether the engine stopped before the frame budget ran out.
    pub stopped_early: bool,
}

/// Backend that ticks the engine a fixed number of times onto a [`PixelSurface`].
///
/// Scripted events are delivered before the host frame they are scheduled for.
#[derive(Clone, Debug, Default)]
pub struct HeadlessBackend {
    frames: u64,
    script: BTreeMap<u64, Vec<InputEvent>>,
}

impl HeadlessBackend {
    /// Creates a backend that runs at most `frames` host frames.
    #[must_use]
    pub fn new(frames: u64) -> Self {
        Self {
            frames,
            script: BTreeMap::new(),
        }
    }

    /// Schedules an event before host frame `frame` (1-based).
    #[must_use]
    pub fn with_event(mut self, frame: u64, event: InputEvent) -> Self {
        self.script.entry(frame).or_default().push(event);
        self
    }

    /// Drives the engine onto `surface` until it stops or the budget runs out.
    pub fn drive(
        &mut self,
        engine: &mut Engine,
        surface: &mut dyn Surface,
    ) -> AnyResult<HeadlessSummary> {
        let mut summary = HeadlessSummary::default();
        for frame in 1..=self.frames {
            if !engine.is_running() {
                summary.stopped_early = true;
                break;
            }

            let input = FrameInput {
                events: self.script.remove(&frame).unwrap_or_default(),
            };
            match drive_frame(engine, surface, &input)? {
                TickOutcome::Drawn { .. } => summary.drawn += 1,
                TickOutcome::Skipped { .. } => summary.skipped += 1,
                TickOutcome::Stopped => {}
            }
            summary.ticks += 1;
        }
        Ok(summary)
    }
}

impl RenderingBackend for HeadlessBackend {
    fn run(mut self, presentation: Presentation, mut engine: Engine) -> AnyResult<()> {
        let config = *engine.config();
        let mut surface = PixelSurface::new(config.width, config.height);
        let summary = self.drive(&mut engine, &mut surface)?;
        info!(
            title = %presentation.window_title,
            ticks = summary.ticks,
            drawn = summary.drawn,
            skipped = summary.skipped,
            stopped_early = summary.stopped_early,
            "headless run finished"
        );
        Ok(())
    }
}
