#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Shared rendering contracts for gridstage adapters.
//!
//! Backends own the frame cadence: each host frame they gather input, convert
//! it into surface space with a [`SurfaceTransform`], and call [`drive_frame`]
//! while the engine is running.

mod headless;
mod pixel;

use anyhow::{Context, Result as AnyResult};
use glam::Vec2;
use gridstage_core::{InputEvent, Surface};
use gridstage_system_scheduler::{Engine, TickOutcome};

pub use headless::{HeadlessBackend, HeadlessSummary};
pub use pixel::PixelSurface;

/// Presentation settings consumed by rendering backends.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Presentation {
    /// Title used by the created window.
    pub window_title: String,
}

impl Presentation {
    /// Constructs a new presentation descriptor.
    #[must_use]
    pub fn new<T>(window_title: T) -> Self
    where
        T: Into<String>,
    {
        Self {
            window_title: window_title.into(),
        }
    }
}

/// Input gathered by an adapter for one host frame, already in surface space.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameInput {
    /// Events in the order they were observed.
    pub events: Vec<InputEvent>,
}

impl FrameInput {
    /// Reports whether nothing was observed this frame.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Rendering backend capable of driving an engine.
pub trait RenderingBackend {
    /// Runs the engine until it stops or the backend is asked to exit.
    ///
    /// The engine is expected to be initialised already.
    fn run(self, presentation: Presentation, engine: Engine) -> AnyResult<()>;
}

/// Dispatches a frame's input, then ticks the engine once.
pub fn drive_frame(
    engine: &mut Engine,
    surface: &mut dyn Surface,
    input: &FrameInput,
) -> AnyResult<TickOutcome> {
    for event in &input.events {
        let _ = engine
            .dispatch(event)
            .with_context(|| format!("failed to dispatch {:?} event", event.kind))?;
    }

    engine
        .tick(surface)
        .with_context(|| format!("engine tick after frame {} failed", engine.frame()))
}

/// Maps host window coordinates into surface space.
///
/// The surface is displayed as a rectangle at `displayed_origin` with size
/// `displayed_size`; a client point maps to
/// `(client - displayed_origin) * surface_size / displayed_size`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceTransform {
    surface_size: Vec2,
    displayed_origin: Vec2,
    displayed_size: Vec2,
}

impl SurfaceTransform {
    /// Creates a transform for a surface shown at the given window rectangle.
    #[must_use]
    pub const fn new(surface_size: Vec2, displayed_origin: Vec2, displayed_size: Vec2) -> Self {
        Self {
            surface_size,
            displayed_origin,
            displayed_size,
        }
    }

    /// Surface shown unscaled at the window origin.
    #[must_use]
    pub const fn identity(surface_size: Vec2) -> Self {
        Self::new(surface_size, Vec2::ZERO, surface_size)
    }

    /// Largest aspect-preserving placement of the surface centered in the window.
    #[must_use]
    pub fn letterbox(surface_size: Vec2, window_size: Vec2) -> Self {
        if surface_size.x <= 0.0 || surface_size.y <= 0.0 {
            return Self::identity(surface_size);
        }

        let scale = (window_size.x / surface_size.x)
            .min(window_size.y / surface_size.y)
            .max(0.0);
        let displayed_size = surface_size * scale;
        Self::new(
            surface_size,
            (window_size - displayed_size) / 2.0,
            displayed_size,
        )
    }

    /// Window position of the surface's upper-left corner.
    #[must_use]
    pub const fn displayed_origin(&self) -> Vec2 {
        self.displayed_origin
    }

    /// Size of the surface as shown in the window.
    #[must_use]
    pub const fn displayed_size(&self) -> Vec2 {
        self.displayed_size
    }

    /// Converts a window point into surface space.
    ///
    /// Axes with a collapsed displayed size are left unscaled.
    #[must_use]
    pub fn to_surface(&self, client: Vec2) -> Vec2 {
        let relative = client - self.displayed_origin;
        Vec2::new(
            scale_axis(relative.x, self.surface_size.x, self.displayed_size.x),
            scale_axis(relative.y, self.surface_size.y, self.displayed_size.y),
        )
    }
}

fn scale_axis(value: f32, surface: f32, displayed: f32) -> f32 {
    if displayed.abs() <= f32::EPSILON {
        value
    } else {
        value * surface / displayed
    }
}
