#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Macroquad-backed rendering adapter for gridstage.
//!
//! Macroquad's optional audio stack depends on native ALSA development
//! libraries, which are unavailable in the containerised CI environment.
//! To keep `cargo test` usable everywhere we depend on macroquad without its
//! default `audio` feature.
//!
//! The engine draws into a [`PixelSurface`]; every host frame the surface is
//! uploaded to a texture and letterboxed into the window.

use std::sync::mpsc;

use anyhow::{Context, Result};
use glam::Vec2;
use gridstage_core::{InputEvent, InputKind, Key};
use gridstage_rendering::{
    drive_frame, FrameInput, PixelSurface, Presentation, RenderingBackend, SurfaceTransform,
};
use gridstage_system_scheduler::Engine;
use macroquad::{
    color::WHITE,
    input::{
        get_char_pressed, is_key_pressed, is_key_released, is_mouse_button_pressed,
        is_mouse_button_released, mouse_position, KeyCode, MouseButton,
    },
    math::Vec2 as MacroquadVec2,
    texture::{draw_texture_ex, DrawTextureParams, FilterMode, Image, Texture2D},
};
use tracing::{debug, info};

const NAMED_KEYS: [(KeyCode, Key); 7] = [
    (KeyCode::Up, Key::Up),
    (KeyCode::Down, Key::Down),
    (KeyCode::Left, Key::Left),
    (KeyCode::Right, Key::Right),
    (KeyCode::Enter, Key::Enter),
    (KeyCode::Space, Key::Space),
    (KeyCode::Escape, Key::Escape),
];

/// Raw window input observed during one host frame.
#[doc(hidden)]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InputObservations {
    /// Cursor position in window coordinates.
    pub cursor: Vec2,
    /// Cursor position observed on the previous frame.
    pub previous_cursor: Option<Vec2>,
    /// Whether the primary button went down this frame.
    pub pressed: bool,
    /// Whether the primary button went up this frame.
    pub released: bool,
    /// Keys that went down this frame.
    pub keys_down: Vec<Key>,
    /// Keys that went up this frame.
    pub keys_up: Vec<Key>,
}

/// Converts raw observations into surface-space engine events.
///
/// Pointer events come first (move, down, up), then key presses, then key
/// releases.
#[doc(hidden)]
#[must_use]
pub fn frame_input_from_observations(
    transform: &SurfaceTransform,
    observations: &InputObservations,
) -> FrameInput {
    let position = transform.to_surface(observations.cursor);
    let mut events = Vec::new();

    if observations
        .previous_cursor
        .is_some_and(|previous| previous != observations.cursor)
    {
        events.push(InputEvent::pointer(InputKind::PointerMove, position));
    }
    if observations.pressed {
        events.push(InputEvent::pointer(InputKind::PointerDown, position));
    }
    if observations.released {
        events.push(InputEvent::pointer(InputKind::PointerUp, position));
    }
    events.extend(
        observations
            .keys_down
            .iter()
            .map(|key| InputEvent::key(InputKind::KeyDown, *key)),
    );
    events.extend(
        observations
            .keys_up
            .iter()
            .map(|key| InputEvent::key(InputKind::KeyUp, *key)),
    );

    FrameInput { events }
}

fn observe(previous_cursor: Option<Vec2>) -> InputObservations {
    let (cursor_x, cursor_y) = mouse_position();
    let mut keys_down: Vec<Key> = NAMED_KEYS
        .iter()
        .filter(|(code, _)| is_key_pressed(*code))
        .map(|(_, key)| *key)
        .collect();
    while let Some(character) = get_char_pressed() {
        if !character.is_control() {
            keys_down.push(Key::Char(character));
        }
    }
    let keys_up = NAMED_KEYS
        .iter()
        .filter(|(code, _)| is_key_released(*code))
        .map(|(_, key)| *key)
        .collect();

    InputObservations {
        cursor: Vec2::new(cursor_x, cursor_y),
        previous_cursor,
        pressed: is_mouse_button_pressed(MouseButton::Left),
        released: is_mouse_button_released(MouseButton::Left),
        keys_down,
        keys_up,
    }
}

/// Rendering backend implemented on top of macroquad.
#[derive(Debug, Default)]
pub struct MacroquadBackend {
    swap_interval: Option<i32>,
    window_scale: Option<f32>,
}

impl MacroquadBackend {
    /// Returns a backend that requests the platform's default swap interval.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the backend to request a specific swap interval from the platform.
    #[must_use]
    pub fn with_swap_interval(mut self, swap_interval: Option<i32>) -> Self {
        self.swap_interval = swap_interval;
        self
    }

    /// Configures the backend to either synchronise presentation with the display refresh rate
    /// or render as fast as possible.
    #[must_use]
    pub fn with_vsync(self, enabled: bool) -> Self {
        let swap_interval = if enabled { Some(1) } else { Some(0) };
        self.with_swap_interval(swap_interval)
    }

    /// Opens the window at a multiple of the surface size.
    #[must_use]
    pub fn with_window_scale(mut self, scale: f32) -> Self {
        self.window_scale = Some(scale);
        self
    }
}

impl RenderingBackend for MacroquadBackend {
    fn run(self, presentation: Presentation, engine: Engine) -> Result<()> {
        let Self {
            swap_interval,
            window_scale,
        } = self;

        let engine_config = *engine.config();
        let texture_width = u16::try_from(engine_config.width)
            .context("surface width does not fit a macroquad texture")?;
        let texture_height = u16::try_from(engine_config.height)
            .context("surface height does not fit a macroquad texture")?;
        let scale = window_scale.unwrap_or(1.0).max(0.1);

        let mut config = macroquad::window::Conf {
            window_title: presentation.window_title,
            window_width: (f32::from(texture_width) * scale).round() as i32,
            window_height: (f32::from(texture_height) * scale).round() as i32,
            window_resizable: true,
            ..macroquad::window::Conf::default()
        };
        if let Some(swap_interval) = swap_interval {
            config.platform.swap_interval = Some(swap_interval);
        }

        let (result_sender, result_receiver) = mpsc::channel::<Result<()>>();

        macroquad::Window::from_config(config, async move {
            let mut engine = engine;
            let mut surface = PixelSurface::new(engine_config.width, engine_config.height);
            let texture = Texture2D::from_rgba8(texture_width, texture_height, surface.pixels());
            texture.set_filter(FilterMode::Nearest);
            let letterbox = to_macroquad_color(engine_config.background);
            let surface_size = Vec2::new(f32::from(texture_width), f32::from(texture_height));
            let mut previous_cursor = None;
            debug!(
                width = texture_width,
                height = texture_height,
                "macroquad window opened"
            );

            let outcome = loop {
                let window_size = Vec2::new(
                    macroquad::window::screen_width(),
                    macroquad::window::screen_height(),
                );
                let transform = SurfaceTransform::letterbox(surface_size, window_size);
                let observations = observe(previous_cursor);
                previous_cursor = Some(observations.cursor);
                let input = frame_input_from_observations(&transform, &observations);

                if let Err(error) = drive_frame(&mut engine, &mut surface, &input) {
                    break Err(error);
                }
                if !engine.is_running() {
                    info!(frame = engine.frame(), "engine stopped; closing window");
                    break Ok(());
                }

                texture.update(&Image {
                    bytes: surface.pixels().to_vec(),
                    width: texture_width,
                    height: texture_height,
                });
                macroquad::window::clear_background(letterbox);
                let origin = transform.displayed_origin();
                let size = transform.displayed_size();
                draw_texture_ex(
                    texture,
                    origin.x,
                    origin.y,
                    WHITE,
                    DrawTextureParams {
                        dest_size: Some(MacroquadVec2::new(size.x, size.y)),
                        ..DrawTextureParams::default()
                    },
                );

                macroquad::window::next_frame().await;
            };

            let _ = result_sender.send(outcome);
        });

        result_receiver
            .recv()
            .unwrap_or_else(|_| Ok(()))
            .context("macroquad backend failed")
    }
}

fn to_macroquad_color(color: gridstage_core::Color) -> macroquad::color::Color {
    let [red, green, blue, alpha] = color.to_rgba();
    macroquad::color::Color::from_rgba(red, green, blue, alpha)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macroquad_colors_keep_channels() {
        let color = to_macroquad_color(gridstage_core::Color::from_rgba(255, 0, 51, 255));
        assert!((color.r - 1.0).abs() < 1e-6);
        assert!(color.g.abs() < 1e-6);
        assert!((color.b - 0.2).abs() < 1e-6);
        assert!((color.a - 1.0).abs() < 1e-6);
    }

    #[test]
    fn named_keys_are_distinct() {
        for (index, (_, key)) in NAMED_KEYS.iter().enumerate() {
            assert!(NAMED_KEYS
                .iter()
                .skip(index + 1)
                .all(|(_, other)| other != key));
        }
    }
}
