#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the gridstage engine.
//!
//! This crate defines the vocabulary that connects the authoritative world
//! (stages, maps and entities), the frame scheduler, input routing and the
//! rendering adapters. Behaviours draw through the [`Surface`] contract and
//! never learn how frames reach the screen; hosts feed [`InputEvent`] values
//! into the engine and present whatever the surface accumulated.

use std::fmt;

use glam::Vec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tile value reported for lookups outside a grid's declared rectangle.
pub const OFF_GRID: i32 = -1;

/// Tile value marking a walkable tile. Any positive value blocks movement.
pub const WALKABLE: i32 = 0;

/// Location of a single tile expressed as column and row indices.
///
/// Coordinates are signed because surface positions left of or above a map
/// origin floor to negative indices, and the pathfinder probes one tile past
/// each edge before wrapping.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct GridCoord {
    x: i32,
    y: i32,
}

impl GridCoord {
    /// Creates a new tile coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Zero-based column index.
    #[must_use]
    pub const fn x(&self) -> i32 {
        self.x
    }

    /// Zero-based row index.
    #[must_use]
    pub const fn y(&self) -> i32 {
        self.y
    }

    /// Coordinate displaced by the provided column and row deltas, saturating at the `i32` range.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x.saturating_add(dx), self.y.saturating_add(dy))
    }

    /// Computes the Manhattan distance between two coordinates.
    #[must_use]
    pub fn manhattan_distance(self, other: GridCoord) -> u32 {
        self.x
            .abs_diff(other.x)
            .saturating_add(self.y.abs_diff(other.y))
    }
}

impl fmt::Display for GridCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Index assigned to a stage when the engine creates it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StageId(u32);

impl StageId {
    /// Creates a new stage identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Position of the stage within the engine's stage list.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stage #{}", self.0)
    }
}

/// Index assigned to an entity by its owning stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(u32);

impl EntityId {
    /// Creates a new entity identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Position of the entity within its stage's entity list.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity #{}", self.0)
    }
}

/// Index assigned to a grid map by its owning stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MapId(u32);

impl MapId {
    /// Creates a new map identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Position of the map within its stage's map list.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for MapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "map #{}", self.0)
    }
}

/// Role tag distinguishing how an entity is driven.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// Free-standing object that is neither player nor program controlled.
    #[default]
    Free,
    /// Object steered by player input.
    Player,
    /// Object steered by its own behaviour.
    Program,
}

/// Lifecycle status of an entity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityStatus {
    /// Inactive or finished.
    Inactive,
    /// Updated and drawn every tick.
    #[default]
    Normal,
    /// Drawn but not advanced.
    Paused,
    /// Temporary state owned by the entity's behaviour.
    Transient,
    /// Abnormal state owned by the entity's behaviour.
    Abnormal,
}

/// Lifecycle status of a stage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    /// Not selected, or finished.
    #[default]
    Inactive,
    /// Entities advance every tick.
    Normal,
    /// Entities are drawn but do not advance.
    Paused,
    /// Temporary state owned by the stage hook.
    Transient,
}

/// Facing direction of an entity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Facing toward increasing column indices.
    #[default]
    Right,
    /// Facing toward increasing row indices.
    Down,
    /// Facing toward decreasing column indices.
    Left,
    /// Facing toward decreasing row indices.
    Up,
}

impl Orientation {
    /// All orientations in their canonical order.
    pub const ALL: [Orientation; 4] = [Self::Right, Self::Down, Self::Left, Self::Up];

    /// Column and row delta of a single step in this direction.
    #[must_use]
    pub const fn delta(self) -> (i32, i32) {
        match self {
            Self::Right => (1, 0),
            Self::Down => (0, 1),
            Self::Left => (-1, 0),
            Self::Up => (0, -1),
        }
    }

    /// Direction whose delta matches the provided one, if it is a unit step.
    #[must_use]
    pub fn from_delta(dx: i32, dy: i32) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|orientation| orientation.delta() == (dx, dy))
    }

    /// Direction facing the other way.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Right => Self::Left,
            Self::Down => Self::Up,
            Self::Left => Self::Right,
            Self::Up => Self::Down,
        }
    }
}

/// RGBA color with byte channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    red: u8,
    green: u8,
    blue: u8,
    alpha: u8,
}

impl Color {
    /// Opaque black, the default surface background.
    pub const BLACK: Color = Color::from_rgb(0, 0, 0);

    /// Opaque red, the default entity tag color.
    pub const RED: Color = Color::from_rgb(0xff, 0, 0);

    /// Creates an opaque color from byte RGB components.
    #[must_use]
    pub const fn from_rgb(red: u8, green: u8, blue: u8) -> Self {
        Self::from_rgba(red, green, blue, 0xff)
    }

    /// Creates a color from byte RGBA components.
    #[must_use]
    pub const fn from_rgba(red: u8, green: u8, blue: u8, alpha: u8) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }

    /// Red component of the color.
    #[must_use]
    pub const fn red(&self) -> u8 {
        self.red
    }

    /// Green component of the color.
    #[must_use]
    pub const fn green(&self) -> u8 {
        self.green
    }

    /// Blue component of the color.
    #[must_use]
    pub const fn blue(&self) -> u8 {
        self.blue
    }

    /// Alpha component of the color.
    #[must_use]
    pub const fn alpha(&self) -> u8 {
        self.alpha
    }

    /// Channels packed in RGBA order.
    #[must_use]
    pub const fn to_rgba(self) -> [u8; 4] {
        [self.red, self.green, self.blue, self.alpha]
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::RED
    }
}

/// Pixels captured from a [`Surface`], stored as tightly packed RGBA8 rows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SurfaceSnapshot {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl SurfaceSnapshot {
    /// Wraps a pixel buffer captured from a surface of the given dimensions.
    #[must_use]
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Width of the captured area in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height of the captured area in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA8 pixel data in row-major order.
    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

/// Drawing surface handed to every map and entity draw behaviour.
///
/// The engine itself only clears the surface and, for cache-enabled maps,
/// snapshots and restores it. Everything else is up to the behaviours.
pub trait Surface {
    /// Width and height of the surface in pixels.
    fn size(&self) -> (u32, u32);

    /// Fills the whole surface with a solid color.
    fn clear(&mut self, color: Color);

    /// Fills an axis-aligned rectangle anchored at its upper-left corner.
    fn fill_rect(&mut self, origin: Vec2, size: Vec2, color: Color);

    /// Fills a circle around the provided center.
    fn fill_circle(&mut self, center: Vec2, radius: f32, color: Color);

    /// Draws a straight segment of the given thickness.
    fn stroke_line(&mut self, from: Vec2, to: Vec2, thickness: f32, color: Color);

    /// Captures every pixel currently on the surface.
    fn snapshot(&mut self) -> SurfaceSnapshot;

    /// Replaces the surface contents with a previously captured snapshot.
    fn restore(&mut self, snapshot: &SurfaceSnapshot);
}

/// Keys recognised by the input router.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    /// Up arrow.
    Up,
    /// Down arrow.
    Down,
    /// Left arrow.
    Left,
    /// Right arrow.
    Right,
    /// Enter or return.
    Enter,
    /// Space bar.
    Space,
    /// Escape.
    Escape,
    /// Any other printable key.
    Char(char),
}

/// Kind of an external input event; handlers are registered per kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InputKind {
    /// Pointer button pressed.
    PointerDown,
    /// Pointer button released.
    PointerUp,
    /// Pointer moved.
    PointerMove,
    /// Key pressed.
    KeyDown,
    /// Key released.
    KeyUp,
}

/// External event already converted into surface space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InputEvent {
    /// Kind used to select handlers.
    pub kind: InputKind,
    /// Surface-space position for pointer events.
    pub position: Option<Vec2>,
    /// Key for keyboard events.
    pub key: Option<Key>,
}

impl InputEvent {
    /// Creates a pointer event at the provided surface position.
    #[must_use]
    pub const fn pointer(kind: InputKind, position: Vec2) -> Self {
        Self {
            kind,
            position: Some(position),
            key: None,
        }
    }

    /// Creates a keyboard event.
    #[must_use]
    pub const fn key(kind: InputKind, key: Key) -> Self {
        Self {
            kind,
            position: None,
            key: Some(key),
        }
    }
}

/// Verdict returned by a stage hook each tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum UpdateSignal {
    /// Update and draw maps and entities this tick.
    #[default]
    Proceed,
    /// Stop the tick right after the hook; nothing else is updated or drawn.
    Skip,
}

impl From<bool> for UpdateSignal {
    fn from(proceed: bool) -> Self {
        if proceed {
            Self::Proceed
        } else {
            Self::Skip
        }
    }
}

/// Engine-level request raised from inside a tick and applied once it ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Transition {
    /// Advance to the stage after the active one.
    Next,
    /// Activate the stage with the provided index.
    Goto(StageId),
    /// Stop the frame loop.
    Stop,
}

/// Failures reported by engine operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The active stage is the last one; there is nothing to advance to.
    #[error("no stage follows {current}")]
    NoFurtherStage {
        /// Stage that was active when the request failed.
        current: StageId,
    },
    /// No stage exists at the requested index.
    #[error("{stage} does not exist")]
    UnknownStage {
        /// Index that was requested.
        stage: StageId,
    },
    /// An entity was bound to a map its stage does not own.
    #[error("{map} does not exist in this stage")]
    UnknownMap {
        /// Map that was referenced.
        map: MapId,
    },
    /// The engine was initialised without any stage.
    #[error("the engine has no stages")]
    NoStages,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manhattan_distance_matches_expectation() {
        let origin = GridCoord::new(-1, 1);
        let destination = GridCoord::new(4, 3);
        assert_eq!(origin.manhattan_distance(destination), 7);
        assert_eq!(destination.manhattan_distance(origin), 7);
    }

    #[test]
    fn extreme_coordinates_saturate_instead_of_overflowing() {
        let corner = GridCoord::new(i32::MAX, i32::MIN);
        assert_eq!(corner.offset(1, -1), corner);
        assert_eq!(corner.offset(-1, 1), GridCoord::new(i32::MAX - 1, i32::MIN + 1));
        assert_eq!(corner.manhattan_distance(GridCoord::new(i32::MIN, i32::MAX)), u32::MAX);
    }

    #[test]
    fn orientation_deltas_round_trip_through_lookup() {
        for orientation in Orientation::ALL {
            let (dx, dy) = orientation.delta();
            assert_eq!(Orientation::from_delta(dx, dy), Some(orientation));
            assert_eq!(orientation.opposite().opposite(), orientation);
        }
        assert_eq!(Orientation::from_delta(1, 1), None);
    }

    #[test]
    fn update_signal_follows_truthiness() {
        assert_eq!(UpdateSignal::from(true), UpdateSignal::Proceed);
        assert_eq!(UpdateSignal::from(false), UpdateSignal::Skip);
    }

    #[test]
    fn engine_errors_name_the_offending_index() {
        let error = EngineError::NoFurtherStage {
            current: StageId::new(2),
        };
        assert_eq!(error.to_string(), "no stage follows stage #2");
        let error = EngineError::UnknownMap { map: MapId::new(5) };
        assert_eq!(error.to_string(), "map #5 does not exist in this stage");
    }
}
