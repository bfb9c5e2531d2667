//! Tile grids and the surface-space maps built on top of them.

use std::fmt;

use glam::Vec2;
use gridstage_core::{GridCoord, MapId, Surface, SurfaceSnapshot, OFF_GRID, WALKABLE};
use thiserror::Error;

use crate::navigation::{Pathfinder, Query, Step};

/// Rectangular grid of tile values stored in row-major order.
///
/// `0` is walkable, positive values block movement and lookups outside the
/// rectangle report [`OFF_GRID`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TileGrid {
    width: u32,
    height: u32,
    tiles: Vec<i32>,
}

impl TileGrid {
    /// Builds a grid from rows of tile values.
    ///
    /// Every row must have the same, non-zero length.
    pub fn from_rows<R>(rows: &[R]) -> Result<Self, GridError>
    where
        R: AsRef<[i32]>,
    {
        let Some(first) = rows.first() else {
            return Err(GridError::Empty);
        };
        let width = first.as_ref().len();
        if width == 0 {
            return Err(GridError::Empty);
        }

        let mut tiles = Vec::with_capacity(width * rows.len());
        for (index, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != width {
                return Err(GridError::Ragged {
                    row: index,
                    expected: width,
                    found: row.len(),
                });
            }
            tiles.extend_from_slice(row);
        }

        Ok(Self {
            width: u32::try_from(width).map_err(|_| GridError::TooLarge)?,
            height: u32::try_from(rows.len()).map_err(|_| GridError::TooLarge)?,
            tiles,
        })
    }

    /// Creates a grid of the given dimensions with every tile set to `value`.
    #[must_use]
    pub fn filled(width: u32, height: u32, value: i32) -> Self {
        let count = usize::try_from(u64::from(width) * u64::from(height)).unwrap_or(0);
        Self {
            width,
            height,
            tiles: vec![value; count],
        }
    }

    /// Number of columns (`x_length`).
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Number of rows (`y_length`).
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Number of tiles in the grid.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    /// Reports whether the grid holds no tiles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Tile value at `(x, y)`, or [`OFF_GRID`] outside the rectangle.
    #[must_use]
    pub fn get(&self, x: i32, y: i32) -> i32 {
        self.index(x, y)
            .and_then(|index| self.tiles.get(index).copied())
            .unwrap_or(OFF_GRID)
    }

    /// Overwrites the tile at `(x, y)`. Writes outside the rectangle are ignored.
    pub fn set(&mut self, x: i32, y: i32, value: i32) {
        if let Some(tile) = self
            .index(x, y)
            .and_then(|index| self.tiles.get_mut(index))
        {
            *tile = value;
        }
    }

    /// Tile value at the provided coordinate.
    #[must_use]
    pub fn value(&self, coord: GridCoord) -> i32 {
        self.get(coord.x(), coord.y())
    }

    /// Reports whether the coordinate lies inside the rectangle.
    #[must_use]
    pub fn contains(&self, coord: GridCoord) -> bool {
        self.index(coord.x(), coord.y()).is_some()
    }

    /// Reports whether the coordinate lies inside the rectangle on a walkable tile.
    #[must_use]
    pub fn is_walkable(&self, coord: GridCoord) -> bool {
        self.value(coord) == WALKABLE
    }

    /// Iterator over the grid rows from top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[i32]> {
        let width = usize::try_from(self.width).unwrap_or(0).max(1);
        self.tiles.chunks(width)
    }

    /// Iterator over every coordinate and its value in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (GridCoord, i32)> + '_ {
        let width = i32::try_from(self.width).unwrap_or(i32::MAX).max(1);
        self.tiles.iter().enumerate().map(move |(index, value)| {
            let index = i32::try_from(index).unwrap_or(i32::MAX);
            (GridCoord::new(index % width, index / width), *value)
        })
    }

    pub(crate) fn index(&self, x: i32, y: i32) -> Option<usize> {
        let column = u32::try_from(x).ok()?;
        let row = u32::try_from(y).ok()?;
        if column >= self.width || row >= self.height {
            return None;
        }

        let width = usize::try_from(self.width).ok()?;
        let column = usize::try_from(column).ok()?;
        let row = usize::try_from(row).ok()?;
        row.checked_mul(width)?.checked_add(column)
    }
}

/// Reasons a tile grid template may be rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum GridError {
    /// The template has no rows or its rows have no tiles.
    #[error("tile grid must contain at least one tile")]
    Empty,
    /// A row's length differs from the first row's.
    #[error("row {row} has {found} tiles, expected {expected}")]
    Ragged {
        /// Zero-based index of the offending row.
        row: usize,
        /// Length of the first row.
        expected: usize,
        /// Length of the offending row.
        found: usize,
    },
    /// The template dimensions do not fit in 32 bits.
    #[error("tile grid dimensions exceed u32::MAX")]
    TooLarge,
}

/// Tile containing a surface point, plus the point's distance from the tile center.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileLocation {
    /// Tile containing the point.
    pub coord: GridCoord,
    /// Euclidean distance from the tile center; `0.0` means "arrived".
    pub offset: f32,
}

/// Update and draw behaviour attached to a [`GridMap`].
pub trait MapBehavior: CloneMapBehavior {
    /// Advances the map. Not called for cache-enabled maps.
    fn update(&mut self, _map: &mut GridMap) {}

    /// Draws the map onto the surface.
    fn draw(&mut self, _map: &GridMap, _surface: &mut dyn Surface) {}
}

/// Object-safe cloning for boxed map behaviours.
pub trait CloneMapBehavior {
    /// Clones the behaviour into a new box.
    fn clone_box(&self) -> Box<dyn MapBehavior>;
}

impl<T> CloneMapBehavior for T
where
    T: MapBehavior + Clone + 'static,
{
    fn clone_box(&self) -> Box<dyn MapBehavior> {
        Box::new(self.clone())
    }
}

impl Clone for Box<dyn MapBehavior> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Map behaviour that neither updates nor draws.
#[derive(Clone, Copy, Debug, Default)]
pub struct InertMap;

impl MapBehavior for InertMap {}

/// Construction template for a [`GridMap`].
///
/// Stages keep the template so resetting a map restores its original tiles.
#[derive(Clone)]
pub struct MapConfig {
    /// Surface position of the map's upper-left corner.
    pub origin: Vec2,
    /// Side length of a tile in surface units.
    pub tile_size: f32,
    /// Tile values the map starts with.
    pub tiles: TileGrid,
    /// Number of ticks between recomputations of the map's frame counter.
    pub frames: u32,
    /// Draw once and replay a surface snapshot afterwards.
    pub cache: bool,
    /// Update and draw behaviour.
    pub behavior: Box<dyn MapBehavior>,
}

impl MapConfig {
    /// Creates a template for the provided tiles with default settings.
    #[must_use]
    pub fn new(tiles: TileGrid) -> Self {
        Self {
            tiles,
            ..Self::default()
        }
    }

    /// Places the map's upper-left corner at the given surface position.
    #[must_use]
    pub fn with_origin(mut self, origin: Vec2) -> Self {
        self.origin = origin;
        self
    }

    /// Sets the tile side length.
    #[must_use]
    pub fn with_tile_size(mut self, tile_size: f32) -> Self {
        self.tile_size = tile_size;
        self
    }

    /// Sets the frame divisor.
    #[must_use]
    pub fn with_frames(mut self, frames: u32) -> Self {
        self.frames = frames;
        self
    }

    /// Enables or disables snapshot caching.
    #[must_use]
    pub fn with_cache(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }

    /// Attaches the map's behaviour.
    #[must_use]
    pub fn with_behavior(mut self, behavior: impl MapBehavior + 'static) -> Self {
        self.behavior = Box::new(behavior);
        self
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            origin: Vec2::ZERO,
            tile_size: 20.0,
            tiles: TileGrid::default(),
            frames: 1,
            cache: false,
            behavior: Box::new(InertMap),
        }
    }
}

impl fmt::Debug for MapConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapConfig")
            .field("origin", &self.origin)
            .field("tile_size", &self.tile_size)
            .field("tiles", &self.tiles)
            .field("frames", &self.frames)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

/// Tile map placed on the drawing surface.
#[derive(Clone, Debug)]
pub struct GridMap {
    id: MapId,
    /// Surface position of the map's upper-left corner.
    pub origin: Vec2,
    /// Side length of a tile in surface units.
    pub tile_size: f32,
    tiles: TileGrid,
    frames: u32,
    times: u64,
    cache: bool,
    snapshot: Option<SurfaceSnapshot>,
}

impl GridMap {
    pub(crate) fn from_config(id: MapId, config: &MapConfig) -> Self {
        Self {
            id,
            origin: config.origin,
            tile_size: config.tile_size,
            tiles: config.tiles.clone(),
            frames: config.frames.max(1),
            times: 0,
            cache: config.cache,
            snapshot: None,
        }
    }

    /// Index assigned by the owning stage.
    #[must_use]
    pub const fn id(&self) -> MapId {
        self.id
    }

    /// Live tile values.
    #[must_use]
    pub const fn tiles(&self) -> &TileGrid {
        &self.tiles
    }

    /// Number of columns (`x_length`).
    #[must_use]
    pub const fn x_length(&self) -> u32 {
        self.tiles.width()
    }

    /// Number of rows (`y_length`).
    #[must_use]
    pub const fn y_length(&self) -> u32 {
        self.tiles.height()
    }

    /// Frame divisor; never zero.
    #[must_use]
    pub const fn frames(&self) -> u32 {
        self.frames
    }

    /// Derived frame counter, `frame / frames` as of the last divisible frame.
    #[must_use]
    pub const fn times(&self) -> u64 {
        self.times
    }

    /// Reports whether the map replays a snapshot instead of redrawing.
    #[must_use]
    pub const fn is_cached(&self) -> bool {
        self.cache
    }

    /// Snapshot captured after the map's first draw, if caching produced one.
    #[must_use]
    pub fn snapshot(&self) -> Option<&SurfaceSnapshot> {
        self.snapshot.as_ref()
    }

    /// Tile value at `(x, y)`, or [`OFF_GRID`] outside the map.
    #[must_use]
    pub fn get(&self, x: i32, y: i32) -> i32 {
        self.tiles.get(x, y)
    }

    /// Overwrites the tile at `(x, y)`. Writes outside the map are ignored.
    pub fn set(&mut self, x: i32, y: i32, value: i32) {
        self.tiles.set(x, y, value);
    }

    /// Surface-space center of the tile at `coord`. No bounds check.
    #[must_use]
    pub fn coord_to_surface(&self, coord: GridCoord) -> Vec2 {
        let half = self.tile_size / 2.0;
        Vec2::new(
            self.origin.x + coord.x() as f32 * self.tile_size + half,
            self.origin.y + coord.y() as f32 * self.tile_size + half,
        )
    }

    /// Tile containing `position` and how far the position sits from that tile's center.
    #[must_use]
    pub fn surface_to_coord(&self, position: Vec2) -> TileLocation {
        let relative = position - self.origin;
        let half = self.tile_size / 2.0;
        let fx = relative.x.abs() % self.tile_size - half;
        let fy = relative.y.abs() % self.tile_size - half;
        TileLocation {
            coord: GridCoord::new(
                (relative.x / self.tile_size).floor() as i32,
                (relative.y / self.tile_size).floor() as i32,
            ),
            offset: (fx * fx + fy * fy).sqrt(),
        }
    }

    /// Runs a fresh search over the map's live tiles.
    #[must_use]
    pub fn find(&self, query: Query) -> Vec<Step> {
        Pathfinder::default().search(&self.tiles, query)
    }

    pub(crate) fn record_frame(&mut self, frame: u64) {
        let frames = u64::from(self.frames);
        if frame % frames == 0 {
            self.times = frame / frames;
        }
    }

    pub(crate) fn store_snapshot(&mut self, snapshot: SurfaceSnapshot) {
        self.snapshot = Some(snapshot);
    }

    pub(crate) fn restore(&mut self, config: &MapConfig) {
        *self = Self::from_config(self.id, config);
    }
}
