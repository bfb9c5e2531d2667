//! TOML stage descriptions loaded by the `gridstage` binary.

use anyhow::{Context, Result};
use glam::Vec2;
use gridstage_core::{Color, EntityKind, GridCoord, MapId, StageId};
use gridstage_system_scheduler::{Engine, EngineConfig};
use gridstage_world::{Edges, EntityConfig, MapConfig, StageConfig, TileGrid};
use serde::Deserialize;

use crate::behaviors;

/// Whole stage file: surface settings plus the ordered stages.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct StageFile {
    #[serde(default)]
    pub(crate) surface: SurfaceSection,
    #[serde(default)]
    pub(crate) stages: Vec<StageEntry>,
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub(crate) struct SurfaceSection {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) background: [u8; 3],
}

impl Default for SurfaceSection {
    fn default() -> Self {
        let config = EngineConfig::default();
        Self {
            width: config.width,
            height: config.height,
            background: [0, 0, 0],
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct StageEntry {
    #[serde(default)]
    pub(crate) name: Option<String>,
    #[serde(default)]
    pub(crate) timeout: u32,
    /// Stage hook by name; see [`behaviors::stage_hook`].
    #[serde(default)]
    pub(crate) director: Option<String>,
    #[serde(default)]
    pub(crate) maps: Vec<MapEntry>,
    #[serde(default)]
    pub(crate) entities: Vec<EntityEntry>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct MapEntry {
    #[serde(default)]
    pub(crate) origin: [f32; 2],
    #[serde(default = "default_tile_size")]
    pub(crate) tile_size: f32,
    #[serde(default = "default_frames")]
    pub(crate) frames: u32,
    #[serde(default)]
    pub(crate) cache: bool,
    #[serde(default)]
    pub(crate) behavior: Option<String>,
    #[serde(default)]
    pub(crate) wall: Option<[u8; 3]>,
    #[serde(default)]
    pub(crate) floor: Option<[u8; 3]>,
    pub(crate) tiles: Vec<Vec<i32>>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct EntityEntry {
    #[serde(default)]
    pub(crate) kind: EntityKind,
    #[serde(default)]
    pub(crate) map: Option<u32>,
    #[serde(default)]
    pub(crate) coord: Option<[i32; 2]>,
    #[serde(default)]
    pub(crate) position: Option<[f32; 2]>,
    #[serde(default)]
    pub(crate) size: Option<[f32; 2]>,
    #[serde(default)]
    pub(crate) color: Option<[u8; 3]>,
    #[serde(default)]
    pub(crate) frames: Option<u32>,
    #[serde(default)]
    pub(crate) speed: f32,
    #[serde(default)]
    pub(crate) timeout: u32,
    #[serde(default)]
    pub(crate) behavior: Option<String>,
    /// Tiles a walker visits in turn.
    #[serde(default)]
    pub(crate) targets: Vec<[i32; 2]>,
    #[serde(default)]
    pub(crate) edges: EdgeMode,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum EdgeMode {
    #[default]
    Wrap,
    Bounded,
}

impl From<EdgeMode> for Edges {
    fn from(mode: EdgeMode) -> Self {
        match mode {
            EdgeMode::Wrap => Edges::Wrap,
            EdgeMode::Bounded => Edges::Bounded,
        }
    }
}

fn default_tile_size() -> f32 {
    20.0
}

fn default_frames() -> u32 {
    1
}

pub(crate) fn color([red, green, blue]: [u8; 3]) -> Color {
    Color::from_rgb(red, green, blue)
}

pub(crate) fn coord([x, y]: [i32; 2]) -> GridCoord {
    GridCoord::new(x, y)
}

impl StageFile {
    /// Parses a stage file from TOML source.
    pub(crate) fn parse(source: &str) -> Result<Self> {
        let file: Self = toml::from_str(source).context("failed to parse stage file")?;
        if file.stages.is_empty() {
            anyhow::bail!("stage file declares no stages");
        }
        Ok(file)
    }

    /// Builds a stopped engine holding every declared stage.
    ///
    /// `seed` feeds the random demo behaviours; each entity derives its own
    /// stream from it.
    pub(crate) fn build(&self, seed: u64) -> Result<Engine> {
        let config = EngineConfig::new(self.surface.width, self.surface.height)
            .with_background(color(self.surface.background));
        let mut engine = Engine::new(config);

        for (stage_index, entry) in self.stages.iter().enumerate() {
            let label = entry
                .name
                .clone()
                .unwrap_or_else(|| format!("stage {stage_index}"));
            let following = StageId::new(
                u32::try_from((stage_index + 1) % self.stages.len()).unwrap_or(0),
            );
            build_stage(&mut engine, entry, seed, stage_index, following)
                .with_context(|| format!("failed to build {label}"))?;
        }

        Ok(engine)
    }
}

fn build_stage(
    engine: &mut Engine,
    entry: &StageEntry,
    seed: u64,
    stage_index: usize,
    following: StageId,
) -> Result<()> {
    let hook = behaviors::stage_hook(entry.director.as_deref(), following)?;
    let id = engine.create_stage(StageConfig {
        timeout: entry.timeout,
        hook,
    });
    let stage = engine
        .stage_mut(id)
        .with_context(|| format!("{id} vanished after creation"))?;

    for (map_index, map) in entry.maps.iter().enumerate() {
        let tiles = tile_grid(&map.tiles)
            .with_context(|| format!("map {map_index} has invalid tiles"))?;
        let behavior = behaviors::map_behavior(map)
            .with_context(|| format!("map {map_index} has an invalid behavior"))?;
        let config = MapConfig {
            origin: Vec2::from(map.origin),
            tile_size: map.tile_size,
            tiles,
            frames: map.frames,
            cache: map.cache,
            behavior,
        };
        let _ = stage.create_map(config);
    }

    for (entity_index, entity) in entry.entities.iter().enumerate() {
        let stream = seed
            .wrapping_mul(0x9e37_79b9_7f4a_7c15)
            .wrapping_add(((stage_index as u64) << 32) | entity_index as u64);
        let config = entity_config(entity, stream)
            .with_context(|| format!("entity {entity_index} is invalid"))?;
        let _ = stage
            .create_entity(config)
            .with_context(|| format!("entity {entity_index} could not be placed"))?;
    }

    Ok(())
}

/// Tile values are non-negative; `-1` is reserved for lookups outside the grid.
fn tile_grid(rows: &[Vec<i32>]) -> Result<TileGrid> {
    for (y, row) in rows.iter().enumerate() {
        if let Some(x) = row.iter().position(|value| *value < 0) {
            anyhow::bail!("negative tile value {} at ({x}, {y})", row[x]);
        }
    }
    Ok(TileGrid::from_rows(rows)?)
}

fn entity_config(entry: &EntityEntry, seed: u64) -> Result<EntityConfig> {
    let mut config = match (entry.map, entry.coord, entry.position) {
        (Some(map), Some(start), _) => EntityConfig::on_map(MapId::new(map), coord(start)),
        (Some(map), None, _) => EntityConfig::on_map(MapId::new(map), GridCoord::default()),
        (None, _, Some(position)) => EntityConfig::at(Vec2::from(position)),
        (None, _, None) => EntityConfig::default(),
    }
    .with_kind(entry.kind);

    if let Some(size) = entry.size {
        config.size = Vec2::from(size);
    }
    if let Some(rgb) = entry.color {
        config.color = color(rgb);
    }
    if let Some(frames) = entry.frames {
        config.frames = frames;
    }
    config.speed = entry.speed;
    config.timeout = entry.timeout;
    config.behavior = behaviors::entity_behavior(entry, seed)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use gridstage_core::EngineError;

    use super::*;

    const MINIMAL: &str = r#"
        [surface]
        width = 200
        height = 100
        background = [1, 2, 3]

        [[stages]]
        timeout = 10

        [[stages.maps]]
        origin = [10.0, 0.0]
        tile_size = 10.0
        tiles = [[0, 0, 1], [0, 0, 0]]

        [[stages.entities]]
        kind = "player"
        map = 0
        coord = [1, 1]
        behavior = "steer"
        speed = 2.5
    "#;

    #[test]
    fn demo_stage_file_builds() {
        let file = StageFile::parse(crate::DEMO_STAGES).expect("demo parses");
        let engine = file.build(1).expect("demo builds");
        assert_eq!(engine.stages().count(), file.stages.len());
        assert!(engine
            .stages()
            .all(|stage| stage.maps().count() > 0 && stage.entities().count() > 0));
    }

    #[test]
    fn minimal_file_maps_onto_engine_state() {
        let file = StageFile::parse(MINIMAL).expect("minimal parses");
        let engine = file.build(0).expect("minimal builds");

        assert_eq!(engine.config().width, 200);
        assert_eq!(engine.config().background, Color::from_rgb(1, 2, 3));

        let stage = engine.stage(StageId::new(0)).expect("stage exists");
        assert_eq!(stage.timeout(), 10);
        let map = stage.map(MapId::new(0)).expect("map exists");
        assert_eq!(map.x_length(), 3);
        assert_eq!(map.get(2, 0), 1);

        let player = stage
            .entities_by_kind(EntityKind::Player)
            .next()
            .expect("player exists");
        assert_eq!(player.position, Vec2::new(25.0, 15.0));
        assert_eq!(player.speed, 2.5);
    }

    #[test]
    fn unknown_behaviors_are_rejected_with_context() {
        let source = MINIMAL.replace("\"steer\"", "\"teleport\"");
        let error = StageFile::parse(&source)
            .and_then(|file| file.build(0))
            .expect_err("unknown behavior");
        let message = format!("{error:#}");
        assert!(message.contains("stage 0"), "{message}");
        assert!(message.contains("teleport"), "{message}");
    }

    #[test]
    fn ragged_tiles_are_rejected() {
        let source = MINIMAL.replace("[[0, 0, 1], [0, 0, 0]]", "[[0, 0, 1], [0]]");
        let error = StageFile::parse(&source)
            .and_then(|file| file.build(0))
            .expect_err("ragged tiles");
        assert!(format!("{error:#}").contains("map 0 has invalid tiles"));
    }

    #[test]
    fn negative_tiles_are_rejected() {
        let source = MINIMAL.replace("[[0, 0, 1], [0, 0, 0]]", "[[0, 0, 1], [0, -1, 0]]");
        let error = StageFile::parse(&source)
            .and_then(|file| file.build(0))
            .expect_err("negative tile");
        let message = format!("{error:#}");
        assert!(message.contains("map 0 has invalid tiles"), "{message}");
        assert!(message.contains("negative tile value -1 at (1, 1)"), "{message}");
    }

    #[test]
    fn entities_bound_to_missing_maps_fail() {
        let source = MINIMAL.replace("map = 0", "map = 4");
        let error = StageFile::parse(&source)
            .and_then(|file| file.build(0))
            .expect_err("missing map");
        assert_eq!(
            error.root_cause().downcast_ref::<EngineError>(),
            Some(&EngineError::UnknownMap { map: MapId::new(4) })
        );
    }

    #[test]
    fn files_without_stages_are_rejected() {
        assert!(StageFile::parse("[surface]\nwidth = 10\n").is_err());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let source = MINIMAL.replace("speed = 2.5", "sped = 2.5");
        assert!(StageFile::parse(&source).is_err());
    }
}
