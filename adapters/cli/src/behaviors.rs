//! Demo behaviours selectable by name from stage files.

use anyhow::{bail, Result};
use glam::Vec2;
use gridstage_core::{
    Color, EntityId, EntityKind, EntityStatus, GridCoord, InputEvent, InputKind, Key,
    Orientation, StageId, StageStatus, Surface, Transition, UpdateSignal, WALKABLE,
};
use gridstage_system_scheduler::Engine;
use gridstage_world::{
    ControlValue, Edges, Entity, EntityBehavior, GridMap, InertEntity, InertMap, MapBehavior,
    ProceedHook, Query, SceneView, StageContext, StageHook, Step,
};
use rand::{seq::SliceRandom, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::stage_file::{color, coord, EntityEntry, MapEntry};

const TARGET_INDEX: &str = "target";
const HEADING: &str = "heading";

/// Looks up a map behaviour by name.
pub(crate) fn map_behavior(entry: &MapEntry) -> Result<Box<dyn MapBehavior>> {
    match entry.behavior.as_deref() {
        None | Some("none") => Ok(Box::new(InertMap)),
        Some("tiles") => Ok(Box::new(TileRenderer {
            wall: entry.wall.map_or(TileRenderer::WALL, color),
            floor: entry.floor.map(color),
        })),
        Some(other) => bail!("unknown map behavior `{other}`"),
    }
}

/// Looks up an entity behaviour by name.
pub(crate) fn entity_behavior(
    entry: &EntityEntry,
    seed: u64,
) -> Result<Box<dyn EntityBehavior>> {
    let edges = Edges::from(entry.edges);
    match entry.behavior.as_deref() {
        None | Some("none") => Ok(Box::new(InertEntity)),
        Some("walker") => {
            if entry.targets.is_empty() {
                bail!("walker needs at least one target tile");
            }
            Ok(Box::new(Walker {
                targets: entry.targets.iter().copied().map(coord).collect(),
                edges,
            }))
        }
        Some("wanderer") => Ok(Box::new(Wanderer {
            rng: ChaCha8Rng::seed_from_u64(seed),
            edges,
        })),
        Some("steer") => Ok(Box::new(Steer { edges })),
        Some(other) => bail!("unknown entity behavior `{other}`"),
    }
}

/// Looks up a stage hook by name; `following` is the stage a director moves on to.
pub(crate) fn stage_hook(name: Option<&str>, following: StageId) -> Result<Box<dyn StageHook>> {
    match name {
        None | Some("none") => Ok(Box::new(ProceedHook)),
        Some("advance") => Ok(Box::new(AdvanceWhenElapsed {
            armed: false,
            following,
        })),
        Some("caught") => Ok(Box::new(FreezeWhenCaught::default())),
        Some(other) => bail!("unknown stage director `{other}`"),
    }
}

/// Draws the map floor and its walls as filled tiles.
#[derive(Clone, Debug)]
struct TileRenderer {
    wall: Color,
    floor: Option<Color>,
}

impl TileRenderer {
    const WALL: Color = Color::from_rgb(0x21, 0x3a, 0x8f);
}

impl MapBehavior for TileRenderer {
    fn draw(&mut self, map: &GridMap, surface: &mut dyn Surface) {
        let tile = Vec2::splat(map.tile_size);
        if let Some(floor) = self.floor {
            let extent = Vec2::new(map.x_length() as f32, map.y_length() as f32) * map.tile_size;
            surface.fill_rect(map.origin, extent, floor);
        }
        for (coord, value) in map.tiles().iter() {
            if value > WALKABLE {
                let corner = map.coord_to_surface(coord) - tile / 2.0;
                surface.fill_rect(corner, tile, self.wall);
            }
        }
    }
}

/// Moves toward the center of `entity.vector`; `true` once the entity rests on a tile center.
fn stride(entity: &mut Entity, map: &GridMap) -> bool {
    let Some(target) = entity.vector else {
        return true;
    };
    let goal = map.coord_to_surface(target);
    let delta = goal - entity.position;
    let distance = delta.length();
    if distance <= entity.speed.max(f32::EPSILON) {
        entity.position = goal;
        entity.vector = None;
        true
    } else {
        entity.position += delta / distance * entity.speed;
        false
    }
}

/// Starts walking onto `step`. Wrapped steps jump straight across the edge.
fn begin_step(entity: &mut Entity, map: &GridMap, here: GridCoord, step: Step) {
    if step.wrapped {
        entity.position = map.coord_to_surface(step.coord);
        entity.vector = None;
        return;
    }
    if let Some(orientation) =
        Orientation::from_delta(
            step.coord.x().saturating_sub(here.x()),
            step.coord.y().saturating_sub(here.y()),
        )
    {
        entity.orientation = orientation;
    }
    entity.vector = Some(step.coord);
}

/// Walkable neighbour in `orientation`; off-grid neighbours wrap like pathfinder steps.
fn neighbour(map: &GridMap, from: GridCoord, orientation: Orientation, edges: Edges) -> Option<Step> {
    let (dx, dy) = orientation.delta();
    let target = from.offset(dx, dy);
    if map.tiles().contains(target) {
        return map.tiles().is_walkable(target).then_some(Step::to(target));
    }
    if edges == Edges::Bounded {
        return None;
    }

    let width = i32::try_from(map.x_length()).ok().filter(|width| *width > 0)?;
    let height = i32::try_from(map.y_length()).ok().filter(|height| *height > 0)?;
    let wrapped = GridCoord::new(target.x().rem_euclid(width), target.y().rem_euclid(height));
    Some(Step {
        coord: wrapped,
        wrapped: true,
    })
}

/// Resting tile of an entity, or `None` while it is between tiles or unbound.
fn resting_tile<'s>(
    entity: &mut Entity,
    scene: &'s SceneView<'_>,
) -> Option<(&'s GridMap, GridCoord)> {
    let map = entity.location.and_then(|id| scene.map(id))?;
    if !stride(entity, map) {
        return None;
    }
    Some((map, map.surface_to_coord(entity.position).coord))
}

fn draw_body(entity: &Entity, surface: &mut dyn Surface) {
    let radius = entity.size.min_element() / 2.0;
    surface.fill_circle(entity.position, radius, entity.color);
    let (dx, dy) = entity.orientation.delta();
    let facing = entity.position + Vec2::new(dx as f32, dy as f32) * radius;
    surface.stroke_line(entity.position, facing, 2.0, Color::BLACK);
}

/// Follows shortest paths through a list of target tiles, one tile at a time.
#[derive(Clone, Debug)]
struct Walker {
    targets: Vec<GridCoord>,
    edges: Edges,
}

impl EntityBehavior for Walker {
    fn update(&mut self, entity: &mut Entity, scene: &mut SceneView<'_>) {
        let Some((map, here)) = resting_tile(entity, scene) else {
            return;
        };

        let mut index = match entity.control.get(TARGET_INDEX) {
            Some(ControlValue::Int(index)) => usize::try_from(index).unwrap_or(0),
            _ => 0,
        } % self.targets.len();
        if self.targets[index] == here {
            index = (index + 1) % self.targets.len();
            let _ = entity.control.insert(
                TARGET_INDEX,
                ControlValue::Int(i64::try_from(index).unwrap_or(0)),
            );
        }
        if self.targets[index] == here {
            entity.path.clear();
            return;
        }

        entity.path = map.find(Query::path(here, self.targets[index]).with_edges(self.edges));
        if let Some(step) = entity.path.first().copied() {
            begin_step(entity, map, here, step);
        }
    }

    fn draw(&mut self, entity: &Entity, surface: &mut dyn Surface) {
        draw_body(entity, surface);
    }
}

/// Steps away from the nearest player using `Next` queries; wanders randomly otherwise.
#[derive(Clone, Debug)]
struct Wanderer {
    rng: ChaCha8Rng,
    edges: Edges,
}

impl EntityBehavior for Wanderer {
    fn update(&mut self, entity: &mut Entity, scene: &mut SceneView<'_>) {
        let Some((map, here)) = resting_tile(entity, scene) else {
            return;
        };

        let threat = scene
            .others_by_kind(EntityKind::Player)
            .filter(|player| player.location == entity.location)
            .min_by_key(|player| player.coord.manhattan_distance(here));
        let mut options = threat
            .map(|player| map.find(Query::next(player.coord, here).with_edges(self.edges)))
            .unwrap_or_default();
        if options.is_empty() {
            options = Orientation::ALL
                .into_iter()
                .filter_map(|orientation| neighbour(map, here, orientation, self.edges))
                .collect();
        }

        if let Some(step) = options.choose(&mut self.rng).copied() {
            begin_step(entity, map, here, step);
        }
    }

    fn draw(&mut self, entity: &Entity, surface: &mut dyn Surface) {
        draw_body(entity, surface);
    }
}

/// Player-controlled movement: keeps walking in the heading set by input handlers.
#[derive(Clone, Debug)]
struct Steer {
    edges: Edges,
}

impl EntityBehavior for Steer {
    fn update(&mut self, entity: &mut Entity, scene: &mut SceneView<'_>) {
        let Some((map, here)) = resting_tile(entity, scene) else {
            return;
        };
        let Some(heading) = entity.control.orientation(HEADING) else {
            return;
        };

        entity.orientation = heading;
        if let Some(step) = neighbour(map, here, heading, self.edges) {
            begin_step(entity, map, here, step);
        }
    }

    fn draw(&mut self, entity: &Entity, surface: &mut dyn Surface) {
        let corner = entity.position - entity.size / 2.0;
        surface.fill_rect(corner, entity.size, entity.color);
        let (dx, dy) = entity.orientation.delta();
        let facing = entity.position + Vec2::new(dx as f32, dy as f32) * entity.size / 2.0;
        surface.stroke_line(entity.position, facing, 2.0, Color::BLACK);
    }
}

/// Moves on to `following` once the stage countdown elapses.
#[derive(Clone, Debug)]
struct AdvanceWhenElapsed {
    armed: bool,
    following: StageId,
}

impl StageHook for AdvanceWhenElapsed {
    fn update(&mut self, context: &mut StageContext<'_>) -> UpdateSignal {
        if context.timeout() > 0 {
            self.armed = true;
        } else if self.armed {
            self.armed = false;
            context.request(Transition::Goto(self.following));
        }
        UpdateSignal::Proceed
    }
}

/// Pauses the stage for a moment when a program entity reaches a player, then restarts it.
///
/// While the freeze lasts only every other frame is drawn.
#[derive(Clone, Debug, Default)]
struct FreezeWhenCaught {
    frozen: bool,
}

impl FreezeWhenCaught {
    const FREEZE_FRAMES: u32 = 90;
}

impl StageHook for FreezeWhenCaught {
    fn update(&mut self, context: &mut StageContext<'_>) -> UpdateSignal {
        if self.frozen {
            if context.timeout() == 0 {
                context.request(Transition::Goto(context.stage()));
                return UpdateSignal::Proceed;
            }
            return UpdateSignal::from(context.frame() % 2 == 0);
        }

        let caught = context.entities_by_kind(EntityKind::Player).any(|player| {
            context
                .entities_by_kind(EntityKind::Program)
                .any(|program| program.location == player.location && program.coord == player.coord)
        });
        if caught {
            self.frozen = true;
            context.set_status(StageStatus::Paused);
            context.set_timeout(Self::FREEZE_FRAMES);
        }
        UpdateSignal::Proceed
    }
}

/// Installs the demo's input handlers on every stage of `engine`.
///
/// Arrow keys steer player entities, `Enter` cycles stages, `Escape` stops the
/// engine and clicking a program entity toggles its pause.
pub(crate) fn bind_controls(engine: &mut Engine) {
    let stage_count = engine.stages().count();
    let stages: Vec<(StageId, Vec<EntityId>)> = engine
        .stages()
        .map(|stage| {
            let programs = stage
                .entities_by_kind(EntityKind::Program)
                .map(Entity::id)
                .collect();
            (stage.id(), programs)
        })
        .collect();

    for (stage, programs) in stages {
        let following = StageId::new(
            u32::try_from((stage.index() + 1) % stage_count.max(1)).unwrap_or(0),
        );
        engine.bind_stage(InputKind::KeyDown, stage, move |context, event| {
            handle_key(context, event, following);
        });
        for program in programs {
            engine.bind_entity(InputKind::PointerDown, stage, program, |entity, _| {
                toggle_pause(entity);
            });
        }
    }
}

/// Flips between normal and paused; other statuses belong to the behaviour.
fn toggle_pause(entity: &mut Entity) {
    entity.status = match entity.status {
        EntityStatus::Normal => EntityStatus::Paused,
        EntityStatus::Paused => EntityStatus::Normal,
        other => other,
    };
}

fn handle_key(context: &mut StageContext<'_>, event: &InputEvent, following: StageId) {
    let heading = match event.key {
        Some(Key::Up) => Orientation::Up,
        Some(Key::Down) => Orientation::Down,
        Some(Key::Left) => Orientation::Left,
        Some(Key::Right) => Orientation::Right,
        Some(Key::Enter) => {
            context.request(Transition::Goto(following));
            return;
        }
        Some(Key::Escape) => {
            context.request(Transition::Stop);
            return;
        }
        _ => return,
    };

    let players: Vec<EntityId> = context
        .entities_by_kind(EntityKind::Player)
        .map(Entity::id)
        .collect();
    for id in players {
        if let Some(player) = context.entity_mut(id) {
            let _ = player
                .control
                .insert(HEADING, ControlValue::Orientation(heading));
        }
    }
}
