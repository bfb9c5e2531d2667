use glam::Vec2;
use gridstage_core::{
    Color, EntityStatus, GridCoord, InputEvent, InputKind, Surface, Transition, UpdateSignal,
};
use gridstage_rendering::{
    drive_frame, FrameInput, HeadlessBackend, HeadlessSummary, PixelSurface, Presentation,
    RenderingBackend,
};
use gridstage_system_scheduler::{Engine, EngineConfig};
use gridstage_world::{
    Entity, EntityBehavior, EntityConfig, GridMap, MapBehavior, MapConfig, StageConfig,
    StageContext, TileGrid,
};

const WALL: Color = Color::from_rgb(0x40, 0x40, 0x40);

#[derive(Clone)]
struct Walls;

impl MapBehavior for Walls {
    fn draw(&mut self, map: &GridMap, surface: &mut dyn Surface) {
        for (coord, value) in map.tiles().iter() {
            if value > 0 {
                let center = map.coord_to_surface(coord);
                let half = Vec2::splat(map.tile_size / 2.0);
                surface.fill_rect(center - half, Vec2::splat(map.tile_size), WALL);
            }
        }
    }
}

#[derive(Clone)]
struct Square;

impl EntityBehavior for Square {
    fn draw(&mut self, entity: &Entity, surface: &mut dyn Surface) {
        surface.fill_rect(entity.position - entity.size / 2.0, entity.size, entity.color);
    }
}

fn engine_with_walls(cache: bool) -> Engine {
    let mut engine = Engine::new(EngineConfig::new(40, 20));
    let stage = engine.create_stage(StageConfig::default());
    let stage = engine.stage_mut(stage).expect("stage exists");
    let tiles = TileGrid::from_rows(&[[1, 0, 0, 1], [0, 0, 0, 0]]).expect("rectangular tiles");
    let map = stage.create_map(
        MapConfig::new(tiles)
            .with_tile_size(10.0)
            .with_cache(cache)
            .with_behavior(Walls),
    );
    let _ = stage
        .create_entity(
            EntityConfig::on_map(map, GridCoord::new(1, 1))
                .with_size(Vec2::splat(10.0))
                .with_behavior(Square),
        )
        .expect("bound entity");
    engine.init().expect("stage exists");
    engine
}

#[test]
fn frames_render_walls_and_entities() {
    let mut engine = engine_with_walls(false);
    let mut surface = PixelSurface::new(40, 20);

    let mut backend = HeadlessBackend::new(3);
    let summary = backend.drive(&mut engine, &mut surface).expect("headless run");

    assert_eq!(
        summary,
        HeadlessSummary {
            ticks: 3,
            drawn: 3,
            skipped: 0,
            stopped_early: false,
        }
    );
    assert_eq!(surface.count(WALL), 200);
    assert_eq!(surface.count(Color::RED), 100);
    assert_eq!(surface.pixel(15, 15), Some(Color::RED));
    assert_eq!(surface.pixel(25, 5), Some(Color::BLACK));
}

#[test]
fn cached_maps_reproduce_the_same_frame() {
    let mut plain = engine_with_walls(false);
    let mut cached = engine_with_walls(true);
    let mut plain_surface = PixelSurface::new(40, 20);
    let mut cached_surface = PixelSurface::new(40, 20);

    for _ in 0..4 {
        let _ = drive_frame(&mut plain, &mut plain_surface, &FrameInput::default())
            .expect("plain tick");
        let _ = drive_frame(&mut cached, &mut cached_surface, &FrameInput::default())
            .expect("cached tick");
        assert_eq!(plain_surface.pixels(), cached_surface.pixels());
    }
}

#[test]
fn scripted_events_reach_entities_before_their_frame() {
    let mut engine = engine_with_walls(false);
    let stage = engine.active_stage_id().expect("active stage");
    let entity = engine
        .active_stage()
        .and_then(|stage| stage.entities().next().map(Entity::id))
        .expect("entity exists");
    engine.bind_entity(InputKind::PointerDown, stage, entity, |entity, _| {
        entity.status = EntityStatus::Paused;
        entity.color = Color::from_rgb(0, 0xff, 0);
    });

    let mut backend = HeadlessBackend::new(2).with_event(
        2,
        InputEvent::pointer(InputKind::PointerDown, Vec2::new(14.0, 16.0)),
    );
    let mut surface = PixelSurface::new(40, 20);
    let _ = backend.drive(&mut engine, &mut surface).expect("headless run");

    assert_eq!(surface.pixel(15, 15), Some(Color::from_rgb(0, 0xff, 0)));
}

#[test]
fn stop_requests_end_the_run_early() {
    let mut engine = Engine::new(EngineConfig::new(8, 8));
    let _ = engine.create_stage(StageConfig::default().with_hook(
        |context: &mut StageContext<'_>| {
            if context.frame() == 3 {
                context.request(Transition::Stop);
            }
            UpdateSignal::from(context.frame() % 2 == 1)
        },
    ));
    engine.init().expect("stage exists");

    let summary = HeadlessBackend::new(10)
        .drive(&mut engine, &mut PixelSurface::new(8, 8))
        .expect("headless run");

    assert_eq!(summary.ticks, 3);
    assert_eq!(summary.drawn, 2);
    assert_eq!(summary.skipped, 1);
    assert!(summary.stopped_early);
}

#[test]
fn run_consumes_the_engine() {
    let mut engine = Engine::new(EngineConfig::new(4, 4));
    let _ = engine.create_stage(StageConfig::default());
    engine.init().expect("stage exists");

    HeadlessBackend::new(5)
        .run(Presentation::new("headless"), engine)
        .expect("headless run succeeds");
}
