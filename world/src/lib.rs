#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Stage state for gridstage: tile maps, the grid pathfinder, entities and
//! the per-tick update/draw pass that drives them.

mod entity;
mod frame;
mod grid;
mod navigation;
mod stage;

pub use entity::{
    CloneEntityBehavior, Control, ControlValue, Entity, EntityBehavior, EntityConfig, InertEntity,
    SceneView,
};
pub use frame::FrameReport;
pub use grid::{
    CloneMapBehavior, GridError, GridMap, InertMap, MapBehavior, MapConfig, TileGrid, TileLocation,
};
pub use navigation::{Edges, Pathfinder, Query, SearchMode, Step};
pub use stage::{CloneStageHook, ProceedHook, Stage, StageConfig, StageContext, StageHook};
