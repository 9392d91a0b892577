//! Client core for the idle game: world model, hit-testing, scene rendering,
//! input translation and server state synchronization, plus a windowed
//! front end built on `winit` and `pixels`.

pub mod app;
pub mod geometry;
pub mod input;
pub mod model;
pub mod rendering;
pub mod sync;

pub use app::{run_client, AppError, LoopConfig};
pub use geometry::{
    hit_test_characters, hit_test_path_points, Rect, Vec2, CHARACTER_HIT_RADIUS_PX,
    PATH_POINT_HIT_RADIUS_PX,
};
pub use input::{GameAction, InputController, Key, KeyOutcome, KEY_MOVE_STEP_PX};
pub use model::{
    Building, Character, CharacterId, LoadStatus, MapCounts, MoveRequest, NewCharacter, PathLine,
    PathPoint, Paths, Progress, Tree, WorldMap,
};
pub use rendering::{
    DrawSurface, PixelFrame, RenderOptions, RenderOutcome, RenderReport, Rgba, SceneRenderer,
    SvgDocument,
};
pub use sync::{
    ApiConfig, ApiError, FieldSource, GameApi, HttpGameApi, StateSynchronizer, SyncConfig,
    ThreadedDispatcher,
};
