mod color;
mod font;
mod hud;
mod options;
mod pixel_frame;
mod scene_renderer;
mod surface;
mod svg;

pub use color::Rgba;
pub use hud::{draw_hud, draw_status_screen, status_message, HudData};
pub use options::RenderOptions;
pub use pixel_frame::PixelFrame;
pub use scene_renderer::{
    draw_render_failed_placeholder, RenderError, RenderOutcome, RenderReport, SceneRenderer,
};
pub use surface::{
    CommandRecorder, DrawCommand, DrawSurface, SurfaceError, SurfaceResult, TextAlign, TextStyle,
};
pub use svg::SvgDocument;
