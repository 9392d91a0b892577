mod client;
mod loop_runner;
mod presenter;
mod presets;

pub use loop_runner::{run_client, AppError, LoopConfig};
pub use presenter::PresentError;
pub use presets::{preset_for_index, CHARACTER_COLORS, CHARACTER_ROLES};
