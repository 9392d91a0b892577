use std::time::Instant;

use rand::rngs::StdRng;
use tracing::{debug, info, warn};

use crate::geometry::Vec2;
use crate::input::{InputController, Key};
use crate::model::LoadStatus;
use crate::rendering::{
    draw_hud, draw_status_screen, DrawSurface, HudData, RenderOutcome, SceneRenderer,
};
use crate::sync::{RequestSink, StateSynchronizer};

use super::presets::preset_for_index;

const MAX_BUFFER_DIMENSION: u32 = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Hotkey {
    RegenerateMap,
    Refresh,
    CreatePreset,
    RandomMove,
    ClearSelection,
    ToggleHud,
}

pub(crate) const HOTKEY_COUNT: usize = 6;

impl Hotkey {
    pub(crate) const fn index(self) -> usize {
        match self {
            Hotkey::RegenerateMap => 0,
            Hotkey::Refresh => 1,
            Hotkey::CreatePreset => 2,
            Hotkey::RandomMove => 3,
            Hotkey::ClearSelection => 4,
            Hotkey::ToggleHud => 5,
        }
    }
}

/// Everything the window collected since the previous frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct FrameInput {
    /// Left click position, already mapped into frame buffer coordinates.
    pub click: Option<Vec2>,
    pub keys: Vec<Key>,
    pub hotkeys: [bool; HOTKEY_COUNT],
}

impl FrameInput {
    pub(crate) fn pressed(&self, hotkey: Hotkey) -> bool {
        self.hotkeys[hotkey.index()]
    }
}

/// Windowless half of the client: routes frame input into the synchronizer
/// and paints the current view.
pub(crate) struct Client<S: RequestSink> {
    sync: StateSynchronizer<S>,
    controller: InputController,
    renderer: SceneRenderer,
    rng: StdRng,
    next_preset: usize,
    hud_visible: bool,
    last_render_failed: bool,
}

impl<S: RequestSink> Client<S> {
    pub(crate) fn new(
        sync: StateSynchronizer<S>,
        renderer: SceneRenderer,
        rng: StdRng,
        hud_visible: bool,
    ) -> Self {
        Self {
            sync,
            controller: InputController::default(),
            renderer,
            rng,
            next_preset: 0,
            hud_visible,
            last_render_failed: false,
        }
    }

    pub(crate) fn sync(&self) -> &StateSynchronizer<S> {
        &self.sync
    }

    pub(crate) fn sync_mut(&mut self) -> &mut StateSynchronizer<S> {
        &mut self.sync
    }

    pub(crate) fn handle_input(&mut self, input: &FrameInput, now: Instant) {
        if input.pressed(Hotkey::ToggleHud) {
            self.hud_visible = !self.hud_visible;
            info!(hud_visible = self.hud_visible, "hud_toggled");
        }
        if input.pressed(Hotkey::Refresh) {
            self.sync.refresh(now);
        }
        if input.pressed(Hotkey::RegenerateMap) {
            info!("map_regenerate_requested");
            self.sync.regenerate_map();
        }
        if input.pressed(Hotkey::CreatePreset) {
            let map_id = self.sync.map().and_then(|map| map.id);
            let preset = preset_for_index(self.next_preset, map_id);
            self.next_preset += 1;
            self.sync.create_character(preset);
        }
        if input.pressed(Hotkey::ClearSelection) {
            self.sync.clear_selection();
        }
        if input.pressed(Hotkey::RandomMove) {
            match self.sync.selected() {
                Some(id) => {
                    if self.sync.move_character_randomly(id, &mut self.rng).is_none() {
                        debug!(character_id = id.0, "random_move_without_path_points");
                    }
                }
                None => debug!("random_move_without_selection"),
            }
        }

        if let Some(point) = input.click {
            let view = self.sync.view();
            let action = self.controller.on_pointer_down(
                point,
                view.characters(),
                view.path_points(),
                view.selected(),
            );
            if let Some(action) = action {
                self.sync.apply(action);
            }
        }

        // winit has no default key action, so `suppress_default` has nothing
        // to suppress in this host.
        for key in &input.keys {
            let view = self.sync.view();
            let outcome = self
                .controller
                .on_key_down(*key, view.characters(), view.selected());
            if let Some(action) = outcome.action {
                self.sync.apply(action);
            }
        }
    }

    /// Frame buffer size: the map's own dimensions once known.
    pub(crate) fn buffer_size(&self, fallback: (u32, u32)) -> (u32, u32) {
        match self.sync.map().and_then(|map| map.dimensions()) {
            Some((width, height)) => (
                (width.ceil() as u32).clamp(1, MAX_BUFFER_DIMENSION),
                (height.ceil() as u32).clamp(1, MAX_BUFFER_DIMENSION),
            ),
            None => fallback,
        }
    }

    pub(crate) fn draw(&mut self, surface: &mut dyn DrawSurface) {
        let view = self.sync.view();
        let options = self.renderer.options();

        if view.map().is_none() && *view.status() != LoadStatus::Ready {
            if let Err(error) = draw_status_screen(surface, view.status(), options) {
                warn!(error = %error, "status_screen_draw_failed");
            }
        } else {
            let outcome =
                self.renderer
                    .render(surface, view.map(), view.characters(), view.selected());
            let failed = matches!(outcome, RenderOutcome::Failed(_));
            if failed != self.last_render_failed {
                if failed {
                    warn!("frame_render_failed_placeholder_shown");
                } else {
                    info!("frame_render_recovered");
                }
                self.last_render_failed = failed;
            }
        }

        if self.hud_visible {
            let hud = HudData {
                status: Some(view.status()),
                map_size: view.map().map(|map| (map.width, map.height)),
                counts: view.map().map(|map| map.counts()).unwrap_or_default(),
                character_count: view.characters().len(),
                selected: view.selected_character(),
                network_error: view.last_network_error(),
            };
            if let Err(error) = draw_hud(surface, &hud) {
                warn!(error = %error, "hud_draw_failed");
            }
        }
    }
}
