use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;
use tracing::{info, warn};
use winit::dpi::LogicalSize;
use winit::error::{EventLoopError, OsError};
use winit::event::{ElementState, Event, KeyEvent, MouseButton, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::WindowBuilder;

use crate::input::Key;
use crate::rendering::{RenderOptions, SceneRenderer};
use crate::sync::{
    ApiConfig, GameApi, HttpGameApi, StateSynchronizer, SyncConfig, ThreadedDispatcher,
};

use super::client::{Client, FrameInput, Hotkey, HOTKEY_COUNT};
use super::presenter::Presenter;

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub window_title: String,
    pub window_width: u32,
    pub window_height: u32,
    pub max_render_fps: Option<u32>,
    pub show_hud: bool,
    pub api: ApiConfig,
    pub sync: SyncConfig,
    pub render: RenderOptions,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            window_title: "Idle Game".to_string(),
            window_width: 800,
            window_height: 600,
            max_render_fps: Some(60),
            show_hud: false,
            api: ApiConfig::default(),
            sync: SyncConfig::default(),
            render: RenderOptions::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to create event loop: {0}")]
    CreateEventLoop(#[source] EventLoopError),
    #[error("failed to create application window: {0}")]
    CreateWindow(#[source] OsError),
    #[error("failed to initialize renderer: {0}")]
    CreateRenderer(#[source] pixels::Error),
    #[error("event loop failed: {0}")]
    EventLoopRun(#[source] EventLoopError),
}

pub fn run_client(config: LoopConfig) -> Result<(), AppError> {
    let api: Arc<dyn GameApi> = Arc::new(HttpGameApi::new(&config.api));
    let dispatcher = ThreadedDispatcher::spawn(api, config.api.worker_threads);
    let sync = StateSynchronizer::new(dispatcher, config.sync.clone());
    let mut client = Client::new(
        sync,
        SceneRenderer::new(config.render.clone()),
        StdRng::from_entropy(),
        config.show_hud,
    );

    let event_loop = EventLoop::new().map_err(AppError::CreateEventLoop)?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(config.window_title.clone())
            .with_inner_size(LogicalSize::new(
                config.window_width as f64,
                config.window_height as f64,
            ))
            .build(&event_loop)
            .map_err(AppError::CreateWindow)?,
    );
    let fallback_buffer = (config.window_width.max(1), config.window_height.max(1));
    let mut presenter = Presenter::new(Arc::clone(&window), fallback_buffer.0, fallback_buffer.1)
        .map_err(AppError::CreateRenderer)?;

    event_loop.set_control_flow(ControlFlow::Poll);

    let effective_render_cap = normalize_render_fps_cap(config.max_render_fps);
    let render_frame_target = target_frame_duration(effective_render_cap);
    let mut input_collector = InputCollector::default();
    let mut last_present_instant = Instant::now();

    info!(
        base_url = %config.api.base_url,
        request_timeout_ms = config.api.request_timeout.as_millis() as u64,
        worker_threads = config.api.worker_threads,
        poll_interval_ms = config.sync.poll_interval.as_millis() as u64,
        stale_after_ms = config.sync.stale_after.as_millis() as u64,
        render_fps_cap = %format_render_cap(effective_render_cap),
        "loop_config"
    );
    client.sync_mut().start(Instant::now());

    event_loop
        .run(move |event, window_target| match event {
            Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
                WindowEvent::CloseRequested => {
                    info!(reason = "window_close", "shutdown_requested");
                    window_target.exit();
                }
                WindowEvent::Resized(new_size) => {
                    if let Err(error) = presenter.resize_surface(new_size.width, new_size.height) {
                        warn!(error = %error, "renderer_resize_failed");
                        window_target.exit();
                    }
                }
                WindowEvent::ScaleFactorChanged { .. } => {
                    let size = window.inner_size();
                    if let Err(error) = presenter.resize_surface(size.width, size.height) {
                        warn!(error = %error, "renderer_resize_failed");
                        window_target.exit();
                    }
                }
                WindowEvent::CursorMoved { position, .. } => {
                    input_collector.set_cursor_position_px(position.x as f32, position.y as f32);
                }
                WindowEvent::CursorLeft { .. } => {
                    input_collector.clear_cursor_position();
                }
                WindowEvent::MouseInput { state, button, .. } => {
                    input_collector.handle_mouse_input(button, state);
                }
                WindowEvent::KeyboardInput { event, .. } => {
                    input_collector.handle_keyboard_input(&event);
                }
                WindowEvent::RedrawRequested => {
                    let now = Instant::now();
                    client.sync_mut().tick(now);

                    let collected = input_collector.take_frame_input();
                    let frame_input = FrameInput {
                        click: collected
                            .click_px
                            .and_then(|(x, y)| presenter.window_to_frame(x, y)),
                        keys: collected.keys,
                        hotkeys: collected.hotkeys,
                    };
                    client.handle_input(&frame_input, now);

                    // Single FPS cap sleep point for render pacing.
                    let elapsed_since_last_present =
                        Instant::now().saturating_duration_since(last_present_instant);
                    let cap_sleep =
                        compute_cap_sleep(elapsed_since_last_present, render_frame_target);
                    if cap_sleep > Duration::ZERO {
                        thread::sleep(cap_sleep);
                    }

                    let (width, height) = client.buffer_size(fallback_buffer);
                    if let Err(error) = presenter.ensure_buffer_size(width, height) {
                        warn!(error = %error, width, height, "frame_buffer_resize_failed");
                    }
                    client.draw(presenter.frame_mut());
                    if let Err(error) = presenter.present() {
                        warn!(error = %error, "renderer_draw_failed");
                        window_target.exit();
                    }
                    last_present_instant = Instant::now();
                }
                _ => {}
            },
            Event::AboutToWait => {
                window.request_redraw();
            }
            Event::LoopExiting => {
                client.sync_mut().shutdown();
                info!(
                    characters = client.sync().characters().len(),
                    "shutdown"
                );
            }
            _ => {}
        })
        .map_err(AppError::EventLoopRun)
}

/// One physical key turned into a single-frame press edge.
#[derive(Debug, Clone, Copy, Default)]
struct EdgeKey {
    is_down: bool,
    pressed_edge: bool,
}

impl EdgeKey {
    fn update(&mut self, state: ElementState) {
        match state {
            ElementState::Pressed => {
                if !self.is_down {
                    self.pressed_edge = true;
                }
                self.is_down = true;
            }
            ElementState::Released => self.is_down = false,
        }
    }

    fn take(&mut self) -> bool {
        std::mem::take(&mut self.pressed_edge)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct CollectedInput {
    click_px: Option<(f32, f32)>,
    keys: Vec<Key>,
    hotkeys: [bool; HOTKEY_COUNT],
}

#[derive(Debug, Default)]
struct InputCollector {
    hotkeys: [EdgeKey; HOTKEY_COUNT],
    pending_keys: Vec<Key>,
    cursor_position_px: Option<(f32, f32)>,
    left_mouse_is_down: bool,
    left_click_px: Option<(f32, f32)>,
}

impl InputCollector {
    fn handle_keyboard_input(&mut self, key_event: &KeyEvent) {
        if let Some(hotkey) = hotkey_for(key_event.physical_key) {
            self.handle_hotkey_state(hotkey, key_event.state);
        }
        // Arrow keys act on every press, including OS key repeat.
        if key_event.state == ElementState::Pressed {
            self.handle_arrow_press(key_event.physical_key);
        }
    }

    fn handle_hotkey_state(&mut self, hotkey: Hotkey, state: ElementState) {
        self.hotkeys[hotkey.index()].update(state);
    }

    fn handle_arrow_press(&mut self, key: PhysicalKey) {
        if let Some(key) = arrow_key_for(key) {
            self.pending_keys.push(key);
        }
    }

    fn set_cursor_position_px(&mut self, x: f32, y: f32) {
        self.cursor_position_px = Some((x, y));
    }

    fn clear_cursor_position(&mut self) {
        self.cursor_position_px = None;
    }

    fn handle_mouse_input(&mut self, button: MouseButton, state: ElementState) {
        if button != MouseButton::Left {
            return;
        }
        match state {
            ElementState::Pressed => {
                if !self.left_mouse_is_down {
                    self.left_click_px = self.cursor_position_px;
                }
                self.left_mouse_is_down = true;
            }
            ElementState::Released => self.left_mouse_is_down = false,
        }
    }

    fn take_frame_input(&mut self) -> CollectedInput {
        let mut hotkeys = [false; HOTKEY_COUNT];
        for (pressed, edge) in hotkeys.iter_mut().zip(self.hotkeys.iter_mut()) {
            *pressed = edge.take();
        }
        CollectedInput {
            click_px: self.left_click_px.take(),
            keys: std::mem::take(&mut self.pending_keys),
            hotkeys,
        }
    }
}

fn hotkey_for(key: PhysicalKey) -> Option<Hotkey> {
    match key {
        PhysicalKey::Code(KeyCode::KeyR) => Some(Hotkey::RegenerateMap),
        PhysicalKey::Code(KeyCode::F5) => Some(Hotkey::Refresh),
        PhysicalKey::Code(KeyCode::KeyN) => Some(Hotkey::CreatePreset),
        PhysicalKey::Code(KeyCode::KeyM) => Some(Hotkey::RandomMove),
        PhysicalKey::Code(KeyCode::Escape) => Some(Hotkey::ClearSelection),
        PhysicalKey::Code(KeyCode::F3) => Some(Hotkey::ToggleHud),
        _ => None,
    }
}

fn arrow_key_for(key: PhysicalKey) -> Option<Key> {
    match key {
        PhysicalKey::Code(KeyCode::ArrowUp) => Some(Key::ArrowUp),
        PhysicalKey::Code(KeyCode::ArrowDown) => Some(Key::ArrowDown),
        PhysicalKey::Code(KeyCode::ArrowLeft) => Some(Key::ArrowLeft),
        PhysicalKey::Code(KeyCode::ArrowRight) => Some(Key::ArrowRight),
        _ => None,
    }
}

fn normalize_render_fps_cap(cap: Option<u32>) -> Option<u32> {
    cap.filter(|value| *value > 0)
}

fn target_frame_duration(max_render_fps: Option<u32>) -> Option<Duration> {
    max_render_fps.map(|fps| Duration::from_secs_f64(1.0 / fps as f64))
}

fn compute_cap_sleep(elapsed: Duration, target: Option<Duration>) -> Duration {
    match target {
        Some(frame_target) if elapsed < frame_target => frame_target - elapsed,
        _ => Duration::ZERO,
    }
}

fn format_render_cap(cap: Option<u32>) -> String {
    match cap {
        Some(value) => value.to_string(),
        None => "off".to_string(),
    }
}
