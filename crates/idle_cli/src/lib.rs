use std::io::Write;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use idle_engine::sync::DEFAULT_BASE_URL;
use idle_engine::{
    CharacterId, GameApi, MoveRequest, NewCharacter, PixelFrame, RenderOutcome, SceneRenderer,
    SvgDocument, WorldMap,
};
use serde::Serialize;

pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_RETRY_MS: u64 = 100;
const MAX_RETRY_BACKOFF_MS: u64 = 1_000;
const PROGRESS_COMPLETE: f32 = 100.0;
const MAX_SNAPSHOT_DIMENSION: u32 = 4096;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommonOptions {
    pub base_url: String,
    pub timeout_ms: u64,
    pub retry_ms: u64,
}

impl Default for CommonOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            retry_ms: DEFAULT_RETRY_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommandKind {
    Map,
    Generate,
    Characters,
    Create {
        name: String,
        role: String,
        color: String,
    },
    Move {
        id: CharacterId,
        x: f32,
        y: f32,
    },
    Progress {
        wait: bool,
    },
    Snapshot {
        path: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotFormat {
    Svg,
    Png,
}

pub fn snapshot_format(path: &str) -> Result<SnapshotFormat, String> {
    let extension = Path::new(path)
        .extension()
        .and_then(|extension| extension.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("svg") => Ok(SnapshotFormat::Svg),
        Some("png") => Ok(SnapshotFormat::Png),
        _ => Err(format!(
            "unsupported snapshot path '{path}' (expected .svg or .png)"
        )),
    }
}

/// Parses the subcommand and its arguments, everything after the global
/// flags.
pub fn parse_command(command: &str, args: &[String]) -> Result<CommandKind, String> {
    let no_args = |kind: CommandKind| {
        if args.is_empty() {
            Ok(kind)
        } else {
            Err(format!("{command} takes no arguments"))
        }
    };

    match command {
        "map" => no_args(CommandKind::Map),
        "generate" => no_args(CommandKind::Generate),
        "characters" => no_args(CommandKind::Characters),
        "create" => {
            let [name, role, color] = args else {
                return Err("create requires <name> <role> <color>".to_string());
            };
            Ok(CommandKind::Create {
                name: name.clone(),
                role: role.clone(),
                color: color.clone(),
            })
        }
        "move" => {
            let [id, x, y] = args else {
                return Err("move requires <id> <x> <y>".to_string());
            };
            let id = id
                .parse::<u64>()
                .map_err(|_| format!("invalid character id '{id}' (expected u64)"))?;
            Ok(CommandKind::Move {
                id: CharacterId(id),
                x: parse_coordinate("x", x)?,
                y: parse_coordinate("y", y)?,
            })
        }
        "progress" => {
            let mut wait = false;
            for arg in args {
                if arg == "--wait" {
                    wait = true;
                } else {
                    return Err(format!(
                        "unknown progress argument '{arg}' (expected --wait)"
                    ));
                }
            }
            Ok(CommandKind::Progress { wait })
        }
        "snapshot" => {
            let [path] = args else {
                return Err("snapshot requires a single <path.svg|path.png>".to_string());
            };
            snapshot_format(path)?;
            Ok(CommandKind::Snapshot { path: path.clone() })
        }
        other => Err(format!("unknown subcommand '{other}'")),
    }
}

fn parse_coordinate(axis: &str, raw: &str) -> Result<f32, String> {
    match raw.parse::<f32>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(format!("invalid {axis} value '{raw}' (expected a finite number)")),
    }
}

pub fn run<W: Write>(
    kind: CommandKind,
    api: &dyn GameApi,
    opts: &CommonOptions,
    stdout: &mut W,
) -> Result<(), String> {
    match kind {
        CommandKind::Map => {
            let map = api.fetch_map().map_err(|error| error.to_string())?;
            emit_json(stdout, &map)
        }
        CommandKind::Generate => {
            let map = api.generate_map().map_err(|error| error.to_string())?;
            emit_json(stdout, &map)
        }
        CommandKind::Characters => {
            let characters = api.fetch_characters().map_err(|error| error.to_string())?;
            emit_json(stdout, &characters)
        }
        CommandKind::Create { name, role, color } => {
            let map = api
                .fetch_map()
                .map_err(|error| format!("cannot create character without a map: {error}"))?;
            let request = NewCharacter {
                name,
                role,
                color,
                map_id: map.id,
            };
            let created = api
                .create_character(&request)
                .map_err(|error| error.to_string())?;
            emit_json(stdout, &created)
        }
        CommandKind::Move { id, x, y } => {
            let moved = api
                .move_character(
                    id,
                    MoveRequest {
                        target_x: x,
                        target_y: y,
                    },
                )
                .map_err(|error| error.to_string())?;
            emit_json(stdout, &moved)
        }
        CommandKind::Progress { wait: false } => {
            let progress = api.progress().map_err(|error| error.to_string())?;
            emit_line(stdout, &format_progress(progress.progress))
        }
        CommandKind::Progress { wait: true } => wait_for_progress(api, opts, stdout),
        CommandKind::Snapshot { path } => {
            let map = api.fetch_map().map_err(|error| error.to_string())?;
            let characters = api.fetch_characters().map_err(|error| error.to_string())?;
            write_snapshot(&path, &map, &characters)?;
            emit_line(stdout, &format!("wrote {path}"))
        }
    }
}

/// Polls progress with exponential backoff until it reaches 100 or the
/// timeout elapses. Transport errors count as "not yet" so a server that is
/// still starting does not end the wait.
fn wait_for_progress<W: Write>(
    api: &dyn GameApi,
    opts: &CommonOptions,
    stdout: &mut W,
) -> Result<(), String> {
    let deadline = Instant::now() + Duration::from_millis(opts.timeout_ms);
    let retry_base = opts.retry_ms.max(1);
    let mut attempt = 0u32;
    let mut last_reported: Option<f32> = None;
    let mut last_error: Option<String> = None;

    loop {
        match api.progress() {
            Ok(progress) => {
                last_error = None;
                if last_reported != Some(progress.progress) {
                    emit_line(stdout, &format_progress(progress.progress))?;
                    last_reported = Some(progress.progress);
                }
                if progress.progress >= PROGRESS_COMPLETE {
                    return Ok(());
                }
            }
            Err(error) => last_error = Some(error.to_string()),
        }

        let shift = attempt.min(8);
        let backoff_ms = retry_base
            .saturating_mul(1u64 << shift)
            .min(MAX_RETRY_BACKOFF_MS);
        let sleep_for = Duration::from_millis(backoff_ms.max(1));
        if Instant::now() + sleep_for >= deadline {
            break;
        }
        thread::sleep(sleep_for);
        attempt = attempt.saturating_add(1);
    }

    match last_error {
        Some(error) => Err(format!(
            "timed out waiting for progress to complete (last error: {error})"
        )),
        None => Err("timed out waiting for progress to complete".to_string()),
    }
}

pub fn format_progress(progress: f32) -> String {
    format!("progress: {:.0}%", progress.clamp(0.0, PROGRESS_COMPLETE))
}

fn snapshot_size(map: &WorldMap) -> Result<(u32, u32), String> {
    let (width, height) = map
        .dimensions()
        .ok_or_else(|| format!("map dimensions are not drawable: {}x{}", map.width, map.height))?;
    Ok((
        (width.ceil() as u32).clamp(1, MAX_SNAPSHOT_DIMENSION),
        (height.ceil() as u32).clamp(1, MAX_SNAPSHOT_DIMENSION),
    ))
}

pub fn write_snapshot(
    path: &str,
    map: &WorldMap,
    characters: &[idle_engine::Character],
) -> Result<(), String> {
    let format = snapshot_format(path)?;
    let (width, height) = snapshot_size(map)?;
    let renderer = SceneRenderer::default();

    match format {
        SnapshotFormat::Svg => {
            let mut document = SvgDocument::new(width, height);
            check_outcome(renderer.render(&mut document, Some(map), characters, None))?;
            std::fs::write(path, document.finish())
                .map_err(|error| format!("failed to write snapshot '{path}': {error}"))
        }
        SnapshotFormat::Png => {
            let mut frame = PixelFrame::new(width, height);
            check_outcome(renderer.render(&mut frame, Some(map), characters, None))?;
            let image = image::RgbaImage::from_raw(width, height, frame.into_bytes())
                .ok_or_else(|| "frame buffer does not match snapshot size".to_string())?;
            image
                .save(path)
                .map_err(|error| format!("failed to write snapshot '{path}': {error}"))
        }
    }
}

fn check_outcome(outcome: RenderOutcome) -> Result<(), String> {
    match outcome {
        RenderOutcome::Drawn(_) => Ok(()),
        RenderOutcome::Failed(error) => Err(format!("render failed: {error}")),
    }
}

fn emit_json<W: Write, T: Serialize>(stdout: &mut W, value: &T) -> Result<(), String> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|error| format!("failed to encode output: {error}"))?;
    emit_line(stdout, &json)
}

fn emit_line<W: Write>(stdout: &mut W, line: &str) -> Result<(), String> {
    writeln!(stdout, "{line}").map_err(|error| format!("failed to write stdout: {error}"))
}
