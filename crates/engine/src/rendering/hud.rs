use crate::geometry::{Rect, Vec2};
use crate::model::{Character, LoadStatus, MapCounts};

use super::{DrawSurface, RenderOptions, Rgba, SurfaceResult, TextStyle};

const HUD_TEXT_SIZE_PX: f32 = 10.0;
const HUD_LINE_ADVANCE: f32 = 14.0;
const HUD_PADDING: f32 = 8.0;
const HUD_GLYPH_ADVANCE: f32 = 8.0;
const HUD_PANEL_BG: Rgba = Rgba([10, 12, 16, 210]);
const HUD_PANEL_BORDER: Rgba = Rgba([92, 106, 126, 255]);
const HUD_TEXT_PRIMARY: Rgba = Rgba([244, 248, 252, 255]);
const HUD_TEXT_ERROR: Rgba = Rgba([255, 140, 140, 255]);
const STATUS_TEXT_SIZE_PX: f32 = 15.0;
const STATUS_TEXT_COLOR: Rgba = Rgba([0x2c, 0x3e, 0x50, 255]);
const MAX_ERROR_CHARS: usize = 48;

#[derive(Debug, Clone, Default)]
pub struct HudData<'a> {
    pub status: Option<&'a LoadStatus>,
    pub map_size: Option<(f32, f32)>,
    pub counts: MapCounts,
    pub character_count: usize,
    pub selected: Option<&'a Character>,
    pub network_error: Option<&'a str>,
}

/// Full-surface message shown while no map is available.
pub fn draw_status_screen(
    surface: &mut dyn DrawSurface,
    status: &LoadStatus,
    options: &RenderOptions,
) -> SurfaceResult {
    let (width, height) = surface.size();
    surface.clear(options.background)?;
    surface.draw_text(
        Vec2::new(width as f32 * 0.5, height as f32 * 0.5),
        &status_message(status),
        TextStyle::centered(STATUS_TEXT_SIZE_PX, STATUS_TEXT_COLOR),
    )
}

pub fn status_message(status: &LoadStatus) -> String {
    match status {
        LoadStatus::Loading => "LOADING...".to_string(),
        LoadStatus::Ready => "READY".to_string(),
        LoadStatus::Error(message) => format!("ERROR: {}", truncate(message)),
    }
}

/// Translucent panel in the top-left corner, drawn over a finished frame.
pub fn draw_hud(surface: &mut dyn DrawSurface, data: &HudData<'_>) -> SurfaceResult {
    let lines = build_hud_lines(data);
    let longest = lines
        .iter()
        .map(|(line, _)| line.chars().count())
        .max()
        .unwrap_or(0);
    let panel = Rect::new(
        HUD_PADDING * 0.5,
        HUD_PADDING * 0.5,
        longest as f32 * HUD_GLYPH_ADVANCE + HUD_PADDING,
        lines.len() as f32 * HUD_LINE_ADVANCE + HUD_PADDING,
    );
    surface.fill_rect(panel, HUD_PANEL_BG)?;
    surface.stroke_rect(panel, 1.0, HUD_PANEL_BORDER)?;

    let mut y = HUD_PADDING + HUD_LINE_ADVANCE * 0.5;
    for (line, color) in &lines {
        surface.draw_text(
            Vec2::new(HUD_PADDING, y),
            line,
            TextStyle::left(HUD_TEXT_SIZE_PX, *color),
        )?;
        y += HUD_LINE_ADVANCE;
    }
    Ok(())
}

fn build_hud_lines(data: &HudData<'_>) -> Vec<(String, Rgba)> {
    let mut lines = Vec::new();
    let status = data.status.map(LoadStatus::label).unwrap_or("loading");
    lines.push((format!("status: {status}"), HUD_TEXT_PRIMARY));
    lines.push((
        match data.map_size {
            Some((width, height)) => format!("map: {width:.0}x{height:.0}"),
            None => "map: none".to_string(),
        },
        HUD_TEXT_PRIMARY,
    ));
    lines.push((
        format!(
            "b/t/p: {}/{}/{}",
            data.counts.buildings, data.counts.trees, data.counts.path_points
        ),
        HUD_TEXT_PRIMARY,
    ));
    lines.push((format!("chars: {}", data.character_count), HUD_TEXT_PRIMARY));
    match data.selected {
        Some(character) => {
            lines.push((
                format!("sel: {} ({})", character.name, character.role),
                HUD_TEXT_PRIMARY,
            ));
            let position = match character.position() {
                Some(position) => format!("pos: {:.0},{:.0}", position.x, position.y),
                None => "pos: ?".to_string(),
            };
            lines.push((position, HUD_TEXT_PRIMARY));
        }
        None => lines.push(("sel: none".to_string(), HUD_TEXT_PRIMARY)),
    }
    if let Some(error) = data.network_error {
        lines.push((format!("net: {}", truncate(error)), HUD_TEXT_ERROR));
    }
    lines
}

fn truncate(message: &str) -> String {
    if message.chars().count() <= MAX_ERROR_CHARS {
        return message.to_string();
    }
    let mut short: String = message.chars().take(MAX_ERROR_CHARS - 3).collect();
    short.push_str("...");
    short
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CharacterId;
    use crate::rendering::{CommandRecorder, DrawCommand};

    fn texts(surface: &CommandRecorder) -> Vec<String> {
        surface
            .commands()
            .iter()
            .filter_map(|command| match command {
                DrawCommand::Text { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn status_screen_shows_loading_and_error() {
        let options = RenderOptions::default();
        let mut surface = CommandRecorder::new(100, 100);
        draw_status_screen(&mut surface, &LoadStatus::Loading, &options).expect("draw");
        assert_eq!(texts(&surface), vec!["LOADING...".to_string()]);

        draw_status_screen(
            &mut surface,
            &LoadStatus::Error("connection refused".to_string()),
            &options,
        )
        .expect("draw");
        assert_eq!(texts(&surface), vec!["ERROR: connection refused".to_string()]);
    }

    #[test]
    fn hud_lists_selection_and_network_error() {
        let selected = Character {
            id: CharacterId(7),
            name: "Bo".to_string(),
            role: "Miner".to_string(),
            color: None,
            x: Some(12.0),
            y: Some(34.0),
            target_x: Some(12.0),
            target_y: Some(34.0),
            speed: None,
            map_id: None,
        };
        let status = LoadStatus::Ready;
        let data = HudData {
            status: Some(&status),
            map_size: Some((800.0, 600.0)),
            counts: MapCounts {
                buildings: 2,
                trees: 3,
                path_lines: 1,
                path_points: 4,
            },
            character_count: 1,
            selected: Some(&selected),
            network_error: Some("timed out"),
        };
        let mut surface = CommandRecorder::new(800, 600);
        draw_hud(&mut surface, &data).expect("draw");

        let lines = texts(&surface);
        assert_eq!(lines[0], "status: ready");
        assert_eq!(lines[1], "map: 800x600");
        assert_eq!(lines[2], "b/t/p: 2/3/4");
        assert!(lines.contains(&"sel: Bo (Miner)".to_string()));
        assert!(lines.contains(&"pos: 12,34".to_string()));
        assert_eq!(lines.last().map(String::as_str), Some("net: timed out"));
        assert!(matches!(
            surface.commands()[0],
            DrawCommand::FillRect { color, .. } if color == HUD_PANEL_BG
        ));
    }

    #[test]
    fn selection_without_coordinates_shows_unknown_position() {
        let selected = Character {
            id: CharacterId(8),
            name: "Cy".to_string(),
            role: "Worker".to_string(),
            color: None,
            x: None,
            y: Some(1.0),
            target_x: None,
            target_y: None,
            speed: None,
            map_id: None,
        };
        let data = HudData {
            selected: Some(&selected),
            ..HudData::default()
        };
        let lines: Vec<String> = build_hud_lines(&data).into_iter().map(|(line, _)| line).collect();
        assert!(lines.contains(&"pos: ?".to_string()));
    }

    #[test]
    fn long_errors_are_truncated() {
        let long = "x".repeat(200);
        let message = status_message(&LoadStatus::Error(long));
        assert!(message.ends_with("..."));
        assert_eq!(message.chars().count(), "ERROR: ".len() + MAX_ERROR_CHARS);
    }
}
