use thiserror::Error;
use tracing::{debug, warn};

use crate::geometry::Vec2;
use crate::model::{Character, CharacterId, WorldMap};

use super::{DrawSurface, RenderOptions, Rgba, SurfaceError, SurfaceResult, TextStyle};

const PLACEHOLDER_TEXT: &str = "RENDER FAILED";
const PLACEHOLDER_TEXT_SIZE_PX: f32 = 15.0;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("map dimensions are not drawable: {width}x{height}")]
    InvalidMapDimensions { width: f32, height: f32 },
    #[error("drawing surface rejected a primitive: {0}")]
    Surface(#[from] SurfaceError),
}

/// What one frame actually put on the surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderReport {
    pub buildings: usize,
    pub trees: usize,
    pub path_lines: usize,
    pub path_points: usize,
    pub characters: usize,
    pub target_indicators: usize,
    pub skipped_entities: usize,
}

#[derive(Debug)]
pub enum RenderOutcome {
    Drawn(RenderReport),
    Failed(RenderError),
}

impl RenderOutcome {
    pub fn report(&self) -> Option<&RenderReport> {
        match self {
            RenderOutcome::Drawn(report) => Some(report),
            RenderOutcome::Failed(_) => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, RenderOutcome::Failed(_))
    }
}

/// Paints the world and its characters in a fixed layer order. Later layers
/// occlude earlier ones:
/// clear, buildings, trees, path lines, path points, characters, targets.
#[derive(Debug, Clone, Default)]
pub struct SceneRenderer {
    options: RenderOptions,
}

impl SceneRenderer {
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    pub fn render(
        &self,
        surface: &mut dyn DrawSurface,
        map: Option<&WorldMap>,
        characters: &[Character],
        selection: Option<CharacterId>,
    ) -> RenderOutcome {
        match self.try_render(surface, map, characters, selection) {
            Ok(report) => {
                if report.skipped_entities > 0 {
                    debug!(
                        skipped = report.skipped_entities,
                        "render_skipped_malformed_entities"
                    );
                }
                RenderOutcome::Drawn(report)
            }
            Err(error) => {
                warn!(error = %error, "render_failed");
                if let Err(placeholder_error) =
                    draw_render_failed_placeholder(surface, &self.options)
                {
                    warn!(error = %placeholder_error, "render_placeholder_failed");
                }
                RenderOutcome::Failed(error)
            }
        }
    }

    fn try_render(
        &self,
        surface: &mut dyn DrawSurface,
        map: Option<&WorldMap>,
        characters: &[Character],
        selection: Option<CharacterId>,
    ) -> Result<RenderReport, RenderError> {
        if let Some(map) = map {
            if map.dimensions().is_none() {
                return Err(RenderError::InvalidMapDimensions {
                    width: map.width,
                    height: map.height,
                });
            }
        }

        let mut report = RenderReport::default();
        surface.clear(self.options.background)?;
        if let Some(map) = map {
            self.draw_buildings(surface, map, &mut report)?;
            self.draw_trees(surface, map, &mut report)?;
            self.draw_path_lines(surface, map, &mut report)?;
            self.draw_path_points(surface, map, &mut report)?;
        }
        self.draw_characters(surface, characters, selection, &mut report)?;
        self.draw_target_indicators(surface, characters, &mut report)?;
        Ok(report)
    }

    fn draw_buildings(
        &self,
        surface: &mut dyn DrawSurface,
        map: &WorldMap,
        report: &mut RenderReport,
    ) -> Result<(), RenderError> {
        let o = &self.options;
        for building in &map.buildings {
            let Some(rect) = building.rect() else {
                report.skipped_entities += 1;
                continue;
            };
            let fill = Rgba::parse_or(building.color.as_deref(), o.building_fill);
            surface.fill_rect(rect, fill)?;
            surface.stroke_rect(rect, o.building_outline_width, o.building_outline)?;
            report.buildings += 1;
        }
        Ok(())
    }

    fn draw_trees(
        &self,
        surface: &mut dyn DrawSurface,
        map: &WorldMap,
        report: &mut RenderReport,
    ) -> Result<(), RenderError> {
        let o = &self.options;
        for tree in &map.trees {
            let Some((center, size)) = tree.circle() else {
                report.skipped_entities += 1;
                continue;
            };
            let fill = Rgba::parse_or(tree.color.as_deref(), o.tree_fill);
            surface.fill_circle(center, size, fill)?;
            surface.stroke_circle(center, size, o.tree_outline_width, o.tree_outline)?;
            report.trees += 1;
        }
        Ok(())
    }

    fn draw_path_lines(
        &self,
        surface: &mut dyn DrawSurface,
        map: &WorldMap,
        report: &mut RenderReport,
    ) -> Result<(), RenderError> {
        let o = &self.options;
        for line in &map.paths.lines {
            let Some((from, to)) = line.segment() else {
                report.skipped_entities += 1;
                continue;
            };
            let color = Rgba::parse_or(line.color.as_deref(), o.path_line_color);
            surface.stroke_line(from, to, o.path_line_width, color)?;
            report.path_lines += 1;
        }
        Ok(())
    }

    fn draw_path_points(
        &self,
        surface: &mut dyn DrawSurface,
        map: &WorldMap,
        report: &mut RenderReport,
    ) -> Result<(), RenderError> {
        let o = &self.options;
        for point in &map.paths.points {
            let Some(position) = point.position() else {
                report.skipped_entities += 1;
                continue;
            };
            surface.fill_circle(position, o.path_point_radius, o.path_point_color)?;
            report.path_points += 1;
        }
        Ok(())
    }

    fn draw_characters(
        &self,
        surface: &mut dyn DrawSurface,
        characters: &[Character],
        selection: Option<CharacterId>,
        report: &mut RenderReport,
    ) -> Result<(), RenderError> {
        let o = &self.options;
        for character in characters {
            let Some(center) = character.position() else {
                report.skipped_entities += 1;
                continue;
            };
            let fill = Rgba::parse_or(character.color.as_deref(), o.character_fill);
            surface.fill_circle(center, o.character_radius, fill)?;
            surface.stroke_circle(
                center,
                o.character_radius,
                o.character_border_width,
                o.character_border,
            )?;
            if selection == Some(character.id) {
                surface.stroke_circle(
                    center,
                    o.selection_radius,
                    o.selection_width,
                    o.selection_color,
                )?;
            }

            if !character.name.is_empty() {
                let name_y = center.y - o.character_radius - o.label_gap - o.name_text_size * 0.5;
                surface.draw_text(
                    Vec2::new(center.x, name_y),
                    &character.name,
                    TextStyle::centered(o.name_text_size, o.label_color),
                )?;
            }
            if !character.role.is_empty() {
                let role_y = center.y + o.character_radius + o.label_gap + o.role_text_size * 0.5;
                surface.draw_text(
                    Vec2::new(center.x, role_y),
                    &character.role,
                    TextStyle::centered(o.role_text_size, o.label_color),
                )?;
            }
            report.characters += 1;
        }
        Ok(())
    }

    fn draw_target_indicators(
        &self,
        surface: &mut dyn DrawSurface,
        characters: &[Character],
        report: &mut RenderReport,
    ) -> Result<(), RenderError> {
        let o = &self.options;
        for character in characters {
            if !character.has_pending_target() {
                continue;
            }
            let Some(target) = character.target() else {
                continue;
            };
            surface.stroke_circle(
                target,
                o.target_radius,
                o.target_width,
                o.target_color,
            )?;
            report.target_indicators += 1;
        }
        Ok(())
    }
}

/// Replaces whatever is on the surface with a visible failure plate.
pub fn draw_render_failed_placeholder(
    surface: &mut dyn DrawSurface,
    options: &RenderOptions,
) -> SurfaceResult {
    let (width, height) = surface.size();
    surface.clear(options.placeholder_fill)?;
    surface.draw_text(
        Vec2::new(width as f32 * 0.5, height as f32 * 0.5),
        PLACEHOLDER_TEXT,
        TextStyle::centered(PLACEHOLDER_TEXT_SIZE_PX, options.placeholder_text),
    )
}
