use thiserror::Error;

use crate::geometry::{Rect, Vec2};

use super::Rgba;

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("surface has zero area ({width}x{height})")]
    ZeroArea { width: u32, height: u32 },
    #[error("failed to write vector output: {0}")]
    Write(#[from] std::fmt::Error),
}

pub type SurfaceResult = Result<(), SurfaceError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub size_px: f32,
    pub color: Rgba,
    pub align: TextAlign,
}

impl TextStyle {
    pub fn centered(size_px: f32, color: Rgba) -> Self {
        Self {
            size_px,
            color,
            align: TextAlign::Center,
        }
    }

    pub fn left(size_px: f32, color: Rgba) -> Self {
        Self {
            size_px,
            color,
            align: TextAlign::Left,
        }
    }
}

/// The only drawing primitives the scene renderer relies on.
///
/// Text is anchored on its vertical middle; `TextAlign` decides whether the
/// anchor x is the left edge or the horizontal center.
pub trait DrawSurface {
    fn size(&self) -> (u32, u32);
    fn clear(&mut self, color: Rgba) -> SurfaceResult;
    fn fill_rect(&mut self, rect: Rect, color: Rgba) -> SurfaceResult;
    fn stroke_rect(&mut self, rect: Rect, width: f32, color: Rgba) -> SurfaceResult;
    fn fill_circle(&mut self, center: Vec2, radius: f32, color: Rgba) -> SurfaceResult;
    fn stroke_circle(&mut self, center: Vec2, radius: f32, width: f32, color: Rgba)
        -> SurfaceResult;
    fn stroke_line(&mut self, from: Vec2, to: Vec2, width: f32, color: Rgba) -> SurfaceResult;
    fn draw_text(&mut self, anchor: Vec2, text: &str, style: TextStyle) -> SurfaceResult;
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Clear(Rgba),
    FillRect {
        rect: Rect,
        color: Rgba,
    },
    StrokeRect {
        rect: Rect,
        width: f32,
        color: Rgba,
    },
    FillCircle {
        center: Vec2,
        radius: f32,
        color: Rgba,
    },
    StrokeCircle {
        center: Vec2,
        radius: f32,
        width: f32,
        color: Rgba,
    },
    StrokeLine {
        from: Vec2,
        to: Vec2,
        width: f32,
        color: Rgba,
    },
    Text {
        anchor: Vec2,
        text: String,
        style: TextStyle,
    },
}

/// Surface that remembers every primitive instead of rasterizing it.
#[derive(Debug, Clone)]
pub struct CommandRecorder {
    width: u32,
    height: u32,
    commands: Vec<DrawCommand>,
    fail_after: Option<usize>,
}

impl CommandRecorder {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            commands: Vec::new(),
            fail_after: None,
        }
    }

    /// Makes primitives fail once `count` commands are held. `clear` still
    /// succeeds and empties the log.
    pub fn failing_after(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.commands)
    }

    fn record(&mut self, command: DrawCommand) -> SurfaceResult {
        if let Some(limit) = self.fail_after {
            if self.commands.len() >= limit {
                return Err(SurfaceError::Write(std::fmt::Error));
            }
        }
        self.commands.push(command);
        Ok(())
    }
}

impl DrawSurface for CommandRecorder {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn clear(&mut self, color: Rgba) -> SurfaceResult {
        // A clear always lands so a failed frame can still be replaced.
        self.commands.clear();
        self.commands.push(DrawCommand::Clear(color));
        Ok(())
    }

    fn fill_rect(&mut self, rect: Rect, color: Rgba) -> SurfaceResult {
        self.record(DrawCommand::FillRect { rect, color })
    }

    fn stroke_rect(&mut self, rect: Rect, width: f32, color: Rgba) -> SurfaceResult {
        self.record(DrawCommand::StrokeRect { rect, width, color })
    }

    fn fill_circle(&mut self, center: Vec2, radius: f32, color: Rgba) -> SurfaceResult {
        self.record(DrawCommand::FillCircle {
            center,
            radius,
            color,
        })
    }

    fn stroke_circle(
        &mut self,
        center: Vec2,
        radius: f32,
        width: f32,
        color: Rgba,
    ) -> SurfaceResult {
        self.record(DrawCommand::StrokeCircle {
            center,
            radius,
            width,
            color,
        })
    }

    fn stroke_line(&mut self, from: Vec2, to: Vec2, width: f32, color: Rgba) -> SurfaceResult {
        self.record(DrawCommand::StrokeLine {
            from,
            to,
            width,
            color,
        })
    }

    fn draw_text(&mut self, anchor: Vec2, text: &str, style: TextStyle) -> SurfaceResult {
        self.record(DrawCommand::Text {
            anchor,
            text: text.to_string(),
            style,
        })
    }
}
