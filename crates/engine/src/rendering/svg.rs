use std::fmt::Write as _;

use crate::geometry::{Rect, Vec2};

use super::{DrawSurface, Rgba, SurfaceResult, TextAlign, TextStyle};

/// Vector backend that serializes primitives into a standalone SVG document.
#[derive(Debug, Clone)]
pub struct SvgDocument {
    width: u32,
    height: u32,
    body: String,
}

impl SvgDocument {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            body: String::new(),
        }
    }

    pub fn finish(&self) -> String {
        format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">\n{body}</svg>\n",
            w = self.width,
            h = self.height,
            body = self.body
        )
    }
}

impl DrawSurface for SvgDocument {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn clear(&mut self, color: Rgba) -> SurfaceResult {
        self.body.clear();
        writeln!(
            self.body,
            "<rect x=\"0\" y=\"0\" width=\"{}\" height=\"{}\" fill=\"{}\"/>",
            self.width, self.height, color
        )?;
        Ok(())
    }

    fn fill_rect(&mut self, rect: Rect, color: Rgba) -> SurfaceResult {
        writeln!(
            self.body,
            "<rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"{}\"{}/>",
            rect.x,
            rect.y,
            rect.width,
            rect.height,
            color,
            opacity_attr("fill-opacity", color)
        )?;
        Ok(())
    }

    fn stroke_rect(&mut self, rect: Rect, width: f32, color: Rgba) -> SurfaceResult {
        writeln!(
            self.body,
            "<rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"{}\"{}/>",
            rect.x,
            rect.y,
            rect.width,
            rect.height,
            color,
            width,
            opacity_attr("stroke-opacity", color)
        )?;
        Ok(())
    }

    fn fill_circle(&mut self, center: Vec2, radius: f32, color: Rgba) -> SurfaceResult {
        writeln!(
            self.body,
            "<circle cx=\"{}\" cy=\"{}\" r=\"{}\" fill=\"{}\"{}/>",
            center.x,
            center.y,
            radius,
            color,
            opacity_attr("fill-opacity", color)
        )?;
        Ok(())
    }

    fn stroke_circle(
        &mut self,
        center: Vec2,
        radius: f32,
        width: f32,
        color: Rgba,
    ) -> SurfaceResult {
        writeln!(
            self.body,
            "<circle cx=\"{}\" cy=\"{}\" r=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"{}\"{}/>",
            center.x,
            center.y,
            radius,
            color,
            width,
            opacity_attr("stroke-opacity", color)
        )?;
        Ok(())
    }

    fn stroke_line(&mut self, from: Vec2, to: Vec2, width: f32, color: Rgba) -> SurfaceResult {
        writeln!(
            self.body,
            "<line x1=\"{}\" y1=\"{}\" x2=\"{}\" y2=\"{}\" stroke=\"{}\" stroke-width=\"{}\"{}/>",
            from.x,
            from.y,
            to.x,
            to.y,
            color,
            width,
            opacity_attr("stroke-opacity", color)
        )?;
        Ok(())
    }

    fn draw_text(&mut self, anchor: Vec2, text: &str, style: TextStyle) -> SurfaceResult {
        let text_anchor = match style.align {
            TextAlign::Left => "start",
            TextAlign::Center => "middle",
        };
        writeln!(
            self.body,
            "<text x=\"{}\" y=\"{}\" font-family=\"Arial, sans-serif\" font-size=\"{}\" text-anchor=\"{}\" dominant-baseline=\"middle\" fill=\"{}\">{}</text>",
            anchor.x,
            anchor.y,
            style.size_px,
            text_anchor,
            style.color,
            escape_xml(text)
        )?;
        Ok(())
    }
}

fn opacity_attr(name: &str, color: Rgba) -> String {
    if color.alpha() == 255 {
        return String::new();
    }
    format!(" {name}=\"{:.3}\"", color.alpha() as f32 / 255.0)
}

fn escape_xml(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
