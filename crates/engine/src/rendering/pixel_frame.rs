use std::fmt::Write as _;

use sha2::{Digest, Sha256};

use crate::geometry::{distance_sq_to_segment, Rect, Vec2};

use super::font::{glyph, GLYPH_HEIGHT, GLYPH_WIDTH};
use super::{DrawSurface, Rgba, SurfaceError, SurfaceResult, TextAlign, TextStyle};

/// Thinnest stroke that still closes diagonal gaps when sampling pixel centers.
const MIN_STROKE_HALF_WIDTH: f32 = 0.6;

/// RGBA8 software raster target. Pixels are sampled at their centers, so the
/// same primitives always light the same pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelFrame {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl PixelFrame {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 4],
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if self.width == width && self.height == height {
            return;
        }
        self.width = width;
        self.height = height;
        self.pixels = vec![0; width as usize * height as usize * 4];
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        let mut rgba = [0u8; 4];
        rgba.copy_from_slice(&self.pixels[offset..offset + 4]);
        Some(Rgba(rgba))
    }

    /// SHA-256 of the raw frame bytes, lowercase hex.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.width.to_le_bytes());
        hasher.update(self.height.to_le_bytes());
        hasher.update(&self.pixels);
        let mut hex = String::with_capacity(64);
        for byte in hasher.finalize().iter() {
            let _ = write!(hex, "{byte:02x}");
        }
        hex
    }

    fn ensure_area(&self) -> SurfaceResult {
        if self.width == 0 || self.height == 0 {
            return Err(SurfaceError::ZeroArea {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }

    fn blend_pixel(&mut self, x: i32, y: i32, color: Rgba) {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        let dst = &mut self.pixels[offset..offset + 4];
        let alpha = color.alpha() as u32;
        if alpha == 255 {
            dst.copy_from_slice(&color.0);
            return;
        }
        let inv = 255 - alpha;
        for channel in 0..3 {
            let blended = (color.0[channel] as u32 * alpha + dst[channel] as u32 * inv + 127) / 255;
            dst[channel] = blended as u8;
        }
        dst[3] = 255;
    }

    fn fill_span_rect(&mut self, left: i32, top: i32, right: i32, bottom: i32, color: Rgba) {
        let left = left.max(0);
        let top = top.max(0);
        let right = right.min(self.width as i32);
        let bottom = bottom.min(self.height as i32);
        for y in top..bottom {
            for x in left..right {
                self.blend_pixel(x, y, color);
            }
        }
    }

    /// Visits pixel centers inside the padded bounding box of a shape.
    fn for_each_center_in(
        &mut self,
        min: Vec2,
        max: Vec2,
        color: Rgba,
        mut inside: impl FnMut(Vec2) -> bool,
    ) {
        let x0 = (min.x.floor() as i32).max(0);
        let y0 = (min.y.floor() as i32).max(0);
        let x1 = (max.x.ceil() as i32).min(self.width as i32 - 1);
        let y1 = (max.y.ceil() as i32).min(self.height as i32 - 1);
        for y in y0..=y1 {
            for x in x0..=x1 {
                if inside(Vec2::new(x as f32 + 0.5, y as f32 + 0.5)) {
                    self.blend_pixel(x, y, color);
                }
            }
        }
    }
}

impl DrawSurface for PixelFrame {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn clear(&mut self, color: Rgba) -> SurfaceResult {
        self.ensure_area()?;
        let opaque = color.with_alpha(255);
        for chunk in self.pixels.chunks_exact_mut(4) {
            chunk.copy_from_slice(&opaque.0);
        }
        Ok(())
    }

    fn fill_rect(&mut self, rect: Rect, color: Rgba) -> SurfaceResult {
        self.ensure_area()?;
        self.fill_span_rect(
            rect.x.round() as i32,
            rect.y.round() as i32,
            (rect.x + rect.width).round() as i32,
            (rect.y + rect.height).round() as i32,
            color,
        );
        Ok(())
    }

    fn stroke_rect(&mut self, rect: Rect, width: f32, color: Rgba) -> SurfaceResult {
        self.ensure_area()?;
        let half = (width * 0.5).max(0.5);
        let outer_left = (rect.x - half).round() as i32;
        let outer_top = (rect.y - half).round() as i32;
        let outer_right = (rect.x + rect.width + half).round() as i32;
        let outer_bottom = (rect.y + rect.height + half).round() as i32;
        let inner_left = (rect.x + half).round() as i32;
        let inner_top = (rect.y + half).round() as i32;
        let inner_right = (rect.x + rect.width - half).round() as i32;
        let inner_bottom = (rect.y + rect.height - half).round() as i32;

        self.fill_span_rect(outer_left, outer_top, outer_right, inner_top, color);
        self.fill_span_rect(outer_left, inner_bottom, outer_right, outer_bottom, color);
        self.fill_span_rect(outer_left, inner_top, inner_left, inner_bottom, color);
        self.fill_span_rect(inner_right, inner_top, outer_right, inner_bottom, color);
        Ok(())
    }

    fn fill_circle(&mut self, center: Vec2, radius: f32, color: Rgba) -> SurfaceResult {
        self.ensure_area()?;
        let r_sq = radius * radius;
        self.for_each_center_in(
            center.offset(-radius, -radius),
            center.offset(radius, radius),
            color,
            |p| {
                let dx = p.x - center.x;
                let dy = p.y - center.y;
                dx * dx + dy * dy <= r_sq
            },
        );
        Ok(())
    }

    fn stroke_circle(
        &mut self,
        center: Vec2,
        radius: f32,
        width: f32,
        color: Rgba,
    ) -> SurfaceResult {
        self.ensure_area()?;
        let half = (width * 0.5).max(MIN_STROKE_HALF_WIDTH);
        let reach = radius + half;
        self.for_each_center_in(
            center.offset(-reach, -reach),
            center.offset(reach, reach),
            color,
            |p| (p.distance_to(center) - radius).abs() <= half,
        );
        Ok(())
    }

    fn stroke_line(&mut self, from: Vec2, to: Vec2, width: f32, color: Rgba) -> SurfaceResult {
        self.ensure_area()?;
        let half = (width * 0.5).max(MIN_STROKE_HALF_WIDTH);
        let min = Vec2::new(from.x.min(to.x) - half, from.y.min(to.y) - half);
        let max = Vec2::new(from.x.max(to.x) + half, from.y.max(to.y) + half);
        let half_sq = half * half;
        self.for_each_center_in(min, max, color, |p| {
            distance_sq_to_segment(p, from, to) <= half_sq
        });
        Ok(())
    }

    fn draw_text(&mut self, anchor: Vec2, text: &str, style: TextStyle) -> SurfaceResult {
        self.ensure_area()?;
        if !anchor.is_finite() {
            return Ok(());
        }
        // Layout runs in i64 so far off-frame anchors cannot overflow.
        let scale = ((style.size_px / GLYPH_HEIGHT as f32).round() as i64).max(1);
        let advance = i64::from(GLYPH_WIDTH + 1) * scale;
        let char_count = text.chars().count() as i64;
        let text_width = (char_count * advance - scale).max(0);
        let text_height = i64::from(GLYPH_HEIGHT) * scale;
        let left = match style.align {
            TextAlign::Left => anchor.x.round() as i64,
            TextAlign::Center => (anchor.x - text_width as f32 * 0.5).round() as i64,
        };
        let top = (anchor.y - text_height as f32 * 0.5).round() as i64;

        let frame_width = i64::from(self.width);
        let frame_height = i64::from(self.height);
        if left >= frame_width
            || top >= frame_height
            || left + text_width <= 0
            || top + text_height <= 0
        {
            return Ok(());
        }

        for (index, ch) in text.chars().enumerate() {
            let glyph_left = left + index as i64 * advance;
            if glyph_left >= frame_width {
                break;
            }
            if glyph_left + advance <= 0 {
                continue;
            }
            for (row, bits) in glyph(ch).iter().enumerate() {
                for col in 0..GLYPH_WIDTH {
                    if bits & (1 << (GLYPH_WIDTH - 1 - col)) == 0 {
                        continue;
                    }
                    let px = glyph_left + i64::from(col) * scale;
                    let py = top + row as i64 * scale;
                    self.fill_span_rect(
                        clamp_px(px),
                        clamp_px(py),
                        clamp_px(px + scale),
                        clamp_px(py + scale),
                        style.color,
                    );
                }
            }
        }
        Ok(())
    }
}

fn clamp_px(value: i64) -> i32 {
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgba = Rgba::rgb(255, 0, 0);
    const BLUE: Rgba = Rgba::rgb(0, 0, 255);

    fn count_color(frame: &PixelFrame, color: Rgba) -> usize {
        frame
            .as_bytes()
            .chunks_exact(4)
            .filter(|px| *px == color.0)
            .count()
    }

    #[test]
    fn clear_fills_every_pixel() {
        let mut frame = PixelFrame::new(4, 3);
        frame.clear(BLUE).expect("clear");
        assert_eq!(count_color(&frame, BLUE), 12);
    }

    #[test]
    fn zero_area_frame_rejects_drawing() {
        let mut frame = PixelFrame::new(0, 10);
        assert!(matches!(
            frame.clear(BLUE),
            Err(SurfaceError::ZeroArea {
                width: 0,
                height: 10
            })
        ));
    }

    #[test]
    fn fill_rect_is_clipped_to_frame() {
        let mut frame = PixelFrame::new(10, 10);
        frame.clear(Rgba::WHITE).expect("clear");
        frame
            .fill_rect(
                Rect {
                    x: 8.0,
                    y: 8.0,
                    width: 5.0,
                    height: 5.0,
                },
                RED,
            )
            .expect("fill");
        assert_eq!(count_color(&frame, RED), 4);
        assert_eq!(frame.pixel(9, 9), Some(RED));
        assert_eq!(frame.pixel(7, 7), Some(Rgba::WHITE));
    }

    #[test]
    fn filled_circle_covers_center_not_corners() {
        let mut frame = PixelFrame::new(40, 40);
        frame.clear(Rgba::WHITE).expect("clear");
        frame
            .fill_circle(Vec2::new(20.0, 20.0), 15.0, RED)
            .expect("circle");
        assert_eq!(frame.pixel(20, 20), Some(RED));
        assert_eq!(frame.pixel(6, 20), Some(RED));
        assert_eq!(frame.pixel(6, 6), Some(Rgba::WHITE));
    }

    #[test]
    fn stroked_circle_leaves_interior_untouched() {
        let mut frame = PixelFrame::new(40, 40);
        frame.clear(Rgba::WHITE).expect("clear");
        frame
            .stroke_circle(Vec2::new(20.0, 20.0), 8.0, 1.0, RED)
            .expect("ring");
        assert_eq!(frame.pixel(20, 20), Some(Rgba::WHITE));
        assert_eq!(frame.pixel(27, 19), Some(RED));
    }

    #[test]
    fn thick_line_covers_its_width() {
        let mut frame = PixelFrame::new(20, 20);
        frame.clear(Rgba::WHITE).expect("clear");
        frame
            .stroke_line(Vec2::new(0.0, 10.0), Vec2::new(20.0, 10.0), 6.0, RED)
            .expect("line");
        assert_eq!(frame.pixel(5, 7), Some(RED));
        assert_eq!(frame.pixel(5, 12), Some(RED));
        assert_eq!(frame.pixel(5, 14), Some(Rgba::WHITE));
    }

    #[test]
    fn translucent_color_blends_over_background() {
        let mut frame = PixelFrame::new(1, 1);
        frame.clear(Rgba::BLACK).expect("clear");
        frame
            .fill_rect(
                Rect {
                    x: 0.0,
                    y: 0.0,
                    width: 1.0,
                    height: 1.0,
                },
                Rgba::WHITE.with_alpha(128),
            )
            .expect("fill");
        assert_eq!(frame.pixel(0, 0), Some(Rgba::rgb(128, 128, 128)));
    }

    #[test]
    fn centered_text_is_symmetric_around_anchor() {
        let mut frame = PixelFrame::new(40, 20);
        frame.clear(Rgba::WHITE).expect("clear");
        frame
            .draw_text(Vec2::new(20.0, 10.0), "I", TextStyle::centered(5.0, RED))
            .expect("text");
        assert_eq!(frame.pixel(19, 8), Some(RED));
        assert_eq!(frame.pixel(20, 8), Some(RED));
        assert_eq!(frame.pixel(21, 8), Some(RED));
        assert_eq!(frame.pixel(20, 10), Some(RED));
        assert_eq!(frame.pixel(18, 10), Some(Rgba::WHITE));
    }

    #[test]
    fn text_far_outside_frame_is_skipped() {
        let mut frame = PixelFrame::new(40, 20);
        frame.clear(Rgba::WHITE).expect("clear");
        let before = frame.digest();
        for anchor in [
            Vec2::new(3.0e9, 10.0),
            Vec2::new(-3.0e9, 10.0),
            Vec2::new(10.0, 3.0e9),
            Vec2::new(f32::MAX, f32::MAX),
        ] {
            frame
                .draw_text(anchor, "Farmer", TextStyle::centered(8.0, RED))
                .expect("text");
        }
        assert_eq!(frame.digest(), before);
    }

    #[test]
    fn text_straddling_left_edge_draws_visible_glyphs() {
        let mut frame = PixelFrame::new(20, 10);
        frame.clear(Rgba::WHITE).expect("clear");
        frame
            .draw_text(
                Vec2::new(-4.0, 5.0),
                "II",
                TextStyle {
                    size_px: 5.0,
                    color: RED,
                    align: TextAlign::Left,
                },
            )
            .expect("text");
        // second glyph starts at x=0, its stem at x=1
        assert_eq!(frame.pixel(1, 5), Some(RED));
        assert_eq!(frame.pixel(0, 3), Some(RED));
        assert_eq!(frame.pixel(4, 3), Some(Rgba::WHITE));
    }

    #[test]
    fn digest_changes_with_content() {
        let mut frame = PixelFrame::new(8, 8);
        frame.clear(Rgba::WHITE).expect("clear");
        let before = frame.digest();
        assert_eq!(before.len(), 64);
        frame
            .fill_circle(Vec2::new(4.0, 4.0), 2.0, RED)
            .expect("circle");
        assert_ne!(frame.digest(), before);
    }
}
