use std::sync::Arc;

use pixels::{Pixels, SurfaceTexture};
use thiserror::Error;
use winit::window::Window;

use crate::geometry::Vec2;
use crate::rendering::{DrawSurface, PixelFrame};

#[derive(Debug, Error)]
pub enum PresentError {
    #[error(transparent)]
    Pixels(#[from] pixels::Error),
    #[error(transparent)]
    Texture(#[from] pixels::TextureError),
}

/// Owns the window's `pixels` surface and the software frame drawn into it.
/// The frame buffer keeps the scene's own size and `pixels` scales it to the
/// window.
pub(crate) struct Presenter {
    pixels: Pixels<'static>,
    frame: PixelFrame,
}

impl Presenter {
    pub(crate) fn new(
        window: Arc<Window>,
        buffer_width: u32,
        buffer_height: u32,
    ) -> Result<Self, pixels::Error> {
        let size = window.inner_size();
        let surface = SurfaceTexture::new(size.width.max(1), size.height.max(1), window);
        let pixels = Pixels::new(buffer_width, buffer_height, surface)?;
        Ok(Self {
            pixels,
            frame: PixelFrame::new(buffer_width, buffer_height),
        })
    }

    pub(crate) fn resize_surface(&mut self, width: u32, height: u32) -> Result<(), PresentError> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.pixels.resize_surface(width, height)?;
        Ok(())
    }

    pub(crate) fn ensure_buffer_size(&mut self, width: u32, height: u32) -> Result<(), PresentError> {
        if self.frame.size() == (width, height) || width == 0 || height == 0 {
            return Ok(());
        }
        self.pixels.resize_buffer(width, height)?;
        self.frame.resize(width, height);
        Ok(())
    }

    pub(crate) fn frame_mut(&mut self) -> &mut PixelFrame {
        &mut self.frame
    }

    pub(crate) fn present(&mut self) -> Result<(), PresentError> {
        self.pixels.frame_mut().copy_from_slice(self.frame.as_bytes());
        self.pixels.render()?;
        Ok(())
    }

    /// Maps a physical cursor position to frame coordinates; `None` outside
    /// the letterboxed frame.
    pub(crate) fn window_to_frame(&self, x: f32, y: f32) -> Option<Vec2> {
        self.pixels
            .window_pos_to_pixel((x, y))
            .ok()
            .map(|(px, py)| Vec2::new(px as f32 + 0.5, py as f32 + 0.5))
    }
}
