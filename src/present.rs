//! Puts the indexed render surface on screen through macroquad

use macroquad::prelude::*;

use crate::rasterizer::{Palette, RenderSurface};

/// Blits the surface to the window, scaled up with nearest filtering and
/// letterboxed to keep the aspect ratio.
pub struct Presenter {
    texture: Texture2D,
    rgba: Vec<u8>,
    width: usize,
    height: usize,
}

impl Presenter {
    pub fn new(width: usize, height: usize) -> Self {
        let rgba = vec![0; width * height * 4];
        let texture = Texture2D::from_rgba8(width as u16, height as u16, &rgba);
        texture.set_filter(FilterMode::Nearest);
        Self { texture, rgba, width, height }
    }

    pub fn present(&mut self, surface: &RenderSurface, palette: &Palette) {
        if surface.width != self.width || surface.height != self.height {
            *self = Presenter::new(surface.width, surface.height);
        }

        surface.to_rgba(palette, &mut self.rgba);
        self.texture.update_from_bytes(self.width as u32, self.height as u32, &self.rgba);

        let scale = (screen_width() / self.width as f32)
            .min(screen_height() / self.height as f32)
            .max(1.0);
        let draw_w = self.width as f32 * scale;
        let draw_h = self.height as f32 * scale;
        let draw_x = ((screen_width() - draw_w) * 0.5).floor();
        let draw_y = ((screen_height() - draw_h) * 0.5).floor();

        clear_background(BLACK);
        draw_texture_ex(
            &self.texture,
            draw_x,
            draw_y,
            WHITE,
            DrawTextureParams {
                dest_size: Some(Vec2::new(draw_w, draw_h)),
                ..Default::default()
            },
        );
    }
}
