use fontdue::{Font, FontSettings};
use glam::Vec2;
use std::path::{Path, PathBuf};

use super::canvas::{Canvas, Color};

/// Fonts tried when no font is configured.
const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/noto/NotoSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

pub struct TextOverlay {
    font: Font,
    font_size: f32,
}

impl TextOverlay {
    pub fn from_bytes(bytes: &[u8], font_size: f32) -> Option<Self> {
        match Font::from_bytes(bytes, FontSettings::default()) {
            Ok(font) => Some(Self { font, font_size }),
            Err(err) => {
                log::warn!("Failed to parse font: {}", err);
                None
            }
        }
    }

    /// Load the configured font, or the first system font found. `None`
    /// means widgets draw without labels.
    pub fn load(configured: Option<&Path>, font_size: f32) -> Option<Self> {
        let candidates: Vec<PathBuf> = match configured {
            Some(path) => vec![path.to_path_buf()],
            None => SYSTEM_FONTS.iter().map(PathBuf::from).collect(),
        };
        for path in &candidates {
            if let Ok(bytes) = std::fs::read(path) {
                if let Some(overlay) = Self::from_bytes(&bytes, font_size) {
                    log::debug!("Using font {}", path.display());
                    return Some(overlay);
                }
            }
        }
        log::warn!("No usable font found; labels will not be drawn");
        None
    }

    /// Composite text onto the canvas with its top-left corner at `origin`.
    pub fn draw(&self, canvas: &mut Canvas, text: &str, origin: Vec2, color: Color) {
        let mut cursor_x = origin.x.round() as i32;
        let top = origin.y.round() as i32;
        for ch in text.chars() {
            let (metrics, bitmap) = self.font.rasterize(ch, self.font_size);
            let glyph_y = top + self.font_size as i32 - metrics.height as i32 - metrics.ymin;

            for gy in 0..metrics.height {
                for gx in 0..metrics.width {
                    let alpha = bitmap[gy * metrics.width + gx];
                    if alpha == 0 {
                        continue;
                    }
                    let px = cursor_x + metrics.xmin + gx as i32;
                    let py = glyph_y + gy as i32;
                    canvas.blend(px, py, color, alpha as f32 / 255.0);
                }
            }

            cursor_x += metrics.advance_width.round() as i32;
        }
    }

    /// Draw `text` centred in a box of the given centre point.
    pub fn draw_centered(&self, canvas: &mut Canvas, text: &str, center: Vec2, color: Color) {
        let w = self.measure_width(text) as f32;
        let h = self.line_height() as f32;
        self.draw(canvas, text, center - Vec2::new(w, h) / 2.0, color);
    }

    pub fn measure_width(&self, text: &str) -> u32 {
        let mut width = 0.0f32;
        for ch in text.chars() {
            let metrics = self.font.metrics(ch, self.font_size);
            width += metrics.advance_width;
        }
        width.ceil() as u32
    }

    pub fn line_height(&self) -> u32 {
        self.font_size.ceil() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_bytes_are_not_a_font() {
        assert!(TextOverlay::from_bytes(b"not a font", 18.0).is_none());
    }

    #[test]
    fn missing_configured_font_yields_none() {
        assert!(TextOverlay::load(Some(Path::new("/nonexistent/font.ttf")), 18.0).is_none());
    }
}
