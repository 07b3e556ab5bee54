use super::{spread_indices, FrameInput, Visualizer};
use crate::render::canvas::{Canvas, Color, Rect, Surface};

const SEPARATOR: Color = Color::rgb(50, 50, 50);
const EPSILON: f32 = 1e-6;

/// Black to blue to cyan to white, three segments of 85 steps.
pub fn colormap() -> [Color; 256] {
    let mut lut = [Color::BLACK; 256];
    for (i, slot) in lut.iter_mut().enumerate() {
        let ramp = |base: usize| ((i - base) * 3).min(255) as u8;
        *slot = if i < 85 {
            Color::rgb(0, 0, ramp(0))
        } else if i < 170 {
            Color::rgb(0, ramp(85), 255)
        } else {
            Color::rgb(ramp(170), 255, 255)
        };
    }
    lut
}

/// Log-compress a magnitude into a LUT index: `log10(x)` over [-3, 1].
fn intensity(magnitude: f32) -> u8 {
    let db = (magnitude.max(0.0) + EPSILON).log10();
    let level = (db + 3.0) / 4.0 * 255.0;
    if level.is_finite() {
        level.clamp(0.0, 255.0) as u8
    } else {
        0
    }
}

/// Scrolling time/frequency image. Rows age upward; left channel on the
/// left half, right channel on the right half.
pub struct Spectrogram {
    image: Canvas,
    lut: [Color; 256],
}

impl Spectrogram {
    pub fn new(width: u32, rows: u32) -> Self {
        let mut image = Canvas::new(width.max(1), rows.max(1));
        let half = (image.width() / 2) as i32;
        for y in 0..image.height() as i32 {
            image.put(half, y, SEPARATOR);
        }
        Self {
            image,
            lut: colormap(),
        }
    }

    #[cfg(test)]
    pub fn image(&self) -> &Canvas {
        &self.image
    }

    fn row_colors(&self, bins: &[f32], columns: usize) -> Vec<Color> {
        spread_indices(bins.len(), columns)
            .map(|i| self.lut[intensity(bins[i]) as usize])
            .collect()
    }

    /// Scroll by one row and paint the newest row at the bottom.
    pub fn push(&mut self, left: &[f32], right: &[f32]) {
        let width = self.image.width() as usize;
        let half = width / 2;
        let bottom = self.image.height() - 1;

        self.image.scroll_up(1);
        if !left.is_empty() && half > 0 {
            let row = self.row_colors(left, half);
            self.image.put_row(0, bottom, &row);
        }
        if !right.is_empty() && width > half {
            let row = self.row_colors(right, width - half);
            self.image.put_row(half as i32, bottom, &row);
        }
        self.image.put(half as i32, bottom as i32, SEPARATOR);
    }
}

impl Visualizer for Spectrogram {
    fn render(&mut self, input: &FrameInput, surface: &mut dyn Surface) {
        let limit = input.spectrum.len() / 2;
        if limit == 0 {
            return;
        }
        self.push(
            &input.spectrum.channel(0)[..limit],
            &input.spectrum.channel(1)[..limit],
        );
        let (width, height) = surface.size();
        surface.blit(&self.image, Rect::new(0, 0, width, height));
    }
}
