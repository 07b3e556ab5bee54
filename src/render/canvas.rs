use glam::Vec2;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const CYAN: Color = Color::rgb(0, 255, 255);
    pub const MAGENTA: Color = Color::rgb(255, 0, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Multiply every component by `factor` (clamped to [0, 1]).
    pub fn scaled(self, factor: f32) -> Self {
        let f = if factor.is_finite() { factor.clamp(0.0, 1.0) } else { 0.0 };
        Self::rgb(
            (self.r as f32 * f) as u8,
            (self.g as f32 * f) as u8,
            (self.b as f32 * f) as u8,
        )
    }

    pub fn lerp(self, other: Color, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        Self::rgb(mix(self.r, other.r), mix(self.g, other.g), mix(self.b, other.b))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    pub fn right(&self) -> i32 {
        self.x + self.w as i32
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.h as i32
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x as f32 + self.w as f32 / 2.0, self.y as f32 + self.h as f32 / 2.0)
    }

    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.x as f32
            && p.y >= self.y as f32
            && p.x < self.right() as f32
            && p.y < self.bottom() as f32
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum DrawError {
    #[error("non-finite coordinate in primitive")]
    NonFinite,
    #[error("primitive needs at least {0} points")]
    TooFewPoints(usize),
}

/// Drawing capability the visualizers render through.
pub trait Surface {
    fn size(&self) -> (u32, u32);
    fn clear(&mut self, color: Color);
    fn fill_rect(&mut self, rect: Rect, color: Color);
    fn stroke_rect(&mut self, rect: Rect, color: Color, width: u32);
    fn line(&mut self, from: Vec2, to: Vec2, color: Color, width: f32) -> Result<(), DrawError>;
    fn polyline(&mut self, points: &[Vec2], closed: bool, color: Color, width: f32) -> Result<(), DrawError>;
    /// `width == None` fills the disc.
    fn circle(&mut self, center: Vec2, radius: f32, color: Color, width: Option<f32>) -> Result<(), DrawError>;
    fn fill_polygon(&mut self, points: &[Vec2], color: Color) -> Result<(), DrawError>;
    /// Copy `image` into `dst`, nearest-neighbour scaled.
    fn blit(&mut self, image: &Canvas, dst: Rect);
}

/// Log and drop a failed primitive; the rest of the frame still draws.
pub fn skip_failed(result: Result<(), DrawError>) {
    if let Err(err) = result {
        log::trace!("Skipped primitive: {}", err);
    }
}

/// RGBA8 framebuffer, row-major, alpha always opaque.
#[derive(Clone)]
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<[u8; 4]>,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![[0, 0, 0, 255]; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let [r, g, b, _] = self.pixels[(y * self.width + x) as usize];
        Some(Color::rgb(r, g, b))
    }

    #[cfg(test)]
    /// Number of pixels that are not pure black.
    pub fn lit_pixels(&self) -> usize {
        self.pixels.iter().filter(|p| p[0] | p[1] | p[2] != 0).count()
    }

    #[inline]
    pub fn put(&mut self, x: i32, y: i32, color: Color) {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return;
        }
        self.pixels[y as usize * self.width as usize + x as usize] = [color.r, color.g, color.b, 255];
    }

    /// Mix `color` over the existing pixel with coverage `alpha` in [0, 1].
    pub fn blend(&mut self, x: i32, y: i32, color: Color, alpha: f32) {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return;
        }
        let under = self.pixel(x as u32, y as u32).unwrap_or_default();
        self.put(x, y, under.lerp(color, alpha));
    }

    /// Write a full row from `colors`, starting at column `x`; clipped.
    pub fn put_row(&mut self, x: i32, y: u32, colors: &[Color]) {
        for (i, &c) in colors.iter().enumerate() {
            self.put(x + i as i32, y as i32, c);
        }
    }

    fn hspan(&mut self, y: i32, x0: i32, x1: i32, color: Color) {
        if y < 0 || y >= self.height as i32 {
            return;
        }
        let x0 = x0.max(0);
        let x1 = x1.min(self.width as i32 - 1);
        if x0 > x1 {
            return;
        }
        let row = y as usize * self.width as usize;
        self.pixels[row + x0 as usize..=row + x1 as usize].fill([color.r, color.g, color.b, 255]);
    }

    /// Move the image up by `rows`, leaving black rows at the bottom.
    pub fn scroll_up(&mut self, rows: u32) {
        let rows = rows.min(self.height) as usize;
        let stride = self.width as usize;
        self.pixels.copy_within(rows * stride.., 0);
        let len = self.pixels.len();
        self.pixels[len - rows * stride..].fill([0, 0, 0, 255]);
    }

    /// Blend every pixel toward black by `amount` in [0, 1].
    pub fn fade(&mut self, amount: f32) {
        let keep = 1.0 - amount.clamp(0.0, 1.0);
        for p in &mut self.pixels {
            for c in &mut p[..3] {
                *c = (*c as f32 * keep) as u8;
            }
        }
    }

    fn thin_line(&mut self, from: Vec2, to: Vec2, color: Color) {
        let Some((a, b)) = clip_segment(from, to, self.width as f32, self.height as f32) else {
            return;
        };
        let delta = b - a;
        let steps = delta.x.abs().max(delta.y.abs()).ceil().max(1.0) as usize;
        let step = delta / steps as f32;
        let mut p = a;
        for _ in 0..=steps {
            self.put(p.x.round() as i32, p.y.round() as i32, color);
            p += step;
        }
    }
}

fn all_finite(points: &[Vec2]) -> bool {
    points.iter().all(|p| p.is_finite())
}

/// Liang-Barsky clip of a segment to [0, w) x [0, h), in f64 so very
/// distant endpoints keep their precision.
fn clip_segment(a: Vec2, b: Vec2, w: f32, h: f32) -> Option<(Vec2, Vec2)> {
    let (ax, ay) = (a.x as f64, a.y as f64);
    let (dx, dy) = (b.x as f64 - ax, b.y as f64 - ay);
    let mut t0 = 0.0f64;
    let mut t1 = 1.0f64;
    let checks = [
        (-dx, ax),
        (dx, w as f64 - 1.0 - ax),
        (-dy, ay),
        (dy, h as f64 - 1.0 - ay),
    ];
    for (p, q) in checks {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
        } else {
            let r = q / p;
            if p < 0.0 {
                t0 = t0.max(r);
            } else {
                t1 = t1.min(r);
            }
            if t0 > t1 {
                return None;
            }
        }
    }
    let at = |t: f64| Vec2::new((ax + dx * t) as f32, (ay + dy * t) as f32);
    Some((at(t0), at(t1)))
}

impl Surface for Canvas {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn clear(&mut self, color: Color) {
        self.pixels.fill([color.r, color.g, color.b, 255]);
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        for y in rect.y..rect.bottom() {
            self.hspan(y, rect.x, rect.right() - 1, color);
        }
    }

    fn stroke_rect(&mut self, rect: Rect, color: Color, width: u32) {
        if rect.w == 0 || rect.h == 0 {
            return;
        }
        let t = width.max(1).min(rect.w.min(rect.h)) as i32;
        for i in 0..t {
            self.hspan(rect.y + i, rect.x, rect.right() - 1, color);
            self.hspan(rect.bottom() - 1 - i, rect.x, rect.right() - 1, color);
        }
        for y in rect.y..rect.bottom() {
            self.hspan(y, rect.x, rect.x + t - 1, color);
            self.hspan(y, rect.right() - t, rect.right() - 1, color);
        }
    }

    fn line(&mut self, from: Vec2, to: Vec2, color: Color, width: f32) -> Result<(), DrawError> {
        if !from.is_finite() || !to.is_finite() || !width.is_finite() {
            return Err(DrawError::NonFinite);
        }
        if width <= 1.5 {
            self.thin_line(from, to, color);
            return Ok(());
        }
        let dir = to - from;
        let len = dir.length();
        if len < 1e-3 {
            return self.circle(from, width / 2.0, color, None);
        }
        let normal = Vec2::new(-dir.y, dir.x) / len * (width / 2.0);
        self.fill_polygon(&[from + normal, to + normal, to - normal, from - normal], color)
    }

    fn polyline(&mut self, points: &[Vec2], closed: bool, color: Color, width: f32) -> Result<(), DrawError> {
        if points.len() < 2 {
            return Err(DrawError::TooFewPoints(2));
        }
        if !all_finite(points) {
            return Err(DrawError::NonFinite);
        }
        for pair in points.windows(2) {
            self.line(pair[0], pair[1], color, width)?;
        }
        if closed {
            self.line(points[points.len() - 1], points[0], color, width)?;
        }
        Ok(())
    }

    fn circle(&mut self, center: Vec2, radius: f32, color: Color, width: Option<f32>) -> Result<(), DrawError> {
        if !center.is_finite() || !radius.is_finite() {
            return Err(DrawError::NonFinite);
        }
        let radius = radius.max(0.5);
        let inner = match width {
            Some(w) if w.is_finite() && w < radius => radius - w.max(1.0),
            Some(w) if !w.is_finite() => return Err(DrawError::NonFinite),
            _ => -1.0,
        };
        let cy = center.y;
        let top = ((cy - radius).floor() as i32).max(0);
        let bottom = ((cy + radius).ceil() as i32).min(self.height as i32 - 1);
        for y in top..=bottom {
            let dy = y as f32 + 0.5 - cy;
            if dy.abs() > radius {
                continue;
            }
            let outer = (radius * radius - dy * dy).sqrt();
            let x0 = (center.x - outer).round() as i32;
            let x1 = (center.x + outer).round() as i32 - 1;
            if inner > 0.0 && dy.abs() < inner {
                let hole = (inner * inner - dy * dy).sqrt();
                self.hspan(y, x0, (center.x - hole).round() as i32 - 1, color);
                self.hspan(y, (center.x + hole).round() as i32, x1, color);
            } else {
                self.hspan(y, x0, x1, color);
            }
        }
        Ok(())
    }

    fn fill_polygon(&mut self, points: &[Vec2], color: Color) -> Result<(), DrawError> {
        if points.len() < 3 {
            return Err(DrawError::TooFewPoints(3));
        }
        if !all_finite(points) {
            return Err(DrawError::NonFinite);
        }
        let min_y = points.iter().map(|p| p.y).fold(f32::INFINITY, f32::min);
        let max_y = points.iter().map(|p| p.y).fold(f32::NEG_INFINITY, f32::max);
        let top = (min_y.floor() as i32).max(0);
        let bottom = (max_y.ceil() as i32).min(self.height as i32 - 1);

        let mut crossings: Vec<f32> = Vec::with_capacity(points.len());
        for y in top..=bottom {
            let sy = y as f32 + 0.5;
            crossings.clear();
            for i in 0..points.len() {
                let a = points[i];
                let b = points[(i + 1) % points.len()];
                if (a.y <= sy && b.y > sy) || (b.y <= sy && a.y > sy) {
                    crossings.push(a.x + (sy - a.y) / (b.y - a.y) * (b.x - a.x));
                }
            }
            crossings.sort_by(|a, b| a.total_cmp(b));
            for pair in crossings.chunks_exact(2) {
                let x0 = pair[0].round().max(-1.0).min(self.width as f32) as i32;
                let x1 = (pair[1].round() - 1.0).max(-1.0).min(self.width as f32) as i32;
                self.hspan(y, x0, x1.max(x0), color);
            }
        }
        Ok(())
    }

    fn blit(&mut self, image: &Canvas, dst: Rect) {
        if dst.w == 0 || dst.h == 0 || image.width == 0 || image.height == 0 {
            return;
        }
        let y0 = dst.y.max(0);
        let y1 = dst.bottom().min(self.height as i32);
        let x0 = dst.x.max(0);
        let x1 = dst.right().min(self.width as i32);
        for y in y0..y1 {
            let sy = ((y - dst.y) as u64 * image.height as u64 / dst.h as u64) as usize;
            let src_row = sy * image.width as usize;
            let dst_row = y as usize * self.width as usize;
            for x in x0..x1 {
                let sx = ((x - dst.x) as u64 * image.width as u64 / dst.w as u64) as usize;
                self.pixels[dst_row + x as usize] = image.pixels[src_row + sx];
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blend_mixes_by_coverage() {
        let mut canvas = Canvas::new(4, 4);
        canvas.blend(1, 1, Color::WHITE, 0.5);
        assert_eq!(canvas.pixel(1, 1), Some(Color::rgb(128, 128, 128)));
        canvas.blend(2, 2, Color::CYAN, 1.0);
        assert_eq!(canvas.pixel(2, 2), Some(Color::CYAN));
        // Off-canvas coverage is dropped
        canvas.blend(-1, 9, Color::WHITE, 1.0);
        assert_eq!(canvas.lit_pixels(), 2);
    }

    #[test]
    fn out_of_bounds_primitives_are_clipped() {
        let mut canvas = Canvas::new(32, 16);
        canvas.fill_rect(Rect::new(-10, -10, 100, 100), Color::WHITE);
        assert_eq!(canvas.lit_pixels(), 32 * 16);

        let mut canvas = Canvas::new(32, 16);
        canvas
            .line(Vec2::new(-1e9, 8.0), Vec2::new(1e9, 8.0), Color::CYAN, 1.0)
            .unwrap();
        assert_eq!(canvas.lit_pixels(), 32);
    }

    #[test]
    fn non_finite_points_are_rejected() {
        let mut canvas = Canvas::new(8, 8);
        let err = canvas.polyline(&[Vec2::ZERO, Vec2::new(f32::NAN, 1.0)], false, Color::WHITE, 2.0);
        assert_eq!(err, Err(DrawError::NonFinite));
        assert_eq!(canvas.lit_pixels(), 0);
        assert_eq!(
            canvas.polyline(&[Vec2::ZERO], false, Color::WHITE, 1.0),
            Err(DrawError::TooFewPoints(2))
        );
    }

    #[test]
    fn stroke_rect_leaves_interior_empty() {
        let mut canvas = Canvas::new(10, 10);
        canvas.stroke_rect(Rect::new(1, 1, 6, 6), Color::WHITE, 1);
        assert_eq!(canvas.pixel(1, 1), Some(Color::WHITE));
        assert_eq!(canvas.pixel(6, 6), Some(Color::WHITE));
        assert_eq!(canvas.pixel(3, 3), Some(Color::BLACK));
        assert_eq!(canvas.lit_pixels(), 20);
    }

    #[test]
    fn ring_circle_has_hole() {
        let mut canvas = Canvas::new(40, 40);
        canvas.circle(Vec2::new(20.0, 20.0), 15.0, Color::WHITE, Some(2.0)).unwrap();
        assert_eq!(canvas.pixel(20, 20), Some(Color::BLACK));
        assert_eq!(canvas.pixel(20, 6), Some(Color::WHITE));
    }

    #[test]
    fn thick_line_covers_its_width() {
        let mut canvas = Canvas::new(20, 20);
        canvas
            .line(Vec2::new(2.0, 10.0), Vec2::new(18.0, 10.0), Color::WHITE, 4.0)
            .unwrap();
        for y in 8..12 {
            assert_eq!(canvas.pixel(10, y), Some(Color::WHITE));
        }
        assert_eq!(canvas.pixel(10, 3), Some(Color::BLACK));
    }

    #[test]
    fn scroll_moves_rows_up() {
        let mut canvas = Canvas::new(4, 3);
        canvas.put(1, 2, Color::WHITE);
        canvas.scroll_up(1);
        assert_eq!(canvas.pixel(1, 1), Some(Color::WHITE));
        assert_eq!(canvas.pixel(1, 2), Some(Color::BLACK));
    }

    #[test]
    fn fade_darkens_toward_black() {
        let mut canvas = Canvas::new(2, 1);
        canvas.clear(Color::rgb(200, 100, 10));
        canvas.fade(0.5);
        assert_eq!(canvas.pixel(0, 0), Some(Color::rgb(100, 50, 5)));
        for _ in 0..40 {
            canvas.fade(0.5);
        }
        assert_eq!(canvas.lit_pixels(), 0);
    }

    #[test]
    fn blit_scales_nearest_neighbour() {
        let mut src = Canvas::new(2, 1);
        src.put(1, 0, Color::WHITE);
        let mut dst = Canvas::new(4, 2);
        dst.blit(&src, Rect::new(0, 0, 4, 2));
        assert_eq!(dst.pixel(0, 0), Some(Color::BLACK));
        assert_eq!(dst.pixel(1, 1), Some(Color::BLACK));
        assert_eq!(dst.pixel(2, 0), Some(Color::WHITE));
        assert_eq!(dst.pixel(3, 1), Some(Color::WHITE));
    }

    #[test]
    fn color_helpers() {
        assert_eq!(Color::WHITE.scaled(0.5), Color::rgb(127, 127, 127));
        assert_eq!(Color::BLACK.lerp(Color::WHITE, 1.0), Color::WHITE);
        assert_eq!(Color::CYAN.scaled(f32::NAN), Color::BLACK);
    }
}
