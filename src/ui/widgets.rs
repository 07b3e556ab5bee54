use glam::Vec2;

use crate::render::canvas::{skip_failed, Canvas, Color, Rect, Surface};
use crate::render::text::TextOverlay;

const BG: Color = Color::rgb(30, 30, 30);
const BG_HOVER: Color = Color::rgb(50, 50, 50);
const TEXT: Color = Color::rgb(200, 200, 200);
const BORDER: Color = Color::rgb(100, 100, 100);
const ACTIVE: Color = Color::rgb(0, 100, 200);

fn draw_label(canvas: &mut Canvas, text: Option<&TextOverlay>, label: &str, rect: Rect) {
    if let Some(text) = text {
        text.draw_centered(canvas, label, rect.center(), TEXT);
    }
}

/// Outcome of routing a click to a dropdown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Click {
    /// Not for this widget; keep routing.
    Ignored,
    /// Opened, closed or toggled without a new selection.
    Consumed,
    Selected(usize),
}

/// Collapsible single-choice list. Options open below the header, each the
/// height of the header.
pub struct Dropdown {
    rect: Rect,
    options: Vec<String>,
    selected: usize,
    open: bool,
}

impl Dropdown {
    pub fn new(rect: Rect, options: Vec<String>, selected: usize) -> Self {
        let selected = selected.min(options.len().saturating_sub(1));
        Self {
            rect,
            options,
            selected,
            open: false,
        }
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn set_selected(&mut self, index: usize) {
        if index < self.options.len() {
            self.selected = index;
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn close(&mut self) {
        self.open = false;
    }

    fn option_rect(&self, index: usize) -> Rect {
        Rect::new(
            self.rect.x,
            self.rect.bottom() + (index as u32 * self.rect.h) as i32,
            self.rect.w,
            self.rect.h,
        )
    }

    pub fn handle_click(&mut self, pos: Vec2) -> Click {
        if !self.open {
            if self.rect.contains(pos) {
                self.open = true;
                return Click::Consumed;
            }
            return Click::Ignored;
        }

        if let Some(index) = (0..self.options.len()).find(|&i| self.option_rect(i).contains(pos)) {
            self.selected = index;
            self.open = false;
            return Click::Selected(index);
        }
        if self.rect.contains(pos) {
            self.open = false;
            return Click::Consumed;
        }
        // Outside: close and let the click through
        self.open = false;
        Click::Ignored
    }

    pub fn draw(&self, canvas: &mut Canvas, text: Option<&TextOverlay>, pointer: Vec2) {
        let bg = if self.rect.contains(pointer) { BG_HOVER } else { BG };
        canvas.fill_rect(self.rect, bg);
        canvas.stroke_rect(self.rect, BORDER, 1);
        if let Some(label) = self.options.get(self.selected) {
            draw_label(canvas, text, label, self.rect);
        }

        let right = self.rect.right() as f32;
        let cy = self.rect.center().y;
        let arrow = [
            Vec2::new(right - 20.0, cy - 5.0),
            Vec2::new(right - 10.0, cy - 5.0),
            Vec2::new(right - 15.0, cy + 5.0),
        ];
        skip_failed(canvas.fill_polygon(&arrow, TEXT));

        if !self.open {
            return;
        }
        for (i, option) in self.options.iter().enumerate() {
            let rect = self.option_rect(i);
            let bg = if i == self.selected {
                ACTIVE
            } else if rect.contains(pointer) {
                BG_HOVER
            } else {
                BG
            };
            canvas.fill_rect(rect, bg);
            canvas.stroke_rect(rect, BORDER, 1);
            draw_label(canvas, text, option, rect);
        }
    }
}

/// Two-state push button.
pub struct ToggleButton {
    rect: Rect,
    label: String,
    on: bool,
}

impl ToggleButton {
    pub fn new(rect: Rect, label: impl Into<String>, on: bool) -> Self {
        Self {
            rect,
            label: label.into(),
            on,
        }
    }

    pub fn is_on(&self) -> bool {
        self.on
    }

    pub fn set(&mut self, on: bool) {
        self.on = on;
    }

    pub fn toggle(&mut self) -> bool {
        self.on = !self.on;
        self.on
    }

    /// Flip on a click inside; returns whether the click landed.
    pub fn handle_click(&mut self, pos: Vec2) -> bool {
        if self.rect.contains(pos) {
            self.toggle();
            true
        } else {
            false
        }
    }

    pub fn draw(&self, canvas: &mut Canvas, text: Option<&TextOverlay>, pointer: Vec2) {
        let bg = if self.on {
            ACTIVE
        } else if self.rect.contains(pointer) {
            BG_HOVER
        } else {
            BG
        };
        canvas.fill_rect(self.rect, bg);
        canvas.stroke_rect(self.rect, BORDER, 1);
        draw_label(canvas, text, &self.label, self.rect);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dropdown() -> Dropdown {
        let options = ["one", "two", "three"].map(String::from).to_vec();
        Dropdown::new(Rect::new(10, 10, 100, 20), options, 0)
    }

    #[test]
    fn header_click_opens_and_toggles() {
        let mut menu = dropdown();
        assert_eq!(menu.handle_click(Vec2::new(50.0, 15.0)), Click::Consumed);
        assert!(menu.is_open());
        assert_eq!(menu.handle_click(Vec2::new(50.0, 15.0)), Click::Consumed);
        assert!(!menu.is_open());
    }

    #[test]
    fn option_click_selects_and_closes() {
        let mut menu = dropdown();
        menu.handle_click(Vec2::new(50.0, 15.0));
        // Second option spans y 50..70
        assert_eq!(menu.handle_click(Vec2::new(50.0, 55.0)), Click::Selected(1));
        assert_eq!(menu.selected(), 1);
        assert!(!menu.is_open());
    }

    #[test]
    fn closed_menu_ignores_option_area() {
        let mut menu = dropdown();
        assert_eq!(menu.handle_click(Vec2::new(50.0, 55.0)), Click::Ignored);
        assert_eq!(menu.selected(), 0);
    }

    #[test]
    fn outside_click_closes_and_passes_through() {
        let mut menu = dropdown();
        menu.handle_click(Vec2::new(50.0, 15.0));
        assert_eq!(menu.handle_click(Vec2::new(300.0, 300.0)), Click::Ignored);
        assert!(!menu.is_open());
    }

    #[test]
    fn open_menu_draws_selected_highlight() {
        let mut menu = dropdown();
        menu.handle_click(Vec2::new(50.0, 15.0));
        let mut canvas = Canvas::new(200, 120);
        menu.draw(&mut canvas, None, Vec2::new(-1.0, -1.0));
        assert_eq!(canvas.pixel(50, 40), Some(ACTIVE));
        assert_eq!(canvas.pixel(50, 60), Some(BG));
        assert_eq!(canvas.pixel(10, 10), Some(BORDER));
    }

    #[test]
    fn toggle_button_flips_on_click() {
        let mut button = ToggleButton::new(Rect::new(0, 0, 50, 20), "Shuffle", false);
        assert!(!button.handle_click(Vec2::new(60.0, 5.0)));
        assert!(button.handle_click(Vec2::new(10.0, 5.0)));
        assert!(button.is_on());
    }
}
