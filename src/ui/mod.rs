pub mod widgets;

use glam::Vec2;

use crate::config::{Config, ShuffleConfig};
use crate::render::canvas::{Canvas, Rect};
use crate::render::text::TextOverlay;
use crate::viz::normalize::Scale;
use crate::viz::{Engine, Mode};
use widgets::{Click, Dropdown, ToggleButton};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Space,
    Escape,
    Q,
    S,
    A,
    Other,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Other,
}

/// Discrete input, in canvas coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InputEvent {
    Quit,
    KeyPress(Key),
    MouseButton { button: MouseButton, pos: Vec2 },
    MouseMove(Vec2),
}

/// Accumulates non-silent time and fires once per interval.
#[derive(Clone, Debug)]
pub struct ShuffleTimer {
    interval: f32,
    silence_threshold: f32,
    elapsed: f32,
}

impl ShuffleTimer {
    pub fn new(config: &ShuffleConfig) -> Self {
        Self {
            interval: config.interval_secs.max(0.1),
            silence_threshold: config.silence_threshold,
            elapsed: 0.0,
        }
    }

    pub fn reset(&mut self) {
        self.elapsed = 0.0;
    }

    /// Advance by `dt` if the block is audible; true when a switch is due.
    pub fn tick(&mut self, dt: f32, peak: f32) -> bool {
        if peak < self.silence_threshold || !peak.is_finite() {
            return false;
        }
        self.elapsed += dt;
        if self.elapsed >= self.interval {
            self.elapsed = 0.0;
            true
        } else {
            false
        }
    }
}

/// Mode and scale selectors, the shuffle toggle and keyboard shortcuts.
/// Every event takes effect on the engine before the next render.
pub struct Controls {
    mode_menu: Dropdown,
    scale_menu: Dropdown,
    shuffle_button: ToggleButton,
    shuffle: ShuffleTimer,
    rng: fastrand::Rng,
    text: Option<TextOverlay>,
    pointer: Vec2,
    quit: bool,
}

impl Controls {
    pub fn new(config: &Config, engine: &Engine, text: Option<TextOverlay>, rng: fastrand::Rng) -> Self {
        let width = config.display.width as i32;
        let modes = Mode::ALL.iter().map(|m| m.name().to_string()).collect();
        let scales = Scale::OPTIONS.iter().map(|(label, _)| label.to_string()).collect();
        Self {
            mode_menu: Dropdown::new(Rect::new(width - 210, 10, 200, 40), modes, engine.mode().index()),
            scale_menu: Dropdown::new(
                Rect::new(10, 10, 150, 40),
                scales,
                engine.scale().index().unwrap_or(0),
            ),
            shuffle_button: ToggleButton::new(
                Rect::new(width - 320, 10, 100, 40),
                "Shuffle",
                config.shuffle.enabled,
            ),
            shuffle: ShuffleTimer::new(&config.shuffle),
            rng,
            text,
            pointer: Vec2::new(-1.0, -1.0),
            quit: false,
        }
    }

    pub fn quit_requested(&self) -> bool {
        self.quit
    }

    #[cfg(test)]
    pub fn shuffle_enabled(&self) -> bool {
        self.shuffle_button.is_on()
    }

    fn set_shuffle(&mut self, on: bool) {
        self.shuffle_button.set(on);
        self.shuffle.reset();
        log::info!("Shuffle {}", if on { "on" } else { "off" });
    }

    fn sync_mode(&mut self, engine: &Engine) {
        self.mode_menu.set_selected(engine.mode().index());
    }

    pub fn handle(&mut self, event: InputEvent, engine: &mut Engine) {
        match event {
            InputEvent::Quit => self.quit = true,
            InputEvent::MouseMove(pos) => self.pointer = pos,
            InputEvent::KeyPress(key) => match key {
                Key::Escape | Key::Q => self.quit = true,
                Key::Space => {
                    engine.cycle_mode();
                    self.sync_mode(engine);
                }
                Key::S => self.set_shuffle(!self.shuffle_button.is_on()),
                Key::A => {
                    engine.set_scale(Scale::Automatic);
                    self.scale_menu.set_selected(0);
                }
                Key::Other => {}
            },
            InputEvent::MouseButton { button: MouseButton::Left, pos } => {
                self.pointer = pos;
                self.click(pos, engine);
            }
            InputEvent::MouseButton { .. } => {}
        }
    }

    fn click(&mut self, pos: Vec2, engine: &mut Engine) {
        // An open list overlaps whatever is below it, so it sees the click first
        let mode_first = !self.scale_menu.is_open();
        for pass in 0..2 {
            let on_mode = (pass == 0) == mode_first;
            let response = if on_mode {
                self.mode_menu.handle_click(pos)
            } else {
                self.scale_menu.handle_click(pos)
            };
            match response {
                Click::Ignored => continue,
                Click::Consumed => {
                    if on_mode && self.mode_menu.is_open() {
                        self.scale_menu.close();
                    } else if !on_mode && self.scale_menu.is_open() {
                        self.mode_menu.close();
                    }
                }
                Click::Selected(index) if on_mode => {
                    engine.set_mode(Mode::ALL[index]);
                    self.shuffle.reset();
                }
                Click::Selected(index) => {
                    let (label, scale) = Scale::OPTIONS[index];
                    engine.set_scale(scale);
                    log::debug!("Scale: {}", label);
                }
            }
            return;
        }
        if self.shuffle_button.handle_click(pos) {
            let on = self.shuffle_button.is_on();
            self.set_shuffle(on);
        }
    }

    /// Advance the shuffle timer by one tick of audio.
    pub fn tick(&mut self, dt: f32, peak: f32, engine: &mut Engine) {
        if !self.shuffle_button.is_on() {
            return;
        }
        if self.shuffle.tick(dt, peak) {
            let next = engine.mode().random_other(&mut self.rng);
            log::info!("Shuffle: {}", next.name());
            engine.set_mode(next);
            self.sync_mode(engine);
        }
    }

    pub fn draw(&self, canvas: &mut Canvas) {
        let text = self.text.as_ref();
        self.shuffle_button.draw(canvas, text, self.pointer);
        // Open lists last so they overlap the other widgets
        let (first, last) = if self.mode_menu.is_open() {
            (&self.scale_menu, &self.mode_menu)
        } else {
            (&self.mode_menu, &self.scale_menu)
        };
        first.draw(canvas, text, self.pointer);
        last.draw(canvas, text, self.pointer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Controls, Engine) {
        let config = Config::default();
        let engine = Engine::with_rng(&config, fastrand::Rng::with_seed(1));
        let controls = Controls::new(&config, &engine, None, fastrand::Rng::with_seed(2));
        (controls, engine)
    }

    fn click(controls: &mut Controls, engine: &mut Engine, x: f32, y: f32) {
        controls.handle(
            InputEvent::MouseButton {
                button: MouseButton::Left,
                pos: Vec2::new(x, y),
            },
            engine,
        );
    }

    #[test]
    fn selecting_a_mode_applies_immediately() {
        let (mut controls, mut engine) = setup();
        // Mode menu header at x 590..790, y 10..50; options start at y 50
        click(&mut controls, &mut engine, 700.0, 30.0);
        click(&mut controls, &mut engine, 700.0, 50.0 + 40.0 * 2.0 + 5.0);
        assert_eq!(engine.mode(), Mode::Spectrogram);
    }

    #[test]
    fn selecting_a_scale_applies_immediately() {
        let (mut controls, mut engine) = setup();
        click(&mut controls, &mut engine, 50.0, 30.0);
        click(&mut controls, &mut engine, 50.0, 50.0 + 40.0 * 3.0 + 5.0);
        assert_eq!(engine.scale(), Scale::Manual(2.0));
        controls.handle(InputEvent::KeyPress(Key::A), &mut engine);
        assert_eq!(engine.scale(), Scale::Automatic);
    }

    #[test]
    fn only_one_menu_open() {
        let (mut controls, mut engine) = setup();
        click(&mut controls, &mut engine, 50.0, 30.0);
        assert!(controls.scale_menu.is_open());
        click(&mut controls, &mut engine, 700.0, 30.0);
        assert!(controls.mode_menu.is_open());
        assert!(!controls.scale_menu.is_open());
    }

    #[test]
    fn keyboard_shortcuts() {
        let (mut controls, mut engine) = setup();
        controls.handle(InputEvent::KeyPress(Key::Space), &mut engine);
        assert_eq!(engine.mode(), Mode::Curves);
        assert_eq!(controls.mode_menu.selected(), 1);
        controls.handle(InputEvent::KeyPress(Key::S), &mut engine);
        assert!(controls.shuffle_enabled());
        assert!(!controls.quit_requested());
        controls.handle(InputEvent::KeyPress(Key::Q), &mut engine);
        assert!(controls.quit_requested());
    }

    #[test]
    fn shuffle_waits_for_sound() {
        let (mut controls, mut engine) = setup();
        controls.handle(InputEvent::KeyPress(Key::S), &mut engine);
        let dt = 1.0 / 60.0;
        for _ in 0..60 * 60 {
            controls.tick(dt, 0.0, &mut engine);
        }
        assert_eq!(engine.mode(), Mode::Bars);

        // Default interval is 15 s of audible blocks
        for _ in 0..60 * 15 + 1 {
            controls.tick(dt, 0.5, &mut engine);
        }
        assert_ne!(engine.mode(), Mode::Bars);
        assert_eq!(controls.mode_menu.selected(), engine.mode().index());
    }

    #[test]
    fn shuffle_button_click_toggles() {
        let (mut controls, mut engine) = setup();
        click(&mut controls, &mut engine, 500.0, 30.0);
        assert!(controls.shuffle_enabled());
    }

    #[test]
    fn timer_ignores_silence() {
        let mut timer = ShuffleTimer::new(&ShuffleConfig {
            enabled: true,
            interval_secs: 1.0,
            silence_threshold: 0.01,
        });
        assert!(!timer.tick(5.0, 0.005));
        assert!(!timer.tick(0.5, 0.02));
        assert!(timer.tick(0.5, 0.02));
        assert!(!timer.tick(0.5, f32::NAN));
    }

    #[test]
    fn draw_paints_widgets() {
        let (controls, _) = setup();
        let mut canvas = Canvas::new(800, 480);
        controls.draw(&mut canvas);
        assert!(canvas.lit_pixels() > 0);
    }
}
