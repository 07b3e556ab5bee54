use anyhow::{Context, Result};
use glam::Vec2;
use std::sync::Arc;
use std::time::Duration;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Fullscreen, Window, WindowAttributes, WindowId};

use super::blit::BlitPipeline;
use super::canvas::Canvas;
use super::display::Display;
use super::gpu::WindowSurface;
use crate::config::DisplayConfig;
use crate::ui::{InputEvent, Key, MouseButton};

/// Pumps allowed for the platform to deliver `resumed` at startup.
const STARTUP_PUMPS: usize = 50;

pub fn map_key(code: KeyCode) -> Key {
    match code {
        KeyCode::Space => Key::Space,
        KeyCode::Escape => Key::Escape,
        KeyCode::KeyQ => Key::Q,
        KeyCode::KeyS => Key::S,
        KeyCode::KeyA => Key::A,
        _ => Key::Other,
    }
}

pub fn map_button(button: winit::event::MouseButton) -> MouseButton {
    match button {
        winit::event::MouseButton::Left => MouseButton::Left,
        winit::event::MouseButton::Right => MouseButton::Right,
        winit::event::MouseButton::Middle => MouseButton::Middle,
        _ => MouseButton::Other,
    }
}

/// Window pixel position to canvas pixel position.
pub fn to_canvas(pos: Vec2, window: (u32, u32), canvas: (u32, u32)) -> Vec2 {
    if window.0 == 0 || window.1 == 0 {
        return pos;
    }
    Vec2::new(
        pos.x * canvas.0 as f32 / window.0 as f32,
        pos.y * canvas.1 as f32 / window.1 as f32,
    )
}

/// Event handler state. Owns the window and the GPU objects once the
/// platform has resumed us.
struct WindowApp {
    attributes: WindowAttributes,
    canvas_size: (u32, u32),
    window_size: (u32, u32),
    pointer: Vec2,
    window: Option<Arc<Window>>,
    surface: Option<WindowSurface>,
    blit: Option<BlitPipeline>,
    events: Vec<InputEvent>,
    init_error: Option<anyhow::Error>,
}

impl WindowApp {
    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window = Arc::new(
            event_loop
                .create_window(self.attributes.clone())
                .context("Failed to create window")?,
        );
        let size = window.inner_size();
        let surface = WindowSurface::new(Arc::clone(&window))?;
        let blit = BlitPipeline::new(
            &surface.gpu.device,
            surface.config.format,
            self.canvas_size.0,
            self.canvas_size.1,
        );
        log::info!("Window opened: {}x{}", size.width, size.height);

        self.window_size = (size.width, size.height);
        self.window = Some(window);
        self.surface = Some(surface);
        self.blit = Some(blit);
        Ok(())
    }

    fn cursor(&self, x: f64, y: f64) -> Vec2 {
        to_canvas(Vec2::new(x as f32, y as f32), self.window_size, self.canvas_size)
    }
}

impl ApplicationHandler for WindowApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() || self.init_error.is_some() {
            return;
        }
        if let Err(err) = self.init(event_loop) {
            self.init_error = Some(err);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.events.push(InputEvent::Quit),
            WindowEvent::Resized(size) => {
                self.window_size = (size.width, size.height);
                if let Some(surface) = self.surface.as_mut() {
                    surface.resize(size.width, size.height);
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state != ElementState::Pressed || event.repeat {
                    return;
                }
                if let PhysicalKey::Code(code) = event.physical_key {
                    self.events.push(InputEvent::KeyPress(map_key(code)));
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.pointer = self.cursor(position.x, position.y);
                self.events.push(InputEvent::MouseMove(self.pointer));
            }
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button,
                ..
            } => {
                self.events.push(InputEvent::MouseButton {
                    button: map_button(button),
                    pos: self.pointer,
                });
            }
            _ => {}
        }
    }
}

/// On-screen presentation through winit and wgpu. Events are pumped once
/// per tick; the frame loop never hands control to winit.
pub struct WindowDisplay {
    event_loop: EventLoop<()>,
    app: WindowApp,
}

impl WindowDisplay {
    pub fn new(config: &DisplayConfig) -> Result<Self> {
        let event_loop = EventLoop::new().context("Failed to create event loop")?;

        let mut attributes = Window::default_attributes()
            .with_title("Spectrascope")
            .with_inner_size(PhysicalSize::new(config.width, config.height));
        if config.fullscreen {
            attributes = attributes.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }

        let mut display = Self {
            event_loop,
            app: WindowApp {
                attributes,
                canvas_size: (config.width, config.height),
                window_size: (config.width, config.height),
                pointer: Vec2::new(-1.0, -1.0),
                window: None,
                surface: None,
                blit: None,
                events: Vec::new(),
                init_error: None,
            },
        };

        for _ in 0..STARTUP_PUMPS {
            display.pump(Some(Duration::from_millis(10)));
            if let Some(err) = display.app.init_error.take() {
                return Err(err);
            }
            if display.app.surface.is_some() {
                return Ok(display);
            }
        }
        anyhow::bail!("Window system never became ready")
    }

    fn pump(&mut self, timeout: Option<Duration>) -> bool {
        match self.event_loop.pump_app_events(timeout, &mut self.app) {
            PumpStatus::Continue => true,
            PumpStatus::Exit(code) => {
                log::debug!("Event loop exited with code {}", code);
                false
            }
        }
    }
}

impl Display for WindowDisplay {
    fn present(&mut self, canvas: &Canvas) -> Result<()> {
        let (Some(surface), Some(blit)) = (self.app.surface.as_mut(), self.app.blit.as_ref()) else {
            return Ok(());
        };

        let frame = match surface.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::debug!("Surface lost, reconfiguring");
                surface.reconfigure();
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::debug!("Surface timed out, skipping frame");
                return Ok(());
            }
            Err(err) => anyhow::bail!("Failed to acquire frame: {}", err),
        };

        let view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let gpu = &surface.gpu;
        blit.upload(&gpu.queue, canvas);
        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("present") });
        blit.draw(&mut encoder, &view);
        gpu.queue.submit(std::iter::once(encoder.finish()));

        if let Some(window) = &self.app.window {
            window.pre_present_notify();
        }
        frame.present();
        Ok(())
    }

    fn poll_events(&mut self) -> Vec<InputEvent> {
        if !self.pump(Some(Duration::ZERO)) {
            self.app.events.push(InputEvent::Quit);
        }
        std::mem::take(&mut self.app.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pointer_scales_to_canvas() {
        let pos = to_canvas(Vec2::new(800.0, 240.0), (1600, 960), (800, 480));
        assert_eq!(pos, Vec2::new(400.0, 120.0));
        // Same size maps through unchanged
        let pos = to_canvas(Vec2::new(12.0, 34.0), (800, 480), (800, 480));
        assert_eq!(pos, Vec2::new(12.0, 34.0));
        // A minimized window reports zero size
        let pos = to_canvas(Vec2::new(5.0, 6.0), (0, 0), (800, 480));
        assert_eq!(pos, Vec2::new(5.0, 6.0));
    }

    #[test]
    fn shortcut_keys_map() {
        assert_eq!(map_key(KeyCode::Space), Key::Space);
        assert_eq!(map_key(KeyCode::Escape), Key::Escape);
        assert_eq!(map_key(KeyCode::KeyQ), Key::Q);
        assert_eq!(map_key(KeyCode::KeyS), Key::S);
        assert_eq!(map_key(KeyCode::KeyA), Key::A);
        assert_eq!(map_key(KeyCode::KeyZ), Key::Other);
    }

    #[test]
    fn buttons_map() {
        assert_eq!(map_button(winit::event::MouseButton::Left), MouseButton::Left);
        assert_eq!(map_button(winit::event::MouseButton::Back), MouseButton::Other);
    }
}
