pub mod blit;
pub mod canvas;
pub mod display;
pub mod gpu;
pub mod text;
pub mod window;
