use anyhow::Result;

use super::canvas::Canvas;
use crate::ui::InputEvent;

/// Where finished frames go and where input comes from.
pub trait Display {
    fn present(&mut self, canvas: &Canvas) -> Result<()>;
    /// Drain the events received since the last call, without blocking.
    fn poll_events(&mut self) -> Vec<InputEvent>;
}

/// Discards frames and never produces input.
#[derive(Debug, Default)]
pub struct HeadlessDisplay {
    presented: u64,
}

impl HeadlessDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn presented(&self) -> u64 {
        self.presented
    }
}

impl Drop for HeadlessDisplay {
    fn drop(&mut self) {
        log::debug!("Headless display discarded {} frames", self.presented);
    }
}

impl Display for HeadlessDisplay {
    fn present(&mut self, _canvas: &Canvas) -> Result<()> {
        self.presented += 1;
        Ok(())
    }

    fn poll_events(&mut self) -> Vec<InputEvent> {
        Vec::new()
    }
}
