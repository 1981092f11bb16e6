//! Scroll target abstraction

use resist_core::ScrollDelta;

/// Something that can be scrolled relative to its current position
pub trait Viewport: Send {
    /// Scroll by `delta`. Failures are reported but never stop the page.
    fn scroll_by(&mut self, delta: ScrollDelta) -> anyhow::Result<()>;
}

/// Viewport that records every scroll it receives
#[derive(Debug, Clone, Default)]
pub struct RecordingViewport {
    pub left: f64,
    pub top: f64,
    pub scrolls: Vec<ScrollDelta>,
}

impl RecordingViewport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Viewport for RecordingViewport {
    fn scroll_by(&mut self, delta: ScrollDelta) -> anyhow::Result<()> {
        self.left += delta.left;
        self.top += delta.top;
        self.scrolls.push(delta);
        Ok(())
    }
}
