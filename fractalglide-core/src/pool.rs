//! Free-frame pool: reuse buffers instead of reallocating them every tick.

use crate::frame::{Frame, FrameStats, Pixel};

/// Single-owner pool of released frames.
///
/// Allocation pops released frames until one matches the requested
/// geometry; mismatched entries (left over from before a resize) are
/// discarded on the way. When the pool runs dry a fresh frame is built.
#[derive(Default)]
pub struct FramePool<P: Pixel> {
    free: Vec<Frame<P>>,
}

impl<P: Pixel> FramePool<P> {
    pub fn new() -> Self {
        Self { free: Vec::new() }
    }

    /// Frames currently parked in the pool.
    pub fn available(&self) -> usize {
        self.free.len()
    }

    /// Take a frame with the requested geometry, resetting its per-frame
    /// state. Palette and buffer contents are left as-is: every consumer
    /// overwrites them in full.
    pub fn alloc(
        &mut self,
        view_width: u32,
        view_height: u32,
        pixel_width: u32,
        pixel_height: u32,
    ) -> Frame<P> {
        while let Some(mut frame) = self.free.pop() {
            if frame.matches(view_width, view_height, pixel_width, pixel_height) {
                frame.stats = FrameStats::default();
                frame.time_expire = 0.0;
                frame.angle = 0.0;
                return frame;
            }
            // stale geometry from before a resize; drop it
        }
        Frame::new(view_width, view_height, pixel_width, pixel_height)
    }

    /// Return a frame for reuse.
    pub fn release(&mut self, frame: Frame<P>) {
        self.free.push(frame);
    }
}
