//! The display the scheduler paints onto.

use fractalglide_core::{Frame, Pixel};

/// A paint sink with a current size. The scheduler polls `view_size`
/// at every COPY; a changed size triggers view reconstruction.
pub trait Surface<P: Pixel> {
    /// Current size of the display area in pixels.
    fn view_size(&self) -> (u32, u32);

    /// Deliver a painted frame. `frame.rgba` holds
    /// `view_width * view_height` RGBA values; [`Frame::rgba_bytes`]
    /// exposes the same data as bytes.
    fn put_image_data(&mut self, frame: &Frame<P>);
}

/// In-memory surface: keeps the most recent painted RGBA. Useful for
/// headless embedding and tests.
#[derive(Default)]
pub struct BufferSurface {
    width: u32,
    height: u32,
    pub last_rgba: Vec<u32>,
    pub frames_painted: u32,
}

impl BufferSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            last_rgba: Vec::new(),
            frames_painted: 0,
        }
    }

    /// Change the reported size; the scheduler picks it up at the next
    /// COPY.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }
}

impl<P: Pixel> Surface<P> for BufferSurface {
    fn view_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn put_image_data(&mut self, frame: &Frame<P>) {
        self.last_rgba.clear();
        self.last_rgba.extend_from_slice(&frame.rgba);
        self.frames_painted += 1;
    }
}
