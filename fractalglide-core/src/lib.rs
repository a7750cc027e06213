//! Core primitives for progressive fractal reprojection: frames,
//! per-axis inheritance rulers, views that warp a previous frame into a
//! new position, and the frame-to-RGBA renderer.

pub mod frame;
pub mod pool;
pub mod position;
pub mod render;
pub mod ruler;
pub mod view;

pub use frame::{rotated_span, Frame, FrameStats, Pixel, BACKGROUND_INDEX, PALETTE_SIZE};
pub use pool::FramePool;
pub use position::ViewPosition;
pub use render::render_frame;
pub use ruler::{Ruler, STALE};
pub use view::View;
