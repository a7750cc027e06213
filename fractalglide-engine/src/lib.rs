//! Scheduler, render workers and surface plumbing for progressive
//! fractal reprojection.
//!
//! The embedder supplies a [`Surface`] (the display) and a
//! [`ZoomerEvents`] handler (the pixel formula plus lifecycle hooks),
//! then drives [`Zoomer::mainloop`] from its event loop. Each tick does
//! a bounded slice of work; two render worker threads turn finished
//! frames into RGBA in parallel with the next frame's updates.

pub mod config;
pub mod error;
pub mod events;
pub mod surface;
mod worker;
pub mod zoomer;

pub use config::ZoomerConfig;
pub use error::EngineError;
pub use events::ZoomerEvents;
pub use surface::{BufferSurface, Surface};
pub use zoomer::{PhaseAverages, State, Zoomer, ZoomerStats};

// Re-export core types for convenience
pub use fractalglide_core::{
    rotated_span, Frame, FramePool, FrameStats, Pixel, Ruler, View, ViewPosition,
    BACKGROUND_INDEX, PALETTE_SIZE, STALE,
};
