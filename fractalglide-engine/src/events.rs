//! Callbacks the scheduler invokes around the frame lifecycle.

use fractalglide_core::{Frame, Pixel, View, ViewPosition};

/// Hooks into the frame lifecycle. Only the pixel formula is required;
/// everything else defaults to a no-op.
///
/// The scheduler owns none of the handler's state and never re-enters
/// it: each hook receives exactly the pieces it may touch.
pub trait ZoomerEvents<P: Pixel> {
    /// The pixel formula: logical plane coordinates to a pixel code.
    fn on_update_pixel(&mut self, x: f64, y: f64) -> P;

    /// Views were (re)created for a new surface size.
    fn on_resize(&mut self, _view_width: u32, _view_height: u32, _pixel_width: u32, _pixel_height: u32) {
    }

    /// A frame left the pool; attach or refresh its palette here.
    fn on_init_frame(&mut self, _frame: &mut Frame<P>) {}

    /// A new frame began: the calc view has just inherited from the
    /// display view. Rewriting `position` here moves the next frame;
    /// the current one is already positioned.
    fn on_begin_frame(&mut self, _calc: &View<P>, _disp: &View<P>, _position: &mut ViewPosition) {}

    /// The frame is about to be rendered; last chance to swap its
    /// palette (for palette animation).
    fn on_render_frame(&mut self, _frame: &mut Frame<P>) {}

    /// The frame was painted; its statistics are final.
    fn on_end_frame(&mut self, _frame: &Frame<P>) {}
}
