//! Frame to RGBA projection: palette indirection, central crop, and
//! fixed-point nearest-neighbour rotation.

use crate::frame::{Frame, Pixel};
use std::time::Instant;

/// Populate `frame.rgba` from `frame.pixels`.
///
/// `now_ms` is the engine clock. A frame whose deadline has already
/// passed on entry is dropped: nothing is written and
/// `duration_render` stays zero, the drop signal the scheduler watches
/// for. Frames without a deadline (`time_expire == 0`) never expire.
pub fn render_frame<P: Pixel>(frame: &mut Frame<P>, now_ms: f64) -> bool {
    if frame.time_expire > 0.0 && now_ms >= frame.time_expire {
        frame.stats.duration_render = 0.0;
        return false;
    }

    let start = Instant::now();
    if frame.angle == 0.0 {
        render_axis_aligned(frame);
    } else {
        render_rotated(frame);
    }
    // clamp away from zero, zero means dropped
    frame.stats.duration_render = (start.elapsed().as_secs_f64() * 1000.0).max(0.001);
    true
}

/// Crop the central view out of the pixel grid, palette-translating
/// when a palette is attached. The 1:1 paletteless case is a straight
/// copy.
fn render_axis_aligned<P: Pixel>(frame: &mut Frame<P>) {
    let vw = frame.view_width as usize;
    let vh = frame.view_height as usize;
    let pw = frame.pixel_width as usize;
    let ph = frame.pixel_height as usize;
    let i0 = (pw - vw) / 2;
    let j0 = (ph - vh) / 2;

    match &frame.palette {
        Some(palette) => {
            for v in 0..vh {
                let src = (j0 + v) * pw + i0;
                let dst = v * vw;
                for u in 0..vw {
                    frame.rgba[dst + u] = palette[frame.pixels[src + u].palette_index()];
                }
            }
        }
        None if pw == vw && ph == vh => {
            for (out, &px) in frame.rgba.iter_mut().zip(frame.pixels.iter()) {
                *out = px.to_rgba();
            }
        }
        None => {
            for v in 0..vh {
                let src = (j0 + v) * pw + i0;
                let dst = v * vw;
                for u in 0..vw {
                    frame.rgba[dst + u] = frame.pixels[src + u].to_rgba();
                }
            }
        }
    }
}

/// Nearest-neighbour rotation through 16.16 fixed point.
///
/// The constants carry a 32768 half-pixel bias in the start offsets;
/// the steps are the rotation matrix scaled to 65536. Changing any of
/// them changes rotated output pixel-for-pixel.
fn render_rotated<P: Pixel>(frame: &mut Frame<P>) {
    let vw = frame.view_width as usize;
    let vh = frame.view_height as usize;
    let pw = frame.pixel_width as usize;

    let (rsin, rcos) = frame.angle.to_radians().sin_cos();
    let x_start = ((frame.pixel_width as f64 - frame.view_height as f64 * rsin
        - frame.view_width as f64 * rcos)
        * 32768.0)
        .floor() as i64;
    let y_start = ((frame.pixel_height as f64 - frame.view_height as f64 * rcos
        + frame.view_width as f64 * rsin)
        * 32768.0)
        .floor() as i64;
    let ix_step = (rcos * 65536.0).floor() as i64;
    let iy_step = (-rsin * 65536.0).floor() as i64;
    let jx_step = (rsin * 65536.0).floor() as i64;
    let jy_step = (rcos * 65536.0).floor() as i64;

    let mut row_x = x_start;
    let mut row_y = y_start;
    match &frame.palette {
        Some(palette) => {
            for v in 0..vh {
                let mut ix = row_x;
                let mut iy = row_y;
                let dst = v * vw;
                for u in 0..vw {
                    let px = frame.pixels[(iy >> 16) as usize * pw + (ix >> 16) as usize];
                    frame.rgba[dst + u] = palette[px.palette_index()];
                    ix += ix_step;
                    iy += iy_step;
                }
                row_x += jx_step;
                row_y += jy_step;
            }
        }
        None => {
            for v in 0..vh {
                let mut ix = row_x;
                let mut iy = row_y;
                let dst = v * vw;
                for u in 0..vw {
                    let px = frame.pixels[(iy >> 16) as usize * pw + (ix >> 16) as usize];
                    frame.rgba[dst + u] = px.to_rgba();
                    ix += ix_step;
                    iy += iy_step;
                }
                row_x += jx_step;
                row_y += jy_step;
            }
        }
    }
}
