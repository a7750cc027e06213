//! A view pairs a position on the plane with a pixel grid and the two
//! rulers that let the grid inherit samples from a previous frame.

use crate::frame::{Frame, Pixel};
use crate::position::ViewPosition;
use crate::ruler::{Ruler, STALE};

/// One of the two alternating views the scheduler drives: a center and
/// radius, per-axis rulers, and the frame currently bound to it.
pub struct View<P: Pixel = u16> {
    pub view_width: u32,
    pub view_height: u32,
    pub pixel_width: u32,
    pub pixel_height: u32,

    pub center_x: f64,
    pub center_y: f64,
    pub radius: f64,
    pub angle: f64,

    /// Half-extents of the visible area, per axis.
    pub radius_view_hor: f64,
    pub radius_view_ver: f64,
    /// Half-extents of the full pixel grid, per axis. At least the view
    /// radii; larger when the grid carries rotation margin.
    pub radius_pixel_hor: f64,
    pub radius_pixel_ver: f64,

    pub x_ruler: Ruler,
    pub y_ruler: Ruler,

    /// The bound frame. `None` while the frame is in flight to a render
    /// worker or not yet attached.
    pub frame: Option<Frame<P>>,
}

impl<P: Pixel> View<P> {
    pub fn new(view_width: u32, view_height: u32, pixel_width: u32, pixel_height: u32) -> Self {
        assert!(
            pixel_width >= view_width && pixel_height >= view_height,
            "pixel grid {}x{} smaller than view {}x{}",
            pixel_width,
            pixel_height,
            view_width,
            view_height
        );

        Self {
            view_width,
            view_height,
            pixel_width,
            pixel_height,
            center_x: 0.0,
            center_y: 0.0,
            radius: 0.0,
            angle: 0.0,
            radius_view_hor: 0.0,
            radius_view_ver: 0.0,
            radius_pixel_hor: 0.0,
            radius_pixel_ver: 0.0,
            x_ruler: Ruler::new(pixel_width as usize),
            y_ruler: Ruler::new(pixel_height as usize),
            frame: None,
        }
    }

    /// Bind `frame`, move to `position` and salvage what the previous
    /// view computed: rebuild both rulers against it and warp its pixel
    /// grid into the new frame.
    ///
    /// Without a usable previous view the rulers seed linearly and the
    /// pixel grid is left undefined; [`View::fill`] must run before the
    /// frame means anything.
    pub fn set_position(
        &mut self,
        mut frame: Frame<P>,
        position: &ViewPosition,
        previous: Option<&View<P>>,
    ) {
        assert!(
            frame.matches(self.view_width, self.view_height, self.pixel_width, self.pixel_height),
            "frame geometry does not match view"
        );

        self.center_x = position.center_x;
        self.center_y = position.center_y;
        self.radius = position.radius;
        self.angle = position.angle;
        frame.angle = position.angle;

        // scale radii so the larger view dimension spans 2*radius
        let max_view = self.view_width.max(self.view_height) as f64;
        self.radius_view_hor = self.radius * self.view_width as f64 / max_view;
        self.radius_view_ver = self.radius * self.view_height as f64 / max_view;
        self.radius_pixel_hor = self.radius * self.pixel_width as f64 / max_view;
        self.radius_pixel_ver = self.radius * self.pixel_height as f64 / max_view;

        let x_start = self.center_x - self.radius_pixel_hor;
        let x_end = self.center_x + self.radius_pixel_hor;
        let y_start = self.center_y - self.radius_pixel_ver;
        let y_end = self.center_y + self.radius_pixel_ver;

        let inherited = previous.and_then(|prev| prev.frame.as_ref().map(|f| (prev, f)));
        match inherited {
            Some((prev, prev_frame)) => {
                let x_exact = self.x_ruler.rebuild(x_start, x_end, &prev.x_ruler);
                let y_exact = self.y_ruler.rebuild(y_start, y_end, &prev.y_ruler);

                warp_pixels(
                    &mut frame.pixels,
                    self.pixel_width as usize,
                    self.pixel_height as usize,
                    &prev_frame.pixels,
                    prev.pixel_width as usize,
                    &self.x_ruler.from,
                    &self.y_ruler.from,
                );

                self.x_ruler.mark_duplicates();
                self.y_ruler.mark_duplicates();

                frame.stats.cnt_v_lines += x_exact;
                frame.stats.cnt_h_lines += y_exact;
                frame.stats.cnt_pixels += x_exact * y_exact;
                frame.update_quality();
            }
            None => {
                self.x_ruler.seed_linear(x_start, x_end);
                self.y_ruler.seed_linear(y_start, y_end);
            }
        }

        self.frame = Some(frame);
    }

    /// Brute-force compute every pixel of the bound frame. Afterwards
    /// both rulers are fully exact and quality is 1.
    pub fn fill(&mut self, calc: &mut dyn FnMut(f64, f64) -> P) {
        let Some(frame) = self.frame.as_mut() else {
            return;
        };

        let pw = self.pixel_width as usize;
        let ph = self.pixel_height as usize;
        for j in 0..ph {
            let y = self.y_ruler.coord[j];
            let row = j * pw;
            for (i, px) in frame.pixels[row..row + pw].iter_mut().enumerate() {
                *px = calc(self.x_ruler.coord[i], y);
            }
        }

        self.x_ruler.make_exact();
        self.y_ruler.make_exact();

        frame.stats.cnt_pixels = (pw * ph) as u32;
        frame.stats.cnt_v_lines = pw as u32;
        frame.stats.cnt_h_lines = ph as u32;
        frame.update_quality();
    }

    /// Recompute the single worst-approximated row or column through
    /// `calc`, then duplicate it over adjacent stale neighbours.
    ///
    /// Returns `false` when every stop is already exact (no work left).
    pub fn update_lines(&mut self, calc: &mut dyn FnMut(f64, f64) -> P) -> bool {
        let Some(frame) = self.frame.as_mut() else {
            return false;
        };

        let (worst_xi, worst_x) = self.x_ruler.worst();
        let (worst_yj, worst_y) = self.y_ruler.worst();
        if worst_x <= 0.0 && worst_y <= 0.0 {
            return false;
        }

        let pw = self.pixel_width as usize;
        let ph = self.pixel_height as usize;

        if worst_x > worst_y {
            // recompute column worst_xi at its target coordinate
            let i = worst_xi;
            let x = self.x_ruler.coord[i];
            let mut last = calc(x, self.y_ruler.coord[0]);
            frame.pixels[i] = last;
            frame.stats.cnt_pixels += 1;
            for j in 1..ph {
                // only cross exact or canonical rows; carry the last
                // value over stale duplicate rows
                if self.y_ruler.error[j] == 0.0 || self.y_ruler.from[j] != STALE {
                    last = calc(x, self.y_ruler.coord[j]);
                    frame.stats.cnt_pixels += 1;
                }
                frame.pixels[j * pw + i] = last;
            }

            for u in i + 1..pw {
                if self.x_ruler.error[u] == 0.0 || self.x_ruler.from[u] != STALE {
                    break;
                }
                for j in 0..ph {
                    frame.pixels[j * pw + u] = frame.pixels[j * pw + i];
                }
            }

            self.x_ruler.nearest[i] = x;
            self.x_ruler.error[i] = 0.0;
            frame.stats.cnt_v_lines += 1;
        } else {
            // recompute row worst_yj
            let j = worst_yj;
            let y = self.y_ruler.coord[j];
            let row = j * pw;
            let mut last = calc(self.x_ruler.coord[0], y);
            frame.pixels[row] = last;
            frame.stats.cnt_pixels += 1;
            for i in 1..pw {
                if self.x_ruler.error[i] == 0.0 || self.x_ruler.from[i] != STALE {
                    last = calc(self.x_ruler.coord[i], y);
                    frame.stats.cnt_pixels += 1;
                }
                frame.pixels[row + i] = last;
            }

            for v in j + 1..ph {
                if self.y_ruler.error[v] == 0.0 || self.y_ruler.from[v] != STALE {
                    break;
                }
                frame.pixels.copy_within(row..row + pw, v * pw);
            }

            self.y_ruler.nearest[j] = y;
            self.y_ruler.error[j] = 0.0;
            frame.stats.cnt_h_lines += 1;
        }

        frame.update_quality();
        true
    }

    /// True when the zoom step has underflowed double precision on
    /// either axis. The caller should stop zooming in.
    pub fn reached_limits(&self) -> bool {
        self.x_ruler.exhausted() || self.y_ruler.exhausted()
    }
}

/// Warp the previous pixel grid into `dst` through the per-axis `from`
/// tables. Rows sharing a source row are block-copied from the row
/// above instead of reindexed.
fn warp_pixels<P: Pixel>(
    dst: &mut [P],
    dst_width: usize,
    dst_height: usize,
    src: &[P],
    src_width: usize,
    x_from: &[i32],
    y_from: &[i32],
) {
    for j in 0..dst_height {
        let row = j * dst_width;
        if j > 0 && y_from[j] == y_from[j - 1] {
            dst.copy_within(row - dst_width..row, row);
        } else {
            let src_row = y_from[j] as usize * src_width;
            for i in 0..dst_width {
                dst[row + i] = src[src_row + x_from[i] as usize];
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled_view(size: u32, value: u16, position: &ViewPosition) -> View<u16> {
        let mut view: View<u16> = View::new(size, size, size, size);
        view.set_position(Frame::new(size, size, size, size), position, None);
        view.fill(&mut |_, _| value);
        view
    }

    #[test]
    fn fill_makes_view_exact() {
        let view = filled_view(16, 3, &ViewPosition::new(0.0, 0.0, 2.0));
        let frame = view.frame.as_ref().unwrap();
        assert_eq!(frame.stats.quality, 1.0);
        assert_eq!(frame.stats.cnt_pixels, 256);
        assert!(frame.pixels.iter().all(|&p| p == 3));
        assert!(!view.reached_limits());
    }

    #[test]
    fn warp_preserves_constant_frames() {
        // property: warping a constant frame yields a constant frame,
        // whatever the new position
        let prev = filled_view(16, 9, &ViewPosition::new(0.0, 0.0, 2.0));

        for position in [
            ViewPosition::new(0.3, -0.7, 1.0),
            ViewPosition::new(-1.5, 1.5, 0.01),
            ViewPosition::new(0.0, 0.0, 8.0),
        ] {
            let mut view: View<u16> = View::new(16, 16, 16, 16);
            view.set_position(Frame::new(16, 16, 16, 16), &position, Some(&prev));
            let frame = view.frame.as_ref().unwrap();
            assert!(frame.pixels.iter().all(|&p| p == 9), "at {:?}", position);
        }
    }

    #[test]
    fn identical_position_inherits_everything() {
        let position = ViewPosition::new(-0.5, 0.0, 2.0);
        let prev = filled_view(16, 1, &position);

        let mut view: View<u16> = View::new(16, 16, 16, 16);
        view.set_position(Frame::new(16, 16, 16, 16), &position, Some(&prev));
        let frame = view.frame.as_ref().unwrap();
        assert_eq!(frame.stats.cnt_pixels, 256);
        assert_eq!(frame.stats.quality, 1.0);
        assert!(view.x_ruler.error.iter().all(|&e| e == 0.0));
    }

    #[test]
    fn dyadic_zoom_inherits_alternate_columns() {
        // 17 stops over [-2,2]: step 1/4, exactly representable. Zooming
        // to radius 1 gives step 1/8; every other new stop coincides.
        let prev = filled_view(17, 5, &ViewPosition::new(0.0, 0.0, 2.0));

        let mut view: View<u16> = View::new(17, 17, 17, 17);
        view.set_position(Frame::new(17, 17, 17, 17), &ViewPosition::new(0.0, 0.0, 1.0), Some(&prev));

        let exact_x = view.x_ruler.error.iter().filter(|&&e| e == 0.0).count();
        assert_eq!(exact_x, 9);
        let frame = view.frame.as_ref().unwrap();
        assert_eq!(frame.stats.cnt_pixels, 81);
        assert_eq!(frame.stats.cnt_v_lines, 9);
        assert_eq!(frame.stats.cnt_h_lines, 9);
    }

    #[test]
    fn duplicate_runs_keep_single_survivor() {
        // zooming in 4x makes runs of new stops share one old sample
        let prev = filled_view(32, 0, &ViewPosition::new(0.0, 0.0, 2.0));

        let mut view: View<u16> = View::new(32, 32, 32, 32);
        view.set_position(Frame::new(32, 32, 32, 32), &ViewPosition::new(0.1, 0.1, 0.5), Some(&prev));

        for ruler in [&view.x_ruler, &view.y_ruler] {
            let mut i = 0;
            while i < ruler.len() {
                if ruler.from[i] == STALE {
                    i += 1;
                    continue;
                }
                // find the run of stops that inherited from this source
                let source = ruler.from[i];
                let mut survivors = 0;
                let mut j = i;
                while j < ruler.len() && (ruler.from[j] == source || ruler.from[j] == STALE) {
                    if ruler.from[j] == source {
                        survivors += 1;
                    }
                    j += 1;
                }
                assert_eq!(survivors, 1, "run starting at {} has {} survivors", i, survivors);
                i = j;
            }
        }
    }

    #[test]
    fn update_lines_converges_to_exact() {
        let prev = filled_view(12, 2, &ViewPosition::new(0.0, 0.0, 2.0));

        let mut view: View<u16> = View::new(12, 12, 12, 12);
        view.set_position(
            Frame::new(12, 12, 12, 12),
            &ViewPosition::new(0.33, -0.21, 0.7),
            Some(&prev),
        );

        let mut calc = |_: f64, _: f64| 7u16;
        let mut rounds = 0;
        while view.update_lines(&mut calc) {
            rounds += 1;
            assert!(rounds <= 24, "update did not converge");
        }

        let (_, wx) = view.x_ruler.worst();
        let (_, wy) = view.y_ruler.worst();
        assert_eq!(wx, 0.0);
        assert_eq!(wy, 0.0);
        // once converged the whole grid carries computed values
        assert!(view.frame.as_ref().unwrap().pixels.iter().all(|&p| p == 7));
        // converged views report no further work
        assert!(!view.update_lines(&mut calc));
    }

    #[test]
    fn update_lines_recomputes_worst_column_first() {
        let prev = filled_view(8, 1, &ViewPosition::new(0.0, 0.0, 2.0));

        let mut view: View<u16> = View::new(8, 8, 8, 8);
        // shift horizontally only: x errors dominate y errors
        view.set_position(
            Frame::new(8, 8, 8, 8),
            &ViewPosition::new(0.21, 0.0, 2.0),
            Some(&prev),
        );
        let (worst_xi, worst_x) = view.x_ruler.worst();
        let (_, worst_y) = view.y_ruler.worst();
        assert!(worst_x > worst_y);

        view.update_lines(&mut |_, _| 9u16);
        assert_eq!(view.x_ruler.error[worst_xi], 0.0);
        let frame = view.frame.as_ref().unwrap();
        assert!(frame.stats.cnt_v_lines >= 1);
        // the recomputed column holds freshly calculated values
        for j in 0..8 {
            assert_eq!(frame.pixels[j * 8 + worst_xi], 9);
        }
    }

    #[test]
    fn update_lines_caps_work_per_call() {
        let prev = filled_view(10, 0, &ViewPosition::new(0.0, 0.0, 2.0));

        let mut view: View<u16> = View::new(10, 10, 10, 10);
        view.set_position(
            Frame::new(10, 10, 10, 10),
            &ViewPosition::new(0.4, 0.4, 1.3),
            Some(&prev),
        );

        let before = view.frame.as_ref().unwrap().stats.cnt_pixels;
        view.update_lines(&mut |_, _| 0u16);
        let after = view.frame.as_ref().unwrap().stats.cnt_pixels;
        assert!(after - before <= 10 + 10);
    }

    #[test]
    fn reached_limits_after_enough_halvings() {
        let mut position = ViewPosition::new(0.5, 0.5, 2.0);
        let mut view = filled_view(9, 0, &position);
        assert!(!view.reached_limits());

        let mut halvings = 0;
        while !view.reached_limits() {
            position.radius /= 2.0;
            halvings += 1;
            assert!(halvings <= 64, "limits never reached");
            let frame = view.frame.take().unwrap();
            view.set_position(frame, &position, None);
        }
        // double precision runs out within a few steps of 2^-53
        assert!(halvings >= 45);
    }
}
