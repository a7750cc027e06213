//! Per-axis ruler: maps new coordinate stops to samples inherited from
//! the previous frame, tracking the residual error of each stop.

/// Sentinel in `from[]`: this stop is a displaced duplicate of a
/// neighbour. Its pixels are stale and the next update must prefer
/// recomputing or overwriting it.
pub const STALE: i32 = -1;

/// Inheritance table for one axis of a view.
///
/// Each index `i` is one pixel row or column. `coord[i]` is where the
/// stop should sample, `nearest[i]` is where the inherited sample was
/// actually taken, `error[i]` their distance, and `from[i]` the index in
/// the previous axis the sample came from (or [`STALE`]).
#[derive(Clone, Debug)]
pub struct Ruler {
    pub coord: Vec<f64>,
    pub nearest: Vec<f64>,
    pub error: Vec<f64>,
    pub from: Vec<i32>,
}

/// Coordinate of stop `i` on an axis of `len` stops spanning
/// `[start, end]`, endpoints inclusive.
#[inline]
fn stop_coord(start: f64, end: f64, len: usize, i: usize) -> f64 {
    if len < 2 {
        start
    } else {
        (end - start) * i as f64 / (len - 1) as f64 + start
    }
}

impl Ruler {
    pub fn new(len: usize) -> Self {
        assert!(len > 0, "ruler needs at least one stop");
        Self {
            coord: vec![0.0; len],
            nearest: vec![0.0; len],
            error: vec![0.0; len],
            from: vec![STALE; len],
        }
    }

    pub fn len(&self) -> usize {
        self.coord.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coord.is_empty()
    }

    /// Seed the axis linearly with no inheritance: every stop is its own
    /// exact sample. Pixels behind such a ruler are undefined until a
    /// brute-force fill runs.
    pub fn seed_linear(&mut self, start: f64, end: f64) {
        let n = self.len();
        for i in 0..n {
            let c = stop_coord(start, end, n, i);
            self.coord[i] = c;
            self.nearest[i] = c;
            self.error[i] = 0.0;
            self.from[i] = STALE;
        }
    }

    /// Rebuild this axis over `[start, end]` against the previous axis,
    /// choosing for every new stop the nearest old sample.
    ///
    /// A single linear sweep advances the old cursor while the next old
    /// sample is at least as close as the current one (ties prefer
    /// forward). Returns the number of stops inherited with zero error.
    pub fn rebuild(&mut self, start: f64, end: f64, old: &Ruler) -> u32 {
        let n = self.len();
        let m = old.len();
        let mut i_old = 0usize;
        let mut cnt_exact = 0u32;

        for i_new in 0..n {
            let curr = stop_coord(start, end, n, i_new);

            let mut curr_error = (curr - old.nearest[i_old]).abs();
            while i_old + 1 < m {
                let next_error = (curr - old.nearest[i_old + 1]).abs();
                if next_error > curr_error {
                    break;
                }
                i_old += 1;
                curr_error = next_error;
            }

            if curr_error == 0.0 {
                cnt_exact += 1;
            }

            self.coord[i_new] = curr;
            self.nearest[i_new] = old.nearest[i_old];
            self.error[i_new] = curr_error;
            self.from[i_new] = i_old as i32;
        }

        cnt_exact
    }

    /// Declare every stop exact: its sample sits precisely on its
    /// target coordinate. Used after a brute-force fill.
    pub fn make_exact(&mut self) {
        self.nearest.copy_from_slice(&self.coord);
        self.error.fill(0.0);
    }

    /// Collapse every run of stops sharing one `from` value to a single
    /// survivor, the stop with the smallest error (ties keep the
    /// leftmost). The others become [`STALE`] so the update loop knows
    /// their pixels are duplicates.
    pub fn mark_duplicates(&mut self) {
        let n = self.len();
        if n < 2 {
            return;
        }

        let mut run_from = self.from[0];
        let mut best = 0usize;
        for i in 1..n {
            if self.from[i] == run_from {
                if self.error[i] < self.error[best] {
                    self.from[best] = STALE;
                    best = i;
                } else {
                    self.from[i] = STALE;
                }
            } else {
                run_from = self.from[i];
                best = i;
            }
        }
    }

    /// Index and magnitude of the largest residual error.
    pub fn worst(&self) -> (usize, f64) {
        let mut worst_i = 0usize;
        let mut worst_e = self.error[0];
        for (i, &e) in self.error.iter().enumerate().skip(1) {
            if e > worst_e {
                worst_i = i;
                worst_e = e;
            }
        }
        (worst_i, worst_e)
    }

    /// True when two adjacent stops collapsed to the same coordinate:
    /// the zoom step has underflowed double precision.
    pub fn exhausted(&self) -> bool {
        self.coord.windows(2).any(|w| w[0] == w[1])
    }
}
