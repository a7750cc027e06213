//! The frame scheduler: drives COPY / UPDATE / RENDER / PAINT against
//! the display clock with two alternating views.
//!
//! Each tick of [`Zoomer::mainloop`] performs one bounded step and
//! returns, so the embedding context stays responsive. While a render
//! worker turns the display view's finished frame into RGBA, the main
//! context spends the remaining frame budget recomputing the worst
//! lines of the calculation view.

use crate::config::ZoomerConfig;
use crate::error::EngineError;
use crate::events::ZoomerEvents;
use crate::surface::Surface;
use crate::worker::RenderWorkers;
use fractalglide_core::{render_frame, rotated_span, Frame, FramePool, Pixel, View, ViewPosition};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Scheduler phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    Stop,
    Copy,
    Update,
    Render,
    Paint,
}

/// Low-pass averaged per-phase durations, in milliseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseAverages {
    pub copy: f64,
    pub update: f64,
    pub render: f64,
    pub paint: f64,
}

/// Snapshot of the scheduler's counters and averages.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ZoomerStats {
    pub frame_nr: u32,
    pub cnt_dropped: u32,
    /// Current adaptive target, at most the configured `frame_rate`.
    pub frame_rate: f64,
    pub avg: PhaseAverages,
    /// Averaged milliseconds between painted frames, in arrival order.
    pub avg_frame_interval: f64,
    /// Averaged milliseconds the UPDATE phase ran past its sync point.
    pub update_overshoot: f64,
}

/// How far past the sync point the scheduler tolerates silence before
/// it assumes the display clock was lost (suspension, a stalled
/// calculator) and resyncs.
const SYNC_LOST_MS: f64 = 2000.0;

/// Cooldown between adaptive frame-rate reductions.
const THROTTLE_WINDOW_MS: f64 = 2000.0;

#[inline]
fn clock_ms(epoch: Instant) -> f64 {
    epoch.elapsed().as_secs_f64() * 1000.0
}

fn pixel_dims(view_width: u32, view_height: u32, enable_angle: bool) -> (u32, u32) {
    if enable_angle {
        let side = rotated_span(view_width, view_height);
        (side, side)
    } else {
        (view_width, view_height)
    }
}

/// The progressive reprojection scheduler.
///
/// Owns the two views, the frame pool and the render workers; the
/// embedder owns the surface and the event handler and drives the
/// scheduler by calling [`Zoomer::mainloop`] (or [`Zoomer::run_for`]).
pub struct Zoomer<P: Pixel, S: Surface<P>, H: ZoomerEvents<P>> {
    surface: S,
    handler: H,
    config: ZoomerConfig,
    enable_angle: bool,

    state: State,
    frame_nr: u32,
    position: ViewPosition,

    view_width: u32,
    view_height: u32,
    pixel_width: u32,
    pixel_height: u32,

    view0: View<P>,
    view1: View<P>,
    /// True when `view0` is the calculation view.
    calc0: bool,
    first_frame_done: bool,

    pool: FramePool<P>,
    workers: Option<RenderWorkers<P>>,

    epoch: Instant,
    frame_rate: f64,
    avg: PhaseAverages,
    avg_frame_interval: f64,
    update_overshoot: f64,
    time_copy_start: f64,
    next_sync: f64,
    time_last_wake: f64,
    time_last_drop: f64,
    time_last_frame: f64,
    cnt_dropped: u32,
}

impl<P: Pixel, S: Surface<P>, H: ZoomerEvents<P>> Zoomer<P, S, H> {
    pub fn new(
        surface: S,
        handler: H,
        enable_angle: bool,
        config: ZoomerConfig,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let (view_width, view_height) = surface.view_size();
        if view_width == 0 || view_height == 0 {
            return Err(EngineError::EmptySurface(view_width, view_height));
        }
        let (pixel_width, pixel_height) = pixel_dims(view_width, view_height, enable_angle);

        let epoch = Instant::now();
        let workers = if config.disable_workers {
            None
        } else {
            Some(RenderWorkers::spawn(2, epoch)?)
        };

        Ok(Self {
            view0: View::new(view_width, view_height, pixel_width, pixel_height),
            view1: View::new(view_width, view_height, pixel_width, pixel_height),
            calc0: true,
            first_frame_done: false,
            pool: FramePool::new(),
            workers,
            surface,
            handler,
            config,
            enable_angle,
            state: State::Stop,
            frame_nr: 0,
            position: ViewPosition::default(),
            view_width,
            view_height,
            pixel_width,
            pixel_height,
            epoch,
            frame_rate: config.frame_rate,
            avg: PhaseAverages::default(),
            avg_frame_interval: 0.0,
            update_overshoot: 0.0,
            time_copy_start: 0.0,
            next_sync: 0.0,
            time_last_wake: 0.0,
            time_last_drop: 0.0,
            time_last_frame: 0.0,
            cnt_dropped: 0,
        })
    }

    /// Begin scheduling frames. The first frame is brute-force filled;
    /// every later frame inherits from its predecessor.
    pub fn start(&mut self) {
        if self.state == State::Stop {
            info!("starting at {:.1} fps", self.frame_rate);
            self.state = State::Copy;
            self.wake();
        }
    }

    pub fn stop(&mut self) {
        self.state = State::Stop;
    }

    /// Move the view. Takes effect at the next COPY.
    pub fn set_position(&mut self, mut position: ViewPosition) {
        if !self.enable_angle {
            // the pixel grid carries no rotation margin
            position.angle = 0.0;
        }
        self.position = position;
        self.wake();
    }

    /// Note user activity: updates run on the tight per-frame budget
    /// for the next `wake_timeout` milliseconds instead of the idle
    /// burst.
    pub fn wake(&mut self) {
        self.time_last_wake = clock_ms(self.epoch);
    }

    /// One cooperative step. Returns a suggested sleep before the next
    /// call, or `None` once stopped.
    pub fn mainloop(&mut self) -> Option<Duration> {
        self.drain_worker_replies();
        let now = clock_ms(self.epoch);

        if self.state != State::Stop && self.next_sync > 0.0 && now > self.next_sync + SYNC_LOST_MS {
            warn!("display sync lost by {:.0} ms; resyncing", now - self.next_sync);
            self.count_drop(now);
            self.time_copy_start = now;
            self.next_sync = now + 1000.0 / self.frame_rate;
            self.state = State::Copy;
        }

        match self.state {
            State::Stop => None,
            State::Copy => {
                self.state_copy(now);
                Some(Duration::ZERO)
            }
            State::Update => Some(self.state_update(now)),
            State::Render => {
                self.state_render(now);
                Some(Duration::ZERO)
            }
            State::Paint => {
                self.state_paint();
                Some(Duration::ZERO)
            }
        }
    }

    /// Drive the mainloop for up to `duration`, parking briefly when
    /// the scheduler has nothing to do.
    pub fn run_for(&mut self, duration: Duration) {
        let deadline = Instant::now() + duration;
        loop {
            let Some(hint) = self.mainloop() else { break };
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            if !hint.is_zero() {
                // cap the park so worker replies keep draining
                let cap = Duration::from_millis(10);
                std::thread::sleep(hint.min(cap).min(deadline - now));
            }
        }
    }

    // ------------------------------------------------------------------
    // state steps
    // ------------------------------------------------------------------

    fn state_copy(&mut self, now: f64) {
        let (surface_w, surface_h) = self.surface.view_size();
        if (surface_w, surface_h) != (self.view_width, self.view_height) {
            self.rebuild_views(surface_w, surface_h, now);
            return;
        }

        self.frame_nr += 1;
        self.calc0 = !self.calc0;
        self.time_copy_start = now;
        self.next_sync = now + 1000.0 / self.frame_rate;

        let mut frame = self.pool.alloc(
            self.view_width,
            self.view_height,
            self.pixel_width,
            self.pixel_height,
        );
        frame.stats.frame_nr = self.frame_nr;
        self.handler.on_init_frame(&mut frame);

        let expire = now + 2.0 * 1000.0 / self.frame_rate;
        let position = self.position;
        let epoch = self.epoch;
        let first = !self.first_frame_done;

        let (calc, disp) = if self.calc0 {
            (&mut self.view0, &mut self.view1)
        } else {
            (&mut self.view1, &mut self.view0)
        };

        if let Some(outgoing) = disp.frame.as_mut() {
            outgoing.time_expire = expire;
        }

        let previous = if first { None } else { Some(&*disp) };
        calc.set_position(frame, &position, previous);
        if first {
            let handler = &mut self.handler;
            calc.fill(&mut |x, y| handler.on_update_pixel(x, y));
            self.first_frame_done = true;
        }

        let copy_ms = clock_ms(epoch) - now;
        if let Some(bound) = calc.frame.as_mut() {
            bound.stats.duration_copy = copy_ms;
        }
        self.avg.copy += (copy_ms - self.avg.copy) * self.config.coef;

        self.handler.on_begin_frame(&*calc, &*disp, &mut self.position);

        match &self.workers {
            Some(workers) => {
                if let Some(mut outgoing) = disp.frame.take() {
                    self.handler.on_render_frame(&mut outgoing);
                    workers.submit((self.frame_nr & 1) as usize, outgoing);
                }
                self.state = State::Update;
            }
            None => {
                self.state = if disp.frame.is_some() {
                    State::Render
                } else {
                    State::Update
                };
            }
        }
        debug!("frame {} copied in {:.2} ms", self.frame_nr, copy_ms);
    }

    fn state_update(&mut self, now: f64) -> Duration {
        let period = 1000.0 / self.frame_rate;
        let inline = self.workers.is_none();
        let mut next_sync = self.time_copy_start + period - self.avg.copy - self.avg.paint;
        if inline {
            next_sync -= self.avg.render;
        }
        if now - self.time_last_wake > self.config.wake_timeout {
            // nothing moved recently; spend the idle burst instead
            next_sync = self.time_copy_start + self.config.update_idle_burst;
        }
        self.next_sync = next_sync;

        let end = (now + self.config.update_slice).min(next_sync);
        let epoch = self.epoch;

        let handler = &mut self.handler;
        let calc = if self.calc0 {
            &mut self.view0
        } else {
            &mut self.view1
        };

        let mut worked;
        let mut t;
        loop {
            worked = calc.update_lines(&mut |x, y| handler.on_update_pixel(x, y));
            t = clock_ms(epoch);
            if !worked || t >= end {
                break;
            }
        }

        if let Some(bound) = calc.frame.as_mut() {
            bound.stats.duration_update += t - now;
        }
        let update_total = calc.frame.as_ref().map_or(0.0, |f| f.stats.duration_update);

        if t >= next_sync {
            self.update_overshoot += (t - next_sync - self.update_overshoot) * self.config.coef;
            self.avg.update += (update_total - self.avg.update) * self.config.coef;
            self.state = State::Copy;
            return Duration::ZERO;
        }
        if worked {
            Duration::ZERO
        } else {
            // converged; park until the sync point
            Duration::from_secs_f64(((next_sync - t) / 1000.0).max(0.0))
        }
    }

    /// Inline rendering, used only with `disable_workers`.
    fn state_render(&mut self, now: f64) {
        let epoch = self.epoch;
        let disp = if self.calc0 {
            &mut self.view1
        } else {
            &mut self.view0
        };
        let Some(mut frame) = disp.frame.take() else {
            self.state = State::Update;
            return;
        };

        self.handler.on_render_frame(&mut frame);
        if render_frame(&mut frame, clock_ms(epoch)) {
            self.avg.render += (frame.stats.duration_render - self.avg.render) * self.config.coef;
            disp.frame = Some(frame);
            self.state = State::Paint;
        } else {
            debug!("frame {} dropped at render", frame.stats.frame_nr);
            self.pool.release(frame);
            self.count_drop(now);
            self.state = State::Copy;
        }
    }

    fn state_paint(&mut self) {
        let epoch = self.epoch;
        let disp = if self.calc0 {
            &mut self.view1
        } else {
            &mut self.view0
        };
        if let Some(mut frame) = disp.frame.take() {
            let paint_start = clock_ms(epoch);
            self.surface.put_image_data(&frame);
            frame.stats.duration_paint = clock_ms(epoch) - paint_start;
            self.finish_frame(frame);
        }
        self.state = State::Update;
    }

    /// Frames returning from the render workers, handled alongside
    /// whatever state the scheduler is in.
    fn drain_worker_replies(&mut self) {
        let mut frames = Vec::new();
        if let Some(workers) = &self.workers {
            while let Some(reply) = workers.try_recv() {
                frames.push(reply.frame);
            }
        }

        let epoch = self.epoch;
        for mut frame in frames {
            let now = clock_ms(epoch);
            if !frame.matches(
                self.view_width,
                self.view_height,
                self.pixel_width,
                self.pixel_height,
            ) {
                // finished after a resize; quietly recycled
                self.pool.release(frame);
                continue;
            }
            if frame.stats.duration_render == 0.0 {
                debug!("frame {} dropped by worker", frame.stats.frame_nr);
                self.count_drop(now);
                self.pool.release(frame);
                continue;
            }

            self.avg.render += (frame.stats.duration_render - self.avg.render) * self.config.coef;
            let paint_start = clock_ms(epoch);
            self.surface.put_image_data(&frame);
            frame.stats.duration_paint = clock_ms(epoch) - paint_start;
            self.finish_frame(frame);
        }
    }

    /// Paint bookkeeping shared by the inline and worker paths.
    fn finish_frame(&mut self, frame: Frame<P>) {
        let now = clock_ms(self.epoch);
        self.avg.paint += (frame.stats.duration_paint - self.avg.paint) * self.config.coef;
        if self.time_last_frame > 0.0 {
            let interval = now - self.time_last_frame;
            self.avg_frame_interval += (interval - self.avg_frame_interval) * self.config.coef;
        }
        self.time_last_frame = now;
        self.handler.on_end_frame(&frame);
        self.pool.release(frame);
    }

    fn count_drop(&mut self, now: f64) {
        self.cnt_dropped += 1;
        if now - self.time_last_drop > THROTTLE_WINDOW_MS {
            self.frame_rate = (self.frame_rate * 0.95).max(1.0);
            self.time_last_drop = now;
            info!(
                "dropped frame {}; throttling to {:.1} fps",
                self.cnt_dropped, self.frame_rate
            );
        }
    }

    /// The surface changed size: rebuild both views, salvaging what the
    /// old display view still holds.
    fn rebuild_views(&mut self, view_width: u32, view_height: u32, now: f64) {
        let (pixel_width, pixel_height) = pixel_dims(view_width, view_height, self.enable_angle);
        info!(
            "surface resized to {}x{} (pixel grid {}x{})",
            view_width, view_height, pixel_width, pixel_height
        );

        self.frame_nr += 1;
        let mut frame = self.pool.alloc(view_width, view_height, pixel_width, pixel_height);
        frame.stats.frame_nr = self.frame_nr;
        self.handler.on_init_frame(&mut frame);

        let mut calc = View::new(view_width, view_height, pixel_width, pixel_height);
        let disp = View::new(view_width, view_height, pixel_width, pixel_height);

        let position = self.position;
        {
            let old_disp = if self.calc0 { &self.view1 } else { &self.view0 };
            let salvage = old_disp.frame.is_some();
            calc.set_position(frame, &position, salvage.then_some(old_disp));
            if !salvage {
                let handler = &mut self.handler;
                calc.fill(&mut |x, y| handler.on_update_pixel(x, y));
            }
        }

        if let Some(old) = self.view0.frame.take() {
            self.pool.release(old);
        }
        if let Some(old) = self.view1.frame.take() {
            self.pool.release(old);
        }
        self.view0 = calc;
        self.view1 = disp;
        self.calc0 = true;
        self.first_frame_done = true;

        self.view_width = view_width;
        self.view_height = view_height;
        self.pixel_width = pixel_width;
        self.pixel_height = pixel_height;

        self.time_copy_start = now;
        self.next_sync = now + 1000.0 / self.frame_rate;
        self.handler.on_resize(view_width, view_height, pixel_width, pixel_height);
        self.state = State::Update;
    }

    // ------------------------------------------------------------------
    // accessors
    // ------------------------------------------------------------------

    pub fn state(&self) -> State {
        self.state
    }

    pub fn config(&self) -> &ZoomerConfig {
        &self.config
    }

    pub fn position(&self) -> ViewPosition {
        self.position
    }

    pub fn frame_nr(&self) -> u32 {
        self.frame_nr
    }

    pub fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    pub fn cnt_dropped(&self) -> u32 {
        self.cnt_dropped
    }

    pub fn calc_view(&self) -> &View<P> {
        if self.calc0 {
            &self.view0
        } else {
            &self.view1
        }
    }

    pub fn disp_view(&self) -> &View<P> {
        if self.calc0 {
            &self.view1
        } else {
            &self.view0
        }
    }

    /// True when the zoom step has underflowed double precision; the
    /// caller should stop zooming in.
    pub fn reached_limits(&self) -> bool {
        self.calc_view().reached_limits()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub fn stats(&self) -> ZoomerStats {
        ZoomerStats {
            frame_nr: self.frame_nr,
            cnt_dropped: self.cnt_dropped,
            frame_rate: self.frame_rate,
            avg: self.avg,
            avg_frame_interval: self.avg_frame_interval,
            update_overshoot: self.update_overshoot,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::BufferSurface;

    struct Flat(u16);

    impl ZoomerEvents<u16> for Flat {
        fn on_update_pixel(&mut self, _x: f64, _y: f64) -> u16 {
            self.0
        }
    }

    fn run_until_painted(zoomer: &mut Zoomer<u16, BufferSurface, Flat>) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while zoomer.surface().frames_painted == 0 {
            assert!(Instant::now() < deadline, "no frame painted within 5 s");
            zoomer.run_for(Duration::from_millis(20));
        }
    }

    #[test]
    fn rejects_empty_surface() {
        let result = Zoomer::new(BufferSurface::new(0, 10), Flat(0), false, ZoomerConfig::default());
        assert!(matches!(result, Err(EngineError::EmptySurface(0, 10))));
    }

    #[test]
    fn stopped_zoomer_does_nothing() {
        let mut zoomer =
            Zoomer::new(BufferSurface::new(8, 8), Flat(0), false, ZoomerConfig::default()).unwrap();
        assert_eq!(zoomer.state(), State::Stop);
        assert!(zoomer.mainloop().is_none());
        assert_eq!(zoomer.frame_nr(), 0);
    }

    #[test]
    fn paints_frames_with_workers() {
        let mut zoomer =
            Zoomer::new(BufferSurface::new(16, 16), Flat(0), false, ZoomerConfig::default())
                .unwrap();
        zoomer.start();
        run_until_painted(&mut zoomer);
        assert!(zoomer.surface().frames_painted >= 1);
        assert_eq!(zoomer.surface().last_rgba.len(), 16 * 16);
    }

    #[test]
    fn paints_frames_inline() {
        let config = ZoomerConfig {
            disable_workers: true,
            ..ZoomerConfig::default()
        };
        let mut zoomer = Zoomer::new(BufferSurface::new(16, 16), Flat(0), false, config).unwrap();
        zoomer.start();
        run_until_painted(&mut zoomer);
        assert!(zoomer.surface().frames_painted >= 1);
    }

    #[test]
    fn angle_enabled_uses_diagonal_pixel_grid() {
        let zoomer =
            Zoomer::new(BufferSurface::new(100, 100), Flat(0), true, ZoomerConfig::default())
                .unwrap();
        assert_eq!(zoomer.calc_view().pixel_width, 142);
        assert_eq!(zoomer.calc_view().pixel_height, 142);
    }

    #[test]
    fn resize_rebuilds_views() {
        let mut zoomer =
            Zoomer::new(BufferSurface::new(16, 16), Flat(0), false, ZoomerConfig::default())
                .unwrap();
        zoomer.start();
        run_until_painted(&mut zoomer);

        zoomer.surface_mut().resize(24, 12);
        let deadline = Instant::now() + Duration::from_secs(5);
        while zoomer.calc_view().view_width != 24 {
            assert!(Instant::now() < deadline, "resize never picked up");
            zoomer.run_for(Duration::from_millis(20));
        }
        assert_eq!(zoomer.calc_view().view_height, 12);

        // painted frames return to the new geometry as well
        let before = zoomer.surface().frames_painted;
        let deadline = Instant::now() + Duration::from_secs(5);
        while zoomer.surface().frames_painted == before {
            assert!(Instant::now() < deadline, "no frame painted after resize");
            zoomer.run_for(Duration::from_millis(20));
        }
        assert_eq!(zoomer.surface().last_rgba.len(), 24 * 12);
    }

    #[test]
    fn set_position_marks_activity() {
        let mut zoomer =
            Zoomer::new(BufferSurface::new(8, 8), Flat(0), false, ZoomerConfig::default()).unwrap();
        zoomer.set_position(ViewPosition::new(-0.5, 0.0, 1.0));
        assert_eq!(zoomer.position(), ViewPosition::new(-0.5, 0.0, 1.0));
        assert!(zoomer.time_last_wake > 0.0);
    }
}
