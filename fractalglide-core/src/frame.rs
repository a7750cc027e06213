//! Transferable frame container: pixel codes in, RGBA out.

use serde::{Deserialize, Serialize};

/// Palette index reserved for the transparent background.
pub const BACKGROUND_INDEX: usize = 65_535;

/// Number of entries in a frame palette.
pub const PALETTE_SIZE: usize = 65_536;

/// Pixel code stored in a frame's calculation buffer.
///
/// Two representations exist: 16-bit codes translated through a palette,
/// and 32-bit values that already are RGBA (no palette attached).
pub trait Pixel: Copy + Default + PartialEq + Send + 'static {
    /// Index into the frame palette when one is attached.
    fn palette_index(self) -> usize;
    /// RGBA value when no palette is attached.
    fn to_rgba(self) -> u32;
}

impl Pixel for u16 {
    #[inline]
    fn palette_index(self) -> usize {
        self as usize
    }

    #[inline]
    fn to_rgba(self) -> u32 {
        self as u32
    }
}

impl Pixel for u32 {
    #[inline]
    fn palette_index(self) -> usize {
        (self & 0xffff) as usize
    }

    #[inline]
    fn to_rgba(self) -> u32 {
        self
    }
}

/// Per-frame measurements, filled in as the frame moves through the
/// COPY / UPDATE / RENDER / PAINT phases.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameStats {
    pub frame_nr: u32,
    /// Milliseconds spent building rulers and inheriting pixels.
    pub duration_copy: f64,
    /// Milliseconds spent recomputing worst-error lines.
    pub duration_update: f64,
    /// Milliseconds spent producing RGBA. Zero means the frame was
    /// dropped: the renderer observed the expiry deadline on entry.
    pub duration_render: f64,
    /// Milliseconds spent delivering RGBA to the surface.
    pub duration_paint: f64,
    /// Pixels computed through the calculator (not inherited).
    pub cnt_pixels: u32,
    /// Exact horizontal lines (rows), inherited or recomputed.
    pub cnt_h_lines: u32,
    /// Exact vertical lines (columns), inherited or recomputed.
    pub cnt_v_lines: u32,
    /// Fraction of the pixel buffer computed exactly, in `[0, 1]`.
    pub quality: f64,
}

/// Side of the square pixel grid that still covers a view of the given
/// size at any rotation angle.
pub fn rotated_span(view_width: u32, view_height: u32) -> u32 {
    let w = view_width as f64;
    let h = view_height as f64;
    (w * w + h * h).sqrt().ceil() as u32
}

/// One instant in time: a pixel-code grid, its RGBA projection, an
/// optional palette and the frame's statistics.
///
/// The pixel grid is at least as large as the view; when rotation is
/// enabled it is the square circumscribing the view diagonal so any
/// angle can be cropped out of it.
pub struct Frame<P: Pixel = u16> {
    pub view_width: u32,
    pub view_height: u32,
    pub pixel_width: u32,
    pub pixel_height: u32,
    /// Rotation in degrees, counter-clockwise.
    pub angle: f64,
    /// Absolute deadline (engine-clock milliseconds). A renderer that
    /// starts past this point drops the frame.
    pub time_expire: f64,
    /// Calculation results, `pixel_width * pixel_height`, row-major.
    pub pixels: Vec<P>,
    /// Display output, `view_width * view_height`, row-major RGBA.
    pub rgba: Vec<u32>,
    /// Optional translation table of [`PALETTE_SIZE`] RGBA entries.
    /// Entry [`BACKGROUND_INDEX`] is the transparent background.
    pub palette: Option<Vec<u32>>,
    pub stats: FrameStats,
}

impl<P: Pixel> Frame<P> {
    /// Allocate a frame with all buffers sized exactly as declared.
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
            angle: 0.0,
            time_expire: 0.0,
            pixels: vec![P::default(); (pixel_width * pixel_height) as usize],
            rgba: vec![0; (view_width * view_height) as usize],
            palette: None,
            stats: FrameStats::default(),
        }
    }

    /// True when the buffers fit the requested geometry.
    pub fn matches(&self, view_width: u32, view_height: u32, pixel_width: u32, pixel_height: u32) -> bool {
        self.view_width == view_width
            && self.view_height == view_height
            && self.pixel_width == pixel_width
            && self.pixel_height == pixel_height
    }

    /// Attach a palette. Must hold exactly [`PALETTE_SIZE`] entries.
    pub fn set_palette(&mut self, palette: Vec<u32>) {
        assert_eq!(palette.len(), PALETTE_SIZE, "palette must hold {} entries", PALETTE_SIZE);
        self.palette = Some(palette);
    }

    /// Recompute `quality` from the computed-pixel counter.
    pub fn update_quality(&mut self) {
        let total = (self.pixel_width * self.pixel_height) as f64;
        self.stats.quality = (self.stats.cnt_pixels as f64 / total).min(1.0);
    }

    /// RGBA output as bytes, for paint sinks that consume `&[u8]`.
    pub fn rgba_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.rgba)
    }
}
