use crate::error::FrameError;
use crate::geometry::Point;

/// Straight RGBA, 0-255 per channel.
pub type Rgba = [u8; 4];

pub mod palette {
    use super::Rgba;

    pub const WHITE: Rgba = [255, 255, 255, 255];
    pub const BLUE: Rgba = [40, 90, 255, 255];
    pub const ORANGE: Rgba = [255, 150, 0, 255];
    pub const LIME: Rgba = [0, 255, 0, 255];
    pub const RED: Rgba = [255, 0, 0, 255];
    pub const GREEN: Rgba = [0, 160, 0, 255];
    pub const BLACK: Rgba = [0, 0, 0, 255];
}

/// Something the renderer can draw, positioned in visual degrees.
#[derive(Debug, Clone, PartialEq)]
pub enum Drawable<'a> {
    ApertureOutline {
        radius: f64,
        color: Rgba,
    },
    Fixation {
        diameter: f64,
        color: Rgba,
    },
    Dots {
        positions: &'a [Point],
        opacities: &'a [f32],
        diameter: f64,
        color: Rgba,
    },
    /// Counter-clockwise sweep from `start_deg` to `end_deg` (either order).
    Arc {
        radius: f64,
        start_deg: f64,
        end_deg: f64,
        color: Rgba,
    },
    Line {
        from: Point,
        to: Point,
        width_px: f32,
        color: Rgba,
    },
    Text {
        content: &'a str,
        position: Point,
        height: f64,
        color: Rgba,
    },
    /// Horizontal rating scale with `ticks` positions and a marker on one of them.
    Slider {
        center: Point,
        width: f64,
        ticks: usize,
        marker: usize,
        labels: &'a [&'a str],
        marker_color: Rgba,
    },
}

/// Ordered drawables for one refresh; later entries paint over earlier ones.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame<'a> {
    drawables: Vec<Drawable<'a>>,
}

impl<'a> Frame<'a> {
    pub fn new(drawables: Vec<Drawable<'a>>) -> Self {
        Self { drawables }
    }

    pub fn blank() -> Self {
        Self::default()
    }

    pub fn with(mut self, drawable: Drawable<'a>) -> Self {
        self.drawables.push(drawable);
        self
    }

    pub fn drawables(&self) -> &[Drawable<'a>] {
        &self.drawables
    }
}

/// The display side of the session: shows a frame and returns once it is on
/// screen.
pub trait FrameSink {
    /// Blocks until the frame has been presented (the vsync-equivalent).
    fn present_frame(&mut self, frame: &Frame<'_>) -> Result<(), FrameError>;

    /// Measured refresh rate in Hz.
    fn actual_frame_rate(&self) -> f64;
}

impl<S: FrameSink + ?Sized> FrameSink for &mut S {
    fn present_frame(&mut self, frame: &Frame<'_>) -> Result<(), FrameError> {
        (**self).present_frame(frame)
    }

    fn actual_frame_rate(&self) -> f64 {
        (**self).actual_frame_rate()
    }
}
