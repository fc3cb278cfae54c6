use crate::text::TextCache;
use anyhow::{anyhow, bail, Result};
use bytemuck::{cast_slice, cast_slice_mut};
use rdk_core::geometry::heading;
use rdk_core::{palette, Drawable, Frame, Point, Rgba};
use rdk_timing::{CalibrationStats, HighPrecisionTimer, Timer};
use std::time::Duration;
use tiny_skia::{FillRule, Paint, Path, PathBuilder, Pixmap, Rect, Stroke, Transform};

/// Mid-grey, the screen colour behind every frame.
pub const BACKGROUND: Rgba = [128, 128, 128, 255];

const APERTURE_LINE_PX: f32 = 3.0;
const FIXATION_LINE_PX: f32 = 2.0;
const ARC_LINE_PX: f32 = 6.0;
const SLIDER_LINE_PX: f32 = 3.0;
/// Text wraps at this many degrees, or 90% of the screen if narrower.
const WRAP_DEG: f64 = 30.0;

/// Maps stimulus space (degrees, origin at screen centre, y up) to pixels
/// (origin top-left, y down).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub pixels_per_degree: f64,
}

impl Viewport {
    pub fn new(width: u32, height: u32, pixels_per_degree: f64) -> Self {
        Self {
            width,
            height,
            pixels_per_degree,
        }
    }

    pub fn center(&self) -> (f32, f32) {
        (self.width as f32 / 2.0, self.height as f32 / 2.0)
    }

    pub fn to_px(&self, p: Point) -> (f32, f32) {
        let (cx, cy) = self.center();
        (
            cx + (p.x * self.pixels_per_degree) as f32,
            cy - (p.y * self.pixels_per_degree) as f32,
        )
    }

    pub fn len_px(&self, degrees: f64) -> f32 {
        (degrees * self.pixels_per_degree) as f32
    }

    fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameStats {
    pub clear: Duration,
    pub draw: Duration,
    pub copy: Duration,
    pub total: Duration,
    pub drawables: usize,
}

/// Software rasteriser for [`Frame`]s into an RGBA frame buffer.
pub struct SkiaRenderer {
    viewport: Viewport,
    canvas: Pixmap,
    clear_buffer: Vec<u8>,
    text: Option<TextCache>,
    warned_no_font: bool,
    timer: HighPrecisionTimer,
}

fn clear_buffer(viewport: &Viewport) -> Vec<u8> {
    BACKGROUND
        .iter()
        .copied()
        .cycle()
        .take(viewport.byte_len())
        .collect()
}

fn paint(color: Rgba, opacity: f32) -> Paint<'static> {
    let mut p = Paint::default();
    let alpha = (color[3] as f32 * opacity.clamp(0.0, 1.0)).round() as u8;
    p.set_color_rgba8(color[0], color[1], color[2], alpha);
    p.anti_alias = true;
    p
}

fn polyline(points: &[(f32, f32)]) -> Option<Path> {
    let (first, rest) = points.split_first()?;
    let mut pb = PathBuilder::new();
    pb.move_to(first.0, first.1);
    for p in rest {
        pb.line_to(p.0, p.1);
    }
    pb.finish()
}

/// Source-over of a premultiplied pixmap onto the canvas, top-left at `(x, y)`.
fn blit(canvas: &mut Pixmap, src: &Pixmap, x: i32, y: i32) {
    let (cw, ch) = (canvas.width() as i32, canvas.height() as i32);
    let (w, h) = (src.width() as i32, src.height() as i32);
    if x + w <= 0 || y + h <= 0 || x >= cw || y >= ch {
        return;
    }

    let dst_x = x.max(0);
    let dst_y = y.max(0);
    let src_x = dst_x - x;
    let src_y = dst_y - y;
    let copy_w = (w - src_x).min(cw - dst_x) as usize;
    let copy_h = (h - src_y).min(ch - dst_y) as usize;

    let src_px: &[[u8; 4]] = cast_slice(src.data());
    let dst_px: &mut [[u8; 4]] = cast_slice_mut(canvas.data_mut());

    for row in 0..copy_h {
        let s0 = (src_y as usize + row) * w as usize + src_x as usize;
        let d0 = (dst_y as usize + row) * cw as usize + dst_x as usize;
        for i in 0..copy_w {
            let s = src_px[s0 + i];
            let sa = s[3] as u32;
            if sa == 0 {
                continue;
            }
            let d = &mut dst_px[d0 + i];
            if sa == 255 {
                *d = s;
                continue;
            }
            let inv = 255 - sa;
            for c in 0..4 {
                d[c] = (s[c] as u32 + (d[c] as u32 * inv + 127) / 255).min(255) as u8;
            }
        }
    }
}

impl SkiaRenderer {
    /// Without a font, text drawables are skipped.
    pub fn new(viewport: Viewport, text: Option<TextCache>) -> Result<Self> {
        let canvas = Pixmap::new(viewport.width, viewport.height)
            .ok_or_else(|| anyhow!("cannot allocate a {}x{} canvas", viewport.width, viewport.height))?;
        Ok(Self {
            viewport,
            canvas,
            clear_buffer: clear_buffer(&viewport),
            text,
            warned_no_font: false,
            timer: HighPrecisionTimer::new(),
        })
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn has_text(&self) -> bool {
        self.text.is_some()
    }

    pub fn resize(&mut self, viewport: Viewport) -> Result<()> {
        self.canvas = Pixmap::new(viewport.width, viewport.height)
            .ok_or_else(|| anyhow!("cannot allocate a {}x{} canvas", viewport.width, viewport.height))?;
        self.clear_buffer = clear_buffer(&viewport);
        self.viewport = viewport;
        Ok(())
    }

    /// Draw-time statistics over recent frames.
    pub fn render_stats(&self) -> CalibrationStats {
        self.timer.calibration_stats()
    }

    /// Rasterises `frame` and copies it into `frame_buffer`, which must be
    /// exactly `width * height * 4` RGBA bytes.
    pub fn render_frame(&mut self, frame: &Frame<'_>, frame_buffer: &mut [u8]) -> Result<FrameStats> {
        if frame_buffer.len() != self.viewport.byte_len() {
            bail!(
                "frame buffer holds {} bytes, expected {} for {}x{}",
                frame_buffer.len(),
                self.viewport.byte_len(),
                self.viewport.width,
                self.viewport.height
            );
        }

        let t = self.timer.now();
        self.canvas.data_mut().copy_from_slice(&self.clear_buffer);
        let clear = self.timer.elapsed(t);

        let t = self.timer.now();
        for drawable in frame.drawables() {
            self.draw(drawable);
        }
        let draw = self.timer.elapsed(t);

        let t = self.timer.now();
        frame_buffer.copy_from_slice(self.canvas.data());
        let copy = self.timer.elapsed(t);

        let total = clear + draw + copy;
        self.timer.record_frame(total);
        Ok(FrameStats {
            clear,
            draw,
            copy,
            total,
            drawables: frame.drawables().len(),
        })
    }

    fn draw(&mut self, drawable: &Drawable<'_>) {
        match *drawable {
            Drawable::ApertureOutline { radius, color } => {
                self.stroke_circle(Point::ORIGIN, radius, APERTURE_LINE_PX, color)
            }
            Drawable::Fixation { diameter, color } => {
                let half = diameter / 2.0;
                self.stroke_line(Point::new(-half, 0.0), Point::new(half, 0.0), FIXATION_LINE_PX, color);
                self.stroke_line(Point::new(0.0, -half), Point::new(0.0, half), FIXATION_LINE_PX, color);
            }
            Drawable::Dots {
                positions,
                opacities,
                diameter,
                color,
            } => {
                let r = (self.viewport.len_px(diameter) / 2.0).max(0.5);
                for (&p, &opacity) in positions.iter().zip(opacities) {
                    if opacity <= 0.0 {
                        continue;
                    }
                    let (x, y) = self.viewport.to_px(p);
                    if let Some(path) = PathBuilder::from_circle(x, y, r) {
                        self.canvas.fill_path(
                            &path,
                            &paint(color, opacity),
                            FillRule::Winding,
                            Transform::identity(),
                            None,
                        );
                    }
                }
            }
            Drawable::Arc {
                radius,
                start_deg,
                end_deg,
                color,
            } => self.stroke_arc(radius, start_deg, end_deg, color),
            Drawable::Line {
                from,
                to,
                width_px,
                color,
            } => self.stroke_line(from, to, width_px, color),
            Drawable::Text {
                content,
                position,
                height,
                color,
            } => self.draw_text(content, position, height, color),
            Drawable::Slider {
                center,
                width,
                ticks,
                marker,
                labels,
                marker_color,
            } => self.draw_slider(center, width, ticks, marker, labels, marker_color),
        }
    }

    fn stroke(&mut self, path: &Path, width_px: f32, color: Rgba) {
        let stroke = Stroke {
            width: width_px,
            ..Stroke::default()
        };
        self.canvas
            .stroke_path(path, &paint(color, 1.0), &stroke, Transform::identity(), None);
    }

    fn stroke_circle(&mut self, center: Point, radius: f64, width_px: f32, color: Rgba) {
        let (x, y) = self.viewport.to_px(center);
        if let Some(path) = PathBuilder::from_circle(x, y, self.viewport.len_px(radius)) {
            self.stroke(&path, width_px, color);
        }
    }

    fn stroke_line(&mut self, from: Point, to: Point, width_px: f32, color: Rgba) {
        let points = [self.viewport.to_px(from), self.viewport.to_px(to)];
        if let Some(path) = polyline(&points) {
            self.stroke(&path, width_px, color);
        }
    }

    /// One-degree segments from the smaller angle counter-clockwise to the larger.
    fn stroke_arc(&mut self, radius: f64, start_deg: f64, end_deg: f64, color: Rgba) {
        let (lo, hi) = if start_deg <= end_deg {
            (start_deg, end_deg)
        } else {
            (end_deg, start_deg)
        };
        let segments = ((hi - lo).ceil() as usize).max(1);
        let step = (hi - lo) / segments as f64;
        let points: Vec<(f32, f32)> = (0..=segments)
            .map(|i| self.viewport.to_px(heading(lo + step * i as f64, radius)))
            .collect();
        if let Some(path) = polyline(&points) {
            self.stroke(&path, ARC_LINE_PX, color);
        }
    }

    fn fill_rect(&mut self, top_left: Point, bottom_right: Point, color: Rgba) {
        let (l, t) = self.viewport.to_px(top_left);
        let (r, b) = self.viewport.to_px(bottom_right);
        if let Some(rect) = Rect::from_ltrb(l, t, r, b) {
            self.canvas
                .fill_rect(rect, &paint(color, 1.0), Transform::identity(), None);
        }
    }

    /// Centres the wrapped block of lines on `position`.
    fn draw_text(&mut self, content: &str, position: Point, height: f64, color: Rgba) {
        let Some(cache) = self.text.as_mut() else {
            if !self.warned_no_font {
                log::warn!("no font loaded, text screens are drawn without text");
                self.warned_no_font = true;
            }
            return;
        };
        let size_px = self.viewport.len_px(height).max(1.0);
        let max_width = self
            .viewport
            .len_px(WRAP_DEG)
            .min(self.viewport.width as f32 * 0.9);
        let lines = cache.layout(content, size_px, max_width);
        let line_h = cache.line_height(size_px);
        let (cx, cy) = self.viewport.to_px(position);
        let top = cy - line_h * lines.len() as f32 / 2.0;

        for (i, line) in lines.iter().enumerate() {
            if line.is_empty() {
                continue;
            }
            if let Some(pm) = cache.get_or_render(line, size_px, color) {
                let x = (cx - pm.width() as f32 / 2.0).round() as i32;
                let y = (top + line_h * i as f32).round() as i32;
                blit(&mut self.canvas, &pm, x, y);
            }
        }
    }

    fn draw_slider(
        &mut self,
        center: Point,
        width: f64,
        ticks: usize,
        marker: usize,
        labels: &[&str],
        marker_color: Rgba,
    ) {
        let left = center.x - width / 2.0;
        let spacing = if ticks > 1 {
            width / (ticks - 1) as f64
        } else {
            0.0
        };
        let tick_x = |i: usize| left + spacing * i as f64;

        self.stroke_line(
            Point::new(left, center.y),
            Point::new(left + width, center.y),
            SLIDER_LINE_PX,
            palette::WHITE,
        );
        let tick_px = self.viewport.len_px(0.1).max(1.0);
        for i in 0..ticks {
            let x = tick_x(i);
            self.stroke_line(
                Point::new(x, center.y - 1.0),
                Point::new(x, center.y + 1.0),
                tick_px,
                palette::WHITE,
            );
        }

        if let (Some(first), Some(last)) = (labels.first(), labels.last()) {
            let y = center.y + 1.65;
            self.draw_text(first, Point::new(tick_x(0), y), 0.7, palette::WHITE);
            if ticks > 1 {
                self.draw_text(last, Point::new(tick_x(ticks - 1), y), 0.7, palette::WHITE);
            }
        }

        let marker = marker.min(ticks.saturating_sub(1));
        let mx = tick_x(marker);
        self.fill_rect(
            Point::new(mx - 0.2, center.y + 1.0),
            Point::new(mx + 0.2, center.y - 1.0),
            marker_color,
        );
        if let Some(label) = labels.get(marker) {
            self.draw_text(label, Point::new(mx, center.y - 1.65), 0.6, palette::WHITE);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const W: u32 = 400;
    const H: u32 = 300;
    const PPD: f64 = 40.0;

    fn renderer() -> SkiaRenderer {
        SkiaRenderer::new(Viewport::new(W, H, PPD), None).unwrap()
    }

    fn render(frame: &Frame<'_>) -> Vec<u8> {
        let mut fb = vec![0u8; (W * H * 4) as usize];
        renderer().render_frame(frame, &mut fb).unwrap();
        fb
    }

    fn pixel(fb: &[u8], x: u32, y: u32) -> [u8; 4] {
        let i = ((y * W + x) * 4) as usize;
        [fb[i], fb[i + 1], fb[i + 2], fb[i + 3]]
    }

    #[test]
    fn degrees_map_to_centred_pixels_with_y_up() {
        let vp = Viewport::new(W, H, PPD);
        assert_eq!(vp.to_px(Point::ORIGIN), (200.0, 150.0));
        assert_eq!(vp.to_px(Point::new(1.0, 2.0)), (240.0, 70.0));
        assert_eq!(vp.len_px(0.5), 20.0);
    }

    #[test]
    fn blank_frame_is_background() {
        let fb = render(&Frame::blank());
        assert_eq!(pixel(&fb, 0, 0), BACKGROUND);
        assert_eq!(pixel(&fb, W - 1, H - 1), BACKGROUND);
    }

    #[test]
    fn fixation_cross_sits_at_the_centre() {
        let fb = render(&Frame::new(vec![Drawable::Fixation {
            diameter: 0.2,
            color: palette::WHITE,
        }]));
        assert_eq!(pixel(&fb, 200, 150), palette::WHITE);
        assert_eq!(pixel(&fb, 220, 150), BACKGROUND);
    }

    #[test]
    fn dots_are_placed_above_centre_and_faded_by_opacity() {
        let positions = [Point::new(0.0, 2.0), Point::new(0.0, -2.0)];
        let opacities = [1.0, 0.5];
        let fb = render(&Frame::new(vec![Drawable::Dots {
            positions: &positions,
            opacities: &opacities,
            diameter: 0.5,
            color: palette::WHITE,
        }]));
        assert_eq!(pixel(&fb, 200, 70), palette::WHITE);
        let faded = pixel(&fb, 200, 230);
        assert!(faded[0] > 170 && faded[0] < 210, "{faded:?}");
        assert_eq!(faded[3], 255);
    }

    #[test]
    fn arcs_sweep_between_their_angles() {
        let fb = render(&Frame::new(vec![Drawable::Arc {
            radius: 2.0,
            start_deg: 0.0,
            end_deg: -90.0,
            color: palette::BLUE,
        }]));
        // -45 degrees is below and to the right of centre
        let on = pixel(&fb, 256, 206);
        assert!(on[2] > 200 && on[0] < 100, "{on:?}");
        assert_eq!(pixel(&fb, 256, 93), BACKGROUND);
    }

    #[test]
    fn aperture_outline_crosses_the_x_axis_at_its_radius() {
        let fb = render(&Frame::new(vec![Drawable::ApertureOutline {
            radius: 4.0,
            color: palette::WHITE,
        }]));
        let edge = pixel(&fb, 360, 150);
        assert!(edge[0] > 200, "{edge:?}");
        assert_eq!(pixel(&fb, 200, 150), BACKGROUND);
    }

    #[test]
    fn slider_marker_uses_its_colour() {
        let labels = ["50%", "100%"];
        let fb = render(&Frame::new(vec![Drawable::Slider {
            center: Point::ORIGIN,
            width: 4.0,
            ticks: 2,
            marker: 1,
            labels: &labels,
            marker_color: palette::GREEN,
        }]));
        // right tick at +2 deg, marker spans +/-1 deg vertically
        assert_eq!(pixel(&fb, 280, 120), palette::GREEN);
    }

    #[test]
    fn text_without_a_font_is_skipped() {
        let mut r = renderer();
        assert!(!r.has_text());
        let mut fb = vec![0u8; (W * H * 4) as usize];
        let stats = r
            .render_frame(
                &Frame::new(vec![Drawable::Text {
                    content: "Welcome!",
                    position: Point::ORIGIN,
                    height: 1.0,
                    color: palette::WHITE,
                }]),
                &mut fb,
            )
            .unwrap();
        assert_eq!(stats.drawables, 1);
        assert_eq!(pixel(&fb, 200, 150), BACKGROUND);
        assert_eq!(r.render_stats().average_frame_time_ns > 0.0, stats.total > Duration::ZERO);
    }

    #[test]
    fn mismatched_frame_buffer_is_an_error() {
        let mut fb = vec![0u8; 16];
        assert!(renderer().render_frame(&Frame::blank(), &mut fb).is_err());
    }

    #[test]
    fn resize_reallocates_the_canvas() {
        let mut r = renderer();
        r.resize(Viewport::new(10, 10, 1.0)).unwrap();
        let mut fb = vec![0u8; 400];
        r.render_frame(&Frame::blank(), &mut fb).unwrap();
        assert_eq!(&fb[..4], &BACKGROUND);
    }

    #[test]
    fn blit_blends_translucent_pixels() {
        let mut canvas = Pixmap::new(2, 1).unwrap();
        canvas.fill(tiny_skia::Color::from_rgba8(100, 100, 100, 255));
        let mut src = Pixmap::new(1, 1).unwrap();
        // premultiplied white at half alpha
        src.data_mut().copy_from_slice(&[128, 128, 128, 128]);
        blit(&mut canvas, &src, 1, 0);
        let px = &canvas.data()[4..8];
        assert_eq!(px[3], 255);
        assert!(px[0] > 170 && px[0] < 185, "{px:?}");
        assert_eq!(&canvas.data()[..4], &[100, 100, 100, 255]);
    }
}
