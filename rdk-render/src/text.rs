use ab_glyph::{point, Font, FontVec, Glyph, PxScale, ScaleFont};
use anyhow::{anyhow, Context, Result};
use rdk_core::Rgba;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tiny_skia::{Pixmap, PremultipliedColorU8};

/// Rasterised lines are kept until the cache grows past this.
const MAX_CACHED: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TextKey {
    text: String,
    size_px: u32,
    color: Rgba,
}

/// Single-line text pixmaps keyed by content, pixel size and colour.
pub struct TextCache {
    font: FontVec,
    map: HashMap<TextKey, Arc<Pixmap>>,
}

impl TextCache {
    pub fn new(font: FontVec) -> Self {
        Self {
            font,
            map: HashMap::new(),
        }
    }

    /// Loads a TrueType/OpenType font from disk.
    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("reading font {}", path.display()))?;
        let font = FontVec::try_from_vec(bytes)
            .map_err(|_| anyhow!("{} is not a usable font", path.display()))?;
        Ok(Self::new(font))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn get_or_render(&mut self, text: &str, size_px: f32, color: Rgba) -> Option<Arc<Pixmap>> {
        let key = TextKey {
            text: text.to_owned(),
            size_px: size_px.round().max(1.0) as u32,
            color,
        };
        if let Some(pm) = self.map.get(&key) {
            return Some(Arc::clone(pm));
        }
        if self.map.len() >= MAX_CACHED {
            log::debug!("text cache full, dropping {} entries", self.map.len());
            self.map.clear();
        }
        let pm = Arc::new(render_text_pixmap(
            text,
            key.size_px as f32,
            &self.font,
            color,
        )?);
        self.map.insert(key, Arc::clone(&pm));
        Some(pm)
    }

    /// Advance width of one line.
    pub fn line_width(&self, text: &str, size_px: f32) -> f32 {
        let sf = self.font.as_scaled(PxScale::from(size_px));
        let mut width = 0.0;
        let mut prev = None;
        for ch in text.chars() {
            let id = self.font.glyph_id(ch);
            if let Some(prev) = prev {
                width += sf.kern(prev, id);
            }
            width += sf.h_advance(id);
            prev = Some(id);
        }
        width
    }

    pub fn line_height(&self, size_px: f32) -> f32 {
        let sf = self.font.as_scaled(PxScale::from(size_px));
        sf.height() + sf.line_gap()
    }

    /// Splits on `'\n'` and wraps each paragraph to `max_width` pixels.
    pub fn layout(&self, text: &str, size_px: f32, max_width: f32) -> Vec<String> {
        text.split('\n')
            .flat_map(|para| wrap_words(para, max_width, |s| self.line_width(s, size_px)))
            .collect()
    }
}

/// Greedy word wrap. A single word wider than `max_width` gets its own line;
/// an empty paragraph yields one empty line.
pub fn wrap_words<M>(paragraph: &str, max_width: f32, measure: M) -> Vec<String>
where
    M: Fn(&str) -> f32,
{
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in paragraph.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }
        let candidate = format!("{current} {word}");
        if measure(&candidate) <= max_width {
            current = candidate;
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
        }
    }
    lines.push(current);
    lines
}

/// Rasterises one line with its baseline at the font ascent, so every line
/// at a given size has the same height. Returns `None` for a zero-sized
/// line.
pub fn render_text_pixmap<F: Font>(
    text: &str,
    font_size: f32,
    font: &F,
    color: Rgba,
) -> Option<Pixmap> {
    let scale = PxScale::from(font_size);
    let sf = font.as_scaled(scale);

    let mut pen_x = 0.0f32;
    let mut glyphs = Vec::<Glyph>::new();
    for ch in text.chars() {
        let id = font.glyph_id(ch);
        if let Some(prev) = glyphs.last() {
            pen_x += sf.kern(prev.id, id);
        }
        glyphs.push(Glyph {
            id,
            scale,
            position: point(pen_x, sf.ascent()),
        });
        pen_x += sf.h_advance(id);
    }

    let w = pen_x.ceil().max(1.0) as u32;
    let h = (sf.ascent() - sf.descent()).ceil().max(1.0) as u32;
    let mut pm = Pixmap::new(w, h)?;
    let stride = w as usize;
    let dst = pm.pixels_mut();

    for g in glyphs {
        let Some(out) = font.outline_glyph(g) else {
            continue;
        };
        let b = out.px_bounds();
        out.draw(|x, y, cov| {
            if cov <= f32::EPSILON {
                return;
            }
            let ix = x as i32 + b.min.x as i32;
            let iy = y as i32 + b.min.y as i32;
            if ix < 0 || iy < 0 || ix >= w as i32 || iy >= h as i32 {
                return;
            }
            let i = iy as usize * stride + ix as usize;

            // premultiply by coverage * alpha, then source-over
            let a = (cov * color[3] as f32 / 255.0).clamp(0.0, 1.0);
            let sa = (a * 255.0) as u8;
            let sr = ((color[0] as f32 * a) as u8).min(sa);
            let sg = ((color[1] as f32 * a) as u8).min(sa);
            let sb = ((color[2] as f32 * a) as u8).min(sa);

            let bg = dst[i];
            let inv = 1.0 - a;
            let blended = PremultipliedColorU8::from_rgba(
                sr.saturating_add((bg.red() as f32 * inv) as u8),
                sg.saturating_add((bg.green() as f32 * inv) as u8),
                sb.saturating_add((bg.blue() as f32 * inv) as u8),
                sa.saturating_add((bg.alpha() as f32 * inv) as u8),
            );
            if let Some(px) = blended {
                dst[i] = px;
            }
        });
    }

    Some(pm)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> f32 {
        s.chars().count() as f32
    }

    #[test]
    fn wraps_at_word_boundaries() {
        let lines = wrap_words("the quick brown fox jumps", 10.0, chars);
        assert_eq!(lines, vec!["the quick", "brown fox", "jumps"]);
    }

    #[test]
    fn long_words_get_their_own_line() {
        let lines = wrap_words("a extraordinarily b", 5.0, chars);
        assert_eq!(lines, vec!["a", "extraordinarily", "b"]);
    }

    #[test]
    fn empty_paragraph_is_one_blank_line() {
        assert_eq!(wrap_words("", 10.0, chars), vec![String::new()]);
    }
}
