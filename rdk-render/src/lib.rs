pub mod render;
pub mod text;

pub use render::{FrameStats, SkiaRenderer, Viewport, BACKGROUND};
pub use text::{render_text_pixmap, wrap_words, TextCache};
