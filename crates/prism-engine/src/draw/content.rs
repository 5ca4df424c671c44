use crate::gfx::Extent;

/// Pixels of an external content input for one frame.
#[derive(Debug, Copy, Clone)]
pub struct ContentFrame<'a> {
    pub size: Extent,
    /// Tightly packed RGBA8, `size.rgba_len()` bytes.
    pub pixels: &'a [u8],
}

/// An externally rendered visual sampled through `Uniform::Content`.
pub trait ContentSource {
    /// Current pixels, or `None` while the content has no natural size yet.
    fn frame(&self) -> Option<ContentFrame<'_>>;

    /// Short description shown in debug frames.
    fn label(&self) -> String {
        "content".into()
    }
}

/// Content backed by an owned RGBA buffer.
#[derive(Debug, Clone, Default)]
pub struct PixelContent {
    pub label: String,
    pub size: Extent,
    pub pixels: Vec<u8>,
}

impl ContentSource for PixelContent {
    fn frame(&self) -> Option<ContentFrame<'_>> {
        (self.size.rgba_len() > 0).then_some(ContentFrame {
            size: self.size,
            pixels: &self.pixels,
        })
    }

    fn label(&self) -> String {
        self.label.clone()
    }
}
