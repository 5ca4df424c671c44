use core::fmt;

/// Opaque handle to a compiled shader program owned by a graphics context.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProgramId(pub u64);

/// Opaque handle to a 2D RGBA texture owned by a graphics context.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TextureId(pub u64);

/// Opaque handle to an offscreen framebuffer owned by a graphics context.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FramebufferId(pub u64);

impl fmt::Debug for ProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProgramId({})", self.0)
    }
}

impl fmt::Debug for TextureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TextureId({})", self.0)
    }
}

impl fmt::Debug for FramebufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FramebufferId({})", self.0)
    }
}

/// A framebuffer together with its color attachment.
///
/// The color texture handle stays valid across resizes.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Framebuffer {
    pub id: FramebufferId,
    pub color: TextureId,
}

/// Size in physical pixels.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    /// Shape given to textures whose content is not available yet.
    pub const PLACEHOLDER: Extent = Extent::new(2, 2);

    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Converts a logical size to physical pixels.
    ///
    /// Each side is rounded and never drops below one pixel.
    pub fn scaled(width: f32, height: f32, pixel_ratio: f32) -> Self {
        let w = (width * pixel_ratio).round().max(1.0) as u32;
        let h = (height * pixel_ratio).round().max(1.0) as u32;
        Self::new(w, h)
    }

    /// Number of bytes of a tightly packed RGBA8 image of this size.
    #[inline]
    pub fn rgba_len(self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaled_applies_pixel_ratio() {
        assert_eq!(Extent::scaled(100.0, 50.0, 2.0), Extent::new(200, 100));
    }

    #[test]
    fn scaled_never_collapses_to_zero() {
        assert_eq!(Extent::scaled(0.0, 0.2, 1.0), Extent::new(1, 1));
    }

    #[test]
    fn rgba_len_counts_four_bytes_per_pixel() {
        assert_eq!(Extent::new(3, 2).rgba_len(), 24);
    }
}
