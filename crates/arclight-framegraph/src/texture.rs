//! Virtual texture declarations.

/// Pixel format of a frame-graph texture.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum TextureFormat {
    Rgba8,
    Bgra8,
    Rgba16Float,
    Rgba32Float,
    R32Float,
    Depth32Float,
    Depth24Stencil8,
}

impl TextureFormat {
    /// Whether the format carries depth (and possibly stencil) data.
    pub fn is_depth(self) -> bool {
        matches!(self, Self::Depth32Float | Self::Depth24Stencil8)
    }
}

/// Creation parameters for a frame-graph texture.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextureSettings {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub samples: u32,
}

impl TextureSettings {
    /// Single-sampled settings.
    pub fn new(width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            width,
            height,
            format,
            samples: 1,
        }
    }
}

/// An opaque texture identity.
///
/// Handles are only valid within the frame-graph builder (and the graph
/// it builds) that created them; the embedded tag lets other graphs
/// reject them instead of silently aliasing.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct TextureHandle {
    pub(crate) index: u32,
    pub(crate) graph: u32,
}

impl TextureHandle {
    /// The zero-based declaration index within the owning graph.
    pub fn index(self) -> usize {
        self.index as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_formats() {
        assert!(TextureFormat::Depth32Float.is_depth());
        assert!(TextureFormat::Depth24Stencil8.is_depth());
        assert!(!TextureFormat::Rgba8.is_depth());
    }

    #[test]
    fn settings_default_to_single_sample() {
        let s = TextureSettings::new(1920, 1080, TextureFormat::Rgba16Float);
        assert_eq!(s.samples, 1);
        assert_eq!((s.width, s.height), (1920, 1080));
    }
}
