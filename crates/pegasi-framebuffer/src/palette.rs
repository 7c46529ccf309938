//! RGBA8888 pixel packing and the two-entry palette used for 1-bit frames.

/// 8-bit-per-channel color triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Packs an [`Rgb`] into an opaque RGBA8888 pixel.
///
/// Pixels are native-endian `u32` values with red in the least significant
/// byte (`alpha << 24 | blue << 16 | green << 8 | red`), so a little-endian
/// byte view reads `[R, G, B, A]`. Raw-byte consumers should go through
/// explicit little-endian serialization (see `FrameBuffer::to_rgba_bytes`)
/// rather than reinterpreting the pixel storage.
pub const fn rgb_to_rgba_u32(color: Rgb) -> u32 {
    0xFF00_0000 | ((color.b as u32) << 16) | ((color.g as u32) << 8) | (color.r as u32)
}

/// Background/foreground pixel pair for expanding 1-bit packed frames.
///
/// A set bit selects `foreground`, a clear bit selects `background`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonoPalette {
    pub background: u32,
    pub foreground: u32,
}

impl MonoPalette {
    pub const fn new(background: Rgb, foreground: Rgb) -> Self {
        Self {
            background: rgb_to_rgba_u32(background),
            foreground: rgb_to_rgba_u32(foreground),
        }
    }
}

impl Default for MonoPalette {
    /// Black background, full green foreground.
    fn default() -> Self {
        Self::new(Rgb { r: 0, g: 0, b: 0 }, Rgb { r: 0, g: 0xFF, b: 0 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_red_in_low_byte() {
        let px = rgb_to_rgba_u32(Rgb {
            r: 0x11,
            g: 0x22,
            b: 0x33,
        });
        assert_eq!(px, 0xFF33_2211);
        assert_eq!(px.to_le_bytes(), [0x11, 0x22, 0x33, 0xFF]);
    }

    #[test]
    fn default_palette_is_green_on_black() {
        let palette = MonoPalette::default();
        assert_eq!(palette.background, 0xFF00_0000);
        assert_eq!(palette.foreground, 0xFF00_FF00);
    }
}
