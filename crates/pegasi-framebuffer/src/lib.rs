//! Packed 1-bit frame expansion into double-buffered RGBA8888 frames.
//!
//! This crate is intentionally self-contained (no wasm or host dependencies)
//! so the display math can be exercised on its own. It provides:
//! - [`FrameBufferConfig`] geometry plus the bounds every requested config
//!   must satisfy, and [`ConfigRegister`], the validate-then-latch holder of
//!   the active config.
//! - [`MonoPalette`] background/foreground pixel selection for 1-bit frames.
//! - [`FrameBuffer`], a front/back pixel buffer pair whose
//!   [`blit_packed`](FrameBuffer::blit_packed) expands a packed source into
//!   the back buffer and swaps it in only once the frame is complete.
//!
//! The `u32` framebuffer format is RGBA8888 in native-endian `u32`, where the
//! least significant byte is **R** (the byte order in memory on little-endian
//! is `[R, G, B, A]`, matching Canvas `ImageData`). Use
//! [`FrameBuffer::to_rgba_bytes`] for an explicitly little-endian byte view.

#![forbid(unsafe_code)]

mod config;
mod palette;

pub use config::{ConfigError, ConfigRegister, FrameBufferConfig};
pub use palette::{rgb_to_rgba_u32, MonoPalette, Rgb};

use thiserror::Error;

/// Rejected blit. The frame is skipped; the front buffer keeps the previous
/// complete frame.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BlitError {
    #[error("unsupported packed depth {depth} (only depth 1 is implemented)")]
    UnsupportedDepth { depth: u32 },

    #[error("packed frame length {packed_len} exceeds 16-bit span {max}")]
    FrameTooLarge { packed_len: u32, max: u32 },

    #[error("source window too short: need {needed} bytes, have {available}")]
    SourceTooShort { needed: usize, available: usize },
}

/// Double-buffered RGBA8888 pixel store.
///
/// `front` always holds the last completely rendered frame; `blit_packed`
/// renders into `back` and swaps the buffers only on success, so a failed or
/// torn expansion never reaches a presenter.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    front: Vec<u32>,
    back: Vec<u32>,
    width: u32,
    height: u32,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The last completely rendered frame.
    pub fn pixels(&self) -> &[u32] {
        &self.front
    }

    /// Geometry of the front buffer; `(0, 0)` until the first successful blit.
    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Expands a packed 1-bit source into a full RGBA frame.
    ///
    /// Byte `i` of `src` produces pixels `i*8` through `i*8 + 7` in linear
    /// (row-major) order, low bit first; a set bit selects
    /// `palette.foreground`. Pixels past `packed_len * 8` (a `wide` that is
    /// not a multiple of 8 leaves a ragged tail) stay at
    /// `palette.background`.
    ///
    /// All preconditions are checked before any pixel is written. On error
    /// the front buffer and resolution are untouched.
    pub fn blit_packed(
        &mut self,
        src: &[u8],
        cfg: &FrameBufferConfig,
        palette: MonoPalette,
    ) -> Result<(), BlitError> {
        if cfg.depth != 1 {
            return Err(BlitError::UnsupportedDepth { depth: cfg.depth });
        }
        let packed_len = cfg.packed_len();
        if packed_len > FrameBufferConfig::MAX_PACKED_LEN {
            return Err(BlitError::FrameTooLarge {
                packed_len,
                max: FrameBufferConfig::MAX_PACKED_LEN,
            });
        }
        let needed = packed_len as usize;
        if src.len() < needed {
            return Err(BlitError::SourceTooShort {
                needed,
                available: src.len(),
            });
        }

        self.back.clear();
        self.back.resize(cfg.pixel_count(), palette.background);
        for (byte_idx, &byte) in src[..needed].iter().enumerate() {
            let base = byte_idx * 8;
            for bit in 0..8 {
                self.back[base + bit] = if (byte >> bit) & 1 != 0 {
                    palette.foreground
                } else {
                    palette.background
                };
            }
        }

        std::mem::swap(&mut self.front, &mut self.back);
        self.width = cfg.wide;
        self.height = cfg.high;
        Ok(())
    }

    /// Serializes the front buffer as explicit little-endian RGBA bytes
    /// (`[R, G, B, A]` per pixel regardless of host endianness).
    pub fn to_rgba_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.front.len() * 4);
        for &px in &self.front {
            out.extend_from_slice(&px.to_le_bytes());
        }
        out
    }
}
