//! Frame geometry configuration and the validate-then-latch register.

use thiserror::Error;

/// Rejected frame buffer configuration, one variant per violated bound.
///
/// Carried back to the requesting core as a status code rather than an
/// unwound error; see the bridge's `request_config` import.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("width {wide} exceeds maximum {max}")]
    WideTooLarge { wide: u32, max: u32 },

    #[error("height {high} exceeds maximum {max}")]
    HighTooLarge { high: u32, max: u32 },

    #[error("depth {depth} outside supported range 1..=3")]
    DepthOutOfRange { depth: u32 },

    #[error("zoom {zoom} outside supported range 1..=3")]
    ZoomOutOfRange { zoom: u32 },

    #[error("packed frame length {packed_len} exceeds 16-bit span {max}")]
    PackedLenTooLarge { packed_len: u32, max: u32 },
}

/// Requested display geometry for the packed frame buffer.
///
/// `depth` is the packed bits per pixel, `zoom` the integer upscale factor a
/// presentation surface applies. A config says nothing about where the frame
/// bytes live; that is the binder's concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameBufferConfig {
    pub wide: u32,
    pub high: u32,
    pub depth: u32,
    pub zoom: u32,
}

impl FrameBufferConfig {
    pub const MAX_WIDE: u32 = 1024;
    pub const MAX_HIGH: u32 = 512;
    pub const MAX_DEPTH: u32 = 3;
    pub const MAX_ZOOM: u32 = 3;

    /// Largest packed frame length addressable by a core using 16-bit offsets.
    pub const MAX_PACKED_LEN: u32 = 0xFFFF;

    /// Packed byte length of one frame at this geometry.
    ///
    /// One byte packs 8 pixels at depth 1, 4 at depth 2 and 2 at depth 3, so
    /// the row length in bytes is `wide >> (4 - depth)`. Meaningful only for
    /// a depth within `1..=3`; [`FrameBufferConfig::validate`] checks the
    /// depth bound first. The product saturates, so an absurd geometry
    /// reports an over-span length rather than wrapping.
    pub fn packed_len(&self) -> u32 {
        (self.wide >> (4 - self.depth)).saturating_mul(self.high)
    }

    /// Number of expanded RGBA pixels in one frame.
    pub fn pixel_count(&self) -> usize {
        self.wide as usize * self.high as usize
    }

    /// Checks every geometry bound, reporting the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wide > Self::MAX_WIDE {
            return Err(ConfigError::WideTooLarge {
                wide: self.wide,
                max: Self::MAX_WIDE,
            });
        }
        if self.high > Self::MAX_HIGH {
            return Err(ConfigError::HighTooLarge {
                high: self.high,
                max: Self::MAX_HIGH,
            });
        }
        if self.depth < 1 || self.depth > Self::MAX_DEPTH {
            return Err(ConfigError::DepthOutOfRange { depth: self.depth });
        }
        if self.zoom < 1 || self.zoom > Self::MAX_ZOOM {
            return Err(ConfigError::ZoomOutOfRange { zoom: self.zoom });
        }
        let packed_len = self.packed_len();
        if packed_len > Self::MAX_PACKED_LEN {
            return Err(ConfigError::PackedLenTooLarge {
                packed_len,
                max: Self::MAX_PACKED_LEN,
            });
        }
        Ok(())
    }
}

impl Default for FrameBufferConfig {
    /// 320x200 at 1 bit per pixel, presented at 2x.
    fn default() -> Self {
        Self {
            wide: 320,
            high: 200,
            depth: 1,
            zoom: 2,
        }
    }
}

/// Holds the active [`FrameBufferConfig`] and applies requested replacements.
///
/// A request is validated as a whole and either replaces the active config in
/// one step or leaves it untouched; there is no partially applied geometry.
#[derive(Debug, Clone)]
pub struct ConfigRegister {
    active: FrameBufferConfig,
    latched: bool,
}

impl ConfigRegister {
    /// Starts unlatched, holding `default` until a core request is accepted.
    pub fn new(default: FrameBufferConfig) -> Self {
        Self {
            active: default,
            latched: false,
        }
    }

    pub fn active(&self) -> FrameBufferConfig {
        self.active
    }

    /// True once any request has been accepted since construction.
    pub fn has_latched(&self) -> bool {
        self.latched
    }

    /// Validates `candidate` and latches it as the active config.
    ///
    /// On rejection the previously active config stays in effect.
    pub fn request(&mut self, candidate: FrameBufferConfig) -> Result<(), ConfigError> {
        candidate.validate()?;
        self.active = candidate;
        self.latched = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn cfg(wide: u32, high: u32, depth: u32, zoom: u32) -> FrameBufferConfig {
        FrameBufferConfig {
            wide,
            high,
            depth,
            zoom,
        }
    }

    #[test]
    fn default_config_is_valid() {
        let default = FrameBufferConfig::default();
        assert_eq!(default, cfg(320, 200, 1, 2));
        assert_eq!(default.validate(), Ok(()));
        assert_eq!(default.packed_len(), 8000);
        assert_eq!(default.pixel_count(), 64_000);
    }

    #[test]
    fn packed_len_per_depth() {
        assert_eq!(cfg(320, 200, 1, 1).packed_len(), 8000);
        assert_eq!(cfg(320, 200, 2, 1).packed_len(), 16_000);
        assert_eq!(cfg(320, 200, 3, 1).packed_len(), 32_000);
        assert_eq!(cfg(1016, 512, 1, 1).packed_len(), 65_024);
    }

    #[test]
    fn packed_len_saturates_instead_of_wrapping() {
        let absurd = cfg(u32::MAX, u32::MAX, 1, 1);
        assert_eq!(absurd.packed_len(), u32::MAX);
        assert_eq!(
            absurd.validate(),
            Err(ConfigError::WideTooLarge {
                wide: u32::MAX,
                max: 1024,
            })
        );
    }

    #[test]
    fn accepts_widest_geometry_fitting_16_bit_span() {
        // 1016 >> 3 == 127 bytes per row; 127 * 512 == 65024 <= 65535.
        assert_eq!(cfg(1016, 512, 1, 1).validate(), Ok(()));
    }

    #[test]
    fn rejects_full_bounds_geometry_overflowing_16_bit_span() {
        // Each bound individually maximal, but 128 * 512 == 65536 bytes.
        assert_eq!(
            cfg(1024, 512, 1, 1).validate(),
            Err(ConfigError::PackedLenTooLarge {
                packed_len: 65_536,
                max: 65_535,
            })
        );
    }

    #[test]
    fn rejects_each_violated_bound() {
        assert_eq!(
            cfg(1025, 200, 1, 1).validate(),
            Err(ConfigError::WideTooLarge {
                wide: 1025,
                max: 1024,
            })
        );
        assert_eq!(
            cfg(320, 513, 1, 1).validate(),
            Err(ConfigError::HighTooLarge {
                high: 513,
                max: 512,
            })
        );
        assert_eq!(
            cfg(320, 200, 0, 1).validate(),
            Err(ConfigError::DepthOutOfRange { depth: 0 })
        );
        assert_eq!(
            cfg(320, 200, 4, 1).validate(),
            Err(ConfigError::DepthOutOfRange { depth: 4 })
        );
        assert_eq!(
            cfg(320, 200, 1, 0).validate(),
            Err(ConfigError::ZoomOutOfRange { zoom: 0 })
        );
        assert_eq!(
            cfg(320, 200, 1, 4).validate(),
            Err(ConfigError::ZoomOutOfRange { zoom: 4 })
        );
    }

    #[test]
    fn accepts_higher_depths_when_packed_len_fits() {
        // 640 >> 2 == 160 bytes per row at depth 2; 160 * 400 == 64000.
        assert_eq!(cfg(640, 400, 2, 1).validate(), Ok(()));
        // 128 >> 1 == 64 bytes per row at depth 3; 64 * 512 == 32768.
        assert_eq!(cfg(128, 512, 3, 1).validate(), Ok(()));
        // 1024 >> 1 == 512 bytes per row at depth 3; 512 * 512 overflows the span.
        assert_eq!(
            cfg(1024, 512, 3, 1).validate(),
            Err(ConfigError::PackedLenTooLarge {
                packed_len: 262_144,
                max: 65_535,
            })
        );
    }

    #[test]
    fn register_latches_accepted_request() {
        let mut reg = ConfigRegister::new(FrameBufferConfig::default());
        assert!(!reg.has_latched());

        let wanted = cfg(640, 400, 1, 1);
        reg.request(wanted).expect("in-bounds request");
        assert!(reg.has_latched());
        assert_eq!(reg.active(), wanted);
    }

    #[test]
    fn register_keeps_active_config_on_rejection() {
        let default = FrameBufferConfig::default();
        let mut reg = ConfigRegister::new(default);

        let err = reg.request(cfg(1024, 512, 1, 1)).unwrap_err();
        assert_eq!(
            err,
            ConfigError::PackedLenTooLarge {
                packed_len: 65_536,
                max: 65_535,
            }
        );
        assert_eq!(reg.active(), default);
        assert!(!reg.has_latched());
    }
}
