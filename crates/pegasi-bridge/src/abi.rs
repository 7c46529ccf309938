//! Wire ABI between the display bridge and a compute core module.
//!
//! The bridge defines every import listed here before instantiation; a core
//! is free to leave any of them unimported. The export names are requirements
//! on the core: binding fails without them.

use pegasi_framebuffer::ConfigError;

/// Module name for all imports the bridge offers to a compute core.
pub const IMPORT_MODULE: &str = "env";

/// Diagnostic trace hook.
///
/// Signature: `env.trace(code: i32)`. Codes are buffered host-side (see
/// `DisplayBridge::take_trace_output`) and have no effect on display state.
pub const IMPORT_TRACE: &str = "trace";

/// Frame geometry request.
///
/// Signature: `env.request_config(wide: i32, high: i32, depth: i32, zoom: i32) -> i32`.
/// Returns [`CONFIG_ACCEPTED`] or a nonzero rejection code; never traps back
/// into the core.
pub const IMPORT_REQUEST_CONFIG: &str = "request_config";

/// Linear-memory byte fill.
///
/// Signature: `env.memset(dest: i32, value: i32, len: i32) -> i32`, returning
/// `dest`. Kept libc-shaped because LLVM-linked cores import their `memset`
/// intrinsic lowering under exactly this name and signature. Fills past the
/// end of memory are clamped, never trapped.
pub const IMPORT_MEMSET: &str = "memset";

/// Core entry point. Signature: `start() -> ()`, exported as a function (not
/// a wasm start section).
pub const EXPORT_START: &str = "start";

/// Exported linear memory holding the packed frame buffer.
pub const EXPORT_MEMORY: &str = "memory";

/// Byte offset of the frame buffer within the exported memory.
///
/// Either an immutable `i32` global or a nullary function returning `i32`.
pub const EXPORT_FB_OFFSET: &str = "fb_offset";

/// Allocated frame buffer capacity in bytes (maximum, not the active packed
/// length). Same export shapes as [`EXPORT_FB_OFFSET`].
pub const EXPORT_FB_CAPACITY: &str = "fb_capacity";

/// `request_config` accepted; the candidate is now the active config.
pub const CONFIG_ACCEPTED: i32 = 0;
/// Width bound violated.
pub const CONFIG_REJECTED_WIDE: i32 = 1;
/// Height bound violated.
pub const CONFIG_REJECTED_HIGH: i32 = 2;
/// Depth outside `1..=3`.
pub const CONFIG_REJECTED_DEPTH: i32 = 3;
/// Zoom outside `1..=3`.
pub const CONFIG_REJECTED_ZOOM: i32 = 4;
/// Packed frame length exceeds the 16-bit span.
pub const CONFIG_REJECTED_PACKED_LEN: i32 = 5;

/// Maps a rejected config to the status code returned to the core.
pub fn config_reject_code(err: &ConfigError) -> i32 {
    match err {
        ConfigError::WideTooLarge { .. } => CONFIG_REJECTED_WIDE,
        ConfigError::HighTooLarge { .. } => CONFIG_REJECTED_HIGH,
        ConfigError::DepthOutOfRange { .. } => CONFIG_REJECTED_DEPTH,
        ConfigError::ZoomOutOfRange { .. } => CONFIG_REJECTED_ZOOM,
        ConfigError::PackedLenTooLarge { .. } => CONFIG_REJECTED_PACKED_LEN,
    }
}
