//! Display bridge between a WebAssembly compute core and a raster surface.
//!
//! The bridge instantiates a core module in-process (wasmtime), offers it the
//! small `env` import surface defined in [`abi`], and resolves the core's
//! frame buffer locator exports into a window over its linear memory. Each
//! [`DisplayBridge::repaint`] re-binds that window, expands the packed 1-bit
//! frame through `pegasi-framebuffer`, and hands the finished RGBA frame to a
//! [`PresentationSurface`].
//!
//! Error policy: load and bind failures are fatal and surfaced as `Result`s;
//! rejected config requests and skipped blits are recoverable and never
//! unwind through the core's call stack.

#![forbid(unsafe_code)]

pub mod abi;
mod binder;
mod bridge;
pub mod demo_core;

pub use binder::{bind_window, BindError, FrameBufferWindow};
pub use bridge::{
    DisplayBridge, LoadError, NullSurface, PresentationSurface, RepaintError,
};
pub use pegasi_framebuffer::{
    BlitError, ConfigError, ConfigRegister, FrameBuffer, FrameBufferConfig, MonoPalette, Rgb,
};
