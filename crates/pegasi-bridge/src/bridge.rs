//! Composition root hosting a compute core and driving the display path.

use std::collections::VecDeque;
use std::fmt;

use thiserror::Error;
use wasmtime::{Caller, Config, Engine, Extern, Instance, Linker, Memory, Module, Store};

use pegasi_framebuffer::{
    BlitError, ConfigError, ConfigRegister, FrameBuffer, FrameBufferConfig, MonoPalette,
};

use crate::abi;
use crate::binder::{self, BindError, FrameBufferWindow};

/// Most recent trace codes kept per bridge; older codes are dropped so a
/// chatty core cannot grow host memory without bound.
const TRACE_LOG_LIMIT: usize = 4096;

/// Core module failed to load or start. Fatal: the bridge (or its caller)
/// reports the error and does not drive the core further.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("default config rejected: {0}")]
    InvalidDefaultConfig(ConfigError),

    #[error("failed to compile core module: {0}")]
    Compile(wasmtime::Error),

    #[error("failed to instantiate core module: {0}")]
    Instantiate(wasmtime::Error),

    #[error("core does not export `start` with signature `() -> ()`: {0}")]
    MissingStart(wasmtime::Error),

    #[error("core `start` trapped: {0}")]
    StartTrapped(wasmtime::Error),

    #[error(transparent)]
    Bind(#[from] BindError),
}

/// A repaint that produced no new frame. Bind failures are fatal per the
/// display error policy; blit failures are recoverable (the frame is skipped
/// and the previous front buffer stays presented).
#[derive(Debug, Error)]
pub enum RepaintError {
    #[error(transparent)]
    Bind(#[from] BindError),

    #[error(transparent)]
    Blit(#[from] BlitError),
}

/// Host-facing display seam.
///
/// Implementations own the actual output (a window, a canvas, an image file)
/// and apply the integer `zoom` upscale and any device-pixel-ratio
/// correction themselves; the bridge always hands over unscaled pixels.
pub trait PresentationSurface {
    /// The active geometry changed (including the first repaint).
    fn resize(&mut self, wide: u32, high: u32, zoom: u32);

    /// A complete frame is ready. `pixels` is RGBA8888 with red in the least
    /// significant byte, `wide * high` entries, row-major.
    fn present(&mut self, pixels: &[u32], wide: u32, high: u32);
}

/// Surface that discards every frame (headless hosts, tests).
#[derive(Debug, Default)]
pub struct NullSurface;

impl PresentationSurface for NullSurface {
    fn resize(&mut self, _wide: u32, _high: u32, _zoom: u32) {}

    fn present(&mut self, _pixels: &[u32], _wide: u32, _high: u32) {}
}

/// Per-store host state reachable from import handlers.
struct BridgeState {
    config: ConfigRegister,
    trace_log: VecDeque<i32>,
}

/// Hosts one compute core instance and owns the full display path: config
/// register, frame buffer, presentation surface, and the import surface the
/// core calls back into.
pub struct DisplayBridge {
    store: Store<BridgeState>,
    instance: Instance,
    memory: Memory,
    window: FrameBufferWindow,
    frame: FrameBuffer,
    palette: MonoPalette,
    surface: Box<dyn PresentationSurface>,
    last_surface_notice: Option<(u32, u32, u32)>,
}

impl fmt::Debug for DisplayBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisplayBridge")
            .field("window", &self.window)
            .field("config", &self.store.data().config.active())
            .field("resolution", &self.frame.resolution())
            .finish_non_exhaustive()
    }
}

impl DisplayBridge {
    /// Compiles and instantiates `core_bytes` and performs the initial
    /// frame buffer bind.
    ///
    /// `default_config` is the active geometry until the core requests its
    /// own; it must satisfy the same bounds as a requested config, so every
    /// config that ever reaches the blitter has been validated. The core's
    /// `start` export is not called here; see [`DisplayBridge::start`].
    pub fn new(
        core_bytes: &[u8],
        default_config: FrameBufferConfig,
    ) -> Result<Self, LoadError> {
        default_config
            .validate()
            .map_err(LoadError::InvalidDefaultConfig)?;
        let engine = Engine::new(&Config::new()).expect("create wasmtime engine");
        let mut store = Store::new(
            &engine,
            BridgeState {
                config: ConfigRegister::new(default_config),
                trace_log: VecDeque::new(),
            },
        );
        let mut linker: Linker<BridgeState> = Linker::new(&engine);
        define_imports(&mut linker);

        let module = Module::new(&engine, core_bytes).map_err(LoadError::Compile)?;
        let instance = linker
            .instantiate(&mut store, &module)
            .map_err(LoadError::Instantiate)?;
        let (memory, window) = binder::bind_window(&instance, &mut store)?;

        Ok(Self {
            store,
            instance,
            memory,
            window,
            frame: FrameBuffer::new(),
            palette: MonoPalette::default(),
            surface: Box::new(NullSurface),
            last_surface_notice: None,
        })
    }

    /// Installs the presentation surface frames are handed to.
    pub fn set_surface(&mut self, surface: Box<dyn PresentationSurface>) {
        self.surface = surface;
    }

    /// Replaces the background/foreground palette used by subsequent blits.
    pub fn set_palette(&mut self, palette: MonoPalette) {
        self.palette = palette;
    }

    /// Runs the core's `start` export.
    ///
    /// The core typically requests its geometry and draws an initial frame
    /// during this call; drive [`DisplayBridge::repaint`] afterwards to
    /// surface it.
    pub fn start(&mut self) -> Result<(), LoadError> {
        let start = self
            .instance
            .get_typed_func::<(), ()>(&mut self.store, abi::EXPORT_START)
            .map_err(LoadError::MissingStart)?;
        start
            .call(&mut self.store, ())
            .map_err(LoadError::StartTrapped)?;
        Ok(())
    }

    /// Renders the core's current frame buffer contents to the surface.
    ///
    /// The window is re-bound from the core's exports first: the core may
    /// have grown its memory (detaching any earlier buffer) or moved the
    /// frame buffer since the last frame. On error the previous frame stays
    /// presented.
    pub fn repaint(&mut self) -> Result<(), RepaintError> {
        let (memory, window) = binder::bind_window(&self.instance, &mut self.store)?;
        self.memory = memory;
        self.window = window;

        let cfg = self.store.data().config.active();
        let notice = (cfg.wide, cfg.high, cfg.zoom);
        if self.last_surface_notice != Some(notice) {
            self.surface.resize(cfg.wide, cfg.high, cfg.zoom);
            self.last_surface_notice = Some(notice);
        }

        let src = self.window.slice_in(self.memory.data(&self.store))?;
        self.frame.blit_packed(src, &cfg, self.palette)?;

        let (wide, high) = self.frame.resolution();
        self.surface.present(self.frame.pixels(), wide, high);
        Ok(())
    }

    /// The last completely rendered frame (empty before the first repaint).
    pub fn pixels(&self) -> &[u32] {
        self.frame.pixels()
    }

    /// Geometry of the last rendered frame; `(0, 0)` before the first.
    pub fn resolution(&self) -> (u32, u32) {
        self.frame.resolution()
    }

    /// Currently active config (the default until the core's first accepted
    /// request).
    pub fn active_config(&self) -> FrameBufferConfig {
        self.store.data().config.active()
    }

    /// True once the core has had a config request accepted.
    pub fn config_latched(&self) -> bool {
        self.store.data().config.has_latched()
    }

    /// The window resolved by the most recent bind.
    pub fn window(&self) -> FrameBufferWindow {
        self.window
    }

    /// Drains trace codes the core emitted since the last call.
    pub fn take_trace_output(&mut self) -> Vec<i32> {
        self.store.data_mut().trace_log.drain(..).collect()
    }
}

/// Defines the full `env` import surface. Extra definitions are harmless for
/// cores that import fewer of them.
fn define_imports(linker: &mut Linker<BridgeState>) {
    linker
        .func_wrap(
            abi::IMPORT_MODULE,
            abi::IMPORT_TRACE,
            |mut caller: Caller<'_, BridgeState>, code: i32| {
                tracing::debug!("core trace: {code}");
                let state = caller.data_mut();
                if state.trace_log.len() == TRACE_LOG_LIMIT {
                    state.trace_log.pop_front();
                }
                state.trace_log.push_back(code);
            },
        )
        .expect("define env.trace");

    linker
        .func_wrap(
            abi::IMPORT_MODULE,
            abi::IMPORT_REQUEST_CONFIG,
            |mut caller: Caller<'_, BridgeState>,
             wide: i32,
             high: i32,
             depth: i32,
             zoom: i32|
             -> i32 {
                let candidate = FrameBufferConfig {
                    wide: wide as u32,
                    high: high as u32,
                    depth: depth as u32,
                    zoom: zoom as u32,
                };
                match caller.data_mut().config.request(candidate) {
                    Ok(()) => abi::CONFIG_ACCEPTED,
                    Err(err) => {
                        tracing::warn!(
                            "rejected config request {wide}x{high} depth={depth} zoom={zoom}: {err}"
                        );
                        abi::config_reject_code(&err)
                    }
                }
            },
        )
        .expect("define env.request_config");

    linker
        .func_wrap(
            abi::IMPORT_MODULE,
            abi::IMPORT_MEMSET,
            |mut caller: Caller<'_, BridgeState>, dest: i32, value: i32, len: i32| -> i32 {
                let Some(memory) = caller
                    .get_export(abi::EXPORT_MEMORY)
                    .and_then(Extern::into_memory)
                else {
                    tracing::warn!("memset from a core with no exported linear memory; ignored");
                    return dest;
                };
                let data = memory.data_mut(&mut caller);
                let start = dest as u32 as usize;
                let count = len as u32 as usize;
                if start >= data.len() {
                    tracing::warn!(
                        "memset dest {start} outside linear memory of {} bytes; ignored",
                        data.len()
                    );
                    return dest;
                }
                let end = start.saturating_add(count).min(data.len());
                if end - start < count {
                    tracing::warn!("memset of {count} bytes at {start} clamped to memory end");
                }
                data[start..end].fill(value as u8);
                dest
            },
        )
        .expect("define env.memset");
}
