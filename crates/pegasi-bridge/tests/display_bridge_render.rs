//! End-to-end render paths: synthesized cores through real wasmtime
//! instances, out to a recording surface.

use std::cell::RefCell;
use std::rc::Rc;

use pegasi_bridge::demo_core::{build_demo_core, DemoCoreOptions, LocatorShape, SeedPattern};
use pegasi_bridge::{
    abi, BlitError, DisplayBridge, FrameBufferConfig, LoadError, PresentationSurface, RepaintError,
};
use pretty_assertions::assert_eq;

const BG: u32 = 0xFF00_0000;
const FG: u32 = 0xFF00_FF00;

fn new_bridge(options: &DemoCoreOptions) -> Result<DisplayBridge, LoadError> {
    let bytes = build_demo_core(options);
    DisplayBridge::new(&bytes, FrameBufferConfig::default())
}

#[derive(Debug, Default)]
struct SurfaceLog {
    resizes: Vec<(u32, u32, u32)>,
    presents: Vec<(u32, u32, usize)>,
}

#[derive(Debug, Clone, Default)]
struct RecordingSurface(Rc<RefCell<SurfaceLog>>);

impl PresentationSurface for RecordingSurface {
    fn resize(&mut self, wide: u32, high: u32, zoom: u32) {
        self.0.borrow_mut().resizes.push((wide, high, zoom));
    }

    fn present(&mut self, pixels: &[u32], wide: u32, high: u32) {
        self.0
            .borrow_mut()
            .presents
            .push((wide, high, pixels.len()));
    }
}

#[test]
fn demo_core_renders_checkerboard_through_full_path() {
    let mut bridge = new_bridge(&DemoCoreOptions::default()).expect("load demo core");
    let surface = RecordingSurface::default();
    bridge.set_surface(Box::new(surface.clone()));

    bridge.start().expect("run core start");
    assert_eq!(bridge.take_trace_output(), vec![abi::CONFIG_ACCEPTED]);
    assert!(bridge.config_latched());
    assert_eq!(bridge.window().offset(), 1024);
    assert_eq!(bridge.window().capacity(), 8192);

    bridge.repaint().expect("repaint");
    assert_eq!(bridge.resolution(), (320, 200));

    let px = bridge.pixels();
    // Even rows seed 0xAA (low bit clear), odd rows 0x55: a one-pixel checker.
    assert_eq!(px[0], BG);
    assert_eq!(px[1], FG);
    assert_eq!(px[320], FG);
    assert_eq!(px[321], BG);
    // The core's memset painted the last 8 rows solid.
    assert!(px[192 * 320..].iter().all(|&p| p == FG));

    let log = surface.0.borrow();
    assert_eq!(log.resizes, vec![(320, 200, 2)]);
    assert_eq!(log.presents, vec![(320, 200, 64_000)]);
}

#[test]
fn accessor_function_locators_bind() {
    let options = DemoCoreOptions {
        locator_shape: LocatorShape::Accessors,
        ..DemoCoreOptions::default()
    };
    let mut bridge = new_bridge(&options).expect("load");
    assert_eq!(bridge.window().offset(), 1024);
    assert_eq!(bridge.window().capacity(), 8192);

    bridge.start().expect("start");
    bridge.repaint().expect("repaint");
    assert_eq!(bridge.resolution(), (320, 200));
}

#[test]
fn surface_resize_fires_once_per_geometry_change() {
    let mut bridge = new_bridge(&DemoCoreOptions::default()).expect("load");
    let surface = RecordingSurface::default();
    bridge.set_surface(Box::new(surface.clone()));

    bridge.start().expect("start");
    bridge.repaint().expect("repaint");
    bridge.repaint().expect("repaint");

    let log = surface.0.borrow();
    assert_eq!(log.resizes, vec![(320, 200, 2)]);
    assert_eq!(log.presents.len(), 2);
}

#[test]
fn growth_rebinds_window_and_renders_from_live_memory() {
    // The frame buffer sits near the end of the initial page and only becomes
    // fully addressable after the core grows its memory in `start`.
    let options = DemoCoreOptions {
        fb_offset: 60_000,
        fb_capacity: 8192,
        seed: SeedPattern::None,
        grow_pages: 1,
        memset_fill: Some((0, 0xFF, 8000)),
        ..DemoCoreOptions::default()
    };
    let mut bridge = new_bridge(&options).expect("load");

    let err = bridge.repaint().unwrap_err();
    assert!(matches!(
        err,
        RepaintError::Blit(BlitError::SourceTooShort {
            needed: 8000,
            available: 5536,
        })
    ));
    assert_eq!(bridge.resolution(), (0, 0));

    bridge.start().expect("start grows memory and fills the frame");
    bridge.repaint().expect("repaint after growth");
    assert_eq!(bridge.resolution(), (320, 200));
    assert!(bridge.pixels().iter().all(|&p| p == FG));
}

#[test]
fn memset_past_memory_end_is_clamped_not_trapped() {
    let options = DemoCoreOptions {
        memset_fill: Some((64_000, 0xFF, 4096)),
        ..DemoCoreOptions::default()
    };
    let mut bridge = new_bridge(&options).expect("load");
    bridge.start().expect("clamped fill must not trap");
    bridge.repaint().expect("repaint");

    // The fill landed past the window; the seeded checker is untouched.
    assert_eq!(bridge.pixels()[0], BG);
    assert_eq!(bridge.pixels()[1], FG);
}

#[test]
fn trace_log_keeps_most_recent_codes() {
    let options = DemoCoreOptions {
        trace_repeat: 5000,
        ..DemoCoreOptions::default()
    };
    let mut bridge = new_bridge(&options).expect("load");
    bridge.start().expect("start");

    let codes = bridge.take_trace_output();
    assert_eq!(codes.len(), 4096);
    assert!(codes.iter().all(|&c| c == abi::CONFIG_ACCEPTED));
    assert!(bridge.take_trace_output().is_empty());
}

#[test]
fn bridge_debug_output_reports_window_and_geometry() {
    let mut bridge = new_bridge(&DemoCoreOptions::default()).expect("load");
    bridge.start().expect("start");
    bridge.repaint().expect("repaint");

    let rendered = format!("{bridge:?}");
    assert!(rendered.contains("DisplayBridge"));
    assert!(rendered.contains("offset: 1024"));
    assert!(rendered.contains("resolution: (320, 200)"));
}
