//! Native runner for the pegasi display bridge.
//!
//! Loads a compute core module (or builds the built-in demo core), drives the
//! bridge's start/repaint cycle for a number of frames, streams trace codes to
//! a configurable sink, and optionally dumps the final frame as a PNG.

#![forbid(unsafe_code)]

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use pegasi_bridge::demo_core::{build_demo_core, DemoCoreOptions};
use pegasi_bridge::{DisplayBridge, FrameBufferConfig, RepaintError};

#[derive(Debug, Parser)]
#[command(about = "Run a compute core against the pegasi display bridge")]
struct Args {
    /// Compute core module (.wasm) to load.
    #[arg(long, required_unless_present = "demo", conflicts_with = "demo")]
    core: Option<PathBuf>,

    /// Run the built-in demo core instead of loading a module.
    #[arg(long)]
    demo: bool,

    /// Number of repaints to drive after the core's start routine returns.
    #[arg(long, default_value_t = 1)]
    frames: u32,

    /// Dump the final frame to a PNG file, with the configured zoom applied
    /// as an integer upscale.
    #[arg(long)]
    png: Option<PathBuf>,

    /// Where to stream core trace codes: `stdout`, `none`, or a file path.
    #[arg(long, default_value = "stdout")]
    trace_out: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let core_bytes = if args.demo {
        build_demo_core(&DemoCoreOptions::default())
    } else {
        let path = match &args.core {
            Some(path) => path,
            None => bail!("either --core or --demo is required"),
        };
        fs::read(path)
            .with_context(|| format!("failed to read core module: {}", path.display()))?
    };

    let mut bridge = DisplayBridge::new(&core_bytes, FrameBufferConfig::default())
        .context("failed to load compute core")?;
    let mut trace_sink = open_trace_sink(&args.trace_out)?;

    bridge.start().context("core start routine failed")?;
    if let Some(out) = trace_sink.as_mut() {
        stream_trace(&mut bridge, out)?;
    }
    if !bridge.config_latched() {
        tracing::warn!("core never requested a display config; rendering with the default");
    }

    for frame in 0..args.frames {
        match bridge.repaint() {
            Ok(()) => {}
            Err(RepaintError::Blit(err)) => {
                // Recoverable: this frame is skipped and the previous one
                // stays presented.
                tracing::warn!("frame {frame} skipped: {err}");
            }
            Err(err @ RepaintError::Bind(_)) => {
                return Err(anyhow!("frame {frame}: {err}"));
            }
        }
        if let Some(out) = trace_sink.as_mut() {
            stream_trace(&mut bridge, out)?;
        }
    }

    let (wide, high) = bridge.resolution();
    tracing::info!(
        "rendered {} frame(s) at {wide}x{high} zoom={}",
        args.frames,
        bridge.active_config().zoom
    );

    if let Some(path) = &args.png {
        dump_frame_png(&bridge, path)?;
        println!("wrote {}", path.display());
    }

    Ok(())
}

fn open_trace_sink(dest: &str) -> Result<Option<Box<dyn Write>>> {
    if dest == "none" {
        return Ok(None);
    }
    if dest == "stdout" {
        return Ok(Some(Box::new(io::stdout())));
    }
    let file = File::create(dest)
        .with_context(|| format!("failed to create trace output file: {dest}"))?;
    Ok(Some(Box::new(BufWriter::new(file))))
}

/// Drains the bridge's trace log, writing one code per line.
fn stream_trace(bridge: &mut DisplayBridge, out: &mut dyn Write) -> Result<()> {
    for code in bridge.take_trace_output() {
        writeln!(out, "{code}")?;
    }
    Ok(())
}

fn dump_frame_png(bridge: &DisplayBridge, path: &Path) -> Result<()> {
    let (wide, high) = bridge.resolution();
    if wide == 0 || high == 0 {
        bail!("no frame has been rendered yet");
    }

    let zoom = bridge.active_config().zoom.max(1);
    let out_wide = wide * zoom;
    let out_high = high * zoom;
    let pixels = bridge.pixels();

    // Frame pixels are u32 values with little-endian RGBA byte order
    // (red in the low byte, alpha in the high byte), so serializing each
    // pixel with to_le_bytes yields the R, G, B, A byte stream the image
    // crate expects. The zoom factor is applied as an integer upscale.
    let mut rgba = Vec::with_capacity(out_wide as usize * out_high as usize * 4);
    for y in 0..out_high {
        for x in 0..out_wide {
            let pixel = pixels[((y / zoom) * wide + x / zoom) as usize];
            rgba.extend_from_slice(&pixel.to_le_bytes());
        }
    }

    let img = image::RgbaImage::from_raw(out_wide, out_high, rgba)
        .ok_or_else(|| anyhow!("invalid image data"))?;
    img.save(path)
        .with_context(|| format!("failed to write PNG to {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_sink_selection() {
        assert!(open_trace_sink("none").expect("sink").is_none());
        assert!(open_trace_sink("stdout").expect("sink").is_some());
    }

    #[test]
    fn stream_trace_writes_one_code_per_line_and_drains() {
        let bytes = build_demo_core(&DemoCoreOptions::default());
        let mut bridge =
            DisplayBridge::new(&bytes, FrameBufferConfig::default()).expect("load demo core");
        bridge.start().expect("start");

        let mut out = Vec::new();
        stream_trace(&mut bridge, &mut out).expect("stream");
        assert_eq!(String::from_utf8(out).expect("utf8"), "0\n");
        assert!(bridge.take_trace_output().is_empty());
    }
}
