//! Frame-driver stand-in: pushes frames through the marshaling bridge
//! against a compute module and reports per-frame timing.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use edgecam_bridge::{EdgeBridge, Frame};
use edgecam_wasm::refmod;
use edgecam_wasm::WasmtimeModule;

#[derive(Parser)]
#[command(
    name = "edgecam-run",
    about = "Drive frames through a linear-memory edge-detection module"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run sequential detect calls against a module and report timings.
    Run {
        /// Compiled compute module; defaults to the built-in reference module.
        #[arg(long)]
        module: Option<PathBuf>,

        #[arg(long, default_value_t = 640)]
        width: u32,

        #[arg(long, default_value_t = 480)]
        height: u32,

        /// Number of frames to push through the bridge.
        #[arg(long, default_value_t = 30)]
        frames: u32,

        /// Packed RGBA color painted on detected edges (hex).
        #[arg(long, default_value = "0xFF9E24FF", value_parser = parse_color_key)]
        color_key: u32,

        /// Emit only the highlighted edges.
        #[arg(long)]
        highlight_only: bool,

        /// Raw RGBA input file (width * height * 4 bytes); defaults to a
        /// synthetic gradient.
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Write the built-in reference module to a file.
    EmitModule {
        #[arg(long, default_value = "edgecam_ref.wasm")]
        out: PathBuf,
    },
}

fn parse_color_key(s: &str) -> std::result::Result<u32, String> {
    let digits = s.trim_start_matches("0x").trim_start_matches("0X");
    u32::from_str_radix(digits, 16)
        .map_err(|err| format!("invalid packed RGBA value {s:?}: {err}"))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match Cli::parse().command {
        Command::Run {
            module,
            width,
            height,
            frames,
            color_key,
            highlight_only,
            input,
        } => run(module, width, height, frames, color_key, highlight_only, input),
        Command::EmitModule { out } => {
            fs::write(&out, refmod::build())
                .with_context(|| format!("write {}", out.display()))?;
            println!("wrote {}", out.display());
            Ok(())
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run(
    module: Option<PathBuf>,
    width: u32,
    height: u32,
    frames: u32,
    color_key: u32,
    highlight_only: bool,
    input: Option<PathBuf>,
) -> Result<()> {
    let wasm = match &module {
        Some(path) => fs::read(path).with_context(|| format!("read module {}", path.display()))?,
        None => refmod::build(),
    };
    let module = WasmtimeModule::from_binary(&wasm).context("instantiate compute module")?;
    let mut bridge = EdgeBridge::new(module);

    let frame = match input {
        Some(path) => {
            let pixels =
                fs::read(&path).with_context(|| format!("read frame {}", path.display()))?;
            Frame::from_rgba(width, height, pixels)?
        }
        None => gradient_frame(width, height),
    };

    let mut total = Duration::ZERO;
    for i in 0..frames {
        let start = Instant::now();
        let out = bridge.detect(&frame, color_key, highlight_only)?;
        let elapsed = start.elapsed();
        total += elapsed;
        tracing::debug!(frame = i, out_len = out.len(), ?elapsed, "frame done");
    }
    if frames > 0 {
        println!(
            "{frames} frames of {width}x{height}, avg {:.3} ms/frame",
            total.as_secs_f64() * 1e3 / f64::from(frames)
        );
    }
    Ok(())
}

fn gradient_frame(width: u32, height: u32) -> Frame {
    let mut pixels = Vec::with_capacity(width as usize * height as usize * 4);
    for y in 0..height {
        for x in 0..width {
            pixels.push((x & 0xFF) as u8);
            pixels.push((y & 0xFF) as u8);
            pixels.push(((x ^ y) & 0xFF) as u8);
            pixels.push(0xFF);
        }
    }
    Frame::from_rgba(width, height, pixels).expect("gradient length matches dimensions")
}
