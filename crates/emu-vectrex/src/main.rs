//! Vectrex emulator binary.
//!
//! Runs headless for a fixed number of host frames, then writes whatever
//! captures were asked for: the last vector frame as JSON, the audio as
//! WAV, and the machine state.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use emu_core::Observable;
use emu_vectrex::config::SAMPLES_PER_HOST_FRAME;
use emu_vectrex::{ScriptedPress, Vectrex, VectrexConfig, capture};

/// Headless Vectrex emulator
#[derive(Parser, Debug)]
#[command(name = "emu-vectrex")]
#[command(version)]
#[command(about = "Cycle-stepped Vectrex emulator")]
struct Cli {
    /// System ROM image (8192 bytes)
    #[arg(long)]
    bios: PathBuf,

    /// Cartridge image (up to 65536 bytes)
    #[arg(long)]
    cart: Option<PathBuf>,

    /// Host frames (20 ms each) to run
    #[arg(long, default_value_t = 100)]
    frames: u64,

    /// Write the last completed vector frame as JSON
    #[arg(long)]
    vectors: Option<PathBuf>,

    /// Write the audio as a 16-bit WAV file
    #[arg(long)]
    audio: Option<PathBuf>,

    /// Write the machine state after the run
    #[arg(long)]
    save_state: Option<PathBuf>,

    /// Restore a machine state before the run
    #[arg(long)]
    load_state: Option<PathBuf>,

    /// Scripted input, e.g. `b1@50`, `p2-left@10:30` (repeatable)
    #[arg(long = "press", value_name = "CONTROL@FRAME[:HOLD]")]
    presses: Vec<ScriptedPress>,
}

fn read_file(path: &Path, what: &str) -> Vec<u8> {
    match fs::read(path) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("Failed to read {what} {}: {e}", path.display());
            process::exit(1);
        }
    }
}

fn make_vectrex(cli: &Cli) -> Vectrex {
    let bios = read_file(&cli.bios, "BIOS");
    let cartridge = cli.cart.as_deref().map(|path| read_file(path, "cartridge"));
    let cart_len = cartridge.as_ref().map(Vec::len);

    let vectrex = match Vectrex::new(&VectrexConfig { bios, cartridge }) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("Failed to start: {e}");
            process::exit(1);
        }
    };

    eprintln!("Loaded BIOS: {}", cli.bios.display());
    if let (Some(path), Some(len)) = (&cli.cart, cart_len) {
        eprintln!(
            "Loaded cartridge: {} ({len} bytes, 64K banked: {})",
            path.display(),
            vectrex.bus().is_big_cartridge()
        );
    }
    vectrex
}

fn fail(what: &str, e: &dyn std::fmt::Display) -> ! {
    eprintln!("{what} error: {e}");
    process::exit(1);
}

fn main() {
    let cli = Cli::parse();
    let mut vectrex = make_vectrex(&cli);

    if let Some(ref path) = cli.load_state {
        if let Err(e) = capture::load_state_file(&mut vectrex, path) {
            fail("Load state", &e);
        }
        eprintln!("State loaded from {}", path.display());
    }

    for press in &cli.presses {
        press.enqueue(vectrex.input_queue());
    }

    let mut audio = Vec::new();
    for _ in 0..cli.frames {
        vectrex.run_frame();
        if cli.audio.is_some() {
            audio.extend(vectrex.generate_audio(SAMPLES_PER_HOST_FRAME));
        }
    }
    eprintln!(
        "Ran {} host frames ({} vector frames, PC ${:04X})",
        cli.frames,
        vectrex.frame_count(),
        vectrex.cpu().regs.pc
    );
    if let Some(value) = vectrex.query("bank_offset") {
        eprintln!("Bank offset: {value}");
    }

    if let Some(ref path) = cli.vectors {
        if let Err(e) = capture::save_vectors(vectrex.last_frame(), path) {
            fail("Vector dump", &e);
        }
        eprintln!(
            "{} vectors saved to {}",
            vectrex.last_frame().len(),
            path.display()
        );
    }

    if let Some(ref path) = cli.audio {
        if let Err(e) = capture::save_audio(&audio, path) {
            fail("Audio", &e);
        }
        eprintln!("{} samples saved to {}", audio.len(), path.display());
    }

    if let Some(ref path) = cli.save_state {
        if let Err(e) = capture::save_state_file(&vectrex, path) {
            fail("Save state", &e);
        }
        eprintln!("State saved to {}", path.display());
    }
}
