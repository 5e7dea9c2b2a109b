//! keysynth - Terminal keyboard synthesizer
//!
//! Run with: cargo run -- --set oscillator.5.waveform=pulse

mod audio;
mod keyboard;

use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

use clap::Parser;
use color_eyre::eyre::{eyre, Result as EyreResult, WrapErr};
use tracing_subscriber::EnvFilter;

use keysynth::{
    config::{EngineConfig, RenderMode},
    patch::Patch,
    synth::VoiceScheduler,
};

use audio::SharedMixer;

/// Play oscillator patches from the computer keyboard.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Engine settings (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Frames per block
    #[arg(long)]
    block_len: Option<usize>,

    /// Bytes per sample
    #[arg(long)]
    sample_width: Option<u8>,

    /// Frequency of A4 in Hz
    #[arg(long)]
    a4: Option<f32>,

    /// stream or render
    #[arg(long)]
    rendering: Option<RenderMode>,

    /// Patch assignment, e.g. `envelope.1.source=osc 5` (repeatable)
    #[arg(long = "set", value_name = "PATH=VALUE")]
    assignments: Vec<String>,

    /// Print every patch parameter and exit
    #[arg(long)]
    list_params: bool,
}

fn load_config(args: &Args) -> EyreResult<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .wrap_err_with(|| format!("failed to read {}", path.display()))?;
            toml::from_str(&text).wrap_err("invalid engine config")?
        }
        None => EngineConfig::default(),
    };

    if let Some(block_len) = args.block_len {
        config.block_len = block_len;
    }
    if let Some(width) = args.sample_width {
        config.sample_width = width;
    }
    if let Some(a4) = args.a4 {
        config.a4_tuning = a4;
    }
    if let Some(rendering) = args.rendering {
        config.rendering = rendering;
    }
    Ok(config)
}

fn load_patch(args: &Args) -> EyreResult<Patch> {
    let mut patch = Patch::default();
    for assignment in &args.assignments {
        let (path, value) = assignment
            .split_once('=')
            .ok_or_else(|| eyre!("expected PATH=VALUE, got '{assignment}'"))?;
        patch
            .set_param(path.trim(), value.trim())
            .wrap_err_with(|| format!("--set {assignment}"))?;
    }
    Ok(patch)
}

fn main() -> EyreResult<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut config = load_config(&args)?;
    let patch = load_patch(&args)?;

    if args.list_params {
        for (path, value) in patch.params() {
            println!("{path} = {value}");
        }
        return Ok(());
    }

    let device = audio::OutputDevice::open()?;
    config.sample_rate = device.sample_rate();
    config.validate().wrap_err("invalid engine config")?;

    let mixer = SharedMixer::new(
        config.sample_rate_f32(),
        config.block_len,
        config.sample_width,
    );
    let _stream = device.start(mixer.clone())?;

    println!("=== keysynth ===");
    println!("Sample rate: {} Hz", config.sample_rate);
    println!("Block: {} frames, {} bit", config.block_len, config.sample_width as u32 * 8);
    println!("Rendering: {}", config.rendering);
    println!();
    println!("{}", keyboard::HELP);

    let mut scheduler = VoiceScheduler::new(mixer, patch, config)?;
    let (mut events, input) = keyboard::spawn()?;

    let start = Instant::now();
    let mut last_status = String::new();
    while !events.is_abandoned() || !events.is_empty() {
        let now = start.elapsed().as_secs_f64();
        scheduler.drain(&mut events, now);
        scheduler.tick(now);

        if scheduler.status() != last_status {
            last_status = scheduler.status().to_string();
            keyboard::print_status(&last_status);
        }
        std::thread::sleep(Duration::from_millis(5));
    }

    scheduler.close();
    input
        .join()
        .map_err(|_| eyre!("keyboard thread panicked"))??;
    Ok(())
}
