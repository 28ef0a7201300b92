// What you SEE:
// • A window that starts black. Press SPACE and a white canvas becomes an image of the
//   prompt; every frame after that is the model re-imagining its own last frame.
// • Up/Down: strength, Left/Right: guidance, PgUp/PgDn: steps, +/-: seed. ESC quits.
// • The seed creeps up by itself every 20 frames; the HUD shows it changing.
// With --headless there is no window: frames are written to a folder instead.

mod backend;
mod blend;
mod config;
mod draw;
mod error;
mod frame_loop;
mod headless;
mod params;
mod perturb;
mod seed;
mod sink;
mod types;
mod worker;

use std::time::{Duration, Instant};

use anyhow::Context as _;
use clap::Parser;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing_subscriber::EnvFilter;

use backend::{InferenceBackend, NoiseFieldBackend};
use config::{BackendChoice, Cli};
use draw::{Action, Drawer, draw_text_5x7, frame_to_buffer, hud_line};
use error::AppError;
use frame_loop::FrameLoop;
use params::SharedParams;
use perturb::PerturbationEngine;
use sink::{ChannelSink, PngSink};
use types::FrameBuffer;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let params = SharedParams::new(cli.params().context("parameters")?);

    if cli.headless {
        run_headless(&cli, params).context("headless run")
    } else {
        run_window(&cli, params).context("window run")
    }
}

fn make_backend(choice: BackendChoice) -> Box<dyn InferenceBackend> {
    match choice {
        BackendChoice::NoiseField => Box::new(NoiseFieldBackend::new()),
    }
}

fn make_perturb(cli: &Cli) -> PerturbationEngine<StdRng> {
    let rng = match cli.jitter_seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    PerturbationEngine::new(rng, cli.jitter)
}

/// Drive the loop on this thread until `--frames` frames are written or it stops.
fn run_headless(cli: &Cli, params: SharedParams) -> Result<(), AppError> {
    let sink = PngSink::new(&cli.out)?;
    tracing::info!(dir = %sink.dir().display(), frames = cli.frames, "headless run");

    let mut frame_loop = FrameLoop::new(
        make_backend(cli.backend),
        sink,
        make_perturb(cli),
        params,
        cli.loop_config()?,
    );
    headless::run(&mut frame_loop, cli.frames)
}

fn run_window(cli: &Cli, params: SharedParams) -> Result<(), AppError> {
    let (sink, frames) = ChannelSink::new();
    let frame_loop = FrameLoop::new(
        make_backend(cli.backend),
        sink,
        make_perturb(cli),
        params,
        cli.loop_config()?,
    );
    let handle = worker::spawn(frame_loop)?;

    let size = cli.window_size;
    let mut drawer = Drawer::new("Dream Loop", size, size)?;

    // `image` holds the latest frame; `screen` is image + HUD, rebuilt every update.
    let mut image = FrameBuffer::new(size, size);
    let mut screen = FrameBuffer::new(size, size);

    let mut frames_shown: u64 = 0;
    let mut last_fps_time = Instant::now();
    let mut frames_this_second: u32 = 0;
    let mut fps = 0.0f32;

    while drawer.is_open() && !drawer.esc_pressed() {
        // 1) Inputs: toggle or nudge the live parameters.
        for action in drawer.actions() {
            match action {
                Action::ToggleGeneration => match handle.toggle() {
                    Ok(true) => tracing::info!("generation requested"),
                    Ok(false) => tracing::info!("stop requested"),
                    Err(e) => tracing::warn!(error = %e, "cannot start"),
                },
                nudge => handle.params().update(|p| nudge.apply(p)),
            }
        }

        // 2) Newest finished frame, if the loop produced one.
        if let Ok(frame) = frames.try_recv() {
            frame_to_buffer(&frame, &mut image);
            frames_shown += 1;
            frames_this_second += 1;
        }

        // 3) HUD on top.
        screen.pixels.clone_from(&image.pixels);
        let hud = hud_line(handle.is_running(), &handle.params().snapshot(), frames_shown, fps);
        draw_text_5x7(&mut screen, 8, 8, &hud, 0x00_FF_FF_FF);

        // 4) Present.
        drawer.present(&screen)?;

        // 5) Generated frames per second, refreshed once a second.
        let now = Instant::now();
        let elapsed = now.duration_since(last_fps_time);
        if elapsed >= Duration::from_secs(1) {
            fps = frames_this_second as f32 / elapsed.as_secs_f32();
            tracing::debug!(fps, "frame rate");
            frames_this_second = 0;
            last_fps_time = now;
        }
    }

    // Closing the window stops generation; any in-flight frame is dropped.
    handle.shutdown();
    Ok(())
}
