// Command-line surface. Defaults mirror the control panel's initial slider positions.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::blend::DEFAULT_ALPHA;
use crate::error::AppError;
use crate::frame_loop::LoopConfig;
use crate::perturb::DEFAULT_JITTER;
use crate::seed::DEFAULT_RESEED_EVERY;
use crate::types::{BLANK_FILL, BLANK_SIZE, DEFAULT_PROMPT, GenerationParameters, STEPS_MAX};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum BackendChoice {
    /// Bundled deterministic CPU stand-in.
    NoiseField,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "dream-loop", version, about = "Feed an image-to-image model its own output, forever")]
pub struct Cli {
    /// Text prompt the model is steered by.
    #[arg(long, default_value = DEFAULT_PROMPT)]
    pub prompt: String,

    /// How far each output may move away from its reference (0..1).
    #[arg(long, default_value_t = 1.0)]
    pub strength: f32,

    /// How strongly the output must follow the prompt (0..1).
    #[arg(long, default_value_t = 1.0)]
    pub guidance: f32,

    /// Inference steps per frame.
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u32).range(1..=STEPS_MAX as i64))]
    pub steps: u32,

    /// Initial seed; bumped by one every `--reseed-every` frames.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Pause between the end of one frame and the start of the next, in ms.
    #[arg(long, default_value_t = 50)]
    pub tick_ms: u64,

    /// Weight of the previous frame when blending in a new one (0..1).
    #[arg(long, default_value_t = DEFAULT_ALPHA)]
    pub alpha: f32,

    /// Half-width of the brightness/contrast jitter (0.05 = +-5%).
    #[arg(long, default_value_t = DEFAULT_JITTER)]
    pub jitter: f32,

    /// Completed frames between seed bumps (0 disables).
    #[arg(long, default_value_t = DEFAULT_RESEED_EVERY)]
    pub reseed_every: u64,

    /// Seed for the jitter RNG; fresh entropy if omitted.
    #[arg(long)]
    pub jitter_seed: Option<u64>,

    /// Side length of the blank first reference.
    #[arg(long, default_value_t = BLANK_SIZE)]
    pub blank_size: u32,

    /// Side length of the square window.
    #[arg(long, default_value_t = 1024)]
    pub window_size: usize,

    /// Model backend.
    #[arg(long, value_enum, default_value_t = BackendChoice::NoiseField)]
    pub backend: BackendChoice,

    /// Run without a window and write frames as PNGs.
    #[arg(long)]
    pub headless: bool,

    /// Headless: frames to produce before exiting.
    #[arg(long, default_value_t = 40)]
    pub frames: u64,

    /// Headless: output directory.
    #[arg(long, default_value = "frames")]
    pub out: PathBuf,
}

impl Cli {
    pub fn params(&self) -> Result<GenerationParameters, AppError> {
        let params = GenerationParameters {
            prompt: self.prompt.clone(),
            strength: self.strength,
            guidance_scale: self.guidance,
            steps: self.steps,
            seed: self.seed,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn loop_config(&self) -> Result<LoopConfig, AppError> {
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(AppError::config(format!("alpha {} not in [0, 1]", self.alpha)));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(AppError::config(format!("jitter {} not in [0, 1]", self.jitter)));
        }
        if self.blank_size == 0 {
            return Err(AppError::config("blank size must be positive"));
        }
        Ok(LoopConfig {
            tick_delay: Duration::from_millis(self.tick_ms),
            blend_alpha: self.alpha,
            reseed_every: self.reseed_every,
            blank_size: self.blank_size,
            blank_fill: BLANK_FILL,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_control_panel() {
        let cli = Cli::parse_from(["dream-loop"]);
        let p = cli.params().unwrap();
        assert_eq!(p, GenerationParameters::default());
        let c = cli.loop_config().unwrap();
        assert_eq!(c.tick_delay, Duration::from_millis(50));
        assert_eq!(c.blend_alpha, 0.1);
        assert_eq!(c.reseed_every, 20);
        assert_eq!(c.blank_size, 512);
        assert!(!cli.headless);
    }

    #[test]
    fn steps_out_of_range_are_rejected_by_the_parser() {
        assert!(Cli::try_parse_from(["dream-loop", "--steps", "0"]).is_err());
        assert!(Cli::try_parse_from(["dream-loop", "--steps", "51"]).is_err());
        assert!(Cli::try_parse_from(["dream-loop", "--steps", "50"]).is_ok());
    }

    #[test]
    fn bad_floats_become_config_errors() {
        let cli = Cli::parse_from(["dream-loop", "--strength", "1.5"]);
        assert!(matches!(cli.params(), Err(AppError::Config(_))));
        let cli = Cli::parse_from(["dream-loop", "--alpha", "2"]);
        assert!(matches!(cli.loop_config(), Err(AppError::Config(_))));
    }

    #[test]
    fn headless_flags() {
        let cli = Cli::parse_from([
            "dream-loop", "--headless", "--frames", "5", "--out", "/tmp/x", "--jitter-seed", "3",
        ]);
        assert!(cli.headless);
        assert_eq!(cli.frames, 5);
        assert_eq!(cli.out, PathBuf::from("/tmp/x"));
        assert_eq!(cli.jitter_seed, Some(3));
    }
}
