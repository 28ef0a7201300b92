// Core types shared by the loop, the backend and the frontends.

use image::{Rgb, RgbImage};

use crate::error::AppError;

/// Working resolution of the blank reference the very first tick starts from.
pub const BLANK_SIZE: u32 = 512;
/// Solid fill of that blank reference (white, like an empty canvas).
pub const BLANK_FILL: [u8; 3] = [255, 255, 255];

pub const DEFAULT_PROMPT: &str = "A photograph of a duck";
pub const STEPS_MAX: u32 = 50;
pub const SEED_MAX: u64 = 10_000;

/// One immutable RGB raster in the feedback sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    image: RgbImage,
}

impl Frame {
    pub fn new(image: RgbImage) -> Self {
        Self { image }
    }

    /// A frame filled with one color.
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        Self { image: RgbImage::from_pixel(width, height, Rgb(rgb)) }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        self.image.get_pixel(x, y).0
    }

    pub fn as_image(&self) -> &RgbImage {
        &self.image
    }

    /// Raw interleaved RGB bytes, row-major.
    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }
}

/// What the window actually shows: each entry is 0x00RRGGBB for minifb.
#[derive(Clone)]
pub struct FrameBuffer {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u32>,
}

impl FrameBuffer {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height, pixels: vec![0u32; width * height] }
    }
}

/// The user-tunable knobs, read fresh by the loop on every tick.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationParameters {
    pub prompt: String,
    pub strength: f32,
    pub guidance_scale: f32,
    pub steps: u32,
    pub seed: u64,
}

impl Default for GenerationParameters {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_PROMPT.to_string(),
            strength: 1.0,
            guidance_scale: 1.0,
            steps: 2,
            seed: 42,
        }
    }
}

impl GenerationParameters {
    /// Reject values a slider could never produce.
    pub fn validate(&self) -> Result<(), AppError> {
        if !(0.0..=1.0).contains(&self.strength) {
            return Err(AppError::config(format!("strength {} not in [0, 1]", self.strength)));
        }
        if !(0.0..=1.0).contains(&self.guidance_scale) {
            return Err(AppError::config(format!(
                "guidance scale {} not in [0, 1]",
                self.guidance_scale
            )));
        }
        if !(1..=STEPS_MAX).contains(&self.steps) {
            return Err(AppError::config(format!("steps {} not in 1..={STEPS_MAX}", self.steps)));
        }
        if self.seed > SEED_MAX {
            return Err(AppError::config(format!("seed {} above {SEED_MAX}", self.seed)));
        }
        Ok(())
    }

    pub fn has_prompt(&self) -> bool {
        !self.prompt.trim().is_empty()
    }

    // Slider-style nudges: 0.1 resolution, clamped to the slider range.

    pub fn nudge_strength(&mut self, delta: f32) {
        self.strength = snap_tenth(self.strength + delta);
    }

    pub fn nudge_guidance(&mut self, delta: f32) {
        self.guidance_scale = snap_tenth(self.guidance_scale + delta);
    }

    pub fn nudge_steps(&mut self, delta: i32) {
        self.steps = (self.steps as i64 + delta as i64).clamp(1, STEPS_MAX as i64) as u32;
    }

    /// Keys never push the seed past `SEED_MAX`, but the scheduler may have. Up there
    /// a `+` does nothing and a `-` steps down as usual.
    pub fn nudge_seed(&mut self, delta: i64) {
        if delta > 0 && self.seed >= SEED_MAX {
            return;
        }
        let next = self.seed.saturating_add_signed(delta);
        self.seed = if delta > 0 { next.min(SEED_MAX) } else { next };
    }
}

fn snap_tenth(v: f32) -> f32 {
    ((v * 10.0).round() / 10.0).clamp(0.0, 1.0)
}
