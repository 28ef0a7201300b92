// The image-to-image model seam. The loop only ever calls `generate`; which model
// (or stand-in) sits behind it is decided in main.rs.

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::BackendError;
use crate::types::Frame;

/// Everything one inference call needs.
#[derive(Clone, Copy, Debug)]
pub struct GenerateRequest<'a> {
    pub prompt: &'a str,
    pub reference: &'a Frame,
    pub strength: f32,
    pub guidance_scale: f32,
    pub steps: u32,
    pub seed: u64,
}

/// Produces one image from a reference. Must be deterministic for identical requests.
pub trait InferenceBackend: Send {
    fn generate(&mut self, req: &GenerateRequest<'_>) -> Result<Frame, BackendError>;

    fn name(&self) -> &str;
}

impl<B: InferenceBackend + ?Sized> InferenceBackend for Box<B> {
    fn generate(&mut self, req: &GenerateRequest<'_>) -> Result<Frame, BackendError> {
        (**self).generate(req)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/* ---------- Bundled CPU stand-in ---------- */

/// Side of the coarse color grid the field is upscaled from.
const FIELD_GRID: u32 = 6;
/// Grain amplitude (0..255 units) at guidance 0.
const MAX_GRAIN: f32 = 32.0;

/// Deterministic CPU stand-in for a diffusion model so the app runs without weights.
/// Visual: soft blobs in a palette picked by the prompt; the seed picks the layout,
/// strength and steps decide how far the reference is pulled toward it.
#[derive(Default)]
pub struct NoiseFieldBackend;

impl NoiseFieldBackend {
    pub fn new() -> Self {
        Self
    }
}

impl InferenceBackend for NoiseFieldBackend {
    fn generate(&mut self, req: &GenerateRequest<'_>) -> Result<Frame, BackendError> {
        check_request(req)?;

        let (w, h) = req.reference.dimensions();
        let prompt_key = fnv1a(req.prompt.trim().as_bytes());

        // 1) Palette depends on the prompt only, so reseeding keeps the colors.
        let mut palette_rng = StdRng::seed_from_u64(prompt_key);
        let palette: Vec<[u8; 3]> = (0..4)
            .map(|_| {
                [
                    palette_rng.gen_range(0..=255u8),
                    palette_rng.gen_range(0..=255u8),
                    palette_rng.gen_range(0..=255u8),
                ]
            })
            .collect();

        // 2) Layout and grain depend on prompt and seed.
        let mut rng = StdRng::seed_from_u64(prompt_key ^ req.seed.wrapping_mul(0x9E37_79B9_7F4A_7C15));
        let coarse = RgbImage::from_fn(FIELD_GRID, FIELD_GRID, |_, _| {
            Rgb(palette[rng.gen_range(0..palette.len())])
        });
        let field = imageops::resize(&coarse, w, h, FilterType::Triangle);

        // 3) Each step moves `strength` of the remaining distance toward the field.
        let t = 1.0 - (1.0 - req.strength).powi(req.steps as i32);
        let grain = MAX_GRAIN * (1.0 - req.guidance_scale) * req.strength;

        let mut out = RgbImage::new(w, h);
        for (x, y, px) in out.enumerate_pixels_mut() {
            let r = req.reference.pixel(x, y);
            let f = field.get_pixel(x, y).0;
            let n = if grain > 0.0 { rng.gen_range(-grain..=grain) } else { 0.0 };
            for c in 0..3 {
                let v = (1.0 - t) * r[c] as f32 + t * f[c] as f32 + n;
                px.0[c] = v.round().clamp(0.0, 255.0) as u8;
            }
        }

        Ok(Frame::new(box_blur_rgb(&out, 1)))
    }

    fn name(&self) -> &str {
        "noise-field"
    }
}

fn check_request(req: &GenerateRequest<'_>) -> Result<(), BackendError> {
    if req.prompt.trim().is_empty() {
        return Err(BackendError::transient("invalid parameters: empty prompt"));
    }
    if req.steps == 0 {
        return Err(BackendError::transient("invalid parameters: steps must be >= 1"));
    }
    if !(0.0..=1.0).contains(&req.strength) || !(0.0..=1.0).contains(&req.guidance_scale) {
        return Err(BackendError::transient(format!(
            "invalid parameters: strength {} / guidance {} outside [0, 1]",
            req.strength, req.guidance_scale
        )));
    }
    Ok(())
}

/// FNV-1a, stable across runs and platforms (unlike `DefaultHasher`).
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

/// Separable box blur with clamped edges: a horizontal sliding-window pass into
/// a scratch image, then a vertical one.
pub fn box_blur_rgb(src: &RgbImage, radius: u32) -> RgbImage {
    let (w, h) = src.dimensions();
    if radius == 0 || w == 0 || h == 0 {
        return src.clone();
    }
    let r = radius as i64;
    let win = (2 * r + 1) as u32;
    let (wi, hi) = (w as i64, h as i64);

    let mut tmp = RgbImage::new(w, h);
    for y in 0..h {
        // Edge pixel repeated r+1 times on the left, then prime the right half.
        let p0 = src.get_pixel(0, y).0;
        let mut sum = [0u32; 3];
        for c in 0..3 {
            sum[c] = p0[c] as u32 * (radius + 1);
        }
        for x in 1..=r {
            let p = src.get_pixel(x.min(wi - 1) as u32, y).0;
            for c in 0..3 {
                sum[c] += p[c] as u32;
            }
        }

        for x in 0..wi {
            tmp.put_pixel(x as u32, y, Rgb(sum.map(|s| (s / win) as u8)));

            let sub = src.get_pixel((x - r).max(0) as u32, y).0;
            let add = src.get_pixel((x + r + 1).min(wi - 1) as u32, y).0;
            for c in 0..3 {
                sum[c] = sum[c] + add[c] as u32 - sub[c] as u32;
            }
        }
    }

    let mut dst = RgbImage::new(w, h);
    for x in 0..w {
        let p0 = tmp.get_pixel(x, 0).0;
        let mut sum = [0u32; 3];
        for c in 0..3 {
            sum[c] = p0[c] as u32 * (radius + 1);
        }
        for y in 1..=r {
            let p = tmp.get_pixel(x, y.min(hi - 1) as u32).0;
            for c in 0..3 {
                sum[c] += p[c] as u32;
            }
        }

        for y in 0..hi {
            dst.put_pixel(x, y as u32, Rgb(sum.map(|s| (s / win) as u8)));

            let sub = tmp.get_pixel(x, (y - r).max(0) as u32).0;
            let add = tmp.get_pixel(x, (y + r + 1).min(hi - 1) as u32).0;
            for c in 0..3 {
                sum[c] = sum[c] + add[c] as u32 - sub[c] as u32;
            }
        }
    }

    dst
}
