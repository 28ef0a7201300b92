// Photometric jitter applied to the previous frame before it goes back into the model.
// Visual: each reference image is a touch brighter/darker and flatter/punchier than
// the last output, which keeps the feedback from locking onto a single image.

use rand::Rng;

use crate::types::Frame;

/// Default half-width of the jitter range: multipliers land in [0.95, 1.05].
pub const DEFAULT_JITTER: f32 = 0.05;

/// One sampled pair of multipliers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Jitter {
    pub brightness: f32,
    pub contrast: f32,
}

impl Jitter {
    pub const IDENTITY: Jitter = Jitter { brightness: 1.0, contrast: 1.0 };
}

pub struct PerturbationEngine<R> {
    rng: R,
    bound: f32,
}

impl<R: Rng> PerturbationEngine<R> {
    /// `bound` is clamped to [0, 1]; 0 turns the engine into a copy.
    pub fn new(rng: R, bound: f32) -> Self {
        Self { rng, bound: bound.clamp(0.0, 1.0) }
    }

    pub fn bound(&self) -> f32 {
        self.bound
    }

    /// Draw brightness and contrast independently from [1 - bound, 1 + bound].
    pub fn sample(&mut self) -> Jitter {
        if self.bound == 0.0 {
            return Jitter::IDENTITY;
        }
        let lo = 1.0 - self.bound;
        let hi = 1.0 + self.bound;
        Jitter {
            brightness: self.rng.gen_range(lo..=hi),
            contrast: self.rng.gen_range(lo..=hi),
        }
    }

    /// Jittered copy of `frame`; the input is left untouched.
    pub fn perturb(&mut self, frame: &Frame) -> Frame {
        let jitter = self.sample();
        tracing::trace!(?jitter, "perturb reference");
        apply_jitter(frame, jitter)
    }
}

/// Brightness scales every channel; contrast then pushes channels away from
/// (or toward) the mean luma of the brightened image.
pub fn apply_jitter(frame: &Frame, jitter: Jitter) -> Frame {
    let mut out = frame.as_image().clone();
    let mean = mean_luma(frame) * jitter.brightness;

    for px in out.pixels_mut() {
        for c in px.0.iter_mut() {
            let v = *c as f32 * jitter.brightness;
            let v = mean + (v - mean) * jitter.contrast;
            *c = v.round().clamp(0.0, 255.0) as u8;
        }
    }
    Frame::new(out)
}

/// Rec.601 luma average over the whole frame, in 0..255.
fn mean_luma(frame: &Frame) -> f32 {
    let img = frame.as_image();
    let n = (img.width() as u64 * img.height() as u64).max(1);
    let sum: f64 = img
        .pixels()
        .map(|p| 0.299 * p.0[0] as f64 + 0.587 * p.0[1] as f64 + 0.114 * p.0[2] as f64)
        .sum();
    (sum / n as f64) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn gradient(w: u32, h: u32) -> Frame {
        Frame::new(RgbImage::from_fn(w, h, |x, y| {
            Rgb([(x * 255 / w.max(1)) as u8, (y * 255 / h.max(1)) as u8, 128])
        }))
    }

    #[test]
    fn samples_stay_within_bound() {
        let mut eng = PerturbationEngine::new(StdRng::seed_from_u64(1), DEFAULT_JITTER);
        for _ in 0..1000 {
            let j = eng.sample();
            assert!((0.95..=1.05).contains(&j.brightness), "{j:?}");
            assert!((0.95..=1.05).contains(&j.contrast), "{j:?}");
        }
    }

    #[test]
    fn same_seed_same_output() {
        let src = gradient(32, 16);
        let mut a = PerturbationEngine::new(StdRng::seed_from_u64(99), DEFAULT_JITTER);
        let mut b = PerturbationEngine::new(StdRng::seed_from_u64(99), DEFAULT_JITTER);
        for _ in 0..4 {
            assert_eq!(a.perturb(&src), b.perturb(&src));
        }
    }

    #[test]
    fn perturb_matches_apply_of_sampled_jitter() {
        let src = gradient(8, 8);
        let mut sampler = PerturbationEngine::new(StdRng::seed_from_u64(5), DEFAULT_JITTER);
        let mut engine = PerturbationEngine::new(StdRng::seed_from_u64(5), DEFAULT_JITTER);
        let j = sampler.sample();
        assert_eq!(engine.perturb(&src), apply_jitter(&src, j));
    }

    #[test]
    fn input_is_not_mutated_and_size_is_kept() {
        let src = gradient(20, 10);
        let before = src.clone();
        let mut eng = PerturbationEngine::new(StdRng::seed_from_u64(3), 0.5);
        let out = eng.perturb(&src);
        assert_eq!(src, before);
        assert_eq!(out.dimensions(), (20, 10));
    }

    #[test]
    fn identity_jitter_is_a_copy() {
        let src = gradient(16, 16);
        assert_eq!(apply_jitter(&src, Jitter::IDENTITY), src);
        let mut eng = PerturbationEngine::new(StdRng::seed_from_u64(0), 0.0);
        assert_eq!(eng.perturb(&src), src);
    }

    #[test]
    fn brightness_scales_a_flat_frame() {
        // Flat frames have no contrast to stretch, only brightness shows.
        let flat = Frame::solid(4, 4, [100, 100, 100]);
        let out = apply_jitter(&flat, Jitter { brightness: 1.05, contrast: 0.95 });
        assert_eq!(out.pixel(2, 2), [105, 105, 105]);
        let out = apply_jitter(&flat, Jitter { brightness: 0.95, contrast: 1.05 });
        assert_eq!(out.pixel(0, 3), [95, 95, 95]);
    }

    #[test]
    fn contrast_spreads_around_the_mean() {
        let img = RgbImage::from_fn(2, 1, |x, _| if x == 0 { Rgb([50, 50, 50]) } else { Rgb([150, 150, 150]) });
        let out = apply_jitter(&Frame::new(img), Jitter { brightness: 1.0, contrast: 1.1 });
        // mean luma is 100
        assert_eq!(out.pixel(0, 0), [45, 45, 45]);
        assert_eq!(out.pixel(1, 0), [155, 155, 155]);
    }
}
