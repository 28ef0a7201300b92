// Temporal smoothing: mix the previous displayed frame into the new model output.
// Visual: a small alpha keeps each frame mostly "new" but anchored to the last one,
// so the sequence neither flickers nor runs away.

use image::RgbImage;

use crate::error::LoopError;
use crate::types::Frame;

/// Weight of the previous frame in every blend the loop performs.
pub const DEFAULT_ALPHA: f32 = 0.1;

/// Per channel: `round(alpha * previous + (1 - alpha) * current)`, clamped to 0..=255.
/// `alpha` outside [0, 1] is clamped first.
pub fn blend(previous: &Frame, current: &Frame, alpha: f32) -> Result<Frame, LoopError> {
    if previous.dimensions() != current.dimensions() {
        return Err(LoopError::DimensionMismatch {
            previous: previous.dimensions(),
            current: current.dimensions(),
        });
    }

    let a = alpha.clamp(0.0, 1.0);
    let (w, h) = previous.dimensions();

    // Exact ends: no float error can leak through at alpha 0 or 1.
    if a >= 1.0 {
        return Ok(previous.clone());
    }
    if a <= 0.0 {
        return Ok(current.clone());
    }

    let inv = 1.0 - a;
    let raw: Vec<u8> = previous
        .as_raw()
        .iter()
        .zip(current.as_raw())
        .map(|(&p, &c)| (a * p as f32 + inv * c as f32).round().clamp(0.0, 255.0) as u8)
        .collect();

    // Same length as both inputs, so the buffer always fits.
    let image = RgbImage::from_raw(w, h, raw).ok_or(LoopError::DimensionMismatch {
        previous: previous.dimensions(),
        current: current.dimensions(),
    })?;
    Ok(Frame::new(image))
}
