// Periodic reseeding. Blending alone settles into a still image; bumping the
// seed every few frames gives the model fresh noise to work from.

/// Completed frames between seed bumps.
pub const DEFAULT_RESEED_EVERY: u64 = 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SeedScheduler {
    cadence: u64,
    increment: u64,
}

impl Default for SeedScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_RESEED_EVERY)
    }
}

impl SeedScheduler {
    /// A cadence of 0 disables reseeding.
    pub fn new(cadence: u64) -> Self {
        Self { cadence, increment: 1 }
    }

    pub fn cadence(&self) -> u64 {
        self.cadence
    }

    /// `current + 1` when `frame_count` is a positive multiple of the cadence.
    pub fn advance(&self, frame_count: u64, current: u64) -> u64 {
        if self.cadence > 0 && frame_count > 0 && frame_count % self.cadence == 0 {
            current.saturating_add(self.increment)
        } else {
            current
        }
    }
}
