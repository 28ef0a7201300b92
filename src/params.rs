// Hand-off point for the live knobs: the window thread writes, the sequencer
// reads a whole copy per tick and writes the advanced seed back.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::types::GenerationParameters;

#[derive(Clone, Default)]
pub struct SharedParams {
    inner: Arc<Mutex<GenerationParameters>>,
}

impl SharedParams {
    pub fn new(params: GenerationParameters) -> Self {
        Self { inner: Arc::new(Mutex::new(params)) }
    }

    // A panicking writer cannot leave a half-written struct behind (every
    // field is assigned whole), so a poisoned lock is still safe to read.
    fn lock(&self) -> MutexGuard<'_, GenerationParameters> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Full copy of the current values, taken under the lock.
    pub fn snapshot(&self) -> GenerationParameters {
        self.lock().clone()
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut GenerationParameters) -> R) -> R {
        f(&mut self.lock())
    }
}
