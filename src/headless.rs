// Windowless driver: runs the frame loop on the calling thread and lets `PngSink`
// put every frame on disk. Ends after a fixed number of frames.

use std::thread;
use std::time::Instant;

use rand::Rng;
use tracing::{debug, info, warn};

use crate::backend::InferenceBackend;
use crate::error::AppError;
use crate::frame_loop::{FrameLoop, TickOutcome};
use crate::sink::PngSink;

/// Write failures in a row before the run gives up on the output directory.
pub const MAX_WRITE_FAILURES: u32 = 3;

/// Start the loop and tick it until `frames` frames were shown, then stop it.
pub fn run<B, R>(frame_loop: &mut FrameLoop<B, PngSink, R>, frames: u64) -> Result<(), AppError>
where
    B: InferenceBackend,
    R: Rng,
{
    frame_loop.start(Instant::now())?;
    let result = drive(frame_loop, frames);
    frame_loop.stop();

    info!(
        shown = frame_loop.sink().shown(),
        written = frame_loop.sink().written(),
        frame_count = frame_loop.state().frame_count,
        "done"
    );
    result
}

fn drive<B, R>(frame_loop: &mut FrameLoop<B, PngSink, R>, frames: u64) -> Result<(), AppError>
where
    B: InferenceBackend,
    R: Rng,
{
    while frame_loop.sink().shown() < frames {
        let Some(due) = frame_loop.next_due() else {
            warn!("loop went idle before reaching the frame target");
            break;
        };
        let wait = due.saturating_duration_since(Instant::now());
        if !wait.is_zero() {
            thread::sleep(wait);
        }
        if let Some(TickOutcome::Blended { frame_count, seed }) = frame_loop.poll(Instant::now())? {
            debug!(frame_count, seed, "tick");
        }

        let sink = frame_loop.sink();
        if sink.failed_in_a_row() >= MAX_WRITE_FAILURES {
            return Err(AppError::Output {
                dir: sink.dir().to_path_buf(),
                failures: sink.failed_in_a_row(),
                last: sink.last_error().unwrap_or("unknown").to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BackendError, LoopError};
    use crate::frame_loop::LoopConfig;
    use crate::frame_loop::tests::ScriptedBackend;
    use crate::params::SharedParams;
    use crate::perturb::{DEFAULT_JITTER, PerturbationEngine};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    type PngLoop = FrameLoop<ScriptedBackend, PngSink, StdRng>;

    fn scratch_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("dream-loop-headless-{name}-{}", std::process::id()))
    }

    fn png_loop(backend: ScriptedBackend, dir: &Path) -> PngLoop {
        let sink = PngSink::new(dir).unwrap();
        let perturb = PerturbationEngine::new(StdRng::seed_from_u64(3), DEFAULT_JITTER);
        let config = LoopConfig { tick_delay: Duration::ZERO, blank_size: 4, ..LoopConfig::default() };
        FrameLoop::new(backend, sink, perturb, SharedParams::default(), config)
    }

    #[test]
    fn writes_exactly_the_requested_frames() {
        let dir = scratch_dir("count");
        let backend = ScriptedBackend::default();
        let mut lp = png_loop(backend.clone(), &dir);

        run(&mut lp, 5).unwrap();

        assert_eq!(lp.sink().written(), 5);
        assert_eq!(backend.calls.lock().unwrap().len(), 5);
        assert!(dir.join("frame_00004.png").exists());
        assert!(!dir.join("frame_00005.png").exists());
        assert!(!lp.is_running());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn fatal_backend_error_ends_the_run_early() {
        let dir = scratch_dir("fatal");
        let backend = ScriptedBackend::default();
        backend.fail_on.lock().unwrap().push((2, BackendError::fatal("weights gone")));
        let mut lp = png_loop(backend.clone(), &dir);

        let err = run(&mut lp, 10).unwrap_err();

        assert!(matches!(err, AppError::Loop(LoopError::Backend(ref e)) if e.is_fatal()));
        assert_eq!(lp.sink().written(), 2);
        assert!(!lp.is_running());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn unwritable_output_ends_the_run() {
        let dir = scratch_dir("gone");
        let backend = ScriptedBackend::default();
        let mut lp = png_loop(backend.clone(), &dir);
        std::fs::remove_dir_all(&dir).unwrap();

        let err = run(&mut lp, 50).unwrap_err();

        match err {
            AppError::Output { dir: d, failures, .. } => {
                assert_eq!(d, dir);
                assert_eq!(failures, MAX_WRITE_FAILURES);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(lp.sink().written(), 0);
        assert_eq!(backend.calls.lock().unwrap().len(), MAX_WRITE_FAILURES as usize);
        assert!(!lp.is_running());
    }

    #[test]
    fn zero_frames_is_a_no_op() {
        let dir = scratch_dir("zero");
        let backend = ScriptedBackend::default();
        let mut lp = png_loop(backend.clone(), &dir);

        run(&mut lp, 0).unwrap();

        assert!(backend.calls.lock().unwrap().is_empty());
        assert!(!lp.is_running());
        std::fs::remove_dir_all(&dir).ok();
    }
}
