// Runs the frame loop on its own thread so the window stays responsive while the
// model works. The window thread only talks to it through `LoopHandle`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rand::Rng;

use crate::backend::InferenceBackend;
use crate::error::{AppError, LoopError};
use crate::frame_loop::FrameLoop;
use crate::params::SharedParams;
use crate::sink::DisplaySink;

// Upper bound on a single wait while idle; keeps shutdown prompt if the channel stalls.
const IDLE_WAIT: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Start,
    Stop,
    Shutdown,
}

pub struct LoopHandle {
    tx: Sender<Command>,
    running: Arc<AtomicBool>,
    params: SharedParams,
    thread: Option<JoinHandle<()>>,
}

/// Move `frame_loop` onto a sequencer thread.
pub fn spawn<B, S, R>(frame_loop: FrameLoop<B, S, R>) -> Result<LoopHandle, AppError>
where
    B: InferenceBackend + 'static,
    S: DisplaySink + 'static,
    R: Rng + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let running = frame_loop.running_flag();
    let params = frame_loop.params().clone();
    let thread = thread::Builder::new()
        .name("frame-loop".into())
        .spawn(move || run(frame_loop, rx))
        .map_err(AppError::Spawn)?;

    Ok(LoopHandle { tx, running, params, thread: Some(thread) })
}

fn run<B, S, R>(mut frame_loop: FrameLoop<B, S, R>, rx: Receiver<Command>)
where
    B: InferenceBackend,
    S: DisplaySink,
    R: Rng,
{
    loop {
        let wait = match frame_loop.next_due() {
            Some(due) => due.saturating_duration_since(Instant::now()),
            None => IDLE_WAIT,
        };

        match rx.recv_timeout(wait) {
            // The handle raised the flag when it sent Start; a stop since then lowered it.
            Ok(Command::Start) if !frame_loop.is_running() => {
                tracing::debug!("start superseded by a later stop");
            }
            Ok(Command::Start) => {
                if let Err(e) = frame_loop.start(Instant::now()) {
                    tracing::warn!(error = %e, "start ignored");
                    frame_loop.stop();
                }
            }
            Ok(Command::Stop) => frame_loop.stop(),
            Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => {
                frame_loop.stop();
                break;
            }
            Err(RecvTimeoutError::Timeout) => {}
        }

        // Fatal errors already stopped the loop; the window keeps its last frame.
        if let Err(e) = frame_loop.poll(Instant::now()) {
            tracing::error!(error = %e, "generation halted");
        }
    }
    tracing::debug!("frame loop thread exiting");
}

impl LoopHandle {
    /// Ask the sequencer to start. Fails right away if there is no prompt.
    /// `is_running` reports the request at once, before the thread picks it up.
    pub fn start(&self) -> Result<(), LoopError> {
        if !self.params.snapshot().has_prompt() {
            return Err(LoopError::EmptyPrompt);
        }
        self.running.store(true, Ordering::SeqCst);
        self.send(Command::Start);
        Ok(())
    }

    /// Takes effect before the next inference call; an in-flight one is discarded.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.send(Command::Stop);
    }

    /// Start if idle, stop if running. Returns whether generation is now requested.
    pub fn toggle(&self) -> Result<bool, LoopError> {
        if self.is_running() {
            self.stop();
            Ok(false)
        } else {
            self.start()?;
            Ok(true)
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn params(&self) -> &SharedParams {
        &self.params
    }

    /// Stop generating and wait for the thread to finish its current tick.
    pub fn shutdown(mut self) {
        self.stop_thread();
    }

    fn stop_thread(&mut self) {
        let Some(t) = self.thread.take() else { return };
        self.running.store(false, Ordering::SeqCst);
        self.send(Command::Shutdown);
        if t.join().is_err() {
            tracing::error!("frame loop thread panicked");
        }
    }

    fn send(&self, cmd: Command) {
        if self.tx.send(cmd).is_err() {
            tracing::warn!(?cmd, "frame loop thread is gone");
        }
    }
}

impl Drop for LoopHandle {
    fn drop(&mut self) {
        self.stop_thread();
    }
}
