// Where finished frames go. The loop never waits on a sink.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, SyncSender, TrySendError, sync_channel};

use crate::error::AppError;
use crate::types::Frame;

pub trait DisplaySink: Send {
    fn show(&mut self, frame: &Frame);
}

/// Hands frames to the window thread over a one-slot channel.
/// If the window hasn't picked up the last frame yet, the new one is dropped.
pub struct ChannelSink {
    tx: SyncSender<Frame>,
}

impl ChannelSink {
    pub fn new() -> (Self, Receiver<Frame>) {
        let (tx, rx) = sync_channel(1);
        (Self { tx }, rx)
    }
}

impl DisplaySink for ChannelSink {
    fn show(&mut self, frame: &Frame) {
        match self.tx.try_send(frame.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => tracing::debug!("window busy, frame dropped"),
            Err(TrySendError::Disconnected(_)) => tracing::debug!("window gone, frame dropped"),
        }
    }
}

/// Writes every shown frame as `frame_00000.png`, `frame_00001.png`, ... under `dir`.
/// A failed write is logged and counted; the caller decides when to give up.
pub struct PngSink {
    dir: PathBuf,
    next_index: u64,
    written: u64,
    shown: u64,
    failed_in_a_row: u32,
    last_error: Option<String>,
}

impl PngSink {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, AppError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| AppError::Io { path: dir.clone(), source })?;
        Ok(Self { dir, next_index: 0, written: 0, shown: 0, failed_in_a_row: 0, last_error: None })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Frames successfully written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Frames handed to `show`, written or not.
    pub fn shown(&self) -> u64 {
        self.shown
    }

    /// Write failures since the last successful write.
    pub fn failed_in_a_row(&self) -> u32 {
        self.failed_in_a_row
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn save(&mut self, frame: &Frame) -> Result<PathBuf, AppError> {
        let path = self.dir.join(format!("frame_{:05}.png", self.next_index));
        self.next_index += 1;
        frame.as_image().save(&path)?;
        self.written += 1;
        Ok(path)
    }
}

impl DisplaySink for PngSink {
    fn show(&mut self, frame: &Frame) {
        self.shown += 1;
        match self.save(frame) {
            Ok(path) => {
                self.failed_in_a_row = 0;
                self.last_error = None;
                tracing::debug!(path = %path.display(), "frame written");
            }
            Err(e) => {
                self.failed_in_a_row += 1;
                tracing::warn!(error = %e, failed_in_a_row = self.failed_in_a_row, "could not write frame");
                self.last_error = Some(e.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("dream-loop-{name}-{}", std::process::id()))
    }

    #[test]
    fn channel_sink_never_blocks() {
        let (mut sink, rx) = ChannelSink::new();
        let f = Frame::solid(2, 2, [1, 2, 3]);
        sink.show(&f);
        sink.show(&Frame::solid(2, 2, [9, 9, 9])); // slot full: dropped
        assert_eq!(rx.try_recv().unwrap(), f);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn channel_sink_survives_a_closed_window() {
        let (mut sink, rx) = ChannelSink::new();
        drop(rx);
        sink.show(&Frame::solid(1, 1, [0, 0, 0]));
    }

    #[test]
    fn png_sink_numbers_files() {
        let dir = scratch_dir("png");
        let mut sink = PngSink::new(&dir).unwrap();
        sink.show(&Frame::solid(3, 3, [255, 0, 0]));
        sink.show(&Frame::solid(3, 3, [0, 255, 0]));
        assert_eq!(sink.written(), 2);

        let back = image::open(dir.join("frame_00001.png")).unwrap().to_rgb8();
        assert_eq!(back.get_pixel(1, 1).0, [0, 255, 0]);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn png_sink_counts_failed_writes() {
        let dir = scratch_dir("png-gone");
        let mut sink = PngSink::new(&dir).unwrap();
        std::fs::remove_dir_all(&dir).unwrap();

        sink.show(&Frame::solid(2, 2, [1, 1, 1]));
        sink.show(&Frame::solid(2, 2, [1, 1, 1]));
        assert_eq!((sink.shown(), sink.written(), sink.failed_in_a_row()), (2, 0, 2));
        assert!(sink.last_error().is_some());

        std::fs::create_dir_all(&dir).unwrap();
        sink.show(&Frame::solid(2, 2, [1, 1, 1]));
        assert_eq!((sink.shown(), sink.written(), sink.failed_in_a_row()), (3, 1, 0));
        assert!(sink.last_error().is_none());
        std::fs::remove_dir_all(&dir).ok();
    }
}
