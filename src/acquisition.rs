//! Background read-parse-enqueue loop.
//!
//! The loop runs on its own thread with a cloned transport handle, so command
//! writes from the caller never wait on it. It stops only when its cancel flag
//! is raised; errors inside one iteration are logged and the next tick proceeds.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::Sender;
use tracing::{debug, error, trace, warn};

use crate::error::{DecodeError, Result};
use crate::frame::FrameReader;
use crate::parser::{parse_frame, QueueItem};
use crate::transport::Transport;

/// Default pause between two polls of the transport.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Stopped,
    Running,
}

#[derive(Debug, Clone)]
pub struct LoopOptions {
    pub poll_interval: Duration,
    /// Emit unterminated text as a raw item at the end of every read cycle.
    pub flush_leftovers: bool,
}

impl Default for LoopOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            flush_leftovers: true,
        }
    }
}

/// Handle to a running acquisition thread.
pub struct AcquisitionLoop {
    cancel_flag: Arc<AtomicBool>,
    task_handle: Option<JoinHandle<()>>,
}

impl AcquisitionLoop {
    /// Starts reading from `transport`, sending every decoded item to `sender`.
    pub fn spawn(
        transport: Box<dyn Transport>,
        sender: Sender<QueueItem>,
        options: LoopOptions,
    ) -> Result<Self> {
        let cancel_flag = Arc::new(AtomicBool::new(false));
        let flag = cancel_flag.clone();
        let handle = thread::Builder::new()
            .name("fc-acquisition".to_string())
            .spawn(move || run_loop(transport, sender, options, flag))?;

        Ok(Self {
            cancel_flag,
            task_handle: Some(handle),
        })
    }

    pub fn state(&self) -> LoopState {
        match &self.task_handle {
            Some(handle) if !handle.is_finished() => LoopState::Running,
            _ => LoopState::Stopped,
        }
    }

    /// Raises the cancel flag and waits for the current iteration to finish.
    ///
    /// Returns within one poll interval plus the duration of one read.
    /// Calling it again is a no-op.
    pub fn stop(&mut self) {
        self.cancel_flag.store(true, Ordering::Release);
        if let Some(handle) = self.task_handle.take() {
            if handle.join().is_err() {
                error!("Acquisition thread panicked");
            }
            debug!("Acquisition loop joined");
        }
    }
}

impl Drop for AcquisitionLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_loop(
    mut transport: Box<dyn Transport>,
    sender: Sender<QueueItem>,
    options: LoopOptions,
    cancel_flag: Arc<AtomicBool>,
) {
    let mut reader = FrameReader::new();
    debug!(poll_interval = ?options.poll_interval, "Acquisition loop started");

    while !cancel_flag.load(Ordering::Acquire) {
        match poll_once(transport.as_mut(), &mut reader, options.flush_leftovers) {
            Ok(items) => {
                for item in items {
                    if sender.send(item).is_err() {
                        warn!("Queue receiver dropped, stopping acquisition");
                        return;
                    }
                }
            }
            Err(e) => warn!(error = %e, "Error in read loop"),
        }
        thread::sleep(options.poll_interval);
    }

    debug!("Acquisition loop stopped");
}

/// One read cycle: read everything currently available and decode it.
///
/// Returns immediately with no items when nothing is waiting.
pub fn poll_once(
    transport: &mut dyn Transport,
    reader: &mut FrameReader,
    flush_leftovers: bool,
) -> Result<Vec<QueueItem>> {
    let available = transport.bytes_to_read()?;
    if available == 0 {
        return Ok(Vec::new());
    }

    let mut buf = vec![0u8; available];
    let read = transport.read(&mut buf)?;
    trace!(bytes = read, "Read from transport");
    Ok(process_chunk(reader, &buf[..read], flush_leftovers)?)
}

/// Frames, parses and optionally flushes one chunk of received bytes.
pub fn process_chunk(
    reader: &mut FrameReader,
    bytes: &[u8],
    flush_leftovers: bool,
) -> std::result::Result<Vec<QueueItem>, DecodeError> {
    let frames = reader.push(bytes)?;
    let mut items: Vec<QueueItem> = frames
        .iter()
        .filter_map(|frame| parse_frame(frame.as_str()))
        .collect();
    if flush_leftovers {
        items.extend(reader.flush_leftover());
    }
    Ok(items)
}
