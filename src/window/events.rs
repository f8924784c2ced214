//! Background decoding of a window's event file
//!
//! One worker thread per stream reads frames, folds expansions, and pushes
//! logical events into a bounded queue. A full queue blocks the worker,
//! which in turn leaves the editor to buffer further events. Any read or
//! decode failure ends the stream: the queue is closed and consumers see
//! end-of-stream.

use std::io::BufReader;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};

use crate::error::{AcmeError, Result};
use crate::fs::{self, Handle, HandleIo};
use crate::protocol::{next_logical_event, ChordedArgument, Event, EventReader};

/// Queue capacity used by [`crate::Window::events`].
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// How long `close` waits for the worker after closing the handle.
const WORKER_EXIT_TIMEOUT: Duration = Duration::from_secs(2);

/// Lifecycle of an [`EventStream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Open,
    Closing,
    Closed,
}

/// Ordered stream of logical events from one window.
pub struct EventStream<H: Handle> {
    path: String,
    handle: Option<Arc<H>>,
    rx: Receiver<Event>,
    worker: Option<JoinHandle<()>>,
    /// Disconnects when the worker exits.
    done: Receiver<()>,
    closing: Arc<AtomicBool>,
    state: StreamState,
}

impl<H: Handle> EventStream<H> {
    /// Takes ownership of an open event handle and starts decoding it.
    pub fn start(path: impl Into<String>, handle: H, capacity: usize) -> Result<Self> {
        let path = path.into();
        if capacity == 0 {
            fs::close_quietly(&handle, &path);
            return Err(AcmeError::CallerMisuse("event queue capacity must be at least 1".into()));
        }

        let handle = Arc::new(handle);
        let closing = Arc::new(AtomicBool::new(false));
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        let (done_tx, done) = crossbeam_channel::bounded::<()>(0);

        let worker_handle = handle.clone();
        let worker_closing = closing.clone();
        let worker_path = path.clone();
        let spawned = thread::Builder::new()
            .name(format!("acme-events:{path}"))
            .spawn(move || {
                let _done = done_tx;
                decode_loop(worker_handle.as_ref(), &worker_path, &worker_closing, tx)
            });

        let worker = match spawned {
            Ok(worker) => worker,
            Err(e) => {
                fs::close_quietly(handle.as_ref(), &path);
                return Err(AcmeError::transport(path, e));
            }
        };

        tracing::info!("Event stream started on {} (queue capacity {})", path, capacity);
        Ok(Self {
            path,
            handle: Some(handle),
            rx,
            worker: Some(worker),
            done,
            closing,
            state: StreamState::Open,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Blocks until the next event arrives. `None` once the stream has
    /// ended, whether by close, end of file, or a decode failure.
    pub fn next_event(&self) -> Option<Event> {
        self.rx.recv().ok()
    }

    /// Returns an event only if one is already queued.
    pub fn try_next_event(&self) -> Option<Event> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Like [`next_event`](Self::next_event) but gives up after `timeout`.
    pub fn next_event_timeout(&self, timeout: Duration) -> Option<Event> {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Blocking iterator over the remaining events.
    pub fn iter(&self) -> crossbeam_channel::Iter<'_, Event> {
        self.rx.iter()
    }

    /// The underlying queue, for use with `crossbeam_channel::select!`.
    pub fn receiver(&self) -> &Receiver<Event> {
        &self.rx
    }

    /// Pulls the two events that follow a chorded command.
    pub fn read_chorded_argument(&self) -> Result<ChordedArgument> {
        let text = self.next_event().ok_or_else(|| {
            AcmeError::ProtocolDesync("event stream ended before chorded argument".into())
        })?;
        let origin = self.next_event().ok_or_else(|| {
            AcmeError::ProtocolDesync("event stream ended before chorded argument origin".into())
        })?;
        Ok(ChordedArgument::from_frames(text, origin))
    }

    /// Hands a builtin-executable event back so the editor performs its
    /// default action. Anything else is rejected without writing.
    pub fn write_back(&self, event: &Event) -> Result<()> {
        let handle = match (&self.handle, self.state) {
            (Some(handle), StreamState::Open) => handle,
            _ => return Err(AcmeError::CallerMisuse(format!("{} is closed", self.path))),
        };
        let frame = event.write_back_frame()?;
        tracing::debug!("Writing back {} to {}", event, self.path);
        fs::write_all(handle.as_ref(), &self.path, &frame)
    }

    /// Closes the event file and waits for the worker to exit, then drops
    /// the stream's share of the handle. Events still queued are discarded.
    /// A worker that does not stop in time is left detached. Closing an
    /// already closed stream is reported as misuse.
    pub fn close(&mut self) -> Result<()> {
        if self.state != StreamState::Open {
            return Err(AcmeError::CallerMisuse(format!("{} already closed", self.path)));
        }
        self.state = StreamState::Closing;
        self.closing.store(true, Ordering::Release);

        let result = match self.handle.take() {
            Some(handle) => handle
                .close()
                .map_err(|e| AcmeError::transport(self.path.clone(), e)),
            None => Ok(()),
        };

        // A worker blocked on a full queue is released by disconnecting it.
        let (_, disconnected) = crossbeam_channel::bounded(0);
        drop(std::mem::replace(&mut self.rx, disconnected));

        match (&result, self.worker.take()) {
            (Ok(()), Some(worker)) => match self.done.recv_timeout(WORKER_EXIT_TIMEOUT) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    if worker.join().is_err() {
                        tracing::error!("Event worker for {} panicked", self.path);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    tracing::warn!(
                        "Event worker for {} still blocked after {:?}, leaving it detached",
                        self.path,
                        WORKER_EXIT_TIMEOUT
                    );
                }
            },
            (Err(e), Some(_detached)) => {
                tracing::warn!("Leaving event worker for {} detached: {}", self.path, e);
            }
            (_, None) => {}
        }

        self.state = StreamState::Closed;
        tracing::info!("Event stream on {} closed", self.path);
        result
    }
}

impl<H: Handle> Drop for EventStream<H> {
    fn drop(&mut self) {
        if self.state == StreamState::Open {
            self.closing.store(true, Ordering::Release);
            if let Some(handle) = self.handle.take() {
                fs::close_quietly(handle.as_ref(), &self.path);
            }
        }
    }
}

fn decode_loop<H: Handle>(handle: &H, path: &str, closing: &AtomicBool, tx: Sender<Event>) {
    let mut reader = EventReader::new(BufReader::new(HandleIo::new(handle)));
    loop {
        match next_logical_event(&mut reader) {
            Ok(Some(event)) => {
                if !event.origin.is_known() || !event.kind.is_known() {
                    tracing::warn!("Unrecognised event codes on {}: {}", path, event);
                }
                tracing::trace!("{}: {}", path, event);
                if tx.send(event).is_err() {
                    tracing::debug!("Event consumer for {} went away", path);
                    break;
                }
            }
            Ok(None) => {
                tracing::debug!("{} reached end of file", path);
                break;
            }
            Err(_) if closing.load(Ordering::Acquire) => break,
            Err(AcmeError::ProtocolDesync(reason)) => {
                tracing::error!("Event stream on {} lost framing: {}", path, reason);
                break;
            }
            Err(e) => {
                tracing::warn!("Failed to read {}: {}", path, e);
                break;
            }
        }
    }
    tracing::debug!(
        "Shutting down event worker for {} after {} frames",
        path,
        reader.frames_read()
    );
}
