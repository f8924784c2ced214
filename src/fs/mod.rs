//! Transport capability for the editor's synthetic file tree
//!
//! The editor serves every window as a handful of files (`ctl`, `addr`,
//! `xdata`, `event`, `tag`, `body`) plus a few global ones (`/new/ctl`,
//! `/index`, `/cons`). This module only describes the operations the rest
//! of the crate needs from whatever serves that tree.
//!
//! # Components
//!
//! - [`FileSystemClient`] / [`Handle`] - the capability traits
//! - [`HandleIo`] - `std::io::Read`/`Write` adapter over a shared handle
//! - [`MountedFs`] - implementation over a mounted directory

mod mounted;

#[cfg(test)]
pub(crate) mod fake;

pub use mounted::{MountedFs, MountedHandle, DEFAULT_MOUNT};

use std::io;

use crate::error::{AcmeError, Result};

/// How a file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
    ReadWrite,
}

impl OpenMode {
    pub fn readable(self) -> bool {
        matches!(self, OpenMode::Read | OpenMode::ReadWrite)
    }

    pub fn writable(self) -> bool {
        matches!(self, OpenMode::Write | OpenMode::ReadWrite)
    }
}

/// Result of a `stat` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub name: String,
    pub is_dir: bool,
    pub len: u64,
}

/// One open file on the editor's file server.
///
/// Every operation takes `&self` so a handle can be shared between the
/// event-stream worker (reading) and its owner (writing back, closing).
pub trait Handle: Send + Sync + 'static {
    /// Sequential read. `Ok(0)` means end of file.
    fn read(&self, buf: &mut [u8]) -> io::Result<usize>;

    fn write(&self, buf: &[u8]) -> io::Result<usize>;

    /// Positional read that does not move the sequential offset.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize>;

    /// Releases the handle. Reads issued afterwards, and any read still
    /// blocked inside the transport, must fail.
    fn close(&self) -> io::Result<()>;
}

/// Access to the editor's file server.
pub trait FileSystemClient: Send + Sync + 'static {
    type Handle: Handle;

    fn open(&self, path: &str, mode: OpenMode) -> io::Result<Self::Handle>;

    /// Fails with [`io::ErrorKind::NotFound`] when `path` does not exist.
    fn stat(&self, path: &str) -> io::Result<Metadata>;
}

/// Adapter giving a shared [`Handle`] the `std::io` traits, so it can sit
/// under a `BufReader` or be the target of `write!`.
pub struct HandleIo<'a, H: Handle> {
    handle: &'a H,
}

impl<'a, H: Handle> HandleIo<'a, H> {
    pub fn new(handle: &'a H) -> Self {
        Self { handle }
    }
}

impl<H: Handle> io::Read for HandleIo<'_, H> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.handle.read(buf)
    }
}

impl<H: Handle> io::Write for HandleIo<'_, H> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.handle.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Opens `path`, mapping the failure to [`AcmeError::Open`].
pub(crate) fn open<C: FileSystemClient>(fs: &C, path: &str, mode: OpenMode) -> Result<C::Handle> {
    tracing::debug!("Opening {} ({:?})", path, mode);
    fs.open(path, mode).map_err(|e| AcmeError::open(path, e))
}

/// Reads a handle sequentially until end of file.
pub(crate) fn read_all<H: Handle>(handle: &H, path: &str) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    io::Read::read_to_end(&mut HandleIo::new(handle), &mut out)
        .map_err(|e| AcmeError::transport(path, e))?;
    Ok(out)
}

/// Writes all of `data`, retrying short writes.
pub(crate) fn write_all<H: Handle>(handle: &H, path: &str, data: &[u8]) -> Result<()> {
    io::Write::write_all(&mut HandleIo::new(handle), data)
        .map_err(|e| AcmeError::transport(path, e))
}

/// Closes a handle that is being discarded; failures are only logged.
pub(crate) fn close_quietly<H: Handle>(handle: &H, path: &str) {
    if let Err(e) = handle.close() {
        tracing::warn!("Failed to close {}: {}", path, e);
    }
}
