//! Editor file tree reached through a mounted directory
//!
//! Plan 9 mounts the editor at `/mnt/acme`; elsewhere a 9P FUSE bridge can
//! mount the editor's posted service at any directory. Protocol paths such
//! as `/4/event` are resolved relative to that root.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use super::{FileSystemClient, Handle, Metadata, OpenMode};

/// Conventional mount point of the editor's file tree.
pub const DEFAULT_MOUNT: &str = "/mnt/acme";

#[derive(Debug, Clone)]
pub struct MountedFs {
    root: PathBuf,
}

impl MountedFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

impl FileSystemClient for MountedFs {
    type Handle = MountedHandle;

    fn open(&self, path: &str, mode: OpenMode) -> io::Result<MountedHandle> {
        let full = self.resolve(path);
        let file = OpenOptions::new()
            .read(mode.readable())
            .write(mode.writable())
            .open(&full)?;
        Ok(MountedHandle {
            path: full,
            file,
            closed: AtomicBool::new(false),
            #[cfg(unix)]
            wake: Wake::new()?,
        })
    }

    fn stat(&self, path: &str) -> io::Result<Metadata> {
        let full = self.resolve(path);
        let meta = std::fs::metadata(&full)?;
        let name = full
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "/".to_string());
        Ok(Metadata {
            name,
            is_dir: meta.is_dir(),
            len: meta.len(),
        })
    }
}

/// Open file under a [`MountedFs`].
///
/// On unix a sequential read first waits in `poll(2)` on both the file and
/// a private wake socket, so `close` from another thread cancels it. A file
/// server that reports readiness without data can still block inside
/// `read`. The descriptor itself is released when the handle is dropped.
#[derive(Debug)]
pub struct MountedHandle {
    path: PathBuf,
    file: File,
    closed: AtomicBool,
    #[cfg(unix)]
    wake: Wake,
}

impl MountedHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn closed_error(&self) -> io::Error {
        io::Error::new(
            io::ErrorKind::NotConnected,
            format!("{} is closed", self.path.display()),
        )
    }

    fn check_open(&self) -> io::Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(self.closed_error());
        }
        Ok(())
    }

    /// Blocks until the file is readable or the handle is closed.
    #[cfg(unix)]
    fn wait_readable(&self) -> io::Result<()> {
        use std::os::unix::io::AsRawFd;

        loop {
            let mut fds = [
                libc::pollfd {
                    fd: self.file.as_raw_fd(),
                    events: libc::POLLIN,
                    revents: 0,
                },
                libc::pollfd {
                    fd: self.wake.watch.as_raw_fd(),
                    events: libc::POLLIN,
                    revents: 0,
                },
            ];
            let rc = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, -1) };
            if rc < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(err);
            }
            if fds[1].revents != 0 {
                return Err(self.closed_error());
            }
            if fds[0].revents != 0 {
                return Ok(());
            }
        }
    }

    #[cfg(not(unix))]
    fn wait_readable(&self) -> io::Result<()> {
        Ok(())
    }
}

impl Handle for MountedHandle {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.check_open()?;
        self.wait_readable()?;
        let n = (&self.file).read(buf)?;
        // Closed while the read was in flight.
        self.check_open()?;
        Ok(n)
    }

    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        self.check_open()?;
        (&self.file).write(buf)
    }

    #[cfg(unix)]
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        use std::os::unix::fs::FileExt;
        self.check_open()?;
        self.file.read_at(buf, offset)
    }

    #[cfg(windows)]
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        use std::os::windows::fs::FileExt;
        self.check_open()?;
        self.file.seek_read(buf, offset)
    }

    fn close(&self) -> io::Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                format!("{} already closed", self.path.display()),
            ));
        }
        #[cfg(unix)]
        self.wake.fire();
        Ok(())
    }
}

/// Socket pair whose shutdown wakes every reader polling `watch`.
#[cfg(unix)]
#[derive(Debug)]
struct Wake {
    watch: std::os::unix::net::UnixStream,
    signal: std::os::unix::net::UnixStream,
}

#[cfg(unix)]
impl Wake {
    fn new() -> io::Result<Self> {
        let (watch, signal) = std::os::unix::net::UnixStream::pair()?;
        Ok(Self { watch, signal })
    }

    fn fire(&self) {
        if let Err(e) = self.signal.shutdown(std::net::Shutdown::Both) {
            tracing::debug!("Failed to signal close: {}", e);
        }
    }
}
