//! Scripted in-memory editor used by the unit tests.
//!
//! Serves the same paths the real editor does, records every open and
//! write, and emulates just enough of the addressing rules (`addr=dot`,
//! `0,.-`, `0,.`, `#q0,#q1`) for line-number and selection queries.

use std::collections::{BTreeMap, VecDeque};
use std::io::{self, Cursor, Read};
#[cfg(unix)]
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use super::{FileSystemClient, Handle, Metadata, OpenMode};
use crate::protocol::address::{encode_window_params, WindowParams, ADDRESS_FIELD_WIDTH};

#[derive(Debug, Clone)]
pub(crate) struct FakeWindow {
    id: u32,
    tag: String,
    body: String,
    dot: (usize, usize),
    addr: (usize, usize),
    dir: bool,
    modified: bool,
    raw_addr: Option<Vec<u8>>,
    events: Arc<EventPipe>,
}

impl FakeWindow {
    pub(crate) fn new(id: u32) -> Self {
        Self {
            id,
            tag: String::new(),
            body: String::new(),
            dot: (0, 0),
            addr: (0, 0),
            dir: false,
            modified: false,
            raw_addr: None,
            events: Arc::new(EventPipe::default()),
        }
    }

    pub(crate) fn tag(mut self, tag: &str) -> Self {
        self.tag = tag.to_string();
        self
    }

    pub(crate) fn body(mut self, body: &str) -> Self {
        self.body = body.to_string();
        self
    }

    pub(crate) fn dot(mut self, q0: usize, q1: usize) -> Self {
        self.dot = (q0, q1);
        self
    }

    pub(crate) fn dir(mut self, dir: bool) -> Self {
        self.dir = dir;
        self
    }

    pub(crate) fn modified(mut self, modified: bool) -> Self {
        self.modified = modified;
        self
    }

    /// Serve these exact bytes from the addr file instead of the address.
    pub(crate) fn raw_addr(mut self, bytes: &[u8]) -> Self {
        self.raw_addr = Some(bytes.to_vec());
        self
    }

    fn params(&self) -> WindowParams {
        WindowParams {
            id: self.id,
            tag_chars: self.tag.chars().count(),
            body_chars: self.body.chars().count(),
            dir: self.dir,
            modified: self.modified,
        }
    }

    fn ctl_record(&self) -> Vec<u8> {
        let mut out = encode_window_params(&self.params());
        out.extend_from_slice(self.tag.as_bytes());
        out
    }

    fn addr_record(&self) -> Vec<u8> {
        if let Some(raw) = &self.raw_addr {
            return raw.clone();
        }
        format!(
            "{:>w$}{:>w$}",
            self.addr.0,
            self.addr.1,
            w = ADDRESS_FIELD_WIDTH
        )
        .into_bytes()
    }

    fn line_start(&self, q: usize) -> usize {
        self.body
            .chars()
            .take(q)
            .enumerate()
            .filter(|(_, c)| *c == '\n')
            .map(|(i, _)| i + 1)
            .last()
            .unwrap_or(0)
    }

    fn slice(&self, q0: usize, q1: usize) -> String {
        self.body.chars().skip(q0).take(q1.saturating_sub(q0)).collect()
    }

    fn eval_addr(&mut self, expr: &str) -> io::Result<()> {
        let dot = self.addr;
        self.addr = match expr.trim() {
            "0,.-" => (0, self.line_start(dot.0)),
            "0,." => (0, dot.1),
            "." => dot,
            other => {
                let parsed = other.split_once(',').and_then(|(a, b)| {
                    let a = a.strip_prefix('#')?.parse().ok()?;
                    let b = b.strip_prefix('#')?.parse().ok()?;
                    Some((a, b))
                });
                parsed.ok_or_else(|| {
                    io::Error::new(io::ErrorKind::InvalidInput, format!("bad address: {other}"))
                })?
            }
        };
        Ok(())
    }
}

/// Blocking byte pipe standing in for a window's event file.
#[derive(Debug, Default)]
pub(crate) struct EventPipe {
    inner: Mutex<PipeState>,
    ready: Condvar,
}

#[derive(Debug, Default)]
struct PipeState {
    data: VecDeque<u8>,
    eof: bool,
}

impl EventPipe {
    fn push(&self, bytes: &[u8]) {
        let mut st = self.inner.lock().unwrap();
        st.data.extend(bytes.iter().copied());
        self.ready.notify_all();
    }

    fn finish(&self) {
        self.inner.lock().unwrap().eof = true;
        self.ready.notify_all();
    }

    fn read(&self, buf: &mut [u8], closed: &AtomicBool) -> io::Result<usize> {
        let mut st = self.inner.lock().unwrap();
        loop {
            if closed.load(Ordering::Acquire) {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "event file closed"));
            }
            if !st.data.is_empty() {
                let n = buf.len().min(st.data.len());
                for (slot, byte) in buf.iter_mut().zip(st.data.drain(..n)) {
                    *slot = byte;
                }
                return Ok(n);
            }
            if st.eof {
                return Ok(0);
            }
            st = self.ready.wait(st).unwrap();
        }
    }

    fn wake(&self) {
        let _guard = self.inner.lock().unwrap();
        self.ready.notify_all();
    }
}

#[derive(Debug, Default)]
struct State {
    windows: BTreeMap<u32, FakeWindow>,
    opens: Vec<String>,
    writes: Vec<(String, Vec<u8>)>,
    cons: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FakeAcme {
    state: Arc<Mutex<State>>,
}

impl FakeAcme {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub(crate) fn add_window(&self, window: FakeWindow) {
        self.lock().windows.insert(window.id, window);
    }

    /// Queue raw bytes on a window's event file.
    pub(crate) fn feed_events(&self, id: u32, bytes: &[u8]) {
        let pipe = self.lock().windows[&id].events.clone();
        pipe.push(bytes);
    }

    /// Make the event file report end of file once drained.
    pub(crate) fn end_events(&self, id: u32) {
        let pipe = self.lock().windows[&id].events.clone();
        pipe.finish();
    }

    pub(crate) fn opens(&self) -> Vec<String> {
        self.lock().opens.clone()
    }

    pub(crate) fn open_count(&self, path: &str) -> usize {
        self.lock().opens.iter().filter(|p| *p == path).count()
    }

    /// Every write to `path`, one entry per write call.
    pub(crate) fn writes_to(&self, path: &str) -> Vec<String> {
        self.lock()
            .writes
            .iter()
            .filter(|(p, _)| p == path)
            .map(|(_, b)| String::from_utf8_lossy(b).into_owned())
            .collect()
    }

    pub(crate) fn window_tag(&self, id: u32) -> String {
        self.lock().windows[&id].tag.clone()
    }

    pub(crate) fn window_body(&self, id: u32) -> String {
        self.lock().windows[&id].body.clone()
    }

    pub(crate) fn cons(&self) -> String {
        String::from_utf8_lossy(&self.lock().cons).into_owned()
    }
}

/// Creates a named pipe, standing in for a mounted event file.
#[cfg(unix)]
pub(crate) fn mkfifo(path: &Path) {
    use std::os::unix::ffi::OsStrExt;
    let c_path = std::ffi::CString::new(path.as_os_str().as_bytes()).unwrap();
    let rc = unsafe { libc::mkfifo(c_path.as_ptr(), 0o600) };
    assert_eq!(rc, 0, "mkfifo {}: {}", path.display(), io::Error::last_os_error());
}

fn not_found(path: &str) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("{path}: file does not exist"))
}

#[derive(Debug)]
enum Kind {
    Snapshot,
    Ctl(u32),
    Addr(u32),
    Tag(u32),
    Body(u32),
    Event(Arc<EventPipe>),
    Cons,
}

#[derive(Debug)]
pub(crate) struct FakeHandle {
    path: String,
    kind: Kind,
    contents: Mutex<Cursor<Vec<u8>>>,
    state: Arc<Mutex<State>>,
    closed: AtomicBool,
}

impl FakeHandle {
    fn check_open(&self) -> io::Result<()> {
        if self.closed.load(Ordering::Acquire) {
            let msg = format!("{} closed", self.path);
            return Err(io::Error::new(io::ErrorKind::NotConnected, msg));
        }
        Ok(())
    }
}

impl FileSystemClient for FakeAcme {
    type Handle = FakeHandle;

    fn open(&self, path: &str, _mode: OpenMode) -> io::Result<FakeHandle> {
        let mut st = self.lock();
        st.opens.push(path.to_string());

        let (kind, contents) = match path {
            "/index" => {
                let mut out = Vec::new();
                for w in st.windows.values() {
                    out.extend(w.ctl_record());
                    out.push(b'\n');
                }
                (Kind::Snapshot, out)
            }
            "/cons" => (Kind::Cons, Vec::new()),
            "/new/ctl" => {
                let id = st.windows.keys().next_back().map_or(1, |k| k + 1);
                let window = FakeWindow::new(id);
                let record = window.ctl_record();
                st.windows.insert(id, window);
                (Kind::Ctl(id), record)
            }
            _ => {
                let trimmed = path.trim_start_matches('/');
                let (id, file) = trimmed.split_once('/').ok_or_else(|| not_found(path))?;
                let id: u32 = id.parse().map_err(|_| not_found(path))?;
                let w = st.windows.get(&id).ok_or_else(|| not_found(path))?;
                match file {
                    "ctl" => (Kind::Ctl(id), w.ctl_record()),
                    "addr" => (Kind::Addr(id), Vec::new()),
                    "tag" => (Kind::Tag(id), w.tag.clone().into_bytes()),
                    "body" => (Kind::Body(id), w.body.clone().into_bytes()),
                    "xdata" => (Kind::Snapshot, w.slice(w.addr.0, w.addr.1).into_bytes()),
                    "event" => (Kind::Event(w.events.clone()), Vec::new()),
                    _ => return Err(not_found(path)),
                }
            }
        };

        Ok(FakeHandle {
            path: path.to_string(),
            kind,
            contents: Mutex::new(Cursor::new(contents)),
            state: self.state.clone(),
            closed: AtomicBool::new(false),
        })
    }

    fn stat(&self, path: &str) -> io::Result<Metadata> {
        let st = self.lock();
        let id: u32 = path.trim_start_matches('/').parse().map_err(|_| not_found(path))?;
        if !st.windows.contains_key(&id) {
            return Err(not_found(path));
        }
        Ok(Metadata {
            name: id.to_string(),
            is_dir: true,
            len: 0,
        })
    }
}

impl Handle for FakeHandle {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.check_open()?;
        if let Kind::Event(pipe) = &self.kind {
            return pipe.read(buf, &self.closed);
        }
        if let Kind::Addr(id) = self.kind {
            let record = self.state.lock().unwrap().windows[&id].addr_record();
            let mut cursor = self.contents.lock().unwrap();
            let pos = cursor.position();
            *cursor = Cursor::new(record);
            cursor.set_position(pos);
            return cursor.read(buf);
        }
        self.contents.lock().unwrap().read(buf)
    }

    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        self.check_open()?;
        let mut st = self.state.lock().unwrap();
        st.writes.push((self.path.clone(), buf.to_vec()));
        let text = String::from_utf8_lossy(buf).into_owned();
        match self.kind {
            Kind::Ctl(id) => {
                let w = st.windows.get_mut(&id).ok_or_else(|| not_found(&self.path))?;
                for line in text.lines() {
                    match line {
                        "addr=dot" => w.addr = w.dot,
                        "dirty" => w.modified = true,
                        "clean" => w.modified = false,
                        _ => {}
                    }
                }
            }
            Kind::Addr(id) => {
                let w = st.windows.get_mut(&id).ok_or_else(|| not_found(&self.path))?;
                w.eval_addr(&text)?;
            }
            Kind::Tag(id) => {
                let w = st.windows.get_mut(&id).ok_or_else(|| not_found(&self.path))?;
                w.tag.push_str(&text);
            }
            Kind::Body(id) => {
                let w = st.windows.get_mut(&id).ok_or_else(|| not_found(&self.path))?;
                w.body.push_str(&text);
            }
            Kind::Cons => st.cons.extend_from_slice(buf),
            Kind::Event(_) | Kind::Snapshot => {}
        }
        Ok(buf.len())
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        self.check_open()?;
        let record = match self.kind {
            Kind::Addr(id) => self.state.lock().unwrap().windows[&id].addr_record(),
            _ => self.contents.lock().unwrap().get_ref().clone(),
        };
        let start = (offset as usize).min(record.len());
        let n = buf.len().min(record.len() - start);
        buf[..n].copy_from_slice(&record[start..start + n]);
        Ok(n)
    }

    fn close(&self) -> io::Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            let msg = format!("{} already closed", self.path);
            return Err(io::Error::new(io::ErrorKind::NotConnected, msg));
        }
        if let Kind::Event(pipe) = &self.kind {
            pipe.wake();
        }
        Ok(())
    }
}
