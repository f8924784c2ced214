//! Client side of the editor's window files
//!
//! [`Acme`] is the entry point: it creates, finds, and lists windows.
//! [`Window`] wraps one window's files, opening `ctl`, `addr`, and `body`
//! on first use and keeping them for its lifetime. `xdata`, `tag`, and
//! `event` are opened fresh whenever they are needed.

pub mod events;

pub use events::{EventStream, StreamState, DEFAULT_QUEUE_CAPACITY};

use std::io::{BufRead, BufReader};
use std::sync::Arc;

use crate::error::{AcmeError, Result};
use crate::fs::{self, FileSystemClient, Handle, HandleIo, OpenMode};
use crate::protocol::{
    decode_address, decode_index_line, decode_window_params, encode_address_expr, AddressRange,
    Event, WindowInfo, WindowParams,
};

/// Address read buffer; the record is 24 bytes, the rest is slack.
const ADDR_READ_LEN: usize = 100;

/// Connection to a running editor.
pub struct Acme<C: FileSystemClient> {
    fs: Arc<C>,
    cons: Option<C::Handle>,
}

impl<C: FileSystemClient> Acme<C> {
    pub fn new(fs: Arc<C>) -> Self {
        Self { fs, cons: None }
    }

    pub fn client(&self) -> &Arc<C> {
        &self.fs
    }

    /// Creates a window. Its control handle is the one `/new/ctl` was
    /// opened as, so the editor keeps the window tied to this session.
    pub fn new_window(&self) -> Result<Window<C>> {
        let path = "/new/ctl";
        let ctl = fs::open(self.fs.as_ref(), path, OpenMode::ReadWrite)?;
        let raw = match fs::read_all(&ctl, path) {
            Ok(raw) => raw,
            Err(e) => {
                fs::close_quietly(&ctl, path);
                return Err(e);
            }
        };
        let params = match decode_window_params(&raw) {
            Ok(params) => params,
            Err(e) => {
                fs::close_quietly(&ctl, path);
                return Err(e);
            }
        };
        tracing::debug!("Created window {}", params.id);
        Ok(Window {
            fs: self.fs.clone(),
            id: params.id.to_string(),
            ctl: Some(ctl),
            addr: None,
            body: None,
        })
    }

    /// Attaches to an existing window.
    pub fn window(&self, id: &str) -> Result<Window<C>> {
        if id.is_empty() {
            return Err(AcmeError::CallerMisuse("empty window id".into()));
        }
        let path = format!("/{id}");
        match self.fs.stat(&path) {
            Ok(_) => Ok(Window::new(self.fs.clone(), id)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AcmeError::WindowNotFound(id.to_string()))
            }
            Err(e) => Err(AcmeError::transport(path, e)),
        }
    }

    /// Every open window, as listed by the editor's index file.
    pub fn windows(&self) -> Result<Vec<WindowInfo>> {
        let path = "/index";
        let handle = fs::open(self.fs.as_ref(), path, OpenMode::Read)?;
        let raw = fs::read_all(&handle, path);
        fs::close_quietly(&handle, path);
        let raw = raw?;

        String::from_utf8_lossy(&raw)
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(decode_index_line)
            .collect()
    }

    /// Writes to the editor's `+Errors` window.
    pub fn log(&mut self, msg: &str) -> Result<()> {
        let path = "/cons";
        let cons = cached(self.fs.as_ref(), &mut self.cons, path, OpenMode::ReadWrite)?;
        fs::write_all(cons, path, msg.as_bytes())
    }
}

impl<C: FileSystemClient> Drop for Acme<C> {
    fn drop(&mut self) {
        if let Some(cons) = self.cons.take() {
            fs::close_quietly(&cons, "/cons");
        }
    }
}

/// Opens into `slot` on first use and returns the cached handle.
fn cached<'a, C: FileSystemClient>(
    client: &C,
    slot: &'a mut Option<C::Handle>,
    path: &str,
    mode: OpenMode,
) -> Result<&'a C::Handle> {
    let handle = match slot.take() {
        Some(handle) => handle,
        None => fs::open(client, path, mode)?,
    };
    Ok(slot.insert(handle))
}

/// Session over one window's files.
///
/// Not meant for concurrent use; callers that share a window must
/// serialise access themselves.
pub struct Window<C: FileSystemClient> {
    fs: Arc<C>,
    id: String,
    ctl: Option<C::Handle>,
    addr: Option<C::Handle>,
    body: Option<C::Handle>,
}

impl<C: FileSystemClient> Window<C> {
    /// Wraps window `id` without checking that it exists; see
    /// [`Acme::window`] for the checked form.
    pub fn new(fs: Arc<C>, id: impl Into<String>) -> Self {
        Self {
            fs,
            id: id.into(),
            ctl: None,
            addr: None,
            body: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    fn path(&self, file: &str) -> Result<String> {
        if self.id.is_empty() {
            return Err(AcmeError::CallerMisuse(format!(
                "cannot use {file} of a window without an id"
            )));
        }
        Ok(format!("/{}/{}", self.id, file))
    }

    /// Sends one control message; a newline is appended.
    pub fn ctl(&mut self, msg: &str) -> Result<()> {
        let path = self.path("ctl")?;
        let ctl = cached(self.fs.as_ref(), &mut self.ctl, &path, OpenMode::ReadWrite)?;
        fs::write_all(ctl, &path, format!("{msg}\n").as_bytes())
    }

    /// Reads the window parameters through the session's control handle.
    ///
    /// The handle is reused, so this continues from wherever the previous
    /// read of it stopped.
    pub fn read_ctl(&mut self) -> Result<WindowParams> {
        let path = self.path("ctl")?;
        let ctl = cached(self.fs.as_ref(), &mut self.ctl, &path, OpenMode::ReadWrite)?;
        let raw = fs::read_all(ctl, &path)?;
        decode_window_params(&raw)
    }

    /// Sets the address the next `xdata` read will cover. Any button-3
    /// address form without the leading colon is accepted.
    pub fn write_addr(&mut self, expr: &str) -> Result<()> {
        let path = self.path("addr")?;
        let addr = cached(self.fs.as_ref(), &mut self.addr, &path, OpenMode::ReadWrite)?;
        fs::write_all(addr, &path, &encode_address_expr(expr))
    }

    /// Current address, as character offsets.
    pub fn addr(&mut self) -> Result<AddressRange> {
        let path = self.path("addr")?;
        let addr = cached(self.fs.as_ref(), &mut self.addr, &path, OpenMode::ReadWrite)?;
        let mut buf = [0u8; ADDR_READ_LEN];
        let n = addr
            .read_at(&mut buf, 0)
            .map_err(|e| AcmeError::transport(path.as_str(), e))?;
        decode_address(&buf[..n])
    }

    /// A fresh handle on the window's data file, positioned by the last
    /// address written. Never cached: every read depends on the address
    /// in effect when the handle is opened.
    pub fn xdata(&self) -> Result<C::Handle> {
        let path = self.path("xdata")?;
        fs::open(self.fs.as_ref(), &path, OpenMode::ReadWrite)
    }

    fn read_xdata(&self) -> Result<Vec<u8>> {
        let path = self.path("xdata")?;
        let xdata = self.xdata()?;
        let raw = fs::read_all(&xdata, &path);
        fs::close_quietly(&xdata, &path);
        raw
    }

    /// Line number at the end of the current address: newlines before it
    /// plus one.
    fn line_from_selection(&self) -> Result<usize> {
        let path = self.path("xdata")?;
        let xdata = self.xdata()?;
        let mut reader = BufReader::new(HandleIo::new(&xdata));
        let mut line = 1;
        let mut chunk = Vec::new();
        let counted = loop {
            chunk.clear();
            match reader.read_until(b'\n', &mut chunk) {
                Ok(0) => break Ok(line),
                Ok(_) if chunk.last() == Some(&b'\n') => line += 1,
                Ok(_) => {}
                Err(e) => break Err(AcmeError::transport(path.as_str(), e)),
            }
        };
        fs::close_quietly(&xdata, &path);
        counted
    }

    /// Start and end line of the current selection (dot), 1-based.
    ///
    /// The editor only applies relative addresses correctly after
    /// `addr=dot` has been written to ctl, so that message precedes both
    /// address writes.
    pub fn line_number(&mut self) -> Result<(usize, usize)> {
        self.addr()?;

        self.ctl("addr=dot")?;
        self.write_addr("0,.-")?;
        let start = self.line_from_selection()?;

        self.ctl("addr=dot")?;
        self.write_addr("0,.")?;
        let end = self.line_from_selection()?;

        Ok((start, end))
    }

    /// The currently selected text.
    pub fn selected(&mut self) -> Result<String> {
        self.addr()?;
        self.ctl("addr=dot")?;
        let raw = self.read_xdata()?;
        Ok(String::from_utf8_lossy(&raw).into_owned())
    }

    /// The text an event refers to, fetching it from the window when the
    /// editor left it out of the event.
    pub fn event_text(&mut self, event: &Event) -> Result<String> {
        if !event.is_text_elided() {
            return Ok(event.text.clone());
        }
        if event.kind.in_tag() {
            let tag = self.tag()?;
            return Ok(tag
                .chars()
                .skip(event.start)
                .take(event.end - event.start)
                .collect());
        }
        self.write_addr(&AddressRange::new(event.start, event.end).to_expr())?;
        let raw = self.read_xdata()?;
        Ok(String::from_utf8_lossy(&raw).into_owned())
    }

    /// The window's tag, read through a handle that is closed straight away.
    pub fn tag(&self) -> Result<String> {
        let path = self.path("tag")?;
        let tag = fs::open(self.fs.as_ref(), &path, OpenMode::ReadWrite)?;
        let raw = fs::read_all(&tag, &path);
        fs::close_quietly(&tag, &path);
        Ok(String::from_utf8_lossy(&raw?).into_owned())
    }

    /// Appends text to the end of the tag.
    pub fn append_tag(&self, text: &str) -> Result<()> {
        let path = self.path("tag")?;
        let tag = fs::open(self.fs.as_ref(), &path, OpenMode::ReadWrite)?;
        let written = fs::write_all(&tag, &path, text.as_bytes());
        fs::close_quietly(&tag, &path);
        written
    }

    /// The session's body handle; writes append to the body.
    pub fn body(&mut self) -> Result<&C::Handle> {
        let path = self.path("body")?;
        cached(self.fs.as_ref(), &mut self.body, &path, OpenMode::ReadWrite)
    }

    pub fn write_body(&mut self, text: &str) -> Result<()> {
        let path = self.path("body")?;
        let body = self.body()?;
        fs::write_all(body, &path, text.as_bytes())
    }

    /// The whole body, read through its own handle.
    pub fn read_body(&self) -> Result<String> {
        let path = self.path("body")?;
        let body = fs::open(self.fs.as_ref(), &path, OpenMode::Read)?;
        let raw = fs::read_all(&body, &path);
        fs::close_quietly(&body, &path);
        Ok(String::from_utf8_lossy(&raw?).into_owned())
    }

    /// Opens the event file and starts decoding it. While the stream is
    /// open the editor leaves the window's actions to this client.
    pub fn events(&self) -> Result<EventStream<C::Handle>> {
        self.events_with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    pub fn events_with_capacity(&self, capacity: usize) -> Result<EventStream<C::Handle>> {
        let path = self.path("event")?;
        if capacity == 0 {
            return Err(AcmeError::CallerMisuse("event queue capacity must be at least 1".into()));
        }
        let handle = fs::open(self.fs.as_ref(), &path, OpenMode::ReadWrite)?;
        EventStream::start(path, handle, capacity)
    }

    /// Closes every handle the session opened. Safe to call repeatedly;
    /// later calls reopen handles as needed.
    pub fn close(&mut self) {
        let slots = [
            ("ctl", &mut self.ctl),
            ("addr", &mut self.addr),
            ("body", &mut self.body),
        ];
        for (name, slot) in slots {
            if let Some(handle) = slot.take() {
                let path = format!("/{}/{}", self.id, name);
                fs::close_quietly(&handle, &path);
            }
        }
    }
}

impl<C: FileSystemClient> Drop for Window<C> {
    fn drop(&mut self) {
        self.close();
    }
}
