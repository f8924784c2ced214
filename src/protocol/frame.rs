//! Incremental decoding of the event file
//!
//! [`EventReader`] turns a byte stream into one [`Event`] per frame;
//! [`next_logical_event`] folds expansion frames into their trigger.
//! Chorded arguments are left for the caller to pull with
//! [`EventReader::read_chorded_argument`] (or the stream equivalent),
//! since their two frames are usually consumed at different points of the
//! caller's handling.

use std::io::{self, BufRead, Read};

use super::event::{Event, EventType, Origin};
use crate::error::{AcmeError, Result};

/// Longest numeric field accepted before the framing is considered lost.
const MAX_FIELD_LEN: u64 = 24;

/// Most characters the editor sends inline; longer text arrives elided.
pub const MAX_INLINE_CHARS: usize = 255;

/// Reads event frames one at a time.
pub struct EventReader<R> {
    inner: R,
    frames: u64,
}

impl<R: BufRead> EventReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, frames: 0 }
    }

    /// Number of complete frames decoded so far.
    pub fn frames_read(&self) -> u64 {
        self.frames
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Decodes the next frame. `Ok(None)` means the stream ended cleanly on
    /// a frame boundary.
    ///
    /// A malformed numeric field or a missing frame terminator is a
    /// [`AcmeError::ProtocolDesync`]: field boundaries are lost and no later
    /// frame can be trusted.
    pub fn read_frame(&mut self) -> Result<Option<Event>> {
        if self.inner.fill_buf()?.is_empty() {
            return Ok(None);
        }

        let mut codes = [0u8; 2];
        self.inner.read_exact(&mut codes)?;
        let origin = Origin::from_code(codes[0]);
        let kind = EventType::from_code(codes[1]);

        let start = self.read_number("start address")?;
        let end = self.read_number("end address")?;
        let flag = self.read_number("flag")?;
        let nchars = self.read_number("character count")?;
        let flag = u32::try_from(flag)
            .map_err(|_| AcmeError::ProtocolDesync(format!("flag out of range: {flag}")))?;
        if nchars > MAX_INLINE_CHARS {
            return Err(AcmeError::ProtocolDesync(format!(
                "character count {nchars} exceeds {MAX_INLINE_CHARS}"
            )));
        }

        let text = self.read_chars(nchars)?;

        let mut terminator = [0u8; 1];
        self.inner.read_exact(&mut terminator)?;
        if terminator[0] != b'\n' {
            return Err(AcmeError::ProtocolDesync(format!(
                "expected newline after {}{} frame, found {:?}",
                origin.code(),
                kind.code(),
                terminator[0] as char
            )));
        }

        self.frames += 1;
        Ok(Some(Event {
            origin,
            kind,
            start,
            end,
            flag,
            nchars,
            text,
        }))
    }

    /// Reads the two frames that follow a chorded button-2 event: the
    /// argument text, then where it came from as a button-3 style address.
    pub fn read_chorded_argument(&mut self) -> Result<ChordedArgument> {
        let text = self.read_frame()?.ok_or_else(|| {
            AcmeError::ProtocolDesync("stream ended before chorded argument".into())
        })?;
        let origin = self.read_frame()?.ok_or_else(|| {
            AcmeError::ProtocolDesync("stream ended before chorded argument origin".into())
        })?;
        Ok(ChordedArgument::from_frames(text, origin))
    }

    fn read_number(&mut self, what: &str) -> Result<usize> {
        let mut raw = Vec::new();
        (&mut self.inner).take(MAX_FIELD_LEN).read_until(b' ', &mut raw)?;
        if raw.last() != Some(&b' ') {
            if raw.len() as u64 >= MAX_FIELD_LEN {
                return Err(AcmeError::ProtocolDesync(format!("{what} field too long")));
            }
            let msg = format!("stream ended inside {what}");
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, msg).into());
        }
        let text = String::from_utf8_lossy(&raw);
        let trimmed = text.trim();
        let value = trimmed.parse::<i64>().map_err(|_| {
            AcmeError::ProtocolDesync(format!("{what} is not a number: {trimmed:?}"))
        })?;
        usize::try_from(value)
            .map_err(|_| AcmeError::ProtocolDesync(format!("{what} is negative: {value}")))
    }

    /// Reads `count` UTF-8 characters. The count is in characters, so the
    /// byte length is only known while reading.
    fn read_chars(&mut self, count: usize) -> Result<String> {
        let mut text = String::with_capacity(count);
        let mut seq = [0u8; 4];
        for _ in 0..count {
            self.inner.read_exact(&mut seq[..1])?;
            let width = utf8_width(seq[0]);
            self.inner.read_exact(&mut seq[1..width])?;
            match std::str::from_utf8(&seq[..width]) {
                Ok(s) => text.push_str(s),
                Err(_) => text.push(char::REPLACEMENT_CHARACTER),
            }
        }
        Ok(text)
    }
}

fn utf8_width(lead: u8) -> usize {
    match lead {
        0x00..=0x7f => 1,
        0xc0..=0xdf => 2,
        0xe0..=0xef => 3,
        0xf0..=0xf7 => 4,
        _ => 1,
    }
}

/// Reads one logical event: a frame, plus its expansion frame when the
/// flag announces one.
pub fn next_logical_event<R: BufRead>(reader: &mut EventReader<R>) -> Result<Option<Event>> {
    let Some(mut event) = reader.read_frame()? else {
        return Ok(None);
    };
    if event.has_expansion() {
        let expansion = reader.read_frame()?.ok_or_else(|| {
            AcmeError::ProtocolDesync(format!("stream ended before expansion of {event}"))
        })?;
        event.fold_expansion(expansion);
    }
    Ok(Some(event))
}

/// The extra argument of a chorded button-2 command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChordedArgument {
    /// The argument text.
    pub text: String,
    /// Where the argument was selected, e.g. `/src/main.rs:#120,#131`.
    pub origin: String,
}

impl ChordedArgument {
    /// Combines the count-only frame and the address frame.
    pub fn from_frames(text: Event, origin: Event) -> Self {
        Self {
            text: text.text,
            origin: origin.text,
        }
    }
}
