//! Fixed-width records read from a window's `ctl`, `addr` and the global
//! `index` file.
//!
//! ```text
//! ctl:   [id:11][' '][tag chars:11][' '][body chars:11][' '][dir:11][' '][modified:11][' '][name...]
//! addr:  [q0:12][q1:12]
//! index: one ctl-style record per window, tag text after byte 60, newline terminated
//! ```

use crate::error::{AcmeError, Result};

/// Total size of the five numeric ctl fields, delimiters included.
pub const WINDOW_PARAMS_LEN: usize = 60;
/// Each ctl field is 11 digits wide plus one blank.
pub const CTL_FIELD_WIDTH: usize = 12;
/// Each addr field is 12 characters wide.
pub const ADDRESS_FIELD_WIDTH: usize = 12;
pub const ADDRESS_LEN: usize = 2 * ADDRESS_FIELD_WIDTH;

/// The numeric parameters from a window's ctl file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowParams {
    pub id: u32,
    /// Tag length in characters, not bytes.
    pub tag_chars: usize,
    /// Body length in characters, not bytes.
    pub body_chars: usize,
    pub dir: bool,
    pub modified: bool,
}

/// A `(q0, q1)` character range, as reported by the addr file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AddressRange {
    pub q0: usize,
    pub q1: usize,
}

impl AddressRange {
    pub fn new(q0: usize, q1: usize) -> Self {
        Self { q0, q1 }
    }

    pub fn len(&self) -> usize {
        self.q1.saturating_sub(self.q0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The range as an address expression (`#q0,#q1`) that selects exactly
    /// these characters when written back to the addr file.
    pub fn to_expr(&self) -> String {
        format!("#{},#{}", self.q0, self.q1)
    }
}

/// One entry of the editor's window index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowInfo {
    pub params: WindowParams,
    pub tag: String,
}

impl WindowInfo {
    /// First word of the tag, which the editor keeps as the file or
    /// directory name.
    pub fn name(&self) -> &str {
        self.tag.split_whitespace().next().unwrap_or("")
    }
}

fn parse_field(raw: &[u8], record: &'static str, what: &str) -> Result<u64> {
    let text = std::str::from_utf8(raw).map_err(|_| AcmeError::MalformedRecord {
        record,
        reason: format!("{what} is not text"),
    })?;
    let trimmed = text.trim();
    trimmed.parse::<u64>().map_err(|_| AcmeError::MalformedRecord {
        record,
        reason: format!("{what} is not a number: {trimmed:?}"),
    })
}

fn to_usize(v: u64, record: &'static str, what: &str) -> Result<usize> {
    usize::try_from(v).map_err(|_| AcmeError::MalformedRecord {
        record,
        reason: format!("{what} out of range: {v}"),
    })
}

/// Decodes the first 60 bytes of a ctl read. Anything after that is the
/// window name and is ignored here.
pub fn decode_window_params(raw: &[u8]) -> Result<WindowParams> {
    if raw.len() < WINDOW_PARAMS_LEN {
        return Err(AcmeError::MalformedRecord {
            record: "ctl",
            reason: format!("need {WINDOW_PARAMS_LEN} bytes, got {}", raw.len()),
        });
    }
    // The first field keeps its delimiter, trimming drops it.
    let id = parse_field(&raw[0..12], "ctl", "window id")?;
    let tag = parse_field(&raw[13..24], "ctl", "tag length")?;
    let body = parse_field(&raw[25..36], "ctl", "body length")?;
    let dir = parse_field(&raw[37..48], "ctl", "directory flag")?;
    let modified = parse_field(&raw[49..60], "ctl", "modified flag")?;

    Ok(WindowParams {
        id: u32::try_from(id).map_err(|_| AcmeError::MalformedRecord {
            record: "ctl",
            reason: format!("window id out of range: {id}"),
        })?,
        tag_chars: to_usize(tag, "ctl", "tag length")?,
        body_chars: to_usize(body, "ctl", "body length")?,
        dir: dir > 0,
        modified: modified > 0,
    })
}

/// Produces the 60-byte record [`decode_window_params`] reads.
pub fn encode_window_params(p: &WindowParams) -> Vec<u8> {
    let w = CTL_FIELD_WIDTH - 1;
    format!(
        "{:>w$} {:>w$} {:>w$} {:>w$} {:>w$} ",
        p.id,
        p.tag_chars,
        p.body_chars,
        u8::from(p.dir),
        u8::from(p.modified),
    )
    .into_bytes()
}

/// Decodes an addr read into its two character offsets.
pub fn decode_address(raw: &[u8]) -> Result<AddressRange> {
    if raw.len() < ADDRESS_LEN {
        return Err(AcmeError::ShortRead {
            record: "addr",
            expected: ADDRESS_LEN,
            actual: raw.len(),
        });
    }
    let q0 = parse_field(&raw[..ADDRESS_FIELD_WIDTH], "addr", "q0")?;
    let q1 = parse_field(&raw[ADDRESS_FIELD_WIDTH..ADDRESS_LEN], "addr", "q1")?;
    Ok(AddressRange {
        q0: to_usize(q0, "addr", "q0")?,
        q1: to_usize(q1, "addr", "q1")?,
    })
}

/// Address expressions are written verbatim; the editor evaluates and
/// rejects them itself.
pub fn encode_address_expr(expr: &str) -> Vec<u8> {
    expr.as_bytes().to_vec()
}

/// Decodes one line of the window index.
pub fn decode_index_line(line: &str) -> Result<WindowInfo> {
    let params = decode_window_params(line.as_bytes())?;
    let tag = line
        .get(WINDOW_PARAMS_LEN..)
        .unwrap_or("")
        .trim()
        .to_string();
    Ok(WindowInfo { params, tag })
}
