//! Window events and the meaning of their flag bits
//!
//! Wire form of one event:
//!
//! ```text
//! <origin:1><type:1><q0> <q1> <flag> <nchars> <text:nchars chars>\n
//! ```
//!
//! Write-back form (flag, count and text omitted):
//!
//! ```text
//! <origin:1><type:1><q0> <q1>\n
//! ```

use std::fmt;

use crate::error::{AcmeError, Result};

/// Flag bits. Their meaning depends on the event type.
pub mod flags {
    /// X/x: the text is a built-in command.
    pub const BUILTIN: u32 = 1;
    /// L/l: the editor can act without loading a new file.
    pub const NO_LOAD: u32 = 1;
    /// X/x and L/l: an expansion frame follows.
    pub const EXPANSION: u32 = 2;
    /// L/l: the text is a file or window name, possibly with an address.
    pub const FILE_NAME: u32 = 4;
    /// X/x: two frames describing a chorded argument follow.
    pub const CHORDED: u32 = 8;
}

/// What caused an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// A write to the body or tag file.
    Write,
    /// A write through one of the window's other files.
    File,
    Keyboard,
    Mouse,
    /// A code this library does not recognise, kept as received.
    Unknown(u8),
}

impl Origin {
    pub fn from_code(code: u8) -> Self {
        match code {
            b'E' => Origin::Write,
            b'F' => Origin::File,
            b'K' => Origin::Keyboard,
            b'M' => Origin::Mouse,
            other => Origin::Unknown(other),
        }
    }

    /// Protocol character; `'?'` for unknown codes.
    pub fn code(self) -> char {
        match self {
            Origin::Write => 'E',
            Origin::File => 'F',
            Origin::Keyboard => 'K',
            Origin::Mouse => 'M',
            Origin::Unknown(_) => '?',
        }
    }

    pub fn is_known(self) -> bool {
        !matches!(self, Origin::Unknown(_))
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Write => write!(f, "write"),
            Origin::File => write!(f, "file"),
            Origin::Keyboard => write!(f, "keyboard"),
            Origin::Mouse => write!(f, "mouse"),
            Origin::Unknown(code) => write!(f, "unknown origin {:?}", *code as char),
        }
    }
}

/// What kind of action an event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    BodyDelete,
    TagDelete,
    BodyInsert,
    TagInsert,
    BodyButton3,
    TagButton3,
    BodyButton2,
    TagButton2,
    Unknown(u8),
}

impl EventType {
    pub fn from_code(code: u8) -> Self {
        match code {
            b'D' => EventType::BodyDelete,
            b'd' => EventType::TagDelete,
            b'I' => EventType::BodyInsert,
            b'i' => EventType::TagInsert,
            b'L' => EventType::BodyButton3,
            b'l' => EventType::TagButton3,
            b'X' => EventType::BodyButton2,
            b'x' => EventType::TagButton2,
            other => EventType::Unknown(other),
        }
    }

    /// Protocol character; `'?'` for unknown codes.
    pub fn code(self) -> char {
        match self {
            EventType::BodyDelete => 'D',
            EventType::TagDelete => 'd',
            EventType::BodyInsert => 'I',
            EventType::TagInsert => 'i',
            EventType::BodyButton3 => 'L',
            EventType::TagButton3 => 'l',
            EventType::BodyButton2 => 'X',
            EventType::TagButton2 => 'x',
            EventType::Unknown(_) => '?',
        }
    }

    pub fn is_known(self) -> bool {
        !matches!(self, EventType::Unknown(_))
    }

    pub fn is_delete(self) -> bool {
        matches!(self, EventType::BodyDelete | EventType::TagDelete)
    }

    pub fn is_insert(self) -> bool {
        matches!(self, EventType::BodyInsert | EventType::TagInsert)
    }

    /// Button 2: execute.
    pub fn is_button2(self) -> bool {
        matches!(self, EventType::BodyButton2 | EventType::TagButton2)
    }

    /// Button 3: look/load.
    pub fn is_button3(self) -> bool {
        matches!(self, EventType::BodyButton3 | EventType::TagButton3)
    }

    pub fn in_tag(self) -> bool {
        matches!(
            self,
            EventType::TagDelete
                | EventType::TagInsert
                | EventType::TagButton3
                | EventType::TagButton2
        )
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventType::BodyDelete => "body delete",
            EventType::TagDelete => "tag delete",
            EventType::BodyInsert => "body insert",
            EventType::TagInsert => "tag insert",
            EventType::BodyButton3 => "body button 3",
            EventType::TagButton3 => "tag button 3",
            EventType::BodyButton2 => "body button 2",
            EventType::TagButton2 => "tag button 2",
            EventType::Unknown(code) => return write!(f, "unknown type {:?}", *code as char),
        };
        f.write_str(name)
    }
}

/// One action reported on a window's event file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub origin: Origin,
    pub kind: EventType,
    /// Character offset where the action starts.
    pub start: usize,
    /// Character offset where the action ends.
    pub end: usize,
    pub flag: u32,
    /// Character count of `text`; 0 when the text was elided.
    pub nchars: usize,
    pub text: String,
}

impl Event {
    /// Builds an event carrying `text` inline, with `nchars` derived from it.
    pub fn new(
        origin: Origin,
        kind: EventType,
        start: usize,
        end: usize,
        flag: u32,
        text: impl Into<String>,
    ) -> Self {
        let text = text.into();
        Self {
            origin,
            kind,
            start,
            end,
            flag,
            nchars: text.chars().count(),
            text,
        }
    }

    fn bit(&self, bit: u32) -> bool {
        self.flag & bit != 0
    }

    /// Button 2 on a built-in command (`Del`, `Put`, `Snarf`, ...).
    pub fn is_builtin(&self) -> bool {
        self.kind.is_button2() && self.bit(flags::BUILTIN)
    }

    /// Button 3 the editor can satisfy without loading a new file.
    pub fn is_no_load(&self) -> bool {
        self.kind.is_button3() && self.bit(flags::NO_LOAD)
    }

    /// The next frame carries the expanded text of this one.
    pub fn has_expansion(&self) -> bool {
        (self.kind.is_button2() || self.kind.is_button3()) && self.bit(flags::EXPANSION)
    }

    /// Button 2 with a chorded argument; two more frames follow.
    pub fn is_chorded(&self) -> bool {
        self.kind.is_button2() && self.bit(flags::CHORDED)
    }

    /// Button 3 on a file or window name rather than literal text.
    pub fn is_file_name(&self) -> bool {
        self.kind.is_button3() && self.bit(flags::FILE_NAME)
    }

    /// The editor performs its default action if this event is written back.
    pub fn can_write_back(&self) -> bool {
        self.origin.is_known()
            && (self.kind.is_button2() || self.kind.is_button3())
            && self.bit(flags::BUILTIN)
    }

    /// The affected text was too long to send and has to be fetched from
    /// the data file. Delete events never carry text.
    pub fn is_text_elided(&self) -> bool {
        self.nchars == 0 && self.end > self.start && !self.kind.is_delete()
    }

    /// Replaces the trigger's text with that of its expansion frame. The
    /// trigger keeps its addresses and flags, minus the expansion bit.
    pub fn fold_expansion(&mut self, expansion: Event) {
        self.nchars = expansion.nchars;
        self.text = expansion.text;
        self.flag &= !flags::EXPANSION;
    }

    /// The event in wire form.
    pub fn encode(&self) -> Vec<u8> {
        format!(
            "{}{}{} {} {} {} {}\n",
            self.origin.code(),
            self.kind.code(),
            self.start,
            self.end,
            self.flag,
            self.nchars,
            self.text
        )
        .into_bytes()
    }

    /// The truncated frame that hands this event back to the editor.
    pub fn write_back_frame(&self) -> Result<Vec<u8>> {
        if !self.origin.is_known() || !self.kind.is_known() {
            return Err(AcmeError::CallerMisuse(format!(
                "cannot write back event with unknown codes: {self}"
            )));
        }
        if !self.can_write_back() {
            return Err(AcmeError::CallerMisuse(format!(
                "event is not builtin-executable (flag {}): {self}",
                self.flag
            )));
        }
        Ok(format!(
            "{}{}{} {}\n",
            self.origin.code(),
            self.kind.code(),
            self.start,
            self.end
        )
        .into_bytes())
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{} {} {} {} {}",
            self.origin.code(),
            self.kind.code(),
            self.start,
            self.end,
            self.flag,
            self.nchars,
            self.text
        )
    }
}
