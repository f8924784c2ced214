//! Client for the acme/edwood editor's window files
//!
//! The editor exposes each window as a small set of files. This crate
//! decodes their record and event formats ([`protocol`]), talks to them
//! through a pluggable transport ([`fs`]), and wraps a window in a session
//! ([`Window`]) with a background-decoded [`EventStream`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use acmectl::{Acme, MountedFs};
//!
//! # fn main() -> acmectl::Result<()> {
//! let acme = Acme::new(Arc::new(MountedFs::new("/mnt/acme")));
//! let mut win = acme.window("7")?;
//! let (first, last) = win.line_number()?;
//! println!("{}:{}", first, last);
//!
//! let events = win.events()?;
//! for event in events.iter() {
//!     if event.can_write_back() {
//!         events.write_back(&event)?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod fs;
pub mod protocol;
pub mod window;

pub use config::{ClientConfig, Namespace};
pub use error::{AcmeError, Result};
pub use fs::{FileSystemClient, Handle, Metadata, MountedFs, OpenMode};
pub use protocol::{
    AddressRange, ChordedArgument, Event, EventType, Origin, WindowInfo, WindowParams,
};
pub use window::{Acme, EventStream, StreamState, Window, DEFAULT_QUEUE_CAPACITY};
