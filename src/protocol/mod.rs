//! Wire formats of the editor's window files
//!
//! Pure encoding and decoding, no I/O of its own.
//!
//! # Components
//!
//! - [`address`] - fixed-width ctl/addr/index records
//! - [`event`] - event model and flag semantics
//! - [`frame`] - incremental event-frame decoding and multi-frame assembly

pub mod address;
pub mod event;
pub mod frame;

pub use address::{
    decode_address, decode_index_line, decode_window_params, encode_address_expr,
    encode_window_params, AddressRange, WindowInfo, WindowParams,
};
pub use event::{flags, Event, EventType, Origin};
pub use frame::{next_logical_event, ChordedArgument, EventReader, MAX_INLINE_CHARS};
