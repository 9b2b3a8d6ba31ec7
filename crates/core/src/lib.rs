//! APDU codec and reader driver interface for SITHS card access
//!
//! This crate provides the foundational types for talking to a smart card
//! according to ISO/IEC 7816-4:
//!
//! - [`Command`] frames and their byte encoding, including the extended
//!   length forms
//! - [`Response`] decoding into a [`ProcessingStatus`]
//! - the [`ReaderDriver`] trait that reader backends implement, and the
//!   [`SmartcardStatus`] codes they report
//! - [`ReaderEvent`]s that drive a card session
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

// Re-export bytes for convenience
pub use bytes::{Bytes, BytesMut};

pub mod command;
pub mod driver;
pub mod event;
pub mod response;

pub use command::{Command, error::CommandError};
pub use driver::{ProtocolPreference, ReaderDriver, SlotStatus, status::SmartcardStatus};
pub use event::ReaderEvent;
pub use response::status::{ProcessingStatus, StatusWord};
pub use response::{Response, error::ResponseError, utils};

/// Prelude module containing commonly used traits and types
pub mod prelude {
    pub use crate::{
        Bytes, BytesMut, Command, CommandError, ProcessingStatus, ProtocolPreference,
        ReaderDriver, ReaderEvent, Response, ResponseError, SlotStatus, SmartcardStatus,
        StatusWord,
    };
}
