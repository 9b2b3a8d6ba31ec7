//! SITHS certificate extraction and card session orchestration
//!
//! [`SithsManager`] drives a [`ReaderDriver`](siths_card_core::ReaderDriver)
//! through the PKCS#15 file system of an inserted card and publishes the
//! outcome as a [`SithsManagerState`]. Certificates are recognised by
//! [`SithsCardCertificate::extract`], which can also be used on its own
//! against any decoded DER.
//!
//! ```no_run
//! use siths_card_core::ReaderEvent;
//! use siths_manager::{SithsManager, SithsManagerState};
//!
//! # fn run(driver: impl siths_card_core::ReaderDriver + 'static) -> std::io::Result<()> {
//! let manager = SithsManager::new(driver)?;
//! manager.subscribe_state(|state: SithsManagerState| println!("{state}"));
//! manager.notify(ReaderEvent::AppForeground);
//! # Ok(())
//! # }
//! ```
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

pub mod certificate;
pub mod config;
pub mod error;
pub mod key_usage;
pub mod manager;
pub mod observer;
pub mod reader;
pub mod state;

mod log;
mod worker;

pub use certificate::SithsCardCertificate;
pub use config::ManagerConfig;
pub use error::{ProtocolError, SithsManagerError};
pub use key_usage::KeyUsage;
pub use manager::{EventSender, SithsManager};
pub use observer::{EventHandler, SubscriptionId};
pub use reader::{EID_APPLICATION_ID, ODF_FILE_IDENTIFIER, discover_file_identifier};
pub use state::SithsManagerState;

/// Prelude module containing commonly used traits and types
pub mod prelude {
    pub use crate::{
        EventHandler, EventSender, KeyUsage, ManagerConfig, SithsCardCertificate, SithsManager,
        SithsManagerError, SithsManagerState, SubscriptionId,
    };
}
