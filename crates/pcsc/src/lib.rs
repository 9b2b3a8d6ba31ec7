//! PC/SC reader driver and reader monitor for SITHS card sessions
//!
//! [`PcscDriver`] implements the `ReaderDriver` trait from
//! `siths-card-core` over the system PC/SC service. [`PcscMonitor`] watches
//! the same reader and turns presence changes into `ReaderEvent`s.
//!
//! # Examples
//!
//! ```no_run
//! use siths_card_core::{ProtocolPreference, ReaderDriver, SlotStatus};
//! use siths_transport_pcsc::{PcscConfig, PcscDriver};
//!
//! let mut driver = PcscDriver::new(PcscConfig::default());
//! driver.open()?;
//! if driver.slot_status() == SlotStatus::Present {
//!     driver.connect(ProtocolPreference::Any)?;
//! }
//! # Ok::<(), siths_card_core::SmartcardStatus>(())
//! ```
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

mod config;
mod driver;
mod error;
mod monitor;

pub use config::{PcscConfig, ShareMode, protocols_for};
pub use driver::{PcscDriver, slot_status_from_state};
pub use error::{PcscError, status_from_pcsc};
pub use monitor::{PcscMonitor, ReaderSnapshot};

// Re-export some pcsc types for convenience
pub use pcsc::{Protocols, State};
