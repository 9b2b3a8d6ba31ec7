//! ASN.1 BER/DER decoding for SITHS card files
//!
//! This crate turns the byte content of card files into a tree of typed
//! [`Asn1Element`]s. It understands the subset of BER that PKCS#15 directory
//! files and X.509 certificates stored on SITHS cards are made of:
//!
//! - single-byte tags (universal, application and context-specific classes)
//! - short and long definite length forms
//! - constructed content that may or may not itself be BER, resolved through
//!   [`ElementsOrRawValue`]
//!
//! Object identifiers are resolved against a small registry of the attribute
//! and extension identifiers the certificate extractor cares about, see
//! [`ObjectIdentifier`].
//!
//! ```
//! use siths_asn1::{Asn1Element, Asn1Parser};
//!
//! let mut parser = Asn1Parser::new(vec![0x30, 0x03, 0x02, 0x01, 0x05]);
//! let parsed = parser.parse_element().unwrap().unwrap();
//! assert_eq!(parsed.range, 0..5);
//! assert!(matches!(parsed.element, Asn1Element::Sequence(ref children) if children.len() == 1));
//! ```
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

pub use bytes::Bytes;

pub mod element;
pub mod error;
pub mod oid;
pub mod parser;
pub mod tag;

pub use element::{Asn1Element, ElementsOrRawValue};
pub use error::DecodeError;
pub use oid::ObjectIdentifier;
pub use parser::{Asn1Parser, MAX_DEPTH, ParsedElement};
pub use tag::{TypeTag, UniversalTag};

/// Prelude module containing commonly used traits and types
pub mod prelude {
    pub use crate::{
        Asn1Element, Asn1Parser, Bytes, DecodeError, ElementsOrRawValue, ObjectIdentifier,
        ParsedElement, TypeTag, UniversalTag,
    };
}
