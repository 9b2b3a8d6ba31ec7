//! Error type for ASN.1 decoding

use crate::tag::UniversalTag;

/// Failure while decoding a single element
///
/// Decoding errors are local: they stop the element stream they occurred in,
/// never the surrounding traversal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The tag byte can never start an element (0xFF padding)
    #[error("Invalid tag byte {0:#04x}")]
    InvalidTag(u8),

    /// The length uses the indefinite form or more octets than fit in a
    /// `usize`
    #[error("Unsupported length form with {0} octets")]
    InvalidLength(usize),

    /// The buffer ends before the element does
    #[error("Truncated element: {needed} bytes needed, {available} available")]
    Truncated {
        /// Bytes the header or content requires
        needed: usize,
        /// Bytes left in the buffer
        available: usize,
    },

    /// Constructed elements nest deeper than the decoder follows
    #[error("Elements nested deeper than {0} levels")]
    NestingTooDeep(usize),

    /// A BOOLEAN without content
    #[error("BOOLEAN element without content")]
    InvalidBoolean,

    /// String content that does not decode in the charset of its type
    #[error("Invalid {0} content")]
    InvalidString(UniversalTag),
}

impl DecodeError {
    /// Whether the error was caused by running out of input rather than by
    /// a structurally invalid element
    pub const fn is_truncated(&self) -> bool {
        matches!(self, Self::Truncated { .. })
    }
}
