//! Error types specific to APDU commands

/// Error for APDU command encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// Command data does not fit the extended length field
    #[error("Command data too large: {0} bytes (max 65535)")]
    DataTooLarge(usize),
}
