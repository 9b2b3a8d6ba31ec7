//! Error types specific to APDU responses

/// Error while decoding an APDU response
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ResponseError {
    /// The response cannot hold a status word
    #[error("Response too small: {0} bytes, status word needs 2")]
    TooSmall(usize),
}
