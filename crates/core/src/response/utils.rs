//! Utility functions for APDU response handling

use crate::response::error::ResponseError;
use crate::response::status::StatusWord;
use tracing::debug;

/// Extract status word (SW1, SW2) and payload from raw APDU response data
///
/// Returns a tuple containing:
/// - The status word as a tuple (SW1, SW2)
/// - The payload data (without the status word)
///
/// # Errors
/// Returns an error if the data is too short to contain a valid status word.
pub fn extract_response_parts(data: &[u8]) -> Result<((u8, u8), &[u8]), ResponseError> {
    let [payload @ .., sw1, sw2] = data else {
        debug!("Response too short: {} bytes", data.len());
        return Err(ResponseError::TooSmall(data.len()));
    };

    Ok(((*sw1, *sw2), payload))
}

/// Extract status word as a StatusWord object and payload from raw APDU response data
///
/// # Errors
/// Returns an error if the data is too short to contain a valid status word.
pub fn extract_status_and_payload(data: &[u8]) -> Result<(StatusWord, &[u8]), ResponseError> {
    let ((sw1, sw2), payload) = extract_response_parts(data)?;
    Ok((StatusWord::new(sw1, sw2), payload))
}

/// Whether the last `count` bytes of `data` are all `0xFF`
///
/// Card files are padded with `0xFF` after their content. Returns false
/// when `count` is zero or `data` is shorter than `count`.
pub fn has_trailing_padding(data: &[u8], count: usize) -> bool {
    count > 0
        && data.len() >= count
        && data[data.len() - count..].iter().all(|&byte| byte == 0xFF)
}
