//! APDU response definitions
//!
//! This module provides the response type for APDU responses according to
//! ISO/IEC 7816-4.

pub mod error;
pub mod status;
pub mod utils;

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::trace;

use error::ResponseError;
use status::{ProcessingStatus, StatusWord};

/// Basic APDU response structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Response data, `None` when the card only sent a status word
    data: Option<Bytes>,
    /// Classified status word
    status: ProcessingStatus,
}

impl Response {
    /// Create a new response with data and status
    pub fn new(data: Option<Bytes>, status: impl Into<StatusWord>) -> Self {
        Self {
            data,
            status: ProcessingStatus::from(status.into()),
        }
    }

    /// Create a success response
    pub const fn success(data: Option<Bytes>) -> Self {
        Self {
            data,
            status: ProcessingStatus::Success,
        }
    }

    /// Parse response from raw bytes (including status word)
    pub fn from_bytes(data: &[u8]) -> Result<Self, ResponseError> {
        let (status, payload) = utils::extract_status_and_payload(data)?;

        trace!(
            sw1 = format_args!("{:#04x}", status.sw1),
            sw2 = format_args!("{:#04x}", status.sw2),
            payload_len = payload.len(),
            "Parsed APDU response"
        );

        Ok(Self {
            data: (!payload.is_empty()).then(|| Bytes::copy_from_slice(payload)),
            status: ProcessingStatus::from(status),
        })
    }

    /// Response data
    pub const fn data(&self) -> Option<&Bytes> {
        self.data.as_ref()
    }

    /// Take the response data
    pub fn into_data(self) -> Option<Bytes> {
        self.data
    }

    /// Classified status
    pub const fn processing_status(&self) -> ProcessingStatus {
        self.status
    }

    /// Raw status word
    pub const fn status(&self) -> StatusWord {
        self.status.status_word()
    }

    /// Check if the response indicates success (`90 00`)
    pub const fn is_success(&self) -> bool {
        matches!(self.status, ProcessingStatus::Success)
    }

    /// Re-encode the response as it came off the wire
    pub fn to_bytes(&self) -> Bytes {
        let data_len = self.data.as_ref().map_or(0, Bytes::len);
        let mut buf = BytesMut::with_capacity(data_len + 2);
        if let Some(data) = &self.data {
            buf.put_slice(data);
        }
        let status = self.status();
        buf.put_u8(status.sw1);
        buf.put_u8(status.sw2);
        buf.freeze()
    }
}

impl TryFrom<&[u8]> for Response {
    type Error = ResponseError;

    fn try_from(data: &[u8]) -> Result<Self, ResponseError> {
        Self::from_bytes(data)
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.data {
            Some(data) => write!(f, "{} [{} bytes]", self.status, data.len()),
            None => write!(f, "{}", self.status),
        }
    }
}
