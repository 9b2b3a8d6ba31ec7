//! APDU command definitions
//!
//! This module provides the command frame and its byte encoding according to
//! ISO/IEC 7816-4, plus constructors for the few interindustry commands a
//! PKCS#15 file walk needs.

pub mod error;

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use error::CommandError;

/// Largest value encoded in a single length byte
const SHORT_LENGTH_MAX: usize = 0xFF;

/// Response length requested by a short Le of zero
const SHORT_LENGTH_ZERO: usize = 0x100;

/// Response length requested by an extended Le of zero
const EXTENDED_LENGTH_ZERO: usize = 0x1_0000;

/// Marker byte that introduces an extended length field
const EXTENDED_LENGTH_MARKER: u8 = 0x00;

/// Generic APDU command structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Command class byte
    pub cla: u8,
    /// Instruction byte
    pub ins: u8,
    /// Parameter 1
    pub p1: u8,
    /// Parameter 2
    pub p2: u8,
    /// Command data (optional)
    pub data: Option<Bytes>,
    /// Expected response length (optional)
    pub le: Option<u16>,
}

impl Command {
    /// Create a new command with just the header bytes
    pub const fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: None,
            le: None,
        }
    }

    /// Set the data field
    pub fn with_data<T: Into<Bytes>>(mut self, data: T) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Set the expected length field
    pub const fn with_le(mut self, le: u16) -> Self {
        self.le = Some(le);
        self
    }

    /// SELECT an application by AID (`00 A4 04 00`)
    pub fn select_aid<T: Into<Bytes>>(aid: T) -> Self {
        Self::new(0x00, 0xA4, 0x04, 0x00).with_data(aid)
    }

    /// SELECT a file by its two byte identifier (`00 A4 00 00`)
    pub fn select_file(identifier: [u8; 2]) -> Self {
        Self::new(0x00, 0xA4, 0x00, 0x00).with_data(identifier.to_vec())
    }

    /// GET RESPONSE for data the card announced with `61 xx`
    pub const fn get_response(available: u8) -> Self {
        Self::new(0x00, 0xC0, 0x00, 0x00).with_le(available as u16)
    }

    /// READ BINARY from the selected file at `offset`
    pub const fn read_binary(offset: u16, le: u16) -> Self {
        let [p1, p2] = offset.to_be_bytes();
        Self::new(0x00, 0xB0, p1, p2).with_le(le)
    }

    /// Number of data bytes the card may answer with
    ///
    /// An Le of zero asks for the maximum of its encoding: 256 bytes in the
    /// short form, 65536 when the command data forces the extended form.
    pub fn expected_length(&self) -> Option<usize> {
        self.le.map(|le| match le {
            0 if self.data.as_ref().is_some_and(|data| data.len() > SHORT_LENGTH_MAX) => {
                EXTENDED_LENGTH_ZERO
            }
            0 => SHORT_LENGTH_ZERO,
            le => usize::from(le),
        })
    }

    /// Number of bytes the card may answer with, status word included
    ///
    /// Commands without an expected length get a short APDU buffer.
    pub fn response_capacity(&self) -> usize {
        self.expected_length()
            .map_or(SHORT_LENGTH_MAX, |length| length + 2)
    }

    /// Calculate length of serialized command
    pub fn command_length(&self) -> usize {
        // Header (CLA, INS, P1, P2) is always 4 bytes
        let mut length = 4;

        if let Some(data) = &self.data {
            length += if data.len() > SHORT_LENGTH_MAX { 3 } else { 1 };
            length += data.len();
        }

        if let Some(le) = self.le {
            length += match (usize::from(le) > SHORT_LENGTH_MAX, self.data.is_some()) {
                (false, _) => 1,
                (true, true) => 3,
                (true, false) => 2,
            };
        }

        length
    }

    /// Convert to raw APDU bytes
    ///
    /// Lengths above 255 use a marker byte followed by a big-endian 16-bit
    /// length. An extended Le only gets its own marker when data precedes it.
    pub fn to_bytes(&self) -> Result<Bytes, CommandError> {
        let mut buffer = BytesMut::with_capacity(self.command_length());

        // Header: CLA, INS, P1, P2
        buffer.put_u8(self.cla);
        buffer.put_u8(self.ins);
        buffer.put_u8(self.p1);
        buffer.put_u8(self.p2);

        // Add Lc and data if present
        if let Some(data) = &self.data {
            let data_len = data.len();
            if data_len <= SHORT_LENGTH_MAX {
                buffer.put_u8(data_len as u8);
            } else {
                let extended =
                    u16::try_from(data_len).map_err(|_| CommandError::DataTooLarge(data_len))?;
                buffer.put_u8(EXTENDED_LENGTH_MARKER);
                buffer.put_u16(extended);
            }
            buffer.put_slice(data);
        }

        // Add Le if present
        if let Some(le) = self.le {
            if usize::from(le) <= SHORT_LENGTH_MAX {
                buffer.put_u8(le as u8);
            } else {
                if self.data.is_some() {
                    buffer.put_u8(EXTENDED_LENGTH_MARKER);
                }
                buffer.put_u16(le);
            }
        }

        Ok(buffer.freeze())
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CLA={:02X} INS={:02X} P1={:02X} P2={:02X}",
            self.cla, self.ins, self.p1, self.p2
        )?;
        if let Some(data) = &self.data {
            write!(f, " DATA={}", hex::encode_upper(data))?;
        }
        if let Some(le) = self.le {
            write!(f, " LE={le}")?;
        }
        Ok(())
    }
}
