//! PKCS#15 file walk over a connected card
//!
//! The walk starts at EF.ODF, reads every file it can discover through
//! directory entries and collects the SITHS certificates found on the way.

use std::collections::VecDeque;

use bytes::{Bytes, BytesMut};
use siths_asn1::{Asn1Element, Asn1Parser, ElementsOrRawValue};
use siths_card_core::{Command, ProcessingStatus, ReaderDriver, Response, utils};
use tracing::{debug, instrument, warn};

use crate::certificate::SithsCardCertificate;
use crate::config::ManagerConfig;
use crate::error::{ProtocolError, SithsManagerError};
use crate::log::DiagnosticLog;

/// AID of the PKCS#15 EID application
pub const EID_APPLICATION_ID: [u8; 12] = [
    0xA0, 0x00, 0x00, 0x00, 0x63, 0x50, 0x4B, 0x43, 0x53, 0x2D, 0x31, 0x35,
];

/// Identifier of EF.ODF, where the walk starts
pub const ODF_FILE_IDENTIFIER: [u8; 2] = [0x50, 0x31];

/// First two bytes of every path the walk follows
pub const FILE_SYSTEM_ROOT: [u8; 2] = [0x3F, 0x00];

/// Largest offset READ BINARY can address
const MAX_OFFSET: usize = u16::MAX as usize;

/// Walks the file system of one connected card
#[derive(Debug)]
pub(crate) struct CardReader<'a, D: ?Sized> {
    driver: &'a mut D,
    config: &'a ManagerConfig,
    log: &'a DiagnosticLog,
}

impl<'a, D: ReaderDriver + ?Sized> CardReader<'a, D> {
    pub(crate) const fn new(
        driver: &'a mut D,
        config: &'a ManagerConfig,
        log: &'a DiagnosticLog,
    ) -> Self {
        Self {
            driver,
            config,
            log,
        }
    }

    /// Read every certificate on the card
    ///
    /// Returns `None` when the card has no EID application.
    #[instrument(level = "debug", skip(self))]
    pub(crate) fn read_certificates(
        &mut self,
    ) -> Result<Option<Vec<SithsCardCertificate>>, SithsManagerError> {
        self.log.line(format_args!("Selecting EID"));
        if !self.select_application()? {
            self.log
                .line(format_args!("Could not select EID, unknown card"));
            return Ok(None);
        }

        let mut pending = VecDeque::from([ODF_FILE_IDENTIFIER]);
        let mut visited = Vec::new();
        let mut certificates = Vec::new();

        while let Some(identifier) = pending.pop_front() {
            visited.push(identifier);
            self.log.line(format_args!(
                "Read loop iteration, reading from identifier {}",
                hex::encode_upper(identifier)
            ));

            self.select_file(identifier)?;
            let data = self.read_binary(identifier)?;

            let mut parser = Asn1Parser::new(data);
            loop {
                let parsed = match parser.parse_element() {
                    Ok(Some(parsed)) => parsed,
                    Ok(None) => break,
                    Err(error) => {
                        // Padding after the last element ends up here
                        debug!(%error, position = parser.position(), "Stopped decoding file");
                        break;
                    }
                };
                self.log.line(format_args!(
                    "Parsed {} at {}..{}",
                    parsed.element.type_tag(),
                    parsed.range.start,
                    parsed.range.end
                ));

                if let Some(found) = discover_file_identifier(&parsed.element) {
                    if !pending.contains(&found) && !visited.contains(&found) {
                        debug!(identifier = %hex::encode_upper(found), "Discovered file");
                        pending.push_back(found);
                    }
                }

                if let Some(certificate) = SithsCardCertificate::from_parsed(&parsed) {
                    certificates.push(certificate);
                }
            }
        }

        let serials: Vec<&str> = certificates.iter().map(|c| c.serial_string()).collect();
        self.log.line(format_args!(
            "SITHS card communication complete, found certificates with serial strings: {serials:?}"
        ));

        Ok(Some(certificates))
    }

    /// Send one command and decode the response
    fn transmit(&mut self, command: &Command) -> Result<Response, SithsManagerError> {
        let bytes = command.to_bytes()?;
        self.log.line(format_args!(
            "Transmitting {} >>> {}",
            bytes.len(),
            hex::encode_upper(&bytes)
        ));

        let raw = self.driver.transmit(&bytes, command.response_capacity())?;
        self.log.line(format_args!(
            "Received {} <<< {}",
            raw.len(),
            hex::encode_upper(&raw)
        ));

        let response = Response::from_bytes(&raw)?;
        self.log.line(format_args!("Processed response {response}"));
        Ok(response)
    }

    /// SELECT the EID application, returning whether the card accepted it
    fn select_application(&mut self) -> Result<bool, SithsManagerError> {
        let response = self.transmit(&Command::select_aid(EID_APPLICATION_ID.to_vec()))?;
        Ok(response.processing_status().is_success())
    }

    /// SELECT a file, fetching the control information the card announces
    fn select_file(&mut self, identifier: [u8; 2]) -> Result<Option<Bytes>, SithsManagerError> {
        let response = self.transmit(&Command::select_file(identifier))?;

        match response.processing_status() {
            ProcessingStatus::SuccessWithResponse(available) => {
                let response = self.transmit(&Command::get_response(available))?;
                match response.processing_status() {
                    ProcessingStatus::Success => response
                        .into_data()
                        .map(Some)
                        .ok_or_else(|| ProtocolError::MissingResponseData("GET RESPONSE").into()),
                    status => Err(ProtocolError::UnexpectedStatus {
                        command: "GET RESPONSE",
                        status,
                    }
                    .into()),
                }
            }
            ProcessingStatus::Success => Ok(response.into_data()),
            status => Err(ProtocolError::UnexpectedStatus {
                command: "SELECT FILE",
                status,
            }
            .into()),
        }
    }

    /// Read the selected file in chunks
    fn read_binary(&mut self, identifier: [u8; 2]) -> Result<Bytes, SithsManagerError> {
        let mut buffer = BytesMut::new();
        let mut chunk_size = self.config.initial_chunk_size;
        let mut corrected = false;

        loop {
            let offset = u16::try_from(buffer.len()).map_err(|_| ProtocolError::FileTooLarge {
                identifier: hex::encode_upper(identifier),
                offset: MAX_OFFSET + 1,
            })?;

            let response = self.transmit(&Command::read_binary(offset, u16::from(chunk_size)))?;

            match response.processing_status() {
                ProcessingStatus::IncorrectExpectedResponseBytes(correct)
                    if correct > 0 && !corrected =>
                {
                    debug!(chunk_size = correct, "Card corrected the expected length");
                    chunk_size = correct;
                    corrected = true;
                }
                ProcessingStatus::Success => {
                    let data = response.data().map_or(&[][..], |data| data.as_ref());
                    let short = data.len() < usize::from(chunk_size);
                    buffer.extend_from_slice(data);

                    if corrected || short {
                        break;
                    }
                    if let Some(limit) = self.config.trailing_padding_limit {
                        if utils::has_trailing_padding(&buffer, limit) {
                            debug!(length = buffer.len(), "Reached file padding");
                            break;
                        }
                    }
                }
                // End of file reached before Le bytes
                ProcessingStatus::Unknown(status) if (status.sw1, status.sw2) == (0x62, 0x82) => {
                    if let Some(data) = response.data() {
                        buffer.extend_from_slice(data);
                    }
                    break;
                }
                // Offset beyond the end of the file
                ProcessingStatus::Unknown(status)
                    if (status.sw1, status.sw2) == (0x6B, 0x00) && !buffer.is_empty() =>
                {
                    break;
                }
                status => {
                    warn!(%status, offset, "READ BINARY failed");
                    return Err(ProtocolError::UnexpectedStatus {
                        command: "READ BINARY",
                        status,
                    }
                    .into());
                }
            }
        }

        Ok(buffer.freeze())
    }
}

/// Find the file identifier a directory entry points at
///
/// PKCS#15 directory files describe each referenced object with a path
/// `3F 00 xx yy`. Two entry shapes are recognised:
///
/// - a context specific element whose first child is a sequence holding
///   only the path
/// - a sequence whose third child is `[1]`, wrapping two levels of sequence
///   around the path
pub fn discover_file_identifier(element: &Asn1Element) -> Option<[u8; 2]> {
    match element {
        Asn1Element::ContextSpecific {
            value: ElementsOrRawValue::Elements(children),
            ..
        } => match children.first()? {
            Asn1Element::Sequence(path) => match path.as_slice() {
                [path] => file_path(path),
                _ => None,
            },
            _ => None,
        },
        Asn1Element::Sequence(children) => match children.get(2)? {
            Asn1Element::ContextSpecific {
                number: 1,
                value: ElementsOrRawValue::Elements(attributes),
            } => {
                let Asn1Element::Sequence(outer) = attributes.first()? else {
                    return None;
                };
                let Asn1Element::Sequence(inner) = outer.first()? else {
                    return None;
                };
                file_path(inner.first()?)
            }
            _ => None,
        },
        _ => None,
    }
}

/// The file identifier of an octet string path below the file system root
fn file_path(element: &Asn1Element) -> Option<[u8; 2]> {
    let Asn1Element::OctetString(ElementsOrRawValue::RawValue(path)) = element else {
        return None;
    };
    match *path.as_ref() {
        [root_high, root_low, high, low] if [root_high, root_low] == FILE_SYSTEM_ROOT => {
            Some([high, low])
        }
        _ => None,
    }
}
