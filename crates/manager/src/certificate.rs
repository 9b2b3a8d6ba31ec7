//! SITHS certificate extraction
//!
//! Certificates are recognised purely by shape. The decoded tree must look
//! like an X.509 certificate whose extensions carry exactly the
//! digitalSignature and keyEncipherment key usages together with a SITHS
//! card number. Anything else is not an error, just not a SITHS
//! authentication certificate.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use bytes::Bytes;
use siths_asn1::{Asn1Element, Asn1Parser, ElementsOrRawValue, ObjectIdentifier, ParsedElement};
use tracing::trace;

use crate::key_usage::KeyUsage;

/// Number of low serial number bytes shown in [`SithsCardCertificate::serial_string`]
const SERIAL_STRING_BYTES: usize = 16;

/// Minimum number of fields in the to-be-signed certificate body
const TBS_MIN_FIELDS: usize = 8;

const TBS_SERIAL_NUMBER: usize = 1;
const TBS_SUBJECT: usize = 5;
const TBS_FIRST_OPTIONAL: usize = 7;
const EXTENSIONS_TAG_NUMBER: u8 = 3;

/// A certificate read from a SITHS card
///
/// Two certificates are equal when they were decoded from identical bytes.
#[derive(Debug, Clone)]
pub struct SithsCardCertificate {
    root_element: Asn1Element,
    der_data: Bytes,
    card_number: String,
    serial_number: Bytes,
    serial_string: String,
    subject: HashMap<ObjectIdentifier, String>,
    key_usage: KeyUsage,
}

impl SithsCardCertificate {
    /// The only key usage accepted for a SITHS authentication certificate
    pub const REQUIRED_KEY_USAGE: KeyUsage =
        KeyUsage::DIGITAL_SIGNATURE.union(KeyUsage::KEY_ENCIPHERMENT);

    /// Extract a certificate from a decoded element and the bytes it was
    /// decoded from
    pub fn extract(root: &Asn1Element, der_data: Bytes) -> Option<Self> {
        let body = tbs_body(root)?;
        let serial_number = serial_number(body)?.clone();
        let subject = subject_attributes(body)?;

        let mut key_usage = None;
        let mut card_number = None;
        for extension in extensions(body) {
            if let Some(usage) = key_usage_extension(extension) {
                key_usage = Some(usage);
            } else if let Some(number) = card_number_extension(extension) {
                card_number = Some(number);
            }
        }

        let key_usage = key_usage?;
        if key_usage != Self::REQUIRED_KEY_USAGE {
            trace!(%key_usage, "Skipping certificate with other key usage");
            return None;
        }
        let card_number = card_number?;

        Some(Self {
            root_element: root.clone(),
            der_data,
            card_number,
            serial_string: serial_string(&serial_number),
            serial_number,
            subject,
            key_usage,
        })
    }

    /// Extract a certificate from a parsed element
    pub fn from_parsed(parsed: &ParsedElement) -> Option<Self> {
        Self::extract(&parsed.element, parsed.der.clone())
    }

    /// Decode the first element of `der` and extract a certificate from it
    pub fn from_der(der: impl Into<Bytes>) -> Option<Self> {
        let parsed = Asn1Parser::new(der).parse_element().ok()??;
        Self::from_parsed(&parsed)
    }

    /// The decoded certificate
    pub const fn root_element(&self) -> &Asn1Element {
        &self.root_element
    }

    /// Encoding the certificate was decoded from
    pub const fn der_data(&self) -> &Bytes {
        &self.der_data
    }

    /// SITHS card number
    pub fn card_number(&self) -> &str {
        &self.card_number
    }

    /// Serial number as the signed big-endian INTEGER content
    pub const fn serial_number(&self) -> &Bytes {
        &self.serial_number
    }

    /// Uppercase hex of the low 16 bytes of the serial number
    pub fn serial_string(&self) -> &str {
        &self.serial_string
    }

    /// Subject attributes
    pub const fn subject(&self) -> &HashMap<ObjectIdentifier, String> {
        &self.subject
    }

    /// Value of a single subject attribute
    pub fn subject_attribute(&self, oid: &ObjectIdentifier) -> Option<&str> {
        self.subject.get(oid).map(String::as_str)
    }

    /// Key usage of the certificate
    pub const fn key_usage(&self) -> KeyUsage {
        self.key_usage
    }
}

impl PartialEq for SithsCardCertificate {
    fn eq(&self, other: &Self) -> bool {
        self.der_data == other.der_data
    }
}

impl Eq for SithsCardCertificate {}

impl Hash for SithsCardCertificate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.der_data.hash(state);
    }
}

fn tbs_body(root: &Asn1Element) -> Option<&[Asn1Element]> {
    let body = root.as_sequence()?.first()?.as_sequence()?;
    (body.len() >= TBS_MIN_FIELDS).then_some(body)
}

fn serial_number(body: &[Asn1Element]) -> Option<&Bytes> {
    match body.get(TBS_SERIAL_NUMBER)? {
        Asn1Element::Integer(serial) => Some(serial),
        _ => None,
    }
}

fn serial_string(serial: &[u8]) -> String {
    let start = serial.len().saturating_sub(SERIAL_STRING_BYTES);
    hex::encode_upper(&serial[start..])
}

fn subject_attributes(body: &[Asn1Element]) -> Option<HashMap<ObjectIdentifier, String>> {
    let name = body.get(TBS_SUBJECT)?.as_sequence()?;

    let attributes = name
        .iter()
        .filter_map(Asn1Element::as_set)
        .flatten()
        .filter_map(attribute_type_and_value)
        .collect();
    Some(attributes)
}

fn attribute_type_and_value(entry: &Asn1Element) -> Option<(ObjectIdentifier, String)> {
    match entry.as_sequence()? {
        [
            Asn1Element::ObjectIdentifier(oid),
            Asn1Element::Utf8String(value) | Asn1Element::PrintableString(value),
        ] => Some((oid.clone(), value.clone())),
        _ => None,
    }
}

fn extensions(body: &[Asn1Element]) -> impl Iterator<Item = &[Asn1Element]> {
    body.iter()
        .skip(TBS_FIRST_OPTIONAL)
        .find_map(|field| match field {
            Asn1Element::ContextSpecific {
                number: EXTENSIONS_TAG_NUMBER,
                value: ElementsOrRawValue::Elements(children),
            } => children.first()?.as_sequence(),
            _ => None,
        })
        .unwrap_or_default()
        .iter()
        .filter_map(Asn1Element::as_sequence)
}

/// The value of an extension is the last field, after the optional
/// criticality flag.
fn extension_value<'a>(
    extension: &'a [Asn1Element],
    expected: &ObjectIdentifier,
) -> Option<&'a [Asn1Element]> {
    match extension {
        [Asn1Element::ObjectIdentifier(oid), .., Asn1Element::OctetString(value)]
            if oid == expected =>
        {
            value.elements()
        }
        _ => None,
    }
}

fn key_usage_extension(extension: &[Asn1Element]) -> Option<KeyUsage> {
    match extension_value(extension, &ObjectIdentifier::KeyUsage)? {
        [Asn1Element::BitString(ElementsOrRawValue::RawValue(raw))] => {
            KeyUsage::from_bit_string(raw)
        }
        _ => None,
    }
}

fn card_number_extension(extension: &[Asn1Element]) -> Option<String> {
    match extension_value(extension, &ObjectIdentifier::CardNumber)? {
        [Asn1Element::PrintableString(number)] => Some(number.clone()),
        _ => None,
    }
}
