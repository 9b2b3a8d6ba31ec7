//! Streaming element parser

use std::ops::Range;

use bytes::Bytes;
use tracing::{debug, trace};

use crate::element::{Asn1Element, ElementsOrRawValue};
use crate::error::DecodeError;
use crate::oid::ObjectIdentifier;
use crate::tag::{TypeTag, UniversalTag};

/// Deepest level of nested elements the parser follows
///
/// Top-level elements are at depth 0.
pub const MAX_DEPTH: usize = 64;

/// An element together with where it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedElement {
    /// The decoded element
    pub element: Asn1Element,
    /// Byte range of the full encoding (tag, length and content) in the
    /// parser's buffer
    pub range: Range<usize>,
    /// The full encoding of the element
    pub der: Bytes,
}

/// Parser over a buffer of sibling elements
///
/// The parser only keeps a read cursor. Each call to
/// [`parse_element`](Self::parse_element) decodes the next sibling. After the
/// first failure the parser is spent and reports end of input.
#[derive(Debug, Clone)]
pub struct Asn1Parser {
    data: Bytes,
    position: usize,
    failed: bool,
    depth: usize,
}

impl Asn1Parser {
    /// Create a parser positioned at the start of `data`
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self::nested(data.into(), 0)
    }

    /// Create a parser for content at nesting level `depth`
    pub(crate) const fn nested(data: Bytes, depth: usize) -> Self {
        Self {
            data,
            position: 0,
            failed: false,
            depth,
        }
    }

    /// Current read position
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Whether a previous call failed
    pub const fn is_failed(&self) -> bool {
        self.failed
    }

    /// Whether all input has been consumed
    pub fn is_at_end(&self) -> bool {
        self.position >= self.data.len()
    }

    /// Decode every sibling element in `data`
    pub fn parse_all(data: impl Into<Bytes>) -> Result<Vec<Asn1Element>, DecodeError> {
        Self::parse_nested(data.into(), 0)
    }

    fn parse_nested(data: Bytes, depth: usize) -> Result<Vec<Asn1Element>, DecodeError> {
        let mut parser = Self::nested(data, depth);
        let mut elements = Vec::new();
        while let Some(parsed) = parser.parse_element()? {
            elements.push(parsed.element);
        }
        Ok(elements)
    }

    /// Decode the next element
    ///
    /// Returns `Ok(None)` at the end of input and after any earlier failure.
    pub fn parse_element(&mut self) -> Result<Option<ParsedElement>, DecodeError> {
        if self.failed || self.is_at_end() {
            return Ok(None);
        }

        let start = self.position;
        match self.read_element() {
            Ok(element) => {
                let range = start..self.position;
                trace!(tag = %element.type_tag(), ?range, "Parsed element");
                Ok(Some(ParsedElement {
                    element,
                    der: self.data.slice(range.clone()),
                    range,
                }))
            }
            Err(error) => {
                debug!(%error, position = start, "Element decoding failed");
                self.failed = true;
                Err(error)
            }
        }
    }

    fn read_element(&mut self) -> Result<Asn1Element, DecodeError> {
        if self.depth > MAX_DEPTH {
            return Err(DecodeError::NestingTooDeep(MAX_DEPTH));
        }

        let tag = TypeTag::from_byte(self.read_byte()?)?;
        let length = self.read_length()?;
        let content = self.read_content(length)?;
        decode_content(tag, content, self.depth + 1)
    }

    fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    fn read_byte(&mut self) -> Result<u8, DecodeError> {
        let byte = *self.data.get(self.position).ok_or(DecodeError::Truncated {
            needed: 1,
            available: 0,
        })?;
        self.position += 1;
        Ok(byte)
    }

    fn read_length(&mut self) -> Result<usize, DecodeError> {
        let first = self.read_byte()?;
        if first & 0x80 == 0 {
            return Ok(usize::from(first));
        }

        // Zero octets is the indefinite form, which DER never uses
        let octets = usize::from(first & 0x7F);
        if octets == 0 || octets > size_of::<usize>() {
            return Err(DecodeError::InvalidLength(octets));
        }
        if octets > self.remaining() {
            return Err(DecodeError::Truncated {
                needed: octets,
                available: self.remaining(),
            });
        }

        let length = self.data[self.position..self.position + octets]
            .iter()
            .fold(0usize, |length, &byte| (length << 8) | usize::from(byte));
        self.position += octets;
        Ok(length)
    }

    fn read_content(&mut self, length: usize) -> Result<Bytes, DecodeError> {
        if length > self.remaining() {
            return Err(DecodeError::Truncated {
                needed: length,
                available: self.remaining(),
            });
        }

        let content = self.data.slice(self.position..self.position + length);
        self.position += length;
        Ok(content)
    }
}

impl Iterator for Asn1Parser {
    type Item = ParsedElement;

    fn next(&mut self) -> Option<Self::Item> {
        self.parse_element().ok().flatten()
    }
}

/// Decode element content whose nested elements sit at `depth`
fn decode_content(tag: TypeTag, content: Bytes, depth: usize) -> Result<Asn1Element, DecodeError> {
    let universal = match tag {
        TypeTag::Universal(universal) => universal,
        TypeTag::ContextSpecific(number) => {
            return Ok(Asn1Element::ContextSpecific {
                number,
                value: ElementsOrRawValue::from_nested(content, depth),
            });
        }
        TypeTag::Application(number) => {
            return Ok(Asn1Element::Application {
                number,
                value: ElementsOrRawValue::from_nested(content, depth),
            });
        }
        TypeTag::Unknown(tag) => return Ok(Asn1Element::Unknown { tag, value: content }),
    };

    Ok(match universal {
        UniversalTag::Boolean => {
            let first = content.first().ok_or(DecodeError::InvalidBoolean)?;
            Asn1Element::Boolean(*first == 0xFF)
        }
        UniversalTag::Integer => Asn1Element::Integer(content),
        UniversalTag::BitString => {
            Asn1Element::BitString(ElementsOrRawValue::from_nested(content, depth))
        }
        UniversalTag::OctetString => {
            Asn1Element::OctetString(ElementsOrRawValue::from_nested(content, depth))
        }
        UniversalTag::Null => Asn1Element::Null,
        UniversalTag::ObjectIdentifier => {
            Asn1Element::ObjectIdentifier(ObjectIdentifier::from_bytes(&content))
        }
        UniversalTag::Utf8String => Asn1Element::Utf8String(decode_utf8(universal, &content)?),
        UniversalTag::UtcTime => Asn1Element::UtcTime(decode_utf8(universal, &content)?),
        UniversalTag::PrintableString => {
            Asn1Element::PrintableString(decode_ascii(universal, &content)?)
        }
        UniversalTag::Ia5String => Asn1Element::Ia5String(decode_ascii(universal, &content)?),
        UniversalTag::Sequence => Asn1Element::Sequence(Asn1Parser::parse_nested(content, depth)?),
        UniversalTag::Set => Asn1Element::Set(Asn1Parser::parse_nested(content, depth)?),
    })
}

fn decode_utf8(tag: UniversalTag, content: &[u8]) -> Result<String, DecodeError> {
    std::str::from_utf8(content)
        .map(str::to_owned)
        .map_err(|_| DecodeError::InvalidString(tag))
}

fn decode_ascii(tag: UniversalTag, content: &[u8]) -> Result<String, DecodeError> {
    if !content.is_ascii() {
        return Err(DecodeError::InvalidString(tag));
    }
    decode_utf8(tag, content)
}
