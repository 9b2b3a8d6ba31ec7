//! Decoded ASN.1 element tree

use std::fmt;

use bytes::Bytes;
use tracing::trace;

use crate::oid::ObjectIdentifier;
use crate::parser::Asn1Parser;
use crate::tag::{TypeTag, UniversalTag};

/// Content of a container whose encoding may or may not be nested BER
///
/// OCTET STRING, BIT STRING, application and context-specific elements carry
/// either nested elements or opaque bytes. Exactly one of the two is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementsOrRawValue {
    /// The content decoded cleanly into known elements
    Elements(Vec<Asn1Element>),
    /// The content is kept as-is
    RawValue(Bytes),
}

impl ElementsOrRawValue {
    /// Resolve container content
    ///
    /// The content is kept raw when the nested decode fails, leaves bytes
    /// unconsumed, produces no elements or produces an unknown element.
    pub fn from_content(content: Bytes) -> Self {
        Self::from_nested(content, 1)
    }

    /// Resolve content whose nested elements sit at `depth`
    ///
    /// Content nested deeper than [`MAX_DEPTH`](crate::parser::MAX_DEPTH) is
    /// kept raw.
    pub(crate) fn from_nested(content: Bytes, depth: usize) -> Self {
        let mut parser = Asn1Parser::nested(content.clone(), depth);
        let mut elements = Vec::new();

        loop {
            match parser.parse_element() {
                Ok(Some(parsed)) => {
                    if matches!(parsed.element, Asn1Element::Unknown { .. }) {
                        return Self::RawValue(content);
                    }
                    elements.push(parsed.element);
                }
                Ok(None) => break,
                Err(error) => {
                    trace!(%error, "Keeping container content raw");
                    return Self::RawValue(content);
                }
            }
        }

        if elements.is_empty() {
            Self::RawValue(content)
        } else {
            Self::Elements(elements)
        }
    }

    /// Nested elements, when the content decoded
    pub fn elements(&self) -> Option<&[Asn1Element]> {
        match self {
            Self::Elements(elements) => Some(elements),
            Self::RawValue(_) => None,
        }
    }

    /// Raw content, when it did not decode
    pub const fn raw_value(&self) -> Option<&Bytes> {
        match self {
            Self::Elements(_) => None,
            Self::RawValue(raw) => Some(raw),
        }
    }
}

/// A decoded ASN.1 element
///
/// Each element owns its children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Asn1Element {
    /// Element with a tag outside the known table
    Unknown {
        /// The raw tag byte
        tag: u8,
        /// Content bytes
        value: Bytes,
    },
    /// BOOLEAN, true when the first content byte is 0xFF
    Boolean(bool),
    /// INTEGER as signed big-endian bytes of arbitrary length
    Integer(Bytes),
    /// BIT STRING including its unused-bits byte
    BitString(ElementsOrRawValue),
    /// OCTET STRING
    OctetString(ElementsOrRawValue),
    /// OBJECT IDENTIFIER
    ObjectIdentifier(ObjectIdentifier),
    /// UTF8String
    Utf8String(String),
    /// PrintableString
    PrintableString(String),
    /// IA5String
    Ia5String(String),
    /// UTCTime, kept as its textual form
    UtcTime(String),
    /// NULL
    Null,
    /// SEQUENCE
    Sequence(Vec<Asn1Element>),
    /// SET, in encoding order
    Set(Vec<Asn1Element>),
    /// Context-specific element
    ContextSpecific {
        /// Tag number
        number: u8,
        /// Content
        value: ElementsOrRawValue,
    },
    /// Application element
    Application {
        /// Tag number
        number: u8,
        /// Content
        value: ElementsOrRawValue,
    },
}

impl Asn1Element {
    /// Tag this element was decoded from
    pub const fn type_tag(&self) -> TypeTag {
        match self {
            Self::Unknown { tag, .. } => TypeTag::Unknown(*tag),
            Self::Boolean(_) => TypeTag::Universal(UniversalTag::Boolean),
            Self::Integer(_) => TypeTag::Universal(UniversalTag::Integer),
            Self::BitString(_) => TypeTag::Universal(UniversalTag::BitString),
            Self::OctetString(_) => TypeTag::Universal(UniversalTag::OctetString),
            Self::ObjectIdentifier(_) => TypeTag::Universal(UniversalTag::ObjectIdentifier),
            Self::Utf8String(_) => TypeTag::Universal(UniversalTag::Utf8String),
            Self::PrintableString(_) => TypeTag::Universal(UniversalTag::PrintableString),
            Self::Ia5String(_) => TypeTag::Universal(UniversalTag::Ia5String),
            Self::UtcTime(_) => TypeTag::Universal(UniversalTag::UtcTime),
            Self::Null => TypeTag::Universal(UniversalTag::Null),
            Self::Sequence(_) => TypeTag::Universal(UniversalTag::Sequence),
            Self::Set(_) => TypeTag::Universal(UniversalTag::Set),
            Self::ContextSpecific { number, .. } => TypeTag::ContextSpecific(*number),
            Self::Application { number, .. } => TypeTag::Application(*number),
        }
    }

    /// Children of a SEQUENCE
    pub fn as_sequence(&self) -> Option<&[Self]> {
        match self {
            Self::Sequence(children) => Some(children),
            _ => None,
        }
    }

    /// Children of a SET
    pub fn as_set(&self) -> Option<&[Self]> {
        match self {
            Self::Set(children) => Some(children),
            _ => None,
        }
    }

    /// Nested elements of any container that has them
    pub fn children(&self) -> Option<&[Self]> {
        match self {
            Self::Sequence(children) | Self::Set(children) => Some(children),
            Self::BitString(value)
            | Self::OctetString(value)
            | Self::ContextSpecific { value, .. }
            | Self::Application { value, .. } => value.elements(),
            _ => None,
        }
    }

    /// Text of any string type
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Utf8String(text)
            | Self::PrintableString(text)
            | Self::Ia5String(text)
            | Self::UtcTime(text) => Some(text),
            _ => None,
        }
    }

    /// Value of an INTEGER that fits in 64 bits
    pub fn as_i64(&self) -> Option<i64> {
        let Self::Integer(bytes) = self else {
            return None;
        };
        if bytes.is_empty() || bytes.len() > 8 {
            return None;
        }

        let fill = if bytes[0] & 0x80 != 0 { 0xFF } else { 0x00 };
        let mut buffer = [fill; 8];
        buffer[8 - bytes.len()..].copy_from_slice(bytes);
        Some(i64::from_be_bytes(buffer))
    }

    fn fmt_tree(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let indent = depth * 2;
        write!(f, "{:indent$}{}", "", self.type_tag())?;

        match self {
            Self::Unknown { value, .. } | Self::Integer(value) => {
                writeln!(f, " {}", hex::encode_upper(value))
            }
            Self::Boolean(value) => writeln!(f, " {value}"),
            Self::ObjectIdentifier(oid) => writeln!(f, " {oid}"),
            Self::Utf8String(text)
            | Self::PrintableString(text)
            | Self::Ia5String(text)
            | Self::UtcTime(text) => writeln!(f, " \"{text}\""),
            Self::Null => writeln!(f),
            Self::Sequence(children) | Self::Set(children) => {
                writeln!(f)?;
                children
                    .iter()
                    .try_for_each(|child| child.fmt_tree(f, depth + 1))
            }
            Self::BitString(value)
            | Self::OctetString(value)
            | Self::ContextSpecific { value, .. }
            | Self::Application { value, .. } => match value {
                ElementsOrRawValue::Elements(children) => {
                    writeln!(f)?;
                    children
                        .iter()
                        .try_for_each(|child| child.fmt_tree(f, depth + 1))
                }
                ElementsOrRawValue::RawValue(raw) => writeln!(f, " {}", hex::encode_upper(raw)),
            },
        }
    }
}

impl fmt::Display for Asn1Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_tree(f, 0)
    }
}
