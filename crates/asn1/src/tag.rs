//! Tag byte classification

use std::fmt;

use crate::error::DecodeError;

/// Universal class tags understood by the decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
#[repr(u8)]
pub enum UniversalTag {
    /// BOOLEAN
    #[display("BOOLEAN")]
    Boolean = 0x01,
    /// INTEGER
    #[display("INTEGER")]
    Integer = 0x02,
    /// BIT STRING
    #[display("BIT STRING")]
    BitString = 0x03,
    /// OCTET STRING
    #[display("OCTET STRING")]
    OctetString = 0x04,
    /// NULL
    #[display("NULL")]
    Null = 0x05,
    /// OBJECT IDENTIFIER
    #[display("OBJECT IDENTIFIER")]
    ObjectIdentifier = 0x06,
    /// UTF8String
    #[display("UTF8String")]
    Utf8String = 0x0C,
    /// PrintableString
    #[display("PrintableString")]
    PrintableString = 0x13,
    /// IA5String
    #[display("IA5String")]
    Ia5String = 0x16,
    /// UTCTime
    #[display("UTCTime")]
    UtcTime = 0x17,
    /// SEQUENCE (constructed)
    #[display("SEQUENCE")]
    Sequence = 0x30,
    /// SET (constructed)
    #[display("SET")]
    Set = 0x31,
}

impl UniversalTag {
    /// Look up a universal tag by its exact tag byte
    pub const fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0x01 => Self::Boolean,
            0x02 => Self::Integer,
            0x03 => Self::BitString,
            0x04 => Self::OctetString,
            0x05 => Self::Null,
            0x06 => Self::ObjectIdentifier,
            0x0C => Self::Utf8String,
            0x13 => Self::PrintableString,
            0x16 => Self::Ia5String,
            0x17 => Self::UtcTime,
            0x30 => Self::Sequence,
            0x31 => Self::Set,
            _ => return None,
        })
    }

    /// The tag byte of this type
    pub const fn to_byte(self) -> u8 {
        self as u8
    }
}

/// Classified tag byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    /// A universal type from the fixed table
    Universal(UniversalTag),
    /// Application class, low five bits as number
    Application(u8),
    /// Context-specific class, low five bits as number
    ContextSpecific(u8),
    /// Any other tag byte
    Unknown(u8),
}

impl TypeTag {
    /// Byte used as padding after the last element of a card file
    pub const PADDING: u8 = 0xFF;

    const CLASS_CONTEXT_SPECIFIC: u8 = 0x80;
    const CLASS_APPLICATION: u8 = 0x40;
    const NUMBER_MASK: u8 = 0x1F;

    /// Classify a tag byte
    ///
    /// Bytes with the high bit set are context-specific, bytes with only the
    /// second bit set are application class. 0xFF is never a tag.
    pub const fn from_byte(byte: u8) -> Result<Self, DecodeError> {
        if byte == Self::PADDING {
            return Err(DecodeError::InvalidTag(byte));
        }

        if byte & Self::CLASS_CONTEXT_SPECIFIC != 0 {
            Ok(Self::ContextSpecific(byte & Self::NUMBER_MASK))
        } else if byte & Self::CLASS_APPLICATION != 0 {
            Ok(Self::Application(byte & Self::NUMBER_MASK))
        } else {
            match UniversalTag::from_byte(byte) {
                Some(tag) => Ok(Self::Universal(tag)),
                None => Ok(Self::Unknown(byte)),
            }
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Universal(tag) => write!(f, "{tag}"),
            Self::Application(number) => write!(f, "[APPLICATION {number}]"),
            Self::ContextSpecific(number) => write!(f, "[{number}]"),
            Self::Unknown(byte) => write!(f, "UNKNOWN {byte:#04x}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_universal_table() {
        assert_eq!(
            TypeTag::from_byte(0x30),
            Ok(TypeTag::Universal(UniversalTag::Sequence))
        );
        assert_eq!(
            TypeTag::from_byte(0x0C),
            Ok(TypeTag::Universal(UniversalTag::Utf8String))
        );
        assert_eq!(UniversalTag::Set.to_byte(), 0x31);
        assert_eq!(TypeTag::from_byte(0x1E), Ok(TypeTag::Unknown(0x1E)));
    }

    #[test]
    fn test_class_bits() {
        assert_eq!(TypeTag::from_byte(0xA3), Ok(TypeTag::ContextSpecific(3)));
        assert_eq!(TypeTag::from_byte(0x81), Ok(TypeTag::ContextSpecific(1)));
        assert_eq!(TypeTag::from_byte(0x61), Ok(TypeTag::Application(1)));
        assert_eq!(TypeTag::from_byte(0x7F), Ok(TypeTag::Application(0x1F)));
    }

    #[test]
    fn test_padding_is_invalid() {
        assert_eq!(TypeTag::from_byte(0xFF), Err(DecodeError::InvalidTag(0xFF)));
    }

    #[test]
    fn test_display() {
        assert_eq!(TypeTag::ContextSpecific(0).to_string(), "[0]");
        assert_eq!(
            TypeTag::Universal(UniversalTag::OctetString).to_string(),
            "OCTET STRING"
        );
    }
}
