//! Object identifier registry
//!
//! Only the identifiers that SITHS certificate extraction looks at are given
//! names. Everything else is kept as [`ObjectIdentifier::Undefined`] with its
//! encoded bytes so it can still be printed and compared.

use std::fmt;

use bytes::Bytes;

mod encoded {
    pub(super) const SHA1_WITH_RSA_ENCRYPTION: &[u8] =
        &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x01, 0x05];
    pub(super) const COUNTRY_NAME: &[u8] = &[0x55, 0x04, 0x06];
    pub(super) const ORGANIZATION_NAME: &[u8] = &[0x55, 0x04, 0x0A];
    pub(super) const COMMON_NAME: &[u8] = &[0x55, 0x04, 0x03];
    pub(super) const SURNAME: &[u8] = &[0x55, 0x04, 0x04];
    pub(super) const GIVEN_NAME: &[u8] = &[0x55, 0x04, 0x2A];
    pub(super) const SERIAL_NUMBER: &[u8] = &[0x55, 0x04, 0x05];
    pub(super) const TITLE: &[u8] = &[0x55, 0x04, 0x0C];
    pub(super) const KEY_USAGE: &[u8] = &[0x55, 0x1D, 0x0F];
    pub(super) const SUBJECT_DIRECTORY_ATTRIBUTES: &[u8] = &[0x55, 0x1D, 0x09];
    pub(super) const CARD_NUMBER: &[u8] = &[0x2A, 0x85, 0x70, 0x22, 0x02, 0x01];
}

/// Object identifier resolved to its meaning
///
/// Equality is by resolved identity. Two [`Undefined`](Self::Undefined)
/// identifiers are equal when their encodings are.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ObjectIdentifier {
    /// 1.2.840.113549.1.1.5
    Sha1WithRsaEncryption,
    /// 2.5.4.6
    CountryName,
    /// 2.5.4.10
    OrganizationName,
    /// 2.5.4.3
    CommonName,
    /// 2.5.4.4
    Surname,
    /// 2.5.4.42
    GivenName,
    /// 2.5.4.5
    SerialNumber,
    /// 2.5.4.12
    Title,
    /// 2.5.29.15
    KeyUsage,
    /// 2.5.29.9
    SubjectDirectoryAttributes,
    /// 1.2.752.34.2.1, the SITHS card number extension
    CardNumber,
    /// Any identifier not in the registry, with its content bytes
    Undefined(Bytes),
}

impl ObjectIdentifier {
    /// Resolve the content bytes of an OBJECT IDENTIFIER element
    pub fn from_bytes(bytes: &[u8]) -> Self {
        match bytes {
            encoded::SHA1_WITH_RSA_ENCRYPTION => Self::Sha1WithRsaEncryption,
            encoded::COUNTRY_NAME => Self::CountryName,
            encoded::ORGANIZATION_NAME => Self::OrganizationName,
            encoded::COMMON_NAME => Self::CommonName,
            encoded::SURNAME => Self::Surname,
            encoded::GIVEN_NAME => Self::GivenName,
            encoded::SERIAL_NUMBER => Self::SerialNumber,
            encoded::TITLE => Self::Title,
            encoded::KEY_USAGE => Self::KeyUsage,
            encoded::SUBJECT_DIRECTORY_ATTRIBUTES => Self::SubjectDirectoryAttributes,
            encoded::CARD_NUMBER => Self::CardNumber,
            other => Self::Undefined(Bytes::copy_from_slice(other)),
        }
    }

    /// Content bytes of this identifier
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Sha1WithRsaEncryption => encoded::SHA1_WITH_RSA_ENCRYPTION,
            Self::CountryName => encoded::COUNTRY_NAME,
            Self::OrganizationName => encoded::ORGANIZATION_NAME,
            Self::CommonName => encoded::COMMON_NAME,
            Self::Surname => encoded::SURNAME,
            Self::GivenName => encoded::GIVEN_NAME,
            Self::SerialNumber => encoded::SERIAL_NUMBER,
            Self::Title => encoded::TITLE,
            Self::KeyUsage => encoded::KEY_USAGE,
            Self::SubjectDirectoryAttributes => encoded::SUBJECT_DIRECTORY_ATTRIBUTES,
            Self::CardNumber => encoded::CARD_NUMBER,
            Self::Undefined(bytes) => bytes,
        }
    }

    /// Whether the identifier is in the registry
    pub const fn is_defined(&self) -> bool {
        !matches!(self, Self::Undefined(_))
    }

    /// Conventional name of a registered identifier
    pub const fn name(&self) -> Option<&'static str> {
        Some(match self {
            Self::Sha1WithRsaEncryption => "sha1WithRSAEncryption",
            Self::CountryName => "countryName",
            Self::OrganizationName => "organizationName",
            Self::CommonName => "commonName",
            Self::Surname => "surname",
            Self::GivenName => "givenName",
            Self::SerialNumber => "serialNumber",
            Self::Title => "title",
            Self::KeyUsage => "keyUsage",
            Self::SubjectDirectoryAttributes => "subjectDirectoryAttributes",
            Self::CardNumber => "cardNumber",
            Self::Undefined(_) => return None,
        })
    }

    /// Decode the arcs of the identifier
    ///
    /// Returns `None` when the encoding ends inside a sub-identifier or an
    /// arc does not fit in a `u64`.
    pub fn arcs(&self) -> Option<Vec<u64>> {
        let mut sub_identifiers = Vec::new();
        let mut value: u64 = 0;
        let mut pending = false;

        for &byte in self.as_bytes() {
            if value > (u64::MAX >> 7) {
                return None;
            }
            value = (value << 7) | u64::from(byte & 0x7F);
            pending = byte & 0x80 != 0;
            if !pending {
                sub_identifiers.push(value);
                value = 0;
            }
        }

        if pending {
            return None;
        }

        let (&first, rest) = sub_identifiers.split_first()?;
        let (root, second) = match first {
            0..40 => (0, first),
            40..80 => (1, first - 40),
            _ => (2, first - 80),
        };

        let mut arcs = Vec::with_capacity(sub_identifiers.len() + 1);
        arcs.push(root);
        arcs.push(second);
        arcs.extend_from_slice(rest);
        Some(arcs)
    }

    /// Dotted-decimal rendering, or the hex encoding when malformed
    pub fn dotted(&self) -> String {
        self.arcs().map_or_else(
            || hex::encode_upper(self.as_bytes()),
            |arcs| {
                arcs.iter()
                    .map(u64::to_string)
                    .collect::<Vec<_>>()
                    .join(".")
            },
        )
    }
}

impl fmt::Display for ObjectIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name} ({})", self.dotted()),
            None => write!(f, "{}", self.dotted()),
        }
    }
}
