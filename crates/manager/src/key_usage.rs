//! X.509 key usage flags

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Key usage bits as found in the second byte of the keyUsage BIT STRING
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct KeyUsage(u8);

impl KeyUsage {
    /// digitalSignature
    pub const DIGITAL_SIGNATURE: Self = Self(0x80);
    /// nonRepudiation
    pub const NON_REPUDIATION: Self = Self(0x40);
    /// keyEncipherment
    pub const KEY_ENCIPHERMENT: Self = Self(0x20);
    /// dataEncipherment
    pub const DATA_ENCIPHERMENT: Self = Self(0x10);
    /// keyAgreement
    pub const KEY_AGREEMENT: Self = Self(0x08);
    /// keyCertSign
    pub const KEY_CERT_SIGN: Self = Self(0x04);
    /// cRLSign
    pub const CRL_SIGN: Self = Self(0x02);

    const NAMES: [(Self, &'static str); 7] = [
        (Self::DIGITAL_SIGNATURE, "digitalSignature"),
        (Self::NON_REPUDIATION, "nonRepudiation"),
        (Self::KEY_ENCIPHERMENT, "keyEncipherment"),
        (Self::DATA_ENCIPHERMENT, "dataEncipherment"),
        (Self::KEY_AGREEMENT, "keyAgreement"),
        (Self::KEY_CERT_SIGN, "keyCertSign"),
        (Self::CRL_SIGN, "cRLSign"),
    ];

    /// No flags
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Flags from a raw byte, all bits kept
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Raw byte
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Whether every flag of `other` is set
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether no flag is set
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Both flag sets combined
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Decode the raw content of a keyUsage BIT STRING
    ///
    /// The content is the unused-bits byte followed by one byte of flags.
    pub fn from_bit_string(raw: &[u8]) -> Option<Self> {
        match raw {
            [_unused_bits, flags] => Some(Self(*flags)),
            _ => None,
        }
    }
}

impl BitOr for KeyUsage {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitOrAssign for KeyUsage {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.union(rhs);
    }
}

impl fmt::Display for KeyUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = Self::NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        if names.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", names.join(", "))
        }
    }
}
