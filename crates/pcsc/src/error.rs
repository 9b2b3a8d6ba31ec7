//! Error types for the PC/SC driver

use siths_card_core::SmartcardStatus;

/// PC/SC-specific errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PcscError {
    /// PC/SC error
    #[error("PC/SC error: {0}")]
    Pcsc(#[from] pcsc::Error),

    /// No readers available
    #[error("No readers available")]
    NoReadersAvailable,

    /// Reader not found
    #[error("Reader not found: {0}")]
    ReaderNotFound(String),

    /// The monitor thread could not be started
    #[error("Spawning monitor thread failed: {0}")]
    Spawn(String),
}

impl From<PcscError> for SmartcardStatus {
    fn from(error: PcscError) -> Self {
        match error {
            PcscError::Pcsc(error) => status_from_pcsc(error),
            PcscError::NoReadersAvailable | PcscError::ReaderNotFound(_) => Self::ReaderUnavailable,
            PcscError::Spawn(_) => Self::Undefined,
        }
    }
}

/// Driver status for a PC/SC error
pub const fn status_from_pcsc(error: pcsc::Error) -> SmartcardStatus {
    match error {
        pcsc::Error::InvalidParameter => SmartcardStatus::InvalidParameter,
        pcsc::Error::SharingViolation => SmartcardStatus::SharingViolation,
        pcsc::Error::NoSmartcard => SmartcardStatus::NoSmartcard,
        pcsc::Error::ProtoMismatch => SmartcardStatus::ProtocolMismatch,
        pcsc::Error::NotReady => SmartcardStatus::NotReady,
        pcsc::Error::InvalidValue => SmartcardStatus::InvalidValue,
        pcsc::Error::ReaderUnavailable
        | pcsc::Error::UnknownReader
        | pcsc::Error::NoReadersAvailable
        | pcsc::Error::NoService
        | pcsc::Error::ServiceStopped => SmartcardStatus::ReaderUnavailable,
        #[cfg(target_os = "windows")]
        pcsc::Error::Unexpected => SmartcardStatus::Unexpected,
        pcsc::Error::CommError => SmartcardStatus::Unexpected,
        pcsc::Error::UnsupportedCard | pcsc::Error::CardUnsupported => {
            SmartcardStatus::UnsupportedCard
        }
        pcsc::Error::UnresponsiveCard => SmartcardStatus::UnresponsiveCard,
        pcsc::Error::UnpoweredCard => SmartcardStatus::UnpoweredCard,
        pcsc::Error::ResetCard => SmartcardStatus::ResetCard,
        pcsc::Error::RemovedCard => SmartcardStatus::RemovedCard,
        pcsc::Error::InvalidHandle => SmartcardStatus::NotConnected,
        pcsc::Error::UnsupportedFeature => SmartcardStatus::NotSupported,
        _ => SmartcardStatus::Undefined,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_from_pcsc(pcsc::Error::NoSmartcard),
            SmartcardStatus::NoSmartcard
        );
        assert_eq!(
            status_from_pcsc(pcsc::Error::ProtoMismatch),
            SmartcardStatus::ProtocolMismatch
        );
        assert_eq!(
            status_from_pcsc(pcsc::Error::NoReadersAvailable),
            SmartcardStatus::ReaderUnavailable
        );
        assert_eq!(
            status_from_pcsc(pcsc::Error::RemovedCard),
            SmartcardStatus::RemovedCard
        );
        assert_eq!(
            status_from_pcsc(pcsc::Error::InsufficientBuffer),
            SmartcardStatus::Undefined
        );
    }

    #[test]
    fn test_driver_errors() {
        assert_eq!(
            SmartcardStatus::from(PcscError::ReaderNotFound("ACS ACR39U".into())),
            SmartcardStatus::ReaderUnavailable
        );
        assert_eq!(
            SmartcardStatus::from(PcscError::Pcsc(pcsc::Error::UnpoweredCard)),
            SmartcardStatus::UnpoweredCard
        );
        assert_eq!(
            PcscError::ReaderNotFound("ACS ACR39U".into()).to_string(),
            "Reader not found: ACS ACR39U"
        );
    }
}
