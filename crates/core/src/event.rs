//! Events that drive a card session

/// External trigger for a card session
///
/// Events carry no payload beyond their occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ReaderEvent {
    /// A card was inserted into the reader
    #[display("card inserted")]
    CardInserted,
    /// The card was removed from the reader
    #[display("card removed")]
    CardRemoved,
    /// The reader accessory was attached
    #[display("accessory connected")]
    AccessoryConnected,
    /// The reader accessory was detached
    #[display("accessory disconnected")]
    AccessoryDisconnected,
    /// The application became active
    #[display("application foreground")]
    AppForeground,
    /// The application is about to become inactive
    #[display("application background")]
    AppBackground,
}
