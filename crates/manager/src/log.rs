//! Diagnostic lines for log observers

use std::fmt;

use crossbeam_channel::Sender;
use tracing::debug;

use crate::observer::Notification;

/// Sink for verbose free text diagnostics
///
/// Every line goes to `tracing` at debug level and to the log observers.
#[derive(Debug, Clone)]
pub(crate) struct DiagnosticLog {
    notifications: Option<Sender<Notification>>,
}

impl DiagnosticLog {
    pub(crate) const fn new(notifications: Sender<Notification>) -> Self {
        Self {
            notifications: Some(notifications),
        }
    }

    /// A log that only reaches `tracing`
    #[cfg(test)]
    pub(crate) const fn disabled() -> Self {
        Self {
            notifications: None,
        }
    }

    pub(crate) fn line(&self, message: fmt::Arguments<'_>) {
        let line = message.to_string();
        debug!("{line}");
        if let Some(notifications) = &self.notifications {
            // The dispatcher is gone only during shutdown
            let _ = notifications.send(Notification::Log(line));
        }
    }
}
