use std::time::Duration;

use thiserror::Error;

use crate::capability::Capability;
use crate::locale::Locale;

/// Failure reported by a platform collaborator outside its typed contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("host error: {0}")]
pub struct HostError(pub String);

impl HostError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("event store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("event store refused access")]
    PermissionDenied,
}

/// Why the external viewer could not be launched. Never fatal to a reminder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewerError {
    #[error("no external viewer deep link on this platform")]
    NoDeepLink,
    #[error("deep link `{url}` cannot be opened")]
    DeepLinkUnopenable { url: String },
    #[error("opening `{url}` failed: {reason}")]
    LaunchFailed { url: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReminderError {
    #[error("access to the {0} was denied")]
    PermissionDenied(Capability),
    #[error("the {0} is not offered on this platform")]
    CapabilityUnsupported(Capability),
    #[error("external store failure: {0}")]
    ExternalStoreFailure(String),
    #[error("event store did not answer within {0:?}")]
    Timeout(Duration),
    #[error("invalid timestamp `{0}`")]
    InvalidTimestamp(String),
    #[error("app terminated before the event was saved")]
    Terminated,
}

impl From<StoreError> for ReminderError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::PermissionDenied => Self::PermissionDenied(Capability::EventStore),
            StoreError::StoreUnavailable(reason) => Self::ExternalStoreFailure(reason),
        }
    }
}

impl ReminderError {
    pub fn user_message(&self, locale: Locale) -> &'static str {
        let copy = locale.strings();
        match self {
            Self::PermissionDenied(_) => copy.calendar_denied,
            Self::CapabilityUnsupported(_) => copy.calendar_unsupported,
            Self::ExternalStoreFailure(_) | Self::Terminated => copy.generic_error,
            Self::Timeout(_) => copy.calendar_timeout,
            Self::InvalidTimestamp(_) => copy.invalid_date,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotificationError {
    #[error("notification permission was denied")]
    PermissionDenied,
    #[error("notifications are not offered on this platform")]
    CapabilityUnsupported,
    #[error("notification delay {0:?} is out of range")]
    InvalidDelay(Duration),
    #[error(transparent)]
    Host(#[from] HostError),
}

impl NotificationError {
    pub fn user_message(&self, locale: Locale) -> &'static str {
        let copy = locale.strings();
        match self {
            Self::PermissionDenied => copy.notifications_denied,
            Self::CapabilityUnsupported => copy.notifications_unsupported,
            Self::InvalidDelay(_) | Self::Host(_) => copy.generic_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_permission_denial_maps_to_permission_denied() {
        let err: ReminderError = StoreError::PermissionDenied.into();
        assert_eq!(err, ReminderError::PermissionDenied(Capability::EventStore));

        let err: ReminderError = StoreError::StoreUnavailable("offline".into()).into();
        assert!(matches!(err, ReminderError::ExternalStoreFailure(reason) if reason == "offline"));
    }

    #[test]
    fn user_messages_follow_locale() {
        let err = ReminderError::PermissionDenied(Capability::EventStore);
        assert_eq!(err.user_message(Locale::En), "Calendar access denied");
        assert_eq!(err.user_message(Locale::Es), "Acceso al calendario denegado");
        assert_eq!(
            NotificationError::PermissionDenied.user_message(Locale::En),
            "Notification permission not granted"
        );
    }
}
