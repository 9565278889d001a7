pub mod capability;
pub mod clock;
pub mod coordinator;
pub mod error;
pub mod event_store;
pub mod lifecycle;
pub mod locale;
pub mod notifications;
pub mod product;
pub mod reminder;
pub mod router;
pub mod service;
pub mod viewer;

#[cfg(test)]
pub(crate) mod test_support;

pub use crate::capability::{Capability, CapabilityGate, CapabilityReport, CapabilityStatus};
pub use crate::coordinator::{ReminderConfig, ReminderCoordinator, ReminderReport};
pub use crate::error::{NotificationError, ReminderError};
pub use crate::notifications::{NotificationScheduler, NotificationTicket};
pub use crate::product::{Product, ProductId};
pub use crate::router::DeepLinkReentryRouter;
pub use crate::service::{ReminderService, ReminderServiceBuilder};
