use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::capability::{Capability, CapabilityGate, CapabilityStatus};
use crate::error::{ReminderError, StoreError, ViewerError};
use crate::event_store::{EventHandle, EventStore};
use crate::lifecycle::terminated;
use crate::locale::Locale;
use crate::product::Product;
use crate::reminder::{
    DateSelection, ReminderFlow, ReminderRequest, ReminderState, SelectedInstant,
    DEFAULT_DURATION_SECS, DEFAULT_LEAD_TIME_SECS,
};
use crate::viewer::{self, ExternalViewer};

pub const DEFAULT_EVENT_TITLE: &str = "Purchase Reminder";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderConfig {
    pub event_title: String,
    pub duration_seconds: u32,
    /// Alarm raised this many seconds before the event. `None` attaches no alarm.
    pub alarm_offset_seconds: Option<u32>,
    pub locale: Locale,
    pub store_timeout: Duration,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            event_title: DEFAULT_EVENT_TITLE.to_string(),
            duration_seconds: DEFAULT_DURATION_SECS,
            alarm_offset_seconds: Some(DEFAULT_LEAD_TIME_SECS),
            locale: Locale::default(),
            store_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewDecision {
    Open,
    Decline,
}

/// Confirmation dialog offered after a reminder is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialog {
    pub title: String,
    pub message: String,
    pub confirm_label: String,
    pub cancel_label: String,
}

impl Dialog {
    fn reminder_created(locale: Locale) -> Self {
        let strings = locale.strings();
        Self {
            title: strings.created_title.to_string(),
            message: strings.created_message.to_string(),
            confirm_label: strings.view_label.to_string(),
            cancel_label: strings.cancel_label.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// The flow stopped.
    Error,
    /// Something optional degraded; the reminder stands.
    Soft,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserNotice {
    pub kind: NoticeKind,
    pub title: String,
    pub message: String,
}

impl UserNotice {
    pub(crate) fn new(kind: NoticeKind, locale: Locale, message: &str) -> Self {
        Self {
            kind,
            title: locale.strings().error_title.to_string(),
            message: message.to_string(),
        }
    }
}

/// Presentation surface the full reminder flow talks to.
#[async_trait]
pub trait ReminderPrompt: Send + Sync {
    async fn confirm(&self, dialog: &Dialog) -> ViewDecision;

    fn show_notice(&self, notice: &UserNotice);
}

/// Outcome of one `remind` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderReport {
    pub state: ReminderState,
    pub trail: Vec<ReminderState>,
    pub handle: Option<EventHandle>,
    pub error: Option<ReminderError>,
    pub viewer_error: Option<ViewerError>,
}

impl ReminderReport {
    fn finish(flow: ReminderFlow) -> Self {
        Self {
            state: flow.state(),
            trail: flow.into_trail(),
            handle: None,
            error: None,
            viewer_error: None,
        }
    }

    pub fn is_created(&self) -> bool {
        self.handle.is_some()
    }
}

enum StoreOutcome {
    Finished(Result<String, StoreError>),
    TimedOut,
    Terminated,
}

pub struct ReminderCoordinator {
    gate: Arc<CapabilityGate>,
    store: Arc<dyn EventStore>,
    viewer: Arc<dyn ExternalViewer>,
    config: ReminderConfig,
}

impl ReminderCoordinator {
    pub fn new(
        gate: Arc<CapabilityGate>,
        store: Arc<dyn EventStore>,
        viewer: Arc<dyn ExternalViewer>,
        config: ReminderConfig,
    ) -> Self {
        Self {
            gate,
            store,
            viewer,
            config,
        }
    }

    pub fn config(&self) -> &ReminderConfig {
        &self.config
    }

    /// Whether the reminder affordance should be offered at all.
    pub fn is_available(&self) -> bool {
        self.gate.supports(Capability::EventStore)
    }

    pub fn request_for(&self, scheduled_at: DateTime<Utc>, product: &Product) -> ReminderRequest {
        let title = if product.title.is_empty() {
            self.config.event_title.clone()
        } else {
            format!("{}: {}", self.config.event_title, product.title)
        };
        ReminderRequest {
            product_id: product.id,
            scheduled_at,
            title,
            duration_seconds: self.config.duration_seconds,
            lead_time_seconds: self.config.alarm_offset_seconds,
        }
    }

    /// Creates the reminder event once the event-store capability is granted.
    /// Denial is terminal for this call; nothing is retried.
    pub async fn create_reminder(
        &self,
        scheduled_at: impl Into<SelectedInstant>,
        product: &Product,
    ) -> Result<EventHandle, ReminderError> {
        let mut flow = ReminderFlow::new();
        self.create_in_flow(&mut flow, scheduled_at.into(), product)
            .await
    }

    #[instrument(skip(self, flow, product), fields(product_id = %product.id))]
    async fn create_in_flow(
        &self,
        flow: &mut ReminderFlow,
        scheduled_at: SelectedInstant,
        product: &Product,
    ) -> Result<EventHandle, ReminderError> {
        let draft = scheduled_at
            .normalize()
            .and_then(|instant| self.request_for(instant, product).to_draft());
        let draft = match draft {
            Ok(draft) => draft,
            Err(err) => {
                flow.advance(ReminderState::Failed);
                return Err(err);
            }
        };

        flow.advance(ReminderState::RequestingCapability);
        match self.gate.request(Capability::EventStore).await {
            CapabilityStatus::Granted => flow.advance(ReminderState::Granted),
            CapabilityStatus::Denied => {
                flow.advance(ReminderState::Denied);
                return Err(ReminderError::PermissionDenied(Capability::EventStore));
            }
            CapabilityStatus::Unsupported => {
                flow.advance(ReminderState::Unsupported);
                return Err(ReminderError::CapabilityUnsupported(Capability::EventStore));
            }
        }

        flow.advance(ReminderState::CreatingEvent);
        let lifecycle = self.gate.lifecycle().subscribe();
        let outcome = tokio::select! {
            created = tokio::time::timeout(self.config.store_timeout, self.store.create_event(&draft)) => {
                match created {
                    Ok(result) => StoreOutcome::Finished(result),
                    Err(_) => StoreOutcome::TimedOut,
                }
            }
            _ = terminated(lifecycle) => StoreOutcome::Terminated,
        };
        let external_id = match outcome {
            StoreOutcome::Finished(Ok(external_id)) => external_id,
            StoreOutcome::Finished(Err(err)) => {
                flow.advance(ReminderState::Failed);
                warn!(%err, "event store rejected reminder");
                return Err(err.into());
            }
            StoreOutcome::TimedOut => {
                flow.advance(ReminderState::Failed);
                warn!(timeout = ?self.config.store_timeout, "event store timed out");
                return Err(ReminderError::Timeout(self.config.store_timeout));
            }
            StoreOutcome::Terminated => {
                flow.advance(ReminderState::Failed);
                info!("app terminated while saving, abandoning event creation");
                return Err(ReminderError::Terminated);
            }
        };

        flow.advance(ReminderState::Created);
        info!(
            %external_id,
            start_at = %draft.start_at,
            end_at = %draft.end_at,
            alarm_offset = ?draft.alarm_offset_seconds,
            "reminder event created"
        );
        Ok(EventHandle::for_draft(external_id, &draft))
    }

    /// Runs the whole user-facing flow: date selection, creation, error
    /// notices, and the optional "view event" affordance.
    pub async fn remind(
        &self,
        selection: DateSelection,
        product: &Product,
        prompt: &dyn ReminderPrompt,
    ) -> ReminderReport {
        let locale = self.config.locale;
        let mut flow = ReminderFlow::new();
        let scheduled_at = match selection {
            DateSelection::Confirmed(instant) => instant,
            DateSelection::Dismissed => {
                flow.advance(ReminderState::Cancelled);
                debug!(product_id = %product.id, "date selection dismissed");
                return ReminderReport::finish(flow);
            }
        };

        let handle = match self.create_in_flow(&mut flow, scheduled_at, product).await {
            Ok(handle) => handle,
            Err(err) => {
                if matches!(err, ReminderError::CapabilityUnsupported(_)) {
                    debug!("reminder affordance invoked on unsupported platform");
                } else {
                    prompt.show_notice(&UserNotice::new(
                        NoticeKind::Error,
                        locale,
                        err.user_message(locale),
                    ));
                }
                let mut report = ReminderReport::finish(flow);
                report.error = Some(err);
                return report;
            }
        };

        flow.advance(ReminderState::OfferingView);
        let mut viewer_error = None;
        match prompt.confirm(&Dialog::reminder_created(locale)).await {
            ViewDecision::Decline => flow.advance(ReminderState::ViewDeclined),
            ViewDecision::Open => match viewer::open_event(self.viewer.as_ref(), &handle).await {
                Ok(url) => {
                    debug!(%url, "external viewer opened");
                    flow.advance(ReminderState::ViewOpened);
                }
                Err(err) => {
                    warn!(%err, "external viewer unavailable");
                    prompt.show_notice(&UserNotice::new(
                        NoticeKind::Soft,
                        locale,
                        locale.strings().viewer_unavailable,
                    ));
                    flow.advance(ReminderState::ViewUnavailable);
                    viewer_error = Some(err);
                }
            },
        }

        let mut report = ReminderReport::finish(flow);
        report.handle = Some(handle);
        report.viewer_error = viewer_error;
        report
    }
}
