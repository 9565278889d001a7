use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::capability::{Capability, CapabilityGate, CapabilityStatus};
use crate::clock::Clock;
use crate::error::{HostError, NotificationError};
use crate::product::{Product, ProductId};

pub const DEFAULT_FIRE_AFTER: Duration = Duration::from_secs(5);

/// Data carried inside the notification, just enough to find the product again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    pub product_id: ProductId,
    pub title: String,
}

impl NotificationPayload {
    pub fn for_product(product: &Product) -> Self {
        Self {
            product_id: product.id,
            title: product.title.clone(),
        }
    }

    pub fn to_data(&self) -> Value {
        serde_json::json!({
            "productId": self.product_id.0,
            "title": self.title,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub title: String,
    pub body: String,
    pub payload: NotificationPayload,
    pub fire_after: Duration,
}

impl NotificationRequest {
    pub fn for_product(product: &Product, fire_after: Duration) -> Self {
        Self {
            title: format!("Still thinking about {}?", product.title),
            body: format!("Don't wait too long. {} could be yours!", product.title),
            payload: NotificationPayload::for_product(product),
            fire_after,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    AlreadyDelivered,
    NotYetDue,
}

/// An armed re-engagement notification. Lives in memory only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationTicket {
    pub ticket_id: String,
    pub product_id: ProductId,
    pub title: String,
    pub body: String,
    pub fire_at: DateTime<Utc>,
    delivered: bool,
}

impl NotificationTicket {
    pub fn new(ticket_id: impl Into<String>, request: &NotificationRequest, fire_at: DateTime<Utc>) -> Self {
        Self {
            ticket_id: ticket_id.into(),
            product_id: request.payload.product_id,
            title: request.title.clone(),
            body: request.body.clone(),
            fire_at,
            delivered: false,
        }
    }

    pub fn is_delivered(&self) -> bool {
        self.delivered
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.fire_at
    }

    /// Flips `delivered` at most once, and never before `fire_at`.
    pub fn mark_delivered(&mut self, now: DateTime<Utc>) -> Delivery {
        if self.delivered {
            Delivery::AlreadyDelivered
        } else if !self.is_due(now) {
            Delivery::NotYetDue
        } else {
            self.delivered = true;
            Delivery::Delivered
        }
    }
}

pub const DEFAULT_ACTION: &str = "default";
pub const DISMISS_ACTION: &str = "dismiss";

/// The user's interaction with a delivered notification.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationResponse {
    pub ticket_id: String,
    pub action_id: String,
    pub data: Value,
}

impl NotificationResponse {
    pub fn tapped(ticket_id: impl Into<String>, data: Value) -> Self {
        Self {
            ticket_id: ticket_id.into(),
            action_id: DEFAULT_ACTION.to_string(),
            data,
        }
    }

    pub fn is_dismissal(&self) -> bool {
        self.action_id == DISMISS_ACTION
    }
}

pub type ResponseListener = Arc<dyn Fn(&NotificationResponse) + Send + Sync>;

/// Unsubscribes its listener when dropped.
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(unsubscribe: impl FnOnce() + Send + 'static) -> Self {
        Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}

/// Platform-specific notification adapters will implement this trait.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Arms a local notification and returns the platform's ticket id.
    async fn schedule(&self, request: NotificationRequest) -> Result<String, HostError>;

    fn add_response_listener(&self, listener: ResponseListener) -> Subscription;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub fire_after: Duration,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            fire_after: DEFAULT_FIRE_AFTER,
        }
    }
}

/// Identifies one listener registration on the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerRegistration(u64);

#[derive(Default)]
struct ListenerSlot {
    generation: u64,
    current: Option<(ListenerRegistration, Subscription)>,
}

pub struct NotificationScheduler {
    gate: Arc<CapabilityGate>,
    sink: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    config: NotificationConfig,
    listener: Mutex<ListenerSlot>,
}

impl NotificationScheduler {
    pub fn new(
        gate: Arc<CapabilityGate>,
        sink: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
        config: NotificationConfig,
    ) -> Self {
        Self {
            gate,
            sink,
            clock,
            config,
            listener: Mutex::new(ListenerSlot::default()),
        }
    }

    pub fn config(&self) -> &NotificationConfig {
        &self.config
    }

    /// Arms a notification for `product` that fires after the configured delay.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn schedule(&self, product: &Product) -> Result<NotificationTicket, NotificationError> {
        match self.gate.request(Capability::Notifications).await {
            CapabilityStatus::Granted => {}
            CapabilityStatus::Denied => return Err(NotificationError::PermissionDenied),
            CapabilityStatus::Unsupported => return Err(NotificationError::CapabilityUnsupported),
        }

        let fire_after = self.config.fire_after;
        let delay = chrono::Duration::from_std(fire_after)
            .map_err(|_| NotificationError::InvalidDelay(fire_after))?;
        let fire_at = self
            .clock
            .now()
            .checked_add_signed(delay)
            .ok_or(NotificationError::InvalidDelay(fire_after))?;
        let request = NotificationRequest::for_product(product, fire_after);
        let ticket_id = self.sink.schedule(request.clone()).await?;

        info!(%ticket_id, %fire_at, "re-engagement notification armed");
        Ok(NotificationTicket::new(ticket_id, &request, fire_at))
    }

    /// Installs the process-wide response listener. A previous listener is
    /// unsubscribed before the new one is added, so at most one is ever live.
    pub fn add_response_listener(&self, listener: ResponseListener) -> ListenerRegistration {
        let mut slot = self.listener.lock();
        if let Some((previous, subscription)) = slot.current.take() {
            debug!(?previous, "replacing response listener");
            drop(subscription);
        }
        slot.generation += 1;
        let registration = ListenerRegistration(slot.generation);
        let subscription = self.sink.add_response_listener(listener);
        slot.current = Some((registration, subscription));
        registration
    }

    /// Removes the listener if `registration` is still the live one.
    pub fn remove_response_listener(&self, registration: ListenerRegistration) -> bool {
        let mut slot = self.listener.lock();
        match slot.current.take() {
            Some((live, subscription)) if live == registration => {
                subscription.unsubscribe();
                true
            }
            other => {
                slot.current = other;
                false
            }
        }
    }

    pub fn has_listener(&self) -> bool {
        self.listener.lock().current.is_some()
    }

    pub fn shutdown(&self) {
        if let Some((_, subscription)) = self.listener.lock().current.take() {
            subscription.unsubscribe();
            info!("response listener torn down");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::CapabilityReport;
    use crate::clock::ManualClock;
    use crate::lifecycle::Lifecycle;
    use crate::test_support::{FakePermissionHost, FakeSink};
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn harness(host: FakePermissionHost, report: CapabilityReport) -> (NotificationScheduler, Arc<FakeSink>) {
        let gate = Arc::new(CapabilityGate::new(Arc::new(host), report, Lifecycle::new()));
        let sink = Arc::new(FakeSink::default());
        let clock = Arc::new(ManualClock::new(t0()));
        let scheduler = NotificationScheduler::new(gate, sink.clone(), clock, NotificationConfig::default());
        (scheduler, sink)
    }

    fn counting_listener(counter: &Arc<AtomicUsize>) -> ResponseListener {
        let counter = Arc::clone(counter);
        Arc::new(move |_: &NotificationResponse| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test]
    async fn schedules_product_notification_after_fixed_delay() {
        let (scheduler, sink) = harness(FakePermissionHost::granting(), CapabilityReport::all());

        let ticket = scheduler
            .schedule(&Product::new(42, "Phone"))
            .await
            .expect("ticket");

        assert_eq!(ticket.fire_at, t0() + chrono::Duration::seconds(5));
        assert_eq!(ticket.title, "Still thinking about Phone?");
        assert!(!ticket.is_delivered());
        let requests = sink.requests();
        assert_eq!(requests[0].fire_after, Duration::from_secs(5));
        assert_eq!(
            requests[0].payload.to_data(),
            serde_json::json!({ "productId": 42, "title": "Phone" })
        );
    }

    #[tokio::test]
    async fn denied_permission_arms_nothing() {
        let (scheduler, sink) = harness(FakePermissionHost::denying(), CapabilityReport::all());
        let err = scheduler.schedule(&Product::new(1, "Mug")).await.unwrap_err();
        assert_eq!(err, NotificationError::PermissionDenied);
        assert!(sink.requests().is_empty());

        let (scheduler, _) = harness(FakePermissionHost::granting(), CapabilityReport::none());
        let err = scheduler.schedule(&Product::new(1, "Mug")).await.unwrap_err();
        assert_eq!(err, NotificationError::CapabilityUnsupported);
    }

    #[tokio::test]
    async fn delay_past_the_calendar_limit_is_rejected() {
        let gate = Arc::new(CapabilityGate::new(
            Arc::new(FakePermissionHost::granting()),
            CapabilityReport::all(),
            Lifecycle::new(),
        ));
        let sink = Arc::new(FakeSink::default());
        let fire_after = Duration::from_secs(10_000_000_000_000);
        let scheduler = NotificationScheduler::new(
            gate,
            sink.clone(),
            Arc::new(ManualClock::new(t0())),
            NotificationConfig { fire_after },
        );

        let err = scheduler.schedule(&Product::new(42, "Phone")).await.unwrap_err();

        assert_eq!(err, NotificationError::InvalidDelay(fire_after));
        assert!(sink.requests().is_empty());
    }

    #[test]
    fn ticket_delivers_once_and_not_early() {
        let request = NotificationRequest::for_product(&Product::new(42, "Phone"), DEFAULT_FIRE_AFTER);
        let fire_at = t0() + chrono::Duration::seconds(5);
        let mut ticket = NotificationTicket::new("ticket-1", &request, fire_at);

        assert_eq!(ticket.mark_delivered(t0() + chrono::Duration::seconds(4)), Delivery::NotYetDue);
        assert!(!ticket.is_delivered());
        assert_eq!(ticket.mark_delivered(fire_at), Delivery::Delivered);
        assert_eq!(ticket.mark_delivered(fire_at + chrono::Duration::seconds(1)), Delivery::AlreadyDelivered);
        assert!(ticket.is_delivered());
    }

    #[test]
    fn replacing_listener_never_accumulates() {
        let (scheduler, sink) = harness(FakePermissionHost::granting(), CapabilityReport::all());
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        scheduler.add_response_listener(counting_listener(&first));
        scheduler.add_response_listener(counting_listener(&first));
        scheduler.add_response_listener(counting_listener(&second));
        assert_eq!(sink.listener_count(), 1);

        sink.respond(&NotificationResponse::tapped("ticket-1", Value::Null));
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stale_registration_cannot_remove_live_listener() {
        let (scheduler, sink) = harness(FakePermissionHost::granting(), CapabilityReport::all());
        let counter = Arc::new(AtomicUsize::new(0));

        let stale = scheduler.add_response_listener(counting_listener(&counter));
        let live = scheduler.add_response_listener(counting_listener(&counter));

        assert!(!scheduler.remove_response_listener(stale));
        assert_eq!(sink.listener_count(), 1);
        assert!(scheduler.remove_response_listener(live));
        assert_eq!(sink.listener_count(), 0);
    }

    #[test]
    fn shutdown_unsubscribes() {
        let (scheduler, sink) = harness(FakePermissionHost::granting(), CapabilityReport::all());
        scheduler.add_response_listener(Arc::new(|_: &NotificationResponse| {}));
        assert!(scheduler.has_listener());

        scheduler.shutdown();
        assert!(!scheduler.has_listener());
        assert_eq!(sink.listener_count(), 0);
    }
}
