//! In-process stand-ins for the platform collaborators: permission dialogs,
//! the calendar, the local notification centre, the calendar viewer and the
//! navigation stack.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use reminder_core::capability::{Capability, PermissionHost};
use reminder_core::clock::Clock;
use reminder_core::coordinator::{Dialog, NoticeKind, ReminderPrompt, UserNotice, ViewDecision};
use reminder_core::error::{HostError, StoreError, ViewerError};
use reminder_core::event_store::{EventDraft, EventStore};
use reminder_core::notifications::{
    Delivery, NotificationPayload, NotificationRequest, NotificationResponse, NotificationSink,
    NotificationTicket, ResponseListener, Subscription,
};
use reminder_core::router::Navigator;
use reminder_core::viewer::ExternalViewer;
use reminder_core::ProductId;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Wall clock that advances with the tokio clock, so paused-time runs stay
/// consistent with timer-driven delivery.
#[derive(Debug)]
pub struct RuntimeClock {
    wall_anchor: DateTime<Utc>,
    anchor: Instant,
}

impl RuntimeClock {
    pub fn starting_at(wall_anchor: DateTime<Utc>) -> Self {
        Self {
            wall_anchor,
            anchor: Instant::now(),
        }
    }
}

impl Default for RuntimeClock {
    fn default() -> Self {
        Self::starting_at(Utc::now())
    }
}

impl Clock for RuntimeClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = Duration::from_std(self.anchor.elapsed()).unwrap_or_else(|_| Duration::zero());
        self.wall_anchor
            .checked_add_signed(elapsed)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptBehavior {
    Grant,
    Deny,
    /// The dialog stays up until the app leaves the foreground.
    Ignore,
}

/// Permission dialogs answered according to a per-capability script.
pub struct SimulatedPermissions {
    answers: HashMap<Capability, PromptBehavior>,
    prompts: AtomicUsize,
    shown: Notify,
}

impl SimulatedPermissions {
    pub fn new(default: PromptBehavior) -> Self {
        let answers = Capability::ALL.into_iter().map(|cap| (cap, default)).collect();
        Self {
            answers,
            prompts: AtomicUsize::new(0),
            shown: Notify::new(),
        }
    }

    pub fn answering(mut self, capability: Capability, behavior: PromptBehavior) -> Self {
        self.answers.insert(capability, behavior);
        self
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }

    /// Resolves once a dialog has been shown.
    pub async fn prompt_shown(&self) {
        self.shown.notified().await;
    }
}

#[async_trait]
impl PermissionHost for SimulatedPermissions {
    async fn request_access(&self, capability: Capability) -> Result<bool, HostError> {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        self.shown.notify_one();
        let behavior = self
            .answers
            .get(&capability)
            .copied()
            .unwrap_or(PromptBehavior::Deny);
        debug!(%capability, ?behavior, "permission dialog shown");
        match behavior {
            PromptBehavior::Grant => Ok(true),
            PromptBehavior::Deny => Ok(false),
            PromptBehavior::Ignore => std::future::pending().await,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEvent {
    pub id: String,
    pub draft: EventDraft,
}

/// Calendar kept in memory. Can be switched offline to exercise failures.
#[derive(Default)]
pub struct InMemoryCalendar {
    events: Mutex<Vec<StoredEvent>>,
    offline: Mutex<Option<String>>,
    calls: AtomicUsize,
}

impl InMemoryCalendar {
    pub fn go_offline(&self, reason: impl Into<String>) {
        *self.offline.lock() = Some(reason.into());
    }

    pub fn events(&self) -> Vec<StoredEvent> {
        self.events.lock().clone()
    }

    pub fn create_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventStore for InMemoryCalendar {
    async fn create_event(&self, draft: &EventDraft) -> Result<String, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = self.offline.lock().clone() {
            return Err(StoreError::StoreUnavailable(reason));
        }
        let mut events = self.events.lock();
        let id = format!("evt-{}", events.len() + 1);
        events.push(StoredEvent {
            id: id.clone(),
            draft: draft.clone(),
        });
        info!(%id, title = %draft.title, "calendar event saved");
        Ok(id)
    }
}

#[derive(Default)]
struct CenterState {
    next_ticket: u64,
    next_listener: u64,
    tickets: HashMap<String, (NotificationTicket, NotificationPayload)>,
    listeners: Vec<(u64, ResponseListener)>,
}

/// Local notification centre. Delivery runs on tokio timers; the user's tap
/// is simulated with [`NotificationCenter::tap`].
pub struct NotificationCenter {
    clock: Arc<dyn Clock>,
    state: Arc<Mutex<CenterState>>,
    delivered: Arc<Notify>,
}

impl NotificationCenter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            state: Arc::new(Mutex::new(CenterState::default())),
            delivered: Arc::new(Notify::new()),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.state.lock().listeners.len()
    }

    pub fn ticket(&self, ticket_id: &str) -> Option<NotificationTicket> {
        self.state
            .lock()
            .tickets
            .get(ticket_id)
            .map(|(ticket, _)| ticket.clone())
    }

    /// Resolves after the next delivery.
    pub async fn next_delivery(&self) {
        self.delivered.notified().await;
    }

    /// Simulates the user tapping a delivered notification. Returns how many
    /// listeners received the interaction.
    pub fn tap(&self, ticket_id: &str) -> usize {
        let (response, listeners) = {
            let state = self.state.lock();
            let Some((ticket, payload)) = state.tickets.get(ticket_id) else {
                warn!(%ticket_id, "tap on unknown notification");
                return 0;
            };
            if !ticket.is_delivered() {
                warn!(%ticket_id, "tap on notification that has not been delivered");
                return 0;
            }
            let data = payload.to_data();
            let listeners: Vec<ResponseListener> = state
                .listeners
                .iter()
                .map(|(_, listener)| Arc::clone(listener))
                .collect();
            (NotificationResponse::tapped(ticket_id, data), listeners)
        };
        for listener in &listeners {
            listener(&response);
        }
        listeners.len()
    }
}

#[async_trait]
impl NotificationSink for NotificationCenter {
    async fn schedule(&self, request: NotificationRequest) -> Result<String, HostError> {
        let delay = Duration::from_std(request.fire_after)
            .map_err(|_| HostError::new("notification delay out of range"))?;
        let fire_at = self
            .clock
            .now()
            .checked_add_signed(delay)
            .ok_or_else(|| HostError::new("notification delay out of range"))?;
        let ticket_id = {
            let mut state = self.state.lock();
            state.next_ticket += 1;
            let ticket_id = format!("notification-{}", state.next_ticket);
            let ticket = NotificationTicket::new(ticket_id.clone(), &request, fire_at);
            state
                .tickets
                .insert(ticket_id.clone(), (ticket, request.payload.clone()));
            ticket_id
        };

        let clock = Arc::clone(&self.clock);
        let state = Arc::clone(&self.state);
        let delivered = Arc::clone(&self.delivered);
        let fire_after = request.fire_after;
        let id = ticket_id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(fire_after).await;
            loop {
                let outcome = match state.lock().tickets.get_mut(&id) {
                    Some((ticket, _)) => ticket.mark_delivered(clock.now()),
                    None => return,
                };
                match outcome {
                    Delivery::NotYetDue => {
                        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                    }
                    Delivery::Delivered => {
                        info!(ticket_id = %id, "notification delivered");
                        delivered.notify_waiters();
                        return;
                    }
                    Delivery::AlreadyDelivered => return,
                }
            }
        });
        Ok(ticket_id)
    }

    fn add_response_listener(&self, listener: ResponseListener) -> Subscription {
        let listener_id = {
            let mut state = self.state.lock();
            state.next_listener += 1;
            let listener_id = state.next_listener;
            state.listeners.push((listener_id, listener));
            listener_id
        };
        debug!(listener_id, "response listener added");
        let state = Arc::clone(&self.state);
        Subscription::new(move || {
            state.lock().listeners.retain(|(id, _)| *id != listener_id);
            debug!(listener_id, "response listener removed");
        })
    }
}

/// Seconds between the Unix epoch and 2001-01-01T00:00:00Z, the reference
/// date of the `calshow:` scheme.
const CALSHOW_REFERENCE_UNIX: i64 = 978_307_200;

/// Calendar app reached through the `calshow:<seconds since 2001>` scheme.
pub struct CalendarShowViewer {
    installed: bool,
    opened: Mutex<Vec<String>>,
}

impl CalendarShowViewer {
    pub fn new(installed: bool) -> Self {
        Self {
            installed,
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().clone()
    }
}

pub fn calshow_url(start_at: DateTime<Utc>) -> String {
    let reference = Utc.timestamp_opt(CALSHOW_REFERENCE_UNIX, 0).single();
    let seconds = reference
        .map(|reference| (start_at - reference).num_seconds())
        .unwrap_or_default();
    format!("calshow:{seconds}")
}

#[async_trait]
impl ExternalViewer for CalendarShowViewer {
    fn viewer_url(&self, start_at: DateTime<Utc>) -> Option<String> {
        Some(calshow_url(start_at))
    }

    async fn can_open(&self, url: &str) -> bool {
        self.installed && url.starts_with("calshow:")
    }

    async fn open(&self, url: &str) -> Result<(), ViewerError> {
        if !self.installed {
            return Err(ViewerError::LaunchFailed {
                url: url.to_string(),
                reason: "calendar app not installed".to_string(),
            });
        }
        info!(%url, "opening calendar");
        self.opened.lock().push(url.to_string());
        Ok(())
    }
}

/// Navigation stack that only records product-detail pushes.
#[derive(Default)]
pub struct NavigationStack {
    pushed: Mutex<Vec<ProductId>>,
}

impl NavigationStack {
    pub fn pushed(&self) -> Vec<ProductId> {
        self.pushed.lock().clone()
    }
}

impl Navigator for NavigationStack {
    fn navigate_to_product(&self, product_id: ProductId) {
        info!(%product_id, "push ProductDetail");
        self.pushed.lock().push(product_id);
    }
}

/// Dialog surface that answers the confirmation with a fixed choice and logs
/// notices.
pub struct ConsolePrompt {
    decision: ViewDecision,
    notices: Mutex<Vec<UserNotice>>,
}

impl ConsolePrompt {
    pub fn new(decision: ViewDecision) -> Self {
        Self {
            decision,
            notices: Mutex::new(Vec::new()),
        }
    }

    pub fn notices(&self) -> Vec<UserNotice> {
        self.notices.lock().clone()
    }
}

#[async_trait]
impl ReminderPrompt for ConsolePrompt {
    async fn confirm(&self, dialog: &Dialog) -> ViewDecision {
        info!(
            title = %dialog.title,
            message = %dialog.message,
            decision = ?self.decision,
            "confirmation dialog"
        );
        self.decision
    }

    fn show_notice(&self, notice: &UserNotice) {
        match notice.kind {
            NoticeKind::Error => warn!(title = %notice.title, message = %notice.message, "alert"),
            NoticeKind::Soft => info!(title = %notice.title, message = %notice.message, "notice"),
        }
        self.notices.lock().push(notice.clone());
    }
}
