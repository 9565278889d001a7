//! Scriptable collaborators shared by the unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::capability::{Capability, PermissionHost};
use crate::coordinator::{Dialog, ReminderPrompt, UserNotice, ViewDecision};
use crate::error::{HostError, StoreError, ViewerError};
use crate::event_store::{EventDraft, EventStore};
use crate::notifications::{NotificationRequest, NotificationResponse, NotificationSink, ResponseListener, Subscription};
use crate::product::ProductId;
use crate::router::Navigator;
use crate::viewer::ExternalViewer;

enum Answer {
    Reply(bool),
    Fail(String),
    Never,
}

pub struct FakePermissionHost {
    answer: Answer,
    prompts: AtomicUsize,
}

impl FakePermissionHost {
    fn answering(answer: Answer) -> Self {
        Self {
            answer,
            prompts: AtomicUsize::new(0),
        }
    }

    pub fn granting() -> Self {
        Self::answering(Answer::Reply(true))
    }

    pub fn denying() -> Self {
        Self::answering(Answer::Reply(false))
    }

    pub fn failing(message: &str) -> Self {
        Self::answering(Answer::Fail(message.to_string()))
    }

    pub fn never_answering() -> Self {
        Self::answering(Answer::Never)
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PermissionHost for FakePermissionHost {
    async fn request_access(&self, _capability: Capability) -> Result<bool, HostError> {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        match &self.answer {
            Answer::Reply(granted) => Ok(*granted),
            Answer::Fail(message) => Err(HostError::new(message.clone())),
            Answer::Never => std::future::pending().await,
        }
    }
}

pub struct FakeEventStore {
    failure: Option<StoreError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    created: Mutex<Vec<EventDraft>>,
}

impl FakeEventStore {
    pub fn working() -> Self {
        Self {
            failure: None,
            delay: None,
            calls: AtomicUsize::new(0),
            created: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(err: StoreError) -> Self {
        Self {
            failure: Some(err),
            ..Self::working()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::working()
        }
    }

    pub fn create_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn drafts(&self) -> Vec<EventDraft> {
        self.created.lock().clone()
    }
}

#[async_trait]
impl EventStore for FakeEventStore {
    async fn create_event(&self, draft: &EventDraft) -> Result<String, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        let mut created = self.created.lock();
        created.push(draft.clone());
        Ok(format!("event-{}", created.len()))
    }
}

pub struct FakeViewer {
    pub has_link: bool,
    pub can_open: bool,
    pub opened: Mutex<Vec<String>>,
}

impl FakeViewer {
    pub fn openable() -> Self {
        Self {
            has_link: true,
            can_open: true,
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn unopenable() -> Self {
        Self {
            can_open: false,
            ..Self::openable()
        }
    }
}

#[async_trait]
impl ExternalViewer for FakeViewer {
    fn viewer_url(&self, start_at: DateTime<Utc>) -> Option<String> {
        self.has_link
            .then(|| format!("viewer://{}", start_at.timestamp()))
    }

    async fn can_open(&self, _url: &str) -> bool {
        self.can_open
    }

    async fn open(&self, url: &str) -> Result<(), ViewerError> {
        self.opened.lock().push(url.to_string());
        Ok(())
    }
}

pub struct ScriptedPrompt {
    decision: ViewDecision,
    pub dialogs: Mutex<Vec<Dialog>>,
    pub notices: Mutex<Vec<UserNotice>>,
}

impl ScriptedPrompt {
    pub fn choosing(decision: ViewDecision) -> Self {
        Self {
            decision,
            dialogs: Mutex::new(Vec::new()),
            notices: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ReminderPrompt for ScriptedPrompt {
    async fn confirm(&self, dialog: &Dialog) -> ViewDecision {
        self.dialogs.lock().push(dialog.clone());
        self.decision
    }

    fn show_notice(&self, notice: &UserNotice) {
        self.notices.lock().push(notice.clone());
    }
}

#[derive(Default)]
struct SinkState {
    next_listener: u64,
    listeners: Vec<(u64, ResponseListener)>,
    requests: Vec<NotificationRequest>,
}

#[derive(Default)]
pub struct FakeSink {
    state: Arc<Mutex<SinkState>>,
}

impl FakeSink {
    pub fn listener_count(&self) -> usize {
        self.state.lock().listeners.len()
    }

    pub fn requests(&self) -> Vec<NotificationRequest> {
        self.state.lock().requests.clone()
    }

    pub fn respond(&self, response: &NotificationResponse) {
        let listeners: Vec<ResponseListener> = self
            .state
            .lock()
            .listeners
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(response);
        }
    }
}

#[async_trait]
impl NotificationSink for FakeSink {
    async fn schedule(&self, request: NotificationRequest) -> Result<String, HostError> {
        let mut state = self.state.lock();
        state.requests.push(request);
        Ok(format!("ticket-{}", state.requests.len()))
    }

    fn add_response_listener(&self, listener: ResponseListener) -> Subscription {
        let id = {
            let mut state = self.state.lock();
            state.next_listener += 1;
            let id = state.next_listener;
            state.listeners.push((id, listener));
            id
        };
        let state = Arc::clone(&self.state);
        Subscription::new(move || {
            state.lock().listeners.retain(|(existing, _)| *existing != id);
        })
    }
}

#[derive(Default)]
pub struct RecordingNavigator {
    visits: Mutex<Vec<ProductId>>,
}

impl RecordingNavigator {
    pub fn visits(&self) -> Vec<ProductId> {
        self.visits.lock().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate_to_product(&self, product_id: ProductId) {
        self.visits.lock().push(product_id);
    }
}
