use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Everything the external store needs to create one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDraft {
    pub title: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    /// Seconds before `start_at` at which the store should raise an alarm.
    pub alarm_offset_seconds: Option<u32>,
}

/// Lookup reference to an event the external store owns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventHandle {
    external_id: String,
    start_at: DateTime<Utc>,
    end_at: DateTime<Utc>,
}

impl EventHandle {
    pub fn for_draft(external_id: impl Into<String>, draft: &EventDraft) -> Self {
        Self {
            external_id: external_id.into(),
            start_at: draft.start_at,
            end_at: draft.end_at,
        }
    }

    pub fn external_id(&self) -> &str {
        &self.external_id
    }

    pub fn start_at(&self) -> DateTime<Utc> {
        self.start_at
    }

    pub fn end_at(&self) -> DateTime<Utc> {
        self.end_at
    }

    pub fn duration(&self) -> Duration {
        self.end_at - self.start_at
    }
}

/// Calendar-like store that owns reminder events. Access is requested
/// separately through the capability gate.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Returns the store's opaque identifier for the new event.
    async fn create_event(&self, draft: &EventDraft) -> Result<String, StoreError>;
}
