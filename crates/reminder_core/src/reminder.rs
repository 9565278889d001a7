use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ReminderError;
use crate::event_store::EventDraft;
use crate::product::ProductId;

pub const DEFAULT_DURATION_SECS: u32 = 60 * 60;
pub const DEFAULT_LEAD_TIME_SECS: u32 = 15 * 60;

/// Instant produced by the date-selection surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SelectedInstant {
    EpochMillis(i64),
    Iso8601(String),
}

impl SelectedInstant {
    pub fn normalize(&self) -> Result<DateTime<Utc>, ReminderError> {
        match self {
            Self::EpochMillis(millis) => Utc
                .timestamp_millis_opt(*millis)
                .single()
                .ok_or_else(|| ReminderError::InvalidTimestamp(millis.to_string())),
            Self::Iso8601(raw) => parse_iso8601(raw)
                .ok_or_else(|| ReminderError::InvalidTimestamp(raw.clone())),
        }
    }
}

fn parse_iso8601(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    // Offset-less input is taken as UTC.
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

impl From<i64> for SelectedInstant {
    fn from(millis: i64) -> Self {
        Self::EpochMillis(millis)
    }
}

impl From<&str> for SelectedInstant {
    fn from(raw: &str) -> Self {
        Self::Iso8601(raw.to_string())
    }
}

impl From<DateTime<Utc>> for SelectedInstant {
    fn from(instant: DateTime<Utc>) -> Self {
        Self::EpochMillis(instant.timestamp_millis())
    }
}

/// Result of showing the date picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateSelection {
    Confirmed(SelectedInstant),
    Dismissed,
}

/// Transient description of one reminder; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderRequest {
    pub product_id: ProductId,
    pub scheduled_at: DateTime<Utc>,
    pub title: String,
    pub duration_seconds: u32,
    pub lead_time_seconds: Option<u32>,
}

impl ReminderRequest {
    pub fn start_at(&self) -> DateTime<Utc> {
        self.scheduled_at
    }

    /// `None` when the end would fall past the last representable instant.
    pub fn end_at(&self) -> Option<DateTime<Utc>> {
        self.scheduled_at
            .checked_add_signed(Duration::seconds(i64::from(self.duration_seconds)))
    }

    pub fn to_draft(&self) -> Result<EventDraft, ReminderError> {
        let end_at = self
            .end_at()
            .ok_or_else(|| ReminderError::InvalidTimestamp(self.scheduled_at.to_rfc3339()))?;
        Ok(EventDraft {
            title: self.title.clone(),
            start_at: self.start_at(),
            end_at,
            alarm_offset_seconds: self.lead_time_seconds,
        })
    }
}

/// Progress of one reminder invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReminderState {
    Idle,
    Cancelled,
    RequestingCapability,
    Denied,
    Unsupported,
    Granted,
    CreatingEvent,
    Failed,
    Created,
    OfferingView,
    ViewOpened,
    ViewDeclined,
    ViewUnavailable,
}

impl ReminderState {
    pub fn allowed_transitions(self) -> &'static [ReminderState] {
        use ReminderState::*;
        match self {
            Idle => &[RequestingCapability, Cancelled, Failed],
            RequestingCapability => &[Granted, Denied, Unsupported],
            Granted => &[CreatingEvent],
            CreatingEvent => &[Created, Failed],
            Created => &[OfferingView],
            OfferingView => &[ViewOpened, ViewDeclined, ViewUnavailable],
            Cancelled | Denied | Unsupported | Failed | ViewOpened | ViewDeclined
            | ViewUnavailable => &[],
        }
    }

    pub fn can_transition_to(self, next: ReminderState) -> bool {
        self.allowed_transitions().contains(&next)
    }

    pub fn is_terminal(self) -> bool {
        self.allowed_transitions().is_empty()
    }
}

/// Records the states one invocation walks through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderFlow {
    trail: Vec<ReminderState>,
}

impl Default for ReminderFlow {
    fn default() -> Self {
        Self {
            trail: vec![ReminderState::Idle],
        }
    }
}

impl ReminderFlow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ReminderState {
        self.trail.last().copied().unwrap_or(ReminderState::Idle)
    }

    pub fn trail(&self) -> &[ReminderState] {
        &self.trail
    }

    pub(crate) fn advance(&mut self, next: ReminderState) {
        let current = self.state();
        debug_assert!(
            current.can_transition_to(next),
            "illegal reminder transition {current:?} -> {next:?}"
        );
        tracing::trace!(?current, ?next, "reminder state");
        self.trail.push(next);
    }

    pub fn into_trail(self) -> Vec<ReminderState> {
        self.trail
    }
}
