use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::error::HostError;
use crate::lifecycle::{left_foreground, Lifecycle};

/// OS-mediated feature gated behind revocable user permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    EventStore,
    Notifications,
}

impl Capability {
    pub const ALL: [Capability; 2] = [Capability::EventStore, Capability::Notifications];

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "event_store" | "calendar" => Some(Self::EventStore),
            "notifications" | "notification" => Some(Self::Notifications),
            _ => None,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EventStore => f.write_str("event store"),
            Self::Notifications => f.write_str("notifications"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapabilityStatus {
    Granted,
    Denied,
    Unsupported,
}

/// Which capabilities the host platform offers, reported once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityReport {
    event_store: bool,
    notifications: bool,
}

impl CapabilityReport {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Capability::ALL.into_iter().fold(Self::none(), Self::with)
    }

    pub fn with(mut self, capability: Capability) -> Self {
        match capability {
            Capability::EventStore => self.event_store = true,
            Capability::Notifications => self.notifications = true,
        }
        self
    }

    pub fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::EventStore => self.event_store,
            Capability::Notifications => self.notifications,
        }
    }
}

impl FromIterator<Capability> for CapabilityReport {
    fn from_iter<T: IntoIterator<Item = Capability>>(iter: T) -> Self {
        iter.into_iter().fold(Self::none(), Self::with)
    }
}

/// Platform permission primitive. Implementations show the OS dialog.
#[async_trait]
pub trait PermissionHost: Send + Sync {
    async fn request_access(&self, capability: Capability) -> Result<bool, HostError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateConfig {
    /// Abandon a prompt the user never answers. `None` waits for an answer
    /// or for the app to leave the foreground.
    pub prompt_timeout: Option<Duration>,
}

enum PromptOutcome {
    Answered(Result<bool, HostError>),
    LeftForeground,
    Expired,
}

pub struct CapabilityGate {
    host: Arc<dyn PermissionHost>,
    report: CapabilityReport,
    lifecycle: Lifecycle,
    config: GateConfig,
}

impl CapabilityGate {
    pub fn new(host: Arc<dyn PermissionHost>, report: CapabilityReport, lifecycle: Lifecycle) -> Self {
        Self {
            host,
            report,
            lifecycle,
            config: GateConfig::default(),
        }
    }

    pub fn with_config(mut self, config: GateConfig) -> Self {
        self.config = config;
        self
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn report(&self) -> &CapabilityReport {
        &self.report
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.report.supports(capability)
    }

    /// Asks the host for `capability`. Nothing is cached: every call prompts
    /// again unless the platform does not offer the capability at all.
    #[instrument(skip(self))]
    pub async fn request(&self, capability: Capability) -> CapabilityStatus {
        if !self.report.supports(capability) {
            debug!("capability not offered by platform");
            return CapabilityStatus::Unsupported;
        }

        let state = self.lifecycle.subscribe();
        if !state.borrow().is_foreground() {
            debug!("app is not in the foreground, denying without prompting");
            return CapabilityStatus::Denied;
        }

        let outcome = tokio::select! {
            answer = self.host.request_access(capability) => PromptOutcome::Answered(answer),
            _ = left_foreground(state) => PromptOutcome::LeftForeground,
            _ = expire(self.config.prompt_timeout) => PromptOutcome::Expired,
        };

        let status = match outcome {
            PromptOutcome::Answered(Ok(true)) => CapabilityStatus::Granted,
            PromptOutcome::Answered(Ok(false)) => CapabilityStatus::Denied,
            PromptOutcome::Answered(Err(err)) => {
                warn!(%err, "permission prompt failed");
                CapabilityStatus::Denied
            }
            PromptOutcome::LeftForeground => {
                info!("app left the foreground while prompting, abandoning request");
                CapabilityStatus::Denied
            }
            PromptOutcome::Expired => {
                info!(timeout = ?self.config.prompt_timeout, "permission prompt expired");
                CapabilityStatus::Denied
            }
        };
        debug!(?status, "capability request resolved");
        status
    }
}

async fn expire(timeout: Option<Duration>) {
    match timeout {
        Some(timeout) => tokio::time::sleep(timeout).await,
        None => std::future::pending().await,
    }
}
