use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, SecondsFormat};
use reminder_core::capability::{Capability, CapabilityReport, GateConfig};
use reminder_core::clock::Clock;
use reminder_core::coordinator::ViewDecision;
use reminder_core::locale::Locale;
use reminder_core::notifications::NotificationConfig;
use reminder_core::reminder::{DateSelection, ReminderState, SelectedInstant};
use reminder_core::router::RouterConfig;
use reminder_core::{Product, ProductId, ReminderConfig, ReminderService};
use tracing::{info, warn};

use crate::host::{
    CalendarShowViewer, ConsolePrompt, InMemoryCalendar, NavigationStack, NotificationCenter,
    PromptBehavior, RuntimeClock, SimulatedPermissions,
};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub reminder: ReminderConfig,
    pub notifications: NotificationConfig,
    pub router: RouterConfig,
    pub gate: GateConfig,
    pub capabilities: CapabilityReport,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            reminder: ReminderConfig::default(),
            notifications: NotificationConfig::default(),
            router: RouterConfig::default(),
            gate: GateConfig::default(),
            capabilities: CapabilityReport::all(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Unparseable values keep the
    /// default and are reported with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(secs) = parse_var::<u32>(&lookup, "REMINDER_DURATION_SECS") {
            if secs > 0 {
                config.reminder.duration_seconds = secs;
            } else {
                warn!("REMINDER_DURATION_SECS must be positive, keeping default");
            }
        }
        if let Some(raw) = lookup("REMINDER_ALARM_OFFSET_SECS") {
            match raw.trim() {
                "0" | "off" | "none" => config.reminder.alarm_offset_seconds = None,
                value => match value.parse::<u32>() {
                    Ok(secs) => config.reminder.alarm_offset_seconds = Some(secs),
                    Err(err) => warn!(%value, %err, "invalid REMINDER_ALARM_OFFSET_SECS"),
                },
            }
        }
        if let Some(tag) = lookup("REMINDER_LOCALE") {
            match Locale::parse(&tag) {
                Some(locale) => config.reminder.locale = locale,
                None => warn!(%tag, "unsupported REMINDER_LOCALE, keeping default"),
            }
        }
        if let Some(title) = lookup("REMINDER_EVENT_TITLE") {
            let title = title.trim();
            if !title.is_empty() {
                config.reminder.event_title = title.to_string();
            }
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "REMINDER_STORE_TIMEOUT_SECS") {
            config.reminder.store_timeout = Duration::from_secs(secs.max(1));
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "NOTIFICATION_DELAY_SECS") {
            config.notifications.fire_after = Duration::from_secs(secs);
        }
        if let Some(millis) = parse_var::<u64>(&lookup, "REENTRY_DEBOUNCE_MS") {
            config.router.debounce = Duration::from_millis(millis);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "PERMISSION_PROMPT_TIMEOUT_SECS") {
            config.gate.prompt_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(list) = lookup("REMINDER_CAPABILITIES") {
            config.capabilities = list
                .split(',')
                .filter(|name| !name.trim().is_empty())
                .filter_map(|name| {
                    let parsed = Capability::parse(name);
                    if parsed.is_none() {
                        warn!(name = name.trim(), "unknown capability in REMINDER_CAPABILITIES");
                    }
                    parsed
                })
                .collect();
        }

        info!(?config, "configuration loaded");
        Ok(config)
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(key, value = %raw, %err, "ignoring invalid setting");
            None
        }
    }
}

/// What the demo session did, for the caller to report or assert on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub reminder_state: Option<ReminderState>,
    pub calendar_events: usize,
    pub notification_delivered: bool,
    pub navigations: Vec<ProductId>,
}

/// Plays one shopping session against the simulated host: the user opens a
/// product, adds a purchase reminder for tomorrow, and later taps the
/// re-engagement notification twice.
pub async fn run(config: AppConfig) -> Result<RunSummary> {
    let clock: Arc<dyn Clock> = Arc::new(RuntimeClock::default());
    let permissions = Arc::new(SimulatedPermissions::new(PromptBehavior::Grant));
    let calendar = Arc::new(InMemoryCalendar::default());
    let center = Arc::new(NotificationCenter::new(clock.clone()));
    let navigation = Arc::new(NavigationStack::default());
    let prompt = ConsolePrompt::new(ViewDecision::Open);

    let service = ReminderService::builder()
        .with_permission_host(permissions)
        .with_event_store(calendar.clone())
        .with_viewer(Arc::new(CalendarShowViewer::new(true)))
        .with_notification_sink(center.clone())
        .with_navigator(navigation.clone())
        .with_clock(clock.clone())
        .with_capabilities(config.capabilities)
        .with_gate_config(config.gate)
        .with_reminder_config(config.reminder)
        .with_notification_config(config.notifications.clone())
        .with_router_config(config.router)
        .build()
        .context("failed to assemble reminder service")?;

    let product = Product::new(42, "Phone");
    let mut summary = RunSummary {
        reminder_state: None,
        calendar_events: 0,
        notification_delivered: false,
        navigations: Vec::new(),
    };

    let ticket = service.on_product_viewed(&product, &prompt).await.ok();

    if service.reminder_available() {
        let tomorrow = clock.now() + ChronoDuration::days(1);
        let selection = DateSelection::Confirmed(SelectedInstant::Iso8601(
            tomorrow.to_rfc3339_opts(SecondsFormat::Secs, true),
        ));
        let report = service.remind(selection, &product, &prompt).await;
        info!(state = ?report.state, trail = ?report.trail, "reminder flow finished");
        summary.reminder_state = Some(report.state);
    } else {
        info!("calendar not available, reminder affordance hidden");
    }

    if let Some(ticket) = ticket {
        let wait = config.notifications.fire_after.saturating_add(Duration::from_secs(5));
        let delivered = tokio::time::timeout(wait, center.next_delivery()).await.is_ok()
            || center
                .ticket(&ticket.ticket_id)
                .is_some_and(|armed| armed.is_delivered());
        summary.notification_delivered = delivered;
        if delivered {
            for _ in 0..2 {
                center.tap(&ticket.ticket_id);
            }
        } else {
            warn!(ticket_id = %ticket.ticket_id, "notification was never delivered");
        }
    }

    summary.calendar_events = calendar.events().len();
    summary.navigations = navigation.pushed();
    service.shutdown();
    info!(?summary, "session complete");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.reminder, ReminderConfig::default());
        assert_eq!(config.notifications.fire_after, Duration::from_secs(5));
        assert_eq!(config.capabilities, CapabilityReport::all());
        assert_eq!(config.gate.prompt_timeout, None);
    }

    #[test]
    fn settings_are_read_from_environment() {
        let config = AppConfig::from_lookup(lookup(&[
            ("REMINDER_DURATION_SECS", "1800"),
            ("REMINDER_ALARM_OFFSET_SECS", "off"),
            ("REMINDER_LOCALE", "es-MX"),
            ("REMINDER_EVENT_TITLE", "Recordatorio de compra"),
            ("NOTIFICATION_DELAY_SECS", "10"),
            ("REENTRY_DEBOUNCE_MS", "250"),
            ("PERMISSION_PROMPT_TIMEOUT_SECS", "20"),
            ("REMINDER_CAPABILITIES", "notifications"),
        ]))
        .unwrap();

        assert_eq!(config.reminder.duration_seconds, 1800);
        assert_eq!(config.reminder.alarm_offset_seconds, None);
        assert_eq!(config.reminder.locale, Locale::Es);
        assert_eq!(config.reminder.event_title, "Recordatorio de compra");
        assert_eq!(config.notifications.fire_after, Duration::from_secs(10));
        assert_eq!(config.router.debounce, Duration::from_millis(250));
        assert_eq!(config.gate.prompt_timeout, Some(Duration::from_secs(20)));
        assert!(!config.capabilities.supports(Capability::EventStore));
        assert!(config.capabilities.supports(Capability::Notifications));
    }

    #[test]
    fn invalid_values_keep_defaults() {
        let config = AppConfig::from_lookup(lookup(&[
            ("REMINDER_DURATION_SECS", "0"),
            ("REMINDER_ALARM_OFFSET_SECS", "soon"),
            ("REMINDER_LOCALE", "fr"),
            ("NOTIFICATION_DELAY_SECS", "-3"),
            ("REMINDER_CAPABILITIES", "camera, calendar"),
        ]))
        .unwrap();

        assert_eq!(config.reminder.duration_seconds, 3600);
        assert_eq!(config.reminder.alarm_offset_seconds, Some(900));
        assert_eq!(config.reminder.locale, Locale::En);
        assert_eq!(config.notifications.fire_after, Duration::from_secs(5));
        assert!(config.capabilities.supports(Capability::EventStore));
        assert!(!config.capabilities.supports(Capability::Notifications));
    }
}
