use std::sync::Arc;

use anyhow::{anyhow, Result};
use tracing::{info, warn};

use crate::capability::{CapabilityGate, CapabilityReport, GateConfig, PermissionHost};
use crate::clock::{Clock, SystemClock};
use crate::coordinator::{
    NoticeKind, ReminderConfig, ReminderCoordinator, ReminderPrompt, ReminderReport, UserNotice,
};
use crate::error::{NotificationError, ReminderError};
use crate::event_store::{EventHandle, EventStore};
use crate::lifecycle::{AppLifecycle, Lifecycle};
use crate::notifications::{NotificationConfig, NotificationScheduler, NotificationSink, NotificationTicket};
use crate::product::Product;
use crate::reminder::{DateSelection, SelectedInstant};
use crate::router::{DeepLinkReentryRouter, Navigator, RouterConfig};
use crate::viewer::ExternalViewer;

/// Owns the reminder components and the single notification-response
/// subscription for the lifetime of the app.
pub struct ReminderService {
    lifecycle: Lifecycle,
    gate: Arc<CapabilityGate>,
    coordinator: ReminderCoordinator,
    scheduler: NotificationScheduler,
    router: Arc<DeepLinkReentryRouter>,
}

pub struct ReminderServiceBuilder {
    permission_host: Option<Arc<dyn PermissionHost>>,
    event_store: Option<Arc<dyn EventStore>>,
    viewer: Option<Arc<dyn ExternalViewer>>,
    notification_sink: Option<Arc<dyn NotificationSink>>,
    navigator: Option<Arc<dyn Navigator>>,
    clock: Arc<dyn Clock>,
    capabilities: CapabilityReport,
    lifecycle: Lifecycle,
    gate_config: GateConfig,
    reminder_config: ReminderConfig,
    notification_config: NotificationConfig,
    router_config: RouterConfig,
}

impl Default for ReminderServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReminderServiceBuilder {
    pub fn new() -> Self {
        Self {
            permission_host: None,
            event_store: None,
            viewer: None,
            notification_sink: None,
            navigator: None,
            clock: Arc::new(SystemClock),
            capabilities: CapabilityReport::none(),
            lifecycle: Lifecycle::new(),
            gate_config: GateConfig::default(),
            reminder_config: ReminderConfig::default(),
            notification_config: NotificationConfig::default(),
            router_config: RouterConfig::default(),
        }
    }

    pub fn with_permission_host(mut self, host: Arc<dyn PermissionHost>) -> Self {
        self.permission_host = Some(host);
        self
    }

    pub fn with_event_store(mut self, store: Arc<dyn EventStore>) -> Self {
        self.event_store = Some(store);
        self
    }

    pub fn with_viewer(mut self, viewer: Arc<dyn ExternalViewer>) -> Self {
        self.viewer = Some(viewer);
        self
    }

    pub fn with_notification_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.notification_sink = Some(sink);
        self
    }

    pub fn with_navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Capabilities the host reported at startup.
    pub fn with_capabilities(mut self, capabilities: CapabilityReport) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_lifecycle(mut self, lifecycle: Lifecycle) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    pub fn with_gate_config(mut self, config: GateConfig) -> Self {
        self.gate_config = config;
        self
    }

    pub fn with_reminder_config(mut self, config: ReminderConfig) -> Self {
        self.reminder_config = config;
        self
    }

    pub fn with_notification_config(mut self, config: NotificationConfig) -> Self {
        self.notification_config = config;
        self
    }

    pub fn with_router_config(mut self, config: RouterConfig) -> Self {
        self.router_config = config;
        self
    }

    pub fn build(self) -> Result<ReminderService> {
        let permission_host = self
            .permission_host
            .ok_or_else(|| anyhow!("permission host not configured"))?;
        let event_store = self
            .event_store
            .ok_or_else(|| anyhow!("event store not configured"))?;
        let viewer = self
            .viewer
            .ok_or_else(|| anyhow!("external viewer not configured"))?;
        let notification_sink = self
            .notification_sink
            .ok_or_else(|| anyhow!("notification sink not configured"))?;
        let navigator = self
            .navigator
            .ok_or_else(|| anyhow!("navigator not configured"))?;

        let gate = Arc::new(
            CapabilityGate::new(permission_host, self.capabilities, self.lifecycle.clone())
                .with_config(self.gate_config),
        );
        let coordinator =
            ReminderCoordinator::new(gate.clone(), event_store, viewer, self.reminder_config);
        let scheduler = NotificationScheduler::new(
            gate.clone(),
            notification_sink,
            self.clock,
            self.notification_config,
        );
        let router = Arc::new(DeepLinkReentryRouter::new(navigator, self.router_config));
        scheduler.add_response_listener(router.listener());

        info!(capabilities = ?gate.report(), "reminder service ready");
        Ok(ReminderService {
            lifecycle: self.lifecycle,
            gate,
            coordinator,
            scheduler,
            router,
        })
    }
}

impl ReminderService {
    pub fn builder() -> ReminderServiceBuilder {
        ReminderServiceBuilder::new()
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn capabilities(&self) -> &CapabilityReport {
        self.gate.report()
    }

    pub fn coordinator(&self) -> &ReminderCoordinator {
        &self.coordinator
    }

    pub fn scheduler(&self) -> &NotificationScheduler {
        &self.scheduler
    }

    pub fn router(&self) -> &Arc<DeepLinkReentryRouter> {
        &self.router
    }

    /// Whether the "add purchase reminder" affordance should be shown.
    pub fn reminder_available(&self) -> bool {
        self.coordinator.is_available()
    }

    pub async fn create_reminder(
        &self,
        scheduled_at: impl Into<SelectedInstant>,
        product: &Product,
    ) -> Result<EventHandle, ReminderError> {
        self.coordinator.create_reminder(scheduled_at, product).await
    }

    pub async fn remind(
        &self,
        selection: DateSelection,
        product: &Product,
        prompt: &dyn ReminderPrompt,
    ) -> ReminderReport {
        self.coordinator.remind(selection, product, prompt).await
    }

    /// Arms the re-engagement notification for a product detail view. A
    /// refusal is reported through `prompt`; a platform without
    /// notifications stays silent.
    pub async fn on_product_viewed(
        &self,
        product: &Product,
        prompt: &dyn ReminderPrompt,
    ) -> Result<NotificationTicket, NotificationError> {
        let scheduled = self.scheduler.schedule(product).await;
        if let Err(err) = &scheduled {
            warn!(product_id = %product.id, %err, "re-engagement notification not armed");
            if *err != NotificationError::CapabilityUnsupported {
                let locale = self.coordinator.config().locale;
                prompt.show_notice(&UserNotice::new(
                    NoticeKind::Error,
                    locale,
                    err.user_message(locale),
                ));
            }
        }
        scheduled
    }

    /// Terminates the lifecycle, which abandons pending prompts, and tears
    /// down the response subscription.
    pub fn shutdown(&self) {
        self.lifecycle.transition(AppLifecycle::Terminated);
        self.scheduler.shutdown();
        info!("reminder service shut down");
    }
}

impl Drop for ReminderService {
    fn drop(&mut self) {
        self.scheduler.shutdown();
    }
}
