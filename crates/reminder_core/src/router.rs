use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::notifications::{NotificationResponse, ResponseListener};
use crate::product::ProductId;

/// In-app navigation collaborator.
pub trait Navigator: Send + Sync {
    fn navigate_to_product(&self, product_id: ProductId);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Repeat navigation to the same product inside this window is dropped.
    pub debounce: Duration,
    /// How many routed ticket ids are remembered for duplicate detection.
    /// The oldest id is evicted first. A repeat of an evicted ticket that
    /// arrives after `debounce` has elapsed navigates again, so this must
    /// exceed the number of notifications that can be live at once.
    pub remembered_tickets: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_secs(1),
            remembered_tickets: 64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    Navigated(ProductId),
    Duplicate,
    Dismissed,
    Malformed,
}

#[derive(Default)]
struct RouterState {
    routed_tickets: VecDeque<String>,
    last_navigation: Option<(ProductId, Instant)>,
}

impl RouterState {
    fn remember(&mut self, ticket_id: &str, capacity: usize) {
        if capacity == 0 {
            return;
        }
        while self.routed_tickets.len() >= capacity {
            self.routed_tickets.pop_front();
        }
        self.routed_tickets.push_back(ticket_id.to_string());
    }
}

/// Turns notification interactions into product-detail navigation, once per
/// ticket no matter how often the platform reports the interaction.
pub struct DeepLinkReentryRouter {
    navigator: Arc<dyn Navigator>,
    config: RouterConfig,
    state: Mutex<RouterState>,
}

impl DeepLinkReentryRouter {
    pub fn new(navigator: Arc<dyn Navigator>, config: RouterConfig) -> Self {
        Self {
            navigator,
            config,
            state: Mutex::new(RouterState::default()),
        }
    }

    pub fn handle(&self, response: &NotificationResponse) -> RouteOutcome {
        if response.is_dismissal() {
            debug!(ticket_id = %response.ticket_id, "notification dismissed");
            return RouteOutcome::Dismissed;
        }
        let Some(product_id) = product_id_from(&response.data) else {
            warn!(ticket_id = %response.ticket_id, data = %response.data, "notification payload has no product id");
            return RouteOutcome::Malformed;
        };

        let now = Instant::now();
        {
            let mut state = self.state.lock();
            if state.routed_tickets.iter().any(|seen| *seen == response.ticket_id) {
                debug!(ticket_id = %response.ticket_id, "duplicate interaction ignored");
                return RouteOutcome::Duplicate;
            }
            let debounced = matches!(
                state.last_navigation,
                Some((last, at)) if last == product_id && now.duration_since(at) < self.config.debounce
            );
            state.remember(&response.ticket_id, self.config.remembered_tickets);
            if debounced {
                debug!(%product_id, "navigation debounced");
                return RouteOutcome::Duplicate;
            }
            state.last_navigation = Some((product_id, now));
        }

        info!(%product_id, ticket_id = %response.ticket_id, "reentering product detail");
        self.navigator.navigate_to_product(product_id);
        RouteOutcome::Navigated(product_id)
    }

    /// Listener that feeds responses into this router.
    pub fn listener(self: &Arc<Self>) -> ResponseListener {
        let router = Arc::clone(self);
        Arc::new(move |response: &NotificationResponse| {
            router.handle(response);
        })
    }
}

/// Reads `productId` from notification data. Hosts hand it back either as a
/// number or as a string.
pub fn product_id_from(data: &Value) -> Option<ProductId> {
    match data.get("productId")? {
        Value::Number(number) => number.as_u64().map(ProductId),
        Value::String(raw) => raw.trim().parse().ok().map(ProductId),
        _ => None,
    }
}
