use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppLifecycle {
    Foreground,
    Background,
    Terminated,
}

impl AppLifecycle {
    pub fn is_foreground(self) -> bool {
        matches!(self, Self::Foreground)
    }
}

/// Shared app-lifecycle signal. Clones observe the same state.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    state: Arc<watch::Sender<AppLifecycle>>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        let (state, _) = watch::channel(AppLifecycle::Foreground);
        Self {
            state: Arc::new(state),
        }
    }

    pub fn current(&self) -> AppLifecycle {
        *self.state.borrow()
    }

    /// Moves to `next`. `Terminated` is final and later transitions are ignored.
    pub fn transition(&self, next: AppLifecycle) {
        let previous = self.current();
        if previous == AppLifecycle::Terminated || previous == next {
            return;
        }
        self.state.send_replace(next);
        tracing::debug!(?previous, ?next, "app lifecycle changed");
    }

    pub fn subscribe(&self) -> watch::Receiver<AppLifecycle> {
        self.state.subscribe()
    }
}

/// Resolves once the observed lifecycle leaves the foreground.
pub async fn left_foreground(mut state: watch::Receiver<AppLifecycle>) {
    loop {
        if !state.borrow_and_update().is_foreground() {
            return;
        }
        if state.changed().await.is_err() {
            return;
        }
    }
}

/// Resolves once the observed lifecycle reaches `Terminated`, or the
/// lifecycle itself is gone.
pub async fn terminated(mut state: watch::Receiver<AppLifecycle>) {
    loop {
        if *state.borrow_and_update() == AppLifecycle::Terminated {
            return;
        }
        if state.changed().await.is_err() {
            return;
        }
    }
}
