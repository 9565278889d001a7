use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::ViewerError;
use crate::event_store::EventHandle;

/// The event store's own viewer app, reached through a platform deep link.
/// How the link encodes the start time is up to the implementation.
#[async_trait]
pub trait ExternalViewer: Send + Sync {
    fn viewer_url(&self, start_at: DateTime<Utc>) -> Option<String>;

    async fn can_open(&self, url: &str) -> bool;

    async fn open(&self, url: &str) -> Result<(), ViewerError>;
}

/// Opens the viewer at the event's start time and returns the URL used.
pub async fn open_event(viewer: &dyn ExternalViewer, handle: &EventHandle) -> Result<String, ViewerError> {
    let url = viewer
        .viewer_url(handle.start_at())
        .ok_or(ViewerError::NoDeepLink)?;
    if !viewer.can_open(&url).await {
        return Err(ViewerError::DeepLinkUnopenable { url });
    }
    viewer.open(&url).await?;
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_store::EventDraft;
    use crate::test_support::FakeViewer;
    use chrono::TimeZone;

    fn handle() -> EventHandle {
        let start_at = Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap();
        EventHandle::for_draft(
            "evt",
            &EventDraft {
                title: "Purchase Reminder".into(),
                start_at,
                end_at: start_at + chrono::Duration::hours(1),
                alarm_offset_seconds: None,
            },
        )
    }

    #[tokio::test]
    async fn opens_link_built_from_start_time() {
        let viewer = FakeViewer::openable();
        let url = open_event(&viewer, &handle()).await.expect("viewer opens");
        assert_eq!(url, "viewer://1735725600");
        assert_eq!(viewer.opened.lock().as_slice(), [url]);
    }

    #[tokio::test]
    async fn unopenable_link_is_reported_without_launching() {
        let viewer = FakeViewer::unopenable();
        let err = open_event(&viewer, &handle()).await.unwrap_err();
        assert!(matches!(err, ViewerError::DeepLinkUnopenable { .. }));
        assert!(viewer.opened.lock().is_empty());

        let viewer = FakeViewer {
            has_link: false,
            ..FakeViewer::openable()
        };
        assert_eq!(open_event(&viewer, &handle()).await, Err(ViewerError::NoDeepLink));
    }
}
