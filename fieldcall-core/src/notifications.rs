//! Notification Surface.
//!
//! At most one notification is shown at a time; a new one replaces the
//! current one. Each shown notification clears itself after the configured
//! expiry unless it was replaced or acknowledged first. Showing a
//! notification never waits on anything: the state lives in a
//! `tokio::sync::watch` channel and renderers subscribe to it.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::config::NotificationsConfig;
use crate::models::{Notification, NotificationKind};

/// Snapshot published to subscribers.
#[derive(Debug, Clone, Default)]
pub struct NotificationFeed {
    pub current: Option<Notification>,
    /// Most recent last, bounded by `notifications.history_size`.
    pub history: VecDeque<Notification>,
}

#[derive(Clone)]
pub struct NotificationCenter {
    feed: Arc<watch::Sender<NotificationFeed>>,
    expiry: Duration,
    history_size: usize,
}

impl NotificationCenter {
    pub fn new(config: &NotificationsConfig) -> Self {
        Self::with_expiry(config.expiry(), config.history_size)
    }

    pub fn with_expiry(expiry: Duration, history_size: usize) -> Self {
        let (tx, _rx) = watch::channel(NotificationFeed::default());
        Self {
            feed: Arc::new(tx),
            expiry,
            history_size: history_size.max(1),
        }
    }

    /// Shows `notification`, replacing whatever is shown. Returns its id.
    pub fn show(&self, notification: Notification) -> u64 {
        let id = notification.id;

        match notification.kind {
            NotificationKind::Error => {
                info!(notification_id = id, kind = "error", "{}", notification.message)
            }
            _ => debug!(
                notification_id = id,
                kind = ?notification.kind,
                "{}",
                notification.message
            ),
        }

        let history_size = self.history_size;
        self.feed.send_modify(|feed| {
            feed.history.push_back(notification.clone());
            while feed.history.len() > history_size {
                feed.history.pop_front();
            }
            feed.current = Some(notification);
        });

        self.schedule_expiry(id);
        id
    }

    pub fn info(&self, message: impl Into<String>) -> u64 {
        self.show(Notification::info(message))
    }

    pub fn success(&self, message: impl Into<String>) -> u64 {
        self.show(Notification::success(message))
    }

    pub fn error(&self, message: impl Into<String>) -> u64 {
        self.show(Notification::error(message))
    }

    /// Removes the notification if it is still the one shown.
    pub fn acknowledge(&self, id: u64) -> bool {
        self.clear_if(id)
    }

    pub fn clear(&self) {
        self.feed.send_if_modified(|feed| feed.current.take().is_some());
    }

    pub fn current(&self) -> Option<Notification> {
        self.feed.borrow().current.clone()
    }

    pub fn history(&self) -> Vec<Notification> {
        self.feed.borrow().history.iter().cloned().collect()
    }

    pub fn subscribe(&self) -> watch::Receiver<NotificationFeed> {
        self.feed.subscribe()
    }

    pub fn expiry(&self) -> Duration {
        self.expiry
    }

    fn clear_if(&self, id: u64) -> bool {
        self.feed.send_if_modified(|feed| {
            if feed.current.as_ref().map(|n| n.id) == Some(id) {
                feed.current = None;
                true
            } else {
                false
            }
        })
    }

    fn schedule_expiry(&self, id: u64) {
        // Without a runtime (plain unit tests, sync callers) notifications
        // stay until replaced or acknowledged.
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let center = self.clone();
        let expiry = self.expiry;
        handle.spawn(async move {
            tokio::time::sleep(expiry).await;
            if center.clear_if(id) {
                debug!(notification_id = id, "Notification expired");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NotificationAction;

    #[test]
    fn test_new_notification_replaces_current() {
        let center = NotificationCenter::with_expiry(Duration::from_secs(8), 10);
        let first = center.info("first");
        let second = center.error("second");

        let current = center.current().unwrap();
        assert_eq!(current.id, second);
        assert_eq!(current.kind, NotificationKind::Error);
        assert!(!center.acknowledge(first));
        assert!(center.acknowledge(second));
        assert!(center.current().is_none());
    }

    #[test]
    fn test_history_is_bounded() {
        let center = NotificationCenter::with_expiry(Duration::from_secs(8), 2);
        center.info("a");
        center.info("b");
        center.info("c");

        let history: Vec<String> = center.history().into_iter().map(|n| n.message).collect();
        assert_eq!(history, vec!["b", "c"]);
    }

    #[test]
    fn test_action_is_kept() {
        let center = NotificationCenter::with_expiry(Duration::from_secs(8), 10);
        center.show(
            Notification::success("accepted").with_action(NotificationAction::StartCall {
                request_id: "r1".to_string(),
            }),
        );
        assert!(matches!(
            center.current().unwrap().action,
            Some(NotificationAction::StartCall { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_expiry() {
        let center = NotificationCenter::with_expiry(Duration::from_secs(8), 10);
        center.info("hello");

        tokio::time::sleep(Duration::from_secs(7)).await;
        assert!(center.current().is_some());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(center.current().is_none());
        assert_eq!(center.history().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replacement_restarts_expiry() {
        let center = NotificationCenter::with_expiry(Duration::from_secs(8), 10);
        center.info("first");

        tokio::time::sleep(Duration::from_secs(5)).await;
        let second = center.info("second");

        // The first notification's timer fires here and must not clear the second.
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(center.current().map(|n| n.id), Some(second));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(center.current().is_none());
    }

    #[tokio::test]
    async fn test_subscribers_observe_changes() {
        let center = NotificationCenter::with_expiry(Duration::from_secs(8), 10);
        let mut rx = center.subscribe();

        center.success("Session ended");
        rx.changed().await.unwrap();
        assert_eq!(
            rx.borrow().current.as_ref().map(|n| n.message.clone()),
            Some("Session ended".to_string())
        );
    }
}
