//! Fire-and-forget enqueueing

use std::sync::Arc;

use super::NewNotification;
use crate::store::NotificationOutbox;

/// Enqueues notifications without ever failing the caller
#[derive(Clone)]
pub struct Notifier {
    outbox: Arc<dyn NotificationOutbox>,
}

impl Notifier {
    pub fn new(outbox: Arc<dyn NotificationOutbox>) -> Self {
        Self { outbox }
    }

    pub async fn notify(&self, notification: NewNotification) {
        let user_id = notification.user_id;
        let kind = notification.kind;
        match self.outbox.enqueue(notification).await {
            Ok(id) => {
                tracing::debug!(notification_id = %id, user_id = %user_id, ?kind, "Notification enqueued");
            }
            Err(e) => {
                tracing::error!(user_id = %user_id, ?kind, "Failed to enqueue notification: {}", e);
            }
        }
    }
}
