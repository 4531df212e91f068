//! Outbox delivery worker

use async_trait::async_trait;
use std::{sync::Arc, time::Duration};
use thiserror::Error;

use super::Notification;
use crate::store::{NotificationQueue, StoreError};
use crate::websocket::WsState;

/// Delivery errors
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("relay request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Rejected(String),
}

/// One way of getting a notification to its user
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &'static str;

    async fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError>;
}

/// Push to the user's open WebSocket sessions.
///
/// Users without a live session pick the notification up from the inbox, so
/// this channel never fails.
pub struct WsChannel {
    ws_state: WsState,
}

impl WsChannel {
    pub fn new(ws_state: WsState) -> Self {
        Self { ws_state }
    }
}

#[async_trait]
impl NotificationChannel for WsChannel {
    fn name(&self) -> &'static str {
        "websocket"
    }

    async fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError> {
        let sessions = self.ws_state.push(notification).await;
        tracing::debug!(
            notification_id = %notification.id,
            sessions,
            "Pushed notification to live sessions"
        );
        Ok(())
    }
}

/// POST the notification JSON to an email relay
pub struct EmailRelay {
    http: reqwest::Client,
    url: String,
}

impl EmailRelay {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, DeliveryError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }
}

#[async_trait]
impl NotificationChannel for EmailRelay {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError> {
        let response = self.http.post(&self.url).json(notification).send().await?;
        if !response.status().is_success() {
            return Err(DeliveryError::Rejected(format!(
                "relay answered {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Polls the outbox and delivers pending notifications
pub struct NotificationWorker {
    queue: Arc<dyn NotificationQueue>,
    channels: Vec<Arc<dyn NotificationChannel>>,
    poll_interval: Duration,
    batch_size: i64,
    max_attempts: i32,
}

impl NotificationWorker {
    pub fn new(
        queue: Arc<dyn NotificationQueue>,
        channels: Vec<Arc<dyn NotificationChannel>>,
        poll_interval: Duration,
        batch_size: i64,
        max_attempts: i32,
    ) -> Self {
        Self {
            queue,
            channels,
            poll_interval,
            batch_size,
            max_attempts,
        }
    }

    /// Deliver one batch; returns how many notifications were delivered.
    pub async fn run_once(&self) -> Result<usize, StoreError> {
        let batch = self.queue.claim_pending(self.batch_size).await?;
        let mut delivered = 0;

        for notification in &batch {
            match self.deliver(notification).await {
                Ok(()) => {
                    self.queue.mark_delivered(notification.id).await?;
                    delivered += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        notification_id = %notification.id,
                        attempt = notification.attempts + 1,
                        max_attempts = self.max_attempts,
                        "Notification delivery failed: {}",
                        e
                    );
                    self.queue
                        .mark_attempt_failed(notification.id, &e, self.max_attempts)
                        .await?;
                }
            }
        }

        Ok(delivered)
    }

    async fn deliver(&self, notification: &Notification) -> Result<(), String> {
        for channel in &self.channels {
            channel
                .deliver(notification)
                .await
                .map_err(|e| format!("{}: {}", channel.name(), e))?;
        }
        Ok(())
    }

    /// Poll forever.
    pub async fn run(self) {
        tracing::info!(
            channels = self.channels.len(),
            poll_secs = self.poll_interval.as_secs(),
            "Starting notification worker"
        );

        loop {
            match self.run_once().await {
                Ok(0) => {}
                Ok(delivered) => tracing::info!(delivered, "Delivered notifications"),
                Err(e) => tracing::error!("Error draining notification outbox: {}", e),
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::{DeliveryStatus, NewNotification, NotificationKind};
    use crate::store::{InMemoryStore, NotificationOutbox};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    struct Flaky {
        failures_left: AtomicUsize,
    }

    #[async_trait]
    impl NotificationChannel for Flaky {
        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn deliver(&self, _: &Notification) -> Result<(), DeliveryError> {
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(DeliveryError::Rejected("down".to_string()));
            }
            Ok(())
        }
    }

    fn worker(store: Arc<InMemoryStore>, failures: usize, max_attempts: i32) -> NotificationWorker {
        let channel: Arc<dyn NotificationChannel> = Arc::new(Flaky {
            failures_left: AtomicUsize::new(failures),
        });
        NotificationWorker::new(
            store,
            vec![channel],
            Duration::from_millis(10),
            10,
            max_attempts,
        )
    }

    #[tokio::test]
    async fn test_delivery_retries_until_success() {
        let store = Arc::new(InMemoryStore::new());
        store
            .enqueue(NewNotification::new(
                Uuid::new_v4(),
                NotificationKind::BookingRequested,
                "New booking",
            ))
            .await
            .unwrap();

        let worker = worker(store.clone(), 1, 5);
        assert_eq!(worker.run_once().await.unwrap(), 0);
        assert_eq!(worker.run_once().await.unwrap(), 1);

        let stored = store.notifications().await;
        assert_eq!(stored[0].status, DeliveryStatus::Delivered);
        assert_eq!(stored[0].attempts, 2);
        assert_eq!(stored[0].last_error.as_deref(), Some("flaky: down"));
    }

    #[tokio::test]
    async fn test_delivery_gives_up_after_max_attempts() {
        let store = Arc::new(InMemoryStore::new());
        store
            .enqueue(NewNotification::new(
                Uuid::new_v4(),
                NotificationKind::RateTrip,
                "Rate your trip",
            ))
            .await
            .unwrap();

        let worker = worker(store.clone(), 10, 2);
        worker.run_once().await.unwrap();
        worker.run_once().await.unwrap();
        // nothing left to claim
        worker.run_once().await.unwrap();

        let stored = store.notifications().await;
        assert_eq!(stored[0].status, DeliveryStatus::Failed);
        assert_eq!(stored[0].attempts, 2);
    }
}
