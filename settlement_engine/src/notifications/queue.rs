//! In-process notification queue.
//!
//! Producers call [`NotificationQueue::enqueue`], which only touches an in-memory map and so never blocks or fails
//! the settlement that raised the notification. A polling worker started with [`NotificationQueue::start`] hands
//! pending entries to a [`DeliveryHandler`], retrying failures up to a fixed number of attempts.
//!
//! Terminal entries (delivered or given up on) are kept for a retention window so that they can be inspected, then
//! dropped.
use std::{
    collections::HashMap,
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use chrono::{DateTime, Utc};
use log::*;
use serde::Serialize;
use tokio::{sync::watch, task::JoinHandle};
use uuid::Uuid;

use crate::notifications::Notification;

pub type DeliveryFuture = Pin<Box<dyn Future<Output = Result<(), String>> + Send>>;

/// Delivers one notification. An `Err` is recorded against the entry and the delivery is retried.
pub type DeliveryHandler = Arc<dyn Fn(Notification) -> DeliveryFuture + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl DeliveryStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeliveryStatus::Completed | DeliveryStatus::Failed)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueuedNotification {
    pub id: Uuid,
    pub notification: Notification,
    pub attempts: u32,
    pub status: DeliveryStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub poll_interval: Duration,
    pub max_attempts: u32,
    pub retention: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            max_attempts: 3,
            retention: Duration::from_secs(24 * 60 * 60),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct NotificationQueue {
    entries: Arc<Mutex<HashMap<Uuid, QueuedNotification>>>,
    config: QueueConfig,
    shutdown: Arc<watch::Sender<bool>>,
}

impl std::fmt::Debug for NotificationQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NotificationQueue ({:?})", self.stats())
    }
}

impl Default for NotificationQueue {
    fn default() -> Self {
        Self::new(QueueConfig::default())
    }
}

impl NotificationQueue {
    pub fn new(config: QueueConfig) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self { entries: Arc::new(Mutex::new(HashMap::new())), config, shutdown: Arc::new(shutdown) }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, QueuedNotification>> {
        // Entries are plain data, so a panic in another holder cannot leave them half-updated
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn enqueue(&self, notification: Notification) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();
        debug!("📬️ Queued {} notification {id} for {}", notification.kind(), notification.recipient());
        let entry = QueuedNotification {
            id,
            notification,
            attempts: 0,
            status: DeliveryStatus::Pending,
            created_at: now,
            updated_at: now,
            last_error: None,
        };
        self.lock().insert(id, entry);
        id
    }

    pub fn get(&self, id: &Uuid) -> Option<QueuedNotification> {
        self.lock().get(id).cloned()
    }

    pub fn stats(&self) -> QueueStats {
        self.lock().values().fold(QueueStats::default(), |mut stats, entry| {
            match entry.status {
                DeliveryStatus::Pending => stats.pending += 1,
                DeliveryStatus::Processing => stats.processing += 1,
                DeliveryStatus::Completed => stats.completed += 1,
                DeliveryStatus::Failed => stats.failed += 1,
            }
            stats
        })
    }

    /// Runs one delivery cycle: every pending entry gets one delivery attempt, then expired terminal entries are
    /// removed. Returns the number of entries delivered successfully.
    pub async fn process_cycle(&self, handler: &DeliveryHandler) -> usize {
        let batch = {
            let mut entries = self.lock();
            entries
                .values_mut()
                .filter(|e| e.status == DeliveryStatus::Pending)
                .map(|e| {
                    e.status = DeliveryStatus::Processing;
                    (e.id, e.notification.clone())
                })
                .collect::<Vec<_>>()
        };
        if !batch.is_empty() {
            trace!("📬️ Delivering {} notifications", batch.len());
        }
        let mut delivered = 0;
        for (id, notification) in batch {
            let result = (handler)(notification).await;
            let mut entries = self.lock();
            let Some(entry) = entries.get_mut(&id) else {
                continue;
            };
            entry.attempts += 1;
            entry.updated_at = Utc::now();
            match result {
                Ok(()) => {
                    entry.status = DeliveryStatus::Completed;
                    delivered += 1;
                    debug!("📬️ Notification {id} delivered");
                },
                Err(e) if entry.attempts >= self.config.max_attempts => {
                    warn!("📬️ Giving up on notification {id} after {} attempts. {e}", entry.attempts);
                    entry.status = DeliveryStatus::Failed;
                    entry.last_error = Some(e);
                },
                Err(e) => {
                    info!("📬️ Notification {id} failed on attempt {}. Will retry. {e}", entry.attempts);
                    entry.status = DeliveryStatus::Pending;
                    entry.last_error = Some(e);
                },
            }
        }
        self.purge_expired();
        delivered
    }

    fn purge_expired(&self) {
        let retention = chrono::Duration::from_std(self.config.retention).unwrap_or(chrono::Duration::MAX);
        let cutoff = Utc::now().checked_sub_signed(retention).unwrap_or(DateTime::<Utc>::MIN_UTC);
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, e| !(e.status.is_terminal() && e.updated_at <= cutoff));
        let removed = before - entries.len();
        if removed > 0 {
            debug!("📬️ Removed {removed} expired notifications");
        }
    }

    /// Runs delivery cycles back to back until nothing is pending. Entries that keep failing stop being pending once
    /// they reach the attempt limit, so this always finishes.
    pub async fn drain(&self, handler: &DeliveryHandler) -> usize {
        let mut delivered = 0;
        while self.stats().pending > 0 {
            delivered += self.process_cycle(handler).await;
        }
        delivered
    }

    /// Starts the polling worker. The worker runs until [`NotificationQueue::stop`] is called. A stopped queue can be
    /// started again.
    pub fn start(&self, handler: DeliveryHandler) -> JoinHandle<()> {
        self.shutdown.send_replace(false);
        let queue = self.clone();
        let mut shutdown = self.shutdown.subscribe();
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(queue.config.poll_interval);
            info!("📬️ Notification worker started");
            while !*shutdown.borrow() {
                tokio::select! {
                    _ = timer.tick() => {
                        queue.process_cycle(&handler).await;
                    },
                    _ = shutdown.changed() => {},
                }
            }
            info!("📬️ Notification worker stopped");
        })
    }

    /// Signals the worker to exit once its current cycle is done.
    pub fn stop(&self) {
        self.shutdown.send_replace(true);
    }
}
