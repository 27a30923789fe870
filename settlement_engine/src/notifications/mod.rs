//! Customer notifications.
//!
//! The engine raises a [`Notification`] only after the state change it describes has been committed, and hands it to
//! the [`NotificationQueue`]. Enqueuing never fails the operation that raised it; delivery happens later on the
//! queue's worker.
mod notification_types;
mod queue;

pub use notification_types::Notification;
pub use queue::{
    DeliveryFuture,
    DeliveryHandler,
    DeliveryStatus,
    NotificationQueue,
    QueueConfig,
    QueueStats,
    QueuedNotification,
};
