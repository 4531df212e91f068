//! Notification domain module
//!
//! Engine code enqueues notifications through [`Notifier`]; the
//! [`NotificationWorker`] delivers them out of band.

mod model;
mod outbox;
mod worker;

pub use model::*;
pub use outbox::Notifier;
pub use worker::{DeliveryError, EmailRelay, NotificationChannel, NotificationWorker, WsChannel};
