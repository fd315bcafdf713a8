use async_trait::async_trait;
use chrono::{NaiveTime, Utc};
use sqlx::SqlitePool;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::repository;
use crate::error::AppError;
use crate::models::{NotificationMessage, ScanKind};

/// Deterministic body from (student name, kind, time).
pub fn notification_body(full_name: &str, kind: ScanKind, time: NaiveTime) -> String {
    let verb = match kind {
        ScanKind::TimeIn => "timed in",
        ScanKind::TimeOut => "timed out",
    };
    format!(
        "{} has {} at {}.",
        full_name,
        verb,
        time.format("%I:%M %p")
    )
}

pub fn build_message(
    phone_number: &str,
    student_id: &str,
    full_name: &str,
    kind: ScanKind,
    time: NaiveTime,
) -> NotificationMessage {
    NotificationMessage {
        id: Uuid::new_v4().to_string(),
        phone_number: phone_number.to_string(),
        body: notification_body(full_name, kind, time),
        student_id: student_id.to_string(),
        scheduled_at: Utc::now().to_rfc3339(),
        sent: false,
    }
}

/// Handle held by the attendance write path. Enqueue is fire-and-forget: a
/// full or closed channel is logged and dropped, never surfaced to the
/// attendance transition.
#[derive(Clone)]
pub struct Notifier {
    tx: Option<mpsc::Sender<NotificationMessage>>,
}

impl Notifier {
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn enqueue(&self, msg: NotificationMessage) {
        let Some(tx) = &self.tx else {
            return;
        };
        if let Err(e) = tx.try_send(msg) {
            warn!("dropping parent notification: {}", e);
        }
    }
}

pub fn channel(capacity: usize) -> (Notifier, mpsc::Receiver<NotificationMessage>) {
    let (tx, rx) = mpsc::channel(capacity);
    (Notifier { tx: Some(tx) }, rx)
}

/// Drains the channel into the sms_outbox table. Runs as its own task so
/// outbox writes never sit on the request path.
pub async fn run_outbox_worker(db: SqlitePool, mut rx: mpsc::Receiver<NotificationMessage>) {
    while let Some(msg) = rx.recv().await {
        if let Err(e) = repository::insert_notification(&db, &msg).await {
            warn!("failed to persist notification for {}: {}", msg.student_id, e);
        }
    }
    info!("notification channel closed, outbox worker exiting");
}

/// Delivery transport supplied by the SMS collaborator. The core only
/// guarantees enqueue, not delivery.
#[async_trait]
pub trait SmsTransport: Send + Sync {
    async fn send(&self, msg: &NotificationMessage) -> Result<(), AppError>;
}

pub struct NoopSmsTransport;

#[async_trait]
impl SmsTransport for NoopSmsTransport {
    async fn send(&self, _msg: &NotificationMessage) -> Result<(), AppError> {
        Ok(())
    }
}

/// Pushes unsent outbox rows through the transport, flipping `sent` per row.
/// A failed send leaves its row unsent for the next pass.
pub async fn deliver_pending(
    db: &SqlitePool,
    transport: &dyn SmsTransport,
) -> Result<usize, AppError> {
    let pending = repository::fetch_unsent_notifications(db).await?;
    let mut delivered = 0;
    for msg in pending {
        match transport.send(&msg).await {
            Ok(()) => {
                repository::mark_notification_sent(db, &msg.id).await?;
                delivered += 1;
            }
            Err(e) => {
                warn!("sms delivery failed for {}: {}", msg.id, e);
            }
        }
    }
    Ok(delivered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_is_deterministic() {
        let t = NaiveTime::from_hms_opt(7, 10, 0).unwrap();
        assert_eq!(
            notification_body("Maria Cruz", ScanKind::TimeIn, t),
            "Maria Cruz has timed in at 07:10 AM."
        );
        let t = NaiveTime::from_hms_opt(16, 0, 0).unwrap();
        assert_eq!(
            notification_body("Maria Cruz", ScanKind::TimeOut, t),
            "Maria Cruz has timed out at 04:00 PM."
        );
    }
}
