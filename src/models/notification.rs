use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Outbox row for the SMS collaborator. Append-only; only `sent` is ever
/// mutated, by the delivery side.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NotificationMessage {
    pub id: String,
    pub phone_number: String,
    pub body: String,
    pub student_id: String,
    pub scheduled_at: String,
    pub sent: bool,
}
