use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum ScanKind {
    TimeIn,
    TimeOut,
}

impl std::fmt::Display for ScanKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanKind::TimeIn => write!(f, "Time In"),
            ScanKind::TimeOut => write!(f, "Time Out"),
        }
    }
}

/// Device-resident scan event awaiting reconciliation. At most one unsynced
/// row exists per (student_id, date, kind).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PendingScanEvent {
    pub id: String,
    pub student_id: String,
    pub date: NaiveDate,
    pub kind: ScanKind,
    pub observed_time: NaiveTime,
    pub device_id: String,
    pub created_at: String,
    pub synced: bool,
}

/// A scan as produced by the QR adapter, before it is either submitted or
/// buffered.
#[derive(Debug, Clone)]
pub struct NewScanEvent {
    pub student_id: String,
    pub date: NaiveDate,
    pub kind: ScanKind,
    pub observed_time: NaiveTime,
    pub display_name: Option<String>,
}
