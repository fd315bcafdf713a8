use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::warn;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{NewScanEvent, PendingScanEvent, ScanKind};

/// Device-resident durable buffer of scan events that have not yet been
/// confirmed by the authoritative store. Owned exclusively by its device;
/// there is no fallback beneath it, so its write failures are hard errors.
#[derive(Clone)]
pub struct LocalQueue {
    db: SqlitePool,
}

impl LocalQueue {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// The queue owns its file outright, so schema setup happens here rather
    /// than through server migrations.
    pub async fn init(&self) -> Result<(), AppError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pending_scan_events (
                id TEXT PRIMARY KEY,
                student_id TEXT NOT NULL,
                date TEXT NOT NULL,
                kind TEXT NOT NULL,
                observed_time TEXT NOT NULL,
                device_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                synced INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.db)
        .await?;
        sqlx::query(
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS idx_pending_unsynced
                ON pending_scan_events(student_id, date, kind)
                WHERE synced = 0
            "#,
        )
        .execute(&self.db)
        .await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS student_name_cache (
                student_id TEXT PRIMARY KEY,
                display_name TEXT NOT NULL,
                cached_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.db)
        .await?;
        Ok(())
    }

    /// Duplicate suppression: a second scan of the same kind for the same
    /// student and day, while the first is still unsynced, returns the
    /// existing event instead of inserting a new one. This mirrors the
    /// server-side idempotency so an offline double-scan still yields exactly
    /// one eventual server mutation.
    pub async fn enqueue(
        &self,
        event: &NewScanEvent,
        device_id: &str,
    ) -> Result<PendingScanEvent, AppError> {
        if let Some(existing) = self
            .find_unsynced(&event.student_id, event.date, event.kind)
            .await?
        {
            return Ok(existing);
        }

        let pending = PendingScanEvent {
            id: Uuid::new_v4().to_string(),
            student_id: event.student_id.clone(),
            date: event.date,
            kind: event.kind,
            observed_time: event.observed_time,
            device_id: device_id.to_string(),
            created_at: Utc::now().to_rfc3339(),
            synced: false,
        };
        sqlx::query(
            r#"
            INSERT INTO pending_scan_events
                (id, student_id, date, kind, observed_time, device_id, created_at, synced)
            VALUES (?, ?, ?, ?, ?, ?, ?, 0)
            "#,
        )
        .bind(&pending.id)
        .bind(&pending.student_id)
        .bind(pending.date)
        .bind(pending.kind)
        .bind(pending.observed_time)
        .bind(&pending.device_id)
        .bind(&pending.created_at)
        .execute(&self.db)
        .await?;

        // Best-effort display name for local UI only; never fails the enqueue.
        if let Some(name) = &event.display_name {
            if let Err(e) = self.cache_name(&event.student_id, name).await {
                warn!("failed to cache student name for {}: {}", event.student_id, e);
            }
        }

        Ok(pending)
    }

    async fn find_unsynced(
        &self,
        student_id: &str,
        date: NaiveDate,
        kind: ScanKind,
    ) -> Result<Option<PendingScanEvent>, AppError> {
        let event = sqlx::query_as::<_, PendingScanEvent>(
            r#"
            SELECT id, student_id, date, kind, observed_time, device_id, created_at, synced
            FROM pending_scan_events
            WHERE student_id = ? AND date = ? AND kind = ? AND synced = 0
            "#,
        )
        .bind(student_id)
        .bind(date)
        .bind(kind)
        .fetch_optional(&self.db)
        .await?;
        Ok(event)
    }

    /// Oldest-first replay order, preserving real-world chronology.
    pub async fn list_unsynced(&self) -> Result<Vec<PendingScanEvent>, AppError> {
        let events = sqlx::query_as::<_, PendingScanEvent>(
            r#"
            SELECT id, student_id, date, kind, observed_time, device_id, created_at, synced
            FROM pending_scan_events
            WHERE synced = 0
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(events)
    }

    /// Mark-then-prune is a deliberate two-step: a crash between the server
    /// ack and the prune leaves the event marked synced, so the next
    /// reconciliation pass skips it instead of resubmitting.
    pub async fn mark_synced(&self, id: &str) -> Result<bool, AppError> {
        let rows = sqlx::query("UPDATE pending_scan_events SET synced = 1 WHERE id = ?")
            .bind(id)
            .execute(&self.db)
            .await?
            .rows_affected();
        Ok(rows > 0)
    }

    pub async fn prune_synced(&self) -> Result<u64, AppError> {
        let rows = sqlx::query("DELETE FROM pending_scan_events WHERE synced = 1")
            .execute(&self.db)
            .await?
            .rows_affected();
        Ok(rows)
    }

    /// Invalidation support: drops every unsynced event for a student who is
    /// no longer in the device's roster scope.
    pub async fn delete_unsynced_for_student(&self, student_id: &str) -> Result<u64, AppError> {
        let rows =
            sqlx::query("DELETE FROM pending_scan_events WHERE student_id = ? AND synced = 0")
                .bind(student_id)
                .execute(&self.db)
                .await?
                .rows_affected();
        Ok(rows)
    }

    pub async fn cached_name(&self, student_id: &str) -> Result<Option<String>, AppError> {
        let name = sqlx::query_scalar::<_, String>(
            "SELECT display_name FROM student_name_cache WHERE student_id = ?",
        )
        .bind(student_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(name)
    }

    async fn cache_name(&self, student_id: &str, display_name: &str) -> Result<(), AppError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO student_name_cache (student_id, display_name, cached_at)
            VALUES (?, ?, ?)
            ON CONFLICT(student_id) DO UPDATE SET display_name = excluded.display_name,
                                                 cached_at = excluded.cached_at
            "#,
        )
        .bind(student_id)
        .bind(display_name)
        .bind(now)
        .execute(&self.db)
        .await?;
        Ok(())
    }
}
