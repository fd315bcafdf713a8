#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

use attendsync::client::{ApiError, AttendanceApi, Rejection};
use attendsync::db::repository;
use attendsync::error::AppError;
use attendsync::models::{RosterStudent, SubmitRequest, SubmitResponse};
use attendsync::notify::Notifier;
use attendsync::queue::LocalQueue;
use attendsync::store::AttendanceStore;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub fn time(h: u32, m: u32, s: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, s).expect("valid time")
}

/// In-memory authoritative database. One connection so every query sees the
/// same memory database.
pub async fn server_db() -> SqlitePool {
    let db = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create database");

    sqlx::query(
        r#"
        CREATE TABLE teachers (
            id TEXT PRIMARY KEY,
            full_name TEXT NOT NULL,
            school_id TEXT NOT NULL,
            grade_level TEXT,
            section TEXT
        )
        "#,
    )
    .execute(&db)
    .await
    .expect("Failed to create teachers table");

    sqlx::query(
        r#"
        CREATE TABLE students (
            id TEXT PRIMARY KEY,
            full_name TEXT NOT NULL,
            school_id TEXT NOT NULL,
            grade_level TEXT,
            section TEXT,
            guardian_phone TEXT
        )
        "#,
    )
    .execute(&db)
    .await
    .expect("Failed to create students table");

    sqlx::query(
        r#"
        CREATE TABLE attendance_records (
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            date TEXT NOT NULL,
            time_in TEXT,
            time_out TEXT,
            status TEXT NOT NULL,
            remarks TEXT,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(&db)
    .await
    .expect("Failed to create attendance_records table");

    sqlx::query(
        "CREATE UNIQUE INDEX idx_attendance_student_date ON attendance_records(student_id, date)",
    )
    .execute(&db)
    .await
    .expect("Failed to create attendance index");

    sqlx::query(
        r#"
        CREATE TABLE sms_outbox (
            id TEXT PRIMARY KEY,
            phone_number TEXT NOT NULL,
            body TEXT NOT NULL,
            student_id TEXT NOT NULL,
            scheduled_at TEXT NOT NULL,
            sent INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(&db)
    .await
    .expect("Failed to create sms_outbox table");

    db
}

pub async fn insert_teacher(
    db: &SqlitePool,
    id: &str,
    school: &str,
    grade: Option<&str>,
    section: Option<&str>,
) {
    sqlx::query(
        "INSERT INTO teachers (id, full_name, school_id, grade_level, section) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(format!("Teacher {}", id))
    .bind(school)
    .bind(grade)
    .bind(section)
    .execute(db)
    .await
    .expect("Failed to insert teacher");
}

pub async fn insert_student(
    db: &SqlitePool,
    id: &str,
    name: &str,
    school: &str,
    grade: Option<&str>,
    section: Option<&str>,
    phone: Option<&str>,
) {
    sqlx::query(
        "INSERT INTO students (id, full_name, school_id, grade_level, section, guardian_phone) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(name)
    .bind(school)
    .bind(grade)
    .bind(section)
    .bind(phone)
    .execute(db)
    .await
    .expect("Failed to insert student");
}

/// Teacher T-1 with student S-1 in scope (same school, grade and section)
/// and student S-2 in a different section.
pub async fn seed_basic(db: &SqlitePool) {
    insert_teacher(db, "T-1", "SCH-1", Some("7"), Some("Sampaguita")).await;
    insert_teacher(db, "T-ADMIN", "SCH-1", None, None).await;
    insert_teacher(db, "T-OTHER", "SCH-2", None, None).await;
    insert_student(
        db,
        "S-1",
        "Maria Cruz",
        "SCH-1",
        Some("7"),
        Some("Sampaguita"),
        Some("+639170000001"),
    )
    .await;
    insert_student(db, "S-2", "Juan Reyes", "SCH-1", Some("7"), Some("Rosal"), None).await;
}

/// Fresh device queue backed by its own in-memory database.
pub async fn device_queue() -> LocalQueue {
    let db = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create queue database");
    let queue = LocalQueue::new(db);
    queue.init().await.expect("Failed to init queue schema");
    queue
}

fn app_to_api(err: AppError) -> ApiError {
    match err {
        AppError::AuthorizationMismatch(msg) => {
            ApiError::Rejected(Rejection::AuthorizationMismatch(msg))
        }
        AppError::NoTimeInYet => {
            ApiError::Rejected(Rejection::NoTimeInYet("No Time In found for today".to_string()))
        }
        AppError::MalformedPayload(msg) => ApiError::Rejected(Rejection::MalformedPayload(msg)),
        AppError::NotFound => ApiError::Rejected(Rejection::Other {
            code: "NOT_FOUND".to_string(),
            message: "Not Found".to_string(),
        }),
        other => ApiError::Transport(other.to_string()),
    }
}

/// AttendanceApi double wired straight into a real server-side store, with a
/// switch that simulates a dead network (every call times out).
pub struct InProcessApi {
    db: SqlitePool,
    store: AttendanceStore,
    offline: AtomicBool,
}

impl InProcessApi {
    pub fn new(db: SqlitePool) -> Arc<Self> {
        let store = AttendanceStore::new(db.clone(), Notifier::disabled());
        Arc::new(Self {
            db,
            store,
            offline: AtomicBool::new(false),
        })
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), ApiError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(ApiError::Transport("simulated request timeout".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl AttendanceApi for InProcessApi {
    async fn submit_time_in(&self, req: &SubmitRequest) -> Result<SubmitResponse, ApiError> {
        self.check_online()?;
        self.store.submit_time_in(req).await.map_err(app_to_api)
    }

    async fn submit_time_out(&self, req: &SubmitRequest) -> Result<SubmitResponse, ApiError> {
        self.check_online()?;
        self.store.submit_time_out(req).await.map_err(app_to_api)
    }

    async fn fetch_roster(&self, teacher_id: &str) -> Result<Vec<RosterStudent>, ApiError> {
        self.check_online()?;
        let teacher = repository::find_teacher(&self.db, teacher_id)
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?
            .ok_or_else(|| {
                ApiError::Rejected(Rejection::Other {
                    code: "NOT_FOUND".to_string(),
                    message: "Not Found".to_string(),
                })
            })?;
        let students = repository::roster_for_teacher(&self.db, &teacher)
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Ok(students
            .into_iter()
            .map(|s| RosterStudent {
                id: s.id,
                full_name: s.full_name,
            })
            .collect())
    }
}
