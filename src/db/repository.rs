use chrono::{NaiveDate, NaiveTime, Utc};
use sqlx::SqlitePool;

use crate::models::{AttendanceRecord, AttendanceStatus, NotificationMessage, Student, Teacher};

pub async fn find_student(db: &SqlitePool, id: &str) -> Result<Option<Student>, sqlx::Error> {
    sqlx::query_as::<_, Student>(
        "SELECT id, full_name, school_id, grade_level, section, guardian_phone FROM students WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(db)
    .await
}

pub async fn find_teacher(db: &SqlitePool, id: &str) -> Result<Option<Teacher>, sqlx::Error> {
    sqlx::query_as::<_, Teacher>(
        "SELECT id, full_name, school_id, grade_level, section FROM teachers WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(db)
    .await
}

/// Students in the teacher's scope: same school, and matching grade/section
/// wherever the teacher has those set. A teacher with no grade or section is
/// a cross-cutting role and sees the whole school.
pub async fn roster_for_teacher(
    db: &SqlitePool,
    teacher: &Teacher,
) -> Result<Vec<Student>, sqlx::Error> {
    sqlx::query_as::<_, Student>(
        r#"
        SELECT id, full_name, school_id, grade_level, section, guardian_phone
        FROM students
        WHERE school_id = ?1
          AND (?2 IS NULL OR grade_level = ?2)
          AND (?3 IS NULL OR section = ?3)
        ORDER BY full_name ASC
        "#,
    )
    .bind(&teacher.school_id)
    .bind(&teacher.grade_level)
    .bind(&teacher.section)
    .fetch_all(db)
    .await
}

pub async fn find_record(
    db: &SqlitePool,
    student_id: &str,
    date: NaiveDate,
) -> Result<Option<AttendanceRecord>, sqlx::Error> {
    sqlx::query_as::<_, AttendanceRecord>(
        "SELECT id, student_id, date, time_in, time_out, status, remarks, updated_at FROM attendance_records WHERE student_id = ? AND date = ?",
    )
    .bind(student_id)
    .bind(date)
    .fetch_optional(db)
    .await
}

/// Inserts the record unless one already exists for (student_id, date).
/// Returns false on conflict; the caller must reread and take the
/// existing-record path. This is the atomicity guard against two concurrent
/// first submissions for the same student and day.
pub async fn try_insert_record(
    db: &SqlitePool,
    record: &AttendanceRecord,
) -> Result<bool, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        INSERT INTO attendance_records
            (id, student_id, date, time_in, time_out, status, remarks, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(student_id, date) DO NOTHING
        "#,
    )
    .bind(&record.id)
    .bind(&record.student_id)
    .bind(record.date)
    .bind(record.time_in)
    .bind(record.time_out)
    .bind(record.status)
    .bind(&record.remarks)
    .bind(&record.updated_at)
    .execute(db)
    .await?
    .rows_affected();

    Ok(rows > 0)
}

/// Claims the empty time_in field. The `time_in IS NULL` guard makes the
/// read-then-write sequence atomic: of two concurrent submissions that both
/// observed the field empty, only one write lands. Returns false for the
/// loser, who must reread and take the already-recorded path.
pub async fn set_time_in(
    db: &SqlitePool,
    id: &str,
    time_in: NaiveTime,
    status: AttendanceStatus,
    remarks: Option<&str>,
) -> Result<bool, sqlx::Error> {
    let now = Utc::now().to_rfc3339();
    let rows = sqlx::query(
        "UPDATE attendance_records SET time_in = ?, status = ?, remarks = ?, updated_at = ? WHERE id = ? AND time_in IS NULL",
    )
    .bind(time_in)
    .bind(status)
    .bind(remarks)
    .bind(now)
    .bind(id)
    .execute(db)
    .await?
    .rows_affected();
    Ok(rows > 0)
}

/// Same first-write-wins guard as `set_time_in`, for the time_out field.
pub async fn set_time_out(
    db: &SqlitePool,
    id: &str,
    time_out: NaiveTime,
    remarks: Option<&str>,
) -> Result<bool, sqlx::Error> {
    let now = Utc::now().to_rfc3339();
    let rows = sqlx::query(
        "UPDATE attendance_records SET time_out = ?, remarks = ?, updated_at = ? WHERE id = ? AND time_out IS NULL",
    )
    .bind(time_out)
    .bind(remarks)
    .bind(now)
    .bind(id)
    .execute(db)
    .await?
    .rows_affected();
    Ok(rows > 0)
}

pub async fn delete_record(
    db: &SqlitePool,
    student_id: &str,
    date: NaiveDate,
) -> Result<bool, sqlx::Error> {
    let rows = sqlx::query("DELETE FROM attendance_records WHERE student_id = ? AND date = ?")
        .bind(student_id)
        .bind(date)
        .execute(db)
        .await?
        .rows_affected();
    Ok(rows > 0)
}

pub async fn insert_notification(
    db: &SqlitePool,
    msg: &NotificationMessage,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO sms_outbox (id, phone_number, body, student_id, scheduled_at, sent)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&msg.id)
    .bind(&msg.phone_number)
    .bind(&msg.body)
    .bind(&msg.student_id)
    .bind(&msg.scheduled_at)
    .bind(msg.sent)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn fetch_unsent_notifications(
    db: &SqlitePool,
) -> Result<Vec<NotificationMessage>, sqlx::Error> {
    sqlx::query_as::<_, NotificationMessage>(
        "SELECT id, phone_number, body, student_id, scheduled_at, sent FROM sms_outbox WHERE sent = 0 ORDER BY scheduled_at ASC",
    )
    .fetch_all(db)
    .await
}

pub async fn mark_notification_sent(db: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
    let rows = sqlx::query("UPDATE sms_outbox SET sent = 1 WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?
        .rows_affected();
    Ok(rows > 0)
}
