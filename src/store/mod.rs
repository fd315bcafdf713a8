use chrono::{NaiveTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::db::repository;
use crate::error::AppError;
use crate::models::{
    AttendanceRecord, AttendanceStatus, ScanKind, Student, SubmitRequest, SubmitResponse,
};
use crate::notify::{self, Notifier};

fn hms(h: u32, m: u32, s: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, s).expect("valid constant time")
}

/// Fixed institutional thresholds. A scan in [07:00:00, 10:59:59] is a late
/// morning arrival; 13:05:00 onward is a late afternoon arrival.
pub fn status_for_time_in(time_in: NaiveTime) -> AttendanceStatus {
    let morning_cutoff = hms(7, 0, 0);
    let morning_end = hms(10, 59, 59);
    let afternoon_cutoff = hms(13, 5, 0);

    if (time_in >= morning_cutoff && time_in <= morning_end) || time_in >= afternoon_cutoff {
        AttendanceStatus::Late
    } else {
        AttendanceStatus::Present
    }
}

pub fn time_in_remarks(status: AttendanceStatus) -> Option<String> {
    match status {
        AttendanceStatus::Late => Some("Late".to_string()),
        _ => None,
    }
}

/// Recomputed whenever time_out lands. Whole day requires arriving by 07:30
/// and leaving at 16:30 or later; anything else is a half day. The Late
/// prefix preserves the original arrival status.
pub fn day_remarks(time_in: NaiveTime, time_out: NaiveTime, status: AttendanceStatus) -> String {
    let base = if time_in <= hms(7, 30, 0) && time_out >= hms(16, 30, 0) {
        "Whole Day"
    } else {
        "Half Day"
    };
    if status == AttendanceStatus::Late {
        format!("Late - {}", base)
    } else {
        base.to_string()
    }
}

/// Idempotent no-op response: the original time survives every retry.
fn already_time_in(record: &AttendanceRecord) -> Option<SubmitResponse> {
    record.time_in.map(|existing| SubmitResponse {
        status: record.status,
        time_in: Some(existing),
        time_out: record.time_out,
        remarks: record.remarks.clone(),
        already_recorded: true,
        message: format!(
            "Time In already recorded at {}",
            existing.format("%H:%M:%S")
        ),
    })
}

fn already_time_out(record: &AttendanceRecord) -> Option<SubmitResponse> {
    match (record.time_in, record.time_out) {
        (Some(time_in), Some(existing)) => Some(SubmitResponse {
            status: record.status,
            time_in: Some(time_in),
            time_out: Some(existing),
            remarks: record.remarks.clone(),
            already_recorded: true,
            message: format!(
                "Time Out already recorded at {}",
                existing.format("%H:%M:%S")
            ),
        }),
        _ => None,
    }
}

/// Authoritative per-(student, date) record keeper. State machine:
/// NotMarked -> TimeInRecorded -> TimeOutRecorded, both transitions
/// idempotent; no transition ever clears a recorded time.
pub struct AttendanceStore {
    db: SqlitePool,
    notifier: Notifier,
}

impl AttendanceStore {
    pub fn new(db: SqlitePool, notifier: Notifier) -> Self {
        Self { db, notifier }
    }

    /// School must match; grade and section must match wherever the teacher
    /// has them set. A mismatch is a business rejection, never buffered.
    async fn authorize(&self, teacher_id: &str, student_id: &str) -> Result<Student, AppError> {
        let teacher = repository::find_teacher(&self.db, teacher_id)
            .await?
            .ok_or_else(|| {
                AppError::AuthorizationMismatch(format!("unknown teacher: {}", teacher_id))
            })?;
        let student = repository::find_student(&self.db, student_id)
            .await?
            .ok_or(AppError::NotFound)?;

        if student.school_id != teacher.school_id {
            return Err(AppError::AuthorizationMismatch(
                "student is not enrolled in your school".to_string(),
            ));
        }
        if let Some(grade) = &teacher.grade_level {
            if student.grade_level.as_deref() != Some(grade.as_str()) {
                return Err(AppError::AuthorizationMismatch(
                    "student is not in your grade level".to_string(),
                ));
            }
        }
        if let Some(section) = &teacher.section {
            if student.section.as_deref() != Some(section.as_str()) {
                return Err(AppError::AuthorizationMismatch(
                    "student is not in your section".to_string(),
                ));
            }
        }
        Ok(student)
    }

    pub async fn submit_time_in(&self, req: &SubmitRequest) -> Result<SubmitResponse, AppError> {
        let student = self.authorize(&req.teacher_id, &req.student_id).await?;

        if let Some(record) = repository::find_record(&self.db, &req.student_id, req.date).await? {
            return self.apply_time_in_to_existing(&student, record, req).await;
        }

        let status = status_for_time_in(req.observed_time);
        let record = AttendanceRecord {
            id: Uuid::new_v4().to_string(),
            student_id: req.student_id.clone(),
            date: req.date,
            time_in: Some(req.observed_time),
            time_out: None,
            status,
            remarks: time_in_remarks(status),
            updated_at: Utc::now().to_rfc3339(),
        };

        if repository::try_insert_record(&self.db, &record).await? {
            self.notify(&student, ScanKind::TimeIn, req.observed_time);
            return Ok(SubmitResponse {
                status,
                time_in: record.time_in,
                time_out: None,
                remarks: record.remarks,
                already_recorded: false,
                message: format!(
                    "Time In recorded at {}",
                    req.observed_time.format("%H:%M:%S")
                ),
            });
        }

        // Lost the insert race; a concurrent submission created the row.
        let record = repository::find_record(&self.db, &req.student_id, req.date)
            .await?
            .ok_or(AppError::InternalServerError)?;
        self.apply_time_in_to_existing(&student, record, req).await
    }

    async fn apply_time_in_to_existing(
        &self,
        student: &Student,
        record: AttendanceRecord,
        req: &SubmitRequest,
    ) -> Result<SubmitResponse, AppError> {
        if let Some(resp) = already_time_in(&record) {
            return Ok(resp);
        }

        // Row exists without a time_in (administrative absence or anomaly);
        // the scan claims the field and its derived status. The conditional
        // update keeps the read-then-write sequence atomic against a
        // concurrent submission claiming the same empty field.
        let status = status_for_time_in(req.observed_time);
        let remarks = time_in_remarks(status);
        if !repository::set_time_in(
            &self.db,
            &record.id,
            req.observed_time,
            status,
            remarks.as_deref(),
        )
        .await?
        {
            // Lost the field race; the winner's time stands.
            let record = repository::find_record(&self.db, &req.student_id, req.date)
                .await?
                .ok_or(AppError::InternalServerError)?;
            return already_time_in(&record).ok_or(AppError::InternalServerError);
        }
        self.notify(student, ScanKind::TimeIn, req.observed_time);
        Ok(SubmitResponse {
            status,
            time_in: Some(req.observed_time),
            time_out: record.time_out,
            remarks,
            already_recorded: false,
            message: format!(
                "Time In recorded at {}",
                req.observed_time.format("%H:%M:%S")
            ),
        })
    }

    pub async fn submit_time_out(&self, req: &SubmitRequest) -> Result<SubmitResponse, AppError> {
        let student = self.authorize(&req.teacher_id, &req.student_id).await?;

        let record = repository::find_record(&self.db, &req.student_id, req.date)
            .await?
            .ok_or(AppError::NoTimeInYet)?;
        let Some(time_in) = record.time_in else {
            return Err(AppError::NoTimeInYet);
        };

        if let Some(resp) = already_time_out(&record) {
            return Ok(resp);
        }

        let remarks = day_remarks(time_in, req.observed_time, record.status);
        if !repository::set_time_out(&self.db, &record.id, req.observed_time, Some(&remarks))
            .await?
        {
            // A concurrent Time Out won the empty field; first write wins.
            let record = repository::find_record(&self.db, &req.student_id, req.date)
                .await?
                .ok_or(AppError::InternalServerError)?;
            return already_time_out(&record).ok_or(AppError::InternalServerError);
        }
        self.notify(&student, ScanKind::TimeOut, req.observed_time);
        Ok(SubmitResponse {
            status: record.status,
            time_in: Some(time_in),
            time_out: Some(req.observed_time),
            remarks: Some(remarks),
            already_recorded: false,
            message: format!(
                "Time Out recorded at {}",
                req.observed_time.format("%H:%M:%S")
            ),
        })
    }

    /// Administrative override; outside the scan path. The absent row has no
    /// times, and a later scan for the same day may overwrite the status.
    pub async fn mark_absent(
        &self,
        student_id: &str,
        date: chrono::NaiveDate,
    ) -> Result<AttendanceRecord, AppError> {
        repository::find_student(&self.db, student_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let record = AttendanceRecord {
            id: Uuid::new_v4().to_string(),
            student_id: student_id.to_string(),
            date,
            time_in: None,
            time_out: None,
            status: AttendanceStatus::Absent,
            remarks: Some("Absent".to_string()),
            updated_at: Utc::now().to_rfc3339(),
        };
        if !repository::try_insert_record(&self.db, &record).await? {
            return Err(AppError::BadRequest(
                "attendance already recorded for this day".to_string(),
            ));
        }
        Ok(record)
    }

    /// Cancellation deletes the absent row wholesale.
    pub async fn cancel_absent(
        &self,
        student_id: &str,
        date: chrono::NaiveDate,
    ) -> Result<(), AppError> {
        let record = repository::find_record(&self.db, student_id, date)
            .await?
            .ok_or(AppError::NotFound)?;
        if record.status != AttendanceStatus::Absent {
            return Err(AppError::BadRequest(
                "record is not an absence".to_string(),
            ));
        }
        repository::delete_record(&self.db, student_id, date).await?;
        Ok(())
    }

    fn notify(&self, student: &Student, kind: ScanKind, time: NaiveTime) {
        let Some(phone) = &student.guardian_phone else {
            debug!("no guardian phone on file for student {}", student.id);
            return;
        };
        let msg = notify::build_message(phone, &student.id, &student.full_name, kind, time);
        self.notifier.enqueue(msg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lateness_boundaries() {
        assert_eq!(status_for_time_in(hms(6, 59, 59)), AttendanceStatus::Present);
        assert_eq!(status_for_time_in(hms(7, 0, 0)), AttendanceStatus::Late);
        assert_eq!(status_for_time_in(hms(10, 59, 59)), AttendanceStatus::Late);
        assert_eq!(status_for_time_in(hms(11, 0, 0)), AttendanceStatus::Present);
        assert_eq!(status_for_time_in(hms(13, 4, 59)), AttendanceStatus::Present);
        assert_eq!(status_for_time_in(hms(13, 5, 0)), AttendanceStatus::Late);
    }

    #[test]
    fn whole_day_requires_both_boundaries() {
        let present = AttendanceStatus::Present;
        assert_eq!(
            day_remarks(hms(7, 30, 0), hms(16, 30, 0), present),
            "Whole Day"
        );
        assert_eq!(
            day_remarks(hms(7, 30, 1), hms(16, 30, 0), present),
            "Half Day"
        );
        assert_eq!(
            day_remarks(hms(7, 30, 0), hms(16, 29, 59), present),
            "Half Day"
        );
    }

    #[test]
    fn late_prefix_on_remarks() {
        assert_eq!(
            day_remarks(hms(7, 10, 0), hms(16, 45, 0), AttendanceStatus::Late),
            "Late - Whole Day"
        );
        assert_eq!(
            day_remarks(hms(8, 0, 0), hms(16, 0, 0), AttendanceStatus::Late),
            "Late - Half Day"
        );
    }
}
