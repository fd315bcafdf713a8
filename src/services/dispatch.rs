use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use tracing::{info, warn};

use crate::client::{ApiError, AttendanceApi};
use crate::error::AppError;
use crate::models::{NewScanEvent, PendingScanEvent, ScanKind, SubmitRequest, SubmitResponse};
use crate::queue::LocalQueue;
use crate::scan;

/// Per-scan decision loop: authoritative path first, offline queue only on
/// transport failure. Business rejections propagate unchanged.
pub struct ScanDispatcher {
    api: Arc<dyn AttendanceApi>,
    queue: LocalQueue,
    teacher_id: String,
    device_id: String,
}

#[derive(Debug)]
pub enum DispatchOutcome {
    /// Committed to the authoritative store during the scan.
    Synced(SubmitResponse),
    /// Accepted locally after a transport failure; a buffered scan is a
    /// valid outcome for the operator, not a partial failure.
    Buffered(PendingScanEvent),
}

impl DispatchOutcome {
    pub fn message(&self) -> String {
        match self {
            DispatchOutcome::Synced(resp) => resp.message.clone(),
            DispatchOutcome::Buffered(event) => format!(
                "{} saved on this device; it will sync once the connection returns",
                event.kind
            ),
        }
    }
}

impl ScanDispatcher {
    pub fn new(
        api: Arc<dyn AttendanceApi>,
        queue: LocalQueue,
        teacher_id: String,
        device_id: String,
    ) -> Self {
        Self {
            api,
            queue,
            teacher_id,
            device_id,
        }
    }

    /// Entry point for scan sources that hand over the raw QR payload. A
    /// malformed payload is rejected here, before any network or queue work.
    pub async fn dispatch_raw(
        &self,
        raw_payload: &str,
        kind: ScanKind,
        date: NaiveDate,
        observed_time: NaiveTime,
    ) -> Result<DispatchOutcome, AppError> {
        let payload = scan::parse_qr_payload(raw_payload)?;
        self.dispatch(NewScanEvent {
            student_id: payload.student_id,
            date,
            kind,
            observed_time,
            display_name: payload.full_name,
        })
        .await
    }

    pub async fn dispatch(&self, scan: NewScanEvent) -> Result<DispatchOutcome, AppError> {
        let req = SubmitRequest {
            teacher_id: self.teacher_id.clone(),
            student_id: scan.student_id.clone(),
            date: scan.date,
            observed_time: scan.observed_time,
        };

        let attempt = match scan.kind {
            ScanKind::TimeIn => self.api.submit_time_in(&req).await,
            ScanKind::TimeOut => self.api.submit_time_out(&req).await,
        };

        match attempt {
            Ok(resp) => {
                info!(
                    "scan synced for student {} ({}): {}",
                    scan.student_id, scan.kind, resp.message
                );
                Ok(DispatchOutcome::Synced(resp))
            }
            // A processed rejection recurs identically on retry; buffering it
            // would only duplicate data. Surface it as-is.
            Err(ApiError::Rejected(rejection)) => Err(rejection.into_app_error()),
            Err(ApiError::Transport(reason)) => {
                warn!(
                    "transport failure for student {} ({}), buffering offline: {}",
                    scan.student_id, scan.kind, reason
                );
                // Queue write failure is an outright error; there is no
                // fallback beneath the offline queue.
                let event = self.queue.enqueue(&scan, &self.device_id).await?;
                Ok(DispatchOutcome::Buffered(event))
            }
        }
    }
}
