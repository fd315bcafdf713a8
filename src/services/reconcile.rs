use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use crate::client::{ApiError, AttendanceApi, Rejection};
use crate::error::AppError;
use crate::models::{PendingScanEvent, ScanKind, SubmitRequest};
use crate::queue::LocalQueue;

/// Drains the device queue once connectivity is back: validates each student
/// against the current roster, consolidates events per (student, day), and
/// replays them through the same idempotent server transitions.
pub struct Reconciler {
    api: Arc<dyn AttendanceApi>,
    queue: LocalQueue,
    teacher_id: String,
}

#[derive(Debug, Default, Serialize)]
pub struct ReconcileStats {
    /// Consolidated (student, day) groups committed to the server.
    pub submitted: usize,
    /// Groups left unsynced for the next pass.
    pub failed: usize,
    /// Buffered events deleted because their student fell out of scope.
    pub invalidated: usize,
    /// Synced events removed from the local queue.
    pub pruned: u64,
}

impl Reconciler {
    pub fn new(api: Arc<dyn AttendanceApi>, queue: LocalQueue, teacher_id: String) -> Self {
        Self {
            api,
            queue,
            teacher_id,
        }
    }

    pub async fn reconcile(&self) -> Result<ReconcileStats, AppError> {
        let mut stats = ReconcileStats::default();

        let events = self.queue.list_unsynced().await?;
        if events.is_empty() {
            return Ok(stats);
        }
        info!("Starting reconciliation of {} buffered events", events.len());

        // A roster fetch failure aborts the pass with the queue untouched.
        let roster = self
            .api
            .fetch_roster(&self.teacher_id)
            .await
            .map_err(|e| match e {
                ApiError::Transport(msg) => AppError::Upstream(msg),
                ApiError::Rejected(rejection) => rejection.into_app_error(),
            })?;
        let roster_ids: HashSet<&str> = roster.iter().map(|s| s.id.as_str()).collect();

        // Step 1: students no longer in scope can never be submitted; their
        // buffered events are dropped so they cannot block the queue forever.
        let mut dropped: HashSet<String> = HashSet::new();
        let mut valid_events = Vec::new();
        for event in events {
            if roster_ids.contains(event.student_id.as_str()) {
                valid_events.push(event);
            } else if dropped.insert(event.student_id.clone()) {
                let deleted = self
                    .queue
                    .delete_unsynced_for_student(&event.student_id)
                    .await?;
                warn!(
                    "student {} is no longer on the roster; dropped {} buffered events",
                    event.student_id, deleted
                );
                stats.invalidated += deleted as usize;
            }
        }

        // Step 2: consolidate to one upsert per (student, day). The queue's
        // dedup keeps one event per kind, but historical duplicates are
        // tolerated by taking the latest of each.
        let mut groups: BTreeMap<(String, NaiveDate), Vec<PendingScanEvent>> = BTreeMap::new();
        for event in valid_events {
            groups
                .entry((event.student_id.clone(), event.date))
                .or_default()
                .push(event);
        }

        'groups: for ((student_id, date), group) in groups {
            let latest = |kind: ScanKind| {
                group
                    .iter()
                    .filter(|e| e.kind == kind)
                    .max_by(|a, b| a.created_at.cmp(&b.created_at))
                    .cloned()
            };
            let submissions = [
                (ScanKind::TimeIn, latest(ScanKind::TimeIn)),
                (ScanKind::TimeOut, latest(ScanKind::TimeOut)),
            ];

            for (kind, event) in submissions {
                let Some(event) = event else { continue };
                let req = SubmitRequest {
                    teacher_id: self.teacher_id.clone(),
                    student_id: student_id.clone(),
                    date,
                    observed_time: event.observed_time,
                };
                let attempt = match kind {
                    ScanKind::TimeIn => self.api.submit_time_in(&req).await,
                    ScanKind::TimeOut => self.api.submit_time_out(&req).await,
                };

                // Fresh success and already-recorded both count as synced.
                match attempt {
                    Ok(_) => {}
                    Err(ApiError::Transport(msg)) => {
                        warn!(
                            "reconcile transport failure for {} on {}: {}",
                            student_id, date, msg
                        );
                        stats.failed += 1;
                        continue 'groups;
                    }
                    Err(ApiError::Rejected(Rejection::AuthorizationMismatch(msg))) => {
                        // Scope changed after the roster snapshot; these can
                        // never succeed, so treat like a roster invalidation.
                        warn!(
                            "authorization rejected for {} during reconcile: {}",
                            student_id, msg
                        );
                        stats.invalidated +=
                            self.queue.delete_unsynced_for_student(&student_id).await? as usize;
                        continue 'groups;
                    }
                    Err(ApiError::Rejected(Rejection::NoTimeInYet(_))) => {
                        // A TimeOut-only group; its TimeIn may still arrive
                        // from another device, so keep it for the next pass.
                        warn!(
                            "no Time In on record yet for {} on {}; keeping buffered Time Out",
                            student_id, date
                        );
                        stats.failed += 1;
                        continue 'groups;
                    }
                    Err(ApiError::Rejected(rejection)) => {
                        warn!(
                            "reconcile rejected for {} on {}: {}",
                            student_id, date, rejection
                        );
                        stats.failed += 1;
                        continue 'groups;
                    }
                }
            }

            // Mark before pruning: a crash here re-reads as synced and is
            // never resubmitted.
            for event in &group {
                self.queue.mark_synced(&event.id).await?;
            }
            stats.submitted += 1;
        }

        stats.pruned = self.queue.prune_synced().await?;
        info!(
            "Reconciliation completed - submitted: {}, failed: {}, invalidated: {}, pruned: {}",
            stats.submitted, stats.failed, stats.invalidated, stats.pruned
        );
        Ok(stats)
    }
}
