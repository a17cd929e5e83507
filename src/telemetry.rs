//! Telemetry initialization (tracing/tracing-subscriber) and the submission-outcome sink.
//!
//! Behavior:
//! - LOG_LEVEL controls the filter (e.g. "debug" or detailed directives like
//!   "info,flow=debug,backend=debug,tower_http=info,axum=info").
//! - LOG_FORMAT selects "pretty" (default) or "json" structured logs.
//!
//! Result submissions never fail the flow. Their outcome goes to a `SubmissionSink`
//! instead, which logs it and keeps the counters reported by `/api/v1/health`.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::domain::Quiz;
use crate::flow::SubmissionStatus;

pub fn init_tracing() {
    let filter = EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| {
        EnvFilter::new("info,quiz_backend=debug,flow=debug,scoring=info,backend=debug,tower_http=info,axum=info")
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    // Choose JSON vs pretty; don't try to store different layer types.
    match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => {
            builder.json().init();
        }
        _ => {
            builder.init();
        }
    }
}

/// One finished result submission.
#[derive(Debug, Clone)]
pub struct SubmissionReport {
    pub session_id: Uuid,
    pub assessment_id: Uuid,
    pub quiz: Quiz,
    /// Payload kind (`FULL_TEST`, `employee_test`, ...).
    pub kind: &'static str,
    pub status: SubmissionStatus,
}

pub trait SubmissionSink: Send + Sync {
    fn report(&self, report: &SubmissionReport);
}

/// Default sink: structured log line plus delivered/failed counters.
#[derive(Debug, Default)]
pub struct TelemetrySink {
    delivered: AtomicU64,
    failed: AtomicU64,
}

impl TelemetrySink {
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

impl SubmissionSink for TelemetrySink {
    fn report(&self, r: &SubmissionReport) {
        match &r.status {
            SubmissionStatus::Delivered => {
                self.delivered.fetch_add(1, Ordering::Relaxed);
                info!(target: "quiz_backend", session = %r.session_id, assessment = %r.assessment_id, quiz = ?r.quiz, kind = r.kind, "Result submission delivered");
            }
            SubmissionStatus::Failed { reason } => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                error!(target: "quiz_backend", session = %r.session_id, assessment = %r.assessment_id, quiz = ?r.quiz, kind = r.kind, %reason, "Result submission failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_counts_outcomes() {
        let sink = TelemetrySink::default();
        let mut report = SubmissionReport {
            session_id: Uuid::new_v4(),
            assessment_id: Uuid::new_v4(),
            quiz: Quiz::TeamFull,
            kind: "FULL_TEST",
            status: SubmissionStatus::Delivered,
        };
        sink.report(&report);
        report.status = SubmissionStatus::Failed { reason: "timeout".into() };
        sink.report(&report);
        sink.report(&report);
        assert_eq!(sink.delivered(), 1);
        assert_eq!(sink.failed(), 2);
    }
}
