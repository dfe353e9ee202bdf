//! Fire-and-forget audit event sink.
//!
//! The auth path never blocks on, or fails because of, audit delivery. The
//! default sink emits structured tracing events; deployments that persist
//! audit rows plug in their own sink behind the same trait.

use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AuditOutcome {
    Success,
    Failure,
    Denied,
}

impl AuditOutcome {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Denied => "denied",
        }
    }
}

#[derive(Clone, Debug)]
pub struct AuditEvent {
    pub event_type: &'static str,
    pub principal_id: Option<Uuid>,
    pub outcome: AuditOutcome,
    pub ip: Option<String>,
    pub at: DateTime<Utc>,
}

impl AuditEvent {
    #[must_use]
    pub fn new(
        event_type: &'static str,
        principal_id: Option<Uuid>,
        outcome: AuditOutcome,
        ip: Option<String>,
    ) -> Self {
        Self {
            event_type,
            principal_id,
            outcome,
            ip,
            at: Utc::now(),
        }
    }
}

pub trait AuditSink: Send + Sync {
    /// Record one event. Implementations must not block the caller; slow
    /// backends should enqueue and return.
    fn record(&self, event: AuditEvent);
}

/// Default sink: structured log lines only.
#[derive(Clone, Debug)]
pub struct LogAuditSink;

impl AuditSink for LogAuditSink {
    fn record(&self, event: AuditEvent) {
        tracing::info!(
            audit.event = event.event_type,
            audit.outcome = event.outcome.as_str(),
            audit.principal_id = event.principal_id.map(|id| id.to_string()),
            audit.ip = event.ip.as_deref(),
            audit.at = %event.at.to_rfc3339(),
            "audit event"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_wire_names() {
        assert_eq!(AuditOutcome::Success.as_str(), "success");
        assert_eq!(AuditOutcome::Failure.as_str(), "failure");
        assert_eq!(AuditOutcome::Denied.as_str(), "denied");
    }

    #[test]
    fn log_sink_does_not_panic_without_subscriber() {
        LogAuditSink.record(AuditEvent::new(
            "login",
            Some(Uuid::new_v4()),
            AuditOutcome::Failure,
            Some("10.0.0.1".to_string()),
        ));
    }
}
