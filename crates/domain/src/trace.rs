use serde::Serialize;

/// Structured lifecycle events emitted by the scheduler core. Each variant
/// is logged as one JSON-tagged `tracing` event so a log pipeline can key
/// off `event` without parsing free-text messages.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum AgentEvent {
    PollCycleStarted {
        instance_id: String,
    },
    PollCycleCompleted {
        instance_id: String,
        associations_seen: usize,
        duration_ms: u64,
    },
    PollCycleAborted {
        reason: String,
    },
    AssociationRefreshed {
        association_id: String,
        unchanged: bool,
    },
    AssociationExcluded {
        association_id: String,
        reason: String,
    },
    AssociationDuplicateDropped {
        association_id: String,
    },
    ScheduleParsed {
        association_id: String,
        expression: String,
    },
    ScheduleParseFailed {
        association_id: String,
        expression: String,
        message: String,
    },
    ExecutionSubmitted {
        association_id: String,
        document_id: String,
    },
    ExecutionSkippedAlreadyRunning {
        association_id: String,
    },
    ExecutionCompleted {
        association_id: String,
        document_id: String,
        status: String,
        duration_ms: u64,
    },
    ComplianceUpdated {
        association_id: String,
        status: String,
    },
    ComplianceUpdateStale {
        association_id: String,
    },
    WorkerPanicCaught {
        context: String,
        payload: String,
    },
    StatusReported {
        association_id: String,
        status: String,
        error_code: String,
    },
}

impl AgentEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(agent_event = %json, "sa_agent_event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_does_not_panic_on_any_variant() {
        AgentEvent::PollCycleStarted {
            instance_id: "mi-1".into(),
        }
        .emit();
        AgentEvent::WorkerPanicCaught {
            context: "task-pool".into(),
            payload: "boom".into(),
        }
        .emit();
    }
}
