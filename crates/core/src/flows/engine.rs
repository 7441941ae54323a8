use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::domain::lead::Lead;
use crate::flows::states::{LeadAction, LeadStatus, TransitionOutcome};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("invalid lead transition from {from} to {to}")]
    InvalidTransition { from: LeadStatus, to: LeadStatus },
}

/// Guarded lead state machine. Edges are unconditional: membership in
/// [`LeadStatus::allowed_targets`] is the only guard.
#[derive(Clone, Copy, Debug, Default)]
pub struct LeadLifecycle;

impl LeadLifecycle {
    pub fn is_valid_transition(from: LeadStatus, to: LeadStatus) -> bool {
        from.can_transition_to(to)
    }

    /// Moves `lead` to `target`. Returns `false` and leaves the lead untouched
    /// when the edge is not in the table.
    pub fn update_status(&self, lead: &mut Lead, target: LeadStatus, reason: Option<&str>) -> bool {
        self.try_transition(lead, target, reason, Utc::now()).is_ok()
    }

    pub fn try_transition(
        &self,
        lead: &mut Lead,
        target: LeadStatus,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        let from = lead.conversion_status();
        if !Self::is_valid_transition(from, target) {
            return Err(FlowTransitionError::InvalidTransition { from, to: target });
        }

        let reason = reason.map(str::trim).filter(|reason| !reason.is_empty());

        lead.set_conversion_status(target);
        lead.last_contact = now;
        if let Some(reason) = reason {
            lead.append_note(&format!("[{}] {}: {reason}", now.format("%Y-%m-%d %H:%M"), target));
        }
        if target == LeadStatus::ConvertedToOrder {
            lead.converted_at = Some(now);
        }

        Ok(TransitionOutcome {
            from,
            to: target,
            reason: reason.map(str::to_string),
            occurred_at: now,
        })
    }

    pub fn apply_with_audit<S>(
        &self,
        lead: &mut Lead,
        target: LeadStatus,
        reason: Option<&str>,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<TransitionOutcome, FlowTransitionError>
    where
        S: AuditSink + ?Sized,
    {
        let result = self.try_transition(lead, target, reason, Utc::now());
        match &result {
            Ok(outcome) => {
                sink.emit(
                    AuditEvent::from_context(
                        audit,
                        "lead.transition_applied",
                        AuditCategory::Lead,
                        AuditOutcome::Success,
                    )
                    .with_metadata("from", outcome.from.as_str())
                    .with_metadata("to", outcome.to.as_str()),
                );
            }
            Err(error) => {
                sink.emit(
                    AuditEvent::from_context(
                        audit,
                        "lead.transition_rejected",
                        AuditCategory::Lead,
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("error", error.to_string()),
                );
            }
        }
        result
    }

    /// Actions offered for the lead's current state, derived fresh from the table.
    pub fn available_actions(&self, lead: &Lead) -> Vec<LeadAction> {
        let targets = lead.conversion_status().allowed_targets();
        targets.iter().copied().map(LeadAction::towards).collect()
    }
}
