use thiserror::Error;

use crate::cpq::pricing::PricingError;
use crate::domain::lead::LeadId;
use crate::domain::quote::QuoteId;
use crate::flows::FlowTransitionError;
use crate::repository::RepositoryError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("lead `{0}` has no requested items to quote")]
    EmptyQuoteGeneration(LeadId),
    #[error("lead `{0}` was not found")]
    LeadNotFound(LeadId),
    #[error("quote `{0}` was not found")]
    QuoteNotFound(QuoteId),
    #[error("quote `{0}` has been superseded and can no longer change status")]
    QuoteNotActive(QuoteId),
    #[error(transparent)]
    Pricing(#[from] PricingError),
    #[error(transparent)]
    FlowTransition(#[from] FlowTransitionError),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

impl DomainError {
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::EmptyQuoteGeneration(_) => "empty_quote_generation",
            Self::LeadNotFound(_) | Self::QuoteNotFound(_) => "not_found",
            Self::QuoteNotActive(_) => "quote_not_active",
            Self::Pricing(PricingError::ItemNotFound(_)) => "item_not_found",
            Self::Pricing(PricingError::NoPricingTiers { .. }) => "no_pricing_tiers",
            Self::Pricing(_) => "invalid_pricing_input",
            Self::FlowTransition(_) => "invalid_state_transition",
            Self::InvariantViolation(_) => "invariant_violation",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Domain(error) => error.error_class(),
            Self::Persistence(_) => "persistence",
            Self::Configuration(_) => "config_validation",
        }
    }

    pub fn is_domain(&self) -> bool {
        matches!(self, Self::Domain(_))
    }
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        Self::Persistence(value.to_string())
    }
}

impl From<PricingError> for ApplicationError {
    fn from(value: PricingError) -> Self {
        Self::Domain(DomainError::Pricing(value))
    }
}

impl From<FlowTransitionError> for ApplicationError {
    fn from(value: FlowTransitionError) -> Self {
        Self::Domain(DomainError::FlowTransition(value))
    }
}

#[cfg(test)]
mod tests {
    use crate::cpq::pricing::PricingError;
    use crate::domain::catalog::CatalogItemId;
    use crate::domain::lead::LeadId;
    use crate::errors::{ApplicationError, DomainError};
    use crate::flows::{FlowTransitionError, LeadStatus};
    use crate::repository::RepositoryError;

    #[test]
    fn transition_errors_classify_as_invalid_state_transition() {
        let error = ApplicationError::from(FlowTransitionError::InvalidTransition {
            from: LeadStatus::ActiveLead,
            to: LeadStatus::ProformaSent,
        });

        assert!(error.is_domain());
        assert_eq!(error.error_class(), "invalid_state_transition");
        assert_eq!(error.to_string(), "invalid lead transition from active_lead to proforma_sent");
    }

    #[test]
    fn pricing_failures_keep_their_own_classes() {
        let missing =
            ApplicationError::from(PricingError::ItemNotFound(CatalogItemId("silk".to_owned())));
        assert_eq!(missing.error_class(), "item_not_found");

        let empty = ApplicationError::from(DomainError::EmptyQuoteGeneration(LeadId(
            "LEAD-9".to_owned(),
        )));
        assert_eq!(empty.error_class(), "empty_quote_generation");
    }

    #[test]
    fn repository_errors_map_to_persistence() {
        let error = ApplicationError::from(RepositoryError::Storage("disk full".to_owned()));

        assert!(!error.is_domain());
        assert_eq!(error.error_class(), "persistence");
        assert_eq!(error.to_string(), "persistence failure: storage failure: disk full");
    }
}
