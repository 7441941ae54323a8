pub mod audit;
pub mod config;
pub mod cpq;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod repository;
pub mod revisions;

pub use audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
pub use cpq::{Catalog, CatalogReader, PricingEngine, QuoteSummary, TaxScheme};
pub use domain::catalog::{BusinessModel, CatalogItem, CatalogItemId, PricingTier};
pub use domain::lead::{Lead, LeadId, RequestedItem};
pub use domain::quote::{Quote, QuoteId, QuoteLine, QuoteStatus, RateSource};
pub use errors::{ApplicationError, DomainError};
pub use flows::{LeadAction, LeadLifecycle, LeadStatus, TransitionOutcome};
pub use repository::{InMemorySalesRepository, RepositoryError, SalesRepository};
pub use revisions::{
    QuoteRevisionChangeSet, QuoteRevisionManager, QuotingSettings, RevisedItem, RevisionChanges,
    StatusChange,
};
