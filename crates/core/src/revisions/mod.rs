//! Quote generation, revision chains, and lead/quote status synchronization.
//!
//! Every operation loads its records from a [`SalesRepository`], works on owned
//! copies, and writes them back through one `commit` call so a failed step
//! leaves storage unchanged.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::cpq::catalog::CatalogReader;
use crate::cpq::constraints::validate_requested_items;
use crate::cpq::pricing::{LinePriceRequest, PricingEngine};
use crate::cpq::summary::{aggregate_quote_lines, TaxScheme};
use crate::domain::catalog::{BusinessModel, CatalogItemId};
use crate::domain::lead::{Lead, LeadId};
use crate::domain::quote::{Quote, QuoteId, QuoteLine, QuoteStatus, RateSource};
use crate::errors::{ApplicationError, DomainError};
use crate::flows::{LeadAction, LeadLifecycle, LeadStatus, TransitionOutcome};
use crate::repository::SalesRepository;

pub mod changes;

pub use changes::{
    calculate_changes, LineModification, LineSnapshot, QuoteRevisionChangeSet, ValueChange,
};

const DEFAULT_ACTOR: &str = "quote-revision-manager";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotingSettings {
    pub quote_validity_days: u32,
    pub tax_scheme: TaxScheme,
}

impl Default for QuotingSettings {
    fn default() -> Self {
        Self { quote_validity_days: 15, tax_scheme: TaxScheme::Quote }
    }
}

/// One line of a revised quote, priced under the revision's business model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisedItem {
    pub item_id: CatalogItemId,
    pub quantity: Decimal,
    #[serde(default)]
    pub unit_price_override: Option<Decimal>,
    #[serde(default)]
    pub discount_percent: Option<Decimal>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub custom_specifications: Option<String>,
}

impl RevisedItem {
    pub fn new(item_id: impl Into<String>, quantity: Decimal) -> Self {
        Self {
            item_id: CatalogItemId(item_id.into()),
            quantity,
            unit_price_override: None,
            discount_percent: None,
            notes: None,
            custom_specifications: None,
        }
    }

    fn into_request(self, business_model: BusinessModel) -> LinePriceRequest {
        LinePriceRequest {
            item_id: self.item_id,
            quantity: self.quantity,
            business_model,
            unit_price_override: self.unit_price_override,
            discount_percent: self.discount_percent,
            notes: self.notes,
            custom_specifications: self.custom_specifications,
        }
    }
}

/// Requested changes for a new revision. Missing fields carry over from the
/// base quote; carried lines are repriced against the current catalog.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionChanges {
    #[serde(default)]
    pub items: Option<Vec<RevisedItem>>,
    #[serde(default)]
    pub business_model: Option<BusinessModel>,
}

/// Result of a lead transition together with the mirrored quote, if any.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StatusChange {
    pub lead: Lead,
    pub quote: Option<Quote>,
    pub transition: TransitionOutcome,
}

pub struct QuoteRevisionManager<R, C> {
    repository: R,
    pricing: PricingEngine<C>,
    lifecycle: LeadLifecycle,
    settings: QuotingSettings,
    audit: Arc<dyn AuditSink>,
    actor: String,
}

impl<R, C> QuoteRevisionManager<R, C>
where
    R: SalesRepository,
    C: CatalogReader,
{
    pub fn new(repository: R, catalog: C, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            repository,
            pricing: PricingEngine::new(catalog),
            lifecycle: LeadLifecycle,
            settings: QuotingSettings::default(),
            audit,
            actor: DEFAULT_ACTOR.to_string(),
        }
    }

    pub fn with_settings(mut self, settings: QuotingSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn pricing(&self) -> &PricingEngine<C> {
        &self.pricing
    }

    pub fn settings(&self) -> QuotingSettings {
        self.settings
    }

    /// Prices every requested item of the lead into a fresh draft that starts
    /// its own revision chain and becomes the lead's active quote.
    pub fn generate(&self, lead_id: &LeadId) -> Result<Quote, ApplicationError> {
        let mut lead = self.load_lead(lead_id)?;
        if lead.requested_items.is_empty() {
            return Err(DomainError::EmptyQuoteGeneration(lead.id.clone()).into());
        }

        let context = self.context(Some(&lead.id), None);
        self.check_order_quantities(&lead, &context);

        let requests = lead
            .requested_items
            .iter()
            .map(|item| LinePriceRequest {
                item_id: item.catalog_item_id.clone(),
                quantity: item.requested_quantity,
                business_model: lead.business_model,
                unit_price_override: None,
                discount_percent: None,
                notes: item.notes.clone(),
                custom_specifications: item.custom_specifications.clone(),
            })
            .collect::<Vec<_>>();
        let lines = self.price_lines(&requests);

        let quote_id = self.next_quote_id(&lead)?;
        let now = Utc::now();
        let quote = Quote {
            id: quote_id.clone(),
            lead_id: lead.id.clone(),
            root_quote_id: quote_id.clone(),
            parent_quote_id: None,
            revision_number: 1,
            is_active: true,
            status: QuoteStatus::Draft,
            business_model: lead.business_model,
            summary: aggregate_quote_lines(&lines, self.settings.tax_scheme),
            lines,
            revision_reason: None,
            change_summary: Vec::new(),
            status_message: Some("Quote generated from lead requirements".to_string()),
            valid_until: Some(self.valid_until(now)),
            created_at: now,
            updated_at: now,
        };

        lead.track_quote(quote_id.clone());
        self.repository.commit(vec![lead], vec![quote.clone()])?;

        info!(
            event_name = "quote.generated",
            lead_id = %quote.lead_id,
            quote_id = %quote.id,
            line_count = quote.lines.len(),
            total = %quote.summary.total,
            "quote generated"
        );
        self.audit.emit(
            AuditEvent::from_context(
                &context,
                "quote.generated",
                AuditCategory::Quote,
                AuditOutcome::Success,
            )
            .with_quote(&quote.id)
            .with_metadata("revision", quote.revision_number.to_string())
            .with_metadata("total", quote.summary.total.to_string()),
        );

        Ok(quote)
    }

    /// Creates the next revision in the base quote's chain. Every active quote
    /// in the chain is superseded in the same commit, so exactly one stays
    /// active afterwards.
    pub fn create_revision(
        &self,
        base_quote_id: &QuoteId,
        changes: RevisionChanges,
        reason: Option<&str>,
    ) -> Result<Quote, ApplicationError> {
        let base = self.load_quote(base_quote_id)?;
        let mut lead = self.load_lead(&base.lead_id)?;
        let chain = self.repository.find_quote_chain(&base.root_quote_id)?;
        let latest_revision = chain
            .iter()
            .map(|quote| quote.revision_number)
            .max()
            .unwrap_or(base.revision_number)
            .max(base.revision_number);

        let business_model = changes.business_model.unwrap_or(base.business_model);
        let requests: Vec<LinePriceRequest> = match changes.items {
            Some(items) => {
                items.into_iter().map(|item| item.into_request(business_model)).collect()
            }
            None => base.lines.iter().map(|line| carried_request(line, business_model)).collect(),
        };
        if requests.is_empty() {
            return Err(DomainError::EmptyQuoteGeneration(lead.id.clone()).into());
        }
        let lines = self.price_lines(&requests);

        let quote_id = self.next_quote_id(&lead)?;
        let revision_number = latest_revision + 1;
        let reason = reason.map(str::trim).filter(|reason| !reason.is_empty()).map(str::to_string);
        let now = Utc::now();
        let mut revision = Quote {
            id: quote_id.clone(),
            lead_id: lead.id.clone(),
            root_quote_id: base.root_quote_id.clone(),
            parent_quote_id: Some(base.id.clone()),
            revision_number,
            is_active: true,
            status: QuoteStatus::Draft,
            business_model,
            summary: aggregate_quote_lines(&lines, self.settings.tax_scheme),
            lines,
            revision_reason: reason.clone(),
            change_summary: Vec::new(),
            status_message: Some(format!("Revision {revision_number} drafted")),
            valid_until: Some(self.valid_until(now)),
            created_at: now,
            updated_at: now,
        };
        revision.change_summary = calculate_changes(&base, &revision).summary_lines();

        let mut quotes = chain
            .into_iter()
            .filter(|quote| quote.is_active)
            .map(|mut quote| {
                quote.supersede(&quote_id, now);
                quote
            })
            .collect::<Vec<_>>();
        let superseded_count = quotes.len();
        quotes.push(revision.clone());

        lead.track_quote(quote_id);
        self.repository.commit(vec![lead], quotes)?;

        info!(
            event_name = "quote.revised",
            lead_id = %revision.lead_id,
            quote_id = %revision.id,
            parent_quote_id = %base.id,
            revision_number,
            superseded_count,
            total = %revision.summary.total,
            "quote revision created"
        );
        let mut event = AuditEvent::from_context(
            &self.context(Some(&revision.lead_id), Some(&revision.id)),
            "quote.revised",
            AuditCategory::Quote,
            AuditOutcome::Success,
        )
        .with_metadata("parent_quote_id", base.id.to_string())
        .with_metadata("revision", revision_number.to_string())
        .with_metadata("total", revision.summary.total.to_string());
        if let Some(reason) = reason {
            event = event.with_metadata("reason", reason);
        }
        self.audit.emit(event);

        Ok(revision)
    }

    /// Differences between two quotes of one revision chain.
    pub fn calculate_changes(
        &self,
        old_quote_id: &QuoteId,
        new_quote_id: &QuoteId,
    ) -> Result<QuoteRevisionChangeSet, ApplicationError> {
        let old = self.load_quote(old_quote_id)?;
        let new = self.load_quote(new_quote_id)?;
        if old.root_quote_id != new.root_quote_id {
            return Err(DomainError::InvariantViolation(format!(
                "quotes `{}` and `{}` belong to different revision chains",
                old.id, new.id
            ))
            .into());
        }
        Ok(calculate_changes(&old, &new))
    }

    /// Moves the lead and mirrors the new status onto its active quote.
    pub fn transition_lead(
        &self,
        lead_id: &LeadId,
        target: LeadStatus,
        reason: Option<&str>,
    ) -> Result<StatusChange, ApplicationError> {
        let lead = self.load_lead(lead_id)?;
        let active_quote = match &lead.active_quote_id {
            Some(quote_id) => self.repository.find_quote(quote_id)?.filter(|quote| quote.is_active),
            None => None,
        };
        let message = format!("Lead moved to {}", target.label());
        self.apply_status(lead, active_quote, target, reason, message)
    }

    pub fn mark_sent(
        &self,
        quote_id: &QuoteId,
        message: Option<&str>,
    ) -> Result<StatusChange, ApplicationError> {
        self.mark(quote_id, LeadStatus::QuoteSent, message, "Quote sent to customer")
    }

    pub fn mark_approved(
        &self,
        quote_id: &QuoteId,
        message: Option<&str>,
    ) -> Result<StatusChange, ApplicationError> {
        self.mark(quote_id, LeadStatus::VerballyApproved, message, "Quote approved by customer")
    }

    pub fn mark_rejected(
        &self,
        quote_id: &QuoteId,
        message: Option<&str>,
    ) -> Result<StatusChange, ApplicationError> {
        self.mark(quote_id, LeadStatus::QuoteRejected, message, "Quote rejected by customer")
    }

    pub fn mark_expired(
        &self,
        quote_id: &QuoteId,
        message: Option<&str>,
    ) -> Result<StatusChange, ApplicationError> {
        self.mark(quote_id, LeadStatus::QuoteExpired, message, "Quote validity lapsed")
    }

    pub fn mark_payment_received(
        &self,
        quote_id: &QuoteId,
        message: Option<&str>,
    ) -> Result<StatusChange, ApplicationError> {
        self.mark(
            quote_id,
            LeadStatus::ConvertedToOrder,
            message,
            "Payment received, order confirmed",
        )
    }

    pub fn available_actions(&self, lead_id: &LeadId) -> Result<Vec<LeadAction>, ApplicationError> {
        let lead = self.load_lead(lead_id)?;
        Ok(self.lifecycle.available_actions(&lead))
    }

    fn mark(
        &self,
        quote_id: &QuoteId,
        target: LeadStatus,
        message: Option<&str>,
        default_message: &str,
    ) -> Result<StatusChange, ApplicationError> {
        let quote = self.load_quote(quote_id)?;
        let lead = self.load_lead(&quote.lead_id)?;
        let rejection = if !quote.is_active {
            Some("quote superseded")
        } else if lead.active_quote_id.as_ref() != Some(&quote.id) {
            Some("quote is not the lead's active quote")
        } else {
            None
        };
        if let Some(rejection) = rejection {
            warn!(
                event_name = "quote.status_rejected",
                lead_id = %lead.id,
                quote_id = %quote.id,
                to = %target,
                "{rejection}"
            );
            self.audit.emit(
                AuditEvent::from_context(
                    &self.context(Some(&quote.lead_id), Some(&quote.id)),
                    "quote.status_rejected",
                    AuditCategory::Quote,
                    AuditOutcome::Rejected,
                )
                .with_metadata("target", target.as_str())
                .with_metadata("reason", rejection),
            );
            return Err(DomainError::QuoteNotActive(quote.id).into());
        }

        let status_message = message
            .map(str::trim)
            .filter(|message| !message.is_empty())
            .unwrap_or(default_message)
            .to_string();
        self.apply_status(lead, Some(quote), target, message, status_message)
    }

    fn apply_status(
        &self,
        mut lead: Lead,
        quote: Option<Quote>,
        target: LeadStatus,
        reason: Option<&str>,
        status_message: String,
    ) -> Result<StatusChange, ApplicationError> {
        let context = self.context(Some(&lead.id), quote.as_ref().map(|quote| &quote.id));
        let transition = self.lifecycle.apply_with_audit(
            &mut lead,
            target,
            reason,
            self.audit.as_ref(),
            &context,
        );
        let transition = match transition {
            Ok(transition) => transition,
            Err(error) => {
                warn!(
                    event_name = "lead.transition_rejected",
                    lead_id = %lead.id,
                    from = %lead.conversion_status(),
                    to = %target,
                    "lead transition rejected"
                );
                return Err(error.into());
            }
        };

        let quote = quote.map(|mut quote| {
            quote.status = QuoteStatus::mirroring(target);
            quote.status_message = Some(status_message);
            quote.updated_at = transition.occurred_at;
            quote
        });

        self.repository.commit(vec![lead.clone()], quote.iter().cloned().collect())?;

        info!(
            event_name = "lead.status_synced",
            lead_id = %lead.id,
            quote_id = quote.as_ref().map(|quote| quote.id.0.as_str()).unwrap_or("-"),
            from = %transition.from,
            to = %transition.to,
            "lead status updated"
        );
        if let Some(quote) = &quote {
            self.audit.emit(
                AuditEvent::from_context(
                    &context,
                    "quote.status_synced",
                    AuditCategory::Quote,
                    AuditOutcome::Success,
                )
                .with_metadata("lead_status", target.as_str())
                .with_metadata("quote_status", quote.status.as_str()),
            );
        }

        Ok(StatusChange { lead, quote, transition })
    }

    /// Order-quantity violations are advisory; they are logged and audited but
    /// never block generation.
    fn check_order_quantities(&self, lead: &Lead, context: &AuditContext) {
        let result = validate_requested_items(self.pricing.catalog(), &lead.requested_items);
        for violation in &result.violations {
            warn!(
                event_name = "quote.constraint_warning",
                lead_id = %lead.id,
                code = %violation.code,
                item_id = violation.item_id.as_deref().unwrap_or("-"),
                "{}",
                violation.message
            );
            self.audit.emit(
                AuditEvent::from_context(
                    context,
                    "quote.constraint_warning",
                    AuditCategory::Pricing,
                    AuditOutcome::Rejected,
                )
                .with_metadata("code", violation.code.clone())
                .with_metadata("message", violation.message.clone()),
            );
        }
    }

    fn price_lines(&self, requests: &[LinePriceRequest]) -> Vec<QuoteLine> {
        requests.iter().map(|request| self.pricing.price_line_or_default(request)).collect()
    }

    fn next_quote_id(&self, lead: &Lead) -> Result<QuoteId, ApplicationError> {
        let quote_id = lead.next_quote_id();
        if self.repository.find_quote(&quote_id)?.is_some() {
            return Err(DomainError::InvariantViolation(format!(
                "quote id `{quote_id}` is already taken for lead `{}`",
                lead.id
            ))
            .into());
        }
        Ok(quote_id)
    }

    fn valid_until(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::days(i64::from(self.settings.quote_validity_days))
    }

    fn load_lead(&self, lead_id: &LeadId) -> Result<Lead, ApplicationError> {
        self.repository
            .find_lead(lead_id)?
            .ok_or_else(|| DomainError::LeadNotFound(lead_id.clone()).into())
    }

    fn load_quote(&self, quote_id: &QuoteId) -> Result<Quote, ApplicationError> {
        self.repository
            .find_quote(quote_id)?
            .ok_or_else(|| DomainError::QuoteNotFound(quote_id.clone()).into())
    }

    fn context(&self, lead_id: Option<&LeadId>, quote_id: Option<&QuoteId>) -> AuditContext {
        AuditContext::new(
            lead_id.cloned(),
            quote_id.cloned(),
            Uuid::new_v4().to_string(),
            self.actor.clone(),
        )
    }
}

/// A base-quote line carried into a revision. Manual rates stay manual; tier
/// and unpriced lines go back through the tier lookup.
fn carried_request(line: &QuoteLine, business_model: BusinessModel) -> LinePriceRequest {
    let unit_price_override = match line.rate_source {
        RateSource::ManualOverride => Some(line.rate),
        RateSource::Tier { .. } | RateSource::Unpriced => None,
    };
    let discount_percent = (line.discount_percent > Decimal::ZERO).then_some(line.discount_percent);
    LinePriceRequest {
        item_id: line.item_code.clone(),
        quantity: line.quantity,
        business_model,
        unit_price_override,
        discount_percent,
        notes: line.notes.clone(),
        custom_specifications: line.custom_specifications.clone(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rust_decimal::Decimal;

    use super::{QuoteRevisionManager, QuotingSettings, RevisedItem, RevisionChanges};
    use crate::audit::InMemoryAuditSink;
    use crate::cpq::catalog::Catalog;
    use crate::cpq::summary::TaxScheme;
    use crate::domain::catalog::{BusinessModel, CatalogItem, CatalogItemId, PricingTier};
    use crate::domain::lead::{Lead, LeadId, RequestedItem};
    use crate::domain::quote::{QuoteId, QuoteStatus, RateSource};
    use crate::errors::{ApplicationError, DomainError};
    use crate::flows::LeadStatus;
    use crate::repository::{InMemorySalesRepository, SalesRepository};

    fn catalog() -> Catalog {
        Catalog::new(vec![
            CatalogItem {
                id: CatalogItemId("cotton-poplin".to_string()),
                name: "Cotton Poplin 40s".to_string(),
                sales_tiers: vec![
                    PricingTier::new(1, 100, "m"),
                    PricingTier::new(500, 90, "m"),
                    PricingTier::new(1000, 80, "m"),
                ],
                job_work_tiers: vec![PricingTier::new(1, 20, "m"), PricingTier::new(1000, 16, "m")],
                minimum_order_quantity: Some(Decimal::from(100)),
                maximum_order_quantity: None,
            },
            CatalogItem {
                id: CatalogItemId("rayon-slub".to_string()),
                name: "Rayon Slub".to_string(),
                sales_tiers: vec![PricingTier::new(1, 150, "m")],
                job_work_tiers: Vec::new(),
                minimum_order_quantity: None,
                maximum_order_quantity: None,
            },
        ])
    }

    struct Fixture {
        manager: QuoteRevisionManager<InMemorySalesRepository, Catalog>,
        repository: InMemorySalesRepository,
        audit: InMemoryAuditSink,
        lead_id: LeadId,
    }

    fn fixture(items: Vec<RequestedItem>) -> Fixture {
        let lead = Lead::new("LEAD-501", "Godavari Garments", BusinessModel::Sales, items);
        let lead_id = lead.id.clone();
        let repository = InMemorySalesRepository::with_records(vec![lead], Vec::new());
        let audit = InMemoryAuditSink::default();
        let manager =
            QuoteRevisionManager::new(repository.clone(), catalog(), Arc::new(audit.clone()));
        Fixture { manager, repository, audit, lead_id }
    }

    fn poplin_fixture() -> Fixture {
        fixture(vec![RequestedItem::new("cotton-poplin", Decimal::from(750))])
    }

    #[test]
    fn generate_prices_lines_and_links_the_lead() {
        let f = poplin_fixture();

        let quote = f.manager.generate(&f.lead_id).expect("generate");

        assert_eq!(quote.id.0, "LEAD-501-Q1");
        assert_eq!(quote.root_quote_id, quote.id);
        assert_eq!(quote.revision_number, 1);
        assert!(quote.is_active);
        assert_eq!(quote.status, QuoteStatus::Draft);
        assert_eq!(quote.lines[0].rate, Decimal::from(90));
        assert_eq!(quote.summary.subtotal, Decimal::from(67_500));
        assert_eq!(quote.summary.tax.total, Decimal::from(12_150));
        assert_eq!(quote.summary.total, Decimal::from(79_650));
        assert!(quote.valid_until.is_some());

        let lead = f.repository.find_lead(&f.lead_id).expect("find").expect("lead");
        assert_eq!(lead.active_quote_id, Some(quote.id.clone()));
        assert_eq!(lead.quote_count, 1);
        assert!(f.audit.events().iter().any(|event| event.event_type == "quote.generated"));
    }

    #[test]
    fn generate_rejects_leads_without_items() {
        let f = fixture(Vec::new());

        let error = f.manager.generate(&f.lead_id).expect_err("empty lead");

        assert_eq!(
            error,
            ApplicationError::Domain(DomainError::EmptyQuoteGeneration(f.lead_id.clone()))
        );
        assert!(f.repository.quotes().is_empty());
    }

    #[test]
    fn generate_reports_missing_lead() {
        let f = poplin_fixture();
        let missing = LeadId("LEAD-404".to_string());

        let error = f.manager.generate(&missing).expect_err("missing lead");

        assert_eq!(error.error_class(), "not_found");
    }

    #[test]
    fn unknown_items_degrade_to_unpriced_lines() {
        let f = fixture(vec![
            RequestedItem::new("cotton-poplin", Decimal::from(1000)),
            RequestedItem::new("silk-chiffon", Decimal::from(40)),
        ]);

        let quote = f.manager.generate(&f.lead_id).expect("generate");

        assert_eq!(quote.lines.len(), 2);
        assert_eq!(quote.lines[1].rate_source, RateSource::Unpriced);
        assert_eq!(quote.lines[1].amount, Decimal::ZERO);
        assert_eq!(quote.summary.subtotal, Decimal::from(80_000));
        assert!(f
            .audit
            .events()
            .iter()
            .any(|event| event.event_type == "quote.constraint_warning"));
    }

    #[test]
    fn below_minimum_order_is_warned_but_still_quoted() {
        let f = fixture(vec![RequestedItem::new("cotton-poplin", Decimal::from(40))]);

        let quote = f.manager.generate(&f.lead_id).expect("generate");

        assert_eq!(quote.summary.subtotal, Decimal::from(4_000));
        let warning = f
            .audit
            .events()
            .into_iter()
            .find(|event| event.event_type == "quote.constraint_warning")
            .expect("constraint warning");
        assert_eq!(warning.metadata.get("code").map(String::as_str), Some("BELOW_MINIMUM_ORDER"));
    }

    #[test]
    fn invoice_settings_apply_interstate_tax() {
        let f = poplin_fixture();
        let manager = f.manager.with_settings(QuotingSettings {
            quote_validity_days: 30,
            tax_scheme: TaxScheme::Invoice { interstate: true },
        });

        let quote = manager.generate(&f.lead_id).expect("generate");

        assert_eq!(quote.summary.tax.igst, Decimal::from(3_375));
        assert_eq!(quote.summary.tax.cgst, Decimal::ZERO);
        assert_eq!(quote.summary.total, Decimal::from(70_875));
    }

    #[test]
    fn revisions_keep_exactly_one_active_quote_per_chain() {
        let f = poplin_fixture();
        let original = f.manager.generate(&f.lead_id).expect("generate");

        let second = f
            .manager
            .create_revision(
                &original.id,
                RevisionChanges {
                    items: Some(vec![RevisedItem::new("cotton-poplin", Decimal::from(1200))]),
                    business_model: None,
                },
                Some("customer raised volume"),
            )
            .expect("second revision");
        let third = f
            .manager
            .create_revision(&second.id, RevisionChanges::default(), Some("refresh validity"))
            .expect("third revision");

        assert_eq!(second.revision_number, 2);
        assert_eq!(third.revision_number, 3);
        assert_eq!(third.parent_quote_id, Some(second.id.clone()));
        assert_eq!(third.root_quote_id, original.id);

        let chain = f.repository.find_quote_chain(&original.id).expect("chain");
        let active = chain.iter().filter(|quote| quote.is_active).collect::<Vec<_>>();
        assert_eq!(chain.len(), 3);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, third.id);
        assert!(chain
            .iter()
            .filter(|quote| quote.id != third.id)
            .all(|quote| quote.status == QuoteStatus::Superseded));

        let lead = f.repository.find_lead(&f.lead_id).expect("find").expect("lead");
        assert_eq!(lead.active_quote_id, Some(third.id.clone()));
        assert_eq!(lead.quote_history.len(), 3);
    }

    #[test]
    fn revising_a_superseded_quote_still_supersedes_the_active_one() {
        let f = poplin_fixture();
        let original = f.manager.generate(&f.lead_id).expect("generate");
        let second = f
            .manager
            .create_revision(&original.id, RevisionChanges::default(), None)
            .expect("second");

        let third = f
            .manager
            .create_revision(&original.id, RevisionChanges::default(), None)
            .expect("third");

        assert_eq!(third.revision_number, 3);
        assert_eq!(third.parent_quote_id, Some(original.id.clone()));
        let second = f.repository.find_quote(&second.id).expect("find").expect("second");
        assert!(!second.is_active);
    }

    #[test]
    fn revision_records_reason_and_change_summary() {
        let f = poplin_fixture();
        let original = f.manager.generate(&f.lead_id).expect("generate");

        let revision = f
            .manager
            .create_revision(
                &original.id,
                RevisionChanges {
                    items: Some(vec![RevisedItem {
                        discount_percent: Some(Decimal::from(5)),
                        ..RevisedItem::new("cotton-poplin", Decimal::from(750))
                    }]),
                    business_model: None,
                },
                Some("  matched competitor offer  "),
            )
            .expect("revision");

        assert_eq!(revision.revision_reason.as_deref(), Some("matched competitor offer"));
        assert!(revision.change_summary.iter().any(|line| line.starts_with("Total changed")));
        assert!(revision
            .change_summary
            .iter()
            .any(|line| line == "Modified cotton-poplin: discount 0% -> 5%"));

        let changes = f.manager.calculate_changes(&original.id, &revision.id).expect("changes");
        assert_eq!(changes.modified.len(), 1);
    }

    #[test]
    fn business_model_change_reprices_carried_lines() {
        let f = poplin_fixture();
        let original = f.manager.generate(&f.lead_id).expect("generate");

        let revision = f
            .manager
            .create_revision(
                &original.id,
                RevisionChanges { items: None, business_model: Some(BusinessModel::JobWork) },
                Some("customer supplies yarn"),
            )
            .expect("revision");

        assert_eq!(revision.business_model, BusinessModel::JobWork);
        assert_eq!(revision.lines[0].rate, Decimal::from(20));
        assert_eq!(revision.summary.subtotal, Decimal::from(15_000));
    }

    #[test]
    fn marking_sent_moves_lead_and_quote_together() {
        let f = poplin_fixture();
        let quote = f.manager.generate(&f.lead_id).expect("generate");

        let change = f.manager.mark_sent(&quote.id, Some("shared over email")).expect("mark sent");

        assert_eq!(change.lead.conversion_status(), LeadStatus::QuoteSent);
        let stored_quote = f.repository.find_quote(&quote.id).expect("find").expect("quote");
        assert_eq!(stored_quote.status, QuoteStatus::Sent);
        assert_eq!(stored_quote.status_message.as_deref(), Some("shared over email"));
        let stored_lead = f.repository.find_lead(&f.lead_id).expect("find").expect("lead");
        assert_eq!(stored_lead.conversion_status(), LeadStatus::QuoteSent);
        assert!(stored_lead.notes.contains("shared over email"));
    }

    #[test]
    fn full_sale_path_stamps_conversion() {
        let f = poplin_fixture();
        let quote = f.manager.generate(&f.lead_id).expect("generate");

        f.manager.mark_sent(&quote.id, None).expect("sent");
        f.manager.mark_approved(&quote.id, None).expect("approved");
        f.manager.transition_lead(&f.lead_id, LeadStatus::ProformaSent, None).expect("proforma");
        let change = f.manager.mark_payment_received(&quote.id, None).expect("payment");

        assert_eq!(change.lead.conversion_status(), LeadStatus::ConvertedToOrder);
        assert!(change.lead.converted_at.is_some());
        assert_eq!(change.quote.map(|quote| quote.status), Some(QuoteStatus::Approved));
        assert!(f.manager.available_actions(&f.lead_id).expect("actions").is_empty());
    }

    #[test]
    fn invalid_mark_leaves_records_untouched() {
        let f = poplin_fixture();
        let quote = f.manager.generate(&f.lead_id).expect("generate");
        let before_lead = f.repository.find_lead(&f.lead_id).expect("find");
        let before_quote = f.repository.find_quote(&quote.id).expect("find");

        let error = f.manager.mark_payment_received(&quote.id, None).expect_err("invalid edge");

        assert_eq!(error.error_class(), "invalid_state_transition");
        assert_eq!(f.repository.find_lead(&f.lead_id).expect("find"), before_lead);
        assert_eq!(f.repository.find_quote(&quote.id).expect("find"), before_quote);
        assert!(f
            .audit
            .events()
            .iter()
            .any(|event| event.event_type == "lead.transition_rejected"));
    }

    #[test]
    fn superseded_quotes_cannot_change_status() {
        let f = poplin_fixture();
        let original = f.manager.generate(&f.lead_id).expect("generate");
        f.manager
            .create_revision(&original.id, RevisionChanges::default(), None)
            .expect("revision");

        let error = f.manager.mark_sent(&original.id, None).expect_err("superseded");

        assert_eq!(error, ApplicationError::Domain(DomainError::QuoteNotActive(original.id)));
        let lead = f.repository.find_lead(&f.lead_id).expect("find").expect("lead");
        assert_eq!(lead.conversion_status(), LeadStatus::ActiveLead);
    }

    #[test]
    fn quotes_of_an_older_chain_cannot_move_the_lead() {
        let f = poplin_fixture();
        let first = f.manager.generate(&f.lead_id).expect("first");
        let second = f.manager.generate(&f.lead_id).expect("second chain");

        let error = f.manager.mark_sent(&first.id, None).expect_err("not the lead's quote");

        assert_eq!(error, ApplicationError::Domain(DomainError::QuoteNotActive(first.id.clone())));
        let lead = f.repository.find_lead(&f.lead_id).expect("find").expect("lead");
        assert_eq!(lead.conversion_status(), LeadStatus::ActiveLead);
        assert_eq!(lead.active_quote_id, Some(second.id.clone()));
        let first = f.repository.find_quote(&first.id).expect("find").expect("first");
        assert_eq!(first.status, QuoteStatus::Draft);
        let rejected = f
            .audit
            .events()
            .into_iter()
            .find(|event| event.event_type == "quote.status_rejected")
            .expect("rejection audited");
        assert_eq!(
            rejected.metadata.get("reason").map(String::as_str),
            Some("quote is not the lead's active quote")
        );

        let change = f.manager.mark_sent(&second.id, None).expect("active quote");
        assert_eq!(change.quote.map(|quote| quote.status), Some(QuoteStatus::Sent));
    }

    #[test]
    fn transition_without_quote_only_moves_the_lead() {
        let f = poplin_fixture();

        let change = f
            .manager
            .transition_lead(&f.lead_id, LeadStatus::QuoteSent, Some("catalogue shared by phone"))
            .expect("transition");

        assert!(change.quote.is_none());
        assert_eq!(change.transition.from, LeadStatus::ActiveLead);
        assert_eq!(change.lead.conversion_status(), LeadStatus::QuoteSent);
    }

    #[test]
    fn changes_across_chains_are_refused() {
        let f = poplin_fixture();
        let first = f.manager.generate(&f.lead_id).expect("first");
        let second = f.manager.generate(&f.lead_id).expect("second chain");

        let error =
            f.manager.calculate_changes(&first.id, &second.id).expect_err("different chains");

        assert_eq!(error.error_class(), "invariant_violation");
        assert_eq!(second.id, QuoteId("LEAD-501-Q2".to_string()));
    }
}
