use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cpq::summary::QuoteSummary;
use crate::domain::catalog::{BusinessModel, CatalogItemId};
use crate::domain::lead::LeadId;
use crate::flows::states::LeadStatus;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QuoteId(pub String);

impl fmt::Display for QuoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    Draft,
    Sent,
    Approved,
    Rejected,
    Expired,
    Superseded,
}

impl QuoteStatus {
    /// The quote status that mirrors a lead status. Exhaustive on purpose: a new
    /// lead state has to pick its quote counterpart here.
    pub fn mirroring(status: LeadStatus) -> Self {
        match status {
            LeadStatus::ActiveLead => Self::Draft,
            LeadStatus::QuoteSent | LeadStatus::Negotiation => Self::Sent,
            LeadStatus::QuoteRejected => Self::Rejected,
            LeadStatus::QuoteExpired => Self::Expired,
            LeadStatus::VerballyApproved
            | LeadStatus::ProformaSent
            | LeadStatus::AwaitingPayment
            | LeadStatus::ConvertedToOrder => Self::Approved,
            // A failed payment leaves the accepted proposal approved.
            LeadStatus::PaymentFailed => Self::Approved,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Sent => "sent",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
            Self::Superseded => "superseded",
        }
    }
}

impl fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RateSource {
    Tier { minimum_quantity: Decimal },
    ManualOverride,
    Unpriced,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteLine {
    pub item_code: CatalogItemId,
    pub description: String,
    pub quantity: Decimal,
    pub unit: String,
    pub rate: Decimal,
    pub rate_source: RateSource,
    pub discount_percent: Decimal,
    pub discount_amount: Decimal,
    pub amount: Decimal,
    pub notes: Option<String>,
    pub custom_specifications: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    pub lead_id: LeadId,
    /// Original ancestor of the revision chain; equal to `id` for an original quote.
    pub root_quote_id: QuoteId,
    pub parent_quote_id: Option<QuoteId>,
    pub revision_number: u32,
    pub is_active: bool,
    pub status: QuoteStatus,
    pub business_model: BusinessModel,
    pub lines: Vec<QuoteLine>,
    pub summary: QuoteSummary,
    pub revision_reason: Option<String>,
    pub change_summary: Vec<String>,
    pub status_message: Option<String>,
    pub valid_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quote {
    pub(crate) fn supersede(&mut self, by: &QuoteId, at: DateTime<Utc>) {
        self.is_active = false;
        self.status = QuoteStatus::Superseded;
        self.status_message = Some(format!("Superseded by revision {by}"));
        self.updated_at = at;
    }
}
