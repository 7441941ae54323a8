use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::catalog::{BusinessModel, CatalogItemId};
use crate::domain::quote::QuoteId;
use crate::flows::states::LeadStatus;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LeadId(pub String);

impl fmt::Display for LeadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedItem {
    pub catalog_item_id: CatalogItemId,
    pub requested_quantity: Decimal,
    pub notes: Option<String>,
    pub custom_specifications: Option<String>,
}

impl RequestedItem {
    pub fn new(catalog_item_id: impl Into<String>, requested_quantity: Decimal) -> Self {
        Self {
            catalog_item_id: CatalogItemId(catalog_item_id.into()),
            requested_quantity,
            notes: None,
            custom_specifications: None,
        }
    }
}

/// An inbound sales inquiry.
///
/// `conversion_status` is private: it only moves through
/// [`LeadLifecycle`](crate::flows::LeadLifecycle), which validates the edge first.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub customer_name: String,
    pub business_model: BusinessModel,
    conversion_status: LeadStatus,
    pub requested_items: Vec<RequestedItem>,
    pub active_quote_id: Option<QuoteId>,
    pub quote_history: Vec<QuoteId>,
    pub quote_count: u32,
    pub last_contact: DateTime<Utc>,
    pub notes: String,
    pub converted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Lead {
    pub fn new(
        id: impl Into<String>,
        customer_name: impl Into<String>,
        business_model: BusinessModel,
        requested_items: Vec<RequestedItem>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: LeadId(id.into()),
            customer_name: customer_name.into(),
            business_model,
            conversion_status: LeadStatus::ActiveLead,
            requested_items,
            active_quote_id: None,
            quote_history: Vec::new(),
            quote_count: 0,
            last_contact: now,
            notes: String::new(),
            converted_at: None,
            created_at: now,
        }
    }

    pub fn conversion_status(&self) -> LeadStatus {
        self.conversion_status
    }

    /// Rehydrates a stored lead. Not a transition: callers restoring persisted
    /// state are the only intended users.
    pub fn with_stored_status(mut self, status: LeadStatus) -> Self {
        self.conversion_status = status;
        self
    }

    pub(crate) fn set_conversion_status(&mut self, status: LeadStatus) {
        self.conversion_status = status;
    }

    pub(crate) fn append_note(&mut self, note: &str) {
        if !self.notes.is_empty() {
            self.notes.push('\n');
        }
        self.notes.push_str(note);
    }

    /// Links a newly stored quote as the lead's current proposal.
    pub(crate) fn track_quote(&mut self, quote_id: QuoteId) {
        if !self.quote_history.contains(&quote_id) {
            self.quote_history.push(quote_id.clone());
        }
        self.active_quote_id = Some(quote_id);
        self.quote_count += 1;
    }

    pub(crate) fn next_quote_id(&self) -> QuoteId {
        QuoteId(format!("{}-Q{}", self.id.0, self.quote_count + 1))
    }
}
