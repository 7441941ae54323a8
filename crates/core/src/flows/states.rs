use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Conversion state of a lead. `ConvertedToOrder` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    ActiveLead,
    QuoteSent,
    QuoteRejected,
    QuoteExpired,
    Negotiation,
    VerballyApproved,
    ProformaSent,
    PaymentFailed,
    AwaitingPayment,
    ConvertedToOrder,
}

impl LeadStatus {
    pub const ALL: [LeadStatus; 10] = [
        LeadStatus::ActiveLead,
        LeadStatus::QuoteSent,
        LeadStatus::QuoteRejected,
        LeadStatus::QuoteExpired,
        LeadStatus::Negotiation,
        LeadStatus::VerballyApproved,
        LeadStatus::ProformaSent,
        LeadStatus::PaymentFailed,
        LeadStatus::AwaitingPayment,
        LeadStatus::ConvertedToOrder,
    ];

    /// Outgoing edges of the lifecycle table. Every state is listed so that a new
    /// variant cannot compile without its edges being declared.
    pub fn allowed_targets(self) -> &'static [LeadStatus] {
        use LeadStatus::*;

        match self {
            ActiveLead => &[QuoteSent],
            QuoteSent => &[QuoteRejected, QuoteExpired, VerballyApproved, Negotiation],
            QuoteRejected => &[Negotiation, ActiveLead],
            QuoteExpired => &[ActiveLead, QuoteSent],
            Negotiation => &[QuoteSent, VerballyApproved, QuoteRejected],
            VerballyApproved => &[ProformaSent, Negotiation],
            ProformaSent => &[AwaitingPayment, PaymentFailed, ConvertedToOrder],
            PaymentFailed => &[AwaitingPayment, Negotiation],
            AwaitingPayment => &[ConvertedToOrder, PaymentFailed],
            ConvertedToOrder => &[],
        }
    }

    pub fn can_transition_to(self, target: LeadStatus) -> bool {
        self.allowed_targets().contains(&target)
    }

    pub fn is_terminal(self) -> bool {
        self.allowed_targets().is_empty()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ActiveLead => "active_lead",
            Self::QuoteSent => "quote_sent",
            Self::QuoteRejected => "quote_rejected",
            Self::QuoteExpired => "quote_expired",
            Self::Negotiation => "negotiation",
            Self::VerballyApproved => "verbally_approved",
            Self::ProformaSent => "proforma_sent",
            Self::PaymentFailed => "payment_failed",
            Self::AwaitingPayment => "awaiting_payment",
            Self::ConvertedToOrder => "converted_to_order",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::ActiveLead => "Active Lead",
            Self::QuoteSent => "Quote Sent",
            Self::QuoteRejected => "Quote Rejected",
            Self::QuoteExpired => "Quote Expired",
            Self::Negotiation => "Negotiation",
            Self::VerballyApproved => "Verbally Approved",
            Self::ProformaSent => "Proforma Sent",
            Self::PaymentFailed => "Payment Failed",
            Self::AwaitingPayment => "Awaiting Payment",
            Self::ConvertedToOrder => "Converted to Order",
        }
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownLeadStatus(pub String);

impl fmt::Display for UnknownLeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown lead status `{}`", self.0)
    }
}

impl std::error::Error for UnknownLeadStatus {}

impl FromStr for LeadStatus {
    type Err = UnknownLeadStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or(UnknownLeadStatus(value.to_string()))
    }
}

/// A user-facing action that moves a lead along one edge of the table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LeadAction {
    pub action: &'static str,
    pub label: &'static str,
    pub target_status: LeadStatus,
}

impl LeadAction {
    pub fn towards(target: LeadStatus) -> Self {
        let (action, label) = match target {
            LeadStatus::ActiveLead => ("reopen_lead", "Reopen Lead"),
            LeadStatus::QuoteSent => ("send_quote", "Send Quote"),
            LeadStatus::QuoteRejected => ("mark_rejected", "Mark Rejected"),
            LeadStatus::QuoteExpired => ("mark_expired", "Mark Expired"),
            LeadStatus::Negotiation => ("start_negotiation", "Start Negotiation"),
            LeadStatus::VerballyApproved => ("mark_verbally_approved", "Mark Verbally Approved"),
            LeadStatus::ProformaSent => ("send_proforma", "Send Proforma Invoice"),
            LeadStatus::PaymentFailed => ("mark_payment_failed", "Mark Payment Failed"),
            LeadStatus::AwaitingPayment => ("await_payment", "Mark Awaiting Payment"),
            LeadStatus::ConvertedToOrder => ("convert_to_order", "Convert to Order"),
        };
        Self { action, label, target_status: target }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: LeadStatus,
    pub to: LeadStatus,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}
