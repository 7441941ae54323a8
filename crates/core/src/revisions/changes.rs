use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::catalog::CatalogItemId;
use crate::domain::quote::{Quote, QuoteId, QuoteLine};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueChange {
    pub before: Decimal,
    pub after: Decimal,
}

impl ValueChange {
    fn between(before: Decimal, after: Decimal) -> Option<Self> {
        (before != after).then_some(Self { before, after })
    }

    pub fn difference(&self) -> Decimal {
        self.after - self.before
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineSnapshot {
    pub item_code: CatalogItemId,
    pub description: String,
    pub quantity: Decimal,
    pub unit: String,
    pub rate: Decimal,
    pub discount_percent: Decimal,
    pub amount: Decimal,
}

impl From<&QuoteLine> for LineSnapshot {
    fn from(line: &QuoteLine) -> Self {
        Self {
            item_code: line.item_code.clone(),
            description: line.description.clone(),
            quantity: line.quantity,
            unit: line.unit.clone(),
            rate: line.rate,
            discount_percent: line.discount_percent,
            amount: line.amount,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineModification {
    pub item_code: CatalogItemId,
    pub description: String,
    pub quantity: Option<ValueChange>,
    pub rate: Option<ValueChange>,
    pub discount_percent: Option<ValueChange>,
}

/// Pricing and item-level differences between two quotes of one chain.
/// Computed on demand and never stored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRevisionChangeSet {
    pub from_quote_id: QuoteId,
    pub to_quote_id: QuoteId,
    pub total: Option<ValueChange>,
    pub added: Vec<LineSnapshot>,
    pub removed: Vec<LineSnapshot>,
    pub modified: Vec<LineModification>,
}

impl QuoteRevisionChangeSet {
    pub fn is_empty(&self) -> bool {
        self.total.is_none()
            && self.added.is_empty()
            && self.removed.is_empty()
            && self.modified.is_empty()
    }

    /// One human-readable line per change, for audit notes.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();

        if let Some(total) = &self.total {
            lines.push(format!(
                "Total changed from {} to {} ({})",
                total.before,
                total.after,
                signed(total.difference())
            ));
        }
        for line in &self.added {
            lines.push(format!(
                "Added {} ({}): {} {} @ {}",
                line.item_code, line.description, line.quantity, line.unit, line.rate
            ));
        }
        for line in &self.removed {
            lines.push(format!(
                "Removed {} ({}): {} {} @ {}",
                line.item_code, line.description, line.quantity, line.unit, line.rate
            ));
        }
        for modification in &self.modified {
            let mut parts = Vec::new();
            if let Some(change) = &modification.quantity {
                parts.push(format!("quantity {} -> {}", change.before, change.after));
            }
            if let Some(change) = &modification.rate {
                parts.push(format!("rate {} -> {}", change.before, change.after));
            }
            if let Some(change) = &modification.discount_percent {
                parts.push(format!("discount {}% -> {}%", change.before, change.after));
            }
            lines.push(format!("Modified {}: {}", modification.item_code, parts.join("; ")));
        }

        lines
    }
}

fn signed(value: Decimal) -> String {
    if value.is_sign_negative() {
        value.to_string()
    } else {
        format!("+{value}")
    }
}

/// Lines keyed by item code and occurrence, so a repeated code pairs its
/// n-th line in one quote with its n-th line in the other.
fn index_lines(lines: &[QuoteLine]) -> BTreeMap<(&CatalogItemId, usize), &QuoteLine> {
    let mut occurrences = BTreeMap::<&CatalogItemId, usize>::new();
    let mut index = BTreeMap::new();
    for line in lines {
        let seen = occurrences.entry(&line.item_code).or_default();
        index.insert((&line.item_code, *seen), line);
        *seen += 1;
    }
    index
}

pub fn calculate_changes(old: &Quote, new: &Quote) -> QuoteRevisionChangeSet {
    let old_lines = index_lines(&old.lines);
    let new_lines = index_lines(&new.lines);

    let added = new_lines
        .iter()
        .filter(|(code, _)| !old_lines.contains_key(*code))
        .map(|(_, line)| LineSnapshot::from(*line))
        .collect();

    let removed = old_lines
        .iter()
        .filter(|(code, _)| !new_lines.contains_key(*code))
        .map(|(_, line)| LineSnapshot::from(*line))
        .collect();

    let modified = new_lines
        .iter()
        .filter_map(|(code, after)| {
            let before = old_lines.get(code)?;
            let modification = LineModification {
                item_code: after.item_code.clone(),
                description: after.description.clone(),
                quantity: ValueChange::between(before.quantity, after.quantity),
                rate: ValueChange::between(before.rate, after.rate),
                discount_percent: ValueChange::between(
                    before.discount_percent,
                    after.discount_percent,
                ),
            };
            let changed = modification.quantity.is_some()
                || modification.rate.is_some()
                || modification.discount_percent.is_some();
            changed.then_some(modification)
        })
        .collect();

    QuoteRevisionChangeSet {
        from_quote_id: old.id.clone(),
        to_quote_id: new.id.clone(),
        total: ValueChange::between(old.summary.total, new.summary.total),
        added,
        removed,
        modified,
    }
}
