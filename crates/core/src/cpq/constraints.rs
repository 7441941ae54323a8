use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cpq::catalog::CatalogReader;
use crate::domain::lead::RequestedItem;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintViolation {
    pub code: String,
    pub item_id: Option<String>,
    pub message: String,
    pub suggestion: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintResult {
    pub valid: bool,
    pub violations: Vec<ConstraintViolation>,
}

impl Default for ConstraintResult {
    fn default() -> Self {
        Self { valid: true, violations: Vec::new() }
    }
}

/// Checks requested items against catalog order-quantity rules. Violations are
/// advisory: quote generation still prices every item.
pub fn validate_requested_items<C>(catalog: &C, items: &[RequestedItem]) -> ConstraintResult
where
    C: CatalogReader + ?Sized,
{
    if items.is_empty() {
        return ConstraintResult {
            valid: false,
            violations: vec![ConstraintViolation {
                code: "EMPTY_REQUEST".to_string(),
                item_id: None,
                message: "Lead must request at least one item".to_string(),
                suggestion: Some("Add a catalog item and quantity to the inquiry".to_string()),
            }],
        };
    }

    let mut result = ConstraintResult::default();
    let mut seen = HashSet::new();

    for item in items {
        let item_id = item.catalog_item_id.0.trim().to_owned();

        if !seen.insert(item_id.clone()) {
            result.violations.push(ConstraintViolation {
                code: "DUPLICATE_ITEM".to_string(),
                item_id: Some(item_id.clone()),
                message: format!("Item {item_id} is requested more than once"),
                suggestion: Some("Combine the quantities into a single line".to_string()),
            });
        }

        if item.requested_quantity <= Decimal::ZERO {
            result.violations.push(ConstraintViolation {
                code: "NON_POSITIVE_QUANTITY".to_string(),
                item_id: Some(item_id.clone()),
                message: format!("Item {item_id} has quantity {}", item.requested_quantity),
                suggestion: Some("Use a positive quantity".to_string()),
            });
        }

        let Some(definition) = catalog.get_catalog_item(&item.catalog_item_id) else {
            result.violations.push(ConstraintViolation {
                code: "UNKNOWN_ITEM".to_string(),
                item_id: Some(item_id.clone()),
                message: format!("Item {item_id} is not in the catalog"),
                suggestion: None,
            });
            continue;
        };

        if let Some(minimum) = definition.minimum_order_quantity {
            if item.requested_quantity < minimum {
                result.violations.push(ConstraintViolation {
                    code: "BELOW_MINIMUM_ORDER".to_string(),
                    item_id: Some(item_id.clone()),
                    message: format!(
                        "Item {item_id} requests {} but the minimum order is {minimum}",
                        item.requested_quantity
                    ),
                    suggestion: Some(format!("Raise the quantity to at least {minimum}")),
                });
            }
        }

        if let Some(maximum) = definition.maximum_order_quantity {
            if item.requested_quantity > maximum {
                result.violations.push(ConstraintViolation {
                    code: "ABOVE_MAXIMUM_ORDER".to_string(),
                    item_id: Some(item_id.clone()),
                    message: format!(
                        "Item {item_id} requests {} but the maximum order is {maximum}",
                        item.requested_quantity
                    ),
                    suggestion: Some("Split the requirement across delivery schedules".to_string()),
                });
            }
        }
    }

    result.valid = result.violations.is_empty();
    result
}
