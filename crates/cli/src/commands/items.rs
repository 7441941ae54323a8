use std::str::FromStr;

use loomline_core::revisions::RevisedItem;
use rust_decimal::Decimal;

/// `ID:QTY[:RATE[:DISC]]` from the command line. An empty `RATE` keeps tier
/// pricing while still allowing a discount, as in `denim-12oz:600::5`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemArg {
    pub item_id: String,
    pub quantity: Decimal,
    pub rate: Option<Decimal>,
    pub discount: Option<Decimal>,
}

impl ItemArg {
    pub fn to_revised_item(&self) -> RevisedItem {
        RevisedItem {
            unit_price_override: self.rate,
            discount_percent: self.discount,
            ..RevisedItem::new(self.item_id.clone(), self.quantity)
        }
    }
}

impl FromStr for ItemArg {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let parts = value.split(':').map(str::trim).collect::<Vec<_>>();
        if !(2..=4).contains(&parts.len()) {
            return Err(format!("expected ID:QTY[:RATE[:DISC]], got `{value}`"));
        }

        let item_id = parts[0];
        if item_id.is_empty() {
            return Err(format!("missing item id in `{value}`"));
        }

        Ok(Self {
            item_id: item_id.to_string(),
            quantity: parse_decimal("quantity", parts[1])?,
            rate: optional_decimal("rate", parts.get(2).copied())?,
            discount: optional_decimal("discount", parts.get(3).copied())?,
        })
    }
}

/// Lead requirements carry no commercial terms, only `ID:QTY`.
pub fn parse_requested_item(value: &str) -> Result<ItemArg, String> {
    let item = value.parse::<ItemArg>()?;
    if value.split(':').count() != 2 {
        return Err(format!("expected ID:QTY, got `{value}`"));
    }
    Ok(item)
}

fn parse_decimal(field: &str, raw: &str) -> Result<Decimal, String> {
    raw.parse::<Decimal>().map_err(|error| format!("invalid {field} `{raw}`: {error}"))
}

fn optional_decimal(field: &str, raw: Option<&str>) -> Result<Option<Decimal>, String> {
    match raw {
        None | Some("") => Ok(None),
        Some(raw) => parse_decimal(field, raw).map(Some),
    }
}
