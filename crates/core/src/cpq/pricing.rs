use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::cpq::catalog::CatalogReader;
use crate::domain::catalog::{BusinessModel, CatalogItemId, PricingTier};
use crate::domain::quote::{QuoteLine, RateSource};

const FALLBACK_UNIT: &str = "unit";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PricingError {
    #[error("catalog item `{0}` was not found")]
    ItemNotFound(CatalogItemId),
    #[error("catalog item `{item_id}` has no {business_model} pricing tiers")]
    NoPricingTiers { item_id: CatalogItemId, business_model: BusinessModel },
    #[error("quantity must not be negative, got {0}")]
    InvalidQuantity(Decimal),
    #[error("manual unit price must not be negative, got {0}")]
    InvalidUnitPrice(Decimal),
    #[error("manual discount must be within 0..=100 percent, got {0}")]
    InvalidDiscount(Decimal),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub item_id: CatalogItemId,
    pub business_model: BusinessModel,
    pub quantity: Decimal,
    pub unit: String,
    pub selected_tier_minimum: Decimal,
    pub base_rate: Decimal,
    pub unit_rate: Decimal,
    pub base_price: Decimal,
    pub final_price: Decimal,
    pub volume_discount_percent: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinePriceRequest {
    pub item_id: CatalogItemId,
    pub quantity: Decimal,
    pub business_model: BusinessModel,
    /// Flat unit price that replaces the tier lookup.
    pub unit_price_override: Option<Decimal>,
    /// Percentage taken off whichever unit price resulted.
    pub discount_percent: Option<Decimal>,
    pub notes: Option<String>,
    pub custom_specifications: Option<String>,
}

impl LinePriceRequest {
    pub fn new(item_id: CatalogItemId, quantity: Decimal, business_model: BusinessModel) -> Self {
        Self {
            item_id,
            quantity,
            business_model,
            unit_price_override: None,
            discount_percent: None,
            notes: None,
            custom_specifications: None,
        }
    }
}

/// Rounds a monetary amount to the nearest whole unit, halves away from zero.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

/// Picks the qualifying tier with the largest minimum; below every minimum the
/// first tier in the list applies. Returns `None` only for an empty schedule.
pub fn select_tier(tiers: &[PricingTier], quantity: Decimal) -> Option<&PricingTier> {
    tiers
        .iter()
        .filter(|tier| tier.minimum_quantity <= quantity)
        .max_by_key(|tier| tier.minimum_quantity)
        .or_else(|| tiers.first())
}

pub struct PricingEngine<C> {
    catalog: C,
}

impl<C> PricingEngine<C>
where
    C: CatalogReader,
{
    pub fn new(catalog: C) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn calculate_price(
        &self,
        item_id: &CatalogItemId,
        quantity: Decimal,
        business_model: BusinessModel,
    ) -> Result<PriceBreakdown, PricingError> {
        if quantity < Decimal::ZERO {
            return Err(PricingError::InvalidQuantity(quantity));
        }

        let item = self
            .catalog
            .get_catalog_item(item_id)
            .ok_or_else(|| PricingError::ItemNotFound(item_id.clone()))?;
        let tiers = item.tiers(business_model);
        let (Some(first), Some(selected)) = (tiers.first(), select_tier(tiers, quantity)) else {
            return Err(PricingError::NoPricingTiers { item_id: item_id.clone(), business_model });
        };

        let base_rate = round_money(first.base_rate);
        let unit_rate = round_money(selected.base_rate);

        Ok(PriceBreakdown {
            item_id: item_id.clone(),
            business_model,
            quantity,
            unit: selected.unit.clone(),
            selected_tier_minimum: selected.minimum_quantity,
            base_rate,
            unit_rate,
            base_price: round_money(base_rate * quantity),
            final_price: round_money(unit_rate * quantity),
            volume_discount_percent: volume_discount_percent(base_rate, unit_rate),
        })
    }

    pub fn price_line(&self, request: &LinePriceRequest) -> Result<QuoteLine, PricingError> {
        let discount_percent = request.discount_percent.unwrap_or(Decimal::ZERO);
        if discount_percent < Decimal::ZERO || discount_percent > Decimal::ONE_HUNDRED {
            return Err(PricingError::InvalidDiscount(discount_percent));
        }
        if request.quantity < Decimal::ZERO {
            return Err(PricingError::InvalidQuantity(request.quantity));
        }

        let item = self.catalog.get_catalog_item(&request.item_id);
        let description = item
            .as_ref()
            .map(|item| item.name.clone())
            .unwrap_or_else(|| request.item_id.0.clone());

        let (rate, rate_source, unit) = match request.unit_price_override {
            Some(price) if price < Decimal::ZERO => {
                return Err(PricingError::InvalidUnitPrice(price));
            }
            Some(price) => {
                let unit = item
                    .as_ref()
                    .and_then(|item| item.tiers(request.business_model).first())
                    .map(|tier| tier.unit.clone())
                    .unwrap_or_else(|| FALLBACK_UNIT.to_string());
                (round_money(price), RateSource::ManualOverride, unit)
            }
            None => {
                let breakdown = self.calculate_price(
                    &request.item_id,
                    request.quantity,
                    request.business_model,
                )?;
                (
                    breakdown.unit_rate,
                    RateSource::Tier { minimum_quantity: breakdown.selected_tier_minimum },
                    breakdown.unit,
                )
            }
        };

        let gross = round_money(request.quantity * rate);
        let discount_amount = round_money(gross * discount_percent / Decimal::ONE_HUNDRED);

        Ok(QuoteLine {
            item_code: request.item_id.clone(),
            description,
            quantity: request.quantity,
            unit,
            rate,
            rate_source,
            discount_percent,
            discount_amount,
            amount: gross - discount_amount,
            notes: request.notes.clone(),
            custom_specifications: request.custom_specifications.clone(),
        })
    }

    /// Prices a line for display. A pricing failure degrades to a zero-rate line
    /// instead of aborting the surrounding quote.
    pub fn price_line_or_default(&self, request: &LinePriceRequest) -> QuoteLine {
        match self.price_line(request) {
            Ok(line) => line,
            Err(error) => {
                warn!(
                    event_name = "pricing.line_degraded",
                    item_id = %request.item_id,
                    business_model = %request.business_model,
                    error = %error,
                    "pricing failed, line falls back to a zero rate"
                );
                unpriced_line(request)
            }
        }
    }
}

fn unpriced_line(request: &LinePriceRequest) -> QuoteLine {
    QuoteLine {
        item_code: request.item_id.clone(),
        description: request.item_id.0.clone(),
        quantity: request.quantity,
        unit: FALLBACK_UNIT.to_string(),
        rate: Decimal::ZERO,
        rate_source: RateSource::Unpriced,
        discount_percent: Decimal::ZERO,
        discount_amount: Decimal::ZERO,
        amount: Decimal::ZERO,
        notes: request.notes.clone(),
        custom_specifications: request.custom_specifications.clone(),
    }
}

fn volume_discount_percent(base_rate: Decimal, unit_rate: Decimal) -> Decimal {
    if base_rate <= Decimal::ZERO || unit_rate >= base_rate {
        return Decimal::ZERO;
    }
    ((base_rate - unit_rate) / base_rate * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
