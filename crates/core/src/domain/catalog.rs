use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CatalogItemId(pub String);

impl fmt::Display for CatalogItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Commercial context a price is quoted under. Each catalog item carries an
/// independent tier schedule per model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusinessModel {
    /// Sale of finished goods.
    Sales,
    /// Contract processing of customer-supplied material.
    JobWork,
}

impl BusinessModel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sales => "sales",
            Self::JobWork => "job_work",
        }
    }
}

impl fmt::Display for BusinessModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownBusinessModel(pub String);

impl fmt::Display for UnknownBusinessModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported business model `{}` (expected sales|job_work)", self.0)
    }
}

impl std::error::Error for UnknownBusinessModel {}

impl FromStr for BusinessModel {
    type Err = UnknownBusinessModel;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "sales" => Ok(Self::Sales),
            "job_work" | "jobwork" => Ok(Self::JobWork),
            other => Err(UnknownBusinessModel(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTier {
    pub minimum_quantity: Decimal,
    pub base_rate: Decimal,
    pub unit: String,
}

impl PricingTier {
    pub fn new(
        minimum_quantity: impl Into<Decimal>,
        base_rate: impl Into<Decimal>,
        unit: &str,
    ) -> Self {
        Self {
            minimum_quantity: minimum_quantity.into(),
            base_rate: base_rate.into(),
            unit: unit.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: CatalogItemId,
    pub name: String,
    pub sales_tiers: Vec<PricingTier>,
    pub job_work_tiers: Vec<PricingTier>,
    pub minimum_order_quantity: Option<Decimal>,
    pub maximum_order_quantity: Option<Decimal>,
}

impl CatalogItem {
    pub fn tiers(&self, business_model: BusinessModel) -> &[PricingTier] {
        match business_model {
            BusinessModel::Sales => &self.sales_tiers,
            BusinessModel::JobWork => &self.job_work_tiers,
        }
    }
}
