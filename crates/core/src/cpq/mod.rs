pub mod catalog;
pub mod constraints;
pub mod pricing;
pub mod summary;

pub use catalog::{Catalog, CatalogReader};
pub use constraints::{validate_requested_items, ConstraintResult, ConstraintViolation};
pub use pricing::{
    round_money, select_tier, LinePriceRequest, PriceBreakdown, PricingEngine, PricingError,
};
pub use summary::{
    aggregate, aggregate_quote_lines, line_total, tax_for, LineAmounts, QuoteSummary,
    TaxBreakdown, TaxScheme,
};
