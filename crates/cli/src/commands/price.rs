use clap::Args;
use loomline_core::config::AppConfig;
use loomline_core::cpq::pricing::{LinePriceRequest, PriceBreakdown, PricingEngine};
use loomline_core::domain::catalog::{BusinessModel, CatalogItemId};
use loomline_core::domain::quote::QuoteLine;
use loomline_core::errors::ApplicationError;
use loomline_db::repositories::SqlCatalogRepository;
use loomline_db::DbPool;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::commands::{
    application_failure, execute, persistence_failure, CommandFailure, CommandResult, Reply,
};

#[derive(Debug, Clone, Args)]
pub struct PriceArgs {
    #[arg(long, help = "Catalog item id, e.g. cotton-poplin")]
    pub item: String,
    #[arg(long, help = "Quantity in the item's unit")]
    pub quantity: Decimal,
    #[arg(long, help = "sales or job_work (defaults to sales.default_business_model)")]
    pub model: Option<BusinessModel>,
    #[arg(long = "unit-price", help = "Manual rate replacing the tier rate")]
    pub unit_price: Option<Decimal>,
    #[arg(long, help = "Line discount in percent")]
    pub discount: Option<Decimal>,
}

/// Tier breakdown is absent when a manual rate replaces the tier schedule.
#[derive(Debug, Serialize)]
struct PriceReport {
    breakdown: Option<PriceBreakdown>,
    line: QuoteLine,
}

pub fn run(args: &PriceArgs) -> CommandResult {
    execute("price", |config, pool| price_line(args, config, pool))
}

async fn price_line(
    args: &PriceArgs,
    config: AppConfig,
    pool: DbPool,
) -> Result<Reply, CommandFailure> {
    let catalog =
        SqlCatalogRepository::new(pool).load_catalog().await.map_err(persistence_failure)?;
    let engine = PricingEngine::new(catalog);

    let item_id = CatalogItemId(args.item.trim().to_string());
    let business_model = args.model.unwrap_or(config.sales.default_business_model);
    let request = LinePriceRequest {
        unit_price_override: args.unit_price,
        discount_percent: args.discount,
        ..LinePriceRequest::new(item_id.clone(), args.quantity, business_model)
    };

    let breakdown = match args.unit_price {
        Some(_) => None,
        None => Some(
            engine
                .calculate_price(&item_id, args.quantity, business_model)
                .map_err(|error| application_failure(ApplicationError::from(error)))?,
        ),
    };
    let line = engine
        .price_line(&request)
        .map_err(|error| application_failure(ApplicationError::from(error)))?;

    let message = format!(
        "{} x {} {} @ {} = {} ({business_model})",
        line.item_code, line.quantity, line.unit, line.rate, line.amount
    );
    Reply::with_data(message, &PriceReport { breakdown, line })
}
