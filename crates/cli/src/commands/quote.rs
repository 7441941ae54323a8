use clap::{Args, ValueEnum};
use loomline_core::config::AppConfig;
use loomline_core::cpq::summary::{aggregate_quote_lines, QuoteSummary, TaxScheme};
use loomline_core::domain::catalog::BusinessModel;
use loomline_core::domain::lead::LeadId;
use loomline_core::domain::quote::QuoteId;
use loomline_core::errors::DomainError;
use loomline_core::repository::SalesRepository;
use loomline_core::revisions::RevisionChanges;
use loomline_db::DbPool;
use serde::Serialize;

use crate::commands::items::ItemArg;
use crate::commands::{
    application_failure, execute, CommandFailure, CommandResult, Reply, SalesSession,
};

#[derive(Debug, Clone, Args)]
pub struct GenerateArgs {
    #[arg(long)]
    pub lead: String,
}

#[derive(Debug, Clone, Args)]
pub struct ReviseArgs {
    #[arg(long, help = "Quote to revise; any quote of the chain may serve as the base")]
    pub quote: String,
    #[arg(
        long = "item",
        help = "Replacement line as ID:QTY[:RATE[:DISC]]; omit to carry the base lines"
    )]
    pub items: Vec<ItemArg>,
    #[arg(long, help = "Reprice every line under another business model")]
    pub model: Option<BusinessModel>,
    #[arg(long)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MarkOutcome {
    Sent,
    Approved,
    Rejected,
    Expired,
    PaymentReceived,
}

#[derive(Debug, Clone, Args)]
pub struct MarkArgs {
    #[arg(long)]
    pub quote: String,
    #[arg(long = "as", value_enum)]
    pub outcome: MarkOutcome,
    #[arg(long)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct DiffArgs {
    #[arg(long)]
    pub from: String,
    #[arg(long)]
    pub to: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SummaryScheme {
    Quote,
    Invoice,
}

#[derive(Debug, Clone, Args)]
pub struct SummaryArgs {
    #[arg(long)]
    pub quote: String,
    #[arg(long, value_enum, default_value_t = SummaryScheme::Quote)]
    pub scheme: SummaryScheme,
    #[arg(
        long,
        help = "Charge invoice tax as IGST (true) or CGST/SGST (false); \
                defaults to sales.invoice_interstate"
    )]
    pub interstate: Option<bool>,
}

#[derive(Debug, Serialize)]
struct TaxedSummary {
    quote_id: QuoteId,
    tax_scheme: TaxScheme,
    summary: QuoteSummary,
}

pub fn generate(args: &GenerateArgs) -> CommandResult {
    execute("quote generate", |config, pool| generate_quote(args, config, pool))
}

pub fn revise(args: &ReviseArgs) -> CommandResult {
    execute("quote revise", |config, pool| revise_quote(args, config, pool))
}

pub fn mark(args: &MarkArgs) -> CommandResult {
    execute("quote mark", |config, pool| mark_quote(args, config, pool))
}

pub fn diff(args: &DiffArgs) -> CommandResult {
    execute("quote diff", |config, pool| diff_quotes(args, config, pool))
}

pub fn summary(args: &SummaryArgs) -> CommandResult {
    execute("quote summary", |config, pool| summarize_quote(args, config, pool))
}

async fn generate_quote(
    args: &GenerateArgs,
    config: AppConfig,
    pool: DbPool,
) -> Result<Reply, CommandFailure> {
    let lead_id = LeadId(args.lead.trim().to_string());
    let session = SalesSession::open(&pool, &config).await?;
    session.load_lead(&lead_id).await?;

    let (quote, _) = session.settle(session.manager().generate(&lead_id)).await?;

    let message = format!(
        "quote {} generated for lead {}: total {}",
        quote.id, quote.lead_id, quote.summary.total
    );
    Reply::with_data(message, &quote)
}

async fn revise_quote(
    args: &ReviseArgs,
    config: AppConfig,
    pool: DbPool,
) -> Result<Reply, CommandFailure> {
    let base_quote_id = QuoteId(args.quote.trim().to_string());
    let session = SalesSession::open(&pool, &config).await?;
    session.load_quote(&base_quote_id).await?;

    let changes = RevisionChanges {
        items: (!args.items.is_empty())
            .then(|| args.items.iter().map(ItemArg::to_revised_item).collect()),
        business_model: args.model,
    };
    let outcome =
        session.manager().create_revision(&base_quote_id, changes, args.reason.as_deref());
    let (revision, _) = session.settle(outcome).await?;

    let message = format!(
        "revision {} of {} created as {}: total {}",
        revision.revision_number, revision.root_quote_id, revision.id, revision.summary.total
    );
    Reply::with_data(message, &revision)
}

async fn mark_quote(
    args: &MarkArgs,
    config: AppConfig,
    pool: DbPool,
) -> Result<Reply, CommandFailure> {
    let quote_id = QuoteId(args.quote.trim().to_string());
    let session = SalesSession::open(&pool, &config).await?;
    session.load_quote(&quote_id).await?;

    let manager = session.manager();
    let message = args.message.as_deref();
    let outcome = match args.outcome {
        MarkOutcome::Sent => manager.mark_sent(&quote_id, message),
        MarkOutcome::Approved => manager.mark_approved(&quote_id, message),
        MarkOutcome::Rejected => manager.mark_rejected(&quote_id, message),
        MarkOutcome::Expired => manager.mark_expired(&quote_id, message),
        MarkOutcome::PaymentReceived => manager.mark_payment_received(&quote_id, message),
    };
    let (change, _) = session.settle(outcome).await?;

    let message = format!(
        "quote {quote_id} marked; lead {} is now {}",
        change.lead.id,
        change.transition.to.label()
    );
    Reply::with_data(message, &change)
}

async fn diff_quotes(
    args: &DiffArgs,
    config: AppConfig,
    pool: DbPool,
) -> Result<Reply, CommandFailure> {
    let from = QuoteId(args.from.trim().to_string());
    let to = QuoteId(args.to.trim().to_string());
    let session = SalesSession::open(&pool, &config).await?;
    session.load_quote(&from).await?;
    session.load_quote(&to).await?;

    let changes = session.manager().calculate_changes(&from, &to).map_err(application_failure)?;

    let message = if changes.is_empty() {
        format!("no changes between {from} and {to}")
    } else {
        changes.summary_lines().join("\n")
    };
    Reply::with_data(message, &changes)
}

/// Re-aggregates a stored quote's lines under the requested tax scheme.
async fn summarize_quote(
    args: &SummaryArgs,
    config: AppConfig,
    pool: DbPool,
) -> Result<Reply, CommandFailure> {
    let quote_id = QuoteId(args.quote.trim().to_string());
    let session = SalesSession::open(&pool, &config).await?;
    session.load_quote(&quote_id).await?;

    let quote = session
        .manager()
        .repository()
        .find_quote(&quote_id)
        .map_err(|error| application_failure(error.into()))?
        .ok_or_else(|| application_failure(DomainError::QuoteNotFound(quote_id.clone()).into()))?;

    let tax_scheme = match (args.scheme, args.interstate) {
        (SummaryScheme::Quote, _) => config.sales.quoting_settings().tax_scheme,
        (SummaryScheme::Invoice, Some(interstate)) => TaxScheme::Invoice { interstate },
        (SummaryScheme::Invoice, None) => config.sales.invoice_scheme(),
    };
    let summary = aggregate_quote_lines(&quote.lines, tax_scheme);

    let message = format!(
        "quote {quote_id}: taxable {}, cgst {}, sgst {}, igst {}, total {}",
        summary.taxable_amount, summary.tax.cgst, summary.tax.sgst, summary.tax.igst, summary.total
    );
    Reply::with_data(message, &TaxedSummary { quote_id, tax_scheme, summary })
}
