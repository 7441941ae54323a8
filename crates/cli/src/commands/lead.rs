use clap::Args;
use loomline_core::audit::{AuditCategory, AuditEvent, AuditOutcome};
use loomline_core::config::AppConfig;
use loomline_core::domain::catalog::BusinessModel;
use loomline_core::domain::lead::{Lead, LeadId, RequestedItem};
use loomline_core::errors::DomainError;
use loomline_core::flows::{LeadAction, LeadStatus};
use loomline_core::repository::SalesRepository;
use loomline_db::repositories::{LeadRepository, SqlLeadRepository};
use loomline_db::{DbPool, SalesWorkspace};
use serde::Serialize;
use tracing::info;

use crate::commands::items::{parse_requested_item, ItemArg};
use crate::commands::{
    application_failure, execute, persistence_failure, CommandFailure, CommandResult, Reply,
    SalesSession, CLI_ACTOR,
};

#[derive(Debug, Clone, Args)]
pub struct CreateArgs {
    #[arg(long)]
    pub id: String,
    #[arg(long)]
    pub customer: String,
    #[arg(long, help = "sales or job_work (defaults to sales.default_business_model)")]
    pub model: Option<BusinessModel>,
    #[arg(
        long = "item",
        required = true,
        value_parser = parse_requested_item,
        help = "Requested item as ID:QTY; repeat for several items"
    )]
    pub items: Vec<ItemArg>,
    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct ActionsArgs {
    #[arg(long)]
    pub id: String,
}

#[derive(Debug, Clone, Args)]
pub struct TransitionArgs {
    #[arg(long)]
    pub id: String,
    #[arg(long, help = "Target status, e.g. negotiation or verbally-approved")]
    pub to: LeadStatus,
    #[arg(long)]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
struct LeadActions {
    lead_id: LeadId,
    conversion_status: LeadStatus,
    actions: Vec<LeadAction>,
}

pub fn create(args: &CreateArgs) -> CommandResult {
    execute("lead create", |config, pool| create_lead(args, config, pool))
}

pub fn actions(args: &ActionsArgs) -> CommandResult {
    execute("lead actions", |config, pool| lead_actions(args, config, pool))
}

pub fn transition(args: &TransitionArgs) -> CommandResult {
    execute("lead transition", |config, pool| transition_lead(args, config, pool))
}

async fn create_lead(
    args: &CreateArgs,
    config: AppConfig,
    pool: DbPool,
) -> Result<Reply, CommandFailure> {
    let lead_id = LeadId(args.id.trim().to_string());
    if lead_id.0.is_empty() || args.customer.trim().is_empty() {
        return Err(("invalid_argument", "lead id and customer must not be empty".to_string(), 1));
    }

    let existing = SqlLeadRepository::new(pool.clone())
        .find_by_id(&lead_id)
        .await
        .map_err(persistence_failure)?;
    if existing.is_some() {
        return Err(("lead_exists", format!("lead `{lead_id}` already exists"), 1));
    }

    let requested_items = args
        .items
        .iter()
        .map(|item| RequestedItem::new(item.item_id.clone(), item.quantity))
        .collect::<Vec<_>>();
    let business_model = args.model.unwrap_or(config.sales.default_business_model);
    let mut lead =
        Lead::new(lead_id.0.clone(), args.customer.trim(), business_model, requested_items);
    if let Some(notes) = &args.notes {
        lead.notes = notes.clone();
    }

    let mut event = AuditEvent::new(
        Some(lead_id.clone()),
        None,
        "",
        "lead.created",
        AuditCategory::Lead,
        CLI_ACTOR,
        AuditOutcome::Success,
    )
    .with_metadata("business_model", business_model.as_str())
    .with_metadata("item_count", lead.requested_items.len().to_string());
    event.correlation_id = event.event_id.clone();

    let workspace = SalesWorkspace::new(pool);
    workspace
        .repository()
        .save_lead(lead.clone())
        .map_err(|error| application_failure(error.into()))?;
    workspace.commit(&[event]).await.map_err(persistence_failure)?;

    info!(
        event_name = "lead.created",
        lead_id = %lead.id,
        business_model = %business_model,
        item_count = lead.requested_items.len(),
        "lead captured"
    );
    Reply::with_data(format!("lead {} captured for {}", lead.id, lead.customer_name), &lead)
}

async fn lead_actions(
    args: &ActionsArgs,
    config: AppConfig,
    pool: DbPool,
) -> Result<Reply, CommandFailure> {
    let lead_id = LeadId(args.id.trim().to_string());
    let session = SalesSession::open(&pool, &config).await?;
    session.load_lead(&lead_id).await?;

    let manager = session.manager();
    let actions = manager.available_actions(&lead_id).map_err(application_failure)?;
    let conversion_status = manager
        .repository()
        .find_lead(&lead_id)
        .map_err(|error| application_failure(error.into()))?
        .map(|lead| lead.conversion_status())
        .ok_or_else(|| application_failure(DomainError::LeadNotFound(lead_id.clone()).into()))?;

    let message = if actions.is_empty() {
        format!("lead {lead_id} is {} with no further actions", conversion_status.label())
    } else {
        let names = actions.iter().map(|action| action.action).collect::<Vec<_>>();
        format!("lead {lead_id} is {}: {}", conversion_status.label(), names.join(", "))
    };
    Reply::with_data(message, &LeadActions { lead_id, conversion_status, actions })
}

async fn transition_lead(
    args: &TransitionArgs,
    config: AppConfig,
    pool: DbPool,
) -> Result<Reply, CommandFailure> {
    let lead_id = LeadId(args.id.trim().to_string());
    let session = SalesSession::open(&pool, &config).await?;
    session.load_lead(&lead_id).await?;

    let outcome = session.manager().transition_lead(&lead_id, args.to, args.reason.as_deref());
    let (change, _) = session.settle(outcome).await?;

    let message = format!(
        "lead {lead_id} moved from {} to {}",
        change.transition.from.label(),
        change.transition.to.label()
    );
    Reply::with_data(message, &change)
}
