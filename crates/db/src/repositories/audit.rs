use std::collections::BTreeMap;

use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Sqlite};

use loomline_core::audit::AuditEvent;
use loomline_core::domain::lead::LeadId;
use loomline_core::domain::quote::QuoteId;

use super::{
    get_column, parse_enum, parse_json, parse_timestamp, AuditEventRepository, RepositoryError,
};
use crate::DbPool;

pub struct SqlAuditEventRepository {
    pool: DbPool,
}

impl SqlAuditEventRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub(crate) async fn insert_audit_event<'e, E>(
    executor: E,
    event: &AuditEvent,
) -> Result<(), RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO audit_event (id, lead_id, quote_id, correlation_id, event_type, category,
                                  actor, outcome, metadata_json, occurred_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&event.event_id)
    .bind(event.lead_id.as_ref().map(|id| id.0.clone()))
    .bind(event.quote_id.as_ref().map(|id| id.0.clone()))
    .bind(&event.correlation_id)
    .bind(&event.event_type)
    .bind(event.category.as_str())
    .bind(&event.actor)
    .bind(event.outcome.as_str())
    .bind(event.metadata_json())
    .bind(event.occurred_at.to_rfc3339())
    .execute(executor)
    .await?;

    Ok(())
}

fn row_to_event(row: &SqliteRow) -> Result<AuditEvent, RepositoryError> {
    let category: String = get_column(row, "category")?;
    let outcome: String = get_column(row, "outcome")?;
    let metadata_json: String = get_column(row, "metadata_json")?;
    let occurred_at: String = get_column(row, "occurred_at")?;
    let metadata: BTreeMap<String, String> = parse_json("metadata_json", &metadata_json)?;

    Ok(AuditEvent {
        event_id: get_column(row, "id")?,
        lead_id: get_column::<Option<String>>(row, "lead_id")?.map(LeadId),
        quote_id: get_column::<Option<String>>(row, "quote_id")?.map(QuoteId),
        correlation_id: get_column(row, "correlation_id")?,
        event_type: get_column(row, "event_type")?,
        category: parse_enum("category", &category)?,
        actor: get_column(row, "actor")?,
        outcome: parse_enum("outcome", &outcome)?,
        metadata,
        occurred_at: parse_timestamp("occurred_at", &occurred_at)?,
    })
}

#[async_trait::async_trait]
impl AuditEventRepository for SqlAuditEventRepository {
    async fn append(&self, event: AuditEvent) -> Result<(), RepositoryError> {
        insert_audit_event(&self.pool, &event).await
    }

    async fn list_for_lead(&self, lead_id: &LeadId) -> Result<Vec<AuditEvent>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, lead_id, quote_id, correlation_id, event_type, category, actor, outcome,
                    metadata_json, occurred_at
             FROM audit_event
             WHERE lead_id = ?
             ORDER BY rowid",
        )
        .bind(&lead_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_event).collect()
    }
}
