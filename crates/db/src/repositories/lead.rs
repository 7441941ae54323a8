use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Sqlite};

use loomline_core::domain::lead::{Lead, LeadId, RequestedItem};
use loomline_core::domain::quote::QuoteId;
use loomline_core::flows::LeadStatus;

use super::{
    get_column, parse_enum, parse_json, parse_optional_timestamp, parse_timestamp, to_json,
    LeadRepository, RepositoryError,
};
use crate::DbPool;

pub(crate) const LEAD_COLUMNS: &str = "id, customer_name, business_model, conversion_status,
    requested_items_json, active_quote_id, quote_history_json, quote_count, last_contact, notes,
    converted_at, created_at";

pub struct SqlLeadRepository {
    pool: DbPool,
}

impl SqlLeadRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn row_to_lead(row: &SqliteRow) -> Result<Lead, RepositoryError> {
    let id: String = get_column(row, "id")?;
    let customer_name: String = get_column(row, "customer_name")?;
    let business_model: String = get_column(row, "business_model")?;
    let status: String = get_column(row, "conversion_status")?;
    let requested_items_json: String = get_column(row, "requested_items_json")?;
    let active_quote_id: Option<String> = get_column(row, "active_quote_id")?;
    let quote_history_json: String = get_column(row, "quote_history_json")?;
    let quote_count: i64 = get_column(row, "quote_count")?;
    let last_contact: String = get_column(row, "last_contact")?;
    let notes: String = get_column(row, "notes")?;
    let converted_at: Option<String> = get_column(row, "converted_at")?;
    let created_at: String = get_column(row, "created_at")?;

    let requested_items: Vec<RequestedItem> =
        parse_json("requested_items_json", &requested_items_json)?;
    let quote_history: Vec<QuoteId> = parse_json("quote_history_json", &quote_history_json)?;
    let status: LeadStatus = parse_enum("conversion_status", &status)?;
    let business_model = parse_enum("business_model", &business_model)?;

    let mut lead =
        Lead::new(id, customer_name, business_model, requested_items).with_stored_status(status);
    lead.active_quote_id = active_quote_id.map(QuoteId);
    lead.quote_history = quote_history;
    lead.quote_count = u32::try_from(quote_count)
        .map_err(|error| super::decode_error("quote_count", error))?;
    lead.last_contact = parse_timestamp("last_contact", &last_contact)?;
    lead.notes = notes;
    lead.converted_at = parse_optional_timestamp("converted_at", converted_at)?;
    lead.created_at = parse_timestamp("created_at", &created_at)?;
    Ok(lead)
}

/// Inserts or replaces one lead on any executor, so the same statement serves
/// pooled writes and workspace transactions.
pub(crate) async fn upsert_lead<'e, E>(executor: E, lead: &Lead) -> Result<(), RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let requested_items_json = to_json("requested_items_json", &lead.requested_items)?;
    let quote_history_json = to_json("quote_history_json", &lead.quote_history)?;

    sqlx::query(
        "INSERT INTO lead (id, customer_name, business_model, conversion_status,
                           requested_items_json, active_quote_id, quote_history_json,
                           quote_count, last_contact, notes, converted_at, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
             customer_name = excluded.customer_name,
             business_model = excluded.business_model,
             conversion_status = excluded.conversion_status,
             requested_items_json = excluded.requested_items_json,
             active_quote_id = excluded.active_quote_id,
             quote_history_json = excluded.quote_history_json,
             quote_count = excluded.quote_count,
             last_contact = excluded.last_contact,
             notes = excluded.notes,
             converted_at = excluded.converted_at",
    )
    .bind(&lead.id.0)
    .bind(&lead.customer_name)
    .bind(lead.business_model.as_str())
    .bind(lead.conversion_status().as_str())
    .bind(requested_items_json)
    .bind(lead.active_quote_id.as_ref().map(|id| id.0.clone()))
    .bind(quote_history_json)
    .bind(i64::from(lead.quote_count))
    .bind(lead.last_contact.to_rfc3339())
    .bind(&lead.notes)
    .bind(lead.converted_at.map(|at| at.to_rfc3339()))
    .bind(lead.created_at.to_rfc3339())
    .execute(executor)
    .await?;

    Ok(())
}

#[async_trait::async_trait]
impl LeadRepository for SqlLeadRepository {
    async fn find_by_id(&self, id: &LeadId) -> Result<Option<Lead>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {LEAD_COLUMNS} FROM lead WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref row) => Ok(Some(row_to_lead(row)?)),
            None => Ok(None),
        }
    }

    async fn list(&self, status: Option<LeadStatus>) -> Result<Vec<Lead>, RepositoryError> {
        let rows: Vec<SqliteRow> = match status {
            Some(status) => {
                sqlx::query(&format!(
                    "SELECT {LEAD_COLUMNS} FROM lead WHERE conversion_status = ? ORDER BY id"
                ))
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!("SELECT {LEAD_COLUMNS} FROM lead ORDER BY id"))
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.iter().map(row_to_lead).collect()
    }

    async fn save(&self, lead: Lead) -> Result<(), RepositoryError> {
        upsert_lead(&self.pool, &lead).await
    }
}
