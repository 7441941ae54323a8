use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Sqlite};

use loomline_core::cpq::summary::QuoteSummary;
use loomline_core::domain::lead::LeadId;
use loomline_core::domain::quote::{Quote, QuoteId, QuoteLine};

use super::{
    decode_error, get_column, parse_enum, parse_json, parse_optional_timestamp, parse_timestamp,
    to_json, QuoteRepository, RepositoryError,
};
use crate::DbPool;

const QUOTE_COLUMNS: &str = "id, lead_id, root_quote_id, parent_quote_id, revision_number,
    is_active, status, business_model, lines_json, summary_json, revision_reason,
    change_summary_json, status_message, valid_until, created_at, updated_at";

pub struct SqlQuoteRepository {
    pool: DbPool,
}

impl SqlQuoteRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn row_to_quote(row: &SqliteRow) -> Result<Quote, RepositoryError> {
    let id: String = get_column(row, "id")?;
    let lead_id: String = get_column(row, "lead_id")?;
    let root_quote_id: String = get_column(row, "root_quote_id")?;
    let parent_quote_id: Option<String> = get_column(row, "parent_quote_id")?;
    let revision_number: i64 = get_column(row, "revision_number")?;
    let is_active: bool = get_column(row, "is_active")?;
    let status: String = get_column(row, "status")?;
    let business_model: String = get_column(row, "business_model")?;
    let lines_json: String = get_column(row, "lines_json")?;
    let summary_json: String = get_column(row, "summary_json")?;
    let revision_reason: Option<String> = get_column(row, "revision_reason")?;
    let change_summary_json: String = get_column(row, "change_summary_json")?;
    let status_message: Option<String> = get_column(row, "status_message")?;
    let valid_until: Option<String> = get_column(row, "valid_until")?;
    let created_at: String = get_column(row, "created_at")?;
    let updated_at: String = get_column(row, "updated_at")?;

    let lines: Vec<QuoteLine> = parse_json("lines_json", &lines_json)?;
    let summary: QuoteSummary = parse_json("summary_json", &summary_json)?;

    Ok(Quote {
        id: QuoteId(id),
        lead_id: LeadId(lead_id),
        root_quote_id: QuoteId(root_quote_id),
        parent_quote_id: parent_quote_id.map(QuoteId),
        revision_number: u32::try_from(revision_number)
            .map_err(|error| decode_error("revision_number", error))?,
        is_active,
        status: parse_enum("status", &status)?,
        business_model: parse_enum("business_model", &business_model)?,
        lines,
        summary,
        revision_reason,
        change_summary: parse_json("change_summary_json", &change_summary_json)?,
        status_message,
        valid_until: parse_optional_timestamp("valid_until", valid_until)?,
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}

/// Inserts or updates one quote. The chain columns (`lead_id`, `root_quote_id`,
/// `parent_quote_id`, `revision_number`) never change after the first insert.
pub(crate) async fn upsert_quote<'e, E>(executor: E, quote: &Quote) -> Result<(), RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let lines_json = to_json("lines_json", &quote.lines)?;
    let summary_json = to_json("summary_json", &quote.summary)?;
    let change_summary_json = to_json("change_summary_json", &quote.change_summary)?;

    sqlx::query(
        "INSERT INTO quote (id, lead_id, root_quote_id, parent_quote_id, revision_number,
                            is_active, status, business_model, lines_json, summary_json, total,
                            revision_reason, change_summary_json, status_message, valid_until,
                            created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
             is_active = excluded.is_active,
             status = excluded.status,
             business_model = excluded.business_model,
             lines_json = excluded.lines_json,
             summary_json = excluded.summary_json,
             total = excluded.total,
             revision_reason = excluded.revision_reason,
             change_summary_json = excluded.change_summary_json,
             status_message = excluded.status_message,
             valid_until = excluded.valid_until,
             updated_at = excluded.updated_at",
    )
    .bind(&quote.id.0)
    .bind(&quote.lead_id.0)
    .bind(&quote.root_quote_id.0)
    .bind(quote.parent_quote_id.as_ref().map(|id| id.0.clone()))
    .bind(i64::from(quote.revision_number))
    .bind(quote.is_active)
    .bind(quote.status.as_str())
    .bind(quote.business_model.as_str())
    .bind(lines_json)
    .bind(summary_json)
    .bind(quote.summary.total.to_string())
    .bind(&quote.revision_reason)
    .bind(change_summary_json)
    .bind(&quote.status_message)
    .bind(quote.valid_until.map(|at| at.to_rfc3339()))
    .bind(quote.created_at.to_rfc3339())
    .bind(quote.updated_at.to_rfc3339())
    .execute(executor)
    .await?;

    Ok(())
}

pub(crate) async fn quotes_for_lead<'e, E>(
    executor: E,
    lead_id: &LeadId,
) -> Result<Vec<Quote>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(&format!(
        "SELECT {QUOTE_COLUMNS} FROM quote
         WHERE lead_id = ?
         ORDER BY root_quote_id, revision_number"
    ))
    .bind(&lead_id.0)
    .fetch_all(executor)
    .await?;

    rows.iter().map(row_to_quote).collect()
}

#[async_trait::async_trait]
impl QuoteRepository for SqlQuoteRepository {
    async fn find_by_id(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {QUOTE_COLUMNS} FROM quote WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref row) => Ok(Some(row_to_quote(row)?)),
            None => Ok(None),
        }
    }

    async fn find_chain(&self, root_quote_id: &QuoteId) -> Result<Vec<Quote>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {QUOTE_COLUMNS} FROM quote WHERE root_quote_id = ? ORDER BY revision_number"
        ))
        .bind(&root_quote_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_quote).collect()
    }

    async fn list_for_lead(&self, lead_id: &LeadId) -> Result<Vec<Quote>, RepositoryError> {
        quotes_for_lead(&self.pool, lead_id).await
    }

    async fn save(&self, quote: Quote) -> Result<(), RepositoryError> {
        upsert_quote(&self.pool, &quote).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use loomline_core::cpq::summary::{aggregate, LineAmounts, TaxScheme};
    use loomline_core::domain::catalog::{BusinessModel, CatalogItemId};
    use loomline_core::domain::lead::{Lead, LeadId};
    use loomline_core::domain::quote::{Quote, QuoteId, QuoteLine, QuoteStatus, RateSource};
    use rust_decimal::Decimal;

    use super::SqlQuoteRepository;
    use crate::repositories::{LeadRepository, QuoteRepository, SqlLeadRepository};
    use crate::{connect_with_settings, migrations, DbPool};

    async fn pool_with_lead() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        SqlLeadRepository::new(pool.clone())
            .save(Lead::new("LEAD-77", "Erode Textiles", BusinessModel::Sales, Vec::new()))
            .await
            .expect("save lead");
        pool
    }

    fn line() -> QuoteLine {
        QuoteLine {
            item_code: CatalogItemId("denim-12oz".to_string()),
            description: "Denim 12oz".to_string(),
            quantity: Decimal::from(400),
            unit: "m".to_string(),
            rate: Decimal::from(210),
            rate_source: RateSource::Tier { minimum_quantity: Decimal::from(250) },
            discount_percent: Decimal::from(5),
            discount_amount: Decimal::from(4200),
            amount: Decimal::from(79_800),
            notes: Some("indigo".to_string()),
            custom_specifications: None,
        }
    }

    fn quote(id: &str, parent: Option<&str>, revision_number: u32, is_active: bool) -> Quote {
        let at = Utc.with_ymd_and_hms(2026, 2, 10, 9, 0, 0).single().expect("timestamp");
        let lines = vec![line()];
        let amounts = lines.iter().map(LineAmounts::from).collect::<Vec<_>>();
        Quote {
            id: QuoteId(id.to_string()),
            lead_id: LeadId("LEAD-77".to_string()),
            root_quote_id: QuoteId("LEAD-77-Q1".to_string()),
            parent_quote_id: parent.map(|parent| QuoteId(parent.to_string())),
            revision_number,
            is_active,
            status: if is_active { QuoteStatus::Sent } else { QuoteStatus::Superseded },
            business_model: BusinessModel::Sales,
            summary: aggregate(&amounts, TaxScheme::Quote),
            lines,
            revision_reason: parent.map(|_| "volume increase".to_string()),
            change_summary: Vec::new(),
            status_message: None,
            valid_until: Some(at + Duration::days(15)),
            created_at: at,
            updated_at: at,
        }
    }

    #[tokio::test]
    async fn quote_round_trips_lines_and_summary() {
        let repo = SqlQuoteRepository::new(pool_with_lead().await);
        let original = quote("LEAD-77-Q1", None, 1, true);
        repo.save(original.clone()).await.expect("save");

        let loaded = repo.find_by_id(&original.id).await.expect("find").expect("quote");

        assert_eq!(loaded, original);
        assert_eq!(loaded.summary.subtotal, Decimal::from(79_800));
    }

    #[tokio::test]
    async fn chain_is_ordered_by_revision_and_updates_in_place() {
        let pool = pool_with_lead().await;
        let repo = SqlQuoteRepository::new(pool.clone());
        repo.save(quote("LEAD-77-Q1", None, 1, false)).await.expect("save original");
        repo.save(quote("LEAD-77-Q2", Some("LEAD-77-Q1"), 2, true)).await.expect("save revision");

        let mut revision = quote("LEAD-77-Q2", Some("LEAD-77-Q1"), 2, true);
        revision.status = QuoteStatus::Approved;
        repo.save(revision).await.expect("update revision");

        let chain = repo.find_chain(&QuoteId("LEAD-77-Q1".to_string())).await.expect("chain");
        let ids = chain.iter().map(|quote| quote.id.0.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["LEAD-77-Q1", "LEAD-77-Q2"]);
        assert_eq!(chain[1].status, QuoteStatus::Approved);

        let total: String = sqlx::query_scalar("SELECT total FROM quote WHERE id = 'LEAD-77-Q2'")
            .fetch_one(&pool)
            .await
            .expect("total");
        assert_eq!(total, chain[1].summary.total.to_string());
    }

    #[tokio::test]
    async fn quotes_require_a_stored_lead() {
        let repo = SqlQuoteRepository::new(pool_with_lead().await);
        let mut orphan = quote("LEAD-99-Q1", None, 1, true);
        orphan.lead_id = LeadId("LEAD-99".to_string());
        orphan.root_quote_id = orphan.id.clone();

        assert!(repo.save(orphan).await.is_err());
        let listed = repo.list_for_lead(&LeadId("LEAD-77".to_string())).await.expect("list");
        assert!(listed.is_empty());
    }
}
