use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use loomline_core::audit::AuditEvent;
use loomline_core::domain::catalog::{CatalogItem, CatalogItemId};
use loomline_core::domain::lead::{Lead, LeadId};
use loomline_core::domain::quote::{Quote, QuoteId};
use loomline_core::flows::LeadStatus;

pub mod audit;
pub mod catalog;
pub mod lead;
pub mod quote;

pub use audit::SqlAuditEventRepository;
pub use catalog::SqlCatalogRepository;
pub use lead::SqlLeadRepository;
pub use quote::SqlQuoteRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("workspace error: {0}")]
    Workspace(#[from] loomline_core::repository::RepositoryError),
}

impl From<RepositoryError> for loomline_core::repository::RepositoryError {
    fn from(value: RepositoryError) -> Self {
        Self::Storage(value.to_string())
    }
}

#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn list_items(&self) -> Result<Vec<CatalogItem>, RepositoryError>;
    async fn find_by_id(&self, id: &CatalogItemId) -> Result<Option<CatalogItem>, RepositoryError>;
    async fn save(&self, item: CatalogItem) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait LeadRepository: Send + Sync {
    async fn find_by_id(&self, id: &LeadId) -> Result<Option<Lead>, RepositoryError>;
    async fn list(&self, status: Option<LeadStatus>) -> Result<Vec<Lead>, RepositoryError>;
    async fn save(&self, lead: Lead) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait QuoteRepository: Send + Sync {
    async fn find_by_id(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError>;
    async fn find_chain(&self, root_quote_id: &QuoteId) -> Result<Vec<Quote>, RepositoryError>;
    async fn list_for_lead(&self, lead_id: &LeadId) -> Result<Vec<Quote>, RepositoryError>;
    async fn save(&self, quote: Quote) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait AuditEventRepository: Send + Sync {
    async fn append(&self, event: AuditEvent) -> Result<(), RepositoryError>;
    async fn list_for_lead(&self, lead_id: &LeadId) -> Result<Vec<AuditEvent>, RepositoryError>;
}

pub(crate) fn decode_error(column: &str, error: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Decode(format!("{column}: {error}"))
}

pub(crate) fn parse_decimal(column: &str, value: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(value).map_err(|error| decode_error(column, error))
}

pub(crate) fn parse_optional_decimal(
    column: &str,
    value: Option<String>,
) -> Result<Option<Decimal>, RepositoryError> {
    value.map(|value| parse_decimal(column, &value)).transpose()
}

pub(crate) fn parse_timestamp(
    column: &str,
    value: &str,
) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .map_err(|error| decode_error(column, error))
}

pub(crate) fn parse_optional_timestamp(
    column: &str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    value.map(|value| parse_timestamp(column, &value)).transpose()
}

pub(crate) fn parse_json<T>(column: &str, value: &str) -> Result<T, RepositoryError>
where
    T: DeserializeOwned,
{
    serde_json::from_str(value).map_err(|error| decode_error(column, error))
}

pub(crate) fn to_json<T>(column: &str, value: &T) -> Result<String, RepositoryError>
where
    T: Serialize + ?Sized,
{
    serde_json::to_string(value).map_err(|error| decode_error(column, error))
}

/// Decodes a snake_case enum stored as plain text through its serde form.
pub(crate) fn parse_enum<T>(column: &str, value: &str) -> Result<T, RepositoryError>
where
    T: DeserializeOwned,
{
    serde_json::from_value(serde_json::Value::String(value.to_string()))
        .map_err(|error| decode_error(column, error))
}

pub(crate) fn get_column<'r, T>(
    row: &'r sqlx::sqlite::SqliteRow,
    column: &str,
) -> Result<T, RepositoryError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    use sqlx::Row;

    row.try_get(column).map_err(|error| decode_error(column, error))
}

#[cfg(test)]
mod tests {
    use loomline_core::domain::catalog::BusinessModel;
    use loomline_core::domain::quote::QuoteStatus;
    use loomline_core::flows::LeadStatus;
    use rust_decimal::Decimal;

    use super::{parse_decimal, parse_enum, parse_timestamp, RepositoryError};

    #[test]
    fn enums_decode_from_their_serde_names() {
        assert_eq!(
            parse_enum::<LeadStatus>("status", "verbally_approved").expect("lead status"),
            LeadStatus::VerballyApproved
        );
        assert_eq!(
            parse_enum::<BusinessModel>("model", "job_work").expect("model"),
            BusinessModel::JobWork
        );
        assert_eq!(
            parse_enum::<QuoteStatus>("status", "superseded").expect("quote status"),
            QuoteStatus::Superseded
        );
        assert!(parse_enum::<QuoteStatus>("status", "lost").is_err());
    }

    #[test]
    fn decode_errors_name_the_column() {
        let error = parse_decimal("total", "twelve").expect_err("bad decimal");
        assert!(matches!(
            error,
            RepositoryError::Decode(ref message) if message.starts_with("total:")
        ));

        assert!(parse_timestamp("created_at", "yesterday").is_err());
        assert_eq!(parse_decimal("rate", "82.50").expect("decimal"), Decimal::new(8250, 2));
    }
}
