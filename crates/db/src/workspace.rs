use loomline_core::audit::AuditEvent;
use loomline_core::domain::lead::LeadId;
use loomline_core::domain::quote::{Quote, QuoteId};
use loomline_core::repository::{InMemorySalesRepository, SalesRepository};
use serde::Serialize;
use tracing::debug;

use crate::repositories::audit::insert_audit_event;
use crate::repositories::lead::{row_to_lead, upsert_lead, LEAD_COLUMNS};
use crate::repositories::quote::{quotes_for_lead, upsert_quote};
use crate::repositories::RepositoryError;
use crate::DbPool;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CommitSummary {
    pub leads: usize,
    pub quotes: usize,
    pub audit_events: usize,
}

/// Unit of work between the synchronous sales core and SQLite.
///
/// A lead and all of its quotes are loaded into an in-memory repository that
/// the revision manager works against; [`SalesWorkspace::commit`] then writes
/// every touched record and the drained audit trail in one transaction.
pub struct SalesWorkspace {
    pool: DbPool,
    repository: InMemorySalesRepository,
}

impl SalesWorkspace {
    pub fn new(pool: DbPool) -> Self {
        Self { pool, repository: InMemorySalesRepository::default() }
    }

    /// Shared handle: clones see the same records.
    pub fn repository(&self) -> &InMemorySalesRepository {
        &self.repository
    }

    /// Returns `false` when the lead is not stored.
    pub async fn load_lead(&self, lead_id: &LeadId) -> Result<bool, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {LEAD_COLUMNS} FROM lead WHERE id = ?"))
            .bind(&lead_id.0)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(false);
        };
        let lead = row_to_lead(&row)?;
        let quotes = quotes_for_lead(&self.pool, lead_id).await?;
        debug!(lead_id = %lead_id, quote_count = quotes.len(), "workspace loaded lead");

        self.repository.commit(vec![lead], quotes)?;
        Ok(true)
    }

    /// Loads the lead owning `quote_id`, returning its id.
    pub async fn load_lead_for_quote(
        &self,
        quote_id: &QuoteId,
    ) -> Result<Option<LeadId>, RepositoryError> {
        let lead_id: Option<String> = sqlx::query_scalar("SELECT lead_id FROM quote WHERE id = ?")
            .bind(&quote_id.0)
            .fetch_optional(&self.pool)
            .await?;

        match lead_id {
            Some(lead_id) => {
                let lead_id = LeadId(lead_id);
                Ok(self.load_lead(&lead_id).await?.then_some(lead_id))
            }
            None => Ok(None),
        }
    }

    /// Writes leads first, then superseded quotes, then active ones, so the
    /// one-active-quote-per-chain index and the parent reference hold at every
    /// statement.
    pub async fn commit(&self, events: &[AuditEvent]) -> Result<CommitSummary, RepositoryError> {
        let leads = self.repository.leads();
        let quotes = commit_order(self.repository.quotes());

        let mut tx = self.pool.begin().await?;
        for lead in &leads {
            upsert_lead(&mut *tx, lead).await?;
        }
        for quote in &quotes {
            upsert_quote(&mut *tx, quote).await?;
        }
        for event in events {
            insert_audit_event(&mut *tx, event).await?;
        }
        tx.commit().await?;

        let summary =
            CommitSummary { leads: leads.len(), quotes: quotes.len(), audit_events: events.len() };
        debug!(
            leads = summary.leads,
            quotes = summary.quotes,
            audit_events = summary.audit_events,
            "workspace committed"
        );
        Ok(summary)
    }
}

fn commit_order(mut quotes: Vec<Quote>) -> Vec<Quote> {
    quotes.sort_by(|left, right| {
        left.is_active
            .cmp(&right.is_active)
            .then_with(|| left.root_quote_id.cmp(&right.root_quote_id))
            .then_with(|| left.revision_number.cmp(&right.revision_number))
    });
    quotes
}
