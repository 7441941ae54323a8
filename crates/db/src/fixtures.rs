use serde::Serialize;
use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Canonical demo leads and what the seed must leave behind for each.
const SEED_LEADS: &[SeedLeadContract] = &[
    SeedLeadContract {
        lead_id: "LEAD-DEMO-001",
        customer_name: "Sutlej Weaves",
        business_model: "sales",
        conversion_status: "active_lead",
        requested_item_ids: &["cotton-poplin"],
        quote_ids: &[],
        active_quote_id: None,
        active_quote_total: None,
        expected_audit_events: &[],
        description: "Fresh inquiry with no quote yet",
    },
    SeedLeadContract {
        lead_id: "LEAD-DEMO-002",
        customer_name: "Kaveri Mills",
        business_model: "job_work",
        conversion_status: "quote_sent",
        requested_item_ids: &["greige-sheeting"],
        quote_ids: &["LEAD-DEMO-002-Q1"],
        active_quote_id: Some("LEAD-DEMO-002-Q1"),
        active_quote_total: Some("84960"),
        expected_audit_events: &["quote.generated"],
        description: "Job-work quote sent to the customer",
    },
    SeedLeadContract {
        lead_id: "LEAD-DEMO-003",
        customer_name: "Tapti Spinners",
        business_model: "sales",
        conversion_status: "negotiation",
        requested_item_ids: &["denim-12oz"],
        quote_ids: &["LEAD-DEMO-003-Q1", "LEAD-DEMO-003-Q2"],
        active_quote_id: Some("LEAD-DEMO-003-Q2"),
        active_quote_total: Some("280368"),
        expected_audit_events: &["quote.generated", "quote.revised"],
        description: "Negotiation with a revised bulk quote",
    },
];

const SEED_CATALOG_ITEM_IDS: &[&str] = &[
    "cotton-poplin",
    "cotton-cambric",
    "rayon-slub",
    "denim-12oz",
    "viscose-twill",
    "greige-sheeting",
];

const SEED_AUDIT_EVENT_IDS: &[&str] = &["ae-demo-001", "ae-demo-002", "ae-demo-003"];

/// Demo catalog and sales pipeline.
///
/// Loads six fabrics with sales and job-work tier schedules plus three leads:
/// one fresh inquiry, one with a quote sent, and one in negotiation on a
/// revised quote.
pub struct DemoSeedDataset;

impl DemoSeedDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_seed_data.sql");

    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;

        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        let leads_seeded = SEED_LEADS
            .iter()
            .map(|lead| LeadSeedInfo {
                lead_id: lead.lead_id,
                conversion_status: lead.conversion_status,
                description: lead.description,
            })
            .collect::<Vec<_>>();

        Ok(SeedResult { catalog_items_seeded: SEED_CATALOG_ITEM_IDS.len(), leads_seeded })
    }

    /// Verify that seed data exists and matches the contract.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        let quoted_items = sql_array_from_ids(SEED_CATALOG_ITEM_IDS);
        let tiered_items: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(DISTINCT catalog_item_id) FROM pricing_tier
             WHERE catalog_item_id IN {quoted_items}"
        ))
        .fetch_one(pool)
        .await?;
        let expected_items = SEED_CATALOG_ITEM_IDS.len() as i64;
        checks.push(("catalog-tiers".to_string(), tiered_items == expected_items));

        let quoted_audits = sql_array_from_ids(SEED_AUDIT_EVENT_IDS);
        let audit_count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM audit_event WHERE id IN {quoted_audits}"
        ))
        .fetch_one(pool)
        .await?;
        let expected_audits = SEED_AUDIT_EVENT_IDS.len() as i64;
        checks.push(("audit-events".to_string(), audit_count == expected_audits));

        for lead in SEED_LEADS {
            checks.push((format!("{}-status", lead.lead_id), Self::verify_lead(pool, lead).await?));
            checks
                .push((format!("{}-quotes", lead.lead_id), Self::verify_quotes(pool, lead).await?));
            checks.push((
                format!("{}-audit", lead.lead_id),
                Self::verify_audit_events(pool, lead).await?,
            ));
        }

        let all_present = checks.iter().all(|(_, passed)| *passed);
        Ok(VerificationResult { all_present, checks })
    }

    async fn verify_lead(pool: &DbPool, lead: &SeedLeadContract) -> Result<bool, RepositoryError> {
        let row = sqlx::query_as::<_, (String, String, String, String, Option<String>)>(
            "SELECT customer_name, business_model, conversion_status, requested_items_json,
                    active_quote_id
             FROM lead WHERE id = ?1",
        )
        .bind(lead.lead_id)
        .fetch_optional(pool)
        .await?;
        let Some((customer_name, business_model, status, requested_json, active_quote_id)) = row
        else {
            return Ok(false);
        };

        let requested: Vec<serde_json::Value> = serde_json::from_str(&requested_json)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;
        let requested_ids = requested
            .iter()
            .filter_map(|item| item.get("catalog_item_id").and_then(serde_json::Value::as_str))
            .map(String::from)
            .collect::<Vec<_>>();

        Ok(customer_name == lead.customer_name
            && business_model == lead.business_model
            && status == lead.conversion_status
            && active_quote_id.as_deref() == lead.active_quote_id
            && json_string_list_matches(&requested_ids, lead.requested_item_ids))
    }

    async fn verify_quotes(
        pool: &DbPool,
        lead: &SeedLeadContract,
    ) -> Result<bool, RepositoryError> {
        let rows = sqlx::query_as::<_, (String, bool, String)>(
            "SELECT id, is_active, total FROM quote WHERE lead_id = ?1 ORDER BY revision_number",
        )
        .bind(lead.lead_id)
        .fetch_all(pool)
        .await?;

        let ids = rows.iter().map(|(id, _, _)| id.clone()).collect::<Vec<_>>();
        if !json_string_list_matches(&ids, lead.quote_ids) {
            return Ok(false);
        }

        let active = rows.iter().filter(|(_, is_active, _)| *is_active).collect::<Vec<_>>();
        match (lead.active_quote_id, lead.active_quote_total) {
            (Some(quote_id), Some(total)) => {
                Ok(active.len() == 1 && active[0].0 == quote_id && active[0].2 == total)
            }
            _ => Ok(active.is_empty()),
        }
    }

    async fn verify_audit_events(
        pool: &DbPool,
        lead: &SeedLeadContract,
    ) -> Result<bool, RepositoryError> {
        let quoted_audits = sql_array_from_ids(SEED_AUDIT_EVENT_IDS);
        let event_types: Vec<String> = sqlx::query_scalar(&format!(
            "SELECT event_type FROM audit_event
             WHERE lead_id = ?1 AND id IN {quoted_audits}
             ORDER BY id"
        ))
        .bind(lead.lead_id)
        .fetch_all(pool)
        .await?;

        Ok(json_string_list_matches(&event_types, lead.expected_audit_events))
    }

    /// Clean up seeded fixtures from a test database.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;

        let quoted_audits = sql_array_from_ids(SEED_AUDIT_EVENT_IDS);
        let quoted_leads =
            sql_array_from_ids(&SEED_LEADS.iter().map(|lead| lead.lead_id).collect::<Vec<_>>());
        let quoted_items = sql_array_from_ids(SEED_CATALOG_ITEM_IDS);

        sqlx::query(&format!("DELETE FROM audit_event WHERE id IN {quoted_audits}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM quote WHERE lead_id IN {quoted_leads}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM lead WHERE id IN {quoted_leads}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM catalog_item WHERE id IN {quoted_items}"))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct SeedLeadContract {
    lead_id: &'static str,
    customer_name: &'static str,
    business_model: &'static str,
    conversion_status: &'static str,
    requested_item_ids: &'static [&'static str],
    quote_ids: &'static [&'static str],
    active_quote_id: Option<&'static str>,
    active_quote_total: Option<&'static str>,
    expected_audit_events: &'static [&'static str],
    description: &'static str,
}

fn json_string_list_matches(actual: &[String], expected: &[&str]) -> bool {
    actual.len() == expected.len() && actual.iter().zip(expected).all(|(a, b)| a == b)
}

fn sql_array_from_ids(ids: &[&str]) -> String {
    let quoted = ids.iter().map(|id| format!("'{}'", id)).collect::<Vec<_>>().join(",");
    format!("({quoted})")
}

#[derive(Debug, Serialize)]
pub struct SeedResult {
    pub catalog_items_seeded: usize,
    pub leads_seeded: Vec<LeadSeedInfo>,
}

#[derive(Debug, Serialize)]
pub struct LeadSeedInfo {
    pub lead_id: &'static str,
    pub conversion_status: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Serialize)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(String, bool)>,
}

#[cfg(test)]
mod tests {
    use loomline_core::domain::lead::LeadId;
    use loomline_core::domain::quote::QuoteId;
    use loomline_core::flows::LeadStatus;

    use super::*;
    use crate::repositories::{
        CatalogRepository, LeadRepository, QuoteRepository, SqlCatalogRepository,
        SqlLeadRepository, SqlQuoteRepository,
    };
    use crate::{connect_with_settings, migrations};

    async fn migrated_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30)
            .await
            .expect("connect to test database");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    #[test]
    fn sql_fixture_is_valid() {
        assert!(!DemoSeedDataset::SQL.is_empty());
    }

    #[tokio::test]
    async fn verify_seed_contract_and_idempotency() {
        let pool = migrated_pool().await;

        let first = DemoSeedDataset::load(&pool).await.expect("load seed fixtures");
        let first_verification = DemoSeedDataset::verify(&pool).await.expect("verify seed");
        assert!(first_verification.all_present, "{:?}", first_verification.checks);
        assert_eq!(first.leads_seeded.len(), 3);
        assert_eq!(first.catalog_items_seeded, 6);

        let second = DemoSeedDataset::load(&pool).await.expect("reload seed fixtures");
        let second_verification = DemoSeedDataset::verify(&pool).await.expect("re-verify seed");
        assert!(second_verification.all_present);
        assert_eq!(second.leads_seeded.len(), 3);
        assert_eq!(first_verification.checks, second_verification.checks);
    }

    #[tokio::test]
    async fn seeded_rows_decode_through_the_repositories() {
        let pool = migrated_pool().await;
        DemoSeedDataset::load(&pool).await.expect("load seed fixtures");

        let catalog = SqlCatalogRepository::new(pool.clone()).list_items().await.expect("catalog");
        assert_eq!(catalog.len(), 6);

        let lead = SqlLeadRepository::new(pool.clone())
            .find_by_id(&LeadId("LEAD-DEMO-003".to_string()))
            .await
            .expect("find lead")
            .expect("seeded lead");
        assert_eq!(lead.conversion_status(), LeadStatus::Negotiation);
        assert_eq!(lead.quote_count, 2);

        let chain = SqlQuoteRepository::new(pool)
            .find_chain(&QuoteId("LEAD-DEMO-003-Q1".to_string()))
            .await
            .expect("chain");
        assert_eq!(chain.len(), 2);
        assert!(!chain[0].is_active);
        assert_eq!(chain[1].parent_quote_id, Some(chain[0].id.clone()));
        assert_eq!(chain[1].summary.tax.total, rust_decimal::Decimal::from(42_768));
    }

    #[tokio::test]
    async fn clean_removes_every_seeded_row() {
        let pool = migrated_pool().await;
        DemoSeedDataset::load(&pool).await.expect("load seed fixtures");

        DemoSeedDataset::clean(&pool).await.expect("clean seed fixtures");

        let verification = DemoSeedDataset::verify(&pool).await.expect("verify after clean");
        assert!(!verification.all_present);
        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM pricing_tier")
            .fetch_one(&pool)
            .await
            .expect("count tiers");
        assert_eq!(remaining, 0);
    }

    #[test]
    fn seed_contract_json_matches_rust_seed_constants() {
        let contract: serde_json::Value =
            serde_json::from_str(include_str!("../../../config/fixtures/demo_seed_contract.json"))
                .expect("demo seed contract JSON must parse");

        assert_eq!(contract["seed_dataset"].as_str(), Some("deterministic_demo_sales_pipeline"));
        let contract_items = contract["catalog_item_ids"]
            .as_array()
            .expect("catalog_item_ids should be an array")
            .iter()
            .map(|value| value.as_str().unwrap_or_default().to_string())
            .collect::<Vec<_>>();
        assert!(json_string_list_matches(&contract_items, SEED_CATALOG_ITEM_IDS));

        let contract_leads = contract["leads"].as_array().expect("leads should be an array");
        assert_eq!(contract_leads.len(), SEED_LEADS.len());

        for lead in SEED_LEADS {
            let contract_lead = contract_leads
                .iter()
                .find(|candidate| candidate["lead_id"].as_str() == Some(lead.lead_id))
                .expect("contract should include every seeded lead");

            assert_eq!(contract_lead["customer_name"].as_str(), Some(lead.customer_name));
            assert_eq!(contract_lead["business_model"].as_str(), Some(lead.business_model));
            assert_eq!(contract_lead["conversion_status"].as_str(), Some(lead.conversion_status));
            assert_eq!(contract_lead["active_quote_id"].as_str(), lead.active_quote_id);
            assert_eq!(contract_lead["active_quote_total"].as_str(), lead.active_quote_total);
            assert_eq!(
                contract_lead["quote_ids"]
                    .as_array()
                    .expect("quote_ids should be an array")
                    .iter()
                    .map(|value| value.as_str().unwrap_or_default())
                    .collect::<Vec<_>>(),
                lead.quote_ids
            );
            assert_eq!(
                contract_lead["expected_audit_events"]
                    .as_array()
                    .expect("expected_audit_events should be an array")
                    .iter()
                    .map(|value| value.as_str().unwrap_or_default())
                    .collect::<Vec<_>>(),
                lead.expected_audit_events
            );
        }
    }
}
