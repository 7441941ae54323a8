use std::collections::BTreeMap;

use sqlx::sqlite::SqliteRow;

use loomline_core::cpq::catalog::Catalog;
use loomline_core::domain::catalog::{BusinessModel, CatalogItem, CatalogItemId, PricingTier};

use super::{
    get_column, parse_decimal, parse_enum, parse_optional_decimal, CatalogRepository,
    RepositoryError,
};
use crate::DbPool;

type TierSchedules = BTreeMap<CatalogItemId, Vec<(BusinessModel, PricingTier)>>;

pub struct SqlCatalogRepository {
    pool: DbPool,
}

impl SqlCatalogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Snapshot of the whole catalog for the synchronous pricing engine.
    pub async fn load_catalog(&self) -> Result<Catalog, RepositoryError> {
        Ok(Catalog::new(self.list_items().await?))
    }

    async fn tiers_for(
        &self,
        item_id: Option<&CatalogItemId>,
    ) -> Result<TierSchedules, RepositoryError> {
        let rows: Vec<SqliteRow> = match item_id {
            Some(item_id) => {
                sqlx::query(
                    "SELECT catalog_item_id, business_model, minimum_quantity, base_rate, unit
                     FROM pricing_tier
                     WHERE catalog_item_id = ?
                     ORDER BY catalog_item_id, business_model, position",
                )
                .bind(&item_id.0)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT catalog_item_id, business_model, minimum_quantity, base_rate, unit
                     FROM pricing_tier
                     ORDER BY catalog_item_id, business_model, position",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut tiers = TierSchedules::new();
        for row in &rows {
            let item_id: String = get_column(row, "catalog_item_id")?;
            let model: String = get_column(row, "business_model")?;
            let minimum: String = get_column(row, "minimum_quantity")?;
            let rate: String = get_column(row, "base_rate")?;
            let unit: String = get_column(row, "unit")?;

            tiers.entry(CatalogItemId(item_id)).or_default().push((
                parse_enum("business_model", &model)?,
                PricingTier {
                    minimum_quantity: parse_decimal("minimum_quantity", &minimum)?,
                    base_rate: parse_decimal("base_rate", &rate)?,
                    unit,
                },
            ));
        }
        Ok(tiers)
    }
}

fn row_to_item(row: &SqliteRow, tiers: &mut TierSchedules) -> Result<CatalogItem, RepositoryError> {
    let id = CatalogItemId(get_column::<String>(row, "id")?);
    let name: String = get_column(row, "name")?;
    let minimum: Option<String> = get_column(row, "minimum_order_quantity")?;
    let maximum: Option<String> = get_column(row, "maximum_order_quantity")?;

    let mut sales_tiers = Vec::new();
    let mut job_work_tiers = Vec::new();
    for (model, tier) in tiers.remove(&id).unwrap_or_default() {
        match model {
            BusinessModel::Sales => sales_tiers.push(tier),
            BusinessModel::JobWork => job_work_tiers.push(tier),
        }
    }

    Ok(CatalogItem {
        id,
        name,
        sales_tiers,
        job_work_tiers,
        minimum_order_quantity: parse_optional_decimal("minimum_order_quantity", minimum)?,
        maximum_order_quantity: parse_optional_decimal("maximum_order_quantity", maximum)?,
    })
}

#[async_trait::async_trait]
impl CatalogRepository for SqlCatalogRepository {
    async fn list_items(&self) -> Result<Vec<CatalogItem>, RepositoryError> {
        let rows: Vec<SqliteRow> = sqlx::query(
            "SELECT id, name, minimum_order_quantity, maximum_order_quantity
             FROM catalog_item ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut tiers = self.tiers_for(None).await?;
        rows.iter().map(|row| row_to_item(row, &mut tiers)).collect()
    }

    async fn find_by_id(&self, id: &CatalogItemId) -> Result<Option<CatalogItem>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, name, minimum_order_quantity, maximum_order_quantity
             FROM catalog_item WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref row) => {
                let mut tiers = self.tiers_for(Some(id)).await?;
                Ok(Some(row_to_item(row, &mut tiers)?))
            }
            None => Ok(None),
        }
    }

    /// Replaces the item and its whole tier schedule.
    async fn save(&self, item: CatalogItem) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO catalog_item (id, name, minimum_order_quantity, maximum_order_quantity)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 minimum_order_quantity = excluded.minimum_order_quantity,
                 maximum_order_quantity = excluded.maximum_order_quantity",
        )
        .bind(&item.id.0)
        .bind(&item.name)
        .bind(item.minimum_order_quantity.map(|value| value.to_string()))
        .bind(item.maximum_order_quantity.map(|value| value.to_string()))
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM pricing_tier WHERE catalog_item_id = ?")
            .bind(&item.id.0)
            .execute(&mut *tx)
            .await?;

        let schedules = [
            (BusinessModel::Sales, &item.sales_tiers),
            (BusinessModel::JobWork, &item.job_work_tiers),
        ];
        for (model, tiers) in schedules {
            for (position, tier) in tiers.iter().enumerate() {
                sqlx::query(
                    "INSERT INTO pricing_tier (catalog_item_id, business_model, position,
                                               minimum_quantity, base_rate, unit)
                     VALUES (?, ?, ?, ?, ?, ?)",
                )
                .bind(&item.id.0)
                .bind(model.as_str())
                .bind(position as i64)
                .bind(tier.minimum_quantity.to_string())
                .bind(tier.base_rate.to_string())
                .bind(&tier.unit)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }
}
