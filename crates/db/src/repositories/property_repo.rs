//! Repository for assessment roll properties.

use sqlx::PgPool;
use taxroll_core::property::ValidationStatus;
use taxroll_core::types::{DbId, Timestamp};

use crate::models::property::PropertyRow;

/// Column list for `properties` queries.
const PROPERTY_COLUMNS: &str = "id, parcel_number, county, situs_address, land_use_code, \
     levy_code, land_value, improvement_value, assessed_value, market_value, \
     tax_year, acreage, exemption_code, owner_name, last_sale_date, last_sale_price, \
     validation_status, open_issue_count, last_validated_at, created_at, updated_at";

/// Provides read and denormalized-status write operations for properties.
pub struct PropertyRepo;

impl PropertyRepo {
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<PropertyRow>, sqlx::Error> {
        let sql = format!("SELECT {PROPERTY_COLUMNS} FROM properties WHERE id = $1");
        sqlx::query_as::<_, PropertyRow>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_parcel(
        pool: &PgPool,
        parcel_number: &str,
    ) -> Result<Option<PropertyRow>, sqlx::Error> {
        let sql = format!("SELECT {PROPERTY_COLUMNS} FROM properties WHERE parcel_number = $1");
        sqlx::query_as::<_, PropertyRow>(&sql)
            .bind(parcel_number)
            .fetch_optional(pool)
            .await
    }

    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM properties")
            .fetch_one(pool)
            .await
    }

    /// Keyset page ordered by id; batch runs walk the whole roll with this
    /// instead of loading it into memory.
    pub async fn list_page(
        pool: &PgPool,
        after_id: DbId,
        limit: i64,
    ) -> Result<Vec<PropertyRow>, sqlx::Error> {
        let sql = format!(
            "SELECT {PROPERTY_COLUMNS} FROM properties \
             WHERE id > $1 ORDER BY id LIMIT $2"
        );
        sqlx::query_as::<_, PropertyRow>(&sql)
            .bind(after_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Offset page for the HTTP listing surface, optionally filtered by
    /// denormalized validation status.
    pub async fn list(
        pool: &PgPool,
        status: Option<ValidationStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PropertyRow>, sqlx::Error> {
        let sql = format!(
            "SELECT {PROPERTY_COLUMNS} FROM properties \
             WHERE ($1::TEXT IS NULL OR validation_status = $1) \
             ORDER BY id LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, PropertyRow>(&sql)
            .bind(status.map(|s| s.as_str()))
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Rewrite the denormalized validation fields. `last_validated_at` is
    /// passed through unchanged when the caller is only recomputing counts.
    pub async fn update_validation_status(
        pool: &PgPool,
        id: DbId,
        status: ValidationStatus,
        open_issue_count: i32,
        last_validated_at: Option<Timestamp>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE properties SET \
                validation_status = $2, \
                open_issue_count = $3, \
                last_validated_at = $4 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(open_issue_count)
        .bind(last_validated_at)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
