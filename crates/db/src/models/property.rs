//! Row model for the `properties` table.

use chrono::NaiveDate;
use sqlx::FromRow;
use taxroll_core::error::CoreError;
use taxroll_core::property::{PropertyRecord, ValidationStatus};
use taxroll_core::types::{DbId, Timestamp};

/// A row from the `properties` table.
#[derive(Debug, Clone, FromRow)]
pub struct PropertyRow {
    pub id: DbId,
    pub parcel_number: String,
    pub county: String,
    pub situs_address: Option<String>,
    pub land_use_code: Option<String>,
    pub levy_code: Option<String>,
    pub land_value: Option<i64>,
    pub improvement_value: Option<i64>,
    pub assessed_value: Option<i64>,
    pub market_value: Option<i64>,
    pub tax_year: Option<i32>,
    pub acreage: Option<f64>,
    pub exemption_code: Option<String>,
    pub owner_name: Option<String>,
    pub last_sale_date: Option<NaiveDate>,
    pub last_sale_price: Option<i64>,
    pub validation_status: String,
    pub open_issue_count: i32,
    pub last_validated_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl PropertyRow {
    /// Convert to the domain record, parsing the stored status string.
    pub fn into_record(self) -> Result<PropertyRecord, CoreError> {
        let validation_status = ValidationStatus::from_str(&self.validation_status)
            .map_err(|e| CoreError::Internal(format!("Bad row for property {}: {e}", self.id)))?;
        Ok(PropertyRecord {
            id: self.id,
            parcel_number: self.parcel_number,
            county: self.county,
            situs_address: self.situs_address,
            land_use_code: self.land_use_code,
            levy_code: self.levy_code,
            land_value: self.land_value,
            improvement_value: self.improvement_value,
            assessed_value: self.assessed_value,
            market_value: self.market_value,
            tax_year: self.tax_year,
            acreage: self.acreage,
            exemption_code: self.exemption_code,
            owner_name: self.owner_name,
            last_sale_date: self.last_sale_date,
            last_sale_price: self.last_sale_price,
            validation_status,
            open_issue_count: self.open_issue_count,
            last_validated_at: self.last_validated_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
