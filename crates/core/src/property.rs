//! Assessment roll property records and their denormalized validation state.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Validation status
// ---------------------------------------------------------------------------

/// Denormalized validation outcome cached on the property record, so
/// list endpoints can filter without joining the issues table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    /// Never evaluated (or evaluated data has since changed).
    Unvalidated,
    /// Evaluated with zero outstanding issues.
    Validated,
    /// Evaluated with at least one outstanding issue.
    Invalid,
}

impl ValidationStatus {
    pub const ALL: &'static [ValidationStatus] = &[
        ValidationStatus::Unvalidated,
        ValidationStatus::Validated,
        ValidationStatus::Invalid,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStatus::Unvalidated => "unvalidated",
            ValidationStatus::Validated => "validated",
            ValidationStatus::Invalid => "invalid",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s {
            "unvalidated" => Ok(ValidationStatus::Unvalidated),
            "validated" => Ok(ValidationStatus::Validated),
            "invalid" => Ok(ValidationStatus::Invalid),
            other => Err(CoreError::Validation(format!(
                "Unknown validation status: '{other}'"
            ))),
        }
    }
}

/// Recompute the denormalized status from the outstanding issue count.
///
/// A property that has never been through a validation pass stays
/// `Unvalidated` even when it happens to have zero recorded issues.
pub fn compute_validation_status(outstanding_issues: i32, has_been_validated: bool) -> ValidationStatus {
    if !has_been_validated {
        ValidationStatus::Unvalidated
    } else if outstanding_issues > 0 {
        ValidationStatus::Invalid
    } else {
        ValidationStatus::Validated
    }
}

// ---------------------------------------------------------------------------
// Property record
// ---------------------------------------------------------------------------

/// A snapshot of one assessment roll row.
///
/// Monetary amounts are whole dollars. Optional fields are genuinely
/// optional in county extracts; completeness rules decide which ones a
/// jurisdiction requires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyRecord {
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
    pub validation_status: ValidationStatus,
    pub open_issue_count: i32,
    pub last_validated_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Default for PropertyRecord {
    fn default() -> Self {
        let now = chrono::Utc::now();
        PropertyRecord {
            id: 0,
            parcel_number: String::new(),
            county: String::new(),
            situs_address: None,
            land_use_code: None,
            levy_code: None,
            land_value: None,
            improvement_value: None,
            assessed_value: None,
            market_value: None,
            tax_year: None,
            acreage: None,
            exemption_code: None,
            owner_name: None,
            last_sale_date: None,
            last_sale_price: None,
            validation_status: ValidationStatus::Unvalidated,
            open_issue_count: 0,
            last_validated_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

// ---------------------------------------------------------------------------
// Field access for rule checks
// ---------------------------------------------------------------------------

/// The closed set of field names rule checks may reference.
pub const PROPERTY_FIELDS: &[&str] = &[
    "parcel_number",
    "county",
    "situs_address",
    "land_use_code",
    "levy_code",
    "land_value",
    "improvement_value",
    "assessed_value",
    "market_value",
    "tax_year",
    "acreage",
    "exemption_code",
    "owner_name",
    "last_sale_date",
    "last_sale_price",
];

/// Whether `name` is a field rule checks may reference.
pub fn is_property_field(name: &str) -> bool {
    PROPERTY_FIELDS.contains(&name)
}

/// A typed field value handed to rule checks.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Int(i64),
    Float(f64),
    Date(NaiveDate),
}

impl FieldValue {
    /// Numeric view, for comparisons. Text and dates have no numeric view.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int(v) => Some(*v as f64),
            FieldValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            FieldValue::Date(d) => Some(*d),
            _ => None,
        }
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Text(s) => write!(f, "'{s}'"),
            FieldValue::Int(v) => write!(f, "{v}"),
            FieldValue::Float(v) => write!(f, "{v}"),
            FieldValue::Date(d) => write!(f, "{d}"),
        }
    }
}

impl PropertyRecord {
    /// Look up a field by name.
    ///
    /// `Ok(None)` means the field exists but is null for this record.
    /// An unknown name is a configuration error — check definitions are
    /// validated against [`PROPERTY_FIELDS`] before they reach here.
    pub fn field(&self, name: &str) -> Result<Option<FieldValue>, CoreError> {
        let value = match name {
            "parcel_number" => Some(FieldValue::Text(self.parcel_number.clone())),
            "county" => Some(FieldValue::Text(self.county.clone())),
            "situs_address" => self.situs_address.clone().map(FieldValue::Text),
            "land_use_code" => self.land_use_code.clone().map(FieldValue::Text),
            "levy_code" => self.levy_code.clone().map(FieldValue::Text),
            "land_value" => self.land_value.map(FieldValue::Int),
            "improvement_value" => self.improvement_value.map(FieldValue::Int),
            "assessed_value" => self.assessed_value.map(FieldValue::Int),
            "market_value" => self.market_value.map(FieldValue::Int),
            "tax_year" => self.tax_year.map(|y| FieldValue::Int(y as i64)),
            "acreage" => self.acreage.map(FieldValue::Float),
            "exemption_code" => self.exemption_code.clone().map(FieldValue::Text),
            "owner_name" => self.owner_name.clone().map(FieldValue::Text),
            "last_sale_date" => self.last_sale_date.map(FieldValue::Date),
            "last_sale_price" => self.last_sale_price.map(FieldValue::Int),
            other => {
                return Err(CoreError::Configuration(format!(
                    "Unknown property field: '{other}'"
                )))
            }
        };
        Ok(value)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn status_round_trips_through_strings() {
        for status in ValidationStatus::ALL {
            assert_eq!(ValidationStatus::from_str(status.as_str()).unwrap(), *status);
        }
    }

    #[test]
    fn unknown_status_rejected() {
        assert_matches!(
            ValidationStatus::from_str("pending"),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn compute_status_unvalidated_without_run() {
        assert_eq!(
            compute_validation_status(0, false),
            ValidationStatus::Unvalidated
        );
    }

    #[test]
    fn compute_status_validated_when_clean() {
        assert_eq!(
            compute_validation_status(0, true),
            ValidationStatus::Validated
        );
    }

    #[test]
    fn compute_status_invalid_with_outstanding_issues() {
        assert_eq!(compute_validation_status(3, true), ValidationStatus::Invalid);
    }

    #[test]
    fn field_lookup_returns_typed_values() {
        let record = PropertyRecord {
            parcel_number: "1234567890".to_string(),
            assessed_value: Some(185_000),
            acreage: Some(0.25),
            ..Default::default()
        };
        assert_eq!(
            record.field("parcel_number").unwrap(),
            Some(FieldValue::Text("1234567890".to_string()))
        );
        assert_eq!(
            record.field("assessed_value").unwrap(),
            Some(FieldValue::Int(185_000))
        );
        assert_eq!(record.field("acreage").unwrap(), Some(FieldValue::Float(0.25)));
    }

    #[test]
    fn field_lookup_null_field_is_ok_none() {
        let record = PropertyRecord::default();
        assert_eq!(record.field("market_value").unwrap(), None);
    }

    #[test]
    fn field_lookup_unknown_name_is_configuration_error() {
        let record = PropertyRecord::default();
        assert_matches!(
            record.field("zoning_code"),
            Err(CoreError::Configuration(_))
        );
    }

    #[test]
    fn every_declared_field_resolves() {
        let record = PropertyRecord::default();
        for name in PROPERTY_FIELDS {
            assert!(record.field(name).is_ok(), "field '{name}' should resolve");
        }
    }
}
