//! Washington State assessment rule set.
//!
//! Statutory references are to the Revised Code of Washington (RCW)
//! Title 84 (property taxes) and the associated WAC land use codes.

use serde_json::json;

use super::RuleSeed;
use crate::validation::rules::{RuleCategory, Severity};

/// The Washington State rule set, seeded into the catalog at startup.
pub fn washington_rules() -> Vec<RuleSeed> {
    vec![
        RuleSeed {
            code: "WA-PARCEL-FORMAT",
            name: "Parcel number format",
            description: "Parcel numbers are 8 to 14 digits in county assessor extracts.",
            category: RuleCategory::Consistency,
            severity: Severity::Error,
            check_kind: "pattern",
            check_params: json!({ "field": "parcel_number", "pattern": "^[0-9]{8,14}$" }),
            reference: Some("RCW 84.40.160"),
        },
        RuleSeed {
            code: "WA-ASSESSED-REQUIRED",
            name: "Assessed value present",
            description: "Every listed property must carry an assessed value.",
            category: RuleCategory::Completeness,
            severity: Severity::Critical,
            check_kind: "required",
            check_params: json!({ "field": "assessed_value" }),
            reference: Some("RCW 84.40.020"),
        },
        RuleSeed {
            code: "WA-MARKET-REQUIRED",
            name: "Market value present",
            description: "True and fair market value must be recorded for ratio review.",
            category: RuleCategory::Completeness,
            severity: Severity::Error,
            check_kind: "required",
            check_params: json!({ "field": "market_value" }),
            reference: Some("RCW 84.40.030"),
        },
        RuleSeed {
            code: "WA-OWNER-REQUIRED",
            name: "Owner of record present",
            description: "The assessment roll lists the owner or reputed owner.",
            category: RuleCategory::Completeness,
            severity: Severity::Error,
            check_kind: "required",
            check_params: json!({ "field": "owner_name" }),
            reference: Some("RCW 84.40.020"),
        },
        RuleSeed {
            code: "WA-SITUS-REQUIRED",
            name: "Situs address present",
            description: "Situs address supports field review and taxpayer notices.",
            category: RuleCategory::Completeness,
            severity: Severity::Warning,
            check_kind: "required",
            check_params: json!({ "field": "situs_address" }),
            reference: None,
        },
        RuleSeed {
            code: "WA-ASSESSED-NONNEG",
            name: "Assessed value non-negative",
            description: "Assessed value cannot be negative.",
            category: RuleCategory::Regulatory,
            severity: Severity::Error,
            check_kind: "non_negative",
            check_params: json!({ "field": "assessed_value" }),
            reference: Some("RCW 84.40.030"),
        },
        RuleSeed {
            code: "WA-LAND-NONNEG",
            name: "Land value non-negative",
            description: "Land value component cannot be negative.",
            category: RuleCategory::Regulatory,
            severity: Severity::Error,
            check_kind: "non_negative",
            check_params: json!({ "field": "land_value" }),
            reference: Some("RCW 84.40.030"),
        },
        RuleSeed {
            code: "WA-IMPROVEMENT-NONNEG",
            name: "Improvement value non-negative",
            description: "Improvement value component cannot be negative.",
            category: RuleCategory::Regulatory,
            severity: Severity::Error,
            check_kind: "non_negative",
            check_params: json!({ "field": "improvement_value" }),
            reference: Some("RCW 84.40.030"),
        },
        RuleSeed {
            code: "WA-VALUE-SUM",
            name: "Land plus improvements equals assessed total",
            description:
                "Land and improvement components must sum to the assessed value (within $1 rounding).",
            category: RuleCategory::Consistency,
            severity: Severity::Error,
            check_kind: "sum_matches",
            check_params: json!({
                "components": ["land_value", "improvement_value"],
                "total": "assessed_value",
                "tolerance": 1.0
            }),
            reference: Some("RCW 84.40.045"),
        },
        RuleSeed {
            code: "WA-ASSESSMENT-RATIO",
            name: "Assessment ratio within review band",
            description:
                "Assessed value should track true and fair market value; ratios outside 0.9-1.1 are flagged for review.",
            category: RuleCategory::Regulatory,
            severity: Severity::Warning,
            check_kind: "ratio_within",
            check_params: json!({
                "numerator": "assessed_value",
                "denominator": "market_value",
                "min": 0.9,
                "max": 1.1
            }),
            reference: Some("RCW 84.40.030"),
        },
        RuleSeed {
            code: "WA-TAX-YEAR",
            name: "Tax year current",
            description: "Tax year must be within one year of the current assessment year.",
            category: RuleCategory::Consistency,
            severity: Severity::Error,
            check_kind: "year_within",
            check_params: json!({ "field": "tax_year", "past": 1, "future": 1 }),
            reference: None,
        },
        RuleSeed {
            code: "WA-LEVY-FORMAT",
            name: "Levy code format",
            description: "Levy codes are four-digit tax code area numbers.",
            category: RuleCategory::Consistency,
            severity: Severity::Warning,
            check_kind: "pattern",
            check_params: json!({ "field": "levy_code", "pattern": "^[0-9]{4}$" }),
            reference: Some("RCW 84.52.070"),
        },
        RuleSeed {
            code: "WA-LANDUSE-FORMAT",
            name: "Land use code format",
            description: "Land use codes follow the two- or three-digit DOR standard.",
            category: RuleCategory::Consistency,
            severity: Severity::Warning,
            check_kind: "pattern",
            check_params: json!({ "field": "land_use_code", "pattern": "^[0-9]{2,3}$" }),
            reference: Some("WAC 458-53-030"),
        },
        RuleSeed {
            code: "WA-EXEMPTION-CODE",
            name: "Exemption code vocabulary",
            description: "Exemption codes must come from the supported exemption programs.",
            category: RuleCategory::Regulatory,
            severity: Severity::Warning,
            check_kind: "one_of",
            check_params: json!({
                "field": "exemption_code",
                "values": ["EX-SENIOR", "EX-DISABILITY", "EX-NONPROFIT", "EX-GOV", "EX-FARM"]
            }),
            reference: Some("RCW 84.36"),
        },
        RuleSeed {
            code: "WA-SALE-DATE",
            name: "Sale date not in future",
            description: "A recorded sale cannot postdate the evaluation date.",
            category: RuleCategory::Consistency,
            severity: Severity::Error,
            check_kind: "date_not_in_future",
            check_params: json!({ "field": "last_sale_date" }),
            reference: None,
        },
        RuleSeed {
            code: "WA-SALE-PRICE-NONNEG",
            name: "Sale price non-negative",
            description: "A recorded sale price cannot be negative.",
            category: RuleCategory::Consistency,
            severity: Severity::Warning,
            check_kind: "non_negative",
            check_params: json!({ "field": "last_sale_price" }),
            reference: None,
        },
    ]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::checks::CheckKind;
    use std::collections::HashSet;

    #[test]
    fn seed_codes_are_unique() {
        let rules = washington_rules();
        let codes: HashSet<_> = rules.iter().map(|r| r.code).collect();
        assert_eq!(codes.len(), rules.len());
    }

    #[test]
    fn every_seed_compiles_cleanly() {
        for seed in washington_rules() {
            CheckKind::parse(&seed.check())
                .unwrap_or_else(|e| panic!("seed {} does not compile: {e}", seed.code));
        }
    }

    #[test]
    fn seed_matches_its_own_new_rule_shape() {
        let seed = &washington_rules()[0];
        let new_rule = seed.to_new_rule("system");
        assert_eq!(new_rule.code, seed.code);
        assert_eq!(new_rule.check, seed.check());
        assert!(new_rule.is_active);
    }
}
