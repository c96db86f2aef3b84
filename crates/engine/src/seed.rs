//! Startup seeding of the jurisdiction rule set.

use taxroll_core::jurisdiction::washington::washington_rules;

use crate::catalog::{RuleCatalog, SeedReport};
use crate::EngineResult;

/// Install the Washington State rule set through the idempotent catalog
/// path. Callers decide whether a failure is fatal; at API startup it is
/// logged and the server keeps serving (a later deploy or manual seeding
/// can retry safely).
pub async fn initialize_jurisdiction_rules(
    catalog: &RuleCatalog,
    created_by: &str,
) -> EngineResult<SeedReport> {
    let seeds = washington_rules();
    let report = catalog.seed_rules(&seeds, created_by).await?;
    tracing::info!(
        inserted = report.inserted,
        unchanged = report.unchanged,
        kept = report.kept,
        "jurisdiction rules seeded"
    );
    Ok(report)
}
