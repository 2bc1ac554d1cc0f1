//! Offline tier commands: no database required.

use std::path::Path;

use cadence_core::{elapsed_hours, is_due_raw, TierCadence, TierCadenceTable};
use chrono::{DateTime, Utc};

/// Load the tier table from `path`, or the built-in table when `None`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or fails validation.
pub(crate) fn load_table(path: Option<&Path>) -> anyhow::Result<TierCadenceTable> {
    match path {
        Some(p) => Ok(cadence_core::load_tiers(p)?),
        None => Ok(TierCadenceTable::default()),
    }
}

pub(crate) fn run_tiers(table: &TierCadenceTable) {
    println!("{:<16}{:<18}MIN INTERVAL", "TIER", "CRON");
    for tier in table.iter() {
        println!(
            "{:<16}{:<18}{}h",
            tier.key, tier.cron, tier.min_interval_hours
        );
    }
}

/// Resolve a tier key the same way the scheduler does: unknown keys fall back
/// to the slowest tier.
pub(crate) fn resolve<'a>(table: &'a TierCadenceTable, key: &str) -> (&'a TierCadence, bool) {
    match table.get(key) {
        Some(tier) => (tier, false),
        None => (table.fallback(), true),
    }
}

/// One-line verdict for `due`, split out so it can be tested with a fixed clock.
pub(crate) fn due_verdict(
    table: &TierCadenceTable,
    tier_key: &str,
    last_run: Option<&str>,
    now: DateTime<Utc>,
) -> String {
    let (tier, fell_back) = resolve(table, tier_key);
    let due = is_due_raw(last_run, tier.min_interval_hours, now);

    let parsed = last_run
        .and_then(|raw| DateTime::parse_from_rfc3339(raw.trim()).ok())
        .map(|dt| dt.with_timezone(&Utc));
    let elapsed = parsed.map_or_else(
        || "never run".to_string(),
        |last| format!("{:.2}h since last run", elapsed_hours(last, now)),
    );

    let note = if fell_back {
        format!("; unknown tier '{tier_key}', using fallback")
    } else {
        String::new()
    };

    format!(
        "{}: {} (interval {}h, {elapsed}){note}",
        tier.key,
        if due { "due" } else { "not due" },
        tier.min_interval_hours
    )
}

pub(crate) fn run_due(
    table: &TierCadenceTable,
    tier_key: &str,
    last_run: Option<&str>,
    now: DateTime<Utc>,
) {
    println!("{}", due_verdict(table, tier_key, last_run, now));
}
