use super::*;

use chrono::{Duration, TimeZone, Utc};

fn fixed_now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["cadence-cli"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}

#[test]
fn parses_migrate_command() {
    let cli = Cli::try_parse_from(["cadence-cli", "migrate"]).expect("expected valid cli args");
    assert!(matches!(cli.command, Some(Commands::Migrate)));
}

#[test]
fn parses_due_with_last_run() {
    let cli = Cli::try_parse_from([
        "cadence-cli",
        "due",
        "--tier",
        "growth",
        "--last-run",
        "2026-03-01T00:00:00Z",
    ])
    .expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Due { ref tier, last_run: Some(ref last) })
            if tier == "growth" && last == "2026-03-01T00:00:00Z"
    ));
}

#[test]
fn due_requires_tier() {
    assert!(Cli::try_parse_from(["cadence-cli", "due"]).is_err());
}

#[test]
fn parses_tenant_add() {
    let cli = Cli::try_parse_from(["cadence-cli", "tenant", "add", "shop-a", "enterprise"])
        .expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Tenant {
            command: TenantCommands::Add { ref id, ref tier }
        }) if id == "shop-a" && tier == "enterprise"
    ));
}

#[test]
fn parses_status_with_global_database_url() {
    let cli = Cli::try_parse_from([
        "cadence-cli",
        "status",
        "shop-a",
        "--database-url",
        "postgres://localhost/cadence",
    ])
    .expect("expected valid cli args");

    assert_eq!(
        cli.database_url.as_deref(),
        Some("postgres://localhost/cadence")
    );
    assert!(matches!(cli.command, Some(Commands::Status { ref tenant }) if tenant == "shop-a"));
}

#[test]
fn due_verdict_for_never_run_tenant() {
    let table = cadence_core::TierCadenceTable::default();
    let line = tiers::due_verdict(&table, "enterprise", None, fixed_now());
    assert_eq!(line, "enterprise: due (interval 2h, never run)");
}

#[test]
fn due_verdict_respects_interval() {
    let table = cadence_core::TierCadenceTable::default();
    let now = fixed_now();
    let recent = (now - Duration::hours(23)).to_rfc3339();
    let line = tiers::due_verdict(&table, "growth", Some(&recent), now);
    assert!(line.starts_with("growth: not due"), "{line}");
    assert!(line.contains("23.00h since last run"), "{line}");
}

#[test]
fn due_verdict_notes_unknown_tier_fallback() {
    let table = cadence_core::TierCadenceTable::default();
    let line = tiers::due_verdict(&table, "platinum", None, fixed_now());
    assert!(line.starts_with("starter: due"), "{line}");
    assert!(line.ends_with("unknown tier 'platinum', using fallback"), "{line}");
}
