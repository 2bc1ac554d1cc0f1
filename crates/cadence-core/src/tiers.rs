use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Dispatch cadence and minimum run interval for one subscription tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierCadence {
    pub key: String,
    /// Six-field cron expression (seconds first) controlling how often the
    /// scheduler looks at this tier.
    pub cron: String,
    /// Minimum hours between two successful runs of the same tenant.
    pub min_interval_hours: f64,
}

impl TierCadence {
    fn new(key: &str, cron: &str, min_interval_hours: f64) -> Self {
        Self {
            key: key.to_string(),
            cron: cron.to_string(),
            min_interval_hours,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TiersFile {
    tiers: Vec<TierCadence>,
}

/// Tier lookup table, ordered from the cheapest tier (longest interval) to the
/// most expensive (shortest interval).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierCadenceTable {
    tiers: Vec<TierCadence>,
}

impl Default for TierCadenceTable {
    fn default() -> Self {
        Self {
            tiers: vec![
                TierCadence::new("starter", "0 0 3 * * *", 336.0),
                TierCadence::new("professional", "0 0 */6 * * *", 48.0),
                TierCadence::new("growth", "0 0 */3 * * *", 24.0),
                TierCadence::new("growth_extra", "0 0 * * * *", 12.0),
                TierCadence::new("enterprise", "0 */30 * * * *", 2.0),
            ],
        }
    }
}

impl TierCadenceTable {
    /// Build a table from tiers listed in ascending tier order.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if the list is empty, a key is blank
    /// or duplicated, a cron expression is blank, an interval is not positive,
    /// or intervals do not strictly decrease from one tier to the next.
    pub fn new(tiers: Vec<TierCadence>) -> Result<Self, ConfigError> {
        validate_tiers(&tiers)?;
        Ok(Self { tiers })
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&TierCadence> {
        self.tiers.iter().find(|t| t.key == key)
    }

    /// The tier with the longest interval, used for unknown tier keys.
    #[must_use]
    pub fn fallback(&self) -> &TierCadence {
        // Construction guarantees a non-empty, strictly decreasing table.
        &self.tiers[0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &TierCadence> {
        self.tiers.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }
}

/// Load and validate a tier table from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_tiers(path: &Path) -> Result<TierCadenceTable, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::TiersFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_tiers(&content)
}

fn parse_tiers(content: &str) -> Result<TierCadenceTable, ConfigError> {
    let file: TiersFile = serde_yaml::from_str(content)?;
    TierCadenceTable::new(file.tiers)
}

fn validate_tiers(tiers: &[TierCadence]) -> Result<(), ConfigError> {
    if tiers.is_empty() {
        return Err(ConfigError::Validation(
            "at least one tier must be defined".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    let mut previous: Option<&TierCadence> = None;

    for tier in tiers {
        if tier.key.trim().is_empty() {
            return Err(ConfigError::Validation(
                "tier key must be non-empty".to_string(),
            ));
        }

        if !seen.insert(tier.key.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate tier key: '{}'",
                tier.key
            )));
        }

        if tier.cron.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "tier '{}' has an empty cron expression",
                tier.key
            )));
        }

        if !(tier.min_interval_hours > 0.0 && tier.min_interval_hours.is_finite()) {
            return Err(ConfigError::Validation(format!(
                "tier '{}' has invalid min_interval_hours {}; must be positive",
                tier.key, tier.min_interval_hours
            )));
        }

        if let Some(prev) = previous {
            if tier.min_interval_hours >= prev.min_interval_hours {
                return Err(ConfigError::Validation(format!(
                    "tier '{}' interval {}h must be shorter than '{}' interval {}h",
                    tier.key, tier.min_interval_hours, prev.key, prev.min_interval_hours
                )));
            }
        }
        previous = Some(tier);
    }

    Ok(())
}
