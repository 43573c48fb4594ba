//! YAML configuration
//!
//! Field names stay camelCase-compatible with the original exporter's
//! config files, e.g.:
//!
//! ```yaml
//! host: 127.0.0.1:8778
//! ssl: false
//! user: monitor
//! password: secret
//! listenAddress: 0.0.0.0
//! listenPort: 8080
//! blacklist:
//!   - org:apache:cassandra:db:.*
//! maxScrapFrequencyInSec:
//!   50:
//!     - .*
//!   3600:
//!     - .*:snapshotssize:.*
//! additionalLabelsFromEnvvars: "LABEL_(.*)"
//! ```

use crate::schedule::TierBoundary;
use crate::{Error, Result};
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

pub const DEFAULT_PATH: &str = "config.yml";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Management bridge address; comma-separated for multi-host fan-out.
    pub host: String,
    #[serde(default)]
    pub ssl: bool,
    pub user: Option<String>,
    pub password: Option<String>,
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
    pub listen_port: u16,
    /// Patterns for metrics that must never be scraped; matched against
    /// the whole canonical name.
    #[serde(default)]
    pub blacklist: Vec<String>,
    /// Scrape interval in seconds to the name patterns that tier governs.
    pub max_scrap_frequency_in_sec: BTreeMap<u64, Vec<String>>,
    /// Environment variable names matching this pattern become extra
    /// labels on every series.
    pub additional_labels_from_envvars: Option<String>,
    /// Compatibility knob: advance tiers on `>` instead of `>=`.
    #[serde(default)]
    pub strict_tier_boundary: bool,
}

fn default_listen_address() -> String {
    "0.0.0.0".to_string()
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("loading yaml config from {}", path.display());
        let raw = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::Config("host cannot be empty".to_string()));
        }
        if self.max_scrap_frequency_in_sec.is_empty() {
            return Err(Error::Config(
                "maxScrapFrequencyInSec needs at least one tier".to_string(),
            ));
        }
        if self.max_scrap_frequency_in_sec.keys().next() == Some(&0) {
            return Err(Error::Config(
                "scrape frequency intervals must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// One scrape pipeline is spawned per host.
    pub fn hosts(&self) -> Vec<String> {
        self.host
            .split(',')
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .collect()
    }

    pub fn tier_boundary(&self) -> TierBoundary {
        if self.strict_tier_boundary {
            TierBoundary::Exclusive
        } else {
            TierBoundary::Inclusive
        }
    }

    pub fn additional_labels_pattern(&self) -> Result<Option<Regex>> {
        match &self.additional_labels_from_envvars {
            Some(pattern) => Ok(Some(Regex::new(&format!("^(?:{})$", pattern))?)),
            None => Ok(None),
        }
    }
}

/// Extract extra label pairs from the environment: for each variable whose
/// name matches the pattern, the first capture group (or the full name if
/// the pattern has no groups) becomes the label name and the variable's
/// value the label value.
pub fn additional_labels_from_env(
    environment: impl IntoIterator<Item = (String, String)>,
    pattern: Option<&Regex>,
) -> Vec<(String, String)> {
    let Some(pattern) = pattern else {
        return Vec::new();
    };

    let mut labels: BTreeMap<String, String> = BTreeMap::new();
    for (key, value) in environment {
        if let Some(captures) = pattern.captures(&key) {
            let label = captures
                .get(1)
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| key.clone());
            labels.insert(label, value);
        }
    }
    labels.into_iter().collect()
}
