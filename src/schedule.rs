//! Scrape frequency scheduling
//!
//! Metrics are assigned to frequency tiers by name patterns. A blacklist
//! always wins. When a name matches several tiers, the slowest matching
//! tier governs, so a loose pattern in a fast tier cannot promote an
//! expensive metric to a faster cadence. Tiers share one clock: after a
//! cycle every elapsed tier advances at once, not per metric.

use crate::{Error, Result};
use regex::Regex;
use std::collections::BTreeMap;

/// Boundary policy for "has the tier interval elapsed".
///
/// The original exporter uses `>=`; some deployments run the strict `>`
/// variant. This is a compatibility knob, not a behavioral improvement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierBoundary {
    /// `now - last_fired >= interval` (default)
    Inclusive,
    /// `now - last_fired > interval`
    Exclusive,
}

struct Tier {
    interval_ms: i64,
    patterns: Vec<Regex>,
    last_fired_ms: i64,
}

/// Decides whether a metric is due for scraping at a point in time.
pub struct ScrapeScheduler {
    blacklist: Vec<Regex>,
    /// Sorted ascending by interval; walked in reverse for matching.
    tiers: Vec<Tier>,
    boundary: TierBoundary,
}

impl ScrapeScheduler {
    /// Build a scheduler from blacklist patterns and a map of
    /// interval-in-seconds to name patterns. Patterns are matched against
    /// the whole canonical metric name.
    pub fn new(
        blacklist: &[String],
        frequencies_sec: &BTreeMap<u64, Vec<String>>,
        boundary: TierBoundary,
    ) -> Result<Self> {
        if frequencies_sec.is_empty() {
            return Err(Error::Config(
                "at least one scrape frequency tier is required".to_string(),
            ));
        }

        let blacklist = blacklist
            .iter()
            .map(|p| compile_anchored(p))
            .collect::<Result<Vec<_>>>()?;

        // BTreeMap iteration order keeps tiers sorted by interval.
        let mut tiers = Vec::with_capacity(frequencies_sec.len());
        for (&interval_sec, patterns) in frequencies_sec {
            tiers.push(Tier {
                interval_ms: interval_sec as i64 * 1000,
                patterns: patterns
                    .iter()
                    .map(|p| compile_anchored(p))
                    .collect::<Result<Vec<_>>>()?,
                // Epoch zero: every tier fires on the first cycle.
                last_fired_ms: 0,
            });
        }

        Ok(Self {
            blacklist,
            tiers,
            boundary,
        })
    }

    /// Should `metric_name` be scraped at `now_ms`?
    ///
    /// Blacklist wins unconditionally. Otherwise the slowest matching tier
    /// governs; a name matching no tier is never scraped.
    pub fn should_scrape(&self, metric_name: &str, now_ms: i64) -> bool {
        if self.is_blacklisted(metric_name) {
            return false;
        }

        for tier in self.tiers.iter().rev() {
            if tier.patterns.iter().any(|p| p.is_match(metric_name)) {
                return self.elapsed(now_ms - tier.last_fired_ms, tier.interval_ms);
            }
        }
        false
    }

    /// Whole-name blacklist check, used by the engine to drop entities
    /// before unrolling their attributes.
    pub fn is_blacklisted(&self, name: &str) -> bool {
        self.blacklist.iter().any(|p| p.is_match(name))
    }

    /// Advance every tier whose interval has elapsed. Called once at the
    /// end of each cycle; all metrics in a tier share the tier's clock.
    pub fn advance(&mut self, now_ms: i64) {
        let boundary = self.boundary;
        for tier in &mut self.tiers {
            let delta = now_ms - tier.last_fired_ms;
            let due = match boundary {
                TierBoundary::Inclusive => delta >= tier.interval_ms,
                TierBoundary::Exclusive => delta > tier.interval_ms,
            };
            if due {
                tier.last_fired_ms = now_ms;
            }
        }
    }

    /// The fastest tier interval; bounds the run loop sleep.
    pub fn min_interval_ms(&self) -> i64 {
        self.tiers.first().map(|t| t.interval_ms).unwrap_or(0)
    }

    fn elapsed(&self, delta_ms: i64, interval_ms: i64) -> bool {
        match self.boundary {
            TierBoundary::Inclusive => delta_ms >= interval_ms,
            TierBoundary::Exclusive => delta_ms > interval_ms,
        }
    }
}

/// Compile a pattern anchored to the whole string, matching the original
/// exporter's `Matcher.matches` semantics.
fn compile_anchored(pattern: &str) -> Result<Regex> {
    Ok(Regex::new(&format!("^(?:{})$", pattern))?)
}
