//! Raw attribute value decoding and label attribution
//!
//! [`decode`] turns one raw attribute value into zero or more
//! `(metric name, f64)` pairs. It never fails: unrecognized shapes are
//! dropped with a diagnostic. Estimated histograms are the one case where
//! scheduling binds late: the scrape decision was taken on the raw
//! attribute's name, but each derived percentile name may belong to a
//! different tier or be blacklisted on its own, so every derived name is
//! re-checked against the scheduler before being emitted.

use crate::histogram::{self, PERCENTILES};
use crate::schedule::ScrapeScheduler;
use crate::source::{AttrValue, TypeTag};
use crate::topology::NodeTopology;
use tracing::debug;

/// Decode one attribute value into its metric pairs.
///
/// `now_ms` is the cycle timestamp used for the derived-name scheduler
/// re-checks.
pub fn decode(
    metric_name: &str,
    type_tag: &TypeTag,
    value: AttrValue,
    scheduler: &ScrapeScheduler,
    now_ms: i64,
) -> Vec<(String, f64)> {
    match (type_tag, value) {
        (TypeTag::Numeric, value) => match value.as_f64() {
            Some(v) => vec![(metric_name.to_string(), v)],
            None => drop_value(metric_name, type_tag),
        },

        (TypeTag::Boolean, AttrValue::Bool(b)) => {
            vec![(metric_name.to_string(), if b { 1.0 } else { 0.0 })]
        }

        // Collections export their cardinality only.
        (TypeTag::List, AttrValue::List(items)) => {
            vec![(metric_name.to_string(), items.len() as f64)]
        }
        (TypeTag::List, AttrValue::LongArray(items)) => {
            vec![(metric_name.to_string(), items.len() as f64)]
        }

        // One pair per numeric sub-field; non-numeric sub-fields skipped.
        (TypeTag::Composite, AttrValue::Composite(fields)) => fields
            .into_iter()
            .filter_map(|(field, v)| {
                v.as_f64()
                    .map(|v| (format!("{}:{}", metric_name, field.to_lowercase()), v))
            })
            .collect(),

        // Opaque values are classified by shape.
        (TypeTag::Object, AttrValue::Text(s)) => {
            // Most attributes declared as plain objects are doubles in
            // disguise.
            if s.chars().next().is_some_and(|c| c.is_ascii_digit()) {
                match s.parse::<f64>() {
                    Ok(v) => vec![(metric_name.to_string(), v)],
                    Err(_) => drop_value(metric_name, type_tag),
                }
            } else {
                drop_value(metric_name, type_tag)
            }
        }

        (TypeTag::Object, AttrValue::NestedCounts(groups)) => {
            let mut pairs = Vec::new();
            for (keyspace, tables) in &groups {
                for (table, count) in tables {
                    let suffix = format!("{}:{}:value", keyspace, table);
                    pairs.push((
                        rewrite_value_suffix(metric_name, &suffix),
                        *count as f64,
                    ));
                }
            }
            pairs
        }

        (TypeTag::Object, AttrValue::LongArray(counts)) => {
            let summary = histogram::reconstruct(&counts);
            let mut pairs = Vec::with_capacity(7);
            for (&p, v) in PERCENTILES.iter().zip(summary.percentiles()) {
                let name =
                    rewrite_value_suffix(metric_name, &format!("{}thpercentile", (p * 100.0) as i64));
                if scheduler.should_scrape(&name, now_ms) {
                    pairs.push((name, v));
                }
            }
            let min_name = rewrite_value_suffix(metric_name, "min");
            if scheduler.should_scrape(&min_name, now_ms) {
                pairs.push((min_name, summary.min));
            }
            let max_name = rewrite_value_suffix(metric_name, "max");
            if scheduler.should_scrape(&max_name, now_ms) {
                pairs.push((max_name, summary.max));
            }
            pairs
        }

        (tag, _) => drop_value(metric_name, tag),
    }
}

/// Replace the generic `:value` suffix with a derived suffix. Names
/// without the suffix keep their full form and get the suffix appended.
fn rewrite_value_suffix(metric_name: &str, suffix: &str) -> String {
    match metric_name.strip_suffix(":value") {
        Some(base) => format!("{}:{}", base, suffix),
        None => format!("{}:{}", metric_name, suffix),
    }
}

fn drop_value(metric_name: &str, type_tag: &TypeTag) -> Vec<(String, f64)> {
    debug!(
        metric = metric_name,
        type_tag = ?type_tag,
        "cannot decode attribute with unrecognized shape"
    );
    Vec::new()
}

/// Keyspace/table label attribution for canonical metric names.
///
/// Holds the known per-keyspace and per-table name prefix conventions
/// (one per storage-engine generation, plus the compaction pending-tasks
/// path) and attaches labels only when the extracted names exist in the
/// current topology, so transient or partially-named entities cannot
/// contaminate label cardinality.
pub struct LabelAttributor {
    keyspace_prefixes: Vec<String>,
    table_prefixes: Vec<String>,
}

impl LabelAttributor {
    pub fn new() -> Self {
        Self {
            keyspace_prefixes: vec!["org:apache:cassandra:metrics:keyspace:".to_string()],
            table_prefixes: vec![
                // 3.x table path style
                "org:apache:cassandra:metrics:table:".to_string(),
                // 2.x table path style
                "org:apache:cassandra:metrics:columnfamily:".to_string(),
                "org:apache:cassandra:metrics:compaction:pendingtasksbytablename:".to_string(),
            ],
        }
    }

    /// Register additional prefix conventions for non-default naming
    /// schemes.
    pub fn with_prefixes(keyspace_prefixes: Vec<String>, table_prefixes: Vec<String>) -> Self {
        let mut attributor = Self::new();
        attributor.keyspace_prefixes.extend(keyspace_prefixes);
        attributor.table_prefixes.extend(table_prefixes);
        attributor
    }

    /// Resolve the `(keyspace, table)` labels for a metric name, falling
    /// back to empty labels when the name carries none or the topology
    /// does not confirm them.
    pub fn attribute(&self, metric_name: &str, topology: &NodeTopology) -> (String, String) {
        for prefix in &self.keyspace_prefixes {
            if let Some(rest) = metric_name.strip_prefix(prefix.as_str()) {
                if let Some((keyspace, _)) = rest.split_once(':') {
                    if topology.keyspaces.contains(keyspace) {
                        return (keyspace.to_string(), String::new());
                    }
                    // Keyspace-style name with an unknown keyspace stays
                    // unqualified rather than guessing.
                    return (String::new(), String::new());
                }
            }
        }

        for prefix in &self.table_prefixes {
            if let Some(rest) = metric_name.strip_prefix(prefix.as_str()) {
                let mut segments = rest.splitn(3, ':');
                let keyspace = segments.next().unwrap_or("");
                // A table name only counts when followed by an attribute
                // segment.
                let table = match (segments.next(), segments.next()) {
                    (Some(table), Some(_)) => table,
                    _ => "",
                };
                if !table.is_empty()
                    && topology.keyspaces.contains(keyspace)
                    && topology.tables.contains(table)
                {
                    return (keyspace.to_string(), table.to_string());
                }
            }
        }

        (String::new(), String::new())
    }
}

impl Default for LabelAttributor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::TierBoundary;
    use std::collections::{BTreeMap, HashSet};

    fn scrape_all() -> ScrapeScheduler {
        let mut frequencies = BTreeMap::new();
        frequencies.insert(60u64, vec![".*".to_string()]);
        ScrapeScheduler::new(&[], &frequencies, TierBoundary::Inclusive).unwrap()
    }

    fn topology(keyspaces: &[&str], tables: &[&str]) -> NodeTopology {
        NodeTopology {
            cluster: "test".to_string(),
            datacenter: "dc1".to_string(),
            keyspaces: keyspaces.iter().map(|s| s.to_string()).collect::<HashSet<_>>(),
            tables: tables.iter().map(|s| s.to_string()).collect::<HashSet<_>>(),
        }
    }

    #[test]
    fn test_numeric_scalar() {
        let sched = scrape_all();
        let pairs = decode("m:value", &TypeTag::Numeric, AttrValue::Long(42), &sched, 0);
        assert_eq!(pairs, vec![("m:value".to_string(), 42.0)]);
    }

    #[test]
    fn test_boolean() {
        let sched = scrape_all();
        let pairs = decode("m", &TypeTag::Boolean, AttrValue::Bool(true), &sched, 0);
        assert_eq!(pairs, vec![("m".to_string(), 1.0)]);
        let pairs = decode("m", &TypeTag::Boolean, AttrValue::Bool(false), &sched, 0);
        assert_eq!(pairs, vec![("m".to_string(), 0.0)]);
    }

    #[test]
    fn test_list_cardinality() {
        let sched = scrape_all();
        let value = AttrValue::List(vec![AttrValue::Long(1), AttrValue::Long(2)]);
        let pairs = decode("m", &TypeTag::List, value, &sched, 0);
        assert_eq!(pairs, vec![("m".to_string(), 2.0)]);
    }

    #[test]
    fn test_composite_emits_numeric_fields_only() {
        let sched = scrape_all();
        let value = AttrValue::Composite(vec![
            ("Count".to_string(), AttrValue::Long(5)),
            ("Label".to_string(), AttrValue::Text("x".to_string())),
        ]);
        let pairs = decode("m", &TypeTag::Composite, value, &sched, 0);
        assert_eq!(pairs, vec![("m:count".to_string(), 5.0)]);
    }

    #[test]
    fn test_numeric_looking_object_text() {
        let sched = scrape_all();
        let pairs = decode(
            "m",
            &TypeTag::Object,
            AttrValue::Text("42.5".to_string()),
            &sched,
            0,
        );
        assert_eq!(pairs, vec![("m".to_string(), 42.5)]);
    }

    #[test]
    fn test_non_numeric_object_text_dropped() {
        let sched = scrape_all();
        let pairs = decode(
            "m",
            &TypeTag::Object,
            AttrValue::Text("running".to_string()),
            &sched,
            0,
        );
        assert!(pairs.is_empty());
    }

    #[test]
    fn test_nested_counts_rewrite_value_suffix() {
        let sched = scrape_all();
        let mut tables = BTreeMap::new();
        tables.insert("t1".to_string(), 3i64);
        let mut groups = BTreeMap::new();
        groups.insert("ks1".to_string(), tables);
        let pairs = decode(
            "pending:value",
            &TypeTag::Object,
            AttrValue::NestedCounts(groups),
            &sched,
            0,
        );
        assert_eq!(pairs, vec![("pending:ks1:t1:value".to_string(), 3.0)]);
    }

    #[test]
    fn test_histogram_emits_percentiles_min_max() {
        let sched = scrape_all();
        // Well past the tier interval, so the derived names are due.
        let pairs = decode(
            "m:value",
            &TypeTag::Object,
            AttrValue::LongArray(vec![0, 0, 5, 3, 0]),
            &sched,
            1_000_000,
        );
        let names: Vec<&str> = pairs.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "m:50thpercentile",
                "m:75thpercentile",
                "m:95thpercentile",
                "m:98thpercentile",
                "m:99thpercentile",
                "m:min",
                "m:max",
            ]
        );
        assert!(pairs.iter().all(|(_, v)| v.is_finite()));
    }

    #[test]
    fn test_histogram_derived_names_rechecked_against_scheduler() {
        // The raw attribute passes the fast tier, but a blacklisted
        // derived name must still be suppressed.
        let mut frequencies = BTreeMap::new();
        frequencies.insert(60u64, vec![".*".to_string()]);
        let sched = ScrapeScheduler::new(
            &["m:99thpercentile".to_string()],
            &frequencies,
            TierBoundary::Inclusive,
        )
        .unwrap();
        let pairs = decode(
            "m:value",
            &TypeTag::Object,
            AttrValue::LongArray(vec![1, 2, 0]),
            &sched,
            1_000_000,
        );
        assert!(pairs.iter().all(|(n, _)| n != "m:99thpercentile"));
        assert!(pairs.iter().any(|(n, _)| n == "m:95thpercentile"));
    }

    #[test]
    fn test_unrecognized_shape_dropped() {
        let sched = scrape_all();
        let pairs = decode(
            "m",
            &TypeTag::Other("javax.management.ObjectName".to_string()),
            AttrValue::Text("x".to_string()),
            &sched,
            0,
        );
        assert!(pairs.is_empty());
        let pairs = decode(
            "m",
            &TypeTag::Object,
            AttrValue::Unrecognized("weird".to_string()),
            &sched,
            0,
        );
        assert!(pairs.is_empty());
    }

    #[test]
    fn test_keyspace_label_attribution() {
        let attributor = LabelAttributor::new();
        let topo = topology(&["ks1"], &[]);
        let (ks, table) = attributor.attribute(
            "org:apache:cassandra:metrics:keyspace:ks1:readlatency:value",
            &topo,
        );
        assert_eq!((ks.as_str(), table.as_str()), ("ks1", ""));
    }

    #[test]
    fn test_unknown_keyspace_stays_unqualified() {
        let attributor = LabelAttributor::new();
        let topo = topology(&["other"], &[]);
        let (ks, table) = attributor.attribute(
            "org:apache:cassandra:metrics:keyspace:ks1:readlatency:value",
            &topo,
        );
        assert_eq!((ks.as_str(), table.as_str()), ("", ""));
    }

    #[test]
    fn test_table_label_attribution_both_generations() {
        let attributor = LabelAttributor::new();
        let topo = topology(&["ks1"], &["t1"]);
        for prefix in [
            "org:apache:cassandra:metrics:table",
            "org:apache:cassandra:metrics:columnfamily",
        ] {
            let name = format!("{}:ks1:t1:readlatency:value", prefix);
            let (ks, table) = attributor.attribute(&name, &topo);
            assert_eq!((ks.as_str(), table.as_str()), ("ks1", "t1"), "{}", name);
        }
    }

    #[test]
    fn test_table_label_requires_both_names_in_topology() {
        let attributor = LabelAttributor::new();
        let topo = topology(&["ks1"], &[]);
        let (ks, table) = attributor.attribute(
            "org:apache:cassandra:metrics:table:ks1:t1:readlatency:value",
            &topo,
        );
        assert_eq!((ks.as_str(), table.as_str()), ("", ""));
    }

    #[test]
    fn test_custom_prefixes() {
        let attributor =
            LabelAttributor::with_prefixes(Vec::new(), vec!["pkg:foo:".to_string()]);
        let topo = topology(&["ks1"], &["t1"]);
        let (ks, table) = attributor.attribute("pkg:foo:ks1:t1:count", &topo);
        assert_eq!((ks.as_str(), table.as_str()), ("ks1", "t1"));
    }
}
