//! Latest-value series store and Prometheus text rendering
//!
//! All scraped values land in one gauge family, `cassandra_stats`, keyed
//! by (cluster, datacenter, keyspace, table, name) plus any
//! operator-supplied labels. Insertion overwrites; only the latest value
//! per series is retained. Each scrape pipeline owns one registry, so
//! `clear` on reconnect and topology-driven eviction are naturally scoped
//! to that node; the exposition endpoint merges registries.

use crate::topology::NodeTopology;
use dashmap::DashMap;
use std::fmt::Write as _;
use std::sync::Arc;

pub const FAMILY_NAME: &str = "cassandra_stats";
pub const FAMILY_HELP: &str = "node stats";

/// Identity of one series within the family.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeriesKey {
    pub cluster: String,
    pub datacenter: String,
    pub keyspace: String,
    pub table: String,
    pub name: String,
}

/// One exposed series: label values plus the current value.
#[derive(Debug, Clone)]
pub struct Series {
    pub key: SeriesKey,
    pub value: f64,
}

/// Concurrent series store for one scrape pipeline.
pub struct MetricRegistry {
    series: DashMap<SeriesKey, f64>,
    /// Operator-supplied labels, identical on every series; ordered.
    additional_labels: Vec<(String, String)>,
}

impl MetricRegistry {
    pub fn new(additional_labels: Vec<(String, String)>) -> Self {
        Self {
            series: DashMap::new(),
            additional_labels,
        }
    }

    /// Insert or overwrite one series value.
    pub fn upsert(&self, key: SeriesKey, value: f64) {
        self.series.insert(key, value);
    }

    /// Remove series whose keyspace/table labels are no longer present in
    /// the topology. Series with empty keyspace and table labels are
    /// never evicted.
    pub fn evict(&self, topology: &NodeTopology) {
        self.series.retain(|key, _| {
            let stale_keyspace =
                !key.keyspace.is_empty() && !topology.keyspaces.contains(&key.keyspace);
            let stale_table = !key.table.is_empty() && !topology.tables.contains(&key.table);
            !(stale_keyspace || stale_table)
        });
    }

    /// Drop every series. Runs once per fresh connection so metrics from
    /// a previous connection cannot linger if the new topology never
    /// re-populates them.
    pub fn clear(&self) {
        self.series.clear();
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Enumerable snapshot of the current series.
    pub fn snapshot(&self) -> Vec<Series> {
        let mut series: Vec<Series> = self
            .series
            .iter()
            .map(|entry| Series {
                key: entry.key().clone(),
                value: *entry.value(),
            })
            .collect();
        series.sort_by(|a, b| {
            (&a.key.name, &a.key.keyspace, &a.key.table).cmp(&(
                &b.key.name,
                &b.key.keyspace,
                &b.key.table,
            ))
        });
        series
    }

    fn write_samples(&self, out: &mut String) {
        for series in self.snapshot() {
            let key = &series.key;
            let _ = write!(
                out,
                "{}{{cluster=\"{}\",datacenter=\"{}\",keyspace=\"{}\",table=\"{}\",name=\"{}\"",
                FAMILY_NAME,
                escape_label(&key.cluster),
                escape_label(&key.datacenter),
                escape_label(&key.keyspace),
                escape_label(&key.table),
                escape_label(&key.name),
            );
            for (label, value) in &self.additional_labels {
                let _ = write!(out, ",{}=\"{}\"", label, escape_label(value));
            }
            let _ = writeln!(out, "}} {}", format_value(series.value));
        }
    }
}

/// Render the merged registries in Prometheus text exposition format.
pub fn render_metrics(registries: &[Arc<MetricRegistry>]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# HELP {} {}", FAMILY_NAME, FAMILY_HELP);
    let _ = writeln!(out, "# TYPE {} gauge", FAMILY_NAME);
    for registry in registries {
        registry.write_samples(&mut out);
    }
    out
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        format!("{}", value)
    }
}
