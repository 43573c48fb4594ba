//! Canonical metric path derivation
//!
//! Entity identifiers are flattened into lowercase, colon-delimited metric
//! names: structural punctuation (`:type=`, `,key=`, `.`) collapses to a
//! single `:`, spaces become underscores, and the attribute name is
//! appended after a final separator. The result is stable across the
//! qualifier-ordering quirks different Cassandra versions expose, e.g.
//!
//! `org.apache.cassandra.metrics:type=Keyspace,keyspace=ks1,name=ReadLatency`
//! + `Value` becomes `org:apache:cassandra:metrics:keyspace:ks1:readlatency:value`.

use crate::source::EntityId;
use regex::Regex;

const SEPARATOR: &str = ":";

pub struct MetricPathNormalizer {
    pattern: Regex,
}

impl MetricPathNormalizer {
    pub fn new() -> Self {
        Self {
            // Structural punctuation of the canonical entity string form.
            pattern: Regex::new(r"(:type=|,[^=]+=|\.)").expect("static pattern"),
        }
    }

    /// Normalized entity prefix, ending with a separator so attribute
    /// names append directly. This is also the name the blacklist
    /// pre-filter runs against before attributes are unrolled.
    pub fn entity_prefix(&self, entity: &EntityId) -> String {
        let flattened = self
            .pattern
            .replace_all(&entity.canonical(), SEPARATOR)
            .replace(' ', "_");
        format!("{}{}", flattened, SEPARATOR).to_lowercase()
    }

    /// Full canonical metric name for one attribute of an entity.
    pub fn attribute_path(&self, entity_prefix: &str, attribute: &str) -> String {
        format!("{}{}", entity_prefix, attribute.to_lowercase())
    }
}

impl Default for MetricPathNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize(entity: &str, attribute: &str) -> String {
        let normalizer = MetricPathNormalizer::new();
        let entity = EntityId::parse(entity).unwrap();
        normalizer.attribute_path(&normalizer.entity_prefix(&entity), attribute)
    }

    #[test]
    fn test_table_metric_path() {
        assert_eq!(
            normalize(
                "org.apache.cassandra.metrics:type=Keyspace,keyspace=ks1,name=ReadLatency",
                "Value"
            ),
            "org:apache:cassandra:metrics:keyspace:ks1:readlatency:value"
        );
    }

    #[test]
    fn test_lowercases_and_strips_qualifiers() {
        assert_eq!(
            normalize("pkg:type=Foo,keyspace=KS1,table=T1", "Count"),
            "pkg:foo:ks1:t1:count"
        );
    }

    #[test]
    fn test_spaces_become_underscores() {
        assert_eq!(
            normalize("org.apache.cassandra.db:type=Storage Service", "Load"),
            "org:apache:cassandra:db:storage_service:load"
        );
    }

    #[test]
    fn test_deterministic() {
        let a = normalize("pkg:type=Foo,name=Bar", "X");
        let b = normalize("pkg:type=Foo,name=Bar", "X");
        assert_eq!(a, b);
    }

    #[test]
    fn test_entity_prefix_ends_with_separator() {
        let normalizer = MetricPathNormalizer::new();
        let entity = EntityId::parse("pkg:type=Foo").unwrap();
        assert_eq!(normalizer.entity_prefix(&entity), "pkg:foo:");
    }
}
