//! The scrape engine: one cycle, one node, one thread of control
//!
//! Each cycle snapshots the topology, sweeps the remote entity space,
//! decodes approved attributes into the registry, evicts series whose
//! owning keyspace/table disappeared, and advances the scheduler tiers.
//! Everything runs strictly sequentially: the management connection is
//! not assumed safe for concurrent use, and eviction must observe the
//! complete set of upserts for the cycle.

use crate::decode::{self, LabelAttributor};
use crate::normalize::MetricPathNormalizer;
use crate::registry::{MetricRegistry, SeriesKey};
use crate::schedule::ScrapeScheduler;
use crate::source::{AttributeInfo, AttributeSource, EntityId};
use crate::topology::{self, NodeTopology};
use crate::{Error, Result};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, trace};

/// Never sleep less than this between cycles, whatever the tier table
/// says.
const MIN_SLEEP_MS: i64 = 10_000;

pub struct ScrapeEngine {
    scheduler: ScrapeScheduler,
    normalizer: MetricPathNormalizer,
    attributor: LabelAttributor,
    registry: Arc<MetricRegistry>,
    /// Attribute lists rarely change for a given entity shape; caching
    /// them across cycles avoids redundant introspection calls.
    attribute_cache: HashMap<String, Arc<Vec<AttributeInfo>>>,
}

impl ScrapeEngine {
    pub fn new(scheduler: ScrapeScheduler, registry: Arc<MetricRegistry>) -> Self {
        Self::with_attributor(scheduler, registry, LabelAttributor::new())
    }

    /// Engine with non-default label attribution prefixes.
    pub fn with_attributor(
        scheduler: ScrapeScheduler,
        registry: Arc<MetricRegistry>,
        attributor: LabelAttributor,
    ) -> Self {
        Self {
            scheduler,
            normalizer: MetricPathNormalizer::new(),
            attributor,
            registry,
            attribute_cache: HashMap::new(),
        }
    }

    /// Run scrape cycles against one established connection.
    ///
    /// Clears the registry first so nothing from a previous connection
    /// lingers, then cycles until a fatal error or, in one-shot mode,
    /// after a single cycle. Topology resolution failure aborts the run:
    /// building or evicting metrics against unknown topology would create
    /// stale series that are never cleaned up.
    pub async fn run(&mut self, source: &dyn AttributeSource, forever: bool) -> Result<()> {
        self.registry.clear();

        loop {
            let duration_ms = self.cycle(source).await?;
            if !forever {
                return Ok(());
            }
            let sleep_ms = (self.scheduler.min_interval_ms() - duration_ms).max(MIN_SLEEP_MS);
            tokio::time::sleep(Duration::from_millis(sleep_ms as u64)).await;
        }
    }

    /// Execute one scrape cycle and return its duration in milliseconds.
    ///
    /// Topology is snapshotted first; upserts happen during the sweep;
    /// eviction runs only after the sweep saw the whole entity space, so
    /// a series is removed only once its owning resource failed to show
    /// up for a full cycle.
    pub async fn cycle(&mut self, source: &dyn AttributeSource) -> Result<i64> {
        let now_ms = Utc::now().timestamp_millis();

        let topology = topology::resolve(source).await?;
        self.sweep(source, &topology, now_ms).await?;
        self.registry.evict(&topology);
        self.scheduler.advance(now_ms);

        let duration_ms = Utc::now().timestamp_millis() - now_ms;
        info!(duration_ms, "scrape took {}ms for the whole run", duration_ms);
        Ok(duration_ms)
    }

    /// Enumerate entities and scrape every approved attribute.
    async fn sweep(
        &mut self,
        source: &dyn AttributeSource,
        topology: &NodeTopology,
        now_ms: i64,
    ) -> Result<()> {
        for entity in source.list_entities().await? {
            let prefix = self.normalizer.entity_prefix(&entity);
            // Entity-level pre-filter: skip blacklisted entities before
            // unrolling their attributes.
            if self.scheduler.is_blacklisted(&prefix) {
                continue;
            }

            let attributes = match self.describe_cached(source, &entity).await {
                Ok(attributes) => attributes,
                Err(e) => {
                    error!("error when scraping entity {}: {}", entity, e);
                    continue;
                }
            };

            for attribute in attributes.iter().filter(|a| a.readable) {
                let metric_name = self
                    .normalizer
                    .attribute_path(&prefix, &attribute.name);
                if !self.scheduler.should_scrape(&metric_name, now_ms) {
                    continue;
                }
                self.scrape_attribute(source, &entity, attribute, &metric_name, topology, now_ms)
                    .await;
            }
        }
        Ok(())
    }

    async fn scrape_attribute(
        &self,
        source: &dyn AttributeSource,
        entity: &EntityId,
        attribute: &AttributeInfo,
        metric_name: &str,
        topology: &NodeTopology,
        now_ms: i64,
    ) {
        let start_ms = Utc::now().timestamp_millis();

        let value = match source.get_attribute(entity, &attribute.name).await {
            Ok(value) => value,
            // The remote side marks some attributes readable but rejects
            // the actual read; skip those quietly.
            Err(Error::UnsupportedAttribute) => return,
            Err(e) => {
                error!("cannot get value for {} {}: {}", metric_name, attribute.name, e);
                return;
            }
        };

        for (final_name, value) in
            decode::decode(metric_name, &attribute.type_tag, value, &self.scheduler, now_ms)
        {
            let (keyspace, table) = self.attributor.attribute(&final_name, topology);
            self.registry.upsert(
                SeriesKey {
                    cluster: topology.cluster.clone(),
                    datacenter: topology.datacenter.clone(),
                    keyspace,
                    table,
                    name: final_name,
                },
                value,
            );
        }

        trace!(
            metric = metric_name,
            duration_ms = Utc::now().timestamp_millis() - start_ms,
            "scraped attribute"
        );
    }

    async fn describe_cached(
        &mut self,
        source: &dyn AttributeSource,
        entity: &EntityId,
    ) -> Result<Arc<Vec<AttributeInfo>>> {
        // Entity "shape" key: the attribute list depends on the entity
        // kind, not on every qualifier value.
        let shape = format!(
            "{}{}{}",
            entity.property_count(),
            entity.property("type").unwrap_or(""),
            entity.property("name").unwrap_or("")
        );
        if let Some(attributes) = self.attribute_cache.get(&shape) {
            return Ok(Arc::clone(attributes));
        }
        let attributes = Arc::new(source.describe_attributes(entity).await?);
        self.attribute_cache.insert(shape, Arc::clone(&attributes));
        Ok(attributes)
    }
}
