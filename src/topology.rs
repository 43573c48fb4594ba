//! Node topology resolution
//!
//! Once per cycle the engine snapshots the node's logical shape: cluster
//! name, the local datacenter, and the live keyspace/table sets. The
//! snapshot is transactional: if any sub-query fails the whole resolution
//! fails, because labeling or evicting series against partial topology
//! would wrongly remove live series as stale.

use crate::source::{AttrValue, AttributeSource, EntityId};
use crate::{Error, Result};
use std::collections::HashSet;
use tracing::error;

const STORAGE_SERVICE: &str = "org.apache.cassandra.db:type=StorageService";

/// The monitored node's current logical shape. All names lowercase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeTopology {
    pub cluster: String,
    pub datacenter: String,
    pub keyspaces: HashSet<String>,
    pub tables: HashSet<String>,
}

/// Resolve the node topology from well-known entities.
///
/// The datacenter needs a two-step lookup (local host id, then the snitch
/// location of the matching endpoint) because the introspection surface
/// varies across Cassandra versions.
pub async fn resolve(source: &dyn AttributeSource) -> Result<NodeTopology> {
    let storage_service = EntityId::parse(STORAGE_SERVICE).expect("static entity id");

    let cluster = match read_text(source, &storage_service, "ClusterName").await {
        Ok(name) => name,
        Err(e) => {
            error!("cannot retrieve the cluster name for the node: {}", e);
            return Err(Error::Topology(format!("cluster name: {}", e)));
        }
    };

    let datacenter = match resolve_datacenter(source, &storage_service).await {
        Ok(dc) => dc,
        Err(e) => {
            error!("cannot retrieve the datacenter name for the node: {}", e);
            return Err(Error::Topology(format!("datacenter: {}", e)));
        }
    };

    let (keyspaces, tables) = match resolve_tables(source).await {
        Ok(pair) => pair,
        Err(e) => {
            error!("cannot retrieve keyspaces/tables information: {}", e);
            return Err(Error::Topology(format!("keyspaces/tables: {}", e)));
        }
    };

    Ok(NodeTopology {
        cluster,
        datacenter,
        keyspaces,
        tables,
    })
}

async fn resolve_datacenter(
    source: &dyn AttributeSource,
    storage_service: &EntityId,
) -> Result<String> {
    let host_id = read_text(source, storage_service, "LocalHostId").await?;
    let endpoints = match source
        .get_attribute(storage_service, "HostIdToEndpoint")
        .await?
    {
        AttrValue::StringMap(map) => map,
        other => {
            return Err(Error::Transport(format!(
                "HostIdToEndpoint has unexpected shape: {:?}",
                other
            )))
        }
    };
    let endpoint = endpoints.get(&host_id).ok_or_else(|| {
        Error::Topology(format!("local host id {} has no known endpoint", host_id))
    })?;
    source.locate(endpoint).await
}

/// Enumerate table entities, accepting both storage-engine generations of
/// the table entity naming.
async fn resolve_tables(
    source: &dyn AttributeSource,
) -> Result<(HashSet<String>, HashSet<String>)> {
    let mut keyspaces = HashSet::new();
    let mut tables = HashSet::new();

    for entity in source.list_entities().await? {
        if entity.domain() != "org.apache.cassandra.db" {
            continue;
        }
        let table = match entity.property("type") {
            Some("ColumnFamilies") => entity.property("columnfamily"),
            Some("Tables") => entity.property("table"),
            _ => None,
        };
        if let (Some(keyspace), Some(table)) = (entity.property("keyspace"), table) {
            keyspaces.insert(keyspace.to_lowercase());
            tables.insert(table.to_lowercase());
        }
    }

    Ok((keyspaces, tables))
}

async fn read_text(
    source: &dyn AttributeSource,
    entity: &EntityId,
    attribute: &str,
) -> Result<String> {
    match source.get_attribute(entity, attribute).await? {
        AttrValue::Text(s) => Ok(s),
        other => Err(Error::Transport(format!(
            "{} {} has unexpected shape: {:?}",
            entity, attribute, other
        ))),
    }
}
