//! Boundary to the remote management attribute source
//!
//! The scrape engine never talks to a wire protocol directly. It sees the
//! node through the [`AttributeSource`] trait: enumerate entities, describe
//! their attributes, read values. [`Connector`] establishes one connection
//! per run; the engine treats connection loss as fatal to the run and lets
//! the caller reconnect.

use crate::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of a remote management entity: a domain plus ordered
/// key/value qualifiers, e.g.
/// `org.apache.cassandra.metrics:type=Table,keyspace=ks1,scope=t1,name=ReadLatency`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityId {
    domain: String,
    properties: Vec<(String, String)>,
}

impl EntityId {
    pub fn new(domain: impl Into<String>, properties: Vec<(String, String)>) -> Self {
        Self {
            domain: domain.into(),
            properties,
        }
    }

    /// Parse the canonical `domain:k1=v1,k2=v2` string form.
    pub fn parse(s: &str) -> Option<Self> {
        let (domain, props) = s.split_once(':')?;
        let mut properties = Vec::new();
        for pair in props.split(',') {
            let (k, v) = pair.split_once('=')?;
            properties.push((k.to_string(), v.to_string()));
        }
        Some(Self::new(domain, properties))
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Value of a key qualifier, if present.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    /// The structured string form the normalizer operates on.
    pub fn canonical(&self) -> String {
        let props: Vec<String> = self
            .properties
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        format!("{}:{}", self.domain, props.join(","))
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

/// Declared type of a remote attribute, as reported by the management
/// interface. Drives the first level of decode dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeTag {
    /// Integer or floating point scalar families
    Numeric,
    Boolean,
    /// Ordered collection; only its cardinality is exported
    List,
    /// Named, independently typed sub-fields
    Composite,
    /// Opaque object; the decoder classifies it by value shape
    Object,
    /// Anything else; always dropped
    Other(String),
}

/// One readable attribute slot on an entity.
#[derive(Debug, Clone)]
pub struct AttributeInfo {
    pub name: String,
    pub type_tag: TypeTag,
    pub readable: bool,
}

/// A raw attribute value, as a closed set of the shapes the exporter
/// understands. Anything the transport cannot classify arrives as
/// `Unrecognized` and is dropped with a diagnostic instead of being
/// coerced.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Long(i64),
    Double(f64),
    Bool(bool),
    Text(String),
    List(Vec<AttrValue>),
    /// Named sub-fields of a composite value
    Composite(Vec<(String, AttrValue)>),
    /// Flat string-to-string map (e.g. host id to endpoint)
    StringMap(BTreeMap<String, String>),
    /// Pending work items keyed by (keyspace, table)
    NestedCounts(BTreeMap<String, BTreeMap<String, i64>>),
    /// Serialized estimated-histogram bucket counts
    LongArray(Vec<i64>),
    /// Shape the transport could not classify; the description is logged
    Unrecognized(String),
}

impl AttrValue {
    /// Numeric view of scalar variants.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Long(v) => Some(*v as f64),
            AttrValue::Double(v) => Some(*v),
            _ => None,
        }
    }
}

/// Read-only view of the remote management attribute space.
///
/// Implementations are not assumed safe for concurrent use within one
/// scrape pipeline; the engine issues calls strictly sequentially.
#[async_trait]
pub trait AttributeSource: Send + Sync {
    /// Enumerate every entity currently registered on the node.
    async fn list_entities(&self) -> Result<Vec<EntityId>>;

    /// Describe the attributes of one entity.
    async fn describe_attributes(&self, entity: &EntityId) -> Result<Vec<AttributeInfo>>;

    /// Read one attribute value.
    ///
    /// Returns [`crate::Error::UnsupportedAttribute`] when the remote side
    /// signals the attribute cannot be read; the engine skips those
    /// silently.
    async fn get_attribute(&self, entity: &EntityId, attribute: &str) -> Result<AttrValue>;

    /// Resolve the datacenter/location of a node endpoint via the snitch.
    async fn locate(&self, endpoint: &str) -> Result<String>;
}

/// Establishes connections to a node's management interface.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn AttributeSource>>;
}
