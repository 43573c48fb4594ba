//! Jolokia transport
//!
//! Reaches the node's JMX attribute space through a Jolokia HTTP bridge
//! (the usual way to get at Cassandra management data without a JVM on
//! the scraping side). One POST per operation: `search` to enumerate
//! entities, `list` for attribute metadata, `read` for values, `exec`
//! for the snitch datacenter lookup.

use crate::source::{AttrValue, AttributeInfo, AttributeSource, Connector, EntityId, TypeTag};
use crate::{Error, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::debug;

pub struct JolokiaConnector {
    base_url: String,
    user: Option<String>,
    password: Option<String>,
}

impl JolokiaConnector {
    /// `base_url` is the bridge endpoint, e.g. `http://node:8778/jolokia`.
    pub fn new(base_url: String, user: Option<String>, password: Option<String>) -> Self {
        Self {
            base_url,
            user,
            password,
        }
    }

    /// Build the bridge URL for a `host:port` target.
    pub fn url_for(host: &str, ssl: bool) -> String {
        let scheme = if ssl { "https" } else { "http" };
        format!("{}://{}/jolokia", scheme, host)
    }
}

#[async_trait]
impl Connector for JolokiaConnector {
    async fn connect(&self) -> Result<Box<dyn AttributeSource>> {
        let source = JolokiaSource {
            base_url: self.base_url.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
            client: reqwest::Client::new(),
        };
        // Probe the bridge so connection failures surface here, not in
        // the middle of a cycle.
        source.execute(json!({"type": "version"})).await?;
        Ok(Box::new(source))
    }
}

pub struct JolokiaSource {
    base_url: String,
    user: Option<String>,
    password: Option<String>,
    client: reqwest::Client,
}

impl JolokiaSource {
    async fn execute(&self, body: Value) -> Result<Value> {
        let mut request = self.client.post(&self.base_url).json(&body);
        if let Some(user) = &self.user {
            request = request.basic_auth(user, self.password.as_deref());
        }
        let response: Value = request.send().await?.json().await?;

        match response.get("status").and_then(Value::as_i64) {
            Some(200) => Ok(response.get("value").cloned().unwrap_or(Value::Null)),
            _ => {
                let error = response
                    .get("error")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error");
                if error.contains("UnsupportedOperation") {
                    return Err(Error::UnsupportedAttribute);
                }
                Err(Error::Transport(error.to_string()))
            }
        }
    }
}

#[async_trait]
impl AttributeSource for JolokiaSource {
    async fn list_entities(&self) -> Result<Vec<EntityId>> {
        let value = self
            .execute(json!({"type": "search", "mbean": "*:*"}))
            .await?;
        let names = value
            .as_array()
            .ok_or_else(|| Error::Transport("search did not return an array".to_string()))?;

        let mut entities = Vec::with_capacity(names.len());
        for name in names {
            match name.as_str().and_then(EntityId::parse) {
                Some(entity) => entities.push(entity),
                None => debug!(name = ?name, "skipping unparseable entity name"),
            }
        }
        Ok(entities)
    }

    async fn describe_attributes(&self, entity: &EntityId) -> Result<Vec<AttributeInfo>> {
        let canonical = entity.canonical();
        let (domain, properties) = canonical
            .split_once(':')
            .ok_or_else(|| Error::Internal("entity without domain".to_string()))?;
        let path = format!("{}/{}", escape_path(domain), escape_path(properties));
        let value = self.execute(json!({"type": "list", "path": path})).await?;
        Ok(attributes_from_list(&value))
    }

    async fn get_attribute(&self, entity: &EntityId, attribute: &str) -> Result<AttrValue> {
        let value = self
            .execute(json!({
                "type": "read",
                "mbean": entity.canonical(),
                "attribute": attribute,
            }))
            .await?;
        Ok(attr_value_from_json(value))
    }

    async fn locate(&self, endpoint: &str) -> Result<String> {
        let value = self
            .execute(json!({
                "type": "exec",
                "mbean": "org.apache.cassandra.db:type=EndpointSnitchInfo",
                "operation": "getDatacenter",
                "arguments": [endpoint],
            }))
            .await?;
        value
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| Error::Transport("getDatacenter did not return a string".to_string()))
    }
}

/// Extract attribute metadata from a `list` response. The `rw` flag marks
/// writable attributes; readability is the default when the flag is
/// absent, but write-only attributes carry `"rw": false` alongside no
/// read support and must not be fetched.
fn attributes_from_list(value: &Value) -> Vec<AttributeInfo> {
    let mut attributes = Vec::new();
    if let Some(attrs) = value.get("attr").and_then(Value::as_object) {
        for (name, meta) in attrs {
            let type_name = meta.get("type").and_then(Value::as_str).unwrap_or("");
            let readable = meta.get("r").and_then(Value::as_bool).unwrap_or(true);
            attributes.push(AttributeInfo {
                name: name.clone(),
                type_tag: type_tag_from_jmx(type_name),
                readable,
            });
        }
    }
    attributes
}

/// Jolokia path escaping for `list` requests.
fn escape_path(segment: &str) -> String {
    segment.replace('!', "!!").replace('/', "!/")
}

/// Map a declared JMX type name onto the decode dispatch tag.
fn type_tag_from_jmx(type_name: &str) -> TypeTag {
    match type_name {
        "long" | "int" | "double" | "float" | "java.lang.Long" | "java.lang.Integer"
        | "java.lang.Double" | "java.lang.Float" => TypeTag::Numeric,
        "boolean" | "java.lang.Boolean" => TypeTag::Boolean,
        "java.util.List" => TypeTag::List,
        "javax.management.openmbean.CompositeData" => TypeTag::Composite,
        "java.lang.Object" => TypeTag::Object,
        other => TypeTag::Other(other.to_string()),
    }
}

/// Classify a raw JSON value into the closed set of supported shapes.
fn attr_value_from_json(value: Value) -> AttrValue {
    match value {
        Value::Bool(b) => AttrValue::Bool(b),
        Value::Number(n) => {
            if let Some(v) = n.as_i64() {
                AttrValue::Long(v)
            } else {
                AttrValue::Double(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(s) => AttrValue::Text(s),
        Value::Array(items) => {
            if items.iter().all(|v| v.as_i64().is_some()) {
                AttrValue::LongArray(items.iter().filter_map(Value::as_i64).collect())
            } else {
                AttrValue::List(items.into_iter().map(attr_value_from_json).collect())
            }
        }
        Value::Object(map) => classify_object(map),
        Value::Null => AttrValue::Unrecognized("null".to_string()),
    }
}

fn classify_object(map: serde_json::Map<String, Value>) -> AttrValue {
    if !map.is_empty() && map.values().all(Value::is_string) {
        let pairs = map
            .into_iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k, s.to_string())))
            .collect::<BTreeMap<_, _>>();
        return AttrValue::StringMap(pairs);
    }

    let nested_counts = !map.is_empty()
        && map.values().all(|v| {
            v.as_object()
                .is_some_and(|inner| inner.values().all(|c| c.as_i64().is_some()))
        });
    if nested_counts {
        let mut groups = BTreeMap::new();
        for (group, inner) in map {
            if let Some(inner) = inner.as_object() {
                let counts: BTreeMap<String, i64> = inner
                    .iter()
                    .filter_map(|(k, v)| v.as_i64().map(|c| (k.clone(), c)))
                    .collect();
                groups.insert(group, counts);
            }
        }
        return AttrValue::NestedCounts(groups);
    }

    // Composite data: named, independently typed sub-fields.
    let fields = map
        .into_iter()
        .map(|(k, v)| (k, attr_value_from_json(v)))
        .collect();
    AttrValue::Composite(fields)
}
