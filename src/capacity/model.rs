//! Fabric capacity model and normalization
//!
//! The management API hands capacities back either as loosely shaped JSON
//! objects or, when the body fits, as the typed [`CapacityModel`]. Both are
//! wrapped in [`RawCapacity`] and flattened by [`FabricCapacity::from_raw`]
//! into one stable record with every optional field defaulted.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Marker preceding the resource group segment of an ARM resource id
const RESOURCE_GROUPS_MARKER: &str = "/resourceGroups/";

/// Typed ARM representation of `Microsoft.Fabric/capacities`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityModel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<CapacitySku>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<CapacityProperties>,
    /// Fields the model does not name (`systemData`, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CapacitySku {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
    /// `capacity` and anything newer API versions add
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub administration: Option<CapacityAdministration>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CapacityAdministration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A capacity as returned by the remote API, before normalization
#[derive(Debug, Clone, PartialEq)]
pub enum RawCapacity {
    /// Key/value shaped JSON object
    Mapping(Map<String, Value>),
    /// Attribute shaped typed model
    Model(CapacityModel),
}

impl RawCapacity {
    /// Look up a top-level field by key or attribute name.
    ///
    /// Explicit `null` is treated the same as an absent field, at every depth.
    fn field(&self, key: &str) -> Option<Value> {
        let value = match self {
            RawCapacity::Mapping(map) => map.get(key).cloned(),
            RawCapacity::Model(model) => match key {
                "id" => model.id.clone().map(Value::String),
                "name" => model.name.clone().map(Value::String),
                "type" => model.resource_type.clone().map(Value::String),
                "location" => model.location.clone().map(Value::String),
                "sku" => model.sku.as_ref().and_then(attributes),
                "tags" => model.tags.as_ref().and_then(attributes),
                "properties" => model.properties.as_ref().and_then(attributes),
                other => model.extra.get(other).cloned(),
            },
        };
        value.filter(|v| !v.is_null()).map(drop_nulls)
    }

    fn string_field(&self, key: &str) -> Option<String> {
        self.field(key).and_then(|v| v.as_str().map(str::to_string))
    }

    fn object_field(&self, key: &str) -> Map<String, Value> {
        match self.field(key) {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

/// Remove `null` object entries, recursing into objects and arrays
fn drop_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, drop_nulls(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(drop_nulls).collect()),
        other => other,
    }
}

/// Flatten a typed value into plain JSON through its serializer
fn attributes<T: Serialize>(value: &T) -> Option<Value> {
    serde_json::to_value(value).ok()
}

impl From<Value> for RawCapacity {
    /// Decode an API item, keeping it as a mapping when it does not fit the model
    fn from(value: Value) -> Self {
        match serde_json::from_value::<CapacityModel>(value.clone()) {
            Ok(model) => RawCapacity::Model(model),
            Err(e) => {
                tracing::debug!("Capacity did not fit the typed model ({}), keeping raw mapping", e);
                match value {
                    Value::Object(map) => RawCapacity::Mapping(map),
                    _ => RawCapacity::Mapping(Map::new()),
                }
            }
        }
    }
}

impl From<CapacityModel> for RawCapacity {
    fn from(model: CapacityModel) -> Self {
        RawCapacity::Model(model)
    }
}

impl From<Map<String, Value>> for RawCapacity {
    fn from(map: Map<String, Value>) -> Self {
        RawCapacity::Mapping(map)
    }
}

/// Normalized view of a Fabric capacity
///
/// Serializes to a flat object with a fixed key set and order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FabricCapacity {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub resource_type: Option<String>,
    pub location: Option<String>,
    pub sku: Map<String, Value>,
    pub tags: Map<String, Value>,
    pub properties: Map<String, Value>,
    pub resource_group: Option<String>,
    pub administrators: Vec<Value>,
    pub state: Option<String>,
    #[serde(rename = "provisioningState")]
    pub provisioning_state: Option<String>,
    pub sku_name: Option<String>,
    pub sku_tier: Option<String>,
}

impl FabricCapacity {
    /// Normalize a raw capacity. Missing or malformed fields fall back to defaults.
    pub fn from_raw(raw: &RawCapacity) -> Self {
        let id = raw.string_field("id");
        let sku = raw.object_field("sku");
        let properties = raw.object_field("properties");

        let administrators = properties
            .get("administration")
            .and_then(|a| a.get("members"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Self {
            resource_group: id.as_deref().and_then(extract_resource_group),
            name: raw.string_field("name"),
            resource_type: raw.string_field("type"),
            location: raw.string_field("location"),
            tags: raw.object_field("tags"),
            state: str_entry(&properties, "state"),
            provisioning_state: str_entry(&properties, "provisioningState"),
            sku_name: str_entry(&sku, "name"),
            sku_tier: str_entry(&sku, "tier"),
            administrators,
            id,
            sku,
            properties,
        }
    }

    /// Serialize into a JSON value
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

fn str_entry(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Extract the resource group from an ARM resource id.
///
/// Best effort: the segment after `/resourceGroups/` is returned as is, with
/// no casing normalization or validation. An empty segment counts as absent.
pub fn extract_resource_group(id: &str) -> Option<String> {
    let (_, rest) = id.split_once(RESOURCE_GROUPS_MARKER)?;
    let segment = rest.split('/').next()?;
    if segment.is_empty() {
        None
    } else {
        Some(segment.to_string())
    }
}
