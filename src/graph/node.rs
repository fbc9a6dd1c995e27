//! Node representation in an exposure graph

use super::id::NodeId;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Accept any JSON value for an optional number; anything non-numeric reads as `None`.
///
/// Snapshots are produced by many adapters and some emit strings or nulls
/// where a number is expected. A bad field must not make the whole snapshot
/// unreadable.
pub(crate) fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| v.as_f64()).filter(|n| n.is_finite()))
}

/// Accept a string or null; other JSON types read as `None`.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        _ => None,
    })
}

/// Coarse grouping of node types used for presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeCategory {
    /// Yield products and vaults
    YieldVault,
    /// Lending positions and lending markets
    Lending,
    /// Staked or locked positions
    StakedLocked,
    Default,
}

/// Free-form, protocol-provided node details
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDetails {
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub subtype: Option<String>,
    /// Explicit `null` is meaningful here: the adapter looked and found no curator.
    #[serde(default, deserialize_with = "lenient_string")]
    pub curator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_number")]
    pub health_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub underlying_symbol: Option<String>,
    /// Any further adapter-specific fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NodeDetails {
    pub fn with_kind(kind: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.into()),
            ..Default::default()
        }
    }

    pub fn subtype(mut self, subtype: impl Into<String>) -> Self {
        self.subtype = Some(subtype.into());
        self
    }

    pub fn curator(mut self, curator: Option<String>) -> Self {
        self.curator = curator;
        self
    }

    fn trimmed(value: &Option<String>) -> &str {
        value.as_deref().map(str::trim).unwrap_or("")
    }

    /// Subtype if present, otherwise kind (both trimmed). Empty when neither is set.
    pub fn type_label(&self) -> String {
        let subtype = Self::trimmed(&self.subtype);
        if !subtype.is_empty() {
            return subtype.to_string();
        }
        Self::trimmed(&self.kind).to_string()
    }

    /// Kind equals `lending`, ignoring case.
    pub fn is_lending(&self) -> bool {
        Self::trimmed(&self.kind).eq_ignore_ascii_case("lending")
    }

    pub fn category(&self) -> NodeCategory {
        let kind = Self::trimmed(&self.kind).to_lowercase();
        let subtype = Self::trimmed(&self.subtype).to_lowercase();
        let label = self.type_label().to_lowercase();

        if kind == "yield" || subtype.contains("vault") || label.contains("vault") {
            return NodeCategory::YieldVault;
        }
        if kind.contains("lending") || label.contains("lending") {
            return NodeCategory::Lending;
        }
        if kind == "staked"
            || kind == "locked"
            || label.contains("staked")
            || label.contains("locked")
        {
            return NodeCategory::StakedLocked;
        }
        NodeCategory::Default
    }
}

/// A graph entity: an asset, vault, market or protocol position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Canonical, case-insensitive identifier
    pub id: NodeId,
    #[serde(default)]
    pub chain: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<NodeDetails>,
    /// Fractional or percent depending on the adapter
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_number")]
    pub apy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_number")]
    pub tvl_usd: Option<f64>,
    /// Ordered symbol hints for iconography
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_keys: Option<Vec<String>>,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, chain: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            chain: chain.into(),
            name: name.into(),
            display_name: None,
            protocol: None,
            details: None,
            apy: None,
            tvl_usd: None,
            logo_keys: None,
        }
    }

    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }

    pub fn with_details(mut self, details: NodeDetails) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_apy(mut self, apy: Option<f64>) -> Self {
        self.apy = apy;
        self
    }

    pub fn with_tvl(mut self, tvl_usd: Option<f64>) -> Self {
        self.tvl_usd = tvl_usd;
        self
    }

    pub fn with_logo_keys(mut self, keys: Vec<String>) -> Self {
        self.logo_keys = Some(keys);
        self
    }

    /// `details.kind` equals `lending`.
    pub fn is_lending(&self) -> bool {
        self.details.as_ref().is_some_and(NodeDetails::is_lending)
    }

    pub fn type_label(&self) -> String {
        self.details
            .as_ref()
            .map(NodeDetails::type_label)
            .unwrap_or_default()
    }

    pub fn category(&self) -> NodeCategory {
        self.details
            .as_ref()
            .map(NodeDetails::category)
            .unwrap_or(NodeCategory::Default)
    }

    pub fn curator(&self) -> Option<&str> {
        self.details.as_ref().and_then(|d| d.curator.as_deref())
    }
}
