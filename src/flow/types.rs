//! Core flow type definitions.
//!
//! Defines [`ActivityEvent`] (one recorded action), [`Relation`] (a detected or
//! declared correlation between events), and [`FlowGraph`] with its
//! [`FlowNode`]s and [`FlowEdge`]s.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Open, string-keyed metadata attached to events and nodes.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// A single metadata value. Scalars stay flat in JSON
/// (`{"file": "src/main.rs", "line": 42}`); timestamps are wrapped as
/// `{"timestamp": "<RFC 3339>"}` so a plain string never changes variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "MetadataRepr", into = "MetadataRepr")]
pub enum MetadataValue {
    Bool(bool),
    Number(f64),
    Timestamp(DateTime<Utc>),
    String(String),
}

/// Wire shape of [`MetadataValue`].
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum MetadataRepr {
    Bool(bool),
    Number(f64),
    Timestamp { timestamp: DateTime<Utc> },
    String(String),
}

impl From<MetadataRepr> for MetadataValue {
    fn from(repr: MetadataRepr) -> Self {
        match repr {
            MetadataRepr::Bool(b) => Self::Bool(b),
            MetadataRepr::Number(n) => Self::Number(n),
            MetadataRepr::Timestamp { timestamp } => Self::Timestamp(timestamp),
            MetadataRepr::String(s) => Self::String(s),
        }
    }
}

impl From<MetadataValue> for MetadataRepr {
    fn from(value: MetadataValue) -> Self {
        match value {
            MetadataValue::Bool(b) => Self::Bool(b),
            MetadataValue::Number(n) => Self::Number(n),
            MetadataValue::Timestamp(timestamp) => Self::Timestamp { timestamp },
            MetadataValue::String(s) => Self::String(s),
        }
    }
}

impl MetadataValue {
    /// Canonical string form used for grouping events by a shared value.
    pub fn as_key(&self) -> String {
        match self {
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => n.to_string(),
            Self::Timestamp(t) => t.to_rfc3339_opts(SecondsFormat::Micros, true),
            Self::String(s) => s.clone(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<f64> for MetadataValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for MetadataValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<DateTime<Utc>> for MetadataValue {
    fn from(t: DateTime<Utc>) -> Self {
        Self::Timestamp(t)
    }
}

/// A single recorded user or assistant action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvent {
    /// UUID v7 (time-sortable), assigned at creation.
    pub id: String,
    /// When the activity happened.
    pub timestamp: DateTime<Utc>,
    /// Free-form category, e.g. `"code_edit"` or `"navigation"`.
    pub activity_type: String,
    /// Text body of the activity. May be large.
    pub content: String,
    /// Origin label (tool or assistant name).
    pub source: String,
    /// Logical session this event belongs to.
    pub session_id: String,
    /// Supplementary attributes such as `file`, `project`, `language`.
    #[serde(default)]
    pub metadata: Metadata,
}

impl ActivityEvent {
    /// Create an event stamped with a fresh id and the current time.
    pub fn new(
        activity_type: impl Into<String>,
        content: impl Into<String>,
        source: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            timestamp: Utc::now(),
            activity_type: activity_type.into(),
            content: content.into(),
            source: source.into(),
            session_id: session_id.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// The kind of correlation a relation (or edge) represents.
///
/// Serialized as a plain string. Strings that are not one of the built-in
/// kinds round-trip as [`RelationType::Manual`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum RelationType {
    /// Events clustered inside a short time window.
    Temporal,
    /// Adjacent events sharing an activity type or source.
    Causal,
    /// Events whose content overlaps lexically.
    Semantic,
    /// Events sharing a metadata context (file, project, class, ...).
    Contextual,
    /// Fallback chain edge added by the graph builder (`temporal_sequence`).
    Sequence,
    /// Caller-declared relation kind.
    Manual(String),
}

impl RelationType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Temporal => "temporal",
            Self::Causal => "causal",
            Self::Semantic => "semantic",
            Self::Contextual => "contextual",
            Self::Sequence => "temporal_sequence",
            Self::Manual(kind) => kind,
        }
    }
}

impl std::fmt::Display for RelationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for RelationType {
    fn from(s: &str) -> Self {
        match s {
            "temporal" => Self::Temporal,
            "causal" => Self::Causal,
            "semantic" => Self::Semantic,
            "contextual" => Self::Contextual,
            "temporal_sequence" => Self::Sequence,
            other => Self::Manual(other.to_string()),
        }
    }
}

impl From<String> for RelationType {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<RelationType> for String {
    fn from(kind: RelationType) -> Self {
        kind.as_str().to_string()
    }
}

/// A detected or manually declared correlation between two or more events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    /// UUID v7 primary key.
    pub id: String,
    /// Creation time of the relation (not of the events).
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub relation_type: RelationType,
    /// Ordered event ids. Ids without a matching event are skipped at build time.
    pub related_event_ids: Vec<String>,
    /// Evidence strength in `[0.0, 1.0]`.
    pub strength: f64,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Relation {
    pub fn new(
        relation_type: RelationType,
        related_event_ids: Vec<String>,
        strength: f64,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            timestamp: Utc::now(),
            relation_type,
            related_event_ids,
            strength: strength.clamp(0.0, 1.0),
            description: description.into(),
            tags: Vec::new(),
        }
    }

    /// A caller-declared relation. `kind` may be a built-in name or any custom label.
    pub fn manual(
        kind: &str,
        related_event_ids: Vec<String>,
        strength: f64,
        description: impl Into<String>,
    ) -> Self {
        Self::new(RelationType::from(kind), related_event_ids, strength, description)
            .with_tags(["manual".to_string()])
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = String>) -> Self {
        self.tags.extend(tags);
        self
    }
}

/// One node per source event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowNode {
    pub id: String,
    /// Back-reference to the [`ActivityEvent`] this node represents.
    pub event_id: String,
    /// The event's activity type.
    pub node_type: String,
    /// Truncated event content for display.
    pub label: String,
    #[serde(default)]
    pub metadata: Metadata,
}

/// A directed, typed, weighted edge between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowEdge {
    pub id: String,
    pub source_node_id: String,
    pub target_node_id: String,
    pub relation_type: RelationType,
    pub weight: f64,
}

/// Directed multigraph of activity built for one session or query window.
///
/// A graph with no nodes is valid and means "no activity".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowGraph {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub nodes: Vec<FlowNode>,
    pub edges: Vec<FlowEdge>,
}

impl FlowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&FlowNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Append a bare node and return its id.
    pub fn add_node(&mut self, node_type: impl Into<String>, label: impl Into<String>) -> String {
        let id = uuid::Uuid::now_v7().to_string();
        self.nodes.push(FlowNode {
            id: id.clone(),
            event_id: id.clone(),
            node_type: node_type.into(),
            label: label.into(),
            metadata: Metadata::new(),
        });
        id
    }

    /// Append an edge if both endpoints exist. Returns the new edge id, or
    /// `None` when an endpoint is unknown (the edge is dropped).
    pub fn connect(
        &mut self,
        source_node_id: &str,
        target_node_id: &str,
        relation_type: RelationType,
        weight: f64,
    ) -> Option<String> {
        if self.node(source_node_id).is_none() || self.node(target_node_id).is_none() {
            return None;
        }
        let id = uuid::Uuid::now_v7().to_string();
        self.edges.push(FlowEdge {
            id: id.clone(),
            source_node_id: source_node_id.to_string(),
            target_node_id: target_node_id.to_string(),
            relation_type,
            weight,
        });
        Some(id)
    }
}

/// Truncate content to `max_chars` characters, appending "..." if truncated.
pub fn truncate(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}...", &content[..end]),
        None => content.to_string(),
    }
}
