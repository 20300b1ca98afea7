//! strm-schemas
//!
//! Stream definition value types shared by every crate in the workspace.
//!
//! All types are plain values: structural equality, `Clone` for copies,
//! serde for the persisted interchange format. Nothing here performs IO.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

mod naming;

pub use naming::{
    is_direct_child, is_root, layer_component_template_name, parent_name,
    processing_pipeline_name, shared_pipeline_fallback_name,
};

// ---------------------------------------------------------------------------
// Kinds
// ---------------------------------------------------------------------------

/// Stable identity kind of a stream. Never changes across upserts.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    Classic,
    Wired,
}

impl StreamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKind::Classic => "classic",
            StreamKind::Wired => "wired",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Field value types
// ---------------------------------------------------------------------------

/// One ordered processing step of a stream's ingest rules.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProcessingStep {
    /// Caller-assigned identifier, unique within the stream.
    pub id: String,
    /// Processor type (e.g. `grok`, `set`, `rename`).
    pub processor: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

impl ProcessingStep {
    pub fn new(id: impl Into<String>, processor: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            processor: processor.into(),
            options: BTreeMap::new(),
            condition: None,
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }
}

/// Retention policy applied to a stream's backing data stream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Lifecycle {
    /// Wired: resolve from the nearest ancestor. Classic: leave untouched.
    Inherit,
    /// Data stream lifecycle with an optional retention period (e.g. `30d`).
    Dsl {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data_retention: Option<String>,
    },
    /// Index lifecycle management policy by name.
    Ilm { policy: String },
}

impl Lifecycle {
    pub fn is_inherit(&self) -> bool {
        matches!(self, Lifecycle::Inherit)
    }

    pub fn is_ilm(&self) -> bool {
        matches!(self, Lifecycle::Ilm { .. })
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Lifecycle::Inherit
    }
}

/// Routing rule of a wired stream: documents matching `condition` are
/// rerouted to the child stream `destination`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoutingRule {
    pub destination: String,
    pub condition: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl RoutingRule {
    pub fn new(destination: impl Into<String>, condition: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            condition: condition.into(),
            enabled: true,
        }
    }

    /// Placeholder rule added to a parent when a child is created directly.
    /// Routes nothing until an operator gives it a condition.
    pub fn disabled(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            condition: "false".to_string(),
            enabled: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Definitions
// ---------------------------------------------------------------------------

/// Managed overlay on an externally created data stream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassicDefinition {
    pub name: String,
    #[serde(default)]
    pub processing: Vec<ProcessingStep>,
    #[serde(default)]
    pub lifecycle: Lifecycle,
}

/// Fully managed stream in the dotted name hierarchy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WiredDefinition {
    pub name: String,
    #[serde(default)]
    pub processing: Vec<ProcessingStep>,
    #[serde(default)]
    pub lifecycle: Lifecycle,
    #[serde(default)]
    pub routing: Vec<RoutingRule>,
    /// Field name -> mapping type.
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl WiredDefinition {
    /// Default definition for a child created by a parent's routing rule.
    pub fn child(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            processing: Vec::new(),
            lifecycle: Lifecycle::Inherit,
            routing: Vec::new(),
            fields: BTreeMap::new(),
        }
    }

    pub fn routes_to(&self, destination: &str) -> bool {
        self.routing.iter().any(|r| r.destination == destination)
    }
}

/// Desired definition of one named stream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StreamDefinition {
    Classic(ClassicDefinition),
    Wired(WiredDefinition),
}

impl StreamDefinition {
    pub fn name(&self) -> &str {
        match self {
            StreamDefinition::Classic(d) => &d.name,
            StreamDefinition::Wired(d) => &d.name,
        }
    }

    pub fn kind(&self) -> StreamKind {
        match self {
            StreamDefinition::Classic(_) => StreamKind::Classic,
            StreamDefinition::Wired(_) => StreamKind::Wired,
        }
    }

    pub fn processing(&self) -> &[ProcessingStep] {
        match self {
            StreamDefinition::Classic(d) => &d.processing,
            StreamDefinition::Wired(d) => &d.processing,
        }
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        match self {
            StreamDefinition::Classic(d) => &d.lifecycle,
            StreamDefinition::Wired(d) => &d.lifecycle,
        }
    }

    pub fn as_wired(&self) -> Option<&WiredDefinition> {
        match self {
            StreamDefinition::Wired(d) => Some(d),
            StreamDefinition::Classic(_) => None,
        }
    }

    pub fn as_classic(&self) -> Option<&ClassicDefinition> {
        match self {
            StreamDefinition::Classic(d) => Some(d),
            StreamDefinition::Wired(_) => None,
        }
    }
}

impl From<ClassicDefinition> for StreamDefinition {
    fn from(d: ClassicDefinition) -> Self {
        StreamDefinition::Classic(d)
    }
}

impl From<WiredDefinition> for StreamDefinition {
    fn from(d: WiredDefinition) -> Self {
        StreamDefinition::Wired(d)
    }
}
