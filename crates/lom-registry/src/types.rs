use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ResourceKind
// ---------------------------------------------------------------------------

/// Physical container kinds known to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Tube,
    SpinColumn,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 2] = [ResourceKind::Tube, ResourceKind::SpinColumn];

    /// Singular wire name (`"tube"`, `"spin_column"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Tube => "tube",
            ResourceKind::SpinColumn => "spin_column",
        }
    }

    /// Collection name used in routes and result pages (`"tubes"`, `"spin_columns"`).
    pub fn plural(&self) -> &'static str {
        match self {
            ResourceKind::Tube => "tubes",
            ResourceKind::SpinColumn => "spin_columns",
        }
    }

    /// Parse a singular wire name. Returns `None` for anything unrecognized.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "tube" => Some(ResourceKind::Tube),
            "spin_column" => Some(ResourceKind::SpinColumn),
            _ => None,
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Label
// ---------------------------------------------------------------------------

/// A typed key/value annotation on a resource, e.g.
/// `name = "front barcode"`, `label_type = "sanger-barcode"`, `value = "ABC1234"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    pub label_type: String,
    pub value: String,
}

impl Label {
    pub fn new(
        name: impl Into<String>,
        label_type: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            label_type: label_type.into(),
            value: value.into(),
        }
    }

    fn same_key(&self, other: &Label) -> bool {
        self.label_type == other.label_type && self.name == other.name
    }
}

/// Partial label pattern. `None` fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelMatch {
    pub name: Option<String>,
    pub label_type: Option<String>,
    pub value: Option<String>,
}

impl LabelMatch {
    pub fn matches(&self, label: &Label) -> bool {
        field_matches(&self.name, &label.name)
            && field_matches(&self.label_type, &label.label_type)
            && field_matches(&self.value, &label.value)
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.label_type.is_none() && self.value.is_none()
    }
}

fn field_matches(want: &Option<String>, have: &str) -> bool {
    want.as_deref().map_or(true, |w| w == have)
}

// ---------------------------------------------------------------------------
// Resource
// ---------------------------------------------------------------------------

/// A physical container. Referenced by orders, never copied into them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub uuid: String,
    pub kind: ResourceKind,
    /// Registry-wide creation sequence (1-based, strictly increasing).
    pub seq: u64,
    pub created_at: DateTime<Utc>,
    labels: Vec<Label>,
}

impl Resource {
    pub(crate) fn new(
        uuid: String,
        kind: ResourceKind,
        seq: u64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            uuid,
            kind,
            seq,
            created_at,
            labels: Vec::new(),
        }
    }

    /// Labels in attachment order.
    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    /// Label stored under `(label_type, name)`, if any.
    pub fn label(&self, label_type: &str, name: &str) -> Option<&Label> {
        self.labels
            .iter()
            .find(|l| l.label_type == label_type && l.name == name)
    }

    pub fn has_label(&self, pattern: &LabelMatch) -> bool {
        self.labels.iter().any(|l| pattern.matches(l))
    }

    /// Set or replace the label keyed by `(label_type, name)`.
    pub(crate) fn put_label(&mut self, label: Label) {
        match self.labels.iter_mut().find(|l| l.same_key(&label)) {
            Some(existing) => existing.value = label.value,
            None => self.labels.push(label),
        }
    }
}
