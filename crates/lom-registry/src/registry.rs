//! In-memory resource store.
//!
//! # Invariants
//!
//! - A resource identifier is registered at most once; there is no delete
//!   and no merge.
//! - Creation order is preserved: [`Registry::iter`] yields resources by
//!   ascending `seq`.
//! - `attach_labels` is all-or-nothing: every label is validated before the
//!   first one is written.
//!
//! # Thread-safety
//! `Registry` is not synchronized. Concurrent callers wrap it in a lock.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::types::{Label, LabelMatch, Resource, ResourceKind};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The kind string does not name a known container kind.
    UnknownResourceKind { kind: String },
    /// No resource is registered under this identifier.
    ResourceNotFound { uuid: String },
    /// The identifier is already taken.
    DuplicateResource { uuid: String },
    /// A label has an empty name, type or value.
    InvalidLabel { uuid: String, reason: String },
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownResourceKind { kind } => write!(f, "unknown resource kind '{kind}'"),
            Self::ResourceNotFound { uuid } => write!(f, "resource {uuid} not found"),
            Self::DuplicateResource { uuid } => write!(f, "resource {uuid} already exists"),
            Self::InvalidLabel { uuid, reason } => {
                write!(f, "invalid label for resource {uuid}: {reason}")
            }
        }
    }
}

impl std::error::Error for RegistryError {}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct Registry {
    resources: Vec<Resource>,
    index: HashMap<String, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a kind string, mapping failure to [`RegistryError::UnknownResourceKind`].
    pub fn parse_kind(kind: &str) -> Result<ResourceKind, RegistryError> {
        ResourceKind::parse(kind).ok_or_else(|| RegistryError::UnknownResourceKind {
            kind: kind.to_string(),
        })
    }

    /// Register a new resource under a caller-minted identifier.
    pub fn create_resource(
        &mut self,
        uuid: impl Into<String>,
        kind: ResourceKind,
        created_at: DateTime<Utc>,
    ) -> Result<&Resource, RegistryError> {
        let uuid = uuid.into();
        if self.index.contains_key(&uuid) {
            return Err(RegistryError::DuplicateResource { uuid });
        }
        let seq = self.resources.len() as u64 + 1;
        let pos = self.resources.len();
        self.index.insert(uuid.clone(), pos);
        self.resources
            .push(Resource::new(uuid, kind, seq, created_at));
        Ok(&self.resources[pos])
    }

    pub fn get(&self, uuid: &str) -> Option<&Resource> {
        self.index.get(uuid).map(|&i| &self.resources[i])
    }

    pub fn require(&self, uuid: &str) -> Result<&Resource, RegistryError> {
        self.get(uuid).ok_or_else(|| RegistryError::ResourceNotFound {
            uuid: uuid.to_string(),
        })
    }

    pub fn contains(&self, uuid: &str) -> bool {
        self.index.contains_key(uuid)
    }

    /// Set or replace a single label. Idempotent for identical input.
    pub fn attach_label(
        &mut self,
        uuid: &str,
        label_type: &str,
        name: &str,
        value: &str,
    ) -> Result<&Resource, RegistryError> {
        self.attach_labels(uuid, vec![Label::new(name, label_type, value)])
    }

    /// Set or replace several labels on one resource, atomically.
    pub fn attach_labels(
        &mut self,
        uuid: &str,
        labels: Vec<Label>,
    ) -> Result<&Resource, RegistryError> {
        let pos = *self
            .index
            .get(uuid)
            .ok_or_else(|| RegistryError::ResourceNotFound {
                uuid: uuid.to_string(),
            })?;

        for label in &labels {
            validate_label(uuid, label)?;
        }

        let resource = &mut self.resources[pos];
        for label in labels {
            resource.put_label(label);
        }
        Ok(&self.resources[pos])
    }

    /// Resources carrying at least one label matching `pattern`, in creation order.
    pub fn find_by_label(&self, pattern: &LabelMatch) -> Vec<&Resource> {
        self.resources
            .iter()
            .filter(|r| r.has_label(pattern))
            .collect()
    }

    /// All resources in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.resources.iter()
    }

    pub fn of_kind(&self, kind: ResourceKind) -> impl Iterator<Item = &Resource> {
        self.resources.iter().filter(move |r| r.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

fn validate_label(uuid: &str, label: &Label) -> Result<(), RegistryError> {
    let blank = [
        ("name", &label.name),
        ("type", &label.label_type),
        ("value", &label.value),
    ]
    .into_iter()
    .find(|(_, v)| v.trim().is_empty());

    match blank {
        Some((field, _)) => Err(RegistryError::InvalidLabel {
            uuid: uuid.to_string(),
            reason: format!("label {field} must not be empty"),
        }),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn ts() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn registry_with_tube(uuid: &str) -> Registry {
        let mut r = Registry::new();
        r.create_resource(uuid, ResourceKind::Tube, ts()).unwrap();
        r
    }

    #[test]
    fn create_assigns_increasing_seq() {
        let mut r = Registry::new();
        let a = r.create_resource("a", ResourceKind::Tube, ts()).unwrap().seq;
        let b = r
            .create_resource("b", ResourceKind::SpinColumn, ts())
            .unwrap()
            .seq;
        assert_eq!((a, b), (1, 2));
        assert_eq!(r.len(), 2);
    }

    #[test]
    fn duplicate_identifier_rejected() {
        let mut r = registry_with_tube("a");
        let err = r.create_resource("a", ResourceKind::Tube, ts()).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateResource { uuid: "a".into() });
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn parse_kind_rejects_unknown() {
        assert_eq!(Registry::parse_kind("tube"), Ok(ResourceKind::Tube));
        assert_eq!(
            Registry::parse_kind("plate"),
            Err(RegistryError::UnknownResourceKind {
                kind: "plate".into()
            })
        );
    }

    #[test]
    fn attach_label_to_missing_resource_fails() {
        let mut r = Registry::new();
        let err = r
            .attach_label("ghost", "sanger-barcode", "front barcode", "ABC1234")
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::ResourceNotFound {
                uuid: "ghost".into()
            }
        );
    }

    #[test]
    fn attach_label_replaces_same_key() {
        let mut r = registry_with_tube("a");
        r.attach_label("a", "sanger-barcode", "front barcode", "ABC1234")
            .unwrap();
        r.attach_label("a", "sanger-barcode", "front barcode", "XYZ9999")
            .unwrap();

        let res = r.get("a").unwrap();
        assert_eq!(res.labels().len(), 1);
        assert_eq!(
            res.label("sanger-barcode", "front barcode").unwrap().value,
            "XYZ9999"
        );
    }

    #[test]
    fn attach_label_is_idempotent() {
        let mut r = registry_with_tube("a");
        for _ in 0..3 {
            r.attach_label("a", "sanger-barcode", "front barcode", "ABC1234")
                .unwrap();
        }
        assert_eq!(r.get("a").unwrap().labels().len(), 1);
    }

    #[test]
    fn different_type_same_name_are_distinct_labels() {
        let mut r = registry_with_tube("a");
        r.attach_label("a", "sanger-barcode", "front barcode", "ABC1234")
            .unwrap();
        r.attach_label("a", "ean13-barcode", "front barcode", "0123456789012")
            .unwrap();
        assert_eq!(r.get("a").unwrap().labels().len(), 2);
    }

    #[test]
    fn batch_with_blank_value_writes_nothing() {
        let mut r = registry_with_tube("a");
        let err = r
            .attach_labels(
                "a",
                vec![
                    Label::new("front barcode", "sanger-barcode", "ABC1234"),
                    Label::new("side barcode", "sanger-barcode", "  "),
                ],
            )
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidLabel { .. }));
        assert!(r.get("a").unwrap().labels().is_empty());
    }

    #[test]
    fn find_by_label_returns_only_carriers() {
        let mut r = Registry::new();
        r.create_resource("a", ResourceKind::Tube, ts()).unwrap();
        r.create_resource("b", ResourceKind::Tube, ts()).unwrap();
        r.attach_label("b", "sanger-barcode", "front barcode", "JKL1234")
            .unwrap();

        let hits = r.find_by_label(&LabelMatch {
            label_type: Some("sanger-barcode".into()),
            value: Some("JKL1234".into()),
            name: None,
        });
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].uuid, "b");
    }

    #[test]
    fn of_kind_filters() {
        let mut r = Registry::new();
        r.create_resource("a", ResourceKind::Tube, ts()).unwrap();
        r.create_resource("c", ResourceKind::SpinColumn, ts()).unwrap();
        let spins: Vec<_> = r.of_kind(ResourceKind::SpinColumn).map(|x| &x.uuid).collect();
        assert_eq!(spins, vec!["c"]);
    }
}
