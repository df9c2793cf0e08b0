//! Record types for committed junction rows and staged changes.
//!
//! A junction row links the owning record to one related record and carries
//! its own primary key. Before a save, edits against the relation exist only
//! as staged values: [`PendingCreate`] for rows that do not exist yet and
//! [`PendingUpdate`] for patches against committed rows.

use crate::{FieldMap, SortValue, TempId};
use serde::{Deserialize, Serialize};

/// Primary key of a junction or related record.
///
/// Backends hand out either numeric or string keys, so both shapes are
/// accepted and serialized as the bare scalar.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Str(String),
}

/// Placeholder key a UI hands out for a junction row that has not been
/// persisted yet. Staging operations treat it as "no identity".
pub const UNSAVED_KEY: &str = "+";

impl RecordId {
    /// Whether this is the not-yet-persisted placeholder key.
    pub fn is_placeholder(&self) -> bool {
        matches!(self, RecordId::Str(s) if s == UNSAVED_KEY)
    }

    /// Read a key out of a JSON value, if it has a key-like shape.
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n.as_i64().map(RecordId::Int),
            serde_json::Value::String(s) => Some(RecordId::Str(s.clone())),
            _ => None,
        }
    }

    /// Render the key as a JSON scalar.
    pub fn to_value(&self) -> serde_json::Value {
        match self {
            RecordId::Int(n) => serde_json::Value::Number((*n).into()),
            RecordId::Str(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl From<i64> for RecordId {
    fn from(n: i64) -> Self {
        RecordId::Int(n)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        RecordId::Str(s.to_string())
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        RecordId::Str(s)
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordId::Int(n) => write!(f, "{}", n),
            RecordId::Str(s) => write!(f, "{}", s),
        }
    }
}

/// Related-record data on a committed junction row: either just the key, or
/// the key plus whatever fields the fetch denormalized onto it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelatedRef {
    Id(RecordId),
    Record { id: RecordId, fields: FieldMap },
}

impl RelatedRef {
    /// Key of the related record.
    pub fn id(&self) -> &RecordId {
        match self {
            RelatedRef::Id(id) => id,
            RelatedRef::Record { id, .. } => id,
        }
    }

    /// Denormalized fields, when the fetch expanded them.
    pub fn fields(&self) -> Option<&FieldMap> {
        match self {
            RelatedRef::Id(_) => None,
            RelatedRef::Record { fields, .. } => Some(fields),
        }
    }
}

/// Related-record payload of a pending create.
///
/// The variant is the provenance of the row: `Reference` wraps an existing
/// related record (edits layer on top of it), `Value` carries brand-new data
/// that will be created together with the junction row. Both lack a junction
/// key, but they must never be conflated - identity resolution matches a
/// `Reference` by its related key, while a `Value` is only ever addressed by
/// temp id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RelatedDraft {
    Reference { id: RecordId, fields: FieldMap },
    Value { fields: FieldMap },
}

impl RelatedDraft {
    /// Draft attaching an existing related record, with no edits yet.
    pub fn reference(id: impl Into<RecordId>) -> Self {
        RelatedDraft::Reference {
            id: id.into(),
            fields: FieldMap::new(),
        }
    }

    /// Draft creating a brand-new related record.
    pub fn value(fields: FieldMap) -> Self {
        RelatedDraft::Value { fields }
    }

    /// Key of the wrapped related record, for `Reference` drafts.
    pub fn id(&self) -> Option<&RecordId> {
        match self {
            RelatedDraft::Reference { id, .. } => Some(id),
            RelatedDraft::Value { .. } => None,
        }
    }

    /// Whether this draft wraps an existing related record.
    pub fn is_reference(&self) -> bool {
        matches!(self, RelatedDraft::Reference { .. })
    }

    /// Field data carried by the draft.
    pub fn fields(&self) -> &FieldMap {
        match self {
            RelatedDraft::Reference { fields, .. } => fields,
            RelatedDraft::Value { fields } => fields,
        }
    }

    /// Mutable field data carried by the draft.
    pub fn fields_mut(&mut self) -> &mut FieldMap {
        match self {
            RelatedDraft::Reference { fields, .. } => fields,
            RelatedDraft::Value { fields } => fields,
        }
    }
}

/// An already-persisted junction row, as fetched from the backend.
///
/// Immutable from the engine's point of view; staged overlays never write
/// into it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommittedRecord {
    /// Junction primary key
    pub id: RecordId,
    /// The related record this row points at
    pub related: RelatedRef,
    /// Order value, when the relation is sortable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortValue>,
}

impl CommittedRecord {
    /// Create a committed row.
    pub fn new(id: impl Into<RecordId>, related: RelatedRef) -> Self {
        Self {
            id: id.into(),
            related,
            sort: None,
        }
    }

    /// Builder-style order value.
    pub fn with_sort(mut self, sort: SortValue) -> Self {
        self.sort = Some(sort);
        self
    }
}

/// A junction row that exists only in the session.
///
/// Removed outright when the user discards it - never tombstoned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingCreate {
    /// Session-local identity, unique for the session lifetime
    pub temp_id: TempId,
    /// Key of the owning record, staged under the reverse junction field
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<RecordId>,
    /// The related-record payload
    pub related: RelatedDraft,
    /// Order value, when the relation is sortable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortValue>,
}

impl PendingCreate {
    /// Create a pending row.
    pub fn new(temp_id: TempId, related: RelatedDraft) -> Self {
        Self {
            temp_id,
            parent: None,
            related,
            sort: None,
        }
    }
}

/// A staged patch against one committed junction row.
///
/// At most one exists per junction key; re-staging merges into it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingUpdate {
    /// Junction primary key of the committed row
    pub junction_id: RecordId,
    /// Key of the related record, carried over from the committed value so
    /// an edit that only touches descriptive fields cannot drop it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_id: Option<RecordId>,
    /// Partial related-record field patch
    pub fields: FieldMap,
    /// Order value, when the relation is sortable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortValue>,
}

impl PendingUpdate {
    /// Create a patch for a committed row.
    pub fn new(junction_id: impl Into<RecordId>, fields: FieldMap) -> Self {
        Self {
            junction_id: junction_id.into(),
            related_id: None,
            fields,
            sort: None,
        }
    }
}
