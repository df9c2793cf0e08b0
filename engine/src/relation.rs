//! Relation metadata supplied by the surrounding editor.
//!
//! Field naming comes from outside the engine: which junction field is the
//! primary key, which one points at the related record, and what the related
//! record's own key is called. Supplied once per session and treated as
//! constant.

use serde::{Deserialize, Serialize};

/// Field names describing one many-to-many relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationMeta {
    /// Primary key field of the junction collection
    pub junction_pk_field: String,
    /// Junction field pointing at the related record
    pub junction_field: String,
    /// Primary key field of the related collection
    pub related_pk_field: String,
    /// Junction field pointing back at the owning record
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reverse_junction_field: Option<String>,
    /// Order field of the junction collection, when the relation is sortable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_field: Option<String>,
}

impl RelationMeta {
    /// Create relation metadata from the three mandatory field names.
    pub fn new(
        junction_pk_field: impl Into<String>,
        junction_field: impl Into<String>,
        related_pk_field: impl Into<String>,
    ) -> Self {
        Self {
            junction_pk_field: junction_pk_field.into(),
            junction_field: junction_field.into(),
            related_pk_field: related_pk_field.into(),
            reverse_junction_field: None,
            sort_field: None,
        }
    }

    /// Builder-style reverse junction field.
    pub fn with_reverse_junction_field(mut self, field: impl Into<String>) -> Self {
        self.reverse_junction_field = Some(field.into());
        self
    }

    /// Builder-style sort field.
    pub fn with_sort_field(mut self, field: impl Into<String>) -> Self {
        self.sort_field = Some(field.into());
        self
    }

    /// Whether the relation carries an order field.
    pub fn is_sortable(&self) -> bool {
        self.sort_field.is_some()
    }
}
