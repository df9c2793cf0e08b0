//! Consolidated display projection.
//!
//! The single sequence a caller renders: committed rows with staged overlays
//! applied, plus the pending creates. Pure derivation - recomputed from the
//! session state on every call, never stored.
//!
//! # Algorithm
//!
//! 1. Take the committed rows, dropping any whose junction key is marked
//!    for removal (omitted, not flagged - undoing the mark brings the row
//!    back in its original relative position)
//! 2. Overlay each survivor with its staged patch, if one exists: the patch
//!    wins per leaf field, nested objects merge key-by-key; the row is
//!    tagged [`ItemState::Updated`] with the raw patch attached
//! 3. Append the pending creates in stored order, each tagged
//!    [`ItemState::Created`] and annotated with its index in the create
//!    collection
//! 4. When the relation is sortable and any entry carries an order value,
//!    stably sort by it, entries without one last

use crate::{
    ident::IdentityProbe, staging::deep_merge, CommittedRecord, FieldMap, RecordId, RelationMeta,
    SortValue, StagedChanges, TempId,
};
use serde::{Deserialize, Serialize};

/// How a display entry relates to the staged state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemState {
    /// Committed row with no staged patch
    Unchanged,
    /// Committed row overlaid with a staged patch
    Updated,
    /// Pending create
    Created,
}

/// One entry of the consolidated display sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayItem {
    /// Junction key, absent for pending creates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub junction_id: Option<RecordId>,
    /// Temp id, present for pending creates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_id: Option<TempId>,
    /// Key of the related record, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_id: Option<RecordId>,
    /// Merged related-record fields for rendering
    pub fields: FieldMap,
    /// Effective order value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortValue>,
    /// Staging state of this entry
    pub state: ItemState,
    /// The raw staged patch, attached to updated entries for inspection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edits: Option<FieldMap>,
    /// Index into the create collection, for created entries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_index: Option<usize>,
}

impl DisplayItem {
    /// Whether this entry exists only in the session.
    pub fn is_local(&self) -> bool {
        self.junction_id.is_none()
    }

    /// The identity signals by which this entry's pending create can be
    /// found again.
    pub fn probe(&self) -> IdentityProbe {
        IdentityProbe {
            temp_id: self.temp_id.clone(),
            related_id: self.related_id.clone(),
            attached_existing: self.is_local() && self.related_id.is_some(),
        }
    }
}

/// Build the display sequence from committed rows and staged state.
pub fn consolidate(
    committed: &[CommittedRecord],
    staged: &StagedChanges,
    meta: &RelationMeta,
) -> Vec<DisplayItem> {
    let mut items = Vec::with_capacity(committed.len() + staged.create.len());

    for record in committed {
        if staged.is_deleted(&record.id) {
            continue;
        }

        let mut fields = record.related.fields().cloned().unwrap_or_default();
        let update = staged.update_for(&record.id);

        let (state, edits, sort) = match update {
            Some(update) => {
                deep_merge(&mut fields, &update.fields);
                (
                    ItemState::Updated,
                    Some(update.fields.clone()),
                    update.sort.or(record.sort),
                )
            }
            None => (ItemState::Unchanged, None, record.sort),
        };

        items.push(DisplayItem {
            junction_id: Some(record.id.clone()),
            temp_id: None,
            related_id: Some(record.related.id().clone()),
            fields,
            sort,
            state,
            edits,
            create_index: None,
        });
    }

    for (index, entry) in staged.create.iter().enumerate() {
        items.push(DisplayItem {
            junction_id: None,
            temp_id: Some(entry.temp_id.clone()),
            related_id: entry.related.id().cloned(),
            fields: entry.related.fields().clone(),
            sort: entry.sort,
            state: ItemState::Created,
            edits: None,
            create_index: Some(index),
        });
    }

    if meta.is_sortable() && items.iter().any(|item| item.sort.is_some()) {
        items.sort_by_key(|item| item.sort.unwrap_or(SortValue::MAX));
    }

    items
}
