//! Staging store - the in-memory state container.
//!
//! A [`StagingSession`] owns everything one editing session needs: the
//! relation metadata, the temp id generator, the committed rows fetched so
//! far, and the three staged collections. Mutations never fail - input that
//! cannot be resolved leaves the state untouched - and every mutation
//! computes the next whole [`StagedChanges`] value before swapping it in, so
//! a concurrent read sees the state before or after an operation, never a
//! partial mix of the three collections.

use crate::{
    ident::{match_create, IdentityProbe},
    payload::{strip_fields, StagedChangesPayload},
    project::{consolidate, DisplayItem},
    CommittedRecord, FieldMap, PendingCreate, PendingUpdate, RecordId, RelatedDraft, RelationMeta,
    SortValue, TempIdGen,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The staged create, update, and delete collections.
///
/// Replaced as one value on every mutation. `delete` keeps arrival order but
/// behaves as a set: membership toggles, and it only ever holds junction
/// keys of committed rows (pending creates are removed outright instead).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagedChanges {
    /// Junction rows that exist only in this session
    pub create: Vec<PendingCreate>,
    /// Patches against committed rows, at most one per junction key
    pub update: Vec<PendingUpdate>,
    /// Junction keys marked for removal
    pub delete: Vec<RecordId>,
}

impl StagedChanges {
    /// Whether nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.create.is_empty() && self.update.is_empty() && self.delete.is_empty()
    }

    /// Whether a junction key is marked for removal.
    pub fn is_deleted(&self, junction_id: &RecordId) -> bool {
        self.delete.contains(junction_id)
    }

    /// The staged patch for a junction key, if one exists.
    pub fn update_for(&self, junction_id: &RecordId) -> Option<&PendingUpdate> {
        self.update.iter().find(|u| &u.junction_id == junction_id)
    }
}

/// A patch handed to [`StagingSession::stage_update`]: partial related-record
/// fields plus an optional order value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePatch {
    /// Partial related-record fields
    pub fields: FieldMap,
    /// Order value for the junction row
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortValue>,
}

impl UpdatePatch {
    /// Patch carrying only related-record fields.
    pub fn fields(fields: FieldMap) -> Self {
        Self { fields, sort: None }
    }

    /// Patch carrying only an order value.
    pub fn sort(sort: SortValue) -> Self {
        Self {
            fields: FieldMap::new(),
            sort: Some(sort),
        }
    }
}

impl From<FieldMap> for UpdatePatch {
    fn from(fields: FieldMap) -> Self {
        UpdatePatch::fields(fields)
    }
}

/// One editing session against a many-to-many relation.
///
/// Constructed by the caller, owned by the caller, passed by reference into
/// every operation - there is no ambient state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagingSession {
    pub(crate) meta: RelationMeta,
    pub(crate) ids: TempIdGen,
    /// Key of the owning record, staged onto creates when known
    pub(crate) parent: Option<RecordId>,
    /// Committed junction rows, as last fetched
    pub(crate) committed: Vec<CommittedRecord>,
    pub(crate) staged: StagedChanges,
}

impl StagingSession {
    /// Create a session for one relation.
    pub fn new(meta: RelationMeta) -> Self {
        Self {
            meta,
            ids: TempIdGen::new(),
            parent: None,
            committed: Vec::new(),
            staged: StagedChanges::default(),
        }
    }

    /// Builder-style owning-record key.
    pub fn with_parent(mut self, parent: impl Into<RecordId>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// The relation metadata.
    pub fn meta(&self) -> &RelationMeta {
        &self.meta
    }

    /// The committed rows currently known to the session.
    pub fn committed(&self) -> &[CommittedRecord] {
        &self.committed
    }

    /// Replace the committed rows after a fetch resolved.
    pub fn set_committed(&mut self, records: Vec<CommittedRecord>) {
        self.committed = records;
    }

    /// The current staged state.
    pub fn staged(&self) -> &StagedChanges {
        &self.staged
    }

    /// Look up a committed row by junction key.
    pub fn committed_record(&self, junction_id: &RecordId) -> Option<&CommittedRecord> {
        self.committed.iter().find(|r| &r.id == junction_id)
    }

    /// Whether a committed row is currently marked for removal.
    pub fn is_marked_deleted(&self, junction_id: &RecordId) -> bool {
        self.staged.is_deleted(junction_id)
    }

    /// The consolidated display sequence for the current state.
    pub fn display_items(&self) -> Vec<DisplayItem> {
        consolidate(&self.committed, &self.staged, &self.meta)
    }

    /// The sanitized outbound payload for the current state.
    pub fn payload(&self) -> StagedChangesPayload {
        StagedChangesPayload::from_staged(&self.staged, &self.meta)
    }

    /// Stage a new junction row.
    ///
    /// Mints a fresh temp id; ids are never reused, even after removal. The
    /// owning-record key is attached when the session knows it.
    pub fn stage_create(&mut self, related: RelatedDraft) -> &StagedChanges {
        let mut entry = PendingCreate::new(self.ids.next_id(), related);
        entry.parent = self.parent.clone();

        let mut next = self.staged.clone();
        next.create.push(entry);
        self.replace(next)
    }

    /// Stage attaching an existing related record.
    pub fn stage_existing(&mut self, related_id: impl Into<RecordId>) -> &StagedChanges {
        self.stage_create(RelatedDraft::reference(related_id))
    }

    /// Stage creating a brand-new related record.
    pub fn stage_new(&mut self, fields: FieldMap) -> &StagedChanges {
        self.stage_create(RelatedDraft::value(fields))
    }

    /// Stage a patch against a committed row.
    ///
    /// No-op for the unsaved placeholder key. An existing patch for the same
    /// junction key absorbs the new one - the incoming patch wins per leaf
    /// field, nested objects merge key-by-key - so at most one update exists
    /// per junction key. The related key is carried over from the committed
    /// value whenever available; an edit that only touches descriptive
    /// fields must not drop the identity of the record it points at.
    pub fn stage_update(
        &mut self,
        junction_id: impl Into<RecordId>,
        patch: impl Into<UpdatePatch>,
    ) -> &StagedChanges {
        let junction_id = junction_id.into();
        if junction_id.is_placeholder() {
            return &self.staged;
        }

        let patch = patch.into();
        let seeded_related = self.committed_related_id(&junction_id);

        let mut next = self.staged.clone();
        match next
            .update
            .iter_mut()
            .find(|u| u.junction_id == junction_id)
        {
            Some(existing) => {
                deep_merge(&mut existing.fields, &patch.fields);
                if patch.sort.is_some() {
                    existing.sort = patch.sort;
                }
                if existing.related_id.is_none() {
                    existing.related_id = seeded_related;
                }
            }
            None => {
                let mut update = PendingUpdate::new(junction_id, patch.fields);
                update.related_id = seeded_related;
                update.sort = patch.sort;
                next.update.push(update);
            }
        }
        self.replace(next)
    }

    /// Toggle removal of a committed row.
    ///
    /// Adding marks the row for deletion; a second toggle restores it. The
    /// update collection is never touched, so staged edits survive a
    /// mark-then-restore round trip.
    pub fn stage_delete(&mut self, junction_id: impl Into<RecordId>) -> &StagedChanges {
        let junction_id = junction_id.into();
        if junction_id.is_placeholder() {
            return &self.staged;
        }

        let mut next = self.staged.clone();
        match next.delete.iter().position(|id| id == &junction_id) {
            Some(index) => {
                next.delete.remove(index);
            }
            None => next.delete.push(junction_id),
        }
        self.replace(next)
    }

    /// Remove a pending create outright.
    ///
    /// Resolves the target through the identity rules; removes exactly that
    /// entry and leaves the rest, and their order, alone. Not-found is a
    /// no-op.
    pub fn remove_pending_create(&mut self, probe: &IdentityProbe) -> &StagedChanges {
        let Some(index) = match_create(&self.staged.create, probe) else {
            return &self.staged;
        };

        let mut next = self.staged.clone();
        next.create.remove(index);
        self.replace(next)
    }

    /// Merge edits into a pending create.
    ///
    /// The patch wins per leaf field; temp id and provenance are preserved.
    /// Not-found is a no-op.
    pub fn merge_into_pending_create(
        &mut self,
        probe: &IdentityProbe,
        patch: FieldMap,
    ) -> &StagedChanges {
        let Some(index) = match_create(&self.staged.create, probe) else {
            return &self.staged;
        };

        let patch = strip_fields(&patch);
        let mut next = self.staged.clone();
        deep_merge(next.create[index].related.fields_mut(), &patch);
        self.replace(next)
    }

    /// Remove one display item: committed rows toggle the delete mark,
    /// local rows leave the create collection.
    pub fn remove_item(&mut self, item: &DisplayItem) -> &StagedChanges {
        match &item.junction_id {
            Some(junction_id) => {
                let junction_id = junction_id.clone();
                self.stage_delete(junction_id)
            }
            None => {
                let probe = item.probe();
                self.remove_pending_create(&probe)
            }
        }
    }

    /// Remove several display items in one pass.
    pub fn remove_items(&mut self, items: &[DisplayItem]) -> &StagedChanges {
        for item in items {
            self.remove_item(item);
        }
        &self.staged
    }

    /// Drop everything staged.
    pub fn reset(&mut self) -> &StagedChanges {
        self.replace(StagedChanges::default())
    }

    pub(crate) fn committed_related_id(&self, junction_id: &RecordId) -> Option<RecordId> {
        self.committed_record(junction_id)
            .map(|record| record.related.id().clone())
    }

    pub(crate) fn replace(&mut self, next: StagedChanges) -> &StagedChanges {
        self.staged = next;
        &self.staged
    }
}

/// Merge `patch` on top of `base`: objects merge key-by-key, everything else
/// is replaced by the incoming value.
pub(crate) fn deep_merge(base: &mut FieldMap, patch: &FieldMap) {
    for (key, incoming) in patch {
        let merged = match (base.get(key), incoming) {
            (Some(Value::Object(existing)), Value::Object(new)) => {
                let mut merged = existing.clone();
                deep_merge(&mut merged, new);
                Value::Object(merged)
            }
            _ => incoming.clone(),
        };
        base.insert(key.clone(), merged);
    }
}
