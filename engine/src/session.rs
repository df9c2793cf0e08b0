//! Drawer-style editing of one display entry.
//!
//! Opening an edit is a request/response exchange: [`StagingSession::open_edit`]
//! resolves which staged entry a display position belongs to and hands back
//! an [`EditContext`] holding the editable draft; the caller later commits
//! the edited fields with [`StagingSession::commit_edit`]. The context value
//! is the only thing shared between the two calls.

use crate::{
    ident::IdentityProbe, FieldMap, RecordId, StagedChanges, StagingSession, TempId, UpdatePatch,
};
use serde::{Deserialize, Serialize};

/// How an edit finds its way back into the staged state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EditTarget {
    /// A pending create, addressed by temp id
    Pending(TempId),
    /// A committed row, addressed by junction key
    Committed(RecordId),
}

/// An open edit: the addressed target plus the editable draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditContext {
    target: EditTarget,
    /// Related key of the original row, re-attached on commit
    #[serde(skip_serializing_if = "Option::is_none")]
    related_id: Option<RecordId>,
    /// Editable related-record fields
    draft: FieldMap,
}

impl EditContext {
    /// Where a commit of this context will be routed.
    pub fn target(&self) -> &EditTarget {
        &self.target
    }

    /// Related key of the row being edited, when known.
    pub fn related_id(&self) -> Option<&RecordId> {
        self.related_id.as_ref()
    }

    /// The editable draft fields.
    pub fn draft(&self) -> &FieldMap {
        &self.draft
    }

    /// Mutable access to the draft fields.
    pub fn draft_mut(&mut self) -> &mut FieldMap {
        &mut self.draft
    }
}

impl StagingSession {
    /// Open an edit for the entry at a display position.
    ///
    /// Local entries resolve to their pending create (by position within the
    /// create collection) and are addressed by temp id; committed entries
    /// load the staged patch - or, absent one, the bare committed fields -
    /// and are addressed by junction key. Out-of-range positions yield
    /// `None`.
    pub fn open_edit(&self, display_index: usize) -> Option<EditContext> {
        let items = self.display_items();
        let item = items.get(display_index)?;

        match &item.junction_id {
            None => {
                let committed_count = items.iter().filter(|i| !i.is_local()).count();
                let create_index = item
                    .create_index
                    .or_else(|| display_index.checked_sub(committed_count))?;
                let entry = self.staged.create.get(create_index)?;

                Some(EditContext {
                    target: EditTarget::Pending(entry.temp_id.clone()),
                    related_id: entry.related.id().cloned(),
                    draft: entry.related.fields().clone(),
                })
            }
            Some(junction_id) => {
                let record = self.committed_record(junction_id);
                let draft = match self.staged.update_for(junction_id) {
                    Some(update) => update.fields.clone(),
                    None => record
                        .and_then(|r| r.related.fields().cloned())
                        .unwrap_or_default(),
                };

                Some(EditContext {
                    target: EditTarget::Committed(junction_id.clone()),
                    related_id: record.map(|r| r.related.id().clone()),
                    draft,
                })
            }
        }
    }

    /// Commit edited fields for a previously opened context.
    ///
    /// Temp-id contexts merge into the pending create; junction contexts
    /// stage an update, which re-attaches the related key from the original
    /// committed row.
    pub fn commit_edit(&mut self, context: &EditContext, edits: FieldMap) -> &StagedChanges {
        match &context.target {
            EditTarget::Pending(temp_id) => {
                let probe = IdentityProbe::for_temp(temp_id.clone());
                self.merge_into_pending_create(&probe, edits)
            }
            EditTarget::Committed(junction_id) => {
                let junction_id = junction_id.clone();
                self.stage_update(junction_id, UpdatePatch::fields(edits))
            }
        }
    }
}
