//! Writing a user-supplied ordering back into the staged state.
//!
//! The caller hands over the whole display sequence in its new order; every
//! entry gets an order value equal to its position. Committed entries stage
//! the value through their patch, local entries carry it directly on the
//! pending create.

use crate::{
    ident::match_create, DisplayItem, FieldMap, PendingUpdate, SortValue, StagedChanges,
    StagingSession,
};

impl StagingSession {
    /// Apply a new ordering of the display sequence.
    ///
    /// Assigns 1-based order values by position. Entries with a junction key
    /// write the value into (or seed) their pending update, preserving any
    /// other staged fields; local entries resolve through the identity rules
    /// and take the value directly. An entry that cannot be matched is
    /// skipped - the rest of the reorder still applies.
    pub fn reorder(&mut self, sequence: &[DisplayItem]) -> &StagedChanges {
        let mut next = self.staged.clone();

        for (position, item) in sequence.iter().enumerate() {
            let order = (position + 1) as SortValue;

            match &item.junction_id {
                Some(junction_id) => {
                    match next
                        .update
                        .iter_mut()
                        .find(|u| &u.junction_id == junction_id)
                    {
                        Some(update) => update.sort = Some(order),
                        None => {
                            let mut update =
                                PendingUpdate::new(junction_id.clone(), FieldMap::new());
                            update.related_id = self.committed_related_id(junction_id);
                            update.sort = Some(order);
                            next.update.push(update);
                        }
                    }
                }
                None => {
                    if let Some(index) = match_create(&next.create, &item.probe()) {
                        next.create[index].sort = Some(order);
                    }
                }
            }
        }

        self.replace(next)
    }
}
