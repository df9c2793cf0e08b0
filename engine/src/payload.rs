//! Outbound payload and sanitation.
//!
//! The payload is the bridge between the staged state and whoever persists
//! it: plain field maps keyed by the relation's own field names, with every
//! engine-private annotation stripped. Keys using the `$` marker convention
//! are removed recursively, at every nesting depth, before anything leaves
//! the engine.

use crate::{
    error::Result, Error, FieldMap, RecordId, RelatedDraft, RelationMeta, StagedChanges,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Prefix marking engine-private keys in field data.
const MARKER_PREFIX: char = '$';

/// The staged diff, sanitized for persistence.
///
/// `create` rows carry the related payload under the junction FK field -
/// a bare related key to attach an existing record, a nested field object
/// to create one. `update` rows additionally carry the junction key under
/// the junction PK field. `delete` is the flat list of junction keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagedChangesPayload {
    pub create: Vec<FieldMap>,
    pub update: Vec<FieldMap>,
    pub delete: Vec<RecordId>,
}

impl StagedChangesPayload {
    /// Build the sanitized payload from staged state.
    pub fn from_staged(staged: &StagedChanges, meta: &RelationMeta) -> Self {
        let create = staged
            .create
            .iter()
            .map(|entry| {
                let mut row = FieldMap::new();
                if let (Some(field), Some(parent)) =
                    (&meta.reverse_junction_field, &entry.parent)
                {
                    row.insert(field.clone(), parent.to_value());
                }
                row.insert(
                    meta.junction_field.clone(),
                    related_value(&entry.related, meta),
                );
                if let (Some(field), Some(sort)) = (&meta.sort_field, entry.sort) {
                    row.insert(field.clone(), sort.into());
                }
                row
            })
            .collect();

        let update = staged
            .update
            .iter()
            .map(|entry| {
                let mut row = FieldMap::new();
                row.insert(meta.junction_pk_field.clone(), entry.junction_id.to_value());

                let mut related = strip_fields(&entry.fields);
                if let Some(related_id) = &entry.related_id {
                    // Identity is written after the user fields so a patch
                    // can never overwrite it.
                    related.insert(meta.related_pk_field.clone(), related_id.to_value());
                }
                if !related.is_empty() {
                    row.insert(meta.junction_field.clone(), Value::Object(related));
                }

                if let (Some(field), Some(sort)) = (&meta.sort_field, entry.sort) {
                    row.insert(field.clone(), sort.into());
                }
                row
            })
            .collect();

        Self {
            create,
            update,
            delete: staged.delete.clone(),
        }
    }

    /// Whether the payload carries no changes.
    pub fn is_empty(&self) -> bool {
        self.create.is_empty() && self.update.is_empty() && self.delete.is_empty()
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidPayload(e.to_string()))
    }

    /// Serialize to pretty JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::InvalidPayload(e.to_string()))
    }
}

fn related_value(draft: &RelatedDraft, meta: &RelationMeta) -> Value {
    match draft {
        RelatedDraft::Reference { id, fields } => {
            let stripped = strip_fields(fields);
            if stripped.is_empty() {
                // No layered edits: attach by bare key.
                id.to_value()
            } else {
                let mut object = stripped;
                object.insert(meta.related_pk_field.clone(), id.to_value());
                Value::Object(object)
            }
        }
        RelatedDraft::Value { fields } => Value::Object(strip_fields(fields)),
    }
}

/// Deep-copy a field map, dropping `$`-marked keys at every depth.
pub(crate) fn strip_fields(fields: &FieldMap) -> FieldMap {
    fields
        .iter()
        .filter(|(key, _)| !key.starts_with(MARKER_PREFIX))
        .map(|(key, value)| (key.clone(), strip_value(value)))
        .collect()
}

fn strip_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(strip_fields(map)),
        Value::Array(items) => Value::Array(items.iter().map(strip_value).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CommittedRecord, RelatedRef, StagingSession, UpdatePatch};
    use serde_json::json;

    fn fields(value: serde_json::Value) -> FieldMap {
        value.as_object().unwrap().clone()
    }

    fn test_meta() -> RelationMeta {
        RelationMeta::new("junction_id", "related_item_id", "id")
            .with_reverse_junction_field("collection_id")
            .with_sort_field("sort")
    }

    fn test_session() -> StagingSession {
        let mut session = StagingSession::new(test_meta()).with_parent(42);
        session.set_committed(vec![CommittedRecord::new(
            "j123",
            RelatedRef::Record {
                id: RecordId::Int(1),
                fields: fields(json!({"name": "First"})),
            },
        )]);
        session
    }

    #[test]
    fn attach_existing_serializes_as_bare_key() {
        let mut session = test_session();
        session.stage_existing(1);

        let payload = session.payload();
        assert_eq!(payload.create.len(), 1);
        let row = &payload.create[0];
        assert_eq!(row["collection_id"], json!(42));
        assert_eq!(row["related_item_id"], json!(1));
    }

    #[test]
    fn edited_attachment_serializes_as_object_with_key() {
        let mut session = test_session();
        session.stage_existing(1);
        let temp_id = session.staged().create[0].temp_id.clone();
        session.merge_into_pending_create(
            &crate::IdentityProbe::for_temp(temp_id),
            fields(json!({"name": "Renamed"})),
        );

        let payload = session.payload();
        assert_eq!(
            payload.create[0]["related_item_id"],
            json!({"id": 1, "name": "Renamed"})
        );
    }

    #[test]
    fn new_item_serializes_as_field_object() {
        let mut session = test_session();
        session.stage_new(fields(json!({"name": "New Item"})));

        let payload = session.payload();
        assert_eq!(
            payload.create[0]["related_item_id"],
            json!({"name": "New Item"})
        );
    }

    #[test]
    fn update_row_carries_junction_key_and_identity() {
        let mut session = test_session();
        session.stage_update(
            "j123",
            UpdatePatch::fields(fields(json!({"name": "Updated"}))),
        );

        let payload = session.payload();
        assert_eq!(payload.update.len(), 1);
        let row = &payload.update[0];
        assert_eq!(row["junction_id"], json!("j123"));
        assert_eq!(
            row["related_item_id"],
            json!({"id": 1, "name": "Updated"})
        );
    }

    #[test]
    fn patch_cannot_overwrite_identity() {
        let mut session = test_session();
        session.stage_update(
            "j123",
            UpdatePatch::fields(fields(json!({"id": 999, "name": "n"}))),
        );

        let payload = session.payload();
        // The committed related key wins over the patched "id" field.
        assert_eq!(payload.update[0]["related_item_id"]["id"], json!(1));
    }

    #[test]
    fn pure_sort_update_omits_junction_field() {
        let mut session = test_session();
        session.stage_update("j123", UpdatePatch::sort(4));

        // Seeding still attaches the related key, so the object survives;
        // drop it to model a row for which no committed data was known.
        let payload = session.payload();
        let row = &payload.update[0];
        assert_eq!(row["sort"], json!(4));
        assert_eq!(row["related_item_id"], json!({"id": 1}));

        let mut bare = StagingSession::new(test_meta());
        bare.stage_update("j9", UpdatePatch::sort(2));
        let payload = bare.payload();
        let row = &payload.update[0];
        assert_eq!(row["junction_id"], json!("j9"));
        assert_eq!(row["sort"], json!(2));
        assert!(!row.contains_key("related_item_id"));
    }

    #[test]
    fn markers_are_stripped_at_every_depth() {
        let mut session = test_session();
        let mut deep = json!({"name": "x"});
        for _ in 0..30 {
            deep = json!({"$loading": true, "nested": deep, "items": [{"$type": "created", "ok": 1}]});
        }
        session.stage_new(fields(json!({"root": deep, "$local": true})));

        let payload = session.payload();
        let text = payload.to_json().unwrap();
        assert!(!text.contains("$loading"));
        assert!(!text.contains("$type"));
        assert!(!text.contains("$local"));
        assert!(text.contains("\"ok\":1"));
    }

    #[test]
    fn reference_with_only_markers_collapses_to_bare_key() {
        let mut session = test_session();
        session.stage_existing(7);
        // merge_into_pending_create drops markers on entry; write one
        // directly to model field data arriving from elsewhere.
        let mut next = session.staged().clone();
        next.create[0]
            .related
            .fields_mut()
            .insert("$staged".into(), json!(true));
        session.replace(next);

        let payload = session.payload();
        assert_eq!(payload.create[0]["related_item_id"], json!(7));
    }

    #[test]
    fn delete_passes_through_unchanged() {
        let mut session = test_session();
        session.stage_delete("j123");
        session.stage_delete(RecordId::Int(5));

        let payload = session.payload();
        assert_eq!(
            payload.delete,
            vec![RecordId::from("j123"), RecordId::Int(5)]
        );
    }

    #[test]
    fn sort_values_emit_under_sort_field() {
        let mut session = test_session();
        session.stage_existing(1);
        let items = session.display_items();
        session.reorder(&items);

        let payload = session.payload();
        assert_eq!(payload.update[0]["sort"], json!(1));
        assert_eq!(payload.create[0]["sort"], json!(2));
    }

    #[test]
    fn sort_values_withheld_without_sort_field() {
        let mut session = StagingSession::new(RelationMeta::new(
            "junction_id",
            "related_item_id",
            "id",
        ));
        session.stage_existing(1);
        let items = session.display_items();
        session.reorder(&items);

        let payload = session.payload();
        assert!(!payload.create[0].contains_key("sort"));
    }

    #[test]
    fn json_roundtrip() {
        let mut session = test_session();
        session.stage_new(fields(json!({"name": "x"})));
        session.stage_delete("j123");

        let payload = session.payload();
        let text = payload.to_json().unwrap();
        let parsed: StagedChangesPayload = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, payload);
    }
}
