//! # Stitch Engine
//!
//! A staging engine for editing many-to-many relations in one batch.
//!
//! This crate provides the core logic behind a relational field editor:
//! attach existing related records, create new ones inline, edit either kind
//! before anything is saved, toggle removal of committed rows, and reorder
//! the whole list - all held in memory as a pending diff until the caller
//! decides to commit.
//!
//! ## Design Principles
//!
//! - **No IO**: The engine has no knowledge of network or storage; fetching
//!   and persistence live behind the [`RelationSource`] trait
//! - **Whole-state replacement**: Every mutation computes the next complete
//!   staged state and swaps it in - readers never see a partial mix
//! - **Infallible staging**: Input that cannot be resolved is a no-op, never
//!   an error
//! - **Testable**: Pure logic, no mocks needed
//!
//! ## Core Concepts
//!
//! ### Staged changes
//!
//! Edits are held in three collections until commit:
//! - [`PendingCreate`] - a junction row that exists only in the session,
//!   identified by a session-local [`TempId`]
//! - [`PendingUpdate`] - a patch against a committed row, at most one per
//!   junction key
//! - a delete set of junction keys, toggled to mark and unmark committed
//!   rows for removal
//!
//! ### Provenance
//!
//! A pending create wraps either an existing related record
//! ([`RelatedDraft::Reference`]) or brand-new data ([`RelatedDraft::Value`]).
//! Both lack a junction key, but they are matched differently when edited or
//! removed later - the variant keeps them apart.
//!
//! ### Projection
//!
//! [`StagingSession::display_items`] merges committed rows with the staged
//! state into the one sequence a caller renders: delete-marked rows omitted,
//! patches overlaid, pending creates appended.
//!
//! ### Payload
//!
//! [`StagingSession::payload`] produces the outbound diff - plain field maps
//! keyed by the relation's field names, with engine-private markers
//! stripped at every nesting depth.
//!
//! ## Quick Start
//!
//! ```rust
//! use serde_json::json;
//! use stitch_engine::{
//!     CommittedRecord, RecordId, RelatedRef, RelationMeta, StagingSession, UpdatePatch,
//! };
//!
//! // 1. Describe the relation's field names
//! let meta = RelationMeta::new("id", "related_item_id", "id").with_sort_field("sort");
//!
//! // 2. Create a session and hand it the committed rows
//! let mut session = StagingSession::new(meta);
//! session.set_committed(vec![CommittedRecord::new(
//!     "j1",
//!     RelatedRef::Record {
//!         id: RecordId::Int(1),
//!         fields: json!({"name": "First"}).as_object().unwrap().clone(),
//!     },
//! )]);
//!
//! // 3. Stage changes
//! session.stage_existing(2);
//! session.stage_update(
//!     "j1",
//!     UpdatePatch::fields(json!({"name": "Renamed"}).as_object().unwrap().clone()),
//! );
//!
//! // 4. Render, then persist
//! let items = session.display_items();
//! assert_eq!(items.len(), 2);
//!
//! let payload = session.payload();
//! assert_eq!(payload.create.len(), 1);
//! assert_eq!(payload.update.len(), 1);
//! assert_eq!(payload.update[0]["id"], json!("j1"));
//! ```
//!
//! ## Collaborators
//!
//! The [`lookup`] module holds the async boundary: [`RelationSource`] for
//! fetching committed rows and searching related records by keyword, plus
//! the last-issued-wins guard that discards stale search results instead of
//! applying them.

pub mod error;
pub mod ident;
pub mod lookup;
pub mod payload;
pub mod project;
pub mod record;
pub mod relation;
pub mod session;
pub mod sort;
pub mod staging;

// Re-export main types at crate root
pub use error::{Error, Result};
pub use ident::{match_create, IdentityProbe, TempId, TempIdGen};
pub use lookup::{
    load_committed, search_related, stage_from_input, LookupTicket, RelatedRecord,
    RelationSource, SearchOutcome, SearchState,
};
pub use payload::StagedChangesPayload;
pub use project::{consolidate, DisplayItem, ItemState};
pub use record::{
    CommittedRecord, PendingCreate, PendingUpdate, RecordId, RelatedDraft, RelatedRef, UNSAVED_KEY,
};
pub use relation::RelationMeta;
pub use session::{EditContext, EditTarget};
pub use staging::{StagedChanges, StagingSession, UpdatePatch};

/// Type aliases for clarity
pub type FieldMap = serde_json::Map<String, serde_json::Value>;
pub type SortValue = u64;
