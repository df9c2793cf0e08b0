//! Session-local identity for staged rows.
//!
//! A pending create has no junction key yet, so every later edit, removal,
//! or reorder has to find it again by other means: the temp id minted when
//! it was staged, or - for rows that attach an existing related record - the
//! related key plus that provenance. Collision-free temp ids are a
//! correctness requirement, not a nicety: all matching depends on them.

use crate::{PendingCreate, RecordId};
use serde::{Deserialize, Serialize};

/// Identifier of a pending create, unique within its session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TempId(String);

impl TempId {
    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TempId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Generator of session-local temp ids.
///
/// A monotone counter: ids are never reused, even after the row they named
/// was removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TempIdGen {
    counter: u64,
}

impl TempIdGen {
    /// Create a generator starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint the next id.
    pub fn next_id(&mut self) -> TempId {
        self.counter += 1;
        TempId(format!("tmp_{}", self.counter))
    }

    /// How many ids have been minted.
    pub fn issued(&self) -> u64 {
        self.counter
    }
}

/// The signals by which a pending create can be found again.
///
/// A probe carries a temp id, a related key with attached-existing
/// provenance, or both. Matching tries the temp id first; only a probe
/// without one falls back to the related key, and that fallback is
/// restricted to reference drafts - a brand-new value draft and an attached
/// existing record could otherwise collide on identical field data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityProbe {
    /// Temp id of the target, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_id: Option<TempId>,
    /// Related-record key of the target, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_id: Option<RecordId>,
    /// Whether the target wraps an existing related record
    pub attached_existing: bool,
}

impl IdentityProbe {
    /// Probe by temp id.
    pub fn for_temp(temp_id: TempId) -> Self {
        Self {
            temp_id: Some(temp_id),
            related_id: None,
            attached_existing: false,
        }
    }

    /// Probe by related key, for rows that attach an existing record.
    pub fn for_related(related_id: impl Into<RecordId>) -> Self {
        Self {
            temp_id: None,
            related_id: Some(related_id.into()),
            attached_existing: true,
        }
    }
}

/// Find the pending create a probe points at.
///
/// Returns the index into `entries`, or `None` when nothing matches.
pub fn match_create(entries: &[PendingCreate], probe: &IdentityProbe) -> Option<usize> {
    if let Some(temp_id) = &probe.temp_id {
        return entries.iter().position(|entry| &entry.temp_id == temp_id);
    }

    if probe.attached_existing {
        if let Some(related_id) = &probe.related_id {
            return entries
                .iter()
                .position(|entry| entry.related.id() == Some(related_id));
        }
    }

    None
}
