//! External collaborators and lookup coordination.
//!
//! The engine never talks to a backend itself: committed junction rows and
//! keyword matches come through [`RelationSource`], implemented by the
//! caller. The helpers here keep two promises the staged state depends on:
//!
//! - failures stop at this boundary - they are logged and surfaced as
//!   absence, never written into the staged collections;
//! - keyword lookups are last-issued-wins - a result that resolves after a
//!   newer lookup was issued is discarded, not applied. There is no true
//!   cancellation of in-flight work, only a generation check on arrival.

use crate::{error::Result, CommittedRecord, FieldMap, RecordId, StagingSession};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};

/// A related record returned by a keyword search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedRecord {
    /// Primary key of the related record
    pub id: RecordId,
    /// Whatever fields the source chose to return
    pub fields: FieldMap,
}

impl RelatedRecord {
    /// Create a search result.
    pub fn new(id: impl Into<RecordId>, fields: FieldMap) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }
}

/// Read-only data source backing one relation.
///
/// Both methods may suspend; neither blocks or is blocked by staging
/// mutations.
#[async_trait]
pub trait RelationSource {
    /// Batch-fetch committed junction rows by junction key.
    async fn fetch_committed(&self, ids: &[RecordId]) -> Result<Vec<CommittedRecord>>;

    /// Find at most one related record matching a keyword.
    async fn find_related_by_keyword(&self, keyword: &str) -> Result<Option<RelatedRecord>>;
}

/// Ticket identifying one issued lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookupTicket(u64);

/// Generation counter implementing the last-issued-wins policy.
///
/// Issue a ticket before awaiting the source; apply the result only while
/// the ticket is still the newest one issued.
#[derive(Debug, Default)]
pub struct SearchState {
    latest: AtomicU64,
}

impl SearchState {
    /// Create a fresh counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a ticket for a lookup about to start.
    pub fn issue(&self) -> LookupTicket {
        LookupTicket(self.latest.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Whether a ticket is still the newest one issued.
    pub fn is_current(&self, ticket: LookupTicket) -> bool {
        self.latest.load(Ordering::Relaxed) == ticket.0
    }
}

/// Outcome of a guarded keyword search.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// The source found a related record, and the lookup is still current
    Match(RelatedRecord),
    /// No match - including source failures, which surface as absence
    NoMatch,
    /// A newer lookup was issued while this one was in flight
    Superseded,
}

/// Run a keyword search behind the last-issued-wins guard.
pub async fn search_related<S>(state: &SearchState, source: &S, keyword: &str) -> SearchOutcome
where
    S: RelationSource + ?Sized,
{
    let ticket = state.issue();

    let hit = match source.find_related_by_keyword(keyword).await {
        Ok(hit) => hit,
        Err(err) => {
            tracing::warn!(keyword, error = %err, "keyword lookup failed");
            None
        }
    };

    if !state.is_current(ticket) {
        tracing::debug!(keyword, "discarding superseded keyword lookup");
        return SearchOutcome::Superseded;
    }

    match hit {
        Some(record) => SearchOutcome::Match(record),
        None => SearchOutcome::NoMatch,
    }
}

/// Fetch committed rows into the session.
///
/// On failure the session's committed rows are left untouched. Returns
/// whether the fetch was applied.
pub async fn load_committed<S>(
    session: &mut StagingSession,
    source: &S,
    ids: &[RecordId],
) -> bool
where
    S: RelationSource + ?Sized,
{
    match source.fetch_committed(ids).await {
        Ok(records) => {
            tracing::debug!(count = records.len(), "loaded committed junction rows");
            session.set_committed(records);
            true
        }
        Err(err) => {
            tracing::warn!(error = %err, "junction fetch failed");
            false
        }
    }
}

/// Stage free-text input: attach the matching related record if the source
/// finds one, otherwise stage a brand-new draft seeded with the referencing
/// field.
///
/// Returns whether anything was staged; a superseded lookup stages nothing.
pub async fn stage_from_input<S>(
    session: &mut StagingSession,
    state: &SearchState,
    source: &S,
    referencing_field: &str,
    input: &str,
) -> bool
where
    S: RelationSource + ?Sized,
{
    match search_related(state, source, input).await {
        SearchOutcome::Match(record) => {
            session.stage_existing(record.id);
            true
        }
        SearchOutcome::NoMatch => {
            let mut fields = FieldMap::new();
            fields.insert(
                referencing_field.to_string(),
                Value::String(input.to_string()),
            );
            session.stage_new(fields);
            true
        }
        SearchOutcome::Superseded => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, RelatedRef, RelationMeta};
    use serde_json::json;

    struct StubSource {
        records: Vec<CommittedRecord>,
        hit: Option<RelatedRecord>,
    }

    #[async_trait]
    impl RelationSource for StubSource {
        async fn fetch_committed(&self, ids: &[RecordId]) -> Result<Vec<CommittedRecord>> {
            Ok(self
                .records
                .iter()
                .filter(|r| ids.contains(&r.id))
                .cloned()
                .collect())
        }

        async fn find_related_by_keyword(
            &self,
            _keyword: &str,
        ) -> Result<Option<RelatedRecord>> {
            Ok(self.hit.clone())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl RelationSource for FailingSource {
        async fn fetch_committed(&self, _ids: &[RecordId]) -> Result<Vec<CommittedRecord>> {
            Err(Error::Lookup("boom".into()))
        }

        async fn find_related_by_keyword(
            &self,
            _keyword: &str,
        ) -> Result<Option<RelatedRecord>> {
            Err(Error::Lookup("boom".into()))
        }
    }

    /// Issues a newer lookup while the current one is in flight.
    struct PreemptingSource<'a> {
        state: &'a SearchState,
    }

    #[async_trait]
    impl RelationSource for PreemptingSource<'_> {
        async fn fetch_committed(&self, _ids: &[RecordId]) -> Result<Vec<CommittedRecord>> {
            Ok(Vec::new())
        }

        async fn find_related_by_keyword(
            &self,
            _keyword: &str,
        ) -> Result<Option<RelatedRecord>> {
            self.state.issue();
            Ok(Some(RelatedRecord::new(1, FieldMap::new())))
        }
    }

    fn test_session() -> StagingSession {
        StagingSession::new(RelationMeta::new("id", "related_item_id", "id"))
    }

    #[test]
    fn tickets_supersede_older_ones() {
        let state = SearchState::new();
        let first = state.issue();
        assert!(state.is_current(first));

        let second = state.issue();
        assert!(!state.is_current(first));
        assert!(state.is_current(second));
    }

    #[tokio::test]
    async fn search_finds_match() {
        let state = SearchState::new();
        let source = StubSource {
            records: Vec::new(),
            hit: Some(RelatedRecord::new(3, FieldMap::new())),
        };

        let outcome = search_related(&state, &source, "alpha").await;
        assert_eq!(
            outcome,
            SearchOutcome::Match(RelatedRecord::new(3, FieldMap::new()))
        );
    }

    #[tokio::test]
    async fn search_failure_surfaces_as_absence() {
        let state = SearchState::new();
        let outcome = search_related(&state, &FailingSource, "alpha").await;
        assert_eq!(outcome, SearchOutcome::NoMatch);
    }

    #[tokio::test]
    async fn superseded_search_is_discarded() {
        let state = SearchState::new();
        let source = PreemptingSource { state: &state };

        // The source found a record, but a newer lookup started meanwhile.
        let outcome = search_related(&state, &source, "alpha").await;
        assert_eq!(outcome, SearchOutcome::Superseded);
    }

    #[tokio::test]
    async fn load_committed_applies_fetch() {
        let mut session = test_session();
        let source = StubSource {
            records: vec![
                CommittedRecord::new("j1", RelatedRef::Id(RecordId::Int(1))),
                CommittedRecord::new("j2", RelatedRef::Id(RecordId::Int(2))),
            ],
            hit: None,
        };

        let applied =
            load_committed(&mut session, &source, &[RecordId::from("j1")]).await;
        assert!(applied);
        assert_eq!(session.committed().len(), 1);
        assert_eq!(session.committed()[0].id, RecordId::from("j1"));
    }

    #[tokio::test]
    async fn load_committed_failure_leaves_session_untouched() {
        let mut session = test_session();
        session.set_committed(vec![CommittedRecord::new(
            "j1",
            RelatedRef::Id(RecordId::Int(1)),
        )]);

        let applied =
            load_committed(&mut session, &FailingSource, &[RecordId::from("j2")]).await;
        assert!(!applied);
        assert_eq!(session.committed().len(), 1);
    }

    #[tokio::test]
    async fn input_attaches_existing_match() {
        let mut session = test_session();
        let state = SearchState::new();
        let source = StubSource {
            records: Vec::new(),
            hit: Some(RelatedRecord::new(
                7,
                json!({"name": "Existing"}).as_object().unwrap().clone(),
            )),
        };

        let staged = stage_from_input(&mut session, &state, &source, "name", "Existing").await;
        assert!(staged);

        let create = &session.staged().create[0];
        assert!(create.related.is_reference());
        assert_eq!(create.related.id(), Some(&RecordId::Int(7)));
    }

    #[tokio::test]
    async fn input_without_match_stages_new_draft() {
        let mut session = test_session();
        let state = SearchState::new();
        let source = StubSource {
            records: Vec::new(),
            hit: None,
        };

        stage_from_input(&mut session, &state, &source, "name", "Brand New").await;

        let create = &session.staged().create[0];
        assert!(!create.related.is_reference());
        assert_eq!(create.related.fields()["name"], json!("Brand New"));
    }

    #[tokio::test]
    async fn input_failure_stages_new_draft() {
        // A failed lookup reads as "no match": the input still becomes a
        // draft instead of being lost.
        let mut session = test_session();
        let state = SearchState::new();

        stage_from_input(&mut session, &state, &FailingSource, "name", "kept").await;
        assert_eq!(session.staged().create.len(), 1);
    }

    #[tokio::test]
    async fn superseded_input_stages_nothing() {
        let mut session = test_session();
        let state = SearchState::new();
        let source = PreemptingSource { state: &state };

        let staged = stage_from_input(&mut session, &state, &source, "name", "old").await;
        assert!(!staged);
        assert!(session.staged().is_empty());
    }
}
