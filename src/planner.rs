//! Deduplicator / Upsert Planner: classifies each accepted record against
//! the external store as insert, update, or skip-identical.

use async_trait::async_trait;

use crate::errors::ImportError;
use crate::models::{Plan, PlannedAction, Record};

/// Mode for [`LookupStore::apply`]: strict imports want the whole batch in
/// one transaction, lenient imports commit per record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyMode {
    Atomic,
    PerRecord,
}

/// Result of applying a plan batch: how many actions were executed. For a
/// cancelled or failed per-record apply this is the cut-off point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub applied: usize,
}

/// The importer's only view of persistence. The store owns its schema,
/// transport, and timestamps; the importer needs a lookup by natural key
/// and ordered batch application.
#[async_trait]
pub trait LookupStore {
    /// Resolve a `question_id` to the previously stored record, if any.
    async fn get(&self, question_id: &str) -> Result<Option<Record>, ImportError>;

    /// Execute the insert/update actions of a batch in order. Skips are
    /// passed through for ordering but must not touch storage.
    async fn apply(
        &self,
        actions: &[PlannedAction],
        mode: ApplyMode,
    ) -> Result<ApplyOutcome, ImportError>;
}

/// Plan one record against the store. Identity is the `question_id` alone;
/// equality on the canonical fields decides skip vs update, and an update
/// replaces the prior record in full.
pub async fn plan_record<S: LookupStore + ?Sized>(
    store: &S,
    record: Record,
) -> Result<PlannedAction, ImportError> {
    let plan = match store.get(&record.question_id).await? {
        None => Plan::Insert,
        Some(prior) if prior == record => Plan::Skip,
        Some(_) => Plan::Update,
    };
    Ok(PlannedAction {
        plan,
        record,
        applied: false,
    })
}

/// Plan a whole batch, preserving source-document order.
pub async fn plan_batch<S: LookupStore + ?Sized>(
    store: &S,
    records: Vec<Record>,
) -> Result<Vec<PlannedAction>, ImportError> {
    let mut actions = Vec::with_capacity(records.len());
    for record in records {
        actions.push(plan_record(store, record).await?);
    }
    Ok(actions)
}
