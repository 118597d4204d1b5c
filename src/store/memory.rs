//! In-process record store.
//!
//! Holds records in memory, assigns ids on create, and keeps a journal of
//! calls. Failures can be queued per operation to exercise retry and partial
//! failure handling.

use super::{RecordSink, RecordSource, StoreResult};
use crate::error::StoreError;
use crate::model::{Materialize, Replicable};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Store call types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    List,
    Create,
    Update,
    Delete,
}

/// One journaled call and the number of items it carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub operation: Operation,
    pub items: usize,
    pub succeeded: bool,
}

struct State<R> {
    records: BTreeMap<i64, R>,
    next_id: i64,
    failures: HashMap<Operation, VecDeque<StoreError>>,
    journal: Vec<Call>,
}

pub struct MemoryStore<R> {
    project: String,
    state: Mutex<State<R>>,
}

impl<R: Replicable> MemoryStore<R> {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            state: Mutex::new(State {
                records: BTreeMap::new(),
                next_id: 1,
                failures: HashMap::new(),
                journal: Vec::new(),
            }),
        }
    }

    /// Seed with `records`. Records without an id, or whose id was already
    /// taken by an earlier record, get a fresh one through `assign_id`.
    pub fn with_records<F>(project: impl Into<String>, records: Vec<R>, mut assign_id: F) -> Self
    where
        F: FnMut(&mut R, i64),
    {
        let store = Self::new(project);
        {
            let mut state = store.state();
            state.next_id = records
                .iter()
                .filter_map(Replicable::id)
                .max()
                .map_or(1, |max| max + 1);

            for mut record in records {
                let id = match record.id() {
                    Some(id) if !state.records.contains_key(&id) => id,
                    taken => {
                        if let Some(id) = taken {
                            tracing::warn!(
                                project = %store.project,
                                id,
                                "Duplicate record id, assigning a new one"
                            );
                        }
                        let id = state.next_id;
                        state.next_id += 1;
                        assign_id(&mut record, id);
                        id
                    }
                };
                state.records.insert(id, record);
            }
        }
        store
    }

    fn state(&self) -> MutexGuard<'_, State<R>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue errors returned by the next calls of `operation`, in order.
    pub fn inject_failures<I>(&self, operation: Operation, errors: I)
    where
        I: IntoIterator<Item = StoreError>,
    {
        self.state()
            .failures
            .entry(operation)
            .or_default()
            .extend(errors);
    }

    /// Current contents in id order.
    pub fn records(&self) -> Vec<R> {
        self.state().records.values().cloned().collect()
    }

    pub fn get(&self, id: i64) -> Option<R> {
        self.state().records.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.state().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn journal(&self) -> Vec<Call> {
        self.state().journal.clone()
    }

    /// Item counts of every call made for `operation`, failed ones included.
    pub fn call_sizes(&self, operation: Operation) -> Vec<usize> {
        self.state()
            .journal
            .iter()
            .filter(|call| call.operation == operation)
            .map(|call| call.items)
            .collect()
    }

    /// Pop a queued failure for `operation`, journaling the call either way.
    fn begin(state: &mut State<R>, operation: Operation, items: usize) -> StoreResult<()> {
        let failure = state
            .failures
            .get_mut(&operation)
            .and_then(VecDeque::pop_front);
        state.journal.push(Call {
            operation,
            items,
            succeeded: failure.is_none(),
        });
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl<R: Replicable> RecordSource<R> for MemoryStore<R> {
    fn project(&self) -> &str {
        &self.project
    }

    async fn list(&self) -> StoreResult<Vec<R>> {
        let mut state = self.state();
        let count = state.records.len();
        Self::begin(&mut state, Operation::List, count)?;
        Ok(state.records.values().cloned().collect())
    }
}

#[async_trait]
impl<K: Materialize> RecordSink<K> for MemoryStore<K::Record> {
    async fn create(&self, items: Vec<K::Material>) -> StoreResult<Vec<K::Record>> {
        let mut state = self.state();
        Self::begin(&mut state, Operation::Create, items.len())?;

        let mut created = Vec::with_capacity(items.len());
        for material in items {
            let id = state.next_id;
            state.next_id += 1;
            let record = K::materialize(material, id);
            state.records.insert(id, record.clone());
            created.push(record);
        }
        Ok(created)
    }

    async fn update(&self, items: Vec<K::Patch>) -> StoreResult<Vec<K::Record>> {
        let mut state = self.state();
        Self::begin(&mut state, Operation::Update, items.len())?;

        // All-or-nothing: reject the batch before touching anything.
        let missing: Vec<i64> = items
            .iter()
            .map(K::patch_target)
            .filter(|id| !state.records.contains_key(id))
            .collect();
        if !missing.is_empty() {
            return Err(StoreError::NotFound { ids: missing });
        }

        let mut updated = Vec::with_capacity(items.len());
        for patch in items {
            let id = K::patch_target(&patch);
            if let Some(record) = state.records.get_mut(&id) {
                K::apply_patch(record, patch);
                updated.push(record.clone());
            }
        }
        Ok(updated)
    }

    async fn delete(&self, ids: Vec<i64>) -> StoreResult<()> {
        let mut state = self.state();
        Self::begin(&mut state, Operation::Delete, ids.len())?;

        let missing: Vec<i64> = ids
            .iter()
            .copied()
            .filter(|id| !state.records.contains_key(id))
            .collect();
        if !missing.is_empty() {
            return Err(StoreError::NotFound { ids: missing });
        }

        for id in ids {
            state.records.remove(&id);
        }
        Ok(())
    }
}
