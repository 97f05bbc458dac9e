use crate::models::{MaterialDelta, MaterialRecord};

/// In-memory copy of one owner's materials, most recent first.
///
/// The store starts unloaded: deltas that arrive while the initial fetch is
/// still in flight are held back and replayed once `finish_load` installs
/// the snapshot. Replay goes through the same idempotent apply path, so a
/// record present in both the snapshot and a buffered insert lands exactly
/// once.
#[derive(Debug, Default)]
pub struct MaterialStore {
    records: Vec<MaterialRecord>,
    pending: Vec<MaterialDelta>,
    loaded: bool,
}

impl MaterialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[MaterialRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Installs the fetched snapshot (already sorted descending by the
    /// source) and replays every buffered delta in arrival order.
    pub fn finish_load(&mut self, records: Vec<MaterialRecord>) {
        self.records = records;
        self.loaded = true;
        for delta in std::mem::take(&mut self.pending) {
            self.apply_loaded(delta);
        }
    }

    /// Applies one delta; returns whether the visible list changed.
    /// Before the snapshot has landed the delta is buffered instead.
    pub fn apply(&mut self, delta: MaterialDelta) -> bool {
        if !self.loaded {
            self.pending.push(delta);
            return false;
        }
        self.apply_loaded(delta)
    }

    fn apply_loaded(&mut self, delta: MaterialDelta) -> bool {
        match delta {
            MaterialDelta::Inserted(record) => {
                if self.position(&record.id).is_some() {
                    return false;
                }
                self.records.insert(0, record);
                true
            }
            MaterialDelta::Updated(record) => match self.position(&record.id) {
                Some(index) => {
                    self.records[index] = record;
                    true
                }
                None => false,
            },
            MaterialDelta::Deleted(id) => match self.position(&id) {
                Some(index) => {
                    self.records.remove(index);
                    true
                }
                None => false,
            },
        }
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.records.iter().position(|record| record.id == id)
    }
}
