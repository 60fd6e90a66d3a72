use crate::error::StoreError;
use crate::models::Position;

/// In-memory positions plus the "data changed" flag.
///
/// This is the session object handed to dialogs and the shell; everything that
/// mutates positions goes through it so the flag stays accurate.
#[derive(Debug, Default)]
pub struct PositionStore {
    positions: Vec<Position>,
    dirty: bool,
}

impl PositionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the contents with freshly loaded records.
    pub fn load(&mut self, records: Vec<Position>) {
        self.positions = records;
        self.positions.sort_by_key(|p| p.id);
        self.dirty = false;
    }

    pub fn add(&mut self, position: Position) -> Result<(), StoreError> {
        let idx = match self.positions.binary_search_by_key(&position.id, |p| p.id) {
            Ok(_) => return Err(StoreError::DuplicateId(position.id)),
            Err(idx) => idx,
        };
        self.positions.insert(idx, position);
        self.dirty = true;
        Ok(())
    }

    pub fn remove(&mut self, id: i64) -> Option<Position> {
        let idx = self.index_of(id)?;
        self.dirty = true;
        Some(self.positions.remove(idx))
    }

    pub fn update(&mut self, position: Position) -> Result<(), StoreError> {
        let idx = self
            .index_of(position.id)
            .ok_or(StoreError::UnknownId(position.id))?;
        self.positions[idx] = position;
        self.dirty = true;
        Ok(())
    }

    pub fn get(&self, id: i64) -> Option<&Position> {
        self.index_of(id).map(|idx| &self.positions[idx])
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Greatest id present, 0 when empty.
    pub fn max_id(&self) -> i64 {
        self.positions.iter().map(|p| p.id).max().unwrap_or(0)
    }

    /// Saturates at `i64::MAX`, where adding it then fails as a duplicate.
    pub fn next_id(&self) -> i64 {
        self.max_id().saturating_add(1)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    fn index_of(&self, id: i64) -> Option<usize> {
        self.positions.binary_search_by_key(&id, |p| p.id).ok()
    }
}
