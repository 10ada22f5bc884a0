//! Snapshot history for undo/redo
//!
//! Each entry is a whole [`GraphSnapshot`] serialized to JSON and
//! compressed with zstd. Restoring an entry replaces the store contents,
//! so no inverse operation is needed per mutation kind.

use std::collections::VecDeque;

use crate::error::{Result, SyncError};
use crate::types::GraphSnapshot;

const COMPRESSION_LEVEL: i32 = 3;

/// Bounded history of compressed graph snapshots
#[derive(Debug)]
pub struct UndoStack {
    entries: VecDeque<Vec<u8>>,
    /// Index of the entry matching the store
    cursor: usize,
    capacity: usize,
}

impl UndoStack {
    /// Create a history keeping at most `capacity` snapshots (minimum 1)
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            cursor: 0,
            capacity: capacity.max(1),
        }
    }

    /// Record a snapshot as the newest state
    ///
    /// Anything that could have been redone is discarded, and the oldest
    /// entries fall off once the capacity is exceeded.
    pub fn push(&mut self, snapshot: &GraphSnapshot) -> Result<()> {
        let json = serde_json::to_vec(snapshot)?;
        let compressed = zstd::encode_all(&json[..], COMPRESSION_LEVEL)
            .map_err(|e| SyncError::Compression(e.to_string()))?;

        self.entries.truncate(self.cursor + 1);
        self.entries.push_back(compressed);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        self.cursor = self.entries.len() - 1;
        Ok(())
    }

    /// Step back; `None` when already at the oldest entry
    pub fn undo(&mut self) -> Option<Result<GraphSnapshot>> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        Some(self.decode(self.cursor))
    }

    /// Step forward; `None` when already at the newest entry
    pub fn redo(&mut self) -> Option<Result<GraphSnapshot>> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        Some(self.decode(self.cursor))
    }

    /// Snapshot at the cursor
    pub fn current(&self) -> Option<Result<GraphSnapshot>> {
        if self.entries.is_empty() {
            None
        } else {
            Some(self.decode(self.cursor))
        }
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = 0;
    }

    /// Total compressed bytes held
    pub fn compressed_size(&self) -> usize {
        self.entries.iter().map(Vec::len).sum()
    }

    fn decode(&self, index: usize) -> Result<GraphSnapshot> {
        let compressed = self
            .entries
            .get(index)
            .ok_or_else(|| SyncError::Compression(format!("no snapshot at {}", index)))?;
        let json = zstd::decode_all(&compressed[..]).map_err(|e| SyncError::Compression(e.to_string()))?;
        Ok(serde_json::from_slice(&json)?)
    }
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::new(100)
    }
}
