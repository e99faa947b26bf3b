use std::sync::Arc;

use crate::model::task::Task;

/// Snapshots older than this are dropped from the bottom of the stack.
const MAX_DEPTH: usize = 64;

/// Bounded undo/redo stack of task-tree snapshots.
///
/// A snapshot is a shallow clone of the root list; subtrees stay shared with
/// the live tree through `Arc`, so recording one costs a single vector of
/// pointers regardless of tree size.
#[derive(Debug, Default)]
pub struct UndoHistory {
    undo_stack: Vec<Vec<Arc<Task>>>,
    redo_stack: Vec<Vec<Arc<Task>>>,
}

impl UndoHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the pre-edit state. Call before mutating the tree; any redo
    /// branch is invalidated.
    pub fn push(&mut self, tasks: &[Arc<Task>]) {
        if self.undo_stack.len() == MAX_DEPTH {
            self.undo_stack.remove(0);
        }
        self.undo_stack.push(tasks.to_vec());
        self.redo_stack.clear();
    }

    /// Step back one edit. `current` is parked on the redo stack and the
    /// snapshot to restore is returned.
    pub fn undo(&mut self, current: &[Arc<Task>]) -> Option<Vec<Arc<Task>>> {
        let snap = self.undo_stack.pop()?;
        self.redo_stack.push(current.to_vec());
        Some(snap)
    }

    /// Step forward again after an undo.
    pub fn redo(&mut self, current: &[Arc<Task>]) -> Option<Vec<Arc<Task>>> {
        let snap = self.redo_stack.pop()?;
        self.undo_stack.push(current.to_vec());
        Some(snap)
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }
}
