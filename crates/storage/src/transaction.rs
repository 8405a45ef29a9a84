//! Nested transaction frames.
//!
//! Each open transaction owns one frame on a stack. A handle names a depth
//! plus the serial of the frame opened there, so a handle kept past its
//! frame's end is rejected even after another transaction reuses the depth.

use crate::journal::Journal;
use core::fmt;
use verdict_core::{Error, Result};

/// Identifies an open transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TxHandle {
    depth: u32,
    serial: u64,
}

impl TxHandle {
    /// The distinguished invalid handle; it never names an open transaction.
    pub const INVALID: TxHandle = TxHandle { depth: 0, serial: 0 };

    /// Returns the nesting depth, 1 for an outer transaction.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Returns false for the invalid sentinel.
    pub fn is_valid(&self) -> bool {
        *self != TxHandle::INVALID
    }
}

impl Default for TxHandle {
    fn default() -> Self {
        TxHandle::INVALID
    }
}

impl fmt::Display for TxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx{}@{}", self.serial, self.depth)
    }
}

struct Frame {
    serial: u64,
    journal: Journal,
}

/// Stack of open transaction frames.
pub struct TxStack {
    frames: Vec<Frame>,
    next_serial: u64,
    max_depth: usize,
}

impl TxStack {
    /// Creates an empty stack allowing `max_depth` nested frames.
    pub fn new(max_depth: usize) -> Self {
        Self {
            frames: Vec::new(),
            next_serial: 1,
            max_depth,
        }
    }

    /// Returns the number of open frames.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Opens a frame.
    pub fn begin(&mut self) -> Result<TxHandle> {
        if self.frames.len() >= self.max_depth {
            return Err(Error::exhausted(format!(
                "transaction depth limit {} reached",
                self.max_depth
            )));
        }
        let serial = self.next_serial;
        self.next_serial += 1;
        self.frames.push(Frame {
            serial,
            journal: Journal::new(),
        });
        Ok(TxHandle {
            depth: self.frames.len() as u32,
            serial,
        })
    }

    /// Returns true if `handle` names an open frame.
    pub fn is_open(&self, handle: TxHandle) -> bool {
        handle.depth >= 1
            && self
                .frames
                .get(handle.depth as usize - 1)
                .map_or(false, |f| f.serial == handle.serial)
    }

    /// Returns the innermost journal, if a transaction is open.
    pub fn journal_mut(&mut self) -> Option<&mut Journal> {
        self.frames.last_mut().map(|f| &mut f.journal)
    }

    /// Iterates over the journals of all open frames, outermost first.
    pub fn journals(&self) -> impl Iterator<Item = &Journal> {
        self.frames.iter().map(|f| &f.journal)
    }

    /// Closes the innermost frame, which `handle` must name.
    ///
    /// Returns the frame's journal when it was the outer frame; otherwise
    /// the journal is merged into the parent and `None` is returned.
    pub fn commit(&mut self, handle: TxHandle) -> Result<Option<Journal>> {
        if !self.is_open(handle) || handle.depth as usize != self.frames.len() {
            return Err(Error::invalid_handle(format!(
                "{} is not the innermost open transaction",
                handle
            )));
        }
        let frame = match self.frames.pop() {
            Some(frame) => frame,
            None => return Err(Error::invalid_handle("no open transaction")),
        };
        match self.frames.last_mut() {
            Some(parent) => {
                parent.journal.merge(frame.journal);
                Ok(None)
            }
            None => Ok(Some(frame.journal)),
        }
    }

    /// Closes `handle`'s frame and every frame nested in it.
    ///
    /// Returns the journals innermost first, which is the order to undo them.
    pub fn rollback(&mut self, handle: TxHandle) -> Result<Vec<Journal>> {
        if !self.is_open(handle) {
            return Err(Error::invalid_handle(format!("{} is not open", handle)));
        }
        let keep = handle.depth as usize - 1;
        let mut undone = Vec::with_capacity(self.frames.len() - keep);
        while self.frames.len() > keep {
            if let Some(frame) = self.frames.pop() {
                undone.push(frame.journal);
            }
        }
        Ok(undone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::JournalEntry;
    use verdict_core::ErrorKind;
    use verdict_index::HandleTable;

    fn entry() -> JournalEntry {
        let mut tables = HandleTable::new();
        JournalEntry::CreateTable {
            table: tables.insert(()).unwrap(),
        }
    }

    #[test]
    fn test_nested_commit_merges() {
        let mut stack = TxStack::new(4);
        let outer = stack.begin().unwrap();
        let inner = stack.begin().unwrap();
        assert_eq!(inner.depth(), 2);
        stack.journal_mut().unwrap().record(entry());

        assert!(stack.commit(inner).unwrap().is_none());
        assert_eq!(stack.depth(), 1);
        let journal = stack.commit(outer).unwrap().unwrap();
        assert_eq!(journal.len(), 1);
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn test_commit_out_of_order() {
        let mut stack = TxStack::new(4);
        let outer = stack.begin().unwrap();
        let _inner = stack.begin().unwrap();
        let err = stack.commit(outer).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidHandle);
        assert_eq!(stack.depth(), 2);
    }

    #[test]
    fn test_stale_handle_rejected() {
        let mut stack = TxStack::new(4);
        let first = stack.begin().unwrap();
        stack.commit(first).unwrap();
        let second = stack.begin().unwrap();
        assert_eq!(first.depth(), second.depth());
        assert!(!stack.is_open(first));
        assert!(stack.commit(first).is_err());
        assert!(stack.rollback(TxHandle::INVALID).is_err());
    }

    #[test]
    fn test_rollback_pops_nested() {
        let mut stack = TxStack::new(4);
        let _outer = stack.begin().unwrap();
        let middle = stack.begin().unwrap();
        let _inner = stack.begin().unwrap();
        let undone = stack.rollback(middle).unwrap();
        assert_eq!(undone.len(), 2);
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn test_depth_limit() {
        let mut stack = TxStack::new(2);
        stack.begin().unwrap();
        stack.begin().unwrap();
        let err = stack.begin().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceExhausted);
    }
}
