//! Handle table implementation.
//!
//! This module maps small dense integer handles to owned objects. Each slot
//! carries a generation that advances when the slot is freed, so a handle to
//! a removed object never resolves to whatever reuses its slot.

use crate::traits::IndexError;
use core::fmt;

/// A generation-checked reference to an object in a `HandleTable`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle {
    index: u32,
    generation: u32,
}

impl Handle {
    /// The distinguished invalid handle; it never resolves.
    pub const INVALID: Handle = Handle {
        index: u32::MAX,
        generation: 0,
    };

    /// Returns the slot index.
    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Returns the slot generation.
    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Returns false for the invalid sentinel.
    #[inline]
    pub fn is_valid(&self) -> bool {
        *self != Handle::INVALID
    }
}

impl Default for Handle {
    fn default() -> Self {
        Handle::INVALID
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "#{}.{}", self.index, self.generation)
        } else {
            f.write_str("#invalid")
        }
    }
}

enum Slot<T> {
    Occupied { generation: u32, value: T },
    Free { generation: u32, next_free: Option<u32> },
}

/// Arena of objects addressed by generation-checked handles.
pub struct HandleTable<T> {
    slots: Vec<Slot<T>>,
    free_head: Option<u32>,
    len: usize,
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> HandleTable<T> {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_head: None,
            len: 0,
        }
    }

    /// Stores `value` and returns its handle.
    pub fn insert(&mut self, value: T) -> Result<Handle, IndexError> {
        let handle = match self.free_head {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                let (generation, next_free) = match slot {
                    Slot::Free { generation, next_free } => (*generation, *next_free),
                    Slot::Occupied { .. } => return Err(IndexError::Exhausted),
                };
                *slot = Slot::Occupied { generation, value };
                self.free_head = next_free;
                Handle { index, generation }
            }
            None => {
                let index = u32::try_from(self.slots.len())
                    .ok()
                    .filter(|i| *i != u32::MAX)
                    .ok_or(IndexError::Exhausted)?;
                self.slots.push(Slot::Occupied {
                    generation: 1,
                    value,
                });
                Handle { index, generation: 1 }
            }
        };
        self.len += 1;
        Ok(handle)
    }

    /// Resolves a handle.
    pub fn get(&self, handle: Handle) -> Option<&T> {
        match self.slots.get(handle.index as usize)? {
            Slot::Occupied { generation, value } if *generation == handle.generation => Some(value),
            _ => None,
        }
    }

    /// Resolves a handle for mutation.
    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        match self.slots.get_mut(handle.index as usize)? {
            Slot::Occupied { generation, value } if *generation == handle.generation => Some(value),
            _ => None,
        }
    }

    /// Returns true if the handle resolves.
    pub fn contains(&self, handle: Handle) -> bool {
        self.get(handle).is_some()
    }

    /// Removes the object, invalidating its handle.
    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        match slot {
            Slot::Occupied { generation, .. } if *generation == handle.generation => {}
            _ => return None,
        }
        let next = Slot::Free {
            generation: handle.generation.wrapping_add(1).max(1),
            next_free: self.free_head,
        };
        match core::mem::replace(slot, next) {
            Slot::Occupied { value, .. } => {
                self.free_head = Some(handle.index);
                self.len -= 1;
                Some(value)
            }
            Slot::Free { .. } => None,
        }
    }

    /// Iterates over live objects with their handles, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (Handle, &T)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| match slot {
            Slot::Occupied { generation, value } => Some((
                Handle {
                    index: i as u32,
                    generation: *generation,
                },
                value,
            )),
            Slot::Free { .. } => None,
        })
    }

    /// Returns the number of live objects.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if no object is stored.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_insert_get() {
        let mut table = HandleTable::new();
        let a = table.insert("a").unwrap();
        let b = table.insert("b").unwrap();
        assert_ne!(a, b);
        assert_eq!(table.get(a), Some(&"a"));
        assert_eq!(table.get(b), Some(&"b"));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_stale_handle_rejected() {
        let mut table = HandleTable::new();
        let a = table.insert(1).unwrap();
        assert_eq!(table.remove(a), Some(1));
        assert_eq!(table.get(a), None);
        assert_eq!(table.remove(a), None);

        // The slot is reused under a new generation.
        let b = table.insert(2).unwrap();
        assert_eq!(b.index(), a.index());
        assert_ne!(b.generation(), a.generation());
        assert_eq!(table.get(a), None);
        assert_eq!(table.get(b), Some(&2));
    }

    #[test]
    fn test_invalid_handle() {
        let mut table = HandleTable::new();
        table.insert(1).unwrap();
        assert!(!Handle::INVALID.is_valid());
        assert_eq!(table.get(Handle::INVALID), None);
        assert_eq!(Handle::default(), Handle::INVALID);
        assert_eq!(Handle::INVALID.to_string(), "#invalid");
    }

    #[test]
    fn test_handle_iter_and_mut() {
        let mut table = HandleTable::new();
        let a = table.insert(10).unwrap();
        let b = table.insert(20).unwrap();
        *table.get_mut(b).unwrap() += 1;
        table.remove(a);
        let live: Vec<(Handle, i32)> = table.iter().map(|(h, v)| (h, *v)).collect();
        assert_eq!(live, vec![(b, 21)]);
        assert!(table.contains(b));
        assert!(!table.is_empty());
    }
}
