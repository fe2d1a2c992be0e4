//! Slot arena with stable, never-reused indices

use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use super::ids::ArenaId;

/// Storage for one entity collection
///
/// Removing an element leaves an empty slot behind. Slots are only refilled
/// by [`Arena::restore`], which undo/redo uses to bring an entity back under
/// its original id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(serialize = "T: Serialize", deserialize = "T: Deserialize<'de>"))]
pub struct Arena<I, T> {
    slots: Vec<Option<T>>,
    #[serde(skip)]
    _id: PhantomData<I>,
}

impl<I, T> Default for Arena<I, T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            _id: PhantomData,
        }
    }
}

impl<I: ArenaId, T> Arena<I, T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id the next inserted element will receive
    pub fn next_id(&self) -> I {
        I::from_index(self.slots.len())
    }

    pub fn insert(&mut self, value: T) -> I {
        let id = self.next_id();
        self.slots.push(Some(value));
        id
    }

    /// Put a value back into a specific slot
    pub fn restore(&mut self, id: I, value: T) {
        let index = id.index();
        if index >= self.slots.len() {
            self.slots.resize_with(index + 1, || None);
        }
        self.slots[index] = Some(value);
    }

    pub fn remove(&mut self, id: I) -> Option<T> {
        self.slots.get_mut(id.index()).and_then(Option::take)
    }

    pub fn get(&self, id: I) -> Option<&T> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: I) -> Option<&mut T> {
        self.slots.get_mut(id.index()).and_then(Option::as_mut)
    }

    pub fn contains(&self, id: I) -> bool {
        self.get(id).is_some()
    }

    /// Number of live elements
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Live elements in id order
    pub fn iter(&self) -> impl Iterator<Item = (I, &T)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|value| (I::from_index(index), value)))
    }

    pub fn ids(&self) -> impl Iterator<Item = I> + '_ {
        self.iter().map(|(id, _)| id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::ids::SampleId;

    #[test]
    fn test_ids_are_not_reused() {
        let mut arena: Arena<SampleId, &str> = Arena::new();
        let a = arena.insert("a");
        let b = arena.insert("b");
        assert_eq!(arena.remove(a), Some("a"));

        let c = arena.insert("c");
        assert_ne!(c, a);
        assert_ne!(c, b);
        assert_eq!(arena.len(), 2);
        assert!(!arena.contains(a));
    }

    #[test]
    fn test_restore_fills_original_slot() {
        let mut arena: Arena<SampleId, u32> = Arena::new();
        let a = arena.insert(1);
        arena.remove(a);
        arena.restore(a, 7);
        assert_eq!(arena.get(a), Some(&7));

        arena.restore(SampleId(5), 9);
        assert_eq!(arena.next_id(), SampleId(6));
        assert_eq!(arena.ids().collect::<Vec<_>>(), vec![a, SampleId(5)]);
    }
}
