//! Generation-checked slot arena with two-phase deletion.
//!
//! `remove` detaches a value immediately but keeps its slot reserved;
//! `compact` then releases every reserved slot for reuse. A handle whose
//! slot has been reused no longer resolves, so stale handles are detected
//! instead of silently aliasing a newer value.

/// Index plus generation of one arena slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key {
    index: u32,
    generation: u32,
}

impl Key {
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

#[derive(Clone, Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

#[derive(Clone, Debug)]
pub(crate) struct Arena<T> {
    slots: Vec<Slot<T>>,
    /// Slots ready for reuse
    free: Vec<u32>,
    /// Slots emptied by `remove` and awaiting `compact`
    pending: Vec<u32>,
    /// Keys in creation order; removed keys linger until `compact`
    order: Vec<Key>,
    len: usize,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    #[must_use]
    pub(crate) const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            pending: Vec::new(),
            order: Vec::new(),
            len: 0,
        }
    }

    /// Number of live values.
    pub(crate) const fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn insert(&mut self, value: T) -> Key {
        self.len += 1;
        let key = if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            Key {
                index,
                generation: slot.generation,
            }
        } else {
            let index = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
            self.slots.push(Slot {
                generation: 0,
                value: Some(value),
            });
            Key {
                index,
                generation: 0,
            }
        };
        self.order.push(key);
        key
    }

    pub(crate) fn get(&self, key: Key) -> Option<&T> {
        self.slots
            .get(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.value.as_ref())
    }

    pub(crate) fn get_mut(&mut self, key: Key) -> Option<&mut T> {
        self.slots
            .get_mut(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.value.as_mut())
    }

    pub(crate) fn contains(&self, key: Key) -> bool {
        self.get(key).is_some()
    }

    /// Detaches the value; its slot stays reserved until `compact`.
    pub(crate) fn remove(&mut self, key: Key) -> Option<T> {
        let slot = self
            .slots
            .get_mut(key.index as usize)
            .filter(|slot| slot.generation == key.generation)?;
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.pending.push(key.index);
        self.len -= 1;
        Some(value)
    }

    /// Releases the slots of every removed value for reuse.
    pub(crate) fn compact(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let slots = &self.slots;
        self.order.retain(|key| {
            slots
                .get(key.index as usize)
                .is_some_and(|slot| slot.generation == key.generation && slot.value.is_some())
        });
        self.free.append(&mut self.pending);
    }

    /// Keys of live values, in creation order.
    pub(crate) fn keys(&self) -> Vec<Key> {
        self.order.iter().copied().filter(|&key| self.contains(key)).collect()
    }

    /// Live values, in creation order.
    pub(crate) fn values(&self) -> impl Iterator<Item = &T> + '_ {
        self.order.iter().filter_map(|&key| self.get(key))
    }
}
