//! Slot arena holding a traversal's ancestry.
//!
//! Both engines remember which element discovered which, so a failure can be
//! pushed up to every traversal ancestor. The arena stores elements in a
//! `Vec` and links them by index: a parent index per slot and a child index
//! list per slot. Retiring a slot is a flag flip; slots are never reused
//! within one run, so a [`SlotId`] stays valid for the arena's lifetime.

/// Stable index of an element in an [`Arena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(usize);

impl SlotId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug)]
struct Slot<T> {
    value: T,
    parent: Option<SlotId>,
    children: Vec<SlotId>,
    live: bool,
}

/// Parent-linked element storage for one traversal.
///
/// Ids are only minted by [`Arena::insert`]; passing an id from another
/// arena is a logic error and panics on out-of-range access.
#[derive(Debug)]
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Total slots ever inserted, retired ones included.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of slots not yet retired.
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| s.live).count()
    }

    /// Insert a value under an optional parent.
    pub fn insert(&mut self, value: T, parent: Option<SlotId>) -> SlotId {
        let id = SlotId(self.slots.len());
        self.slots.push(Slot {
            value,
            parent,
            children: Vec::new(),
            live: true,
        });
        if let Some(parent) = parent {
            self.slots[parent.0].children.push(id);
        }
        id
    }

    pub fn get(&self, id: SlotId) -> &T {
        &self.slots[id.0].value
    }

    pub fn get_mut(&mut self, id: SlotId) -> &mut T {
        &mut self.slots[id.0].value
    }

    pub fn parent(&self, id: SlotId) -> Option<SlotId> {
        self.slots[id.0].parent
    }

    pub fn children(&self, id: SlotId) -> &[SlotId] {
        &self.slots[id.0].children
    }

    pub fn is_live(&self, id: SlotId) -> bool {
        self.slots[id.0].live
    }

    /// Retire one slot. Returns `true` if it was live.
    pub fn retire(&mut self, id: SlotId) -> bool {
        std::mem::replace(&mut self.slots[id.0].live, false)
    }

    /// Retire a slot and every slot below it. Returns the slots that were
    /// still live, the given one first.
    pub fn retire_subtree(&mut self, id: SlotId) -> Vec<SlotId> {
        let mut retired = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if self.retire(current) {
                retired.push(current);
            }
            stack.extend(self.slots[current.0].children.iter().rev().copied());
        }
        retired
    }

    /// Walk parent links upward, nearest ancestor first. The slot itself is
    /// not included.
    pub fn ancestors(&self, id: SlotId) -> Ancestors<'_, T> {
        Ancestors {
            arena: self,
            next: self.parent(id),
        }
    }

    /// Distance from the top of the ancestry (0 for a slot without parent).
    pub fn depth(&self, id: SlotId) -> usize {
        self.ancestors(id).count()
    }

    /// Every slot in insertion order, retired ones included.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (SlotId, &T)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .map(|(i, slot)| (SlotId(i), &slot.value))
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over a slot's ancestors. See [`Arena::ancestors`].
pub struct Ancestors<'a, T> {
    arena: &'a Arena<T>,
    next: Option<SlotId>,
}

impl<T> Iterator for Ancestors<'_, T> {
    type Item = SlotId;

    fn next(&mut self) -> Option<SlotId> {
        let current = self.next?;
        self.next = self.arena.parent(current);
        Some(current)
    }
}
