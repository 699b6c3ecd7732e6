//! Generational slot table with deferred removal.
//!
//! Every object that external code refers to (particles, links, meshes,
//! wind sources, fluid grids) lives in an [`Arena`] and is addressed through
//! a typed [`Handle`]. A handle carries the slot index and the generation the
//! slot had when the object was inserted, so a handle that outlives its
//! object is detected instead of silently aliasing a newer one.
//!
//! Removal is two-phase:
//!
//! ```text
//! remove(h)   -> object marked dead, handle still dereferences this frame
//! compact()   -> dead slots vacated, generation bumped, slot put on free list
//! insert(v)   -> reuses a vacated slot (never a merely-dead one)
//! ```

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use crate::error::SimError;

/// Typed, generation-checked reference into an [`Arena`].
pub struct Handle<T> {
    index: u32,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    const fn new(index: u32, generation: u32) -> Self {
        Self {
            index,
            generation,
            _marker: PhantomData,
        }
    }

    /// Slot index of this handle.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Generation of the slot when this handle was issued.
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<T> PartialOrd for Handle<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Handle<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.index, self.generation).cmp(&(other.index, other.generation))
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({}v{})", self.index, self.generation)
    }
}

#[derive(Debug, Clone)]
enum Entry<T> {
    Occupied {
        generation: u32,
        value: T,
        dead: bool,
    },
    Vacant {
        generation: u32,
    },
}

/// Slot table with generation counters and deferred compaction.
#[derive(Debug, Clone)]
pub struct Arena<T> {
    entries: Vec<Entry<T>>,
    free: Vec<u32>,
    live: usize,
    pending: usize,
    kind: &'static str,
}

impl<T> Arena<T> {
    /// Create an empty arena. `kind` names the stored objects in errors.
    #[must_use]
    pub const fn new(kind: &'static str) -> Self {
        Self {
            entries: Vec::new(),
            free: Vec::new(),
            live: 0,
            pending: 0,
            kind,
        }
    }

    /// Create an empty arena with room for `capacity` objects.
    #[must_use]
    pub fn with_capacity(kind: &'static str, capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            ..Self::new(kind)
        }
    }

    /// Number of live (not removed) objects.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.live
    }

    /// Whether the arena holds no live objects.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Number of objects removed but not yet compacted.
    #[must_use]
    pub const fn pending_removals(&self) -> usize {
        self.pending
    }

    /// Insert a value, reusing a compacted slot when one is available.
    pub fn insert(&mut self, value: T) -> Handle<T> {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.entries[index as usize];
            let generation = match slot {
                Entry::Vacant { generation } => *generation,
                Entry::Occupied { generation, .. } => *generation,
            };
            *slot = Entry::Occupied {
                generation,
                value,
                dead: false,
            };
            return Handle::new(index, generation);
        }

        let index = u32::try_from(self.entries.len()).unwrap_or(u32::MAX);
        self.entries.push(Entry::Occupied {
            generation: 0,
            value,
            dead: false,
        });
        Handle::new(index, 0)
    }

    fn invalid(&self, handle: Handle<T>) -> SimError {
        SimError::InvalidHandle {
            kind: self.kind,
            index: handle.index,
            generation: handle.generation,
        }
    }

    /// Mark an object dead. It stays addressable until [`compact`](Self::compact).
    pub fn remove(&mut self, handle: Handle<T>) -> crate::Result<()> {
        match self.entries.get_mut(handle.index as usize) {
            Some(Entry::Occupied {
                generation, dead, ..
            }) if *generation == handle.generation => {
                if !*dead {
                    *dead = true;
                    self.live -= 1;
                    self.pending += 1;
                }
                Ok(())
            }
            _ => Err(self.invalid(handle)),
        }
    }

    /// Whether the handle refers to an object that has not been removed.
    #[must_use]
    pub fn is_alive(&self, handle: Handle<T>) -> bool {
        matches!(
            self.entries.get(handle.index as usize),
            Some(Entry::Occupied { generation, dead: false, .. }) if *generation == handle.generation
        )
    }

    /// Whether the handle still dereferences (alive, or dead but not yet compacted).
    #[must_use]
    pub fn contains(&self, handle: Handle<T>) -> bool {
        matches!(
            self.entries.get(handle.index as usize),
            Some(Entry::Occupied { generation, .. }) if *generation == handle.generation
        )
    }

    /// Borrow the object behind a handle.
    pub fn get(&self, handle: Handle<T>) -> crate::Result<&T> {
        match self.entries.get(handle.index as usize) {
            Some(Entry::Occupied {
                generation, value, ..
            }) if *generation == handle.generation => Ok(value),
            _ => Err(self.invalid(handle)),
        }
    }

    /// Mutably borrow the object behind a handle.
    pub fn get_mut(&mut self, handle: Handle<T>) -> crate::Result<&mut T> {
        let kind = self.kind;
        match self.entries.get_mut(handle.index as usize) {
            Some(Entry::Occupied {
                generation, value, ..
            }) if *generation == handle.generation => Ok(value),
            _ => Err(SimError::InvalidHandle {
                kind,
                index: handle.index,
                generation: handle.generation,
            }),
        }
    }

    /// Mutably borrow two distinct objects at once.
    pub fn get2_mut(
        &mut self,
        a: Handle<T>,
        b: Handle<T>,
    ) -> crate::Result<(&mut T, &mut T)> {
        if a.index == b.index {
            return Err(SimError::invalid_config(format!(
                "aliased {} handles in get2_mut",
                self.kind
            )));
        }
        // Validate before splitting so the error names the offending handle.
        self.get(a)?;
        self.get(b)?;

        let (lo, hi, swapped) = if a.index < b.index {
            (a.index as usize, b.index as usize, false)
        } else {
            (b.index as usize, a.index as usize, true)
        };
        let kind = self.kind;
        let (head, tail) = self.entries.split_at_mut(hi);
        match (&mut head[lo], &mut tail[0]) {
            (Entry::Occupied { value: va, .. }, Entry::Occupied { value: vb, .. }) => {
                if swapped {
                    Ok((vb, va))
                } else {
                    Ok((va, vb))
                }
            }
            _ => Err(SimError::InvalidHandle {
                kind,
                index: a.index,
                generation: a.generation,
            }),
        }
    }

    /// Vacate dead slots, bump their generation and return the removed values.
    pub fn compact(&mut self) -> Vec<T> {
        if self.pending == 0 {
            return Vec::new();
        }

        let mut removed = Vec::with_capacity(self.pending);
        for (index, entry) in self.entries.iter_mut().enumerate() {
            let (generation, dead) = match entry {
                Entry::Occupied {
                    generation, dead, ..
                } => (*generation, *dead),
                Entry::Vacant { .. } => continue,
            };
            if !dead {
                continue;
            }
            let old = std::mem::replace(
                entry,
                Entry::Vacant {
                    generation: generation.wrapping_add(1),
                },
            );
            if let Entry::Occupied { value, .. } = old {
                removed.push(value);
            }
            self.free.push(u32::try_from(index).unwrap_or(u32::MAX));
        }
        self.pending = 0;
        removed
    }

    /// Drop every object and invalidate every outstanding handle.
    pub fn clear(&mut self) {
        for (index, entry) in self.entries.iter_mut().enumerate() {
            let generation = match entry {
                Entry::Occupied { generation, .. } | Entry::Vacant { generation } => *generation,
            };
            if matches!(entry, Entry::Occupied { .. }) {
                *entry = Entry::Vacant {
                    generation: generation.wrapping_add(1),
                };
                self.free.push(u32::try_from(index).unwrap_or(u32::MAX));
            }
        }
        self.live = 0;
        self.pending = 0;
    }

    /// Iterate over live objects.
    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| match entry {
                Entry::Occupied {
                    generation,
                    value,
                    dead: false,
                } => Some((
                    Handle::new(u32::try_from(index).unwrap_or(u32::MAX), *generation),
                    value,
                )),
                _ => None,
            })
    }

    /// Iterate mutably over live objects.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Handle<T>, &mut T)> {
        self.entries
            .iter_mut()
            .enumerate()
            .filter_map(|(index, entry)| match entry {
                Entry::Occupied {
                    generation,
                    value,
                    dead: false,
                } => Some((
                    Handle::new(u32::try_from(index).unwrap_or(u32::MAX), *generation),
                    value,
                )),
                _ => None,
            })
    }

    /// Iterate over live values.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.iter().map(|(_, v)| v)
    }

    /// Iterate mutably over live values.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.iter_mut().map(|(_, v)| v)
    }

    /// Handles of all live objects, in slot order.
    #[must_use]
    pub fn handles(&self) -> Vec<Handle<T>> {
        self.iter().map(|(h, _)| h).collect()
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new("object")
    }
}
