//! Two display slots and the role map that says which one is on screen.
//!
//! Roles are never assigned per slot. The map is a single `active` index, so
//! exactly one slot is `Active` at every instant and [`DoubleBuffer::swap`] is
//! a relabel: slot contents never move.

use crate::reference::ImageReference;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotId {
    A,
    B,
}

impl SlotId {
    pub fn other(self) -> Self {
        match self {
            SlotId::A => SlotId::B,
            SlotId::B => SlotId::A,
        }
    }

    pub fn index(self) -> usize {
        match self {
            SlotId::A => 0,
            SlotId::B => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferRole {
    Active,
    Standby,
}

#[derive(Debug, Clone)]
pub struct SlotContent<H> {
    pub reference: ImageReference,
    pub handle: H,
}

#[derive(Debug)]
pub struct DoubleBuffer<H> {
    slots: [Option<SlotContent<H>>; 2],
    active: SlotId,
}

impl<H> Default for DoubleBuffer<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> DoubleBuffer<H> {
    pub fn new() -> Self {
        Self {
            slots: [None, None],
            active: SlotId::A,
        }
    }

    /// The slot currently holding `role`.
    pub fn slot(&self, role: BufferRole) -> SlotId {
        match role {
            BufferRole::Active => self.active,
            BufferRole::Standby => self.active.other(),
        }
    }

    pub fn role_of(&self, slot: SlotId) -> BufferRole {
        if slot == self.active {
            BufferRole::Active
        } else {
            BufferRole::Standby
        }
    }

    /// Role of each slot, indexed by [`SlotId::index`].
    pub fn roles(&self) -> [BufferRole; 2] {
        [self.role_of(SlotId::A), self.role_of(SlotId::B)]
    }

    /// Stores verified content in the slot currently holding `role`.
    /// Returns the slot written.
    pub fn write(&mut self, role: BufferRole, reference: ImageReference, handle: H) -> SlotId {
        let slot = self.slot(role);
        self.slots[slot.index()] = Some(SlotContent { reference, handle });
        slot
    }

    pub fn current(&self, role: BufferRole) -> Option<&SlotContent<H>> {
        self.slots[self.slot(role).index()].as_ref()
    }

    pub fn reference(&self, role: BufferRole) -> Option<&ImageReference> {
        self.current(role).map(|content| &content.reference)
    }

    /// Exchanges the roles of the two slots. O(1); contents stay put.
    /// Returns the newly active slot.
    pub fn swap(&mut self) -> SlotId {
        self.active = self.active.other();
        self.active
    }

    /// Drops whatever the standby slot holds.
    pub fn clear_standby(&mut self) -> Option<SlotContent<H>> {
        let slot = self.slot(BufferRole::Standby);
        self.slots[slot.index()].take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(s: &str) -> ImageReference {
        ImageReference::parse(s).unwrap()
    }

    fn active_count<H>(buffer: &DoubleBuffer<H>) -> usize {
        buffer
            .roles()
            .iter()
            .filter(|role| **role == BufferRole::Active)
            .count()
    }

    #[test]
    fn starts_empty_with_one_active_slot() {
        let buffer: DoubleBuffer<u32> = DoubleBuffer::new();
        assert_eq!(active_count(&buffer), 1);
        assert!(buffer.current(BufferRole::Active).is_none());
        assert!(buffer.current(BufferRole::Standby).is_none());
    }

    #[test]
    fn swap_relabels_without_moving_content() {
        let mut buffer = DoubleBuffer::new();
        let standby = buffer.write(BufferRole::Standby, r("img://a"), 1u32);
        assert_eq!(buffer.role_of(standby), BufferRole::Standby);
        assert_eq!(active_count(&buffer), 1);

        let promoted = buffer.swap();
        assert_eq!(promoted, standby);
        assert_eq!(active_count(&buffer), 1);
        let active = buffer.current(BufferRole::Active).unwrap();
        assert_eq!(active.reference, r("img://a"));
        assert_eq!(active.handle, 1);
        assert!(buffer.current(BufferRole::Standby).is_none());
    }

    #[test]
    fn consecutive_cycles_alternate_slots() {
        let mut buffer = DoubleBuffer::new();
        let first = buffer.write(BufferRole::Standby, r("img://a"), 1u32);
        buffer.swap();
        let second = buffer.write(BufferRole::Standby, r("img://b"), 2u32);
        assert_ne!(first, second);
        buffer.swap();
        assert_eq!(buffer.reference(BufferRole::Active), Some(&r("img://b")));
        assert_eq!(buffer.reference(BufferRole::Standby), Some(&r("img://a")));

        let dropped = buffer.clear_standby().unwrap();
        assert_eq!(dropped.reference, r("img://a"));
        assert!(buffer.current(BufferRole::Standby).is_none());
        assert_eq!(active_count(&buffer), 1);
    }
}
