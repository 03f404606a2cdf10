use super::Message;

/// Fixed-capacity cyclic window of live buffers.
///
/// Slots are addressed by a monotonically increasing cursor modulo capacity,
/// so installing more messages than the capacity overwrites the oldest slots
/// first. At most one message occupies a slot at any time.
pub struct Ring {
    slots: Vec<Option<Message>>,
    cursor: u64,
}

impl Ring {
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "ring capacity must be > 0");

        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self { slots, cursor: 0 }
    }

    /// Installs `message` at the cursor's slot and advances the cursor.
    /// Returns the displaced occupant, if the slot was taken.
    pub fn install(&mut self, message: Message) -> Option<Message> {
        let idx = (self.cursor % self.slots.len() as u64) as usize;
        self.cursor += 1;
        self.slots[idx].replace(message)
    }

    /// Removes and returns the occupant of `slot`, if any.
    pub fn evict(&mut self, slot: usize) -> Option<Message> {
        self.slots.get_mut(slot).and_then(Option::take)
    }

    pub fn get(&self, slot: usize) -> Option<&Message> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Total number of installs so far.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}
