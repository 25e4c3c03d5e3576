//! Backend command vocabulary to gesture slot lookup.

use std::collections::HashMap;

use shared::domain::{SlotIndex, GESTURE_SLOT_COUNT};

/// Command aliases per slot, in slot order. The first alias of each slot is
/// its canonical command.
pub const STANDARD_GESTURE_TABLE: &[(&str, usize)] = &[
    ("peace", 0),
    ("screenshot", 0),
    ("stop", 1),
    ("pause_media", 1),
    ("thumbs_up", 2),
    ("volume_up", 2),
    ("thumbs_down", 3),
    ("volume_down", 3),
    ("fist", 4),
    ("mute", 4),
    ("point", 5),
    ("select", 5),
    ("swipe_left", 6),
    ("swipe_right", 6),
    ("next_track", 6),
    ("previous_track", 6),
    ("arms_crossed", 7),
    ("arms_up", 7),
    ("pause_detection", 7),
];

#[derive(Debug, Clone)]
pub struct EventMapper {
    slots: HashMap<String, SlotIndex>,
    canonical: Vec<Option<String>>,
}

impl EventMapper {
    pub fn standard() -> Self {
        Self::from_table(STANDARD_GESTURE_TABLE, GESTURE_SLOT_COUNT)
    }

    /// Builds a mapper over `slot_count` slots. Entries pointing outside
    /// `[0, slot_count)` are skipped.
    pub fn from_table(table: &[(&str, usize)], slot_count: usize) -> Self {
        let mut slots = HashMap::with_capacity(table.len());
        let mut canonical = vec![None; slot_count];
        for (command, slot) in table {
            if *slot >= slot_count {
                tracing::warn!(command, slot, slot_count, "mapper: ignoring out-of-range slot");
                continue;
            }
            let command = command.to_lowercase();
            canonical[*slot].get_or_insert_with(|| command.clone());
            slots.insert(command, SlotIndex(*slot));
        }
        Self { slots, canonical }
    }

    pub fn map(&self, command: &str) -> Option<SlotIndex> {
        self.slots.get(&command.to_lowercase()).copied()
    }

    pub fn slot_count(&self) -> usize {
        self.canonical.len()
    }

    pub fn canonical_command(&self, slot: SlotIndex) -> Option<&str> {
        self.canonical.get(slot.0).and_then(|c| c.as_deref())
    }
}

impl Default for EventMapper {
    fn default() -> Self {
        Self::standard()
    }
}
