//! Local mirror of the server's entry table.
//!
//! Applies decoded [`ReadEvent`]s in arrival order. Updates are ordered by
//! 16-bit sequence numbers that wrap, so "newer" is decided with serial
//! number arithmetic rather than `>`.

use std::collections::{BTreeMap, HashMap};

use nt3_frame::{Entry, ReadEvent};
use tracing::trace;

/// True if sequence number `a` is newer than `b`.
///
/// Numbers within half the u16 range ahead of `b` (modulo 2^16) are newer.
pub fn seq_newer(a: u16, b: u16) -> bool {
    let ahead = a.wrapping_sub(b);
    ahead != 0 && ahead < 0x8000
}

/// Entries by id, with a name index.
#[derive(Debug, Default, Clone)]
pub struct EntryTable {
    entries: BTreeMap<u16, Entry>,
    ids: HashMap<String, u16>,
}

impl EntryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from the assignments collected during a handshake.
    pub fn from_entries(entries: impl IntoIterator<Item = Entry>) -> Self {
        let mut table = Self::new();
        for entry in entries {
            table.assign(entry);
        }
        table
    }

    /// Apply one event. Returns true if the table changed.
    pub fn apply(&mut self, event: &ReadEvent) -> bool {
        match event {
            ReadEvent::EntryAssignment(entry) => {
                self.assign(entry.clone());
                true
            }
            ReadEvent::EntryUpdate(update) => {
                let Some(entry) = self.entries.get_mut(&update.id) else {
                    trace!(id = update.id, "update for unknown entry");
                    return false;
                };
                if entry.entry_type() != update.entry_type() {
                    trace!(
                        id = update.id,
                        have = entry.entry_type().name(),
                        got = update.entry_type().name(),
                        "update type mismatch"
                    );
                    return false;
                }
                if !seq_newer(update.seq, entry.seq) {
                    trace!(id = update.id, seq = update.seq, current = entry.seq, "stale update");
                    return false;
                }
                entry.seq = update.seq;
                entry.value = update.value.clone();
                true
            }
            ReadEvent::EntryFlagsUpdate { id, flags } => match self.entries.get_mut(id) {
                Some(entry) if entry.flags != *flags => {
                    entry.flags = *flags;
                    true
                }
                _ => false,
            },
            ReadEvent::EntryDelete { id } => match self.entries.remove(id) {
                Some(entry) => {
                    self.ids.remove(&entry.name);
                    true
                }
                None => false,
            },
            ReadEvent::ClearAllEntries => {
                let changed = !self.entries.is_empty();
                self.entries.clear();
                self.ids.clear();
                changed
            }
            _ => false,
        }
    }

    fn assign(&mut self, entry: Entry) {
        if let Some(previous) = self.entries.get(&entry.id) {
            if previous.name != entry.name {
                self.ids.remove(&previous.name);
            }
        }
        if let Some(old_id) = self.ids.insert(entry.name.clone(), entry.id) {
            if old_id != entry.id {
                self.entries.remove(&old_id);
            }
        }
        self.entries.insert(entry.id, entry);
    }

    pub fn get(&self, id: u16) -> Option<&Entry> {
        self.entries.get(&id)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Entry> {
        self.ids.get(name).and_then(|id| self.entries.get(id))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }
}

#[cfg(test)]
mod tests {
    use nt3_frame::{EntryUpdate, EntryValue};

    use super::*;

    fn entry(name: &str, id: u16, seq: u16, value: EntryValue) -> Entry {
        Entry {
            name: name.to_string(),
            id,
            seq,
            flags: 0,
            value,
        }
    }

    fn update(id: u16, seq: u16, value: EntryValue) -> ReadEvent {
        ReadEvent::EntryUpdate(EntryUpdate { id, seq, value })
    }

    #[test]
    fn seq_newer_handles_wraparound() {
        assert!(seq_newer(2, 1));
        assert!(!seq_newer(1, 2));
        assert!(!seq_newer(5, 5));
        assert!(seq_newer(0, 0xFFFF));
        assert!(seq_newer(10, 0xFFF0));
        assert!(!seq_newer(0xFFF0, 10));
        assert!(seq_newer(0x7FFF, 0));
        assert!(!seq_newer(0x8000, 0));
    }

    #[test]
    fn assignment_then_newer_update() {
        let mut table = EntryTable::new();
        assert!(table.apply(&ReadEvent::EntryAssignment(entry(
            "/speed",
            1,
            1,
            EntryValue::Double(0.0)
        ))));
        assert!(table.apply(&update(1, 2, EntryValue::Double(4.5))));

        let current = table.get_by_name("/speed").unwrap();
        assert_eq!(current.seq, 2);
        assert_eq!(current.value, EntryValue::Double(4.5));
    }

    #[test]
    fn stale_and_mismatched_updates_are_ignored() {
        let mut table = EntryTable::from_entries([entry("/mode", 3, 10, EntryValue::String("auto".into()))]);

        assert!(!table.apply(&update(3, 9, EntryValue::String("teleop".into()))));
        assert!(!table.apply(&update(3, 10, EntryValue::String("teleop".into()))));
        assert!(!table.apply(&update(3, 11, EntryValue::Boolean(true))));
        assert!(!table.apply(&update(4, 11, EntryValue::String("teleop".into()))));
        assert_eq!(table.get(3).unwrap().value.as_str(), Some("auto"));
    }

    #[test]
    fn update_across_wraparound_is_applied() {
        let mut table = EntryTable::from_entries([entry("/x", 1, 0xFFFE, EntryValue::Boolean(false))]);
        assert!(table.apply(&update(1, 0x0001, EntryValue::Boolean(true))));
        assert_eq!(table.get(1).unwrap().value, EntryValue::Boolean(true));
    }

    #[test]
    fn reassignment_replaces_name_index() {
        let mut table = EntryTable::from_entries([entry("/old", 1, 0, EntryValue::Boolean(false))]);
        table.apply(&ReadEvent::EntryAssignment(entry("/new", 1, 0, EntryValue::Boolean(true))));

        assert_eq!(table.len(), 1);
        assert!(table.get_by_name("/old").is_none());
        assert_eq!(table.get_by_name("/new").unwrap().id, 1);

        table.apply(&ReadEvent::EntryAssignment(entry("/new", 2, 0, EntryValue::Boolean(true))));
        assert_eq!(table.len(), 1);
        assert!(table.get(1).is_none());
        assert_eq!(table.get_by_name("/new").unwrap().id, 2);
    }

    #[test]
    fn flags_delete_and_clear() {
        let mut table = EntryTable::from_entries([
            entry("/a", 1, 0, EntryValue::Boolean(true)),
            entry("/b", 2, 0, EntryValue::Double(1.0)),
        ]);

        assert!(table.apply(&ReadEvent::EntryFlagsUpdate { id: 1, flags: 0x01 }));
        assert!(table.get(1).unwrap().is_persistent());
        assert!(!table.apply(&ReadEvent::EntryFlagsUpdate { id: 1, flags: 0x01 }));
        assert!(!table.apply(&ReadEvent::EntryFlagsUpdate { id: 9, flags: 0x01 }));

        assert!(table.apply(&ReadEvent::EntryDelete { id: 2 }));
        assert!(table.get_by_name("/b").is_none());
        assert!(!table.apply(&ReadEvent::EntryDelete { id: 2 }));

        assert!(table.apply(&ReadEvent::ClearAllEntries));
        assert!(table.is_empty());
        assert!(!table.apply(&ReadEvent::ClearAllEntries));
    }

    #[test]
    fn non_entry_events_do_not_change_table() {
        let mut table = EntryTable::new();
        assert!(!table.apply(&ReadEvent::KeepAlive));
        assert!(!table.apply(&ReadEvent::ServerHelloComplete));
        assert!(table.iter().next().is_none());
    }
}
