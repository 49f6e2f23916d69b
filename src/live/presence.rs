// src/live/presence.rs

use std::collections::HashMap;

use crate::live::protocol::{PresenceEntry, PresenceEvent, Role};

/// Live roster of connected participants, rebuilt from channel events.
/// Derived state only, never persisted.
///
/// `join`/`leave` deltas are best-effort and may transiently diverge when
/// messages are dropped; every `sync` snapshot rebuilds the roster from
/// scratch, so divergence self-heals on the next sync. Two participants
/// with the same display name overwrite each other; the source leaves that
/// ambiguity unresolved and so does this roster.
#[derive(Debug, Clone, Default)]
pub struct PresenceRoster {
    entries: HashMap<String, PresenceEntry>,
}

impl PresenceRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: &PresenceEvent) {
        match event {
            PresenceEvent::Sync { state } => {
                self.entries.clear();
                for entry in state {
                    self.entries.insert(entry.name.clone(), entry.clone());
                }
            }
            PresenceEvent::Join { new_presences } => {
                for entry in new_presences {
                    self.entries.insert(entry.name.clone(), entry.clone());
                }
            }
            PresenceEvent::Leave { left_presences } => {
                for entry in left_presences {
                    self.entries.remove(&entry.name);
                }
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Spectator count shown on the presenter dashboard.
    pub fn spectator_count(&self) -> usize {
        self.entries
            .values()
            .filter(|e| e.role == Role::Spectator)
            .count()
    }

    pub fn entries(&self) -> impl Iterator<Item = &PresenceEntry> {
        self.entries.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, role: Role) -> PresenceEntry {
        PresenceEntry {
            name: name.to_string(),
            role,
        }
    }

    #[test]
    fn join_and_leave_update_the_roster() {
        let mut roster = PresenceRoster::new();
        roster.apply(&PresenceEvent::Join {
            new_presences: vec![entry("Ana", Role::Spectator), entry("Luis", Role::Spectator)],
        });
        assert_eq!(roster.spectator_count(), 2);

        roster.apply(&PresenceEvent::Leave {
            left_presences: vec![entry("Luis", Role::Spectator)],
        });
        assert_eq!(roster.spectator_count(), 1);
        assert!(roster.contains("Ana"));
    }

    #[test]
    fn sync_rebuilds_regardless_of_prior_history() {
        let mut roster = PresenceRoster::new();
        // Deltas that will turn out to be stale.
        roster.apply(&PresenceEvent::Join {
            new_presences: vec![
                entry("Ana", Role::Spectator),
                entry("Luis", Role::Spectator),
                entry("Eva", Role::Spectator),
            ],
        });
        roster.apply(&PresenceEvent::Leave {
            left_presences: vec![entry("Ana", Role::Spectator)],
        });

        // The transport snapshot wins wholesale.
        let snapshot = vec![entry("profe", Role::Presenter), entry("Ana", Role::Spectator)];
        roster.apply(&PresenceEvent::Sync {
            state: snapshot.clone(),
        });

        assert_eq!(roster.len(), snapshot.len());
        assert!(roster.contains("profe"));
        assert!(roster.contains("Ana"));
        assert!(!roster.contains("Luis"));
        assert_eq!(roster.spectator_count(), 1);
    }

    #[test]
    fn duplicate_name_overwrites_earlier_entrant() {
        let mut roster = PresenceRoster::new();
        roster.apply(&PresenceEvent::Join {
            new_presences: vec![entry("Ana", Role::Spectator)],
        });
        roster.apply(&PresenceEvent::Join {
            new_presences: vec![entry("Ana", Role::Presenter)],
        });
        assert_eq!(roster.len(), 1);
        assert_eq!(roster.spectator_count(), 0);
    }
}
