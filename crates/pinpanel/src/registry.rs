//! Pin registry: which pins exist, what they are called, and the last level
//! seen for each.
//!
//! Membership is fixed at construction. Levels are per-pin atomics so a
//! reconciliation pass and a completing write never contend on a shared lock.

use pinconf::PinSpec;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// Logical pin identifier; also the hardware line offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct PinId(pub u32);

impl fmt::Display for PinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for PinId {
    fn from(id: u32) -> Self {
        PinId(id)
    }
}

/// A point-in-time copy of one registered pin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pin {
    pub id: PinId,
    pub display_name: String,
    /// `true` = energized.
    pub level: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("no pins configured")]
    Empty,

    #[error("pin {0} is configured more than once")]
    DuplicatePin(PinId),
}

#[derive(Debug)]
struct Entry {
    id: PinId,
    display_name: String,
    level: AtomicBool,
}

/// Fixed set of pins with their cached levels, sorted by id.
#[derive(Debug)]
pub struct PinRegistry {
    entries: Vec<Entry>,
}

impl PinRegistry {
    /// Build the registry from configuration. Every pin starts de-energized.
    pub fn from_specs(specs: &[PinSpec]) -> Result<Self, RegistryError> {
        if specs.is_empty() {
            return Err(RegistryError::Empty);
        }

        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(specs.len());
        for spec in specs {
            let id = PinId(spec.id);
            if !seen.insert(id) {
                return Err(RegistryError::DuplicatePin(id));
            }
            entries.push(Entry {
                id,
                display_name: spec.display_name(),
                level: AtomicBool::new(false),
            });
        }
        entries.sort_by_key(|e| e.id);

        Ok(Self { entries })
    }

    fn entry(&self, id: PinId) -> Option<&Entry> {
        self.entries
            .binary_search_by_key(&id, |e| e.id)
            .ok()
            .map(|idx| &self.entries[idx])
    }

    pub fn lookup(&self, id: PinId) -> Option<Pin> {
        self.entry(id).map(Entry::to_pin)
    }

    pub fn contains(&self, id: PinId) -> bool {
        self.entry(id).is_some()
    }

    /// All pins in ascending id order.
    pub fn all(&self) -> Vec<Pin> {
        self.entries.iter().map(Entry::to_pin).collect()
    }

    pub fn ids(&self) -> impl Iterator<Item = PinId> + '_ {
        self.entries.iter().map(|e| e.id)
    }

    /// Record a level. Unknown ids are ignored.
    pub fn set_level(&self, id: PinId, level: bool) {
        if let Some(entry) = self.entry(id) {
            entry.level.store(level, Ordering::Release);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Entry {
    fn to_pin(&self) -> Pin {
        Pin {
            id: self.id,
            display_name: self.display_name.clone(),
            level: self.level.load(Ordering::Acquire),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(ids: &[u32]) -> PinRegistry {
        let specs: Vec<PinSpec> = ids.iter().copied().map(PinSpec::new).collect();
        PinRegistry::from_specs(&specs).unwrap()
    }

    #[test]
    fn test_all_is_sorted_by_id() {
        let reg = registry(&[22, 1, 15, 3]);
        let ids: Vec<u32> = reg.all().iter().map(|p| p.id.0).collect();
        assert_eq!(ids, vec![1, 3, 15, 22]);
        // Stable across calls
        assert_eq!(reg.all(), reg.all());
    }

    #[test]
    fn test_lookup() {
        let reg = PinRegistry::from_specs(&[PinSpec::named(7, "Porch")]).unwrap();
        let pin = reg.lookup(PinId(7)).unwrap();
        assert_eq!(pin.display_name, "Porch");
        assert!(!pin.level);
        assert!(reg.lookup(PinId(8)).is_none());
    }

    #[test]
    fn test_set_level_known_and_unknown() {
        let reg = registry(&[1, 2]);
        reg.set_level(PinId(2), true);
        reg.set_level(PinId(99), true);

        assert!(!reg.lookup(PinId(1)).unwrap().level);
        assert!(reg.lookup(PinId(2)).unwrap().level);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn test_empty_is_rejected() {
        assert_eq!(
            PinRegistry::from_specs(&[]).unwrap_err(),
            RegistryError::Empty
        );
    }

    #[test]
    fn test_duplicate_is_rejected() {
        let specs = vec![PinSpec::new(4), PinSpec::new(5), PinSpec::new(4)];
        assert_eq!(
            PinRegistry::from_specs(&specs).unwrap_err(),
            RegistryError::DuplicatePin(PinId(4))
        );
    }
}
