//! Entity identifiers.

use std::fmt;

/// The ID of a single entity.
///
/// IDs are handed out by a `Universe` and are never reused, so an ID which
/// has been despawned stays invalid forever.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityID(usize);

impl EntityID {
    /// Create a new EntityID given the inner unique ID.
    pub fn new(id: usize) -> EntityID {
        EntityID(id)
    }

    /// Return the inner unique ID.
    pub fn id(&self) -> usize {
        self.0
    }
}

impl fmt::Display for EntityID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity #{}", self.0)
    }
}

/// Where an `EntityID` is in its lifecycle, as seen by one `World`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    /// The ID was never handed out.
    Unallocated,
    /// The ID was reserved but its spawn has not been applied yet.
    Reserved,
    /// The entity exists and has storage.
    Alive,
    /// The entity existed and has since been despawned.
    Despawned,
}

impl EntityState {
    /// Returns true if the entity has storage.
    pub fn is_alive(self) -> bool {
        self == EntityState::Alive
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(EntityID::new(7).to_string(), "entity #7");
        assert!(EntityID::new(1) < EntityID::new(2));
        assert!(EntityState::Alive.is_alive());
        assert!(!EntityState::Reserved.is_alive());
    }
}
