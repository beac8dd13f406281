//! Place context memory.
//!
//! Bounded record of recently referenced places. The full insertion history
//! is kept for UI display; only the last few distinct names form the
//! context window injected into chat prompts.

use compass_core::types::Place;

/// Default number of distinct names in the context window.
pub const DEFAULT_CONTEXT_PLACES: usize = 3;

/// Separator between names in the context window.
const SEPARATOR: &str = ", ";

/// Insertion-ordered memory of places discussed in this session.
#[derive(Debug, Clone)]
pub struct PlaceContextMemory {
    entries: Vec<Place>,
    window: usize,
}

impl Default for PlaceContextMemory {
    fn default() -> Self {
        Self::new(DEFAULT_CONTEXT_PLACES)
    }
}

impl PlaceContextMemory {
    /// Create an empty memory whose context window holds `window` names.
    pub fn new(window: usize) -> Self {
        Self {
            entries: Vec::new(),
            window,
        }
    }

    /// Remember a place unless it repeats the most recent display name.
    ///
    /// Returns `true` if the place was appended.
    pub fn remember(&mut self, place: Place) -> bool {
        if self
            .entries
            .last()
            .is_some_and(|last| last.display_name == place.display_name)
        {
            return false;
        }
        self.entries.push(place);
        true
    }

    /// The last `window` distinct names, oldest first, joined for a prompt.
    ///
    /// Empty when nothing has been remembered.
    pub fn context_window(&self) -> String {
        let mut names: Vec<&str> = Vec::with_capacity(self.window);
        for place in self.entries.iter().rev() {
            if names.len() >= self.window {
                break;
            }
            if !names.contains(&place.display_name.as_str()) {
                names.push(&place.display_name);
            }
        }
        names.reverse();
        names.join(SEPARATOR)
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Full insertion history.
    pub fn history(&self) -> &[Place] {
        &self.entries
    }

    pub fn last(&self) -> Option<&Place> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compass_core::types::Coordinate;

    fn place(name: &str) -> Place {
        Place::new(name, Coordinate::new(10.0, 106.0).unwrap())
    }

    #[test]
    fn test_empty_context_window() {
        let memory = PlaceContextMemory::default();
        assert!(memory.is_empty());
        assert_eq!(memory.context_window(), "");
    }

    #[test]
    fn test_remember_appends() {
        let mut memory = PlaceContextMemory::default();
        assert!(memory.remember(place("Huế")));
        assert!(memory.remember(place("Đà Nẵng")));
        assert_eq!(memory.len(), 2);
        assert_eq!(memory.context_window(), "Huế, Đà Nẵng");
    }

    #[test]
    fn test_duplicate_adjacent_ignored() {
        let mut memory = PlaceContextMemory::default();
        assert!(memory.remember(place("Hội An")));
        assert!(!memory.remember(place("Hội An")));
        assert!(!memory.remember(place("Hội An")));
        assert_eq!(memory.len(), 1);
        assert_eq!(memory.context_window(), "Hội An");
    }

    #[test]
    fn test_non_adjacent_duplicate_kept_in_history() {
        let mut memory = PlaceContextMemory::default();
        memory.remember(place("A"));
        memory.remember(place("B"));
        memory.remember(place("A"));
        assert_eq!(memory.len(), 3);
        // Distinct names only, most recent occurrence wins the position.
        assert_eq!(memory.context_window(), "B, A");
    }

    #[test]
    fn test_window_capped_at_three() {
        let mut memory = PlaceContextMemory::default();
        for name in ["A", "B", "C", "D", "E"] {
            memory.remember(place(name));
        }
        assert_eq!(memory.len(), 5);
        assert_eq!(memory.context_window(), "C, D, E");
    }

    #[test]
    fn test_window_property_over_click_sequence() {
        let clicks = ["A", "A", "B", "A", "C", "C", "D", "B", "B", "A", "E", "E"];
        let mut memory = PlaceContextMemory::default();
        for name in clicks {
            memory.remember(place(name));
            let window = memory.context_window();
            let names: Vec<&str> = window.split(", ").collect();
            assert!(names.len() <= 3);
            for pair in names.windows(2) {
                assert_ne!(pair[0], pair[1]);
            }
            let mut unique = names.clone();
            unique.sort_unstable();
            unique.dedup();
            assert_eq!(unique.len(), names.len());
        }
        for pair in memory.history().windows(2) {
            assert_ne!(pair[0].display_name, pair[1].display_name);
        }
    }

    #[test]
    fn test_custom_window() {
        let mut memory = PlaceContextMemory::new(1);
        memory.remember(place("A"));
        memory.remember(place("B"));
        assert_eq!(memory.context_window(), "B");
    }

    #[test]
    fn test_clear() {
        let mut memory = PlaceContextMemory::default();
        memory.remember(place("A"));
        memory.clear();
        assert!(memory.is_empty());
        assert!(memory.last().is_none());
        assert_eq!(memory.context_window(), "");
        // After clear the same name can be remembered again.
        assert!(memory.remember(place("A")));
    }
}
