use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Counts reported by [`NameRegistry::import_many`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportOutcome {
    /// Raw entries handed in.
    pub offered: usize,
    /// Distinct non-empty names among them.
    pub accepted: usize,
    /// Names that were not yet registered and got appended.
    pub added: usize,
}

impl ImportOutcome {
    /// True when nothing usable was offered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accepted == 0
    }
}

/// Ordered set of unique, trimmed participant names.
///
/// Duplicate and blank input is ignored silently; callers compare the returned
/// flags or sizes to find out whether anything happened.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameRegistry {
    names: IndexSet<String>,
}

impl NameRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry seeded from raw names, with the same filtering as [`Self::import_many`].
    #[must_use]
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut registry = Self::new();
        registry.import_many(names);
        registry
    }

    /// Appends a trimmed name. Returns `false` for blank or already present names.
    pub fn add(&mut self, raw: &str) -> bool {
        let name = raw.trim();
        if name.is_empty() || self.names.contains(name) {
            return false;
        }
        self.names.insert(name.to_owned())
    }

    /// Removes `name`, keeping the order of the others. Returns `false` if absent.
    pub fn remove(&mut self, name: &str) -> bool {
        self.names.shift_remove(name)
    }

    /// Unions `names` into the registry: existing names keep their position,
    /// new ones are appended in first-seen order.
    pub fn import_many<I, S>(&mut self, names: I) -> ImportOutcome
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut outcome = ImportOutcome::default();
        let mut seen = IndexSet::new();
        for raw in names {
            outcome.offered += 1;
            let name = raw.as_ref().trim();
            if !name.is_empty() {
                seen.insert(name.to_owned());
            }
        }
        outcome.accepted = seen.len();
        for name in seen {
            if self.names.insert(name) {
                outcome.added += 1;
            }
        }
        outcome
    }

    /// Drops every name. Returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.names.len();
        self.names.clear();
        removed
    }

    /// Number of names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// True when no names are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Exact, case-sensitive membership test.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Name at `index` in insertion order.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&str> {
        self.names.get_index(index).map(String::as_str)
    }

    /// Names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.names.iter().map(String::as_str)
    }

    /// Owned copy of the names in insertion order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<String> {
        self.names.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_trims_and_ignores_blank_or_duplicate() {
        let mut registry = NameRegistry::new();
        assert!(registry.add("  Ada "));
        assert!(!registry.add("Ada"));
        assert!(!registry.add("   "));
        assert!(registry.add("ada"));
        assert_eq!(registry.snapshot(), vec!["Ada", "ada"]);
    }

    #[test]
    fn remove_keeps_order() {
        let mut registry = NameRegistry::from_names(["a", "b", "c"]);
        assert!(registry.remove("b"));
        assert!(!registry.remove("b"));
        assert_eq!(registry.snapshot(), vec!["a", "c"]);
        assert_eq!(registry.get(1), Some("c"));
    }

    #[test]
    fn import_unions_existing_first() {
        let mut registry = NameRegistry::from_names(["Bo", "Al"]);
        let outcome = registry.import_many([" Cy", "Al", "", "Cy", "Di "]);
        assert_eq!(
            outcome,
            ImportOutcome {
                offered: 5,
                accepted: 3,
                added: 2,
            }
        );
        assert_eq!(registry.snapshot(), vec!["Bo", "Al", "Cy", "Di"]);
    }

    #[test]
    fn import_of_blanks_reports_empty() {
        let mut registry = NameRegistry::from_names(["x", "y"]);
        let outcome = registry.import_many(["", "  ", "\t"]);
        assert!(outcome.is_empty());
        assert_eq!(outcome.offered, 3);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn clear_empties() {
        let mut registry = NameRegistry::from_names(["x", "y"]);
        assert_eq!(registry.clear(), 2);
        assert!(registry.is_empty());
        assert_eq!(registry.clear(), 0);
    }

    #[test]
    fn never_holds_duplicates() {
        let mut registry = NameRegistry::new();
        let script = ["a", " b", "a ", "c", "b", "", "d", "a"];
        for (step, raw) in script.iter().enumerate() {
            match step % 3 {
                0 => {
                    registry.add(raw);
                }
                1 => {
                    registry.import_many([*raw, "c", *raw]);
                }
                _ => {
                    registry.remove(raw.trim());
                    registry.add(raw);
                }
            }
            let names = registry.snapshot();
            let mut deduped = names.clone();
            deduped.sort();
            deduped.dedup();
            assert_eq!(deduped.len(), names.len());
        }
    }
}
