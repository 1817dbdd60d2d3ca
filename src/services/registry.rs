use std::collections::HashSet;
use std::sync::Mutex;

/// Process-lifetime set of content hashes that were accepted for processing
/// and not rolled back. Shared across requests via `Arc` in `AppState` rather
/// than as ambient global state, so tests get isolated registries.
///
/// The check-then-act sequence in the pipeline (contains, then add) is not
/// atomic: two concurrent uploads of identical content can both pass the
/// check. Known limitation, accepted.
#[derive(Debug, Default)]
pub struct DedupRegistry {
    hashes: Mutex<HashSet<String>>,
}

impl DedupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.lock().contains(hash)
    }

    pub fn add(&self, hash: String) {
        self.lock().insert(hash);
    }

    pub fn remove(&self, hash: &str) {
        self.lock().remove(hash);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.hashes.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_then_contains() {
        let registry = DedupRegistry::new();
        assert!(!registry.contains("abc"));

        registry.add("abc".to_string());
        assert!(registry.contains("abc"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_rolls_back_reservation() {
        let registry = DedupRegistry::new();
        registry.add("abc".to_string());
        registry.remove("abc");

        assert!(!registry.contains("abc"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_unknown_hash_is_noop() {
        let registry = DedupRegistry::new();
        registry.add("abc".to_string());
        registry.remove("never-seen");

        assert_eq!(registry.len(), 1);
    }
}
