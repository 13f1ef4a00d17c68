use std::collections::HashSet;

/// Every external id present in the destination tab, plus the ones added
/// during this run. Grows monotonically.
#[derive(Debug, Clone, Default)]
pub struct DedupLedger {
    ids: HashSet<String>,
    initial_len: usize,
}

impl DedupLedger {
    /// Seed from ids already in the destination. Blank ids are ignored.
    pub fn seed(ids: impl IntoIterator<Item = String>) -> Self {
        let ids: HashSet<String> = ids
            .into_iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();
        let initial_len = ids.len();
        Self { ids, initial_len }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Returns false if the id was already present.
    pub fn insert(&mut self, id: &str) -> bool {
        self.ids.insert(id.to_string())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn initial_len(&self) -> usize {
        self.initial_len
    }

    /// Ids inserted since seeding.
    pub fn added(&self) -> usize {
        self.ids.len() - self.initial_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_ids_are_known_and_not_counted_as_added() {
        let mut ledger = DedupLedger::seed(vec!["a".into(), " b ".into(), "".into(), "a".into()]);
        assert_eq!(ledger.initial_len(), 2);
        assert!(ledger.contains("b"));
        assert!(!ledger.insert("a"));
        assert!(ledger.insert("c"));
        assert_eq!(ledger.added(), 1);
        assert_eq!(ledger.len(), 3);
    }
}
