use std::sync::{Arc, Mutex, PoisonError};

/// Ordered record of transport lifecycle steps, shared by every port of a registry
#[derive(Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: &str) {
        tracing::trace!(entry, "Transport step");
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.to_string());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Index of the first occurrence of `entry`
    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries().iter().position(|e| e == entry)
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries().iter().filter(|e| *e == entry).count()
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_entries() {
        let journal = Journal::new();
        let other = journal.clone();

        journal.record("open");
        other.record("close");

        assert_eq!(journal.entries(), vec!["open", "close"]);
        assert_eq!(other.position("close"), Some(1));
        assert_eq!(journal.count("write"), 0);
    }
}
