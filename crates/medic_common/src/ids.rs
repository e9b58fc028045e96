//! Record id generation

use uuid::Uuid;

/// Supplies globally unique ids for persisted records
pub trait IdFactory: Send + Sync {
    fn next_id(&self, prefix: &str) -> String;
}

/// Random v4 UUIDs, prefixed with the record kind ("rep-", "pred-", ...)
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIdFactory;

impl IdFactory for UuidIdFactory {
    fn next_id(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, Uuid::new_v4())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ids_are_unique_and_prefixed() {
        let factory = UuidIdFactory;
        let ids: HashSet<String> = (0..100).map(|_| factory.next_id("rep")).collect();
        assert_eq!(ids.len(), 100);
        assert!(ids.iter().all(|id| id.starts_with("rep-")));
    }
}
