//! In-memory search index (volatile).

use super::{Criteria, IndexDocument, QueryResult, SearchIndex, eval};
use crate::types::{ObjectId, Result};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Volatile search index for tests and the `memory` backend.
#[derive(Debug, Default)]
pub struct MemorySearchIndex {
    documents: RwLock<BTreeMap<ObjectId, IndexDocument>>,
}

impl MemorySearchIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SearchIndex for MemorySearchIndex {
    fn submit(&self, document: &IndexDocument) -> Result<()> {
        self.documents
            .write()
            .insert(document.id.clone(), document.clone());
        Ok(())
    }

    fn delete(&self, id: &ObjectId) -> Result<bool> {
        Ok(self.documents.write().remove(id).is_some())
    }

    fn get(&self, id: &ObjectId) -> Result<Option<IndexDocument>> {
        Ok(self.documents.read().get(id).cloned())
    }

    fn query(&self, criteria: &Criteria) -> Result<QueryResult> {
        let documents = self.documents.read();
        Ok(eval::execute(documents.values(), criteria))
    }

    fn ids(&self) -> Result<Vec<ObjectId>> {
        Ok(self.documents.read().keys().cloned().collect())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.documents.read().len())
    }

    fn clear(&self) -> Result<()> {
        self.documents.write().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::FieldKind;

    fn doc(id: &str, title: &str) -> IndexDocument {
        let mut d = IndexDocument::new(ObjectId::new(id));
        d.add("title_ssim", FieldKind::Keyword, title);
        d
    }

    #[test]
    fn submit_replaces_by_identity() {
        let index = MemorySearchIndex::new();
        index.submit(&doc("a", "Alpha")).expect("submit");
        index.submit(&doc("a", "Beta")).expect("resubmit");

        assert_eq!(index.len().expect("len"), 1);
        let stored = index.get(&ObjectId::new("a")).expect("get").expect("present");
        assert_eq!(stored.first("title_ssim"), Some("Beta"));
    }

    #[test]
    fn query_filters_documents() {
        let index = MemorySearchIndex::new();
        index.submit(&doc("a", "Alpha")).expect("submit");
        index.submit(&doc("b", "Beta")).expect("submit");

        let criteria = Criteria {
            filters: vec![("title_ssim".into(), "Beta".into())],
            rows: 10,
            ..Criteria::default()
        };
        let result = index.query(&criteria).expect("query");
        assert_eq!(result.total, 1);
        assert_eq!(result.rows[0].id, ObjectId::new("b"));

        index.clear().expect("clear");
        assert!(index.is_empty().expect("empty"));
    }
}
