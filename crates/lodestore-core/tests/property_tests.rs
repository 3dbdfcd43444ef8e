//! # Property-Based Tests
//!
//! Pagination, counting and projection invariants checked with proptest.

use chrono::{TimeZone, Utc};
use lodestore_core::{
    AttributeDescriptor, IndexRole, Indexer, MemoryRecordStore, MemorySearchIndex, ObjectId,
    Registry, Repository, SearchIndex, TypeDescriptor, ValueType, index::tokenize,
};
use proptest::collection::vec;
use proptest::prelude::*;
use std::sync::Arc;

fn registry() -> Arc<Registry> {
    let registry = Registry::new();
    registry
        .register_type(TypeDescriptor::new("Item").with_page_sizes(5, 100))
        .expect("type");
    for descriptor in [
        AttributeDescriptor::new("title", "dc:title", ValueType::String)
            .indexed_as([IndexRole::Search, IndexRole::Sort]),
        AttributeDescriptor::new("status", "bibo:status", ValueType::String)
            .indexed_as([IndexRole::ExactMatch, IndexRole::Facet]),
        AttributeDescriptor::new("subjects", "dc11:subject", ValueType::String)
            .multi()
            .indexed_as([IndexRole::Facet, IndexRole::Search]),
    ] {
        registry.register("Item", descriptor).expect("attribute");
    }
    Arc::new(registry)
}

fn seeded(items: &[(String, bool)]) -> Repository {
    let repo = Repository::with_registry(registry());
    for (title, published) in items {
        repo.create("Item", |o| {
            o.set("title", title.as_str())
                .set("status", if *published { "published" } else { "draft" });
            Ok(())
        })
        .expect("create");
    }
    repo
}

fn ids(objects: &[lodestore_core::LockedObject]) -> Vec<ObjectId> {
    objects.iter().map(|o| o.id().clone()).collect()
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Every page is the matching slice of the full sorted enumeration.
    #[test]
    fn pages_are_slices_of_the_full_enumeration(
        items in vec(("[a-z]{1,6}", any::<bool>()), 0..30),
        limit in 1usize..8,
        offset in 0usize..35,
    ) {
        let repo = seeded(&items);
        let query = repo.query("Item").expect("query").sort_by("title").expect("sort");
        let everything = ids(&query.all().expect("all"));

        let page = ids(&query.clone().offset(offset).limit(limit).to_vec().expect("page"));
        let expected: Vec<ObjectId> = everything.iter().skip(offset).take(limit).cloned().collect();
        prop_assert_eq!(page, expected);
    }

    /// `count` agrees with the length of the full enumeration, per filter.
    #[test]
    fn count_matches_enumeration(items in vec(("[a-z]{1,6}", any::<bool>()), 0..30)) {
        let repo = seeded(&items);
        let all = repo.query("Item").expect("query");
        prop_assert_eq!(all.count().expect("count"), items.len());
        prop_assert_eq!(all.all().expect("all").len(), items.len());

        let published = all.clone().where_eq("status", "published").expect("where");
        let expected = items.iter().filter(|(_, p)| *p).count();
        prop_assert_eq!(published.count().expect("count"), expected);
        prop_assert_eq!(published.all().expect("all").len(), expected);
    }

    /// Repeated terminal operations see the same rows.
    #[test]
    fn enumeration_is_repeatable(items in vec(("[a-z]{1,6}", any::<bool>()), 1..20)) {
        let repo = seeded(&items);
        let query = repo.query("Item").expect("query").sort_by_desc("title").expect("sort");
        let first = ids(&query.to_vec().expect("first pass"));
        let second = ids(&query.to_vec().expect("second pass"));
        prop_assert_eq!(first, second);
    }

    /// Projecting the same snapshot twice yields the same document.
    #[test]
    fn projection_is_idempotent(
        title in "[A-Za-z ]{1,20}",
        subjects in vec("[a-z]{1,8}", 0..5),
    ) {
        let registry = registry();
        let schema = registry.schema("Item").expect("schema");
        let mut values = lodestore_core::Attributes::new();
        values.set("title", title);
        values.set_all("subjects", subjects);
        let at = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).single().expect("timestamp");
        let id = ObjectId::new("fixed");

        let a = Indexer::project(&schema, &id, &values, at, at).expect("project");
        let b = Indexer::project(&schema, &id, &values, at, at).expect("project");
        prop_assert_eq!(a, b);
    }

    /// Reindexing a stored object republishes an identical document.
    #[test]
    fn reindex_is_idempotent(items in vec(("[a-z]{1,6}", any::<bool>()), 1..10)) {
        let index = Arc::new(MemorySearchIndex::new());
        let repo = Repository::new(registry(), Arc::new(MemoryRecordStore::new()), index.clone());
        let mut objects = Vec::new();
        for (title, _) in &items {
            objects.push(
                repo.create("Item", |o| {
                    o.set("title", title.as_str());
                    Ok(())
                })
                .expect("create"),
            );
        }
        for object in &objects {
            let before = index.get(object.id()).expect("get");
            repo.reindex(object).expect("reindex");
            let after = index.get(object.id()).expect("get");
            prop_assert_eq!(before, after);
        }
    }

    /// Tokens are non-empty, lowercase and alphanumeric.
    #[test]
    fn tokens_are_normalized(text in "[A-Za-z0-9 ,.;:'()-]{0,40}") {
        for token in tokenize(&text) {
            prop_assert!(!token.is_empty());
            prop_assert!(token.chars().all(char::is_alphanumeric));
            prop_assert_eq!(token.to_lowercase(), token.clone());
        }
    }
}
