//! # End-to-End Tests
//!
//! A repository item type wired the way a metadata platform would wire it:
//! derived indexes, lifecycle hooks, a type-level validator, then create,
//! query, update and destroy through the public API.
//!
//! ## Tiers
//! - E0: Registration
//! - E1: Object lifecycle
//! - E2: Queries
//! - E3: Destruction

use lodestore_core::{
    AttributeDescriptor, Derivation, DerivedIndexDescriptor, IndexRole, LodestoreError, ObjectId,
    Registry, Repository, TypeDescriptor, ValueType, parse_json_array,
};
use std::sync::Arc;

const PUBLISHED: &str = "http://terms.example.org/status/published";
const DRAFT: &str = "http://terms.example.org/status/draft";

fn item_type() -> TypeDescriptor {
    TypeDescriptor::new("Item")
        .with_page_sizes(10, 50)
        .validate_with(|values, errors| {
            if !values.is_present("license") && !values.is_present("rights") {
                errors.add("base", "needs either license or rights");
            }
        })
        .before_validation(|values| {
            let year = values.get("created").and_then(lodestore_core::dates::year_of);
            match year {
                Some(year) => values.set("sort_year", year),
                None => {
                    values.remove("sort_year");
                }
            }
        })
        .before_save(|values| {
            let creators = values
                .get("creators")
                .and_then(|raw| parse_json_array(raw).ok())
                .unwrap_or_default();
            values.set_all("unordered_creators", creators);
        })
}

fn registry() -> Arc<Registry> {
    let registry = Registry::new();
    registry.register_type(item_type()).expect("Item");
    registry
        .register_type(TypeDescriptor::new("Thesis"))
        .expect("Thesis");

    for descriptor in [
        AttributeDescriptor::new("title", "dc:title", ValueType::String)
            .required()
            .indexed_as([IndexRole::Search, IndexRole::Sort]),
        AttributeDescriptor::new("description", "dc:description", ValueType::Text)
            .indexed_as([IndexRole::Search]),
        AttributeDescriptor::new("status", "bibo:status", ValueType::Uri)
            .required()
            .indexed_as([IndexRole::ExactMatch, IndexRole::Facet]),
        AttributeDescriptor::new("item_type", "dc:type", ValueType::String)
            .indexed_as([IndexRole::ExactMatch]),
        AttributeDescriptor::new("created", "dc:created", ValueType::Date)
            .indexed_as([IndexRole::Sort]),
        AttributeDescriptor::new("sort_year", "ual:sortYear", ValueType::String)
            .indexed_as([IndexRole::Facet, IndexRole::Sort]),
        AttributeDescriptor::new("creators", "bibo:authorList", ValueType::JsonArray),
        AttributeDescriptor::new("unordered_creators", "dc11:creator", ValueType::String)
            .multi()
            .indexed_as([IndexRole::Facet]),
        AttributeDescriptor::new("contributors", "dc11:contributor", ValueType::String)
            .multi(),
        AttributeDescriptor::new("subjects", "dc11:subject", ValueType::String)
            .multi()
            .indexed_as([IndexRole::Facet]),
        AttributeDescriptor::new("doi", "prism:doi", ValueType::String),
        AttributeDescriptor::new("license", "dc:license", ValueType::Uri),
        AttributeDescriptor::new("rights", "dc11:rights", ValueType::String),
        AttributeDescriptor::new("member_of", "pcdm:memberOf", ValueType::Path)
            .multi()
            .indexed_as([IndexRole::Pathing]),
    ] {
        registry.register("Item", descriptor).expect("attribute");
    }

    for derived in [
        DerivedIndexDescriptor::new(
            "doi_without_label",
            Derivation::StripPrefix {
                attribute: "doi".into(),
                prefix: "doi:".into(),
            },
        )
        .indexed_as([IndexRole::ExactMatch]),
        DerivedIndexDescriptor::new(
            "all_contributors",
            Derivation::Union(vec!["creators".into(), "contributors".into()]),
        )
        .multi()
        .indexed_as([IndexRole::Facet, IndexRole::Search]),
        DerivedIndexDescriptor::new(
            "item_type_with_status",
            Derivation::Join {
                attributes: vec!["item_type".into(), "status".into()],
                separator: "_".into(),
            },
        )
        .indexed_as([IndexRole::Facet]),
    ] {
        registry.register_derived("Item", derived).expect("derived");
    }

    registry
        .register(
            "Thesis",
            AttributeDescriptor::new("title", "dc:title", ValueType::String)
                .indexed_as([IndexRole::Search]),
        )
        .expect("thesis title");

    Arc::new(registry)
}

fn repo() -> Repository {
    Repository::with_registry(registry())
}

// =============================================================================
// TIER E0: REGISTRATION
// =============================================================================

mod e0_registration {
    use super::*;

    #[test]
    fn field_names_follow_roles() {
        let registry = registry();
        let field = |attr: &str, role| registry.index_field_for("Item", attr, role).expect("field");
        assert_eq!(field("title", IndexRole::Search), "title_tsim");
        assert_eq!(field("description", IndexRole::Search), "description_tesim");
        assert_eq!(field("created", IndexRole::Sort), "created_dtsi");
        assert_eq!(field("status", IndexRole::Facet), "status_sim");
        assert_eq!(field("member_of", IndexRole::Pathing), "member_of_dpsim");
        assert_eq!(field("all_contributors", IndexRole::Facet), "all_contributors_sim");
    }

    #[test]
    fn describe_returns_descriptor() {
        let registry = registry();
        let status = registry.describe("Item", "status").expect("status");
        assert_eq!(status.predicate, "bibo:status");
        assert!(status.required);
        assert_eq!(registry.derived_indexes("Item").expect("derived").len(), 3);
    }
}

// =============================================================================
// TIER E1: OBJECT LIFECYCLE
// =============================================================================

mod e1_lifecycle {
    use super::*;

    #[test]
    fn create_runs_hooks_and_round_trips() {
        let repo = repo();
        let item = repo
            .create("Item", |o| {
                o.set("title", "Alpha")
                    .set("status", PUBLISHED)
                    .set("created", "2011-03-02")
                    .set("creators", r#"["Doe, Jane","Roe, Rick"]"#)
                    .set("rights", "All rights reserved");
                Ok(())
            })
            .expect("create");

        assert_eq!(item.get("sort_year"), Some("2011"));
        assert_eq!(item.get_all("unordered_creators"), ["Doe, Jane", "Roe, Rick"]);

        let found = repo.find(item.id(), &["Item"]).expect("find");
        assert_eq!(found.values(), item.values());
        assert_eq!(found.created_at(), item.created_at());
    }

    #[test]
    fn validation_collects_every_error_and_persists_nothing() {
        let repo = repo();
        let mut item = repo.new_object("Item").expect("new");
        let result = item.unlock_and_mutate(&repo, |o| {
            o.set("created", "not a date");
            Ok(())
        });

        let Err(LodestoreError::Validation(errors)) = result else {
            unreachable!("expected validation failure");
        };
        assert_eq!(errors.on("title"), vec!["is required"]);
        assert_eq!(errors.on("status"), vec!["is required"]);
        assert_eq!(errors.on("base").len(), 1);
        assert_eq!(errors.on("created").len(), 1);
        assert!(!repo.exists(item.id()).expect("exists"));
        assert_eq!(repo.document_count().expect("documents"), 0);
    }

    #[test]
    fn publishing_moves_item_between_status_queries() {
        let repo = repo();
        let mut a = repo
            .create("Item", |o| {
                o.set("title", "A").set("status", DRAFT).set("rights", "CC0");
                Ok(())
            })
            .expect("create");

        let drafts = repo
            .query("Item")
            .expect("query")
            .where_eq("status", DRAFT)
            .expect("where");
        let published = repo
            .query("Item")
            .expect("query")
            .where_eq("status", PUBLISHED)
            .expect("where");
        let ids = |rows: Vec<lodestore_core::LockedObject>| {
            rows.iter().map(|o| o.id().clone()).collect::<Vec<ObjectId>>()
        };

        assert_eq!(ids(drafts.to_vec().expect("drafts")), vec![a.id().clone()]);
        assert!(published.to_vec().expect("published").is_empty());

        a.unlock_and_mutate(&repo, |o| {
            o.set("status", PUBLISHED);
            Ok(())
        })
        .expect("publish");

        assert!(drafts.to_vec().expect("drafts").is_empty());
        let rows = published.to_vec().expect("published");
        assert_eq!(ids(rows.clone()), vec![a.id().clone()]);
        assert_eq!(rows[0].get("title"), Some("A"));
    }

    #[test]
    fn update_keeps_created_at_and_bumps_updated_at() {
        let repo = repo();
        let mut item = repo
            .create("Item", |o| {
                o.set("title", "Alpha").set("status", DRAFT).set("rights", "CC0");
                Ok(())
            })
            .expect("create");
        let created = item.created_at();

        item.unlock_and_mutate(&repo, |o| {
            o.set("title", "Alpha, revised");
            Ok(())
        })
        .expect("update");

        assert_eq!(item.created_at(), created);
        assert!(item.updated_at() >= created);
        let found = repo.find(item.id(), &[]).expect("find");
        assert_eq!(found.get("title"), Some("Alpha, revised"));
    }
}

// =============================================================================
// TIER E2: QUERIES
// =============================================================================

mod e2_queries {
    use super::*;

    fn seeded() -> Repository {
        let repo = repo();
        for (title, status, item_type, doi) in [
            ("Alpha", PUBLISHED, "article", "doi:10.1/a"),
            ("Bravo", DRAFT, "article", "doi:10.1/b"),
            ("Charlie", PUBLISHED, "book", "doi:10.1/c"),
        ] {
            repo.create("Item", |o| {
                o.set("title", title)
                    .set("status", status)
                    .set("item_type", item_type)
                    .set("doi", doi)
                    .set("license", "http://creativecommons.org/licenses/by/4.0/");
                Ok(())
            })
            .expect("create");
        }
        repo.create("Thesis", |o| {
            o.set("title", "Alpha thesis");
            Ok(())
        })
        .expect("thesis");
        repo
    }

    #[test]
    fn equality_and_sort() {
        let repo = seeded();
        let published = repo
            .query("Item")
            .expect("query")
            .where_eq("status", PUBLISHED)
            .expect("where")
            .sort_by_desc("title")
            .expect("sort")
            .to_vec()
            .expect("rows");
        let titles: Vec<_> = published.iter().filter_map(|o| o.get("title")).collect();
        assert_eq!(titles, vec!["Charlie", "Alpha"]);
    }

    #[test]
    fn derived_indexes_are_queryable() {
        let repo = seeded();
        let hit = repo
            .query("Item")
            .expect("query")
            .where_eq("doi_without_label", "10.1/b")
            .expect("where")
            .first()
            .expect("first")
            .expect("present");
        assert_eq!(hit.get("title"), Some("Bravo"));

        let facets = repo
            .query("Item")
            .expect("query")
            .facets(&["item_type_with_status"])
            .expect("facets");
        let buckets: Vec<_> = facets["item_type_with_status"]
            .iter()
            .map(|b| (b.value.as_str(), b.count))
            .collect();
        assert_eq!(buckets.len(), 3);
        assert!(buckets.contains(&(&*format!("article_{}", PUBLISHED), 1)));
    }

    #[test]
    fn queries_are_scoped_to_their_type() {
        let repo = seeded();
        let matches = repo
            .query("Item")
            .expect("query")
            .matching("alpha")
            .count()
            .expect("count");
        assert_eq!(matches, 1);
        assert_eq!(repo.query("Thesis").expect("query").count().expect("count"), 1);
    }

    #[test]
    fn reified_objects_can_be_unlocked() {
        let repo = seeded();
        let mut bravo = repo
            .query("Item")
            .expect("query")
            .where_eq("doi_without_label", "10.1/b")
            .expect("where")
            .first()
            .expect("first")
            .expect("present");
        bravo
            .unlock_and_mutate(&repo, |o| {
                o.set("status", PUBLISHED);
                Ok(())
            })
            .expect("publish");

        let published = repo
            .query("Item")
            .expect("query")
            .where_eq("status", PUBLISHED)
            .expect("where")
            .count()
            .expect("count");
        assert_eq!(published, 3);
    }
}

// =============================================================================
// TIER E3: DESTRUCTION
// =============================================================================

mod e3_destruction {
    use super::*;

    #[test]
    fn destroy_removes_record_and_document() {
        let repo = repo();
        let mut item = repo
            .create("Item", |o| {
                o.set("title", "Alpha").set("status", DRAFT).set("rights", "CC0");
                Ok(())
            })
            .expect("create");
        let id = item.id().clone();

        item.unlock_and_destroy(&repo).expect("destroy");
        assert!(item.is_destroyed());
        assert!(matches!(
            repo.find(&id, &["Item", "Thesis"]),
            Err(LodestoreError::NotFound(_))
        ));
        assert_eq!(repo.query("Item").expect("query").count().expect("count"), 0);

        assert!(matches!(
            item.unlock_and_destroy(&repo),
            Err(LodestoreError::NotFound(_))
        ));
    }

    #[test]
    fn destroying_unsaved_object_is_not_found() {
        let repo = repo();
        let mut item = repo.new_object("Item").expect("new");
        assert!(matches!(
            item.unlock_and_destroy(&repo),
            Err(LodestoreError::NotFound(id)) if id == *item.id()
        ));
        assert!(repo.find(&ObjectId::generate(), &[]).is_err());
    }
}
