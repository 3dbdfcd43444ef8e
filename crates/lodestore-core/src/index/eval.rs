//! Query evaluation over a set of documents.
//!
//! Ordering is total: the sort field first (documents without a value come
//! last in either direction), then the document id ascending.

use super::{Criteria, Direction, FacetCount, FieldKind, IndexDocument, QueryResult};
use crate::primitives::MODEL_FIELD;
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Split text into lowercased alphanumeric runs.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

pub(crate) fn matches(document: &IndexDocument, criteria: &Criteria) -> bool {
    if !criteria.models.is_empty() {
        let model = document.values(MODEL_FIELD);
        if !criteria.models.iter().any(|m| model.iter().any(|v| v == m.as_str())) {
            return false;
        }
    }
    let filters_hold = criteria
        .filters
        .iter()
        .all(|(field, value)| document.values(field).iter().any(|v| v == value));
    filters_hold && criteria.terms.iter().all(|term| term_matches(document, term))
}

fn term_matches(document: &IndexDocument, term: &str) -> bool {
    document.fields.values().any(|field| match field.kind {
        FieldKind::Text => field.values.iter().any(|v| v == term),
        FieldKind::Token => field.values.iter().any(|v| tokenize(v).iter().any(|t| t == term)),
        FieldKind::Stored | FieldKind::Keyword => false,
    })
}

fn compare(a: &IndexDocument, b: &IndexDocument, criteria: &Criteria) -> Ordering {
    let by_field = criteria.sort.as_ref().map_or(Ordering::Equal, |sort| {
        match (a.first(&sort.field), b.first(&sort.field)) {
            (Some(x), Some(y)) => match sort.direction {
                Direction::Asc => x.cmp(y),
                Direction::Desc => y.cmp(x),
            },
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    });
    by_field.then_with(|| a.id.cmp(&b.id))
}

fn as_doc<D: Borrow<IndexDocument>>(d: &D) -> &IndexDocument {
    d.borrow()
}

fn facet_counts<D: Borrow<IndexDocument>>(matched: &[D], field: &str) -> Vec<FacetCount> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for document in matched {
        for value in as_doc(document).values(field) {
            *counts.entry(value.as_str()).or_default() += 1;
        }
    }
    let mut buckets: Vec<FacetCount> = counts
        .into_iter()
        .map(|(value, count)| FacetCount {
            value: value.to_string(),
            count,
        })
        .collect();
    buckets.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
    buckets
}

/// Filter, sort, facet and slice a document set.
pub(crate) fn execute<D, I>(documents: I, criteria: &Criteria) -> QueryResult
where
    D: Borrow<IndexDocument>,
    I: IntoIterator<Item = D>,
{
    let mut matched: Vec<D> = documents
        .into_iter()
        .filter(|d| matches(as_doc(d), criteria))
        .collect();
    let total = matched.len();

    let facets = criteria
        .facet_fields
        .iter()
        .map(|field| (field.clone(), facet_counts(&matched, field)))
        .collect();

    let rows = if criteria.rows == 0 || criteria.start >= total {
        Vec::new()
    } else {
        matched.sort_by(|a, b| compare(as_doc(a), as_doc(b), criteria));
        matched
            .iter()
            .skip(criteria.start)
            .take(criteria.rows)
            .map(|d| as_doc(d).clone())
            .collect()
    };

    QueryResult {
        total,
        rows,
        facets,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::SortSpec;
    use crate::types::{ObjectId, TypeName};

    fn doc(id: &str, model: &str, title: Option<&str>, tags: &[&str]) -> IndexDocument {
        let mut d = IndexDocument::new(ObjectId::new(id));
        d.add(MODEL_FIELD, FieldKind::Keyword, model);
        if let Some(title) = title {
            d.add("title_ssi", FieldKind::Keyword, title);
            d.add_all("title_tesim", FieldKind::Text, tokenize(title));
        }
        d.add_all("tags_sim", FieldKind::Keyword, tags.iter().copied());
        d
    }

    fn corpus() -> Vec<IndexDocument> {
        vec![
            doc("3", "Item", Some("Gamma ray"), &["physics"]),
            doc("1", "Item", Some("Alpha"), &["physics", "maths"]),
            doc("2", "Item", None, &["maths"]),
            doc("4", "Thesis", Some("Beta"), &[]),
        ]
    }

    fn item_criteria() -> Criteria {
        Criteria {
            models: vec![TypeName::new("Item")],
            rows: 10,
            ..Criteria::default()
        }
    }

    #[test]
    fn tokenizer_lowercases_alphanumeric_runs() {
        assert_eq!(tokenize("Hello, World-42!"), vec!["hello", "world", "42"]);
        assert!(tokenize(" -- ").is_empty());
    }

    #[test]
    fn unsorted_results_ordered_by_id() {
        let result = execute(&corpus(), &item_criteria());
        let ids: Vec<_> = result.rows.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert_eq!(result.total, 3);
    }

    #[test]
    fn missing_sort_values_come_last_both_ways() {
        let mut criteria = item_criteria();
        criteria.sort = Some(SortSpec {
            field: "title_ssi".into(),
            direction: Direction::Desc,
        });
        let result = execute(&corpus(), &criteria);
        let ids: Vec<_> = result.rows.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "1", "2"]);

        criteria.sort = Some(SortSpec {
            field: "title_ssi".into(),
            direction: Direction::Asc,
        });
        let result = execute(&corpus(), &criteria);
        let ids: Vec<_> = result.rows.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3", "2"]);
    }

    #[test]
    fn slicing_keeps_total() {
        let mut criteria = item_criteria();
        criteria.start = 1;
        criteria.rows = 1;
        let result = execute(&corpus(), &criteria);
        assert_eq!(result.total, 3);
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0].id.as_str(), "2");

        criteria.rows = 0;
        let result = execute(&corpus(), &criteria);
        assert_eq!(result.total, 3);
        assert!(result.rows.is_empty());
    }

    #[test]
    fn filters_and_terms_are_conjunctive() {
        let mut criteria = item_criteria();
        criteria.filters = vec![("tags_sim".into(), "physics".into())];
        assert_eq!(execute(&corpus(), &criteria).total, 2);

        criteria.terms = vec!["gamma".into()];
        let result = execute(&corpus(), &criteria);
        assert_eq!(result.total, 1);
        assert_eq!(result.rows[0].id.as_str(), "3");

        criteria.terms.push("delta".into());
        assert_eq!(execute(&corpus(), &criteria).total, 0);
    }

    #[test]
    fn facets_count_every_value() {
        let mut criteria = item_criteria();
        criteria.facet_fields = vec!["tags_sim".into()];
        let result = execute(&corpus(), &criteria);
        let buckets = &result.facets["tags_sim"];
        assert_eq!(
            buckets,
            &vec![
                FacetCount {
                    value: "maths".into(),
                    count: 2
                },
                FacetCount {
                    value: "physics".into(),
                    count: 2
                },
            ]
        );
    }
}
