//! # Deferred Query
//!
//! A lazy, chainable criteria builder over one registered type.
//!
//! Builder calls never touch the index: they resolve attribute names to
//! index fields through the registry (failing early on attributes that lack
//! the needed role) and return a new builder. Every terminal operation
//! (`count`, `iter`, `to_vec`, `first`, `all`, `facets`, `total_pages`)
//! executes a fresh index query, so a query may be enumerated repeatedly.
//!
//! ## Pagination
//!
//! The effective limit is the explicit limit, or the type's default page
//! size, clamped to the type's maximum page size.

use crate::deadline::{self, Deadline};
use crate::index::{Criteria, Direction, FacetCount, IndexDocument, SortSpec, tokenize};
use crate::object::LockedObject;
use crate::primitives::PATH_DELIMITER;
use crate::registry::TypeSchema;
use crate::reifier::Reifier;
use crate::repository::Repository;
use crate::types::{IndexRole, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Criteria accumulated for one type. Cheap to clone.
#[derive(Debug, Clone)]
pub struct DeferredQuery<'r> {
    repo: &'r Repository,
    schema: Arc<TypeSchema>,
    /// Attribute → (field, value); later values replace earlier ones.
    filters: BTreeMap<String, (String, String)>,
    /// Attribute → (field, ancestor path).
    paths: BTreeMap<String, (String, String)>,
    terms: Vec<String>,
    sort: Option<SortSpec>,
    limit: Option<usize>,
    offset: usize,
    /// 1-based page; resolved against the effective limit at execution.
    page: Option<usize>,
    deadline: Option<Deadline>,
}

impl<'r> DeferredQuery<'r> {
    /// Start an empty query over `type_name`.
    pub fn for_type(repo: &'r Repository, type_name: &str) -> Result<Self> {
        let schema = repo.registry().schema(type_name)?;
        Ok(Self {
            repo,
            schema,
            filters: BTreeMap::new(),
            paths: BTreeMap::new(),
            terms: Vec::new(),
            sort: None,
            limit: None,
            offset: 0,
            page: None,
            deadline: None,
        })
    }

    // =========================================================================
    // BUILDERS
    // =========================================================================

    /// Require `attribute` to equal `value` (exact match).
    pub fn where_eq(mut self, attribute: &str, value: impl Into<String>) -> Result<Self> {
        let field = self.schema.index_field_for(attribute, IndexRole::ExactMatch)?;
        self.filters
            .insert(attribute.to_string(), (field, value.into()));
        Ok(self)
    }

    /// `where_eq` for several attributes at once.
    pub fn where_all<I, K, V>(self, pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        pairs
            .into_iter()
            .try_fold(self, |query, (attribute, value)| {
                query.where_eq(attribute.as_ref(), value)
            })
    }

    /// Restrict to objects at or below `path` in a pathing attribute.
    pub fn within(mut self, attribute: &str, path: &str) -> Result<Self> {
        let field = self.schema.index_field_for(attribute, IndexRole::Pathing)?;
        let path = path.trim_matches(PATH_DELIMITER).to_string();
        self.paths.insert(attribute.to_string(), (field, path));
        Ok(self)
    }

    /// Add full-text terms; every term must match.
    #[must_use]
    pub fn matching(mut self, text: &str) -> Self {
        self.terms.extend(tokenize(text));
        self
    }

    /// Sort ascending by a sortable attribute.
    pub fn sort_by(self, attribute: &str) -> Result<Self> {
        self.sorted(attribute, Direction::Asc)
    }

    /// Sort descending by a sortable attribute.
    pub fn sort_by_desc(self, attribute: &str) -> Result<Self> {
        self.sorted(attribute, Direction::Desc)
    }

    fn sorted(mut self, attribute: &str, direction: Direction) -> Result<Self> {
        let field = self.schema.index_field_for(attribute, IndexRole::Sort)?;
        self.sort = Some(SortSpec { field, direction });
        Ok(self)
    }

    #[must_use]
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    #[must_use]
    pub fn offset(mut self, n: usize) -> Self {
        self.offset = n;
        self.page = None;
        self
    }

    /// Jump to a 1-based page of the effective limit.
    ///
    /// The page is kept as a page, so a later `limit` moves the window with
    /// it. A later `offset` replaces it.
    #[must_use]
    pub fn page(mut self, n: usize) -> Self {
        self.page = Some(n);
        self
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = Some(deadline);
        self
    }

    // =========================================================================
    // PAGINATION ACCESSORS
    // =========================================================================

    #[must_use]
    pub fn offset_value(&self) -> usize {
        match self.page {
            Some(page) => page.saturating_sub(1).saturating_mul(self.limit_value()),
            None => self.offset,
        }
    }

    /// The effective limit.
    #[must_use]
    pub fn limit_value(&self) -> usize {
        self.limit
            .unwrap_or_else(|| self.default_per_page())
            .min(self.max_per_page())
    }

    #[must_use]
    pub fn default_per_page(&self) -> usize {
        self.schema.descriptor().default_per_page
    }

    #[must_use]
    pub fn max_per_page(&self) -> usize {
        self.schema.descriptor().max_per_page
    }

    /// 1-based page the offset falls on.
    #[must_use]
    pub fn current_page(&self) -> usize {
        self.offset_value()
            .checked_div(self.limit_value())
            .map_or(1, |page| page.saturating_add(1))
    }

    /// Number of pages of the effective limit needed for every match.
    pub fn total_pages(&self) -> Result<usize> {
        let limit = self.limit_value();
        if limit == 0 {
            return Ok(0);
        }
        Ok(self.total_count()?.div_ceil(limit))
    }

    // =========================================================================
    // TERMINAL OPERATIONS
    // =========================================================================

    fn criteria(&self, start: usize, rows: usize, facet_fields: Vec<String>) -> Criteria {
        let filters = self
            .filters
            .values()
            .chain(self.paths.values())
            .cloned()
            .collect();
        Criteria {
            models: vec![self.schema.name().clone()],
            filters,
            terms: self.terms.clone(),
            sort: self.sort.clone(),
            start,
            rows,
            facet_fields,
        }
    }

    fn fetch(&self, start: usize, rows: usize) -> Result<Vec<IndexDocument>> {
        deadline::check(self.deadline.as_ref())?;
        let result = self.repo.index().query(&self.criteria(start, rows, Vec::new()))?;
        tracing::debug!(
            model = %self.schema.name(),
            start,
            rows,
            total = result.total,
            "query executed"
        );
        Ok(result.rows)
    }

    fn reify(&self, row: &IndexDocument) -> Result<LockedObject> {
        deadline::check(self.deadline.as_ref())?;
        Reifier::reify(self.repo.registry(), row)
    }

    /// Number of matching objects, ignoring limit and offset.
    pub fn count(&self) -> Result<usize> {
        deadline::check(self.deadline.as_ref())?;
        let result = self.repo.index().query(&self.criteria(0, 0, Vec::new()))?;
        Ok(result.total)
    }

    /// Alias of `count`.
    pub fn total_count(&self) -> Result<usize> {
        self.count()
    }

    /// Lazily enumerate the current page.
    ///
    /// Nothing executes until the first `next()`.
    #[must_use]
    pub fn iter(&self) -> Results<'r> {
        Results {
            query: self.clone(),
            rows: None,
            done: false,
        }
    }

    /// Materialize the current page.
    pub fn to_vec(&self) -> Result<Vec<LockedObject>> {
        self.iter().collect()
    }

    /// The first object of the current page, if any.
    pub fn first(&self) -> Result<Option<LockedObject>> {
        let offset = self.offset_value();
        self.clone().offset(offset).limit(1).iter().next().transpose()
    }

    /// Every match from the offset onwards, fetched in batches of the
    /// type's maximum page size.
    pub fn all(&self) -> Result<Vec<LockedObject>> {
        let batch = self.max_per_page();
        let mut out = Vec::new();
        let mut start = self.offset_value();
        loop {
            let rows = self.fetch(start, batch)?;
            if rows.is_empty() {
                break;
            }
            start = start.saturating_add(rows.len());
            for row in &rows {
                out.push(self.reify(row)?);
            }
            if rows.len() < batch {
                break;
            }
        }
        Ok(out)
    }

    /// Bucket counts over the whole matching set, per facet attribute.
    pub fn facets(&self, attributes: &[&str]) -> Result<BTreeMap<String, Vec<FacetCount>>> {
        let fields = attributes
            .iter()
            .map(|attr| self.schema.index_field_for(attr, IndexRole::Facet))
            .collect::<Result<Vec<_>>>()?;
        deadline::check(self.deadline.as_ref())?;
        let mut result = self
            .repo
            .index()
            .query(&self.criteria(0, 0, fields.clone()))?;
        Ok(attributes
            .iter()
            .zip(fields)
            .map(|(attr, field)| {
                let buckets = result.facets.remove(&field).unwrap_or_default();
                ((*attr).to_string(), buckets)
            })
            .collect())
    }
}

impl<'q, 'r> IntoIterator for &'q DeferredQuery<'r> {
    type Item = Result<LockedObject>;
    type IntoIter = Results<'r>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// =============================================================================
// RESULTS ITERATOR
// =============================================================================

/// Lazy sequence of reified rows for one page.
///
/// Executes on the first `next()`. An error ends the sequence.
#[derive(Debug)]
pub struct Results<'r> {
    query: DeferredQuery<'r>,
    rows: Option<std::vec::IntoIter<IndexDocument>>,
    done: bool,
}

impl Iterator for Results<'_> {
    type Item = Result<LockedObject>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.rows.is_none() {
            match self
                .query
                .fetch(self.query.offset_value(), self.query.limit_value())
            {
                Ok(rows) => self.rows = Some(rows.into_iter()),
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
        let row = self.rows.as_mut()?.next();
        match row {
            None => {
                self.done = true;
                None
            }
            Some(row) => {
                let object = self.query.reify(&row);
                if object.is_err() {
                    self.done = true;
                }
                Some(object)
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
