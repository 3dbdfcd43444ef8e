//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.
//! Every command writes either human-readable text or one JSON document.

use crate::config;
use lodestore_core::{
    Backend, FacetCount, LockedObject, LodestoreError, ObjectId, ReindexReport, Repository,
};
use serde_json::json;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

/// Global options shared by every command.
#[derive(Debug, Clone)]
pub struct Context {
    pub database: PathBuf,
    pub backend: String,
    pub schema: Option<PathBuf>,
    pub json_mode: bool,
}

/// Arguments of the `query` command.
#[derive(Debug, Clone, Default)]
pub struct QueryArgs {
    pub type_name: String,
    pub filters: Vec<(String, String)>,
    pub within: Vec<(String, String)>,
    pub text: Option<String>,
    pub sort: Option<String>,
    pub desc: bool,
    pub limit: Option<usize>,
    pub page: Option<usize>,
    pub all: bool,
    pub facets: Vec<String>,
}

// =============================================================================
// OUTPUT HELPERS
// =============================================================================

fn io_error(e: std::io::Error) -> LodestoreError {
    LodestoreError::IoError(format!("Write output: {}", e))
}

fn print_json(out: &mut dyn Write, value: &serde_json::Value) -> Result<(), LodestoreError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| LodestoreError::SerializationError(e.to_string()))?;
    writeln!(out, "{}", text).map_err(io_error)
}

/// JSON view of an object.
pub fn object_json(object: &LockedObject) -> serde_json::Value {
    json!({
        "id": object.id().as_str(),
        "type": object.model().as_str(),
        "created_at": object.created_at().map(|t| t.to_rfc3339()),
        "updated_at": object.updated_at().map(|t| t.to_rfc3339()),
        "values": object.values(),
    })
}

fn print_object(out: &mut dyn Write, object: &LockedObject) -> Result<(), LodestoreError> {
    writeln!(out, "{} {}", object.model(), object.id()).map_err(io_error)?;
    if let Some(created) = object.created_at() {
        writeln!(out, "  created:  {}", created.to_rfc3339()).map_err(io_error)?;
    }
    if let Some(updated) = object.updated_at() {
        writeln!(out, "  updated:  {}", updated.to_rfc3339()).map_err(io_error)?;
    }
    for (name, values) in object.values().iter() {
        for value in values {
            writeln!(out, "  {} = {}", name, value).map_err(io_error)?;
        }
    }
    Ok(())
}

/// Group repeated `NAME=VALUE` pairs by name, keeping value order.
pub fn group_pairs(pairs: Vec<(String, String)>) -> BTreeMap<String, Vec<String>> {
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in pairs {
        grouped.entry(name).or_default().push(value);
    }
    grouped
}

fn type_refs(types: &[String]) -> Vec<&str> {
    types.iter().map(String::as_str).collect()
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize new database.
pub fn cmd_init(ctx: &Context, out: &mut dyn Write, force: bool) -> Result<(), LodestoreError> {
    if ctx.backend == "memory" {
        writeln!(out, "Memory backend: nothing to initialize").map_err(io_error)?;
        return Ok(());
    }
    if ctx.database.exists() {
        if !force {
            return Err(LodestoreError::IoError(
                "Database already exists. Use --force to overwrite.".to_string(),
            ));
        }
        std::fs::remove_file(&ctx.database)
            .map_err(|e| LodestoreError::IoError(format!("Remove db: {}", e)))?;
    }

    let repo = open_repository(ctx)?;
    tracing::info!(database = %ctx.database.display(), "initialized database");

    if ctx.json_mode {
        return print_json(
            out,
            &json!({
                "database": ctx.database.to_string_lossy(),
                "backend": ctx.backend,
                "types": repo.registry().type_names().iter().map(|t| t.as_str()).collect::<Vec<_>>(),
            }),
        );
    }
    writeln!(out, "Initialized new redb database at {:?}", ctx.database).map_err(io_error)
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show record and document counts.
pub fn cmd_status(ctx: &Context, out: &mut dyn Write) -> Result<(), LodestoreError> {
    let repo = open_repository(ctx)?;
    let records = repo.record_count()?;
    let documents = repo.document_count()?;
    let types = repo.registry().type_names();

    if ctx.json_mode {
        return print_json(
            out,
            &json!({
                "database": ctx.database.to_string_lossy(),
                "backend": ctx.backend,
                "types": types.iter().map(|t| t.as_str()).collect::<Vec<_>>(),
                "records": records,
                "documents": documents,
            }),
        );
    }

    writeln!(out, "Lodestore Status").map_err(io_error)?;
    writeln!(out, "================").map_err(io_error)?;
    writeln!(out, "Database:  {:?}", ctx.database).map_err(io_error)?;
    writeln!(out, "Backend:   {}", ctx.backend).map_err(io_error)?;
    writeln!(out).map_err(io_error)?;
    writeln!(
        out,
        "Types:     {}",
        types.iter().map(|t| t.as_str()).collect::<Vec<_>>().join(", ")
    )
    .map_err(io_error)?;
    writeln!(out, "Records:   {}", records).map_err(io_error)?;
    writeln!(out, "Documents: {}", documents).map_err(io_error)?;
    if records != documents {
        writeln!(out).map_err(io_error)?;
        writeln!(out, "Index and records disagree; run `lodestore reindex`").map_err(io_error)?;
    }
    Ok(())
}

// =============================================================================
// TYPES COMMAND
// =============================================================================

/// Describe registered types with their index fields.
pub fn cmd_types(
    ctx: &Context,
    out: &mut dyn Write,
    only: Option<&str>,
) -> Result<(), LodestoreError> {
    let registry = config::load_registry(ctx.schema.as_deref())?;
    let names = match only {
        Some(name) => vec![registry.schema(name)?.name().clone()],
        None => registry.type_names(),
    };

    let mut described = Vec::new();
    for name in &names {
        let schema = registry.schema(name.as_str())?;
        let mut attributes = Vec::new();
        for attr in schema.attributes() {
            let fields = attr
                .index_roles
                .iter()
                .map(|&role| schema.index_field_for(&attr.name, role))
                .collect::<Result<Vec<_>, _>>()?;
            attributes.push(json!({
                "name": attr.name,
                "predicate": attr.predicate,
                "value_type": attr.value_type,
                "multi": attr.is_multi(),
                "required": attr.required,
                "fields": fields,
            }));
        }
        let mut derived = Vec::new();
        for index in schema.derived() {
            let fields = index
                .index_roles
                .iter()
                .map(|&role| schema.index_field_for(&index.name, role))
                .collect::<Result<Vec<_>, _>>()?;
            derived.push(json!({
                "name": index.name,
                "required": index.required,
                "fields": fields,
            }));
        }
        described.push(json!({
            "name": name.as_str(),
            "default_per_page": schema.descriptor().default_per_page,
            "max_per_page": schema.descriptor().max_per_page,
            "attributes": attributes,
            "derived": derived,
        }));
    }

    if ctx.json_mode {
        return print_json(out, &json!({ "types": described }));
    }

    for t in &described {
        writeln!(
            out,
            "{} (page size {}, max {})",
            t["name"].as_str().unwrap_or_default(),
            t["default_per_page"],
            t["max_per_page"]
        )
        .map_err(io_error)?;
        for (label, key) in [("attr", "attributes"), ("derived", "derived")] {
            for entry in t[key].as_array().into_iter().flatten() {
                let fields: Vec<&str> = entry["fields"]
                    .as_array()
                    .into_iter()
                    .flatten()
                    .filter_map(|f| f.as_str())
                    .collect();
                writeln!(
                    out,
                    "  {:<8} {:<24} {}",
                    label,
                    entry["name"].as_str().unwrap_or_default(),
                    fields.join(" ")
                )
                .map_err(io_error)?;
            }
        }
    }
    Ok(())
}

// =============================================================================
// OBJECT COMMANDS
// =============================================================================

/// Create an object from grouped attribute values.
pub fn cmd_create(
    ctx: &Context,
    out: &mut dyn Write,
    type_name: &str,
    set: Vec<(String, String)>,
) -> Result<(), LodestoreError> {
    let repo = open_repository(ctx)?;
    let values = group_pairs(set);
    let object = repo.create(type_name, |o| {
        for (name, values) in values {
            o.set_all(name, values);
        }
        Ok(())
    })?;
    tracing::info!(id = %object.id(), model = %object.model(), "created");

    if ctx.json_mode {
        return print_json(out, &object_json(&object));
    }
    writeln!(out, "Created {}", object.id()).map_err(io_error)?;
    print_object(out, &object)
}

/// Show one object.
pub fn cmd_show(
    ctx: &Context,
    out: &mut dyn Write,
    id: &str,
    types: &[String],
) -> Result<(), LodestoreError> {
    let repo = open_repository(ctx)?;
    let object = repo.find(&ObjectId::new(id), &type_refs(types))?;
    if ctx.json_mode {
        return print_json(out, &object_json(&object));
    }
    print_object(out, &object)
}

/// Replace or remove attribute values.
pub fn cmd_update(
    ctx: &Context,
    out: &mut dyn Write,
    id: &str,
    types: &[String],
    set: Vec<(String, String)>,
    unset: &[String],
) -> Result<(), LodestoreError> {
    let repo = open_repository(ctx)?;
    let mut object = repo.find(&ObjectId::new(id), &type_refs(types))?;
    let values = group_pairs(set);
    object.unlock_and_mutate(&repo, |o| {
        for name in unset {
            o.remove(name);
        }
        for (name, values) in values {
            o.set_all(name, values);
        }
        Ok(())
    })?;
    tracing::info!(id = %object.id(), "updated");

    if ctx.json_mode {
        return print_json(out, &object_json(&object));
    }
    writeln!(out, "Updated {}", object.id()).map_err(io_error)?;
    print_object(out, &object)
}

/// Destroy one object.
pub fn cmd_destroy(
    ctx: &Context,
    out: &mut dyn Write,
    id: &str,
    types: &[String],
) -> Result<(), LodestoreError> {
    let repo = open_repository(ctx)?;
    let mut object = repo.find(&ObjectId::new(id), &type_refs(types))?;
    object.unlock_and_destroy(&repo)?;
    tracing::info!(id = %object.id(), "destroyed");

    if ctx.json_mode {
        return print_json(out, &json!({ "destroyed": object.id().as_str() }));
    }
    writeln!(out, "Destroyed {} {}", object.model(), object.id()).map_err(io_error)
}

// =============================================================================
// QUERY COMMAND
// =============================================================================

/// Execute a query.
pub fn cmd_query(ctx: &Context, out: &mut dyn Write, args: &QueryArgs) -> Result<(), LodestoreError> {
    let repo = open_repository(ctx)?;
    let mut query = repo.query(&args.type_name)?;
    for (name, value) in &args.filters {
        query = query.where_eq(name, value.as_str())?;
    }
    for (name, path) in &args.within {
        query = query.within(name, path)?;
    }
    if let Some(text) = &args.text {
        query = query.matching(text);
    }
    if let Some(sort) = &args.sort {
        query = if args.desc {
            query.sort_by_desc(sort)?
        } else {
            query.sort_by(sort)?
        };
    }
    if let Some(limit) = args.limit {
        query = query.limit(limit);
    }
    if let Some(page) = args.page {
        query = query.page(page);
    }

    let objects = if args.all { query.all()? } else { query.to_vec()? };
    let total = query.count()?;
    let facet_names: Vec<&str> = args.facets.iter().map(String::as_str).collect();
    let facets: BTreeMap<String, Vec<FacetCount>> = if facet_names.is_empty() {
        BTreeMap::new()
    } else {
        query.facets(&facet_names)?
    };

    if ctx.json_mode {
        return print_json(
            out,
            &json!({
                "total": total,
                "page": query.current_page(),
                "total_pages": query.total_pages()?,
                "limit": query.limit_value(),
                "offset": query.offset_value(),
                "results": objects.iter().map(object_json).collect::<Vec<_>>(),
                "facets": facets,
            }),
        );
    }

    if args.all {
        writeln!(out, "{} of {} results", objects.len(), total).map_err(io_error)?;
    } else {
        writeln!(
            out,
            "{} of {} results (page {} of {})",
            objects.len(),
            total,
            query.current_page(),
            query.total_pages()?
        )
        .map_err(io_error)?;
    }
    for object in &objects {
        writeln!(out).map_err(io_error)?;
        print_object(out, object)?;
    }
    for (name, buckets) in &facets {
        writeln!(out).map_err(io_error)?;
        writeln!(out, "Facet {}:", name).map_err(io_error)?;
        for bucket in buckets {
            writeln!(out, "  {:>6}  {}", bucket.count, bucket.value).map_err(io_error)?;
        }
    }
    Ok(())
}

// =============================================================================
// REINDEX COMMAND
// =============================================================================

/// Rebuild the search index from the record store.
pub fn cmd_reindex(ctx: &Context, out: &mut dyn Write) -> Result<(), LodestoreError> {
    let repo = open_repository(ctx)?;
    let report: ReindexReport = repo.reindex_all()?;

    if ctx.json_mode {
        return print_json(
            out,
            &json!({
                "indexed": report.indexed,
                "failed": report.failed.iter().map(|(id, error)| json!({
                    "id": id.as_str(),
                    "error": error,
                })).collect::<Vec<_>>(),
                "warnings": report.warnings.iter().map(|(id, w)| json!({
                    "id": id.as_str(),
                    "field": w.field,
                    "reason": w.reason,
                })).collect::<Vec<_>>(),
            }),
        );
    }

    writeln!(out, "Reindexed {} records", report.indexed).map_err(io_error)?;
    for (id, w) in &report.warnings {
        writeln!(out, "  warning {}: {} ({})", id, w.field, w.reason).map_err(io_error)?;
    }
    for (id, error) in &report.failed {
        writeln!(out, "  failed  {}: {}", id, error).map_err(io_error)?;
    }
    Ok(())
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Resolve the `--backend` flag.
pub fn backend_for(ctx: &Context) -> Result<Backend, LodestoreError> {
    match ctx.backend.as_str() {
        "redb" => Ok(Backend::Redb(ctx.database.clone())),
        "memory" => Ok(Backend::Memory),
        other => Err(LodestoreError::InvalidConfig(format!(
            "Unknown backend: {}. Use: redb, memory",
            other
        ))),
    }
}

/// Load the schema and open the repository it describes.
pub fn open_repository(ctx: &Context) -> Result<Repository, LodestoreError> {
    let registry = Arc::new(config::load_registry(ctx.schema.as_deref())?);
    Repository::open(registry, &backend_for(ctx)?)
}
