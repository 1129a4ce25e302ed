//! Implementation of `sift search`.

use std::process::ExitCode;

use sift_index::{
    FieldRole, IndexError, MemoryCatalog, QueryCompiler, SearchBackend, SearchMode,
    SearchRequest, search_targets,
};

use super::shared::build_request;
use crate::cli::{
    args::SearchCommand,
    context::CommandContext,
    output::{output_hits, output_hits_json},
};

/// Searches a content type and its descendants and prints the hits.
pub fn run(ctx: &CommandContext, cmd: &SearchCommand) -> ExitCode {
    let mut request = match build_request(&cmd.query) {
        Ok(request) => request,
        Err(code) => return code,
    };
    let backend = match ctx.open_indexed() {
        Ok(backend) => backend,
        Err(code) => return code,
    };

    if cmd.explain {
        return match explain(&backend, &request) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("error: {e}");
                ExitCode::FAILURE
            }
        };
    }

    let limit = cmd.limit.unwrap_or(backend.settings().default_limit);
    request = request.slice(cmd.start, Some(cmd.start.saturating_add(limit)));
    if cmd.unordered {
        request = request.unordered();
    }
    if cmd.scores || cmd.json {
        request = request.with_scores();
    }

    let outcome = backend
        .count(&request)
        .and_then(|total| backend.search(&request).map(|hits| (total, hits)));
    let (total, hits) = match outcome {
        Ok(found) => found,
        Err(e) => {
            eprintln!("error: search failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    if cmd.json {
        let query = request.expr.to_query_string();
        return output_hits_json(request.content_type.as_str(), &query, total, &hits);
    }
    output_hits(&hits, cmd.start, total);
    ExitCode::SUCCESS
}

/// Prints the parsed expression and the query compiled for each segment.
fn explain(
    backend: &SearchBackend<MemoryCatalog>,
    request: &SearchRequest,
) -> Result<(), IndexError> {
    println!("Query:");
    println!("   {}", request.expr.to_query_string());
    println!();
    println!("Parsed AST:");
    println!("   {:?}", request.expr);
    println!();

    let role = match request.mode {
        SearchMode::Search => FieldRole::Search,
        SearchMode::Autocomplete => FieldRole::Autocomplete,
    };
    let settings = backend.settings();
    let analyzers = *backend.store().analyzers();
    let names = request.fields.as_deref();

    println!("Segments:");
    for target in search_targets(backend.catalog(), &request.content_type) {
        let schema = backend.schema(&target)?;
        let strict = target == request.content_type;
        let fields = schema.select(role, names, strict)?;
        if fields.is_empty() {
            println!("   {target}: (no matching fields, skipped)");
            continue;
        }
        let query = QueryCompiler::new(
            &schema,
            analyzers,
            settings.fuzzy_distance,
            settings.default_operator,
        )
        .with_operator(request.operator)
        .strict_filters(strict)
        .compile(&request.expr, &fields)?;
        println!("   {target} [{}]:", fields.names().join(", "));
        println!("      {query:?}");
    }
    Ok(())
}
