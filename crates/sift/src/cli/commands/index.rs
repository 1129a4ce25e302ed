//! Implementation of `sift index`.

use std::{fs, io, path::Path, process::ExitCode};

use comfy_table::{Cell, Table, presets::UTF8_FULL_CONDENSED};
use sift_index::{
    Catalog, ContentType, IndexError, MemoryCatalog, SearchBackend, load_fixture,
};

use crate::cli::{args::IndexCommand, context::CommandContext};

/// Per-type outcome of a rebuild.
struct TypeSummary {
    /// The content type.
    content_type: ContentType,
    /// Whether the type has its own segment.
    indexed: bool,
    /// Records of exactly this type.
    records: usize,
    /// Documents in the type's segment, including subtypes.
    documents: Option<u64>,
}

/// Rebuilds every segment from a fixture and snapshots the catalog next to them.
pub fn run(ctx: &CommandContext, cmd: &IndexCommand) -> ExitCode {
    let fixture = ctx.cwd.join(&cmd.fixture);
    let snapshot = match ctx.snapshot_path() {
        Ok(path) => path,
        Err(code) => return code,
    };
    let catalog = match load_fixture(&fixture) {
        Ok(catalog) => catalog,
        Err(e) => {
            eprintln!("error: failed to load {}: {e}", fixture.display());
            return ExitCode::FAILURE;
        }
    };
    let backend = match ctx.open_backend(catalog) {
        Ok(backend) => backend,
        Err(code) => return code,
    };

    let summaries = match rebuild_all(&backend) {
        Ok(summaries) => summaries,
        Err(e) => {
            eprintln!("error: indexing failed: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = write_snapshot(&fixture, &snapshot) {
        eprintln!("error: failed to write {}: {e}", snapshot.display());
        return ExitCode::FAILURE;
    }

    print_summaries(&summaries);
    ExitCode::SUCCESS
}

/// Empties the storage root once, then writes every type's records.
///
/// All indexed segments are started before any records are written, so
/// subtypes fanning out to an ancestor land after that ancestor's reset.
fn rebuild_all(
    backend: &SearchBackend<MemoryCatalog>,
) -> Result<Vec<TypeSummary>, IndexError> {
    let catalog = backend.catalog();
    let types = catalog.content_types();
    let indexed: Vec<&ContentType> = types.iter().filter(|ct| catalog.is_indexed(ct)).collect();

    let run = backend.rebuilder();
    for ct in &indexed {
        run.start(ct)?;
    }
    let mut summaries = Vec::with_capacity(types.len());
    for ct in &types {
        let records = catalog.records_of(ct);
        backend.add_bulk(ct, &records)?;
        summaries.push(TypeSummary {
            content_type: ct.clone(),
            indexed: catalog.is_indexed(ct),
            records: records.len(),
            documents: None,
        });
    }
    for ct in &indexed {
        run.finish(ct)?;
    }

    for summary in summaries.iter_mut().filter(|s| s.indexed) {
        let declared = catalog.search_fields(&summary.content_type)?;
        summary.documents = Some(backend.store().doc_count(&summary.content_type, &declared)?);
    }
    Ok(summaries)
}

/// Copies the fixture into the storage root for later commands.
fn write_snapshot(fixture: &Path, snapshot: &Path) -> io::Result<()> {
    if let Some(parent) = snapshot.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(fixture, snapshot).map(|_| ())
}

/// Prints the per-type record and document counts.
fn print_summaries(summaries: &[TypeSummary]) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec!["Type", "Indexed", "Records", "Documents"]);
    for s in summaries {
        let documents = s.documents.map_or_else(|| "-".to_string(), |n| n.to_string());
        table.add_row(vec![
            Cell::new(&s.content_type),
            Cell::new(if s.indexed { "yes" } else { "no" }),
            Cell::new(s.records),
            Cell::new(documents),
        ]);
    }
    println!("{table}");
}
