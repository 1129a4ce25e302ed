//! Rendering and JSON serialization for CLI output.

use std::{collections::BTreeMap, process::ExitCode};

use comfy_table::{Cell, Table, presets::UTF8_FULL_CONDENSED};
use serde::Serialize;
use sift_index::{Hit, MemoryRecord, Record, SegmentSchema, Storage};

/// Longest value summary shown in a table cell.
const SUMMARY_WIDTH: usize = 60;

/// JSON output for a single search hit.
#[derive(Serialize)]
struct JsonHit {
    /// Primary key.
    pk: String,
    /// Merged relevance score, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    score: Option<f32>,
    /// Record attributes flattened to text.
    values: BTreeMap<String, String>,
}

/// JSON output for `sift search`.
#[derive(Serialize)]
struct JsonSearchOutput<'a> {
    /// The searched content type.
    content_type: &'a str,
    /// The query as interpreted.
    query: &'a str,
    /// Matches before slicing.
    total: usize,
    /// The returned window.
    results: Vec<JsonHit>,
}

/// JSON output for one index field of `sift schema`.
#[derive(Serialize)]
struct JsonField<'a> {
    /// Index field name.
    name: &'a str,
    /// Declared path.
    source: &'a str,
    /// Query-time role.
    role: &'static str,
    /// Matching strategy.
    match_kind: &'static str,
    /// Whether the value is stored.
    stored: bool,
    /// Effective boost.
    boost: f32,
    /// Analyzer name.
    analyzer: &'static str,
}

/// Record attributes flattened to the text that gets indexed.
fn record_values(record: &MemoryRecord) -> BTreeMap<String, String> {
    record
        .names()
        .map(|name| (name.to_string(), record.field_value(name).coerce()))
        .collect()
}

/// One-line `name=value` summary of a record, truncated for tables.
fn summarize(record: &MemoryRecord) -> String {
    let summary = record_values(record)
        .into_iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join(" ");
    if summary.chars().count() <= SUMMARY_WIDTH {
        return summary;
    }
    let mut cut: String = summary.chars().take(SUMMARY_WIDTH - 3).collect();
    cut.push_str("...");
    cut
}

/// Pretty-prints `value` as JSON.
pub fn print_json<T: Serialize>(value: &T) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: failed to serialize JSON: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Outputs search hits as JSON.
pub fn output_hits_json(
    content_type: &str,
    query: &str,
    total: usize,
    hits: &[Hit<MemoryRecord>],
) -> ExitCode {
    let results = hits
        .iter()
        .map(|hit| JsonHit {
            pk: hit.record.pk(),
            score: hit.score,
            values: record_values(&hit.record),
        })
        .collect();
    print_json(&JsonSearchOutput {
        content_type,
        query,
        total,
        results,
    })
}

/// Outputs search hits as a table, numbered from `start + 1`.
pub fn output_hits(hits: &[Hit<MemoryRecord>], start: usize, total: usize) {
    if hits.is_empty() {
        println!("No results ({total} total).");
        return;
    }
    let show_scores = hits.iter().any(|h| h.score.is_some());
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    if show_scores {
        table.set_header(vec!["#", "pk", "score", "fields"]);
    } else {
        table.set_header(vec!["#", "pk", "fields"]);
    }
    for (i, hit) in hits.iter().enumerate() {
        let mut row = vec![
            Cell::new(start + i + 1),
            Cell::new(hit.record.pk()),
        ];
        if show_scores {
            let score = hit.score.map_or_else(String::new, |s| format!("{s:.3}"));
            row.push(Cell::new(score));
        }
        row.push(Cell::new(summarize(&hit.record)));
        table.add_row(row);
    }
    println!("{table}");
    println!("{} of {total} results", hits.len());
}

/// Outputs the index fields of a segment schema.
pub fn output_schema(schema: &SegmentSchema, json: bool) -> ExitCode {
    if json {
        let fields: Vec<JsonField<'_>> = schema
            .fields()
            .iter()
            .map(|f| JsonField {
                name: &f.spec.name,
                source: &f.spec.source,
                role: f.spec.role.as_str(),
                match_kind: f.spec.match_kind.as_str(),
                stored: f.spec.storage == Storage::Stored,
                boost: f.spec.boost,
                analyzer: f.spec.analyzer,
            })
            .collect();
        return print_json(&fields);
    }

    println!("Content type: {}", schema.content_type);
    if schema.fields().is_empty() {
        println!("  (no search fields declared)");
        return ExitCode::SUCCESS;
    }
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec![
        "Field", "Source", "Role", "Match", "Storage", "Boost", "Analyzer",
    ]);
    for f in schema.fields() {
        table.add_row(vec![
            Cell::new(&f.spec.name),
            Cell::new(&f.spec.source),
            Cell::new(f.spec.role.as_str()),
            Cell::new(f.spec.match_kind.as_str()),
            Cell::new(f.spec.storage.as_str()),
            Cell::new(format!("{:.1}", f.spec.boost)),
            Cell::new(f.spec.analyzer),
        ]);
    }
    println!("{table}");
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summaries_are_sorted_and_truncated() {
        let record = MemoryRecord::new("1").with("title", "Dune").with("author", "Herbert");
        assert_eq!(summarize(&record), "author=Herbert title=Dune");

        let long = MemoryRecord::new("2").with("body", "x".repeat(200));
        let summary = summarize(&long);
        assert_eq!(summary.chars().count(), SUMMARY_WIDTH);
        assert!(summary.ends_with("..."));
    }
}
