//! Clap argument definitions for the `sift` CLI.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use sift_index::Operator;

/// Parses a word operator (`and` or `or`).
fn parse_operator(s: &str) -> Result<Operator, String> {
    s.parse::<Operator>().map_err(|e| e.to_string())
}

/// Top-level CLI options.
#[derive(Parser, Debug)]
#[command(name = "sift")]
#[command(about = "Search backend management - index, search and inspect content types")]
pub struct Cli {
    /// Options shared by every command.
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Read configuration from this file instead of discovering .sift.toml files
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Store segments under this directory, overriding backend.path
    #[arg(long, global = true)]
    pub data: Option<PathBuf>,

    /// Verbosity level (-v for debug logs, -vv for trace)
    #[arg(short = 'v', long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

/// Supported `sift` subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Rebuild the index from a JSON catalog fixture
    Index(IndexCommand),

    /// Search a content type and its descendants
    Search(SearchCommand),

    /// Count the records a query matches
    Count(CountCommand),

    /// Remove a record from the index
    Delete(DeleteCommand),

    /// Drop every segment, or empty one content type's segment
    Reset(ResetCommand),

    /// Show the index schema derived for a content type
    Schema(SchemaCommand),

    /// Validate configuration and diagnose issues
    Check,
}

/// Arguments for `sift index`.
#[derive(Args, Debug, Clone)]
pub struct IndexCommand {
    /// Fixture file declaring content types and records
    pub fixture: PathBuf,
}

/// Query arguments shared by `search` and `count`.
#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    /// Content type label (app_label.model)
    pub content_type: String,

    /// Query string; omit to match everything
    pub query: Vec<String>,

    /// Restrict matching to these declared fields (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub fields: Vec<String>,

    /// Operator between plain words: and, or
    #[arg(long, value_parser = parse_operator)]
    pub operator: Option<Operator>,

    /// Match against autocomplete fields
    #[arg(long)]
    pub autocomplete: bool,
}

/// Arguments for `sift search`.
#[derive(Args, Debug, Clone)]
pub struct SearchCommand {
    /// Query selection.
    #[command(flatten)]
    pub query: QueryArgs,

    /// Keep the catalog's order instead of ranking by score
    #[arg(long)]
    pub unordered: bool,

    /// Show scores
    #[arg(long)]
    pub scores: bool,

    /// Skip this many results
    #[arg(long, default_value = "0")]
    pub start: usize,

    /// Maximum results to return [default: search.default_limit]
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,

    /// Show the parsed expression and compiled queries without searching
    #[arg(long)]
    pub explain: bool,
}

/// Arguments for `sift count`.
#[derive(Args, Debug, Clone)]
pub struct CountCommand {
    /// Query selection.
    #[command(flatten)]
    pub query: QueryArgs,
}

/// Arguments for `sift delete`.
#[derive(Args, Debug, Clone)]
pub struct DeleteCommand {
    /// Content type label (app_label.model)
    pub content_type: String,

    /// Primary key of the record
    pub pk: String,
}

/// Arguments for `sift reset`.
#[derive(Args, Debug, Clone)]
pub struct ResetCommand {
    /// Only empty this content type's segment (app_label.model)
    pub content_type: Option<String>,
}

/// Arguments for `sift schema`.
#[derive(Args, Debug, Clone)]
pub struct SchemaCommand {
    /// Content type label (app_label.model)
    pub content_type: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

impl QueryArgs {
    /// The query words joined back into one string.
    pub fn text(&self) -> String {
        self.query.join(" ")
    }

    /// Requested field restriction, if any.
    pub fn field_names(&self) -> Option<Vec<String>> {
        let names: Vec<String> = self
            .fields
            .iter()
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .collect();
        (!names.is_empty()).then_some(names)
    }
}

#[cfg(test)]
mod test {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_search_options() {
        let cli = Cli::try_parse_from([
            "sift",
            "--data",
            "/tmp/idx",
            "search",
            "blog.post",
            "rust",
            "search",
            "--fields",
            "title,body",
            "--operator",
            "and",
            "-n",
            "3",
        ])
        .unwrap();
        assert_eq!(cli.global.data, Some(PathBuf::from("/tmp/idx")));
        let Commands::Search(cmd) = cli.command else {
            panic!("expected search");
        };
        assert_eq!(cmd.query.text(), "rust search");
        assert_eq!(
            cmd.query.field_names(),
            Some(vec!["title".to_string(), "body".to_string()])
        );
        assert_eq!(cmd.query.operator, Some(Operator::And));
        assert_eq!(cmd.limit, Some(3));
    }

    #[test]
    fn reset_takes_an_optional_type() {
        let cli = Cli::try_parse_from(["sift", "reset"]).unwrap();
        assert!(matches!(cli.command, Commands::Reset(ResetCommand { content_type: None })));
        let cli = Cli::try_parse_from(["sift", "reset", "blog.post"]).unwrap();
        let Commands::Reset(cmd) = cli.command else {
            panic!("expected reset");
        };
        assert_eq!(cmd.content_type.as_deref(), Some("blog.post"));
    }

    #[test]
    fn rejects_unknown_operator() {
        assert!(Cli::try_parse_from(["sift", "count", "a.b", "x", "--operator", "xor"]).is_err());
    }
}
