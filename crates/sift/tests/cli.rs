//! CLI integration tests for sift commands.
//!
//! These tests focus on exit codes and observable results, not on table
//! formatting which may change.

// Integration tests live outside cfg(test) by design
#![allow(clippy::tests_outside_test_module)]

use std::{collections::BTreeSet, fs, path::Path};

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;

/// A page type, a post subtype with a filter field, and three records.
const FIXTURE: &str = r#"{
  "types": [
    {"content_type": "core.page",
     "fields": [{"name": "title", "boost": 2.0}, {"name": "title", "kind": "autocomplete"}]},
    {"content_type": "blog.post", "parent": "core.page",
     "fields": [{"name": "title"}, {"name": "body"}, {"name": "status", "kind": "filter"}]}
  ],
  "records": [
    {"content_type": "core.page", "pk": 1, "values": {"title": "About Us"}},
    {"content_type": "blog.post", "pk": 2,
     "values": {"title": "Learning Rust", "body": "ownership and borrowing", "status": "live"}},
    {"content_type": "blog.post", "pk": 3,
     "values": {"title": "Rust Search", "body": "tantivy segments", "status": "draft"}}
  ]
}"#;

/// Helper to create a temp directory for tests.
fn temp_dir() -> tempfile::TempDir {
    tempfile::tempdir().unwrap()
}

/// Helper to get a sift command.
fn sift() -> Command {
    #[allow(deprecated)]
    Command::cargo_bin("sift").unwrap()
}

/// Helper to run `sift` in `dir` with HOME isolated to it and segments under `dir/idx`.
fn sift_in(dir: &Path) -> Command {
    let mut cmd = sift();
    cmd.current_dir(dir)
        .env("HOME", dir)
        .env_remove("SIFT_LOG")
        .env_remove("SIFT_CONFIG")
        .args(["--data", "idx"]);
    cmd
}

/// A temp directory with the fixture already indexed.
fn indexed() -> tempfile::TempDir {
    let dir = temp_dir();
    fs::write(dir.path().join("fixture.json"), FIXTURE).unwrap();
    sift_in(dir.path())
        .args(["index", "fixture.json"])
        .assert()
        .success();
    dir
}

/// Runs `sift count` and parses the number it prints.
fn count(dir: &Path, args: &[&str]) -> usize {
    let output = sift_in(dir).arg("count").args(args).output().unwrap();
    assert!(output.status.success());
    String::from_utf8(output.stdout).unwrap().trim().parse().unwrap()
}

/// Runs `sift search --json` and returns the parsed output.
fn search_json(dir: &Path, args: &[&str]) -> Value {
    let output = sift_in(dir)
        .arg("search")
        .args(args)
        .arg("--json")
        .output()
        .unwrap();
    assert!(output.status.success());
    serde_json::from_slice(&output.stdout).unwrap()
}

/// Primary keys in a JSON search result.
fn result_pks(json: &Value) -> BTreeSet<String> {
    json["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["pk"].as_str().unwrap().to_string())
        .collect()
}

mod index {
    use super::*;

    #[test]
    fn reports_every_type() {
        let dir = temp_dir();
        fs::write(dir.path().join("fixture.json"), FIXTURE).unwrap();

        sift_in(dir.path())
            .args(["index", "fixture.json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("core.page"))
            .stdout(predicate::str::contains("blog.post"));

        assert!(dir.path().join("idx").join("catalog.json").exists());
    }

    #[test]
    fn fails_on_missing_fixture() {
        let dir = temp_dir();
        sift_in(dir.path())
            .args(["index", "nope.json"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("failed to load"));
    }

    #[test]
    fn fails_without_index_path() {
        let dir = temp_dir();
        fs::write(dir.path().join("fixture.json"), FIXTURE).unwrap();
        sift()
            .current_dir(dir.path())
            .env("HOME", dir.path())
            .args(["index", "fixture.json"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("no index path configured"));
    }
}

mod search {
    use super::*;

    #[test]
    fn ancestor_search_includes_subtypes() {
        let dir = indexed();
        let json = search_json(dir.path(), &["core.page", "rust"]);
        assert_eq!(json["content_type"], "core.page");
        assert_eq!(json["total"], 2);
        let expected: BTreeSet<String> = ["2", "3"].iter().map(ToString::to_string).collect();
        assert_eq!(result_pks(&json), expected);
        assert!(json["results"][0]["score"].is_number());
    }

    #[test]
    fn filters_narrow_results() {
        let dir = indexed();
        let json = search_json(dir.path(), &["blog.post", "status:live", "rust"]);
        let expected: BTreeSet<String> = ["2".to_string()].into_iter().collect();
        assert_eq!(result_pks(&json), expected);
        assert_eq!(json["results"][0]["values"]["title"], "Learning Rust");
    }

    #[test]
    fn limit_slices_but_total_counts_all() {
        let dir = indexed();
        let json = search_json(dir.path(), &["core.page", "rust", "-n", "1"]);
        assert_eq!(json["total"], 2);
        assert_eq!(json["results"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn autocomplete_matches_prefixes() {
        let dir = indexed();
        let json = search_json(dir.path(), &["core.page", "lea", "--autocomplete"]);
        let expected: BTreeSet<String> = ["2".to_string()].into_iter().collect();
        assert_eq!(result_pks(&json), expected);
    }

    #[test]
    fn text_output_lists_hits() {
        let dir = indexed();
        sift_in(dir.path())
            .args(["search", "blog.post", "tantivy"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Rust Search"));
    }

    #[test]
    fn explain_shows_segments() {
        let dir = indexed();
        sift_in(dir.path())
            .args(["search", "core.page", "rust", "--explain"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Parsed AST:"))
            .stdout(predicate::str::contains("blog.post"));
    }

    #[test]
    fn invalid_query_fails() {
        let dir = indexed();
        sift_in(dir.path())
            .args(["search", "core.page", "\"unclosed"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("invalid query"));
    }

    #[test]
    fn unknown_field_fails() {
        let dir = indexed();
        sift_in(dir.path())
            .args(["search", "core.page", "rust", "--fields", "nope"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("search failed"));
    }

    #[test]
    fn requires_an_index() {
        let dir = temp_dir();
        sift_in(dir.path())
            .args(["search", "core.page", "rust"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("sift index"));
    }
}

mod count {
    use super::*;

    #[test]
    fn empty_query_counts_everything() {
        let dir = indexed();
        assert_eq!(count(dir.path(), &["core.page"]), 3);
        assert_eq!(count(dir.path(), &["blog.post"]), 2);
    }

    #[test]
    fn operator_controls_plain_words() {
        let dir = indexed();
        assert_eq!(count(dir.path(), &["blog.post", "learning", "tantivy"]), 2);
        assert_eq!(
            count(dir.path(), &["blog.post", "learning", "tantivy", "--operator", "and"]),
            0
        );
    }
}

mod delete {
    use super::*;

    #[test]
    fn removes_from_every_segment() {
        let dir = indexed();
        sift_in(dir.path())
            .args(["delete", "blog.post", "2"])
            .assert()
            .success();
        assert_eq!(count(dir.path(), &["core.page", "rust"]), 1);
        assert_eq!(count(dir.path(), &["blog.post", "rust"]), 1);
    }
}

mod reset {
    use super::*;

    #[test]
    fn drops_the_index() {
        let dir = indexed();
        sift_in(dir.path()).arg("reset").assert().success();
        assert!(!dir.path().join("idx").join("catalog.json").exists());
        sift_in(dir.path())
            .args(["count", "core.page"])
            .assert()
            .failure();
    }

    #[test]
    fn clears_one_segment() {
        let dir = indexed();
        sift_in(dir.path())
            .args(["reset", "blog.post"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Cleared blog.post"));
        assert_eq!(count(dir.path(), &["blog.post", "rust"]), 0);
        assert_eq!(count(dir.path(), &["core.page", "rust"]), 2);
        assert!(dir.path().join("idx").join("catalog.json").exists());
    }

    #[test]
    fn rejects_unknown_type() {
        let dir = indexed();
        sift_in(dir.path())
            .args(["reset", "shop.item"])
            .assert()
            .failure();
    }
}

mod schema {
    use super::*;

    #[test]
    fn lists_derived_fields() {
        let dir = indexed();
        let output = sift_in(dir.path())
            .args(["schema", "blog.post", "--json"])
            .output()
            .unwrap();
        assert!(output.status.success());
        let fields: Value = serde_json::from_slice(&output.stdout).unwrap();
        let fields = fields.as_array().unwrap();
        assert!(
            fields
                .iter()
                .any(|f| f["source"] == "status" && f["role"] == "filter")
        );
        assert!(
            fields
                .iter()
                .any(|f| f["source"] == "body" && f["role"] == "search")
        );
    }
}

mod check {
    use super::*;

    #[test]
    fn passes_with_a_path() {
        let dir = temp_dir();
        sift_in(dir.path())
            .arg("check")
            .assert()
            .success()
            .stdout(predicate::str::contains("No issues found."));
    }

    #[test]
    fn reports_warnings() {
        let dir = temp_dir();
        fs::write(
            dir.path().join(".sift.toml"),
            "[backend]\npath = \"idx\"\n\n[search]\nfuzzy_distance = 5\n",
        )
        .unwrap();
        sift()
            .current_dir(dir.path())
            .env("HOME", dir.path())
            .env_remove("SIFT_CONFIG")
            .arg("check")
            .assert()
            .failure()
            .stdout(predicate::str::contains("fuzzy_distance"));
    }

    #[test]
    fn config_env_names_the_only_file() {
        let dir = temp_dir();
        fs::write(dir.path().join(".sift.toml"), "[search]\nfuzzy_distance = 5\n").unwrap();
        fs::write(dir.path().join("ci.toml"), "[backend]\npath = \"idx\"\n").unwrap();
        sift()
            .current_dir(dir.path())
            .env("HOME", dir.path())
            .env("SIFT_CONFIG", "ci.toml")
            .arg("check")
            .assert()
            .success()
            .stdout(predicate::str::contains("ci.toml"))
            .stdout(predicate::str::contains("No issues found."));
    }

    #[test]
    fn fails_without_a_path() {
        let dir = temp_dir();
        sift()
            .current_dir(dir.path())
            .env("HOME", dir.path())
            .env_remove("SIFT_CONFIG")
            .arg("check")
            .assert()
            .failure();
    }
}
