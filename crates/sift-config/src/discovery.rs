//! Locating `.sift.toml` files.
//!
//! `SIFT_CONFIG` names a single file and disables discovery. Otherwise every
//! `.sift.toml` between the working directory and the filesystem root is used,
//! nearest first, followed by `~/.sift.toml`. A file with `root = true` ends the
//! list.

use std::{
    env,
    ffi::OsString,
    path::{Path, PathBuf},
};

use directories::BaseDirs;

use crate::parse::is_root_config;

/// The configuration filename.
pub const CONFIG_FILENAME: &str = ".sift.toml";

/// Environment variable naming the only config file to load.
pub const CONFIG_ENV: &str = "SIFT_CONFIG";

/// Config files that apply to `cwd`, highest precedence first.
pub fn discover_config_files(cwd: &Path) -> Vec<PathBuf> {
    config_files_for(cwd, env::var_os(CONFIG_ENV))
}

/// Resolves the file list given the value of `SIFT_CONFIG`.
///
/// A relative override is taken relative to `cwd`. It is returned even if
/// missing, so loading reports the bad path.
fn config_files_for(cwd: &Path, override_file: Option<OsString>) -> Vec<PathBuf> {
    if let Some(file) = override_file.filter(|f| !f.is_empty()) {
        return vec![cwd.join(file)];
    }

    let mut files = Vec::new();
    for candidate in cwd.ancestors().map(|dir| dir.join(CONFIG_FILENAME)) {
        if !candidate.is_file() {
            continue;
        }
        let stop = is_root_config(&candidate);
        files.push(candidate);
        if stop {
            return files;
        }
    }
    if let Some(home) = home_config().filter(|h| h.is_file() && !files.contains(h)) {
        files.push(home);
    }
    files
}

/// `~/.sift.toml`, when a home directory is known.
fn home_config() -> Option<PathBuf> {
    BaseDirs::new().map(|dirs| dirs.home_dir().join(CONFIG_FILENAME))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    /// Writes `<rel>/.sift.toml` under `tree` and returns its path.
    fn write_config(tree: &TempDir, rel: &str, content: &str) -> PathBuf {
        let dir = tree.path().join(rel);
        fs::create_dir_all(&dir).unwrap();
        let file = dir.join(CONFIG_FILENAME);
        fs::write(&file, content).unwrap();
        file
    }

    /// Creates `<rel>` under `tree` and returns its path.
    fn make_dir(tree: &TempDir, rel: &str) -> PathBuf {
        let dir = tree.path().join(rel);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Discovery without an override, ignoring the machine's own home config.
    fn discovered(cwd: &Path) -> Vec<PathBuf> {
        let home = home_config();
        config_files_for(cwd, None)
            .into_iter()
            .filter(|f| Some(f) != home.as_ref())
            .collect()
    }

    #[test]
    fn nothing_to_find() {
        let tree = tempfile::tempdir().unwrap();
        assert!(discovered(&make_dir(&tree, "a/b/c")).is_empty());
    }

    #[test]
    fn nearest_file_comes_first() {
        let tree = tempfile::tempdir().unwrap();
        let top = write_config(&tree, "", "[search]\nfuzzy_distance = 0\n");
        let site = write_config(&tree, "site", "[backend]\npath = \"idx\"\n");
        let app = write_config(&tree, "site/apps/blog", "");
        let cwd = make_dir(&tree, "site/apps/blog/templates");

        assert_eq!(discovered(&cwd), [app, site, top]);
    }

    #[test]
    fn directories_named_like_the_config_are_ignored() {
        let tree = tempfile::tempdir().unwrap();
        make_dir(&tree, CONFIG_FILENAME);
        assert!(discovered(&make_dir(&tree, "src")).is_empty());
    }

    #[test]
    fn root_file_ends_the_walk() {
        let tree = tempfile::tempdir().unwrap();
        write_config(&tree, "", "");
        let project = write_config(&tree, "project", "root = true\n");
        let app = write_config(&tree, "project/app", "");
        let cwd = make_dir(&tree, "project/app/deep");

        assert_eq!(config_files_for(&cwd, None), [app, project]);
    }

    #[test]
    fn root_false_keeps_walking() {
        let tree = tempfile::tempdir().unwrap();
        let top = write_config(&tree, "", "");
        let project = write_config(&tree, "project", "root = false\n");
        let cwd = make_dir(&tree, "project/src");

        assert_eq!(discovered(&cwd), [project, top]);
    }

    #[test]
    fn override_replaces_discovery() {
        let tree = tempfile::tempdir().unwrap();
        write_config(&tree, "", "root = true\n");
        let cwd = make_dir(&tree, "project");

        let relative = config_files_for(&cwd, Some("custom.toml".into()));
        assert_eq!(relative, [cwd.join("custom.toml")]);

        let absolute = tree.path().join("elsewhere.toml");
        let files = config_files_for(&cwd, Some(absolute.clone().into_os_string()));
        assert_eq!(files, [absolute]);
    }

    #[test]
    fn empty_override_is_ignored() {
        let tree = tempfile::tempdir().unwrap();
        let top = write_config(&tree, "", "root = true\n");
        let cwd = make_dir(&tree, "project");
        assert_eq!(config_files_for(&cwd, Some(OsString::new())), [top]);
    }

    #[test]
    fn home_config_is_named_like_the_others() {
        if let Some(path) = home_config() {
            assert!(path.ends_with(CONFIG_FILENAME));
        }
    }
}
