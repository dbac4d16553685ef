//! scan
//!
//! Filesystem scanner (C6): discovers existing git working trees under one
//! or more root directories so the Planner can reconcile what's on disk
//! against the declared manifest and flag orphans.

use std::path::{Path, PathBuf};

use ignore::overrides::OverrideBuilder;
use ignore::WalkBuilder;
use thiserror::Error;

use crate::git::parse_origin_remote_from_config;

/// Errors from scanning.
#[derive(Debug, Error)]
pub enum ScanError {
    /// A scan root does not exist or is not a directory.
    #[error("scan root '{0}' does not exist or is not a directory")]
    InvalidRoot(PathBuf),

    /// Walking the directory tree failed.
    #[error("failed to walk '{path}': {source}")]
    Walk {
        /// The root being walked when the failure occurred.
        path: PathBuf,
        /// Underlying error from the `ignore` walker.
        #[source]
        source: ignore::Error,
    },

    /// An `include`/`exclude` glob failed to compile.
    #[error("invalid glob pattern '{pattern}': {source}")]
    InvalidGlob {
        /// The offending pattern.
        pattern: String,
        /// Underlying error from the `ignore` crate's glob matcher.
        #[source]
        source: ignore::Error,
    },
}

/// Options controlling which directories a scan considers.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Only descend into directories matching at least one of these globs,
    /// relative to the scan root. Empty means "everything" (no filter).
    pub include: Vec<String>,
    /// Never descend into directories matching any of these globs, relative
    /// to the scan root. Exclude always wins over include.
    pub exclude: Vec<String>,
    /// Maximum descent depth below the scan root. `None` means unbounded.
    pub max_depth: Option<usize>,
}

/// A git working tree discovered on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedRepo {
    /// Absolute path to the working tree root (the directory containing `.git`).
    pub path: PathBuf,
    /// Directory basename.
    pub name: String,
    /// Remote URLs, origin first if present.
    pub remote_urls: Vec<String>,
    /// Depth below the scan root (the root itself is depth 0).
    pub depth: usize,
}

/// Scan `roots` for git working trees under the default [`ScanOptions`]
/// (no include/exclude filter, unbounded depth).
pub fn scan(roots: &[PathBuf]) -> Result<Vec<ScannedRepo>, ScanError> {
    scan_with_options(roots, &ScanOptions::default())
}

/// Scan `roots` for git working trees.
///
/// Descent is lexicographic and deterministic (single-threaded walk, entries
/// sorted by filename). Symlinks are never followed. A directory is not
/// descended into once it is identified as a working tree: a repository
/// nested inside another repository's working tree is not discovered.
/// `.gitignore` rules are honored in the ordinary ignore-crate sense, except
/// that `.git` itself is always considered (it is normally hidden from
/// `ignore`'s default walk). `options.include`/`options.exclude` further
/// restrict descent by glob, relative to each root; `options.max_depth`
/// bounds how far descent goes below each root.
pub fn scan_with_options(roots: &[PathBuf], options: &ScanOptions) -> Result<Vec<ScannedRepo>, ScanError> {
    let mut found = Vec::new();
    for root in roots {
        if !root.is_dir() {
            return Err(ScanError::InvalidRoot(root.clone()));
        }
        scan_one_root(root, options, &mut found)?;
    }
    found.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(found)
}

fn scan_one_root(root: &Path, options: &ScanOptions, out: &mut Vec<ScannedRepo>) -> Result<(), ScanError> {
    let mut builder = WalkBuilder::new(root);
    builder
        .standard_filters(true)
        .follow_links(false)
        .threads(1)
        .sort_by_file_name(|a, b| a.cmp(b));

    if let Some(max_depth) = options.max_depth {
        builder.max_depth(Some(max_depth));
    }

    if !options.include.is_empty() || !options.exclude.is_empty() {
        // Later-added patterns take precedence in the `ignore` crate's
        // override matcher, so include patterns are added first and exclude
        // patterns last, giving exclude the final say.
        let mut overrides = OverrideBuilder::new(root);
        for pattern in &options.include {
            overrides
                .add(pattern)
                .map_err(|source| ScanError::InvalidGlob { pattern: pattern.clone(), source })?;
        }
        for pattern in &options.exclude {
            let negated = format!("!{pattern}");
            overrides
                .add(&negated)
                .map_err(|source| ScanError::InvalidGlob { pattern: pattern.clone(), source })?;
        }
        let built = overrides
            .build()
            .map_err(|source| ScanError::InvalidGlob { pattern: "<override set>".to_string(), source })?;
        builder.overrides(built);
    }

    let walker = builder.build();
    // Tracks working-tree roots already emitted so nested `.git` dirs under
    // them are skipped.
    let mut claimed: Vec<PathBuf> = Vec::new();

    for entry in walker {
        let entry = entry.map_err(|e| ScanError::Walk {
            path: root.to_path_buf(),
            source: e,
        })?;
        let path = entry.path();

        if claimed.iter().any(|c| path.starts_with(c) && path != c) {
            continue;
        }

        let is_dir = entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false);
        if !is_dir {
            continue;
        }

        let git_dir = path.join(".git");
        if !git_dir.exists() {
            continue;
        }

        claimed.push(path.to_path_buf());

        let depth = path
            .strip_prefix(root)
            .map(|rel| rel.components().count())
            .unwrap_or(0);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let remote_urls = read_remote_urls(&git_dir);

        out.push(ScannedRepo {
            path: path.to_path_buf(),
            name,
            remote_urls,
            depth,
        });
    }

    Ok(())
}

fn read_remote_urls(git_dir: &Path) -> Vec<String> {
    let config_path = if git_dir.is_file() {
        // Worktree/submodule gitdir pointer file: "gitdir: <real path>".
        match std::fs::read_to_string(git_dir) {
            Ok(contents) => {
                let real = contents.trim().strip_prefix("gitdir: ").unwrap_or("").to_string();
                if real.is_empty() {
                    return Vec::new();
                }
                PathBuf::from(real).join("config")
            }
            Err(_) => return Vec::new(),
        }
    } else {
        git_dir.join("config")
    };

    match std::fs::read_to_string(&config_path) {
        Ok(contents) => {
            let url = parse_origin_remote_from_config(&contents);
            if url.is_empty() {
                Vec::new()
            } else {
                vec![url]
            }
        }
        Err(_) => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;
    use tempfile::TempDir;

    fn init_repo(path: &Path, origin: Option<&str>) {
        std::fs::create_dir_all(path).unwrap();
        let status = Command::new("git")
            .arg("init")
            .arg("--quiet")
            .current_dir(path)
            .status()
            .expect("git init");
        assert!(status.success());
        if let Some(url) = origin {
            let status = Command::new("git")
                .args(["remote", "add", "origin", url])
                .current_dir(path)
                .status()
                .expect("git remote add");
            assert!(status.success());
        }
    }

    #[test]
    fn finds_single_repo_at_root() {
        let dir = TempDir::new().unwrap();
        let repo_path = dir.path().join("myrepo");
        init_repo(&repo_path, Some("https://example.com/org/myrepo.git"));

        let found = scan(&[dir.path().to_path_buf()]).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "myrepo");
        assert_eq!(found[0].remote_urls, vec!["https://example.com/org/myrepo.git"]);
    }

    #[test]
    fn does_not_descend_into_nested_repo() {
        let dir = TempDir::new().unwrap();
        let outer = dir.path().join("outer");
        init_repo(&outer, None);
        let inner = outer.join("vendor").join("inner");
        init_repo(&inner, None);

        let found = scan(&[dir.path().to_path_buf()]).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].path, outer);
    }

    #[test]
    fn finds_repos_at_multiple_depths() {
        let dir = TempDir::new().unwrap();
        init_repo(&dir.path().join("a"), None);
        init_repo(&dir.path().join("group").join("b"), None);

        let mut found = scan(&[dir.path().to_path_buf()]).unwrap();
        found.sort_by(|x, y| x.name.cmp(&y.name));
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].name, "a");
        assert_eq!(found[0].depth, 1);
        assert_eq!(found[1].name, "b");
        assert_eq!(found[1].depth, 2);
    }

    #[test]
    fn invalid_root_errors() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("does-not-exist");
        let err = scan(&[missing]).unwrap_err();
        assert!(matches!(err, ScanError::InvalidRoot(_)));
    }

    #[test]
    fn no_repos_yields_empty_vec() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("empty")).unwrap();
        let found = scan(&[dir.path().to_path_buf()]).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn exclude_glob_skips_matching_directories() {
        let dir = TempDir::new().unwrap();
        init_repo(&dir.path().join("keep"), None);
        init_repo(&dir.path().join("vendor-skip"), None);

        let options = ScanOptions {
            exclude: vec!["vendor-*".to_string()],
            ..ScanOptions::default()
        };
        let found = scan_with_options(&[dir.path().to_path_buf()], &options).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "keep");
    }

    #[test]
    fn include_glob_restricts_to_matching_directories() {
        let dir = TempDir::new().unwrap();
        init_repo(&dir.path().join("group-a").join("repo"), None);
        init_repo(&dir.path().join("group-b").join("repo"), None);

        let options = ScanOptions {
            include: vec!["group-a".to_string(), "group-a/**".to_string()],
            ..ScanOptions::default()
        };
        let found = scan_with_options(&[dir.path().to_path_buf()], &options).unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].path.starts_with(dir.path().join("group-a")));
    }

    #[test]
    fn max_depth_bounds_descent() {
        let dir = TempDir::new().unwrap();
        init_repo(&dir.path().join("a"), None);
        init_repo(&dir.path().join("group").join("b"), None);

        let options = ScanOptions {
            max_depth: Some(1),
            ..ScanOptions::default()
        };
        let found = scan_with_options(&[dir.path().to_path_buf()], &options).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "a");
    }
}
