//! cli::commands::discover
//!
//! `gitrun discover`: scan one or more root directories for existing git
//! working trees (C6), independent of any manifest.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::scan::{self, ScanOptions};

pub fn run(
    roots: Vec<PathBuf>,
    include: Vec<String>,
    exclude: Vec<String>,
    max_depth: Option<usize>,
    json: bool,
) -> Result<i32> {
    let roots = if roots.is_empty() {
        vec![std::env::current_dir().context("failed to read current directory")?]
    } else {
        roots
    };

    let options = ScanOptions {
        include,
        exclude,
        max_depth,
    };
    let found = scan::scan_with_options(&roots, &options).context("scan failed")?;

    if json {
        let repos: Vec<_> = found
            .iter()
            .map(|r| {
                serde_json::json!({
                    "path": r.path.display().to_string(),
                    "name": r.name,
                    "remote_urls": r.remote_urls,
                    "depth": r.depth,
                })
            })
            .collect();
        println!("{}", serde_json::json!({ "repositories": repos }));
    } else {
        for repo in &found {
            println!("{}", repo.path.display());
        }
    }

    Ok(0)
}
