//! git::parse
//!
//! Pure, deterministic parsers over `git`'s textual output formats.
//!
//! None of these functions touch the filesystem or run a subprocess; they
//! only understand strings. That makes them cheap to property-test against
//! a generator of synthetic git output, independent of any real repository.

use thiserror::Error;

/// Errors from parsing git output.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A `git branch -vv` line had fewer than the minimum expected tokens.
    #[error("malformed branch line: {0:?}")]
    MalformedBranchLine(String),

    /// The input to `extract_repo_name_from_url` was empty or whitespace only.
    #[error("empty repository URL")]
    EmptyUrl,

    /// A `git status --porcelain=v1` line had an unrecognized format.
    #[error("malformed porcelain status line: {0:?}")]
    MalformedStatusLine(String),
}

/// A single parsed line of `git branch -vv` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchLine {
    /// Whether this is the currently checked-out branch (`*` marker).
    pub is_current: bool,
    /// The branch name.
    pub name: String,
    /// The short commit SHA at the branch tip.
    pub sha: String,
    /// The upstream remote-tracking branch, if any (e.g. `origin/main`).
    pub upstream: Option<String>,
    /// Commits ahead of upstream.
    pub ahead: u32,
    /// Commits behind upstream.
    pub behind: u32,
    /// The commit subject line.
    pub subject: String,
}

/// Parse one line of `git branch -vv` output.
///
/// Format: two marker characters (`'* '` or `"  "`), then whitespace-delimited
/// `name`, `sha`, an optional bracketed upstream annotation
/// (`[origin/x]` or `[origin/x: ahead N, behind M]`), and the remainder as the
/// commit subject.
pub fn parse_branch_line(line: &str) -> Result<BranchLine, ParseError> {
    if line.len() < 2 {
        return Err(ParseError::MalformedBranchLine(line.to_string()));
    }
    let is_current = line.as_bytes()[0] == b'*';
    let rest = &line[2..];

    let mut tokens = rest.splitn(3, char::is_whitespace);
    let name = tokens
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ParseError::MalformedBranchLine(line.to_string()))?
        .to_string();
    let remainder = tokens
        .next()
        .ok_or_else(|| ParseError::MalformedBranchLine(line.to_string()))?;
    let remainder = remainder.trim_start();
    let mut remainder_tokens = remainder.splitn(2, char::is_whitespace);
    let sha = remainder_tokens
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ParseError::MalformedBranchLine(line.to_string()))?
        .to_string();
    let after_sha = remainder_tokens.next().unwrap_or("").trim_start();

    let (upstream, ahead, behind, subject) = if let Some(stripped) = after_sha.strip_prefix('[') {
        let close = stripped
            .find(']')
            .ok_or_else(|| ParseError::MalformedBranchLine(line.to_string()))?;
        let bracket_body = &stripped[..close];
        let subject = stripped[close + 1..].trim_start().to_string();

        let (upstream_name, tracking_body) = match bracket_body.split_once(':') {
            Some((name, body)) => (name.trim(), body.trim()),
            None => (bracket_body.trim(), ""),
        };
        let (ahead, behind) = parse_ahead_behind(tracking_body)?;
        (Some(upstream_name.to_string()), ahead, behind, subject)
    } else {
        (None, 0, 0, after_sha.to_string())
    };

    Ok(BranchLine {
        is_current,
        name,
        sha,
        upstream,
        ahead,
        behind,
        subject,
    })
}

/// Parse the tracking annotation body (the text between `:` and `]`, or empty
/// if there was no `:`) into `(ahead, behind)` counts.
///
/// Recognizes `ahead N` and `behind N` tokens separated by a comma; absence
/// of either token means 0 for that count.
pub fn parse_ahead_behind(body: &str) -> Result<(u32, u32), ParseError> {
    let mut ahead = 0u32;
    let mut behind = 0u32;

    for part in body.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if let Some(n) = part.strip_prefix("ahead") {
            ahead = n.trim().parse().unwrap_or(0);
        } else if let Some(n) = part.strip_prefix("behind") {
            behind = n.trim().parse().unwrap_or(0);
        }
    }

    Ok((ahead, behind))
}

/// Counts derived from `git status --porcelain=v1 --untracked-files=all`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PorcelainCounts {
    /// Files with staged (index) changes.
    pub staged: u32,
    /// Files with unstaged worktree modifications.
    pub modified: u32,
    /// Files deleted in the worktree or index.
    pub deleted: u32,
    /// Files renamed.
    pub renamed: u32,
    /// Untracked files.
    pub untracked: u32,
    /// Files with unresolved merge conflicts.
    pub conflict: u32,
}

impl PorcelainCounts {
    /// Whether any entries were observed at all (worktree is not clean).
    pub fn is_dirty(&self) -> bool {
        self.staged > 0
            || self.modified > 0
            || self.deleted > 0
            || self.renamed > 0
            || self.untracked > 0
            || self.conflict > 0
    }
}

const CONFLICT_CODES: &[&str] = &["UU", "AA", "DD", "AU", "UA", "UD", "DU"];

/// Classify `git status --porcelain=v1` output into [`PorcelainCounts`].
///
/// Each line's first two characters are the index/worktree status codes.
/// A rename line has the form `R  old -> new`.
pub fn parse_status_porcelain(output: &str) -> Result<PorcelainCounts, ParseError> {
    let mut counts = PorcelainCounts::default();

    for line in output.lines() {
        if line.is_empty() {
            continue;
        }
        if line.len() < 2 {
            return Err(ParseError::MalformedStatusLine(line.to_string()));
        }
        let code = &line[..2];

        if CONFLICT_CODES.contains(&code) {
            counts.conflict += 1;
            continue;
        }

        let index = code.as_bytes()[0];
        let worktree = code.as_bytes()[1];

        if code == "??" {
            counts.untracked += 1;
            continue;
        }

        if index == b'R' || worktree == b'R' {
            counts.renamed += 1;
        }
        if index == b'D' || worktree == b'D' {
            counts.deleted += 1;
        }
        if index != b' ' && index != b'?' && index != b'R' && index != b'D' {
            counts.staged += 1;
        } else if index == b'R' {
            counts.staged += 1;
        }
        if worktree == b'M' {
            counts.modified += 1;
        }
    }

    Ok(counts)
}

/// Extract the repository name from a clone URL.
///
/// Strips any trailing `.git` and returns the final path segment. Accepts
/// `https://`, `http://`, `git@host:org/name.git` SCP-like syntax, and
/// `ssh://git@host[:port]/org/name.git`.
pub fn extract_repo_name_from_url(url: &str) -> Result<String, ParseError> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(ParseError::EmptyUrl);
    }

    let without_git_suffix = trimmed.strip_suffix(".git").unwrap_or(trimmed);
    let without_git_suffix = without_git_suffix.trim_end_matches('/');

    // SCP-like syntax: git@host:org/name
    let path_part = if let Some((_, after_colon)) = without_git_suffix.split_once(':') {
        if without_git_suffix.contains("://") {
            without_git_suffix
        } else {
            after_colon
        }
    } else {
        without_git_suffix
    };

    let segment = path_part
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .ok_or(ParseError::EmptyUrl)?;

    Ok(segment.to_string())
}

/// Find the `origin` remote's URL in raw `.git/config` text.
///
/// Returns an empty string if no `[remote "origin"]` section exists, or if
/// it exists without a `url =` entry.
pub fn parse_origin_remote_from_config(config_text: &str) -> String {
    let mut in_origin_section = false;

    for raw_line in config_text.lines() {
        let line = raw_line.trim();
        if line.starts_with('[') {
            in_origin_section = line.eq_ignore_ascii_case(r#"[remote "origin"]"#);
            continue;
        }
        if in_origin_section {
            if let Some((key, value)) = line.split_once('=') {
                if key.trim() == "url" {
                    return value.trim().to_string();
                }
            }
        }
    }

    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn branch_line_diverged_with_upstream() {
        let line = "* main       abc1234 [origin/main: ahead 2, behind 3] Diverged work";
        let parsed = parse_branch_line(line).unwrap();
        assert!(parsed.is_current);
        assert_eq!(parsed.name, "main");
        assert_eq!(parsed.sha, "abc1234");
        assert_eq!(parsed.upstream.as_deref(), Some("origin/main"));
        assert_eq!(parsed.ahead, 2);
        assert_eq!(parsed.behind, 3);
        assert_eq!(parsed.subject, "Diverged work");
    }

    #[test]
    fn branch_line_no_upstream() {
        let line = "  feature/x  def5678 Local only branch";
        let parsed = parse_branch_line(line).unwrap();
        assert!(!parsed.is_current);
        assert_eq!(parsed.name, "feature/x");
        assert_eq!(parsed.upstream, None);
        assert_eq!(parsed.ahead, 0);
        assert_eq!(parsed.behind, 0);
        assert_eq!(parsed.subject, "Local only branch");
    }

    #[test]
    fn branch_line_upstream_up_to_date() {
        let line = "  release    ghi9012 [origin/release] Sync";
        let parsed = parse_branch_line(line).unwrap();
        assert_eq!(parsed.upstream.as_deref(), Some("origin/release"));
        assert_eq!(parsed.ahead, 0);
        assert_eq!(parsed.behind, 0);
        assert_eq!(parsed.subject, "Sync");
    }

    #[test]
    fn branch_line_too_short_is_error() {
        assert!(parse_branch_line("*").is_err());
        assert!(parse_branch_line("").is_err());
    }

    #[test]
    fn ahead_behind_both_present() {
        assert_eq!(parse_ahead_behind("ahead 2, behind 3").unwrap(), (2, 3));
    }

    #[test]
    fn ahead_behind_only_ahead() {
        assert_eq!(parse_ahead_behind("ahead 5").unwrap(), (5, 0));
    }

    #[test]
    fn ahead_behind_empty() {
        assert_eq!(parse_ahead_behind("").unwrap(), (0, 0));
    }

    #[test]
    fn status_porcelain_conflict_takes_counts() {
        let out = "UU src/main.c\n M README.md\n?? build.log\n";
        let counts = parse_status_porcelain(out).unwrap();
        assert_eq!(counts.conflict, 1);
        assert_eq!(counts.modified, 1);
        assert_eq!(counts.untracked, 1);
    }

    #[test]
    fn status_porcelain_rename() {
        let out = "R  old.txt -> new.txt\n";
        let counts = parse_status_porcelain(out).unwrap();
        assert_eq!(counts.renamed, 1);
        assert_eq!(counts.staged, 1);
    }

    #[test]
    fn status_porcelain_clean_is_not_dirty() {
        let counts = parse_status_porcelain("").unwrap();
        assert!(!counts.is_dirty());
    }

    #[test]
    fn extract_name_https() {
        assert_eq!(
            extract_repo_name_from_url("https://github.com/org/repo.git").unwrap(),
            "repo"
        );
        assert_eq!(
            extract_repo_name_from_url("https://github.com/org/repo").unwrap(),
            "repo"
        );
    }

    #[test]
    fn extract_name_scp_like() {
        assert_eq!(
            extract_repo_name_from_url("git@host:org/name.git").unwrap(),
            "name"
        );
    }

    #[test]
    fn extract_name_ssh_url() {
        assert_eq!(
            extract_repo_name_from_url("ssh://git@host:2222/org/name.git").unwrap(),
            "name"
        );
    }

    #[test]
    fn extract_name_rejects_empty() {
        assert!(extract_repo_name_from_url("").is_err());
        assert!(extract_repo_name_from_url("   ").is_err());
    }

    #[test]
    fn extract_name_trailing_git_is_idempotent() {
        let with_git = "https://host/org/repo.git";
        let without_git = "https://host/org/repo";
        assert_eq!(
            extract_repo_name_from_url(with_git).unwrap(),
            extract_repo_name_from_url(without_git).unwrap()
        );
    }

    #[test]
    fn origin_remote_found() {
        let config = r#"
[core]
	repositoryformatversion = 0
[remote "origin"]
	url = https://github.com/org/repo.git
	fetch = +refs/heads/*:refs/remotes/origin/*
[remote "upstream"]
	url = https://github.com/other/repo.git
"#;
        assert_eq!(
            parse_origin_remote_from_config(config),
            "https://github.com/org/repo.git"
        );
    }

    #[test]
    fn origin_remote_absent() {
        let config = "[core]\n\trepositoryformatversion = 0\n";
        assert_eq!(parse_origin_remote_from_config(config), "");
    }

    proptest! {
        #[test]
        fn ahead_behind_never_panics(s in "\\PC*") {
            let _ = parse_ahead_behind(&s);
        }

        #[test]
        fn ahead_behind_roundtrips(ahead in 0u32..10_000, behind in 0u32..10_000) {
            let body = format!("ahead {}, behind {}", ahead, behind);
            let (a, b) = parse_ahead_behind(&body).unwrap();
            prop_assert_eq!(a, ahead);
            prop_assert_eq!(b, behind);
        }

        #[test]
        fn branch_line_never_panics(s in "\\PC*") {
            let _ = parse_branch_line(&s);
        }

        #[test]
        fn branch_line_roundtrips(
            current in any::<bool>(),
            name in "[a-zA-Z][a-zA-Z0-9/_-]{0,20}",
            sha in "[0-9a-f]{7,40}",
            subject in "[a-zA-Z0-9 ]{0,40}",
        ) {
            let marker = if current { "*" } else { " " };
            let line = format!("{} {} {} {}", marker, name, sha, subject);
            let parsed = parse_branch_line(&line).unwrap();
            prop_assert_eq!(parsed.is_current, current);
            prop_assert_eq!(parsed.name, name);
            prop_assert_eq!(parsed.sha, sha);
        }

        #[test]
        fn status_porcelain_never_panics(s in "\\PC*") {
            let _ = parse_status_porcelain(&s);
        }

        #[test]
        fn extract_repo_name_never_panics(s in "\\PC*") {
            let _ = extract_repo_name_from_url(&s);
        }
    }
}
