use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::debug;

use crate::language::{detect_primary_language, Language};

static DIFF_FILE_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^diff --git a/(.+) b/(.+)$").expect("valid regex"));

/// Line counts for a changeset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStats {
    pub additions: usize,
    pub deletions: usize,
    #[serde(rename = "files")]
    pub files_changed: usize,
}

/// A generated changeset and what was derived from it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeArtifact {
    /// Raw unified diff
    pub diff: String,
    /// New-side paths, unique, in order of first appearance
    pub files_changed: Vec<String>,
    pub language: Language,
    pub diff_stats: DiffStats,
    /// Full file content, when the artifact is a single file
    pub raw_content: Option<String>,
}

/// Parse a unified diff (`git diff`, `git show`, ...) into a [`CodeArtifact`].
///
/// File paths come from `diff --git` headers only. Additions and deletions are
/// counted over every line of the blob: a line starting with `+` that is not a
/// `+++` header is an addition, and likewise for `-`/`---`. This is not
/// hunk-aware, so content lines that themselves begin with `++` or `--` are
/// skipped, and a blob without headers still yields line counts.
pub fn parse_diff(diff: &str, language: Option<Language>) -> CodeArtifact {
    let mut files_changed: Vec<String> = Vec::new();
    for caps in DIFF_FILE_HEADER.captures_iter(diff) {
        let new_path = &caps[2];
        if !files_changed.iter().any(|f| f == new_path) {
            files_changed.push(new_path.to_string());
        }
    }

    let mut additions = 0;
    let mut deletions = 0;
    for line in diff.split('\n') {
        if line.starts_with('+') && !line.starts_with("+++") {
            additions += 1;
        } else if line.starts_with('-') && !line.starts_with("---") {
            deletions += 1;
        }
    }

    let language = language.unwrap_or_else(|| detect_primary_language(&files_changed[..]));

    debug!(
        files = files_changed.len(),
        additions,
        deletions,
        language = %language,
        "Parsed diff"
    );

    CodeArtifact {
        diff: diff.to_string(),
        diff_stats: DiffStats {
            additions,
            deletions,
            files_changed: files_changed.len(),
        },
        files_changed,
        language,
        raw_content: None,
    }
}

/// Only the added lines of a diff, with their leading `+` removed
pub fn extract_added_content(diff: &str) -> String {
    diff.split('\n')
        .filter(|line| line.starts_with('+') && !line.starts_with("+++"))
        .map(|line| &line[1..])
        .collect::<Vec<_>>()
        .join("\n")
}
