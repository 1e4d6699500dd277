//! # certcode-diff
//!
//! Turns generated changesets into structured artifacts.
//!
//! ## Overview
//!
//! A unified diff is reduced to:
//! - the files it touches (new-side paths from `diff --git` headers)
//! - how many lines were added and removed
//! - the primary language of the change
//!
//! Diffs can be supplied directly or captured from a git repository.
//!
//! ## Key Types
//!
//! - [`CodeArtifact`] - Parsed changeset
//! - [`DiffStats`] - Addition/deletion/file counts
//! - [`Language`] - Closed set of language tags
//! - [`GitDiff`] - Diff capture from commits, ranges and the index
//!
//! ## Usage
//!
//! ```rust,ignore
//! use certcode_diff::{parse_diff, GitDiff};
//! use std::path::Path;
//!
//! let git = GitDiff::discover(Path::new("."))?;
//! let diff = git.commit_diff("HEAD")?;
//!
//! let artifact = parse_diff(&diff, None);
//! println!("{} files, +{} -{}", artifact.files_changed.len(),
//!     artifact.diff_stats.additions, artifact.diff_stats.deletions);
//! ```

mod diff;
mod git;
mod language;
mod project;

pub use diff::{extract_added_content, parse_diff, CodeArtifact, DiffStats};
pub use git::{CommitInfo, GitDiff, GitError};
pub use language::{
    detect_from_filename, detect_from_shebang, detect_language, detect_primary_language,
    Language, LanguageInfo, EXTENSION_LANGUAGES,
};
pub use project::detect_project_language;
