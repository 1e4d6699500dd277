use chrono::{DateTime, FixedOffset};
use git2::{Diff, DiffFormat, DiffOptions, Repository, Tree};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum GitError {
    #[error("Not a git repository: {0}")]
    NotARepo(String),

    #[error("Git operation failed: {0}")]
    GitOperationFailed(#[from] git2::Error),

    #[error("Unknown git reference: {0}")]
    UnknownRef(String),
}

/// Metadata about a single commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub sha: String,
    pub message: String,
    pub author: String,
    pub author_email: String,
    /// Author time, ISO-8601 with the author's offset
    pub timestamp: String,
}

/// Produces unified diffs from a git repository
pub struct GitDiff {
    repo: Repository,
}

impl GitDiff {
    /// Open the repository containing `working_dir`
    pub fn discover(working_dir: &Path) -> Result<Self, GitError> {
        let repo = Repository::discover(working_dir)
            .map_err(|_| GitError::NotARepo(working_dir.display().to_string()))?;
        Ok(Self { repo })
    }

    /// Changes introduced by a single commit, relative to its first parent
    pub fn commit_diff(&self, reference: &str) -> Result<String, GitError> {
        let commit = self.resolve_commit(reference)?;
        let tree = commit.tree()?;
        let parent_tree = match commit.parent_count() {
            0 => None,
            _ => Some(commit.parent(0)?.tree()?),
        };

        let diff = self
            .repo
            .diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)?;
        let text = render_patch(&diff)?;

        debug!(reference, diff_len = text.len(), "Captured commit diff");
        Ok(text)
    }

    /// Changes between two references
    pub fn range_diff(&self, base_ref: &str, reference: &str) -> Result<String, GitError> {
        let base_tree = self.resolve_tree(base_ref)?;
        let tree = self.resolve_tree(reference)?;

        let diff = self
            .repo
            .diff_tree_to_tree(Some(&base_tree), Some(&tree), None)?;
        let text = render_patch(&diff)?;

        debug!(base_ref, reference, diff_len = text.len(), "Captured range diff");
        Ok(text)
    }

    /// Either a single commit's changes or the range `base_ref..reference`
    pub fn diff_for(&self, reference: &str, base_ref: Option<&str>) -> Result<String, GitError> {
        match base_ref {
            Some(base) => self.range_diff(base, reference),
            None => self.commit_diff(reference),
        }
    }

    /// Staged changes (index against HEAD)
    pub fn staged_diff(&self) -> Result<String, GitError> {
        let head_tree = self.head_tree()?;
        let diff = self
            .repo
            .diff_tree_to_index(head_tree.as_ref(), None, None)?;
        render_patch(&diff)
    }

    /// Working directory and index changes against HEAD
    pub fn working_diff(&self, include_untracked: bool) -> Result<String, GitError> {
        let head_tree = self.head_tree()?;

        let mut opts = DiffOptions::new();
        opts.include_untracked(include_untracked)
            .recurse_untracked_dirs(true)
            .show_untracked_content(include_untracked);

        let diff = self
            .repo
            .diff_tree_to_workdir_with_index(head_tree.as_ref(), Some(&mut opts))?;
        render_patch(&diff)
    }

    pub fn commit_info(&self, reference: &str) -> Result<CommitInfo, GitError> {
        let commit = self.resolve_commit(reference)?;
        let author = commit.author();
        let time = commit.time();

        let timestamp = FixedOffset::east_opt(time.offset_minutes() * 60)
            .and_then(|offset| {
                DateTime::from_timestamp(time.seconds(), 0).map(|t| t.with_timezone(&offset))
            })
            .map(|t| t.to_rfc3339())
            .unwrap_or_default();

        Ok(CommitInfo {
            sha: commit.id().to_string(),
            message: commit.summary().unwrap_or("").to_string(),
            author: author.name().unwrap_or("").to_string(),
            author_email: author.email().unwrap_or("").to_string(),
            timestamp,
        })
    }

    /// Short name of the checked-out branch, if HEAD is on one
    pub fn branch_name(&self) -> Option<String> {
        let head = self.repo.head().ok()?;
        if !head.is_branch() {
            return None;
        }
        head.shorthand().map(str::to_string)
    }

    fn resolve_commit(&self, reference: &str) -> Result<git2::Commit<'_>, GitError> {
        self.repo
            .revparse_single(reference)
            .and_then(|obj| obj.peel_to_commit())
            .map_err(|_| GitError::UnknownRef(reference.to_string()))
    }

    fn resolve_tree(&self, reference: &str) -> Result<Tree<'_>, GitError> {
        Ok(self.resolve_commit(reference)?.tree()?)
    }

    fn head_tree(&self) -> Result<Option<Tree<'_>>, GitError> {
        match self.repo.head() {
            Ok(head) => Ok(Some(head.peel_to_tree()?)),
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => Ok(None),
            Err(e) => Err(GitError::GitOperationFailed(e)),
        }
    }
}

/// Render a git2 diff as unified patch text with `diff --git` headers
fn render_patch(diff: &Diff<'_>) -> Result<String, GitError> {
    let mut text = String::new();

    diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
        // File and hunk headers carry their own text; content lines need their origin
        match line.origin() {
            '+' | '-' | ' ' => text.push(line.origin()),
            _ => {}
        }
        // Non UTF-8 content (e.g. Latin-1 sources) must still yield one line
        text.push_str(&String::from_utf8_lossy(line.content()));
        true
    })?;

    Ok(text)
}
