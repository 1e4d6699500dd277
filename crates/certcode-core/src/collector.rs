use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use certcode_diff::{parse_diff, GitDiff, Language};
use certcode_logging::{LogEvent, Logger};

use crate::error::CollectError;
use crate::{CodeTask, CodeTrace, Config, VerificationBuilder, VerificationOptions};

/// A partially fitting context file is kept only when more than this many
/// characters of budget remain
const MIN_PARTIAL_CONTEXT: usize = 1000;

const TRUNCATION_MARKER: &str = "\n... (truncated)";

/// Per-submission knobs layered over the config
#[derive(Debug, Clone, Default)]
pub struct CollectOptions {
    pub verification: VerificationOptions,
    /// Replaces `[context] files` when set
    pub context_files: Option<Vec<PathBuf>>,
    /// Skip detection and use this language
    pub language: Option<Language>,
    pub tool: Option<String>,
    pub conversation_id: Option<String>,
    /// Replaces `[project] id` when set
    pub project_id: Option<String>,
}

/// Turns a diff into a verified, submittable trace
pub struct Collector<'a> {
    config: &'a Config,
    working_dir: PathBuf,
    logger: Option<Arc<Logger>>,
}

impl<'a> Collector<'a> {
    pub fn new(config: &'a Config, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            working_dir: working_dir.into(),
            logger: None,
        }
    }

    pub fn with_logger(mut self, logger: Arc<Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Build a trace from a commit, or from `base_ref..reference` when a
    /// base is given
    pub async fn from_commit(
        &self,
        task: &str,
        reference: &str,
        base_ref: Option<&str>,
        options: &CollectOptions,
    ) -> Result<CodeTrace, CollectError> {
        let git = GitDiff::discover(&self.working_dir)?;
        let diff = git.diff_for(reference, base_ref)?;
        let commit = git.commit_info(reference)?;

        let trace = self.from_diff(task, &diff, options).await?;
        Ok(with_branch(trace, &git).with_metadata("git_commit", commit.sha))
    }

    /// Build a trace from staged changes (index against HEAD)
    pub async fn from_staged(
        &self,
        task: &str,
        options: &CollectOptions,
    ) -> Result<CodeTrace, CollectError> {
        let git = GitDiff::discover(&self.working_dir)?;
        let diff = git.staged_diff()?;
        let trace = self.from_diff(task, &diff, options).await?;
        Ok(with_branch(trace, &git))
    }

    /// Build a trace from uncommitted changes, optionally with untracked files
    pub async fn from_working_tree(
        &self,
        task: &str,
        include_untracked: bool,
        options: &CollectOptions,
    ) -> Result<CodeTrace, CollectError> {
        let git = GitDiff::discover(&self.working_dir)?;
        let diff = git.working_diff(include_untracked)?;
        let trace = self.from_diff(task, &diff, options).await?;
        Ok(with_branch(trace, &git))
    }

    /// Parse, verify and assemble a trace from a unified diff
    pub async fn from_diff(
        &self,
        task: &str,
        diff: &str,
        options: &CollectOptions,
    ) -> Result<CodeTrace, CollectError> {
        if diff.trim().is_empty() {
            return Err(CollectError::EmptyDiff);
        }

        let artifact = parse_diff(diff, options.language);
        info!(
            files = artifact.diff_stats.files_changed,
            additions = artifact.diff_stats.additions,
            deletions = artifact.diff_stats.deletions,
            language = %artifact.language,
            "Collected code change"
        );
        self.log(LogEvent::DiffParsed {
            files_changed: artifact.diff_stats.files_changed,
            additions: artifact.diff_stats.additions,
            deletions: artifact.diff_stats.deletions,
            language: artifact.language.as_str().to_string(),
        });

        let mut builder = VerificationBuilder::new(self.config, &self.working_dir);
        if let Some(logger) = &self.logger {
            builder = builder.with_logger(logger.clone());
        }
        let verification = builder.build(&artifact, &options.verification).await;

        let context = self.load_context(options.context_files.as_deref()).await;

        let mut task = CodeTask::new(task);
        if let Some(tool) = &options.tool {
            task = task.with_tool(tool.clone());
        }
        if let Some(id) = &options.conversation_id {
            task = task.with_conversation_id(id.clone());
        }

        let project_id = options
            .project_id
            .clone()
            .or_else(|| self.config.project.id.clone());

        Ok(CodeTrace::new(task, artifact, verification)
            .with_context(context)
            .with_project_id(project_id))
    }

    /// Concatenate context files under a `# File:` header each, within
    /// `[context] max_size` characters
    pub async fn load_context(&self, files: Option<&[PathBuf]>) -> Option<String> {
        let files = files.unwrap_or(&self.config.context.files);
        if files.is_empty() {
            return None;
        }

        let max_size = self.config.context.max_size;
        let mut parts = Vec::new();
        let mut total = 0usize;

        for file in files {
            let path = self.working_dir.join(file);
            let mut content = match tokio::fs::read_to_string(&path).await {
                Ok(content) => content,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping context file");
                    continue;
                }
            };

            let len = content.chars().count();
            if total + len > max_size {
                let remaining = max_size.saturating_sub(total);
                if remaining <= MIN_PARTIAL_CONTEXT {
                    debug!(path = %path.display(), "Context budget exhausted");
                    break;
                }
                content = content.chars().take(remaining).collect();
                content.push_str(TRUNCATION_MARKER);
            }

            total += content.chars().count();
            parts.push(format!("# File: {}\n{}", file.display(), content));
        }

        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n\n"))
        }
    }

    fn log(&self, event: LogEvent) {
        if let Some(logger) = &self.logger {
            logger.log(&event);
        }
    }
}

fn with_branch(trace: CodeTrace, git: &GitDiff) -> CodeTrace {
    match git.branch_name() {
        Some(branch) => trace.with_metadata("git_branch", branch),
        None => trace,
    }
}
