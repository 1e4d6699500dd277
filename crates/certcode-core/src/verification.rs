use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use certcode_diff::{detect_project_language, CodeArtifact, Language};
use certcode_logging::{LogEvent, Logger, ToolKind};
use certcode_tools::{
    LintResults, Linter, Normalizer, TestResults, TestRunner, TypeCheckResults, TypeChecker,
};

use crate::Config;

/// Verification signals gathered for one artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeVerification {
    pub parseable: bool,
    pub tests: Option<TestResults>,
    pub lint: Option<LintResults>,
    pub typecheck: Option<TypeCheckResults>,
}

impl Default for CodeVerification {
    fn default() -> Self {
        Self {
            parseable: true,
            tests: None,
            lint: None,
            typecheck: None,
        }
    }
}

impl CodeVerification {
    /// Parseable and every signal that was collected passed.
    /// Signals that were not collected do not count against the artifact.
    pub fn all_passed(&self) -> bool {
        self.parseable
            && self.tests.as_ref().map_or(true, |t| t.passed)
            && self.lint.as_ref().map_or(true, |l| l.passed)
            && self.typecheck.as_ref().map_or(true, |t| t.passed)
    }
}

/// Which families to run. `None` defers to the `[behavior]` config.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerificationOptions {
    pub run_tests: Option<bool>,
    pub run_lint: Option<bool>,
    pub run_typecheck: Option<bool>,
}

/// Syntax check for generated code.
///
/// Always true for now: a diff that parsed is treated as parseable and real
/// syntax problems surface through the lint and type check signals.
pub fn check_parseable(_artifact: &CodeArtifact) -> bool {
    true
}

/// Runs the enabled verification tools for an artifact
pub struct VerificationBuilder<'a> {
    config: &'a Config,
    working_dir: PathBuf,
    logger: Option<Arc<Logger>>,
}

impl<'a> VerificationBuilder<'a> {
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

    /// Run at most one tool per enabled family, one after another.
    /// Tool problems become failing or fail-open signals, never errors.
    pub async fn build(
        &self,
        artifact: &CodeArtifact,
        options: &VerificationOptions,
    ) -> CodeVerification {
        let behavior = &self.config.behavior;
        let language = self.tool_language(artifact);

        let tests = if options.run_tests.unwrap_or(behavior.auto_run_tests) {
            let runner = TestRunner::resolve(
                self.config.test.command.as_deref(),
                language,
                &self.working_dir,
                self.config.test_timeout(),
            );
            Some(
                self.run_tool(ToolKind::Tests, &runner, |r| (r.passed, r.failed))
                    .await,
            )
        } else {
            None
        };

        let lint = if options.run_lint.unwrap_or(behavior.auto_run_lint) {
            match Linter::resolve(
                self.config.lint.command.as_deref(),
                language,
                self.config.lint_timeout(),
            ) {
                Some(linter) => Some(
                    self.run_tool(ToolKind::Lint, &linter, |r| (r.passed, r.error_count))
                        .await,
                ),
                None => {
                    debug!(?language, "No linter for language");
                    Some(LintResults::none())
                }
            }
        } else {
            None
        };

        let typecheck = if options.run_typecheck.unwrap_or(behavior.auto_run_typecheck) {
            match TypeChecker::resolve(
                self.config.typecheck.command.as_deref(),
                language,
                self.config.typecheck_timeout(),
            ) {
                Some(checker) => Some(
                    self.run_tool(ToolKind::Typecheck, &checker, |r| {
                        (r.passed, r.error_count)
                    })
                    .await,
                ),
                None => {
                    debug!(?language, "No type checker for language");
                    Some(TypeCheckResults::none())
                }
            }
        } else {
            None
        };

        CodeVerification {
            parseable: check_parseable(artifact),
            tests,
            lint,
            typecheck,
        }
    }

    /// Language used to pick default tools. An artifact of unknown language
    /// falls back to project detection when `auto_detect_language` is on.
    fn tool_language(&self, artifact: &CodeArtifact) -> Option<Language> {
        if artifact.language != Language::Other {
            return Some(artifact.language);
        }
        if !self.config.behavior.auto_detect_language {
            return None;
        }
        let detected = detect_project_language(&self.working_dir);
        debug!(?detected, "Detected project language");
        detected
    }

    async fn run_tool<N>(
        &self,
        kind: ToolKind,
        normalizer: &N,
        summarize: fn(&N::Output) -> (bool, usize),
    ) -> N::Output
    where
        N: Normalizer,
    {
        let tool = normalizer.tool().to_string();
        info!(
            kind = kind.label(),
            tool = %tool,
            command = %normalizer.command().display(),
            "Running verification tool"
        );
        self.log(LogEvent::ToolStarted {
            kind,
            tool: tool.clone(),
        });

        let start = Instant::now();
        let output = normalizer.run(&self.working_dir).await;
        let (passed, issues) = summarize(&output);

        info!(kind = kind.label(), tool = %tool, passed, issues, "Verification tool finished");
        self.log(LogEvent::ToolCompleted {
            kind,
            tool,
            passed,
            issues,
            duration_secs: start.elapsed().as_secs_f64(),
        });

        output
    }

    fn log(&self, event: LogEvent) {
        if let Some(logger) = &self.logger {
            logger.log(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use certcode_diff::parse_diff;
    use certcode_tools::Issue;
    use tempfile::TempDir;

    const PY_DIFF: &str = "diff --git a/app.py b/app.py\n--- a/app.py\n+++ b/app.py\n@@ -1 +1 @@\n-x = 1\n+x = 2\n";

    fn failing_tests() -> TestResults {
        let mut tests = TestResults::new("pytest");
        tests.total = 3;
        tests.failed = 1;
        tests
    }

    #[test]
    fn test_all_passed_ignores_absent_signals() {
        assert!(CodeVerification::default().all_passed());

        let verification = CodeVerification {
            lint: Some(LintResults::none()),
            ..Default::default()
        };
        assert!(verification.all_passed());
    }

    #[test]
    fn test_all_passed_requires_every_present_signal() {
        let verification = CodeVerification {
            tests: Some(failing_tests()),
            lint: Some(LintResults::none()),
            ..Default::default()
        };
        assert!(!verification.all_passed());

        let verification = CodeVerification {
            typecheck: Some(TypeCheckResults {
                passed: false,
                error_count: 1,
                errors: vec![Issue::message("Type check timeout after 120s")],
                tool: "mypy".to_string(),
            }),
            ..Default::default()
        };
        assert!(!verification.all_passed());

        let verification = CodeVerification {
            parseable: false,
            ..Default::default()
        };
        assert!(!verification.all_passed());
    }

    #[tokio::test]
    async fn test_nothing_runs_by_default() {
        let dir = TempDir::new().unwrap();
        let config = Config::default();
        let artifact = parse_diff(PY_DIFF, None);

        let verification = VerificationBuilder::new(&config, dir.path())
            .build(&artifact, &VerificationOptions::default())
            .await;

        assert!(verification.parseable);
        assert!(verification.tests.is_none());
        assert!(verification.lint.is_none());
        assert!(verification.typecheck.is_none());
    }

    #[tokio::test]
    async fn test_explicit_false_overrides_config() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.behavior.auto_run_lint = true;
        config.lint.command = Some("true".to_string());
        let artifact = parse_diff(PY_DIFF, None);

        let options = VerificationOptions {
            run_lint: Some(false),
            ..Default::default()
        };
        let verification = VerificationBuilder::new(&config, dir.path())
            .build(&artifact, &options)
            .await;
        assert!(verification.lint.is_none());
    }

    #[tokio::test]
    async fn test_language_without_tools_reports_none() {
        let dir = TempDir::new().unwrap();
        let config = Config::default();
        let diff = "diff --git a/query.sql b/query.sql\n+SELECT 1;\n";
        let artifact = parse_diff(diff, None);

        let options = VerificationOptions {
            run_lint: Some(true),
            run_typecheck: Some(true),
            ..Default::default()
        };
        let verification = VerificationBuilder::new(&config, dir.path())
            .build(&artifact, &options)
            .await;

        assert_eq!(verification.lint.unwrap().tool, "none");
        assert_eq!(verification.typecheck.unwrap().tool, "none");
    }

    #[tokio::test]
    async fn test_configured_commands_run_in_working_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("lint.txt"), "warning: style\n").unwrap();

        let mut config = Config::default();
        config.lint.command = Some("cat lint.txt".to_string());
        config.test.command = Some("certcode-missing-test-runner".to_string());
        let artifact = parse_diff(PY_DIFF, None);

        let options = VerificationOptions {
            run_tests: Some(true),
            run_lint: Some(true),
            run_typecheck: None,
        };
        let verification = VerificationBuilder::new(&config, dir.path())
            .build(&artifact, &options)
            .await;

        let lint = verification.lint.as_ref().unwrap();
        assert!(lint.passed);
        assert_eq!(lint.warning_count, 1);

        let tests = verification.tests.as_ref().unwrap();
        assert!(tests.passed);
        assert!(tests.framework.ends_with("(not found)"));

        assert!(verification.all_passed());
    }
}
