use serde::{Deserialize, Serialize};

/// Upper bound on issues carried by any result
pub const MAX_ISSUES: usize = 50;

/// A single diagnostic reported by a tool
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub message: String,
}

impl Issue {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }
}

/// Truncate an issue list to [`MAX_ISSUES`]
pub(crate) fn cap_issues(mut issues: Vec<Issue>) -> Vec<Issue> {
    issues.truncate(MAX_ISSUES);
    issues
}

/// Outcome of a test run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResults {
    pub passed: bool,
    pub total: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    /// Raw combined output of the runner
    pub output: String,
    /// Framework label (pytest, jest, go test, ...)
    pub framework: String,
    /// Failing tests, at most [`MAX_ISSUES`]
    #[serde(default)]
    pub failures: Vec<Issue>,
}

impl TestResults {
    pub fn new(framework: impl Into<String>) -> Self {
        Self {
            passed: false,
            total: 0,
            failed: 0,
            skipped: 0,
            duration_ms: 0,
            output: String::new(),
            framework: framework.into(),
            failures: Vec::new(),
        }
    }

    /// Share of tests that passed; 1.0 when nothing ran
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.total.saturating_sub(self.failed + self.skipped) as f64 / self.total as f64
    }
}

/// Outcome of a lint run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintResults {
    pub passed: bool,
    pub error_count: usize,
    pub warning_count: usize,
    /// Errors first, then warnings, at most [`MAX_ISSUES`]
    #[serde(default)]
    pub errors: Vec<Issue>,
    pub tool: String,
}

impl LintResults {
    /// Nothing to lint with for this language
    pub fn none() -> Self {
        Self {
            passed: true,
            error_count: 0,
            warning_count: 0,
            errors: Vec::new(),
            tool: "none".to_string(),
        }
    }
}

/// Outcome of a type checker run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeCheckResults {
    pub passed: bool,
    pub error_count: usize,
    #[serde(default)]
    pub errors: Vec<Issue>,
    pub tool: String,
}

impl TypeCheckResults {
    /// No type checker for this language
    pub fn none() -> Self {
        Self {
            passed: true,
            error_count: 0,
            errors: Vec::new(),
            tool: "none".to_string(),
        }
    }
}
