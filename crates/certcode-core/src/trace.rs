use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use certcode_diff::{CodeArtifact, DiffStats, Language};
use certcode_tools::MAX_ISSUES;

use crate::{CodeTask, CodeVerification};

/// Version reported in every submitted record
pub const CERT_CODE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Longest test output carried in trace metadata, in characters
pub const MAX_TEST_OUTPUT: usize = 10_000;

const NAME_TASK_CHARS: usize = 50;

/// The full record submitted for evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeTrace {
    pub task: CodeTask,
    pub artifact: CodeArtifact,
    pub verification: CodeVerification,
    /// Existing code or documentation the generation was grounded on
    pub context: Option<String>,
    pub project_id: Option<String>,
    pub trace_id: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Caller metadata, merged under the generated keys
    pub metadata: Map<String, Value>,
}

impl CodeTrace {
    pub fn new(task: CodeTask, artifact: CodeArtifact, verification: CodeVerification) -> Self {
        Self {
            task,
            artifact,
            verification,
            context: None,
            project_id: None,
            trace_id: None,
            created_at: Utc::now(),
            metadata: Map::new(),
        }
    }

    pub fn with_context(mut self, context: Option<String>) -> Self {
        self.context = context;
        self
    }

    pub fn with_project_id(mut self, project_id: Option<String>) -> Self {
        self.project_id = project_id;
        self
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Flatten into the evaluation API's trace schema
    pub fn to_wire(&self) -> WireTrace {
        let verification = &self.verification;
        let tests = verification.tests.as_ref();
        let lint = verification.lint.as_ref();
        let typecheck = verification.typecheck.as_ref();

        let mut metadata = self.metadata.clone();
        let generated = json!({
            "cert_code_version": CERT_CODE_VERSION,
            "tool": self.task.tool,
            "conversation_id": self.task.conversation_id,
            "test_framework": tests.map(|t| t.framework.clone()),
            "test_output": tests.map(|t| truncate_chars(&t.output, MAX_TEST_OUTPUT)),
            "lint_tool": lint.map(|l| l.tool.clone()),
            "lint_errors_detail": lint.map(|l| &l.errors[..l.errors.len().min(MAX_ISSUES)]),
            "typecheck_tool": typecheck.map(|t| t.tool.clone()),
            "typecheck_errors_detail": typecheck.map(|t| &t.errors[..t.errors.len().min(MAX_ISSUES)]),
        });
        if let Value::Object(generated) = generated {
            metadata.extend(generated);
        }

        WireTrace {
            name: format!(
                "code-gen: {}",
                truncate_chars(&self.task.description, NAME_TASK_CHARS)
            ),
            kind: "code".to_string(),
            evaluation_mode: "code".to_string(),
            eval_mode: "code".to_string(),
            input_text: self.task.description.clone(),
            output_text: self.artifact.diff.clone(),
            context: self.context.clone(),
            knowledge_base: self.context.clone(),
            is_grounded: self.context.is_some(),
            context_source: self.context.as_ref().map(|_| "user_provided".to_string()),
            code_language: self.artifact.language,
            code_files_changed: self.artifact.files_changed.clone(),
            code_diff_stats: self.artifact.diff_stats,
            code_parseable: verification.parseable,
            code_tests_passed: tests.map(|t| t.passed),
            code_tests_total: tests.map(|t| t.total),
            code_tests_failed: tests.map(|t| t.failed),
            code_type_check_passed: typecheck.map(|t| t.passed),
            code_lint_errors: lint.map_or(0, |l| l.error_count),
            metadata,
            start_time: self.created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
            source: "cert-code".to_string(),
            project_id: self.project_id.clone(),
            trace_id: self.trace_id.clone(),
        }
    }
}

/// Trace as posted to `<api>/traces`.
///
/// Every field is always present (`null` when absent) except `project_id`
/// and `trace_id`, which are only sent when set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireTrace {
    pub name: String,
    pub kind: String,
    pub evaluation_mode: String,
    pub eval_mode: String,
    pub input_text: String,
    pub output_text: String,
    pub context: Option<String>,
    pub knowledge_base: Option<String>,
    pub is_grounded: bool,
    pub context_source: Option<String>,
    pub code_language: Language,
    pub code_files_changed: Vec<String>,
    pub code_diff_stats: DiffStats,
    pub code_parseable: bool,
    pub code_tests_passed: Option<bool>,
    pub code_tests_total: Option<usize>,
    pub code_tests_failed: Option<usize>,
    pub code_type_check_passed: Option<bool>,
    pub code_lint_errors: usize,
    pub metadata: Map<String, Value>,
    pub start_time: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
