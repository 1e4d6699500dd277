use async_trait::async_trait;
use certcode_diff::Language;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::fallback::{count_lines_containing, extract_json};
use crate::results::cap_issues;
use crate::{Issue, LintResults, Normalizer, ToolCommand, ToolError};

/// How a linter's output is read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LintParser {
    Ruff,
    Eslint,
    Golangci,
    Clippy,
    /// Line counting only
    Generic,
}

impl LintParser {
    /// Parser for an explicit command, chosen from its program name
    pub fn for_command(command: &ToolCommand) -> Self {
        let program = Path::new(&command.program)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&command.program);

        match (program, command.subcommand()) {
            ("ruff", _) => Self::Ruff,
            ("eslint", _) => Self::Eslint,
            ("npx", Some("eslint")) => Self::Eslint,
            ("golangci-lint", _) => Self::Golangci,
            ("cargo", Some("clippy")) | ("cargo-clippy", _) => Self::Clippy,
            _ => Self::Generic,
        }
    }

    /// Tool label for results, `None` for the generic parser
    pub fn tool(&self) -> Option<&'static str> {
        match self {
            Self::Ruff => Some("ruff"),
            Self::Eslint => Some("eslint"),
            Self::Golangci => Some("golangci-lint"),
            Self::Clippy => Some("clippy"),
            Self::Generic => None,
        }
    }

    pub fn parse(&self, output: &str, exit_code: i32, tool: &str) -> LintResults {
        let parsed = match self {
            Self::Ruff => parse_ruff(output),
            Self::Eslint => parse_eslint(output),
            Self::Golangci => parse_golangci(output),
            Self::Clippy => parse_clippy(output),
            Self::Generic => None,
        };

        match parsed {
            Some(found) => found.into_results(exit_code, tool),
            None => parse_generic(output, exit_code, tool),
        }
    }
}

/// Diagnostics split by severity before they are capped
#[derive(Debug, Default)]
struct Findings {
    errors: Vec<Issue>,
    warnings: Vec<Issue>,
}

impl Findings {
    fn into_results(self, exit_code: i32, tool: &str) -> LintResults {
        let error_count = self.errors.len();
        let warning_count = self.warnings.len();

        let mut issues = self.errors;
        issues.extend(self.warnings);

        LintResults {
            passed: exit_code == 0 && error_count == 0,
            error_count,
            warning_count,
            errors: cap_issues(issues),
            tool: tool.to_string(),
        }
    }
}

fn parse_generic(output: &str, exit_code: i32, tool: &str) -> LintResults {
    let error_count = count_lines_containing(output, "error");
    LintResults {
        passed: exit_code == 0 && error_count == 0,
        error_count,
        warning_count: count_lines_containing(output, "warning"),
        errors: Vec::new(),
        tool: tool.to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct RuffDiagnostic {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    message: String,
    #[serde(default)]
    location: Option<RuffLocation>,
}

#[derive(Debug, Deserialize)]
struct RuffLocation {
    row: u32,
    column: u32,
}

fn parse_ruff(output: &str) -> Option<Findings> {
    let json = extract_json(output, '[', ']')?;
    let diagnostics: Vec<RuffDiagnostic> = serde_json::from_str(json).ok()?;

    let mut findings = Findings::default();
    for diagnostic in diagnostics {
        // E (pycodestyle errors) and F (pyflakes) are errors, everything else warns
        let is_error = diagnostic
            .code
            .as_deref()
            .is_some_and(|code| code.starts_with('E') || code.starts_with('F'));

        let issue = Issue {
            file: diagnostic.filename,
            line: diagnostic.location.as_ref().map(|l| l.row),
            column: diagnostic.location.as_ref().map(|l| l.column),
            code: diagnostic.code,
            message: diagnostic.message,
        };

        if is_error {
            findings.errors.push(issue);
        } else {
            findings.warnings.push(issue);
        }
    }
    Some(findings)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EslintFile {
    #[serde(default)]
    file_path: Option<String>,
    #[serde(default)]
    messages: Vec<EslintMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EslintMessage {
    #[serde(default)]
    rule_id: Option<String>,
    #[serde(default)]
    severity: u8,
    #[serde(default)]
    message: String,
    #[serde(default)]
    line: Option<u32>,
    #[serde(default)]
    column: Option<u32>,
}

fn parse_eslint(output: &str) -> Option<Findings> {
    let json = extract_json(output, '[', ']')?;
    let files: Vec<EslintFile> = serde_json::from_str(json).ok()?;

    let mut findings = Findings::default();
    for file in files {
        for message in file.messages {
            let is_error = message.severity == 2;
            let issue = Issue {
                file: file.file_path.clone(),
                line: message.line,
                column: message.column,
                code: message.rule_id,
                message: message.message,
            };

            if is_error {
                findings.errors.push(issue);
            } else {
                findings.warnings.push(issue);
            }
        }
    }
    Some(findings)
}

#[derive(Debug, Deserialize)]
struct GolangciReport {
    /// `null` when the run is clean
    #[serde(rename = "Issues", default)]
    issues: Option<Vec<GolangciIssue>>,
}

#[derive(Debug, Deserialize)]
struct GolangciIssue {
    #[serde(rename = "FromLinter", default)]
    from_linter: Option<String>,
    #[serde(rename = "Text", default)]
    text: String,
    #[serde(rename = "Pos", default)]
    pos: Option<GolangciPos>,
}

#[derive(Debug, Default, Deserialize)]
struct GolangciPos {
    #[serde(rename = "Filename", default)]
    filename: Option<String>,
    #[serde(rename = "Line", default)]
    line: Option<u32>,
    #[serde(rename = "Column", default)]
    column: Option<u32>,
}

fn parse_golangci(output: &str) -> Option<Findings> {
    let json = extract_json(output, '{', '}')?;
    let value: serde_json::Value = serde_json::from_str(json).ok()?;
    if !value.is_object() {
        return None;
    }
    let report: GolangciReport = serde_json::from_value(value).ok()?;

    let errors = report
        .issues
        .unwrap_or_default()
        .into_iter()
        .map(|issue| {
            let pos = issue.pos.unwrap_or_default();
            Issue {
                file: pos.filename,
                line: pos.line,
                column: pos.column,
                code: issue.from_linter,
                message: issue.text,
            }
        })
        .collect();

    Some(Findings {
        errors,
        warnings: Vec::new(),
    })
}

/// One line of `cargo --message-format=json`
#[derive(Debug, Deserialize)]
struct CargoMessage {
    reason: String,
    #[serde(default)]
    message: Option<Diagnostic>,
}

#[derive(Debug, Deserialize)]
struct Diagnostic {
    #[serde(default)]
    message: String,
    #[serde(default)]
    level: String,
    #[serde(default)]
    code: Option<DiagnosticCode>,
    #[serde(default)]
    spans: Vec<DiagnosticSpan>,
}

#[derive(Debug, Deserialize)]
struct DiagnosticCode {
    code: String,
}

#[derive(Debug, Deserialize)]
struct DiagnosticSpan {
    file_name: String,
    line_start: u32,
    column_start: u32,
    #[serde(default)]
    is_primary: bool,
}

/// `None` only when no line is a cargo JSON message at all; a clean build
/// still yields artifact records and therefore empty findings.
fn parse_clippy(output: &str) -> Option<Findings> {
    let messages: Vec<CargoMessage> = output
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('{'))
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect();

    if messages.is_empty() {
        return None;
    }

    let mut findings = Findings::default();
    for diagnostic in messages
        .into_iter()
        .filter(|m| m.reason == "compiler-message")
        .filter_map(|m| m.message)
    {
        let span = diagnostic
            .spans
            .iter()
            .find(|s| s.is_primary)
            .or_else(|| diagnostic.spans.first());

        let issue = Issue {
            file: span.map(|s| s.file_name.clone()),
            line: span.map(|s| s.line_start),
            column: span.map(|s| s.column_start),
            code: diagnostic.code.map(|c| c.code),
            message: diagnostic.message,
        };

        match diagnostic.level.as_str() {
            "error" => findings.errors.push(issue),
            "warning" => findings.warnings.push(issue),
            _ => {}
        }
    }
    Some(findings)
}

/// Runs a linter and normalizes the result
#[derive(Debug, Clone)]
pub struct Linter {
    tool: String,
    parser: LintParser,
    command: ToolCommand,
}

impl Linter {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

    /// Default linter for a language, `None` when the language has none
    pub fn for_language(language: Language, timeout: Duration) -> Option<Self> {
        let (parser, program, args): (_, _, &[&str]) = match language {
            Language::Python => (LintParser::Ruff, "ruff", &["check", "--output-format=json", "."]),
            Language::JavaScript | Language::TypeScript => {
                (LintParser::Eslint, "eslint", &["--format=json", "."])
            }
            Language::Go => (LintParser::Golangci, "golangci-lint", &["run", "--out-format=json"]),
            Language::Rust => (LintParser::Clippy, "cargo", &["clippy", "--message-format=json"]),
            _ => return None,
        };

        Some(Self {
            tool: parser.tool().unwrap_or(program).to_string(),
            parser,
            command: ToolCommand::new(program, args, timeout),
        })
    }

    /// Linter for an explicit command line. Returns `None` for a blank line.
    pub fn from_command(command_line: &str, timeout: Duration) -> Option<Self> {
        ToolCommand::parse(command_line, timeout).map(Self::with_command)
    }

    pub fn with_command(command: ToolCommand) -> Self {
        let parser = LintParser::for_command(&command);
        Self {
            tool: parser
                .tool()
                .map(str::to_string)
                .unwrap_or_else(|| command.program.clone()),
            parser,
            command,
        }
    }

    /// Explicit command first, then the language default
    pub fn resolve(
        command_line: Option<&str>,
        language: Option<Language>,
        timeout: Duration,
    ) -> Option<Self> {
        command_line
            .and_then(|line| Self::from_command(line, timeout))
            .or_else(|| language.and_then(|lang| Self::for_language(lang, timeout)))
    }

    pub fn parser(&self) -> LintParser {
        self.parser
    }

    fn failure(&self, message: String) -> LintResults {
        LintResults {
            passed: false,
            error_count: 1,
            warning_count: 0,
            errors: vec![Issue::message(message)],
            tool: self.tool.clone(),
        }
    }
}

#[async_trait]
impl Normalizer for Linter {
    type Output = LintResults;

    fn tool(&self) -> &str {
        &self.tool
    }

    fn command(&self) -> &ToolCommand {
        &self.command
    }

    fn parse(&self, output: &str, exit_code: i32) -> LintResults {
        self.parser.parse(output, exit_code, &self.tool)
    }

    fn not_found(&self) -> LintResults {
        LintResults {
            tool: format!("{} (not found)", self.tool),
            ..LintResults::none()
        }
    }

    fn timed_out(&self, timeout: Duration) -> LintResults {
        self.failure(format!("Lint timeout after {:?}", timeout))
    }

    fn spawn_failed(&self, error: &ToolError) -> LintResults {
        self.failure(format!("Error running linter: {}", error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linter(language: Language) -> Linter {
        Linter::for_language(language, Linter::DEFAULT_TIMEOUT).unwrap()
    }

    #[test]
    fn test_ruff_severity_split() {
        let output = r#"[
  {"code":"F401","filename":"app.py","message":"`os` imported but unused","location":{"row":1,"column":8}},
  {"code":"W291","filename":"app.py","message":"Trailing whitespace","location":{"row":4,"column":10}},
  {"code":"E501","filename":"util.py","message":"Line too long","location":{"row":9,"column":89}}
]
"#;
        let results = linter(Language::Python).parse(output, 1);
        assert!(!results.passed);
        assert_eq!(results.tool, "ruff");
        assert_eq!(results.error_count, 2);
        assert_eq!(results.warning_count, 1);
        assert_eq!(results.errors.len(), 3);
        assert_eq!(results.errors[0].code.as_deref(), Some("F401"));
        assert_eq!(results.errors[0].line, Some(1));
        assert_eq!(results.errors[1].code.as_deref(), Some("E501"));
        assert_eq!(results.errors[2].code.as_deref(), Some("W291"));
    }

    #[test]
    fn test_ruff_clean() {
        let results = linter(Language::Python).parse("[]\n", 0);
        assert!(results.passed);
        assert_eq!(results.error_count, 0);
    }

    #[test]
    fn test_ruff_missing_code_is_warning() {
        let output = r#"[{"code":null,"filename":"a.py","message":"SyntaxError: bad","location":{"row":1,"column":1}}]"#;
        let results = linter(Language::Python).parse(output, 1);
        assert_eq!(results.error_count, 0);
        assert_eq!(results.warning_count, 1);
        assert!(!results.passed);
    }

    #[test]
    fn test_garbage_output_falls_back() {
        let output = "Traceback (most recent call last):\nRuntimeError: boom\nsomething Error-ish\nno problem here\n";
        let results = linter(Language::Python).parse(output, 1);
        assert!(!results.passed);
        assert_eq!(results.error_count, 2);
        assert!(results.errors.is_empty());
    }

    #[test]
    fn test_truncated_ruff_report_falls_back() {
        let output = r#"[
  {"code":"F401","filename":"app.py","message":"`os` imported but unused","location":{"row":1,"column":8}},
  {"code":"E999","filename":"app.py","message":"SyntaxError: Unexpected indentation","location":{"row":4,"column":1}}
]
"#;
        assert_eq!(linter(Language::Python).parse(output, 1).error_count, 2);

        let cut = output.find(r#""location":{"row":4"#).unwrap();
        let results = linter(Language::Python).parse(&output[..cut], 1);
        assert!(!results.passed);
        assert_eq!(results.tool, "ruff");
        // Only the SyntaxError line mentions an error
        assert_eq!(results.error_count, 1);
        assert_eq!(results.warning_count, 0);
        assert!(results.errors.is_empty());
    }

    #[test]
    fn test_eslint_messages() {
        let output = r#"[
  {"filePath":"/app/index.js","messages":[
    {"ruleId":"no-unused-vars","severity":2,"message":"'x' is assigned a value but never used.","line":3,"column":7},
    {"ruleId":"semi","severity":1,"message":"Missing semicolon.","line":5,"column":12}
  ]},
  {"filePath":"/app/clean.js","messages":[]}
]"#;
        let results = linter(Language::JavaScript).parse(output, 1);
        assert!(!results.passed);
        assert_eq!(results.tool, "eslint");
        assert_eq!(results.error_count, 1);
        assert_eq!(results.warning_count, 1);
        assert_eq!(results.errors[0].file.as_deref(), Some("/app/index.js"));
        assert_eq!(results.errors[0].code.as_deref(), Some("no-unused-vars"));
    }

    #[test]
    fn test_eslint_warnings_only_with_clean_exit() {
        let output = r#"[{"filePath":"a.js","messages":[{"ruleId":"semi","severity":1,"message":"Missing semicolon.","line":1,"column":2}]}]"#;
        let results = linter(Language::TypeScript).parse(output, 0);
        assert!(results.passed);
        assert_eq!(results.warning_count, 1);
    }

    #[test]
    fn test_golangci_issues() {
        let output = r#"{"Issues":[
  {"FromLinter":"errcheck","Text":"Error return value is not checked","Pos":{"Filename":"main.go","Line":12,"Column":9}},
  {"FromLinter":"unused","Text":"func `helper` is unused","Pos":{"Filename":"util.go","Line":3,"Column":6}}
],"Report":{}}"#;
        let results = linter(Language::Go).parse(output, 1);
        assert!(!results.passed);
        assert_eq!(results.tool, "golangci-lint");
        assert_eq!(results.error_count, 2);
        assert_eq!(results.warning_count, 0);
        assert_eq!(results.errors[1].code.as_deref(), Some("unused"));
        assert_eq!(results.errors[1].line, Some(3));
    }

    #[test]
    fn test_golangci_null_issues() {
        let results = linter(Language::Go).parse(r#"{"Issues":null,"Report":{}}"#, 0);
        assert!(results.passed);
        assert_eq!(results.error_count, 0);
    }

    #[test]
    fn test_clippy_compiler_messages() {
        let output = r#"{"reason":"compiler-artifact","package_id":"thiserror 2.0.0","target":{"name":"thiserror"}}
{"reason":"compiler-message","message":{"message":"unused variable: `x`","level":"warning","code":{"code":"unused_variables"},"spans":[{"file_name":"src/lib.rs","line_start":4,"column_start":9,"is_primary":true}]}}
{"reason":"compiler-message","message":{"message":"mismatched types","level":"error","code":{"code":"E0308"},"spans":[{"file_name":"src/main.rs","line_start":10,"column_start":5,"is_primary":true}]}}
{"reason":"compiler-message","message":{"message":"aborting due to 1 previous error","level":"error","code":null,"spans":[]}}
{"reason":"build-finished","success":false}
"#;
        let results = linter(Language::Rust).parse(output, 101);
        assert!(!results.passed);
        assert_eq!(results.tool, "clippy");
        assert_eq!(results.error_count, 2);
        assert_eq!(results.warning_count, 1);
        assert_eq!(results.errors[0].code.as_deref(), Some("E0308"));
        assert_eq!(results.errors[0].file.as_deref(), Some("src/main.rs"));
        assert_eq!(results.errors[1].file, None);
        assert_eq!(results.errors[2].code.as_deref(), Some("unused_variables"));
    }

    #[test]
    fn test_clippy_clean_build_is_not_fallback() {
        let output = r#"{"reason":"compiler-artifact","package_id":"thiserror 2.0.0","target":{"name":"thiserror"}}
{"reason":"build-finished","success":true}
"#;
        let results = linter(Language::Rust).parse(output, 0);
        assert!(results.passed);
        assert_eq!(results.error_count, 0);
    }

    #[test]
    fn test_issue_list_capped_with_true_counts() {
        let entries: Vec<String> = (0..75)
            .map(|i| {
                format!(
                    r#"{{"code":"F{i}","filename":"a.py","message":"m","location":{{"row":{i},"column":1}}}}"#
                )
            })
            .collect();
        let output = format!("[{}]", entries.join(","));
        let results = linter(Language::Python).parse(&output, 1);
        assert_eq!(results.error_count, 75);
        assert_eq!(results.errors.len(), crate::MAX_ISSUES);
    }

    #[test]
    fn test_command_selection() {
        let linter = Linter::from_command("cargo clippy --all-targets", Linter::DEFAULT_TIMEOUT)
            .unwrap();
        assert_eq!(linter.parser(), LintParser::Clippy);
        assert_eq!(linter.tool(), "clippy");

        let linter = Linter::from_command("flake8 src", Linter::DEFAULT_TIMEOUT).unwrap();
        assert_eq!(linter.parser(), LintParser::Generic);
        assert_eq!(linter.tool(), "flake8");
    }

    #[test]
    fn test_no_linter_for_language() {
        assert!(Linter::for_language(Language::Sql, Linter::DEFAULT_TIMEOUT).is_none());
        assert!(Linter::resolve(None, Some(Language::Html), Linter::DEFAULT_TIMEOUT).is_none());
        assert!(Linter::resolve(None, None, Linter::DEFAULT_TIMEOUT).is_none());
    }

    #[test]
    fn test_degraded_outcomes() {
        let linter = linter(Language::Python);

        let missing = linter.not_found();
        assert!(missing.passed);
        assert_eq!(missing.tool, "ruff (not found)");

        let slow = linter.timed_out(Duration::from_secs(60));
        assert!(!slow.passed);
        assert_eq!(slow.error_count, 1);
        assert_eq!(slow.errors[0].message, "Lint timeout after 60s");

        let quick = linter.timed_out(Duration::from_millis(200));
        assert_eq!(quick.errors[0].message, "Lint timeout after 200ms");
    }
}
