use async_trait::async_trait;
use certcode_diff::Language;
use regex::{Captures, Regex};
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use crate::fallback::count_lines_containing;
use crate::results::cap_issues;
use crate::{Issue, Normalizer, ToolCommand, ToolError, TypeCheckResults};

static MYPY_ERROR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(?P<file>.+):(?P<line>\d+): error: (?P<message>.+)$").expect("valid regex")
});

static TSC_ERROR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^(?P<file>.+)\((?P<line>\d+),(?P<column>\d+)\): error (?P<code>TS\d+): (?P<message>.+)$",
    )
    .expect("valid regex")
});

static GO_VET_ERROR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(?P<file>.+):(?P<line>\d+):(?P<column>\d+): (?P<message>.+)$")
        .expect("valid regex")
});

/// How a type checker's output is read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCheckParser {
    Mypy,
    Tsc,
    GoVet,
    /// Line counting only
    Generic,
}

impl TypeCheckParser {
    /// Parser for an explicit command, chosen from its program name
    pub fn for_command(command: &ToolCommand) -> Self {
        let program = Path::new(&command.program)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&command.program);

        match (program, command.subcommand()) {
            ("mypy" | "dmypy", _) => Self::Mypy,
            ("tsc", _) | ("npx", Some("tsc")) => Self::Tsc,
            ("go", Some("vet")) => Self::GoVet,
            _ => Self::Generic,
        }
    }

    pub fn tool(&self) -> Option<&'static str> {
        match self {
            Self::Mypy => Some("mypy"),
            Self::Tsc => Some("tsc"),
            Self::GoVet => Some("go vet"),
            Self::Generic => None,
        }
    }

    fn pattern(&self) -> Option<&'static Regex> {
        match self {
            Self::Mypy => Some(&*MYPY_ERROR),
            Self::Tsc => Some(&*TSC_ERROR),
            Self::GoVet => Some(&*GO_VET_ERROR),
            Self::Generic => None,
        }
    }

    pub fn parse(&self, output: &str, exit_code: i32, tool: &str) -> TypeCheckResults {
        let errors: Vec<Issue> = self
            .pattern()
            .map(|pattern| pattern.captures_iter(output).map(|c| issue_from(&c)).collect())
            .unwrap_or_default();

        // Nothing matched: fall back to counting error lines
        if errors.is_empty() {
            let error_count = count_lines_containing(output, "error");
            return TypeCheckResults {
                passed: exit_code == 0 && error_count == 0,
                error_count,
                errors: Vec::new(),
                tool: tool.to_string(),
            };
        }

        let error_count = errors.len();
        TypeCheckResults {
            passed: exit_code == 0 && error_count == 0,
            error_count,
            errors: cap_issues(errors),
            tool: tool.to_string(),
        }
    }
}

fn issue_from(caps: &Captures<'_>) -> Issue {
    let number = |name: &str| caps.name(name).and_then(|m| m.as_str().parse().ok());
    Issue {
        file: caps.name("file").map(|m| m.as_str().to_string()),
        line: number("line"),
        column: number("column"),
        code: caps.name("code").map(|m| m.as_str().to_string()),
        message: caps
            .name("message")
            .map(|m| m.as_str().trim_end().to_string())
            .unwrap_or_default(),
    }
}

/// Runs a type checker and normalizes the result
#[derive(Debug, Clone)]
pub struct TypeChecker {
    tool: String,
    parser: TypeCheckParser,
    command: ToolCommand,
}

impl TypeChecker {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

    /// Default checker for a language, `None` when the language has none
    pub fn for_language(language: Language, timeout: Duration) -> Option<Self> {
        let (parser, program, args): (_, _, &[&str]) = match language {
            Language::Python => (TypeCheckParser::Mypy, "mypy", &["--no-error-summary", "."]),
            Language::TypeScript => (TypeCheckParser::Tsc, "tsc", &["--noEmit"]),
            Language::Go => (TypeCheckParser::GoVet, "go", &["vet", "./..."]),
            _ => return None,
        };

        Some(Self {
            tool: parser.tool().unwrap_or(program).to_string(),
            parser,
            command: ToolCommand::new(program, args, timeout),
        })
    }

    /// Checker for an explicit command line. Returns `None` for a blank line.
    pub fn from_command(command_line: &str, timeout: Duration) -> Option<Self> {
        ToolCommand::parse(command_line, timeout).map(Self::with_command)
    }

    pub fn with_command(command: ToolCommand) -> Self {
        let parser = TypeCheckParser::for_command(&command);
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

    pub fn parser(&self) -> TypeCheckParser {
        self.parser
    }

    fn failure(&self, message: String) -> TypeCheckResults {
        TypeCheckResults {
            passed: false,
            error_count: 1,
            errors: vec![Issue::message(message)],
            tool: self.tool.clone(),
        }
    }
}

#[async_trait]
impl Normalizer for TypeChecker {
    type Output = TypeCheckResults;

    fn tool(&self) -> &str {
        &self.tool
    }

    fn command(&self) -> &ToolCommand {
        &self.command
    }

    fn parse(&self, output: &str, exit_code: i32) -> TypeCheckResults {
        self.parser.parse(output, exit_code, &self.tool)
    }

    fn not_found(&self) -> TypeCheckResults {
        TypeCheckResults {
            tool: format!("{} (not found)", self.tool),
            ..TypeCheckResults::none()
        }
    }

    fn timed_out(&self, timeout: Duration) -> TypeCheckResults {
        self.failure(format!("Type check timeout after {:?}", timeout))
    }

    fn spawn_failed(&self, error: &ToolError) -> TypeCheckResults {
        self.failure(format!("Error running type checker: {}", error))
    }
}
