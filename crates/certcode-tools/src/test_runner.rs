use async_trait::async_trait;
use certcode_diff::Language;
use regex::Regex;
use serde::Deserialize;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use crate::fallback::{extract_json, parse_test_summary};
use crate::results::cap_issues;
use crate::{Issue, Normalizer, TestResults, ToolCommand, ToolError};

static CARGO_RESULT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"test result: (ok|FAILED)\. (\d+) passed; (\d+) failed; (\d+) ignored")
        .expect("valid regex")
});

static CARGO_FAILED_TEST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^test (\S+) \.\.\. FAILED\s*$").expect("valid regex"));

static CARGO_FINISHED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"finished in ([\d.]+)s").expect("valid regex"));

static PYTEST_FAILED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(?:FAILED|ERROR) (?P<node>\S+)(?: - (?P<message>.+))?\s*$")
        .expect("valid regex")
});

/// How a test runner's output is read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestParser {
    Pytest,
    Jest,
    GoTest,
    CargoTest,
    /// Text summary only
    Generic,
}

impl TestParser {
    /// Parser for a framework label. `npm test` usually runs jest.
    pub fn for_framework(framework: &str) -> Self {
        match framework {
            "pytest" => Self::Pytest,
            "jest" | "npm" => Self::Jest,
            "go test" => Self::GoTest,
            "cargo test" => Self::CargoTest,
            _ => Self::Generic,
        }
    }

    /// Parser for an explicit command, chosen from its program name
    pub fn for_command(command: &ToolCommand) -> Self {
        let program = program_name(&command.program);
        match (program, command.subcommand()) {
            ("pytest" | "py.test", _) => Self::Pytest,
            ("python" | "python3", _) if command.args.iter().any(|a| a == "pytest") => {
                Self::Pytest
            }
            ("jest", _) | ("npm" | "npx" | "yarn" | "pnpm", Some("test" | "jest")) => Self::Jest,
            ("go", Some("test")) => Self::GoTest,
            ("cargo", Some("test")) => Self::CargoTest,
            _ => Self::Generic,
        }
    }

    /// Framework label for results, "custom" when the runner is unknown
    pub fn framework(&self) -> &'static str {
        match self {
            Self::Pytest => "pytest",
            Self::Jest => "jest",
            Self::GoTest => "go test",
            Self::CargoTest => "cargo test",
            Self::Generic => "custom",
        }
    }

    pub fn parse(&self, output: &str, exit_code: i32, framework: &str) -> TestResults {
        let parsed = match self {
            Self::Pytest => Some(parse_pytest(output, exit_code, framework)),
            Self::Jest => parse_jest(output, exit_code, framework),
            Self::GoTest => parse_go_test(output, exit_code, framework),
            Self::CargoTest => parse_cargo_test(output, exit_code, framework),
            Self::Generic => None,
        };
        parsed.unwrap_or_else(|| parse_generic(output, exit_code, framework))
    }
}

/// Final path component of a program, so `/usr/bin/pytest` reads as `pytest`
fn program_name(program: &str) -> &str {
    Path::new(program)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(program)
}

fn finish(mut results: TestResults, output: &str, exit_code: i32) -> TestResults {
    results.passed = exit_code == 0 && results.failed == 0;
    results.output = output.to_string();
    results.failures = cap_issues(results.failures);
    results
}

fn parse_pytest(output: &str, exit_code: i32, framework: &str) -> TestResults {
    let mut results = TestResults::new(framework);

    if let Some(summary) = parse_test_summary(output) {
        results.total = summary.total();
        results.failed = summary.failed;
        results.skipped = summary.skipped;
        results.duration_ms = summary.duration_ms;
    }

    results.failures = PYTEST_FAILED
        .captures_iter(output)
        .map(|caps| {
            let node = &caps["node"];
            let file = node.split("::").next().unwrap_or(node).to_string();
            let message = match caps.name("message") {
                Some(m) => format!("{} - {}", node, m.as_str()),
                None => node.to_string(),
            };
            Issue {
                file: Some(file),
                message,
                ..Default::default()
            }
        })
        .collect();

    finish(results, output, exit_code)
}

/// Generic text fallback: a summary line if one exists, otherwise the exit
/// code alone decides.
fn parse_generic(output: &str, exit_code: i32, framework: &str) -> TestResults {
    let mut results = TestResults::new(framework);
    if let Some(summary) = parse_test_summary(output) {
        results.total = summary.total();
        results.failed = summary.failed;
        results.skipped = summary.skipped;
        results.duration_ms = summary.duration_ms;
    }
    finish(results, output, exit_code)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JestReport {
    num_total_tests: usize,
    #[serde(default)]
    num_failed_tests: usize,
    #[serde(default)]
    num_pending_tests: usize,
    #[serde(default)]
    test_results: Vec<JestSuite>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JestSuite {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    start_time: Option<f64>,
    #[serde(default)]
    end_time: Option<f64>,
    #[serde(default)]
    assertion_results: Vec<JestAssertion>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JestAssertion {
    #[serde(default)]
    status: String,
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    failure_messages: Vec<String>,
}

fn find_jest_report(output: &str) -> Option<JestReport> {
    if let Some(report) =
        extract_json(output, '{', '}').and_then(|json| serde_json::from_str(json).ok())
    {
        return Some(report);
    }

    // Jest may print its report on one line between other console output
    output
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('{'))
        .find_map(|line| serde_json::from_str(line).ok())
}

fn parse_jest(output: &str, exit_code: i32, framework: &str) -> Option<TestResults> {
    let report = find_jest_report(output)?;

    let mut results = TestResults::new(framework);
    results.total = report.num_total_tests;
    results.failed = report.num_failed_tests;
    results.skipped = report.num_pending_tests;

    let duration: f64 = report
        .test_results
        .iter()
        .filter_map(|suite| Some(suite.end_time? - suite.start_time?))
        .filter(|elapsed| *elapsed > 0.0)
        .sum();
    results.duration_ms = duration as u64;

    results.failures = report
        .test_results
        .iter()
        .flat_map(|suite| {
            suite
                .assertion_results
                .iter()
                .filter(|a| a.status == "failed")
                .map(move |a| {
                    let name = a
                        .full_name
                        .clone()
                        .or_else(|| a.title.clone())
                        .unwrap_or_else(|| "unnamed test".to_string());
                    let message = match a.failure_messages.first() {
                        Some(reason) => {
                            let first_line = reason.lines().next().unwrap_or_default();
                            format!("{} - {}", name, first_line)
                        }
                        None => name,
                    };
                    Issue {
                        file: suite.name.clone(),
                        message,
                        ..Default::default()
                    }
                })
        })
        .collect();

    Some(finish(results, output, exit_code))
}

/// One event of `go test -json`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GoTestEvent {
    action: String,
    #[serde(default)]
    package: Option<String>,
    #[serde(default)]
    test: Option<String>,
    #[serde(default)]
    elapsed: Option<f64>,
}

fn parse_go_test(output: &str, exit_code: i32, framework: &str) -> Option<TestResults> {
    let events: Vec<GoTestEvent> = output
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('{'))
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect();

    if events.is_empty() {
        return None;
    }

    let mut results = TestResults::new(framework);
    let mut passed = 0;

    for event in &events {
        match event.action.as_str() {
            "pass" => passed += 1,
            "fail" => {
                results.failed += 1;
                if let Some(test) = &event.test {
                    results.failures.push(Issue {
                        file: event.package.clone(),
                        message: format!("{} failed", test),
                        ..Default::default()
                    });
                }
            }
            "skip" => results.skipped += 1,
            _ => {}
        }

        if let Some(elapsed) = event.elapsed.filter(|e| *e > 0.0) {
            results.duration_ms = (elapsed * 1000.0) as u64;
        }
    }

    results.total = passed + results.failed + results.skipped;
    Some(finish(results, output, exit_code))
}

fn parse_cargo_test(output: &str, exit_code: i32, framework: &str) -> Option<TestResults> {
    let mut matched = false;
    let mut results = TestResults::new(framework);
    let mut passed = 0;

    // One result line per test binary
    for caps in CARGO_RESULT.captures_iter(output) {
        matched = true;
        passed += caps[2].parse::<usize>().unwrap_or(0);
        results.failed += caps[3].parse::<usize>().unwrap_or(0);
        results.skipped += caps[4].parse::<usize>().unwrap_or(0);
    }

    if !matched {
        return None;
    }

    results.total = passed + results.failed + results.skipped;
    results.duration_ms = CARGO_FINISHED
        .captures_iter(output)
        .filter_map(|caps| caps[1].parse::<f64>().ok())
        .map(|secs| (secs * 1000.0).round() as u64)
        .sum();

    results.failures = CARGO_FAILED_TEST
        .captures_iter(output)
        .map(|caps| Issue::message(format!("{} failed", &caps[1])))
        .collect();

    Some(finish(results, output, exit_code))
}

/// Runs a project's test suite and normalizes the result
#[derive(Debug, Clone)]
pub struct TestRunner {
    framework: String,
    parser: TestParser,
    command: ToolCommand,
}

impl TestRunner {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

    /// Default runner for a language, `None` when it has no known runner
    pub fn for_language(language: Language, timeout: Duration) -> Option<Self> {
        let (parser, program, args): (_, _, &[&str]) = match language {
            Language::Python => (TestParser::Pytest, "pytest", &["--tb=short", "-q"]),
            Language::JavaScript | Language::TypeScript => {
                (TestParser::Jest, "npm", &["test", "--", "--json"])
            }
            Language::Go => (TestParser::GoTest, "go", &["test", "-json", "./..."]),
            Language::Rust => (TestParser::CargoTest, "cargo", &["test"]),
            _ => return None,
        };

        Some(Self {
            framework: parser.framework().to_string(),
            parser,
            command: ToolCommand::new(program, args, timeout),
        })
    }

    /// Guess the runner from files in `working_dir`, defaulting to pytest
    pub fn detect(working_dir: &Path, timeout: Duration) -> Self {
        let exists = |name: &str| working_dir.join(name).exists();

        let (framework, program, args): (_, _, &[&str]) = if exists("package.json") {
            ("npm", "npm", &["test"])
        } else if exists("pytest.ini") || exists("pyproject.toml") {
            ("pytest", "pytest", &["--tb=short", "-q"])
        } else if exists("go.mod") {
            ("go test", "go", &["test", "./..."])
        } else if exists("Cargo.toml") {
            ("cargo test", "cargo", &["test"])
        } else {
            ("pytest", "pytest", &["--tb=short", "-q"])
        };

        Self {
            framework: framework.to_string(),
            parser: TestParser::for_framework(framework),
            command: ToolCommand::new(program, args, timeout),
        }
    }

    /// Runner for an explicit command line. Returns `None` for a blank line.
    pub fn from_command(command_line: &str, timeout: Duration) -> Option<Self> {
        ToolCommand::parse(command_line, timeout).map(Self::with_command)
    }

    pub fn with_command(command: ToolCommand) -> Self {
        let parser = TestParser::for_command(&command);
        Self {
            framework: parser.framework().to_string(),
            parser,
            command,
        }
    }

    /// Pick a runner: explicit command, then language default, then
    /// project detection.
    pub fn resolve(
        command_line: Option<&str>,
        language: Option<Language>,
        working_dir: &Path,
        timeout: Duration,
    ) -> Self {
        command_line
            .and_then(|line| Self::from_command(line, timeout))
            .or_else(|| language.and_then(|lang| Self::for_language(lang, timeout)))
            .unwrap_or_else(|| Self::detect(working_dir, timeout))
    }

    pub fn framework(&self) -> &str {
        &self.framework
    }

    pub fn parser(&self) -> TestParser {
        self.parser
    }

    fn failure(&self, message: String) -> TestResults {
        let mut results = TestResults::new(&self.framework);
        results.failures = vec![Issue::message(message.clone())];
        results.output = message;
        results
    }
}

#[async_trait]
impl Normalizer for TestRunner {
    type Output = TestResults;

    fn tool(&self) -> &str {
        &self.framework
    }

    fn command(&self) -> &ToolCommand {
        &self.command
    }

    fn parse(&self, output: &str, exit_code: i32) -> TestResults {
        self.parser.parse(output, exit_code, &self.framework)
    }

    fn not_found(&self) -> TestResults {
        let mut results = TestResults::new(format!("{} (not found)", self.framework));
        results.passed = true;
        results.output = format!("Test command not found: {}", self.command.program);
        results
    }

    fn timed_out(&self, timeout: Duration) -> TestResults {
        self.failure(format!("Test timeout after {:?}", timeout))
    }

    fn spawn_failed(&self, error: &ToolError) -> TestResults {
        self.failure(format!("Error running tests: {}", error))
    }
}
