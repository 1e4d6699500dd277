//! Text heuristics shared by every normalizer family, used when a tool's
//! structured output is missing or malformed.

use regex::Regex;
use std::sync::LazyLock;

/// A line that looks like a test summary ("3 passed, 1 failed in 0.2s")
static SUMMARY_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+ (passed|failed)").expect("valid regex"));

static SUMMARY_COUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+) (passed|failed|skipped|errors?|deselected|xfailed|xpassed)\b")
        .expect("valid regex")
});

static DURATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"in ([\d.]+)s").expect("valid regex"));

/// Counts recovered from a textual test summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TestSummary {
    pub passed: usize,
    /// Failures plus errors
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
}

impl TestSummary {
    pub fn total(&self) -> usize {
        self.passed + self.failed + self.skipped
    }
}

/// Find the last summary line in `output` and read its counts.
///
/// Counts are read per keyword, so both "5 passed, 1 failed" and pytest's
/// "1 failed, 5 passed, 2 skipped in 0.31s" ordering are understood.
/// Returns `None` when no summary line exists.
pub fn parse_test_summary(output: &str) -> Option<TestSummary> {
    let line = output.lines().rev().find(|l| SUMMARY_LINE.is_match(l))?;

    let mut summary = TestSummary::default();
    for caps in SUMMARY_COUNT.captures_iter(line) {
        let count: usize = caps[1].parse().unwrap_or(0);
        match &caps[2] {
            "passed" => summary.passed += count,
            "failed" | "error" | "errors" => summary.failed += count,
            "skipped" => summary.skipped += count,
            _ => {}
        }
    }

    summary.duration_ms = parse_duration_ms(line)
        .or_else(|| parse_duration_ms(output))
        .unwrap_or(0);

    Some(summary)
}

/// First "in <seconds>s" in `text`, as milliseconds
pub fn parse_duration_ms(text: &str) -> Option<u64> {
    let caps = DURATION.captures(text)?;
    let secs: f64 = caps[1].parse().ok()?;
    Some((secs * 1000.0).round() as u64)
}

/// Number of lines containing `word`, ignoring case
pub fn count_lines_containing(output: &str, word: &str) -> usize {
    let word = word.to_lowercase();
    output
        .lines()
        .filter(|line| line.to_lowercase().contains(&word))
        .count()
}

/// Locate a JSON document delimited by `open`/`close` inside mixed output.
///
/// The whole trimmed text is preferred; otherwise the span from the first
/// `open` to the last `close`.
pub fn extract_json(output: &str, open: char, close: char) -> Option<&str> {
    let trimmed = output.trim();
    if trimmed.starts_with(open) && trimmed.ends_with(close) {
        return Some(trimmed);
    }

    let start = output.find(open)?;
    let end = output.rfind(close)?;
    (end > start).then(|| &output[start..=end])
}
