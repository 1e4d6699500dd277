//! Terminal rendering for submit results, dry runs and status.

use colored::{ColoredString, Colorize};
use serde_json::Value;

use certcode_client::SubmitResult;
use certcode_diff::CodeArtifact;

const MAX_LISTED_FILES: usize = 10;

/// Evaluation metrics shown after a successful submit, in display order
const EVALUATION_METRICS: &[(&str, &str)] = &[
    ("code_execution_score", "Tests"),
    ("code_type_safety_score", "Type Safety"),
    ("code_lint_score", "Lint"),
    ("code_context_alignment_score", "Context Alignment (SGI)"),
];

/// What a dry run would have done
pub struct DryRunPlan<'a> {
    pub task: &'a str,
    pub tool: Option<&'a str>,
    pub run_tests: bool,
    pub run_lint: bool,
    pub run_typecheck: bool,
}

pub fn print_dry_run(plan: &DryRunPlan<'_>, artifact: &CodeArtifact) {
    eprintln!();
    eprintln!(
        "{} {}",
        "DRY RUN".bright_yellow().bold(),
        "- nothing will be submitted".dimmed()
    );
    eprintln!("  {:<14} {}", "Task:".bold(), plan.task);
    eprintln!(
        "  {:<14} {}",
        "Tool:".bold(),
        plan.tool.unwrap_or("Not specified")
    );
    eprintln!("  {:<14} {}", "Language:".bold(), artifact.language);
    eprintln!(
        "  {:<14} {}",
        "Files changed:".bold(),
        artifact.files_changed.len()
    );
    eprintln!(
        "  {:<14} {}",
        "Additions:".bold(),
        format!("+{}", artifact.diff_stats.additions).green()
    );
    eprintln!(
        "  {:<14} {}",
        "Deletions:".bold(),
        format!("-{}", artifact.diff_stats.deletions).red()
    );
    eprintln!("  {:<14} {}", "Run tests:".bold(), plan.run_tests);
    eprintln!("  {:<14} {}", "Run lint:".bold(), plan.run_lint);
    eprintln!("  {:<14} {}", "Run typecheck:".bold(), plan.run_typecheck);

    if !artifact.files_changed.is_empty() {
        eprintln!();
        eprintln!("{}", "Files:".bold());
        for file in artifact.files_changed.iter().take(MAX_LISTED_FILES) {
            eprintln!("  • {}", file);
        }
        if artifact.files_changed.len() > MAX_LISTED_FILES {
            eprintln!(
                "  ... and {} more",
                artifact.files_changed.len() - MAX_LISTED_FILES
            );
        }
    }
}

pub fn print_submit_result(result: &SubmitResult) {
    eprintln!();
    if result.success {
        eprintln!("{} Trace submitted successfully", "✓".bright_green());
        eprintln!(
            "  Trace ID: {}",
            result.trace_id.as_deref().unwrap_or("(none)").bold()
        );
        if let Some(evaluation) = &result.evaluation {
            print_evaluation(evaluation);
        }
    } else {
        eprintln!("{} Submission failed", "✗".bright_red());
        eprintln!("  {}", result.error.as_deref().unwrap_or("Unknown error"));
    }
}

fn print_evaluation(evaluation: &Value) {
    eprintln!();
    eprintln!("{}", "Evaluation Results".bold());

    if let Some(score) = evaluation.get("score").and_then(Value::as_f64) {
        eprintln!("  {:<26} {}", "Overall Score", score_colored(score));
    }

    if let Some(status) = evaluation.get("status").and_then(Value::as_str) {
        let upper = status.to_uppercase();
        let colored = match status {
            "pass" => upper.green(),
            "review" => upper.yellow(),
            "fail" => upper.red(),
            _ => upper.normal(),
        };
        eprintln!("  {:<26} {}", "Status", colored);
    }

    if let Some(metrics) = evaluation.get("metrics") {
        for (key, label) in EVALUATION_METRICS {
            if let Some(value) = metrics.get(*key).and_then(Value::as_f64) {
                eprintln!("  {:<26} {}", label, score_colored(value));
            }
        }
    }
}

fn score_colored(score: f64) -> ColoredString {
    let text = format!("{:.2}%", score * 100.0);
    if score >= 0.7 {
        text.green()
    } else if score >= 0.5 {
        text.yellow()
    } else {
        text.red()
    }
}

/// One row of `cert-code status`
pub enum StatusMark {
    Ok,
    Missing,
    Optional,
}

pub fn print_status_row(setting: &str, value: &str, mark: StatusMark) {
    let mark = match mark {
        StatusMark::Ok => "✓".bright_green(),
        StatusMark::Missing => "✗".bright_red(),
        StatusMark::Optional => "○".bright_yellow(),
    };
    eprintln!("  {} {:<12} {}", mark, setting.cyan(), value);
}

/// Show only the start of an API key
pub fn mask_key(key: &str) -> String {
    let prefix: String = key.chars().take(8).collect();
    format!("{prefix}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_key() {
        assert_eq!(mask_key("sk_live_abcdef123"), "sk_live_...");
        assert_eq!(mask_key("short"), "short...");
    }
}
