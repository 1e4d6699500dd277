//! # certcode-tools
//!
//! Runs verification tools against a working tree and normalizes what they
//! print into one canonical shape per family.
//!
//! ## Families
//!
//! - Tests: pytest, jest, go test, cargo test
//! - Lint: ruff, eslint, golangci-lint, clippy
//! - Type checking: mypy, tsc, go vet
//!
//! Every family falls back to text heuristics when the structured output
//! is missing or malformed. A tool that is not installed yields a passing
//! result labelled `"<tool> (not found)"`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use certcode_diff::Language;
//! use certcode_tools::{Linter, Normalizer};
//! use std::path::Path;
//!
//! if let Some(linter) = Linter::for_language(Language::Python, Linter::DEFAULT_TIMEOUT) {
//!     let results = linter.run(Path::new(".")).await;
//!     println!("{}: {} errors", results.tool, results.error_count);
//! }
//! ```

mod defaults;
mod fallback;
mod lint;
mod output;
mod results;
mod spawner;
mod test_runner;
mod traits;
mod typecheck;

pub use defaults::DefaultTools;
pub use lint::{LintParser, Linter};
pub use output::ToolOutput;
pub use results::{Issue, LintResults, TestResults, TypeCheckResults, MAX_ISSUES};
pub use spawner::ProcessSpawner;
pub use test_runner::{TestParser, TestRunner};
pub use traits::{Normalizer, ToolCommand, ToolError};
pub use typecheck::{TypeCheckParser, TypeChecker};
