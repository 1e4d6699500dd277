use certcode_diff::Language;

use crate::{Linter, Normalizer, TestRunner, TypeChecker};

/// Command lines run for a language when the config names none
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefaultTools {
    pub test: Option<String>,
    pub lint: Option<String>,
    pub typecheck: Option<String>,
}

impl DefaultTools {
    /// Read the commands off the runners themselves
    pub fn for_language(language: Language) -> Self {
        Self {
            test: TestRunner::for_language(language, TestRunner::DEFAULT_TIMEOUT)
                .map(|runner| runner.command().display()),
            lint: Linter::for_language(language, Linter::DEFAULT_TIMEOUT)
                .map(|linter| linter.command().display()),
            typecheck: TypeChecker::for_language(language, TypeChecker::DEFAULT_TIMEOUT)
                .map(|checker| checker.command().display()),
        }
    }
}
