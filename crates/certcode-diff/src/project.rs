use ignore::WalkBuilder;
use std::path::Path;
use tracing::debug;

use crate::language::{detect_language, pick_first_max, Language};

/// Manifest files that identify a project's ecosystem, checked in order.
/// `tsconfig.json` precedes `package.json` so TypeScript wins over JavaScript.
const PROJECT_INDICATORS: &[(&str, Language)] = &[
    ("pyproject.toml", Language::Python),
    ("setup.py", Language::Python),
    ("requirements.txt", Language::Python),
    ("Pipfile", Language::Python),
    ("tsconfig.json", Language::TypeScript),
    ("package.json", Language::JavaScript),
    ("go.mod", Language::Go),
    ("Cargo.toml", Language::Rust),
    ("pom.xml", Language::Java),
    ("build.gradle", Language::Java),
    ("Gemfile", Language::Ruby),
    ("composer.json", Language::Php),
    ("Package.swift", Language::Swift),
    ("build.sbt", Language::Scala),
];

/// Detect the primary language of a project directory.
///
/// An indicator file at the root short-circuits; otherwise every
/// non-ignored file under `directory` is classified by extension and the
/// most frequent language wins.
pub fn detect_project_language(directory: &Path) -> Option<Language> {
    if let Some(lang) = detect_from_indicators(directory) {
        return Some(lang);
    }

    let mut counts: Vec<(Language, usize)> = Vec::new();

    for entry in WalkBuilder::new(directory).build().flatten() {
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let lang = detect_language(&entry.path().to_string_lossy());
        if lang == Language::Other {
            continue;
        }
        match counts.iter_mut().find(|(seen, _)| *seen == lang) {
            Some((_, count)) => *count += 1,
            None => counts.push((lang, 1)),
        }
    }

    debug!(dir = %directory.display(), languages = counts.len(), "Counted project files");

    pick_first_max(&counts)
}

fn detect_from_indicators(directory: &Path) -> Option<Language> {
    PROJECT_INDICATORS
        .iter()
        .find(|(indicator, _)| directory.join(indicator).exists())
        .map(|(indicator, lang)| {
            debug!(indicator, language = %lang, "Found project indicator");
            *lang
        })
}
