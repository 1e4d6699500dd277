use serde::{Deserialize, Serialize};
use std::path::Path;

/// Programming languages recognised in a changeset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    JavaScript,
    TypeScript,
    Go,
    Rust,
    Java,
    C,
    Cpp,
    CSharp,
    Ruby,
    Php,
    Swift,
    Kotlin,
    Scala,
    Shell,
    Sql,
    Html,
    Css,
    Other,
}

impl Language {
    pub const ALL: [Language; 19] = [
        Language::Python,
        Language::JavaScript,
        Language::TypeScript,
        Language::Go,
        Language::Rust,
        Language::Java,
        Language::C,
        Language::Cpp,
        Language::CSharp,
        Language::Ruby,
        Language::Php,
        Language::Swift,
        Language::Kotlin,
        Language::Scala,
        Language::Shell,
        Language::Sql,
        Language::Html,
        Language::Css,
        Language::Other,
    ];

    /// Wire tag for this language
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Go => "go",
            Language::Rust => "rust",
            Language::Java => "java",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::CSharp => "csharp",
            Language::Ruby => "ruby",
            Language::Php => "php",
            Language::Swift => "swift",
            Language::Kotlin => "kotlin",
            Language::Scala => "scala",
            Language::Shell => "shell",
            Language::Sql => "sql",
            Language::Html => "html",
            Language::Css => "css",
            Language::Other => "other",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        Language::ALL
            .iter()
            .copied()
            .find(|lang| lang.as_str() == lower)
            .ok_or_else(|| format!("Unknown language: {}", s))
    }
}

/// Extension (with leading dot, lowercase) to language
pub const EXTENSION_LANGUAGES: &[(&str, Language)] = &[
    (".py", Language::Python),
    (".pyi", Language::Python),
    (".js", Language::JavaScript),
    (".mjs", Language::JavaScript),
    (".cjs", Language::JavaScript),
    (".jsx", Language::JavaScript),
    (".ts", Language::TypeScript),
    (".tsx", Language::TypeScript),
    (".go", Language::Go),
    (".rs", Language::Rust),
    (".java", Language::Java),
    (".c", Language::C),
    (".h", Language::C),
    (".cpp", Language::Cpp),
    (".cc", Language::Cpp),
    (".cxx", Language::Cpp),
    (".hpp", Language::Cpp),
    (".cs", Language::CSharp),
    (".rb", Language::Ruby),
    (".php", Language::Php),
    (".swift", Language::Swift),
    (".kt", Language::Kotlin),
    (".kts", Language::Kotlin),
    (".scala", Language::Scala),
    (".sh", Language::Shell),
    (".bash", Language::Shell),
    (".zsh", Language::Shell),
    (".sql", Language::Sql),
    (".html", Language::Html),
    (".htm", Language::Html),
    (".css", Language::Css),
    (".scss", Language::Css),
    (".sass", Language::Css),
    (".less", Language::Css),
];

/// Mainstream source extensions that count double in primary detection
const PRIORITY_EXTENSIONS: &[&str] = &[
    ".py", ".js", ".ts", ".go", ".rs", ".java", ".c", ".cpp", ".cs", ".rb", ".php", ".swift",
    ".kt", ".scala",
];

const SHEBANG_PATTERNS: &[(&str, Language)] = &[
    ("python", Language::Python),
    ("node", Language::JavaScript),
    ("ruby", Language::Ruby),
    ("perl", Language::Other),
    ("bash", Language::Shell),
    ("sh", Language::Shell),
    ("zsh", Language::Shell),
];

const FILENAME_PATTERNS: &[(&str, Language)] = &[
    ("Makefile", Language::Shell),
    ("Dockerfile", Language::Shell),
    ("Jenkinsfile", Language::Other),
    ("Rakefile", Language::Ruby),
    ("Gemfile", Language::Ruby),
    ("Podfile", Language::Ruby),
    ("Vagrantfile", Language::Ruby),
];

/// Lowercase final extension including the dot, if the path has one
fn extension_of(file_path: &str) -> Option<String> {
    let (_, ext) = file_path.rsplit_once('.')?;
    Some(format!(".{}", ext.to_lowercase()))
}

/// Detect the language of a single file from its extension
pub fn detect_language(file_path: &str) -> Language {
    extension_of(file_path)
        .and_then(|ext| {
            EXTENSION_LANGUAGES
                .iter()
                .find(|(known, _)| *known == ext)
                .map(|(_, lang)| *lang)
        })
        .unwrap_or(Language::Other)
}

/// Detect the dominant language of a set of files.
///
/// Files with a priority extension weigh 2, other recognised files 1, and
/// unrecognised files are ignored. When several languages share the highest
/// weight, the one that appeared first in `files` wins.
pub fn detect_primary_language<S: AsRef<str>>(files: &[S]) -> Language {
    let mut weights: Vec<(Language, usize)> = Vec::new();

    for file in files {
        let file = file.as_ref();
        let lang = detect_language(file);
        if lang == Language::Other {
            continue;
        }

        let weight = match extension_of(file) {
            Some(ext) if PRIORITY_EXTENSIONS.contains(&ext.as_str()) => 2,
            _ => 1,
        };

        match weights.iter_mut().find(|(seen, _)| *seen == lang) {
            Some((_, total)) => *total += weight,
            None => weights.push((lang, weight)),
        }
    }

    pick_first_max(&weights).unwrap_or(Language::Other)
}

/// Highest-count entry, earliest entry winning ties
pub(crate) fn pick_first_max(counts: &[(Language, usize)]) -> Option<Language> {
    let mut best: Option<(Language, usize)> = None;
    for &(lang, count) in counts {
        match best {
            Some((_, top)) if count <= top => {}
            _ => best = Some((lang, count)),
        }
    }
    best.map(|(lang, _)| lang)
}

/// Detect a language from a `#!` line
pub fn detect_from_shebang(content: &str) -> Option<Language> {
    if !content.starts_with("#!") {
        return None;
    }

    let first_line = content.lines().next().unwrap_or("").to_lowercase();
    SHEBANG_PATTERNS
        .iter()
        .find(|(pattern, _)| first_line.contains(pattern))
        .map(|(_, lang)| *lang)
}

/// Detect a language from well-known extensionless file names
pub fn detect_from_filename(file_path: &str) -> Option<Language> {
    let basename = Path::new(file_path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(file_path);
    let stem = basename
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(basename);

    FILENAME_PATTERNS
        .iter()
        .find(|(name, _)| *name == basename)
        .or_else(|| FILENAME_PATTERNS.iter().find(|(name, _)| *name == stem))
        .map(|(_, lang)| *lang)
}

/// Display name and file extensions of a language
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageInfo {
    pub name: String,
    pub extensions: Vec<&'static str>,
}

impl LanguageInfo {
    pub fn for_language(language: Language) -> Self {
        let name = match language {
            Language::Python => "Python",
            Language::JavaScript => "JavaScript",
            Language::TypeScript => "TypeScript",
            Language::Go => "Go",
            Language::Rust => "Rust",
            Language::Java => "Java",
            Language::C => "C",
            Language::Cpp => "C++",
            Language::CSharp => "C#",
            Language::Ruby => "Ruby",
            Language::Php => "PHP",
            Language::Swift => "Swift",
            Language::Kotlin => "Kotlin",
            Language::Scala => "Scala",
            Language::Shell => "Shell",
            Language::Sql => "SQL",
            Language::Html => "HTML",
            Language::Css => "CSS",
            Language::Other => {
                return Self {
                    name: title_case(language.as_str()),
                    extensions: Vec::new(),
                }
            }
        };

        Self {
            name: name.to_string(),
            extensions: EXTENSION_LANGUAGES
                .iter()
                .filter(|(_, lang)| *lang == language)
                .map(|(ext, _)| *ext)
                .collect(),
        }
    }
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
