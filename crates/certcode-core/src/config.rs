//! Configuration file and environment support for cert-code.
//!
//! Settings come from `.cert-code.toml` (found by walking up from the
//! working directory, then in the home directory) overlaid with
//! `CERT_CODE_*` environment variables.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use certcode_tools::{Linter, TestRunner, TypeChecker};

use crate::error::ConfigError;

/// The config file name
pub const CONFIG_FILE_NAME: &str = ".cert-code.toml";

/// Prefix shared by every environment override
pub const ENV_PREFIX: &str = "CERT_CODE_";

pub const DEFAULT_API_URL: &str = "https://cert-framework.dev/api/v1";

pub const DEFAULT_CONTEXT_MAX_SIZE: usize = 100_000;

/// Complete cert-code configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub project: ProjectConfig,
    pub behavior: BehaviorConfig,
    pub test: ToolConfig,
    pub lint: ToolConfig,
    pub typecheck: ToolConfig,
    pub context: ContextConfig,
}

/// `[api]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    pub url: String,
    pub key: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_API_URL.to_string(),
            key: None,
        }
    }
}

/// `[project]` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    pub id: Option<String>,
    pub name: Option<String>,
}

/// `[behavior]` section: what runs when the command line does not say
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BehaviorConfig {
    pub auto_detect_language: bool,
    pub auto_run_tests: bool,
    pub auto_run_lint: bool,
    pub auto_run_typecheck: bool,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            auto_detect_language: true,
            auto_run_tests: false,
            auto_run_lint: false,
            auto_run_typecheck: false,
        }
    }
}

/// `[test]`, `[lint]` and `[typecheck]` sections
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolConfig {
    /// Command line overriding the per-language default
    pub command: Option<String>,
    /// Timeout in seconds; each family has its own default
    pub timeout: Option<u64>,
}

impl ToolConfig {
    fn timeout_or(&self, default: Duration) -> Duration {
        self.timeout.map(Duration::from_secs).unwrap_or(default)
    }
}

/// `[context]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContextConfig {
    /// Files attached to every trace as grounding context
    pub files: Vec<PathBuf>,
    /// Upper bound on the assembled context, in characters
    pub max_size: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            files: Vec::new(),
            max_size: DEFAULT_CONTEXT_MAX_SIZE,
        }
    }
}

impl Config {
    /// Load configuration: `explicit_path` if given, otherwise the first
    /// config file found from `working_dir`, then environment overrides.
    ///
    /// A missing discovered file is not an error; a missing explicit file is.
    pub fn load(explicit_path: Option<&Path>, working_dir: &Path) -> Result<Self, ConfigError> {
        let path = match explicit_path {
            Some(path) => Some(path.to_path_buf()),
            None => Self::find(working_dir),
        };

        let mut config = match path {
            Some(path) => Self::from_file(&path)?,
            None => {
                debug!("No config file found, using defaults");
                Self::default()
            }
        };

        config.apply_env(|var| std::env::var(var).ok())?;
        Ok(config)
    }

    /// Walk up from `working_dir`, then fall back to the home directory
    pub fn find(working_dir: &Path) -> Option<PathBuf> {
        working_dir
            .ancestors()
            .map(|dir| dir.join(CONFIG_FILE_NAME))
            .find(|candidate| candidate.is_file())
            .or_else(|| {
                dirs::home_dir()
                    .map(|home| home.join(CONFIG_FILE_NAME))
                    .filter(|candidate| candidate.is_file())
            })
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// Overlay `CERT_CODE_*` variables read through `lookup`.
    ///
    /// Booleans accept `1`, `true` or `yes` (case-insensitive); anything else
    /// reads as false.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |suffix: &str| lookup(&format!("{}{}", ENV_PREFIX, suffix));
        let flag = |value: String| matches!(value.to_lowercase().as_str(), "1" | "true" | "yes");

        if let Some(url) = get("API_URL") {
            self.api.url = url;
        }
        if let Some(key) = get("API_KEY") {
            self.api.key = Some(key);
        }
        if let Some(id) = get("PROJECT_ID") {
            self.project.id = Some(id);
        }
        if let Some(name) = get("PROJECT_NAME") {
            self.project.name = Some(name);
        }
        if let Some(command) = get("TEST_COMMAND") {
            self.test.command = Some(command);
        }
        if let Some(value) = get("TEST_TIMEOUT") {
            let secs = value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                var: format!("{}TEST_TIMEOUT", ENV_PREFIX),
                value: value.clone(),
            })?;
            self.test.timeout = Some(secs);
        }
        if let Some(command) = get("LINT_COMMAND") {
            self.lint.command = Some(command);
        }
        if let Some(command) = get("TYPECHECK_COMMAND") {
            self.typecheck.command = Some(command);
        }
        if let Some(value) = get("AUTO_RUN_TESTS") {
            self.behavior.auto_run_tests = flag(value);
        }
        if let Some(value) = get("AUTO_RUN_LINT") {
            self.behavior.auto_run_lint = flag(value);
        }
        if let Some(value) = get("AUTO_RUN_TYPECHECK") {
            self.behavior.auto_run_typecheck = flag(value);
        }
        Ok(())
    }

    pub fn test_timeout(&self) -> Duration {
        self.test.timeout_or(TestRunner::DEFAULT_TIMEOUT)
    }

    pub fn lint_timeout(&self) -> Duration {
        self.lint.timeout_or(Linter::DEFAULT_TIMEOUT)
    }

    pub fn typecheck_timeout(&self) -> Duration {
        self.typecheck.timeout_or(TypeChecker::DEFAULT_TIMEOUT)
    }

    /// Render the commented starter file written by `cert-code init`
    pub fn to_toml(&self) -> String {
        let commented = |key: &str, value: Option<&str>, example: &str| match value {
            Some(value) => format!("{} = {:?}", key, value),
            None => format!("# {} = {:?}", key, example),
        };

        let files = if self.context.files.is_empty() {
            "# files = [\"README.md\", \"docs/api.md\"]".to_string()
        } else {
            let quoted: Vec<String> = self
                .context
                .files
                .iter()
                .map(|f| format!("{:?}", f.display().to_string()))
                .collect();
            format!("files = [{}]", quoted.join(", "))
        };

        [
            "# cert-code configuration".to_string(),
            "# Generated by: cert-code init".to_string(),
            String::new(),
            "[api]".to_string(),
            format!("url = {:?}", self.api.url),
            "# key = \"your-api-key\"  # or set CERT_CODE_API_KEY".to_string(),
            String::new(),
            "[project]".to_string(),
            commented("id", self.project.id.as_deref(), "your-project-id"),
            commented("name", self.project.name.as_deref(), "my-project"),
            String::new(),
            "[behavior]".to_string(),
            format!("auto_detect_language = {}", self.behavior.auto_detect_language),
            format!("auto_run_tests = {}", self.behavior.auto_run_tests),
            format!("auto_run_lint = {}", self.behavior.auto_run_lint),
            format!("auto_run_typecheck = {}", self.behavior.auto_run_typecheck),
            String::new(),
            "[test]".to_string(),
            commented("command", self.test.command.as_deref(), "pytest"),
            format!("timeout = {}", self.test_timeout().as_secs()),
            String::new(),
            "[lint]".to_string(),
            commented("command", self.lint.command.as_deref(), "ruff check ."),
            format!("timeout = {}", self.lint_timeout().as_secs()),
            String::new(),
            "[typecheck]".to_string(),
            commented("command", self.typecheck.command.as_deref(), "mypy ."),
            format!("timeout = {}", self.typecheck_timeout().as_secs()),
            String::new(),
            "[context]".to_string(),
            files,
            format!("max_size = {}", self.context.max_size),
            String::new(),
        ]
        .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api.url, DEFAULT_API_URL);
        assert!(config.behavior.auto_detect_language);
        assert!(!config.behavior.auto_run_tests);
        assert_eq!(config.test_timeout(), Duration::from_secs(300));
        assert_eq!(config.lint_timeout(), Duration::from_secs(60));
        assert_eq!(config.typecheck_timeout(), Duration::from_secs(120));
        assert_eq!(config.context.max_size, 100_000);
    }

    #[test]
    fn test_parse_sections() {
        let config: Config = toml::from_str(
            r#"
[api]
key = "sk-test"

[project]
id = "proj_1"

[behavior]
auto_run_tests = true

[test]
command = "pytest -x"
timeout = 30

[context]
files = ["README.md"]
max_size = 5000

[git]
hook_enabled = true
"#,
        )
        .unwrap();

        assert_eq!(config.api.url, DEFAULT_API_URL);
        assert_eq!(config.api.key.as_deref(), Some("sk-test"));
        assert_eq!(config.project.id.as_deref(), Some("proj_1"));
        assert!(config.behavior.auto_run_tests);
        assert!(config.behavior.auto_detect_language);
        assert_eq!(config.test.command.as_deref(), Some("pytest -x"));
        assert_eq!(config.test_timeout(), Duration::from_secs(30));
        assert_eq!(config.lint_timeout(), Duration::from_secs(60));
        assert_eq!(config.context.files, vec![PathBuf::from("README.md")]);
        assert_eq!(config.context.max_size, 5000);
    }

    #[test]
    fn test_unknown_section_key_is_rejected() {
        let result: Result<Config, _> = toml::from_str("[api]\nkey = \"k\"\ntoken = \"typo\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config: Config =
            toml::from_str("[api]\nkey = \"from-file\"\n[behavior]\nauto_run_lint = true\n")
                .unwrap();

        config
            .apply_env(env(&[
                ("CERT_CODE_API_KEY", "from-env"),
                ("CERT_CODE_AUTO_RUN_LINT", "no"),
                ("CERT_CODE_AUTO_RUN_TESTS", "YES"),
                ("CERT_CODE_TEST_TIMEOUT", "42"),
                ("CERT_CODE_LINT_COMMAND", "ruff check src"),
            ]))
            .unwrap();

        assert_eq!(config.api.key.as_deref(), Some("from-env"));
        assert!(!config.behavior.auto_run_lint);
        assert!(config.behavior.auto_run_tests);
        assert_eq!(config.test_timeout(), Duration::from_secs(42));
        assert_eq!(config.lint.command.as_deref(), Some("ruff check src"));
    }

    #[test]
    fn test_invalid_env_timeout() {
        let mut config = Config::default();
        let err = config
            .apply_env(env(&[("CERT_CODE_TEST_TIMEOUT", "soon")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { .. }));
    }

    #[test]
    fn test_find_walks_up() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "[project]\nid = \"p\"\n").unwrap();

        let found = Config::find(&nested).unwrap();
        assert_eq!(found, dir.path().join(CONFIG_FILE_NAME));

        let config = Config::from_file(&found).unwrap();
        assert_eq!(config.project.id.as_deref(), Some("p"));
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.toml");
        let err = Config::load(Some(&missing), dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_parse_error_names_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[api\nurl = ").unwrap();

        let err = Config::from_file(&path).unwrap_err();
        assert!(err.to_string().contains(CONFIG_FILE_NAME));
    }

    #[test]
    fn test_starter_file_round_trips() {
        let rendered = Config::default().to_toml();
        assert!(rendered.contains("# key = \"your-api-key\""));
        assert!(rendered.contains("timeout = 300"));

        let parsed: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.api.url, DEFAULT_API_URL);
        assert_eq!(parsed.test_timeout(), Duration::from_secs(300));
        assert_eq!(parsed.context.max_size, DEFAULT_CONTEXT_MAX_SIZE);
    }
}
