use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CollectError {
    #[error("No changes to submit: the diff is empty")]
    EmptyDiff,

    #[error("Git error: {0}")]
    Git(#[from] certcode_diff::GitError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {var}: {value:?}")]
    InvalidEnv { var: String, value: String },
}
