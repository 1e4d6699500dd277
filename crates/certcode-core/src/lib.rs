//! # certcode-core
//!
//! Configuration, verification and trace assembly for cert-code.
//!
//! A [`Collector`] takes a unified diff (or a git reference), runs the
//! enabled verification tools through a [`VerificationBuilder`] and
//! produces a [`CodeTrace`]. [`CodeTrace::to_wire`] flattens it into the
//! record posted to the evaluation API.

mod collector;
pub mod config;
mod error;
mod task;
mod trace;
mod verification;

pub use collector::{CollectOptions, Collector};
pub use config::{
    ApiConfig, BehaviorConfig, Config, ContextConfig, ProjectConfig, ToolConfig,
    CONFIG_FILE_NAME, DEFAULT_API_URL, DEFAULT_CONTEXT_MAX_SIZE, ENV_PREFIX,
};
pub use error::{CollectError, ConfigError};
pub use task::CodeTask;
pub use trace::{CodeTrace, WireTrace, CERT_CODE_VERSION, MAX_TEST_OUTPUT};
pub use verification::{check_parseable, CodeVerification, VerificationBuilder, VerificationOptions};
