//! # certcode-client
//!
//! Submits [`certcode_core::CodeTrace`]s to the CERT evaluation API.
//!
//! ```no_run
//! # async fn run(config: &certcode_core::Config, trace: certcode_core::CodeTrace) -> Result<(), certcode_client::ClientError> {
//! use certcode_client::CertClient;
//!
//! let client = CertClient::new(&config.api)?.with_project_id(config.project.id.clone());
//! let result = client.submit(&trace).await;
//! println!("{:?}", result.trace_id);
//! # Ok(())
//! # }
//! ```

mod client;
mod error;

pub use client::{CertClient, SubmitResult, DEFAULT_CONCURRENCY, REQUEST_TIMEOUT};
pub use error::ClientError;
