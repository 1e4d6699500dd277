use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error(
        "CERT API key is required. Set CERT_CODE_API_KEY or configure [api] key in .cert-code.toml"
    )]
    MissingApiKey,

    #[error("API key is not a valid header value")]
    InvalidApiKey(#[from] reqwest::header::InvalidHeaderValue),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
