use std::path::PathBuf;

use thiserror::Error;

/// Fatal conditions that stop a diagnostic run.
///
/// Network failures never show up here: adapters fold those into a failed
/// [`TestResult`](crate::models::TestResult).
#[derive(Error, Debug)]
pub enum DiagError {
    #[error("failed to read catalog {path}: {source}")]
    CatalogRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse catalog: {0}")]
    CatalogParse(#[from] serde_json::Error),

    #[error("malformed catalog: {0}")]
    MalformedCatalog(String),

    #[error("catalog record #{index} has an empty name")]
    MissingName { index: usize },

    #[error("duplicate test name in catalog: {0}")]
    DuplicateName(String),

    #[error("test '{case}' references unknown adapter '{adapter}'")]
    UnknownAdapter { case: String, adapter: String },

    #[error("test '{case}' has an invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint {
        case: String,
        endpoint: String,
        reason: String,
    },

    #[error("no proxy found for the test endpoint {endpoint} (required by '{case}'); set HTTPS_PROXY/HTTP_PROXY or check NO_PROXY")]
    ProxyUnresolved { case: String, endpoint: String },

    #[error("proxy not reachable: {0}")]
    ProxyUnreachable(String),

    #[error("adapter for '{case}' failed: {source}")]
    Adapter {
        case: String,
        #[source]
        source: AdapterFault,
    },
}

/// Programmer errors raised by an adapter. These abort the whole run.
#[derive(Error, Debug)]
pub enum AdapterFault {
    #[error("invalid option '{option}': {reason}")]
    InvalidOption { option: String, reason: String },

    #[error("failed to build client: {0}")]
    Client(String),

    #[error("contract violation: {0}")]
    ContractViolation(String),
}

pub type Result<T> = std::result::Result<T, DiagError>;
