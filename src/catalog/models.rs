use serde::Deserialize;
use serde_json::{Map, Value};

/// Leading record of a catalog file.
#[derive(Debug, Default, Deserialize)]
pub struct MetadataRecord {
    #[serde(default)]
    pub ignore: Vec<String>,
}

/// One test case as written in the catalog file.
#[derive(Debug, Deserialize)]
pub struct CaseRecord {
    #[serde(default)]
    pub name: String,
    /// Adapter identifier.
    pub test: String,
    #[serde(default)]
    pub disabled: bool,
    pub args: CaseArgs,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseArgs {
    pub test_endpoint: String,
    /// `false` forces a direct connection.
    #[serde(default)]
    pub proxy_url: Option<bool>,
    /// Per-case timeout in milliseconds.
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Everything else goes to the adapter untouched.
    #[serde(flatten)]
    pub options: Map<String, Value>,
}
