//! Loading and validation of test catalogs.
//!
//! A catalog is a JSON array: a metadata record (`{"ignore": [...]}`)
//! followed by one record per test case. Any validation error rejects the
//! whole catalog before a single case runs.

mod models;

use std::{fmt::Debug, fs, path::Path, sync::Arc, time::Duration};

use hashbrown::HashSet;
use models::{CaseRecord, MetadataRecord};
use reqwest::Url;
use serde_json::{Map, Value};

use crate::{
    adapters::{Adapter, AdapterRegistry},
    error::{DiagError, Result},
};

const BUILTIN_CATALOG: &str = include_str!("../../catalogs/default.json");

/// Catalog-level settings.
#[derive(Debug, Clone, Default)]
pub struct RunMetadata {
    /// Names of cases to skip.
    pub ignore: HashSet<String>,
}

/// A validated test case.
#[derive(Clone)]
pub struct TestCaseDeclaration {
    pub name: String,
    pub adapter: Arc<dyn Adapter>,
    pub endpoint: Url,
    pub use_proxy: bool,
    pub disabled: bool,
    pub timeout: Option<Duration>,
    pub user_agent: Option<String>,
    pub options: Map<String, Value>,
}

impl Debug for TestCaseDeclaration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestCaseDeclaration")
            .field("name", &self.name)
            .field("adapter", &self.adapter.name())
            .field("endpoint", &self.endpoint.as_str())
            .field("use_proxy", &self.use_proxy)
            .field("disabled", &self.disabled)
            .finish_non_exhaustive()
    }
}

/// Ordered test cases plus run metadata.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub metadata: RunMetadata,
    pub cases: Vec<TestCaseDeclaration>,
}

impl Catalog {
    /// The catalog shipped with the binary.
    pub fn builtin(registry: &AdapterRegistry) -> Result<Self> {
        load_from_str(BUILTIN_CATALOG, registry)
    }

    /// Whether a case is excluded from the run.
    pub fn is_skipped(&self, case: &TestCaseDeclaration) -> bool {
        case.disabled || self.metadata.ignore.contains(&case.name)
    }
}

pub fn load_from_path<P: AsRef<Path>>(path: P, registry: &AdapterRegistry) -> Result<Catalog> {
    let txt = fs::read_to_string(path.as_ref()).map_err(|source| DiagError::CatalogRead {
        path: path.as_ref().to_path_buf(),
        source,
    })?;
    load_from_str(&txt, registry)
}

pub fn load_from_str(src: &str, registry: &AdapterRegistry) -> Result<Catalog> {
    let records: Vec<Value> = serde_json::from_str(src)?;
    let mut records = records.into_iter();

    let metadata = match records.next() {
        Some(Value::Object(record)) if !record.contains_key("test") => {
            serde_json::from_value::<MetadataRecord>(Value::Object(record))
                .map_err(|e| DiagError::MalformedCatalog(format!("metadata record: {}", e)))?
        }
        Some(_) => {
            return Err(DiagError::MalformedCatalog(
                "the first record must be the metadata record, e.g. {\"ignore\": []}".into(),
            ))
        }
        None => return Err(DiagError::MalformedCatalog("catalog is empty".into())),
    };

    let mut names = HashSet::new();
    let mut cases = Vec::new();
    for (index, record) in records.enumerate().map(|(i, r)| (i + 1, r)) {
        let record: CaseRecord = serde_json::from_value(record)
            .map_err(|e| DiagError::MalformedCatalog(format!("record #{}: {}", index, e)))?;
        let case = validate(index, record, registry)?;
        if !names.insert(case.name.clone()) {
            return Err(DiagError::DuplicateName(case.name));
        }
        cases.push(case);
    }

    let metadata = RunMetadata {
        ignore: metadata.ignore.into_iter().collect(),
    };
    #[cfg(feature = "log")]
    for name in metadata.ignore.iter().filter(|name| !names.contains(*name)) {
        log::warn!("ignore list names unknown test '{}'", name);
    }

    Ok(Catalog { metadata, cases })
}

fn validate(
    index: usize,
    record: CaseRecord,
    registry: &AdapterRegistry,
) -> Result<TestCaseDeclaration> {
    let name = record.name.trim().to_string();
    if name.is_empty() {
        return Err(DiagError::MissingName { index });
    }

    let adapter = registry
        .get(&record.test)
        .ok_or_else(|| DiagError::UnknownAdapter {
            case: name.clone(),
            adapter: record.test.clone(),
        })?;

    let args = record.args;
    let invalid_endpoint = |reason: String| DiagError::InvalidEndpoint {
        case: name.clone(),
        endpoint: args.test_endpoint.clone(),
        reason,
    };
    let endpoint = Url::parse(&args.test_endpoint).map_err(|e| invalid_endpoint(e.to_string()))?;
    if !matches!(endpoint.scheme(), "http" | "https") {
        return Err(invalid_endpoint(format!(
            "unsupported scheme '{}'",
            endpoint.scheme()
        )));
    }
    if endpoint.host_str().map_or(true, str::is_empty) {
        return Err(invalid_endpoint("missing host".into()));
    }

    let timeout = match args.timeout {
        Some(0) => {
            return Err(DiagError::MalformedCatalog(format!(
                "test '{}': timeout must be > 0",
                name
            )))
        }
        Some(ms) => Some(Duration::from_millis(ms)),
        None => None,
    };

    Ok(TestCaseDeclaration {
        name,
        adapter,
        endpoint,
        use_proxy: args.proxy_url.unwrap_or(true),
        disabled: record.disabled,
        timeout,
        user_agent: args.user_agent,
        options: args.options,
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn load(src: &str) -> Result<Catalog> {
        load_from_str(src, &AdapterRegistry::builtin())
    }

    #[test]
    fn test_load_preserves_order_and_fields() {
        let catalog = load(
            r#"[
                {"ignore": ["b"]},
                {"name": "a", "test": "reqwest", "args": {"testEndpoint": "https://example.test/ping", "proxyUrl": false}},
                {"name": "b", "test": "hyper-tunnel", "args": {"testEndpoint": "http://example.test/", "timeout": 500, "insecure": true}},
                {"name": "c", "test": "auth-probe", "disabled": true, "args": {"testEndpoint": "https://example.test/auth"}}
            ]"#,
        )
        .unwrap();

        let names: Vec<_> = catalog.cases.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert!(!catalog.cases[0].use_proxy);
        assert!(catalog.cases[1].use_proxy);
        assert_eq!(catalog.cases[1].timeout, Some(Duration::from_millis(500)));
        assert_eq!(catalog.cases[1].options.get("insecure"), Some(&Value::Bool(true)));
        assert_eq!(catalog.cases[1].adapter.name(), "hyper-tunnel");

        assert!(!catalog.is_skipped(&catalog.cases[0]));
        assert!(catalog.is_skipped(&catalog.cases[1]));
        assert!(catalog.is_skipped(&catalog.cases[2]));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = load(
            r#"[
                {"ignore": []},
                {"name": "a", "test": "reqwest", "args": {"testEndpoint": "https://example.test/"}},
                {"name": "a", "test": "reqwest", "args": {"testEndpoint": "https://example.test/"}}
            ]"#,
        )
        .unwrap_err();
        assert!(matches!(err, DiagError::DuplicateName(name) if name == "a"));
    }

    #[test]
    fn test_unknown_adapter_rejected() {
        let err = load(
            r#"[{"ignore": []}, {"name": "a", "test": "needle", "args": {"testEndpoint": "https://example.test/"}}]"#,
        )
        .unwrap_err();
        assert!(matches!(err, DiagError::UnknownAdapter { adapter, .. } if adapter == "needle"));
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        for endpoint in ["not a url", "ftp://example.test/", "file:///tmp/x"] {
            let src = format!(
                r#"[{{"ignore": []}}, {{"name": "a", "test": "reqwest", "args": {{"testEndpoint": "{}"}}}}]"#,
                endpoint
            );
            assert!(
                matches!(load(&src), Err(DiagError::InvalidEndpoint { .. })),
                "{} should be rejected",
                endpoint
            );
        }
    }

    #[test]
    fn test_empty_name_rejected() {
        let err = load(
            r#"[{"ignore": []}, {"name": "  ", "test": "reqwest", "args": {"testEndpoint": "https://example.test/"}}]"#,
        )
        .unwrap_err();
        assert!(matches!(err, DiagError::MissingName { index: 1 }));
    }

    #[test]
    fn test_metadata_record_required() {
        assert!(matches!(load("[]"), Err(DiagError::MalformedCatalog(_))));
        assert!(matches!(
            load(r#"[{"name": "a", "test": "reqwest", "args": {"testEndpoint": "https://example.test/"}}]"#),
            Err(DiagError::MalformedCatalog(_))
        ));
        assert!(matches!(load("{"), Err(DiagError::CatalogParse(_))));
    }

    #[test]
    fn test_proxy_url_must_be_boolean() {
        let err = load(
            r#"[{"ignore": []}, {"name": "a", "test": "reqwest", "args": {"testEndpoint": "https://example.test/", "proxyUrl": "http://p:1"}}]"#,
        )
        .unwrap_err();
        assert!(matches!(err, DiagError::MalformedCatalog(_)));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = load(
            r#"[{"ignore": []}, {"name": "a", "test": "reqwest", "args": {"testEndpoint": "https://example.test/", "timeout": 0}}]"#,
        )
        .unwrap_err();
        assert!(matches!(err, DiagError::MalformedCatalog(_)));
    }

    #[test]
    fn test_builtin_catalog_is_valid() {
        let catalog = Catalog::builtin(&AdapterRegistry::builtin()).unwrap();
        assert!(!catalog.cases.is_empty());
        assert!(catalog.cases.iter().any(|c| !c.use_proxy));
    }

    #[test]
    fn test_load_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"ignore": []}}, {{"name": "a", "test": "reqwest", "args": {{"testEndpoint": "https://example.test/"}}}}]"#
        )
        .unwrap();
        let catalog = load_from_path(file.path(), &AdapterRegistry::builtin()).unwrap();
        assert_eq!(catalog.cases.len(), 1);

        let missing = load_from_path("/nonexistent/catalog.json", &AdapterRegistry::builtin());
        assert!(matches!(missing, Err(DiagError::CatalogRead { .. })));
    }
}
