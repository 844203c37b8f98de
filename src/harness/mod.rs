//! Sequential execution of a catalog.
//!
//! Cases run one at a time in declaration order. For each case the harness
//! resolves the proxy, invokes the adapter and appends its result; once the
//! catalog is exhausted it computes the [`AggregateOutcome`].

mod config;

#[cfg(feature = "progress_bar")]
use std::{
    fmt::{Display, Formatter},
    sync::atomic::{AtomicUsize, Ordering},
};

pub use config::{Config, UnresolvedPolicy};
use serde::Serialize;
#[cfg(feature = "progress_bar")]
use status_line::StatusLine;
use tokio::time;

use reqwest::Url;
use serde_json::Map;

use crate::{
    adapters::{Adapter, AdapterConfig, ReqwestAdapter},
    catalog::{Catalog, TestCaseDeclaration},
    error::{AdapterFault, DiagError, Result},
    models::{AggregateOutcome, CaseStatus, TestResult},
    proxy::models::ResolvedProxy,
    resolver::{EnvSource, ProxyResolver, SystemEnv},
};

/// Everything a finished run hands to the reporter.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub results: Vec<TestResult>,
    pub skipped: Vec<String>,
    pub outcome: AggregateOutcome,
}

enum Phase<'a> {
    Resolving(usize),
    Invoking {
        index: usize,
        case: &'a TestCaseDeclaration,
        proxy: ResolvedProxy,
    },
    Reporting,
}

#[cfg(feature = "progress_bar")]
struct Progress {
    current: AtomicUsize,
    names: Vec<String>,
}

#[cfg(feature = "progress_bar")]
impl Display for Progress {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let index = self.current.load(Ordering::Relaxed);
        write!(
            f,
            "running test {}/{}: {}",
            index + 1,
            self.names.len(),
            self.names.get(index).map(String::as_str).unwrap_or("")
        )
    }
}

/// Drives a catalog through resolution and adapter invocation.
pub struct Harness<E = SystemEnv> {
    resolver: ProxyResolver<E>,
    config: Config,
    show_progress: bool,
}

impl Harness<SystemEnv> {
    /// A harness reading proxy settings from the process environment.
    pub fn from_env(config: Config) -> Self {
        Self::new(ProxyResolver::from_env(), config)
    }
}

impl<E: EnvSource> Harness<E> {
    pub fn new(resolver: ProxyResolver<E>, config: Config) -> Self {
        Self {
            resolver,
            config,
            show_progress: false,
        }
    }

    /// Shows a status line on stderr while cases run.
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn resolver(&self) -> &ProxyResolver<E> {
        &self.resolver
    }

    fn adapter_config(&self, case: &TestCaseDeclaration, proxy: ResolvedProxy) -> AdapterConfig {
        AdapterConfig {
            proxy,
            endpoint: case.endpoint.clone(),
            timeout: case.timeout.unwrap_or(self.config.request_timeout),
            user_agent: case
                .user_agent
                .clone()
                .unwrap_or_else(|| format!("{}/{}", self.config.user_agent, case.adapter.name())),
            verbose: self.config.verbose,
            options: case.options.clone(),
        }
    }

    /// Checks that at least one proxy from `HTTPS_PROXY`/`HTTP_PROXY` answers
    /// a plain GET to `endpoint` before any case runs.
    ///
    /// Returns one result per distinct proxy. Fails with
    /// [`DiagError::ProxyUnreachable`] when no proxy is configured or none of
    /// them answers successfully.
    pub async fn check_reachability(&self, endpoint: &Url) -> Result<Vec<TestResult>> {
        let proxies = self.resolver.proxies();
        if proxies.is_empty() {
            return Err(DiagError::ProxyUnreachable(
                "no proxy configured; set HTTPS_PROXY or HTTP_PROXY".into(),
            ));
        }

        let adapter = ReqwestAdapter;
        let mut checks = Vec::with_capacity(proxies.len());
        for (name, url) in proxies {
            let config = AdapterConfig {
                proxy: ResolvedProxy::Via(url),
                endpoint: endpoint.clone(),
                timeout: self.config.request_timeout,
                user_agent: format!("{}/reachability", self.config.user_agent),
                verbose: self.config.verbose,
                options: Map::new(),
            };
            let result = adapter
                .run(&config)
                .await
                .map_err(|source| DiagError::Adapter {
                    case: name.to_string(),
                    source,
                })?;
            #[cfg(feature = "log")]
            log::info!(
                "{}: proxy {} is {}",
                name,
                result.proxy,
                if result.success() { "reachable" } else { "not reachable" }
            );
            checks.push(result.with_name(name));
        }

        if checks.iter().any(TestResult::success) {
            return Ok(checks);
        }
        let reasons: Vec<String> = checks
            .iter()
            .map(|check| match &check.status {
                CaseStatus::Failed { error, .. } => format!("{} ({})", check.proxy, error),
                CaseStatus::Passed { .. } => check.proxy.to_string(),
            })
            .collect();
        Err(DiagError::ProxyUnreachable(reasons.join("; ")))
    }

    /// Runs every enabled case of `catalog` in order.
    ///
    /// Fails without a report when a required proxy cannot be resolved (under
    /// [`UnresolvedPolicy::FailFast`]) or when an adapter raises a fault; no
    /// later case is executed in either situation.
    pub async fn run(&self, catalog: &Catalog) -> Result<RunReport> {
        let mut results = Vec::with_capacity(catalog.cases.len());
        let mut skipped = Vec::new();

        #[cfg(feature = "progress_bar")]
        let progress = self.show_progress.then(|| {
            StatusLine::new(Progress {
                current: AtomicUsize::new(0),
                names: catalog.cases.iter().map(|c| c.name.clone()).collect(),
            })
        });

        let mut phase = Phase::Resolving(0);
        loop {
            phase = match phase {
                Phase::Resolving(index) => match catalog.cases.get(index) {
                    None => Phase::Reporting,
                    Some(case) if catalog.is_skipped(case) => {
                        #[cfg(feature = "log")]
                        log::info!("{}: skipped", case.name);
                        skipped.push(case.name.clone());
                        Phase::Resolving(index + 1)
                    }
                    Some(case) if !case.use_proxy => Phase::Invoking {
                        index,
                        case,
                        proxy: ResolvedProxy::Direct,
                    },
                    Some(case) => match self.resolver.resolve(&case.endpoint) {
                        ResolvedProxy::Direct => match self.config.unresolved {
                            UnresolvedPolicy::FailFast => {
                                return Err(DiagError::ProxyUnresolved {
                                    case: case.name.clone(),
                                    endpoint: case.endpoint.to_string(),
                                })
                            }
                            UnresolvedPolicy::Continue => {
                                #[cfg(feature = "log")]
                                log::warn!("{}: no proxy found for {}", case.name, case.endpoint);
                                results.push(
                                    TestResult::failed(
                                        case.adapter.method(false),
                                        format!("no proxy found for the test endpoint {}", case.endpoint),
                                        &ResolvedProxy::Direct,
                                        &case.endpoint,
                                    )
                                    .with_name(&case.name),
                                );
                                Phase::Resolving(index + 1)
                            }
                        },
                        proxy => Phase::Invoking { index, case, proxy },
                    },
                },
                Phase::Invoking { index, case, proxy } => {
                    #[cfg(feature = "progress_bar")]
                    if let Some(progress) = &progress {
                        progress.current.store(index, Ordering::Relaxed);
                    }
                    #[cfg(feature = "log")]
                    log::debug!("{}: running {} via {}", case.name, case.adapter.name(), proxy);

                    let config = self.adapter_config(case, proxy);
                    let start_time = time::Instant::now();
                    let result = case
                        .adapter
                        .run(&config)
                        .await
                        .map_err(|source| DiagError::Adapter {
                            case: case.name.clone(),
                            source,
                        })?;

                    if result.proxy != config.proxy {
                        return Err(DiagError::Adapter {
                            case: case.name.clone(),
                            source: AdapterFault::ContractViolation(format!(
                                "reported proxy '{}' but was configured with '{}'",
                                result.proxy, config.proxy
                            )),
                        });
                    }

                    #[cfg(feature = "log")]
                    log::info!(
                        "{}: {} in {:?}",
                        case.name,
                        if result.success() { "passed" } else { "failed" },
                        start_time.elapsed()
                    );
                    results.push(
                        result
                            .with_name(&case.name)
                            .with_elapsed(start_time.elapsed()),
                    );
                    Phase::Resolving(index + 1)
                }
                Phase::Reporting => break,
            };
        }

        let outcome = AggregateOutcome::from_results(&results);
        Ok(RunReport {
            results,
            skipped,
            outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
    };

    use async_trait::async_trait;

    use super::*;
    use crate::{
        catalog::RunMetadata,
        models::Verdict,
        report::{exit_code, EXIT_FAILURE, EXIT_SUCCESS},
    };

    #[derive(Clone, Copy)]
    enum Behavior {
        Pass,
        Fail,
        Fault,
        /// Ignores the configured proxy and reports a direct connection.
        WrongProxy,
    }

    struct FakeAdapter {
        behavior: Behavior,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Adapter for FakeAdapter {
        fn name(&self) -> &'static str {
            "fake"
        }

        fn method(&self, proxied: bool) -> String {
            if proxied {
                "fake + proxy".into()
            } else {
                "fake (no proxy)".into()
            }
        }

        async fn run(&self, config: &AdapterConfig) -> std::result::Result<TestResult, AdapterFault> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let method = self.method(!config.proxy.is_direct());
            match self.behavior {
                Behavior::Pass => Ok(TestResult::passed(
                    method,
                    &config.user_agent,
                    &config.proxy,
                    &config.endpoint,
                )),
                Behavior::Fail => Ok(TestResult::failed(
                    method,
                    "connection refused",
                    &config.proxy,
                    &config.endpoint,
                )),
                Behavior::Fault => Err(AdapterFault::InvalidOption {
                    option: "expectedStatus".into(),
                    reason: "must not be 2xx".into(),
                }),
                Behavior::WrongProxy => Ok(TestResult::passed(
                    method,
                    200,
                    &ResolvedProxy::Direct,
                    &config.endpoint,
                )),
            }
        }
    }

    struct Case {
        name: &'static str,
        behavior: Behavior,
        use_proxy: bool,
        calls: Arc<AtomicUsize>,
    }

    fn case(name: &'static str, behavior: Behavior, use_proxy: bool) -> Case {
        Case {
            name,
            behavior,
            use_proxy,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn catalog(cases: &[&Case], ignore: &[&str]) -> Catalog {
        Catalog {
            metadata: RunMetadata {
                ignore: ignore.iter().map(|s| s.to_string()).collect(),
            },
            cases: cases
                .iter()
                .map(|c| TestCaseDeclaration {
                    name: c.name.to_string(),
                    adapter: Arc::new(FakeAdapter {
                        behavior: c.behavior,
                        calls: c.calls.clone(),
                    }),
                    endpoint: Url::parse("https://example.test/ping").unwrap(),
                    use_proxy: c.use_proxy,
                    disabled: false,
                    timeout: None,
                    user_agent: None,
                    options: Map::new(),
                })
                .collect(),
        }
    }

    fn harness(env: &[(&'static str, &'static str)], config: Config) -> Harness<HashMap<&'static str, &'static str>> {
        Harness::new(ProxyResolver::new(env.iter().copied().collect()), config)
    }

    const PROXY_ENV: &[(&str, &str)] = &[("HTTPS_PROXY", "http://proxy.local:8080")];

    #[tokio::test]
    async fn test_all_pass_in_order() {
        let (a, b) = (case("direct", Behavior::Pass, false), case("viaProxy", Behavior::Pass, true));
        let report = harness(PROXY_ENV, Config::default())
            .run(&catalog(&[&a, &b], &[]))
            .await
            .unwrap();

        let names: Vec<_> = report.results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["direct", "viaProxy"]);
        assert_eq!(report.outcome.verdict, Verdict::AllPass);
        assert_eq!(exit_code(&report.outcome), EXIT_SUCCESS);
    }

    #[tokio::test]
    async fn test_direct_case_ignores_environment() {
        let a = case("direct", Behavior::Pass, false);
        let report = harness(PROXY_ENV, Config::default())
            .run(&catalog(&[&a], &[]))
            .await
            .unwrap();
        assert_eq!(report.results[0].proxy, ResolvedProxy::Direct);
        assert_eq!(report.results[0].proxy.to_string(), "none");
        assert_eq!(report.results[0].method, "fake (no proxy)");
    }

    #[tokio::test]
    async fn test_proxy_case_gets_resolved_proxy() {
        let a = case("viaProxy", Behavior::Pass, true);
        let report = harness(PROXY_ENV, Config::default())
            .run(&catalog(&[&a], &[]))
            .await
            .unwrap();
        assert_eq!(
            report.results[0].proxy,
            ResolvedProxy::Via("http://proxy.local:8080".into())
        );
        assert_eq!(report.results[0].method, "fake + proxy");
    }

    #[tokio::test]
    async fn test_user_agent_names_adapter() {
        let a = case("direct", Behavior::Pass, false);
        let config = Config {
            user_agent: "diag/1.0".into(),
            ..Default::default()
        };
        let report = harness(&[], config).run(&catalog(&[&a], &[])).await.unwrap();
        assert!(matches!(
            &report.results[0].status,
            crate::models::CaseStatus::Passed { status } if status == "diag/1.0/fake"
        ));
    }

    #[tokio::test]
    async fn test_runs_are_repeatable() {
        let (a, b) = (case("a", Behavior::Pass, true), case("b", Behavior::Fail, false));
        let harness = harness(PROXY_ENV, Config::default());
        let catalog = catalog(&[&a, &b], &[]);

        let first = harness.run(&catalog).await.unwrap();
        let second = harness.run(&catalog).await.unwrap();
        assert_eq!(first.outcome, second.outcome);
        assert_eq!(first.outcome.verdict, Verdict::Partial);
        assert_eq!(a.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_all_ignored_runs_nothing() {
        let (a, b) = (case("a", Behavior::Pass, true), case("b", Behavior::Pass, false));
        let report = harness(PROXY_ENV, Config::default())
            .run(&catalog(&[&a, &b], &["a", "b"]))
            .await
            .unwrap();

        assert!(report.results.is_empty());
        assert_eq!(report.skipped, vec!["a", "b"]);
        assert_eq!(report.outcome.verdict, Verdict::NoTestsRun);
        assert_eq!(exit_code(&report.outcome), EXIT_FAILURE);
        assert_eq!(a.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_disabled_case_is_skipped() {
        let (a, b, c) = (
            case("a", Behavior::Pass, false),
            case("off", Behavior::Pass, false),
            case("c", Behavior::Pass, false),
        );
        let mut catalog = catalog(&[&a, &b, &c], &[]);
        catalog.cases[1].disabled = true;

        let report = harness(&[], Config::default()).run(&catalog).await.unwrap();
        let names: Vec<_> = report.results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
        assert_eq!(report.skipped, vec!["off"]);
        assert_eq!(report.outcome.verdict, Verdict::AllPass);
        assert_eq!(b.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unresolved_proxy_fails_fast() {
        let a = case("direct", Behavior::Pass, false);
        let b = case("viaProxy", Behavior::Pass, true);
        let c = case("later", Behavior::Pass, false);
        let err = harness(&[], Config::default())
            .run(&catalog(&[&a, &b, &c], &[]))
            .await
            .unwrap_err();

        match err {
            DiagError::ProxyUnresolved { case, endpoint } => {
                assert_eq!(case, "viaProxy");
                assert_eq!(endpoint, "https://example.test/ping");
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(a.calls.load(Ordering::SeqCst), 1);
        assert_eq!(b.calls.load(Ordering::SeqCst), 0);
        assert_eq!(c.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unresolved_proxy_with_continue_policy() {
        let a = case("viaProxy", Behavior::Pass, true);
        let b = case("direct", Behavior::Pass, false);
        let config = Config {
            unresolved: UnresolvedPolicy::Continue,
            ..Default::default()
        };
        let report = harness(&[("NO_PROXY", "example.test"), ("HTTPS_PROXY", "http://p:1")], config)
            .run(&catalog(&[&a, &b], &[]))
            .await
            .unwrap();

        assert_eq!(report.results.len(), 2);
        assert!(!report.results[0].success());
        assert_eq!(report.results[0].proxy, ResolvedProxy::Direct);
        assert_eq!(report.results[0].method, "fake (no proxy)");
        assert!(report.results[1].success());
        assert_eq!(report.outcome.verdict, Verdict::Partial);
        assert_eq!(a.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_adapter_fault_aborts_run() {
        let a = case("broken", Behavior::Fault, false);
        let b = case("later", Behavior::Pass, false);
        let err = harness(&[], Config::default())
            .run(&catalog(&[&a, &b], &[]))
            .await
            .unwrap_err();
        assert!(matches!(err, DiagError::Adapter { ref case, .. } if case.as_str() == "broken"));
        assert_eq!(b.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_misreported_proxy_is_a_fault() {
        let a = case("viaProxy", Behavior::WrongProxy, true);
        let err = harness(PROXY_ENV, Config::default())
            .run(&catalog(&[&a], &[]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DiagError::Adapter {
                source: AdapterFault::ContractViolation(_),
                ..
            }
        ));
    }
}
