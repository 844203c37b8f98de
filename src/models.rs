use std::{
    fmt::Display,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use serde::{ser::SerializeStruct, Serialize, Serializer};

use crate::proxy::models::ResolvedProxy;

/// How a single test case ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseStatus {
    /// The connection worked; carries the transport status, e.g. `200`.
    Passed { status: String },
    /// The connection failed; `detail` holds the full error chain when known.
    Failed {
        error: String,
        detail: Option<String>,
    },
}

/// Result of one adapter invocation.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Name of the catalog entry that produced this result.
    pub name: String,
    /// Label of the strategy used, e.g. `reqwest + proxy`.
    pub method: String,
    pub status: CaseStatus,
    /// Proxy actually used for the request.
    pub proxy: ResolvedProxy,
    pub endpoint: String,
    /// Time the result was produced, in milliseconds since the unix epoch.
    pub finished_at: u64,
    pub elapsed: Duration,
}

impl TestResult {
    fn new(
        method: impl Into<String>,
        status: CaseStatus,
        proxy: &ResolvedProxy,
        endpoint: impl Display,
    ) -> Self {
        Self {
            name: String::new(),
            method: method.into(),
            status,
            proxy: proxy.clone(),
            endpoint: endpoint.to_string(),
            finished_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or_default(),
            elapsed: Duration::ZERO,
        }
    }

    pub fn passed(
        method: impl Into<String>,
        status: impl Display,
        proxy: &ResolvedProxy,
        endpoint: impl Display,
    ) -> Self {
        Self::new(
            method,
            CaseStatus::Passed {
                status: status.to_string(),
            },
            proxy,
            endpoint,
        )
    }

    pub fn failed(
        method: impl Into<String>,
        error: impl Display,
        proxy: &ResolvedProxy,
        endpoint: impl Display,
    ) -> Self {
        Self::new(
            method,
            CaseStatus::Failed {
                error: error.to_string(),
                detail: None,
            },
            proxy,
            endpoint,
        )
    }

    /// Builds a failed result from an error, keeping its full chain as detail.
    pub fn from_error(
        method: impl Into<String>,
        error: &anyhow::Error,
        proxy: &ResolvedProxy,
        endpoint: impl Display,
    ) -> Self {
        Self::new(
            method,
            CaseStatus::Failed {
                error: format!("{:#}", error),
                detail: Some(format!("{:?}", error)),
            },
            proxy,
            endpoint,
        )
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    pub fn success(&self) -> bool {
        matches!(self.status, CaseStatus::Passed { .. })
    }
}

impl Serialize for TestResult {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("TestResult", 8)?;
        state.serialize_field("name", &self.name)?;
        state.serialize_field("success", &self.success())?;
        state.serialize_field("method", &self.method)?;
        match &self.status {
            CaseStatus::Passed { status } => state.serialize_field("status", status)?,
            CaseStatus::Failed { error, .. } => state.serialize_field("error", error)?,
        }
        state.serialize_field("proxy", &self.proxy)?;
        state.serialize_field("endpoint", &self.endpoint)?;
        state.serialize_field("responseTime", &self.finished_at)?;
        state.serialize_field("elapsedMs", &(self.elapsed.as_millis() as u64))?;
        state.end()
    }
}

/// Overall classification of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    AllPass,
    Partial,
    AllFail,
    NoTestsRun,
}

impl Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AllPass => write!(f, "ALL_PASS"),
            Self::Partial => write!(f, "PARTIAL"),
            Self::AllFail => write!(f, "ALL_FAIL"),
            Self::NoTestsRun => write!(f, "NO_TESTS_RUN"),
        }
    }
}

/// Aggregate over the ordered results of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateOutcome {
    pub success_count: usize,
    pub total_count: usize,
    pub verdict: Verdict,
}

impl AggregateOutcome {
    pub fn from_results(results: &[TestResult]) -> Self {
        let success_count = results.iter().filter(|r| r.success()).count();
        let total_count = results.len();
        let verdict = match (success_count, total_count) {
            (_, 0) => Verdict::NoTestsRun,
            (0, _) => Verdict::AllFail,
            (s, t) if s == t => Verdict::AllPass,
            _ => Verdict::Partial,
        };
        Self {
            success_count,
            total_count,
            verdict,
        }
    }

    /// Success percentage, `None` when nothing ran.
    pub fn success_rate(&self) -> Option<f64> {
        if self.total_count == 0 {
            return None;
        }
        Some(self.success_count as f64 / self.total_count as f64 * 100.0)
    }

    pub fn is_success(&self) -> bool {
        self.verdict == Verdict::AllPass
    }
}
