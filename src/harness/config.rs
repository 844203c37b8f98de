use std::time::Duration;

/// What to do when a case needs a proxy but none resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnresolvedPolicy {
    /// Abort the run at the first unresolved case.
    #[default]
    FailFast,
    /// Record a failed result for the case and keep going.
    Continue,
}

/// Options for configuring a diagnostic run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Default per-case timeout; catalog entries may override it.
    pub request_timeout: Duration,
    /// Base user agent; each adapter appends `/<adapter name>`.
    pub user_agent: String,
    /// Keep full error detail in results and adapter logs.
    pub verbose: bool,
    pub unresolved: UnresolvedPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            user_agent: format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            verbose: false,
            unresolved: UnresolvedPolicy::FailFast,
        }
    }
}
