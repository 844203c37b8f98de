use std::io::{self, Write};

#[cfg(feature = "progress_bar")]
use colored::Colorize;
use serde::Serialize;

use crate::{
    error::DiagError,
    harness::RunReport,
    models::{AggregateOutcome, CaseStatus, TestResult, Verdict},
};

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;

/// Output format for the results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    Text,
    Json,
}

/// Effective proxy variables, as shown in the report header.
pub type Environment = [(&'static str, Option<String>)];

#[derive(Serialize)]
struct JsonReport<'a> {
    environment: serde_json::Map<String, serde_json::Value>,
    #[serde(flatten)]
    report: &'a RunReport,
    message: &'static str,
}

#[cfg(feature = "progress_bar")]
mod paint {
    use colored::Colorize;

    pub fn ok(s: &str) -> String {
        s.green().to_string()
    }
    pub fn bad(s: &str) -> String {
        s.red().to_string()
    }
    pub fn warn(s: &str) -> String {
        s.yellow().to_string()
    }
}

#[cfg(not(feature = "progress_bar"))]
mod paint {
    pub fn ok(s: &str) -> String {
        s.to_string()
    }
    pub fn bad(s: &str) -> String {
        s.to_string()
    }
    pub fn warn(s: &str) -> String {
        s.to_string()
    }
}

/// Human-readable verdict line; each verdict gets its own wording.
pub fn verdict_message(verdict: Verdict) -> &'static str {
    match verdict {
        Verdict::AllPass => "All tests passed! Proxy configuration is working correctly.",
        Verdict::Partial => "Some tests failed. Check the error messages above.",
        Verdict::AllFail => {
            "All tests failed. Check your proxy configuration and network connectivity."
        }
        Verdict::NoTestsRun => {
            "No tests were run. An empty run proves nothing about proxy health; check the catalog's ignore list."
        }
    }
}

/// Maps an outcome to the process exit status.
pub fn exit_code(outcome: &AggregateOutcome) -> u8 {
    if outcome.is_success() {
        EXIT_SUCCESS
    } else {
        EXIT_FAILURE
    }
}

/// Renders run reports and fatal errors.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reporter {
    format: Format,
    verbose: bool,
}

impl Reporter {
    pub fn new(format: Format, verbose: bool) -> Self {
        Self { format, verbose }
    }

    /// Renders `report` and returns the exit status for its outcome.
    pub fn report<W: Write>(
        &self,
        out: &mut W,
        report: &RunReport,
        environment: &Environment,
    ) -> io::Result<u8> {
        match self.format {
            Format::Text => self.render_text(out, report, environment)?,
            Format::Json => self.render_json(out, report, environment)?,
        }
        Ok(exit_code(&report.outcome))
    }

    /// Prints the outcome of the proxy reachability check. JSON output only
    /// carries the run report, so this is a no-op there.
    pub fn reachability<W: Write>(&self, out: &mut W, checks: &[TestResult]) -> io::Result<()> {
        if self.format == Format::Json {
            return Ok(());
        }
        writeln!(out, "Proxy Reachability:")?;
        for check in checks {
            match &check.status {
                CaseStatus::Passed { status } => writeln!(
                    out,
                    "   {} {} {} is reachable (status {})",
                    paint::ok("[PASS]"),
                    check.name,
                    check.proxy,
                    status
                )?,
                CaseStatus::Failed { error, .. } => writeln!(
                    out,
                    "   {} {} {} is not reachable: {}",
                    paint::bad("[FAIL]"),
                    check.name,
                    check.proxy,
                    error
                )?,
            }
        }
        writeln!(out)
    }

    /// Prints a fatal error and returns the failure exit status.
    pub fn fatal<W: Write>(&self, out: &mut W, error: &DiagError) -> io::Result<u8> {
        match self.format {
            Format::Text => {
                writeln!(out, "{} {}", paint::bad("Fatal error:"), error)?;
                if self.verbose {
                    let mut source = std::error::Error::source(error);
                    while let Some(cause) = source {
                        writeln!(out, "   caused by: {}", cause)?;
                        source = cause.source();
                    }
                }
            }
            Format::Json => {
                let value = serde_json::json!({ "fatal": error.to_string() });
                serde_json::to_writer_pretty(&mut *out, &value)?;
                writeln!(out)?;
            }
        }
        Ok(EXIT_FAILURE)
    }

    fn render_json<W: Write>(
        &self,
        out: &mut W,
        report: &RunReport,
        environment: &Environment,
    ) -> io::Result<()> {
        let environment = environment
            .iter()
            .map(|(name, value)| {
                let value = value.clone().map_or(serde_json::Value::Null, Into::into);
                (name.to_string(), value)
            })
            .collect();
        let json = JsonReport {
            environment,
            report,
            message: verdict_message(report.outcome.verdict),
        };
        serde_json::to_writer_pretty(&mut *out, &json)?;
        writeln!(out)
    }

    fn render_text<W: Write>(
        &self,
        out: &mut W,
        report: &RunReport,
        environment: &Environment,
    ) -> io::Result<()> {
        writeln!(out, "Environment Variables:")?;
        for (name, value) in environment {
            writeln!(out, "   {}: {}", name, value.as_deref().unwrap_or("not set"))?;
        }
        writeln!(out)?;

        for name in &report.skipped {
            writeln!(out, "{} {}", paint::warn("skipped:"), name)?;
        }
        if !report.skipped.is_empty() {
            writeln!(out)?;
        }

        writeln!(out, "Test Results Summary:")?;
        writeln!(out, "{}", "=".repeat(50))?;
        for result in &report.results {
            self.render_result(out, result)?;
        }

        let outcome = &report.outcome;
        match outcome.success_rate() {
            Some(rate) => writeln!(
                out,
                "Overall Success Rate: {}/{} ({:.0}%)",
                outcome.success_count, outcome.total_count, rate
            )?,
            None => writeln!(out, "Overall Success Rate: 0/0 (n/a)")?,
        }

        let message = verdict_message(outcome.verdict);
        let line = match outcome.verdict {
            Verdict::AllPass => paint::ok(message),
            Verdict::Partial => paint::warn(message),
            Verdict::AllFail | Verdict::NoTestsRun => paint::bad(message),
        };
        writeln!(out, "{}", line)
    }

    fn render_result<W: Write>(&self, out: &mut W, result: &TestResult) -> io::Result<()> {
        let marker = if result.success() {
            paint::ok("[PASS]")
        } else {
            paint::bad("[FAIL]")
        };
        #[cfg(feature = "progress_bar")]
        writeln!(out, "{} {} {}", marker, result.name.bold(), result.method)?;
        #[cfg(not(feature = "progress_bar"))]
        writeln!(out, "{} {} {}", marker, result.name, result.method)?;

        if result.proxy.is_direct() {
            writeln!(out, "   Proxy: Direct")?;
        } else {
            writeln!(out, "   Proxy: {}", result.proxy)?;
        }
        match &result.status {
            CaseStatus::Passed { status } => writeln!(out, "   Status: {}", status)?,
            CaseStatus::Failed { error, detail } => {
                writeln!(out, "   Error: {}", error)?;
                if let (true, Some(detail)) = (self.verbose, detail) {
                    for line in detail.lines() {
                        writeln!(out, "      {}", line)?;
                    }
                }
            }
        }
        writeln!(out, "   Endpoint: {}", result.endpoint)?;
        writeln!(out)
    }
}
