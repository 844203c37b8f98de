use std::{
    io::{self, Write},
    path::PathBuf,
    process::ExitCode,
    time::Duration,
};

use argument::Cli;
use clap::Parser;
use directories::ProjectDirs;
#[cfg(feature = "log")]
use proxydiag::initialize_logging;
use proxydiag::{
    catalog,
    error::DiagError,
    harness::{Config, UnresolvedPolicy},
    report::{Format, EXIT_FAILURE},
    AdapterRegistry, Catalog, Harness, Reporter,
};
use tokio::runtime;

mod argument;

fn main() -> ExitCode {
    match run_application() {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:?}", e);
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

/// Explicit `--catalog`, then `catalog.json` in the user config dir, then
/// the catalog built into the binary.
fn load_catalog(path: Option<PathBuf>, registry: &AdapterRegistry) -> Result<Catalog, DiagError> {
    if let Some(path) = path {
        return catalog::load_from_path(path, registry);
    }
    if let Some(dirs) = ProjectDirs::from("", "", "proxydiag") {
        let path = dirs.config_dir().join("catalog.json");
        if path.is_file() {
            #[cfg(feature = "log")]
            log::debug!("using catalog {}", path.display());
            return catalog::load_from_path(path, registry);
        }
    }
    Catalog::builtin(registry)
}

fn run_application() -> anyhow::Result<u8> {
    let options = Cli::parse();

    #[cfg(feature = "log")]
    {
        let log_level = match options.log_level.as_str() {
            "debug" => log::LevelFilter::Debug,
            "info" => log::LevelFilter::Info,
            "warn" => log::LevelFilter::Warn,
            "error" => log::LevelFilter::Error,
            "trace" => log::LevelFilter::Trace,
            _ => log::LevelFilter::Off,
        };
        initialize_logging(log_level)?;
    }

    let registry = AdapterRegistry::builtin();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if options.list_adapters {
        for name in registry.names() {
            writeln!(out, "{}", name)?;
        }
        return Ok(0);
    }

    let format = match options.format.as_str() {
        "json" => Format::Json,
        _ => Format::Text,
    };
    let reporter = Reporter::new(format, options.verbose);

    let catalog = match load_catalog(options.catalog, &registry) {
        Ok(catalog) => catalog,
        Err(e) => return Ok(reporter.fatal(&mut out, &e)?),
    };

    let config = Config {
        request_timeout: Duration::from_secs(options.timeout),
        verbose: options.verbose,
        unresolved: if options.keep_going {
            UnresolvedPolicy::Continue
        } else {
            UnresolvedPolicy::FailFast
        },
        ..Default::default()
    };
    let harness = Harness::from_env(config).with_progress(format == Format::Text);

    let runtime = runtime::Builder::new_multi_thread().enable_all().build()?;
    if let Some(endpoint) = &options.check_proxy {
        match runtime.block_on(harness.check_reachability(endpoint)) {
            Ok(checks) => reporter.reachability(&mut out, &checks)?,
            Err(e) => return Ok(reporter.fatal(&mut out, &e)?),
        }
    }

    let code = match runtime.block_on(harness.run(&catalog)) {
        Ok(report) => reporter.report(&mut out, &report, &harness.resolver().environment())?,
        Err(e) => reporter.fatal(&mut out, &e)?,
    };
    Ok(code)
}
