pub mod adapters;
pub mod catalog;
pub mod error;
pub mod harness;
pub mod models;
pub mod negotiators;
pub mod proxy;
pub mod report;
pub mod resolver;

pub use adapters::{Adapter, AdapterConfig, AdapterRegistry};
pub use catalog::Catalog;
pub use error::{AdapterFault, DiagError};
pub use harness::{Harness, RunReport};
pub use report::Reporter;
pub use resolver::ProxyResolver;

/// Initializes the logging system for the application.
///
/// # Arguments
///
/// * `log_level`: The desired verbosity level for logging.
#[cfg(feature = "log")]
pub fn initialize_logging(log_level: log::LevelFilter) -> anyhow::Result<()> {
    stderrlog::new()
        .module(module_path!())
        .show_module_names(true)
        .verbosity(log_level)
        .init()?;
    Ok(())
}
