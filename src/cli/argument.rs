use clap::builder::styling::AnsiColor;
use clap::builder::{PossibleValue, Styles};
use clap::Parser;

fn get_styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Yellow.on_default())
        .usage(AnsiColor::Green.on_default())
        .literal(AnsiColor::BrightGreen.on_default())
        .placeholder(AnsiColor::Cyan.on_default())
}

/// Checks that HTTP clients reach test endpoints through the proxy
/// configured in the environment (HTTPS_PROXY, HTTP_PROXY, NO_PROXY).
#[derive(Parser, Debug, Clone)]
#[command(version, styles = get_styles())]
pub struct Cli {
    /// Print the full error chain of failed tests.
    #[arg(short, long)]
    pub verbose: bool,

    /// Catalog file to run instead of the default one.
    #[arg(short, long)]
    pub catalog: Option<std::path::PathBuf>,

    /// Default per-request timeout in seconds.
    #[arg(long, default_value = "30", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: u64,

    /// Log level for application output.
    #[arg(
        long = "log",
        default_value = "off",
        value_parser([
            PossibleValue::new("debug"),
            PossibleValue::new("info"),
            PossibleValue::new("warn"),
            PossibleValue::new("error"),
            PossibleValue::new("trace"),
            PossibleValue::new("off"),
        ])
    )]
    pub log_level: String,

    /// Output format for the results.
    #[arg(
        short,
        long,
        default_value = "default",
        value_parser([
            PossibleValue::new("default"),
            PossibleValue::new("json"),
        ])
    )]
    pub format: String,

    /// Record a failed result and move on when no proxy is found for a test,
    /// instead of stopping the run.
    #[arg(long)]
    pub keep_going: bool,

    /// Before running the catalog, check that a configured proxy answers a
    /// GET to this URL and stop if none does.
    #[arg(
        long,
        value_name = "URL",
        num_args = 0..=1,
        default_missing_value = "https://httpbin.org/get"
    )]
    pub check_proxy: Option<reqwest::Url>,

    /// Print the available adapters and exit.
    #[arg(long)]
    pub list_adapters: bool,
}
