use crate::core::config::{DEFAULT_SOURCE_NAME, DEFAULT_WINDOW_MS};
use crate::core::{FeeAttributionPolicy, OutputOrdering, ReconcileConfig};
use crate::io::ReaderConfig;
use crate::strategy::BatchConfig;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Reconcile exchange ledger statements into sent/received transactions
#[derive(Parser, Debug)]
#[command(name = "ledger-reconciler")]
#[command(
    about = "Reconcile exchange ledger statements into sent/received transactions",
    long_about = None
)]
pub struct CliArgs {
    /// Input statement CSV files, one ledger each
    #[arg(value_name = "INPUT", required = true, help = "Paths to the input statement CSV files")]
    pub inputs: Vec<PathBuf>,

    /// Processing strategy
    #[arg(
        long = "strategy",
        value_name = "STRATEGY",
        default_value = "async",
        help = "Processing strategy: 'sync' for sequential or 'async' for concurrent statements"
    )]
    pub strategy: StrategyType,

    /// Rows per read (async mode only)
    #[arg(
        long = "batch-size",
        value_name = "SIZE",
        help = "Rows pulled from a statement per read (default: 1000)"
    )]
    pub batch_size: Option<usize>,

    /// Maximum number of statements in flight (async mode only)
    #[arg(
        long = "max-concurrent",
        value_name = "COUNT",
        help = "Maximum number of statements processed concurrently (default: CPU cores)"
    )]
    pub max_concurrent: Option<usize>,

    /// Output file
    #[arg(
        long = "output",
        short = 'o',
        value_name = "PATH",
        help = "Write the export to PATH instead of stdout"
    )]
    pub output: Option<PathBuf>,

    /// Exchange name used in descriptions
    #[arg(long = "source-name", value_name = "NAME", default_value = DEFAULT_SOURCE_NAME)]
    pub source_name: String,

    /// Pairing window for execution legs, in milliseconds
    #[arg(long = "pairing-window-ms", value_name = "MS", default_value_t = DEFAULT_WINDOW_MS)]
    pub pairing_window_ms: i64,

    /// Fee attribution window, in milliseconds
    #[arg(long = "fee-window-ms", value_name = "MS", default_value_t = DEFAULT_WINDOW_MS)]
    pub fee_window_ms: i64,

    /// Fee attribution policy
    #[arg(long = "fee-policy", value_name = "POLICY", default_value = "shared")]
    pub fee_policy: FeePolicyArg,

    /// Output ordering
    #[arg(long = "ordering", value_name = "ORDERING", default_value = "blocks")]
    pub ordering: OrderingArg,

    /// chrono format of the timestamp column, overrides detection
    #[arg(long = "date-format", value_name = "FORMAT")]
    pub date_format: Option<String>,

    /// Field delimiter, overrides sniffing
    #[arg(long = "delimiter", value_name = "CHAR", value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,

    /// Log level used when RUST_LOG is unset
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "warn")]
    pub log_level: String,
}

/// Available processing strategies
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StrategyType {
    Sync,
    Async,
}

/// `--fee-policy` values
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum FeePolicyArg {
    /// A fee may be attributed to several withdrawals
    Shared,
    /// A fee is claimed by the first matching withdrawal only
    Exclusive,
}

impl From<FeePolicyArg> for FeeAttributionPolicy {
    fn from(arg: FeePolicyArg) -> Self {
        match arg {
            FeePolicyArg::Shared => FeeAttributionPolicy::Shared,
            FeePolicyArg::Exclusive => FeeAttributionPolicy::Exclusive,
        }
    }
}

/// `--ordering` values
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OrderingArg {
    /// Deposits, withdrawals, then trades
    Blocks,
    /// Everything by timestamp
    Chronological,
}

impl From<OrderingArg> for OutputOrdering {
    fn from(arg: OrderingArg) -> Self {
        match arg {
            OrderingArg::Blocks => OutputOrdering::Blocks,
            OrderingArg::Chronological => OutputOrdering::Chronological,
        }
    }
}

/// Accept a single ASCII character, or `tab` / `\t`
fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\\t" | "\t" => Ok(b'\t'),
        _ => match value.as_bytes() {
            [byte] if byte.is_ascii() => Ok(*byte),
            _ => Err(format!(
                "delimiter must be a single ASCII character, got '{}'",
                value
            )),
        },
    }
}

impl CliArgs {
    /// Engine configuration from CLI arguments
    pub fn to_reconcile_config(&self) -> ReconcileConfig {
        ReconcileConfig::new(
            self.pairing_window_ms,
            self.fee_window_ms,
            self.fee_policy.into(),
            self.ordering.into(),
            self.source_name.clone(),
        )
    }

    /// Reader configuration from CLI arguments
    pub fn to_reader_config(&self) -> ReaderConfig {
        ReaderConfig {
            date_format: self.date_format.clone(),
            delimiter: self.delimiter,
            ..ReaderConfig::default()
        }
    }

    /// Create a BatchConfig from CLI arguments
    ///
    /// Missing values use the defaults; zero values fall back to the
    /// defaults with a warning.
    pub fn to_batch_config(&self) -> BatchConfig {
        if self.batch_size.is_some() || self.max_concurrent.is_some() {
            let default = BatchConfig::default();
            BatchConfig::new(
                self.batch_size.unwrap_or(default.batch_size),
                self.max_concurrent.unwrap_or(default.max_concurrent),
            )
        } else {
            BatchConfig::default()
        }
    }
}
