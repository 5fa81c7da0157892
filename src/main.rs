//! Ledger Reconciler CLI
//!
//! Command-line interface for turning exchange ledger statements into a
//! sent/received transaction export.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- statement.csv > koinly.csv
//! cargo run -- --strategy sync statement.csv > koinly.csv
//! cargo run -- --output koinly.csv 2023.csv 2024.csv
//! cargo run -- --fee-policy exclusive --ordering chronological statement.csv
//! ```
//!
//! # Processing Strategies
//!
//! - **sync**: Statements are read and reconciled one after the other
//! - **async**: Statements are read and reconciled concurrently (default)
//!
//! # Exit Codes
//!
//! - 0: Success, including runs that dropped rows or left legs unmatched
//! - 1: Error (missing file, missing required column, I/O failure, etc.)

use ledger_reconciler::cli::{self, CliArgs};
use ledger_reconciler::logging;
use ledger_reconciler::strategy;
use ledger_reconciler::types::{ReconcileError, RunDiagnostics};
use std::io::Write;
use std::process;

fn main() {
    let args = cli::parse_args();

    if let Err(e) = logging::init_logging(&args.log_level) {
        eprintln!("Warning: logging disabled: {}", e);
    }

    match run(&args) {
        Ok(diagnostics) => report(&diagnostics),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn run(args: &CliArgs) -> Result<RunDiagnostics, ReconcileError> {
    let batch_config = if matches!(args.strategy, cli::StrategyType::Async) {
        Some(args.to_batch_config())
    } else {
        None
    };
    let strategy = strategy::create_strategy(
        args.strategy,
        args.to_reconcile_config(),
        args.to_reader_config(),
        batch_config,
    );

    // Nothing reaches the destination unless every statement succeeded.
    let mut rendered = Vec::new();
    let diagnostics = strategy.process(&args.inputs, &mut rendered)?;

    match &args.output {
        Some(path) => std::fs::write(path, &rendered).map_err(ReconcileError::output)?,
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&rendered).map_err(ReconcileError::output)?;
            stdout.flush().map_err(ReconcileError::output)?;
        }
    }

    Ok(diagnostics)
}

fn report(diagnostics: &RunDiagnostics) {
    if !diagnostics.has_warnings() {
        return;
    }

    tracing::warn!(
        "Completed with warnings: {} invalid timestamp(s), {} invalid quantity(ies), \
         {} unrecognized entr(ies), {} unmatched execution(s), {} unattributed fee(s), \
         {} shared fee attribution(s)",
        diagnostics.invalid_timestamps,
        diagnostics.invalid_quantities,
        diagnostics.unrecognized.len(),
        diagnostics.unmatched_executions.len(),
        diagnostics.unattributed_fees,
        diagnostics.shared_fee_attributions
    );
}
