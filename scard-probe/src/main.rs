//! `scard-probe`: dump what the PC/SC service knows about every attached
//! reader, once with caller-managed buffers and once with provider-managed
//! ones.
//!
//! Output goes through `tracing`; set `RUST_LOG` to change the level
//! (default `info`). Set `SCARD_PROBE_POLL_ITERATIONS` to also wait for
//! reader state changes after each pass.

use scard_probe::{probe, Allocation, Config, Native, ReaderOutcome};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stdout)
        .init();
}

fn main() {
    setup_logging();

    let config = Config::from_env();
    for allocation in [Allocation::CallerManaged, Allocation::ProviderManaged] {
        info!(strategy = %allocation, "starting pass");
        match probe(Native, config.clone().with_allocation(allocation)) {
            Ok(report) => {
                let failed = report
                    .readers
                    .iter()
                    .filter(|reader| matches!(reader.outcome, ReaderOutcome::Failed(_)))
                    .count();
                info!(
                    strategy = %allocation,
                    valid = report.valid,
                    readers = report.readers.len(),
                    failed,
                    poll = ?report.poll,
                    "pass finished"
                );
            }
            Err(err) => {
                // Without a context or a reader list the other pass would
                // fail the same way.
                error!(strategy = %allocation, status = ?err.status(), %err, "pass aborted");
                break;
            }
        }
    }
}
