use super::{kinds_or_all, parse_kind, print_outcomes};
use clap::Args;
use ipsnap::{DatasetKind, IpsnapDatabase, Orchestrator, OutputFormat};

/// Arguments for the Restore command
#[derive(Args)]
pub struct RestoreArgs {
    /// Dataset to restore; all when omitted
    ///
    /// Restoring twice swaps current and backup back again.
    #[clap(short, long, value_parser = parse_kind)]
    pub kind: Vec<DatasetKind>,
}

pub fn run(db: &IpsnapDatabase, args: RestoreArgs, format: OutputFormat) -> bool {
    let outcomes = Orchestrator::new(db).restore(&kinds_or_all(&args.kind));
    print_outcomes(&outcomes, format)
}
