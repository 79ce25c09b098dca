use super::{kinds_or_all, parse_kind, print_outcomes};
use clap::Args;
use ipsnap::{DatasetKind, IpsnapDatabase, Orchestrator, OutputFormat};

/// Arguments for the Setup command
#[derive(Args)]
pub struct SetupArgs {
    /// Dataset to set up, e.g. "location-v4" or "DB5LITE"; all when omitted
    #[clap(short, long, value_parser = parse_kind)]
    pub kind: Vec<DatasetKind>,
}

pub fn run(db: &IpsnapDatabase, args: SetupArgs, format: OutputFormat) -> bool {
    let outcomes = Orchestrator::new(db).setup(&kinds_or_all(&args.kind));
    print_outcomes(&outcomes, format)
}
