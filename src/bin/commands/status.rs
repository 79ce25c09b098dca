use super::{kinds_or_all, parse_kind, print_rows};
use clap::Args;
use ipsnap::{DatasetKind, IpsnapDatabase, Orchestrator, OutputFormat};

/// Arguments for the Rowcount and Status commands
#[derive(Args)]
pub struct StatusArgs {
    /// Dataset to report; all when omitted
    #[clap(short, long, value_parser = parse_kind)]
    pub kind: Vec<DatasetKind>,
}

pub fn run_rowcount(db: &IpsnapDatabase, args: StatusArgs, format: OutputFormat) -> bool {
    match Orchestrator::new(db).row_counts(&kinds_or_all(&args.kind)) {
        Ok(counts) => print_rows(&counts, format),
        Err(e) => {
            eprintln!("Failed to count rows: {}", e);
            false
        }
    }
}

pub fn run_status(db: &IpsnapDatabase, args: StatusArgs, format: OutputFormat) -> bool {
    let orchestrator = Orchestrator::new(db);
    let status = match orchestrator.status(&kinds_or_all(&args.kind)) {
        Ok(status) => status,
        Err(e) => {
            eprintln!("Failed to read status: {}", e);
            return false;
        }
    };

    if !print_rows(&status, format) {
        return false;
    }
    if !format.is_json() {
        match orchestrator.last_activation() {
            Ok(Some(at)) => println!("Last activation: {}", at),
            Ok(None) => println!("Last activation: never"),
            Err(e) => eprintln!("Failed to read last activation: {}", e),
        }
    }
    true
}
