use super::{kinds_or_all, parse_kind, print_outcomes};
use clap::Args;
use ipsnap::{DatasetKind, DirectorySource, IpsnapConfig, IpsnapDatabase, Orchestrator, OutputFormat};
use std::path::PathBuf;

/// Arguments for the Update command
#[derive(Args)]
pub struct UpdateArgs {
    /// Dataset to update; all when omitted
    #[clap(short, long, value_parser = parse_kind)]
    pub kind: Vec<DatasetKind>,

    /// Directory holding the extracted snapshots, overrides `csv_dir`
    #[clap(long)]
    pub csv_dir: Option<PathBuf>,
}

/// Arguments for the Activate command
#[derive(Args)]
pub struct ActivateArgs {
    /// Dataset to activate
    #[clap(value_parser = parse_kind)]
    pub kind: DatasetKind,
}

pub fn run(
    db: &IpsnapDatabase,
    config: &IpsnapConfig,
    args: UpdateArgs,
    format: OutputFormat,
) -> bool {
    let dir = args.csv_dir.unwrap_or_else(|| config.csv_dir());
    let source = DirectorySource::new(dir);
    let summary = Orchestrator::new(db).update(&source, &kinds_or_all(&args.kind));

    if format.is_json() {
        return match serde_json::to_string_pretty(&summary) {
            Ok(json) => {
                println!("{}", json);
                summary.is_success()
            }
            Err(e) => {
                eprintln!("Error serializing update summary: {}", e);
                false
            }
        };
    }

    println!("Imports:");
    let imports_ok = print_outcomes(&summary.imports, format);
    if summary.activation_blocked {
        println!("Warnings found during import, nothing activated.");
        return false;
    }
    if summary.activations.is_empty() {
        return false;
    }
    println!("Activations:");
    print_outcomes(&summary.activations, format) && imports_ok
}

pub fn run_activate(db: &IpsnapDatabase, args: ActivateArgs, format: OutputFormat) -> bool {
    let outcome = Orchestrator::new(db).activate(args.kind);
    print_outcomes(&[outcome], format)
}
