use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use comfy_table::Table;
use devimport_core::{preview_file, ValidationOutcome};

use super::SourceArgs;

#[derive(Args, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub source: SourceArgs,
}

pub fn handle_check(args: CheckArgs) -> Result<ExitCode> {
    let config = args.source.config()?;
    let contents = args.source.read_file()?;

    let outcomes = preview_file(
        &contents,
        &args.source.format,
        &config.fallback,
        &config.validation,
    )
    .with_context(|| format!("failed to decode '{}'", args.source.file.display()))?;

    let mut table = Table::new();
    table.set_header(vec!["#", "device", "status", "detail"]);
    let mut invalid = 0;
    for (position, outcome) in outcomes.iter().enumerate() {
        let row = match outcome {
            ValidationOutcome::Valid(valid) => {
                let injected: Vec<String> = valid
                    .record
                    .injected()
                    .iter()
                    .map(|field| field.to_string())
                    .collect();
                let detail = if injected.is_empty() {
                    String::new()
                } else {
                    format!("defaults: {}", injected.join(", "))
                };
                vec![
                    (position + 1).to_string(),
                    valid.device_id.clone(),
                    "ok".to_string(),
                    detail,
                ]
            }
            ValidationOutcome::Invalid { identifier, error } => {
                invalid += 1;
                vec![
                    (position + 1).to_string(),
                    identifier.clone(),
                    "invalid".to_string(),
                    error.to_string(),
                ]
            }
        };
        table.add_row(row);
    }

    println!("{table}");
    println!(
        "{} of {} end devices are ready to import",
        outcomes.len() - invalid,
        outcomes.len()
    );

    Ok(if invalid == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
