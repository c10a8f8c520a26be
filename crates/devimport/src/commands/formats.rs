use std::process::ExitCode;

use anyhow::Result;
use comfy_table::Table;

pub fn handle_formats() -> Result<ExitCode> {
    let mut table = Table::new();
    table.set_header(vec!["format", "description"]);
    for format in devimport_parser::all_formats() {
        table.add_row(vec![format.code, format.description]);
    }
    println!("{table}");
    Ok(ExitCode::SUCCESS)
}
