use comfy_table::Table;
use devimport_core::ImportReceipt;

pub fn print_receipt(receipt: &ImportReceipt) {
    let summary = &receipt.summary;

    let mut overview = Table::new();
    overview.set_header(vec!["run", "state", "total", "processed", "succeeded", "failed"]);
    overview.add_row(vec![
        receipt.run_id.to_string(),
        receipt.state.to_string(),
        summary.total.to_string(),
        summary.processed_count.to_string(),
        summary.success_count.to_string(),
        summary.failures.len().to_string(),
    ]);
    println!("{overview}");

    if !summary.failures.is_empty() {
        let mut failures = Table::new();
        failures.set_header(vec!["#", "device", "kind", "reason"]);
        for failure in &summary.failures {
            failures.add_row(vec![
                (failure.index + 1).to_string(),
                failure.identifier.clone(),
                failure.kind.to_string(),
                failure.reason.clone(),
            ]);
        }
        println!("{failures}");

        let grouped = summary.failures_by_reason();
        if grouped.len() < summary.failures.len() {
            let mut reasons = Table::new();
            reasons.set_header(vec!["reason", "devices"]);
            for entry in grouped {
                reasons.add_row(vec![entry.reason, entry.count.to_string()]);
            }
            println!("{reasons}");
        }
    }

    println!("{}", receipt.message);
}
