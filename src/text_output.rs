//! Human-readable text report
//!
//! A short header with the whole-table coefficients, the summary table as
//! right-aligned columns, then any per-bin failures.

use crate::coefficients::ModelKind;
use crate::pipeline::Evaluation;
use crate::summary::SummaryTable;

/// Decimals shown for float cells
pub const TEXT_PRECISION: usize = 3;

/// Render the summary table with columns padded to their widest cell
pub fn render_table(table: &SummaryTable, precision: usize) -> String {
    let rows: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|row| row.cells(Some(precision)))
        .collect();

    let mut widths: Vec<usize> = table.columns.iter().map(|c| c.len()).collect();
    for cells in &rows {
        for (width, cell) in widths.iter_mut().zip(cells) {
            *width = (*width).max(cell.len());
        }
    }

    let format_line = |cells: &[String]| -> String {
        cells
            .iter()
            .zip(&widths)
            .enumerate()
            .map(|(i, (cell, &width))| {
                // Bin labels read better left-aligned
                if i == 0 {
                    format!("{:<width$}", cell, width = width)
                } else {
                    format!("{:>width$}", cell, width = width)
                }
            })
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut output = String::new();
    output.push_str(&format_line(&table.columns));
    output.push('\n');
    let rule_width = widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1);
    output.push_str(&"-".repeat(rule_width));
    output.push('\n');
    for cells in &rows {
        output.push_str(&format_line(cells));
        output.push('\n');
    }
    output
}

/// Full text report of an evaluation
pub fn to_report_string(evaluation: &Evaluation) -> String {
    let mut report = String::new();

    report.push_str(&format!(
        "Arrival-time model evaluation: {} records, {} bins, scope {:?}, fallback {:?}\n\n",
        evaluation.record_count(),
        evaluation.bin_reports().len(),
        evaluation.scope(),
        evaluation.fallback(),
    ));

    report.push_str("Whole-table coefficients (historical, recent, schedule):\n");
    for model in ModelKind::ALL {
        let set = evaluation.model_coefficients(model);
        report.push_str(&format!(
            "  {:<10}  {:>8.4}  {:>8.4}  {:>8.4}\n",
            model.name(),
            set.historical,
            set.recent,
            set.schedule
        ));
    }
    report.push('\n');

    report.push_str(&render_table(evaluation.summary_table(), TEXT_PRECISION));

    let failures: Vec<_> = evaluation.failures().collect();
    if !failures.is_empty() {
        report.push_str(&format!("\nPer-bin failures ({}):\n", failures.len()));
        for (label, failure) in failures {
            report.push_str(&format!(
                "  {} {}: {}\n",
                label, failure.model, failure.error
            ));
        }
    }

    report
}
