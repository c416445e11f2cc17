//! CSV output format for the summary table
//!
//! One header row with the summary columns, then one row per (bin, model).
//! Floats are written at full precision; undefined cells read `NaN`.

use crate::summary::SummaryTable;

/// CSV output formatter
#[derive(Debug)]
pub struct CsvOutput<'a> {
    table: &'a SummaryTable,
    precision: Option<usize>,
}

impl<'a> CsvOutput<'a> {
    pub fn new(table: &'a SummaryTable) -> Self {
        Self {
            table,
            precision: None,
        }
    }

    /// Fix the number of decimals for float cells
    pub fn with_precision(mut self, precision: usize) -> Self {
        self.precision = Some(precision);
        self
    }

    /// Escape CSV field (handle commas, quotes, newlines)
    fn escape_field(field: &str) -> String {
        // Bin labels like "[0, 120)" contain a comma
        if field.contains(',') || field.contains('"') || field.contains('\n') {
            format!("\"{}\"", field.replace('"', "\"\""))
        } else {
            field.to_string()
        }
    }

    fn join_row<S: AsRef<str>>(fields: &[S]) -> String {
        fields
            .iter()
            .map(|f| Self::escape_field(f.as_ref()))
            .collect::<Vec<_>>()
            .join(",")
    }

    fn header(&self) -> String {
        Self::join_row(&self.table.columns)
    }

    /// Generate CSV output as string
    pub fn to_csv(&self) -> String {
        let mut output = String::new();

        output.push_str(&self.header());
        output.push('\n');

        for row in &self.table.rows {
            output.push_str(&Self::join_row(&row.cells(self.precision)));
            output.push('\n');
        }

        output
    }
}
