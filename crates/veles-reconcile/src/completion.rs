//! Completion accounting.
//!
//! A purely observational metric: per table, the share of fields that have
//! a name after reconciliation. Written out as a small delimited report at
//! the end of a compare run; nothing consumes it.

use std::io::Write;
use std::path::Path;

use veles_dbc::SchemaEntry;

/// Per-table completion percentages, in recording order.
#[derive(Debug, Default)]
pub struct CompletionReport {
    rows: Vec<(String, f32)>,
}

impl CompletionReport {
    /// Record one table's entries after reconciliation.
    pub fn record(&mut self, entries: &[SchemaEntry]) {
        let Some(first) = entries.first() else {
            return;
        };

        let named: usize = entries.iter().map(SchemaEntry::named_field_count).sum();
        let total: usize = entries.iter().map(|entry| entry.fields.len()).sum();
        let percent = if total == 0 {
            0.0
        } else {
            named as f32 / total as f32 * 100.0
        };

        self.rows.push((first.name.clone(), percent));
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Average completion across recorded tables.
    pub fn average(&self) -> f32 {
        if self.rows.is_empty() {
            return 0.0;
        }
        self.rows.iter().map(|(_, percent)| percent).sum::<f32>() / self.rows.len() as f32
    }

    /// Write the `_log.csv` style report.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let mut out = std::fs::File::create(path)?;

        writeln!(out, "FILENAME,COMPLETION %")?;
        for (name, percent) in &self.rows {
            writeln!(out, "{name},{percent:06.2}%")?;
        }
        writeln!(out)?;
        writeln!(out, "TOTAL,{:06.2}%", self.average())?;
        Ok(())
    }
}
