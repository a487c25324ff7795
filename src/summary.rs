// src/summary.rs

use crate::error::{HarnessError, Result};
use crate::model::MeasurementRow;
use crate::table::{read_table, TableLayout};
use std::fs;
use std::path::Path;

/// Column sums over a run of measurement rows
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Totals {
    rows: usize,
    without: f64,
    with: f64,
    changed_files: f64,
    selected_tests: f64,
    selected_rows: usize,
    saved: f64,
    ratio: f64,
}

impl Totals {
    fn add(self, row: &MeasurementRow) -> Self {
        Self {
            rows: self.rows + 1,
            without: self.without + row.without,
            with: self.with + row.with,
            changed_files: self.changed_files + row.changed_files as f64,
            selected_tests: self.selected_tests + row.selected_tests.unwrap_or(0) as f64,
            selected_rows: self.selected_rows + usize::from(row.selected_tests.is_some()),
            saved: self.saved + row.saved,
            ratio: self.ratio + row.ratio,
        }
    }
}

/// Per-target means of every numeric table column
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub target: String,
    pub rows: usize,
    pub average_time_without_rts: f64,
    pub average_time_with_rts: f64,
    pub average_changed_files: f64,
    /// Present exactly when the table tracks selected tests. Averages over
    /// the rows that recorded a count, NaN if none did.
    pub average_selected_tests: Option<f64>,
    pub average_saved_time: f64,
    pub average_ratio: f64,
}

impl Summary {
    pub fn from_rows<'a, I>(target: &str, layout: TableLayout, rows: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a MeasurementRow>,
    {
        let totals = rows.into_iter().fold(Totals::default(), Totals::add);
        if totals.rows == 0 {
            return Err(HarnessError::NoData(target.to_string()));
        }

        let n = totals.rows as f64;
        Ok(Self {
            target: target.to_string(),
            rows: totals.rows,
            average_time_without_rts: totals.without / n,
            average_time_with_rts: totals.with / n,
            average_changed_files: totals.changed_files / n,
            average_selected_tests: layout.track_selected.then(|| {
                if totals.selected_rows > 0 {
                    totals.selected_tests / totals.selected_rows as f64
                } else {
                    f64::NAN
                }
            }),
            average_saved_time: totals.saved / n,
            average_ratio: totals.ratio / n,
        })
    }

    /// Summarizes the data rows of `table` that follow the first `skip` rows.
    /// Rows written by earlier runs into a shared table are skipped this way.
    pub fn from_table(target: &str, table: &Path, skip: usize) -> Result<Self> {
        let (layout, rows) = read_table(table)?;
        Self::from_rows(target, layout, rows.iter().skip(skip))
    }

    pub fn header(&self) -> String {
        let mut columns = vec!["target", "average_time_taken_without_rts", "average_time_taken_with_rts", "average_changed_files"];
        if self.average_selected_tests.is_some() {
            columns.push("average_selected_tests");
        }
        columns.extend(["average_saved_time", "average_ratio"]);
        columns.join(",")
    }

    pub fn values(&self) -> String {
        let mut fields = vec![
            self.target.clone(),
            self.average_time_without_rts.to_string(),
            self.average_time_with_rts.to_string(),
            self.average_changed_files.to_string(),
        ];
        if let Some(selected) = self.average_selected_tests {
            fields.push(selected.to_string());
        }
        fields.push(self.average_saved_time.to_string());
        fields.push(self.average_ratio.to_string());
        fields.join(",")
    }

    /// Overwrites `path` with a header line and one value line
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| HarnessError::io(parent, e))?;
        }
        let content = format!("{}\n{}\n", self.header(), self.values());
        fs::write(path, content).map_err(|e| HarnessError::io(path, e))
    }
}
