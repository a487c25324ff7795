// src/table.rs

//! Append-only CSV table of measurement rows
//!
//! Fields are written unquoted. Every value is numeric, so no escaping is
//! needed, but the format is not safe for arbitrary text.

use crate::error::{HarnessError, Result};
use crate::model::MeasurementRow;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const ITERATION: &str = "Iteration";
pub const WITHOUT: &str = "Time taken without RTS";
pub const WITH: &str = "Time taken with RTS";
pub const CHANGED_FILES: &str = "Changed files";
pub const SELECTED_TESTS: &str = "Selected tests";
pub const SAVED: &str = "Saved Time";
pub const RATIO: &str = "Ratio (with/without RTS)";

/// Where rows of successive targets go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum TableMode {
    /// One file for every target, appended to and created with a header if absent
    #[default]
    Shared,
    /// `<dir>/<target>.csv`, recreated at the start of each target
    PerTarget,
}

impl TableMode {
    /// Table file for a target given the configured table path
    pub fn path_for(self, table: &Path, target: &str) -> PathBuf {
        match self {
            TableMode::Shared => table.to_path_buf(),
            TableMode::PerTarget => table.join(format!("{}.csv", target)),
        }
    }
}

/// Column set of a table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TableLayout {
    /// Include the selected-test count column
    pub track_selected: bool,
}

impl TableLayout {
    pub fn columns(self) -> Vec<&'static str> {
        let mut columns = vec![ITERATION, WITHOUT, WITH, CHANGED_FILES];
        if self.track_selected {
            columns.push(SELECTED_TESTS);
        }
        columns.extend([SAVED, RATIO]);
        columns
    }

    pub fn header(self) -> String {
        self.columns().join(",")
    }

    pub fn format_row(self, row: &MeasurementRow) -> String {
        let mut fields = vec![
            row.iteration.to_string(),
            row.without.to_string(),
            row.with.to_string(),
            row.changed_files.to_string(),
        ];
        if self.track_selected {
            // A count the report did not provide stays a parseable float
            fields.push(row.selected_tests.map_or_else(|| f64::NAN.to_string(), |n| n.to_string()));
        }
        fields.push(row.saved.to_string());
        fields.push(row.ratio.to_string());
        fields.join(",")
    }
}

/// Open handle on a measurement table
#[derive(Debug)]
pub struct MeasurementTable {
    path: PathBuf,
    layout: TableLayout,
    file: File,
    rows_before_run: usize,
    rows_written: usize,
}

impl MeasurementTable {
    pub fn open(path: impl AsRef<Path>, mode: TableMode, layout: TableLayout) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| HarnessError::io(parent, e))?;
        }

        let existing = match mode {
            TableMode::PerTarget => None,
            TableMode::Shared => match fs::metadata(&path) {
                Ok(meta) if meta.len() > 0 => Some(read_rows_with_header(&path)?),
                _ => None,
            },
        };

        let (file, rows_before_run) = match existing {
            Some((header, rows)) => {
                if header != layout.header() {
                    return Err(HarnessError::Table {
                        path,
                        message: format!("existing header `{}` does not match `{}`", header, layout.header()),
                    });
                }
                let file = OpenOptions::new().append(true).open(&path).map_err(|e| HarnessError::io(&path, e))?;
                (file, rows.len())
            }
            None => {
                let mut file = File::create(&path).map_err(|e| HarnessError::io(&path, e))?;
                writeln!(file, "{}", layout.header()).map_err(|e| HarnessError::io(&path, e))?;
                (file, 0)
            }
        };

        Ok(Self { path, layout, file, rows_before_run, rows_written: 0 })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Data rows present before this run started appending
    pub fn rows_before_run(&self) -> usize {
        self.rows_before_run
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    pub fn append(&mut self, row: &MeasurementRow) -> Result<()> {
        writeln!(self.file, "{}", self.layout.format_row(row)).map_err(|e| HarnessError::io(&self.path, e))?;
        self.file.flush().map_err(|e| HarnessError::io(&self.path, e))?;
        self.rows_written += 1;
        Ok(())
    }
}

/// Raw record as it appears in the file; counts are read as floats too
#[derive(Debug, Deserialize)]
struct TableRecord {
    #[serde(rename = "Iteration")]
    iteration: f64,
    #[serde(rename = "Time taken without RTS")]
    without: f64,
    #[serde(rename = "Time taken with RTS")]
    with: f64,
    #[serde(rename = "Changed files")]
    changed_files: f64,
    #[serde(rename = "Selected tests", default)]
    selected_tests: Option<f64>,
    #[serde(rename = "Saved Time")]
    saved: f64,
    #[serde(rename = "Ratio (with/without RTS)")]
    ratio: f64,
}

impl From<TableRecord> for MeasurementRow {
    fn from(record: TableRecord) -> Self {
        MeasurementRow {
            iteration: record.iteration as usize,
            without: record.without,
            with: record.with,
            changed_files: record.changed_files as usize,
            selected_tests: record.selected_tests.filter(|n| !n.is_nan()).map(|n| n as usize),
            saved: record.saved,
            ratio: record.ratio,
        }
    }
}

/// Reads every data row of a table, locating columns by their header names
pub fn read_rows(path: &Path) -> Result<Vec<MeasurementRow>> {
    read_table(path).map(|(_, rows)| rows)
}

/// Reads a table together with the layout its header declares
pub fn read_table(path: &Path) -> Result<(TableLayout, Vec<MeasurementRow>)> {
    let (header, rows) = read_rows_with_header(path)?;
    let track_selected = header.split(',').any(|column| column == SELECTED_TESTS);
    Ok((TableLayout { track_selected }, rows))
}

fn read_rows_with_header(path: &Path) -> Result<(String, Vec<MeasurementRow>)> {
    let malformed = |message: String| HarnessError::Table { path: path.to_path_buf(), message };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| malformed(e.to_string()))?;

    let headers = reader.headers().map_err(|e| malformed(e.to_string()))?.clone();
    if headers.is_empty() {
        return Err(malformed("missing header row".to_string()));
    }
    let header = headers.iter().collect::<Vec<_>>().join(",");

    let rows = reader
        .deserialize::<TableRecord>()
        .map(|record| record.map(MeasurementRow::from).map_err(|e| malformed(e.to_string())))
        .collect::<Result<Vec<_>>>()?;

    Ok((header, rows))
}
