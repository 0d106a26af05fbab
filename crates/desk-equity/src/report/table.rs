//! Labelled tables of market data

use comfy_table::{Table as Grid, presets};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// One labelled row of a [`Table`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    pub label: String,
    pub values: Vec<Value>,
}

/// A small data frame: an index column plus named value columns
///
/// Rows keep insertion order, which for time series is oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    index_name: String,
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new<I, S>(index_name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            index_name: index_name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row, padding missing cells with `null` and dropping extras
    pub fn push_row(&mut self, label: impl Into<String>, mut values: Vec<Value>) {
        values.resize(self.columns.len(), Value::Null);
        self.rows.push(Row {
            label: label.into(),
            values,
        });
    }

    /// Builder form of [`Table::push_row`]
    #[must_use]
    pub fn with_row(mut self, label: impl Into<String>, values: Vec<Value>) -> Self {
        self.push_row(label, values);
        self
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Look up a cell by row position and column name
    pub fn cell(&self, row: usize, column: &str) -> Option<&Value> {
        let col = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.values.get(col)
    }

    /// The first `n` rows
    #[must_use]
    pub fn head(&self, n: usize) -> Self {
        self.slice(0..n.min(self.rows.len()))
    }

    /// The last `n` rows
    #[must_use]
    pub fn tail(&self, n: usize) -> Self {
        let start = self.rows.len().saturating_sub(n);
        self.slice(start..self.rows.len())
    }

    fn slice(&self, range: std::ops::Range<usize>) -> Self {
        Self {
            index_name: self.index_name.clone(),
            columns: self.columns.clone(),
            rows: self.rows[range].to_vec(),
        }
    }
}

/// Render a single cell the way a reader expects to see it in a report
pub(crate) fn render_cell(value: &Value) -> String {
    match value {
        Value::Null => "n/a".to_string(),
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => format!("{f:.0}"),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut grid = Grid::new();
        grid.load_preset(presets::ASCII_MARKDOWN);

        let mut header = Vec::with_capacity(self.columns.len() + 1);
        header.push(self.index_name.clone());
        header.extend(self.columns.iter().cloned());
        grid.set_header(header);

        for row in &self.rows {
            let mut cells = Vec::with_capacity(row.values.len() + 1);
            cells.push(row.label.clone());
            cells.extend(row.values.iter().map(render_cell));
            grid.add_row(cells);
        }

        write!(f, "{grid}")
    }
}
