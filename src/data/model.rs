use std::collections::HashSet;
use std::fmt;

use thiserror::Error;

// ---------------------------------------------------------------------------
// CellValue – a single cell of a table
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value mirroring common spreadsheet/CSV dtypes.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    /// ISO-8601 date string kept as text for simplicity.
    Date(String),
    Null,
}

/// Display is the text a user sees in a table cell; nulls stay blank.
impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_text())
    }
}

impl CellValue {
    /// Text form of the value, as used by substring filtering and filter options.
    ///
    /// Integral floats keep a trailing `.0` so `2020.0` and `2020` stay
    /// distinguishable, and booleans read `True` / `False` the way they do in
    /// spreadsheet tools.
    pub fn as_text(&self) -> String {
        match self {
            CellValue::String(s) | CellValue::Date(s) => s.clone(),
            CellValue::Integer(i) => i.to_string(),
            CellValue::Float(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e16 => {
                format!("{v:.1}")
            }
            CellValue::Float(v) if v.is_nan() => "nan".to_string(),
            CellValue::Float(v) => v.to_string(),
            CellValue::Bool(true) => "True".to_string(),
            CellValue::Bool(false) => "False".to_string(),
            CellValue::Null => String::new(),
        }
    }

    /// Nulls and NaN floats both stand for an absent value.
    pub fn is_missing(&self) -> bool {
        match self {
            CellValue::Null => true,
            CellValue::Float(v) => v.is_nan(),
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq)]
pub enum DatasetError {
    #[error("duplicate column name '{0}'")]
    DuplicateColumn(String),

    #[error("column '{column}' has {actual} values, expected {expected}")]
    RaggedColumn {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("row {row} has {actual} cells but the header has {expected} columns")]
    RowTooLong {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("column '{0}' not found")]
    MissingColumn(String),
}

// ---------------------------------------------------------------------------
// Column / Dataset
// ---------------------------------------------------------------------------

/// One named column of a [`Dataset`].
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<CellValue>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<CellValue>) -> Self {
        Column {
            name: name.into(),
            values,
        }
    }
}

/// An immutable table: ordered, uniquely named, equally long columns.
///
/// Every transformation returns a new `Dataset`; nothing here mutates `self`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dataset {
    columns: Vec<Column>,
    n_rows: usize,
}

impl Dataset {
    /// Build a dataset, checking name uniqueness and column lengths.
    pub fn new(columns: Vec<Column>) -> Result<Self, DatasetError> {
        let mut seen = HashSet::new();
        for col in &columns {
            if !seen.insert(col.name.as_str()) {
                return Err(DatasetError::DuplicateColumn(col.name.clone()));
            }
        }

        let n_rows = columns.first().map(|c| c.values.len()).unwrap_or(0);
        if let Some(bad) = columns.iter().find(|c| c.values.len() != n_rows) {
            return Err(DatasetError::RaggedColumn {
                column: bad.name.clone(),
                expected: n_rows,
                actual: bad.values.len(),
            });
        }

        Ok(Dataset { columns, n_rows })
    }

    /// Build a dataset from a header and row-major cells.
    /// Short rows are padded with [`CellValue::Null`].
    pub fn from_rows(
        header: Vec<String>,
        rows: impl IntoIterator<Item = Vec<CellValue>>,
    ) -> Result<Self, DatasetError> {
        let width = header.len();
        let mut values: Vec<Vec<CellValue>> = vec![Vec::new(); width];

        for (row_no, row) in rows.into_iter().enumerate() {
            if row.len() > width {
                return Err(DatasetError::RowTooLong {
                    row: row_no,
                    expected: width,
                    actual: row.len(),
                });
            }
            let filled = row.len();
            for (slot, cell) in values.iter_mut().zip(row) {
                slot.push(cell);
            }
            for slot in values.iter_mut().skip(filled) {
                slot.push(CellValue::Null);
            }
        }

        let columns = header
            .into_iter()
            .zip(values)
            .map(|(name, vals)| Column::new(name, vals))
            .collect();
        Dataset::new(columns)
    }

    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column names in display order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Cells of row `i`, in column order.
    pub fn row(&self, i: usize) -> impl Iterator<Item = &CellValue> + '_ {
        self.columns.iter().map(move |c| &c.values[i])
    }

    /// The first `n` rows.
    pub fn head(&self, n: usize) -> Dataset {
        let n = n.min(self.n_rows);
        let columns = self
            .columns
            .iter()
            .map(|c| Column::new(c.name.clone(), c.values[..n].to_vec()))
            .collect();
        Dataset { columns, n_rows: n }
    }

    /// Keep the rows at `indices`, in the given order.
    pub fn take_rows(&self, indices: &[usize]) -> Dataset {
        let columns = self
            .columns
            .iter()
            .map(|c| {
                let values = indices.iter().map(|&i| c.values[i].clone()).collect();
                Column::new(c.name.clone(), values)
            })
            .collect();
        Dataset {
            columns,
            n_rows: indices.len(),
        }
    }

    /// Project onto `names`, in the given order.
    pub fn select_columns<S: AsRef<str>>(&self, names: &[S]) -> Result<Dataset, DatasetError> {
        for name in names.iter().map(AsRef::<str>::as_ref) {
            if !self.has_column(name) {
                return Err(DatasetError::MissingColumn(name.to_string()));
            }
        }
        Ok(self.project(names))
    }

    /// Project onto the columns of `names` that exist, in the given order.
    /// Repeated names are kept once.
    pub fn project<S: AsRef<str>>(&self, names: &[S]) -> Dataset {
        let mut taken = HashSet::new();
        let columns = names
            .iter()
            .map(AsRef::<str>::as_ref)
            .filter(|name| taken.insert(*name))
            .filter_map(|name| self.column(name).cloned())
            .collect();
        Dataset {
            columns,
            n_rows: self.n_rows,
        }
    }

    /// Distinct text values of a column, in first-appearance order.
    /// Missing values are skipped. Unknown columns yield an empty list.
    pub fn unique_texts(&self, name: &str) -> Vec<String> {
        let Some(col) = self.column(name) else {
            return Vec::new();
        };
        let mut seen = HashSet::new();
        col.values
            .iter()
            .filter(|v| !v.is_missing())
            .map(CellValue::as_text)
            .filter(|t| seen.insert(t.clone()))
            .collect()
    }
}
