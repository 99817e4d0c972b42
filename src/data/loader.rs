use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use anyhow::{Context, Result, bail};
use arrow::array::{Array, ArrayRef, AsArray};
use arrow::datatypes::{DataType, Float32Type, Float64Type, Int32Type, Int64Type};
use arrow::util::display::array_value_to_string;
use calamine::{Data, Reader, Xlsx};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{CellValue, Column, Dataset};

/// Rows kept by a preview load unless configured otherwise.
pub const DEFAULT_PREVIEW_ROWS: usize = 1000;

/// How much of a file to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadMode {
    /// Only the first `n` data rows.
    Preview(usize),
    /// Every row.
    Full,
}

impl LoadMode {
    fn limit(self) -> usize {
        match self {
            LoadMode::Preview(n) => n,
            LoadMode::Full => usize::MAX,
        }
    }
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a dataset from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`            – header row followed by records
/// * `.xlsx` / `.xlsm` – first worksheet, first row is the header
/// * `.parquet` / `.pq`
/// * `.json`           – `[{ "Model": "...", "2020": 1.5, ... }, ...]`
pub fn load_file(path: &Path, mode: LoadMode) -> Result<Dataset> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let dataset = match ext.as_str() {
        "csv" => load_csv(path, mode),
        "xlsx" | "xlsm" => load_xlsx(path, mode),
        "parquet" | "pq" => load_parquet(path, mode),
        "json" => load_json(path, mode),
        other => bail!("Unsupported file extension: .{other}"),
    }
    .with_context(|| format!("loading {}", path.display()))?;

    log::info!(
        "Loaded {} rows x {} columns from {} ({mode:?})",
        dataset.n_rows(),
        dataset.n_columns(),
        path.display()
    );
    Ok(dataset)
}

/// Rename repeated header names the way pandas does: the second `X`
/// becomes `X.1`, the third `X.2`, skipping names already taken.
fn dedupe_headers(headers: Vec<String>) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::new();
    headers
        .into_iter()
        .map(|name| {
            let mut unique = name.clone();
            let mut n = 0;
            while taken.contains(&unique) {
                n += 1;
                unique = format!("{name}.{n}");
            }
            if unique != name {
                log::warn!("duplicate column '{name}' renamed to '{unique}'");
            }
            taken.insert(unique.clone());
            unique
        })
        .collect()
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

fn load_csv(path: &Path, mode: LoadMode) -> Result<Dataset> {
    let file = File::open(path).context("opening CSV")?;
    read_csv(file, mode)
}

/// CSV layout: header row with column names, every cell typed by inference.
pub fn read_csv<R: Read>(source: R, mode: LoadMode) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(source);
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut rows = Vec::new();
    for (row_no, result) in reader.records().take(mode.limit()).enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        rows.push(record.iter().map(guess_cell_type).collect::<Vec<_>>());
    }

    Dataset::from_rows(dedupe_headers(headers), rows).context("assembling CSV table")
}

fn guess_cell_type(s: &str) -> CellValue {
    if s.is_empty() {
        return CellValue::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return CellValue::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return CellValue::Float(f);
    }
    match s {
        "true" | "True" | "TRUE" => CellValue::Bool(true),
        "false" | "False" | "FALSE" => CellValue::Bool(false),
        _ => CellValue::String(s.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Excel loader
// ---------------------------------------------------------------------------

fn load_xlsx(path: &Path, mode: LoadMode) -> Result<Dataset> {
    let file = File::open(path).context("opening workbook")?;
    read_xlsx(BufReader::new(file), mode)
}

/// Read the first worksheet of an `.xlsx` workbook.
/// The first row supplies the column names.
pub fn read_xlsx<R: Read + Seek>(source: R, mode: LoadMode) -> Result<Dataset> {
    let mut workbook: Xlsx<_> = Xlsx::new(source).context("parsing workbook")?;
    let range = workbook
        .worksheet_range_at(0)
        .context("workbook has no worksheets")?
        .context("reading first worksheet")?;

    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Ok(Dataset::default());
    };

    // Trailing empty header cells come from the sheet's used range, not the data.
    let width = header_row
        .iter()
        .rposition(|c| !matches!(c, Data::Empty))
        .map_or(0, |i| i + 1);
    let headers: Vec<String> = header_row[..width]
        .iter()
        .enumerate()
        .map(|(i, cell)| match xlsx_cell(cell) {
            CellValue::Null => format!("Unnamed: {i}"),
            // Year headers come back as numbers.
            CellValue::Float(f) if f.fract() == 0.0 => format!("{}", f as i64),
            other => other.as_text(),
        })
        .collect();

    let body = rows
        .take(mode.limit())
        .map(|row| row.iter().take(width).map(xlsx_cell).collect::<Vec<_>>());

    Dataset::from_rows(dedupe_headers(headers), body).context("assembling worksheet table")
}

fn xlsx_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Null,
        Data::String(s) => CellValue::String(s.clone()),
        Data::Int(i) => CellValue::Integer(*i),
        Data::Float(f) => CellValue::Float(*f),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => CellValue::Float(dt.as_f64()),
        Data::DateTimeIso(s) => CellValue::Date(s.clone()),
        Data::DurationIso(s) => CellValue::String(s.clone()),
        Data::Error(e) => CellValue::String(e.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file. Every column becomes a table column; nested or
/// otherwise unsupported Arrow types are rendered as text.
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`).
fn load_parquet(path: &Path, mode: LoadMode) -> Result<Dataset> {
    let file = File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;

    let headers: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let mut values: Vec<Vec<CellValue>> = vec![Vec::new(); headers.len()];

    let reader = builder.build().context("building parquet reader")?;
    let mut remaining = mode.limit();

    for batch_result in reader {
        if remaining == 0 {
            break;
        }
        let batch = batch_result.context("reading parquet record batch")?;
        let n_rows = batch.num_rows().min(remaining);

        for (col_idx, slot) in values.iter_mut().enumerate() {
            let col_array = batch.column(col_idx);
            for row in 0..n_rows {
                slot.push(arrow_cell(col_array, row));
            }
        }
        remaining -= n_rows;
    }

    let columns = dedupe_headers(headers)
        .into_iter()
        .zip(values)
        .map(|(name, vals)| Column::new(name, vals))
        .collect();
    Dataset::new(columns).context("assembling parquet table")
}

/// Extract a single cell from an Arrow column at a given row.
fn arrow_cell(col: &ArrayRef, row: usize) -> CellValue {
    if col.is_null(row) {
        return CellValue::Null;
    }
    match col.data_type() {
        DataType::Utf8 => CellValue::String(col.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => CellValue::String(col.as_string::<i64>().value(row).to_string()),
        DataType::Int32 => CellValue::Integer(col.as_primitive::<Int32Type>().value(row) as i64),
        DataType::Int64 => CellValue::Integer(col.as_primitive::<Int64Type>().value(row)),
        DataType::Float32 => CellValue::Float(col.as_primitive::<Float32Type>().value(row) as f64),
        DataType::Float64 => CellValue::Float(col.as_primitive::<Float64Type>().value(row)),
        DataType::Boolean => CellValue::Bool(col.as_boolean().value(row)),
        DataType::Date32 | DataType::Date64 | DataType::Timestamp(_, _) => {
            array_value_to_string(col, row)
                .map(CellValue::Date)
                .unwrap_or(CellValue::Null)
        }
        other => array_value_to_string(col, row)
            .map(CellValue::String)
            .unwrap_or_else(|_| CellValue::String(format!("{other:?}"))),
    }
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, the default `df.to_json(orient='records')`):
///
/// ```json
/// [
///   { "Model": "MESSAGE", "Region": "World", "2020": 40.1 },
///   ...
/// ]
/// ```
///
/// Column order follows the first appearance of each key.
fn load_json(path: &Path, mode: LoadMode) -> Result<Dataset> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root.as_array().context("Expected top-level JSON array")?;

    let mut headers: Vec<String> = Vec::new();
    for (i, rec) in records.iter().take(mode.limit()).enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;
        for key in obj.keys() {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }

    let rows = records.iter().take(mode.limit()).map(|rec| {
        headers
            .iter()
            .map(|h| rec.get(h).map(json_to_cell).unwrap_or(CellValue::Null))
            .collect::<Vec<_>>()
    });

    Dataset::from_rows(headers.clone(), rows).context("assembling JSON table")
}

fn json_to_cell(val: &JsonValue) -> CellValue {
    match val {
        JsonValue::String(s) => CellValue::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                CellValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                CellValue::Float(f)
            } else {
                CellValue::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => CellValue::Bool(*b),
        JsonValue::Null => CellValue::Null,
        other => CellValue::String(other.to_string()),
    }
}
