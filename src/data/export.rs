use std::path::Path;

use rust_xlsxwriter::{
    ColNum, DocProperties, ExcelDateTime, Format, FormatBorder, RowNum, Workbook, XlsxError,
};
use thiserror::Error;

use super::model::{CellValue, Dataset};

/// Worksheet size limits of the `.xlsx` container.
const MAX_ROWS: usize = 1_048_576;
const MAX_COLUMNS: usize = 16_384;
/// Longest text a single cell can hold, in characters.
const MAX_CELL_TEXT: usize = 32_767;

const SHEET_NAME: &str = "Sheet1";

/// Largest integer magnitude a spreadsheet number (an f64) holds exactly.
const MAX_EXACT_INTEGER: u64 = 1 << 53;

#[derive(Debug, Error)]
pub enum ExportError {
    /// A header or cell the workbook format cannot represent.
    /// `row` counts the header as row 0.
    #[error("cannot encode row {row}, column '{column}': {reason}")]
    Encoding {
        row: usize,
        column: String,
        reason: String,
    },

    #[error("{rows} rows x {columns} columns does not fit in a worksheet")]
    SheetTooLarge { rows: usize, columns: usize },

    #[error("workbook writer failed: {0}")]
    Writer(#[from] XlsxError),

    #[error("writing {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

/// Suggested name for the exported workbook of a dataset view.
pub fn export_file_name(dataset_name: &str) -> String {
    format!("{dataset_name}_filtered_data.xlsx")
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Serialize a dataset into an in-memory `.xlsx` workbook.
///
/// One worksheet; the first row holds the column names, data rows follow in
/// their original order, and there is no index column. Text and dates are
/// written as strings, integers and floats as numbers, booleans as booleans.
/// Nulls and NaN become blank cells. The document creation time is pinned,
/// so equal datasets encode to identical bytes.
pub fn encode(dataset: &Dataset) -> Result<Vec<u8>, ExportError> {
    // One extra row for the header.
    if dataset.n_rows() + 1 > MAX_ROWS || dataset.n_columns() > MAX_COLUMNS {
        return Err(ExportError::SheetTooLarge {
            rows: dataset.n_rows(),
            columns: dataset.n_columns(),
        });
    }

    let mut workbook = Workbook::new();
    let created = ExcelDateTime::from_ymd(2000, 1, 1)?;
    workbook.set_properties(&DocProperties::new().set_creation_datetime(&created));
    let header_format = Format::new().set_bold().set_border(FormatBorder::Thin);

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    for (col_idx, column) in dataset.columns().iter().enumerate() {
        // Bounded by MAX_COLUMNS / MAX_ROWS above.
        let col = col_idx as ColNum;

        check_text(&column.name, 0, &column.name)?;
        worksheet.write_string_with_format(0, col, &column.name, &header_format)?;

        for (row_idx, value) in column.values.iter().enumerate() {
            let row = (row_idx + 1) as RowNum;
            let at = |reason: &str| ExportError::Encoding {
                row: row_idx + 1,
                column: column.name.clone(),
                reason: reason.to_string(),
            };

            match value {
                CellValue::String(s) | CellValue::Date(s) => {
                    check_text(s, row_idx + 1, &column.name)?;
                    worksheet.write_string(row, col, s)?;
                }
                CellValue::Integer(i) if i.unsigned_abs() > MAX_EXACT_INTEGER => {
                    return Err(at("integer is too large to store exactly as a spreadsheet number"));
                }
                CellValue::Integer(i) => {
                    worksheet.write_number(row, col, *i as f64)?;
                }
                CellValue::Float(f) if f.is_nan() => {}
                CellValue::Float(f) if f.is_infinite() => {
                    return Err(at("infinite values have no spreadsheet representation"));
                }
                CellValue::Float(f) => {
                    worksheet.write_number(row, col, *f)?;
                }
                CellValue::Bool(b) => {
                    worksheet.write_boolean(row, col, *b)?;
                }
                CellValue::Null => {}
            }
        }
    }

    let bytes = workbook.save_to_buffer()?;
    log::info!(
        "Encoded {} rows x {} columns into {} bytes",
        dataset.n_rows(),
        dataset.n_columns(),
        bytes.len()
    );
    Ok(bytes)
}

fn check_text(text: &str, row: usize, column: &str) -> Result<(), ExportError> {
    let len = text.chars().count();
    if len > MAX_CELL_TEXT {
        return Err(ExportError::Encoding {
            row,
            column: column.to_string(),
            reason: format!("text of {len} characters exceeds the {MAX_CELL_TEXT} character cell limit"),
        });
    }
    Ok(())
}

/// Write encoded workbook bytes to `path`.
pub fn write_export(path: &Path, bytes: &[u8]) -> Result<(), ExportError> {
    std::fs::write(path, bytes).map_err(|source| ExportError::Io {
        path: path.display().to_string(),
        source,
    })?;
    log::info!("Wrote export to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    use crate::data::loader::{LoadMode, read_xlsx};
    use crate::data::model::Column;
    use tempfile::TempDir;

    fn text(s: &str) -> CellValue {
        CellValue::String(s.to_string())
    }

    fn number(value: &CellValue) -> Option<f64> {
        match value {
            CellValue::Integer(i) => Some(*i as f64),
            CellValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    fn sample() -> Dataset {
        Dataset::new(vec![
            Column::new("Model", vec![text("MESSAGE"), text("GCAM"), text("REMIND")]),
            Column::new("Region", vec![text("Asia"), text("Europe"), text("North America")]),
            Column::new(
                "2020",
                vec![CellValue::Integer(7), CellValue::Float(1.25), CellValue::Null],
            ),
            Column::new(
                "Flag",
                vec![CellValue::Bool(true), CellValue::Bool(false), CellValue::Bool(true)],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_encode_produces_zip_container() {
        let bytes = encode(&sample()).unwrap();
        assert!(bytes.starts_with(b"PK"));
    }

    #[test]
    fn test_round_trip_through_reader() {
        let ds = sample();
        let bytes = encode(&ds).unwrap();
        let back = read_xlsx(Cursor::new(bytes), LoadMode::Full).unwrap();

        // Header row first, no index column.
        assert_eq!(back.column_names(), ds.column_names());
        assert_eq!(back.n_rows(), ds.n_rows());

        assert_eq!(back.column("Model").unwrap(), ds.column("Model").unwrap());
        assert_eq!(back.column("Region").unwrap(), ds.column("Region").unwrap());
        assert_eq!(back.column("Flag").unwrap(), ds.column("Flag").unwrap());

        // Numbers may widen from integer to float.
        let numbers: Vec<Option<f64>> = back.column("2020").unwrap().values.iter().map(number).collect();
        assert_eq!(numbers, vec![Some(7.0), Some(1.25), None]);
    }

    #[test]
    fn test_empty_dataset_keeps_header() {
        let ds = sample().head(0);
        let back = read_xlsx(Cursor::new(encode(&ds).unwrap()), LoadMode::Full).unwrap();
        assert_eq!(back.column_names(), ds.column_names());
        assert_eq!(back.n_rows(), 0);
    }

    #[test]
    fn test_nan_is_blank_and_infinity_fails() {
        let ds = Dataset::new(vec![
            Column::new("Model", vec![text("a"), text("b")]),
            Column::new("2020", vec![CellValue::Float(f64::NAN), CellValue::Float(2.0)]),
        ])
        .unwrap();
        let back = read_xlsx(Cursor::new(encode(&ds).unwrap()), LoadMode::Full).unwrap();
        assert_eq!(back.column("2020").unwrap().values[0], CellValue::Null);

        let bad = Dataset::new(vec![Column::new("2020", vec![CellValue::Float(f64::INFINITY)])]).unwrap();
        match encode(&bad).unwrap_err() {
            ExportError::Encoding { row, column, .. } => {
                assert_eq!(row, 1);
                assert_eq!(column, "2020");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_integers_beyond_f64_precision_fail() {
        let edge = 1i64 << 53;
        let ok = Dataset::new(vec![Column::new("2020", vec![CellValue::Integer(-edge)])]).unwrap();
        let back = read_xlsx(Cursor::new(encode(&ok).unwrap()), LoadMode::Full).unwrap();
        assert_eq!(number(&back.column("2020").unwrap().values[0]), Some(-edge as f64));

        let bad = Dataset::new(vec![
            Column::new("Model", vec![text("a"), text("b")]),
            Column::new("2020", vec![CellValue::Integer(1), CellValue::Integer(edge + 1)]),
        ])
        .unwrap();
        match encode(&bad).unwrap_err() {
            ExportError::Encoding { row, column, .. } => {
                assert_eq!(row, 2);
                assert_eq!(column, "2020");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_encode_is_deterministic() {
        let ds = sample();
        let first = encode(&ds).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(1100));
        assert_eq!(encode(&ds).unwrap(), first);
    }

    #[test]
    fn test_oversized_text_fails_without_touching_dataset() {
        let long = "x".repeat(MAX_CELL_TEXT + 1);
        let ds = Dataset::new(vec![Column::new("Variable", vec![text(&long)])]).unwrap();
        let before = ds.clone();

        assert!(matches!(encode(&ds), Err(ExportError::Encoding { row: 1, .. })));
        assert_eq!(ds, before);
    }

    #[test]
    fn test_export_file_name() {
        assert_eq!(export_file_name("AllData"), "AllData_filtered_data.xlsx");
    }

    #[test]
    fn test_write_export() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(export_file_name("Dataset 2"));
        let bytes = encode(&sample()).unwrap();

        write_export(&path, &bytes).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), bytes);

        let missing_dir = temp.path().join("nope").join("out.xlsx");
        assert!(matches!(write_export(&missing_dir, &bytes), Err(ExportError::Io { .. })));
    }
}
