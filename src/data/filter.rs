use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::model::Dataset;

// ---------------------------------------------------------------------------
// Column filters: case-insensitive substring match per column
// ---------------------------------------------------------------------------

/// Per-column query strings: maps column_name → query.
/// An empty query, or a column absent from the dataset, means "no constraint".
pub type FilterSpec = BTreeMap<String, String>;

/// Columns every year-range projection keeps, in this order.
pub const IDENTIFIER_COLUMNS: [&str; 5] = ["Model", "Scenario", "Region", "Variable", "Unit"];

#[derive(Debug, Error, PartialEq)]
pub enum FilterError {
    #[error("dataset is missing identifier columns: {}", missing.join(", "))]
    SchemaMismatch { missing: Vec<String> },
}

/// The (column, query) pairs of `filters` that actually constrain `dataset`.
pub fn active_filters<'a>(dataset: &Dataset, filters: &'a FilterSpec) -> Vec<(&'a str, String)> {
    filters
        .iter()
        .filter(|(col, query)| !query.is_empty() && dataset.has_column(col))
        .map(|(col, query)| (col.as_str(), query.to_lowercase()))
        .collect()
}

/// Return indices of rows that pass all active filters.
///
/// A row passes a column filter when the cell's text form contains the query,
/// ignoring case. Missing cells (null or NaN) never match a non-empty query.
pub fn filtered_indices(dataset: &Dataset, filters: &FilterSpec) -> Vec<usize> {
    let active: Vec<_> = active_filters(dataset, filters)
        .into_iter()
        .filter_map(|(col, query)| dataset.column(col).map(|c| (c, query)))
        .collect();

    (0..dataset.n_rows())
        .filter(|&row| {
            active.iter().all(|(col, query)| {
                let cell = &col.values[row];
                !cell.is_missing() && cell.as_text().to_lowercase().contains(query.as_str())
            })
        })
        .collect()
}

/// Keep only the rows matching every active filter.
pub fn apply_column_filters(dataset: &Dataset, filters: &FilterSpec) -> Dataset {
    if active_filters(dataset, filters).is_empty() {
        return dataset.clone();
    }
    let indices = filtered_indices(dataset, filters);
    log::debug!(
        "column filters kept {} of {} rows",
        indices.len(),
        dataset.n_rows()
    );
    dataset.take_rows(&indices)
}

// ---------------------------------------------------------------------------
// Year range: column projection over integer-named columns
// ---------------------------------------------------------------------------

/// Inclusive range of years. `start > end` is a valid, empty range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearRange {
    pub start: i64,
    pub end: i64,
}

impl YearRange {
    pub fn new(start: i64, end: i64) -> Self {
        YearRange { start, end }
    }

    /// Range for a start/end selection made in the UI.
    ///
    /// An end year before the start year is snapped to the start year and a
    /// message for the user is returned alongside.
    pub fn reconciled(start: i64, end: i64) -> (Self, Option<String>) {
        if end < start {
            (
                YearRange::new(start, start),
                Some("End Year must be greater than or equal to Start Year.".to_string()),
            )
        } else {
            (YearRange::new(start, end), None)
        }
    }

    pub fn contains(&self, year: i64) -> bool {
        self.start <= year && year <= self.end
    }
}

/// What to do when identifier columns are absent during a year projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierPolicy {
    /// Keep whichever identifier columns exist.
    #[default]
    Skip,
    /// Fail with [`FilterError::SchemaMismatch`].
    Strict,
}

/// Columns whose names are made only of ASCII digits, sorted by year.
pub fn year_columns(dataset: &Dataset) -> Vec<(i64, String)> {
    let mut years: Vec<(i64, String)> = dataset
        .column_names()
        .into_iter()
        .filter(|name| !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit()))
        .filter_map(|name| name.parse::<i64>().ok().map(|y| (y, name.to_string())))
        .collect();
    years.sort();
    years
}

/// Project onto the identifier columns followed by the year columns in `range`.
/// Missing identifier columns are left out.
pub fn apply_year_range(dataset: &Dataset, range: YearRange) -> Dataset {
    let (present, missing) = split_identifiers(dataset);
    if !missing.is_empty() {
        log::warn!("year filter: identifier columns {missing:?} not found, skipping them");
    }
    project_years(dataset, &present, range)
}

/// Year projection with an explicit policy for missing identifier columns.
pub fn apply_year_range_with(
    dataset: &Dataset,
    range: YearRange,
    policy: IdentifierPolicy,
) -> Result<Dataset, FilterError> {
    let (present, missing) = split_identifiers(dataset);
    if !missing.is_empty() {
        match policy {
            IdentifierPolicy::Strict => {
                return Err(FilterError::SchemaMismatch {
                    missing: missing.iter().map(|s| s.to_string()).collect(),
                });
            }
            IdentifierPolicy::Skip => {
                log::warn!("year filter: identifier columns {missing:?} not found, skipping them");
            }
        }
    }
    Ok(project_years(dataset, &present, range))
}

fn split_identifiers(dataset: &Dataset) -> (Vec<&'static str>, Vec<&'static str>) {
    IDENTIFIER_COLUMNS
        .iter()
        .partition(|name| dataset.has_column(name))
}

fn project_years(dataset: &Dataset, identifiers: &[&str], range: YearRange) -> Dataset {
    let mut selected: Vec<String> = identifiers.iter().map(|s| s.to_string()).collect();
    selected.extend(
        year_columns(dataset)
            .into_iter()
            .filter(|(year, _)| range.contains(*year))
            .map(|(_, name)| name),
    );
    dataset.project(&selected)
}
