use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::config::{DatasetConfig, LoadStrategy, ViewerConfig};
use crate::data::cache::DatasetCache;
use crate::data::export::{encode, export_file_name, write_export};
use crate::data::filter::{
    FilterSpec, YearRange, apply_column_filters, apply_year_range_with, year_columns,
};
use crate::data::loader::LoadMode;
use crate::data::model::Dataset;

// ---------------------------------------------------------------------------
// Per-dataset view state
// ---------------------------------------------------------------------------

/// Everything one dataset tab needs, independent of rendering.
pub struct DatasetView {
    pub config: DatasetConfig,
    strategy: LoadStrategy,
    preview_rows: usize,

    /// First rows of the source (the whole table when loaded eagerly).
    pub preview: Option<Arc<Dataset>>,
    /// The whole table, once loaded.
    pub full: Option<Arc<Dataset>>,

    /// Selected query per filter column; "" means no constraint.
    pub filters: FilterSpec,
    /// Year selections; `None` means the first / last available year.
    pub start_year: Option<i64>,
    pub end_year: Option<i64>,

    /// Filter choices per column, rebuilt whenever the loaded data changes.
    option_cache: BTreeMap<String, Vec<String>>,

    /// Result of the last "Apply Filters".
    pub result: Option<Dataset>,

    /// Error shown instead of the tab content when the source can't be read.
    pub load_error: Option<String>,
    /// Status / error message shown below the controls.
    pub status_message: Option<String>,
}

impl DatasetView {
    pub fn new(config: DatasetConfig, viewer: &ViewerConfig) -> Self {
        Self {
            config,
            strategy: viewer.load_strategy,
            preview_rows: viewer.preview_rows,
            preview: None,
            full: None,
            filters: FilterSpec::new(),
            start_year: None,
            end_year: None,
            option_cache: BTreeMap::new(),
            result: None,
            load_error: None,
            status_message: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Load the preview (lazy) or the whole table (eager) if not done yet,
    /// then the whole table the filter choices are drawn from.
    /// A failed preview load is remembered until [`DatasetView::reload`].
    pub fn ensure_loaded(&mut self, cache: &mut DatasetCache) {
        if self.preview.is_some() || self.load_error.is_some() {
            return;
        }
        let path = self.config.file_path.clone();
        let mode = match self.strategy {
            LoadStrategy::Lazy => LoadMode::Preview(self.preview_rows),
            LoadStrategy::Eager => LoadMode::Full,
        };
        match cache.get_or_load(&path, mode) {
            Ok(dataset) => {
                if mode == LoadMode::Full {
                    self.full = Some(Arc::clone(&dataset));
                }
                self.preview = Some(dataset);
                self.option_cache.clear();
            }
            Err(e) => {
                log::error!("Failed to load {}: {e:#}", self.name());
                self.load_error = Some(format!("Error loading data preview: {e:#}"));
                return;
            }
        }
        self.load_full(cache);
    }

    /// Read the whole table through the cache unless already held.
    /// Returns whether it is available; a failure lands in `status_message`.
    fn load_full(&mut self, cache: &mut DatasetCache) -> bool {
        if self.full.is_some() {
            return true;
        }
        match cache.get_or_load(&self.config.file_path, LoadMode::Full) {
            Ok(full) => {
                self.full = Some(full);
                self.option_cache.clear();
                true
            }
            Err(e) => {
                log::error!("Failed to load full {}: {e:#}", self.name());
                self.status_message = Some(format!("Error loading full data: {e:#}"));
                false
            }
        }
    }

    /// Forget everything read from disk and load again.
    pub fn reload(&mut self, cache: &mut DatasetCache) {
        cache.invalidate(&self.config.file_path);
        self.preview = None;
        self.full = None;
        self.option_cache.clear();
        self.result = None;
        self.load_error = None;
        self.status_message = None;
        self.ensure_loaded(cache);
    }

    /// The most complete table loaded so far.
    fn source(&self) -> Option<&Dataset> {
        self.full.as_deref().or(self.preview.as_deref())
    }

    /// Configured filter columns present in the loaded data.
    pub fn filter_columns(&self) -> Vec<String> {
        let Some(source) = self.source() else {
            return Vec::new();
        };
        self.config
            .filter_columns
            .iter()
            .filter(|c| source.has_column(c))
            .cloned()
            .collect()
    }

    /// Choices for a filter column: "" (no constraint) followed by the
    /// column's distinct values across the whole table. Only falls back to
    /// the preview when the whole table could not be read.
    pub fn filter_options(&mut self, column: &str) -> &[String] {
        if !self.option_cache.contains_key(column) {
            let options = match self.source() {
                Some(source) if source.has_column(column) => std::iter::once(String::new())
                    .chain(source.unique_texts(column))
                    .collect(),
                _ => Vec::new(),
            };
            self.option_cache.insert(column.to_string(), options);
        }
        &self.option_cache[column]
    }

    pub fn set_filter(&mut self, column: &str, query: String) {
        self.filters.insert(column.to_string(), query);
    }

    /// Year columns available for the range selectors, ascending.
    pub fn year_options(&self) -> Vec<i64> {
        if !self.config.apply_year_filter {
            return Vec::new();
        }
        self.source()
            .map(|ds| year_columns(ds).into_iter().map(|(y, _)| y).collect())
            .unwrap_or_default()
    }

    /// The selected year range, plus a warning when the end year had to be
    /// raised to the start year. `None` when year filtering does not apply.
    pub fn year_range(&self) -> Option<(YearRange, Option<String>)> {
        let years = self.year_options();
        let (first, last) = (*years.first()?, *years.last()?);
        let start = self.start_year.unwrap_or(first);
        let end = self.end_year.unwrap_or(last);
        Some(YearRange::reconciled(start, end))
    }

    /// First rows of the preview, with the year range applied when configured.
    /// A preview the year filter rejects is shown unprojected.
    pub fn preview_table(&self, head_rows: usize) -> Option<Dataset> {
        let preview = self.preview.as_deref()?;
        let head = preview.head(head_rows);
        let Some((range, _)) = self.year_range() else {
            return Some(head);
        };
        Some(apply_year_range_with(&head, range, self.config.identifier_policy).unwrap_or(head))
    }

    /// Load the whole table if needed, then apply the column filters and,
    /// when configured, the year range.
    pub fn apply_filters(&mut self, cache: &mut DatasetCache) {
        if !self.load_full(cache) {
            return;
        }
        let Some(full) = self.full.as_deref() else {
            return;
        };

        let mut filtered = apply_column_filters(full, &self.filters);
        if let Some((range, _)) = self.year_range() {
            match apply_year_range_with(&filtered, range, self.config.identifier_policy) {
                Ok(projected) => filtered = projected,
                Err(e) => {
                    log::error!("{}: {e}", self.name());
                    self.status_message = Some(format!("Year filter failed: {e}"));
                    return;
                }
            }
        }

        log::info!(
            "{}: {} of {} rows match {:?}",
            self.name(),
            filtered.n_rows(),
            full.n_rows(),
            self.filters
        );
        self.status_message = Some(format!("{} rows match the filters.", filtered.n_rows()));
        self.result = Some(filtered);
    }

    /// Suggested file name for the export of this view.
    pub fn export_file_name(&self) -> String {
        export_file_name(self.name())
    }

    /// Encode the current result and write it to `path`.
    /// Failures land in `status_message`; the result is kept either way.
    pub fn save_export(&mut self, path: &Path) -> bool {
        let Some(result) = &self.result else {
            self.status_message = Some("Apply the filters before downloading.".to_string());
            return false;
        };
        match encode(result).and_then(|bytes| write_export(path, &bytes)) {
            Ok(()) => {
                self.status_message = Some(format!("Saved {}", path.display()));
                true
            }
            Err(e) => {
                log::error!("Export of {} failed: {e}", self.name());
                self.status_message = Some(format!("Export failed: {e}"));
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct AppState {
    pub title: String,
    pub preview_head_rows: usize,
    pub result_rows: usize,

    /// One view per configured dataset, in tab order.
    pub views: Vec<DatasetView>,
    /// Index of the selected tab.
    pub active: usize,

    pub cache: DatasetCache,
}

impl AppState {
    pub fn new(config: ViewerConfig) -> Self {
        let views = config
            .datasets
            .iter()
            .cloned()
            .map(|ds| DatasetView::new(ds, &config))
            .collect();
        let mut state = Self {
            title: config.title.clone(),
            preview_head_rows: config.preview_head_rows,
            result_rows: config.result_rows,
            views,
            active: 0,
            cache: DatasetCache::new(),
        };
        if config.load_strategy == LoadStrategy::Eager {
            state.load_all();
        }
        state
    }

    /// Load every view up front.
    pub fn load_all(&mut self) {
        let Self { views, cache, .. } = self;
        for view in views.iter_mut() {
            view.ensure_loaded(cache);
        }
    }

    pub fn select_tab(&mut self, idx: usize) {
        if idx < self.views.len() {
            self.active = idx;
        }
    }

    /// The selected view, loaded on first access.
    pub fn active_view(&mut self) -> Option<&mut DatasetView> {
        let Self { views, cache, active, .. } = self;
        let view = views.get_mut(*active)?;
        view.ensure_loaded(cache);
        Some(view)
    }

    pub fn apply_active_filters(&mut self) {
        let Self { views, cache, active, .. } = self;
        if let Some(view) = views.get_mut(*active) {
            view.apply_filters(cache);
        }
    }

    pub fn reload_active(&mut self) {
        let Self { views, cache, active, .. } = self;
        if let Some(view) = views.get_mut(*active) {
            view.reload(cache);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use crate::data::filter::IdentifierPolicy;
    use tempfile::TempDir;

    const SUMMARY: &str = "\
Category,Model,Scenario,Region,Variable,Unit,2030,2020,2040
C1,MESSAGE,SSP1,Asia,Emissions|CO2,Mt CO2/yr,2,1,3
C2,REMIND,SSP2,Europe,Emissions|CO2,Mt CO2/yr,5,4,6
C1,GCAM,SSP1,North America,Primary Energy,EJ/yr,8,7,9
";

    fn config(dir: &Path, strategy: LoadStrategy) -> ViewerConfig {
        fs::write(dir.join("summary.csv"), SUMMARY).unwrap();
        ViewerConfig {
            load_strategy: strategy,
            preview_rows: 2,
            datasets: vec![
                DatasetConfig {
                    name: "AllData".into(),
                    file_path: dir.join("summary.csv"),
                    filter_columns: vec!["Category".into(), "Region".into(), "Missing".into()],
                    apply_year_filter: true,
                    identifier_policy: IdentifierPolicy::Skip,
                },
                DatasetConfig {
                    name: "Plain".into(),
                    file_path: dir.join("summary.csv"),
                    filter_columns: vec!["Model".into()],
                    apply_year_filter: false,
                    identifier_policy: IdentifierPolicy::Skip,
                },
                DatasetConfig {
                    name: "Broken".into(),
                    file_path: dir.join("summary.txt"),
                    filter_columns: vec![],
                    apply_year_filter: false,
                    identifier_policy: IdentifierPolicy::Skip,
                },
            ],
            ..ViewerConfig::default()
        }
    }

    #[test]
    fn test_lazy_view_loads_on_first_access() {
        let temp = TempDir::new().unwrap();
        let mut state = AppState::new(config(temp.path(), LoadStrategy::Lazy));
        assert!(state.views[0].preview.is_none());

        let view = state.active_view().unwrap();
        assert_eq!(view.preview.as_ref().unwrap().n_rows(), 2);
        assert_eq!(view.full.as_ref().unwrap().n_rows(), 3);
        assert_eq!(view.filter_columns(), vec!["Category", "Region"]);
        assert_eq!(view.filter_options("Category"), vec!["", "C1", "C2"]);
        assert!(state.views[1].full.is_none());
    }

    #[test]
    fn test_filter_options_cover_rows_beyond_the_preview() {
        let temp = TempDir::new().unwrap();
        let mut state = AppState::new(config(temp.path(), LoadStrategy::Lazy));

        let view = state.active_view().unwrap();
        assert_eq!(view.preview.as_ref().unwrap().n_rows(), 2);
        assert_eq!(
            view.filter_options("Region"),
            vec!["", "Asia", "Europe", "North America"]
        );
    }

    #[test]
    fn test_apply_filters_on_lazy_view() {
        let temp = TempDir::new().unwrap();
        let mut state = AppState::new(config(temp.path(), LoadStrategy::Lazy));

        let view = state.active_view().unwrap();
        view.set_filter("Region", "a".into());
        state.apply_active_filters();

        let view = &state.views[0];
        assert_eq!(view.full.as_ref().unwrap().n_rows(), 3);
        let result = view.result.as_ref().unwrap();
        assert_eq!(result.n_rows(), 2);
        assert_eq!(
            result.column_names(),
            vec!["Model", "Scenario", "Region", "Variable", "Unit", "2020", "2030", "2040"]
        );
    }

    #[test]
    fn test_eager_strategy_loads_everything_up_front() {
        let temp = TempDir::new().unwrap();
        let state = AppState::new(config(temp.path(), LoadStrategy::Eager));

        assert_eq!(state.views[0].preview.as_ref().unwrap().n_rows(), 3);
        assert!(state.views[1].full.is_some());
        assert!(state.views[2].load_error.as_ref().unwrap().contains("Unsupported"));
    }

    #[test]
    fn test_year_selection_is_reconciled() {
        let temp = TempDir::new().unwrap();
        let mut state = AppState::new(config(temp.path(), LoadStrategy::Lazy));
        let view = state.active_view().unwrap();

        assert_eq!(view.year_options(), vec![2020, 2030, 2040]);
        assert_eq!(view.year_range(), Some((YearRange::new(2020, 2040), None)));

        view.start_year = Some(2040);
        view.end_year = Some(2030);
        let (range, warning) = view.year_range().unwrap();
        assert_eq!(range, YearRange::new(2040, 2040));
        assert!(warning.is_some());

        let preview = view.preview_table(5).unwrap();
        assert_eq!(preview.column_names().last(), Some(&"2040"));
        assert_eq!(preview.n_columns(), 6);
    }

    #[test]
    fn test_plain_view_ignores_years() {
        let temp = TempDir::new().unwrap();
        let mut state = AppState::new(config(temp.path(), LoadStrategy::Lazy));
        state.select_tab(1);
        let view = state.active_view().unwrap();

        assert!(view.year_options().is_empty());
        assert!(view.year_range().is_none());

        view.set_filter("Model", "gcam".into());
        state.apply_active_filters();
        let result = state.views[1].result.as_ref().unwrap();
        assert_eq!(result.n_rows(), 1);
        assert_eq!(result.n_columns(), 9);
    }

    #[test]
    fn test_broken_source_reports_error() {
        let temp = TempDir::new().unwrap();
        let mut state = AppState::new(config(temp.path(), LoadStrategy::Lazy));
        state.select_tab(2);

        let view = state.active_view().unwrap();
        assert!(view.load_error.is_some());
        assert!(view.filter_options("Model").is_empty());

        state.apply_active_filters();
        assert!(state.views[2].status_message.as_ref().unwrap().contains("Error loading full data"));
    }

    #[test]
    fn test_export_keeps_result() {
        let temp = TempDir::new().unwrap();
        let mut state = AppState::new(config(temp.path(), LoadStrategy::Lazy));
        state.active_view().unwrap();
        state.apply_active_filters();

        let view = &mut state.views[0];
        assert_eq!(view.export_file_name(), "AllData_filtered_data.xlsx");

        let out = temp.path().join(view.export_file_name());
        assert!(view.save_export(&out));
        assert!(out.is_file());

        assert!(!view.save_export(&temp.path().join("missing").join("x.xlsx")));
        assert!(view.status_message.as_ref().unwrap().starts_with("Export failed"));
        assert_eq!(view.result.as_ref().unwrap().n_rows(), 3);
    }

    #[test]
    fn test_strict_identifiers_fail_apply() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("thin.csv");
        fs::write(&path, "Model,2020,2030\nGCAM,1,2\n").unwrap();

        let mut viewer = config(temp.path(), LoadStrategy::Lazy);
        viewer.datasets = vec![DatasetConfig {
            name: "Thin".into(),
            file_path: path,
            filter_columns: vec!["Model".into()],
            apply_year_filter: true,
            identifier_policy: IdentifierPolicy::Strict,
        }];
        let mut state = AppState::new(viewer);

        let view = state.active_view().unwrap();
        assert_eq!(view.preview_table(5).unwrap().n_columns(), 3);

        state.apply_active_filters();
        let view = &state.views[0];
        assert!(view.result.is_none());
        assert!(view.status_message.as_ref().unwrap().contains("Scenario"));
    }

    #[test]
    fn test_reload_picks_up_new_rows() {
        let temp = TempDir::new().unwrap();
        let mut state = AppState::new(config(temp.path(), LoadStrategy::Eager));
        assert_eq!(state.views[0].full.as_ref().unwrap().n_rows(), 3);

        let extra = format!("{SUMMARY}C3,AIM,SSP3,World,Emissions|CO2,Mt CO2/yr,1,1,1\n");
        fs::write(temp.path().join("summary.csv"), extra).unwrap();
        state.reload_active();

        assert_eq!(state.views[0].full.as_ref().unwrap().n_rows(), 4);
        assert!(state.views[0].result.is_none());
    }
}
