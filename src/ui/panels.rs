use eframe::egui::{self, Color32, RichText, Ui};

use crate::state::{AppState, DatasetView};
use crate::ui::table::data_table;

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar and the dataset tab strip.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Reload dataset").clicked() {
                state.reload_active();
                ui.close_menu();
            }
            if ui.button("Quit").clicked() {
                ui.ctx().send_viewport_cmd(egui::ViewportCommand::Close);
            }
        });

        ui.separator();
        ui.strong(state.title.as_str());
        ui.separator();

        if let Some(view) = state.views.get(state.active) {
            if let Some(full) = &view.full {
                ui.label(format!("{} rows loaded", full.n_rows()));
            } else if let Some(preview) = &view.preview {
                ui.label(format!("{} preview rows loaded", preview.n_rows()));
            }
            if let Some(result) = &view.result {
                ui.label(format!(", {} filtered", result.n_rows()));
            }
        }
    });

    ui.horizontal(|ui: &mut Ui| {
        let mut selected = None;
        for (idx, view) in state.views.iter().enumerate() {
            if ui.selectable_label(idx == state.active, view.name()).clicked() {
                selected = Some(idx);
            }
        }
        if let Some(idx) = selected {
            state.select_tab(idx);
        }
    });
}

// ---------------------------------------------------------------------------
// Dataset tab
// ---------------------------------------------------------------------------

/// What the user asked for this frame; acted on once drawing is done.
#[derive(Default)]
struct Actions {
    apply: bool,
    download: bool,
}

/// Render the active dataset: preview, filters, year range, result, export.
pub fn dataset_panel(ui: &mut Ui, state: &mut AppState) {
    let head_rows = state.preview_head_rows;
    let result_rows = state.result_rows;

    let Some(view) = state.active_view() else {
        ui.heading("No datasets configured.");
        return;
    };

    ui.heading(format!("View and Filter {}", view.name()));

    if let Some(err) = &view.load_error {
        ui.label(RichText::new(err).color(Color32::RED));
        return;
    }

    let mut actions = Actions::default();

    ui.add_space(6.0);
    ui.strong("Data Preview");
    if let Some(preview) = view.preview_table(head_rows) {
        data_table(ui, ("preview", view.name()), &preview, head_rows);
    }

    ui.separator();
    ui.strong("Filter Data");
    filter_controls(ui, view);
    year_controls(ui, view);

    ui.add_space(6.0);
    if ui.button("Apply Filters").clicked() {
        actions.apply = true;
    }

    if let Some(result) = &view.result {
        ui.separator();
        ui.strong("Filtered Data");
        data_table(ui, ("result", view.name()), result, result_rows);
        if ui.button("Download Excel").clicked() {
            actions.download = true;
        }
    }

    if let Some(msg) = &view.status_message {
        ui.label(msg.as_str());
    }

    if actions.download {
        save_dialog(view);
    }
    if actions.apply {
        state.apply_active_filters();
    }
}

/// One combo box per configured filter column, laid out side by side.
fn filter_controls(ui: &mut Ui, view: &mut DatasetView) {
    let columns = view.filter_columns();
    if columns.is_empty() {
        ui.weak("No filter columns for this dataset.");
        return;
    }

    ui.horizontal_wrapped(|ui: &mut Ui| {
        for col in &columns {
            let options = view.filter_options(col).to_vec();
            let mut current = view.filters.get(col).cloned().unwrap_or_default();

            ui.vertical(|ui: &mut Ui| {
                ui.label(col.as_str());
                egui::ComboBox::from_id_salt((view.name(), col.as_str()))
                    .selected_text(option_label(&current))
                    .width(160.0)
                    .show_ui(ui, |ui: &mut Ui| {
                        for opt in &options {
                            ui.selectable_value(&mut current, opt.clone(), option_label(opt));
                        }
                    });
            });

            if view.filters.get(col) != Some(&current) {
                view.set_filter(col, current);
            }
        }
    });
}

/// Start / end year selectors, shown only for year-filtered datasets.
fn year_controls(ui: &mut Ui, view: &mut DatasetView) {
    let years = view.year_options();
    let Some((range, warning)) = view.year_range() else {
        return;
    };

    let mut start = view.start_year.unwrap_or(range.start);
    let mut end = view.end_year.unwrap_or(range.end);

    ui.horizontal(|ui: &mut Ui| {
        ui.label("Select Start Year:");
        egui::ComboBox::from_id_salt((view.name(), "start_year"))
            .selected_text(start.to_string())
            .show_ui(ui, |ui: &mut Ui| {
                for &year in &years {
                    ui.selectable_value(&mut start, year, year.to_string());
                }
            });

        ui.label("Select End Year:");
        egui::ComboBox::from_id_salt((view.name(), "end_year"))
            .selected_text(end.to_string())
            .show_ui(ui, |ui: &mut Ui| {
                for &year in &years {
                    ui.selectable_value(&mut end, year, year.to_string());
                }
            });
    });

    view.start_year = Some(start);
    view.end_year = Some(end);

    if let Some(msg) = warning {
        ui.label(RichText::new(msg).color(Color32::RED));
    }
}

fn option_label(value: &str) -> &str {
    if value.is_empty() { "(any)" } else { value }
}

// ---------------------------------------------------------------------------
// Save dialog
// ---------------------------------------------------------------------------

fn save_dialog(view: &mut DatasetView) {
    let file = rfd::FileDialog::new()
        .set_title("Save filtered data")
        .set_file_name(view.export_file_name())
        .add_filter("Excel workbook", &["xlsx"])
        .save_file();

    if let Some(path) = file {
        view.save_export(&path);
    }
}
