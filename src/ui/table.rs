use eframe::egui::{self, ScrollArea, Ui};
use egui_extras::{Column as TableColumn, TableBuilder};

use crate::data::model::Dataset;

const ROW_HEIGHT: f32 = 18.0;

// ---------------------------------------------------------------------------
// Read-only table of a dataset
// ---------------------------------------------------------------------------

/// Render the first `max_rows` rows of `dataset` with its column headers.
/// `id` must be unique among tables shown in the same frame.
pub fn data_table(ui: &mut Ui, id: impl std::hash::Hash, dataset: &Dataset, max_rows: usize) {
    let n_rows = dataset.n_rows().min(max_rows);

    if dataset.n_columns() == 0 {
        ui.label("No columns.");
        return;
    }

    ui.push_id(id, |ui: &mut Ui| {
        ScrollArea::horizontal().show(ui, |ui: &mut Ui| {
            TableBuilder::new(ui)
                .striped(true)
                .resizable(true)
                .vscroll(false)
                .cell_layout(egui::Layout::left_to_right(egui::Align::Center))
                .columns(TableColumn::auto().at_least(60.0), dataset.n_columns())
                .header(ROW_HEIGHT + 2.0, |mut header| {
                    for name in dataset.column_names() {
                        header.col(|ui: &mut Ui| {
                            ui.strong(name);
                        });
                    }
                })
                .body(|body| {
                    body.rows(ROW_HEIGHT, n_rows, |mut row| {
                        let i = row.index();
                        for column in dataset.columns() {
                            row.col(|ui: &mut Ui| {
                                ui.label(column.values[i].to_string());
                            });
                        }
                    });
                });
        });
    });

    if dataset.n_rows() > n_rows {
        ui.weak(format!("Showing {n_rows} of {} rows", dataset.n_rows()));
    } else {
        ui.weak(format!("{} rows", dataset.n_rows()));
    }
}
