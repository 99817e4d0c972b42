//! Desktop viewer for tabular datasets: per-column substring filters,
//! year-range column selection, and export of the result to `.xlsx`.

pub mod app;
pub mod config;
pub mod data;
pub mod state;
pub mod ui;
