/// Data layer: core types, loading, caching, filtering and export.
///
/// Architecture:
/// ```text
///  .csv / .xlsx / .parquet / .json
///        │
///        ▼
///   ┌──────────┐     ┌─────────┐
///   │  loader   │◀────│  cache   │  memoized Arc<Dataset> per (file, mode)
///   └──────────┘     └─────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ Dataset   │  ordered named columns, immutable
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  substring row filters, year-range column projection
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  export   │  Dataset → .xlsx bytes
///   └──────────┘
/// ```

pub mod cache;
pub mod export;
pub mod filter;
pub mod loader;
pub mod model;
