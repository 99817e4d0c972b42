use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use anyhow::Result;

use super::loader::{LoadMode, load_file};
use super::model::Dataset;

// ---------------------------------------------------------------------------
// Dataset cache: avoid re-parsing the same source file
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct CacheEntry {
    dataset: Arc<Dataset>,
    modified: Option<SystemTime>,
}

/// Memoizes loaded datasets by (file, load mode).
///
/// An entry is reused while the file's modification time is unchanged.
/// Callers drop entries explicitly with [`DatasetCache::invalidate`] or
/// [`DatasetCache::clear`].
#[derive(Debug, Default)]
pub struct DatasetCache {
    entries: HashMap<(PathBuf, LoadMode), CacheEntry>,
}

impl DatasetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached dataset for `path`/`mode`, loading it on a miss.
    pub fn get_or_load(&mut self, path: &Path, mode: LoadMode) -> Result<Arc<Dataset>> {
        let key = (cache_key(path), mode);
        let modified = modified_time(path);

        if let Some(entry) = self.entries.get(&key) {
            if entry.modified == modified {
                log::debug!("cache hit: {} ({mode:?})", path.display());
                return Ok(Arc::clone(&entry.dataset));
            }
            log::debug!("cache stale: {} changed on disk", path.display());
        }

        let dataset = Arc::new(load_file(path, mode)?);
        self.entries.insert(
            key,
            CacheEntry {
                dataset: Arc::clone(&dataset),
                modified,
            },
        );
        Ok(dataset)
    }

    /// Drop every cached load of `path`.
    pub fn invalidate(&mut self, path: &Path) {
        let target = cache_key(path);
        self.entries.retain(|(p, _), _| *p != target);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn cache_key(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;

    use tempfile::TempDir;

    #[test]
    fn test_second_load_is_shared() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.csv");
        fs::write(&path, "Model,2020\nA,1\nB,2\n").unwrap();

        let mut cache = DatasetCache::new();
        let first = cache.get_or_load(&path, LoadMode::Full).unwrap();
        let second = cache.get_or_load(&path, LoadMode::Full).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_modes_are_cached_separately() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.csv");
        fs::write(&path, "Model\nA\nB\nC\n").unwrap();

        let mut cache = DatasetCache::new();
        let preview = cache.get_or_load(&path, LoadMode::Preview(1)).unwrap();
        let full = cache.get_or_load(&path, LoadMode::Full).unwrap();
        assert_eq!(preview.n_rows(), 1);
        assert_eq!(full.n_rows(), 3);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_invalidate_forces_reload() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.csv");
        fs::write(&path, "Model\nA\n").unwrap();

        let mut cache = DatasetCache::new();
        let first = cache.get_or_load(&path, LoadMode::Full).unwrap();
        cache.get_or_load(&path, LoadMode::Preview(10)).unwrap();

        cache.invalidate(&path);
        assert!(cache.is_empty());

        let again = cache.get_or_load(&path, LoadMode::Full).unwrap();
        assert!(!Arc::ptr_eq(&first, &again));
        assert_eq!(*first, *again);
    }

    #[test]
    fn test_changed_file_is_reloaded() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.csv");
        fs::write(&path, "Model\nA\n").unwrap();

        let mut cache = DatasetCache::new();
        let first = cache.get_or_load(&path, LoadMode::Full).unwrap();

        fs::write(&path, "Model\nA\nB\n").unwrap();
        let file = fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(60)).unwrap();

        let second = cache.get_or_load(&path, LoadMode::Full).unwrap();
        assert_eq!(first.n_rows(), 1);
        assert_eq!(second.n_rows(), 2);
    }

    #[test]
    fn test_load_errors_are_not_cached() {
        let temp = TempDir::new().unwrap();
        let mut cache = DatasetCache::new();
        assert!(cache.get_or_load(&temp.path().join("missing.csv"), LoadMode::Full).is_err());
        assert!(cache.is_empty());
    }
}
