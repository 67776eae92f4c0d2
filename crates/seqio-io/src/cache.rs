//! Shared cache of file descriptions.
//!
//! Opening a file only to read its header is the most frequent I/O the
//! pipelines do: every region-of-definition query and every file change needs
//! the sub-image specs. [`SpecCache`] keeps them per path behind a
//! reader-writer lock and hands out `Arc<[ImageSpec]>`, so purging the cache
//! never disturbs a render that already holds a spec list.
//!
//! One cache is created by the host (or the CLI) and passed to every
//! pipeline instance that should share it.
//!
//! [`InputCache`] is the per-reader counterpart for pixels: it keeps the
//! last few opened files so the tiles of one frame decode it once.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use seqio_core::ImageSpec;
use tracing::debug;

use crate::codec::ImageInput;
use crate::IoResult;

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups served from the cache.
    pub hits: u64,
    /// Lookups that had to load.
    pub misses: u64,
    /// Entries currently stored.
    pub entries: usize,
}

impl CacheStats {
    /// Hit rate as percentage.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// Path-keyed spec cache.
#[derive(Debug, Default)]
pub struct SpecCache {
    entries: RwLock<HashMap<PathBuf, Arc<[ImageSpec]>>>,
    stats: RwLock<CacheStats>,
}

impl SpecCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached specs of `path`, calling `load` on a miss.
    ///
    /// Failed loads are not cached.
    pub fn get_or_load<F>(&self, path: &Path, load: F) -> IoResult<Arc<[ImageSpec]>>
    where
        F: FnOnce(&Path) -> IoResult<Vec<ImageSpec>>,
    {
        if let Some(specs) = self.entries.read().unwrap().get(path) {
            self.stats.write().unwrap().hits += 1;
            return Ok(Arc::clone(specs));
        }

        let specs: Arc<[ImageSpec]> = load(path)?.into();
        let mut entries = self.entries.write().unwrap();
        // Another thread may have loaded it meanwhile; keep the first.
        let specs = Arc::clone(entries.entry(path.to_path_buf()).or_insert(specs));
        let mut stats = self.stats.write().unwrap();
        stats.misses += 1;
        stats.entries = entries.len();
        debug!(path = %path.display(), "spec cache miss");
        Ok(specs)
    }

    /// Cached specs of `path` without loading.
    pub fn get(&self, path: &Path) -> Option<Arc<[ImageSpec]>> {
        self.entries.read().unwrap().get(path).cloned()
    }

    /// Drops the entry of `path`.
    pub fn invalidate(&self, path: &Path) {
        let mut entries = self.entries.write().unwrap();
        entries.remove(path);
        self.stats.write().unwrap().entries = entries.len();
    }

    /// Drops every entry.
    pub fn clear(&self) {
        let mut entries = self.entries.write().unwrap();
        let dropped = entries.len();
        entries.clear();
        self.stats.write().unwrap().entries = 0;
        debug!(dropped, "spec cache cleared");
    }

    /// Number of cached paths.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    /// True when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current statistics.
    pub fn stats(&self) -> CacheStats {
        *self.stats.read().unwrap()
    }
}

/// An open input shared by the renders of one frame.
pub type SharedInput = Arc<Mutex<Box<dyn ImageInput>>>;

/// Default number of open inputs a reader keeps: the frame and its proxy.
pub const OPEN_INPUTS: usize = 2;

type InputKey = (PathBuf, Option<i32>);

/// Most recently used open inputs, keyed by path and stream frame.
pub struct InputCache {
    capacity: usize,
    entries: Mutex<VecDeque<(InputKey, SharedInput)>>,
}

impl InputCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::new()),
        }
    }

    /// Open input for `path` and `frame`, calling `open` on a miss.
    ///
    /// The least recently used input is closed once `capacity` is exceeded.
    pub fn get_or_open<F>(&self, path: &Path, frame: Option<i32>, open: F) -> IoResult<SharedInput>
    where
        F: FnOnce(&Path) -> IoResult<Box<dyn ImageInput>>,
    {
        {
            let mut entries = self.entries.lock().unwrap();
            if let Some(pos) = entries.iter().position(|((p, f), _)| p == path && *f == frame) {
                if let Some(entry) = entries.remove(pos) {
                    let input = Arc::clone(&entry.1);
                    entries.push_front(entry);
                    return Ok(input);
                }
            }
        }

        // Decode outside the lock; a racing open of the same file is harmless.
        let input: SharedInput = Arc::new(Mutex::new(open(path)?));
        let mut entries = self.entries.lock().unwrap();
        entries.push_front(((path.to_path_buf(), frame), Arc::clone(&input)));
        entries.truncate(self.capacity);
        debug!(path = %path.display(), ?frame, "opened input");
        Ok(input)
    }

    /// Number of open inputs.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Closes every input not held by a render.
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}

impl Default for InputCache {
    fn default() -> Self {
        Self::new(OPEN_INPUTS)
    }
}

impl std::fmt::Debug for InputCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputCache")
            .field("capacity", &self.capacity)
            .field("open", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seqio_core::BitDepth;

    fn load(_: &Path) -> IoResult<Vec<ImageSpec>> {
        Ok(vec![ImageSpec::rgba(8, 8, BitDepth::F16)])
    }

    #[test]
    fn test_hits_and_misses() {
        let cache = SpecCache::new();
        let p = Path::new("/shots/a.0001.exr");
        let a = cache.get_or_load(p, load).unwrap();
        let b = cache.get_or_load(p, |_| panic!("should be cached")).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.entries), (1, 1, 1));
        assert_eq!(stats.hit_rate(), 50.0);
    }

    #[test]
    fn test_purge_keeps_held_specs_valid() {
        let cache = SpecCache::new();
        let p = Path::new("/shots/a.0001.exr");
        let held = cache.get_or_load(p, load).unwrap();
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(held[0].width, 8);
        assert!(cache.get(p).is_none());
    }

    #[test]
    fn test_inputs_opened_once_and_evicted() {
        use crate::memory::{MemoryCodec, MemoryImage, MemoryStore};
        use crate::Decoder;

        let store = Arc::new(MemoryStore::new());
        let codec = MemoryCodec::new(Arc::clone(&store));
        for name in ["a.mem", "b.mem", "c.mem"] {
            let image = MemoryImage::from_samples(ImageSpec::rgb(1, 1, BitDepth::F32), vec![0.0; 3]).unwrap();
            store.insert(name, image);
        }

        let inputs = InputCache::new(2);
        let a = inputs.get_or_open(Path::new("a.mem"), None, |p| codec.open(p)).unwrap();
        let again = inputs
            .get_or_open(Path::new("a.mem"), None, |_| panic!("should be open"))
            .unwrap();
        assert!(Arc::ptr_eq(&a, &again));

        inputs.get_or_open(Path::new("b.mem"), None, |p| codec.open(p)).unwrap();
        inputs.get_or_open(Path::new("c.mem"), None, |p| codec.open(p)).unwrap();
        assert_eq!(inputs.len(), 2);
        // a was least recently used and is gone; held handles stay usable
        let reopened = inputs.get_or_open(Path::new("a.mem"), None, |p| codec.open(p)).unwrap();
        assert!(!Arc::ptr_eq(&a, &reopened));
        assert_eq!(a.lock().unwrap().specs().len(), 1);

        inputs.clear();
        assert!(inputs.is_empty());
    }

    #[test]
    fn test_failed_load_not_cached() {
        let cache = SpecCache::new();
        let p = Path::new("/missing.exr");
        assert!(cache
            .get_or_load(p, |p| Err(crate::IoError::file_open(p, "missing")))
            .is_err());
        assert!(cache.get(p).is_none());
        cache.get_or_load(p, load).unwrap();
        cache.invalidate(p);
        assert_eq!(cache.len(), 0);
    }
}
