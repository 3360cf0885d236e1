use std::sync::Arc;

use moka::sync::Cache;

/// Canonical page image kept for retries, keyed by result uuid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedImage {
    pub bytes: Arc<Vec<u8>>,
    pub mime_type: String,
    pub extract_images: bool,
}

/// Default budget: 512 MiB of canonical JPEGs.
const DEFAULT_MAX_BYTES: u64 = 512 * 1024 * 1024;

/// Size-bounded cache of normalized page images.
///
/// Evicted pages simply cannot be retried any more.
#[derive(Clone)]
pub struct ImageCache {
    inner: Cache<String, CachedImage>,
}

impl ImageCache {
    pub fn new() -> Self {
        Self::with_max_bytes(DEFAULT_MAX_BYTES)
    }

    pub fn with_max_bytes(max_bytes: u64) -> Self {
        let inner = Cache::builder()
            .max_capacity(max_bytes)
            .weigher(|_key: &String, image: &CachedImage| {
                u32::try_from(image.bytes.len()).unwrap_or(u32::MAX)
            })
            .build();
        Self { inner }
    }

    pub fn insert(&self, uuid: impl Into<String>, image: CachedImage) {
        self.inner.insert(uuid.into(), image);
    }

    pub fn get(&self, uuid: &str) -> Option<CachedImage> {
        self.inner.get(uuid)
    }

    pub fn contains(&self, uuid: &str) -> bool {
        self.inner.contains_key(uuid)
    }
}

impl Default for ImageCache {
    fn default() -> Self {
        Self::new()
    }
}
