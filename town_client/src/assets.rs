//! Asset cache.
//!
//! Images are fetched once per path and shared. Concurrent loads of the same
//! path wait on a single in-flight fetch; a failed load leaves the slot empty
//! so a later request can try again.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::OnceCell;
use town_shared::error::AssetLoadError;
use tracing::{debug, info, warn};

/// Asset path of a character sprite sheet.
pub fn character_asset(sprite: &str) -> String {
    format!("characters/{sprite}")
}

/// Asset path of a scene item image.
pub fn item_asset(image: &str) -> String {
    format!("items/{image}")
}

/// Asset path of a floor texture.
pub fn floor_asset(texture: &str) -> String {
    format!("scenes/{texture}")
}

/// Where raw asset bytes come from.
#[async_trait]
pub trait AssetSource: Send + Sync {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, AssetLoadError>;
}

/// Fetches assets from the game server's static directory.
pub struct HttpAssetSource {
    client: reqwest::Client,
    base: String,
}

impl HttpAssetSource {
    pub fn new(client: reqwest::Client, api_base: &str) -> Self {
        Self {
            client,
            base: api_base.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl AssetSource for HttpAssetSource {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, AssetLoadError> {
        let url = format!("{}/static/assets/{}", self.base, path);
        let fetch_err = |e: reqwest::Error| AssetLoadError::Fetch {
            path: path.to_string(),
            reason: e.to_string(),
        };
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(fetch_err)?;
        let bytes = resp.bytes().await.map_err(fetch_err)?;
        Ok(bytes.to_vec())
    }
}

/// Reads assets from a local directory tree.
pub struct DirAssetSource {
    root: PathBuf,
}

impl DirAssetSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl AssetSource for DirAssetSource {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, AssetLoadError> {
        tokio::fs::read(self.root.join(path))
            .await
            .map_err(|e| AssetLoadError::Fetch {
                path: path.to_string(),
                reason: e.to_string(),
            })
    }
}

/// A decoded image.
#[derive(Debug)]
pub struct Texture {
    path: String,
    image: image::RgbaImage,
}

impl Texture {
    pub fn decode(path: &str, bytes: &[u8]) -> Result<Self, AssetLoadError> {
        let image = image::load_from_memory(bytes)
            .map_err(|e| AssetLoadError::Decode {
                path: path.to_string(),
                reason: e.to_string(),
            })?
            .to_rgba8();
        Ok(Self {
            path: path.to_string(),
            image,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// False for zero-sized images, which are drawn with the fallback.
    pub fn is_drawable(&self) -> bool {
        self.width() > 0 && self.height() > 0
    }
}

type Slot = Arc<OnceCell<Arc<Texture>>>;

fn locked<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared, grow-only image cache.
pub struct AssetCache {
    source: Arc<dyn AssetSource>,
    slots: Mutex<HashMap<String, Slot>>,
    /// Paths with a spawned preload that has not finished.
    pending: Mutex<HashSet<String>>,
}

impl AssetCache {
    pub fn new(source: Arc<dyn AssetSource>) -> Self {
        Self {
            source,
            slots: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashSet::new()),
        }
    }

    fn slot(&self, path: &str) -> Slot {
        Arc::clone(locked(&self.slots).entry(path.to_string()).or_default())
    }

    /// Loads `path`, sharing any fetch already in flight for it.
    pub async fn load(&self, path: &str) -> Result<Arc<Texture>, AssetLoadError> {
        let slot = self.slot(path);
        let texture = slot
            .get_or_try_init(|| async {
                debug!(path, "Fetching asset");
                let bytes = self.source.fetch(path).await?;
                let texture = Texture::decode(path, &bytes)?;
                info!(
                    path,
                    width = texture.width(),
                    height = texture.height(),
                    "Asset loaded"
                );
                Ok::<_, AssetLoadError>(Arc::new(texture))
            })
            .await?;
        Ok(Arc::clone(texture))
    }

    /// Returns the decoded image if it has finished loading. Never waits.
    pub fn get(&self, path: &str) -> Option<Arc<Texture>> {
        locked(&self.slots).get(path).and_then(|s| s.get().cloned())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    pub fn is_pending(&self, path: &str) -> bool {
        locked(&self.pending).contains(path)
    }

    /// Number of decoded images.
    pub fn len(&self) -> usize {
        locked(&self.slots)
            .values()
            .filter(|s| s.initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Starts a background load unless `path` is cached or already loading.
    ///
    /// Returns whether a load was started. Must be called inside a tokio
    /// runtime.
    pub fn preload(self: &Arc<Self>, path: &str) -> bool {
        if self.contains(path) {
            return false;
        }
        if !locked(&self.pending).insert(path.to_string()) {
            return false;
        }

        let cache = Arc::clone(self);
        let path = path.to_string();
        tokio::spawn(async move {
            if let Err(e) = cache.load(&path).await {
                warn!(error = %e, "Asset preload failed");
            }
            locked(&cache.pending).remove(&path);
        });
        true
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        image::RgbaImage::new(width, height)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    /// Serves fixed-size PNGs, counting fetches per call.
    #[derive(Default)]
    pub(crate) struct CountingSource {
        pub fetches: AtomicUsize,
        pub fail_first: bool,
        pub width: u32,
    }

    #[async_trait]
    impl AssetSource for CountingSource {
        async fn fetch(&self, path: &str) -> Result<Vec<u8>, AssetLoadError> {
            let n = self.fetches.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self.fail_first && n == 0 {
                return Err(AssetLoadError::Fetch {
                    path: path.to_string(),
                    reason: "404".into(),
                });
            }
            Ok(png_bytes(self.width.max(1), 32))
        }
    }

    #[tokio::test]
    async fn concurrent_loads_share_one_fetch() {
        let source = Arc::new(CountingSource {
            width: 96,
            ..Default::default()
        });
        let cache = Arc::new(AssetCache::new(source.clone()));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move {
                cache.load("characters/char7.png").await
            }));
        }
        let mut textures = Vec::new();
        for h in handles {
            textures.push(h.await.unwrap().unwrap());
        }

        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
        assert!(textures.iter().all(|t| Arc::ptr_eq(t, &textures[0])));
        assert_eq!(textures[0].width(), 96);
    }

    #[tokio::test]
    async fn failed_load_is_not_cached() {
        let source = Arc::new(CountingSource {
            fail_first: true,
            width: 32,
            ..Default::default()
        });
        let cache = AssetCache::new(source.clone());

        assert!(cache.load("items/tree.png").await.is_err());
        assert!(!cache.contains("items/tree.png"));

        let texture = cache.load("items/tree.png").await.unwrap();
        assert_eq!(texture.path(), "items/tree.png");
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn preload_skips_cached_and_in_flight_paths() {
        let source = Arc::new(CountingSource {
            width: 32,
            ..Default::default()
        });
        let cache = Arc::new(AssetCache::new(source.clone()));

        assert!(cache.preload("characters/a.png"));
        assert!(cache.is_pending("characters/a.png"));
        assert!(!cache.preload("characters/a.png"));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(cache.contains("characters/a.png"));
        assert!(!cache.is_pending("characters/a.png"));
        assert!(!cache.preload("characters/a.png"));
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn garbage_bytes_fail_to_decode() {
        let err = Texture::decode("items/x.png", b"not a png").unwrap_err();
        assert!(matches!(err, AssetLoadError::Decode { .. }));
    }

    #[tokio::test]
    async fn dir_source_reads_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("items")).unwrap();
        std::fs::write(dir.path().join("items/rock.png"), png_bytes(64, 64)).unwrap();

        let cache = AssetCache::new(Arc::new(DirAssetSource::new(dir.path())));
        let texture = cache.load(&item_asset("rock.png")).await.unwrap();
        assert_eq!((texture.width(), texture.height()), (64, 64));
        assert!(cache.load("items/missing.png").await.is_err());
    }
}
