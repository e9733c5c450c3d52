//! Image roles, sources, and resolution.
//!
//! A pass carries up to six named images, each in up to three resolutions.
//! Every slot holds an [`ImageSource`]: raw bytes, a file path, or a deferred
//! producer. [`ImageSet::resolve_all`] turns all sources into bytes
//! concurrently and waits for every one of them before returning, so the
//! manifest is always computed over a complete set.
//!
//! # Examples
//!
//! ```no_run
//! use passkit::images::{ImageKey, ImageRole, ImageSet, ImageSource, Resolution};
//!
//! let mut images = ImageSet::new();
//! images.set(ImageRole::Icon, ImageSource::from(std::fs::read("icon.png")?));
//! images.set(ImageKey::new(ImageRole::Icon, Resolution::Double), "icon@2x.png");
//! images.set(ImageRole::Logo, ImageSource::deferred(|| async {
//!     tokio::fs::read("logo.png").await
//! }));
//! # Ok::<(), passkit::Error>(())
//! ```

use crate::error::BoxError;
use crate::{Error, Result};
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// Named image slot of a pass.
///
/// Declaration order is the order images are written to the package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ImageRole {
    Background,
    Footer,
    Icon,
    Logo,
    Strip,
    Thumbnail,
}

impl ImageRole {
    pub const ALL: [ImageRole; 6] = [
        ImageRole::Background,
        ImageRole::Footer,
        ImageRole::Icon,
        ImageRole::Logo,
        ImageRole::Strip,
        ImageRole::Thumbnail,
    ];

    /// Roles a pass cannot be generated without.
    pub const REQUIRED: [ImageRole; 2] = [ImageRole::Icon, ImageRole::Logo];

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageRole::Background => "background",
            ImageRole::Footer => "footer",
            ImageRole::Icon => "icon",
            ImageRole::Logo => "logo",
            ImageRole::Strip => "strip",
            ImageRole::Thumbnail => "thumbnail",
        }
    }

    fn parse(name: &str) -> Option<Self> {
        ImageRole::ALL.into_iter().find(|role| role.as_str() == name)
    }
}

impl fmt::Display for ImageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolution variant of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Resolution {
    Standard,
    Double,
    Triple,
}

impl Resolution {
    pub const ALL: [Resolution; 3] = [Resolution::Standard, Resolution::Double, Resolution::Triple];

    /// Suffix of the slot key (`icon2x`).
    fn key_suffix(&self) -> &'static str {
        match self {
            Resolution::Standard => "",
            Resolution::Double => "2x",
            Resolution::Triple => "3x",
        }
    }

    /// Suffix of the file name stem (`icon@2x.png`).
    fn file_suffix(&self) -> &'static str {
        match self {
            Resolution::Standard => "",
            Resolution::Double => "@2x",
            Resolution::Triple => "@3x",
        }
    }
}

/// A role at a given resolution: one image slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageKey {
    pub role: ImageRole,
    pub resolution: Resolution,
}

impl ImageKey {
    pub fn new(role: ImageRole, resolution: Resolution) -> Self {
        Self { role, resolution }
    }

    /// Every slot, in package order.
    pub fn all() -> impl Iterator<Item = ImageKey> {
        ImageRole::ALL.into_iter().flat_map(|role| {
            Resolution::ALL
                .into_iter()
                .map(move |resolution| ImageKey::new(role, resolution))
        })
    }

    /// Slot key such as `icon` or `logo2x`.
    pub fn key(&self) -> String {
        format!("{}{}", self.role.as_str(), self.resolution.key_suffix())
    }

    /// Member name inside the package, such as `icon.png` or `logo@2x.png`.
    pub fn file_name(&self) -> String {
        format!("{}{}.png", self.role.as_str(), self.resolution.file_suffix())
    }

    /// Parses a slot key (`strip`, `strip2x`, `strip3x`).
    pub fn parse_key(key: &str) -> Option<Self> {
        Self::split(key, "")
    }

    /// Parses a package member name (`strip.png`, `strip@2x.png`).
    pub fn from_file_name(name: &str) -> Option<Self> {
        let stem = name.strip_suffix(".png")?;
        Self::split(stem, "@")
    }

    fn split(stem: &str, marker: &str) -> Option<Self> {
        for resolution in [Resolution::Triple, Resolution::Double] {
            let suffix = format!("{}{}", marker, resolution.key_suffix());
            if let Some(role) = stem.strip_suffix(suffix.as_str()).and_then(ImageRole::parse) {
                return Some(ImageKey::new(role, resolution));
            }
        }
        ImageRole::parse(stem).map(ImageKey::from)
    }
}

impl From<ImageRole> for ImageKey {
    fn from(role: ImageRole) -> Self {
        ImageKey::new(role, Resolution::Standard)
    }
}

impl fmt::Display for ImageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// Future returned by a deferred image producer.
pub type ImageFuture = BoxFuture<'static, std::result::Result<Vec<u8>, BoxError>>;

/// A zero-argument producer of image bytes, invoked during generation.
///
/// The producer may be invoked once per pass it is attached to, so a
/// template can share one producer among all of its passes.
#[derive(Clone)]
pub struct DeferredImage(Arc<dyn Fn() -> ImageFuture + Send + Sync>);

impl DeferredImage {
    /// Invokes the producer and awaits its single outcome.
    ///
    /// A panic while invoking or polling the producer is reported the same
    /// way as a returned failure.
    async fn produce(&self, key: ImageKey) -> Result<Vec<u8>> {
        let future = std::panic::catch_unwind(AssertUnwindSafe(|| (self.0)()))
            .map_err(|panic| Error::image(key.key(), panic_message(panic)))?;

        match AssertUnwindSafe(future).catch_unwind().await {
            Ok(Ok(bytes)) => Ok(bytes),
            Ok(Err(e)) => Err(Error::image(key.key(), e)),
            Err(panic) => Err(Error::image(key.key(), panic_message(panic))),
        }
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("image producer panicked: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("image producer panicked: {}", s)
    } else {
        "image producer panicked".to_string()
    }
}

/// Where the bytes of an image come from.
#[derive(Clone)]
pub enum ImageSource {
    /// Bytes already in memory.
    Bytes(Vec<u8>),
    /// File read in full at generation time.
    Path(PathBuf),
    /// Producer invoked at generation time.
    Deferred(DeferredImage),
}

impl ImageSource {
    /// Wraps an async producer.
    ///
    /// ```
    /// use passkit::images::ImageSource;
    ///
    /// let source = ImageSource::deferred(|| async { Ok::<_, std::io::Error>(vec![0u8; 16]) });
    /// assert!(matches!(source, ImageSource::Deferred(_)));
    /// ```
    pub fn deferred<F, Fut, E>(producer: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Vec<u8>, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        ImageSource::Deferred(DeferredImage(Arc::new(move || -> ImageFuture {
            producer().map(|result| result.map_err(Into::into)).boxed()
        })))
    }

    /// Builds a source from a JSON value: a string is a file path, an array
    /// of integers in `0..=255` is raw bytes. Anything else is rejected with
    /// an error naming `key`.
    pub fn from_json(key: &str, value: &Value) -> Result<Self> {
        match value {
            Value::String(path) => Ok(ImageSource::Path(PathBuf::from(path))),
            Value::Array(items) => items
                .iter()
                .map(|item| item.as_u64().and_then(|n| u8::try_from(n).ok()))
                .collect::<Option<Vec<u8>>>()
                .map(ImageSource::Bytes)
                .ok_or_else(|| Error::image(key, "byte array must contain integers 0-255")),
            _ => Err(Error::image(
                key,
                "must be a file path (string) or bytes (array of integers)",
            )),
        }
    }

    /// Produces the bytes of this source.
    pub async fn resolve(self, key: ImageKey) -> Result<Vec<u8>> {
        match self {
            ImageSource::Bytes(bytes) => Ok(bytes),
            ImageSource::Path(path) => tokio::fs::read(&path)
                .await
                .map_err(|e| Error::image(key.key(), e)),
            ImageSource::Deferred(producer) => producer.produce(key).await,
        }
    }
}

impl fmt::Debug for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageSource::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            ImageSource::Path(path) => f.debug_tuple("Path").field(path).finish(),
            ImageSource::Deferred(_) => f.write_str("Deferred"),
        }
    }
}

impl From<Vec<u8>> for ImageSource {
    fn from(bytes: Vec<u8>) -> Self {
        ImageSource::Bytes(bytes)
    }
}

impl From<&[u8]> for ImageSource {
    fn from(bytes: &[u8]) -> Self {
        ImageSource::Bytes(bytes.to_vec())
    }
}

impl From<PathBuf> for ImageSource {
    fn from(path: PathBuf) -> Self {
        ImageSource::Path(path)
    }
}

impl From<&Path> for ImageSource {
    fn from(path: &Path) -> Self {
        ImageSource::Path(path.to_path_buf())
    }
}

impl From<&str> for ImageSource {
    fn from(path: &str) -> Self {
        ImageSource::Path(PathBuf::from(path))
    }
}

/// Image slots of a template or pass.
#[derive(Debug, Clone, Default)]
pub struct ImageSet {
    sources: BTreeMap<ImageKey, ImageSource>,
}

impl ImageSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the source of a slot, replacing any previous one.
    pub fn set(&mut self, key: impl Into<ImageKey>, source: impl Into<ImageSource>) -> &mut Self {
        self.sources.insert(key.into(), source.into());
        self
    }

    pub fn get(&self, key: impl Into<ImageKey>) -> Option<&ImageSource> {
        self.sources.get(&key.into())
    }

    pub fn remove(&mut self, key: impl Into<ImageKey>) -> Option<ImageSource> {
        self.sources.remove(&key.into())
    }

    pub fn contains(&self, key: impl Into<ImageKey>) -> bool {
        self.sources.contains_key(&key.into())
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Slots in package order.
    pub fn iter(&self) -> impl Iterator<Item = (&ImageKey, &ImageSource)> {
        self.sources.iter()
    }

    /// Registers every recognized image file in `dir`.
    ///
    /// Only the top level of the directory is scanned and symbolic links are
    /// followed. Files named
    /// `<role>.png`, `<role>@2x.png` or `<role>@3x.png` are registered as path
    /// sources; anything else is skipped. Returns the number of images
    /// registered.
    pub fn load_from(&mut self, dir: impl AsRef<Path>) -> Result<usize> {
        let dir = dir.as_ref();
        let mut count = 0;

        let walker = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name();
        for entry in walker {
            let entry = entry.map_err(|e| {
                Error::Io(std::io::Error::other(format!(
                    "Failed to read image directory {}: {}",
                    dir.display(),
                    e
                )))
            })?;

            if !entry.file_type().is_file() {
                continue;
            }

            let name = entry.file_name().to_string_lossy();
            match ImageKey::from_file_name(&name) {
                Some(key) => {
                    let path = std::fs::canonicalize(entry.path())?;
                    tracing::debug!(image = %key, path = %path.display(), "registered image");
                    self.sources.insert(key, ImageSource::Path(path));
                    count += 1;
                }
                None => tracing::trace!(file = %name, "ignoring non-image file"),
            }
        }

        Ok(count)
    }

    /// Resolves one slot, caching the bytes back into the set.
    ///
    /// Returns `Ok(None)` when the slot is empty.
    pub async fn resolve(&mut self, key: impl Into<ImageKey>) -> Result<Option<Vec<u8>>> {
        let key = key.into();
        let Some(source) = self.sources.get(&key).cloned() else {
            return Ok(None);
        };
        let bytes = source.resolve(key).await?;
        self.sources.insert(key, ImageSource::Bytes(bytes.clone()));
        Ok(Some(bytes))
    }

    /// Resolves every slot concurrently.
    ///
    /// All resolutions run to completion before this returns. If any of them
    /// failed, the first failure in package order is returned and the
    /// results of its siblings are discarded. On success the bytes are
    /// cached back into the set and returned in package order.
    pub async fn resolve_all(&mut self) -> Result<Vec<(ImageKey, Vec<u8>)>> {
        let tasks = self.sources.iter().map(|(key, source)| {
            let key = *key;
            let source = source.clone();
            async move { (key, source.resolve(key).await) }
        });

        let mut resolved = Vec::with_capacity(self.sources.len());
        for (key, result) in join_all(tasks).await {
            resolved.push((key, result?));
        }

        for (key, bytes) in &resolved {
            self.sources.insert(*key, ImageSource::Bytes(bytes.clone()));
        }

        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[test]
    fn test_key_names() {
        let key = ImageKey::new(ImageRole::Logo, Resolution::Double);
        assert_eq!(key.key(), "logo2x");
        assert_eq!(key.file_name(), "logo@2x.png");

        let key = ImageKey::from(ImageRole::Thumbnail);
        assert_eq!(key.key(), "thumbnail");
        assert_eq!(key.file_name(), "thumbnail.png");
    }

    #[test]
    fn test_parse_file_names() {
        assert_eq!(
            ImageKey::from_file_name("strip@3x.png"),
            Some(ImageKey::new(ImageRole::Strip, Resolution::Triple))
        );
        assert_eq!(
            ImageKey::from_file_name("icon.png"),
            Some(ImageKey::from(ImageRole::Icon))
        );
        assert_eq!(ImageKey::from_file_name("icon.jpg"), None);
        assert_eq!(ImageKey::from_file_name("banner.png"), None);
        assert_eq!(ImageKey::from_file_name("icon@4x.png"), None);
    }

    #[test]
    fn test_parse_keys() {
        assert_eq!(
            ImageKey::parse_key("footer2x"),
            Some(ImageKey::new(ImageRole::Footer, Resolution::Double))
        );
        assert_eq!(ImageKey::parse_key("footer"), Some(ImageRole::Footer.into()));
        assert_eq!(ImageKey::parse_key("footer@2x"), None);
    }

    #[test]
    fn test_all_keys_in_package_order() {
        let keys: Vec<_> = ImageKey::all().map(|k| k.file_name()).collect();
        assert_eq!(keys.len(), 18);
        assert_eq!(keys[0], "background.png");
        assert_eq!(keys[1], "background@2x.png");
        assert_eq!(keys[2], "background@3x.png");
        assert_eq!(keys[17], "thumbnail@3x.png");
    }

    #[test]
    fn test_from_json() {
        let path = ImageSource::from_json("icon", &serde_json::json!("images/icon.png")).unwrap();
        assert!(matches!(path, ImageSource::Path(p) if p == Path::new("images/icon.png")));

        let bytes = ImageSource::from_json("icon", &serde_json::json!([1, 2, 255])).unwrap();
        assert!(matches!(bytes, ImageSource::Bytes(b) if b == vec![1u8, 2, 255]));

        let err = ImageSource::from_json("logo2x", &serde_json::json!(42)).unwrap_err();
        assert!(matches!(err, Error::ImageResolution { ref key, .. } if key == "logo2x"));

        let err = ImageSource::from_json("logo", &serde_json::json!([1, 300])).unwrap_err();
        assert!(matches!(err, Error::ImageResolution { .. }));
    }

    #[test]
    fn test_load_from_directory() {
        let temp_dir = TempDir::new().unwrap();
        for name in ["icon.png", "icon@2x.png", "logo@3x.png", "readme.txt", "banner.png"] {
            std::fs::write(temp_dir.path().join(name), b"data").unwrap();
        }
        std::fs::create_dir(temp_dir.path().join("strip.png")).unwrap();

        let mut images = ImageSet::new();
        let count = images.load_from(temp_dir.path()).unwrap();

        assert_eq!(count, 3);
        assert!(images.contains(ImageRole::Icon));
        assert!(images.contains(ImageKey::new(ImageRole::Icon, Resolution::Double)));
        assert!(images.contains(ImageKey::new(ImageRole::Logo, Resolution::Triple)));
        assert!(!images.contains(ImageRole::Strip));
        match images.get(ImageRole::Icon) {
            Some(ImageSource::Path(path)) => assert!(path.is_absolute()),
            other => panic!("unexpected source {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_load_from_follows_symlinks() {
        let shared = TempDir::new().unwrap();
        let icon = shared.path().join("brand-icon.png");
        std::fs::write(&icon, b"icon").unwrap();

        let temp_dir = TempDir::new().unwrap();
        std::os::unix::fs::symlink(&icon, temp_dir.path().join("icon.png")).unwrap();
        std::os::unix::fs::symlink(shared.path(), temp_dir.path().join("logo.png")).unwrap();

        let mut images = ImageSet::new();
        assert_eq!(images.load_from(temp_dir.path()).unwrap(), 1);
        assert!(images.contains(ImageRole::Icon));
        assert!(!images.contains(ImageRole::Logo));
        match images.get(ImageRole::Icon) {
            Some(ImageSource::Path(path)) => assert_eq!(std::fs::read(path).unwrap(), b"icon"),
            other => panic!("unexpected source {:?}", other),
        }
    }

    #[test]
    fn test_load_from_missing_directory() {
        let mut images = ImageSet::new();
        assert!(images.load_from("/nonexistent/images").is_err());
    }

    #[tokio::test]
    async fn test_resolve_bytes_unchanged() {
        let mut images = ImageSet::new();
        images.set(ImageRole::Icon, vec![1u8, 2, 3]);
        let bytes = images.resolve(ImageRole::Icon).await.unwrap();
        assert_eq!(bytes, Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn test_resolve_absent_is_none() {
        let mut images = ImageSet::new();
        assert_eq!(images.resolve(ImageRole::Strip).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_resolve_path_caches_bytes() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("logo.png");
        std::fs::write(&path, b"logo bytes").unwrap();

        let mut images = ImageSet::new();
        images.set(ImageRole::Logo, path.clone());
        assert_eq!(images.resolve(ImageRole::Logo).await.unwrap(), Some(b"logo bytes".to_vec()));

        std::fs::remove_file(&path).unwrap();
        assert!(matches!(images.get(ImageRole::Logo), Some(ImageSource::Bytes(_))));
        assert_eq!(images.resolve(ImageRole::Logo).await.unwrap(), Some(b"logo bytes".to_vec()));
    }

    #[tokio::test]
    async fn test_resolve_missing_file_names_key() {
        let mut images = ImageSet::new();
        images.set(ImageKey::new(ImageRole::Strip, Resolution::Double), "/nonexistent/strip@2x.png");
        let err = images.resolve_all().await.unwrap_err();
        match err {
            Error::ImageResolution { key, source } => {
                assert_eq!(key, "strip2x");
                assert!(source.downcast_ref::<std::io::Error>().is_some());
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_deferred_invoked_once_per_resolution() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let mut images = ImageSet::new();
        images.set(
            ImageRole::Thumbnail,
            ImageSource::deferred(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, std::io::Error>(b"thumb".to_vec()) }
            }),
        );

        let resolved = images.resolve_all().await.unwrap();
        assert_eq!(resolved, vec![(ImageKey::from(ImageRole::Thumbnail), b"thumb".to_vec())]);
        images.resolve(ImageRole::Thumbnail).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_deferred_failure_names_key() {
        let mut images = ImageSet::new();
        images.set(ImageRole::Icon, vec![0u8; 16]);
        images.set(
            ImageRole::Logo,
            ImageSource::deferred(|| async { Err::<Vec<u8>, _>("backend unavailable") }),
        );

        let err = images.resolve_all().await.unwrap_err();
        assert!(matches!(err, Error::ImageResolution { ref key, .. } if key == "logo"));
        assert!(err.to_string().contains("backend unavailable"));
    }

    #[tokio::test]
    async fn test_deferred_panic_is_a_failure() {
        let mut images = ImageSet::new();
        images.set(
            ImageRole::Footer,
            ImageSource::deferred(|| -> futures::future::Ready<std::result::Result<Vec<u8>, std::io::Error>> {
                panic!("producer exploded")
            }),
        );

        let err = images.resolve_all().await.unwrap_err();
        assert!(matches!(err, Error::ImageResolution { ref key, .. } if key == "footer"));
        assert!(err.to_string().contains("producer exploded"));
    }

    #[tokio::test]
    async fn test_resolve_all_waits_for_siblings() {
        let finished = Arc::new(AtomicUsize::new(0));
        let flag = finished.clone();

        let mut images = ImageSet::new();
        images.set(
            ImageRole::Background,
            ImageSource::deferred(|| async { Err::<Vec<u8>, _>("broken") }),
        );
        images.set(
            ImageRole::Thumbnail,
            ImageSource::deferred(move || {
                let flag = flag.clone();
                async move {
                    tokio::task::yield_now().await;
                    flag.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, std::io::Error>(vec![1])
                }
            }),
        );

        assert!(images.resolve_all().await.is_err());
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }
}
