use md5::{Digest, Md5};
use reqwest::{Client, Url};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::codec;
use crate::error::{BizyAirError, Result};

/// Directory name that marks the host's plugin root.
pub const PLUGIN_ROOT_MARKER: &str = "custom_nodes";

/// Extension used when the URL path has none.
pub const DEFAULT_EXTENSION: &str = ".webp";

/// Find the cache directory for a plugin installed at `plugin_dir`.
///
/// Walks upward to the nearest `custom_nodes` ancestor and uses `temp` under
/// its parent. Falls back to `plugin_dir/temp` when there is no such ancestor.
pub fn locate_cache_dir(plugin_dir: &Path) -> PathBuf {
    plugin_dir
        .ancestors()
        .find(|dir| dir.file_name().is_some_and(|n| n == PLUGIN_ROOT_MARKER))
        .and_then(Path::parent)
        .unwrap_or(plugin_dir)
        .join("temp")
}

/// Cache file name for `url`: hex MD5 of the URL string plus its lowercased extension.
///
/// Addressing is by URL, not content. Two fetches of the same URL are assumed
/// to yield the same bytes.
pub fn cache_file_name(url: &str) -> String {
    let hash = hex::encode(Md5::digest(url.as_bytes()));
    format!("{}{}", hash, url_extension(url))
}

fn url_extension(url: &str) -> String {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or("").to_string(),
    };
    let file = path.rsplit('/').next().unwrap_or("");
    match file.rfind('.') {
        // A leading dot is a hidden file name, not an extension.
        Some(idx) if idx > 0 && idx + 1 < file.len() => file[idx..].to_lowercase(),
        _ => DEFAULT_EXTENSION.to_string(),
    }
}

/// Download cache for remote images, keyed by URL hash.
#[derive(Debug, Clone)]
pub struct ImageCache {
    dir: PathBuf,
    timeout: Duration,
}

impl ImageCache {
    pub fn new(dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            dir: dir.into(),
            timeout,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Local path a given URL is (or would be) cached at.
    pub fn path_for(&self, url: &str) -> PathBuf {
        self.dir.join(cache_file_name(url))
    }

    /// Return the cached file for `url`, downloading it first if absent.
    ///
    /// Concurrent callers for the same URL may both download; the last write wins.
    pub async fn fetch_path(&self, http: &Client, url: &str) -> Result<PathBuf> {
        let path = self.path_for(url);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            log::debug!("Using cached image {}", path.display());
            return Ok(path);
        }

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| BizyAirError::io(&self.dir, e))?;

        let bytes = codec::download(http, url, self.timeout).await?;
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| BizyAirError::io(&path, e))?;

        log::info!("Image saved to {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_file_name_uses_url_md5() {
        // md5("http://x/y.png")
        let name = cache_file_name("http://x/y.png");
        assert_eq!(name.len(), 32 + 4);
        assert!(name.ends_with(".png"));
        assert_eq!(
            &name[..32],
            hex::encode(Md5::digest(b"http://x/y.png")).as_str()
        );
    }

    #[test]
    fn test_extension_rules() {
        assert!(cache_file_name("https://cdn.example.com/a/B.JPG?x=1").ends_with(".jpg"));
        assert!(cache_file_name("https://cdn.example.com/a/b").ends_with(".webp"));
        assert!(cache_file_name("https://cdn.example.com/").ends_with(".webp"));
        assert!(cache_file_name("https://cdn.example.com/dir.v2/file").ends_with(".webp"));
    }

    #[test]
    fn test_distinct_urls_distinct_names() {
        assert_ne!(
            cache_file_name("http://x/1.png"),
            cache_file_name("http://x/2.png")
        );
    }

    #[test]
    fn test_locate_cache_dir_with_marker() {
        let plugin = Path::new("/opt/ComfyUI/custom_nodes/bizyair-nodes");
        assert_eq!(locate_cache_dir(plugin), PathBuf::from("/opt/ComfyUI/temp"));
    }

    #[test]
    fn test_locate_cache_dir_nested_marker() {
        let plugin = Path::new("/opt/ComfyUI/custom_nodes/pack/sub");
        assert_eq!(locate_cache_dir(plugin), PathBuf::from("/opt/ComfyUI/temp"));
    }

    #[test]
    fn test_locate_cache_dir_fallback() {
        let plugin = Path::new("/home/me/plugins/bizyair");
        assert_eq!(
            locate_cache_dir(plugin),
            PathBuf::from("/home/me/plugins/bizyair/temp")
        );
    }
}
