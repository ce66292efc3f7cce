use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::locate_cache_dir;

/// Default BizyAir API host.
pub const DEFAULT_API_BASE: &str = "https://api.bizyair.cn";

/// Key file location relative to the plugin directory.
pub const KEY_FILE: &str = "key/siliconflow_API_key.txt";

/// Configuration for [`BizyAirClient`](crate::BizyAirClient).
///
/// [`BizyAirConfig::default()`] points at the public API with the plugin
/// directory set to the working directory. Use
/// [`BizyAirConfig::for_plugin_dir`] to derive the key file and cache
/// directory from an install location.
#[derive(Debug, Clone)]
pub struct BizyAirConfig {
    /// API host, without trailing slash (e.g. "https://api.bizyair.cn").
    pub api_base: String,

    /// File holding one API key per line.
    pub key_file: PathBuf,

    /// Directory for downloaded input images.
    pub cache_dir: PathBuf,

    /// Timeout for task creation, which blocks until generation finishes (default: 300s).
    pub create_timeout: Duration,

    /// Timeout for task status lookups (default: 30s).
    pub status_timeout: Duration,

    /// Timeout for image downloads (default: 30s).
    pub download_timeout: Duration,
}

impl Default for BizyAirConfig {
    fn default() -> Self {
        Self::for_plugin_dir(".")
    }
}

impl BizyAirConfig {
    /// Config for a plugin installed at `dir`: keys in `dir/key/`, cache in
    /// the host's `temp` directory.
    pub fn for_plugin_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            key_file: dir.join(KEY_FILE),
            cache_dir: locate_cache_dir(dir),
            create_timeout: Duration::from_secs(300),
            status_timeout: Duration::from_secs(30),
            download_timeout: Duration::from_secs(30),
        }
    }

    /// Set the API host. Trailing slashes are stripped.
    pub fn api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the key file path.
    pub fn key_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_file = path.into();
        self
    }

    /// Set the image cache directory.
    pub fn cache_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_dir = path.into();
        self
    }

    pub fn create_timeout(mut self, timeout: Duration) -> Self {
        self.create_timeout = timeout;
        self
    }

    pub fn status_timeout(mut self, timeout: Duration) -> Self {
        self.status_timeout = timeout;
        self
    }

    pub fn download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    pub(crate) fn create_url(&self) -> String {
        format!("{}/w/v1/webapp/task/openapi/create", self.api_base)
    }

    pub(crate) fn status_url(&self, task_id: &str) -> String {
        format!("{}/w/v1/webapp/task/{}", self.api_base, task_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BizyAirConfig::default();
        assert_eq!(config.api_base, "https://api.bizyair.cn");
        assert_eq!(config.create_timeout, Duration::from_secs(300));
        assert_eq!(config.status_timeout, Duration::from_secs(30));
        assert_eq!(config.download_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_plugin_dir_layout() {
        let config = BizyAirConfig::for_plugin_dir("/srv/ComfyUI/custom_nodes/bizyair");
        assert_eq!(
            config.key_file,
            PathBuf::from("/srv/ComfyUI/custom_nodes/bizyair/key/siliconflow_API_key.txt")
        );
        assert_eq!(config.cache_dir, PathBuf::from("/srv/ComfyUI/temp"));
    }

    #[test]
    fn test_endpoints() {
        let config = BizyAirConfig::default().api_base("http://127.0.0.1:9000/");
        assert_eq!(
            config.create_url(),
            "http://127.0.0.1:9000/w/v1/webapp/task/openapi/create"
        );
        assert_eq!(
            config.status_url("abc-123"),
            "http://127.0.0.1:9000/w/v1/webapp/task/abc-123"
        );
    }
}
