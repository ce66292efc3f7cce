use reqwest::Client;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cache::ImageCache;
use crate::codec;
use crate::config::BizyAirConfig;
use crate::error::{BizyAirError, Result};
use crate::keys::{key_prefix, KeyStore};
use crate::tensor::ImageTensor;
use crate::types::*;

/// Async client for the BizyAir web-app task API.
///
/// Owns the HTTP client, the API key rotation, and the input image cache.
/// Cloning is cheap and clones share the key rotation.
///
/// # Example
/// ```no_run
/// use bizyair_rs::{BizyAirClient, BizyAirConfig, CreateTaskRequest};
///
/// # async fn example() -> bizyair_rs::Result<()> {
/// let client = BizyAirClient::new(BizyAirConfig::for_plugin_dir("."));
/// let key = client.resolve_key("", false).await?;
/// let request = CreateTaskRequest::new(36259)
///     .input("14:PrimitiveStringMultiline.value", "a lighthouse at dusk");
/// let task = client.create_task(&key, &request).await?;
/// println!("{} -> {}", task.result.request_id, task.result.status);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct BizyAirClient {
    http: Client,
    config: BizyAirConfig,
    keys: Arc<KeyStore>,
    cache: ImageCache,
}

impl BizyAirClient {
    pub fn new(config: BizyAirConfig) -> Self {
        Self {
            http: Client::new(),
            keys: Arc::new(KeyStore::new(config.key_file.clone())),
            cache: ImageCache::new(config.cache_dir.clone(), config.download_timeout),
            config,
        }
    }

    /// Use a custom `reqwest::Client` (for proxies, TLS settings, connection pooling).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    pub fn config(&self) -> &BizyAirConfig {
        &self.config
    }

    pub fn keys(&self) -> &KeyStore {
        &self.keys
    }

    pub fn cache(&self) -> &ImageCache {
        &self.cache
    }

    // ── Credentials ─────────────────────────────────────────────────

    /// Pick the key for a request.
    ///
    /// A non-blank `explicit` key wins and, when `persist` is set, is added to
    /// the key file. Otherwise the next stored key in rotation is used.
    pub async fn resolve_key(&self, explicit: &str, persist: bool) -> Result<String> {
        let explicit = explicit.trim();
        if !explicit.is_empty() {
            if persist {
                if let Err(e) = self.keys.save_key(explicit).await {
                    log::error!("Failed to save API key: {}", e);
                }
            }
            return Ok(explicit.to_string());
        }
        let key = self.keys.next_key().await;
        if key.is_empty() {
            return Err(BizyAirError::MissingApiKey);
        }
        Ok(key)
    }

    // ── Tasks ───────────────────────────────────────────────────────

    /// Create a task and wait for the synchronous response.
    ///
    /// The create endpoint usually holds the connection until the workflow
    /// finishes, hence the long `create_timeout`. Non-2xx statuses are errors;
    /// a remote `Failed` status is not, and is returned in the result.
    pub async fn create_task(&self, api_key: &str, request: &CreateTaskRequest) -> Result<SubmittedTask> {
        let url = self.config.create_url();
        log::debug!(
            "Creating task for web app {} with {} input(s), key {}...",
            request.web_app_id,
            request.input_values.len(),
            key_prefix(api_key)
        );

        let resp = self
            .http
            .post(&url)
            .bearer_auth(api_key)
            .timeout(self.config.create_timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| BizyAirError::Network {
                context: format!("Cannot reach BizyAir at {}", self.config.api_base),
                source: e,
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(BizyAirError::Http { status, body });
        }

        let body = resp.text().await.map_err(|e| BizyAirError::Network {
            context: "Failed to read BizyAir create response".into(),
            source: e,
        })?;
        let raw: Value = serde_json::from_str(&body)?;
        if !raw.is_object() {
            return Err(BizyAirError::InvalidResponse(
                "Create response is not a JSON object".into(),
            ));
        }
        let result: TaskResult = serde_json::from_value(raw.clone())?;

        log::info!(
            "BizyAir task {} status: {} ({} output(s))",
            result.request_id,
            result.status,
            result.outputs().len()
        );
        if result.status.is_failed() {
            log_failure(&result);
        }

        Ok(SubmittedTask { result, raw })
    }

    /// Look up a task by id.
    pub async fn task_status(&self, api_key: &str, task_id: &str) -> Result<TaskResult> {
        let task_id = task_id.trim();
        if task_id.is_empty() {
            return Err(BizyAirError::MissingInput("task_id"));
        }
        let url = self.config.status_url(task_id);

        let resp = self
            .http
            .get(&url)
            .bearer_auth(api_key)
            .timeout(self.config.status_timeout)
            .send()
            .await
            .map_err(|e| BizyAirError::Network {
                context: format!("Failed to fetch status of task {}", task_id),
                source: e,
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(BizyAirError::Http { status, body });
        }

        let body = resp.text().await.map_err(|e| BizyAirError::Network {
            context: "Failed to read BizyAir task status response".into(),
            source: e,
        })?;
        Ok(serde_json::from_str(&body)?)
    }

    // ── Images ──────────────────────────────────────────────────────

    /// Download and decode an output image.
    pub async fn fetch_image(&self, url: &str) -> Result<ImageTensor> {
        codec::decode_url(&self.http, url, self.config.download_timeout).await
    }

    /// Like [`fetch_image`](Self::fetch_image), but logs failures and returns
    /// the placeholder frame instead.
    pub async fn image_or_placeholder(&self, url: &str) -> ImageTensor {
        match self.fetch_image(url).await {
            Ok(t) => t,
            Err(e) => {
                log::error!("Failed to load image {}: {}", url, e);
                ImageTensor::placeholder()
            }
        }
    }

    /// Download `url` into the image cache (once) and return the local path.
    pub async fn cache_image(&self, url: &str) -> Result<PathBuf> {
        self.cache.fetch_path(&self.http, url).await
    }
}

fn log_failure(result: &TaskResult) {
    log::warn!("BizyAir task {} failed", result.request_id);
    if let Some(output) = result.outputs().first() {
        log::warn!(
            "Error type: {}",
            output.error_type.as_deref().unwrap_or("Unknown")
        );
        log::warn!(
            "Error message: {}",
            output.error_msg.as_deref().unwrap_or("No error message")
        );
    }
    for hint in result.failure_hints() {
        log::warn!("Hint: {}", hint);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_with_keys(contents: Option<&str>) -> (tempfile::TempDir, BizyAirClient) {
        let dir = tempfile::tempdir().unwrap();
        let key_file = dir.path().join("key").join("keys.txt");
        if let Some(c) = contents {
            std::fs::create_dir_all(key_file.parent().unwrap()).unwrap();
            std::fs::write(&key_file, c).unwrap();
        }
        let config = BizyAirConfig::for_plugin_dir(dir.path()).key_file(key_file);
        (dir, BizyAirClient::new(config))
    }

    #[tokio::test]
    async fn test_resolve_key_explicit_persists() {
        let (_dir, client) = client_with_keys(None);
        assert_eq!(client.resolve_key("  sk-a ", true).await.unwrap(), "sk-a");
        assert_eq!(client.keys().load().await.unwrap(), vec!["sk-a"]);
    }

    #[tokio::test]
    async fn test_resolve_key_explicit_without_persist() {
        let (_dir, client) = client_with_keys(None);
        assert_eq!(client.resolve_key("sk-b", false).await.unwrap(), "sk-b");
        assert!(client.keys().load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_key_from_store_rotates() {
        let (_dir, client) = client_with_keys(Some("k1\nk2\n"));
        assert_eq!(client.resolve_key("", false).await.unwrap(), "k1");
        assert_eq!(client.resolve_key("  ", false).await.unwrap(), "k2");
        assert_eq!(client.clone().resolve_key("", false).await.unwrap(), "k1");
    }

    #[tokio::test]
    async fn test_resolve_key_missing() {
        let (_dir, client) = client_with_keys(Some("\n"));
        assert!(matches!(
            client.resolve_key("", true).await,
            Err(BizyAirError::MissingApiKey)
        ));
    }

    #[tokio::test]
    async fn test_task_status_requires_id() {
        let (_dir, client) = client_with_keys(None);
        let err = client.task_status("k", "  ").await.unwrap_err();
        assert!(matches!(err, BizyAirError::MissingInput("task_id")));
    }

    #[tokio::test]
    async fn test_image_or_placeholder_on_bad_url() {
        let (_dir, client) = client_with_keys(None);
        let img = client.image_or_placeholder("not a url").await;
        assert!(img.is_placeholder());
    }
}
