use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{BizyAirError, Result};

/// File-backed list of API keys with round-robin selection.
///
/// File access goes through `tokio::fs`. The file is re-read on every
/// [`KeyStore::next_key`] call, so keys added by hand take effect immediately.
/// The rotation index lives in the store; share one store (e.g. through the
/// client) to share the rotation.
#[derive(Debug)]
pub struct KeyStore {
    path: PathBuf,
    index: AtomicUsize,
}

impl KeyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            index: AtomicUsize::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Non-empty trimmed lines of the key file. A missing file yields no keys.
    pub async fn load(&self) -> Result<Vec<String>> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(BizyAirError::io(&self.path, e)),
        };
        Ok(text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }

    /// Next key in rotation, or an empty string when none are available.
    ///
    /// An index left past the end by a shrinking file restarts at the first key.
    pub async fn next_key(&self) -> String {
        let keys = match self.load().await {
            Ok(keys) => keys,
            Err(e) => {
                log::error!("Failed to read API keys: {}", e);
                return String::new();
            }
        };
        if keys.is_empty() {
            return String::new();
        }

        let len = keys.len();
        let start = |i: usize| if i >= len { 0 } else { i };
        let prev = self
            .index
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |i| {
                Some((start(i) + 1) % len)
            })
            .unwrap_or_else(|i| i);
        let selected = &keys[start(prev)];
        log::debug!(
            "Using API key [{}/{}]: {}...",
            start(prev) + 1,
            len,
            key_prefix(selected)
        );
        selected.clone()
    }

    /// Persist `key` if it is not blank and not already stored.
    ///
    /// Returns `true` when the file was changed.
    pub async fn save_key(&self, key: &str) -> Result<bool> {
        let key = key.trim();
        if key.is_empty() {
            return Ok(false);
        }

        let mut keys = self.load().await?;
        if keys.iter().any(|k| k == key) {
            return Ok(false);
        }
        keys.push(key.to_string());

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| BizyAirError::io(parent, e))?;
        }
        let mut contents = keys.join("\n");
        contents.push('\n');
        tokio::fs::write(&self.path, contents)
            .await
            .map_err(|e| BizyAirError::io(&self.path, e))?;

        log::info!("New API key saved to {}", self.path.display());
        Ok(true)
    }
}

/// First eight characters of a key, for log lines.
pub(crate) fn key_prefix(key: &str) -> &str {
    match key.char_indices().nth(8) {
        Some((idx, _)) => &key[..idx],
        None => key,
    }
}
