//! Node-level entry points.
//!
//! These mirror the nodes a graph host wires together and never return an
//! error: every failure is logged and turned into a message plus the
//! placeholder image, because the host expects a typed value on every output.

use serde_json::json;

use crate::client::BizyAirClient;
use crate::error::BizyAirError;
use crate::formatter;
use crate::resize::{self, ResampleMethod};
use crate::tensor::ImageTensor;
use crate::types::CreateTaskRequest;

/// Number of formatted-input slots on the submit node.
pub const MAX_INPUTS: usize = 9;

/// Default web app id shown on the submit node.
pub const DEFAULT_WEB_APP_ID: u32 = 36259;

/// Outputs of [`submit_task`].
#[derive(Debug, Clone)]
pub struct SubmitOutput {
    /// Pretty-printed response body, `{}` without a key, or an error object.
    pub response_json: String,
    pub task_id: String,
    pub image_url: String,
    pub image: ImageTensor,
}

impl SubmitOutput {
    fn empty(response_json: String) -> Self {
        Self {
            response_json,
            task_id: String::new(),
            image_url: String::new(),
            image: ImageTensor::placeholder(),
        }
    }
}

/// Outputs of [`check_task_status`].
#[derive(Debug, Clone)]
pub struct StatusOutput {
    pub status_info: String,
    pub image_url: String,
    pub image: ImageTensor,
}

impl StatusOutput {
    fn failed(status_info: String) -> Self {
        Self {
            status_info,
            image_url: String::new(),
            image: ImageTensor::placeholder(),
        }
    }
}

/// Build the create-task body from formatted tokens.
///
/// Only the first [`MAX_INPUTS`] tokens are read. Blank tokens and tokens
/// without a separator are skipped.
pub fn build_request<S: AsRef<str>>(web_app_id: u32, inputs: &[S]) -> CreateTaskRequest {
    inputs
        .iter()
        .take(MAX_INPUTS)
        .filter_map(|raw| formatter::parse_token(raw.as_ref()))
        .fold(CreateTaskRequest::new(web_app_id), |req, (reference, value)| {
            req.input(reference, value)
        })
}

/// Submit a task and return its response, id, first output URL and image.
///
/// An explicit `api_key` is saved to the key file before use.
pub async fn submit_task<S: AsRef<str>>(
    client: &BizyAirClient,
    web_app_id: u32,
    api_key: &str,
    inputs: &[S],
) -> SubmitOutput {
    let key = match client.resolve_key(api_key, true).await {
        Ok(k) => k,
        Err(e) => {
            log::error!("{}", e);
            return SubmitOutput::empty("{}".to_string());
        }
    };

    let request = build_request(web_app_id, inputs);
    let task = match client.create_task(&key, &request).await {
        Ok(t) => t,
        Err(e) => {
            log::error!("BizyAir API call failed: {}", e);
            return SubmitOutput::empty(error_json(&e));
        }
    };

    let response_json = serde_json::to_string_pretty(&task.raw).unwrap_or_else(|_| "{}".into());
    let result = task.result;
    log::info!("Task ID: {}", result.request_id);

    let mut image_url = String::new();
    let mut image = ImageTensor::placeholder();
    if result.status.is_finished() {
        match result.first_image_url() {
            Some(url) => {
                image_url = url.to_string();
                image = client.image_or_placeholder(url).await;
            }
            None => log::warn!("No object_url in task outputs"),
        }
    } else if result.status.is_failed() {
        log::warn!("Task failed, returning placeholder image");
    } else {
        log::warn!("Unknown status {:?}, returning placeholder image", result.status.as_str());
    }

    SubmitOutput {
        response_json,
        task_id: result.request_id,
        image_url,
        image,
    }
}

fn error_json(err: &BizyAirError) -> String {
    let body = json!({
        "error": err.to_string(),
        "message": "API call failed",
    });
    serde_json::to_string_pretty(&body).unwrap_or_else(|_| "{}".into())
}

/// Report a task's status, and fetch its image once it has completed.
///
/// An explicit `api_key` is used as-is and not saved.
pub async fn check_task_status(client: &BizyAirClient, task_id: &str, api_key: &str) -> StatusOutput {
    let key = client.resolve_key(api_key, false).await.unwrap_or_default();
    if key.is_empty() || task_id.trim().is_empty() {
        return StatusOutput::failed("Error: missing API key or task ID".to_string());
    }

    let result = match client.task_status(&key, task_id).await {
        Ok(r) => r,
        Err(e) => {
            log::error!("Task status check failed: {}", e);
            return StatusOutput::failed(format!("Failed to check task status: {}", e));
        }
    };

    let status_info = result.status_report();
    let mut image_url = String::new();
    let mut image = ImageTensor::placeholder();
    if result.status.as_str() == "Completed" {
        if let Some(url) = result.first_image_url() {
            image_url = url.to_string();
            image = client.image_or_placeholder(url).await;
        }
    }

    StatusOutput {
        status_info,
        image_url,
        image,
    }
}

/// Format an image input token.
///
/// With `use_url`, the URL is cached locally and sent as-is. Without it, the
/// tensor is sent as a WebP data URI. A missing URL or image yields `node_ref|`.
pub async fn format_image_input(
    client: &BizyAirClient,
    node_ref: &str,
    use_url: bool,
    image: Option<&ImageTensor>,
    image_url: &str,
) -> String {
    let image_url = image_url.trim();
    match (use_url, image) {
        (true, _) if !image_url.is_empty() => {
            log::info!("URL mode: {}", image_url);
            if let Err(e) = client.cache_image(image_url).await {
                log::error!("Failed to download and cache image: {}", e);
            }
            formatter::token(node_ref, image_url)
        }
        (true, _) => {
            log::error!("URL mode is enabled but no image URL was provided");
            formatter::token(node_ref, "")
        }
        (false, Some(tensor)) => formatter::format_image_tensor(node_ref, tensor),
        (false, None) => {
            log::error!("URL mode is disabled but no image was provided");
            formatter::token(node_ref, "")
        }
    }
}

/// Format a numeric input token. See [`formatter::format_number`].
pub fn format_value_input(node_ref: &str, value: f64, use_float: bool) -> String {
    formatter::format_number(node_ref, value, use_float)
}

/// Format a string input token.
pub fn format_string_input(node_ref: &str, text: &str) -> String {
    formatter::format_string(node_ref, text)
}

/// Resize node. On failure returns a zeroed `height x width` frame and the error text.
pub fn resize_image(
    image: &ImageTensor,
    width: u32,
    height: u32,
    method: ResampleMethod,
    maintain_aspect_ratio: bool,
) -> (ImageTensor, String) {
    match resize::resize(image, width, height, method, maintain_aspect_ratio) {
        Ok(r) => (r.image, r.size_info),
        Err(e) => {
            log::error!("Image resize failed: {}", e);
            (
                ImageTensor::zeros(1, height as usize, width as usize, 3),
                format!("Resize failed: {}", e),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BizyAirConfig;

    #[test]
    fn test_build_request_skips_bad_tokens() {
        let inputs = [
            "14:PrimitiveStringMultiline.value|a cat",
            "",
            "   ",
            "garbage",
            "99:easy float.value|7",
            "91:LoadImage.image|http://x/a|b.png",
        ];
        let req = build_request(42, &inputs);
        assert_eq!(req.web_app_id, 42);
        assert_eq!(req.input_values.len(), 3);
        assert_eq!(req.input_values["91:LoadImage.image"], "http://x/a|b.png");
    }

    #[test]
    fn test_build_request_caps_at_nine() {
        let inputs: Vec<String> = (0..12).map(|i| format!("ref{}|{}", i, i)).collect();
        let req = build_request(1, &inputs);
        assert_eq!(req.input_values.len(), MAX_INPUTS);
        assert!(!req.input_values.contains_key("ref9"));
    }

    #[test]
    fn test_resize_image_failure_fallback() {
        let bad = ImageTensor::zeros(0, 0, 0, 3);
        let (img, info) = resize_image(&bad, 128, 64, ResampleMethod::Lanczos, true);
        assert_eq!(img.shape(), [1, 64, 128, 3]);
        assert!(info.starts_with("Resize failed: "));
    }

    #[tokio::test]
    async fn test_format_image_input_missing_data() {
        let dir = tempfile::tempdir().unwrap();
        let client = BizyAirClient::new(BizyAirConfig::for_plugin_dir(dir.path()));
        assert_eq!(format_image_input(&client, "91:LoadImage.image", true, None, "  ").await, "91:LoadImage.image|");
        assert_eq!(format_image_input(&client, "91:LoadImage.image", false, None, "http://x").await, "91:LoadImage.image|");
    }

    #[tokio::test]
    async fn test_format_image_input_tensor_mode_ignores_url() {
        let dir = tempfile::tempdir().unwrap();
        let client = BizyAirClient::new(BizyAirConfig::for_plugin_dir(dir.path()));
        let t = ImageTensor::from_u8([1, 1, 1, 3], vec![1, 2, 3]).unwrap();
        let tok = format_image_input(&client, "ref", false, Some(&t), "http://ignored").await;
        assert!(tok.starts_with("ref|data:image/webp;base64,"));
    }

    #[tokio::test]
    async fn test_check_status_missing_task_id() {
        let dir = tempfile::tempdir().unwrap();
        let client = BizyAirClient::new(BizyAirConfig::for_plugin_dir(dir.path()));
        let out = check_task_status(&client, " ", "sk-x").await;
        assert_eq!(out.status_info, "Error: missing API key or task ID");
        assert!(out.image.is_placeholder());
    }

    #[test]
    fn test_error_json_shape() {
        let body: serde_json::Value =
            serde_json::from_str(&error_json(&BizyAirError::MissingApiKey)).unwrap();
        assert_eq!(body["error"], "No API key found");
        assert_eq!(body["message"], "API call failed");
    }
}
