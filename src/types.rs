use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Remote task state as reported in the `status` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskStatus {
    Completed,
    Success,
    Failed,
    /// Any other value (queued, running, or something new), kept verbatim.
    Other(String),
}

impl TaskStatus {
    pub fn as_str(&self) -> &str {
        match self {
            TaskStatus::Completed => "Completed",
            TaskStatus::Success => "Success",
            TaskStatus::Failed => "Failed",
            TaskStatus::Other(s) => s,
        }
    }

    /// Whether the create endpoint's status means outputs are ready.
    ///
    /// Matching is case-insensitive, so `"completed"` and `"SUCCESS"` count.
    pub fn is_finished(&self) -> bool {
        let s = self.as_str();
        s.eq_ignore_ascii_case("completed") || s.eq_ignore_ascii_case("success")
    }

    pub fn is_failed(&self) -> bool {
        self.as_str().eq_ignore_ascii_case("failed")
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Other(String::new())
    }
}

impl From<String> for TaskStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Completed" => TaskStatus::Completed,
            "Success" => TaskStatus::Success,
            "Failed" => TaskStatus::Failed,
            _ => TaskStatus::Other(s),
        }
    }
}

impl From<TaskStatus> for String {
    fn from(s: TaskStatus) -> Self {
        s.as_str().to_string()
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a task's `outputs` array.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskOutput {
    #[serde(default, deserialize_with = "lenient_opt", skip_serializing_if = "Option::is_none")]
    pub object_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt", skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt", skip_serializing_if = "Option::is_none")]
    pub error_msg: Option<String>,
}

/// Parsed body of the create-task and task-status endpoints.
///
/// The create endpoint fills `request_id`; the status endpoint fills the
/// timestamps. Both share `status` and `outputs`.
///
/// Scalar fields are only displayed, so numbers and booleans are accepted as
/// text and `null` counts as absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskResult {
    #[serde(default, deserialize_with = "lenient_status")]
    pub status: TaskStatus,
    #[serde(default, deserialize_with = "lenient_string")]
    pub request_id: String,
    /// `None` when the body has no `outputs` key (or it is `null`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Vec<TaskOutput>>,
    #[serde(default, deserialize_with = "lenient_opt", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

fn scalar_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

fn lenient_opt<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(scalar_text(Value::deserialize(d)?))
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(lenient_opt(d)?.unwrap_or_default())
}

fn lenient_status<'de, D: Deserializer<'de>>(d: D) -> Result<TaskStatus, D::Error> {
    Ok(TaskStatus::from(lenient_string(d)?))
}

impl TaskResult {
    /// Task outputs; empty when the body carried none.
    pub fn outputs(&self) -> &[TaskOutput] {
        self.outputs.as_deref().unwrap_or_default()
    }

    /// `object_url` of the first output, if present and non-empty.
    pub fn first_image_url(&self) -> Option<&str> {
        self.outputs()
            .first()
            .and_then(|o| o.object_url.as_deref())
            .filter(|u| !u.is_empty())
    }

    /// Known causes for a failed remote workflow, derived from the first output's error.
    pub fn failure_hints(&self) -> Vec<&'static str> {
        let Some(msg) = self.outputs().first().and_then(|o| o.error_msg.as_deref()) else {
            return Vec::new();
        };
        let mut hints = Vec::new();
        if msg.contains("exception_message")
            && msg.contains("size of tensor")
            && msg.contains("must match")
        {
            hints.push(
                "Tensor size mismatch: check that input image dimensions match what the workflow expects",
            );
            hints.push("Tensor size mismatch: check node parameters in the remote workflow");
        }
        if msg.contains("SamplerCustomAdvanced") {
            hints.push("Use a standard image size such as 1024x1024 or 512x768");
            hints.push("Check that the sampler settings are compatible with the model");
        }
        hints
    }

    /// Multi-line, human-readable summary used by the status checker.
    pub fn status_report(&self) -> String {
        let mut report = format!(
            "Task status: {}\nCreated at: {}\nUpdated at: {}\n",
            self.status,
            self.created_at.as_deref().unwrap_or("N/A"),
            self.updated_at.as_deref().unwrap_or("N/A"),
        );
        if let (TaskStatus::Failed, Some(outputs)) = (&self.status, &self.outputs) {
            report.push_str("\nError details:\n");
            for msg in outputs.iter().filter_map(|o| o.error_msg.as_deref()) {
                let short: String = msg.chars().take(ERROR_EXCERPT_CHARS).collect();
                report.push_str(&format!("Error message: {}...\n", short));
            }
        }
        report
    }
}

/// Maximum characters of each remote error message kept in a status report.
pub const ERROR_EXCERPT_CHARS: usize = 200;

/// Body of a create-task request.
#[derive(Debug, Clone, Serialize)]
pub struct CreateTaskRequest {
    pub web_app_id: u32,
    pub suppress_preview_output: bool,
    pub input_values: BTreeMap<String, String>,
}

impl CreateTaskRequest {
    pub fn new(web_app_id: u32) -> Self {
        Self {
            web_app_id,
            suppress_preview_output: true,
            input_values: BTreeMap::new(),
        }
    }

    /// Set one input slot. A repeated reference replaces the earlier value.
    pub fn input(mut self, reference: impl Into<String>, value: impl Into<String>) -> Self {
        self.input_values.insert(reference.into(), value.into());
        self
    }
}

/// A submitted task: the parsed result plus the raw response body.
#[derive(Debug, Clone)]
pub struct SubmittedTask {
    pub result: TaskResult,
    /// Full response JSON, including fields [`TaskResult`] does not model.
    pub raw: serde_json::Value,
}
