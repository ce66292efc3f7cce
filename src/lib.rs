//! # bizyair-rs
//!
//! Async Rust client for [BizyAir](https://bizyair.cn) web-app tasks: run a
//! predefined remote ComfyUI workflow by filling its input slots.
//!
//! Provides input token formatting, task submission, status lookups, an API
//! key rotation store, a URL-keyed image download cache, and conversions
//! between channel-last image tensors and WebP data URIs.
//!
//! ## Quick Start
//!
//! ```no_run
//! use bizyair_rs::{formatter, nodes, BizyAirClient, BizyAirConfig};
//!
//! # async fn example() {
//! let client = BizyAirClient::new(BizyAirConfig::for_plugin_dir("."));
//!
//! // Each input is a `<node_ref>|<value>` token for one slot of the workflow
//! let inputs = [
//!     formatter::format_string("14:PrimitiveStringMultiline.value", "a red fox in snow"),
//!     formatter::format_number("99:easy float.value", 2.0, false),
//! ];
//!
//! // Never fails: errors come back as text plus a placeholder image
//! let out = nodes::submit_task(&client, 36259, "", &inputs).await;
//! println!("task {} -> {}", out.task_id, out.image_url);
//!
//! let status = nodes::check_task_status(&client, &out.task_id, "").await;
//! println!("{}", status.status_info);
//! # }
//! ```

pub mod cache;
pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod formatter;
pub mod keys;
pub mod nodes;
pub mod resize;
pub mod tensor;
pub mod types;

pub use cache::ImageCache;
pub use client::BizyAirClient;
pub use config::BizyAirConfig;
pub use error::{BizyAirError, Result};
pub use keys::KeyStore;
pub use resize::ResampleMethod;
pub use tensor::{ImageTensor, TensorData};
pub use types::{CreateTaskRequest, SubmittedTask, TaskOutput, TaskResult, TaskStatus};
