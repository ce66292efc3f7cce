//! Submit a text-to-image task and poll its status until it settles.
//!
//! Requires a BizyAir API key, either in `./key/siliconflow_API_key.txt`
//! or passed as the first argument.
//!
//! ```sh
//! cargo run --example submit_and_poll -- sk-xxxx "a lighthouse at dusk"
//! ```

use bizyair_rs::{formatter, nodes, BizyAirClient, BizyAirConfig};
use std::time::Duration;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let api_key = args.next().unwrap_or_default();
    let prompt = args.next().unwrap_or_else(|| "a lighthouse at dusk".to_string());

    let client = BizyAirClient::new(BizyAirConfig::for_plugin_dir("."));
    let inputs = [
        formatter::format_string(formatter::DEFAULT_STRING_REF, &prompt),
        formatter::format_number(formatter::DEFAULT_NUMBER_REF, 2.0, false),
    ];

    let out = nodes::submit_task(&client, nodes::DEFAULT_WEB_APP_ID, &api_key, &inputs).await;
    println!("{}", out.response_json);
    if out.task_id.is_empty() {
        eprintln!("No task was created");
        return;
    }
    if !out.image.is_placeholder() {
        println!("Finished immediately: {}", out.image_url);
        return;
    }

    for _ in 0..10 {
        tokio::time::sleep(Duration::from_secs(5)).await;
        let status = nodes::check_task_status(&client, &out.task_id, &api_key).await;
        println!("{}", status.status_info);
        if !status.image_url.is_empty() {
            let [_, h, w, _] = status.image.shape();
            println!("Image {} ({}x{})", status.image_url, w, h);
            break;
        }
        if status.status_info.starts_with("Task status: Failed") {
            break;
        }
    }
}
