//! Optional webhook notification for unrecoverable startup failures.
//!
//! Best effort only: a failed alert is logged and never escalated.

use serde_json::json;
use tracing::{info, warn};

pub async fn send_fatal_alert(webhook_url: &str, message: &str) {
    let payload = json!({
        "msg_type": "text",
        "content": { "text": format!("🚨 grid engine failure: {message}") }
    });

    let client = reqwest::Client::new();
    match client.post(webhook_url).json(&payload).send().await {
        Ok(response) if response.status().is_success() => {
            info!("alert delivered to webhook");
        }
        Ok(response) => {
            warn!("alert webhook returned {}", response.status());
        }
        Err(e) => {
            warn!("failed to deliver alert: {}", e);
        }
    }
}
