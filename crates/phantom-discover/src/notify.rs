//! Telegram scan summaries.
//!
//! When the exported report exists it is uploaded with `sendDocument` and
//! the text summary rides along as the caption; otherwise only the summary
//! is sent with `sendMessage`.

use std::path::Path;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use serde::Serialize;

use crate::config::TelegramConfig;
use crate::error::Result;
use crate::report::ExportReport;

/// Telegram rejects document captions longer than this many characters.
const MAX_CAPTION_CHARS: usize = 1024;

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

/// Sends scan summaries through the Telegram Bot API.
pub struct TelegramNotifier {
    config: TelegramConfig,
    client: reqwest::Client,
}

impl TelegramNotifier {
    /// `None` when notifications are disabled or incompletely configured.
    pub fn from_config(config: &TelegramConfig) -> Option<Self> {
        if !config.is_usable() {
            if config.enabled {
                tracing::warn!("Telegram enabled but bot_token or chat_id is missing");
            }
            return None;
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("phantom/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| tracing::warn!(error = %e, "Telegram client unavailable"))
            .ok()?;

        Some(Self {
            config: config.clone(),
            client,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{method}",
            self.config.api_base.trim_end_matches('/'),
            self.config.bot_token
        )
    }

    pub async fn send_text(&self, text: &str) -> Result<()> {
        self.client
            .post(self.method_url("sendMessage"))
            .json(&SendMessage {
                chat_id: &self.config.chat_id,
                text,
            })
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }

    /// Build the `sendDocument` upload for `contents` without sending it.
    pub fn document_request(&self, file_name: &str, contents: Vec<u8>, caption: &str) -> Result<reqwest::Request> {
        let document = Part::bytes(contents)
            .file_name(file_name.to_string())
            .mime_str("application/json")?;
        let form = Form::new()
            .text("chat_id", self.config.chat_id.clone())
            .text("caption", truncate_caption(caption))
            .part("document", document);

        Ok(self
            .client
            .post(self.method_url("sendDocument"))
            .multipart(form)
            .build()?)
    }

    /// Upload the file at `path` with `caption`.
    pub async fn send_document(&self, path: &Path, caption: &str) -> Result<()> {
        let contents = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("scan.json");

        let request = self.document_request(file_name, contents, caption)?;
        self.client.execute(request).await?.error_for_status()?;
        Ok(())
    }

    /// Send the results of a finished scan. Failures are logged only.
    pub async fn notify(&self, report: &ExportReport, export_path: Option<&Path>) {
        let text = summary_text(report);
        let result = match export_path {
            Some(path) => self.send_document(path, &text).await,
            None => self.send_text(&text).await,
        };

        match result {
            Ok(()) => tracing::info!(
                chat_id = %self.config.chat_id,
                document = export_path.is_some(),
                "Telegram summary sent"
            ),
            Err(e) => {
                // reqwest errors embed the URL, which carries the token.
                let error = e.to_string().replace(&self.config.bot_token, "***");
                tracing::warn!(error = %error, "Telegram send failed");
            }
        }
    }
}

fn truncate_caption(text: &str) -> String {
    if text.chars().count() <= MAX_CAPTION_CHARS {
        return text.to_string();
    }
    let mut caption: String = text.chars().take(MAX_CAPTION_CHARS - 1).collect();
    caption.push('…');
    caption
}

/// Plain-text summary of a scan for chat delivery.
pub fn summary_text(report: &ExportReport) -> String {
    let mut lines = vec![
        format!("Phantom scan of {}", report.subnet),
        format!("Time: {}", report.timestamp.format("%Y-%m-%d %H:%M:%S UTC")),
        format!("Devices: {}", report.devices.len()),
        format!("High risk: {}", report.high_risk_count()),
    ];

    match report.changes.changes() {
        None => lines.push("Baseline: first scan of this subnet".to_string()),
        Some(changes) => lines.push(format!(
            "Changes: {} new, {} vanished, {} escalated",
            changes.summary.new_count, changes.summary.vanished_count, changes.summary.escalated_count
        )),
    }

    let flagged: Vec<String> = report
        .devices
        .iter()
        .filter(|d| !d.signatures.is_empty())
        .map(|d| {
            let names: Vec<&str> = d.signatures.iter().map(|s| s.name.as_str()).collect();
            format!("{}: {}", d.device.ip, names.join(", "))
        })
        .collect();

    if !flagged.is_empty() {
        lines.push("Signature matches:".to_string());
        lines.extend(flagged.into_iter().map(|l| format!("  {l}")));
    }

    lines.join("\n")
}
