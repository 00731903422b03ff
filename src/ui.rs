// UI layer: how results and failures are shown. stdout carries only the
// result (plain key or JSON envelope), everything else goes to stderr.

use crate::error::Error;
use clap::ValueEnum;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use std::time::Duration;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Print the image_key as plain text.
    #[default]
    Key,
    /// Print a JSON envelope.
    Json,
}

/// Text for stdout after a successful upload.
pub fn render_success(format: OutputFormat, quiet: bool, image_key: &str) -> String {
    match format {
        OutputFormat::Json => json!({"code": 0, "data": {"image_key": image_key}}).to_string(),
        OutputFormat::Key if quiet => image_key.to_string(),
        OutputFormat::Key => format!("image_key: {}", image_key),
    }
}

/// Envelope for stdout after a failure. Only the JSON format has one; in
/// `key` mode the error goes to stderr alone.
pub fn render_failure(format: OutputFormat, message: &str) -> Option<String> {
    match format {
        OutputFormat::Json => Some(json!({"code": -1, "msg": message}).to_string()),
        OutputFormat::Key => None,
    }
}

/// One-line message for an error, including its source chain
/// (`Failed to send upload request: error sending request for url ...`).
pub fn error_message(err: Error) -> String {
    format!("{:#}", anyhow::Error::from(err))
}

/// Spinner on stderr while a request is in flight. Hidden when the caller
/// wants machine-readable output; indicatif also hides it when stderr is
/// not a terminal.
pub fn spinner(message: &'static str, hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_success_envelope() {
        assert_eq!(
            render_success(OutputFormat::Json, false, "img_abc123"),
            r#"{"code":0,"data":{"image_key":"img_abc123"}}"#
        );
    }

    #[test]
    fn json_failure_envelope() {
        assert_eq!(
            render_failure(OutputFormat::Json, "Upload failed: bad image").as_deref(),
            Some(r#"{"code":-1,"msg":"Upload failed: bad image"}"#)
        );
    }

    #[test]
    fn key_format() {
        assert_eq!(render_success(OutputFormat::Key, false, "img_1"), "image_key: img_1");
        assert_eq!(render_success(OutputFormat::Key, true, "img_1"), "img_1");
        assert_eq!(render_failure(OutputFormat::Key, "boom"), None);
    }

    #[test]
    fn error_message_is_single_line() {
        let err = Error::NotFound {
            path: "/tmp/missing.png".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "No such file or directory"),
        };
        let message = error_message(err);
        assert!(message.starts_with("Cannot open image file /tmp/missing.png"));
        assert!(!message.contains('\n'));
    }

    #[test]
    fn non_ascii_messages_are_kept_verbatim() {
        let out = render_failure(OutputFormat::Json, "图片过大").unwrap();
        assert!(out.contains("图片过大"));
    }
}
