// Command-line surface of `feishu-upload-image` and the single upload flow
// it drives: credentials -> resolve input -> token -> upload.

use crate::api::{ApiClient, ImageKind, UploadRequest, UploadResult, DEFAULT_BASE_URL};
use crate::config::{CredentialSource, Credentials};
use crate::error::Result;
use crate::source::{ImageSource, ImageSourceResolver};
use crate::token::TokenManager;
use crate::ui::{self, OutputFormat};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(
    name = "feishu-upload-image",
    about = "Upload images to Feishu/Lark and print the image_key",
    version,
    after_help = "\
EXAMPLES:
    feishu-upload-image ./screenshot.png
    feishu-upload-image https://example.com/pic.png -o json
    feishu-upload-image --base64 iVBORw0KGgo... --type avatar"
)]
pub struct Args {
    /// Image file path, URL, or base64 string with --base64
    pub input: Option<String>,

    /// Image type
    #[arg(short = 't', long = "type", default_value = "message")]
    pub kind: ImageKind,

    /// Same as --type (for compatibility)
    #[arg(long = "image-type")]
    pub image_type: Option<ImageKind>,

    /// Upload from URL
    #[arg(short, long)]
    pub url: Option<String>,

    /// Treat input as base64 string
    #[arg(short, long)]
    pub base64: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Key)]
    pub output: OutputFormat,

    /// Only output the image_key
    #[arg(short, long)]
    pub quiet: bool,

    /// Open platform base URL (https://open.larksuite.com for Lark)
    #[arg(long, env = "FEISHU_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Timeout in seconds applied to every request
    #[arg(long = "timeout", env = "FEISHU_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,

    /// Read credentials from this file instead of ~/.goclaw/config.json
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log requests to stderr
    #[arg(short, long)]
    pub verbose: bool,
}

/// What the user asked for, before any I/O happens.
#[derive(Debug, PartialEq, Eq)]
pub enum Invocation {
    Upload { source: ImageSource, kind: ImageKind },
    /// --base64 without a payload
    MissingBase64,
    /// nothing to upload at all
    MissingInput,
}

impl Args {
    /// `--url` wins over `--base64`, which wins over a positional input.
    pub fn invocation(&self) -> Invocation {
        let kind = self.image_type.unwrap_or(self.kind);
        let source = match (&self.url, self.base64, &self.input) {
            (Some(url), _, _) => ImageSource::RemoteUrl(url.clone()),
            (None, true, Some(data)) => ImageSource::classify(data, true),
            (None, true, None) => return Invocation::MissingBase64,
            (None, false, Some(input)) => ImageSource::classify(input, false),
            (None, false, None) => return Invocation::MissingInput,
        };
        Invocation::Upload { source, kind }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn credential_source(&self) -> CredentialSource {
        match &self.config {
            Some(path) => CredentialSource::with_config_path(path),
            None => CredentialSource::new(),
        }
    }

    /// Spinner only in interactive, human-readable mode.
    pub fn wants_spinner(&self) -> bool {
        !self.quiet && self.output == OutputFormat::Key
    }
}

/// Run one upload end to end.
///
/// The input is resolved (and size-checked) before the token is requested,
/// so an oversized or unreadable image never costs an auth round-trip and
/// never reaches the upload call.
pub fn upload(
    api: &ApiClient,
    tokens: &mut TokenManager,
    creds: &Credentials,
    source: &ImageSource,
    kind: ImageKind,
    show_spinner: bool,
) -> Result<UploadResult> {
    let image = ImageSourceResolver::new(api).resolve(source)?;
    debug!(size = image.len(), %kind, "image ready for upload");

    let token = tokens.get_token(creds)?;

    let spinner = ui::spinner("Uploading...", !show_spinner);
    let result = api.upload(&token, UploadRequest { image, kind });
    spinner.finish_and_clear();
    result
}
