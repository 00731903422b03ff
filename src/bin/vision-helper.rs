// Entrypoint for `vision-helper`.
// - Sends one screenshot to the local vision server and prints the answer.
// - Analysis failures are printed, not returned: callers read stdout and
//   treat an `[ERROR: ...]` line as the result. Only a bad invocation or an
//   unreadable image exits non-zero.

use anyhow::Result;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use feishu_image_tools::vision::{Analysis, VisionClient, DEFAULT_PROMPT};
use feishu_image_tools::{logging, ui, Error};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;

#[derive(Parser, Debug)]
#[command(
    name = "vision-helper",
    about = "Send an image to the Senter vision server for analysis",
    after_help = "ENVIRONMENT:\n    SENTER_URL     server base URL (default http://localhost:8081)\n    VISION_MODEL   model name (default qwen2.5-omni:3b)"
)]
struct Args {
    /// Path to the image
    path: PathBuf,

    /// Question for the model
    #[arg(default_value = DEFAULT_PROMPT)]
    prompt: String,
}

fn main() -> Result<ExitCode> {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(err) => {
            let _ = err.print();
            println!("{}", Args::command().render_usage());
            return Ok(ExitCode::FAILURE);
        }
    };
    logging::init_with("info");

    let client = VisionClient::from_env()?;
    match client.analyze_file(&args.path, &args.prompt) {
        Ok(Analysis::Answer(content)) => println!("{}", content),
        Ok(Analysis::ApiError(raw)) => error!("API Error: {}", raw),
        Ok(Analysis::InvalidJson(raw)) => error!("Invalid JSON: {}", raw),
        Err(err @ Error::NotFound { .. }) => {
            error!("{}", ui::error_message(err));
            return Ok(ExitCode::FAILURE);
        }
        Err(err) => {
            let message = ui::error_message(err);
            error!("Vision Error: {}", message);
            println!("[ERROR: Vision analysis failed. Details: {}]", message);
        }
    }
    Ok(ExitCode::SUCCESS)
}
