// Entrypoint for `feishu-upload-image`.
// - Keeps `main` small: parse args, build the API client, run one upload.
// - Every failure ends up in `report_failure`, which owns the stderr message,
//   the optional JSON envelope and the exit status.

use clap::{CommandFactory, Parser};
use feishu_image_tools::api::ApiClient;
use feishu_image_tools::cli::{self, Args, Invocation};
use feishu_image_tools::config::REMEDIATION;
use feishu_image_tools::token::TokenManager;
use feishu_image_tools::{logging, ui, Error};
use std::process::ExitCode;
use tracing::debug;

fn main() -> ExitCode {
    let args = Args::parse();
    logging::init(args.verbose);

    let (source, kind) = match args.invocation() {
        Invocation::Upload { source, kind } => (source, kind),
        Invocation::MissingBase64 => {
            eprintln!("Error: base64 string required when using --base64");
            return ExitCode::FAILURE;
        }
        Invocation::MissingInput => {
            let _ = Args::command().print_help();
            return ExitCode::FAILURE;
        }
    };

    let creds = match args.credential_source().load() {
        Ok(creds) => creds,
        Err(err) => return report_failure(&args, err),
    };

    let api = match ApiClient::new(&args.base_url, args.timeout()) {
        Ok(api) => api,
        Err(err) => return report_failure(&args, err),
    };
    debug!(base_url = api.base_url(), %kind, "starting upload");

    let mut tokens = TokenManager::new(api.clone());
    match cli::upload(&api, &mut tokens, &creds, &source, kind, args.wants_spinner()) {
        Ok(result) => {
            println!("{}", ui::render_success(args.output, args.quiet, &result.image_key));
            ExitCode::SUCCESS
        }
        Err(err) => report_failure(&args, err),
    }
}

fn report_failure(args: &Args, err: Error) -> ExitCode {
    let is_config = err.is_config();
    let message = ui::error_message(err);

    eprintln!("Error: {}", message);
    if is_config {
        eprintln!("{}", REMEDIATION);
    }
    if let Some(envelope) = ui::render_failure(args.output, &message) {
        println!("{}", envelope);
    }
    ExitCode::FAILURE
}
