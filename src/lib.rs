// Library root
// -----------
// This crate backs two small command-line tools. The binaries (`main.rs` and
// `bin/vision-helper.rs`) only parse arguments and print; the work lives here.
//
// Module responsibilities:
// - `config`: Loads the Feishu app credentials from ~/.goclaw/config.json or
//   the environment.
// - `token`: Exchanges credentials for an app_access_token and caches it for
//   the run.
// - `source`: Resolves a file path, URL or base64 payload into bytes and
//   enforces the 10 MiB limit.
// - `api`: HTTP client for the open platform and the multipart image upload.
// - `cli` / `ui`: Argument parsing, the upload flow and output rendering.
// - `vision`: Client for the local vision model server used by
//   `vision-helper`.
// - `error` / `logging`: Shared error type and tracing setup.
pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod source;
pub mod token;
pub mod ui;
pub mod vision;

pub use error::{Error, Result};
