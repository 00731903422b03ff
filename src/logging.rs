// Logging setup shared by both binaries. Logs go to stderr so stdout stays
// reserved for results that scripts parse.

use tracing_subscriber::EnvFilter;

const VERBOSE: &str = "feishu_image_tools=debug,feishu_upload_image=debug,vision_helper=debug,warn";

/// Install the global subscriber. `RUST_LOG` wins when set; otherwise only
/// warnings are shown, or everything from this crate with `verbose`.
pub fn init(verbose: bool) {
    init_with(if verbose { VERBOSE } else { "warn" });
}

/// Same as `init` with explicit fallback directives.
pub fn init_with(default_directives: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives));

    // a second init (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
