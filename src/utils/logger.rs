use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn default_directives(verbose: bool, quiet: bool) -> &'static str {
    match (verbose, quiet) {
        (true, _) => "invite_scan=debug,info",
        (false, true) => "invite_scan=error,error",
        (false, false) => "invite_scan=info,warn",
    }
}

/// RUST_LOG wins over the flags when set.
fn default_filter(verbose: bool, quiet: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose, quiet)))
}

/// Logs go to stderr; stdout is reserved for the encoded report.
pub fn init_cli_logger(verbose: bool, quiet: bool) {
    tracing_subscriber::registry()
        .with(default_filter(verbose, quiet))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();
}

pub fn init_json_logger(verbose: bool, quiet: bool) {
    tracing_subscriber::registry()
        .with(default_filter(verbose, quiet))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .json(),
        )
        .init();
}
