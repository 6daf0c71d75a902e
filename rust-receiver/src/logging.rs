//! Log filter setup shared by both binaries.

use tracing_subscriber::EnvFilter;

/// Targets whose debug events carry full payloads.
const PAYLOAD_TARGETS: [&str; 2] = ["capture=debug", "capture_worker=debug"];

/// Build the process log filter.
///
/// `RUST_LOG` wins when set, otherwise `info`. Payload debugging then raises
/// the crate's own targets to `debug` so the payload events are not filtered
/// out by the default level.
pub fn log_filter(debug_payloads: bool) -> EnvFilter {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    with_payload_debug(filter, debug_payloads)
}

/// Add the payload debug directives to `filter` when requested.
pub fn with_payload_debug(mut filter: EnvFilter, debug_payloads: bool) -> EnvFilter {
    if debug_payloads {
        for directive in PAYLOAD_TARGETS {
            if let Ok(directive) = directive.parse() {
                filter = filter.add_directive(directive);
            }
        }
    }
    filter
}
