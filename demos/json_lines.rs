use std::error::Error;
use std::fmt;

use tracing::{error, info, info_span, warn};
use tracing_loki_json::init::{init_tracing_with_config, LayerConfig};
use tracing_loki_json::LokiFormatter;

#[derive(Debug)]
struct UpstreamError {
    status: u16,
}

impl fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "upstream answered {}", self.status)
    }
}

impl Error for UpstreamError {}

fn main() -> Result<(), Box<dyn Error>> {
    let formatter = LokiFormatter::from_env()?;
    init_tracing_with_config(formatter, LayerConfig::default())?;

    info!(request_id = "abc123", "user {} logged in", "alice");

    let span = info_span!("handle_request");
    let _guard = span.enter();

    warn!(attempt = 3, latency_ms = 412.5, "slow upstream");

    let err = UpstreamError { status: 502 };
    error!(error = &err as &(dyn Error + 'static), request_id = "abc123", "request failed");

    Ok(())
}
