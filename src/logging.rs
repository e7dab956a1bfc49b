use color_eyre::eyre::{Result, eyre};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

pub const DEFAULT_FILTER: &str = "proctide=info";

/// Installs the global subscriber. Output goes to stderr; `json` switches to
/// one JSON object per line with span close events included.
pub fn init(json: bool) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let installed = if json {
        builder
            .with_ansi(false)
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| eyre!("failed to set tracing subscriber: {e}"))
}
