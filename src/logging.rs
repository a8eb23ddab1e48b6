use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

/// Installs the global `fmt` subscriber.
///
/// The explicit filter wins, then `RUST_LOG`, then `info`. A second call is a
/// no-op.
pub fn init(filter: Option<&str>) {
    let filter = filter
        .and_then(|directives| match EnvFilter::try_new(directives) {
            Ok(filter) => Some(filter),
            Err(error) => {
                eprintln!("Ignoring log filter `{}`: {}", directives, error);
                None
            }
        })
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER));

    if tracing_subscriber::fmt().with_env_filter(filter).try_init().is_ok() {
        tracing::debug!("logging initialized");
    }
}
