use color_eyre::Result;
use tracing_subscriber::{
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
    Layer,
};

pub fn init_errors() -> Result<()> {
    color_eyre::install()
}

/// Logs go to stderr so command output on stdout stays clean. `RUST_LOG` wins over `--verbose`.
pub fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,ark_console={level},ark_console_client={level},ark_console_config={level}"
        ))
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_filter(filter))
        .with(tracing_error::ErrorLayer::default())
        .try_init()?;
    Ok(())
}
