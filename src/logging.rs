use tracing::Level;

/// Installs the `fmt` subscriber on stderr. Records emitted through the `log`
/// facade (the `measure_time` macros) are forwarded to it as well.
pub fn init(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}
