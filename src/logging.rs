use tracing_subscriber::EnvFilter;

/// Configures the process-wide tracing subscriber. `RUST_LOG` always wins
/// when set; otherwise verbosity is derived from `-v`/`-q` CLI flags.
pub fn init(verbosity: u8, quiet: bool) {
    let default_level = if quiet {
        "error"
    } else {
        match verbosity {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
