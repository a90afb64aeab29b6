use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;

pub const LOG_ENV_VAR: &str = "HARVEST_LOG";

fn default_level(quiet: bool, verbose: bool) -> &'static str {
    if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "info"
    }
}

/// Timestamped log lines go to stderr so `--json` reports on stdout stay parseable.
pub fn init(quiet: bool, verbose: bool) -> Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new(default_level(quiet, verbose)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|err| anyhow!("failed to initialize tracing subscriber: {err}"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::default_level;

    #[test]
    fn quiet_wins_over_verbose() {
        assert_eq!(default_level(true, true), "error");
        assert_eq!(default_level(false, true), "debug");
        assert_eq!(default_level(false, false), "info");
    }
}
