use {
    serde::Deserialize,
    std::{fmt, str::FromStr},
};

/// Format for log output, selected with the `log_format` option.
/// The default format is `default`, which is "full" human-readable format.
/// Other options are `json`, `compact`, and `pretty`.
#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Default,
    Compact,
    Pretty,
}

impl FromStr for LogFormat {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(LogFormat::Json),
            "default" => Ok(LogFormat::Default),
            "compact" => Ok(LogFormat::Compact),
            "pretty" => Ok(LogFormat::Pretty),
            _ => Err(()),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogFormat::Json => "json",
            LogFormat::Default => "default",
            LogFormat::Compact => "compact",
            LogFormat::Pretty => "pretty",
        })
    }
}

/// Installs the global tracing subscriber for the given format.
///
/// NOTE: This should be called early during startup to ensure logging is configured
///       before any log messages are emitted. Calling it twice is harmless.
pub(crate) fn setup_tracing(format: LogFormat) {
    use tracing_subscriber::{EnvFilter, prelude::*};
    let env_filter = EnvFilter::from_default_env();
    match format {
        LogFormat::Json => {
            let _ = tracing_subscriber::registry()
                .with(tracing_subscriber::fmt::layer().json())
                .with(env_filter)
                .try_init();
        }
        LogFormat::Default => {
            let _ = tracing_subscriber::registry()
                .with(tracing_subscriber::fmt::layer())
                .with(env_filter)
                .try_init();
        }
        LogFormat::Compact => {
            let _ = tracing_subscriber::registry()
                .with(tracing_subscriber::fmt::layer().compact())
                .with(env_filter)
                .try_init();
        }
        LogFormat::Pretty => {
            let _ = tracing_subscriber::registry()
                .with(tracing_subscriber::fmt::layer().pretty())
                .with(env_filter)
                .try_init();
        }
    }
}
