use std::sync::Once;

/// Filter used when neither the config nor `RUST_LOG` names one. wgpu and naga are
/// chatty at `info`.
pub const DEFAULT_FILTER: &str = "info,wgpu_core=warn,wgpu_hal=warn,naga=warn";

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// `env_logger` directives, e.g. `"lumen_engine=debug"`. Overrides `RUST_LOG`.
    pub filter: Option<String>,
    pub style: env_logger::WriteStyle,
    /// Millisecond timestamps instead of seconds.
    pub precise_timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: None,
            style: env_logger::WriteStyle::Auto,
            precise_timestamps: false,
        }
    }
}

impl LoggingConfig {
    fn directives(&self) -> String {
        self.filter
            .clone()
            .or_else(|| std::env::var("RUST_LOG").ok())
            .unwrap_or_else(|| DEFAULT_FILTER.to_string())
    }
}

static INIT: Once = Once::new();

/// Installs `env_logger` as the global logger. Only the first call has any effect,
/// and a logger installed by someone else is left in place.
pub fn init_logging(config: &LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();
        builder.parse_filters(&config.directives());
        builder.write_style(config.style);
        if config.precise_timestamps {
            builder.format_timestamp_millis();
        }

        if let Err(err) = builder.try_init() {
            log::debug!("keeping existing logger: {err}");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_filter_wins() {
        let config = LoggingConfig {
            filter: Some("lumen_engine=trace".into()),
            ..LoggingConfig::default()
        };
        assert_eq!(config.directives(), "lumen_engine=trace");
    }

    #[test]
    fn second_init_is_a_no_op() {
        init_logging(&LoggingConfig::default());
        init_logging(&LoggingConfig {
            filter: Some("off".into()),
            ..LoggingConfig::default()
        });
        assert!(INIT.is_completed());
    }
}
