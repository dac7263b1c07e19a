//! Structured logging for the Nebula texture atlas.
//!
//! Installs a `tracing` subscriber with console output (uptime timestamps and
//! module paths) plus an optional JSON file layer in debug builds. The level
//! comes from `RUST_LOG` when set, then from `config.debug.log_level`.

use std::path::Path;

use nebula_config::Config;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Directives used when neither `RUST_LOG` nor the config provide a level.
pub const DEFAULT_DIRECTIVES: &str = "info,nebula_texture=info";

/// File name of the JSON log written in debug builds.
pub const LOG_FILE_NAME: &str = "nebula-atlas.log";

/// Returns the filter directives for the given config.
///
/// A bare level such as `"debug"` is widened to cover the atlas crate too,
/// anything containing `=` or `,` is used verbatim.
pub fn filter_directives(config: Option<&Config>) -> String {
    let level = config
        .map(|c| c.debug.log_level.trim())
        .filter(|level| !level.is_empty());

    match level {
        Some(level) if level.contains('=') || level.contains(',') => level.to_string(),
        Some(level) => format!("{level},nebula_texture={level}"),
        None => DEFAULT_DIRECTIVES.to_string(),
    }
}

/// Initialize the global tracing subscriber.
///
/// * `log_dir` - directory for the JSON log file (debug builds only)
/// * `debug_build` - enables the JSON file layer
/// * `config` - optional config supplying `debug.log_level`
///
/// Returns `false` when a global subscriber was already installed, which is
/// the normal case for test binaries calling this more than once.
///
/// ```no_run
/// use nebula_config::Config;
/// use nebula_log::init_logging;
///
/// let config = Config::default();
/// init_logging(None, false, Some(&config));
/// ```
pub fn init_logging(log_dir: Option<&Path>, debug_build: bool, config: Option<&Config>) -> bool {
    let directives = filter_directives(config);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directives));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_names(true)
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    if debug_build
        && let Some(log_dir) = log_dir
        && std::fs::create_dir_all(log_dir).is_ok()
        && let Ok(log_file) = std::fs::File::create(log_dir.join(LOG_FILE_NAME))
    {
        let file_layer = fmt::layer()
            .with_writer(log_file)
            .with_ansi(false)
            .with_target(true)
            .with_timer(fmt::time::uptime())
            .json();

        return subscriber.with(file_layer).try_init().is_ok();
    }

    subscriber.try_init().is_ok()
}

/// Create an `EnvFilter` from [`DEFAULT_DIRECTIVES`].
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new(DEFAULT_DIRECTIVES)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives() {
        let filter_str = format!("{}", default_env_filter());
        assert!(filter_str.contains("nebula_texture=info"));
        assert!(filter_str.contains("info"));
    }

    #[test]
    fn test_bare_level_is_widened() {
        let mut config = Config::default();
        config.debug.log_level = "debug".to_string();
        assert_eq!(
            filter_directives(Some(&config)),
            "debug,nebula_texture=debug"
        );
    }

    #[test]
    fn test_full_directive_used_verbatim() {
        let mut config = Config::default();
        config.debug.log_level = "warn,nebula_texture=trace".to_string();
        assert_eq!(
            filter_directives(Some(&config)),
            "warn,nebula_texture=trace"
        );
    }

    #[test]
    fn test_empty_level_falls_back_to_default() {
        let mut config = Config::default();
        config.debug.log_level = "  ".to_string();
        assert_eq!(filter_directives(Some(&config)), DEFAULT_DIRECTIVES);
        assert_eq!(filter_directives(None), DEFAULT_DIRECTIVES);
    }

    #[test]
    fn test_env_filter_parsing() {
        let valid_filters = [
            "info",
            "debug,nebula_texture=trace",
            "warn,nebula_texture::loader=debug",
            "error",
        ];

        for filter_str in &valid_filters {
            let result = EnvFilter::try_from(*filter_str);
            assert!(result.is_ok(), "Failed to parse filter: {}", filter_str);
        }
    }

    #[test]
    fn test_second_init_reports_existing_subscriber() {
        let dir = tempfile::tempdir().unwrap();
        init_logging(Some(dir.path()), true, None);
        assert!(!init_logging(None, false, None));
    }
}
