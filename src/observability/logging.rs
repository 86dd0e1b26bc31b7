//! Structured logging.
//!
//! The subscriber is installed once per process. The returned
//! [`LogRegistry`] is threaded into the components that need runtime level
//! access (the admin `log` task) instead of a process-global logger lookup.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{reload, EnvFilter, Registry};

use crate::config::{ConfigError, LoggingConfig};

/// Handle for inspecting and adjusting log levels at runtime.
pub struct LogRegistry {
    handle: Option<reload::Handle<EnvFilter, Registry>>,
    default_level: LevelFilter,
    directives: Mutex<BTreeMap<String, LevelFilter>>,
}

impl LogRegistry {
    /// A registry not attached to a subscriber. Level changes only affect
    /// its own view; useful when the process-global subscriber is owned by
    /// someone else.
    pub fn detached(default_level: LevelFilter) -> Arc<Self> {
        Arc::new(Self {
            handle: None,
            default_level,
            directives: Mutex::new(BTreeMap::new()),
        })
    }

    /// Effective level for a target.
    pub fn level(&self, target: &str) -> LevelFilter {
        self.directives
            .lock()
            .unwrap()
            .get(target)
            .copied()
            .unwrap_or(self.default_level)
    }

    /// Set the level for a target and reload the active filter.
    pub fn set_level(&self, target: &str, level: LevelFilter) {
        self.directives.lock().unwrap().insert(target.to_string(), level);
        self.reload();
    }

    fn reload(&self) {
        let Some(handle) = &self.handle else {
            return;
        };
        let filter = self.build_filter();
        if let Err(error) = handle.reload(filter) {
            tracing::warn!(error = %error, "failed to reload log filter");
        }
    }

    fn build_filter(&self) -> EnvFilter {
        let mut spec = self.default_level.to_string();
        for (target, level) in self.directives.lock().unwrap().iter() {
            spec.push_str(&format!(",{target}={level}"));
        }
        EnvFilter::try_new(&spec)
            .unwrap_or_else(|_| EnvFilter::new(self.default_level.to_string()))
    }
}

/// Parse a level name ("trace".."error", "off"), case-insensitive.
pub fn parse_level(level: &str) -> Option<LevelFilter> {
    level.parse::<LevelFilter>().ok()
}

/// Canonical upper-case name of a level, as printed by the `log` task.
pub fn level_name(level: LevelFilter) -> &'static str {
    if level == LevelFilter::OFF {
        "OFF"
    } else if level == LevelFilter::ERROR {
        "ERROR"
    } else if level == LevelFilter::WARN {
        "WARN"
    } else if level == LevelFilter::INFO {
        "INFO"
    } else if level == LevelFilter::DEBUG {
        "DEBUG"
    } else {
        "TRACE"
    }
}

/// Initialise the tracing subscriber from configuration.
///
/// Only the first call in a process installs the global subscriber; later
/// calls return a registry detached from it.
pub fn init_logging(config: &LoggingConfig) -> Result<Arc<LogRegistry>, ConfigError> {
    let default_level =
        parse_level(&config.level).ok_or_else(|| ConfigError::UnsupportedLevel(config.level.clone()))?;

    let mut directives = BTreeMap::new();
    for (target, level) in &config.loggers {
        let parsed =
            parse_level(level).ok_or_else(|| ConfigError::UnsupportedLevel(level.clone()))?;
        directives.insert(target.clone(), parsed);
    }

    let registry = LogRegistry {
        handle: None,
        default_level,
        directives: Mutex::new(directives),
    };
    let filter = registry.build_filter();
    let (filter_layer, handle) = reload::Layer::new(filter);

    let installed = tracing_subscriber::registry()
        .with(filter_layer)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok();

    Ok(Arc::new(LogRegistry {
        handle: installed.then_some(handle),
        ..registry
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_levels_case_insensitively() {
        assert_eq!(parse_level("debug"), Some(LevelFilter::DEBUG));
        assert_eq!(parse_level("WARN"), Some(LevelFilter::WARN));
        assert_eq!(parse_level("off"), Some(LevelFilter::OFF));
        assert_eq!(parse_level("loud"), None);
    }

    #[test]
    fn set_level_overrides_the_default() {
        let registry = LogRegistry::detached(LevelFilter::INFO);
        assert_eq!(registry.level("gantry::server"), LevelFilter::INFO);

        registry.set_level("gantry::server", LevelFilter::TRACE);
        assert_eq!(registry.level("gantry::server"), LevelFilter::TRACE);
        assert_eq!(registry.level("gantry::admin"), LevelFilter::INFO);
    }

    #[test]
    fn level_names_round_trip() {
        for name in ["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"] {
            let level = parse_level(name).unwrap();
            assert_eq!(level_name(level), name);
        }
    }
}
