//! Logging setup for the `opfail` binary.
//!
//! Logs go to stderr so that JSON on stdout stays machine readable.
//! `RUST_LOG` overrides the verbosity flags entirely.

use tracing_subscriber::{fmt, EnvFilter};

/// How chatty the classifier should be about its decisions.
///
/// `Decisions` logs each classification at debug; `Evidence` adds the
/// trace events showing which rule matched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Verbosity {
    /// Warnings and errors only.
    #[default]
    Quiet,
    /// Configuration loading and other info events.
    Info,
    Decisions,
    Evidence,
}

impl Verbosity {
    /// Maps a `-v` count: 0 = warn, 1 = info, 2 = debug, 3+ = trace.
    pub fn from_count(count: u8) -> Self {
        match count {
            0 => Verbosity::Quiet,
            1 => Verbosity::Info,
            2 => Verbosity::Decisions,
            _ => Verbosity::Evidence,
        }
    }

    fn directive(self) -> &'static str {
        match self {
            Verbosity::Quiet => "warn",
            Verbosity::Info => "info",
            Verbosity::Decisions => "debug",
            Verbosity::Evidence => "trace",
        }
    }

}

/// Subscriber settings for the CLI.
#[derive(Debug, Clone)]
pub struct LogSettings {
    pub verbosity: Verbosity,
    /// Prefix each line with a timestamp.
    pub timestamps: bool,
    /// Show the emitting module (`opfail::error::detector`, ...).
    pub targets: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            verbosity: Verbosity::default(),
            timestamps: false,
            targets: true,
        }
    }
}

impl LogSettings {
    pub fn for_cli(verbose: u8) -> Self {
        Self {
            verbosity: Verbosity::from_count(verbose),
            ..Self::default()
        }
    }

    pub fn timestamps(mut self, enabled: bool) -> Self {
        self.timestamps = enabled;
        self
    }

    pub fn targets(mut self, enabled: bool) -> Self {
        self.targets = enabled;
        self
    }

    /// Filter directive: our crate at the requested level, dependencies at warn.
    fn directive(&self) -> String {
        match self.verbosity {
            Verbosity::Quiet => "warn".to_string(),
            verbosity => format!("warn,opfail={}", verbosity.directive()),
        }
    }

    fn env_filter(&self) -> EnvFilter {
        match std::env::var("RUST_LOG") {
            Ok(_) => EnvFilter::from_default_env(),
            Err(_) => EnvFilter::new(self.directive()),
        }
    }
}

/// Install the global subscriber. Call once, at startup.
///
/// A second call leaves the first subscriber in place.
pub fn init_logging(settings: &LogSettings) {
    let builder = fmt::Subscriber::builder()
        .with_env_filter(settings.env_filter())
        .with_writer(std::io::stderr)
        .with_target(settings.targets);

    let installed = if settings.timestamps {
        builder.try_init()
    } else {
        builder.without_time().try_init()
    };

    if let Err(e) = installed {
        tracing::debug!("subscriber already installed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_from_count() {
        assert_eq!(Verbosity::from_count(0), Verbosity::Quiet);
        assert_eq!(Verbosity::from_count(1), Verbosity::Info);
        assert_eq!(Verbosity::from_count(2), Verbosity::Decisions);
        assert_eq!(Verbosity::from_count(3), Verbosity::Evidence);
        assert_eq!(Verbosity::from_count(200), Verbosity::Evidence);
    }

    #[test]
    fn test_directive_scopes_crate() {
        assert_eq!(LogSettings::for_cli(0).directive(), "warn");
        assert_eq!(LogSettings::for_cli(2).directive(), "warn,opfail=debug");
        assert_eq!(LogSettings::for_cli(5).directive(), "warn,opfail=trace");
    }

    #[test]
    fn test_settings_builder() {
        let settings = LogSettings::for_cli(1).timestamps(true).targets(false);
        assert_eq!(settings.verbosity, Verbosity::Info);
        assert_eq!(settings.directive(), "warn,opfail=info");
        assert!(settings.timestamps);
        assert!(!settings.targets);
    }

    #[test]
    fn test_init_logging_twice_is_harmless() {
        init_logging(&LogSettings::for_cli(0));
        init_logging(&LogSettings::for_cli(2).timestamps(true));
    }
}
