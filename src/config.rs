//! Run configuration.
//!
//! Everything the library reads from the process environment is read once,
//! into a [`Config`]. Specs take a `Config` by value, so tests can build one
//! with [`Config::from_lookup`] instead of mutating the environment.

use std::num::ParseIntError;

use miette::Diagnostic;
use once_cell::sync::Lazy;
use thiserror::Error;

use crate::ordering::OrderingMode;

pub const ORDERING_ENV: &str = "TESTCASE_ORDERING_MOD";
pub const SEED_ENV: &str = "TESTCASE_SEED";
pub const TAG_INCLUDE_ENV: &str = "TESTCASE_TAG_INCLUDE";
pub const TAG_EXCLUDE_ENV: &str = "TESTCASE_TAG_EXCLUDE";
pub const VERBOSE_ENV: &str = "TESTCASE_VERBOSE";
pub const TERM_ENV: &str = "TERM";

static GLOBAL: Lazy<Config> = Lazy::new(|| {
    let (config, errors) = Config::resolve(|key| std::env::var(key).ok());
    for err in &errors {
        tracing::warn!(error = %err, "ignoring invalid testcase setting");
    }
    tracing::info!(
        ordering = %config.ordering,
        seed = config.seed,
        "testcase configuration loaded; rerun with {}={} to reproduce",
        SEED_ENV,
        config.seed
    );
    config
});

#[derive(Debug, Error, Diagnostic, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid TESTCASE_ORDERING_MOD value {value:?}, expected one of: defined, file, random")]
    #[diagnostic(code(testcase::config::ordering))]
    InvalidOrdering { value: String },
    #[error("invalid TESTCASE_SEED value {value:?}: {source}")]
    #[diagnostic(code(testcase::config::seed), help("the seed must be a 64-bit integer"))]
    InvalidSeed {
        value: String,
        #[source]
        source: ParseIntError,
    },
    #[error("invalid boolean {value:?} for {var}")]
    #[diagnostic(code(testcase::config::flag))]
    InvalidFlag { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub ordering: OrderingMode,
    /// Shuffle and random-source seed.
    pub seed: u64,
    pub term: Option<String>,
    /// Render the whole report tree, not just failures.
    pub verbose: bool,
    pub tag_include: Vec<String>,
    pub tag_exclude: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ordering: OrderingMode::Random,
            seed: rand::random(),
            term: None,
            verbose: false,
            tag_include: Vec::new(),
            tag_exclude: Vec::new(),
        }
    }
}

impl Config {
    /// The process-wide configuration, read from the environment on first use.
    pub fn global() -> &'static Config {
        &GLOBAL
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup. Missing or blank keys
    /// keep their defaults; the first invalid value is an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let (config, errors) = Self::resolve(lookup);
        match errors.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(config),
        }
    }

    /// Like [`Config::from_lookup`], but an invalid value only resets its own
    /// setting. Every rejected value is returned alongside the config.
    pub fn resolve<F>(lookup: F) -> (Self, Vec<ConfigError>)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();
        let mut errors = Vec::new();

        if let Some(raw) = get(ORDERING_ENV) {
            match raw.parse() {
                Ok(ordering) => config.ordering = ordering,
                Err(err) => errors.push(err),
            }
        }
        if let Some(raw) = get(SEED_ENV) {
            match parse_seed(&raw) {
                Ok(seed) => config.seed = seed,
                Err(err) => errors.push(err),
            }
        }
        if let Some(raw) = get(VERBOSE_ENV) {
            match parse_flag(VERBOSE_ENV, &raw) {
                Ok(verbose) => config.verbose = verbose,
                Err(err) => errors.push(err),
            }
        }
        config.term = lookup(TERM_ENV);
        config.tag_include = get(TAG_INCLUDE_ENV).map(|v| split_tags(&v)).unwrap_or_default();
        config.tag_exclude = get(TAG_EXCLUDE_ENV).map(|v| split_tags(&v)).unwrap_or_default();
        (config, errors)
    }

    pub fn with_ordering(self, ordering: OrderingMode) -> Self {
        Self { ordering, ..self }
    }

    pub fn with_seed(self, seed: u64) -> Self {
        Self { seed, ..self }
    }

    pub fn with_verbose(self, verbose: bool) -> Self {
        Self { verbose, ..self }
    }

    pub fn with_term(self, term: Option<&str>) -> Self {
        Self {
            term: term.map(str::to_string),
            ..self
        }
    }

    pub fn with_tags(self, include: &[&str], exclude: &[&str]) -> Self {
        Self {
            tag_include: include.iter().map(|t| t.to_string()).collect(),
            tag_exclude: exclude.iter().map(|t| t.to_string()).collect(),
            ..self
        }
    }
}

/// Negative seeds keep their two's complement bits.
fn parse_seed(raw: &str) -> Result<u64, ConfigError> {
    let trimmed = raw.trim();
    trimmed
        .parse::<u64>()
        .or_else(|_| trimmed.parse::<i64>().map(|seed| seed as u64))
        .map_err(|source| ConfigError::InvalidSeed {
            value: raw.to_string(),
            source,
        })
}

fn parse_flag(var: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidFlag {
            var,
            value: raw.to_string(),
        }),
    }
}

fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_to_random_ordering() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.ordering, OrderingMode::Random);
        assert!(!config.verbose);
        assert!(config.term.is_none());
    }

    #[test]
    fn reads_all_known_variables() {
        let config = Config::from_lookup(lookup(&[
            (ORDERING_ENV, "file"),
            (SEED_ENV, "42"),
            (VERBOSE_ENV, "true"),
            (TERM_ENV, "xterm-256color"),
            (TAG_INCLUDE_ENV, "db, slow"),
            (TAG_EXCLUDE_ENV, "flaky"),
        ]))
        .unwrap();
        assert_eq!(config.ordering, OrderingMode::File);
        assert_eq!(config.seed, 42);
        assert!(config.verbose);
        assert_eq!(config.term.as_deref(), Some("xterm-256color"));
        assert_eq!(config.tag_include, vec!["db", "slow"]);
        assert_eq!(config.tag_exclude, vec!["flaky"]);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            Config::from_lookup(lookup(&[(ORDERING_ENV, "sideways")])),
            Err(ConfigError::InvalidOrdering { .. })
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[(SEED_ENV, "12abc")])),
            Err(ConfigError::InvalidSeed { .. })
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[(VERBOSE_ENV, "maybe")])),
            Err(ConfigError::InvalidFlag { .. })
        ));
    }

    #[test]
    fn negative_seeds_are_accepted() {
        let config = Config::from_lookup(lookup(&[(ORDERING_ENV, "defined"), (SEED_ENV, "-7")]))
            .unwrap();
        assert_eq!(config.ordering, OrderingMode::Defined);
        assert_eq!(config.seed, (-7_i64) as u64);
    }

    #[test]
    fn resolve_keeps_the_valid_settings() {
        let (config, errors) = Config::resolve(lookup(&[
            (ORDERING_ENV, "defined"),
            (SEED_ENV, "not a number"),
            (VERBOSE_ENV, "yes"),
        ]));
        assert_eq!(config.ordering, OrderingMode::Defined);
        assert!(config.verbose);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], ConfigError::InvalidSeed { .. }));

        let (config, errors) = Config::resolve(lookup(&[(SEED_ENV, "9"), (ORDERING_ENV, "sideways")]));
        assert_eq!(config.seed, 9);
        assert_eq!(config.ordering, OrderingMode::Random);
        assert!(matches!(errors[..], [ConfigError::InvalidOrdering { .. }]));
    }
}
