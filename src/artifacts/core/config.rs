//! Session configuration
//!
//! Every tunable has a default; [`Config::load_from_env`] layers
//! `BIT_REWRITE_*` environment variables on top of the defaults and the
//! binary layers its command-line flags on top of that.
//!
//! ## Variables
//!
//! - `BIT_REWRITE_DATE_FORMAT`: `raw`, `raw-permissive`, `rfc2822` or `now`
//! - `BIT_REWRITE_QUOTE_NON_ASCII`: boolean
//! - `BIT_REWRITE_BIG_DATA_THRESHOLD`: size with optional `k`/`m`/`g` suffix
//! - `BIT_REWRITE_PRUNE_EMPTY`: `never`, `roots` or `auto`
//! - `BIT_REWRITE_DROPPED_TARGET`: `retarget` or `drop`
//! - `BIT_REWRITE_LONG_PATH_WARNING`: path length in bytes
//! - `BIT_REWRITE_ALLOW_MISSING_TAGGER`: boolean
//! - `BIT_REWRITE_VALIDATE_TOPOLOGY`: boolean

use crate::artifacts::codec::date::DateFormat;
use crate::artifacts::codec::integer::{FileSize, parse_u64};
use crate::artifacts::core::error::ConfigError;
use clap::ValueEnum;

pub const DEFAULT_BIG_DATA_THRESHOLD: u64 = 16 * 1024 * 1024;
pub const DEFAULT_LONG_PATH_WARNING: usize = 4096;

/// Which commits may be removed once they no longer change anything
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum PrunePolicy {
    #[default]
    Never,
    /// Commits that lost all their parents and carry no file changes
    Roots,
    /// Non-merge commits left without file changes by the rewrite
    Auto,
}

/// What happens to a tag, reset or alias whose target commit was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TargetPolicy {
    /// Point it at the first surviving ancestor
    #[default]
    Retarget,
    Drop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub date_format: DateFormat,
    pub quote_non_ascii: bool,
    pub big_data_threshold: u64,
    pub prune_empty: PrunePolicy,
    pub dropped_target: TargetPolicy,
    pub long_path_warning: usize,
    pub allow_missing_tagger: bool,
    pub validate_topology: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            date_format: DateFormat::Raw,
            quote_non_ascii: true,
            big_data_threshold: DEFAULT_BIG_DATA_THRESHOLD,
            prune_empty: PrunePolicy::Never,
            dropped_target: TargetPolicy::Retarget,
            long_path_warning: DEFAULT_LONG_PATH_WARNING,
            allow_missing_tagger: false,
            validate_topology: false,
        }
    }
}

impl Config {
    /// Load the configuration from `BIT_REWRITE_*` environment variables
    ///
    /// Unset variables keep their defaults.
    ///
    /// # Returns
    ///
    /// A validated configuration or the first variable holding an invalid value
    pub fn load_from_env() -> Result<Self, ConfigError> {
        Self::load_from(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::load_from_env`] but reads variables through `lookup`
    pub fn load_from(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(value) = lookup("BIT_REWRITE_DATE_FORMAT") {
            config.date_format = parse_enum("BIT_REWRITE_DATE_FORMAT", value)?;
        }
        if let Some(value) = lookup("BIT_REWRITE_QUOTE_NON_ASCII") {
            config.quote_non_ascii = parse_bool("BIT_REWRITE_QUOTE_NON_ASCII", value)?;
        }
        if let Some(value) = lookup("BIT_REWRITE_BIG_DATA_THRESHOLD") {
            config.big_data_threshold = FileSize::parse(value.as_bytes())
                .map(|size| size.bytes())
                .map_err(|_| invalid("BIT_REWRITE_BIG_DATA_THRESHOLD", value))?;
        }
        if let Some(value) = lookup("BIT_REWRITE_PRUNE_EMPTY") {
            config.prune_empty = parse_enum("BIT_REWRITE_PRUNE_EMPTY", value)?;
        }
        if let Some(value) = lookup("BIT_REWRITE_DROPPED_TARGET") {
            config.dropped_target = parse_enum("BIT_REWRITE_DROPPED_TARGET", value)?;
        }
        if let Some(value) = lookup("BIT_REWRITE_LONG_PATH_WARNING") {
            config.long_path_warning = parse_u64(value.as_bytes())
                .ok()
                .and_then(|len| usize::try_from(len).ok())
                .ok_or_else(|| invalid("BIT_REWRITE_LONG_PATH_WARNING", value))?;
        }
        if let Some(value) = lookup("BIT_REWRITE_ALLOW_MISSING_TAGGER") {
            config.allow_missing_tagger = parse_bool("BIT_REWRITE_ALLOW_MISSING_TAGGER", value)?;
        }
        if let Some(value) = lookup("BIT_REWRITE_VALIDATE_TOPOLOGY") {
            config.validate_topology = parse_bool("BIT_REWRITE_VALIDATE_TOPOLOGY", value)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_date_format(mut self, date_format: DateFormat) -> Self {
        self.date_format = date_format;
        self
    }

    pub fn with_quote_non_ascii(mut self, quote_non_ascii: bool) -> Self {
        self.quote_non_ascii = quote_non_ascii;
        self
    }

    pub fn with_big_data_threshold(mut self, threshold: u64) -> Self {
        self.big_data_threshold = threshold;
        self
    }

    pub fn with_prune_empty(mut self, policy: PrunePolicy) -> Self {
        self.prune_empty = policy;
        self
    }

    pub fn with_dropped_target(mut self, policy: TargetPolicy) -> Self {
        self.dropped_target = policy;
        self
    }

    pub fn with_long_path_warning(mut self, len: usize) -> Self {
        self.long_path_warning = len;
        self
    }

    pub fn with_allow_missing_tagger(mut self, allow: bool) -> Self {
        self.allow_missing_tagger = allow;
        self
    }

    pub fn with_validate_topology(mut self, validate: bool) -> Self {
        self.validate_topology = validate;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.big_data_threshold == 0 {
            return Err(ConfigError::ZeroThreshold);
        }
        Ok(())
    }
}

fn invalid(key: &'static str, value: String) -> ConfigError {
    ConfigError::InvalidEnv { key, value }
}

fn parse_enum<T: ValueEnum>(key: &'static str, value: String) -> Result<T, ConfigError> {
    T::from_str(value.trim(), true).map_err(|_| invalid(key, value))
}

fn parse_bool(key: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, value)),
    }
}
