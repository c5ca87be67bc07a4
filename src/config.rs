#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{path::PathBuf, str::FromStr};

use anyhow::{Context, Result, bail};
use tracing::Level;
use typed_builder::TypedBuilder;

/// Default SQLite file for the override store.
pub const DEFAULT_DB_PATH: &str = "ccx.sqlite3";

/// A provider that can be named in `CCX_FIELD_OVERRIDE_PROVIDERS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// Custom course overrides.
    Ccx,
    /// Per-student deadline extensions.
    IndividualDueDates,
}

impl FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "ccx" => Ok(ProviderKind::Ccx),
            "individual_due_dates" => Ok(ProviderKind::IndividualDueDates),
            other => bail!("Unknown field override provider `{other}`"),
        }
    }
}

/// How overrides and native values interleave when an inheritable field is
/// resolved along the ancestor chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InheritanceMode {
    /// The nearest override on the node or any ancestor wins; native values
    /// are only consulted when no override exists anywhere above. A chapter
    /// deadline set by a coach therefore reaches verticals that carry their
    /// own deadline in the base course.
    #[default]
    OverrideFirst,
    /// Each level is checked for an override and then its native value before
    /// moving to the parent.
    NativeFirst,
}

impl FromStr for InheritanceMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "override_first" => Ok(InheritanceMode::OverrideFirst),
            "native_first" => Ok(InheritanceMode::NativeFirst),
            other => bail!("Unknown inheritance mode `{other}`"),
        }
    }
}

/// Process configuration, built once at start-up and passed down explicitly.
#[derive(Debug, Clone, TypedBuilder)]
#[builder(doc)]
pub struct Settings {
    /// SQLite file backing the override store.
    #[builder(default = PathBuf::from(DEFAULT_DB_PATH), setter(into))]
    db_path:     PathBuf,
    /// Providers in priority order.
    #[builder(default = vec![ProviderKind::Ccx])]
    providers:   Vec<ProviderKind>,
    /// Inheritance rule for resolution passes.
    #[builder(default)]
    inheritance: InheritanceMode,
    /// Log verbosity of the binary.
    #[builder(default = Level::INFO)]
    log_level:   Level,
}

impl Default for Settings {
    fn default() -> Self {
        Settings::builder().build()
    }
}

impl Settings {
    /// Reads settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`, which returns the raw value of an
    /// environment key.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let read = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };

        let db_path = read("CCX_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));

        let providers = match read("CCX_FIELD_OVERRIDE_PROVIDERS") {
            Some(list) => list
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(ProviderKind::from_str)
                .collect::<Result<Vec<_>>>()
                .context("Invalid CCX_FIELD_OVERRIDE_PROVIDERS")?,
            None => vec![ProviderKind::Ccx],
        };

        let inheritance = read("CCX_INHERITANCE")
            .map(|v| v.parse::<InheritanceMode>())
            .transpose()
            .context("Invalid CCX_INHERITANCE")?
            .unwrap_or_default();

        let log_level = read("CCX_LOG_LEVEL")
            .map(|v| v.parse::<Level>())
            .transpose()
            .context("Invalid CCX_LOG_LEVEL")?
            .unwrap_or(Level::INFO);

        Ok(Self {
            db_path,
            providers,
            inheritance,
            log_level,
        })
    }

    /// Returns the override database path.
    pub fn db_path(&self) -> &PathBuf {
        &self.db_path
    }

    /// Returns the providers in priority order.
    pub fn providers(&self) -> &[ProviderKind] {
        &self.providers
    }

    /// Returns the inheritance rule.
    pub fn inheritance(&self) -> InheritanceMode {
        self.inheritance
    }

    /// Returns the log level.
    pub fn log_level(&self) -> Level {
        self.log_level
    }
}
