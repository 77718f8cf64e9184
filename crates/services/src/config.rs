use std::env;
use std::path::{Path, PathBuf};

use study_core::DEFAULT_DUE_LIMIT;
use study_core::scheduler::QualityPolicy;

use crate::error::ConfigError;

pub const DB_URL_VAR: &str = "STUDY_DB_URL";
pub const DUE_LIMIT_VAR: &str = "STUDY_DUE_LIMIT";
pub const QUALITY_POLICY_VAR: &str = "STUDY_QUALITY_POLICY";

const DEFAULT_DB_URL: &str = "sqlite://study.sqlite3";

/// Runtime settings for the study services.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StudyConfig {
    pub db_url: String,
    pub due_limit: u32,
    pub quality_policy: QualityPolicy,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            db_url: normalize_sqlite_url(DEFAULT_DB_URL),
            due_limit: DEFAULT_DUE_LIMIT,
            quality_policy: QualityPolicy::default(),
        }
    }
}

impl StudyConfig {
    /// Read `STUDY_DB_URL`, `STUDY_DUE_LIMIT`, and `STUDY_QUALITY_POLICY`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a variable is set to an unusable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`StudyConfig::from_env`] over an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a variable is set to an unusable value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = lookup(DB_URL_VAR) {
            if raw.trim().is_empty() {
                return Err(ConfigError::EmptyDbUrl);
            }
            config.db_url = normalize_sqlite_url(&raw);
        }

        if let Some(raw) = lookup(DUE_LIMIT_VAR) {
            config.due_limit = match raw.trim().parse::<u32>() {
                Ok(limit) if limit > 0 => limit,
                _ => return Err(ConfigError::InvalidDueLimit { raw }),
            };
        }

        if let Some(raw) = lookup(QUALITY_POLICY_VAR) {
            config.quality_policy = raw.parse()?;
        }

        Ok(config)
    }
}

/// Turn a bare path or `sqlite:` URL into an absolute `sqlite://` URL that
/// creates the file on first use.
///
/// In-memory URLs are returned unchanged.
#[must_use]
pub fn normalize_sqlite_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed == "sqlite::memory:" || trimmed.contains("mode=memory") {
        return trimmed.to_owned();
    }

    let (location, query) = match trimmed.split_once('?') {
        Some((location, query)) => (location, Some(query)),
        None => (trimmed, None),
    };

    let path_str = location
        .strip_prefix("sqlite://")
        .or_else(|| location.strip_prefix("sqlite:"))
        .unwrap_or(location);
    let path = Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };

    let query = match query {
        Some(q) if q.split('&').any(|kv| kv.starts_with("mode=")) => q.to_owned(),
        Some(q) if !q.is_empty() => format!("{q}&mode=rwc"),
        _ => "mode=rwc".to_owned(),
    };
    format!("sqlite://{}?{query}", absolute.display())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = StudyConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.due_limit, 10);
        assert_eq!(config.quality_policy, QualityPolicy::Permissive);
        assert!(config.db_url.starts_with("sqlite://"));
        assert!(config.db_url.ends_with("study.sqlite3?mode=rwc"));
    }

    #[test]
    fn reads_all_variables() {
        let config = StudyConfig::from_lookup(lookup(&[
            (DB_URL_VAR, "/tmp/cards.db"),
            (DUE_LIMIT_VAR, " 25 "),
            (QUALITY_POLICY_VAR, "Clamp"),
        ]))
        .unwrap();
        assert_eq!(config.db_url, "sqlite:///tmp/cards.db?mode=rwc");
        assert_eq!(config.due_limit, 25);
        assert_eq!(config.quality_policy, QualityPolicy::Clamp);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            StudyConfig::from_lookup(lookup(&[(DUE_LIMIT_VAR, "0")])),
            Err(ConfigError::InvalidDueLimit { .. })
        ));
        assert!(matches!(
            StudyConfig::from_lookup(lookup(&[(DUE_LIMIT_VAR, "ten")])),
            Err(ConfigError::InvalidDueLimit { .. })
        ));
        assert!(matches!(
            StudyConfig::from_lookup(lookup(&[(QUALITY_POLICY_VAR, "lenient")])),
            Err(ConfigError::QualityPolicy(_))
        ));
        assert!(matches!(
            StudyConfig::from_lookup(lookup(&[(DB_URL_VAR, "  ")])),
            Err(ConfigError::EmptyDbUrl)
        ));
    }

    #[test]
    fn normalizes_sqlite_urls() {
        assert_eq!(normalize_sqlite_url("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(
            normalize_sqlite_url("sqlite:file:db?mode=memory&cache=shared"),
            "sqlite:file:db?mode=memory&cache=shared"
        );
        assert_eq!(
            normalize_sqlite_url("sqlite:///var/lib/study.db"),
            "sqlite:///var/lib/study.db?mode=rwc"
        );
        assert_eq!(
            normalize_sqlite_url("sqlite:/data/s.db?mode=ro"),
            "sqlite:///data/s.db?mode=ro"
        );
        assert_eq!(
            normalize_sqlite_url("/data/s.db?cache=shared"),
            "sqlite:///data/s.db?cache=shared&mode=rwc"
        );
        assert!(normalize_sqlite_url("local.db").ends_with("/local.db?mode=rwc"));
    }
}
