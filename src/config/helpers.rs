//! Environment lookup helpers shared by the config sections.

use std::str::FromStr;

use crate::error::ConfigError;

/// Read an environment variable, treating "not set" as `None`.
///
/// Values that are present but not valid unicode are an error rather than
/// silently ignored.
pub(crate) fn optional_env(key: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(value) => Ok(Some(value)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "value is not valid unicode".to_string(),
        }),
    }
}

/// Read an environment variable, dropping empty values.
pub(crate) fn non_empty_env(key: &str) -> Result<Option<String>, ConfigError> {
    Ok(optional_env(key)?.filter(|v| !v.trim().is_empty()))
}

/// Parse an environment variable, falling back to `default` when unset.
pub(crate) fn parse_optional_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match non_empty_env(key)? {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}

/// Parse an optional numeric-ish environment variable with no default.
pub(crate) fn parse_env<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    non_empty_env(key)?
        .map(|raw| {
            raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })
        })
        .transpose()
}

/// Parse a boolean flag.
///
/// A variable that is set but empty counts as `true`, so `FLAG=` behaves like
/// the presence-only switches shells commonly export.
pub(crate) fn flag_env(key: &str, default: bool) -> Result<bool, ConfigError> {
    match optional_env(key)? {
        None => Ok(default),
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "" | "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("must be 'true' or 'false', got '{other}'"),
            }),
        },
    }
}
