//! Environment configuration

use std::path::PathBuf;

pub const LOG_REQUESTS_ENV: &str = "CONVO_LOG_REQUESTS";
pub const STORAGE_PATH_ENV: &str = "CONVO_STORAGE_PATH";

/// Process-wide defaults for flushing and file storage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvoConfig {
    /// Log headless requests during flush
    pub log_requests: bool,
    /// JSON file backing `ConvoStorage::from_config`
    pub storage_path: Option<PathBuf>,
}

impl ConvoConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            log_requests: lookup(LOG_REQUESTS_ENV)
                .as_deref()
                .is_some_and(parse_flag),
            storage_path: lookup(STORAGE_PATH_ENV)
                .filter(|path| !path.trim().is_empty())
                .map(PathBuf::from),
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> ConvoConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ConvoConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        assert_eq!(config(&[]), ConvoConfig::default());
    }

    #[test]
    fn test_log_requests_flag() {
        assert!(config(&[(LOG_REQUESTS_ENV, "true")]).log_requests);
        assert!(config(&[(LOG_REQUESTS_ENV, "1")]).log_requests);
        assert!(config(&[(LOG_REQUESTS_ENV, " YES ")]).log_requests);
        assert!(!config(&[(LOG_REQUESTS_ENV, "false")]).log_requests);
        assert!(!config(&[(LOG_REQUESTS_ENV, "nope")]).log_requests);
    }

    #[test]
    fn test_storage_path() {
        let cfg = config(&[(STORAGE_PATH_ENV, "/tmp/convo.json")]);
        assert_eq!(cfg.storage_path, Some(PathBuf::from("/tmp/convo.json")));
        assert_eq!(config(&[(STORAGE_PATH_ENV, "  ")]).storage_path, None);
    }
}
