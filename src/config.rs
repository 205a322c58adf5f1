use crate::error::RepositoryError;

use serde::{Deserialize, Serialize};
use std::time;

/// Repository settings.
///
/// ```rust
/// use product_store::config::RepositoryConfig;
///
/// let config = RepositoryConfig {
///     database_name: "shop".to_string(),
///     ..Default::default()
/// };
/// assert_eq!(config.container_name, "SampleData");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Database holding the container.
    pub database_name: String,
    /// Container holding the product documents.
    pub container_name: String,
    /// Guard price updates with the etag of the document they read.
    ///
    /// When disabled, concurrent updates may overwrite each other.
    pub optimistic_concurrency: bool,
    /// Read-modify-write cycles attempted before giving up with a conflict.
    pub max_update_attempts: u32,
    /// Pause before the second attempt, doubled for every further one (milliseconds).
    pub retry_backoff_ms: u64,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            database_name: String::new(),
            container_name: "SampleData".to_string(),
            optimistic_concurrency: true,
            max_update_attempts: 3,
            retry_backoff_ms: 50,
        }
    }
}

impl RepositoryConfig {
    /// Reject settings the repository cannot work with.
    pub fn validate(&self) -> Result<(), RepositoryError> {
        if self.container_name.is_empty() {
            return Err(RepositoryError::invalid_argument(
                "container_name",
                "must not be empty",
            ));
        }
        if self.max_update_attempts == 0 {
            return Err(RepositoryError::invalid_argument(
                "max_update_attempts",
                "must be at least 1",
            ));
        }
        Ok(())
    }

    /// Pause before attempt `attempt + 1`, given that `attempt` attempts already failed.
    pub(crate) fn backoff(&self, attempt: u32) -> time::Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        time::Duration::from_millis(self.retry_backoff_ms.saturating_mul(factor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn test_deserialize_partial() {
        let actual: RepositoryConfig = serde_json::from_value(json!({
            "database_name": "shop",
            "max_update_attempts": 5,
        }))
        .unwrap();
        let expected = RepositoryConfig {
            database_name: "shop".to_string(),
            max_update_attempts: 5,
            ..Default::default()
        };
        assert_eq!(actual, expected);
    }

    #[rstest]
    #[case::default(RepositoryConfig::default(), true)]
    #[case::no_attempts(
        RepositoryConfig {
            max_update_attempts: 0,
            ..Default::default()
        },
        false
    )]
    #[case::no_container(
        RepositoryConfig {
            container_name: String::new(),
            ..Default::default()
        },
        false
    )]
    fn test_validate(#[case] config: RepositoryConfig, #[case] expected: bool) {
        assert_eq!(config.validate().is_ok(), expected);
    }

    #[rstest]
    #[case::first(1, 50)]
    #[case::second(2, 100)]
    #[case::third(3, 200)]
    fn test_backoff(#[case] attempt: u32, #[case] expected_ms: u64) {
        let actual = RepositoryConfig::default().backoff(attempt);
        assert_eq!(actual, time::Duration::from_millis(expected_ms));
    }
}
