use crate::core::DbError;
use crate::storage::DurabilityMode;
use crate::wsv::DeletePolicy;
use std::path::PathBuf;
use thiserror::Error;

const URL_SCHEME: &str = "wsvdb://";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("URL must start with 'wsvdb://'")]
    InvalidScheme,

    #[error("Store name cannot be empty")]
    EmptyName,

    #[error("Unknown option '{0}'")]
    UnknownOption(String),

    #[error("Invalid value '{value}' for option '{option}'")]
    InvalidValue { option: String, value: String },

    #[error("durability=on_commit needs a snapshot path")]
    DurabilityWithoutSnapshot,
}

impl From<ConfigError> for DbError {
    fn from(err: ConfigError) -> Self {
        DbError::InvalidConfig(err.to_string())
    }
}

/// Store configuration
///
/// # Examples
///
/// ```
/// use wsvdb::config::StoreConfig;
/// use wsvdb::wsv::DeletePolicy;
///
/// let config = StoreConfig::new("ledger")
///     .delete_policy(DeletePolicy::Strict)
///     .max_retries(5);
/// assert_eq!(config.max_retries, 5);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    /// Store name, used in logs
    pub name: String,

    /// Checkpoint file; no persistence when absent
    pub snapshot_path: Option<PathBuf>,

    pub durability: DurabilityMode,

    /// How delete/revoke operations treat a missing row
    pub delete_policy: DeletePolicy,

    /// Times a ledger transaction is re-run after a retryable failure
    pub max_retries: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new("wsv")
    }
}

impl StoreConfig {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            snapshot_path: None,
            durability: DurabilityMode::None,
            delete_policy: DeletePolicy::Idempotent,
            max_retries: 3,
        }
    }

    pub fn snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    pub fn durability(mut self, durability: DurabilityMode) -> Self {
        self.durability = durability;
        self
    }

    pub fn delete_policy(mut self, policy: DeletePolicy) -> Self {
        self.delete_policy = policy;
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Parse from a store URL
    ///
    /// Format: `wsvdb://<name>?snapshot=<path>&durability=<none|on_commit>&deletes=<idempotent|strict>&retries=<n>`
    /// Every query option is optional.
    pub fn from_url(url: &str) -> Result<Self, ConfigError> {
        let rest = url
            .strip_prefix(URL_SCHEME)
            .ok_or(ConfigError::InvalidScheme)?;

        let (name, query) = match rest.split_once('?') {
            Some((name, query)) => (name, Some(query)),
            None => (rest, None),
        };

        let mut config = Self::new(name);
        for pair in query.into_iter().flat_map(|q| q.split('&')) {
            if pair.is_empty() {
                continue;
            }
            let (option, value) = pair.split_once('=').unwrap_or((pair, ""));
            let invalid = || ConfigError::InvalidValue {
                option: option.to_string(),
                value: value.to_string(),
            };

            config = match option {
                "snapshot" if !value.is_empty() => config.snapshot_path(value),
                "snapshot" => return Err(invalid()),
                "durability" => config.durability(match value {
                    "none" => DurabilityMode::None,
                    "on_commit" => DurabilityMode::OnCommit,
                    _ => return Err(invalid()),
                }),
                "deletes" => config.delete_policy(match value {
                    "idempotent" => DeletePolicy::Idempotent,
                    "strict" => DeletePolicy::Strict,
                    _ => return Err(invalid()),
                }),
                "retries" => config.max_retries(value.parse().map_err(|_| invalid())?),
                other => return Err(ConfigError::UnknownOption(other.to_string())),
            };
        }

        config.validate()?;
        Ok(config)
    }

    /// Convert to a store URL
    pub fn to_url(&self) -> String {
        let mut url = format!("{}{}?", URL_SCHEME, self.name);
        if let Some(path) = &self.snapshot_path {
            url.push_str(&format!("snapshot={}&", path.display()));
        }
        let durability = match self.durability {
            DurabilityMode::None => "none",
            DurabilityMode::OnCommit => "on_commit",
        };
        let deletes = match self.delete_policy {
            DeletePolicy::Idempotent => "idempotent",
            DeletePolicy::Strict => "strict",
        };
        url.push_str(&format!(
            "durability={}&deletes={}&retries={}",
            durability, deletes, self.max_retries
        ));
        url
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::EmptyName);
        }

        if self.durability == DurabilityMode::OnCommit && self.snapshot_path.is_none() {
            return Err(ConfigError::DurabilityWithoutSnapshot);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.delete_policy, DeletePolicy::Idempotent);
        assert_eq!(config.durability, DurabilityMode::None);
        assert_eq!(config.max_retries, 3);
        assert!(config.snapshot_path.is_none());
    }

    #[test]
    fn test_from_url() {
        let config = StoreConfig::from_url(
            "wsvdb://ledger?snapshot=/tmp/wsv.snap&durability=on_commit&deletes=strict&retries=7",
        )
        .unwrap();

        assert_eq!(config.name, "ledger");
        assert_eq!(config.snapshot_path, Some(PathBuf::from("/tmp/wsv.snap")));
        assert_eq!(config.durability, DurabilityMode::OnCommit);
        assert_eq!(config.delete_policy, DeletePolicy::Strict);
        assert_eq!(config.max_retries, 7);

        assert_eq!(StoreConfig::from_url(&config.to_url()).unwrap(), config);
    }

    #[test]
    fn test_from_url_errors() {
        assert_eq!(
            StoreConfig::from_url("postgres://x"),
            Err(ConfigError::InvalidScheme)
        );
        assert_eq!(StoreConfig::from_url("wsvdb://"), Err(ConfigError::EmptyName));
        assert!(matches!(
            StoreConfig::from_url("wsvdb://x?retries=many"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            StoreConfig::from_url("wsvdb://x?colour=blue"),
            Err(ConfigError::UnknownOption(_))
        ));
        assert_eq!(
            StoreConfig::from_url("wsvdb://x?durability=on_commit"),
            Err(ConfigError::DurabilityWithoutSnapshot)
        );
    }
}
