//! Runtime configuration: JSON file, then `ORACLE_*` environment overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{OracleError, OracleResult};
use crate::indexer::pagerank::SymbolRankConfig;
use crate::query::guards::{DEFAULT_MAX_RELATED, MAX_RANK_ITERATIONS, MAX_RELATED_SYMBOLS};

pub const ENV_RANK_DAMPING: &str = "ORACLE_RANK_DAMPING";
pub const ENV_RANK_TOLERANCE: &str = "ORACLE_RANK_TOLERANCE";
pub const ENV_RANK_MAX_ITERATIONS: &str = "ORACLE_RANK_MAX_ITERATIONS";
pub const ENV_PERSONALIZE: &str = "ORACLE_PERSONALIZE";
pub const ENV_MAX_RELATED: &str = "ORACLE_MAX_RELATED";
pub const ENV_EMBEDDING_STORE: &str = "ORACLE_EMBEDDING_STORE";
pub const ENV_PROVIDER_TIMEOUT_MS: &str = "ORACLE_PROVIDER_TIMEOUT_MS";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub rank: SymbolRankConfig,
    /// Default number of related symbols appended after the best match.
    pub max_related: usize,
    /// SQLite file backing the embedding store. In-memory when unset.
    pub embedding_store: Option<PathBuf>,
    pub provider_timeout_ms: Option<u64>,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            rank: SymbolRankConfig::default(),
            max_related: DEFAULT_MAX_RELATED,
            embedding_store: None,
            provider_timeout_ms: None,
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> OracleResult<T> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| OracleError::Config(format!("{key} has an invalid value: {raw:?}")))
}

fn env_flag(raw: &str) -> bool {
    let v = raw.trim().to_lowercase();
    !matches!(v.as_str(), "0" | "false" | "no" | "off")
}

impl OracleConfig {
    pub fn from_json_str(text: &str) -> OracleResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read `path` (defaults when absent), apply environment overrides and
    /// validate.
    pub fn load(path: Option<&Path>) -> OracleResult<Self> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    OracleError::Config(format!("failed to read {}: {e}", path.display()))
                })?;
                Self::from_json_str(&text)?
            }
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) -> OracleResult<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup. Empty values are ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> OracleResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(raw) = get(ENV_RANK_DAMPING) {
            self.rank.damping = parse_env(ENV_RANK_DAMPING, &raw)?;
        }
        if let Some(raw) = get(ENV_RANK_TOLERANCE) {
            self.rank.tolerance = parse_env(ENV_RANK_TOLERANCE, &raw)?;
        }
        if let Some(raw) = get(ENV_RANK_MAX_ITERATIONS) {
            self.rank.max_iterations = parse_env(ENV_RANK_MAX_ITERATIONS, &raw)?;
        }
        if let Some(raw) = get(ENV_PERSONALIZE) {
            self.rank.personalize = env_flag(&raw);
        }
        if let Some(raw) = get(ENV_MAX_RELATED) {
            self.max_related = parse_env(ENV_MAX_RELATED, &raw)?;
        }
        if let Some(raw) = get(ENV_EMBEDDING_STORE) {
            self.embedding_store = Some(PathBuf::from(raw.trim()));
        }
        if let Some(raw) = get(ENV_PROVIDER_TIMEOUT_MS) {
            self.provider_timeout_ms = Some(parse_env(ENV_PROVIDER_TIMEOUT_MS, &raw)?);
        }
        debug!("Effective oracle config: {self:?}");
        Ok(())
    }

    pub fn validate(&self) -> OracleResult<()> {
        self.rank.validate()?;
        if self.rank.max_iterations > MAX_RANK_ITERATIONS {
            return Err(OracleError::Config(format!(
                "max_iterations must be at most {MAX_RANK_ITERATIONS}, got {}",
                self.rank.max_iterations
            )));
        }
        if self.max_related > MAX_RELATED_SYMBOLS {
            return Err(OracleError::Config(format!(
                "max_related must be at most {MAX_RELATED_SYMBOLS}, got {}",
                self.max_related
            )));
        }
        if self.provider_timeout_ms == Some(0) {
            return Err(OracleError::Config(
                "provider_timeout_ms must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn provider_timeout(&self) -> Option<Duration> {
        self.provider_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RelationKind;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = OracleConfig::default();
        assert_eq!(config.max_related, 5);
        assert_eq!(config.rank.damping, 0.85);
        assert!(config.rank.personalize);
        assert!(config.embedding_store.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = OracleConfig::from_json_str(
            r#"{"max_related": 8, "rank": {"damping": 0.9, "relations": ["calls"]}}"#,
        )
        .unwrap();
        assert_eq!(config.max_related, 8);
        assert_eq!(config.rank.damping, 0.9);
        assert_eq!(config.rank.relations, vec![RelationKind::Calls]);
        assert_eq!(config.rank.max_iterations, 100);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = OracleConfig::default();
        config
            .apply_overrides_from(lookup(&[
                (ENV_RANK_DAMPING, "0.5"),
                (ENV_RANK_MAX_ITERATIONS, " 20 "),
                (ENV_PERSONALIZE, "Off"),
                (ENV_MAX_RELATED, "3"),
                (ENV_EMBEDDING_STORE, "/tmp/emb.db"),
                (ENV_PROVIDER_TIMEOUT_MS, "1500"),
                (ENV_RANK_TOLERANCE, ""),
            ]))
            .unwrap();
        assert_eq!(config.rank.damping, 0.5);
        assert_eq!(config.rank.max_iterations, 20);
        assert!(!config.rank.personalize);
        assert_eq!(config.rank.tolerance, 1e-6);
        assert_eq!(config.max_related, 3);
        assert_eq!(config.embedding_store, Some(PathBuf::from("/tmp/emb.db")));
        assert_eq!(config.provider_timeout(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_invalid_env_value_is_config_error() {
        let mut config = OracleConfig::default();
        let err = config
            .apply_overrides_from(lookup(&[(ENV_MAX_RELATED, "many")]))
            .unwrap_err();
        assert!(matches!(err, OracleError::Config(_)));
    }

    #[test]
    fn test_validate_bounds() {
        let mut config = OracleConfig {
            max_related: MAX_RELATED_SYMBOLS + 1,
            ..OracleConfig::default()
        };
        assert!(config.validate().is_err());
        config.max_related = 5;
        config.provider_timeout_ms = Some(0);
        assert!(config.validate().is_err());
        config.provider_timeout_ms = None;
        config.rank.seed_weight = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oracle.json");
        std::fs::write(&path, r#"{"provider_timeout_ms": 250}"#).unwrap();
        let config = OracleConfig::load(Some(&path)).unwrap();
        assert!(config.provider_timeout_ms.is_some());

        let missing = OracleConfig::load(Some(&dir.path().join("missing.json")));
        assert!(matches!(missing, Err(OracleError::Config(_))));
    }
}
