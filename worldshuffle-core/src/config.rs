use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::catalog::{
    DEFAULT_EXCLUSIONS, DEFAULT_OPAQUE_BRANCHES, DEFAULT_SKIP_LIST, DEFAULT_WEIGHTS,
};
use crate::{Result, ShuffleError};

pub const DEFAULT_NAMESPACE: &str = "minecraft";
pub const DEFAULT_WORKERS: usize = 4;

/// Tunables that can be overridden from a JSON config file. Fields left
/// out of the file keep their built-in defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ShuffleConfig {
    pub namespace: String,
    pub exclusions: Vec<String>,
    pub weights: BTreeMap<String, usize>,
    pub skip_list: Vec<String>,
    pub opaque_branches: Vec<String>,
    pub workers: usize,
}

impl Default for ShuffleConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            exclusions: DEFAULT_EXCLUSIONS.iter().map(|s| s.to_string()).collect(),
            weights: DEFAULT_WEIGHTS
                .iter()
                .map(|(id, w)| (id.to_string(), *w))
                .collect(),
            skip_list: DEFAULT_SKIP_LIST.iter().map(|s| s.to_string()).collect(),
            opaque_branches: DEFAULT_OPAQUE_BRANCHES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            workers: DEFAULT_WORKERS,
        }
    }
}

impl ShuffleConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        let cfg: ShuffleConfig = serde_json::from_str(&data)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(ShuffleError::Config(
                "workers must be at least 1".to_string(),
            ));
        }
        if self.namespace.is_empty() || self.namespace.contains(':') {
            return Err(ShuffleError::Config(format!(
                "invalid namespace '{}'",
                self.namespace
            )));
        }
        Ok(())
    }

    pub fn exclusion_set(&self) -> HashSet<String> {
        self.exclusions.iter().cloned().collect()
    }

    pub fn skip_list(&self) -> SkipList {
        SkipList::new(&self.namespace, self.skip_list.iter().map(String::as_str))
    }

    pub fn opaque_branches(&self) -> OpaqueBranches {
        OpaqueBranches::new(self.opaque_branches.iter().map(String::as_str))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShuffleSettings {
    pub seed: u64,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub catalog_path: PathBuf,
    pub archive: bool,
    pub debug: bool,
    pub config: ShuffleConfig,
}

/// Protected identifiers. Entries and candidates are compared in their
/// namespaced form, so `water` and `minecraft:water` are the same value.
#[derive(Debug, Clone, Default)]
pub struct SkipList {
    namespace: String,
    values: HashSet<String>,
}

impl SkipList {
    pub fn new<'a>(namespace: &str, values: impl IntoIterator<Item = &'a str>) -> Self {
        let mut list = SkipList {
            namespace: namespace.to_string(),
            values: HashSet::new(),
        };
        for v in values {
            let qualified = list.qualify(v);
            list.values.insert(qualified);
        }
        list
    }

    fn qualify(&self, value: &str) -> String {
        if value.contains(':') {
            value.to_string()
        } else {
            format!("{}:{}", self.namespace, value)
        }
    }

    pub fn contains(&self, value: &str) -> bool {
        self.values.contains(&self.qualify(value))
    }
}

#[derive(Debug, Clone, Default)]
pub struct OpaqueBranches(HashSet<String>);

impl OpaqueBranches {
    pub fn new<'a>(keys: impl IntoIterator<Item = &'a str>) -> Self {
        OpaqueBranches(keys.into_iter().map(str::to_string).collect())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_list_matches_bare_and_namespaced_forms() {
        let skip = SkipList::new("minecraft", ["water", "minecraft:lava"]);
        assert!(skip.contains("minecraft:water"));
        assert!(skip.contains("water"));
        assert!(skip.contains("lava"));
        assert!(!skip.contains("minecraft:stone"));
        assert!(!skip.contains("other:water"));
    }

    #[test]
    fn partial_config_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shuffle.json");
        fs::write(&path, r#"{ "workers": 2, "weights": { "diamond_block": 5 } }"#).unwrap();

        let cfg = ShuffleConfig::load(&path).unwrap();
        assert_eq!(cfg.workers, 2);
        assert_eq!(cfg.weights.get("diamond_block"), Some(&5));
        assert!(cfg.weights.get("chest").is_none());
        assert_eq!(cfg.namespace, DEFAULT_NAMESPACE);
        assert!(cfg.exclusion_set().contains("bedrock"));
        assert!(cfg.skip_list().contains("minecraft:water"));
        assert!(cfg.opaque_branches().contains("blocks"));
    }

    #[test]
    fn zero_workers_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shuffle.json");
        fs::write(&path, r#"{ "workers": 0 }"#).unwrap();
        assert!(matches!(
            ShuffleConfig::load(&path),
            Err(ShuffleError::Config(_))
        ));
    }
}
