//! Sharded collection directives

use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::reconcile::ReconcileError;

/// `db.collection`: database names exclude `/\. "$`, collection names exclude `$`.
fn namespace_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"^([^/\\. "$]+)\.([^$\s][^$]*)$"#).expect("namespace pattern is valid")
    })
}

/// A desired `namespace → shard key` directive.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShardedCollectionSpec {
    pub namespace: String,
    pub shard_key: String,
}

impl ShardedCollectionSpec {
    /// Validate and build a directive.
    pub fn parse(namespace: &str, shard_key: &str) -> Result<Self, ReconcileError> {
        if !namespace_pattern().is_match(namespace) {
            return Err(ReconcileError::InvalidConfiguration(format!(
                "sharded collection '{}' is not of the form 'db.collection'",
                namespace
            )));
        }
        if shard_key.trim().is_empty() {
            return Err(ReconcileError::InvalidConfiguration(format!(
                "sharded collection '{}' has an empty shard key",
                namespace
            )));
        }
        Ok(Self {
            namespace: namespace.to_string(),
            shard_key: shard_key.to_string(),
        })
    }

    /// Parse a whole `namespace → key` map, failing on the first bad entry.
    pub fn parse_all(collections: &BTreeMap<String, String>) -> Result<Vec<Self>, ReconcileError> {
        collections
            .iter()
            .map(|(namespace, key)| Self::parse(namespace, key))
            .collect()
    }

    pub fn database(&self) -> &str {
        self.namespace
            .split_once('.')
            .map_or(self.namespace.as_str(), |(db, _)| db)
    }

    pub fn collection(&self) -> &str {
        self.namespace.split_once('.').map_or("", |(_, coll)| coll)
    }

    /// Key document `{shard_key: 1}`.
    pub fn key_document(&self) -> BTreeMap<String, i32> {
        let mut key = BTreeMap::new();
        key.insert(self.shard_key.clone(), 1);
        key
    }
}

/// Distinct database names, sorted.
pub fn distinct_databases(specs: &[ShardedCollectionSpec]) -> Vec<String> {
    specs
        .iter()
        .map(|s| s.database().to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_namespace() {
        let spec = ShardedCollectionSpec::parse("app.events.archive", "tenant").unwrap();
        assert_eq!(spec.database(), "app");
        assert_eq!(spec.collection(), "events.archive");
        assert_eq!(spec.key_document().get("tenant"), Some(&1));
    }

    #[test]
    fn test_parse_rejects_malformed_namespaces() {
        for ns in ["nodot", ".coll", "db.", "my db.coll", "db.$cmd"] {
            assert!(ShardedCollectionSpec::parse(ns, "k").is_err(), "accepted {}", ns);
        }
    }

    #[test]
    fn test_parse_rejects_empty_key() {
        let err = ShardedCollectionSpec::parse("db.coll", "  ").unwrap_err();
        assert!(err.to_string().contains("empty shard key"));
    }

    #[test]
    fn test_distinct_databases() {
        let mut map = BTreeMap::new();
        map.insert("app.users".to_string(), "_id".to_string());
        map.insert("app.events".to_string(), "ts".to_string());
        map.insert("logs.lines".to_string(), "host".to_string());

        let specs = ShardedCollectionSpec::parse_all(&map).unwrap();
        assert_eq!(distinct_databases(&specs), vec!["app", "logs"]);
    }
}
