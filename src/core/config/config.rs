use derive_setters::Setters;
use serde::{Deserialize, Serialize};

use super::SourceType;
use crate::core::Result;

pub const DEFAULT_MAX_PARENT_DEPTH: usize = 5;
pub const DEFAULT_MAX_PARENT_SEGMENTS: usize = 35;
pub const DEFAULT_MAX_CHILD_QUERIES: usize = 20;

/// Structural limits the remote store enforces on a single statement.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Setters, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Limits {
    ///
    /// Maximum number of relationship hops in a parent path, counted from the
    /// object the statement selects from.
    pub max_parent_depth: usize,

    ///
    /// Maximum number of dotted parent path fields in one statement.
    pub max_parent_segments: usize,

    ///
    /// Maximum number of child subqueries in one statement.
    pub max_child_queries: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_parent_depth: DEFAULT_MAX_PARENT_DEPTH,
            max_parent_segments: DEFAULT_MAX_PARENT_SEGMENTS,
            max_child_queries: DEFAULT_MAX_CHILD_QUERIES,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, Setters, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct PlannerConfig {
    pub limits: Limits,
}

impl PlannerConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_source(source_type: &SourceType, data: &str) -> Result<Self> {
        match source_type {
            SourceType::Json => Self::from_json(data),
            SourceType::Yml => Self::from_yaml(data),
        }
    }

    pub fn from_file(path: &str) -> Result<Self> {
        let source_type = SourceType::detect(path)?;
        let data = std::fs::read_to_string(path)?;
        Self::from_source(&source_type, &data)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_default_limits() {
        let config = PlannerConfig::default();
        assert_eq!(config.limits.max_parent_depth, 5);
        assert_eq!(config.limits.max_parent_segments, 35);
        assert_eq!(config.limits.max_child_queries, 20);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = PlannerConfig::from_json(r#"{"limits": {"maxParentDepth": 3}}"#).unwrap();
        assert_eq!(config.limits, Limits::default().max_parent_depth(3));
    }

    #[test]
    fn test_yaml() {
        let config = PlannerConfig::from_yaml("limits:\n  maxChildQueries: 4\n").unwrap();
        assert_eq!(config.limits.max_child_queries, 4);
        assert_eq!(config.limits.max_parent_segments, 35);
    }

    #[test]
    fn test_from_file() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/planner.yml");
        let config = PlannerConfig::from_file(path).unwrap();
        assert_eq!(
            config.limits,
            Limits::default().max_parent_depth(2).max_child_queries(10)
        );
    }
}
