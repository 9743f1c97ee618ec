use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::ScalarKind;
use crate::core::config::SourceType;
use crate::core::Result;

fn default_filterable() -> bool {
    true
}

/// Remote objects keyed by their API name.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(transparent)]
pub struct Registry(IndexMap<String, ObjectConfig>);

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ObjectConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub fields: IndexMap<String, FieldConfig>,
}

/// Classification of a single field of an object.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldConfig {
    /// A scalar column.
    Leaf(LeafField),
    /// A to-one relationship. More than one target makes it polymorphic.
    Parent(ParentField),
    /// A to-many relationship, only reachable through a subquery.
    Child(ChildField),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LeafField {
    pub scalar: ScalarKind,
    #[serde(default = "default_filterable")]
    pub filterable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ParentField {
    pub targets: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ChildField {
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Registry {
    pub fn new(objects: impl IntoIterator<Item = ObjectConfig>) -> Self {
        Self(
            objects
                .into_iter()
                .map(|object| (object.name.clone(), object))
                .collect(),
        )
    }

    pub fn get(&self, name: &str) -> Option<&ObjectConfig> {
        self.0.get(name)
    }

    pub fn objects(&self) -> impl Iterator<Item = &ObjectConfig> {
        self.0.values()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_file(path: &str) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        match SourceType::detect(path)? {
            SourceType::Json => Self::from_json(&data),
            SourceType::Yml => Self::from_yaml(&data),
        }
    }
}

impl ObjectConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), description: None, fields: IndexMap::new() }
    }

    pub fn field(&self, name: &str) -> Option<&FieldConfig> {
        self.fields.get(name)
    }

    pub fn leaf(mut self, name: &str, scalar: ScalarKind) -> Self {
        self.fields.insert(
            name.to_string(),
            FieldConfig::Leaf(LeafField { scalar, filterable: true, description: None }),
        );
        self
    }

    pub fn parent<S: Into<String>>(mut self, name: &str, targets: impl IntoIterator<Item = S>) -> Self {
        self.fields.insert(
            name.to_string(),
            FieldConfig::Parent(ParentField {
                targets: targets.into_iter().map(Into::into).collect(),
                description: None,
            }),
        );
        self
    }

    pub fn child(mut self, name: &str, target: &str) -> Self {
        self.fields.insert(
            name.to_string(),
            FieldConfig::Child(ChildField { target: target.to_string(), description: None }),
        );
        self
    }
}

impl FieldConfig {
    pub fn description(&self) -> Option<&str> {
        match self {
            FieldConfig::Leaf(leaf) => leaf.description.as_deref(),
            FieldConfig::Parent(parent) => parent.description.as_deref(),
            FieldConfig::Child(child) => child.description.as_deref(),
        }
    }

    pub fn as_leaf(&self) -> Option<&LeafField> {
        match self {
            FieldConfig::Leaf(leaf) => Some(leaf),
            _ => None,
        }
    }

    pub fn is_polymorphic(&self) -> bool {
        matches!(self, FieldConfig::Parent(parent) if parent.targets.len() > 1)
    }

    /// The single object this field leads to, if there is exactly one.
    pub fn target(&self) -> Option<&str> {
        match self {
            FieldConfig::Leaf(_) => None,
            FieldConfig::Parent(parent) => match parent.targets.as_slice() {
                [target] => Some(target.as_str()),
                _ => None,
            },
            FieldConfig::Child(child) => Some(child.target.as_str()),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            FieldConfig::Leaf(_) => "leaf",
            FieldConfig::Parent(_) => "parent",
            FieldConfig::Child(_) => "child",
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const REGISTRY: &str = r#"{
        "Jedi": {
            "name": "Jedi",
            "description": "A knight of the order",
            "fields": {
                "Id": { "type": "leaf", "scalar": "id", "filterable": true },
                "name": { "type": "leaf", "scalar": "string" },
                "Master": { "type": "parent", "targets": ["Jedi"] },
                "Padawans": { "type": "child", "target": "Jedi" }
            }
        }
    }"#;

    #[test]
    fn test_from_json() {
        let registry = Registry::from_json(REGISTRY).unwrap();
        let jedi = registry.get("Jedi").unwrap();
        assert_eq!(jedi.description.as_deref(), Some("A knight of the order"));
        assert_eq!(
            jedi.field("name"),
            Some(&FieldConfig::Leaf(LeafField {
                scalar: ScalarKind::String,
                filterable: true,
                description: None
            }))
        );
        assert_eq!(jedi.field("Master").and_then(FieldConfig::target), Some("Jedi"));
        assert_eq!(jedi.field("Padawans").and_then(FieldConfig::target), Some("Jedi"));
    }

    #[test]
    fn test_builder_matches_json() {
        let built = Registry::new([ObjectConfig {
            description: Some("A knight of the order".to_string()),
            ..ObjectConfig::new("Jedi")
                .leaf("Id", ScalarKind::Id)
                .leaf("name", ScalarKind::String)
                .parent("Master", ["Jedi"])
                .child("Padawans", "Jedi")
        }]);
        assert_eq!(built, Registry::from_json(REGISTRY).unwrap());
    }

    #[test]
    fn test_polymorphic() {
        let object = ObjectConfig::new("Case").parent("Owner", ["User", "Queue"]);
        let owner = object.field("Owner").unwrap();
        assert!(owner.is_polymorphic());
        assert_eq!(owner.target(), None);
    }

    #[test]
    fn test_yaml() {
        let registry = Registry::from_yaml(
            "Lightsaber:\n  name: Lightsaber\n  fields:\n    color:\n      type: leaf\n      scalar: picklist\n      filterable: false\n",
        )
        .unwrap();
        let color = registry.get("Lightsaber").and_then(|o| o.field("color")).unwrap();
        assert_eq!(color.as_leaf().map(|l| l.filterable), Some(false));
    }
}
