use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::core::filter::FilterBuilder;
use crate::core::registry::ObjectConfig;
use crate::core::soql::{OrderBy, Query};
use crate::core::Result;

/// Arguments accepted by every list field: root objects and child
/// relationships.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListArgs {
    pub filter: Option<Value>,
    pub filter_string: Option<String>,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
    pub order_by: Option<OrderBy>,
    pub scope: Option<String>,
}

impl ListArgs {
    pub fn from_arguments(arguments: &IndexMap<String, Value>) -> Result<Self> {
        let arguments = arguments
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect::<Map<_, _>>();
        Ok(serde_json::from_value(Value::Object(arguments))?)
    }

    /// Sets the WHERE, ORDER BY, LIMIT, OFFSET and USING SCOPE clauses of
    /// `query`. Filters are checked against `object`.
    pub fn apply(&self, query: Query, object: &ObjectConfig) -> Result<Query> {
        let where_clause = FilterBuilder::with_object(object)
            .where_clause(self.filter.as_ref(), self.filter_string.as_deref())?;
        Ok(Query {
            where_clause,
            order_by: self.order_by.clone(),
            limit: self.limit,
            offset: self.offset,
            scope: self.scope.clone(),
            ..query
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::core::soql::{Direction, QueryCompiler};
    use crate::core::tests::galaxy;

    fn args(value: Value) -> IndexMap<String, Value> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_from_arguments() {
        let list = ListArgs::from_arguments(&args(json!({
            "filterString": "age > 10",
            "limit": 5,
            "offset": null,
            "orderBy": { "fields": ["name"], "dir": "DESC" },
            "scope": "mine"
        })))
        .unwrap();
        assert_eq!(list.filter_string.as_deref(), Some("age > 10"));
        assert_eq!(list.limit, Some(5));
        assert_eq!(list.offset, None);
        assert_eq!(list.order_by.map(|o| o.dir), Some(Direction::Desc));
        assert_eq!(list.scope.as_deref(), Some("mine"));
    }

    #[test]
    fn test_negative_limit_rejected() {
        assert!(ListArgs::from_arguments(&args(json!({ "limit": -1 }))).is_err());
    }

    #[test]
    fn test_apply() {
        let registry = galaxy();
        let jedi = registry.get("Jedi").unwrap();
        let list = ListArgs::from_arguments(&args(json!({
            "filter": { "leaf": { "name": { "eq": "Yoda" } } },
            "filterString": "ignored",
            "limit": 1
        })))
        .unwrap();
        let query = list.apply(Query::new("Jedi").field("Id"), jedi).unwrap();
        let soql = QueryCompiler::default().compile(&query).unwrap();
        assert_eq!(soql, "SELECT Id FROM Jedi WHERE ( name = 'Yoda' ) LIMIT 1");
    }

    #[test]
    fn test_apply_rejects_unfilterable_field() {
        let registry = galaxy();
        let jedi = registry.get("Jedi").unwrap();
        let list = ListArgs::from_arguments(&args(json!({
            "filter": { "leaf": { "notes": { "like": "%force%" } } }
        })))
        .unwrap();
        assert!(list.apply(Query::new("Jedi"), jedi).is_err());
    }
}
