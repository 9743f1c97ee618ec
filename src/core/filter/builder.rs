use serde_json::{Map, Value};

use super::{BoolOp, Expression, Operator, Predicate};
use crate::core::registry::{FieldConfig, ObjectConfig, ScalarKind};
use crate::core::valid::{Valid, ValidationError, Validator};
use crate::core::{Error, Result};

const LEAF: &str = "leaf";
const NODE: &str = "node";

/// Turns the structured filter input into an [`Expression`].
///
/// When built with an object, every field is checked against the registry:
/// it must be a filterable leaf and the operator has to be available for its
/// scalar kind.
#[derive(Clone, Copy, Default)]
pub struct FilterBuilder<'a> {
    object: Option<&'a ObjectConfig>,
}

impl<'a> FilterBuilder<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(object: &'a ObjectConfig) -> Self {
        Self { object: Some(object) }
    }

    /// Resolves the WHERE expression of a list field. A structured filter wins
    /// over a raw filter string.
    pub fn where_clause(
        &self,
        filter: Option<&Value>,
        filter_string: Option<&str>,
    ) -> Result<Option<Expression>> {
        match (filter, filter_string) {
            (Some(filter), _) if !filter.is_null() => self
                .build(filter)
                .to_result()
                .map(Some)
                .map_err(Error::FilterSyntax),
            (_, Some(raw)) if !raw.trim().is_empty() => Ok(Some(Expression::raw(raw))),
            _ => Ok(None),
        }
    }

    pub fn build(&self, filter: &Value) -> Valid<Expression, String> {
        let Some(filter) = filter.as_object() else {
            return Valid::fail("filter must be an object".to_string());
        };

        match (filter.get(LEAF), filter.get(NODE)) {
            (Some(_), Some(_)) => {
                Valid::fail("filter cannot specify both `leaf` and `node`".to_string())
            }
            (None, None) => {
                Valid::fail("filter must specify either `leaf` or `node`".to_string())
            }
            (Some(leaf), None) => self.build_leaf(leaf).trace(LEAF),
            (None, Some(node)) => self.build_node(node).trace(NODE),
        }
    }

    fn build_leaf(&self, leaf: &Value) -> Valid<Expression, String> {
        let Some(fields) = leaf.as_object().filter(|fields| !fields.is_empty()) else {
            return Valid::fail("leaf must specify at least one field".to_string());
        };

        Valid::from_iter(fields.iter(), |(field, operators)| {
            self.build_field(field, operators).trace(field)
        })
        .and_then(|fields| {
            let folded = fields
                .into_iter()
                .flatten()
                .reduce(|acc, expr| acc.and(expr));
            Valid::from_option(
                folded,
                "leaf must specify at least one non-null comparison".to_string(),
            )
        })
    }

    /// `None` when every operator of the field compares against `null`.
    fn build_field(&self, field: &str, operators: &Value) -> Valid<Option<Expression>, String> {
        let Some(operators) = operators.as_object().filter(|ops| !ops.is_empty()) else {
            return Valid::fail(format!("field `{}` must specify at least one operator", field));
        };

        self.field_kind(field).and_then(|kind| {
            Valid::from_iter(operators.iter(), |(name, value)| {
                self.build_predicate(field, kind, name, value)
            })
            .map(|predicates| {
                predicates
                    .into_iter()
                    .flatten()
                    .map(Expression::predicate)
                    .reduce(|acc, expr| acc.and(expr))
            })
        })
    }

    fn build_predicate(
        &self,
        field: &str,
        kind: Option<ScalarKind>,
        name: &str,
        value: &Value,
    ) -> Valid<Option<Predicate>, String> {
        Valid::from(name.parse::<Operator>().map_err(ValidationError::new)).and_then(|operator| {
            match kind {
                Some(kind) if !operator.is_available_for(kind) => Valid::fail(format!(
                    "operator `{}` is not available for {} field `{}`",
                    name, kind, field
                )),
                _ => Valid::from(
                    Predicate::from_value(field, operator, value, kind)
                        .map_err(ValidationError::new),
                ),
            }
        })
    }

    fn field_kind(&self, field: &str) -> Valid<Option<ScalarKind>, String> {
        let Some(object) = self.object else {
            return Valid::succeed(None);
        };
        match object.field(field) {
            Some(FieldConfig::Leaf(leaf)) if leaf.filterable => Valid::succeed(Some(leaf.scalar)),
            Some(FieldConfig::Leaf(_)) => Valid::fail(format!(
                "field `{}` of `{}` is not filterable",
                field, object.name
            )),
            Some(config) => Valid::fail(format!(
                "field `{}` of `{}` is a {} relationship and cannot be filtered",
                field,
                object.name,
                config.kind_name()
            )),
            None => Valid::fail(format!("`{}` has no field `{}`", object.name, field)),
        }
    }

    fn build_node(&self, node: &Value) -> Valid<Expression, String> {
        let Some(node) = node.as_object() else {
            return Valid::fail("node must be an object".to_string());
        };

        if let Some(group) = node.get("AND") {
            self.build_group(BoolOp::And, group, Expression::and).trace("AND")
        } else if let Some(group) = node.get("OR") {
            self.build_group(BoolOp::Or, group, Expression::or).trace("OR")
        } else if let Some(subtree) = node.get("NOT") {
            self.build_not(subtree).trace("NOT")
        } else {
            Valid::fail("node must specify one of `AND`, `OR` or `NOT`".to_string())
        }
    }

    fn build_group(
        &self,
        op: BoolOp,
        group: &Value,
        combine: fn(Expression, Expression) -> Expression,
    ) -> Valid<Expression, String> {
        let subtrees = match group.as_array() {
            Some(subtrees) if subtrees.len() >= 2 => subtrees,
            _ => return Valid::fail(format!("`{}` requires at least two subtrees", op)),
        };

        Valid::from_iter(subtrees.iter().enumerate(), |(i, subtree)| {
            self.build(subtree).trace(&format!("[{}]", i))
        })
        .and_then(|exprs| {
            let folded = exprs.into_iter().reduce(combine);
            Valid::from_option(folded, format!("`{}` requires at least two subtrees", op))
        })
    }

    fn build_not(&self, subtree: &Value) -> Valid<Expression, String> {
        let subtree = match subtree {
            Value::Array(items) if items.len() == 1 => &items[0],
            Value::Array(_) => {
                return Valid::fail("`NOT` requires exactly one subtree".to_string());
            }
            subtree => subtree,
        };
        self.build(subtree).map(Expression::not)
    }
}

/// Convenience for `{ leaf: { field: { eq: value } } }`.
pub fn leaf_eq(field: &str, value: Value) -> Value {
    let mut operators = Map::new();
    operators.insert(Operator::Eq.input_name().to_string(), value);
    let mut fields = Map::new();
    fields.insert(field.to_string(), Value::Object(operators));
    let mut filter = Map::new();
    filter.insert(LEAF.to_string(), Value::Object(fields));
    Value::Object(filter)
}
