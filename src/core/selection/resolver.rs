use std::collections::{HashMap, HashSet};

use async_graphql::parser::types::{
    Directive, DocumentOperations, ExecutableDocument, Field, OperationDefinition, OperationType,
    Selection, SelectionSet as GraphQLSelectionSet,
};
use async_graphql::Positioned;
use async_graphql_value::{ConstValue, Name, Value as GraphQLValue};
use indexmap::IndexMap;
use serde_json::{Map, Value};

use super::{FieldSet, FieldSetCondition, SelectionSet};
use crate::core::surface::{TypeIndex, TypeRef, TYPENAME};
use crate::core::{Error, Result};

/// A field collected from a selection set, tagged with the innermost type
/// condition it was selected under.
#[derive(Clone, Copy)]
struct Collected<'a> {
    field: &'a Field,
    condition: Option<&'a str>,
}

/// State of one resolution pass.
#[derive(Default)]
struct Pass<'a> {
    variables: Map<String, Value>,
    fragments: HashMap<&'a str, Vec<Collected<'a>>>,
    in_progress: HashSet<&'a str>,
}

/// Turns the selections of a GraphQL operation into [`FieldSet`] trees.
pub struct SelectionResolver<'a> {
    index: &'a TypeIndex,
    document: &'a ExecutableDocument,
    variables: Map<String, Value>,
}

impl<'a> SelectionResolver<'a> {
    pub fn new(index: &'a TypeIndex, document: &'a ExecutableDocument) -> Self {
        Self { index, document, variables: Map::new() }
    }

    pub fn variables(mut self, variables: Map<String, Value>) -> Self {
        self.variables = variables;
        self
    }

    /// Resolves the root fields of the selected operation.
    pub fn resolve(&self, operation_name: Option<&str>) -> Result<Vec<FieldSet>> {
        let operation = self.operation(operation_name)?;
        if operation.ty != OperationType::Query {
            return Err(Error::Resolution(format!(
                "{} operations are not supported",
                operation.ty
            )));
        }

        let mut pass = Pass { variables: self.variables_with_defaults(operation)?, ..Pass::default() };
        let mut items = Vec::new();
        self.collect(&mut pass, &operation.selection_set.node, None, &mut items)?;
        self.resolve_fields(&mut pass, self.index.query_type(), items)
    }

    fn operation(&self, operation_name: Option<&str>) -> Result<&'a OperationDefinition> {
        let document: &'a ExecutableDocument = self.document;
        match (&document.operations, operation_name) {
            (DocumentOperations::Single(operation), _) => Ok(&operation.node),
            (DocumentOperations::Multiple(operations), Some(name)) => operations
                .get(name)
                .map(|operation| &operation.node)
                .ok_or_else(|| Error::Resolution(format!("unknown operation `{}`", name))),
            (DocumentOperations::Multiple(operations), None) => {
                let mut operations = operations.values();
                match (operations.next(), operations.next()) {
                    (Some(operation), None) => Ok(&operation.node),
                    _ => Err(Error::Resolution(
                        "an operation name is required when the document has several operations"
                            .to_string(),
                    )),
                }
            }
        }
    }

    fn variables_with_defaults(&self, operation: &OperationDefinition) -> Result<Map<String, Value>> {
        let mut variables = self.variables.clone();
        for definition in &operation.variable_definitions {
            let name = definition.node.name.node.as_str();
            if let Some(default) = &definition.node.default_value {
                if !variables.contains_key(name) {
                    let value = default.node.clone().into_json()?;
                    variables.insert(name.to_string(), value);
                }
            }
        }
        Ok(variables)
    }

    /// Evaluates `@skip` and `@include`. Skipping wins when both apply.
    fn is_included(&self, pass: &Pass<'a>, directives: &[Positioned<Directive>]) -> bool {
        let condition = |name: &str| {
            directives
                .iter()
                .find(|directive| directive.node.name.node.as_str() == name)
                .and_then(|directive| directive.node.get_argument("if"))
                .map(|value| match &value.node {
                    GraphQLValue::Boolean(value) => *value,
                    GraphQLValue::Variable(variable) => pass
                        .variables
                        .get(variable.as_str())
                        .and_then(Value::as_bool)
                        .unwrap_or_default(),
                    _ => false,
                })
        };

        !condition("skip").unwrap_or(false) && condition("include").unwrap_or(true)
    }

    fn collect(
        &self,
        pass: &mut Pass<'a>,
        selection_set: &'a GraphQLSelectionSet,
        condition: Option<&'a str>,
        out: &mut Vec<Collected<'a>>,
    ) -> Result<()> {
        for selection in &selection_set.items {
            match &selection.node {
                Selection::Field(field) => {
                    if self.is_included(pass, &field.node.directives) {
                        out.push(Collected { field: &field.node, condition });
                    }
                }
                Selection::InlineFragment(fragment) => {
                    if self.is_included(pass, &fragment.node.directives) {
                        let condition = fragment
                            .node
                            .type_condition
                            .as_ref()
                            .map(|type_condition| type_condition.node.on.node.as_str())
                            .or(condition);
                        self.collect(pass, &fragment.node.selection_set.node, condition, out)?;
                    }
                }
                Selection::FragmentSpread(spread) => {
                    if self.is_included(pass, &spread.node.directives) {
                        let name = spread.node.fragment_name.node.as_str();
                        out.extend(self.fragment(pass, name)?);
                    }
                }
            }
        }
        Ok(())
    }

    /// Collects a named fragment once per pass.
    fn fragment(&self, pass: &mut Pass<'a>, name: &'a str) -> Result<Vec<Collected<'a>>> {
        if let Some(items) = pass.fragments.get(name) {
            return Ok(items.clone());
        }
        if !pass.in_progress.insert(name) {
            tracing::warn!("Fragment {name} spreads itself, ignoring the nested spread");
            return Ok(Vec::new());
        }

        let document: &'a ExecutableDocument = self.document;
        let definition = document
            .fragments
            .get(name)
            .ok_or_else(|| Error::Resolution(format!("unknown fragment `{}`", name)))?;
        let condition = definition.node.type_condition.node.on.node.as_str();

        let mut items = Vec::new();
        self.collect(pass, &definition.node.selection_set.node, Some(condition), &mut items)?;
        pass.in_progress.remove(name);
        pass.fragments.insert(name, items.clone());
        Ok(items)
    }

    fn resolve_type(
        &self,
        pass: &mut Pass<'a>,
        type_name: &str,
        items: Vec<Collected<'a>>,
    ) -> Result<SelectionSet> {
        if self.index.is_abstract(type_name) {
            return self.resolve_abstract(pass, type_name, items);
        }

        let applicable = items
            .into_iter()
            .filter(|item| match item.condition {
                Some(condition) if !self.index.overlaps(condition, type_name) => {
                    tracing::debug!("Dropping fragment on {condition} inside {type_name}");
                    false
                }
                _ => true,
            })
            .collect::<Vec<_>>();
        Ok(SelectionSet::Concrete(self.resolve_fields(pass, type_name, applicable)?))
    }

    fn resolve_abstract(
        &self,
        pass: &mut Pass<'a>,
        type_name: &str,
        items: Vec<Collected<'a>>,
    ) -> Result<SelectionSet> {
        let mut shared = Vec::new();
        let mut branches: IndexMap<&'a str, Vec<Collected<'a>>> = IndexMap::new();
        for item in items {
            match item.condition {
                None => shared.push(item),
                Some(condition) if condition == type_name => shared.push(item),
                Some(condition) if self.index.overlaps(condition, type_name) => {
                    branches.entry(condition).or_default().push(item)
                }
                Some(condition) => {
                    tracing::debug!("Dropping fragment on {condition} inside {type_name}");
                }
            }
        }

        let shared = self.resolve_fields(pass, type_name, shared)?;
        let mut possible_sets = Vec::with_capacity(branches.len());
        for (condition, items) in branches {
            possible_sets.push(FieldSetCondition {
                type_condition: condition.to_string(),
                selection: self.resolve_type(pass, condition, items)?,
            });
        }
        Ok(SelectionSet::Abstract { shared, possible_sets })
    }

    /// Groups fields by response key and resolves each group once, merging
    /// the sub-selections of every occurrence.
    fn resolve_fields(
        &self,
        pass: &mut Pass<'a>,
        type_name: &str,
        items: Vec<Collected<'a>>,
    ) -> Result<Vec<FieldSet>> {
        let mut groups: IndexMap<&'a str, Vec<&'a Field>> = IndexMap::new();
        for item in items {
            let key = item.field.response_key().node.as_str();
            groups.entry(key).or_default().push(item.field);
        }

        let mut fields = Vec::with_capacity(groups.len());
        for (key, occurrences) in groups {
            let Some(first) = occurrences.first() else {
                continue;
            };
            let field_name = first.name.node.as_str();
            if field_name == TYPENAME {
                fields.push(FieldSet {
                    name: key.to_string(),
                    field_name: field_name.to_string(),
                    arguments: IndexMap::new(),
                    type_of: TypeRef::named("String"),
                    selection: SelectionSet::default(),
                    extensions: (),
                });
                continue;
            }

            let definition = self.index.field(type_name, field_name).ok_or_else(|| {
                Error::Resolution(format!(
                    "field `{}` not found on type `{}`",
                    field_name, type_name
                ))
            })?;

            let selection = if self.index.is_composite(&definition.type_of.name) {
                let mut items = Vec::new();
                for occurrence in &occurrences {
                    self.collect(pass, &occurrence.selection_set.node, None, &mut items)?;
                }
                self.resolve_type(pass, &definition.type_of.name, items)?
            } else {
                SelectionSet::default()
            };

            fields.push(FieldSet {
                name: key.to_string(),
                field_name: field_name.to_string(),
                arguments: self.arguments(pass, first)?,
                type_of: definition.type_of.clone(),
                selection,
                extensions: (),
            });
        }
        Ok(fields)
    }

    /// Evaluates the arguments of a field against the request variables. A
    /// variable missing from the request evaluates to `null`.
    fn arguments(&self, pass: &Pass<'a>, field: &Field) -> Result<IndexMap<String, Value>> {
        let variable = |name: Name| match pass.variables.get(name.as_str()) {
            Some(value) => Ok(ConstValue::from_json(value.clone())?),
            None => Ok::<_, Error>(ConstValue::Null),
        };

        let mut arguments = IndexMap::new();
        for (name, value) in &field.arguments {
            let value = value.node.clone().into_const_with(variable)?.into_json()?;
            arguments.insert(name.node.to_string(), value);
        }
        Ok(arguments)
    }
}

#[cfg(test)]
mod tests {
    use async_graphql::parser::parse_query;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::core::surface::{FieldDef, SurfaceCache, TypeDef};
    use crate::core::tests::galaxy;

    fn index() -> TypeIndex {
        TypeIndex::from_registry(&galaxy(), &SurfaceCache::new()).with_type(TypeDef::Interface {
            name: "Named".to_string(),
            fields: [(
                "Name".to_string(),
                FieldDef::new("Name", TypeRef::named("String")),
            )]
            .into_iter()
            .collect(),
            implementations: vec!["User".to_string(), "Queue".to_string()],
        })
    }

    fn resolve_with(query: &str, variables: Value) -> Result<Vec<FieldSet>> {
        let index = index();
        let document = parse_query(query)?;
        let variables = match variables {
            Value::Object(variables) => variables,
            _ => Map::new(),
        };
        SelectionResolver::new(&index, &document)
            .variables(variables)
            .resolve(None)
    }

    fn resolve(query: &str) -> Vec<FieldSet> {
        resolve_with(query, Value::Null).unwrap()
    }

    fn names(fields: &[FieldSet]) -> Vec<&str> {
        fields.iter().map(|field| field.name.as_str()).collect()
    }

    #[test]
    fn test_concrete_with_alias_and_arguments() {
        let fields = resolve_with(
            r#"query ($limit: Int) { knights: Jedi(limit: $limit, filterString: "age > 10") { Id name } }"#,
            json!({ "limit": 3 }),
        )
        .unwrap();
        let knights = &fields[0];
        assert_eq!(knights.name, "knights");
        assert_eq!(knights.field_name, "Jedi");
        assert_eq!(knights.type_of, TypeRef::list("Jedi"));
        assert_eq!(knights.argument("limit"), Some(&json!(3)));
        assert_eq!(knights.argument("filterString"), Some(&json!("age > 10")));
        assert_eq!(names(knights.children()), vec!["Id", "name"]);
    }

    #[test]
    fn test_variable_defaults() {
        let fields = resolve(r#"query ($limit: Int = 7, $missing: Int) { Jedi(limit: $limit, offset: $missing) { Id } }"#);
        assert_eq!(fields[0].argument("limit"), Some(&json!(7)));
        assert_eq!(fields[0].argument("offset"), Some(&Value::Null));
    }

    #[test]
    fn test_skip_wins_over_include() {
        let fields = resolve_with(
            r#"query ($yes: Boolean) {
                Jedi {
                    a: name @skip(if: true) @include(if: true)
                    b: name @skip(if: false) @include(if: false)
                    c: name @skip(if: $missing)
                    d: name @include(if: $missing)
                    e: name @include(if: $yes)
                    f: name @skip(if: $yes) @include(if: $yes)
                }
            }"#,
            json!({ "yes": true }),
        )
        .unwrap();
        assert_eq!(names(fields[0].children()), vec!["c", "e"]);
    }

    #[test]
    fn test_merges_fields_by_response_key() {
        let fields = resolve("{ Jedi { Master { Id } name Master { name } } }");
        let jedi = fields[0].children();
        assert_eq!(names(jedi), vec!["Master", "name"]);
        assert_eq!(names(jedi[0].children()), vec!["Id", "name"]);
    }

    #[test]
    fn test_mutually_recursive_fragments() {
        let fields = resolve(
            r#"
            fragment A on Jedi { name ...B }
            fragment B on Jedi { Id ...A }
            query { Jedi { ...A ...B } }
            "#,
        );
        assert_eq!(names(fields[0].children()), vec!["name", "Id"]);
    }

    #[test]
    fn test_abstract_partition() {
        let fields = resolve(
            r#"{
                Case {
                    Owner {
                        __typename
                        Name
                        ... on User { Email }
                        ... on Queue { DeveloperName }
                        ... on Case_Owner { Id }
                        ... on User { Name }
                    }
                }
            }"#,
        );
        let owner = &fields[0].children()[0];
        let SelectionSet::Abstract { shared, possible_sets } = &owner.selection else {
            panic!("expected an abstract selection");
        };
        assert_eq!(names(shared), vec!["__typename", "Name", "Id"]);
        let branches = possible_sets
            .iter()
            .map(|set| (set.type_condition.as_str(), names(set.selection.fields())))
            .collect::<Vec<_>>();
        assert_eq!(
            branches,
            vec![("User", vec!["Email", "Name"]), ("Queue", vec!["DeveloperName"])]
        );
    }

    #[test]
    fn test_nested_abstract_branch() {
        let fields = resolve("{ Case { Owner { ... on Named { Name } } } }");
        let owner = &fields[0].children()[0];
        let branch = &owner.selection.possible_sets()[0];
        assert_eq!(branch.type_condition, "Named");
        assert!(matches!(branch.selection, SelectionSet::Abstract { .. }));
        assert_eq!(names(branch.selection.fields()), vec!["Name"]);
    }

    #[test]
    fn test_named_fragment_on_branch() {
        let fields = resolve(
            r#"
            fragment UserFields on User { Email }
            query { Case { Owner { ...UserFields } } }
            "#,
        );
        let owner = &fields[0].children()[0];
        assert!(owner.selection.fields().is_empty());
        assert_eq!(owner.selection.possible_sets()[0].type_condition, "User");
    }

    #[test]
    fn test_inapplicable_fragment_dropped() {
        let fields = resolve("{ Jedi { ... on Case { Subject } name } }");
        assert_eq!(names(fields[0].children()), vec!["name"]);
    }

    #[test]
    fn test_unknown_field() {
        let error = resolve_with("{ Jedi { lightsaberColor } }", Value::Null).unwrap_err();
        assert_eq!(
            error.to_string(),
            "Selection Error: field `lightsaberColor` not found on type `Jedi`"
        );
    }

    #[test]
    fn test_named_operation() {
        let index = index();
        let document = parse_query("query A { Jedi { Id } } query B { Case { Id } }").unwrap();
        let resolver = SelectionResolver::new(&index, &document);
        assert_eq!(names(&resolver.resolve(Some("B")).unwrap()), vec!["Case"]);
        assert!(resolver.resolve(None).is_err());
        assert!(resolver.resolve(Some("C")).is_err());
    }

    #[test]
    fn test_mutation_rejected() {
        let error = resolve_with("mutation { Jedi { Id } }", Value::Null).unwrap_err();
        assert_eq!(error.to_string(), "Selection Error: mutation operations are not supported");
    }
}
