use std::sync::Mutex;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use indexmap::IndexMap;
use serde_json::{Map, Value};

use super::query_info::{with_type_conditions, Fetch, InfoBuilder, Plan, QueryInfo, StatementKind};
use super::{FieldError, ListArgs, PathSegment, QueryExecutor};
use crate::core::config::PlannerConfig;
use crate::core::datetime::repair_value;
use crate::core::filter::{leaf_eq, FilterBuilder};
use crate::core::registry::{FieldConfig, Registry, ScalarKind};
use crate::core::selection::AnnotatedFieldSet;
use crate::core::soql::{Query, QueryCompiler};
use crate::core::{Error, Result};

const ID: &str = "Id";
const RECORDS: &str = "records";

/// A fetched row and the concrete type each fanned out relationship was
/// narrowed to by the statement that produced it.
#[derive(Debug)]
struct Row {
    record: Map<String, Value>,
    types: IndexMap<String, String>,
}

/// The object a projected record belongs to.
#[derive(Clone, Copy)]
struct Owner<'b> {
    name: &'b str,
    /// Known Id of the record when the statement did not select one.
    id: Option<&'b str>,
}

/// Answers root fields by compiling statements, running them through the
/// executor and projecting the rows onto the selection. Relationships the
/// first statement cannot carry are fetched by follow-up lookups.
pub struct QueryPlanner<'a> {
    registry: &'a Registry,
    compiler: QueryCompiler,
    executor: &'a dyn QueryExecutor,
    errors: Mutex<Vec<FieldError>>,
}

impl<'a> QueryPlanner<'a> {
    pub fn new(registry: &'a Registry, config: &PlannerConfig, executor: &'a dyn QueryExecutor) -> Self {
        Self {
            registry,
            compiler: QueryCompiler::new(config.limits),
            executor,
            errors: Mutex::new(Vec::new()),
        }
    }

    /// Errors recorded for fields that were nulled during projection.
    pub fn take_errors(&self) -> Vec<FieldError> {
        self.errors
            .lock()
            .map(|mut errors| std::mem::take(&mut *errors))
            .unwrap_or_default()
    }

    fn builder(&self) -> InfoBuilder<'a> {
        InfoBuilder::new(self.registry, *self.compiler.limits())
    }

    /// Lists the object named by a root field.
    #[tracing::instrument(skip_all, fields(field = %field.name))]
    pub async fn resolve(&self, field: &'a AnnotatedFieldSet<'a>) -> Result<Value> {
        let object = field.extensions.target.ok_or_else(|| {
            Error::Annotation(format!("root field `{}` does not list an object", field.name))
        })?;
        let args = ListArgs::from_arguments(&field.arguments)?;
        let info = self.builder().statement(
            field.children().iter().collect(),
            object,
            StatementKind::Root,
            args.limit,
        );
        let base = args.apply(Query::new(object.name.as_str()), object)?;
        let rows = self.execute(&info, base).await?;

        let mut values = Vec::with_capacity(rows.len());
        for (index, row) in rows.iter().enumerate() {
            let owner = Owner { name: &object.name, id: None };
            let path = vec![PathSegment::Field(field.name.clone()), PathSegment::Index(index)];
            values.push(self.project(&info, owner, &row.record, &row.types, path).await);
        }
        Ok(Value::Array(values))
    }

    /// Runs one statement per combination of fanned out types and
    /// concatenates the rows in combination order. Every statement carries
    /// the `LIMIT` and `OFFSET` of `base`, so a fanned out listing returns up
    /// to `LIMIT` rows per combination.
    async fn execute(&self, info: &QueryInfo<'a>, base: Query) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        for combination in info.combinations() {
            let mut query = info.select(base.clone(), &combination)?;
            query.where_clause = with_type_conditions(query.where_clause.take(), &combination);
            let soql = self.compiler.compile(&query)?;
            tracing::debug!(object = %query.object, "{soql}");

            let response = self.executor.query(&soql).await?;
            let types = combination
                .iter()
                .map(|(field, type_name)| (field.name.clone(), type_name.to_string()))
                .collect::<IndexMap<_, _>>();
            rows.extend(
                response
                    .records
                    .into_iter()
                    .map(|record| Row { record, types: types.clone() }),
            );
        }
        Ok(rows)
    }

    /// Builds the response object of one record.
    fn project<'b>(
        &'b self,
        info: &'b QueryInfo<'a>,
        owner: Owner<'b>,
        record: &'b Map<String, Value>,
        types: &'b IndexMap<String, String>,
        path: Vec<PathSegment>,
    ) -> BoxFuture<'b, Value>
    where
        'a: 'b,
    {
        async move {
            let id = record.get(ID).and_then(Value::as_str).or(owner.id);
            let none = IndexMap::new();
            let mut out = Map::new();
            for entry in &info.entries {
                let field = entry.field;
                let mut path = path.clone();
                path.push(PathSegment::Field(field.name.clone()));
                let column = record.get(field.field_name.as_str());

                let value = match &entry.plan {
                    Plan::Typename => Value::String(owner.name.to_string()),
                    Plan::Leaf(leaf) => {
                        let value = column.cloned().unwrap_or(Value::Null);
                        if leaf.scalar == ScalarKind::Datetime {
                            repair_value(value)
                        } else {
                            value
                        }
                    }
                    Plan::Parent(Fetch::Embedded(nested)) => match column {
                        Some(Value::Object(nested_record)) => {
                            let name = match nested.object {
                                Some(object) => Some(object.name.as_str()),
                                None => type_tag(nested_record),
                            };
                            match name {
                                Some(name) => {
                                    let owner = Owner { name, id: None };
                                    self.related(nested, owner, nested_record, path).await
                                }
                                None => {
                                    self.record_error(
                                        Error::InvalidResponse(format!(
                                            "`{}` carries no type tag",
                                            field.field_name
                                        )),
                                        path,
                                    );
                                    Value::Null
                                }
                            }
                        }
                        _ => Value::Null,
                    },
                    Plan::Parent(Fetch::Polymorphic(branches)) => {
                        let branch = types
                            .get(&field.name)
                            .and_then(|name| branches.iter().find(|b| &b.object.name == name));
                        match (branch, column) {
                            (Some(branch), Some(Value::Object(nested_record))) => {
                                let owner = Owner { name: &branch.object.name, id: None };
                                self.related(&branch.info, owner, nested_record, path).await
                            }
                            _ => Value::Null,
                        }
                    }
                    Plan::Child(Fetch::Embedded(nested)) => {
                        let records = column
                            .and_then(|value| value.get(RECORDS))
                            .and_then(Value::as_array);
                        let name = nested.object.map(|object| object.name.as_str()).unwrap_or_default();
                        let mut values = Vec::new();
                        for (index, child) in records.into_iter().flatten().enumerate() {
                            if let Value::Object(child) = child {
                                let mut path = path.clone();
                                path.push(PathSegment::Index(index));
                                let owner = Owner { name, id: None };
                                values.push(self.project(nested, owner, child, &none, path).await);
                            }
                        }
                        Value::Array(values)
                    }
                    Plan::Parent(_) | Plan::Child(_) => match id {
                        Some(id) => match self.lookup(field, owner.name, id, path.clone()).await {
                            Ok(value) => value,
                            Err(error) => {
                                self.record_error(error, path);
                                Value::Null
                            }
                        },
                        None => empty(field),
                    },
                };
                out.insert(field.name.clone(), value);
            }
            Value::Object(out)
        }
        .boxed()
    }

    /// Projects a related record embedded in its owner's row. When the
    /// statement only selected its Id, the record is read first.
    fn related<'b>(
        &'b self,
        info: &'b QueryInfo<'a>,
        owner: Owner<'b>,
        record: &'b Map<String, Value>,
        path: Vec<PathSegment>,
    ) -> BoxFuture<'b, Value>
    where
        'a: 'b,
    {
        async move {
            let none = IndexMap::new();
            let Some(target) = info.indirect.as_deref() else {
                return self.project(info, owner, record, &none, path).await;
            };
            let Some(id) = record.get(ID).and_then(Value::as_str) else {
                return Value::Null;
            };
            match self.fetch(target, owner.name, id).await {
                Ok(Some(row)) => {
                    let owner = Owner { name: owner.name, id: Some(id) };
                    self.project(target, owner, &row.record, &row.types, path).await
                }
                Ok(None) => Value::Null,
                Err(error) => {
                    self.record_error(error, path);
                    Value::Null
                }
            }
        }
        .boxed()
    }

    /// Runs the statement of `info` against the single record `id`.
    async fn fetch(&self, info: &QueryInfo<'a>, object: &str, id: &str) -> Result<Option<Row>> {
        let where_clause = FilterBuilder::new()
            .where_clause(Some(&leaf_eq(ID, Value::String(id.to_string()))), None)?;
        let base = Query { where_clause, ..Query::new(object) }.limit(1);
        Ok(self.execute(info, base).await?.into_iter().next())
    }

    /// Fetches a single relationship of the record `id` of `owner`.
    fn lookup<'b>(
        &'b self,
        field: &'a AnnotatedFieldSet<'a>,
        owner: &'b str,
        id: &'b str,
        path: Vec<PathSegment>,
    ) -> BoxFuture<'b, Result<Value>>
    where
        'a: 'b,
    {
        async move {
            let object = self
                .registry
                .get(owner)
                .ok_or_else(|| Error::InvalidResponse(format!("unknown object `{}`", owner)))?;
            let info = self.builder().statement(vec![field], object, StatementKind::Lookup, Some(1));
            let Some(row) = self.fetch(&info, &object.name, id).await? else {
                return Ok(empty(field));
            };
            // the owner's path: the projected object holds the single field
            let mut owner_path = path;
            owner_path.pop();
            let owner = Owner { name: &object.name, id: Some(id) };
            let value = self.project(&info, owner, &row.record, &row.types, owner_path).await;
            Ok(value.get(&field.name).cloned().unwrap_or_else(|| empty(field)))
        }
        .boxed()
    }

    fn record_error(&self, error: Error, path: Vec<PathSegment>) {
        let error = FieldError::new(error.to_string(), path);
        tracing::warn!("{error}");
        if let Ok(mut errors) = self.errors.lock() {
            errors.push(error);
        }
    }
}

/// Concrete type of a polymorphic parent record.
fn type_tag(record: &Map<String, Value>) -> Option<&str> {
    record
        .get("Type")
        .and_then(Value::as_str)
        .or_else(|| record.get("attributes")?.get("type")?.as_str())
}

fn empty(field: &AnnotatedFieldSet<'_>) -> Value {
    match field.extensions.config_field {
        Some(FieldConfig::Child(_)) => Value::Array(Vec::new()),
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use async_graphql::parser::parse_query;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::core::config::Limits;
    use crate::core::plan::MockExecutor;
    use crate::core::selection::{SchemaAnnotator, SelectionResolver};
    use crate::core::surface::{SurfaceCache, TypeIndex};
    use crate::core::tests::galaxy;

    fn root(query: &str) -> (&'static Registry, &'static AnnotatedFieldSet<'static>) {
        let registry: &'static Registry = Box::leak(Box::new(galaxy()));
        let index = TypeIndex::from_registry(registry, &SurfaceCache::new());
        let document = parse_query(query).unwrap();
        let fields = SelectionResolver::new(&index, &document).resolve(None).unwrap();
        let field = SchemaAnnotator::new(registry).annotate(&fields[0]).unwrap();
        (registry, Box::leak(Box::new(field)))
    }

    async fn run(query: &str, config: PlannerConfig, executor: &MockExecutor) -> (Value, Vec<FieldError>) {
        let (registry, field) = root(query);
        let planner = QueryPlanner::new(registry, &config, executor);
        let value = planner.resolve(field).await.unwrap();
        (value, planner.take_errors())
    }

    #[tokio::test]
    async fn test_scalar_fields() {
        let executor = MockExecutor::default().respond(
            "SELECT Id, says FROM GeneralKenobi",
            json!([{ "Id": "k1", "says": "Hello there" }]),
        );
        let (value, errors) = run("{ GeneralKenobi { says } }", PlannerConfig::default(), &executor).await;
        assert_eq!(value, json!([{ "says": "Hello there" }]));
        assert!(errors.is_empty());
    }

    #[tokio::test]
    async fn test_embedded_parents() {
        let executor = MockExecutor::default().respond(
            "SELECT Id, Master.Id, Master.Master.Id, Master.Master.name FROM Jedi",
            json!([
                { "Id": "j1", "Master": { "Id": "j2", "Master": { "Id": "j3", "name": "Yoda" } } },
                { "Id": "j4", "Master": null }
            ]),
        );
        let (value, _) = run("{ Jedi { Master { Master { name } } } }", PlannerConfig::default(), &executor).await;
        assert_eq!(value, json!([{ "Master": { "Master": { "name": "Yoda" } } }, { "Master": null }]));
        assert_eq!(executor.statements().len(), 1);
    }

    #[tokio::test]
    async fn test_parent_beyond_depth_is_looked_up() {
        let config = PlannerConfig::default().limits(Limits::default().max_parent_depth(1));
        let executor = MockExecutor::default()
            .respond(
                "SELECT Id, Master.Id FROM Jedi",
                json!([{ "Id": "j1", "Master": { "Id": "j2" } }, { "Id": "j4", "Master": null }]),
            )
            .respond(
                "SELECT Master.Id, Master.name FROM Jedi WHERE ( Id = 'j2' ) LIMIT 1",
                json!([{ "Master": { "Id": "j3", "name": "Yoda" } }]),
            );
        let (value, _) = run("{ Jedi { Master { Master { name } } } }", config, &executor).await;
        assert_eq!(value, json!([{ "Master": { "Master": { "name": "Yoda" } } }, { "Master": null }]));
        assert_eq!(
            executor.statements(),
            vec![
                "SELECT Id, Master.Id FROM Jedi",
                "SELECT Master.Id, Master.name FROM Jedi WHERE ( Id = 'j2' ) LIMIT 1",
            ]
        );
    }

    #[tokio::test]
    async fn test_child_of_child() {
        let executor = MockExecutor::default()
            .respond(
                "SELECT Id, (SELECT Id FROM Padawans) FROM Jedi",
                json!([{ "Id": "j1", "Padawans": { "records": [{ "Id": "p1" }] } }]),
            )
            .respond(
                "SELECT (SELECT Id, color FROM Lightsabers) FROM Jedi WHERE ( Id = 'p1' ) LIMIT 1",
                json!([{ "Lightsabers": { "records": [{ "Id": "l1", "color": "green" }] } }]),
            );
        let (value, _) = run(
            "{ Jedi { Padawans { Lightsabers { color } } } }",
            PlannerConfig::default(),
            &executor,
        )
        .await;
        assert_eq!(value, json!([{ "Padawans": [{ "Lightsabers": [{ "color": "green" }] }] }]));
        assert_eq!(
            executor.statements(),
            vec![
                "SELECT Id, (SELECT Id FROM Padawans) FROM Jedi",
                "SELECT (SELECT Id, color FROM Lightsabers) FROM Jedi WHERE ( Id = 'p1' ) LIMIT 1",
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_child() {
        let executor = MockExecutor::default().respond(
            "SELECT Id, (SELECT Id, name FROM Padawans) FROM Jedi",
            json!([{ "Id": "j1", "Padawans": null }]),
        );
        let (value, _) = run("{ Jedi { Padawans { name } } }", PlannerConfig::default(), &executor).await;
        assert_eq!(value, json!([{ "Padawans": [] }]));
    }

    #[tokio::test]
    async fn test_polymorphic_fan_out() {
        let executor = MockExecutor::default()
            .respond(
                "SELECT Id, Subject, Owner.Id, Owner.Email FROM Case WHERE ( Owner.Type = 'User' )",
                json!([{ "Id": "c1", "Subject": "Hilt", "Owner": { "Id": "u1", "Email": "obi@wan.org" } }]),
            )
            .respond(
                "SELECT Id, Subject, Owner.Id, Owner.DeveloperName FROM Case WHERE ( Owner.Type = 'Queue' )",
                json!([{ "Id": "c2", "Subject": "Crystal", "Owner": { "Id": "q1", "DeveloperName": "Forge" } }]),
            );
        let (value, _) = run(
            "{ Case { Subject Owner { __typename ... on User { Email } ... on Queue { DeveloperName } } } }",
            PlannerConfig::default(),
            &executor,
        )
        .await;
        assert_eq!(
            value,
            json!([
                { "Subject": "Hilt", "Owner": { "__typename": "User", "Email": "obi@wan.org" } },
                { "Subject": "Crystal", "Owner": { "__typename": "Queue", "DeveloperName": "Forge" } }
            ])
        );
    }

    #[tokio::test]
    async fn test_polymorphic_shared_only() {
        let executor = MockExecutor::default().respond(
            "SELECT Id, Owner.Id, Owner.Type, Owner.Name FROM Case",
            json!([
                { "Id": "c1", "Owner": { "Id": "u1", "Type": "User", "Name": "Obi-Wan" } },
                { "Id": "c2", "Owner": null }
            ]),
        );
        let (value, _) = run("{ Case { Owner { __typename Name } } }", PlannerConfig::default(), &executor).await;
        assert_eq!(
            value,
            json!([{ "Owner": { "__typename": "User", "Name": "Obi-Wan" } }, { "Owner": null }])
        );
    }

    #[tokio::test]
    async fn test_aliased_parents_share_columns() {
        let executor = MockExecutor::default().respond(
            "SELECT Id, Master.Id, Master.name, Master.age FROM Jedi",
            json!([{ "Id": "j1", "Master": { "Id": "j2", "name": "Yoda", "age": 900 } }]),
        );
        let (value, _) = run(
            "{ Jedi { a: Master { name } b: Master { age } } }",
            PlannerConfig::default(),
            &executor,
        )
        .await;
        assert_eq!(value, json!([{ "a": { "name": "Yoda" }, "b": { "age": 900 } }]));
        assert_eq!(executor.statements().len(), 1);
    }

    #[tokio::test]
    async fn test_aliased_children_keep_their_arguments() {
        let executor = MockExecutor::default()
            .respond(
                "SELECT Id, (SELECT Id, name FROM Padawans WHERE age < 20) FROM Jedi",
                json!([{ "Id": "j1", "Padawans": { "records": [{ "Id": "p1", "name": "Young" }] } }]),
            )
            .respond(
                "SELECT (SELECT Id, name FROM Padawans WHERE age > 50) FROM Jedi WHERE ( Id = 'j1' ) LIMIT 1",
                json!([{ "Padawans": { "records": [{ "Id": "p2", "name": "Old" }] } }]),
            );
        let (value, errors) = run(
            r#"{
                Jedi {
                    young: Padawans(filterString: "age < 20") { name }
                    old: Padawans(filterString: "age > 50") { name }
                }
            }"#,
            PlannerConfig::default(),
            &executor,
        )
        .await;
        assert_eq!(value, json!([{ "young": [{ "name": "Young" }], "old": [{ "name": "Old" }] }]));
        assert!(errors.is_empty());
    }

    #[tokio::test]
    async fn test_lookup_overflowing_segments_reads_related_record() {
        let config = PlannerConfig::default().limits(Limits::default().max_parent_segments(2));
        let executor = MockExecutor::default()
            .respond("SELECT Id FROM Lightsaber", json!([{ "Id": "l1" }]))
            .respond(
                "SELECT Wielder.Id FROM Lightsaber WHERE ( Id = 'l1' ) LIMIT 1",
                json!([{ "Wielder": { "Id": "j1" } }]),
            )
            .respond(
                "SELECT Id, name, age, rank FROM Jedi WHERE ( Id = 'j1' ) LIMIT 1",
                json!([{ "Id": "j1", "name": "Obi-Wan", "age": 38, "rank": "Master" }]),
            );
        let (value, errors) = run("{ Lightsaber { Wielder { name age rank } } }", config, &executor).await;
        assert_eq!(
            value,
            json!([{ "Wielder": { "name": "Obi-Wan", "age": 38, "rank": "Master" } }])
        );
        assert!(errors.is_empty());
        assert_eq!(executor.statements().len(), 3);
    }

    #[tokio::test]
    async fn test_fan_out_limits_each_statement() {
        let executor = MockExecutor::default()
            .respond(
                "SELECT Id, Owner.Id, Owner.Email FROM Case WHERE ( Owner.Type = 'User' ) LIMIT 1",
                json!([{ "Id": "c1", "Owner": { "Id": "u1", "Email": "obi@wan.org" } }]),
            )
            .respond(
                "SELECT Id, Owner.Id, Owner.DeveloperName FROM Case WHERE ( Owner.Type = 'Queue' ) LIMIT 1",
                json!([{ "Id": "c2", "Owner": { "Id": "q1", "DeveloperName": "Forge" } }]),
            );
        let (value, _) = run(
            "{ Case(limit: 1) { Owner { ... on User { Email } ... on Queue { DeveloperName } } } }",
            PlannerConfig::default(),
            &executor,
        )
        .await;
        // one row per concrete type
        assert_eq!(value.as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn test_datetime_repair() {
        let executor = MockExecutor::default().respond(
            "SELECT Id, trainedAt FROM Jedi",
            json!([{ "Id": "j1", "trainedAt": "2021-03-04T05:06:07.000+0000" }]),
        );
        let (value, _) = run("{ Jedi { trainedAt } }", PlannerConfig::default(), &executor).await;
        assert_eq!(value, json!([{ "trainedAt": "2021-03-04T05:06:07.000+00:00" }]));
    }

    #[tokio::test]
    async fn test_failing_lookup_nulls_only_its_field() {
        let executor = MockExecutor::default()
            .respond(
                "SELECT Id, name FROM Jedi",
                json!([{ "Id": "j1", "name": "Obi-Wan" }]),
            )
            .fail(
                "SELECT (SELECT Id, name FROM Padawans OFFSET 1) FROM Jedi WHERE ( Id = 'j1' ) LIMIT 1",
                "session expired",
            );
        let (value, errors) = run(
            "{ Jedi { name Padawans(offset: 1) { name } } }",
            PlannerConfig::default(),
            &executor,
        )
        .await;
        assert_eq!(value, json!([{ "name": "Obi-Wan", "Padawans": null }]));
        assert_eq!(
            errors,
            vec![FieldError::new("session expired", vec!["Jedi".into(), 0.into(), "Padawans".into()])]
        );
    }

    #[tokio::test]
    async fn test_root_failure() {
        let executor = MockExecutor::default().fail("SELECT Id, name FROM Jedi", "connection reset");
        let (registry, field) = root("{ Jedi { name } }");
        let planner = QueryPlanner::new(registry, &PlannerConfig::default(), &executor);
        let error = planner.resolve(field).await.unwrap_err();
        assert_eq!(error.to_string(), "connection reset");
    }
}
