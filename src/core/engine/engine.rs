use std::sync::Arc;

use async_graphql::parser::parse_query;
use futures_util::future::join_all;
use serde_json::{Map, Value};

use super::{Request, Response};
use crate::core::config::PlannerConfig;
use crate::core::plan::{FieldError, PathSegment, QueryExecutor, QueryPlanner};
use crate::core::registry::Registry;
use crate::core::selection::{FieldSet, SchemaAnnotator, SelectionResolver};
use crate::core::surface::{SurfaceCache, TypeIndex, QUERY};
use crate::core::Result;

/// Answers GraphQL requests against a registry. Root fields resolve
/// concurrently and independently: a failing root field is `null` in the
/// response and reported in `errors`.
pub struct Engine {
    registry: Registry,
    index: TypeIndex,
    config: PlannerConfig,
    executor: Arc<dyn QueryExecutor>,
}

impl Engine {
    pub fn new(registry: Registry, config: PlannerConfig, executor: Arc<dyn QueryExecutor>) -> Self {
        Self::with_cache(registry, config, executor, &SurfaceCache::new())
    }

    /// Builds the engine sharing generated input types through `cache`.
    pub fn with_cache(
        registry: Registry,
        config: PlannerConfig,
        executor: Arc<dyn QueryExecutor>,
        cache: &SurfaceCache,
    ) -> Self {
        let index = TypeIndex::from_registry(&registry, cache);
        Self { registry, index, config, executor }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The query surface as SDL.
    pub fn sdl(&self) -> String {
        self.index.to_sdl()
    }

    pub async fn execute(&self, request: &Request) -> Response {
        match self.resolve(request) {
            Ok(fields) => self.execute_fields(&fields).await,
            Err(error) => Response::error(error.to_string()),
        }
    }

    fn resolve(&self, request: &Request) -> Result<Vec<FieldSet>> {
        let document = parse_query(&request.query)?;
        SelectionResolver::new(&self.index, &document)
            .variables(request.variables.clone())
            .resolve(request.operation_name.as_deref())
    }

    async fn execute_fields(&self, fields: &[FieldSet]) -> Response {
        let annotator = SchemaAnnotator::new(&self.registry);
        let annotated = fields
            .iter()
            .map(|field| (field, (!field.is_typename()).then(|| annotator.annotate(field))))
            .collect::<Vec<_>>();

        let planner = QueryPlanner::new(&self.registry, &self.config, self.executor.as_ref());
        let results = join_all(annotated.iter().map(|(field, annotated)| {
            let planner = &planner;
            async move {
                let result = match annotated {
                    None => Ok(Value::String(QUERY.to_string())),
                    Some(Ok(annotated)) => planner.resolve(annotated).await.map_err(|e| e.to_string()),
                    Some(Err(error)) => Err(error.to_string()),
                };
                result.map_err(|message| {
                    FieldError::new(message, vec![PathSegment::Field(field.name.clone())])
                })
            }
        }))
        .await;

        let mut data = Map::new();
        let mut errors = Vec::new();
        for ((field, _), result) in annotated.iter().zip(results) {
            match result {
                Ok(value) => {
                    data.insert(field.name.clone(), value);
                }
                Err(error) => {
                    tracing::warn!("{error}");
                    data.insert(field.name.clone(), Value::Null);
                    errors.push(error);
                }
            }
        }
        errors.extend(planner.take_errors());
        Response::new(data, errors)
    }
}
