use indexmap::IndexSet;

use super::{ParentPath, Query};
use crate::core::config::Limits;
use crate::core::valid::{Valid, Validator};
use crate::core::{Error, Result};

/// Renders [`Query`] values to SOQL text after checking them against the
/// structural limits of the remote store.
#[derive(Clone, Copy, Debug, Default)]
pub struct QueryCompiler {
    limits: Limits,
}

/// Where a query sits relative to the statement being compiled.
#[derive(Clone, Copy)]
enum Position {
    Root,
    /// A subquery; carries the LIMIT of the enclosing statement.
    Child { parent_limit: Option<u64> },
}

impl QueryCompiler {
    pub fn new(limits: Limits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn compile(&self, query: &Query) -> Result<String> {
        self.validate(query).to_result().map_err(Error::QueryConstraint)
    }

    /// Same as [`QueryCompiler::compile`], keeping every violation.
    pub fn validate(&self, query: &Query) -> Valid<String, String> {
        self.compile_query(query, Position::Root)
    }

    fn compile_query(&self, query: &Query, position: Position) -> Valid<String, String> {
        self.check_selections(query)
            .and(self.check_parent_paths(query))
            .and(self.check_children(query, position))
            .and(self.check_offset(query, position))
            .and(Valid::from_iter(query.children(), |child| {
                self.compile_query(child, Position::Child { parent_limit: query.limit })
                    .trace(&child.object)
            }))
            .map(|children| self.emit(query, children))
    }

    fn check_selections(&self, query: &Query) -> Valid<(), String> {
        Valid::when(query.selections.is_empty(), || {
            "must specify at least one selection".to_string()
        })
    }

    fn check_parent_paths(&self, query: &Query) -> Valid<(), String> {
        let max_depth = self.limits.max_parent_depth;
        let depth = Valid::from_iter(query.parents(), |path| {
            Valid::when(path.depth() > max_depth, || {
                format!(
                    "parent path `{}` is {} levels deep, the maximum is {}",
                    path.deepest(),
                    path.depth(),
                    max_depth
                )
            })
        });

        let segments = query.parents().flat_map(ParentPath::flatten).collect::<IndexSet<_>>().len();
        let max_segments = self.limits.max_parent_segments;
        depth
            .and(Valid::when(segments > max_segments, || {
                format!(
                    "query on `{}` selects {} parent path fields, the maximum is {}",
                    query.object, segments, max_segments
                )
            }))
            .unit()
    }

    fn check_children(&self, query: &Query, position: Position) -> Valid<(), String> {
        let count = query.children().count();
        match position {
            Position::Root => Valid::when(count > self.limits.max_child_queries, || {
                format!(
                    "query on `{}` has {} child subqueries, the maximum is {}",
                    query.object, count, self.limits.max_child_queries
                )
            }),
            Position::Child { .. } => Valid::when(count > 0, || {
                format!(
                    "child subquery on `{}` cannot contain child subqueries",
                    query.object
                )
            }),
        }
    }

    fn check_offset(&self, query: &Query, position: Position) -> Valid<(), String> {
        match position {
            Position::Root => Valid::succeed(()),
            Position::Child { parent_limit } => {
                Valid::when(query.offset.is_some() && parent_limit != Some(1), || {
                    format!(
                        "child subquery on `{}` can only use OFFSET when the parent query has LIMIT 1",
                        query.object
                    )
                })
            }
        }
    }

    fn emit(&self, query: &Query, children: Vec<String>) -> String {
        let columns = query
            .fields()
            .map(str::to_string)
            .chain(query.parents().flat_map(ParentPath::flatten))
            .collect::<IndexSet<_>>();
        let children = children.into_iter().map(|child| format!("({})", child));
        let select = columns.into_iter().chain(children).collect::<Vec<_>>().join(", ");

        let mut soql = format!("SELECT {} FROM {}", select, query.object);

        if let Some(scope) = &query.scope {
            soql.push_str(&format!(" USING SCOPE {}", scope));
        }
        if let Some(where_clause) = &query.where_clause {
            soql.push_str(&format!(" WHERE {}", where_clause.to_soql()));
        }
        if let Some(order_by) = query.order_by.as_ref().filter(|o| !o.fields.is_empty()) {
            soql.push_str(&format!(
                " ORDER BY {} {}",
                order_by.fields.join(", "),
                order_by.dir
            ));
            if let Some(nulls) = order_by.nulls {
                soql.push_str(&format!(" NULLS {}", nulls));
            }
        }
        if let Some(limit) = query.limit {
            soql.push_str(&format!(" LIMIT {}", limit));
        }
        if let Some(offset) = query.offset {
            soql.push_str(&format!(" OFFSET {}", offset));
        }
        if !query.for_clause.is_empty() {
            let list = query.for_clause.iter().map(ToString::to_string).collect::<Vec<_>>();
            soql.push_str(&format!(" FOR {}", list.join(", ")));
        }
        if !query.update.is_empty() {
            let list = query.update.iter().map(ToString::to_string).collect::<Vec<_>>();
            soql.push_str(&format!(" UPDATE {}", list.join(", ")));
        }

        soql
    }
}
