use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::core::filter::Expression;

/// A single SOQL statement before it is rendered to text.
#[derive(Clone, Debug, PartialEq, Setters)]
#[setters(strip_option)]
pub struct Query {
    #[setters(skip)]
    pub object: String,
    #[setters(skip)]
    pub selections: Vec<Selection>,
    pub where_clause: Option<Expression>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    #[setters(into)]
    pub scope: Option<String>,
    #[setters(skip)]
    pub for_clause: Vec<ForClause>,
    #[setters(skip)]
    pub update: Vec<UpdateClause>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Selection {
    /// A column of the queried object.
    Field(String),
    /// Columns of related objects, reached through to-one relationships.
    Parent(ParentPath),
    /// A nested query over a to-many relationship.
    Child(Query),
}

/// Rooted tree of to-one relationships. Every node names a relationship and
/// the columns selected on its target.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct ParentPath {
    pub name: String,
    pub fields: Vec<String>,
    pub parents: Vec<ParentPath>,
}

#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct OrderBy {
    pub fields: Vec<String>,
    #[serde(default)]
    pub dir: Direction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nulls: Option<Nulls>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize, Display)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    #[default]
    #[strum(serialize = "ASC")]
    Asc,
    #[strum(serialize = "DESC")]
    Desc,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "UPPERCASE")]
pub enum Nulls {
    #[strum(serialize = "FIRST")]
    First,
    #[strum(serialize = "LAST")]
    Last,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum ForClause {
    #[strum(serialize = "VIEW")]
    View,
    #[strum(serialize = "REFERENCE")]
    Reference,
    #[strum(serialize = "UPDATE")]
    Update,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum UpdateClause {
    #[strum(serialize = "TRACKING")]
    Tracking,
    #[strum(serialize = "VIEWSTAT")]
    Viewstat,
}

impl Query {
    pub fn new(object: impl Into<String>) -> Self {
        Self {
            object: object.into(),
            selections: Vec::new(),
            where_clause: None,
            order_by: None,
            limit: None,
            offset: None,
            scope: None,
            for_clause: Vec::new(),
            update: Vec::new(),
        }
    }

    pub fn select(mut self, selection: Selection) -> Self {
        self.selections.push(selection);
        self
    }

    pub fn field(self, name: impl Into<String>) -> Self {
        self.select(Selection::Field(name.into()))
    }

    pub fn parent(self, path: ParentPath) -> Self {
        self.select(Selection::Parent(path))
    }

    pub fn child(self, query: Query) -> Self {
        self.select(Selection::Child(query))
    }

    pub fn for_clause(mut self, clause: ForClause) -> Self {
        self.for_clause.push(clause);
        self
    }

    pub fn update(mut self, clause: UpdateClause) -> Self {
        self.update.push(clause);
        self
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.selections.iter().filter_map(|selection| match selection {
            Selection::Field(name) => Some(name.as_str()),
            _ => None,
        })
    }

    pub fn parents(&self) -> impl Iterator<Item = &ParentPath> {
        self.selections.iter().filter_map(|selection| match selection {
            Selection::Parent(path) => Some(path),
            _ => None,
        })
    }

    pub fn children(&self) -> impl Iterator<Item = &Query> {
        self.selections.iter().filter_map(|selection| match selection {
            Selection::Child(query) => Some(query),
            _ => None,
        })
    }
}

impl ParentPath {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.fields.push(name.into());
        self
    }

    pub fn parent(mut self, path: ParentPath) -> Self {
        self.parents.push(path);
        self
    }

    /// Number of relationship hops of the deepest branch.
    pub fn depth(&self) -> usize {
        1 + self.parents.iter().map(ParentPath::depth).max().unwrap_or(0)
    }

    /// One dotted path per selected column.
    pub fn flatten(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.flatten_into("", &mut out);
        out
    }

    fn flatten_into(&self, prefix: &str, out: &mut Vec<String>) {
        let prefix = format!("{}{}.", prefix, self.name);
        if self.fields.is_empty() && self.parents.is_empty() {
            out.push(prefix.trim_end_matches('.').to_string());
            return;
        }
        for field in &self.fields {
            out.push(format!("{}{}", prefix, field));
        }
        for parent in &self.parents {
            parent.flatten_into(&prefix, out);
        }
    }

    /// Dotted path of the deepest branch, used in error messages.
    pub fn deepest(&self) -> String {
        match self.parents.iter().max_by_key(|parent| parent.depth()) {
            Some(parent) => format!("{}.{}", self.name, parent.deepest()),
            None => self.name.clone(),
        }
    }
}
