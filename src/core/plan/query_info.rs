use std::collections::HashSet;

use indexmap::IndexSet;

use super::ListArgs;
use crate::core::config::Limits;
use crate::core::filter::{quote, Expression, Operator, Predicate};
use crate::core::registry::{FieldConfig, LeafField, ObjectConfig, Registry};
use crate::core::selection::AnnotatedFieldSet;
use crate::core::soql::{ParentPath, Query};
use crate::core::Result;

const ID: &str = "Id";
const TYPE: &str = "Type";

/// What a statement selects for one level of the selection tree, and how
/// every relationship of that level gets its data.
#[derive(Debug)]
pub struct QueryInfo<'a> {
    /// Object the level reads from. `None` on a polymorphic level whose
    /// concrete type is only known per row.
    pub object: Option<&'a ObjectConfig>,
    pub select_id: bool,
    /// Selects `Type` to tag the concrete type of a polymorphic level.
    pub select_type: bool,
    pub entries: Vec<Entry<'a>>,
    /// Set when the statement selects only the Id of a related record that
    /// does not fit. The record is then read by this statement of its own.
    pub indirect: Option<Box<QueryInfo<'a>>>,
}

#[derive(Debug)]
pub struct Entry<'a> {
    pub field: &'a AnnotatedFieldSet<'a>,
    pub plan: Plan<'a>,
}

#[derive(Debug)]
pub enum Plan<'a> {
    Leaf(&'a LeafField),
    Typename,
    Parent(Fetch<'a>),
    Child(Fetch<'a>),
}

#[derive(Debug)]
pub enum Fetch<'a> {
    /// Selected by the same statement as its owner.
    Embedded(QueryInfo<'a>),
    /// Selected by one statement per concrete type.
    Polymorphic(Vec<Branch<'a>>),
    /// Fetched by a lookup once the owner row is known.
    Deferred,
}

#[derive(Debug)]
pub struct Branch<'a> {
    pub object: &'a ObjectConfig,
    pub info: QueryInfo<'a>,
}

/// One concrete type per fanned out polymorphic field.
pub type Combination<'a> = Vec<(&'a AnnotatedFieldSet<'a>, &'a str)>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatementKind {
    /// Lists a root object.
    Root,
    /// Fetches relationships of one row selected by Id.
    Lookup,
    /// A child subquery of another statement.
    Child,
}

#[derive(Clone)]
struct Level {
    kind: StatementKind,
    /// Relationship hops from the object the statement selects from.
    depth: usize,
    /// LIMIT of the enclosing statement.
    limit: Option<u64>,
    /// Dotted relationship path of the level, `Master.Master.` for instance.
    prefix: String,
}

impl Level {
    fn new(kind: StatementKind, limit: Option<u64>) -> Self {
        Self { kind, depth: 0, limit, prefix: String::new() }
    }

    fn forced(&self) -> bool {
        self.kind == StatementKind::Lookup && self.depth == 0
    }

    fn hop(&self, name: &str) -> Self {
        Self {
            depth: self.depth + 1,
            prefix: format!("{}{}.", self.prefix, name),
            ..self.clone()
        }
    }
}

/// Parent path columns a statement can still select. A column reached
/// through several aliases of one relationship is paid for once.
#[derive(Clone, Debug)]
struct Budget {
    remaining: usize,
    columns: HashSet<String>,
}

impl Budget {
    fn new(max: usize) -> Self {
        Self { remaining: max, columns: HashSet::new() }
    }

    /// Columns `names` under `prefix` that the statement does not select yet.
    fn missing<'n>(&self, prefix: &str, names: impl IntoIterator<Item = &'n str>) -> Vec<String> {
        names
            .into_iter()
            .map(|name| format!("{}{}", prefix, name))
            .filter(|column| !self.columns.contains(column))
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect()
    }

    fn charge(&mut self, columns: Vec<String>) {
        self.remaining = self.remaining.saturating_sub(columns.len());
        self.columns.extend(columns);
    }
}

/// Decides which relationships a statement can embed.
#[derive(Clone, Copy)]
pub struct InfoBuilder<'a> {
    registry: &'a Registry,
    limits: Limits,
}

impl<'a> InfoBuilder<'a> {
    pub fn new(registry: &'a Registry, limits: Limits) -> Self {
        Self { registry, limits }
    }

    pub fn statement(
        &self,
        fields: Vec<&'a AnnotatedFieldSet<'a>>,
        object: &'a ObjectConfig,
        kind: StatementKind,
        limit: Option<u64>,
    ) -> QueryInfo<'a> {
        let mut budget = Budget::new(self.limits.max_parent_segments);
        let mut children = IndexSet::new();
        let level = Level::new(kind, limit);
        let select_id = kind != StatementKind::Lookup;
        self.level(fields, Some(object), &level, &mut budget, &mut children, select_id, false)
    }

    #[allow(clippy::too_many_arguments)]
    fn level(
        &self,
        fields: Vec<&'a AnnotatedFieldSet<'a>>,
        object: Option<&'a ObjectConfig>,
        level: &Level,
        budget: &mut Budget,
        children: &mut IndexSet<&'a str>,
        select_id: bool,
        select_type: bool,
    ) -> QueryInfo<'a> {
        let mut entries = Vec::with_capacity(fields.len());
        for field in fields {
            let plan = match field.extensions.config_field {
                _ if field.is_typename() => Plan::Typename,
                Some(FieldConfig::Leaf(leaf)) => Plan::Leaf(leaf),
                Some(config) if config.is_polymorphic() => {
                    Plan::Parent(self.polymorphic(field, level, budget))
                }
                Some(FieldConfig::Parent(_)) => Plan::Parent(self.parent(field, level, budget)),
                Some(FieldConfig::Child(_)) => Plan::Child(self.child(field, level, children)),
                None => {
                    tracing::warn!("Field {} has no classification, skipping", field.name);
                    continue;
                }
            };
            entries.push(Entry { field, plan });
        }
        QueryInfo { object, select_id, select_type, entries, indirect: None }
    }

    /// Builds the level of the relationship `name` when it fits the
    /// remaining depth and segment budget. Nested relationships that do not
    /// fit are deferred on their own. The first hop of a lookup always gets a
    /// level; when its columns overflow the budget only the related Id is
    /// selected and the record is read by a statement of its own.
    fn embed(
        &self,
        fields: Vec<&'a AnnotatedFieldSet<'a>>,
        object: Option<&'a ObjectConfig>,
        name: &str,
        level: &Level,
        budget: &mut Budget,
        select_type: bool,
    ) -> Option<QueryInfo<'a>> {
        let forced = level.forced();
        let nested = level.hop(name);
        if nested.depth > self.limits.max_parent_depth && !forced {
            return None;
        }

        let own = std::iter::once(ID).chain(select_type.then_some(TYPE));
        let leaves = fields
            .iter()
            .filter(|field| matches!(field.extensions.config_field, Some(FieldConfig::Leaf(_))))
            .map(|field| field.field_name.as_str());
        let columns = budget.missing(&nested.prefix, own.clone().chain(leaves));
        if columns.len() > budget.remaining {
            if !forced {
                return None;
            }
            if let Some(object) = object {
                let id = budget.missing(&nested.prefix, own);
                budget.charge(id);
                let target = self.statement(fields, object, StatementKind::Root, Some(1));
                return Some(QueryInfo {
                    object: Some(object),
                    select_id: true,
                    select_type,
                    entries: Vec::new(),
                    indirect: Some(Box::new(target)),
                });
            }
        }

        budget.charge(columns);
        Some(self.level(fields, object, &nested, budget, &mut IndexSet::new(), true, select_type))
    }

    fn parent(&self, field: &'a AnnotatedFieldSet<'a>, level: &Level, budget: &mut Budget) -> Fetch<'a> {
        let Some(target) = field.extensions.target else {
            return Fetch::Deferred;
        };
        let fields = field.children().iter().collect();
        match self.embed(fields, Some(target), &field.field_name, level, budget, false) {
            Some(info) => Fetch::Embedded(info),
            None => Fetch::Deferred,
        }
    }

    /// Type conditioned selections fan out at the first hop of a statement
    /// that is not a child subquery. Everywhere else they are deferred.
    fn polymorphic(&self, field: &'a AnnotatedFieldSet<'a>, level: &Level, budget: &mut Budget) -> Fetch<'a> {
        let selection = &field.selection;
        let mut common = selection.fields().iter().collect::<Vec<_>>();
        let mut branches = Vec::new();
        for condition in selection.possible_sets() {
            match self.registry.get(&condition.type_condition) {
                Some(object) => branches.push((object, condition)),
                // abstract conditions apply to every target
                None => common.extend(condition.selection.fields()),
            }
        }

        if branches.is_empty() {
            return match self.embed(common, None, &field.field_name, level, budget, true) {
                Some(info) => Fetch::Embedded(info),
                None => Fetch::Deferred,
            };
        }
        if level.depth != 0 || level.kind == StatementKind::Child {
            return Fetch::Deferred;
        }

        // branches run as separate statements: the widest one is charged
        let mut widest: Option<Budget> = None;
        let mut out = Vec::with_capacity(branches.len());
        for (object, condition) in branches {
            let mut fields = common.clone();
            fields.extend(condition.selection.fields_for(&condition.type_condition));
            let mut remaining = budget.clone();
            let Some(info) = self.embed(fields, Some(object), &field.field_name, level, &mut remaining, false)
            else {
                return Fetch::Deferred;
            };
            let wider = match &widest {
                Some(widest) => remaining.remaining < widest.remaining,
                None => true,
            };
            if wider {
                widest = Some(remaining);
            }
            out.push(Branch { object, info });
        }
        if let Some(widest) = widest {
            *budget = widest;
        }
        Fetch::Polymorphic(out)
    }

    /// A statement carries one subquery per relationship. Further aliases
    /// of an embedded relationship are looked up with their own arguments.
    fn child(
        &self,
        field: &'a AnnotatedFieldSet<'a>,
        level: &Level,
        children: &mut IndexSet<&'a str>,
    ) -> Fetch<'a> {
        if level.depth != 0 || level.kind == StatementKind::Child {
            return Fetch::Deferred;
        }
        if children.len() >= self.limits.max_child_queries {
            return Fetch::Deferred;
        }
        if children.contains(field.field_name.as_str()) {
            return Fetch::Deferred;
        }
        let has_offset = field.argument("offset").map(|v| !v.is_null()).unwrap_or_default();
        if has_offset && level.limit != Some(1) {
            return Fetch::Deferred;
        }
        let Some(target) = field.extensions.target else {
            return Fetch::Deferred;
        };

        children.insert(field.field_name.as_str());
        let mut budget = Budget::new(self.limits.max_parent_segments);
        let child = Level::new(StatementKind::Child, None);
        let fields = field.children().iter().collect();
        Fetch::Embedded(self.level(fields, Some(target), &child, &mut budget, &mut IndexSet::new(), true, false))
    }
}

impl<'a> QueryInfo<'a> {
    /// Polymorphic relationships this level fans out, with their concrete
    /// types in branch order.
    pub fn fan_out(&self) -> Vec<(&'a AnnotatedFieldSet<'a>, Vec<&'a str>)> {
        self.entries
            .iter()
            .filter_map(|entry| match &entry.plan {
                Plan::Parent(Fetch::Polymorphic(branches)) => Some((
                    entry.field,
                    branches.iter().map(|branch| branch.object.name.as_str()).collect(),
                )),
                _ => None,
            })
            .collect()
    }

    /// Every combination of concrete types over the fanned out fields,
    /// earlier fields varying slowest. A level without fan-out has exactly
    /// one, empty, combination.
    pub fn combinations(&self) -> Vec<Combination<'a>> {
        self.fan_out()
            .into_iter()
            .fold(vec![Vec::new()], |combinations, (field, types)| {
                combinations
                    .into_iter()
                    .flat_map(|prefix| {
                        types.iter().map(move |type_name| {
                            let mut combination = prefix.clone();
                            combination.push((field, *type_name));
                            combination
                        })
                    })
                    .collect()
            })
    }

    /// Adds the selections of this level to the statement `query`, choosing
    /// polymorphic branches from `combination`.
    pub fn select(&self, query: Query, combination: &Combination<'a>) -> Result<Query> {
        let mut query = query;
        if self.select_id {
            query = query.field(ID);
        }
        if self.select_type {
            query = query.field(TYPE);
        }
        for entry in &self.entries {
            let field_name = entry.field.field_name.as_str();
            query = match &entry.plan {
                Plan::Leaf(_) => query.field(field_name),
                Plan::Parent(Fetch::Embedded(info)) => query.parent(info.path(field_name)),
                Plan::Parent(Fetch::Polymorphic(branches)) => {
                    let chosen = combination
                        .iter()
                        .find(|(field, _)| field.name == entry.field.name)
                        .and_then(|(_, type_name)| {
                            branches.iter().find(|branch| branch.object.name == *type_name)
                        });
                    match chosen {
                        Some(branch) => query.parent(branch.info.path(field_name)),
                        None => query,
                    }
                }
                Plan::Child(Fetch::Embedded(info)) => {
                    query.child(info.child_query(entry.field)?)
                }
                Plan::Typename | Plan::Parent(Fetch::Deferred) | Plan::Child(_) => query,
            };
        }
        Ok(query)
    }

    fn child_query(&self, field: &AnnotatedFieldSet<'_>) -> Result<Query> {
        let query = self.select(Query::new(field.field_name.as_str()), &Vec::new())?;
        match self.object {
            Some(object) => ListArgs::from_arguments(&field.arguments)?.apply(query, object),
            None => Ok(query),
        }
    }

    fn path(&self, name: &str) -> ParentPath {
        let mut fields = IndexSet::new();
        if self.select_id {
            fields.insert(ID);
        }
        if self.select_type {
            fields.insert(TYPE);
        }
        let mut path = ParentPath::new(name);
        for entry in &self.entries {
            match &entry.plan {
                Plan::Leaf(_) => {
                    fields.insert(entry.field.field_name.as_str());
                }
                Plan::Parent(Fetch::Embedded(info)) => {
                    path = path.parent(info.path(&entry.field.field_name));
                }
                _ => {}
            }
        }
        path.fields = fields.into_iter().map(str::to_string).collect();
        path
    }
}

/// `filter AND ( Owner.Type = 'User' ) AND ...` for one combination.
pub fn with_type_conditions(filter: Option<Expression>, combination: &Combination<'_>) -> Option<Expression> {
    combination.iter().fold(filter, |filter, (field, type_name)| {
        let condition = Expression::predicate(Predicate::new(
            format!("{}.{}", field.field_name, TYPE),
            Operator::Eq,
            quote(type_name),
        ));
        match filter {
            Some(filter) => Some(filter.and(condition)),
            None => Some(condition),
        }
    })
}
