use std::fmt::{Display, Formatter};

use indexmap::IndexMap;

use super::{SurfaceCache, SurfaceKey};
use crate::core::filter::Operator;
use crate::core::registry::{FieldConfig, ObjectConfig, Registry, ScalarKind};

pub const QUERY: &str = "Query";
pub const TYPENAME: &str = "__typename";

const DIRECTION: &str = "Direction";
const NULLS: &str = "Nulls";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeRef {
    pub name: String,
    pub is_list: bool,
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into(), is_list: false }
    }

    pub fn list(name: impl Into<String>) -> Self {
        Self { name: name.into(), is_list: true }
    }
}

impl Display for TypeRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_list {
            write!(f, "[{}]", self.name)
        } else {
            f.write_str(&self.name)
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub type_of: TypeRef,
    pub args: Vec<(String, TypeRef)>,
    pub description: Option<String>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, type_of: TypeRef) -> Self {
        Self { name: name.into(), type_of, args: Vec::new(), description: None }
    }

    fn arg(mut self, name: &str, type_of: TypeRef) -> Self {
        self.args.push((name.to_string(), type_of));
        self
    }
}

/// A named type of the query surface.
#[derive(Clone, Debug, PartialEq)]
pub enum TypeDef {
    Scalar { name: String },
    Object { name: String, fields: IndexMap<String, FieldDef> },
    Interface { name: String, fields: IndexMap<String, FieldDef>, implementations: Vec<String> },
    Union { name: String, members: Vec<String> },
    Enum { name: String, values: Vec<String> },
    InputObject { name: String, fields: IndexMap<String, FieldDef> },
}

impl TypeDef {
    pub fn object(name: impl Into<String>, fields: impl IntoIterator<Item = FieldDef>) -> Self {
        TypeDef::Object { name: name.into(), fields: by_name(fields) }
    }

    pub fn input(name: impl Into<String>, fields: impl IntoIterator<Item = FieldDef>) -> Self {
        TypeDef::InputObject { name: name.into(), fields: by_name(fields) }
    }

    pub fn name(&self) -> &str {
        match self {
            TypeDef::Scalar { name }
            | TypeDef::Object { name, .. }
            | TypeDef::Interface { name, .. }
            | TypeDef::Union { name, .. }
            | TypeDef::Enum { name, .. }
            | TypeDef::InputObject { name, .. } => name,
        }
    }

    pub fn is_abstract(&self) -> bool {
        matches!(self, TypeDef::Union { .. } | TypeDef::Interface { .. })
    }

    fn fields(&self) -> Option<&IndexMap<String, FieldDef>> {
        match self {
            TypeDef::Object { fields, .. } | TypeDef::Interface { fields, .. } => Some(fields),
            _ => None,
        }
    }
}

fn by_name(fields: impl IntoIterator<Item = FieldDef>) -> IndexMap<String, FieldDef> {
    fields.into_iter().map(|field| (field.name.clone(), field)).collect()
}

/// GraphQL scalar a remote scalar kind is exposed as.
pub fn graphql_scalar(kind: ScalarKind) -> &'static str {
    match kind {
        ScalarKind::Id => "ID",
        ScalarKind::Boolean => "Boolean",
        ScalarKind::Int => "Int",
        ScalarKind::Double | ScalarKind::Currency | ScalarKind::Percent => "Float",
        ScalarKind::Date => "Date",
        ScalarKind::Datetime => "DateTime",
        ScalarKind::Time => "Time",
        _ => "String",
    }
}

fn polymorphic_union(object: &str, field: &str) -> String {
    format!("{}_{}", object, field)
}

/// Lookup table over the types of the query surface.
#[derive(Clone, Debug, Default)]
pub struct TypeIndex {
    types: IndexMap<String, TypeDef>,
}

impl TypeIndex {
    pub fn new(types: impl IntoIterator<Item = TypeDef>) -> Self {
        Self { types: types.into_iter().map(|t| (t.name().to_string(), t)).collect() }
    }

    pub fn with_type(mut self, type_def: TypeDef) -> Self {
        self.types.insert(type_def.name().to_string(), type_def);
        self
    }

    /// Derives the query surface of a registry: one object type per remote
    /// object, a union per polymorphic relationship and the root `Query`
    /// type listing every object. Generated input types are shared through
    /// `cache`.
    pub fn from_registry(registry: &Registry, cache: &SurfaceCache) -> Self {
        let mut index = TypeIndex::default();
        for scalar in ["Date", "DateTime", "Time"] {
            index = index.with_type(TypeDef::Scalar { name: scalar.to_string() });
        }
        index = index
            .with_type(TypeDef::Enum {
                name: DIRECTION.to_string(),
                values: vec!["ASC".to_string(), "DESC".to_string()],
            })
            .with_type(TypeDef::Enum {
                name: NULLS.to_string(),
                values: vec!["FIRST".to_string(), "LAST".to_string()],
            });

        let mut query = Vec::new();
        for object in registry.objects() {
            let (filter, order_by) = index.list_inputs(object, cache);
            let list_field = |name: &str, target: &str| {
                list_args(FieldDef::new(name, TypeRef::list(target)), &filter, &order_by)
            };

            let mut fields = Vec::new();
            for (name, config) in &object.fields {
                let field = match config {
                    FieldConfig::Leaf(leaf) => {
                        FieldDef::new(name.as_str(), TypeRef::named(graphql_scalar(leaf.scalar)))
                    }
                    FieldConfig::Parent(parent) => match parent.targets.as_slice() {
                        [target] => FieldDef::new(name.as_str(), TypeRef::named(target.as_str())),
                        targets => {
                            let union = polymorphic_union(&object.name, name);
                            index = index.with_type(TypeDef::Union {
                                name: union.clone(),
                                members: targets.to_vec(),
                            });
                            FieldDef::new(name.as_str(), TypeRef::named(union))
                        }
                    },
                    FieldConfig::Child(child) => {
                        let target = registry.get(&child.target);
                        let (filter, order_by) = match target {
                            Some(target) => index.list_inputs(target, cache),
                            None => (None, None),
                        };
                        list_args(
                            FieldDef::new(name.as_str(), TypeRef::list(child.target.as_str())),
                            &filter,
                            &order_by,
                        )
                    }
                };
                fields.push(FieldDef { description: config.description().map(str::to_string), ..field });
            }
            index = index.with_type(TypeDef::object(object.name.as_str(), fields));
            query.push(FieldDef {
                description: object.description.clone(),
                ..list_field(&object.name, &object.name)
            });
        }

        index.with_type(TypeDef::object(QUERY, query))
    }

    /// Registers the filter and order-by inputs of `object` and returns their
    /// names.
    fn list_inputs(
        &mut self,
        object: &ObjectConfig,
        cache: &SurfaceCache,
    ) -> (Option<String>, Option<String>) {
        let leaves = object
            .fields
            .iter()
            .filter_map(|(name, config)| config.as_leaf().map(|leaf| (name.as_str(), leaf)))
            .collect::<Vec<_>>();

        let filterable = leaves
            .iter()
            .filter(|(_, leaf)| leaf.filterable)
            .map(|(name, leaf)| (*name, leaf.scalar))
            .collect::<Vec<_>>();
        let filter = (!filterable.is_empty()).then(|| {
            for (_, kind) in &filterable {
                self.register(cache.get_or_insert_with(SurfaceKey::Comparison(*kind), build_inputs));
            }
            let key = SurfaceKey::filter(filterable.iter().copied());
            let name = format!("Filter_{}", key.suffix());
            self.register(cache.get_or_insert_with(key, build_inputs));
            name
        });

        let order_by = (!leaves.is_empty()).then(|| {
            let key = SurfaceKey::order_by(leaves.iter().map(|(name, _)| *name));
            let name = format!("OrderBy_{}", key.suffix());
            self.register(cache.get_or_insert_with(key, build_inputs));
            name
        });

        (filter, order_by)
    }

    fn register(&mut self, types: std::sync::Arc<Vec<TypeDef>>) {
        for type_def in types.iter() {
            if !self.types.contains_key(type_def.name()) {
                self.types.insert(type_def.name().to_string(), type_def.clone());
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&TypeDef> {
        self.types.get(name)
    }

    pub fn types(&self) -> impl Iterator<Item = &TypeDef> {
        self.types.values()
    }

    pub fn query_type(&self) -> &str {
        QUERY
    }

    pub fn is_abstract(&self, name: &str) -> bool {
        self.get(name).map(TypeDef::is_abstract).unwrap_or_default()
    }

    /// Concrete types a value of `name` can have.
    pub fn possible_types(&self, name: &str) -> Vec<&str> {
        match self.get(name) {
            Some(TypeDef::Union { members, .. }) => members
                .iter()
                .flat_map(|member| self.possible_types(member))
                .collect(),
            Some(TypeDef::Interface { implementations, .. }) => implementations
                .iter()
                .flat_map(|member| self.possible_types(member))
                .collect(),
            Some(type_def) => vec![type_def.name()],
            None => Vec::new(),
        }
    }

    /// Whether a fragment conditioned on `condition` can apply to a value of
    /// type `type_name`.
    pub fn overlaps(&self, condition: &str, type_name: &str) -> bool {
        if condition == type_name {
            return true;
        }
        let possible = self.possible_types(type_name);
        self.possible_types(condition)
            .iter()
            .any(|candidate| possible.contains(candidate))
    }

    /// Field `name` of `type_name`. On a union a field resolves when every
    /// member declares it with the same type.
    pub fn field(&self, type_name: &str, name: &str) -> Option<&FieldDef> {
        match self.get(type_name)? {
            TypeDef::Union { members, .. } => {
                let mut found = members.iter().map(|member| self.field(member, name));
                let first = found.next()??;
                found
                    .all(|field| field.map(|f| f.type_of == first.type_of).unwrap_or_default())
                    .then_some(first)
            }
            type_def => type_def.fields()?.get(name),
        }
    }

    /// Whether selecting a field of this type needs a sub-selection.
    pub fn is_composite(&self, name: &str) -> bool {
        matches!(
            self.get(name),
            Some(TypeDef::Object { .. } | TypeDef::Interface { .. } | TypeDef::Union { .. })
        )
    }

    pub fn to_sdl(&self) -> String {
        self.types()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

fn list_args(field: FieldDef, filter: &Option<String>, order_by: &Option<String>) -> FieldDef {
    let mut field = field;
    if let Some(filter) = filter {
        field = field.arg("filter", TypeRef::named(filter.as_str()));
    }
    field = field.arg("filterString", TypeRef::named("String"));
    if let Some(order_by) = order_by {
        field = field.arg("orderBy", TypeRef::named(order_by.as_str()));
    }
    field
        .arg("limit", TypeRef::named("Int"))
        .arg("offset", TypeRef::named("Int"))
        .arg("scope", TypeRef::named("String"))
}

fn comparison_name(kind: ScalarKind) -> String {
    let kind = kind.to_string();
    let mut chars = kind.chars();
    match chars.next() {
        Some(first) => format!("{}{}Comparison", first.to_uppercase(), chars.as_str()),
        None => "Comparison".to_string(),
    }
}

/// Builds the input types generated for a cache key.
fn build_inputs(key: &SurfaceKey) -> Vec<TypeDef> {
    match key {
        SurfaceKey::Comparison(kind) => {
            let scalar = graphql_scalar(*kind);
            let operators = Operator::available_for(*kind).into_iter().map(|op| {
                let type_of = match op {
                    Operator::In | Operator::NotIn | Operator::Includes | Operator::Excludes => {
                        TypeRef::list(scalar)
                    }
                    _ => TypeRef::named(scalar),
                };
                FieldDef::new(op.input_name(), type_of)
            });
            vec![TypeDef::input(comparison_name(*kind), operators)]
        }
        SurfaceKey::Filter(fields) => {
            let suffix = key.suffix();
            let filter = format!("Filter_{}", suffix);
            let leaf = format!("LeafFilter_{}", suffix);
            let node = format!("FilterNode_{}", suffix);
            vec![
                TypeDef::input(
                    leaf.as_str(),
                    fields.iter().map(|(name, kind)| {
                        FieldDef::new(name.as_str(), TypeRef::named(comparison_name(*kind)))
                    }),
                ),
                TypeDef::input(
                    node.as_str(),
                    [
                        FieldDef::new("AND", TypeRef::list(filter.as_str())),
                        FieldDef::new("OR", TypeRef::list(filter.as_str())),
                        FieldDef::new("NOT", TypeRef::named(filter.as_str())),
                    ],
                ),
                TypeDef::input(
                    filter.as_str(),
                    [
                        FieldDef::new("leaf", TypeRef::named(leaf)),
                        FieldDef::new("node", TypeRef::named(node)),
                    ],
                ),
            ]
        }
        SurfaceKey::OrderBy(fields) => {
            let suffix = key.suffix();
            let values = format!("OrderField_{}", suffix);
            vec![
                TypeDef::Enum { name: values.clone(), values: fields.clone() },
                TypeDef::input(
                    format!("OrderBy_{}", suffix),
                    [
                        FieldDef::new("fields", TypeRef::list(values)),
                        FieldDef::new("dir", TypeRef::named(DIRECTION)),
                        FieldDef::new("nulls", TypeRef::named(NULLS)),
                    ],
                ),
            ]
        }
    }
}

fn write_fields(f: &mut Formatter<'_>, fields: &IndexMap<String, FieldDef>) -> std::fmt::Result {
    for field in fields.values() {
        if let Some(description) = &field.description {
            writeln!(f, "  \"{}\"", description)?;
        }
        write!(f, "  {}", field.name)?;
        if !field.args.is_empty() {
            let args = field
                .args
                .iter()
                .map(|(name, type_of)| format!("{}: {}", name, type_of))
                .collect::<Vec<_>>();
            write!(f, "({})", args.join(", "))?;
        }
        writeln!(f, ": {}", field.type_of)?;
    }
    Ok(())
}

impl Display for TypeDef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeDef::Scalar { name } => write!(f, "scalar {}", name),
            TypeDef::Object { name, fields } => {
                writeln!(f, "type {} {{", name)?;
                write_fields(f, fields)?;
                f.write_str("}")
            }
            TypeDef::Interface { name, fields, .. } => {
                writeln!(f, "interface {} {{", name)?;
                write_fields(f, fields)?;
                f.write_str("}")
            }
            TypeDef::InputObject { name, fields } => {
                writeln!(f, "input {} {{", name)?;
                write_fields(f, fields)?;
                f.write_str("}")
            }
            TypeDef::Union { name, members } => write!(f, "union {} = {}", name, members.join(" | ")),
            TypeDef::Enum { name, values } => {
                writeln!(f, "enum {} {{", name)?;
                for value in values {
                    writeln!(f, "  {}", value)?;
                }
                f.write_str("}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn registry() -> Registry {
        Registry::new([
            ObjectConfig::new("Case")
                .leaf("Id", ScalarKind::Id)
                .leaf("Subject", ScalarKind::String)
                .parent("Owner", ["User", "Queue"]),
            ObjectConfig::new("User")
                .leaf("Id", ScalarKind::Id)
                .leaf("Name", ScalarKind::String)
                .child("Cases", "Case"),
            ObjectConfig::new("Queue")
                .leaf("Id", ScalarKind::Id)
                .leaf("Name", ScalarKind::String),
        ])
    }

    #[test]
    fn test_objects_and_unions() {
        let index = TypeIndex::from_registry(&registry(), &SurfaceCache::new());
        assert_eq!(
            index.get("Case_Owner"),
            Some(&TypeDef::Union {
                name: "Case_Owner".to_string(),
                members: vec!["User".to_string(), "Queue".to_string()]
            })
        );
        assert!(index.is_abstract("Case_Owner"));
        assert!(!index.is_abstract("Case"));
        assert_eq!(index.possible_types("Case_Owner"), vec!["User", "Queue"]);
        assert_eq!(
            index.field("Case", "Owner").map(|f| f.type_of.clone()),
            Some(TypeRef::named("Case_Owner"))
        );
        assert_eq!(
            index.field(QUERY, "Case").map(|f| f.type_of.clone()),
            Some(TypeRef::list("Case"))
        );
        let cases = index.field("User", "Cases").unwrap();
        let args = cases.args.iter().map(|(name, _)| name.as_str()).collect::<Vec<_>>();
        assert_eq!(args, vec!["filter", "filterString", "orderBy", "limit", "offset", "scope"]);
    }

    #[test]
    fn test_union_common_fields() {
        let index = TypeIndex::from_registry(&registry(), &SurfaceCache::new());
        assert_eq!(
            index.field("Case_Owner", "Name").map(|f| f.type_of.clone()),
            Some(TypeRef::named("String"))
        );
        assert_eq!(index.field("Case_Owner", "Cases"), None);
    }

    #[test]
    fn test_overlaps() {
        let index = TypeIndex::from_registry(&registry(), &SurfaceCache::new());
        assert!(index.overlaps("User", "Case_Owner"));
        assert!(index.overlaps("Case_Owner", "Queue"));
        assert!(!index.overlaps("Case", "Case_Owner"));
    }

    #[test]
    fn test_shared_inputs_are_cached() {
        let cache = SurfaceCache::new();
        let index = TypeIndex::from_registry(&registry(), &cache);
        // User and Queue expose the same leaves and share their inputs
        let user = index.field(QUERY, "User").unwrap();
        let queue = index.field(QUERY, "Queue").unwrap();
        assert_eq!(user.args, queue.args);

        let before = cache.len();
        TypeIndex::from_registry(&registry(), &cache);
        assert_eq!(cache.len(), before);
    }

    #[test]
    fn test_comparison_operators() {
        let inputs = build_inputs(&SurfaceKey::Comparison(ScalarKind::Multipicklist));
        let TypeDef::InputObject { name, fields } = &inputs[0] else {
            panic!("expected an input object");
        };
        assert_eq!(name, "MultipicklistComparison");
        assert_eq!(fields.get("includes").map(|f| f.type_of.clone()), Some(TypeRef::list("String")));
        assert!(fields.get("like").is_none());
    }

    #[test]
    fn test_sdl() {
        let object = TypeDef::object(
            "Jedi",
            [
                FieldDef::new("Id", TypeRef::named("ID")),
                FieldDef::new("Padawans", TypeRef::list("Jedi")).arg("limit", TypeRef::named("Int")),
            ],
        );
        insta::assert_snapshot!(object.to_string(), @r###"
        type Jedi {
          Id: ID
          Padawans(limit: Int): [Jedi]
        }
        "###);
    }
}
