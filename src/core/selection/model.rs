use indexmap::IndexMap;
use serde_json::Value;

use crate::core::surface::{TypeRef, TYPENAME};

/// A requested field along with everything selected below it. `A` carries
/// whatever later passes attach to the node.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldSet<A = ()> {
    /// Response key: the alias if one was given, the field name otherwise.
    pub name: String,
    pub field_name: String,
    pub arguments: IndexMap<String, Value>,
    pub type_of: TypeRef,
    pub selection: SelectionSet<A>,
    pub extensions: A,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SelectionSet<A = ()> {
    Concrete(Vec<FieldSet<A>>),
    /// Selection on a union or an interface. `shared` applies whatever the
    /// concrete type is; every entry of `possible_sets` only applies to its
    /// type condition.
    Abstract {
        shared: Vec<FieldSet<A>>,
        possible_sets: Vec<FieldSetCondition<A>>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldSetCondition<A = ()> {
    pub type_condition: String,
    pub selection: SelectionSet<A>,
}

impl<A> Default for SelectionSet<A> {
    fn default() -> Self {
        SelectionSet::Concrete(Vec::new())
    }
}

impl<A> SelectionSet<A> {
    /// Fields selected regardless of the concrete type.
    pub fn fields(&self) -> &[FieldSet<A>] {
        match self {
            SelectionSet::Concrete(fields) => fields,
            SelectionSet::Abstract { shared, .. } => shared,
        }
    }

    pub fn possible_sets(&self) -> &[FieldSetCondition<A>] {
        match self {
            SelectionSet::Concrete(_) => &[],
            SelectionSet::Abstract { possible_sets, .. } => possible_sets,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields().is_empty() && self.possible_sets().is_empty()
    }

    /// Fields that apply to the concrete type `type_name`: the shared ones
    /// followed by those of the matching branch.
    pub fn fields_for(&self, type_name: &str) -> Vec<&FieldSet<A>> {
        let mut fields = self.fields().iter().collect::<Vec<_>>();
        for condition in self.possible_sets() {
            if condition.type_condition == type_name {
                fields.extend(condition.selection.fields_for(type_name));
            }
        }
        fields
    }
}

impl<A> FieldSet<A> {
    pub fn is_typename(&self) -> bool {
        self.field_name == TYPENAME
    }

    pub fn children(&self) -> &[FieldSet<A>] {
        self.selection.fields()
    }

    pub fn argument(&self, name: &str) -> Option<&Value> {
        self.arguments.get(name)
    }

    /// Same field with a different payload.
    pub fn with_extensions<B>(&self, selection: SelectionSet<B>, extensions: B) -> FieldSet<B> {
        FieldSet {
            name: self.name.clone(),
            field_name: self.field_name.clone(),
            arguments: self.arguments.clone(),
            type_of: self.type_of.clone(),
            selection,
            extensions,
        }
    }
}
