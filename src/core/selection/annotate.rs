use super::{FieldSet, FieldSetCondition, SelectionSet};
use crate::core::registry::{FieldConfig, ObjectConfig, Registry};
use crate::core::{Error, Result};

/// Registry metadata attached to a selected field.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Annotation<'r> {
    /// Object the field is declared on.
    pub parent_obj: Option<&'r ObjectConfig>,
    /// Classification of the field. `None` for `__typename` and root fields.
    pub config_field: Option<&'r FieldConfig>,
    /// Object the sub-selection is classified against, when the field leads
    /// to exactly one object.
    pub target: Option<&'r ObjectConfig>,
}

pub type AnnotatedFieldSet<'r> = FieldSet<Annotation<'r>>;
pub type AnnotatedSelectionSet<'r> = SelectionSet<Annotation<'r>>;

/// Objects a selection is classified against.
#[derive(Clone)]
enum Owner<'r> {
    Object(&'r ObjectConfig),
    /// A polymorphic relationship without a registry entry of its own.
    Polymorphic { name: String, targets: Vec<&'r ObjectConfig> },
}

/// Attaches registry metadata to every node of a [`FieldSet`] tree.
#[derive(Clone, Copy)]
pub struct SchemaAnnotator<'r> {
    registry: &'r Registry,
}

impl<'r> SchemaAnnotator<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    /// Annotates a root field. The field's type names the object it lists.
    pub fn annotate(&self, field: &FieldSet) -> Result<AnnotatedFieldSet<'r>> {
        let target = self.object(&field.type_of.name)?;
        let selection = self.annotate_selection(&field.selection, &Owner::Object(target))?;
        Ok(field.with_extensions(
            selection,
            Annotation { parent_obj: None, config_field: None, target: Some(target) },
        ))
    }

    fn object(&self, name: &str) -> Result<&'r ObjectConfig> {
        self.registry
            .get(name)
            .ok_or_else(|| Error::Annotation(format!("unknown object `{}`", name)))
    }

    fn annotate_selection(
        &self,
        selection: &SelectionSet,
        owner: &Owner<'r>,
    ) -> Result<AnnotatedSelectionSet<'r>> {
        let shared = selection
            .fields()
            .iter()
            .map(|field| self.annotate_field(field, owner))
            .collect::<Result<Vec<_>>>()?;

        if let (SelectionSet::Concrete(_), Owner::Object(_)) = (selection, owner) {
            return Ok(SelectionSet::Concrete(shared));
        }

        let possible_sets = selection
            .possible_sets()
            .iter()
            .map(|condition| {
                let owner = match self.registry.get(&condition.type_condition) {
                    Some(object) => Owner::Object(object),
                    None => match owner {
                        Owner::Polymorphic { targets, .. } => Owner::Polymorphic {
                            name: condition.type_condition.clone(),
                            targets: targets.clone(),
                        },
                        Owner::Object(_) => return Err(Error::Annotation(format!(
                            "unknown object `{}`",
                            condition.type_condition
                        ))),
                    },
                };
                Ok(FieldSetCondition {
                    type_condition: condition.type_condition.clone(),
                    selection: self.annotate_selection(&condition.selection, &owner)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(SelectionSet::Abstract { shared, possible_sets })
    }

    fn annotate_field(&self, field: &FieldSet, owner: &Owner<'r>) -> Result<AnnotatedFieldSet<'r>> {
        let (parent_obj, config_field) = match owner {
            Owner::Object(object) => (*object, self.declared(*object, field)?),
            Owner::Polymorphic { name, targets } => self.shared_declaration(name, targets, field)?,
        };

        if field.is_typename() {
            let annotation = Annotation { parent_obj: Some(parent_obj), ..Annotation::default() };
            return Ok(field.with_extensions(SelectionSet::default(), annotation));
        }
        let config = config_field.ok_or_else(|| {
            Error::Annotation(format!(
                "field `{}` is not declared on `{}`",
                field.field_name, parent_obj.name
            ))
        })?;

        let (target, owner) = match config {
            FieldConfig::Leaf(_) => (None, None),
            FieldConfig::Parent(parent) => match parent.targets.as_slice() {
                [target] => {
                    let target = self.object(target)?;
                    (Some(target), Some(Owner::Object(target)))
                }
                targets => {
                    let targets = targets
                        .iter()
                        .map(|target| self.object(target))
                        .collect::<Result<Vec<_>>>()?;
                    let name = field.type_of.name.clone();
                    (None, Some(Owner::Polymorphic { name, targets }))
                }
            },
            FieldConfig::Child(child) => {
                let target = self.object(&child.target)?;
                (Some(target), Some(Owner::Object(target)))
            }
        };

        let selection = match owner {
            Some(owner) => self.annotate_selection(&field.selection, &owner)?,
            None => SelectionSet::default(),
        };
        let annotation = Annotation { parent_obj: Some(parent_obj), config_field: Some(config), target };
        Ok(field.with_extensions(selection, annotation))
    }

    fn declared(&self, object: &'r ObjectConfig, field: &FieldSet) -> Result<Option<&'r FieldConfig>> {
        if field.is_typename() {
            return Ok(None);
        }
        match object.field(&field.field_name) {
            Some(config) => Ok(Some(config)),
            None => Err(Error::Annotation(format!(
                "field `{}` is not declared on `{}`",
                field.field_name, object.name
            ))),
        }
    }

    /// Classifies a shared field of a polymorphic selection. The field has to
    /// be declared with the same kind on every possible target.
    fn shared_declaration(
        &self,
        name: &str,
        targets: &[&'r ObjectConfig],
        field: &FieldSet,
    ) -> Result<(&'r ObjectConfig, Option<&'r FieldConfig>)> {
        let Some(first) = targets.first().copied() else {
            return Err(Error::Annotation(format!("`{}` has no possible types", name)));
        };
        if field.is_typename() {
            return Ok((first, None));
        }

        let declarations = targets
            .iter()
            .map(|&target| target.field(&field.field_name))
            .collect::<Option<Vec<_>>>();
        match declarations {
            Some(declarations)
                if declarations
                    .iter()
                    .all(|config| config.kind_name() == declarations[0].kind_name()) =>
            {
                Ok((first, declarations.first().copied()))
            }
            _ => Err(Error::Annotation(format!(
                "field `{}` is not declared with the same kind on every possible type of `{}`",
                field.field_name, name
            ))),
        }
    }
}
