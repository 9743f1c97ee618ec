use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use dashmap::DashMap;

use super::TypeDef;
use crate::core::registry::ScalarKind;

/// Identity of a generated input type. Field lists are kept sorted so the
/// same set of fields always maps to the same key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SurfaceKey {
    /// Operators available for one scalar kind.
    Comparison(ScalarKind),
    /// Fields a list can be filtered on.
    Filter(Vec<(String, ScalarKind)>),
    /// Fields a list can be ordered by.
    OrderBy(Vec<String>),
}

impl SurfaceKey {
    pub fn filter<'a>(fields: impl IntoIterator<Item = (&'a str, ScalarKind)>) -> Self {
        let mut fields = fields
            .into_iter()
            .map(|(name, kind)| (name.to_string(), kind))
            .collect::<Vec<_>>();
        fields.sort();
        fields.dedup();
        SurfaceKey::Filter(fields)
    }

    pub fn order_by<'a>(fields: impl IntoIterator<Item = &'a str>) -> Self {
        let mut fields = fields.into_iter().map(str::to_string).collect::<Vec<_>>();
        fields.sort();
        fields.dedup();
        SurfaceKey::OrderBy(fields)
    }

    /// Short stable suffix used to name the types generated for this key.
    pub fn suffix(&self) -> String {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        format!("{:x}", hasher.finish())
    }
}

/// Process wide store of generated input types. Construction is pure, so two
/// callers racing on the same key build identical values.
#[derive(Default, Clone)]
pub struct SurfaceCache {
    types: Arc<DashMap<SurfaceKey, Arc<Vec<TypeDef>>>>,
}

impl SurfaceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_insert_with(
        &self,
        key: SurfaceKey,
        build: impl FnOnce(&SurfaceKey) -> Vec<TypeDef>,
    ) -> Arc<Vec<TypeDef>> {
        if let Some(types) = self.types.get(&key) {
            return types.value().clone();
        }
        let types = Arc::new(build(&key));
        self.types.entry(key).or_insert(types).value().clone()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
