//! Self-copy capability surface.
//!
//! A value opts out of generic traversal in one of two ways:
//! - its foreign handle exposes a [`DeepCopier`] through [`ForeignObject::as_copier`],
//! - a hook is registered for its static type name in [`SpecCopierRegistry`].
//!
//! Hook results are trusted as-is.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::value::Value;

/// Types that know how to produce an independently owned copy of themselves.
pub trait DeepCopier {
    /// Return a new value of the same concrete type.
    fn deep_copy(&self) -> Value;
}

/// Host object stored behind an opaque handle.
pub trait ForeignObject: Any + fmt::Debug {
    fn as_any(&self) -> &dyn Any;

    /// Self-copy capability, if this concrete type has one.
    fn as_copier(&self) -> Option<&dyn DeepCopier> {
        None
    }
}

/// Hook registered for one static type name.
pub type FnCopier = Rc<dyn Fn(&Value) -> Value>;

/// Self-copy hooks keyed by static type name (see [`Value::type_name`]).
#[derive(Clone, Default)]
pub struct SpecCopierRegistry {
    dict_copiers: HashMap<String, FnCopier>,
}

impl SpecCopierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `copier` for values whose static type is `type_name`.
    /// A later registration for the same name replaces the earlier one.
    pub fn register<F>(&mut self, type_name: &str, copier: F)
    where
        F: Fn(&Value) -> Value + 'static,
    {
        self.dict_copiers
            .insert(type_name.to_string(), Rc::new(copier));
    }

    /// Builder-style [`Self::register`].
    pub fn with<F>(mut self, type_name: &str, copier: F) -> Self
    where
        F: Fn(&Value) -> Value + 'static,
    {
        self.register(type_name, copier);
        self
    }

    pub fn get(&self, type_name: &str) -> Option<&FnCopier> {
        self.dict_copiers.get(type_name)
    }

    pub fn len(&self) -> usize {
        self.dict_copiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dict_copiers.is_empty()
    }
}

impl fmt::Debug for SpecCopierRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut l_names: Vec<&str> = self.dict_copiers.keys().map(String::as_str).collect();
        l_names.sort_unstable();
        f.debug_struct("SpecCopierRegistry")
            .field("types", &l_names)
            .finish()
    }
}

/// Run the self-copy hook for `value`, if its concrete type has one.
pub(crate) fn invoke_copier(value: &Value, registry: &SpecCopierRegistry) -> Option<Value> {
    if let Value::Opaque(opaque) = value {
        if let Some(copier) = opaque.handle.as_deref().and_then(|h| h.as_copier()) {
            return Some(copier.deep_copy());
        }
    }
    if registry.is_empty() {
        return None;
    }
    registry
        .get(&value.type_name())
        .map(|copier| copier(value))
}
