//! Name lookup for kinds and classes.
//!
//! Forward-typed members resolve their kind by name at first use; the
//! registry is the usual target of those lookups. It starts populated with
//! the builtin kinds.

use indexmap::IndexMap;
use memberkit_core::{builtin_kinds, Kind, MemberError, Result};

use crate::class::Class;

/// Registered kinds and classes, keyed by name.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    kinds: IndexMap<String, Kind>,
    classes: IndexMap<String, Class>,
}

impl TypeRegistry {
    /// A registry holding the builtin kinds.
    pub fn new() -> Self {
        let kinds = builtin_kinds()
            .into_iter()
            .map(|kind| (kind.name().to_string(), kind))
            .collect();
        Self {
            kinds,
            classes: IndexMap::new(),
        }
    }

    /// Register a plain kind.
    ///
    /// # Errors
    ///
    /// Returns `MemberError::Declaration` if the name is taken.
    pub fn register_kind(&mut self, kind: Kind) -> Result<()> {
        self.claim(kind.name())?;
        self.kinds.insert(kind.name().to_string(), kind);
        Ok(())
    }

    /// Register a class under its name, along with its kind.
    ///
    /// # Errors
    ///
    /// Returns `MemberError::Declaration` if the name is taken.
    pub fn register_class(&mut self, class: Class) -> Result<()> {
        self.claim(class.name())?;
        tracing::debug!(class = %class.name(), "class registered");
        self.kinds.insert(class.name().to_string(), class.kind().clone());
        self.classes.insert(class.name().to_string(), class);
        Ok(())
    }

    /// Look up a kind by name.
    pub fn kind(&self, name: &str) -> Option<&Kind> {
        self.kinds.get(name)
    }

    /// Look up a class by name.
    pub fn class(&self, name: &str) -> Option<&Class> {
        self.classes.get(name)
    }

    /// The class whose instances have `kind`, if registered.
    pub fn class_of(&self, kind: &Kind) -> Option<&Class> {
        self.classes.values().find(|class| class.kind() == kind)
    }

    /// Registered classes in registration order.
    pub fn classes(&self) -> impl Iterator<Item = &Class> {
        self.classes.values()
    }

    /// Resolve a kind by name.
    ///
    /// # Errors
    ///
    /// Returns `MemberError::Unresolved` if nothing is registered under `name`.
    pub fn resolve(&self, name: &str) -> Result<Kind> {
        self.kind(name)
            .cloned()
            .ok_or_else(|| MemberError::Unresolved(format!("no type named '{name}' is registered")))
    }

    fn claim(&self, name: &str) -> Result<()> {
        if self.kinds.contains_key(name) {
            return Err(MemberError::Declaration(format!(
                "a type named '{name}' is already registered"
            )));
        }
        Ok(())
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::ClassBuilder;

    #[test]
    fn builtins_are_preloaded() {
        let registry = TypeRegistry::new();
        assert_eq!(registry.resolve("int").unwrap(), Kind::int());
        assert_eq!(registry.resolve("datetime").unwrap(), Kind::datetime());
        assert!(matches!(registry.resolve("Missing"), Err(MemberError::Unresolved(_))));
    }

    #[test]
    fn classes_register_their_kind() {
        let mut registry = TypeRegistry::new();
        let class = ClassBuilder::new("Node").build().unwrap();
        registry.register_class(class.clone()).unwrap();
        assert_eq!(registry.resolve("Node").unwrap(), *class.kind());
        assert_eq!(registry.class_of(class.kind()), Some(&class));
        assert_eq!(registry.classes().count(), 1);
    }

    #[test]
    fn names_are_unique() {
        let mut registry = TypeRegistry::new();
        assert!(registry.register_kind(Kind::opaque("int", &[])).is_err());
        registry.register_kind(Kind::opaque("Token", &[])).unwrap();
        let clash = ClassBuilder::new("Token").build().unwrap();
        assert!(matches!(
            registry.register_class(clash),
            Err(MemberError::Declaration(_))
        ));
    }
}
