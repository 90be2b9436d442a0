// Struct/class registry: user-defined types plus the anonymous
// tuple/object types the analyzer registers on first sight. Keyed by
// canonical name; insertion order is preserved because it drives the
// layout emitter's output order.

use std::collections::{HashMap, HashSet};
use zinc_ast::{Node, Type};

#[derive(Debug, Clone)]
pub struct StructFieldDef {
    pub name: String,
    pub ty: Type,
    pub has_default: bool,
    pub is_const: bool,
    pub is_weak: bool,
    pub default: Option<Node>,
}

impl StructFieldDef {
    pub fn plain(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            has_default: false,
            is_const: false,
            is_weak: false,
            default: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StructDef {
    pub name: String,
    pub is_class: bool,
    pub fields: Vec<StructFieldDef>,
}

impl StructDef {
    pub fn field(&self, name: &str) -> Option<&StructFieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Anonymous tuple/object types carry generated canonical names.
    pub fn is_anonymous_tuple(&self) -> bool {
        self.name.starts_with("__ZnTuple")
    }

    pub fn is_anonymous_object(&self) -> bool {
        self.name.starts_with("__obj")
    }
}

#[derive(Debug, Default)]
pub struct StructRegistry {
    index: HashMap<String, usize>,
    defs: Vec<StructDef>,
}

impl StructRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition. Fails when the canonical name is taken.
    pub fn register(&mut self, def: StructDef) -> Result<(), ()> {
        if self.index.contains_key(&def.name) {
            return Err(());
        }
        log::trace!("registering type '{}'", def.name);
        self.index.insert(def.name.clone(), self.defs.len());
        self.defs.push(def);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&StructDef> {
        self.index.get(name).map(|&i| &self.defs[i])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut StructDef> {
        let i = *self.index.get(name)?;
        self.defs.get_mut(i)
    }

    /// Definitions in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &StructDef> {
        self.defs.iter()
    }

    /// Whether values of type `ty` transitively contain reference-kind
    /// fields, i.e. whether a value-type binding of this type needs a
    /// field-by-field release on scope exit.
    pub fn type_has_rc(&self, ty: &Type) -> bool {
        if ty.is_reference() {
            return true;
        }
        match &ty.name {
            Some(name) => self.struct_has_rc_fields(name),
            None => false,
        }
    }

    pub fn struct_has_rc_fields(&self, name: &str) -> bool {
        let mut visited = HashSet::new();
        self.has_rc_fields_inner(name, &mut visited)
    }

    fn has_rc_fields_inner<'a>(&'a self, name: &'a str, visited: &mut HashSet<&'a str>) -> bool {
        if !visited.insert(name) {
            return false;
        }
        let def = match self.get(name) {
            Some(d) => d,
            None => return false,
        };
        def.fields.iter().any(|f| {
            if f.ty.is_reference() {
                return true;
            }
            match &f.ty.name {
                Some(inner) => self.has_rc_fields_inner(inner, visited),
                None => false,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zinc_ast::TypeKind;

    #[test]
    fn test_insertion_order_preserved() {
        let mut reg = StructRegistry::new();
        for name in ["B", "A", "C"] {
            reg.register(StructDef {
                name: name.to_string(),
                is_class: false,
                fields: vec![],
            })
            .unwrap();
        }
        let order: Vec<&str> = reg.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(order, vec!["B", "A", "C"]);
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut reg = StructRegistry::new();
        let def = StructDef {
            name: "P".to_string(),
            is_class: true,
            fields: vec![],
        };
        reg.register(def.clone()).unwrap();
        assert!(reg.register(def).is_err());
    }

    #[test]
    fn test_transitive_rc_detection() {
        let mut reg = StructRegistry::new();
        reg.register(StructDef {
            name: "Inner".to_string(),
            is_class: false,
            fields: vec![StructFieldDef::plain("s", Type::new(TypeKind::String))],
        })
        .unwrap();
        reg.register(StructDef {
            name: "Outer".to_string(),
            is_class: false,
            fields: vec![StructFieldDef::plain(
                "inner",
                Type::named(TypeKind::Struct, "Inner"),
            )],
        })
        .unwrap();
        reg.register(StructDef {
            name: "Plain".to_string(),
            is_class: false,
            fields: vec![StructFieldDef::plain("n", Type::new(TypeKind::Int))],
        })
        .unwrap();

        assert!(reg.struct_has_rc_fields("Inner"));
        assert!(reg.struct_has_rc_fields("Outer"));
        assert!(!reg.struct_has_rc_fields("Plain"));
    }
}
