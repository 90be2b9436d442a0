// Annotation resolution and anonymous-type registration.
//
// Canonical names carry the full structural identity of an anonymous
// type, so two occurrences of the same shape always resolve to the same
// registered definition, and the name doubles as the emitted C type
// name.

use super::{SemanticAnalyzer, StructDef, StructFieldDef};
use zinc_ast::{Type, TypeInfo, TypeKind};

/// `__ZnTuple` + `_<suffix>` per positional field, or `_<name>_<suffix>`
/// when all fields are named.
pub fn tuple_canonical(fields: &[(Option<String>, Type)]) -> String {
    let all_named = fields.iter().all(|(n, _)| n.is_some());
    let mut name = String::from("__ZnTuple");
    for (field_name, ty) in fields {
        match (all_named, field_name) {
            (true, Some(n)) => {
                name.push('_');
                name.push_str(n);
            }
            _ => {}
        }
        name.push('_');
        name.push_str(&ty.suffix());
    }
    name
}

/// `__obj` + `_<fieldname>_<suffix>` per field.
pub fn object_canonical(fields: &[(String, Type)]) -> String {
    let mut name = String::from("__obj");
    for (field_name, ty) in fields {
        name.push('_');
        name.push_str(field_name);
        name.push('_');
        name.push_str(&ty.suffix());
    }
    name
}

impl SemanticAnalyzer {
    /// Convert a parser-side annotation into a resolved type, registering
    /// any anonymous tuple/object types it describes.
    pub(crate) fn resolve_type_info(&mut self, info: &TypeInfo, line: u32) -> Type {
        let mut ty = match info.kind {
            TypeKind::Unknown
            | TypeKind::Int
            | TypeKind::Float
            | TypeKind::Bool
            | TypeKind::Char
            | TypeKind::Void
            | TypeKind::String => Type::new(info.kind),

            TypeKind::Array => {
                let elem = match &info.elem {
                    Some(e) => self.resolve_type_info(e, line),
                    None => Type::new(TypeKind::Unknown),
                };
                Type::array(elem)
            }

            TypeKind::Hash => {
                let key = match &info.key {
                    Some(k) => self.resolve_type_info(k, line),
                    None => Type::new(TypeKind::Unknown),
                };
                let value = match &info.elem {
                    Some(v) => self.resolve_type_info(v, line),
                    None => Type::new(TypeKind::Unknown),
                };
                Type::hash(key, value)
            }

            TypeKind::Struct | TypeKind::Class => {
                if info.is_tuple {
                    self.resolve_tuple_annotation(info, line)
                } else if info.is_object {
                    self.resolve_object_annotation(info, line)
                } else {
                    self.resolve_named(info, line)
                }
            }
        };

        if info.is_optional {
            ty.is_optional = true;
        }
        ty
    }

    /// A name referring to a class resolves to *class* kind even though
    /// the parser emitted *struct*.
    fn resolve_named(&mut self, info: &TypeInfo, line: u32) -> Type {
        let name = match &info.name {
            Some(n) => n.clone(),
            None => return Type::new(TypeKind::Unknown),
        };
        match self.registry.get(&name) {
            Some(def) => {
                let kind = if def.is_class {
                    TypeKind::Class
                } else {
                    TypeKind::Struct
                };
                Type::named(kind, name)
            }
            None => {
                self.error(line, format!("undefined type '{}'", name));
                Type::new(TypeKind::Unknown)
            }
        }
    }

    fn resolve_tuple_annotation(&mut self, info: &TypeInfo, line: u32) -> Type {
        let fields: Vec<(Option<String>, Type)> = info
            .fields
            .iter()
            .map(|f| (f.name.clone(), self.resolve_type_info(&f.info, line)))
            .collect();
        self.register_tuple_type(&fields)
    }

    fn resolve_object_annotation(&mut self, info: &TypeInfo, line: u32) -> Type {
        let fields: Vec<(String, Type)> = info
            .fields
            .iter()
            .map(|f| {
                (
                    f.name.clone().unwrap_or_default(),
                    self.resolve_type_info(&f.info, line),
                )
            })
            .collect();
        self.register_object_type(&fields)
    }

    /// Register (or re-use) the tuple type with the given component
    /// shape. Positional components are assigned the field names
    /// `_0, _1, …`.
    pub(crate) fn register_tuple_type(&mut self, fields: &[(Option<String>, Type)]) -> Type {
        let canonical = tuple_canonical(fields);
        if !self.registry.contains(&canonical) {
            let all_named = fields.iter().all(|(n, _)| n.is_some());
            let field_defs = fields
                .iter()
                .enumerate()
                .map(|(i, (name, ty))| {
                    let field_name = match (all_named, name) {
                        (true, Some(n)) => n.clone(),
                        _ => format!("_{}", i),
                    };
                    StructFieldDef::plain(field_name, ty.clone())
                })
                .collect();
            // Cannot collide: the canonical name was just probed.
            let _ = self.registry.register(StructDef {
                name: canonical.clone(),
                is_class: false,
                fields: field_defs,
            });
        }
        Type::named(TypeKind::Struct, canonical)
    }

    /// Register (or re-use) the anonymous object class with the given
    /// field shape. Object literals are classes: reference types with
    /// ARC.
    pub(crate) fn register_object_type(&mut self, fields: &[(String, Type)]) -> Type {
        let canonical = object_canonical(fields);
        if !self.registry.contains(&canonical) {
            let field_defs = fields
                .iter()
                .map(|(name, ty)| StructFieldDef::plain(name.clone(), ty.clone()))
                .collect();
            let _ = self.registry.register(StructDef {
                name: canonical.clone(),
                is_class: true,
                fields: field_defs,
            });
        }
        Type::named(TypeKind::Class, canonical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tuple_canonical_positional() {
        let fields = vec![
            (None, Type::new(TypeKind::Int)),
            (None, Type::new(TypeKind::String)),
        ];
        assert_eq!(tuple_canonical(&fields), "__ZnTuple_int_str");
    }

    #[test]
    fn test_tuple_canonical_named() {
        let fields = vec![
            (Some("x".to_string()), Type::new(TypeKind::Int)),
            (Some("y".to_string()), Type::new(TypeKind::Int)),
        ];
        assert_eq!(tuple_canonical(&fields), "__ZnTuple_x_int_y_int");
    }

    #[test]
    fn test_tuple_canonical_struct_component() {
        let fields = vec![
            (None, Type::named(TypeKind::Class, "P")),
            (None, Type::new(TypeKind::Array)),
        ];
        assert_eq!(tuple_canonical(&fields), "__ZnTuple_P_arr");
    }

    #[test]
    fn test_object_canonical() {
        let fields = vec![
            ("name".to_string(), Type::new(TypeKind::String)),
            ("age".to_string(), Type::new(TypeKind::Int)),
        ];
        assert_eq!(object_canonical(&fields), "__obj_name_str_age_int");
    }
}
