// Zinc-type to C-type mapping, ARC statement snippets, and ZnValue
// boxing/unboxing for collection elements.

use super::CodeGenerator;
use crate::sema::{object_canonical, tuple_canonical};
use zinc_ast::{Type, TypeInfo, TypeKind};

impl<'a> CodeGenerator<'a> {
    /// The C spelling of a resolved type. Optional value kinds map to
    /// their tagged `ZnOpt_*` record; optional reference kinds stay
    /// plain pointers (null is "none").
    pub(crate) fn c_type(&self, ty: &Type) -> String {
        if ty.is_optional && !ty.is_reference() {
            return match ty.kind {
                TypeKind::Int => "ZnOpt_int".to_string(),
                TypeKind::Float => "ZnOpt_float".to_string(),
                TypeKind::Bool => "ZnOpt_bool".to_string(),
                TypeKind::Char => "ZnOpt_char".to_string(),
                TypeKind::Struct => match &ty.name {
                    Some(n) => format!("ZnOpt_{}", n),
                    None => "ZnOpt_int".to_string(),
                },
                _ => self.c_type(&ty.required()),
            };
        }
        match ty.kind {
            TypeKind::Int => "int64_t".to_string(),
            TypeKind::Float => "double".to_string(),
            TypeKind::Bool => "bool".to_string(),
            TypeKind::Char => "char".to_string(),
            TypeKind::Void => "void".to_string(),
            TypeKind::String => "ZnString *".to_string(),
            TypeKind::Array => "ZnArray *".to_string(),
            TypeKind::Hash => "ZnHash *".to_string(),
            TypeKind::Class => match &ty.name {
                Some(n) => format!("{} *", n),
                None => "void *".to_string(),
            },
            TypeKind::Struct => match &ty.name {
                Some(n) => n.clone(),
                None => "int64_t".to_string(),
            },
            // Unknown survives analysis only in empty untyped collections
            // whose elements are never touched.
            TypeKind::Unknown => "int64_t".to_string(),
        }
    }

    /// Declaration spelling: `c_type` plus a space when the type does
    /// not already end with `*`.
    pub(crate) fn c_decl(&self, ty: &Type, name: &str) -> String {
        let base = self.c_type(ty);
        if base.ends_with('*') {
            format!("{}{}", base, name)
        } else {
            format!("{} {}", base, name)
        }
    }

    /// Whether a binding of this type is tracked by an ARC scope: every
    /// reference kind, plus value structs that transitively contain
    /// reference fields.
    pub(crate) fn needs_arc(&self, ty: &Type) -> bool {
        if ty.is_reference() {
            return true;
        }
        if matches!(ty.kind, TypeKind::Struct) {
            return self.sema.registry.type_has_rc(&ty.required());
        }
        false
    }

    /// One statement retaining the value held in lvalue `expr`, or None
    /// when the type carries no references.
    pub(crate) fn retain_stmt(&self, expr: &str, ty: &Type) -> Option<String> {
        if ty.is_reference() {
            let f = match ty.kind {
                TypeKind::String => "__zn_str_retain".to_string(),
                TypeKind::Array => "__zn_arr_retain".to_string(),
                TypeKind::Hash => "__zn_hash_retain".to_string(),
                TypeKind::Class => format!("{}_retain", ty.name.as_deref().unwrap_or("__zn")),
                _ => return None,
            };
            return Some(format!("{}({});", f, expr));
        }
        if ty.kind == TypeKind::Struct && self.needs_arc(ty) {
            let name = ty.name.as_deref().unwrap_or_default();
            if ty.is_optional {
                return Some(format!(
                    "if ({e}._has) {n}_retain_fields(&{e}._val);",
                    e = expr,
                    n = name
                ));
            }
            return Some(format!("{}_retain_fields(&{});", name, expr));
        }
        None
    }

    /// One statement releasing the value held in lvalue `expr`, or None
    /// when the type carries no references. All release helpers are
    /// null-safe.
    pub(crate) fn release_stmt(&self, expr: &str, ty: &Type) -> Option<String> {
        if ty.is_reference() {
            let f = match ty.kind {
                TypeKind::String => "__zn_str_release".to_string(),
                TypeKind::Array => "__zn_arr_release".to_string(),
                TypeKind::Hash => "__zn_hash_release".to_string(),
                TypeKind::Class => format!("{}_release", ty.name.as_deref().unwrap_or("__zn")),
                _ => return None,
            };
            return Some(format!("{}({});", f, expr));
        }
        if ty.kind == TypeKind::Struct && self.needs_arc(ty) {
            let name = ty.name.as_deref().unwrap_or_default();
            if ty.is_optional {
                return Some(format!(
                    "if ({e}._has) {n}_release_fields(&{e}._val);",
                    e = expr,
                    n = name
                ));
            }
            return Some(format!("{}_release_fields(&{});", name, expr));
        }
        None
    }

    /// Box a C expression of the given type into a `ZnValue`. Struct
    /// values must already sit in an addressable lvalue.
    pub(crate) fn box_value(&self, expr: &str, ty: &Type) -> String {
        match ty.kind {
            TypeKind::Int => format!("__zn_val_int({})", expr),
            TypeKind::Float => format!("__zn_val_float({})", expr),
            TypeKind::Bool => format!("__zn_val_bool({})", expr),
            TypeKind::Char => format!("__zn_val_char({})", expr),
            TypeKind::String => format!("__zn_val_string({})", expr),
            TypeKind::Array => format!("__zn_val_array({})", expr),
            TypeKind::Hash => format!("__zn_val_hash({})", expr),
            TypeKind::Class => format!("__zn_val_ref({})", expr),
            TypeKind::Struct => format!(
                "__zn_val_val(__zn_memdup(&{}, sizeof({})))",
                expr,
                ty.name.as_deref().unwrap_or("int64_t")
            ),
            _ => format!("__zn_val_int({})", expr),
        }
    }

    /// Unbox a `ZnValue` expression back to the element's C type. Struct
    /// elements are dereferenced, yielding a copy.
    pub(crate) fn unbox_value(&self, expr: &str, ty: &Type) -> String {
        match ty.kind {
            TypeKind::Int => format!("__zn_val_as_int({})", expr),
            TypeKind::Float => format!("__zn_val_as_float({})", expr),
            TypeKind::Bool => format!("__zn_val_as_bool({})", expr),
            TypeKind::Char => format!("__zn_val_as_char({})", expr),
            TypeKind::String => format!("(ZnString *)__zn_val_as_ptr({})", expr),
            TypeKind::Array => format!("(ZnArray *)__zn_val_as_ptr({})", expr),
            TypeKind::Hash => format!("(ZnHash *)__zn_val_as_ptr({})", expr),
            TypeKind::Class => format!(
                "({} *)__zn_val_as_ptr({})",
                ty.name.as_deref().unwrap_or("void"),
                expr
            ),
            TypeKind::Struct => format!(
                "(*({} *)__zn_val_as_ptr({}))",
                ty.name.as_deref().unwrap_or("int64_t"),
                expr
            ),
            _ => format!("__zn_val_as_int({})", expr),
        }
    }

    /// The four callbacks a collection needs for elements of type `ty`:
    /// (retain, release, hash, equals). Primitive, string, and
    /// collection elements use the runtime's tag-dispatching defaults;
    /// struct/class elements use the generated per-type helpers.
    pub(crate) fn elem_callbacks(&self, ty: &Type) -> (String, String, String, String) {
        let default = (
            "__zn_default_retain".to_string(),
            "__zn_default_release".to_string(),
            "__zn_default_hashcode".to_string(),
            "__zn_default_equals".to_string(),
        );
        let name = match &ty.name {
            Some(n) => n.clone(),
            None => return default,
        };
        match ty.kind {
            TypeKind::Class => (
                format!("{}_retain_cb", name),
                format!("{}_release_cb", name),
                format!("{}_hash_cb", name),
                format!("{}_equals_cb", name),
            ),
            TypeKind::Struct => {
                let has_rc = self.sema.registry.struct_has_rc_fields(&name);
                (
                    if has_rc {
                        format!("{}_retain_cb", name)
                    } else {
                        "__zn_default_retain".to_string()
                    },
                    if has_rc {
                        format!("{}_release_cb", name)
                    } else {
                        "__zn_default_release".to_string()
                    },
                    format!("{}_hash_cb", name),
                    format!("{}_equals_cb", name),
                )
            }
            _ => default,
        }
    }

    /// Allocation call for an array of `elem` elements.
    pub(crate) fn array_alloc(&self, elem: &Type) -> String {
        let (retain, release, hash, equals) = self.elem_callbacks(elem);
        format!("__zn_arr_alloc({}, {}, {}, {})", retain, release, hash, equals)
    }

    /// Allocation call for a hash with `key`/`value` element types.
    pub(crate) fn hash_alloc(&self, key: &Type, value: &Type) -> String {
        let (kretain, krelease, khash, kequals) = self.elem_callbacks(key);
        let (vretain, vrelease, _, _) = self.elem_callbacks(value);
        format!(
            "__zn_hash_alloc({}, {}, {}, {}, {}, {})",
            khash, kequals, kretain, krelease, vretain, vrelease
        )
    }

    /// The generated C function name for a Zinc function. `main` is
    /// renamed so the unit can ship a standard `int main(void)` wrapper.
    pub(crate) fn c_fn_name(name: &str) -> &str {
        if name == "main" {
            "zn_main"
        } else {
            name
        }
    }

    /// Read-only annotation resolution for declaration emission. All
    /// named and anonymous types were registered during analysis, so
    /// this never mutates the registry; unresolvable names fall back to
    /// unknown (the tree is clean, this is defensive).
    pub(crate) fn resolve_annotation(&self, info: &TypeInfo) -> Type {
        let mut ty = match info.kind {
            TypeKind::Array => {
                let elem = info
                    .elem
                    .as_deref()
                    .map(|e| self.resolve_annotation(e))
                    .unwrap_or_else(|| Type::new(TypeKind::Unknown));
                Type::array(elem)
            }
            TypeKind::Hash => {
                let key = info
                    .key
                    .as_deref()
                    .map(|k| self.resolve_annotation(k))
                    .unwrap_or_else(|| Type::new(TypeKind::Unknown));
                let value = info
                    .elem
                    .as_deref()
                    .map(|v| self.resolve_annotation(v))
                    .unwrap_or_else(|| Type::new(TypeKind::Unknown));
                Type::hash(key, value)
            }
            TypeKind::Struct | TypeKind::Class => {
                if info.is_tuple {
                    let fields: Vec<(Option<String>, Type)> = info
                        .fields
                        .iter()
                        .map(|f| (f.name.clone(), self.resolve_annotation(&f.info)))
                        .collect();
                    Type::named(TypeKind::Struct, tuple_canonical(&fields))
                } else if info.is_object {
                    let fields: Vec<(String, Type)> = info
                        .fields
                        .iter()
                        .map(|f| {
                            (
                                f.name.clone().unwrap_or_default(),
                                self.resolve_annotation(&f.info),
                            )
                        })
                        .collect();
                    Type::named(TypeKind::Class, object_canonical(&fields))
                } else {
                    match info
                        .name
                        .as_deref()
                        .and_then(|n| self.sema.registry.get(n))
                    {
                        Some(def) => {
                            let kind = if def.is_class {
                                TypeKind::Class
                            } else {
                                TypeKind::Struct
                            };
                            Type::named(kind, def.name.clone())
                        }
                        None => Type::new(TypeKind::Unknown),
                    }
                }
            }
            kind => Type::new(kind),
        };
        if info.is_optional {
            ty.is_optional = true;
        }
        ty
    }
}
