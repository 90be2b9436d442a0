// Type-layout emission: the generated header (typedefs, prototypes,
// extern declarations) and the per-type helper functions in the unit
// (class alloc/retain/release, value-struct field walkers, hashcode and
// equality helpers, collection callbacks).
//
// Order matters. Class tags come first so any type can hold a pointer
// to any class; value-type bodies follow, topologically sorted by
// by-value containment; class bodies after that; helper forward
// declarations precede all helper implementations because one type's
// release may call another's.

use super::CodeGenerator;
use crate::sema::StructDef;
use std::collections::HashSet;
use std::fmt::Write as _;
use zinc_ast::{NodeKind, Program, Type, TypeKind};

impl<'a> CodeGenerator<'a> {
    fn header_guard(&self) -> String {
        let mut guard = String::from("ZN_");
        for c in self.base.chars() {
            if c.is_ascii_alphanumeric() {
                guard.push(c.to_ascii_uppercase());
            } else {
                guard.push('_');
            }
        }
        guard.push_str("_H");
        guard
    }

    /// Value types (structs and tuples) ordered so every by-value field
    /// dependency is emitted before its user. Registration order breaks
    /// ties.
    fn value_types_in_order(&self) -> Vec<&StructDef> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        for def in self.sema.registry.iter().filter(|d| !d.is_class) {
            self.visit_value_type(def, &mut visited, &mut order);
        }
        order
    }

    fn visit_value_type<'s>(
        &'s self,
        def: &'s StructDef,
        visited: &mut HashSet<&'s str>,
        order: &mut Vec<&'s StructDef>,
    ) {
        if !visited.insert(def.name.as_str()) {
            return;
        }
        for field in &def.fields {
            if field.ty.kind == TypeKind::Struct {
                if let Some(dep) = field
                    .ty
                    .name
                    .as_deref()
                    .and_then(|n| self.sema.registry.get(n))
                {
                    if !dep.is_class {
                        self.visit_value_type(dep, visited, order);
                    }
                }
            }
        }
        order.push(def);
    }

    pub(crate) fn emit_header(&mut self, program: &Program) -> String {
        let guard = self.header_guard();
        let mut out = String::new();
        let _ = writeln!(out, "/* Generated by the Zinc compiler. Do not edit. */");
        let _ = writeln!(out, "#ifndef {}", guard);
        let _ = writeln!(out, "#define {}", guard);
        out.push('\n');
        let _ = writeln!(out, "#include \"zinc_runtime.h\"");
        out.push('\n');

        // Class tags: allow self-referential and forward-referenced
        // class pointers everywhere below.
        for def in self.sema.registry.iter().filter(|d| d.is_class) {
            let _ = writeln!(out, "typedef struct {} {};", def.name, def.name);
        }
        out.push('\n');

        // Value-type bodies, dependency-ordered, each with its tagged
        // optional record.
        for def in self.value_types_in_order() {
            let _ = writeln!(out, "typedef struct {{");
            for field in &def.fields {
                let _ = writeln!(out, "    {};", self.c_decl(&field.ty, &field.name));
            }
            let _ = writeln!(out, "}} {};", def.name);
            let _ = writeln!(
                out,
                "typedef struct {{ bool _has; {} _val; }} ZnOpt_{};",
                def.name, def.name
            );
            out.push('\n');
        }

        // Class bodies plus their ARC primitives.
        for def in self.sema.registry.iter().filter(|d| d.is_class) {
            let _ = writeln!(out, "struct {} {{", def.name);
            let _ = writeln!(out, "    int32_t _rc;");
            for field in &def.fields {
                let _ = writeln!(out, "    {};", self.c_decl(&field.ty, &field.name));
            }
            let _ = writeln!(out, "}};");
            let _ = writeln!(out, "{n} *{n}_alloc(void);", n = def.name);
            let _ = writeln!(out, "void {n}_retain({n} *self);", n = def.name);
            let _ = writeln!(out, "void {n}_release({n} *self);", n = def.name);
            out.push('\n');
        }

        // Field walkers for value types that carry references.
        for def in self.sema.registry.iter().filter(|d| !d.is_class) {
            if self.sema.registry.struct_has_rc_fields(&def.name) {
                let _ = writeln!(out, "void {n}_retain_fields({n} *v);", n = def.name);
                let _ = writeln!(out, "void {n}_release_fields({n} *v);", n = def.name);
            }
        }
        out.push('\n');

        // Extern declarations.
        for item in &program.items {
            if let NodeKind::ExternBlock { items } = &item.kind {
                for ext in items {
                    match &ext.kind {
                        NodeKind::ExternVar { name, annotation, .. } => {
                            let ty = self.resolve_annotation(annotation);
                            let _ = writeln!(out, "extern {};", self.c_decl(&ty, name));
                        }
                        NodeKind::ExternFunc { name, .. } => {
                            if let Some(sig) = self.sema.fn_sig(name) {
                                let _ = writeln!(out, "{};", self.fn_prototype(name, sig));
                            }
                        }
                        _ => {}
                    }
                }
            }
        }
        out.push('\n');

        // User function prototypes.
        for (name, sig) in &self.sema.functions {
            if !sig.is_extern {
                let _ = writeln!(out, "{};", self.fn_prototype(name, sig));
            }
        }
        out.push('\n');
        let _ = writeln!(out, "#endif /* {} */", guard);
        out
    }

    fn fn_prototype(&self, name: &str, sig: &crate::sema::FnSig) -> String {
        let params = if sig.params.is_empty() {
            "void".to_string()
        } else {
            sig.params
                .iter()
                .map(|(pname, pty)| self.c_decl(pty, pname))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let ret = self.c_type(&sig.ret);
        let sep = if ret.ends_with('*') { "" } else { " " };
        format!("{}{}{}({})", ret, sep, Self::c_fn_name(name), params)
    }

    pub(crate) fn emit_unit(&mut self, program: &Program) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "/* Generated by the Zinc compiler. Do not edit. */");
        let _ = writeln!(out, "#include \"{}.h\"", self.base);
        out.push('\n');

        // Helper forward declarations, one pass over every registered
        // type; implementations may reference each other freely below.
        for def in self.sema.registry.iter() {
            let n = &def.name;
            if def.is_class {
                let _ = writeln!(out, "uint32_t {n}_hashcode(const {n} *v);", n = n);
                let _ = writeln!(out, "bool {n}_equals(const {n} *a, const {n} *b);", n = n);
                let _ = writeln!(out, "void {}_retain_cb(void *v);", n);
                let _ = writeln!(out, "void {}_release_cb(void *v);", n);
            } else {
                let _ = writeln!(out, "uint32_t {n}_hashcode(const {n} *v);", n = n);
                let _ = writeln!(out, "bool {n}_equals(const {n} *a, const {n} *b);", n = n);
                if self.sema.registry.struct_has_rc_fields(n) {
                    let _ = writeln!(out, "void {}_retain_cb(void *v);", n);
                    let _ = writeln!(out, "void {}_release_cb(void *v);", n);
                }
            }
            let _ = writeln!(out, "uint32_t {}_hash_cb(const void *v);", n);
            let _ = writeln!(out, "bool {}_equals_cb(const void *a, const void *b);", n);
        }
        out.push('\n');

        // Implementations.
        for def in self.sema.registry.iter() {
            if def.is_class {
                self.emit_class_arc(def, &mut out);
            } else if self.sema.registry.struct_has_rc_fields(&def.name) {
                self.emit_struct_walkers(def, &mut out);
            }
            self.emit_hash_equals(def, &mut out);
            self.emit_callbacks(def, &mut out);
            out.push('\n');
        }

        // Static string literals.
        self.emit_string_statics(&mut out);
        out.push('\n');

        // Function bodies, in source order.
        let mut has_main = false;
        for item in &program.items {
            if let NodeKind::FuncDef { name, .. } = &item.kind {
                if name == "main" {
                    has_main = true;
                }
                self.emit_function(item, &mut out);
            }
        }

        if has_main {
            let ret = self
                .sema
                .fn_sig("main")
                .map(|s| s.ret.clone())
                .unwrap_or_else(|| Type::new(TypeKind::Void));
            out.push('\n');
            if ret.kind == TypeKind::Int && !ret.is_optional {
                let _ = writeln!(out, "int main(void) {{ return (int)zn_main(); }}");
            } else if ret.is_void() {
                let _ = writeln!(out, "int main(void) {{ zn_main(); return 0; }}");
            } else {
                let _ = writeln!(out, "int main(void) {{ (void)zn_main(); return 0; }}");
            }
        }
        out
    }

    /// alloc / retain / release for a class. Release walks reference
    /// fields (weak fields are skipped), recurses into value-type
    /// fields, then frees.
    fn emit_class_arc(&self, def: &StructDef, out: &mut String) {
        let n = &def.name;
        let _ = writeln!(
            out,
            "{n} *{n}_alloc(void) {{\n    {n} *self = ({n} *)calloc(1, sizeof({n}));\n    self->_rc = 1;\n    return self;\n}}",
            n = n
        );
        let _ = writeln!(
            out,
            "void {n}_retain({n} *self) {{\n    if (self) self->_rc++;\n}}",
            n = n
        );

        let mut body = String::new();
        for field in &def.fields {
            if field.is_weak {
                continue;
            }
            if let Some(rel) = self.release_stmt(&format!("self->{}", field.name), &field.ty) {
                let _ = writeln!(body, "    {}", rel);
            }
        }
        let _ = writeln!(
            out,
            "void {n}_release({n} *self) {{\n    if (!self) return;\n    if (--self->_rc > 0) return;\n{body}    free(self);\n}}",
            n = n,
            body = body
        );
    }

    /// Field-by-field retain/release for a value struct with reference
    /// content; these run when struct copies enter or leave scopes.
    fn emit_struct_walkers(&self, def: &StructDef, out: &mut String) {
        let n = &def.name;
        let mut retain = String::new();
        let mut release = String::new();
        for field in &def.fields {
            let expr = format!("v->{}", field.name);
            if let Some(stmt) = self.retain_stmt(&expr, &field.ty) {
                let _ = writeln!(retain, "    {}", stmt);
            }
            if let Some(stmt) = self.release_stmt(&expr, &field.ty) {
                let _ = writeln!(release, "    {}", stmt);
            }
        }
        let _ = writeln!(
            out,
            "void {n}_retain_fields({n} *v) {{\n{r}}}",
            n = n,
            r = retain
        );
        let _ = writeln!(
            out,
            "void {n}_release_fields({n} *v) {{\n{r}}}",
            n = n,
            r = release
        );
    }

    /// The djb2-style hash contribution of one field.
    fn hash_pattern(&self, expr: &str, ty: &Type) -> String {
        if ty.is_optional && !ty.is_reference() {
            return format!(
                "({e}._has ? {inner} : 0u)",
                e = expr,
                inner = self.hash_pattern(&format!("{}._val", expr), &ty.required())
            );
        }
        match ty.kind {
            TypeKind::Int => format!("__zn_hash_int({})", expr),
            TypeKind::Float => format!("__zn_hash_float({})", expr),
            TypeKind::Bool => format!("({} ? 1u : 0u)", expr),
            TypeKind::Char => format!("(uint32_t){}", expr),
            TypeKind::String => format!("__zn_str_hash({})", expr),
            // Reference fields other than strings hash by identity.
            TypeKind::Array | TypeKind::Hash | TypeKind::Class => {
                format!("(uint32_t)(uintptr_t){}", expr)
            }
            TypeKind::Struct => format!(
                "{}_hashcode(&{})",
                ty.name.as_deref().unwrap_or_default(),
                expr
            ),
            _ => format!("(uint32_t){}", expr),
        }
    }

    fn equals_pattern(&self, a: &str, b: &str, ty: &Type) -> String {
        if ty.is_optional && !ty.is_reference() {
            let inner = self.equals_pattern(
                &format!("{}._val", a),
                &format!("{}._val", b),
                &ty.required(),
            );
            return format!(
                "({a}._has == {b}._has && (!{a}._has || {inner}))",
                a = a,
                b = b,
                inner = inner
            );
        }
        match ty.kind {
            TypeKind::String => format!("__zn_str_equals({}, {})", a, b),
            TypeKind::Struct => format!(
                "{}_equals(&{}, &{})",
                ty.name.as_deref().unwrap_or_default(),
                a,
                b
            ),
            _ => format!("{} == {}", a, b),
        }
    }

    fn emit_hash_equals(&self, def: &StructDef, out: &mut String) {
        let n = &def.name;

        let mut hash_body = String::new();
        for field in &def.fields {
            let pattern = self.hash_pattern(&format!("v->{}", field.name), &field.ty);
            let _ = writeln!(hash_body, "    h = h * 33u + {};", pattern);
        }
        if def.is_class {
            let _ = writeln!(
                out,
                "uint32_t {n}_hashcode(const {n} *v) {{\n    if (!v) return 0u;\n    uint32_t h = 5381u;\n{body}    return h;\n}}",
                n = n,
                body = hash_body
            );
        } else {
            let _ = writeln!(
                out,
                "uint32_t {n}_hashcode(const {n} *v) {{\n    uint32_t h = 5381u;\n{body}    return h;\n}}",
                n = n,
                body = hash_body
            );
        }

        let mut eq_body = String::new();
        for field in &def.fields {
            let cmp = self.equals_pattern(
                &format!("a->{}", field.name),
                &format!("b->{}", field.name),
                &field.ty,
            );
            let _ = writeln!(eq_body, "    if (!({})) return false;", cmp);
        }
        if def.is_class {
            let _ = writeln!(
                out,
                "bool {n}_equals(const {n} *a, const {n} *b) {{\n    if (a == b) return true;\n    if (!a || !b) return false;\n{body}    return true;\n}}",
                n = n,
                body = eq_body
            );
        } else {
            let _ = writeln!(
                out,
                "bool {n}_equals(const {n} *a, const {n} *b) {{\n{body}    return true;\n}}",
                n = n,
                body = eq_body
            );
        }
    }

    /// The `void *`-taking callbacks handed to `__zn_arr_alloc` /
    /// `__zn_hash_alloc` when this type is a collection element. The
    /// argument points at the stored `ZnValue` slot.
    fn emit_callbacks(&self, def: &StructDef, out: &mut String) {
        let n = &def.name;
        if def.is_class {
            let _ = writeln!(
                out,
                "void {n}_retain_cb(void *v) {{ {n}_retain(({n} *)((ZnValue *)v)->as.ptr); }}",
                n = n
            );
            let _ = writeln!(
                out,
                "void {n}_release_cb(void *v) {{ {n}_release(({n} *)((ZnValue *)v)->as.ptr); }}",
                n = n
            );
        } else if self.sema.registry.struct_has_rc_fields(n) {
            let _ = writeln!(
                out,
                "void {n}_retain_cb(void *v) {{ {n}_retain_fields(({n} *)((ZnValue *)v)->as.ptr); }}",
                n = n
            );
            let _ = writeln!(
                out,
                "void {n}_release_cb(void *v) {{ {n} *p = ({n} *)((ZnValue *)v)->as.ptr; {n}_release_fields(p); free(p); }}",
                n = n
            );
        }
        let _ = writeln!(
            out,
            "uint32_t {n}_hash_cb(const void *v) {{ return {n}_hashcode((const {n} *)((const ZnValue *)v)->as.ptr); }}",
            n = n
        );
        let _ = writeln!(
            out,
            "bool {n}_equals_cb(const void *a, const void *b) {{ return {n}_equals((const {n} *)((const ZnValue *)a)->as.ptr, (const {n} *)((const ZnValue *)b)->as.ptr); }}",
            n = n
        );
    }
}
