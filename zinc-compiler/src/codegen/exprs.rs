// Expression lowering to C expressions. Anything that needs internal
// statements (retain/release dances, allocation plus field stores)
// becomes a GNU statement expression.

use super::strings::c_char_escape;
use super::{CodeBuf, CodeGenerator};
use zinc_ast::*;

impl<'a> CodeGenerator<'a> {
    pub(crate) fn emit_expr(&mut self, node: &Node) -> String {
        match &node.kind {
            NodeKind::IntLit(v) => format!("{}", v),
            NodeKind::FloatLit(v) => format!("{:?}", v),
            NodeKind::BoolLit(b) => b.to_string(),
            NodeKind::CharLit(c) => format!("'{}'", c_char_escape(*c)),
            NodeKind::StrLit { string_id, .. } => {
                self.string_literal_expr(string_id.unwrap_or(0))
            }
            NodeKind::Ident(name) => self.emit_ident(name),
            NodeKind::Binary { .. } => self.emit_binary(node),
            NodeKind::Unary { op, expr } => {
                format!("({}{})", op.symbol(), self.emit_expr(expr))
            }
            NodeKind::OptionalCheck { .. } => self.emit_optional_check(node),
            NodeKind::Call { .. } => self.emit_call(node),
            NodeKind::FieldAccess { .. } => self.emit_field_access(node),
            NodeKind::Index { .. } => self.emit_index(node),
            NodeKind::If { .. } => self.emit_if_value(node),
            NodeKind::While { .. } => self.emit_while_value(node),
            NodeKind::For { .. } => self.emit_for_value(node),
            NodeKind::Tuple { .. } => self.emit_tuple_value(node),
            NodeKind::ObjectLit { .. } => self.emit_object_value(node),
            NodeKind::ArrayLit { .. } | NodeKind::TypedEmptyArray { .. } => {
                self.emit_array_value(node)
            }
            NodeKind::HashLit { .. } | NodeKind::TypedEmptyHash { .. } => {
                self.emit_hash_value(node)
            }
            NodeKind::NamedArg { value, .. } => self.emit_expr(value),
            // Value-position `x++` keeps C's yield-the-old-value
            // semantics for plain lvalues.
            NodeKind::Postfix { op, target }
                if matches!(
                    target.kind,
                    NodeKind::Ident(_) | NodeKind::FieldAccess { .. }
                ) =>
            {
                let lvalue = self.emit_expr(target);
                let op = match op {
                    PostfixOp::Increment => "++",
                    PostfixOp::Decrement => "--",
                };
                format!("({}{})", lvalue, op)
            }
            // Statement-shaped nodes in value position are void-typed;
            // evaluate them for effect.
            _ => {
                let mut buf = CodeBuf::new_inline();
                self.emit_stmt(node, &mut buf);
                format!("({{ {} (void)0; }})", buf.buf)
            }
        }
    }

    /// Identifier reference. Inside a narrowed then-branch, a narrowed
    /// value-kind optional unwraps through its tagged record.
    pub(crate) fn emit_ident(&self, name: &str) -> String {
        if self.narrowed.iter().any(|n| n == name) {
            format!("{}._val", name)
        } else {
            name.to_string()
        }
    }

    fn emit_binary(&mut self, node: &Node) -> String {
        let (op, lhs, rhs) = match &node.kind {
            NodeKind::Binary { op, lhs, rhs } => (*op, lhs, rhs),
            _ => return String::new(),
        };

        if op == BinaryOp::Add && node.ty().kind == TypeKind::String {
            return self.emit_concat(node);
        }
        if op.is_comparison()
            && lhs.ty().kind == TypeKind::String
            && rhs.ty().kind == TypeKind::String
        {
            return self.emit_string_compare(op, lhs, rhs);
        }

        let l = self.emit_expr(lhs);
        let r = self.emit_expr(rhs);

        // C's `%` is integer-only; float modulo goes through fmod.
        if op == BinaryOp::Mod && node.ty().kind == TypeKind::Float {
            return format!("fmod({}, {})", l, r);
        }
        format!("({} {} {})", l, op.symbol(), r)
    }

    fn emit_optional_check(&mut self, node: &Node) -> String {
        let expr = match &node.kind {
            NodeKind::OptionalCheck { expr } => expr,
            _ => return String::new(),
        };
        let ty = expr.ty();
        let e = self.emit_expr(expr);

        if ty.is_reference() {
            if expr.is_fresh_alloc {
                let mut buf = CodeBuf::new_inline();
                let t = self.fresh_tmp("opt");
                let b = self.fresh_tmp("opt");
                buf.stmt(&format!("{} = {};", self.c_decl(&ty, &t), e));
                buf.stmt(&format!("bool {} = ({} != NULL);", b, t));
                if let Some(rel) = self.release_stmt(&t, &ty) {
                    buf.stmt(&rel);
                }
                return format!("({{ {} {}; }})", buf.buf, b);
            }
            format!("({} != NULL)", e)
        } else {
            format!("({})._has", e)
        }
    }

    fn emit_field_access(&mut self, node: &Node) -> String {
        let (base, field) = match &node.kind {
            NodeKind::FieldAccess { base, field, .. } => (base, field.clone()),
            _ => return String::new(),
        };
        let base_ty = base.ty();
        let result_ty = node.ty();

        let accessor = |b: &str| -> String {
            if field == "length" {
                match base_ty.kind {
                    TypeKind::String => return format!("(int64_t)({})->_len", b),
                    TypeKind::Array => return format!("__zn_arr_len({})", b),
                    TypeKind::Hash => return format!("__zn_hash_len({})", b),
                    _ => {}
                }
            }
            let sep = if base_ty.kind == TypeKind::Class {
                "->"
            } else {
                "."
            };
            format!("({}){}{}", b, sep, field)
        };

        if !base.is_fresh_alloc {
            let b = self.emit_expr(base);
            return accessor(&b);
        }

        // Fresh base: capture it, read the field (retaining a
        // reference-carrying result before the base goes away), then
        // release the base.
        let mut buf = CodeBuf::new_inline();
        let bt = self.fresh_tmp("b");
        let vt = self.fresh_tmp("v");
        let base_expr = self.emit_expr(base);
        buf.stmt(&format!("{} = {};", self.c_decl(&base_ty, &bt), base_expr));
        buf.stmt(&format!(
            "{} = {};",
            self.c_decl(&result_ty, &vt),
            accessor(&bt)
        ));
        if let Some(ret) = self.retain_stmt(&vt, &result_ty) {
            buf.stmt(&ret);
        }
        if let Some(rel) = self.release_stmt(&bt, &base_ty) {
            buf.stmt(&rel);
        }
        format!("({{ {} {}; }})", buf.buf, vt)
    }

    fn emit_index(&mut self, node: &Node) -> String {
        let (base, index) = match &node.kind {
            NodeKind::Index { base, index } => (base, index),
            _ => return String::new(),
        };
        let base_ty = base.ty();
        let index_ty = index.ty();
        let result_ty = node.ty();

        let key_is_struct =
            base_ty.kind == TypeKind::Hash && index_ty.kind == TypeKind::Struct;
        let needs_wrap = base.is_fresh_alloc || index.is_fresh_alloc || key_is_struct;

        if !needs_wrap {
            let b = self.emit_expr(base);
            let i = self.emit_expr(index);
            return self.index_accessor(&base_ty, &result_ty, &index_ty, &b, &i);
        }

        let mut buf = CodeBuf::new_inline();
        let bt = self.fresh_tmp("b");
        let it = self.fresh_tmp("i");
        let vt = self.fresh_tmp("v");
        let base_expr = self.emit_expr(base);
        let index_expr = self.emit_expr(index);
        buf.stmt(&format!("{} = {};", self.c_decl(&base_ty, &bt), base_expr));
        buf.stmt(&format!("{} = {};", self.c_decl(&index_ty, &it), index_expr));
        let access = self.index_accessor(&base_ty, &result_ty, &index_ty, &bt, &it);
        buf.stmt(&format!("{} = {};", self.c_decl(&result_ty, &vt), access));
        if let Some(ret) = self.retain_stmt(&vt, &result_ty) {
            buf.stmt(&ret);
        }
        if base.is_fresh_alloc {
            if let Some(rel) = self.release_stmt(&bt, &base_ty) {
                buf.stmt(&rel);
            }
        }
        if index.is_fresh_alloc {
            if let Some(rel) = self.release_stmt(&it, &index_ty) {
                buf.stmt(&rel);
            }
        }
        format!("({{ {} {}; }})", buf.buf, vt)
    }

    fn index_accessor(
        &self,
        base_ty: &Type,
        result_ty: &Type,
        index_ty: &Type,
        b: &str,
        i: &str,
    ) -> String {
        match base_ty.kind {
            TypeKind::String => format!("({})->_data[{}]", b, i),
            TypeKind::Array => {
                self.unbox_value(&format!("__zn_arr_get({}, {})", b, i), result_ty)
            }
            TypeKind::Hash => {
                let boxed = self.box_value(i, index_ty);
                self.unbox_value(&format!("__zn_hash_get({}, {})", b, boxed), result_ty)
            }
            _ => format!("({})->_data[{}]", b, i),
        }
    }

    // ==================== Calls ====================

    fn emit_call(&mut self, node: &Node) -> String {
        let (callee, args, is_struct_init) = match &node.kind {
            NodeKind::Call {
                callee,
                args,
                is_struct_init,
            } => (callee.clone(), args, *is_struct_init),
            _ => return String::new(),
        };

        if is_struct_init {
            return self.emit_instantiation(&callee, args);
        }
        match callee.as_str() {
            "print" => self.emit_print(args),
            "push" => self.emit_push(args),
            _ => self.emit_user_call(&callee, args, node),
        }
    }

    fn emit_print(&mut self, args: &[Node]) -> String {
        let arg = match args.first() {
            Some(a) => a,
            None => return "__zn_print(NULL)".to_string(),
        };
        let e = self.emit_expr(arg);
        if !arg.is_fresh_alloc {
            return format!("__zn_print({})", e);
        }
        let t = self.fresh_tmp("pr");
        format!(
            "({{ ZnString *{t} = {e}; __zn_print({t}); __zn_str_release({t}); }})",
            t = t,
            e = e
        )
    }

    fn emit_push(&mut self, args: &[Node]) -> String {
        let (arr, value) = match args {
            [arr, value] => (arr, value),
            _ => return "(void)0".to_string(),
        };
        let arr_ty = arr.ty();
        let value_ty = value.ty();

        let mut buf = CodeBuf::new_inline();
        let at = self.fresh_tmp("arr");
        let et = self.fresh_tmp("e");
        let arr_expr = self.emit_expr(arr);
        let value_expr = self.emit_expr(value);
        buf.stmt(&format!("ZnArray *{} = {};", at, arr_expr));
        buf.stmt(&format!("{} = {};", self.c_decl(&value_ty, &et), value_expr));
        let boxed = self.box_value(&et, &value_ty);
        // The runtime retains on insert; a fresh value's temporary is
        // released afterwards, leaving the net refcount unchanged.
        buf.stmt(&format!("__zn_arr_push({}, {});", at, boxed));
        if value.is_fresh_alloc {
            if let Some(rel) = self.release_stmt(&et, &value_ty) {
                buf.stmt(&rel);
            }
        }
        if arr.is_fresh_alloc {
            if let Some(rel) = self.release_stmt(&at, &arr_ty) {
                buf.stmt(&rel);
            }
        }
        format!("({{ {} }})", buf.buf)
    }

    fn emit_user_call(&mut self, callee: &str, args: &[Node], node: &Node) -> String {
        let sig = self.sema.fn_sig(callee).cloned();
        let param_types: Vec<Option<Type>> = match &sig {
            Some(sig) => sig.params.iter().map(|(_, t)| Some(t.clone())).collect(),
            None => vec![None; args.len()],
        };
        let c_name = Self::c_fn_name(callee).to_string();
        let ret_ty = node.ty();

        let needs_temp: Vec<bool> = args
            .iter()
            .map(|a| a.is_fresh_alloc && self.needs_arc(&a.ty()))
            .collect();

        if !needs_temp.iter().any(|&b| b) {
            let arg_strs: Vec<String> = args
                .iter()
                .zip(param_types.iter().chain(std::iter::repeat(&None)))
                .map(|(arg, param)| {
                    let e = self.emit_expr(arg);
                    self.wrap_optional_arg(e, &arg.ty(), param.as_ref())
                })
                .collect();
            return format!("{}({})", c_name, arg_strs.join(", "));
        }

        // Fresh reference arguments are captured so they can be released
        // after the call; the callee borrows, it does not consume.
        let mut buf = CodeBuf::new_inline();
        let mut arg_strs = Vec::new();
        let mut temps: Vec<(String, Type)> = Vec::new();
        for (i, arg) in args.iter().enumerate() {
            let e = self.emit_expr(arg);
            let param = param_types.get(i).and_then(|p| p.as_ref());
            if needs_temp[i] {
                let t = self.fresh_tmp("a");
                buf.stmt(&format!("{} = {};", self.c_decl(&arg.ty(), &t), e));
                arg_strs.push(self.wrap_optional_arg(t.clone(), &arg.ty(), param));
                temps.push((t, arg.ty()));
            } else {
                arg_strs.push(self.wrap_optional_arg(e, &arg.ty(), param));
            }
        }

        let call = format!("{}({})", c_name, arg_strs.join(", "));
        if ret_ty.is_void() {
            buf.stmt(&format!("{};", call));
            for (t, ty) in &temps {
                if let Some(rel) = self.release_stmt(t, ty) {
                    buf.stmt(&rel);
                }
            }
            format!("({{ {} }})", buf.buf)
        } else {
            let rt = self.fresh_tmp("r");
            buf.stmt(&format!("{} = {};", self.c_decl(&ret_ty, &rt), call));
            for (t, ty) in &temps {
                if let Some(rel) = self.release_stmt(t, ty) {
                    buf.stmt(&rel);
                }
            }
            format!("({{ {} {}; }})", buf.buf, rt)
        }
    }

    /// A non-optional value passed where an optional value kind is
    /// expected wraps into the tagged record at the call site. Reference
    /// kinds share a representation with their optionals.
    fn wrap_optional_arg(&self, expr: String, arg_ty: &Type, param: Option<&Type>) -> String {
        let param = match param {
            Some(p) => p,
            None => return expr,
        };
        if param.is_optional
            && !param.is_reference()
            && !arg_ty.is_optional
            && !arg_ty.is_unknown()
        {
            return format!(
                "(({}){{ ._has = true, ._val = {} }})",
                self.c_type(param),
                expr
            );
        }
        expr
    }

    // ==================== Instantiation and composite literals ====================

    fn emit_instantiation(&mut self, callee: &str, args: &[Node]) -> String {
        let def = match self.sema.registry.get(callee) {
            Some(d) => d.clone(),
            None => return "0".to_string(),
        };

        let supplied: Vec<(&str, &Node)> = args
            .iter()
            .filter_map(|a| match &a.kind {
                NodeKind::NamedArg { name, value } => Some((name.as_str(), value.as_ref())),
                _ => None,
            })
            .collect();

        let mut buf = CodeBuf::new_inline();
        let (var, access): (String, fn(&str, &str) -> String) = if def.is_class {
            let var = self.fresh_tmp("new");
            buf.stmt(&format!("{} *{} = {}_alloc();", def.name, var, def.name));
            (var, |v, f| format!("{}->{}", v, f))
        } else {
            let var = self.fresh_tmp("s");
            buf.stmt(&format!("{} {};", def.name, var));
            (var, |v, f| format!("{}.{}", v, f))
        };

        for field in &def.fields {
            let target = access(&var, &field.name);
            let value = supplied
                .iter()
                .find(|(n, _)| *n == field.name)
                .map(|(_, v)| *v);
            match (value, &field.default) {
                (Some(value), _) => {
                    self.emit_field_store(&mut buf, &target, &field.ty, value, field.is_weak)
                }
                (None, Some(default)) => {
                    let default = default.clone();
                    self.emit_field_store(&mut buf, &target, &field.ty, &default, field.is_weak)
                }
                (None, None) => {
                    // Unsupplied weak class fields; the calloc'd object
                    // is already zeroed, but value structs need it
                    // explicitly.
                    if !def.is_class {
                        buf.stmt(&format!(
                            "memset(&{}, 0, sizeof {});",
                            target, target
                        ));
                    }
                }
            }
        }

        format!("({{ {} {}; }})", buf.buf, var)
    }

    /// Store an expression into a freshly allocated object/struct field:
    /// retain unless the value is fresh (ownership transfers), never
    /// retain into weak fields, wrap optionals as needed.
    fn emit_field_store(
        &mut self,
        buf: &mut CodeBuf,
        target: &str,
        field_ty: &Type,
        value: &Node,
        weak: bool,
    ) {
        let value_ty = value.ty();
        let e = self.emit_expr(value);
        let wrap = field_ty.is_optional
            && !field_ty.is_reference()
            && !value_ty.is_optional
            && !value_ty.is_unknown();

        if wrap {
            buf.stmt(&format!("{}._has = true;", target));
            buf.stmt(&format!("{}._val = {};", target, e));
            if !weak && !value.is_fresh_alloc {
                if let Some(ret) =
                    self.retain_stmt(&format!("{}._val", target), &field_ty.required())
                {
                    buf.stmt(&ret);
                }
            }
        } else {
            buf.stmt(&format!("{} = {};", target, e));
            if !weak && !value.is_fresh_alloc {
                if let Some(ret) = self.retain_stmt(target, field_ty) {
                    buf.stmt(&ret);
                }
            }
        }
    }

    fn emit_tuple_value(&mut self, node: &Node) -> String {
        let elems = match &node.kind {
            NodeKind::Tuple { elems } => elems,
            _ => return String::new(),
        };
        let ty = node.ty();
        let def = match ty.name.as_deref().and_then(|n| self.sema.registry.get(n)) {
            Some(d) => d.clone(),
            None => return "0".to_string(),
        };

        let mut buf = CodeBuf::new_inline();
        let var = self.fresh_tmp("t");
        buf.stmt(&format!("{} {};", def.name, var));
        for (field, elem) in def.fields.iter().zip(elems.iter()) {
            let target = format!("{}.{}", var, field.name);
            self.emit_field_store(&mut buf, &target, &field.ty, &elem.value, false);
        }
        format!("({{ {} {}; }})", buf.buf, var)
    }

    fn emit_object_value(&mut self, node: &Node) -> String {
        let fields = match &node.kind {
            NodeKind::ObjectLit { fields } => fields,
            _ => return String::new(),
        };
        let ty = node.ty();
        let def = match ty.name.as_deref().and_then(|n| self.sema.registry.get(n)) {
            Some(d) => d.clone(),
            None => return "0".to_string(),
        };

        let mut buf = CodeBuf::new_inline();
        let var = self.fresh_tmp("new");
        buf.stmt(&format!("{} *{} = {}_alloc();", def.name, var, def.name));
        for field in &def.fields {
            if let Some((_, value)) = fields.iter().find(|(n, _)| *n == field.name) {
                let target = format!("{}->{}", var, field.name);
                self.emit_field_store(&mut buf, &target, &field.ty, value, false);
            }
        }
        format!("({{ {} {}; }})", buf.buf, var)
    }

    fn emit_array_value(&mut self, node: &Node) -> String {
        let ty = node.ty();
        let elem_ty = ty
            .elem
            .as_deref()
            .cloned()
            .unwrap_or_else(|| Type::new(TypeKind::Unknown));

        let mut buf = CodeBuf::new_inline();
        let var = self.fresh_tmp("arr");
        buf.stmt(&format!(
            "ZnArray *{} = {};",
            var,
            self.array_alloc(&elem_ty)
        ));

        if let NodeKind::ArrayLit { elems } = &node.kind {
            for elem in elems {
                self.emit_insert(&mut buf, elem, &elem_ty, |boxed| {
                    format!("__zn_arr_push({}, {});", var, boxed)
                });
            }
        }
        format!("({{ {} {}; }})", buf.buf, var)
    }

    fn emit_hash_value(&mut self, node: &Node) -> String {
        let ty = node.ty();
        let key_ty = ty
            .key
            .as_deref()
            .cloned()
            .unwrap_or_else(|| Type::new(TypeKind::Unknown));
        let value_ty = ty
            .elem
            .as_deref()
            .cloned()
            .unwrap_or_else(|| Type::new(TypeKind::Unknown));

        let mut buf = CodeBuf::new_inline();
        let var = self.fresh_tmp("hash");
        buf.stmt(&format!(
            "ZnHash *{} = {};",
            var,
            self.hash_alloc(&key_ty, &value_ty)
        ));

        if let NodeKind::HashLit { pairs } = &node.kind {
            for (key, value) in pairs {
                let kt = self.fresh_tmp("k");
                let vt = self.fresh_tmp("e");
                let key_expr = self.emit_expr(key);
                let value_expr = self.emit_expr(value);
                buf.stmt(&format!("{} = {};", self.c_decl(&key_ty, &kt), key_expr));
                buf.stmt(&format!("{} = {};", self.c_decl(&value_ty, &vt), value_expr));
                let boxed_k = self.box_value(&kt, &key_ty);
                let boxed_v = self.box_value(&vt, &value_ty);
                buf.stmt(&format!("__zn_hash_set({}, {}, {});", var, boxed_k, boxed_v));
                if key.is_fresh_alloc {
                    if let Some(rel) = self.release_stmt(&kt, &key_ty) {
                        buf.stmt(&rel);
                    }
                }
                if value.is_fresh_alloc {
                    if let Some(rel) = self.release_stmt(&vt, &value_ty) {
                        buf.stmt(&rel);
                    }
                }
            }
        }
        format!("({{ {} {}; }})", buf.buf, var)
    }

    /// Insert one element into a collection: evaluate into a temporary
    /// (collections box by value and the runtime retains on insert),
    /// then release the temporary when the element was fresh.
    fn emit_insert<F>(&mut self, buf: &mut CodeBuf, value: &Node, elem_ty: &Type, insert: F)
    where
        F: Fn(&str) -> String,
    {
        let value_ty = value.ty();
        let store_ty = if value_ty.is_unknown() { elem_ty } else { &value_ty };

        // Simple non-owning values can be boxed in place.
        let simple = !value.is_fresh_alloc && store_ty.kind != TypeKind::Struct;
        if simple {
            let e = self.emit_expr(value);
            let boxed = self.box_value(&e, store_ty);
            buf.stmt(&insert(&boxed));
            return;
        }

        let t = self.fresh_tmp("e");
        let e = self.emit_expr(value);
        buf.stmt(&format!("{} = {};", self.c_decl(store_ty, &t), e));
        let boxed = self.box_value(&t, store_ty);
        buf.stmt(&insert(&boxed));
        if value.is_fresh_alloc {
            if let Some(rel) = self.release_stmt(&t, store_ty) {
                buf.stmt(&rel);
            }
        }
    }
}
