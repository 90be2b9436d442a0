// Expression-level analysis rules.

use super::{SemanticAnalyzer, Symbol};
use zinc_ast::*;
use zinc_diagnostics::suggest_name;

/// Where a struct-field lvalue chain bottoms out.
enum StructRoot<'a> {
    /// A plain struct binding; `let`-bound roots reject mutation.
    Binding(&'a str),
    /// The chain passes through a class reference; mutation goes to the
    /// heap object and binding constness does not apply.
    ThroughReference,
    /// The chain starts at a temporary (call result, element copy);
    /// mutating it would mutate a copy.
    Temporary,
}

impl SemanticAnalyzer {
    /// Analyze one node, attaching its resolved type. Re-analysis is a
    /// no-op: resolved types are cached on the node.
    pub fn analyze_node(&mut self, node: &mut Node) -> Type {
        if let Some(ty) = &node.resolved_type {
            return ty.clone();
        }

        match &node.kind {
            NodeKind::IntLit(_) => self.finish(node, Type::new(TypeKind::Int)),
            NodeKind::FloatLit(_) => self.finish(node, Type::new(TypeKind::Float)),
            NodeKind::BoolLit(_) => self.finish(node, Type::new(TypeKind::Bool)),
            NodeKind::CharLit(_) => self.finish(node, Type::new(TypeKind::Char)),
            NodeKind::StrLit { .. } => self.analyze_str_lit(node),
            NodeKind::Ident(_) => self.analyze_ident(node),
            NodeKind::Binary { .. } => self.analyze_binary(node),
            NodeKind::Unary { .. } => self.analyze_unary(node),
            NodeKind::Assign { .. } => self.analyze_assign(node),
            NodeKind::CompoundAssign { .. } => self.analyze_compound_assign(node),
            NodeKind::Postfix { .. } => self.analyze_postfix(node),
            NodeKind::Decl { .. } => self.analyze_decl(node),
            NodeKind::If { .. } => self.analyze_if(node),
            NodeKind::While { .. } => self.analyze_while(node),
            NodeKind::For { .. } => self.analyze_for(node),
            NodeKind::Break { .. } | NodeKind::Continue { .. } => self.analyze_jump(node),
            NodeKind::Return { .. } => self.analyze_return(node),
            NodeKind::FuncDef { .. } => self.analyze_func_def(node),
            NodeKind::Call { .. } => self.analyze_call(node),
            NodeKind::FieldAccess { .. } => self.analyze_field_access(node),
            NodeKind::Index { .. } => self.analyze_index(node),
            NodeKind::OptionalCheck { .. } => self.analyze_optional_check(node),
            NodeKind::NamedArg { .. } => self.analyze_named_arg(node),
            NodeKind::Tuple { .. } => self.analyze_tuple(node),
            NodeKind::ObjectLit { .. } => self.analyze_object_lit(node),
            NodeKind::ArrayLit { .. } => self.analyze_array_lit(node),
            NodeKind::HashLit { .. } => self.analyze_hash_lit(node),
            NodeKind::TypedEmptyArray { .. } => self.analyze_typed_empty_array(node),
            NodeKind::TypedEmptyHash { .. } => self.analyze_typed_empty_hash(node),
            NodeKind::Block { .. } => self.analyze_block_node(node),
            NodeKind::TypeDef { .. }
            | NodeKind::ExternBlock { .. }
            | NodeKind::ExternFunc { .. }
            | NodeKind::ExternVar { .. } => self.finish(node, Type::new(TypeKind::Void)),
        }
    }

    fn finish(&mut self, node: &mut Node, ty: Type) -> Type {
        node.resolved_type = Some(ty.clone());
        ty
    }

    fn analyze_str_lit(&mut self, node: &mut Node) -> Type {
        if let NodeKind::StrLit { value, string_id } = &mut node.kind {
            if string_id.is_none() {
                *string_id = Some(self.string_table.len() as u32);
                self.string_table.push(value.clone());
            }
        }
        self.finish(node, Type::new(TypeKind::String))
    }

    fn analyze_ident(&mut self, node: &mut Node) -> Type {
        let line = node.line;
        let name = match &node.kind {
            NodeKind::Ident(name) => name.clone(),
            _ => return Type::new(TypeKind::Unknown),
        };

        let ty = match self.scopes.lookup(&name).cloned() {
            Some(sym) if sym.is_function => {
                self.error(line, format!("'{}' is a function, not a value", name));
                Type::new(TypeKind::Unknown)
            }
            Some(sym) => sym.ty.clone(),
            None => {
                let names = self.scopes.visible_names();
                let mut message = format!("undefined variable '{}'", name);
                if let Some(close) = suggest_name(&name, names.iter().map(String::as_str)) {
                    message.push_str(&format!(" (did you mean '{}'?)", close));
                }
                self.error(line, message);
                Type::new(TypeKind::Unknown)
            }
        };
        self.finish(node, ty)
    }

    fn analyze_binary(&mut self, node: &mut Node) -> Type {
        let line = node.line;
        let mut kind = Self::take_kind(node);
        let mut result = Type::new(TypeKind::Unknown);
        let mut fresh = false;

        if let NodeKind::Binary { op, lhs, rhs } = &mut kind {
            let op = *op;
            let lhs_ty = self.analyze_node(lhs);
            let rhs_ty = self.analyze_node(rhs);

            for ty in [&lhs_ty, &rhs_ty] {
                if ty.is_void() {
                    self.error(line, "cannot use void expression as operand");
                }
            }

            let concat = op == BinaryOp::Add
                && (lhs_ty.kind == TypeKind::String || rhs_ty.kind == TypeKind::String);

            result = if concat {
                for ty in [&lhs_ty, &rhs_ty] {
                    if !matches!(
                        ty.kind,
                        TypeKind::String
                            | TypeKind::Int
                            | TypeKind::Float
                            | TypeKind::Bool
                            | TypeKind::Char
                            | TypeKind::Unknown
                    ) {
                        self.error(line, format!("cannot concatenate {} to string", ty));
                    }
                }
                fresh = true;
                Type::new(TypeKind::String)
            } else if op.is_comparison() {
                let l_str = lhs_ty.kind == TypeKind::String;
                let r_str = rhs_ty.kind == TypeKind::String;
                if l_str != r_str && !lhs_ty.is_unknown() && !rhs_ty.is_unknown() {
                    self.error(line, format!("cannot compare {} and {}", lhs_ty, rhs_ty));
                }
                Type::new(TypeKind::Bool)
            } else if op.is_logical() {
                for ty in [&lhs_ty, &rhs_ty] {
                    if ty.kind != TypeKind::Bool && !ty.is_unknown() {
                        self.error(
                            line,
                            format!("'{}' requires bool operands, got {}", op.symbol(), ty),
                        );
                    }
                }
                Type::new(TypeKind::Bool)
            } else {
                // Arithmetic.
                for ty in [&lhs_ty, &rhs_ty] {
                    if !matches!(
                        ty.kind,
                        TypeKind::Int | TypeKind::Float | TypeKind::Char | TypeKind::Unknown
                    ) {
                        self.error(
                            line,
                            format!(
                                "operator '{}' requires numeric operands, got {}",
                                op.symbol(),
                                ty
                            ),
                        );
                    }
                }
                if lhs_ty.kind == TypeKind::Float || rhs_ty.kind == TypeKind::Float {
                    Type::new(TypeKind::Float)
                } else {
                    Type::new(TypeKind::Int)
                }
            };
        }

        node.kind = kind;
        node.is_fresh_alloc = fresh;
        self.finish(node, result)
    }

    fn analyze_unary(&mut self, node: &mut Node) -> Type {
        let line = node.line;
        let mut kind = Self::take_kind(node);
        let mut result = Type::new(TypeKind::Unknown);

        if let NodeKind::Unary { op, expr } = &mut kind {
            let op = *op;
            let ty = self.analyze_node(expr);
            if ty.is_void() {
                self.error(line, "cannot use void expression as operand");
            }
            result = match op {
                UnaryOp::Not => {
                    if ty.kind != TypeKind::Bool && !ty.is_unknown() {
                        self.error(line, format!("'!' requires a bool operand, got {}", ty));
                    }
                    Type::new(TypeKind::Bool)
                }
                UnaryOp::Neg | UnaryOp::Pos => {
                    if !matches!(
                        ty.kind,
                        TypeKind::Int | TypeKind::Float | TypeKind::Unknown
                    ) {
                        self.error(
                            line,
                            format!("'{}' requires a numeric operand, got {}", op.symbol(), ty),
                        );
                    }
                    Type::new(ty.kind)
                }
            };
        }

        node.kind = kind;
        self.finish(node, result)
    }

    fn analyze_assign(&mut self, node: &mut Node) -> Type {
        let line = node.line;
        let mut kind = Self::take_kind(node);

        if let NodeKind::Assign { target, value } = &mut kind {
            let target_ty = self.analyze_node(target);
            let value_ty = self.analyze_node(value);
            self.validate_lvalue(target, "assign to");

            if value_ty.is_void() {
                self.error(line, "cannot assign a void expression");
            } else if !Self::types_compatible(&target_ty, &value_ty) {
                self.error(
                    line,
                    format!(
                        "type mismatch in assignment: expected {}, got {}",
                        target_ty, value_ty
                    ),
                );
            }
        }

        node.kind = kind;
        self.finish(node, Type::new(TypeKind::Void))
    }

    fn analyze_compound_assign(&mut self, node: &mut Node) -> Type {
        let line = node.line;
        let mut kind = Self::take_kind(node);

        if let NodeKind::CompoundAssign { target, op, value } = &mut kind {
            let op = *op;
            let target_ty = self.analyze_node(target);
            let value_ty = self.analyze_node(value);
            self.validate_lvalue(target, "modify");

            if value_ty.is_void() {
                self.error(line, "cannot use void expression as operand");
            } else if target_ty.kind == TypeKind::String && op == BinaryOp::Add {
                // String append: the value side follows concat rules.
                if !matches!(
                    value_ty.kind,
                    TypeKind::String
                        | TypeKind::Int
                        | TypeKind::Float
                        | TypeKind::Bool
                        | TypeKind::Char
                        | TypeKind::Unknown
                ) {
                    self.error(line, format!("cannot concatenate {} to string", value_ty));
                }
            } else {
                for ty in [&target_ty, &value_ty] {
                    if !matches!(
                        ty.kind,
                        TypeKind::Int | TypeKind::Float | TypeKind::Char | TypeKind::Unknown
                    ) {
                        self.error(
                            line,
                            format!(
                                "operator '{}=' requires numeric operands, got {}",
                                op.symbol(),
                                ty
                            ),
                        );
                    }
                }
            }
        }

        node.kind = kind;
        self.finish(node, Type::new(TypeKind::Void))
    }

    fn analyze_postfix(&mut self, node: &mut Node) -> Type {
        let line = node.line;
        let mut kind = Self::take_kind(node);
        let mut result = Type::new(TypeKind::Unknown);

        if let NodeKind::Postfix { op, target } = &mut kind {
            let op = *op;
            let ty = self.analyze_node(target);
            self.validate_lvalue(target, "modify");
            if !matches!(
                ty.kind,
                TypeKind::Int | TypeKind::Float | TypeKind::Unknown
            ) {
                let sym = match op {
                    PostfixOp::Increment => "++",
                    PostfixOp::Decrement => "--",
                };
                self.error(line, format!("'{}' requires a numeric lvalue, got {}", sym, ty));
            }
            result = Type::new(ty.kind);
        }

        node.kind = kind;
        self.finish(node, result)
    }

    // ==================== Lvalues ====================

    fn validate_lvalue(&mut self, node: &Node, verb: &str) {
        let line = node.line;
        match &node.kind {
            NodeKind::Ident(name) => {
                if let Some(sym) = self.scopes.lookup(name).cloned() {
                    if sym.is_function {
                        self.error(line, "invalid assignment target");
                    } else if sym.is_extern {
                        self.error(line, format!("cannot {} extern '{}'", verb, name));
                    } else if sym.is_const {
                        self.error(line, format!("cannot {} constant '{}'", verb, name));
                    }
                }
            }
            NodeKind::FieldAccess { base, field, .. } => {
                let base_ty = base.ty();
                match base_ty.kind {
                    TypeKind::Struct | TypeKind::Class => {
                        let const_field = base_ty
                            .name
                            .as_ref()
                            .and_then(|n| self.registry.get(n))
                            .and_then(|def| def.field(field))
                            .is_some_and(|f| f.is_const);
                        if const_field {
                            self.error(
                                line,
                                format!("cannot {} constant field '{}'", verb, field),
                            );
                        }
                        // Structs are copied: mutation through a `let`
                        // binding would silently mutate the copy.
                        if base_ty.kind == TypeKind::Struct {
                            match Self::struct_root(base) {
                                StructRoot::Binding(root) => {
                                    let root = root.to_string();
                                    let root_const = self
                                        .scopes
                                        .lookup(&root)
                                        .is_some_and(|sym| sym.is_const);
                                    if root_const {
                                        self.error(
                                            line,
                                            format!(
                                                "cannot modify field of immutable variable '{}'",
                                                root
                                            ),
                                        );
                                    }
                                }
                                StructRoot::ThroughReference => {}
                                StructRoot::Temporary => {
                                    self.error(line, "cannot modify field of a temporary value");
                                }
                            }
                        }
                    }
                    TypeKind::Unknown => {}
                    _ => self.error(line, "invalid assignment target"),
                }
            }
            NodeKind::Index { base, .. } => match base.ty().kind {
                TypeKind::String => self.error(line, "strings are immutable"),
                TypeKind::Array | TypeKind::Hash | TypeKind::Unknown => {}
                _ => self.error(line, "invalid assignment target"),
            },
            _ => self.error(line, "invalid assignment target"),
        }
    }

    fn struct_root(node: &Node) -> StructRoot<'_> {
        match &node.kind {
            NodeKind::Ident(name) => {
                if node.ty().kind == TypeKind::Class {
                    StructRoot::ThroughReference
                } else {
                    StructRoot::Binding(name)
                }
            }
            NodeKind::FieldAccess { base, .. } => {
                if node.ty().kind == TypeKind::Class {
                    StructRoot::ThroughReference
                } else {
                    Self::struct_root(base)
                }
            }
            _ => StructRoot::Temporary,
        }
    }

    // ==================== Calls ====================

    fn analyze_call(&mut self, node: &mut Node) -> Type {
        let line = node.line;
        let mut kind = Self::take_kind(node);
        let mut result = Type::new(TypeKind::Unknown);
        let mut fresh = false;

        if let NodeKind::Call {
            callee,
            args,
            is_struct_init,
        } = &mut kind
        {
            let callee = callee.clone();
            for arg in args.iter_mut() {
                self.analyze_node(arg);
            }

            if self.registry.contains(&callee) {
                *is_struct_init = true;
                result = self.check_struct_init(&callee, args, line);
                fresh = true;
            } else if callee == "print" {
                result = self.check_print(args, line);
            } else if callee == "push" {
                result = self.check_push(args, line);
            } else {
                let (res, fr) = self.check_user_call(&callee, args, line);
                result = res;
                fresh = fr;
            }
        }

        node.kind = kind;
        node.is_fresh_alloc = fresh;
        self.finish(node, result)
    }

    fn check_struct_init(&mut self, name: &str, args: &[Node], line: u32) -> Type {
        let def = match self.registry.get(name) {
            Some(d) => d.clone(),
            None => return Type::new(TypeKind::Unknown),
        };

        let mut supplied: Vec<String> = Vec::new();
        for arg in args {
            match &arg.kind {
                NodeKind::NamedArg { name: field, value } => {
                    if supplied.iter().any(|s| s == field) {
                        self.error(
                            arg.line,
                            format!("duplicate field '{}' in initializer of '{}'", field, name),
                        );
                        continue;
                    }
                    match def.field(field) {
                        Some(f) => {
                            let value_ty = value.ty();
                            if !Self::types_compatible(&f.ty, &value_ty) {
                                self.error(
                                    arg.line,
                                    format!(
                                        "field '{}' of '{}' expects {}, got {}",
                                        field, name, f.ty, value_ty
                                    ),
                                );
                            }
                        }
                        None => {
                            self.error(arg.line, format!("no field '{}' on '{}'", field, name));
                        }
                    }
                    supplied.push(field.clone());
                }
                _ => {
                    self.error(
                        arg.line,
                        format!("struct initializer for '{}' requires named arguments", name),
                    );
                }
            }
        }

        for field in &def.fields {
            if !field.has_default && !field.is_weak && !supplied.iter().any(|s| s == &field.name) {
                self.error(
                    line,
                    format!("missing field '{}' in initializer of '{}'", field.name, name),
                );
            }
        }

        let kind = if def.is_class {
            TypeKind::Class
        } else {
            TypeKind::Struct
        };
        Type::named(kind, name)
    }

    fn check_print(&mut self, args: &[Node], line: u32) -> Type {
        if args.len() != 1 {
            self.error(line, "print takes exactly one argument");
        }
        if let Some(arg) = args.first() {
            self.reject_named_arg(arg, "print");
            let ty = arg.ty();
            if ty.kind != TypeKind::String && !ty.is_unknown() {
                self.error(line, format!("print requires a string argument, got {}", ty));
            }
        }
        Type::new(TypeKind::Void)
    }

    fn check_push(&mut self, args: &[Node], line: u32) -> Type {
        if args.len() != 2 {
            self.error(line, "push takes an array and a value");
            return Type::new(TypeKind::Void);
        }
        for arg in args {
            self.reject_named_arg(arg, "push");
        }
        let arr_ty = args[0].ty();
        let value_ty = args[1].ty();
        match arr_ty.kind {
            TypeKind::Array => {
                if let Some(elem) = &arr_ty.elem {
                    if !Self::types_compatible(elem, &value_ty) {
                        self.error(
                            line,
                            format!("push into [{}] with value of type {}", elem, value_ty),
                        );
                    }
                }
            }
            TypeKind::Unknown => {}
            _ => self.error(line, format!("push requires an array, got {}", arr_ty)),
        }
        Type::new(TypeKind::Void)
    }

    fn check_user_call(&mut self, callee: &str, args: &[Node], line: u32) -> (Type, bool) {
        for arg in args {
            self.reject_named_arg(arg, callee);
        }

        let sym = match self.scopes.lookup(callee) {
            Some(sym) => sym.clone(),
            None => {
                let names = self.scopes.visible_names();
                let mut message = format!("undefined function '{}'", callee);
                if let Some(close) = suggest_name(callee, names.iter().map(String::as_str)) {
                    message.push_str(&format!(" (did you mean '{}'?)", close));
                }
                self.error(line, message);
                return (Type::new(TypeKind::Unknown), false);
            }
        };

        if !sym.is_function {
            self.error(line, format!("'{}' is not a function", callee));
            return (Type::new(TypeKind::Unknown), false);
        }

        if args.len() != sym.params.len() {
            self.error(
                line,
                format!(
                    "function '{}' expects {} argument(s), got {}",
                    callee,
                    sym.params.len(),
                    args.len()
                ),
            );
        }

        for (i, (arg, param_ty)) in args.iter().zip(sym.params.iter()).enumerate() {
            let arg_ty = arg.ty();
            if !Self::types_compatible(param_ty, &arg_ty) {
                self.error(
                    arg.line,
                    format!(
                        "argument {} to '{}': expected {}, got {}",
                        i + 1,
                        callee,
                        param_ty,
                        arg_ty
                    ),
                );
            }
        }

        let ret = sym.ty.clone();
        let fresh = ret.is_reference();
        (ret, fresh)
    }

    fn reject_named_arg(&mut self, arg: &Node, callee: &str) {
        if matches!(arg.kind, NodeKind::NamedArg { .. }) {
            self.error(
                arg.line,
                format!(
                    "named arguments are only allowed in type instantiations, not calls to '{}'",
                    callee
                ),
            );
        }
    }

    fn analyze_named_arg(&mut self, node: &mut Node) -> Type {
        let mut kind = Self::take_kind(node);
        let mut ty = Type::new(TypeKind::Unknown);
        let mut fresh = false;
        if let NodeKind::NamedArg { value, .. } = &mut kind {
            ty = self.analyze_node(value);
            fresh = value.is_fresh_alloc;
        }
        node.kind = kind;
        node.is_fresh_alloc = fresh;
        self.finish(node, ty)
    }

    // ==================== Access ====================

    fn analyze_field_access(&mut self, node: &mut Node) -> Type {
        let line = node.line;
        let mut kind = Self::take_kind(node);
        let mut result = Type::new(TypeKind::Unknown);
        let mut fresh = false;

        if let NodeKind::FieldAccess {
            base,
            field,
            is_dot_int,
        } = &mut kind
        {
            let field = field.clone();
            let is_dot_int = *is_dot_int;
            let base_ty = self.analyze_node(base);

            let is_len = field == "length"
                && matches!(
                    base_ty.kind,
                    TypeKind::String | TypeKind::Array | TypeKind::Hash
                );

            result = if is_len {
                Type::new(TypeKind::Int)
            } else {
                match base_ty.kind {
                    TypeKind::String => {
                        self.error(line, format!("string has no field '{}'", field));
                        Type::new(TypeKind::Unknown)
                    }
                    TypeKind::Array | TypeKind::Hash => {
                        self.error(line, format!("{} has no field '{}'", base_ty, field));
                        Type::new(TypeKind::Unknown)
                    }
                    TypeKind::Struct | TypeKind::Class => {
                        if base_ty.is_optional {
                            self.error(
                                line,
                                format!(
                                    "cannot access field of optional {}; narrow with '?' first",
                                    base_ty
                                ),
                            );
                        }
                        let type_name = base_ty.name.clone().unwrap_or_default();
                        let def = self.registry.get(&type_name).cloned();
                        match def {
                            Some(def) => {
                                // `.0` is the surface form for tuple
                                // components; a literal `._0` is reserved.
                                if def.is_anonymous_tuple()
                                    && !is_dot_int
                                    && Self::is_positional_name(&field)
                                {
                                    self.error(
                                        line,
                                        format!(
                                            "tuple components are accessed as '.{}'",
                                            field.trim_start_matches('_')
                                        ),
                                    );
                                }
                                match def.field(&field) {
                                    Some(f) => {
                                        // Reading out of a fresh base
                                        // transfers ownership of the
                                        // extracted value to the reader.
                                        fresh = base.is_fresh_alloc
                                            && (f.ty.is_reference()
                                                || f.ty.kind == TypeKind::Struct);
                                        f.ty.clone()
                                    }
                                    None => {
                                        self.error(
                                            line,
                                            format!("no field '{}' on '{}'", field, type_name),
                                        );
                                        Type::new(TypeKind::Unknown)
                                    }
                                }
                            }
                            None => Type::new(TypeKind::Unknown),
                        }
                    }
                    TypeKind::Unknown => Type::new(TypeKind::Unknown),
                    _ => {
                        self.error(line, format!("type {} has no fields", base_ty));
                        Type::new(TypeKind::Unknown)
                    }
                }
            };
        }

        node.kind = kind;
        node.is_fresh_alloc = fresh;
        self.finish(node, result)
    }

    fn is_positional_name(field: &str) -> bool {
        field
            .strip_prefix('_')
            .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
    }

    fn analyze_index(&mut self, node: &mut Node) -> Type {
        let line = node.line;
        let mut kind = Self::take_kind(node);
        let mut result = Type::new(TypeKind::Unknown);
        let mut fresh = false;

        if let NodeKind::Index { base, index } = &mut kind {
            let base_ty = self.analyze_node(base);
            let index_ty = self.analyze_node(index);

            result = match base_ty.kind {
                TypeKind::String => {
                    if index_ty.kind != TypeKind::Int && !index_ty.is_unknown() {
                        self.error(line, format!("string index must be int, got {}", index_ty));
                    }
                    Type::new(TypeKind::Char)
                }
                TypeKind::Array => {
                    if index_ty.kind != TypeKind::Int && !index_ty.is_unknown() {
                        self.error(line, format!("array index must be int, got {}", index_ty));
                    }
                    let elem = base_ty
                        .elem
                        .as_deref()
                        .cloned()
                        .unwrap_or_else(|| Type::new(TypeKind::Unknown));
                    fresh = base.is_fresh_alloc
                        && (elem.is_reference() || elem.kind == TypeKind::Struct);
                    elem
                }
                TypeKind::Hash => {
                    if let Some(key) = &base_ty.key {
                        if !Self::types_compatible(key, &index_ty) {
                            self.error(
                                line,
                                format!("hash key type mismatch: expected {}, got {}", key, index_ty),
                            );
                        }
                    }
                    let value = base_ty
                        .elem
                        .as_deref()
                        .cloned()
                        .unwrap_or_else(|| Type::new(TypeKind::Unknown));
                    fresh = base.is_fresh_alloc
                        && (value.is_reference() || value.kind == TypeKind::Struct);
                    value
                }
                TypeKind::Unknown => Type::new(TypeKind::Unknown),
                _ => {
                    self.error(line, format!("type {} cannot be indexed", base_ty));
                    Type::new(TypeKind::Unknown)
                }
            };
        }

        node.kind = kind;
        node.is_fresh_alloc = fresh;
        self.finish(node, result)
    }

    fn analyze_optional_check(&mut self, node: &mut Node) -> Type {
        let line = node.line;
        let mut kind = Self::take_kind(node);

        if let NodeKind::OptionalCheck { expr } = &mut kind {
            let ty = self.analyze_node(expr);
            let allowed = ty.is_optional
                || matches!(ty.kind, TypeKind::String | TypeKind::Class | TypeKind::Unknown);
            if !allowed {
                self.error(
                    line,
                    format!("'?' requires an optional, string, or class value, got {}", ty),
                );
            }
        }

        node.kind = kind;
        self.finish(node, Type::new(TypeKind::Bool))
    }

    // ==================== Composite literals ====================

    fn analyze_tuple(&mut self, node: &mut Node) -> Type {
        let line = node.line;
        let mut kind = Self::take_kind(node);
        let mut result = Type::new(TypeKind::Unknown);

        if let NodeKind::Tuple { elems } = &mut kind {
            let mut fields: Vec<(Option<String>, Type)> = Vec::new();
            for elem in elems.iter_mut() {
                let ty = self.analyze_node(&mut elem.value);
                if ty.is_void() {
                    self.error(line, "cannot use void expression in tuple");
                }
                fields.push((elem.name.clone(), ty));
            }
            result = self.register_tuple_type(&fields);
        }

        node.kind = kind;
        node.is_fresh_alloc = true;
        self.finish(node, result)
    }

    fn analyze_object_lit(&mut self, node: &mut Node) -> Type {
        let line = node.line;
        let mut kind = Self::take_kind(node);
        let mut result = Type::new(TypeKind::Unknown);

        if let NodeKind::ObjectLit { fields } = &mut kind {
            let mut shape: Vec<(String, Type)> = Vec::new();
            for (name, value) in fields.iter_mut() {
                let ty = self.analyze_node(value);
                if ty.is_void() {
                    self.error(line, "cannot use void expression in object literal");
                }
                shape.push((name.clone(), ty));
            }
            result = self.register_object_type(&shape);
        }

        node.kind = kind;
        node.is_fresh_alloc = true;
        self.finish(node, result)
    }

    fn analyze_array_lit(&mut self, node: &mut Node) -> Type {
        let line = node.line;
        let mut kind = Self::take_kind(node);
        let mut elem_ty = Type::new(TypeKind::Unknown);

        if let NodeKind::ArrayLit { elems } = &mut kind {
            for elem in elems.iter_mut() {
                let ty = self.analyze_node(elem);
                if ty.is_void() {
                    self.error(line, "cannot use void expression in array literal");
                    continue;
                }
                if ty.is_unknown() {
                    continue;
                }
                if elem_ty.is_unknown() {
                    elem_ty = ty;
                } else if !Self::types_compatible(&elem_ty, &ty) {
                    self.error(
                        elem.line,
                        format!("array elements must share a type: found {} and {}", elem_ty, ty),
                    );
                }
            }
        }

        node.kind = kind;
        node.is_fresh_alloc = true;
        self.finish(node, Type::array(elem_ty))
    }

    fn analyze_hash_lit(&mut self, node: &mut Node) -> Type {
        let mut kind = Self::take_kind(node);
        let mut key_ty = Type::new(TypeKind::Unknown);
        let mut value_ty = Type::new(TypeKind::Unknown);

        if let NodeKind::HashLit { pairs } = &mut kind {
            for (key, value) in pairs.iter_mut() {
                let kt = self.analyze_node(key);
                let vt = self.analyze_node(value);
                let key_line = key.line;
                let value_line = value.line;

                if kt.is_void() || vt.is_void() {
                    self.error(key_line, "cannot use void expression in hash literal");
                    continue;
                }
                if !kt.is_unknown() {
                    if key_ty.is_unknown() {
                        key_ty = kt;
                    } else if !Self::types_compatible(&key_ty, &kt) {
                        self.error(
                            key_line,
                            format!("hash keys must share a type: found {} and {}", key_ty, kt),
                        );
                    }
                }
                if !vt.is_unknown() {
                    if value_ty.is_unknown() {
                        value_ty = vt;
                    } else if !Self::types_compatible(&value_ty, &vt) {
                        self.error(
                            value_line,
                            format!(
                                "hash values must share a type: found {} and {}",
                                value_ty, vt
                            ),
                        );
                    }
                }
            }
        }

        node.kind = kind;
        node.is_fresh_alloc = true;
        self.finish(node, Type::hash(key_ty, value_ty))
    }

    fn analyze_typed_empty_array(&mut self, node: &mut Node) -> Type {
        let line = node.line;
        let mut kind = Self::take_kind(node);
        let mut elem = Type::new(TypeKind::Unknown);
        if let NodeKind::TypedEmptyArray { elem: info } = &mut kind {
            let info = info.clone();
            elem = self.resolve_type_info(&info, line);
        }
        node.kind = kind;
        node.is_fresh_alloc = true;
        self.finish(node, Type::array(elem))
    }

    fn analyze_typed_empty_hash(&mut self, node: &mut Node) -> Type {
        let line = node.line;
        let mut kind = Self::take_kind(node);
        let mut key = Type::new(TypeKind::Unknown);
        let mut value = Type::new(TypeKind::Unknown);
        if let NodeKind::TypedEmptyHash { key: k, value: v } = &mut kind {
            let (k, v) = (k.clone(), v.clone());
            key = self.resolve_type_info(&k, line);
            value = self.resolve_type_info(&v, line);
        }
        node.kind = kind;
        node.is_fresh_alloc = true;
        self.finish(node, Type::hash(key, value))
    }
}
