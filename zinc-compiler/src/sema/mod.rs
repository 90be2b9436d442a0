// Semantic analysis: type inference and checking, lvalue validation,
// optional narrowing, loop-result accumulation, anonymous-type
// registration.
//
// The analyzer mutates the AST in place, attaching resolved types and
// marker flags; the emitters read those without further inference.
// Errors are collected, not thrown: analysis keeps going to surface as
// many problems per run as it can.

mod exprs;
mod registry;
mod scope;
mod types;

pub use registry::{StructDef, StructFieldDef, StructRegistry};
pub use scope::{ScopeStack, Symbol};
pub use types::{object_canonical, tuple_canonical};

use zinc_ast::*;
use zinc_diagnostics::{Diagnostic, DiagnosticSink, Phase, Span};

/// Resolved signature of a user or extern function, for the emitter's
/// prototype and call-site lowering.
#[derive(Debug, Clone)]
pub struct FnSig {
    pub params: Vec<(String, Type)>,
    pub ret: Type,
    pub is_extern: bool,
}

#[derive(Debug)]
pub struct SemanticAnalyzer {
    pub(crate) scopes: ScopeStack,
    pub registry: StructRegistry,
    pub sink: DiagnosticSink,
    /// Function signatures in declaration order.
    pub functions: Vec<(String, FnSig)>,
    /// Static string literal texts, indexed by the `string_id` the
    /// analyzer assigns to each literal node.
    pub string_table: Vec<String>,
    file: String,
    in_loop: u32,
    in_function: bool,
    current_function: Option<String>,
    /// The per-loop result slot, saved and restored around each loop.
    loop_result: Option<Type>,
}

impl SemanticAnalyzer {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            scopes: ScopeStack::new(),
            registry: StructRegistry::new(),
            sink: DiagnosticSink::new(),
            functions: Vec::new(),
            string_table: Vec::new(),
            file: file.into(),
            in_loop: 0,
            in_function: false,
            current_function: None,
            loop_result: None,
        }
    }

    pub fn error_count(&self) -> usize {
        self.sink.error_count()
    }

    pub(crate) fn error(&mut self, line: u32, message: impl Into<String>) {
        self.sink.push(Diagnostic::error(
            Phase::Semantic,
            message.into(),
            Span::new(self.file.clone(), line),
        ));
    }

    pub fn fn_sig(&self, name: &str) -> Option<&FnSig> {
        self.functions
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, sig)| sig)
    }

    fn set_fn_ret(&mut self, name: &str, ret: Type) {
        self.scopes.set_function_return(name, ret.clone());
        if let Some((_, sig)) = self.functions.iter_mut().find(|(n, _)| n == name) {
            sig.ret = ret;
        }
    }

    /// Detach a node's kind so children can be analyzed while `self` is
    /// borrowed mutably; callers restore it when done.
    fn take_kind(node: &mut Node) -> NodeKind {
        std::mem::replace(&mut node.kind, NodeKind::Block { body: Vec::new() })
    }

    /// Analyze a whole program. Type names are registered before any
    /// field is resolved, so classes can reference themselves and each
    /// other; extern symbols are hoisted next; functions are analyzed in
    /// source order.
    pub fn analyze(&mut self, program: &mut Program) {
        log::debug!("semantic analysis: {} top-level item(s)", program.items.len());

        // Phase 1: type names.
        for item in &program.items {
            if let NodeKind::TypeDef { name, is_class, .. } = &item.kind {
                let def = StructDef {
                    name: name.clone(),
                    is_class: *is_class,
                    fields: Vec::new(),
                };
                if self.registry.register(def).is_err() {
                    self.error(item.line, format!("duplicate type '{}'", name));
                }
            }
        }

        // Phase 2: field resolution, now that every name is known.
        for item in &mut program.items {
            if let NodeKind::TypeDef { .. } = item.kind {
                self.resolve_type_def(item);
            }
        }

        // Phase 3: extern declarations.
        for item in &mut program.items {
            if let NodeKind::ExternBlock { .. } = item.kind {
                self.analyze_extern_block(item);
            }
        }

        // Phase 4: function bodies, in source order.
        for item in &mut program.items {
            match &item.kind {
                NodeKind::FuncDef { .. } => {
                    self.analyze_node(item);
                }
                NodeKind::TypeDef { .. } | NodeKind::ExternBlock { .. } => {}
                _ => {
                    self.error(item.line, "expected top-level item");
                    item.resolved_type = Some(Type::new(TypeKind::Void));
                }
            }
        }

        log::debug!(
            "semantic analysis done: {} error(s), {} registered type(s)",
            self.error_count(),
            self.registry.iter().count()
        );
    }

    fn resolve_type_def(&mut self, node: &mut Node) {
        let line = node.line;
        let mut kind = Self::take_kind(node);

        if let NodeKind::TypeDef {
            name,
            is_class,
            fields,
        } = &mut kind
        {
            let name = name.clone();
            let is_class = *is_class;
            let mut resolved: Vec<StructFieldDef> = Vec::new();

            for field in fields.iter_mut() {
                if resolved.iter().any(|f| f.name == field.name) {
                    self.error(
                        field.line,
                        format!("duplicate field '{}' in '{}'", field.name, name),
                    );
                    continue;
                }

                let ty = self.resolve_type_info(&field.annotation, field.line);

                if field.is_weak {
                    if !is_class {
                        self.error(
                            field.line,
                            format!("weak field '{}' is only allowed in classes", field.name),
                        );
                    } else if ty.kind != TypeKind::Class && !ty.is_unknown() {
                        self.error(
                            field.line,
                            format!("weak field '{}' must have class type", field.name),
                        );
                    }
                }

                if let Some(default) = field.default.as_mut() {
                    let default_ty = self.analyze_node(default);
                    if !Self::types_compatible(&ty, &default_ty) {
                        self.error(
                            field.line,
                            format!(
                                "default value for field '{}' has type {}, expected {}",
                                field.name, default_ty, ty
                            ),
                        );
                    }
                }

                resolved.push(StructFieldDef {
                    name: field.name.clone(),
                    ty,
                    has_default: field.default.is_some(),
                    is_const: field.is_const,
                    is_weak: field.is_weak,
                    default: field.default.clone(),
                });
            }

            match self.registry.get_mut(&name) {
                Some(def) => def.fields = resolved,
                None => self.error(line, format!("undefined type '{}'", name)),
            }
        }

        node.kind = kind;
        node.resolved_type = Some(Type::new(TypeKind::Void));
    }

    fn analyze_extern_block(&mut self, node: &mut Node) {
        let mut kind = Self::take_kind(node);

        if let NodeKind::ExternBlock { items } = &mut kind {
            for item in items.iter_mut() {
                let line = item.line;
                match &item.kind {
                    NodeKind::ExternFunc {
                        name,
                        params,
                        return_annotation,
                    } => {
                        let name = name.clone();
                        let params = params.clone();
                        let return_annotation = return_annotation.clone();

                        let param_types: Vec<(String, Type)> = params
                            .iter()
                            .map(|p| {
                                (p.name.clone(), self.resolve_type_info(&p.annotation, p.line))
                            })
                            .collect();
                        let ret = match &return_annotation {
                            Some(info) => self.resolve_type_info(info, line),
                            None => Type::new(TypeKind::Void),
                        };

                        let mut sym = Symbol::function(
                            name.clone(),
                            param_types.iter().map(|(_, t)| t.clone()).collect(),
                            ret.clone(),
                        );
                        sym.is_extern = true;
                        if self.scopes.declare(sym).is_err() {
                            self.error(line, format!("duplicate declaration of '{}'", name));
                        } else {
                            self.functions.push((
                                name,
                                FnSig {
                                    params: param_types,
                                    ret,
                                    is_extern: true,
                                },
                            ));
                        }
                    }
                    NodeKind::ExternVar {
                        name,
                        annotation,
                        is_const,
                    } => {
                        let name = name.clone();
                        let annotation = annotation.clone();
                        let is_const = *is_const;
                        let ty = self.resolve_type_info(&annotation, line);
                        let mut sym = Symbol::var(name.clone(), ty, is_const);
                        sym.is_extern = true;
                        if self.scopes.declare(sym).is_err() {
                            self.error(line, format!("duplicate declaration of '{}'", name));
                        }
                    }
                    _ => {}
                }
                item.resolved_type = Some(Type::new(TypeKind::Void));
            }
        }

        node.kind = kind;
        node.resolved_type = Some(Type::new(TypeKind::Void));
    }

    // ==================== Statement-shaped nodes ====================

    pub(crate) fn analyze_func_def(&mut self, node: &mut Node) -> Type {
        let line = node.line;
        let mut kind = Self::take_kind(node);
        let mut final_ret = Type::new(TypeKind::Void);

        if let NodeKind::FuncDef {
            name,
            params,
            return_annotation,
            body,
        } = &mut kind
        {
            let name = name.clone();

            if self.in_function {
                self.error(line, "nested function definitions are not allowed");
            }

            // Struct names that are classes become *class* here.
            let param_types: Vec<(String, Type)> = params
                .iter()
                .map(|p| (p.name.clone(), self.resolve_type_info(&p.annotation, p.line)))
                .collect();
            let annotated_ret = return_annotation
                .clone()
                .map(|info| self.resolve_type_info(&info, line));
            // Pre-declare with the annotated return type (or void) so
            // recursive calls type-check.
            let ret = annotated_ret
                .clone()
                .unwrap_or_else(|| Type::new(TypeKind::Void));

            let sym = Symbol::function(
                name.clone(),
                param_types.iter().map(|(_, t)| t.clone()).collect(),
                ret.clone(),
            );
            if self.scopes.declare(sym).is_err() {
                self.error(line, format!("duplicate declaration of '{}'", name));
            } else {
                self.functions.push((
                    name.clone(),
                    FnSig {
                        params: param_types.clone(),
                        ret,
                        is_extern: false,
                    },
                ));
            }

            self.scopes.push();
            let was_in_function = self.in_function;
            let prev_function = self.current_function.take();
            self.in_function = true;
            self.current_function = Some(name.clone());

            // Parameters are immutable.
            for (pname, pty) in &param_types {
                if self
                    .scopes
                    .declare(Symbol::var(pname.clone(), pty.clone(), true))
                    .is_err()
                {
                    self.error(line, format!("duplicate parameter '{}'", pname));
                }
            }

            let body_ty = self.analyze_node(body);

            self.scopes.pop();
            self.in_function = was_in_function;
            self.current_function = prev_function;

            // No explicit return type inferred: inherit from the trailing
            // expression when it has a value.
            let current_ret = self
                .fn_sig(&name)
                .map(|s| s.ret.clone())
                .unwrap_or_else(|| Type::new(TypeKind::Void));
            final_ret = if current_ret.is_void() && !body_ty.is_void() && annotated_ret.is_none() {
                self.set_fn_ret(&name, body_ty.clone());
                body_ty
            } else {
                if !body_ty.is_void()
                    && !body_ty.is_unknown()
                    && !current_ret.is_void()
                    && !Self::types_compatible(&current_ret, &body_ty)
                {
                    self.error(
                        line,
                        format!(
                            "function '{}' returns {}, but its body yields {}",
                            name, current_ret, body_ty
                        ),
                    );
                }
                current_ret
            };
        }

        node.kind = kind;
        node.resolved_type = Some(final_ret);
        Type::new(TypeKind::Void)
    }

    pub(crate) fn analyze_decl(&mut self, node: &mut Node) -> Type {
        let line = node.line;
        let mut kind = Self::take_kind(node);

        if let NodeKind::Decl {
            mutable,
            name,
            annotation,
            init,
        } = &mut kind
        {
            let mutable = *mutable;
            let name = name.clone();

            let init_ty = self.analyze_node(init);
            let annotation_ty = annotation
                .clone()
                .map(|info| self.resolve_type_info(&info, line));

            if init_ty.is_void() {
                self.error(
                    line,
                    format!("cannot use void expression to initialize '{}'", name),
                );
            }

            let binding_ty = match annotation_ty {
                Some(annotated) => {
                    if !init_ty.is_void() && !Self::types_compatible(&annotated, &init_ty) {
                        self.error(
                            line,
                            format!(
                                "type mismatch in declaration of '{}': expected {}, got {}",
                                name, annotated, init_ty
                            ),
                        );
                    }
                    annotated
                }
                None => init_ty,
            };

            if self
                .scopes
                .declare(Symbol::var(name.clone(), binding_ty, !mutable))
                .is_err()
            {
                self.error(line, format!("duplicate declaration of '{}'", name));
            }
        }

        node.kind = kind;
        let void = Type::new(TypeKind::Void);
        node.resolved_type = Some(void.clone());
        void
    }

    pub(crate) fn analyze_block_node(&mut self, node: &mut Node) -> Type {
        let mut kind = Self::take_kind(node);
        self.scopes.push();
        let mut last = Type::new(TypeKind::Void);
        if let NodeKind::Block { body } = &mut kind {
            for stmt in body.iter_mut() {
                last = self.analyze_node(stmt);
            }
        }
        self.scopes.pop();
        node.kind = kind;
        node.resolved_type = Some(last.clone());
        last
    }

    pub(crate) fn analyze_if(&mut self, node: &mut Node) -> Type {
        let line = node.line;
        let mut kind = Self::take_kind(node);
        let mut result = Type::new(TypeKind::Void);

        if let NodeKind::If {
            cond,
            then_block,
            else_block,
        } = &mut kind
        {
            let cond_ty = self.analyze_node(cond);
            if cond_ty.kind != TypeKind::Bool && !cond_ty.is_unknown() {
                self.error(line, format!("if condition must be bool, got {}", cond_ty));
            }
            let narrow = Self::narrowing_target(cond).map(str::to_string);

            let then_ty = match &narrow {
                Some(name) => {
                    // Narrowed shadow scope: same binding, optional flag
                    // cleared.
                    self.scopes.push();
                    if let Some(sym) = self.scopes.lookup(name).cloned() {
                        let mut narrowed = sym;
                        narrowed.ty = narrowed.ty.required();
                        self.scopes.rebind(narrowed);
                    }
                    let ty = self.analyze_node(then_block);
                    self.scopes.pop();
                    ty
                }
                None => self.analyze_node(then_block),
            };
            let else_ty = else_block.as_mut().map(|b| self.analyze_node(b));

            result = match else_ty {
                Some(else_ty) => {
                    if !then_ty.is_void()
                        && !else_ty.is_void()
                        && Self::types_compatible(&then_ty, &else_ty)
                    {
                        then_ty
                    } else {
                        Type::new(TypeKind::Void)
                    }
                }
                None => {
                    if then_ty.is_void() || then_ty.is_unknown() {
                        Type::new(TypeKind::Void)
                    } else {
                        then_ty.optional()
                    }
                }
            };
        }

        node.kind = kind;
        node.is_fresh_alloc = result.is_reference();
        node.resolved_type = Some(result.clone());
        result
    }

    /// The narrowing predicate: the condition is exactly `x?` where `x`
    /// is an identifier whose declared type is optional. Compound
    /// conditions do not narrow. The emitter applies the same predicate.
    pub fn narrowing_target(cond: &Node) -> Option<&str> {
        if let NodeKind::OptionalCheck { expr } = &cond.kind {
            if let NodeKind::Ident(name) = &expr.kind {
                if expr.ty().is_optional {
                    return Some(name);
                }
            }
        }
        None
    }

    /// `while true` and the desugared `until false` (`while !false`) are
    /// the syntactically always-true conditions; their loop results are
    /// not optional-wrapped.
    pub fn cond_always_true(cond: &Node) -> bool {
        match &cond.kind {
            NodeKind::BoolLit(true) => true,
            NodeKind::Unary {
                op: UnaryOp::Not,
                expr,
            } => matches!(expr.kind, NodeKind::BoolLit(false)),
            _ => false,
        }
    }

    pub(crate) fn analyze_while(&mut self, node: &mut Node) -> Type {
        let line = node.line;
        let mut kind = Self::take_kind(node);
        let mut result = Type::new(TypeKind::Void);

        if let NodeKind::While { cond, body } = &mut kind {
            let cond_ty = self.analyze_node(cond);
            if cond_ty.kind != TypeKind::Bool && !cond_ty.is_unknown() {
                self.error(line, format!("while condition must be bool, got {}", cond_ty));
            }
            let always_true = Self::cond_always_true(cond);

            let saved = self.loop_result.take();
            self.in_loop += 1;
            self.analyze_node(body);
            self.in_loop -= 1;
            let accumulated = std::mem::replace(&mut self.loop_result, saved);

            result = match accumulated {
                Some(t) if !t.is_void() => {
                    if always_true {
                        t
                    } else {
                        t.optional()
                    }
                }
                _ => Type::new(TypeKind::Void),
            };
        }

        node.kind = kind;
        node.is_fresh_alloc = result.is_reference();
        node.resolved_type = Some(result.clone());
        result
    }

    pub(crate) fn analyze_for(&mut self, node: &mut Node) -> Type {
        let line = node.line;
        let mut kind = Self::take_kind(node);
        let mut result = Type::new(TypeKind::Void);

        if let NodeKind::For {
            init,
            cond,
            step,
            body,
        } = &mut kind
        {
            // The init clause gets its own scope, visible to cond, step
            // and body.
            self.scopes.push();

            if let Some(init) = init.as_mut() {
                self.analyze_node(init);
            }
            if let Some(cond) = cond.as_mut() {
                let cond_ty = self.analyze_node(cond);
                if cond_ty.kind != TypeKind::Bool && !cond_ty.is_unknown() {
                    self.error(line, format!("for condition must be bool, got {}", cond_ty));
                }
            }

            let saved = self.loop_result.take();
            self.in_loop += 1;
            self.analyze_node(body);
            if let Some(step) = step.as_mut() {
                self.analyze_node(step);
            }
            self.in_loop -= 1;
            let accumulated = std::mem::replace(&mut self.loop_result, saved);

            self.scopes.pop();

            // A for-loop body may never execute, so its result is always
            // optional.
            result = match accumulated {
                Some(t) if !t.is_void() => t.optional(),
                _ => Type::new(TypeKind::Void),
            };
        }

        node.kind = kind;
        node.is_fresh_alloc = result.is_reference();
        node.resolved_type = Some(result.clone());
        result
    }

    pub(crate) fn analyze_jump(&mut self, node: &mut Node) -> Type {
        let line = node.line;
        let is_break = matches!(node.kind, NodeKind::Break { .. });
        let keyword = if is_break { "break" } else { "continue" };

        if self.in_loop == 0 {
            self.error(line, format!("{} outside loop", keyword));
        }

        let mut kind = Self::take_kind(node);
        if let NodeKind::Break { value } | NodeKind::Continue { value } = &mut kind {
            if let Some(value) = value.as_mut() {
                let value_ty = self.analyze_node(value);
                if value_ty.is_void() {
                    self.error(
                        line,
                        format!("cannot use void expression as {} value", keyword),
                    );
                } else if !value_ty.is_unknown() {
                    match self.loop_result.clone() {
                        None => self.loop_result = Some(value_ty),
                        Some(acc) if acc.is_unknown() => self.loop_result = Some(value_ty),
                        Some(acc) => {
                            if !Self::types_compatible(&acc, &value_ty) {
                                self.error(
                                    line,
                                    format!(
                                        "loop yields both {} and {}: {} values must agree",
                                        acc, value_ty, keyword
                                    ),
                                );
                            }
                        }
                    }
                }
            }
        }

        node.kind = kind;
        let void = Type::new(TypeKind::Void);
        node.resolved_type = Some(void.clone());
        void
    }

    pub(crate) fn analyze_return(&mut self, node: &mut Node) -> Type {
        let line = node.line;
        if !self.in_function {
            self.error(line, "return outside function");
        }

        let mut kind = Self::take_kind(node);
        let value_ty = match &mut kind {
            NodeKind::Return { value } => value.as_mut().map(|v| self.analyze_node(v)),
            _ => None,
        };

        if let Some(fn_name) = self.current_function.clone() {
            let current_ret = self
                .fn_sig(&fn_name)
                .map(|s| s.ret.clone())
                .unwrap_or_else(|| Type::new(TypeKind::Void));
            match value_ty {
                Some(value_ty) if !value_ty.is_void() && !value_ty.is_unknown() => {
                    if current_ret.is_void() {
                        // The first non-void return fixes the function's
                        // return type.
                        self.set_fn_ret(&fn_name, value_ty);
                    } else if !Self::types_compatible(&current_ret, &value_ty) {
                        self.error(
                            line,
                            format!(
                                "mismatched return types in '{}': {} and {}",
                                fn_name, current_ret, value_ty
                            ),
                        );
                    }
                }
                Some(value_ty) if value_ty.is_void() => {
                    self.error(line, "cannot return a void expression");
                }
                None if !current_ret.is_void() => {
                    self.error(
                        line,
                        format!(
                            "return value of type {} expected in '{}'",
                            current_ret, fn_name
                        ),
                    );
                }
                _ => {}
            }
        }

        node.kind = kind;
        let void = Type::new(TypeKind::Void);
        node.resolved_type = Some(void.clone());
        void
    }

    /// Structural compatibility for checking sites: equal types pass,
    /// `unknown` on either side passes, and a non-optional value may
    /// flow into an optional slot of the same underlying type.
    pub(crate) fn types_compatible(expected: &Type, actual: &Type) -> bool {
        if expected.is_unknown() || actual.is_unknown() {
            return true;
        }
        if expected == actual {
            return true;
        }
        if expected.is_optional && *actual == expected.required() {
            return true;
        }
        // Collections with unknown components unify with anything of
        // the same kind.
        if expected.kind == actual.kind && matches!(expected.kind, TypeKind::Array | TypeKind::Hash)
        {
            let elem_ok = match (&expected.elem, &actual.elem) {
                (Some(a), Some(b)) => Self::types_compatible(a, b),
                _ => true,
            };
            let key_ok = match (&expected.key, &actual.key) {
                (Some(a), Some(b)) => Self::types_compatible(a, b),
                _ => true,
            };
            return elem_ok && key_ok;
        }
        false
    }
}
