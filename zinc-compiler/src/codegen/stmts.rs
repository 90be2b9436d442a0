// Statement-position lowering: declarations, assignments, control flow,
// jumps, returns, and whole function bodies.
//
// Control flow in statement position lowers to plain C statements; the
// value-position forms (in exprs.rs dispatch) share the same branch
// machinery but capture into a result temporary inside a statement
// expression.

use super::{CodeBuf, CodeGenerator, LoopResult, ScopeKind};
use crate::sema::SemanticAnalyzer;
use zinc_ast::*;

impl<'a> CodeGenerator<'a> {
    pub(crate) fn emit_stmt(&mut self, node: &Node, buf: &mut CodeBuf) {
        self.line_directive(buf, node.line);
        match &node.kind {
            NodeKind::Decl { .. } => self.emit_decl(node, buf),
            NodeKind::Assign { .. } => self.emit_assign(node, buf),
            NodeKind::CompoundAssign { .. } => self.emit_compound_assign(node, buf),
            NodeKind::Postfix { .. } => self.emit_postfix(node, buf),
            NodeKind::If { .. } => self.emit_if(node, buf, None),
            NodeKind::While { .. } => self.emit_while(node, buf, None),
            NodeKind::For { .. } => self.emit_for(node, buf, None),
            NodeKind::Break { .. } | NodeKind::Continue { .. } => self.emit_jump(node, buf),
            NodeKind::Return { .. } => self.emit_return(node, buf),
            NodeKind::Block { .. } => {
                buf.open("{");
                self.emit_block_inner(node, buf);
                buf.close("}");
            }
            NodeKind::FuncDef { .. }
            | NodeKind::TypeDef { .. }
            | NodeKind::ExternBlock { .. }
            | NodeKind::ExternFunc { .. }
            | NodeKind::ExternVar { .. } => {}
            _ => {
                // Expression statement. A fresh reference evaluated for
                // effect still owns its +1 and must be released.
                let ty = node.ty();
                if node.is_fresh_alloc && self.needs_arc(&ty) {
                    let t = self.fresh_tmp("d");
                    let e = self.emit_expr(node);
                    let mut stmt = format!("{{ {} = {};", self.c_decl(&ty, &t), e);
                    if let Some(rel) = self.release_stmt(&t, &ty) {
                        stmt.push(' ');
                        stmt.push_str(&rel);
                    }
                    stmt.push_str(" }");
                    buf.stmt(&stmt);
                } else {
                    let e = self.emit_expr(node);
                    if ty.is_void() {
                        buf.stmt(&format!("{};", e));
                    } else {
                        buf.stmt(&format!("(void)({});", e));
                    }
                }
            }
        }
    }

    /// Emit the statements of a block node inside an already-open brace
    /// pair, with its own ARC scope.
    pub(crate) fn emit_block_inner(&mut self, block: &Node, buf: &mut CodeBuf) {
        self.arc_push(ScopeKind::Block);
        if let NodeKind::Block { body } = &block.kind {
            for stmt in body {
                self.emit_stmt(stmt, buf);
            }
            if body.last().is_some_and(Self::is_terminator) {
                self.arc_pop_silent();
                return;
            }
        }
        self.arc_pop(buf);
    }

    fn is_terminator(node: &Node) -> bool {
        matches!(
            node.kind,
            NodeKind::Return { .. } | NodeKind::Break { .. } | NodeKind::Continue { .. }
        )
    }

    // ==================== Declarations ====================

    fn emit_decl(&mut self, node: &Node, buf: &mut CodeBuf) {
        let (name, annotation, init) = match &node.kind {
            NodeKind::Decl {
                name,
                annotation,
                init,
                ..
            } => (name.clone(), annotation.clone(), init),
            _ => return,
        };

        let binding_ty = match &annotation {
            Some(info) => self.resolve_annotation(info),
            None => init.ty(),
        };
        let init_ty = init.ty();
        let e = self.emit_expr(init);

        let wrap = binding_ty.is_optional && !binding_ty.is_reference() && !init_ty.is_optional;
        if wrap {
            buf.stmt(&format!("{};", self.c_decl(&binding_ty, &name)));
            buf.stmt(&format!("{}._has = true;", name));
            buf.stmt(&format!("{}._val = {};", name, e));
            if !init.is_fresh_alloc {
                if let Some(ret) =
                    self.retain_stmt(&format!("{}._val", name), &binding_ty.required())
                {
                    buf.stmt(&ret);
                }
            }
        } else {
            buf.stmt(&format!("{} = {};", self.c_decl(&binding_ty, &name), e));
            if !init.is_fresh_alloc {
                if let Some(ret) = self.retain_stmt(&name, &binding_ty) {
                    buf.stmt(&ret);
                }
            }
        }

        self.arc_track(&name, &binding_ty);
    }

    // ==================== Assignment ====================

    /// The C lvalue path for an assignment target.
    fn emit_lvalue(&mut self, node: &Node) -> String {
        match &node.kind {
            NodeKind::Ident(name) => self.emit_ident(name),
            NodeKind::FieldAccess { base, field, .. } => {
                let sep = if base.ty().kind == TypeKind::Class {
                    "->"
                } else {
                    "."
                };
                let b = self.emit_lvalue(base);
                format!("{}{}{}", b, sep, field)
            }
            _ => self.emit_expr(node),
        }
    }

    /// Whether a field-access target lands on a weak field.
    fn target_is_weak(&self, target: &Node) -> bool {
        if let NodeKind::FieldAccess { base, field, .. } = &target.kind {
            return base
                .ty()
                .name
                .as_deref()
                .and_then(|n| self.sema.registry.get(n))
                .and_then(|def| def.field(field))
                .is_some_and(|f| f.is_weak);
        }
        false
    }

    fn emit_assign(&mut self, node: &Node, buf: &mut CodeBuf) {
        let (target, value) = match &node.kind {
            NodeKind::Assign { target, value } => (target, value),
            _ => return,
        };

        if let NodeKind::Index { base, index } = &target.kind {
            self.emit_index_store(base, index, value, buf);
            return;
        }

        let target_ty = target.ty();
        let lvalue = self.emit_lvalue(target);
        let weak = self.target_is_weak(target);
        self.emit_store(buf, &lvalue, &target_ty, value, weak);
    }

    /// Store `value` into an existing lvalue with retain-before-release
    /// ordering: evaluate into a temporary, retain it (skipped when the
    /// value is fresh), release the current contents, then store. Safe
    /// under self-assignment. Weak targets store without any counting.
    fn emit_store(
        &mut self,
        buf: &mut CodeBuf,
        lvalue: &str,
        target_ty: &Type,
        value: &Node,
        weak: bool,
    ) {
        let value_ty = value.ty();
        let wrap = target_ty.is_optional && !target_ty.is_reference() && !value_ty.is_optional;
        let e = self.emit_expr(value);

        if weak || !self.needs_arc(target_ty) {
            if wrap {
                buf.stmt(&format!("{}._has = true;", lvalue));
                buf.stmt(&format!("{}._val = {};", lvalue, e));
            } else {
                buf.stmt(&format!("{} = {};", lvalue, e));
            }
            return;
        }

        let t = self.fresh_tmp("tmp");
        let tmp_ty = if wrap {
            target_ty.required()
        } else {
            target_ty.clone()
        };
        let mut stmt = format!("{{ {} = {};", self.c_decl(&tmp_ty, &t), e);
        if !value.is_fresh_alloc {
            if let Some(ret) = self.retain_stmt(&t, &tmp_ty) {
                stmt.push(' ');
                stmt.push_str(&ret);
            }
        }
        if let Some(rel) = self.release_stmt(lvalue, target_ty) {
            stmt.push(' ');
            stmt.push_str(&rel);
        }
        if wrap {
            stmt.push_str(&format!(" {}._has = true; {}._val = {};", lvalue, lvalue, t));
        } else {
            stmt.push_str(&format!(" {} = {};", lvalue, t));
        }
        stmt.push_str(" }");
        buf.stmt(&stmt);
    }

    /// `a[i] = v` / `h[k] = v`: the runtime's set retains the inserted
    /// value and releases the overwritten one through the collection's
    /// callbacks; fresh values are pre-evaluated and released afterwards.
    fn emit_index_store(&mut self, base: &Node, index: &Node, value: &Node, buf: &mut CodeBuf) {
        let base_ty = base.ty();
        let index_ty = index.ty();
        let value_ty = value.ty();

        let mut inner = CodeBuf::new_inline();
        let ct = self.fresh_tmp("c");
        let base_expr = self.emit_expr(base);
        inner.stmt(&format!("{} = {};", self.c_decl(&base_ty, &ct), base_expr));

        let et = self.fresh_tmp("e");
        let value_expr = self.emit_expr(value);
        inner.stmt(&format!("{} = {};", self.c_decl(&value_ty, &et), value_expr));
        let boxed_value = self.box_value(&et, &value_ty);

        match base_ty.kind {
            TypeKind::Hash => {
                let kt = self.fresh_tmp("k");
                let index_expr = self.emit_expr(index);
                inner.stmt(&format!("{} = {};", self.c_decl(&index_ty, &kt), index_expr));
                let boxed_key = self.box_value(&kt, &index_ty);
                inner.stmt(&format!("__zn_hash_set({}, {}, {});", ct, boxed_key, boxed_value));
                if index.is_fresh_alloc {
                    if let Some(rel) = self.release_stmt(&kt, &index_ty) {
                        inner.stmt(&rel);
                    }
                }
            }
            _ => {
                let index_expr = self.emit_expr(index);
                inner.stmt(&format!("__zn_arr_set({}, {}, {});", ct, index_expr, boxed_value));
            }
        }

        if value.is_fresh_alloc {
            if let Some(rel) = self.release_stmt(&et, &value_ty) {
                inner.stmt(&rel);
            }
        }
        if base.is_fresh_alloc {
            if let Some(rel) = self.release_stmt(&ct, &base_ty) {
                inner.stmt(&rel);
            }
        }
        buf.stmt(&format!("{{ {} }}", inner.buf));
    }

    fn emit_compound_assign(&mut self, node: &Node, buf: &mut CodeBuf) {
        let (target, op, value) = match &node.kind {
            NodeKind::CompoundAssign { target, op, value } => (target, *op, value),
            _ => return,
        };
        let target_ty = target.ty();

        // String append: build the concatenation, then swap it in with
        // the usual retain-before-release ordering (the concat result is
        // fresh, so no retain).
        if target_ty.kind == TypeKind::String && op == BinaryOp::Add {
            let lvalue = self.emit_lvalue(target);
            let mut inner = CodeBuf::new_inline();
            let value_ty = value.ty();
            let value_expr = self.emit_expr(value);

            let vt = self.fresh_tmp("cat");
            let (init, owned) = match value_ty.kind {
                TypeKind::String => (value_expr, value.is_fresh_alloc),
                TypeKind::Int => (format!("__zn_str_from_int({})", value_expr), true),
                TypeKind::Float => (format!("__zn_str_from_float({})", value_expr), true),
                TypeKind::Bool => (format!("__zn_str_from_bool({})", value_expr), true),
                _ => (format!("__zn_str_from_char({})", value_expr), true),
            };
            inner.stmt(&format!("ZnString *{} = {};", vt, init));
            let rt = self.fresh_tmp("cat");
            inner.stmt(&format!(
                "ZnString *{} = __zn_str_concat({}, {});",
                rt, lvalue, vt
            ));
            if owned {
                inner.stmt(&format!("__zn_str_release({});", vt));
            }
            inner.stmt(&format!("__zn_str_release({});", lvalue));
            inner.stmt(&format!("{} = {};", lvalue, rt));
            buf.stmt(&format!("{{ {} }}", inner.buf));
            return;
        }

        // Read-modify-write for collection elements.
        if let NodeKind::Index { base, index } = &target.kind {
            let elem_ty = target.ty();
            let mut inner = CodeBuf::new_inline();
            let ct = self.fresh_tmp("c");
            let it = self.fresh_tmp("i");
            let base_expr = self.emit_expr(base);
            let index_expr = self.emit_expr(index);
            inner.stmt(&format!("{} = {};", self.c_decl(&base.ty(), &ct), base_expr));
            inner.stmt(&format!("{} = {};", self.c_decl(&index.ty(), &it), index_expr));
            let read = self.index_rmw_read(&base.ty(), &elem_ty, &index.ty(), &ct, &it);
            let vt = self.fresh_tmp("v");
            let value_expr = self.emit_expr(value);
            inner.stmt(&format!(
                "{} = ({} {} {});",
                self.c_decl(&elem_ty, &vt),
                read,
                op.symbol(),
                value_expr
            ));
            let boxed = self.box_value(&vt, &elem_ty);
            match base.ty().kind {
                TypeKind::Hash => {
                    let boxed_key = self.box_value(&it, &index.ty());
                    inner.stmt(&format!("__zn_hash_set({}, {}, {});", ct, boxed_key, boxed));
                }
                _ => inner.stmt(&format!("__zn_arr_set({}, {}, {});", ct, it, boxed)),
            }
            buf.stmt(&format!("{{ {} }}", inner.buf));
            return;
        }

        let lvalue = self.emit_lvalue(target);
        let e = self.emit_expr(value);
        if op == BinaryOp::Mod && target_ty.kind == TypeKind::Float {
            buf.stmt(&format!("{} = fmod({}, {});", lvalue, lvalue, e));
        } else {
            buf.stmt(&format!("{} {}= {};", lvalue, op.symbol(), e));
        }
    }

    fn index_rmw_read(
        &self,
        base_ty: &Type,
        elem_ty: &Type,
        index_ty: &Type,
        c: &str,
        i: &str,
    ) -> String {
        match base_ty.kind {
            TypeKind::Hash => {
                let boxed_key = self.box_value(i, index_ty);
                self.unbox_value(&format!("__zn_hash_get({}, {})", c, boxed_key), elem_ty)
            }
            _ => self.unbox_value(&format!("__zn_arr_get({}, {})", c, i), elem_ty),
        }
    }

    fn emit_postfix(&mut self, node: &Node, buf: &mut CodeBuf) {
        let (op, target) = match &node.kind {
            NodeKind::Postfix { op, target } => (*op, target),
            _ => return,
        };
        let op_str = match op {
            PostfixOp::Increment => "++",
            PostfixOp::Decrement => "--",
        };

        if matches!(target.kind, NodeKind::Index { .. }) {
            // Rewrite as a read-modify-write.
            let delta = if op == PostfixOp::Increment { "+ 1" } else { "- 1" };
            if let NodeKind::Index { base, index } = &target.kind {
                let elem_ty = target.ty();
                let mut inner = CodeBuf::new_inline();
                let ct = self.fresh_tmp("c");
                let it = self.fresh_tmp("i");
                let base_expr = self.emit_expr(base);
                let index_expr = self.emit_expr(index);
                inner.stmt(&format!("{} = {};", self.c_decl(&base.ty(), &ct), base_expr));
                inner.stmt(&format!("{} = {};", self.c_decl(&index.ty(), &it), index_expr));
                let read = self.index_rmw_read(&base.ty(), &elem_ty, &index.ty(), &ct, &it);
                let vt = self.fresh_tmp("v");
                inner.stmt(&format!(
                    "{} = ({} {});",
                    self.c_decl(&elem_ty, &vt),
                    read,
                    delta
                ));
                let boxed = self.box_value(&vt, &elem_ty);
                match base.ty().kind {
                    TypeKind::Hash => {
                        let boxed_key = self.box_value(&it, &index.ty());
                        inner.stmt(&format!("__zn_hash_set({}, {}, {});", ct, boxed_key, boxed));
                    }
                    _ => inner.stmt(&format!("__zn_arr_set({}, {}, {});", ct, it, boxed)),
                }
                buf.stmt(&format!("{{ {} }}", inner.buf));
            }
            return;
        }

        let lvalue = self.emit_lvalue(target);
        buf.stmt(&format!("{}{};", lvalue, op_str));
    }

    // ==================== Control flow ====================

    /// Narrowing applies on the emitter side only to value-kind
    /// optionals, whose identifiers unwrap through `._val`; reference
    /// optionals emit unchanged.
    fn narrow_value_target(cond: &Node) -> Option<String> {
        let name = SemanticAnalyzer::narrowing_target(cond)?;
        if let NodeKind::OptionalCheck { expr } = &cond.kind {
            if !expr.ty().is_reference() {
                return Some(name.to_string());
            }
        }
        None
    }

    /// `if` in statement position (capture None) or value position
    /// (capture Some((result var, result type))).
    fn emit_if(&mut self, node: &Node, buf: &mut CodeBuf, capture: Option<(&str, &Type)>) {
        let (cond, then_block, else_block) = match &node.kind {
            NodeKind::If {
                cond,
                then_block,
                else_block,
            } => (cond, then_block, else_block),
            _ => return,
        };

        let cond_expr = self.emit_expr(cond);
        let narrow = Self::narrow_value_target(cond);

        buf.open(&format!("if ({}) {{", cond_expr));
        if let Some(name) = &narrow {
            self.narrowed.push(name.clone());
        }
        self.emit_branch(then_block, buf, capture);
        if narrow.is_some() {
            self.narrowed.pop();
        }
        buf.close("}");

        if let Some(else_block) = else_block {
            buf.open("else {");
            self.emit_branch(else_block, buf, capture);
            buf.close("}");
        }
    }

    /// One branch block: statements, then (in value position) capture of
    /// the trailing expression into the result temporary, then scope
    /// releases. The capture retains before the releases run, so a
    /// result that references a dying binding survives.
    fn emit_branch(&mut self, block: &Node, buf: &mut CodeBuf, capture: Option<(&str, &Type)>) {
        let body = match &block.kind {
            NodeKind::Block { body } => body,
            _ => return,
        };
        self.arc_push(ScopeKind::Block);

        let split = match capture {
            Some(_) if !body.is_empty() => body.len() - 1,
            _ => body.len(),
        };
        for stmt in &body[..split] {
            self.emit_stmt(stmt, buf);
        }
        if let (Some((target, target_ty)), Some(last)) = (capture, body.get(split)) {
            if Self::is_terminator(last) || last.ty().is_void() {
                self.emit_stmt(last, buf);
                if Self::is_terminator(last) {
                    self.arc_pop_silent();
                    return;
                }
            } else {
                self.emit_capture(buf, target, target_ty, last);
            }
        } else if body.last().is_some_and(Self::is_terminator) {
            self.arc_pop_silent();
            return;
        }

        self.arc_pop(buf);
    }

    /// Capture a trailing expression into a declared result temporary:
    /// optional-wrap as needed, retain non-fresh reference results.
    fn emit_capture(&mut self, buf: &mut CodeBuf, target: &str, target_ty: &Type, value: &Node) {
        let value_ty = value.ty();
        let wrap = target_ty.is_optional && !target_ty.is_reference() && !value_ty.is_optional;
        let e = self.emit_expr(value);

        if wrap {
            buf.stmt(&format!("{}._has = true;", target));
            buf.stmt(&format!("{}._val = {};", target, e));
            if !value.is_fresh_alloc {
                if let Some(ret) =
                    self.retain_stmt(&format!("{}._val", target), &target_ty.required())
                {
                    buf.stmt(&ret);
                }
            }
        } else {
            buf.stmt(&format!("{} = {};", target, e));
            if !value.is_fresh_alloc {
                if let Some(ret) = self.retain_stmt(target, target_ty) {
                    buf.stmt(&ret);
                }
            }
        }
    }

    pub(crate) fn emit_if_value(&mut self, node: &Node) -> String {
        let ty = node.ty();
        let mut buf = CodeBuf::new_inline();
        let var = self.fresh_tmp("if");
        buf.stmt(&format!("{};", self.c_decl(&ty, &var)));
        self.init_result_var(&mut buf, &var, &ty);
        self.emit_if(node, &mut buf, Some((var.as_str(), &ty)));
        format!("({{ {} {}; }})", buf.buf, var)
    }

    /// "None" initialization for an optional or reference result slot.
    fn init_result_var(&mut self, buf: &mut CodeBuf, var: &str, ty: &Type) {
        if ty.is_reference() {
            buf.stmt(&format!("{} = NULL;", var));
        } else if ty.is_optional {
            buf.stmt(&format!("{}._has = false;", var));
        }
    }

    fn emit_while(&mut self, node: &Node, buf: &mut CodeBuf, result: Option<LoopResult>) {
        let (cond, body) = match &node.kind {
            NodeKind::While { cond, body } => (cond, body),
            _ => return,
        };
        let cond_expr = self.emit_expr(cond);
        buf.open(&format!("while ({}) {{", cond_expr));
        self.arc_push(ScopeKind::Loop {
            result,
            continue_label: None,
        });
        self.emit_block_inner(body, buf);
        self.arc_pop_silent();
        buf.close("}");
    }

    pub(crate) fn emit_while_value(&mut self, node: &Node) -> String {
        let ty = node.ty();
        let mut buf = CodeBuf::new_inline();
        let var = self.fresh_tmp("loop");
        buf.stmt(&format!("{};", self.c_decl(&ty, &var)));
        self.init_result_var(&mut buf, &var, &ty);
        self.emit_while(
            node,
            &mut buf,
            Some(LoopResult {
                var: var.clone(),
                ty: ty.clone(),
            }),
        );
        format!("({{ {} {}; }})", buf.buf, var)
    }

    fn emit_for(&mut self, node: &Node, buf: &mut CodeBuf, result: Option<LoopResult>) {
        let (init, cond, step, body) = match &node.kind {
            NodeKind::For {
                init,
                cond,
                step,
                body,
            } => (init, cond, step, body),
            _ => return,
        };

        // Wrapper block: the init binding outlives iterations and
        // releases when the wrapper exits.
        buf.open("{");
        self.arc_push(ScopeKind::Block);
        if let Some(init) = init {
            self.emit_stmt(init, buf);
        }

        let label = if step.is_some() && Self::contains_continue(body) {
            Some(self.fresh_tmp("cont"))
        } else {
            None
        };

        buf.open("for (;;) {");
        if let Some(cond) = cond {
            let cond_expr = self.emit_expr(cond);
            buf.stmt(&format!("if (!({})) break;", cond_expr));
        }
        self.arc_push(ScopeKind::Loop {
            result,
            continue_label: label.clone(),
        });
        self.emit_block_inner(body, buf);
        self.arc_pop_silent();
        if let Some(label) = &label {
            buf.stmt(&format!("{}:;", label));
        }
        if let Some(step) = step {
            self.emit_stmt(step, buf);
        }
        buf.close("}");

        self.arc_pop(buf);
        buf.close("}");
    }

    pub(crate) fn emit_for_value(&mut self, node: &Node) -> String {
        let ty = node.ty();
        let mut buf = CodeBuf::new_inline();
        let var = self.fresh_tmp("loop");
        buf.stmt(&format!("{};", self.c_decl(&ty, &var)));
        self.init_result_var(&mut buf, &var, &ty);
        self.emit_for(
            node,
            &mut buf,
            Some(LoopResult {
                var: var.clone(),
                ty: ty.clone(),
            }),
        );
        format!("({{ {} {}; }})", buf.buf, var)
    }

    /// Whether a loop body contains a `continue` binding to this loop
    /// (not to a nested one). Decides whether a `for` lowering needs a
    /// step label.
    fn contains_continue(node: &Node) -> bool {
        match &node.kind {
            NodeKind::Continue { .. } => true,
            NodeKind::While { .. } | NodeKind::For { .. } => false,
            NodeKind::Block { body } => body.iter().any(Self::contains_continue),
            NodeKind::If {
                cond,
                then_block,
                else_block,
            } => {
                Self::contains_continue(cond)
                    || Self::contains_continue(then_block)
                    || else_block.as_deref().is_some_and(Self::contains_continue)
            }
            NodeKind::Decl { init, .. } => Self::contains_continue(init),
            NodeKind::Assign { target, value } => {
                Self::contains_continue(target) || Self::contains_continue(value)
            }
            NodeKind::CompoundAssign { target, value, .. } => {
                Self::contains_continue(target) || Self::contains_continue(value)
            }
            NodeKind::Binary { lhs, rhs, .. } => {
                Self::contains_continue(lhs) || Self::contains_continue(rhs)
            }
            NodeKind::Unary { expr, .. } | NodeKind::OptionalCheck { expr } => {
                Self::contains_continue(expr)
            }
            NodeKind::Call { args, .. } => args.iter().any(Self::contains_continue),
            NodeKind::NamedArg { value, .. } => Self::contains_continue(value),
            NodeKind::Return { value } => {
                value.as_deref().is_some_and(Self::contains_continue)
            }
            NodeKind::Break { value } => value.as_deref().is_some_and(Self::contains_continue),
            _ => false,
        }
    }

    // ==================== Jumps ====================

    fn emit_jump(&mut self, node: &Node, buf: &mut CodeBuf) {
        let (is_break, value) = match &node.kind {
            NodeKind::Break { value } => (true, value),
            NodeKind::Continue { value } => (false, value),
            _ => return,
        };

        let (result, continue_label) = self.current_loop();

        // A carried value in a statement-position loop has no result
        // slot; it still evaluates, for its effects.
        if result.is_none() {
            if let Some(value) = value {
                self.emit_stmt(value, buf);
            }
        }

        // Assign the loop result before the jump. Continue may run
        // again, so any previous result is released first (the slot
        // starts as "none" and release helpers tolerate that).
        if let (Some(result), Some(value)) = (&result, value) {
            let value_ty = value.ty();
            let wrap =
                result.ty.is_optional && !result.ty.is_reference() && !value_ty.is_optional;
            let tmp_ty = if wrap {
                result.ty.required()
            } else {
                result.ty.clone()
            };

            let mut inner = CodeBuf::new_inline();
            let t = self.fresh_tmp("jv");
            let e = self.emit_expr(value);
            inner.stmt(&format!("{} = {};", self.c_decl(&tmp_ty, &t), e));
            if !value.is_fresh_alloc {
                if let Some(ret) = self.retain_stmt(&t, &tmp_ty) {
                    inner.stmt(&ret);
                }
            }
            if let Some(rel) = self.release_stmt(&result.var, &result.ty) {
                inner.stmt(&rel);
            }
            if wrap {
                inner.stmt(&format!("{}._has = true;", result.var));
                inner.stmt(&format!("{}._val = {};", result.var, t));
            } else {
                inner.stmt(&format!("{} = {};", result.var, t));
            }
            buf.stmt(&format!("{{ {} }}", inner.buf));
        }

        self.emit_releases_to_loop(buf);

        if is_break {
            buf.stmt("break;");
        } else {
            match continue_label {
                Some(label) => buf.stmt(&format!("goto {};", label)),
                None => buf.stmt("continue;"),
            }
        }
    }

    // ==================== Returns and functions ====================

    fn zero_value(&self, ty: &Type) -> String {
        if ty.is_reference() {
            return "NULL".to_string();
        }
        if ty.is_optional || ty.kind == TypeKind::Struct {
            return format!("(({}){{0}})", self.c_type(ty));
        }
        match ty.kind {
            TypeKind::Float => "0.0".to_string(),
            TypeKind::Bool => "false".to_string(),
            TypeKind::Char => "'\\0'".to_string(),
            _ => "0".to_string(),
        }
    }

    fn emit_return(&mut self, node: &Node, buf: &mut CodeBuf) {
        let value = match &node.kind {
            NodeKind::Return { value } => value,
            _ => return,
        };
        let ret_ty = self
            .current_fn_ret
            .clone()
            .unwrap_or_else(|| Type::new(TypeKind::Void));

        match value {
            None => {
                self.emit_releases_to_function(buf);
                if ret_ty.is_void() {
                    buf.stmt("return;");
                } else {
                    buf.stmt(&format!("return {};", self.zero_value(&ret_ty)));
                }
            }
            Some(value) => self.emit_return_value(value, &ret_ty, buf),
        }
    }

    /// Return with a value: the value is captured (and a reference-kind
    /// result retained) into a temporary *before* the scope releases
    /// run, then returned.
    pub(crate) fn emit_return_value(&mut self, value: &Node, ret_ty: &Type, buf: &mut CodeBuf) {
        if ret_ty.is_void() {
            // Void function whose trailing expression still runs for
            // effect.
            self.emit_stmt(value, buf);
            self.emit_releases_to_function(buf);
            buf.stmt("return;");
            return;
        }

        let t = self.fresh_tmp("ret");
        buf.stmt(&format!("{};", self.c_decl(ret_ty, &t)));
        if ret_ty.is_optional && !ret_ty.is_reference() && !value.ty().is_optional {
            buf.stmt(&format!("{}._has = false;", t));
        }
        self.emit_capture(buf, &t, ret_ty, value);
        self.emit_releases_to_function(buf);
        buf.stmt(&format!("return {};", t));
    }

    pub(crate) fn emit_function(&mut self, node: &Node, out: &mut String) {
        let (name, body) = match &node.kind {
            NodeKind::FuncDef { name, body, .. } => (name.clone(), body),
            _ => return,
        };
        let sig = match self.sema.fn_sig(&name) {
            Some(sig) => sig.clone(),
            None => return,
        };

        let params = if sig.params.is_empty() {
            "void".to_string()
        } else {
            sig.params
                .iter()
                .map(|(pname, pty)| self.c_decl(pty, pname))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let ret_c = self.c_type(&sig.ret);
        let sep = if ret_c.ends_with('*') { "" } else { " " };

        let mut buf = CodeBuf::new(0);
        self.line_directive(&mut buf, node.line);
        buf.open(&format!(
            "{}{}{}({}) {{",
            ret_c,
            sep,
            Self::c_fn_name(&name),
            params
        ));

        self.arc_push(ScopeKind::Function);
        self.current_fn_ret = Some(sig.ret.clone());

        let body_stmts: &[Node] = match &body.kind {
            NodeKind::Block { body } => body,
            _ => &[],
        };

        let implicit = !sig.ret.is_void()
            && body_stmts
                .last()
                .is_some_and(|last| !Self::is_terminator(last) && !last.ty().is_void());
        let split = if implicit {
            body_stmts.len() - 1
        } else {
            body_stmts.len()
        };

        for stmt in &body_stmts[..split] {
            self.emit_stmt(stmt, &mut buf);
        }

        if implicit {
            // Implicit return of the trailing expression.
            if let Some(last) = body_stmts.get(split) {
                self.line_directive(&mut buf, last.line);
                self.emit_return_value(last, &sig.ret.clone(), &mut buf);
            }
            self.arc_pop_silent();
        } else if body_stmts.last().is_some_and(Self::is_terminator) {
            self.arc_pop_silent();
        } else {
            self.arc_pop(&mut buf);
            if !sig.ret.is_void() {
                // Fell off the end of a value-returning function.
                buf.stmt(&format!("return {};", self.zero_value(&sig.ret)));
            }
        }

        self.current_fn_ret = None;
        buf.close("}");
        out.push_str(&buf.buf);
        out.push('\n');
    }
}
