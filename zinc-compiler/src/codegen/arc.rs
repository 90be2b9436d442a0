// ARC scope tracking for the emitter: a stack of scopes mirroring the
// lexical blocks of the function being emitted. Each scope records the
// reference-carrying bindings declared in it, so normal exits release
// them in reverse declaration order and early exits (break, continue,
// return) can walk the stack and release everything between the current
// point and the jump target.

use super::{CodeBuf, CodeGenerator};
use zinc_ast::Type;

/// What kind of region an ARC scope covers.
#[derive(Debug, Clone)]
pub(crate) enum ScopeKind {
    Block,
    Loop {
        /// Result temporary for expression-valued loops.
        result: Option<LoopResult>,
        /// `goto` label continue must jump to in `for` loops (so the
        /// step clause still runs); plain `continue` elsewhere.
        continue_label: Option<String>,
    },
    Function,
}

#[derive(Debug, Clone)]
pub(crate) struct LoopResult {
    pub var: String,
    pub ty: Type,
}

#[derive(Debug, Clone)]
pub(crate) struct ArcBinding {
    pub name: String,
    pub ty: Type,
}

#[derive(Debug)]
pub(crate) struct ArcScope {
    pub kind: ScopeKind,
    pub bindings: Vec<ArcBinding>,
}

impl<'a> CodeGenerator<'a> {
    pub(crate) fn arc_push(&mut self, kind: ScopeKind) {
        self.arc.push(ArcScope {
            kind,
            bindings: Vec::new(),
        });
    }

    /// Track a binding in the innermost scope, if its type carries
    /// references.
    pub(crate) fn arc_track(&mut self, name: &str, ty: &Type) {
        if !self.needs_arc(ty) {
            return;
        }
        if let Some(scope) = self.arc.last_mut() {
            scope.bindings.push(ArcBinding {
                name: name.to_string(),
                ty: ty.clone(),
            });
        }
    }

    /// Emit the releases for the innermost scope (reverse declaration
    /// order) and pop it. Used on normal fall-through exits.
    pub(crate) fn arc_pop(&mut self, buf: &mut CodeBuf) {
        if let Some(scope) = self.arc.pop() {
            self.emit_scope_releases(&scope, buf);
        }
    }

    /// Pop without emitting releases: for paths that already emitted
    /// them (a block whose last statement was a jump or return).
    pub(crate) fn arc_pop_silent(&mut self) {
        self.arc.pop();
    }

    fn emit_scope_releases(&self, scope: &ArcScope, buf: &mut CodeBuf) {
        for binding in scope.bindings.iter().rev() {
            if let Some(stmt) = self.release_stmt(&binding.name, &binding.ty) {
                buf.stmt(&stmt);
            }
        }
    }

    /// Releases for a `break`/`continue`: every binding between the
    /// current scope and the nearest loop scope, inclusive. The stack is
    /// not popped; the emitter continues in the same lexical position.
    pub(crate) fn emit_releases_to_loop(&self, buf: &mut CodeBuf) {
        for scope in self.arc.iter().rev() {
            self.emit_scope_releases(scope, buf);
            if matches!(scope.kind, ScopeKind::Loop { .. }) {
                break;
            }
        }
    }

    /// Releases for a `return`: every binding in every scope up to and
    /// including the function scope.
    pub(crate) fn emit_releases_to_function(&self, buf: &mut CodeBuf) {
        for scope in self.arc.iter().rev() {
            self.emit_scope_releases(scope, buf);
            if matches!(scope.kind, ScopeKind::Function) {
                break;
            }
        }
    }

    /// The innermost loop scope's result slot and continue label.
    pub(crate) fn current_loop(&self) -> (Option<LoopResult>, Option<String>) {
        for scope in self.arc.iter().rev() {
            if let ScopeKind::Loop {
                result,
                continue_label,
            } = &scope.kind
            {
                return (result.clone(), continue_label.clone());
            }
        }
        (None, None)
    }
}
