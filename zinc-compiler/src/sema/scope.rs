// Lexical scopes and symbols.

use std::collections::HashMap;
use zinc_ast::Type;

/// A named binding: variable, parameter, function, or extern.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub ty: Type,
    pub is_const: bool,
    pub is_function: bool,
    pub is_extern: bool,
    /// Parameter types; only meaningful for functions.
    pub params: Vec<Type>,
}

impl Symbol {
    pub fn var(name: impl Into<String>, ty: Type, is_const: bool) -> Self {
        Self {
            name: name.into(),
            ty,
            is_const,
            is_function: false,
            is_extern: false,
            params: Vec::new(),
        }
    }

    pub fn function(name: impl Into<String>, params: Vec<Type>, ret: Type) -> Self {
        Self {
            name: name.into(),
            ty: ret,
            is_const: true,
            is_function: true,
            is_extern: false,
            params,
        }
    }
}

/// Stack of lexical scopes. Pushed on function entry, block entry,
/// `for` init, and narrowed `if` then-branches; popped on exit.
#[derive(Debug, Default)]
pub struct ScopeStack {
    scopes: Vec<HashMap<String, Symbol>>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self {
            scopes: vec![HashMap::new()],
        }
    }

    pub fn push(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn pop(&mut self) {
        self.scopes.pop();
    }

    /// Bind `sym` in the innermost scope. Fails when the name already
    /// exists in that scope; shadowing across scopes is permitted.
    pub fn declare(&mut self, sym: Symbol) -> Result<(), ()> {
        let scope = match self.scopes.last_mut() {
            Some(s) => s,
            None => return Err(()),
        };
        if scope.contains_key(&sym.name) {
            return Err(());
        }
        scope.insert(sym.name.clone(), sym);
        Ok(())
    }

    /// Rebind `sym` in the innermost scope unconditionally. Used by
    /// narrowing, which shadows an outer binding in a freshly pushed
    /// scope.
    pub fn rebind(&mut self, sym: Symbol) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(sym.name.clone(), sym);
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.scopes.iter().rev().find_map(|s| s.get(name))
    }

    /// Retroactively fix a function symbol's return type once the first
    /// non-void `return` (or the trailing expression) pins it down.
    pub fn set_function_return(&mut self, name: &str, ret: Type) {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(sym) = scope.get_mut(name) {
                if sym.is_function {
                    sym.ty = ret;
                }
                return;
            }
        }
    }

    /// Every visible name, innermost first. Feeds "did you mean"
    /// suggestions.
    pub fn visible_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for scope in self.scopes.iter().rev() {
            names.extend(scope.keys().cloned());
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zinc_ast::TypeKind;

    #[test]
    fn test_shadowing_across_scopes() {
        let mut scopes = ScopeStack::new();
        scopes
            .declare(Symbol::var("x", Type::new(TypeKind::Int), false))
            .unwrap();
        scopes.push();
        scopes
            .declare(Symbol::var("x", Type::new(TypeKind::String), true))
            .unwrap();
        assert_eq!(scopes.lookup("x").unwrap().ty.kind, TypeKind::String);
        scopes.pop();
        assert_eq!(scopes.lookup("x").unwrap().ty.kind, TypeKind::Int);
    }

    #[test]
    fn test_duplicate_in_same_scope_fails() {
        let mut scopes = ScopeStack::new();
        scopes
            .declare(Symbol::var("x", Type::new(TypeKind::Int), false))
            .unwrap();
        assert!(scopes
            .declare(Symbol::var("x", Type::new(TypeKind::Int), false))
            .is_err());
    }

    #[test]
    fn test_function_return_update() {
        let mut scopes = ScopeStack::new();
        scopes
            .declare(Symbol::function("f", vec![], Type::new(TypeKind::Void)))
            .unwrap();
        scopes.set_function_return("f", Type::new(TypeKind::Int));
        assert_eq!(scopes.lookup("f").unwrap().ty.kind, TypeKind::Int);
    }
}
