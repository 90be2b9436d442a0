// C code generation.
//
// The emitter runs only over a cleanly analyzed tree: every expression
// node carries a resolved type and the fresh-allocation markers are in
// place. Expression-oriented control flow lowers to GNU statement
// expressions; reference-kind values get retain/release emission per
// the ARC contract (see the arc module).

mod arc;
mod ctypes;
mod exprs;
mod layout;
mod stmts;
mod strings;

use crate::sema::SemanticAnalyzer;
use arc::ArcScope;
pub(crate) use arc::{LoopResult, ScopeKind};
use zinc_ast::Program;

/// The two generated files.
#[derive(Debug, Clone)]
pub struct GeneratedCode {
    pub header: String,
    pub unit: String,
}

pub struct CodeGenerator<'a> {
    pub(crate) sema: &'a SemanticAnalyzer,
    /// Input path, used only for `#line` directives.
    pub(crate) source_path: String,
    /// Output base name: `<base>.c` / `<base>.h`.
    pub(crate) base: String,
    tmp: u32,
    pub(crate) arc: Vec<ArcScope>,
    /// Identifiers currently narrowed to a non-optional value kind;
    /// references to them emit the `._val` unwrap. Mirrors the
    /// analyzer's narrowing scopes.
    pub(crate) narrowed: Vec<String>,
    /// Return type of the function currently being emitted.
    pub(crate) current_fn_ret: Option<zinc_ast::Type>,
}

impl<'a> CodeGenerator<'a> {
    pub fn new(sema: &'a SemanticAnalyzer, source_path: &str, base: &str) -> Self {
        Self {
            sema,
            source_path: source_path.to_string(),
            base: base.to_string(),
            tmp: 0,
            arc: Vec::new(),
            narrowed: Vec::new(),
            current_fn_ret: None,
        }
    }

    pub fn generate(&mut self, program: &Program) -> GeneratedCode {
        log::debug!("emitting C for base '{}'", self.base);
        let header = self.emit_header(program);
        let unit = self.emit_unit(program);
        GeneratedCode { header, unit }
    }

    /// Unique temporary name; the shared counter keeps nested statement
    /// expressions from colliding.
    pub(crate) fn fresh_tmp(&mut self, prefix: &str) -> String {
        let n = self.tmp;
        self.tmp += 1;
        format!("__{}_{}", prefix, n)
    }

    pub(crate) fn line_directive(&self, buf: &mut CodeBuf, line: u32) {
        if !buf.inline && line > 0 {
            buf.stmt(&format!(
                "#line {} \"{}\"",
                line,
                self.source_path.replace('\\', "\\\\")
            ));
        }
    }
}

/// Output buffer for statement emission. In block mode statements land
/// one per line with indentation; in inline mode (inside a statement
/// expression) they are space-separated and `#line` directives are
/// suppressed.
pub(crate) struct CodeBuf {
    pub buf: String,
    pub indent: usize,
    pub inline: bool,
}

impl CodeBuf {
    pub fn new(indent: usize) -> Self {
        Self {
            buf: String::new(),
            indent,
            inline: false,
        }
    }

    pub fn new_inline() -> Self {
        Self {
            buf: String::new(),
            indent: 0,
            inline: true,
        }
    }

    /// Append one complete statement (or brace line).
    pub fn stmt(&mut self, s: &str) {
        if self.inline {
            if !self.buf.is_empty() {
                self.buf.push(' ');
            }
            self.buf.push_str(s);
        } else {
            for _ in 0..self.indent {
                self.buf.push_str("    ");
            }
            self.buf.push_str(s);
            self.buf.push('\n');
        }
    }

    /// Append an opening line (`if (...) {`) and indent.
    pub fn open(&mut self, s: &str) {
        self.stmt(s);
        if !self.inline {
            self.indent += 1;
        }
    }

    /// Close a brace opened with `open`.
    pub fn close(&mut self, s: &str) {
        if !self.inline {
            self.indent = self.indent.saturating_sub(1);
        }
        self.stmt(s);
    }

    pub fn blank(&mut self) {
        if !self.inline {
            self.buf.push('\n');
        }
    }
}
