// String lowering: literal statics, concat chains, strcmp comparisons.

use super::{CodeBuf, CodeGenerator};
use zinc_ast::{BinaryOp, Node, NodeKind, TypeKind};

/// Escape text into a C string-literal body. Non-printable and
/// non-ASCII bytes use three-digit octal escapes, which cannot absorb
/// following digits the way hex escapes do.
pub(crate) fn c_string_escape(s: &str) -> String {
    let mut out = String::new();
    for &b in s.as_bytes() {
        match b {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            0x20..=0x7e => out.push(b as char),
            _ => out.push_str(&format!("\\{:03o}", b)),
        }
    }
    out
}

/// Escape a char into a C character-literal body.
pub(crate) fn c_char_escape(c: char) -> String {
    match c {
        '\'' => "\\'".to_string(),
        '\\' => "\\\\".to_string(),
        '\n' => "\\n".to_string(),
        '\r' => "\\r".to_string(),
        '\t' => "\\t".to_string(),
        '\0' => "\\0".to_string(),
        c if c.is_ascii_graphic() || c == ' ' => c.to_string(),
        c => format!("\\{:03o}", (c as u32) & 0xff),
    }
}

impl<'a> CodeGenerator<'a> {
    pub(crate) fn string_literal_expr(&self, id: u32) -> String {
        format!("(ZnString *)&__zn_lit_{}", id)
    }

    /// Emit the static structs backing every string literal in the
    /// program. `_rc = -1` marks them static: retain/release are no-ops.
    pub(crate) fn emit_string_statics(&self, out: &mut String) {
        for (i, text) in self.sema.string_table.iter().enumerate() {
            let len = text.as_bytes().len();
            out.push_str(&format!(
                "static struct {{ int32_t _rc; int32_t _len; char _data[{}]; }} __zn_lit_{} = {{ -1, {}, \"{}\" }};\n",
                len + 1,
                i,
                len,
                c_string_escape(text)
            ));
        }
    }

    /// Flatten a `+` tree whose resolved type is string into its leaf
    /// sequence, left to right.
    fn flatten_concat<'n>(node: &'n Node, leaves: &mut Vec<&'n Node>) {
        if node.ty().kind == TypeKind::String {
            if let NodeKind::Binary {
                op: BinaryOp::Add,
                lhs,
                rhs,
            } = &node.kind
            {
                Self::flatten_concat(lhs, leaves);
                Self::flatten_concat(rhs, leaves);
                return;
            }
        }
        leaves.push(node);
    }

    /// Lower a string-typed `+` tree: coerce non-string leaves through
    /// the runtime helpers, then chain concats left to right, releasing
    /// every coercion temporary and every non-final intermediate. The
    /// result is a fresh string.
    pub(crate) fn emit_concat(&mut self, node: &Node) -> String {
        let mut leaves = Vec::new();
        Self::flatten_concat(node, &mut leaves);

        let mut buf = CodeBuf::new_inline();
        let mut parts: Vec<(String, bool)> = Vec::new();

        for leaf in &leaves {
            let expr = self.emit_expr(leaf);
            let tmp = self.fresh_tmp("cat");
            let ty = leaf.ty();
            let (init, owned) = match ty.kind {
                TypeKind::String => (expr, leaf.is_fresh_alloc),
                TypeKind::Int => (format!("__zn_str_from_int({})", expr), true),
                TypeKind::Float => (format!("__zn_str_from_float({})", expr), true),
                TypeKind::Bool => (format!("__zn_str_from_bool({})", expr), true),
                TypeKind::Char => (format!("__zn_str_from_char({})", expr), true),
                _ => (format!("__zn_str_from_int({})", expr), true),
            };
            buf.stmt(&format!("ZnString *{} = {};", tmp, init));
            parts.push((tmp, owned));
        }

        let mut parts = parts.into_iter();
        let (mut acc, mut acc_owned) = match parts.next() {
            Some(p) => p,
            None => return "NULL".to_string(),
        };

        for (name, owned) in parts {
            let next = self.fresh_tmp("cat");
            buf.stmt(&format!(
                "ZnString *{} = __zn_str_concat({}, {});",
                next, acc, name
            ));
            if acc_owned {
                buf.stmt(&format!("__zn_str_release({});", acc));
            }
            if owned {
                buf.stmt(&format!("__zn_str_release({});", name));
            }
            acc = next;
            acc_owned = true;
        }

        format!("({{ {} {}; }})", buf.buf, acc)
    }

    /// String comparison lowers to `strcmp` of the `_data` members.
    /// Fresh operands are captured and released around the comparison.
    pub(crate) fn emit_string_compare(&mut self, op: BinaryOp, lhs: &Node, rhs: &Node) -> String {
        let l = self.emit_expr(lhs);
        let r = self.emit_expr(rhs);

        if !lhs.is_fresh_alloc && !rhs.is_fresh_alloc {
            return format!(
                "(strcmp(({})->_data, ({})->_data) {} 0)",
                l,
                r,
                op.symbol()
            );
        }

        let mut buf = CodeBuf::new_inline();
        let lt = self.fresh_tmp("cmp");
        let rt = self.fresh_tmp("cmp");
        let res = self.fresh_tmp("cmp");
        buf.stmt(&format!("ZnString *{} = {};", lt, l));
        buf.stmt(&format!("ZnString *{} = {};", rt, r));
        buf.stmt(&format!(
            "bool {} = (strcmp({}->_data, {}->_data) {} 0);",
            res,
            lt,
            rt,
            op.symbol()
        ));
        if lhs.is_fresh_alloc {
            buf.stmt(&format!("__zn_str_release({});", lt));
        }
        if rhs.is_fresh_alloc {
            buf.stmt(&format!("__zn_str_release({});", rt));
        }
        format!("({{ {} {}; }})", buf.buf, res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_plain_and_quotes() {
        assert_eq!(c_string_escape(r#"a"b\c"#), r#"a\"b\\c"#);
        assert_eq!(c_string_escape("line\n"), "line\\n");
    }

    #[test]
    fn test_escape_non_ascii_uses_octal() {
        // U+00E9 is 0xC3 0xA9 in UTF-8.
        assert_eq!(c_string_escape("é"), "\\303\\251");
    }

    #[test]
    fn test_char_escape() {
        assert_eq!(c_char_escape('a'), "a");
        assert_eq!(c_char_escape('\''), "\\'");
        assert_eq!(c_char_escape('\n'), "\\n");
    }
}
