use serde::{Deserialize, Serialize};
use std::fmt;

/// Root of the Abstract Syntax Tree: the top-level items of one source file
/// (function definitions, struct/class definitions, extern blocks).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub items: Vec<Node>,
}

/// The kind of a resolved type.
///
/// `String`, `Class`, `Array` and `Hash` are the *reference kinds*: their
/// runtime values are reference counted and participate in retain/release
/// emission. Everything else is a value kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeKind {
    Unknown,
    Int,
    Float,
    Bool,
    Char,
    Void,
    String,
    Struct,
    Class,
    Array,
    Hash,
}

impl TypeKind {
    pub fn is_reference(self) -> bool {
        matches!(
            self,
            TypeKind::String | TypeKind::Class | TypeKind::Array | TypeKind::Hash
        )
    }
}

/// A fully resolved type, as attached to AST nodes by semantic analysis.
///
/// Equality is structural: same kind, same optionality, same name for
/// struct/class, and recursively equal element/key types for collections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Type {
    pub kind: TypeKind,
    pub is_optional: bool,
    /// Canonical name for struct/class types (user-given or generated).
    pub name: Option<String>,
    /// Array element type, or hash value type.
    pub elem: Option<Box<Type>>,
    /// Hash key type.
    pub key: Option<Box<Type>>,
}

impl Type {
    pub fn new(kind: TypeKind) -> Self {
        Self {
            kind,
            is_optional: false,
            name: None,
            elem: None,
            key: None,
        }
    }

    pub fn named(kind: TypeKind, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::new(kind)
        }
    }

    pub fn array(elem: Type) -> Self {
        Self {
            elem: Some(Box::new(elem)),
            ..Self::new(TypeKind::Array)
        }
    }

    pub fn hash(key: Type, value: Type) -> Self {
        Self {
            key: Some(Box::new(key)),
            elem: Some(Box::new(value)),
            ..Self::new(TypeKind::Hash)
        }
    }

    /// The same type with `is_optional` set.
    pub fn optional(mut self) -> Self {
        self.is_optional = true;
        self
    }

    /// The same type with `is_optional` cleared (used by narrowing).
    pub fn required(&self) -> Self {
        let mut t = self.clone();
        t.is_optional = false;
        t
    }

    pub fn is_reference(&self) -> bool {
        self.kind.is_reference()
    }

    pub fn is_void(&self) -> bool {
        self.kind == TypeKind::Void
    }

    pub fn is_unknown(&self) -> bool {
        self.kind == TypeKind::Unknown
    }

    /// The canonical-name component for this type, used when generating
    /// anonymous tuple/object type names: `int`, `float`, `str`, `bool`,
    /// `char`, `arr`, `hash`, or the struct/class name.
    pub fn suffix(&self) -> String {
        match self.kind {
            TypeKind::Int => "int".to_string(),
            TypeKind::Float => "float".to_string(),
            TypeKind::Bool => "bool".to_string(),
            TypeKind::Char => "char".to_string(),
            TypeKind::String => "str".to_string(),
            TypeKind::Array => "arr".to_string(),
            TypeKind::Hash => "hash".to_string(),
            TypeKind::Struct | TypeKind::Class => {
                self.name.clone().unwrap_or_else(|| "struct".to_string())
            }
            TypeKind::Void => "void".to_string(),
            TypeKind::Unknown => "unknown".to_string(),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TypeKind::Unknown => write!(f, "unknown")?,
            TypeKind::Int => write!(f, "int")?,
            TypeKind::Float => write!(f, "float")?,
            TypeKind::Bool => write!(f, "bool")?,
            TypeKind::Char => write!(f, "char")?,
            TypeKind::Void => write!(f, "void")?,
            TypeKind::String => write!(f, "string")?,
            TypeKind::Struct | TypeKind::Class => match &self.name {
                Some(n) => write!(f, "{}", n)?,
                None => write!(f, "<anonymous>")?,
            },
            TypeKind::Array => match &self.elem {
                Some(e) => write!(f, "[{}]", e)?,
                None => write!(f, "[?]")?,
            },
            TypeKind::Hash => match (&self.key, &self.elem) {
                (Some(k), Some(v)) => write!(f, "{{{}: {}}}", k, v)?,
                _ => write!(f, "{{?: ?}}")?,
            },
        }
        if self.is_optional {
            write!(f, "?")?;
        }
        Ok(())
    }
}

/// A parser-side type annotation, before struct/class resolution.
///
/// Carries the same shape as [`Type`] plus the `is_object`/`is_tuple`
/// flags and the named-field list used to describe anonymous composite
/// types written in annotations, e.g. `(x: int, y: int)` or
/// `{name: string, age: int}`. Semantic analysis converts a `TypeInfo`
/// into a [`Type`] and may register new anonymous types as a side effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeInfo {
    pub kind: TypeKind,
    pub is_optional: bool,
    /// Named struct/class annotation (`Pt`, `Node?`).
    pub name: Option<String>,
    /// Array element / hash value annotation.
    pub elem: Option<Box<TypeInfo>>,
    /// Hash key annotation.
    pub key: Option<Box<TypeInfo>>,
    pub is_object: bool,
    pub is_tuple: bool,
    /// Component fields of an anonymous tuple/object annotation. Tuple
    /// components may be unnamed.
    pub fields: Vec<TypeInfoField>,
}

/// One component of an anonymous tuple/object type annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeInfoField {
    pub name: Option<String>,
    pub info: TypeInfo,
}

impl TypeInfo {
    pub fn new(kind: TypeKind) -> Self {
        Self {
            kind,
            is_optional: false,
            name: None,
            elem: None,
            key: None,
            is_object: false,
            is_tuple: false,
            fields: Vec::new(),
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::new(TypeKind::Struct)
        }
    }

    pub fn optional(mut self) -> Self {
        self.is_optional = true;
        self
    }
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

impl BinaryOp {
    /// The C spelling of the operator.
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::NotEq
                | BinaryOp::Lt
                | BinaryOp::LtEq
                | BinaryOp::Gt
                | BinaryOp::GtEq
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg, // -
    Pos, // +
    Not, // !
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Pos => "+",
            UnaryOp::Not => "!",
        }
    }
}

/// Postfix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostfixOp {
    Increment, // ++
    Decrement, // --
}

/// Function parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub annotation: TypeInfo,
    pub line: u32,
}

/// Struct/class field definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub annotation: TypeInfo,
    /// `let`-declared field: cannot be reassigned after construction.
    pub is_const: bool,
    /// `weak var` field: not retained on assignment, not released on
    /// destruction. Only legal on class-typed fields of classes.
    pub is_weak: bool,
    pub default: Option<Node>,
    pub line: u32,
}

/// One component of a tuple literal; positional components have no name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TupleElem {
    pub name: Option<String>,
    pub value: Node,
}

/// An AST node.
///
/// Every node carries its source line, the `resolved_type` filled in by
/// semantic analysis, and the `is_fresh_alloc` marker set on expressions
/// that produce a freshly allocated reference (refcount 1, not yet shared
/// with any binding).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub line: u32,
    pub resolved_type: Option<Type>,
    pub is_fresh_alloc: bool,
    pub kind: NodeKind,
}

impl Node {
    pub fn new(line: u32, kind: NodeKind) -> Self {
        Self {
            line,
            resolved_type: None,
            is_fresh_alloc: false,
            kind,
        }
    }

    /// The resolved type of this node, defaulting to `unknown` when the
    /// node was never reached by analysis.
    pub fn ty(&self) -> Type {
        self.resolved_type
            .clone()
            .unwrap_or_else(|| Type::new(TypeKind::Unknown))
    }

    pub fn is_ident(&self) -> bool {
        matches!(self.kind, NodeKind::Ident(_))
    }
}

/// Node kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    // Literals
    IntLit(i64),
    FloatLit(f64),
    StrLit {
        value: String,
        /// Static-literal slot assigned during analysis; the emitter
        /// names the generated static `__zn_lit_<id>`.
        string_id: Option<u32>,
    },
    BoolLit(bool),
    CharLit(char),

    /// Identifier reference.
    Ident(String),

    /// Binary operation.
    Binary {
        op: BinaryOp,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },

    /// Unary operation.
    Unary { op: UnaryOp, expr: Box<Node> },

    /// Assignment: `target = value`.
    Assign {
        target: Box<Node>,
        value: Box<Node>,
    },

    /// Compound assignment: `target += value` etc.
    CompoundAssign {
        target: Box<Node>,
        op: BinaryOp,
        value: Box<Node>,
    },

    /// Postfix increment/decrement: `x++`, `x--`.
    Postfix { op: PostfixOp, target: Box<Node> },

    /// Variable declaration: `let`/`var`.
    Decl {
        mutable: bool,
        name: String,
        annotation: Option<TypeInfo>,
        init: Box<Node>,
    },

    /// `if cond { … } else { … }`. `unless` desugars here with a negated
    /// condition. Both branches are blocks; `if` is an expression.
    If {
        cond: Box<Node>,
        then_block: Box<Node>,
        else_block: Option<Box<Node>>,
    },

    /// `while cond { … }`. `until` desugars here with a negated condition.
    While { cond: Box<Node>, body: Box<Node> },

    /// C-style `for init; cond; step { … }`; every clause is optional.
    For {
        init: Option<Box<Node>>,
        cond: Option<Box<Node>>,
        step: Option<Box<Node>>,
        body: Box<Node>,
    },

    Break { value: Option<Box<Node>> },
    Continue { value: Option<Box<Node>> },

    /// Function definition.
    FuncDef {
        name: String,
        params: Vec<Param>,
        return_annotation: Option<TypeInfo>,
        body: Box<Node>,
    },

    /// Call, including struct/class instantiation (`is_struct_init` is
    /// set by the analyzer once the callee resolves to a registered type).
    Call {
        callee: String,
        args: Vec<Node>,
        is_struct_init: bool,
    },

    Return { value: Option<Box<Node>> },

    /// Field access. `is_dot_int` marks accesses the parser rewrote from
    /// `.0`/`.1` surface syntax to the `_0`/`_1` canonical field names.
    FieldAccess {
        base: Box<Node>,
        field: String,
        is_dot_int: bool,
    },

    /// Index access: `base[index]`.
    Index { base: Box<Node>, index: Box<Node> },

    /// Optional check: `expr?`.
    OptionalCheck { expr: Box<Node> },

    /// `struct`/`class` definition.
    TypeDef {
        name: String,
        is_class: bool,
        fields: Vec<FieldDef>,
    },

    /// Named argument in a struct/class instantiation.
    NamedArg { name: String, value: Box<Node> },

    /// Tuple literal: `(1, "x")` or `(x: 1, y: 2)`.
    Tuple { elems: Vec<TupleElem> },

    /// Object literal: `{name: "joe", age: 30}`, an anonymous class.
    ObjectLit { fields: Vec<(String, Node)> },

    /// Array literal: `[1, 2, 3]`.
    ArrayLit { elems: Vec<Node> },

    /// Hash literal: `{"a": 1, "b": 2}`.
    HashLit { pairs: Vec<(Node, Node)> },

    /// Typed empty array: `[int]`.
    TypedEmptyArray { elem: TypeInfo },

    /// Typed empty hash: `{string: int}`.
    TypedEmptyHash { key: TypeInfo, value: TypeInfo },

    /// `extern { … }` block.
    ExternBlock { items: Vec<Node> },

    /// Foreign function declaration inside an extern block.
    ExternFunc {
        name: String,
        params: Vec<Param>,
        return_annotation: Option<TypeInfo>,
    },

    /// Foreign variable declaration inside an extern block.
    ExternVar {
        name: String,
        annotation: TypeInfo,
        is_const: bool,
    },

    /// Statement block; its value is the value of its last expression.
    Block { body: Vec<Node> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_equality_is_structural() {
        let a = Type::array(Type::new(TypeKind::Int));
        let b = Type::array(Type::new(TypeKind::Int));
        let c = Type::array(Type::new(TypeKind::Float));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, a.clone().optional());
    }

    #[test]
    fn test_clone_is_deep() {
        let a = Type::array(Type::new(TypeKind::Int));
        let mut b = a.clone();
        if let Some(e) = b.elem.as_mut() {
            e.kind = TypeKind::Float;
        }
        assert_eq!(a.elem.as_deref(), Some(&Type::new(TypeKind::Int)));
    }

    #[test]
    fn test_suffixes() {
        assert_eq!(Type::new(TypeKind::String).suffix(), "str");
        assert_eq!(Type::new(TypeKind::Array).suffix(), "arr");
        assert_eq!(Type::named(TypeKind::Class, "P").suffix(), "P");
    }

    #[test]
    fn test_display() {
        let t = Type::hash(Type::new(TypeKind::String), Type::new(TypeKind::Int));
        assert_eq!(t.to_string(), "{string: int}");
        assert_eq!(
            Type::new(TypeKind::Int).optional().to_string(),
            "int?"
        );
    }

    #[test]
    fn test_serialization_round_trip() {
        let node = Node::new(
            3,
            NodeKind::Binary {
                op: BinaryOp::Add,
                lhs: Box::new(Node::new(3, NodeKind::IntLit(1))),
                rhs: Box::new(Node::new(3, NodeKind::IntLit(2))),
            },
        );
        let json = serde_json::to_string(&node).unwrap();
        let back: Node = serde_json::from_str(&json).unwrap();
        assert_eq!(node, back);
    }
}
