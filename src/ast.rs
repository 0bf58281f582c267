use crate::value::PhpString;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Protected,
    Private,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Protected => "protected",
            Visibility::Private => "private",
        }
    }
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ParamDef {
    pub(crate) name: String,
    pub(crate) default: Option<Expr>,
}

#[derive(Debug, Clone)]
pub(crate) struct FunctionDef {
    pub(crate) name: String,
    pub(crate) params: Vec<ParamDef>,
    pub(crate) body: Vec<Stmt>,
    pub(crate) line: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct PropertyDecl {
    pub(crate) name: String,
    pub(crate) visibility: Visibility,
    pub(crate) is_static: bool,
    pub(crate) default: Option<Expr>,
}

#[derive(Debug, Clone)]
pub(crate) struct ConstDecl {
    pub(crate) name: String,
    pub(crate) visibility: Visibility,
    pub(crate) value: Expr,
}

#[derive(Debug, Clone)]
pub(crate) struct MethodDecl {
    pub(crate) name: String,
    pub(crate) visibility: Visibility,
    pub(crate) is_static: bool,
    pub(crate) is_abstract: bool,
    pub(crate) params: Vec<ParamDef>,
    pub(crate) body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub(crate) struct ClassDecl {
    pub(crate) name: String,
    pub(crate) parent: Option<String>,
    pub(crate) is_abstract: bool,
    pub(crate) properties: Vec<PropertyDecl>,
    pub(crate) constants: Vec<ConstDecl>,
    pub(crate) methods: Vec<MethodDecl>,
    pub(crate) line: usize,
}

/// The class part of `X::member` and `new X`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ClassRef {
    Named(String),
    SelfRef,
    Parent,
    Static,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Concat,
    Eq,
    NotEq,
    Identical,
    NotIdentical,
    Lt,
    Le,
    Gt,
    Ge,
    Spaceship,
    And,
    Or,
    Xor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Not,
    Neg,
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CastKind {
    Int,
    Float,
    String,
    Bool,
    Array,
}

#[derive(Debug, Clone)]
pub(crate) struct ArrayItem {
    pub(crate) key: Option<Expr>,
    pub(crate) value: Expr,
}

#[derive(Debug, Clone)]
pub(crate) enum Expr {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(PhpString),
    Interpolated(Vec<Expr>),
    Var(String),
    This,
    /// A global constant such as `PHP_EOL`.
    Const(String),
    ArrayLiteral(Vec<ArrayItem>),
    /// `index: None` is the append form `$a[]`.
    Index {
        base: Box<Expr>,
        index: Option<Box<Expr>>,
    },
    Prop {
        object: Box<Expr>,
        name: String,
    },
    StaticProp {
        class: ClassRef,
        name: String,
    },
    ClassConst {
        class: ClassRef,
        name: String,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
    MethodCall {
        object: Box<Expr>,
        name: String,
        args: Vec<Expr>,
    },
    StaticCall {
        class: ClassRef,
        name: String,
        args: Vec<Expr>,
    },
    New {
        class: ClassRef,
        args: Vec<Expr>,
    },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    CompoundAssign {
        op: BinaryOp,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    CoalesceAssign {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    IncDec {
        target: Box<Expr>,
        increment: bool,
        prefix: bool,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Coalesce {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `then_expr: None` is the short form `a ?: b`.
    Ternary {
        cond: Box<Expr>,
        then_expr: Option<Box<Expr>>,
        else_expr: Box<Expr>,
    },
    InstanceOf {
        expr: Box<Expr>,
        class: ClassRef,
    },
    Cast {
        kind: CastKind,
        expr: Box<Expr>,
    },
    Isset(Vec<Expr>),
    Empty(Box<Expr>),
    Print(Box<Expr>),
}

impl Expr {
    /// Whether the expression can stand on the left of `=`.
    pub(crate) fn is_assignable(&self) -> bool {
        match self {
            Expr::Var(_) | Expr::Prop { .. } | Expr::StaticProp { .. } => true,
            Expr::Index { base, .. } => base.is_assignable(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Stmt {
    InlineHtml(String),
    Echo {
        args: Vec<Expr>,
        line: usize,
    },
    Expr {
        expr: Expr,
        line: usize,
    },
    Return {
        value: Option<Expr>,
        line: usize,
    },
    If {
        cond: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Vec<Stmt>,
        line: usize,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
        line: usize,
    },
    DoWhile {
        body: Vec<Stmt>,
        cond: Expr,
        line: usize,
    },
    For {
        init: Vec<Expr>,
        cond: Vec<Expr>,
        step: Vec<Expr>,
        body: Vec<Stmt>,
        line: usize,
    },
    Foreach {
        subject: Expr,
        key: Option<Expr>,
        value: Expr,
        body: Vec<Stmt>,
        line: usize,
    },
    Break(usize),
    Continue(usize),
    Block(Vec<Stmt>),
    Unset {
        targets: Vec<Expr>,
        line: usize,
    },
    FunctionDecl(FunctionDef),
    ClassDecl(ClassDecl),
}

impl Stmt {
    pub(crate) fn line(&self) -> Option<usize> {
        match self {
            Stmt::Echo { line, .. }
            | Stmt::Expr { line, .. }
            | Stmt::Return { line, .. }
            | Stmt::If { line, .. }
            | Stmt::While { line, .. }
            | Stmt::DoWhile { line, .. }
            | Stmt::For { line, .. }
            | Stmt::Foreach { line, .. }
            | Stmt::Unset { line, .. } => Some(*line),
            Stmt::FunctionDecl(def) => Some(def.line),
            Stmt::ClassDecl(decl) => Some(decl.line),
            Stmt::InlineHtml(_) | Stmt::Break(_) | Stmt::Continue(_) | Stmt::Block(_) => None,
        }
    }
}
