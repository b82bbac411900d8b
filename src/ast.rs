#[derive(Debug, Clone, PartialEq)]
pub enum BinOp {
    Eq,
    NotEq,
    Add,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    StringLit(String),
    BoolLit(bool),
    IntLit(i64),
    FloatLit(f64),
    Var(String),
    Attribute(Box<Expr>, String), // foo.bar
    Index(Box<Expr>, Box<Expr>),  // foo['bar'], items[0]
    Not(Box<Expr>),
    BinOp(Box<Expr>, BinOp, Box<Expr>),
}

/// One node of a parsed template. Trees are built once by the parser and
/// are immutable afterwards, so the same template can be rendered against
/// any number of data sets.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    Var(Expr),
    For {
        target: String,
        iterable: Expr,
        body: Vec<Node>,
    },
    If {
        /// (condition, body) pairs: the `if` arm followed by any `elif` arms.
        cases: Vec<(Expr, Vec<Node>)>,
        else_body: Option<Vec<Node>>,
    },
}
