use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum InterpolationSegment {
    Literal(String),
    Expression(Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,

    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,

    And,
    Or,
}

impl BinaryOp {
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::And => "&&",
            Self::Or => "||",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Const(Value),
    Load(String),

    Binary {
        op: BinaryOp,
        lhs: Box<Self>,
        rhs: Box<Self>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Self>,
    },

    Call {
        name: String,
        args: Vec<Self>,
    },
    MethodCall {
        target: Box<Self>,
        method: String,
        args: Vec<Self>,
    },

    InterpolatedString(Vec<InterpolationSegment>),
}

impl Expr {
    pub(crate) fn binary(op: BinaryOp, lhs: Self, rhs: Self) -> Self {
        Self::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub(crate) fn unary(op: UnaryOp, operand: Self) -> Self {
        Self::Unary {
            op,
            operand: Box::new(operand),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Assign {
        name: String,
        value: Expr,
        line: usize,
    },
    Expr {
        expr: Expr,
        line: usize,
    },
    If {
        condition: Expr,
        then_branch: Vec<Self>,
        else_branch: Vec<Self>,
        line: usize,
    },
    While {
        condition: Expr,
        body: Vec<Self>,
        line: usize,
    },
}

impl Stmt {
    #[must_use]
    pub const fn line(&self) -> usize {
        match self {
            Self::Assign { line, .. }
            | Self::Expr { line, .. }
            | Self::If { line, .. }
            | Self::While { line, .. } => *line,
        }
    }
}

/// A parsed script: top-level statements in source order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    pub statements: Vec<Stmt>,
}
