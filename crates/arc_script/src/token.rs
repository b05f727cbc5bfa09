#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Boolean(bool),
    String(String),
    Variable(String),
    Identifier(String),

    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,

    Equal,
    NotEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,

    And,
    Or,
    Not,

    Assign,
    Comma,
    Dot,
    Semicolon,
    Newline,

    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,

    If,
    Else,
    While,
}

/// A token together with the 1-based position it started at.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub line: usize,
    pub column: usize,
}

impl Token {
    #[must_use]
    pub const fn is_separator(&self) -> bool {
        matches!(self, Self::Newline | Self::Semicolon)
    }
}
