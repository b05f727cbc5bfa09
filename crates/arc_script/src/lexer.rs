use crate::error::SyntaxError;
use crate::token::{Spanned, Token};

pub const VARIABLE_SIGIL: char = '@';

pub struct Lexer {
    input: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    variable_sigil: char,
}

impl Lexer {
    #[must_use]
    pub fn new(input: &str) -> Self {
        Self::with_sigil(input, VARIABLE_SIGIL)
    }

    fn with_sigil(input: &str, variable_sigil: char) -> Self {
        Self {
            input: input.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            variable_sigil,
        }
    }

    fn current(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn advance(&mut self) {
        if let Some(ch) = self.current() {
            self.pos += 1;
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(message, self.line, self.column)
    }

    /// Skips blanks and `#` comments, stopping at a newline.
    fn skip_trivia(&mut self) {
        while let Some(ch) = self.current() {
            if ch == '#' {
                while let Some(c) = self.current() {
                    if c == '\n' {
                        break;
                    }
                    self.advance();
                }
            } else if ch.is_whitespace() && ch != '\n' {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_number(&mut self) -> Result<f64, SyntaxError> {
        let start = self.pos;
        while let Some(ch) = self.current() {
            if ch.is_ascii_digit() || ch == '.' {
                self.advance();
            } else {
                break;
            }
        }
        let num_str: String = self.input[start..self.pos].iter().collect();
        num_str
            .parse::<f64>()
            .map_err(|_| self.error(format!("Invalid number: {num_str}")))
    }

    fn read_identifier(&mut self) -> String {
        let start = self.pos;
        while let Some(ch) = self.current() {
            if is_word(ch) {
                self.advance();
            } else {
                break;
            }
        }
        self.input[start..self.pos].iter().collect()
    }

    fn read_string(&mut self) -> Result<String, SyntaxError> {
        self.advance();
        let mut result = String::new();
        while let Some(ch) = self.current() {
            match ch {
                '"' => {
                    self.advance();
                    return Ok(result);
                }
                '\\' => {
                    self.advance();
                    let escaped = match self.current() {
                        Some('"') => '"',
                        Some('\\') => '\\',
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some(other) => return Err(self.error(format!("Unknown escape: \\{other}"))),
                        None => break,
                    };
                    result.push(escaped);
                    self.advance();
                }
                '\n' => return Err(self.error("Unterminated string")),
                _ => {
                    result.push(ch);
                    self.advance();
                }
            }
        }
        Err(self.error("Unterminated string"))
    }

    fn read_variable(&mut self) -> Result<String, SyntaxError> {
        self.advance();

        match self.current() {
            Some(ch) if ch.is_alphabetic() || ch == '_' => {}
            _ => {
                return Err(self.error(format!(
                    "Invalid variable name after '{}'",
                    self.variable_sigil
                )));
            }
        }

        Ok(self.read_identifier())
    }

    /// Consumes `second` if it follows, choosing between a two-character and
    /// a one-character operator.
    fn either(&mut self, second: char, double: Token, single: Token) -> Token {
        self.advance();
        if self.current() == Some(second) {
            self.advance();
            double
        } else {
            single
        }
    }

    fn next_token(&mut self) -> Result<Option<Spanned>, SyntaxError> {
        self.skip_trivia();

        let Some(ch) = self.current() else {
            return Ok(None);
        };
        let (line, column) = (self.line, self.column);

        let token = match ch {
            c if c == self.variable_sigil => Token::Variable(self.read_variable()?),
            '"' => Token::String(self.read_string()?),
            '\n' | ';' | '+' | '-' | '*' | '/' | '%' | '(' | ')' | '{' | '}' | ',' | '.' => {
                self.advance();
                match ch {
                    '\n' => Token::Newline,
                    ';' => Token::Semicolon,
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    '*' => Token::Multiply,
                    '/' => Token::Divide,
                    '%' => Token::Modulo,
                    '(' => Token::LeftParen,
                    ')' => Token::RightParen,
                    '{' => Token::LeftBrace,
                    '}' => Token::RightBrace,
                    ',' => Token::Comma,
                    _ => Token::Dot,
                }
            }
            '=' => self.either('=', Token::Equal, Token::Assign),
            '!' => self.either('=', Token::NotEqual, Token::Not),
            '>' => self.either('=', Token::GreaterEqual, Token::Greater),
            '<' => self.either('=', Token::LessEqual, Token::Less),
            '&' => {
                self.advance();
                if self.current() != Some('&') {
                    return Err(self.error("Invalid operator '&', use '&&' for logical AND"));
                }
                self.advance();
                Token::And
            }
            '|' => {
                self.advance();
                if self.current() != Some('|') {
                    return Err(self.error("Invalid operator '|', use '||' for logical OR"));
                }
                self.advance();
                Token::Or
            }
            _ if ch.is_ascii_digit() => Token::Number(self.read_number()?),
            _ if ch.is_alphabetic() || ch == '_' => {
                let ident = self.read_identifier();
                match ident.as_str() {
                    "true" => Token::Boolean(true),
                    "false" => Token::Boolean(false),
                    "AND" => Token::And,
                    "OR" => Token::Or,
                    "NOT" => Token::Not,
                    "if" => Token::If,
                    "else" => Token::Else,
                    "while" => Token::While,
                    _ => Token::Identifier(ident),
                }
            }
            '\'' => {
                return Err(self.error("Single-quoted strings are not allowed. Use double quotes."));
            }
            _ => return Err(self.error(format!("Unexpected character: {ch}"))),
        };

        Ok(Some(Spanned {
            token,
            line,
            column,
        }))
    }

    /// Splits the whole input into tokens. Runs of line breaks collapse into
    /// a single [`Token::Newline`].
    ///
    /// # Errors
    ///
    /// Returns the first lexical error with its position.
    pub fn tokenize(&mut self) -> Result<Vec<Spanned>, SyntaxError> {
        let mut tokens: Vec<Spanned> = Vec::new();
        while let Some(spanned) = self.next_token()? {
            let repeated_newline = spanned.token == Token::Newline
                && tokens.last().is_some_and(|prev| prev.token == Token::Newline);
            if !repeated_newline {
                tokens.push(spanned);
            }
        }
        Ok(tokens)
    }
}

fn is_word(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}
