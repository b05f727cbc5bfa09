use crate::ast::{BinaryOp, Expr, InterpolationSegment, Program, Stmt, UnaryOp};
use crate::error::SyntaxError;
use crate::lexer::Lexer;
use crate::token::{Spanned, Token};
use crate::value::Value;

/// Deepest nesting a script may use: blocks, parentheses, argument lists,
/// operator chains and interpolations all count. The interpreter recurses
/// once per level, so this bounds its stack use.
pub const MAX_NESTING: usize = 100;

/// An expression together with the height of its tree.
struct Parsed {
    expr: Expr,
    height: usize,
}

impl Parsed {
    const fn leaf(expr: Expr) -> Self {
        Self { expr, height: 1 }
    }
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    /// Position reported for errors at the end of input.
    eof: (usize, usize),
    /// Enclosing blocks, parentheses and argument lists.
    depth: usize,
}

impl Parser {
    fn new(tokens: Vec<Spanned>, depth: usize) -> Self {
        let eof = tokens
            .last()
            .map_or((1, 1), |last| (last.line, last.column + 1));
        Self {
            tokens,
            pos: 0,
            eof,
            depth,
        }
    }

    fn current(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn position(&self) -> (usize, usize) {
        self.tokens
            .get(self.pos)
            .map_or(self.eof, |s| (s.line, s.column))
    }

    const fn advance(&mut self) {
        self.pos += 1;
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        let (line, column) = self.position();
        SyntaxError::new(message, line, column)
    }

    fn too_deep(&self) -> SyntaxError {
        self.error(format!("Nesting deeper than {MAX_NESTING} levels"))
    }

    fn unexpected(&self) -> SyntaxError {
        match self.current() {
            Some(token) => self.error(format!("Unexpected token: {token:?}")),
            None => self.error("Unexpected end of input"),
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<(), SyntaxError> {
        if self.current() == Some(expected) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!(
                "Expected {:?}, found {:?}",
                expected,
                self.current()
            )))
        }
    }

    /// Runs `parse` one nesting level deeper, failing once the limit is hit.
    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, SyntaxError>,
    ) -> Result<T, SyntaxError> {
        if self.depth >= MAX_NESTING {
            return Err(self.too_deep());
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    /// Wraps `expr` as the parent of children at most `child_height` tall.
    fn node(&self, expr: Expr, child_height: usize) -> Result<Parsed, SyntaxError> {
        let height = child_height + 1;
        if self.depth + height > MAX_NESTING {
            return Err(self.too_deep());
        }
        Ok(Parsed { expr, height })
    }

    fn binary(&self, op: BinaryOp, left: Parsed, right: Parsed) -> Result<Parsed, SyntaxError> {
        let child_height = left.height.max(right.height);
        self.node(Expr::binary(op, left.expr, right.expr), child_height)
    }

    fn skip_separators(&mut self) {
        while self.current().is_some_and(Token::is_separator) {
            self.advance();
        }
    }

    fn parse_program(&mut self) -> Result<Program, SyntaxError> {
        let statements = self.parse_statements(None)?;
        Ok(Program { statements })
    }

    /// Parses statements until `terminator` (or the end of input when `None`).
    fn parse_statements(&mut self, terminator: Option<&Token>) -> Result<Vec<Stmt>, SyntaxError> {
        let mut statements = Vec::new();
        loop {
            self.skip_separators();
            match (self.current(), terminator) {
                (None, None) => return Ok(statements),
                (None, Some(_)) => return Err(self.error("Unexpected end of input, missing '}'")),
                (Some(token), Some(end)) if token == end => return Ok(statements),
                _ => {}
            }

            statements.push(self.parse_statement()?);

            match self.current() {
                Some(token) if token.is_separator() => {}
                None => {}
                Some(token) if Some(token) == terminator => {}
                Some(_) => return Err(self.unexpected()),
            }
        }
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>, SyntaxError> {
        self.expect(&Token::LeftBrace)?;
        let body = self.nested(|p| p.parse_statements(Some(&Token::RightBrace)))?;
        self.expect(&Token::RightBrace)?;
        Ok(body)
    }

    fn parse_expression(&mut self) -> Result<Expr, SyntaxError> {
        self.parse_or().map(|parsed| parsed.expr)
    }

    fn parse_statement(&mut self) -> Result<Stmt, SyntaxError> {
        let (line, _) = self.position();

        match self.current() {
            Some(Token::If) => self.parse_if(),
            Some(Token::While) => {
                self.advance();
                let condition = self.parse_expression()?;
                let body = self.parse_block()?;
                Ok(Stmt::While {
                    condition,
                    body,
                    line,
                })
            }
            Some(Token::Variable(name))
                if self.tokens.get(self.pos + 1).map(|s| &s.token) == Some(&Token::Assign) =>
            {
                let name = name.clone();
                self.advance();
                self.advance();
                let value = self.parse_expression()?;
                Ok(Stmt::Assign { name, value, line })
            }
            _ => {
                let expr = self.parse_expression()?;
                Ok(Stmt::Expr { expr, line })
            }
        }
    }

    fn parse_if(&mut self) -> Result<Stmt, SyntaxError> {
        let (line, _) = self.position();
        self.expect(&Token::If)?;
        let condition = self.parse_expression()?;
        let then_branch = self.parse_block()?;

        // `else` may sit on the line after the closing brace.
        let resume = self.pos;
        while self.current() == Some(&Token::Newline) {
            self.advance();
        }
        let else_branch = if self.current() == Some(&Token::Else) {
            self.advance();
            if self.current() == Some(&Token::If) {
                vec![self.nested(Self::parse_if)?]
            } else {
                self.parse_block()?
            }
        } else {
            self.pos = resume;
            Vec::new()
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
            line,
        })
    }

    fn parse_or(&mut self) -> Result<Parsed, SyntaxError> {
        let mut left = self.parse_and()?;
        while self.current() == Some(&Token::Or) {
            self.advance();
            let right = self.parse_and()?;
            left = self.binary(BinaryOp::Or, left, right)?;
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Parsed, SyntaxError> {
        let mut left = self.parse_comparison()?;
        while self.current() == Some(&Token::And) {
            self.advance();
            let right = self.parse_comparison()?;
            left = self.binary(BinaryOp::And, left, right)?;
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Parsed, SyntaxError> {
        let left = self.parse_additive()?;

        let op = match self.current() {
            Some(Token::Equal) => BinaryOp::Eq,
            Some(Token::NotEqual) => BinaryOp::Ne,
            Some(Token::Greater) => BinaryOp::Gt,
            Some(Token::GreaterEqual) => BinaryOp::Ge,
            Some(Token::Less) => BinaryOp::Lt,
            Some(Token::LessEqual) => BinaryOp::Le,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.parse_additive()?;
        self.binary(op, left, right)
    }

    fn parse_additive(&mut self) -> Result<Parsed, SyntaxError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.current() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = self.binary(op, left, right)?;
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Parsed, SyntaxError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.current() {
                Some(Token::Multiply) => BinaryOp::Mul,
                Some(Token::Divide) => BinaryOp::Div,
                Some(Token::Modulo) => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = self.binary(op, left, right)?;
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Parsed, SyntaxError> {
        let op = match self.current() {
            Some(Token::Not) => UnaryOp::Not,
            Some(Token::Minus) => UnaryOp::Neg,
            Some(Token::Plus) => {
                self.advance();
                return self.nested(Self::parse_unary);
            }
            _ => return self.parse_postfix(),
        };
        self.advance();
        let operand = self.nested(Self::parse_unary)?;
        self.node(Expr::unary(op, operand.expr), operand.height)
    }

    fn parse_postfix(&mut self) -> Result<Parsed, SyntaxError> {
        let mut parsed = self.parse_primary()?;
        while self.current() == Some(&Token::Dot) {
            self.advance();
            let Some(Token::Identifier(method)) = self.current() else {
                return Err(self.error("Expected method name after '.'"));
            };
            let method = method.clone();
            self.advance();
            let (args, args_height) = self.parse_arguments()?;
            let child_height = parsed.height.max(args_height);
            let call = Expr::MethodCall {
                target: Box::new(parsed.expr),
                method,
                args,
            };
            parsed = self.node(call, child_height)?;
        }
        Ok(parsed)
    }

    /// Parses `(a, b, ..)`, returning the arguments and the tallest one's
    /// height.
    fn parse_arguments(&mut self) -> Result<(Vec<Expr>, usize), SyntaxError> {
        self.expect(&Token::LeftParen)?;
        self.nested(|p| {
            let mut args = Vec::new();
            let mut height = 0;
            if p.current() == Some(&Token::RightParen) {
                p.advance();
                return Ok((args, height));
            }
            loop {
                let arg = p.parse_or()?;
                height = height.max(arg.height);
                args.push(arg.expr);
                match p.current() {
                    Some(Token::Comma) => p.advance(),
                    Some(Token::RightParen) => {
                        p.advance();
                        return Ok((args, height));
                    }
                    _ => return Err(p.error("Expected ',' or ')' in argument list")),
                }
            }
        })
    }

    fn parse_primary(&mut self) -> Result<Parsed, SyntaxError> {
        let Some(token) = self.current() else {
            return Err(self.unexpected());
        };

        match token {
            Token::Number(n) => {
                let value = *n;
                self.advance();
                Ok(Parsed::leaf(Expr::Const(Value::Number(value))))
            }
            Token::Boolean(b) => {
                let value = *b;
                self.advance();
                Ok(Parsed::leaf(Expr::Const(Value::Boolean(value))))
            }
            Token::String(s) => {
                let value = s.clone();
                let error_at = self.error("");
                self.advance();
                self.parse_string_literal(value).map_err(|message| SyntaxError {
                    message,
                    ..error_at
                })
            }
            Token::Variable(name) => {
                let name = name.clone();
                self.advance();
                Ok(Parsed::leaf(Expr::Load(name)))
            }
            Token::Identifier(name) => {
                let name = name.clone();
                if self.tokens.get(self.pos + 1).map(|s| &s.token) != Some(&Token::LeftParen) {
                    return Err(self.error(format!("Unknown identifier: {name}")));
                }
                self.advance();
                let (args, args_height) = self.parse_arguments()?;
                self.node(Expr::Call { name, args }, args_height)
            }
            Token::LeftParen => {
                self.advance();
                let value = self.nested(Self::parse_or)?;
                self.expect(&Token::RightParen)?;
                Ok(value)
            }
            _ => Err(self.unexpected()),
        }
    }

    fn parse_string_literal(&self, value: String) -> Result<Parsed, String> {
        if !value.contains('{') && !value.contains('}') {
            return Ok(Parsed::leaf(Expr::Const(Value::String(value))));
        }

        let (segments, height) = parse_string_content(&value, self.depth + 1)?;
        if let [InterpolationSegment::Literal(lit)] = segments.as_slice() {
            return Ok(Parsed::leaf(Expr::Const(Value::String(lit.clone()))));
        }
        self.node(Expr::InterpolatedString(segments), height)
            .map_err(|e| e.message)
    }
}

/// Splits `"text {expr} text"` into literal and expression segments. `{{` and
/// `}}` escape literal braces. Also returns the tallest expression's height.
fn parse_string_content(
    raw: &str,
    depth: usize,
) -> Result<(Vec<InterpolationSegment>, usize), String> {
    let chars: Vec<char> = raw.chars().collect();
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut height = 0;
    let mut i = 0;

    while i < chars.len() {
        match (chars[i], chars.get(i + 1)) {
            ('{', Some('{')) | ('}', Some('}')) => {
                literal.push(chars[i]);
                i += 2;
            }
            ('{', _) => {
                if !literal.is_empty() {
                    segments.push(InterpolationSegment::Literal(std::mem::take(&mut literal)));
                }

                let start = i + 1;
                let mut braces = 1;
                let mut end = start;
                while end < chars.len() {
                    match chars[end] {
                        '{' => braces += 1,
                        '}' => braces -= 1,
                        _ => {}
                    }
                    if braces == 0 {
                        break;
                    }
                    end += 1;
                }
                if braces != 0 {
                    return Err("Unclosed brace in interpolated string".to_string());
                }

                let source: String = chars[start..end].iter().collect();
                if source.trim().is_empty() {
                    return Err("Empty expression in interpolated string".to_string());
                }
                let parsed = parse_expr_at(&source, depth).map_err(|e| e.message)?;
                height = height.max(parsed.height);
                segments.push(InterpolationSegment::Expression(Box::new(parsed.expr)));
                i = end + 1;
            }
            ('}', _) => return Err("Unmatched closing brace in interpolated string".to_string()),
            (ch, _) => {
                literal.push(ch);
                i += 1;
            }
        }
    }

    if !literal.is_empty() || segments.is_empty() {
        segments.push(InterpolationSegment::Literal(literal));
    }

    Ok((segments, height))
}

fn parse_expr_at(source: &str, depth: usize) -> Result<Parsed, SyntaxError> {
    let tokens = Lexer::new(source).tokenize()?;
    if tokens.iter().all(|s| s.token.is_separator()) {
        return Err(SyntaxError::new("Empty expression", 1, 1));
    }

    let mut parser = Parser::new(tokens, depth);
    if parser.depth >= MAX_NESTING {
        return Err(parser.too_deep());
    }
    let parsed = parser.parse_or()?;
    if parser.current().is_some() {
        return Err(parser.unexpected());
    }
    Ok(parsed)
}

/// Parses a single expression.
///
/// # Errors
///
/// Returns an error if the expression is empty or invalid.
pub fn parse_expr(source: &str) -> Result<Expr, SyntaxError> {
    parse_expr_at(source, 0).map(|parsed| parsed.expr)
}

/// Parses a whole script.
///
/// # Errors
///
/// Returns the first lexical or grammatical error with its position, including
/// nesting deeper than [`MAX_NESTING`].
pub fn parse_program(source: &str) -> Result<Program, SyntaxError> {
    let tokens = Lexer::new(source).tokenize()?;
    Parser::new(tokens, 0).parse_program()
}
