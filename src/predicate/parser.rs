//! Recursive-descent parser for predicate bodies
//!
//! The accepted language is a side-effect-free subset of JavaScript:
//! declarations, `return`, `if`/`else`, blocks and expressions. There are
//! no loops and no assignment after declaration.

use crate::predicate::ast::{
    Arrow, ArrowBody, BinaryOp, Expr, Literal, LogicalOp, Program, Stmt, UnaryOp,
};
use crate::predicate::lexer::{tokenize, Token, TokenKind};
use crate::predicate::PredicateError;

/// Maximum nesting of statements and expressions
///
/// Each operator or postfix link folded into a chain also counts as a level.
pub const MAX_DEPTH: usize = 64;

/// Words that cannot be used as identifiers
const RESERVED: &[&str] = &[
    "const", "let", "var", "return", "if", "else", "true", "false", "null", "undefined",
    "function", "while", "for", "do", "switch", "case", "new", "this", "class", "delete",
    "typeof", "void", "in", "instanceof", "throw", "try", "catch", "finally", "yield", "await",
    "async", "import", "export", "with", "debugger", "break", "continue",
];

/// Parses predicate source into a program
pub fn parse(source: &str) -> Result<Program, PredicateError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };

    let mut body = Vec::new();
    while !parser.at(&TokenKind::Eof) {
        body.push(parser.statement()?);
    }

    Ok(Program { body })
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_at(&self, ahead: usize) -> &TokenKind {
        let index = (self.pos + ahead).min(self.tokens.len() - 1);
        &self.tokens[index].kind
    }

    fn at(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn at_word(&self, word: &str) -> bool {
        matches!(&self.peek().kind, TokenKind::Ident(name) if name == word)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<Token, PredicateError> {
        if self.at(kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected())
        }
    }

    fn unexpected(&self) -> PredicateError {
        let token = self.peek();
        let message = match &token.kind {
            TokenKind::Eof => "Unexpected end of input".to_string(),
            other => format!("Unexpected token {}", describe(other)),
        };
        PredicateError::syntax(message, token.offset)
    }

    /// Takes one nesting level from the budget
    fn descend(&mut self) -> Result<(), PredicateError> {
        if self.depth >= MAX_DEPTH {
            return Err(PredicateError::syntax(
                "Predicate is nested too deeply",
                self.peek().offset,
            ));
        }
        self.depth += 1;
        Ok(())
    }

    /// Runs `f` one nesting level deeper
    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, PredicateError>,
    ) -> Result<T, PredicateError> {
        self.descend()?;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Runs a left-associative chain; every fold inside `f` calls
    /// `descend`, and the levels are given back once the chain ends
    fn chained(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<Expr, PredicateError>,
    ) -> Result<Expr, PredicateError> {
        let base = self.depth;
        let result = f(self);
        self.depth = base;
        result
    }

    fn binding_name(&mut self) -> Result<String, PredicateError> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Ident(name) if !RESERVED.contains(&name.as_str()) => {
                self.advance();
                Ok(name)
            }
            TokenKind::Ident(name) => Err(PredicateError::syntax(
                format!("Unexpected keyword '{}'", name),
                token.offset,
            )),
            _ => Err(self.unexpected()),
        }
    }

    /// Consumes a statement terminator: `;`, or an implied one before `}`,
    /// end of input, or a line break
    fn terminator(&mut self) -> Result<(), PredicateError> {
        if self.eat(&TokenKind::Semicolon) {
            return Ok(());
        }
        let token = self.peek();
        if token.line_break || matches!(token.kind, TokenKind::RBrace | TokenKind::Eof) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn statement(&mut self) -> Result<Stmt, PredicateError> {
        self.nested(|p| {
            if p.at_word("const") || p.at_word("let") || p.at_word("var") {
                p.advance();
                let name = p.binding_name()?;
                p.expect(&TokenKind::Assign)?;
                let value = p.expression()?;
                p.terminator()?;
                return Ok(Stmt::Declare { name, value });
            }

            if p.at_word("return") {
                p.advance();
                let token = p.peek();
                let bare = token.line_break
                    || matches!(
                        token.kind,
                        TokenKind::Semicolon | TokenKind::RBrace | TokenKind::Eof
                    );
                let value = if bare { None } else { Some(p.expression()?) };
                p.terminator()?;
                return Ok(Stmt::Return(value));
            }

            if p.at_word("if") {
                p.advance();
                p.expect(&TokenKind::LParen)?;
                let test = p.expression()?;
                p.expect(&TokenKind::RParen)?;
                let then = Box::new(p.branch()?);
                let otherwise = if p.at_word("else") {
                    p.advance();
                    Some(Box::new(p.branch()?))
                } else {
                    None
                };
                return Ok(Stmt::If {
                    test,
                    then,
                    otherwise,
                });
            }

            if p.at(&TokenKind::LBrace) {
                return Ok(Stmt::Block(p.block()?));
            }

            if p.eat(&TokenKind::Semicolon) {
                return Ok(Stmt::Block(Vec::new()));
            }

            let expr = p.expression()?;
            p.terminator()?;
            Ok(Stmt::Expr(expr))
        })
    }

    /// Body of an `if` or `else`; declarations need an enclosing block
    fn branch(&mut self) -> Result<Stmt, PredicateError> {
        if self.at_word("const") || self.at_word("let") || self.at_word("var") {
            return Err(PredicateError::syntax(
                "Lexical declaration cannot appear in a single-statement context",
                self.peek().offset,
            ));
        }
        self.statement()
    }

    fn block(&mut self) -> Result<Vec<Stmt>, PredicateError> {
        self.expect(&TokenKind::LBrace)?;
        let mut body = Vec::new();
        while !self.at(&TokenKind::RBrace) {
            if self.at(&TokenKind::Eof) {
                return Err(self.unexpected());
            }
            body.push(self.statement()?);
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(body)
    }

    fn expression(&mut self) -> Result<Expr, PredicateError> {
        self.nested(|p| {
            if p.at_arrow() {
                return p.arrow();
            }
            p.conditional()
        })
    }

    /// True when the upcoming tokens start an arrow function
    fn at_arrow(&self) -> bool {
        match self.peek_at(0) {
            TokenKind::Ident(_) => matches!(self.peek_at(1), TokenKind::Arrow),
            TokenKind::LParen => {
                let mut ahead = 1;
                if matches!(self.peek_at(ahead), TokenKind::RParen) {
                    return matches!(self.peek_at(ahead + 1), TokenKind::Arrow);
                }
                loop {
                    if !matches!(self.peek_at(ahead), TokenKind::Ident(_)) {
                        return false;
                    }
                    ahead += 1;
                    match self.peek_at(ahead) {
                        TokenKind::Comma => ahead += 1,
                        TokenKind::RParen => {
                            return matches!(self.peek_at(ahead + 1), TokenKind::Arrow)
                        }
                        _ => return false,
                    }
                }
            }
            _ => false,
        }
    }

    fn arrow(&mut self) -> Result<Expr, PredicateError> {
        let mut params = Vec::new();
        if self.eat(&TokenKind::LParen) {
            while !self.at(&TokenKind::RParen) {
                params.push(self.binding_name()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(&TokenKind::RParen)?;
        } else {
            params.push(self.binding_name()?);
        }
        self.expect(&TokenKind::Arrow)?;

        let body = if self.at(&TokenKind::LBrace) {
            ArrowBody::Block(self.block()?)
        } else {
            ArrowBody::Expr(Box::new(self.expression()?))
        };

        Ok(Expr::Arrow(Arrow { params, body }))
    }

    fn conditional(&mut self) -> Result<Expr, PredicateError> {
        let test = self.nullish()?;
        if !self.eat(&TokenKind::Question) {
            return Ok(test);
        }
        let then = self.expression()?;
        self.expect(&TokenKind::Colon)?;
        let otherwise = self.expression()?;
        Ok(Expr::Conditional {
            test: Box::new(test),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    fn nullish(&mut self) -> Result<Expr, PredicateError> {
        self.chained(|p| {
            let mut left = p.logical_or()?;
            while p.eat(&TokenKind::Nullish) {
                p.descend()?;
                let right = p.logical_or()?;
                left = logical(LogicalOp::Nullish, left, right);
            }
            Ok(left)
        })
    }

    fn logical_or(&mut self) -> Result<Expr, PredicateError> {
        self.chained(|p| {
            let mut left = p.logical_and()?;
            while p.eat(&TokenKind::OrOr) {
                p.descend()?;
                let right = p.logical_and()?;
                left = logical(LogicalOp::Or, left, right);
            }
            Ok(left)
        })
    }

    fn logical_and(&mut self) -> Result<Expr, PredicateError> {
        self.chained(|p| {
            let mut left = p.equality()?;
            while p.eat(&TokenKind::AndAnd) {
                p.descend()?;
                let right = p.equality()?;
                left = logical(LogicalOp::And, left, right);
            }
            Ok(left)
        })
    }

    fn equality(&mut self) -> Result<Expr, PredicateError> {
        self.chained(|p| {
            let mut left = p.relational()?;
            loop {
                let op = match p.peek().kind {
                    TokenKind::EqEq => BinaryOp::LooseEq,
                    TokenKind::NotEq => BinaryOp::LooseNotEq,
                    TokenKind::EqEqEq => BinaryOp::StrictEq,
                    TokenKind::NotEqEq => BinaryOp::StrictNotEq,
                    _ => return Ok(left),
                };
                p.advance();
                p.descend()?;
                let right = p.relational()?;
                left = binary(op, left, right);
            }
        })
    }

    fn relational(&mut self) -> Result<Expr, PredicateError> {
        self.chained(|p| {
            let mut left = p.additive()?;
            loop {
                let op = match p.peek().kind {
                    TokenKind::Less => BinaryOp::Less,
                    TokenKind::LessEq => BinaryOp::LessEq,
                    TokenKind::Greater => BinaryOp::Greater,
                    TokenKind::GreaterEq => BinaryOp::GreaterEq,
                    _ => return Ok(left),
                };
                p.advance();
                p.descend()?;
                let right = p.additive()?;
                left = binary(op, left, right);
            }
        })
    }

    fn additive(&mut self) -> Result<Expr, PredicateError> {
        self.chained(|p| {
            let mut left = p.multiplicative()?;
            loop {
                let op = match p.peek().kind {
                    TokenKind::Plus => BinaryOp::Add,
                    TokenKind::Minus => BinaryOp::Sub,
                    _ => return Ok(left),
                };
                p.advance();
                p.descend()?;
                let right = p.multiplicative()?;
                left = binary(op, left, right);
            }
        })
    }

    fn multiplicative(&mut self) -> Result<Expr, PredicateError> {
        self.chained(|p| {
            let mut left = p.unary()?;
            loop {
                let op = match p.peek().kind {
                    TokenKind::Star => BinaryOp::Mul,
                    TokenKind::Slash => BinaryOp::Div,
                    TokenKind::Percent => BinaryOp::Rem,
                    _ => return Ok(left),
                };
                p.advance();
                p.descend()?;
                let right = p.unary()?;
                left = binary(op, left, right);
            }
        })
    }

    fn unary(&mut self) -> Result<Expr, PredicateError> {
        let op = match self.peek().kind {
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Neg,
            _ => return self.postfix(),
        };
        self.advance();
        let operand = self.nested(|p| p.unary())?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn postfix(&mut self) -> Result<Expr, PredicateError> {
        self.chained(|p| {
            let mut expr = p.primary()?;

            loop {
                match p.peek().kind {
                    TokenKind::Dot => {
                        p.descend()?;
                        p.advance();
                        expr = p.member(expr, false)?;
                    }
                    TokenKind::QuestionDot => {
                        p.descend()?;
                        p.advance();
                        if p.eat(&TokenKind::LBracket) {
                            let index = p.expression()?;
                            p.expect(&TokenKind::RBracket)?;
                            expr = Expr::Index {
                                object: Box::new(expr),
                                index: Box::new(index),
                                optional: true,
                            };
                        } else {
                            expr = p.member(expr, true)?;
                        }
                    }
                    TokenKind::LBracket => {
                        p.descend()?;
                        p.advance();
                        let index = p.expression()?;
                        p.expect(&TokenKind::RBracket)?;
                        expr = Expr::Index {
                            object: Box::new(expr),
                            index: Box::new(index),
                            optional: false,
                        };
                    }
                    TokenKind::LParen => {
                        p.descend()?;
                        let args = p.arguments()?;
                        expr = Expr::Call {
                            callee: Box::new(expr),
                            args,
                        };
                    }
                    _ => return Ok(expr),
                }
            }
        })
    }

    /// Parses the property after `.` or `?.`, turning it into a method call
    /// when an argument list follows
    fn member(&mut self, object: Expr, optional: bool) -> Result<Expr, PredicateError> {
        let property = match &self.peek().kind {
            TokenKind::Ident(name) => name.clone(),
            _ => return Err(self.unexpected()),
        };
        self.advance();

        if self.at(&TokenKind::LParen) {
            let args = self.arguments()?;
            return Ok(Expr::MethodCall {
                receiver: Box::new(object),
                method: property,
                args,
                optional,
            });
        }

        Ok(Expr::Member {
            object: Box::new(object),
            property,
            optional,
        })
    }

    fn arguments(&mut self) -> Result<Vec<Expr>, PredicateError> {
        self.expect(&TokenKind::LParen)?;
        let mut args = Vec::new();
        while !self.at(&TokenKind::RParen) {
            args.push(self.expression()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen)?;
        Ok(args)
    }

    fn primary(&mut self) -> Result<Expr, PredicateError> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Number(n) => {
                self.advance();
                Ok(Expr::Literal(Literal::Number(n)))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expr::Literal(Literal::Str(s)))
            }
            TokenKind::Ident(name) => {
                let literal = match name.as_str() {
                    "true" => Some(Literal::Bool(true)),
                    "false" => Some(Literal::Bool(false)),
                    "null" => Some(Literal::Null),
                    "undefined" => Some(Literal::Undefined),
                    _ => None,
                };
                if let Some(literal) = literal {
                    self.advance();
                    return Ok(Expr::Literal(literal));
                }
                self.binding_name().map(Expr::Ident)
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.expression()?;
                self.expect(&TokenKind::RParen)?;
                Ok(expr)
            }
            TokenKind::LBracket => {
                self.advance();
                let mut elements = Vec::new();
                while !self.at(&TokenKind::RBracket) {
                    elements.push(self.expression()?);
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(&TokenKind::RBracket)?;
                Ok(Expr::Array(elements))
            }
            _ => Err(self.unexpected()),
        }
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn logical(op: LogicalOp, left: Expr, right: Expr) -> Expr {
    Expr::Logical {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn describe(kind: &TokenKind) -> String {
    let text = match kind {
        TokenKind::Number(n) => return format!("'{}'", n),
        TokenKind::Str(s) => return format!("string '{}'", s),
        TokenKind::Ident(name) => return format!("'{}'", name),
        TokenKind::LParen => "(",
        TokenKind::RParen => ")",
        TokenKind::LBracket => "[",
        TokenKind::RBracket => "]",
        TokenKind::LBrace => "{",
        TokenKind::RBrace => "}",
        TokenKind::Comma => ",",
        TokenKind::Semicolon => ";",
        TokenKind::Dot => ".",
        TokenKind::QuestionDot => "?.",
        TokenKind::Question => "?",
        TokenKind::Colon => ":",
        TokenKind::Arrow => "=>",
        TokenKind::Assign => "=",
        TokenKind::Bang => "!",
        TokenKind::Plus => "+",
        TokenKind::Minus => "-",
        TokenKind::Star => "*",
        TokenKind::Slash => "/",
        TokenKind::Percent => "%",
        TokenKind::Less => "<",
        TokenKind::LessEq => "<=",
        TokenKind::Greater => ">",
        TokenKind::GreaterEq => ">=",
        TokenKind::EqEq => "==",
        TokenKind::NotEq => "!=",
        TokenKind::EqEqEq => "===",
        TokenKind::NotEqEq => "!==",
        TokenKind::AndAnd => "&&",
        TokenKind::OrOr => "||",
        TokenKind::Nullish => "??",
        TokenKind::Eof => "end of input",
    };
    format!("'{}'", text)
}
