use std::collections::VecDeque;

use crate::ast::{BinOp, Expr, Node};
use crate::error::{Error, Location, Result};
use crate::lexer::{Token, Tokenizer};
use crate::Options;

/// Recursive-descent parser over the token stream. Block bodies are
/// parsed as nested node sequences until the matching close keyword shows
/// up at the same structural depth; a configurable depth cap rejects
/// pathologically nested input before evaluation ever sees it.
pub struct Parser<'a> {
    source: &'a str,
    lexer: Tokenizer<'a>,
    buffer: VecDeque<(Token, usize)>,
    last_offset: usize,
    depth: usize,
    max_depth: usize,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str, options: &Options) -> Self {
        Self {
            source,
            lexer: Tokenizer::new(source, options.trim_blocks),
            buffer: VecDeque::new(),
            last_offset: 0,
            depth: 0,
            max_depth: options.max_depth,
        }
    }

    fn peek(&mut self, n: usize) -> Result<Option<&Token>> {
        while self.buffer.len() <= n {
            match self.lexer.next_token()? {
                Some(pair) => self.buffer.push_back(pair),
                None => return Ok(None),
            }
        }
        Ok(self.buffer.get(n).map(|(token, _)| token))
    }

    fn consume(&mut self) -> Result<Option<Token>> {
        let pair = if self.buffer.is_empty() {
            self.lexer.next_token()?
        } else {
            self.buffer.pop_front()
        };
        match pair {
            Some((token, offset)) => {
                self.last_offset = offset;
                Ok(Some(token))
            }
            None => Ok(None),
        }
    }

    fn error_here(&self, message: impl Into<String>) -> Error {
        Error::syntax(message, Location::from_offset(self.source, self.last_offset))
    }

    fn error_at_eof(&self, message: impl Into<String>) -> Error {
        Error::syntax(message, Location::from_offset(self.source, self.source.len()))
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        match self.consume()? {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(self.error_here(format!(
                "expected {:?}, got {:?}",
                expected, token
            ))),
            None => Err(self.error_at_eof(format!(
                "expected {:?}, got end of template",
                expected
            ))),
        }
    }

    fn enter_block(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(self.error_here(format!(
                "block nesting exceeds maximum depth of {}",
                self.max_depth
            )));
        }
        Ok(())
    }

    /// Parse a whole template. A block terminator (`endfor`, `endif`,
    /// `else`, `elif`) with no open block is rejected here.
    pub fn parse_template(&mut self) -> Result<Vec<Node>> {
        let nodes = self.parse_nodes()?;
        if self.peek(0)?.is_some() {
            let (token, offset) = self.buffer[0].clone();
            return Err(Error::syntax(
                format!("unexpected {:?} outside of any open block", token),
                Location::from_offset(self.source, offset),
            ));
        }
        Ok(nodes)
    }

    fn parse_nodes(&mut self) -> Result<Vec<Node>> {
        let mut nodes = Vec::new();
        loop {
            // A terminator keyword at this depth ends the sequence; the
            // caller owns consuming it.
            if let Some(Token::BlockStart) = self.peek(0)? {
                if let Some(Token::EndFor | Token::EndIf | Token::Else | Token::Elif) =
                    self.peek(1)?
                {
                    break;
                }
            }
            if self.peek(0)?.is_none() {
                break;
            }

            match self.peek(0)?.cloned() {
                Some(Token::Text(s)) => {
                    self.consume()?;
                    nodes.push(Node::Text(s));
                }
                Some(Token::VarStart) => {
                    self.consume()?; // {{
                    let expr = self.parse_expr()?;
                    self.expect(Token::VarEnd)?;
                    nodes.push(Node::Var(expr));
                }
                Some(Token::BlockStart) => {
                    self.consume()?; // {%
                    match self.peek(0)?.cloned() {
                        Some(Token::For) => nodes.push(self.parse_for()?),
                        Some(Token::If) => nodes.push(self.parse_if()?),
                        Some(token) => {
                            return Err(self.error_here(format!(
                                "unexpected {:?} opening a block",
                                token
                            )))
                        }
                        None => {
                            return Err(self.error_at_eof("unclosed block tag at end of template"))
                        }
                    }
                }
                _ => break,
            }
        }
        Ok(nodes)
    }

    fn parse_for(&mut self) -> Result<Node> {
        self.enter_block()?;
        self.expect(Token::For)?;
        let target = match self.consume()? {
            Some(Token::Ident(s)) => s,
            Some(token) => {
                return Err(self.error_here(format!(
                    "expected identifier for loop target, got {:?}",
                    token
                )))
            }
            None => return Err(self.error_at_eof("expected identifier for loop target")),
        };
        self.expect(Token::In)?;
        let iterable = self.parse_expr()?;
        self.expect(Token::BlockEnd)?;

        let body = self.parse_nodes()?;

        if self.peek(0)?.is_none() {
            return Err(self.error_at_eof("missing {% endfor %} for {% for %} block"));
        }
        self.expect(Token::BlockStart)?;
        self.expect(Token::EndFor)?;
        self.expect(Token::BlockEnd)?;

        self.depth -= 1;
        Ok(Node::For {
            target,
            iterable,
            body,
        })
    }

    fn parse_if(&mut self) -> Result<Node> {
        self.enter_block()?;
        self.expect(Token::If)?;
        let condition = self.parse_expr()?;
        self.expect(Token::BlockEnd)?;

        let body = self.parse_nodes()?;
        let mut cases = vec![(condition, body)];
        let mut else_body = None;

        loop {
            // What follows the branch: {% elif %}, {% else %}, or {% endif %}.
            match self.peek(0)? {
                Some(Token::BlockStart) => match self.peek(1)?.cloned() {
                    Some(Token::Elif) => {
                        self.consume()?; // {%
                        self.consume()?; // elif
                        let cond = self.parse_expr()?;
                        self.expect(Token::BlockEnd)?;
                        let block = self.parse_nodes()?;
                        cases.push((cond, block));
                    }
                    Some(Token::Else) => {
                        self.consume()?; // {%
                        self.consume()?; // else
                        self.expect(Token::BlockEnd)?;
                        else_body = Some(self.parse_nodes()?);
                        if self.peek(0)?.is_none() {
                            return Err(
                                self.error_at_eof("missing {% endif %} for {% if %} block")
                            );
                        }
                        self.expect(Token::BlockStart)?;
                        self.expect(Token::EndIf)?;
                        self.expect(Token::BlockEnd)?;
                        break;
                    }
                    Some(Token::EndIf) => {
                        self.consume()?; // {%
                        self.consume()?; // endif
                        self.expect(Token::BlockEnd)?;
                        break;
                    }
                    token => {
                        return Err(self.error_here(format!(
                            "expected elif, else, or endif, got {:?}",
                            token
                        )))
                    }
                },
                None => return Err(self.error_at_eof("missing {% endif %} for {% if %} block")),
                _ => {
                    let got = self.peek(0)?.cloned();
                    return Err(self.error_here(format!(
                        "expected a block tag in if/else chain, got {:?}",
                        got
                    )));
                }
            }
        }

        self.depth -= 1;
        Ok(Node::If { cases, else_body })
    }

    fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_and()?;
        while let Some(Token::Or) = self.peek(0)? {
            self.consume()?;
            let rhs = self.parse_and()?;
            lhs = Expr::BinOp(Box::new(lhs), BinOp::Or, Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_not()?;
        while let Some(Token::And) = self.peek(0)? {
            self.consume()?;
            let rhs = self.parse_not()?;
            lhs = Expr::BinOp(Box::new(lhs), BinOp::And, Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expr> {
        if let Some(Token::Not) = self.peek(0)? {
            self.consume()?;
            let inner = self.parse_not()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_eq()
    }

    fn parse_eq(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_add()?;
        loop {
            let op = match self.peek(0)? {
                Some(Token::EqEq) => BinOp::Eq,
                Some(Token::NotEq) => BinOp::NotEq,
                _ => break,
            };
            self.consume()?;
            let rhs = self.parse_add()?;
            lhs = Expr::BinOp(Box::new(lhs), op, Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_add(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_primary()?;
        while let Some(Token::Plus) = self.peek(0)? {
            self.consume()?;
            let rhs = self.parse_primary()?;
            lhs = Expr::BinOp(Box::new(lhs), BinOp::Add, Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let mut expr = match self.consume()? {
            Some(Token::StringLit(s)) => Expr::StringLit(s),
            Some(Token::True) => Expr::BoolLit(true),
            Some(Token::False) => Expr::BoolLit(false),
            Some(Token::Int(i)) => Expr::IntLit(i),
            Some(Token::Float(x)) => Expr::FloatLit(x),
            Some(Token::Ident(s)) => Expr::Var(s),
            Some(Token::LParen) => {
                let e = self.parse_expr()?;
                self.expect(Token::RParen)?;
                e
            }
            Some(token) => {
                return Err(self.error_here(format!("expected expression, got {:?}", token)))
            }
            None => return Err(self.error_at_eof("expected expression, got end of template")),
        };

        // Suffixes: .attr and [expr].
        loop {
            match self.peek(0)? {
                Some(Token::Dot) => {
                    self.consume()?; // .
                    match self.consume()? {
                        Some(Token::Ident(attr)) => {
                            expr = Expr::Attribute(Box::new(expr), attr);
                        }
                        Some(token) => {
                            return Err(self.error_here(format!(
                                "expected identifier after `.`, got {:?}",
                                token
                            )))
                        }
                        None => {
                            return Err(self.error_at_eof("expected identifier after `.`"))
                        }
                    }
                }
                Some(Token::LBracket) => {
                    self.consume()?; // [
                    let idx = self.parse_expr()?;
                    self.expect(Token::RBracket)?;
                    expr = Expr::Index(Box::new(expr), Box::new(idx));
                }
                _ => break,
            }
        }

        Ok(expr)
    }
}
