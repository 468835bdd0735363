use std::ops::Range;

use super::lexer::{tokenize, Token};
use super::{Expr, Literal, Operator};
use crate::error::{ArchetypeError, Result};

/// Parse an expression into an AST with unresolved (raw) paths.
///
/// Precedence, tightest first: `!`, `&&`, `||`. Parentheses group.
pub fn parse(source: &str) -> Result<Expr<String>> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        source,
        tokens,
        pos: 0,
    };
    let expr = parser.parse_or()?;
    if let Some((token, span)) = parser.tokens.get(parser.pos) {
        return Err(parser.error(
            span.start,
            format!("unexpected {} after complete expression", token.describe()),
        ));
    }
    Ok(expr)
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<(Token, Range<usize>)>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn advance(&mut self) -> Option<(Token, Range<usize>)> {
        let next = self.tokens.get(self.pos).cloned();
        if next.is_some() {
            self.pos += 1;
        }
        next
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|(_, span)| span.start)
            .unwrap_or(self.source.len())
    }

    fn error(&self, offset: usize, reason: String) -> ArchetypeError {
        ArchetypeError::ExpressionSyntax {
            expr: self.source.to_string(),
            offset,
            reason,
        }
    }

    fn parse_or(&mut self) -> Result<Expr<String>> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr<String>> {
        let mut left = self.parse_unary()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let right = self.parse_unary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr<String>> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            let operand = self.parse_unary()?;
            return Ok(Expr::Not(Box::new(operand)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr<String>> {
        let offset = self.offset();
        match self.advance() {
            Some((Token::LParen, _)) => {
                let inner = self.parse_or()?;
                match self.advance() {
                    Some((Token::RParen, _)) => Ok(inner),
                    Some((token, span)) => Err(self.error(
                        span.start,
                        format!("expected ')' but found {}", token.describe()),
                    )),
                    None => Err(self.error(self.source.len(), "missing ')'".into())),
                }
            }
            Some((Token::Var(path), _)) => self.parse_term(path),
            Some((token, span)) => Err(self.error(
                span.start,
                format!("expected '${{path}}', '!' or '(' but found {}", token.describe()),
            )),
            None => Err(self.error(offset, "unexpected end of expression".into())),
        }
    }

    fn parse_term(&mut self, path: String) -> Result<Expr<String>> {
        let op = match self.peek() {
            Some(Token::Eq) => Operator::Eq,
            Some(Token::Ne) => Operator::Ne,
            Some(Token::Contains) => Operator::Contains,
            _ => return Ok(Expr::Exists(path)),
        };
        self.pos += 1;

        let offset = self.offset();
        let literal = match self.advance() {
            Some((Token::Str(s), _)) => Literal::Text(s),
            Some((Token::True, _)) => Literal::Bool(true),
            Some((Token::False, _)) => Literal::Bool(false),
            Some((token, span)) => {
                return Err(self.error(
                    span.start,
                    format!("expected a quoted string, true or false but found {}", token.describe()),
                ))
            }
            None => return Err(self.error(offset, "missing literal after operator".into())),
        };
        Ok(Expr::Compare { path, op, literal })
    }
}
