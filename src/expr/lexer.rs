use std::ops::Range;

use logos::Logos;

use crate::error::{ArchetypeError, Result};

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
pub enum Token {
    #[token("&&")]
    And,

    #[token("||")]
    Or,

    #[token("!")]
    Not,

    #[token("==")]
    Eq,

    #[token("!=")]
    Ne,

    #[token("contains")]
    Contains,

    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token("true")]
    True,

    #[token("false")]
    False,

    /// `${path}` with the delimiters stripped.
    #[regex(r"\$\{[^}]*\}", |lex| {
        let s = lex.slice();
        s[2..s.len() - 1].trim().to_string()
    })]
    Var(String),

    #[regex(r"'[^']*'", |lex| {
        let s = lex.slice();
        s[1..s.len() - 1].to_string()
    })]
    #[regex(r#""[^"]*""#, |lex| {
        let s = lex.slice();
        s[1..s.len() - 1].to_string()
    })]
    Str(String),
}

impl Token {
    pub fn describe(&self) -> String {
        match self {
            Token::And => "'&&'".into(),
            Token::Or => "'||'".into(),
            Token::Not => "'!'".into(),
            Token::Eq => "'=='".into(),
            Token::Ne => "'!='".into(),
            Token::Contains => "'contains'".into(),
            Token::LParen => "'('".into(),
            Token::RParen => "')'".into(),
            Token::True => "'true'".into(),
            Token::False => "'false'".into(),
            Token::Var(path) => format!("'${{{path}}}'"),
            Token::Str(s) => format!("'{s}'"),
        }
    }
}

pub fn tokenize(source: &str) -> Result<Vec<(Token, Range<usize>)>> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next() {
        let span = lexer.span();
        match token {
            Ok(token) => tokens.push((token, span)),
            Err(()) => {
                return Err(ArchetypeError::ExpressionSyntax {
                    expr: source.to_string(),
                    offset: span.start,
                    reason: format!("unexpected input '{}'", lexer.slice()),
                })
            }
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source).unwrap().into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn tokenizes_comparison() {
        assert_eq!(
            kinds("${build-system} == 'maven'"),
            vec![
                Token::Var("build-system".into()),
                Token::Eq,
                Token::Str("maven".into())
            ]
        );
    }

    #[test]
    fn distinguishes_not_and_not_equal() {
        assert_eq!(
            kinds("!${a} != \"x\""),
            vec![
                Token::Not,
                Token::Var("a".into()),
                Token::Ne,
                Token::Str("x".into())
            ]
        );
    }

    #[test]
    fn reports_offset_of_bad_input() {
        let err = tokenize("${a} & ${b}").unwrap_err();
        match err {
            ArchetypeError::ExpressionSyntax { offset, .. } => assert_eq!(offset, 5),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn rejects_unterminated_reference() {
        assert!(tokenize("${a").is_err());
    }
}
