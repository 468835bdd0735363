//! Boolean path expressions used by `if` attributes.
//!
//! ```text
//! ${security}                        existence / truthiness
//! ${build-system} == 'maven'         text or single select
//! ${media.json} != true              boolean input or option
//! ${features} contains 'tracing'     multi select membership
//! !(${a} && ${b}) || ${c}
//! ```
//!
//! Expressions are parsed and bound (paths resolved, operands type checked)
//! when a descriptor is built, so evaluation never sees an unknown path.

pub mod eval;
pub mod lexer;
pub mod parser;

use std::fmt;

use crate::error::{ArchetypeError, Result};
use crate::path::{ContextPath, PathResolver};

pub use parser::parse;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Contains,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::Eq => f.write_str("=="),
            Operator::Ne => f.write_str("!="),
            Operator::Contains => f.write_str("contains"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Bool(bool),
    Text(String),
}

/// Expression tree, generic over how paths are represented: raw strings
/// after parsing, [`BoundRef`]s after binding.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr<P> {
    Exists(P),
    Compare { path: P, op: Operator, literal: Literal },
    Not(Box<Expr<P>>),
    And(Box<Expr<P>>, Box<Expr<P>>),
    Or(Box<Expr<P>>, Box<Expr<P>>),
}

impl<P> Expr<P> {
    fn try_map<Q, F>(self, f: &mut F) -> Result<Expr<Q>>
    where
        F: FnMut(P, Option<(Operator, &Literal)>) -> Result<Q>,
    {
        Ok(match self {
            Expr::Exists(path) => Expr::Exists(f(path, None)?),
            Expr::Compare { path, op, literal } => {
                let path = f(path, Some((op, &literal)))?;
                Expr::Compare { path, op, literal }
            }
            Expr::Not(inner) => Expr::Not(Box::new(inner.try_map(f)?)),
            Expr::And(l, r) => Expr::And(Box::new(l.try_map(f)?), Box::new(r.try_map(f)?)),
            Expr::Or(l, r) => Expr::Or(Box::new(l.try_map(f)?), Box::new(r.try_map(f)?)),
        })
    }

    pub fn paths(&self) -> Vec<&P> {
        let mut out = Vec::new();
        self.collect_paths(&mut out);
        out
    }

    fn collect_paths<'a>(&'a self, out: &mut Vec<&'a P>) {
        match self {
            Expr::Exists(p) | Expr::Compare { path: p, .. } => out.push(p),
            Expr::Not(inner) => inner.collect_paths(out),
            Expr::And(l, r) | Expr::Or(l, r) => {
                l.collect_paths(out);
                r.collect_paths(out);
            }
        }
    }
}

/// What a declared path refers to, as far as expressions care.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathKind {
    Text,
    Boolean,
    Select { multiple: bool, options: Vec<String> },
    /// An option of a select input; truthy when selected.
    Option,
}

impl PathKind {
    pub fn name(&self) -> &'static str {
        match self {
            PathKind::Text => "a text input",
            PathKind::Boolean => "a boolean input",
            PathKind::Select { multiple: true, .. } => "a multi-select input",
            PathKind::Select { multiple: false, .. } => "a select input",
            PathKind::Option => "an option",
        }
    }
}

/// Declared-path index consulted while binding expressions.
pub trait DeclaredPaths {
    fn kind_of(&self, path: &ContextPath) -> Option<PathKind>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundRef {
    pub path: ContextPath,
    pub kind: PathKind,
}

/// A parsed, resolved and type-checked expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    source: String,
    expr: Expr<BoundRef>,
}

impl Condition {
    /// Parse `source` and bind every path against `scope`.
    pub fn compile<D>(
        source: &str,
        scope: &ContextPath,
        resolver: &PathResolver,
        declared: &D,
    ) -> Result<Self>
    where
        D: DeclaredPaths + ?Sized,
    {
        let parsed = parse(source)?;
        let expr = parsed.try_map(&mut |raw: String, comparison: Option<(Operator, &Literal)>| {
            let path = resolver.resolve(&raw, scope, |p| declared.kind_of(p).is_some())?;
            let kind = declared
                .kind_of(&path)
                .ok_or_else(|| ArchetypeError::InvalidPath {
                    path: raw.clone(),
                    scope: scope.to_string(),
                    reason: "not a declared input".into(),
                })?;
            if let Some((op, literal)) = comparison {
                check_operands(source, &path, &kind, op, literal)?;
            }
            Ok(BoundRef { path, kind })
        })?;
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr<BoundRef> {
        &self.expr
    }

    pub fn paths(&self) -> impl Iterator<Item = &ContextPath> {
        self.expr.paths().into_iter().map(|r| &r.path)
    }
}

fn check_operands(
    source: &str,
    path: &ContextPath,
    kind: &PathKind,
    op: Operator,
    literal: &Literal,
) -> Result<()> {
    let mismatch = |reason: String| {
        Err(ArchetypeError::ExpressionType {
            expr: source.to_string(),
            reason,
        })
    };

    match (op, literal, kind) {
        (Operator::Eq | Operator::Ne, Literal::Bool(_), PathKind::Boolean | PathKind::Option) => {
            Ok(())
        }
        (Operator::Eq | Operator::Ne, Literal::Bool(b), other) => mismatch(format!(
            "'{op} {b}' requires a boolean input, but '{path}' is {}",
            other.name()
        )),
        (Operator::Eq | Operator::Ne, Literal::Text(_), PathKind::Text) => Ok(()),
        (
            Operator::Eq | Operator::Ne,
            Literal::Text(value),
            PathKind::Select {
                multiple: false,
                options,
            },
        ) => {
            if options.contains(value) {
                Ok(())
            } else {
                mismatch(format!("'{value}' is not an option of '{path}'"))
            }
        }
        (Operator::Eq | Operator::Ne, Literal::Text(_), other) => mismatch(format!(
            "'{op}' with a string requires a text or select input, but '{path}' is {}",
            other.name()
        )),
        (
            Operator::Contains,
            Literal::Text(value),
            PathKind::Select {
                multiple: true,
                options,
            },
        ) => {
            if options.contains(value) {
                Ok(())
            } else {
                mismatch(format!("'{value}' is not an option of '{path}'"))
            }
        }
        (Operator::Contains, Literal::Bool(_), _) => {
            mismatch("'contains' requires a quoted option identifier".into())
        }
        (Operator::Contains, _, other) => mismatch(format!(
            "'contains' requires a multi-select input, but '{path}' is {}",
            other.name()
        )),
    }
}
