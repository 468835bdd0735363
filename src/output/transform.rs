//! Named regex pipelines that rewrite output paths.
//!
//! A replacement string may embed choice values:
//!
//! ```text
//! ${package}               the value at `package`
//! ${package/\./\/}         the value with `\.` replaced by `/`
//! ${1}                     left alone for the regex engine (capture group)
//! ```
//!
//! `\/` inside a substitution stands for a literal slash. Model values use
//! the same `${...}` forms through [`Interpolated`].

use regex_lite::Regex;

use crate::choices::ChoiceTree;
use crate::descriptor::model::{Location, TransformationDecl};
use crate::error::{ArchetypeError, Result};
use crate::expr::{DeclaredPaths, PathKind};
use crate::path::{ContextPath, PathResolver};

#[derive(Debug, Clone)]
pub struct Transformation {
    id: String,
    replacements: Vec<Replacement>,
}

#[derive(Debug, Clone)]
struct Replacement {
    regex: Regex,
    template: Vec<Segment>,
}

/// Text with `${path}` references bound when the archetype is built.
#[derive(Debug, Clone)]
pub struct Interpolated {
    source: String,
    segments: Vec<Segment>,
}

#[derive(Debug, Clone)]
enum Segment {
    Literal(String),
    Value(ContextPath),
    Substitute {
        path: ContextPath,
        regex: Regex,
        replacement: String,
    },
}

impl Transformation {
    /// Compile a declaration, binding every embedded path against `scope`.
    pub fn compile<D>(
        decl: &TransformationDecl,
        scope: &ContextPath,
        resolver: &PathResolver,
        declared: &D,
    ) -> Result<Self>
    where
        D: DeclaredPaths + ?Sized,
    {
        let invalid = |reason: String| ArchetypeError::DescriptorValidation {
            location: decl.location.to_string(),
            reason: format!("transformation '{}': {reason}", decl.id),
        };

        let mut replacements = Vec::new();
        for replace in &decl.replacements {
            let regex = Regex::new(&replace.regex)
                .map_err(|e| invalid(format!("invalid regex '{}': {e}", replace.regex)))?;
            let template = bind_template(&replace.replacement, scope, resolver, declared)
                .map_err(|e| match e {
                    TemplateError::Syntax(reason) => invalid(reason),
                    TemplateError::Binding(e) => e,
                })?;
            replacements.push(Replacement { regex, template });
        }

        Ok(Self {
            id: decl.id.clone(),
            replacements,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Run every replacement in order, each seeing the previous result.
    pub fn apply(&self, input: &str, tree: &ChoiceTree) -> Result<String> {
        let mut current = input.to_string();
        for replacement in &self.replacements {
            let expanded = replacement.expand(tree)?;
            current = replacement
                .regex
                .replace_all(&current, expanded.as_str())
                .into_owned();
        }
        Ok(current)
    }
}

impl Replacement {
    fn expand(&self, tree: &ChoiceTree) -> Result<String> {
        expand(&self.template, tree, escape_dollars)
    }
}

impl Interpolated {
    /// Text without references.
    pub fn literal(text: impl Into<String>) -> Self {
        let source = text.into();
        Self {
            segments: vec![Segment::Literal(source.clone())],
            source,
        }
    }

    /// Bind every `${...}` in `raw` against `scope`. Syntax problems are
    /// reported at `location`.
    pub fn compile<D>(
        raw: &str,
        location: &Location,
        scope: &ContextPath,
        resolver: &PathResolver,
        declared: &D,
    ) -> Result<Self>
    where
        D: DeclaredPaths + ?Sized,
    {
        let segments = bind_template(raw, scope, resolver, declared).map_err(|e| match e {
            TemplateError::Syntax(reason) => ArchetypeError::DescriptorValidation {
                location: location.to_string(),
                reason,
            },
            TemplateError::Binding(e) => e,
        })?;
        Ok(Self {
            source: raw.to_string(),
            segments,
        })
    }

    /// The text as declared, references unexpanded.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn has_references(&self) -> bool {
        self.segments
            .iter()
            .any(|s| !matches!(s, Segment::Literal(_)))
    }

    /// Substitute the chosen values.
    pub fn expand(&self, tree: &ChoiceTree) -> Result<String> {
        expand(&self.segments, tree, |s| s.to_string())
    }
}

fn expand(segments: &[Segment], tree: &ChoiceTree, quote: fn(&str) -> String) -> Result<String> {
    let mut out = String::new();
    for segment in segments {
        match segment {
            Segment::Literal(text) => out.push_str(text),
            Segment::Value(path) => out.push_str(&quote(&lookup(path, tree)?)),
            Segment::Substitute {
                path,
                regex,
                replacement,
            } => {
                let value = lookup(path, tree)?;
                let substituted = regex.replace_all(&value, replacement.as_str());
                out.push_str(&quote(&substituted));
            }
        }
    }
    Ok(out)
}

fn lookup(path: &ContextPath, tree: &ChoiceTree) -> Result<String> {
    tree.value(path)
        .map(|v| v.to_flat_string())
        .ok_or_else(|| ArchetypeError::OutputResolution {
            reason: format!("an output needs a value for '{path}', but none was chosen"),
        })
}

/// Choice values end up inside a regex replacement string, where `$`
/// would start a group reference.
fn escape_dollars(value: &str) -> String {
    value.replace('$', "$$")
}

#[derive(Debug, PartialEq)]
enum RawSegment {
    Literal(String),
    Value(String),
    Substitute {
        path: String,
        regex: String,
        replacement: String,
    },
}

impl RawSegment {
    fn bind<D>(self, scope: &ContextPath, resolver: &PathResolver, declared: &D) -> Result<Segment>
    where
        D: DeclaredPaths + ?Sized,
    {
        let resolve = |raw: &str| -> Result<ContextPath> {
            let path = resolver.resolve(raw, scope, |p| declared.kind_of(p).is_some())?;
            match declared.kind_of(&path) {
                Some(PathKind::Option) | None => Err(ArchetypeError::InvalidPath {
                    path: raw.to_string(),
                    scope: scope.to_string(),
                    reason: "only input values can be substituted".into(),
                }),
                Some(_) => Ok(path),
            }
        };

        Ok(match self {
            RawSegment::Literal(text) => Segment::Literal(text),
            RawSegment::Value(raw) => Segment::Value(resolve(&raw)?),
            RawSegment::Substitute {
                path,
                regex,
                replacement,
            } => Segment::Substitute {
                path: resolve(&path)?,
                regex: Regex::new(&regex).map_err(|e| ArchetypeError::InvalidPath {
                    path: path.clone(),
                    scope: scope.to_string(),
                    reason: format!("invalid substitution regex '{regex}': {e}"),
                })?,
                replacement,
            },
        })
    }
}

enum TemplateError {
    Syntax(String),
    Binding(ArchetypeError),
}

fn bind_template<D>(
    raw: &str,
    scope: &ContextPath,
    resolver: &PathResolver,
    declared: &D,
) -> std::result::Result<Vec<Segment>, TemplateError>
where
    D: DeclaredPaths + ?Sized,
{
    parse_template(raw)
        .map_err(TemplateError::Syntax)?
        .into_iter()
        .map(|segment| {
            segment
                .bind(scope, resolver, declared)
                .map_err(TemplateError::Binding)
        })
        .collect()
}

fn parse_template(raw: &str) -> std::result::Result<Vec<RawSegment>, String> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut rest = raw;

    while let Some(start) = rest.find("${") {
        literal.push_str(&rest[..start]);
        let body_start = start + 2;
        let end = closing_brace(&rest[body_start..])
            .ok_or_else(|| format!("unterminated '${{' in replacement '{raw}'"))?;
        let body = &rest[body_start..body_start + end];
        rest = &rest[body_start + end + 1..];

        if body.chars().all(|c| c.is_ascii_digit()) {
            literal.push_str("${");
            literal.push_str(body);
            literal.push('}');
            continue;
        }

        if !literal.is_empty() {
            segments.push(RawSegment::Literal(std::mem::take(&mut literal)));
        }
        let parts = split_unescaped(body);
        segments.push(match parts.as_slice() {
            [path] => RawSegment::Value(path.trim().to_string()),
            [path, regex, replacement] => RawSegment::Substitute {
                path: path.trim().to_string(),
                regex: regex.clone(),
                replacement: replacement.clone(),
            },
            _ => {
                return Err(format!(
                    "'${{{body}}}' must be ${{path}} or ${{path/regex/replacement}}"
                ))
            }
        });
    }

    literal.push_str(rest);
    if !literal.is_empty() {
        segments.push(RawSegment::Literal(literal));
    }
    Ok(segments)
}

/// Offset of the `}` closing a `${`, allowing nested braces such as regex
/// repetition counts.
fn closing_brace(body: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in body.char_indices() {
        match c {
            '{' => depth += 1,
            '}' if depth == 0 => return Some(i),
            '}' => depth -= 1,
            _ => {}
        }
    }
    None
}

/// Split on `/`, treating `\/` as a literal slash.
fn split_unescaped(body: &str) -> Vec<String> {
    let mut parts = vec![String::new()];
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'/') => {
                chars.next();
                if let Some(part) = parts.last_mut() {
                    part.push('/');
                }
            }
            '/' => parts.push(String::new()),
            other => {
                if let Some(part) = parts.last_mut() {
                    part.push(other);
                }
            }
        }
    }
    parts
}
