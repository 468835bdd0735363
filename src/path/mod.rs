//! Dotted context paths and their resolution against a scope.
//!
//! A path names a node of the choice graph by the chain of input and option
//! identifiers leading to it, e.g. `media.provider.jackson`. Expressions may
//! use three forms:
//!
//! - `name.sub`: relative to the current scope, falling back to the
//!   configured common prefix
//! - `ROOT.name.sub`: absolute
//! - `PARENT.PARENT.name`: relative to an ancestor of the current scope

use std::fmt;

use crate::error::{ArchetypeError, Result};

pub const ROOT_KEYWORD: &str = "ROOT";
pub const PARENT_KEYWORD: &str = "PARENT";

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextPath {
    segments: Vec<String>,
}

impl ContextPath {
    pub fn root() -> Self {
        Self::default()
    }

    /// Split a dotted string into segments. The empty string is the root.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(Self::root());
        }
        let mut segments = Vec::new();
        for segment in raw.split('.') {
            if segment.is_empty() {
                return Err(ArchetypeError::InvalidPath {
                    path: raw.to_string(),
                    scope: String::new(),
                    reason: "empty path segment".into(),
                });
            }
            segments.push(segment.to_string());
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    pub fn parent(&self) -> Option<ContextPath> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    pub fn child(&self, segment: &str) -> ContextPath {
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Self { segments }
    }

    pub fn join(&self, other: &ContextPath) -> ContextPath {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self { segments }
    }

    /// The ancestor `levels` above this path, or `None` past the root.
    pub fn ancestor(&self, levels: usize) -> Option<ContextPath> {
        if levels > self.segments.len() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - levels].to_vec(),
        })
    }

    pub fn starts_with(&self, prefix: &ContextPath) -> bool {
        self.segments.starts_with(&prefix.segments)
    }
}

impl fmt::Display for ContextPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

/// Resolves raw path strings into absolute [`ContextPath`]s.
#[derive(Debug, Clone, Default)]
pub struct PathResolver {
    common_prefix: ContextPath,
}

enum Anchor {
    Relative,
    Root,
    Parent(usize),
}

impl PathResolver {
    pub fn new(common_prefix: ContextPath) -> Self {
        Self { common_prefix }
    }

    pub fn common_prefix(&self) -> &ContextPath {
        &self.common_prefix
    }

    /// Resolve `raw` against `scope`.
    ///
    /// `is_declared` answers whether an absolute path names a declared node;
    /// only declared paths are ever returned.
    pub fn resolve<F>(&self, raw: &str, scope: &ContextPath, is_declared: F) -> Result<ContextPath>
    where
        F: Fn(&ContextPath) -> bool,
    {
        let invalid = |reason: String| ArchetypeError::InvalidPath {
            path: raw.to_string(),
            scope: scope.to_string(),
            reason,
        };

        let (anchor, rest) = split_anchor(raw).map_err(invalid)?;

        match anchor {
            Anchor::Root => {
                if !rest.is_root() && is_declared(&rest) {
                    Ok(rest)
                } else {
                    Err(invalid(format!("'{rest}' is not a declared input")))
                }
            }
            Anchor::Parent(levels) => {
                let base = scope.ancestor(levels).ok_or_else(|| {
                    invalid(format!(
                        "{levels} PARENT level(s) exceed the scope depth of {}",
                        scope.depth()
                    ))
                })?;
                let candidate = base.join(&rest);
                if !candidate.is_root() && is_declared(&candidate) {
                    Ok(candidate)
                } else {
                    Err(invalid(format!("'{candidate}' is not a declared input")))
                }
            }
            Anchor::Relative => {
                let scoped = scope.join(&rest);
                if is_declared(&scoped) {
                    return Ok(scoped);
                }
                let prefixed = self.common_prefix.join(&rest);
                if is_declared(&prefixed) {
                    return Ok(prefixed);
                }
                Err(invalid(format!(
                    "neither '{scoped}' nor '{prefixed}' is a declared input"
                )))
            }
        }
    }

    /// Resolve an externally supplied path (CLI or query parameter).
    ///
    /// External paths are always absolute; neither the common prefix nor
    /// `PARENT.` may be used.
    pub fn resolve_external<F>(&self, raw: &str, is_declared: F) -> Result<ContextPath>
    where
        F: Fn(&ContextPath) -> bool,
    {
        let invalid = |reason: String| ArchetypeError::InvalidPath {
            path: raw.to_string(),
            scope: String::new(),
            reason,
        };
        let (anchor, rest) = split_anchor(raw).map_err(invalid)?;
        if let Anchor::Parent(_) = anchor {
            return Err(invalid("PARENT. is not allowed in external inputs".into()));
        }
        if !rest.is_root() && is_declared(&rest) {
            Ok(rest)
        } else {
            Err(invalid(format!("'{rest}' is not a declared input")))
        }
    }
}

fn split_anchor(raw: &str) -> std::result::Result<(Anchor, ContextPath), String> {
    let path = ContextPath::parse(raw).map_err(|_| "empty path segment".to_string())?;
    if path.is_root() {
        return Err("empty path".into());
    }

    let mut anchor = Anchor::Relative;
    let mut consumed = 0;
    for (i, segment) in path.segments().iter().enumerate() {
        match segment.as_str() {
            ROOT_KEYWORD => {
                if i != 0 {
                    return Err(match anchor {
                        Anchor::Parent(_) => "ROOT. cannot follow PARENT.".into(),
                        _ => "ROOT. may only appear at the start of a path".into(),
                    });
                }
                anchor = Anchor::Root;
                consumed += 1;
            }
            PARENT_KEYWORD => {
                anchor = match anchor {
                    Anchor::Relative if i == 0 => Anchor::Parent(1),
                    Anchor::Parent(n) if i == n => Anchor::Parent(n + 1),
                    Anchor::Root => return Err("PARENT. cannot follow ROOT.".into()),
                    _ => return Err("PARENT. may only appear at the start of a path".into()),
                };
                consumed += 1;
            }
            _ => break,
        }
    }

    let rest = ContextPath {
        segments: path.segments()[consumed..].to_vec(),
    };
    if rest
        .segments()
        .iter()
        .any(|s| s == ROOT_KEYWORD || s == PARENT_KEYWORD)
    {
        return Err("ROOT./PARENT. may only appear at the start of a path".into());
    }
    Ok((anchor, rest))
}
