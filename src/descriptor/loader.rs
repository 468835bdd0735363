use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use super::model::{Directive, Document, SourceRef};
use super::xml::parse_document;
use crate::error::{ArchetypeError, Result};

/// Parsed descriptors keyed by canonical path.
///
/// Documents are immutable once parsed, so one cache can back any number of
/// archetype builds. Entries stay until explicitly invalidated.
#[derive(Debug, Default)]
pub struct DescriptorCache {
    documents: HashMap<PathBuf, Arc<Document>>,
}

impl DescriptorCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&mut self, path: &Path) -> Result<Arc<Document>> {
        let canonical = path
            .canonicalize()
            .map_err(|e| ArchetypeError::DescriptorLoad {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        if let Some(doc) = self.documents.get(&canonical) {
            return Ok(Arc::clone(doc));
        }

        let text = std::fs::read_to_string(&canonical).map_err(|e| {
            ArchetypeError::DescriptorLoad {
                path: canonical.clone(),
                reason: e.to_string(),
            }
        })?;
        let doc = Arc::new(parse_document(&canonical, &text)?);
        debug!(path = %canonical.display(), "parsed descriptor");
        self.documents.insert(canonical, Arc::clone(&doc));
        Ok(doc)
    }

    /// Drop the cached copy of `path`, returning whether one existed.
    pub fn invalidate(&mut self, path: &Path) -> bool {
        let key = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        self.documents.remove(&key).is_some()
    }

    pub fn clear(&mut self) {
        self.documents.clear();
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Invoke,
    Include,
}

#[derive(Debug, Clone)]
pub struct Edge {
    pub kind: EdgeKind,
    pub src: String,
    pub target: DocId,
}

/// The documents reachable from a root descriptor and the invoke/include
/// edges between them. Building it rejects cycles, so anything walking the
/// graph afterwards terminates.
#[derive(Debug, Default)]
pub struct InvokeGraph {
    documents: Vec<Arc<Document>>,
    index: HashMap<PathBuf, DocId>,
    edges: Vec<Vec<Edge>>,
}

impl InvokeGraph {
    pub fn build(cache: &mut DescriptorCache, root: &Path) -> Result<(Self, DocId)> {
        let mut graph = Self::default();
        let mut active = Vec::new();
        let root_id = graph.visit(cache, root, &mut active)?;
        Ok((graph, root_id))
    }

    pub fn document(&self, id: DocId) -> &Arc<Document> {
        &self.documents[id.0]
    }

    pub fn edges(&self, id: DocId) -> &[Edge] {
        &self.edges[id.0]
    }

    /// The document a `src` attribute of document `from` points to.
    pub fn target(&self, from: DocId, src: &str) -> Option<DocId> {
        self.edges[from.0]
            .iter()
            .find(|e| e.src == src)
            .map(|e| e.target)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    fn visit(
        &mut self,
        cache: &mut DescriptorCache,
        path: &Path,
        active: &mut Vec<DocId>,
    ) -> Result<DocId> {
        let doc = cache.load(path)?;

        if let Some(&id) = self.index.get(&doc.path) {
            if let Some(pos) = active.iter().position(|a| *a == id) {
                let mut chain: Vec<String> = active[pos..]
                    .iter()
                    .map(|a| self.documents[a.0].path.display().to_string())
                    .collect();
                chain.push(doc.path.display().to_string());
                return Err(ArchetypeError::CyclicInvoke { chain });
            }
            return Ok(id);
        }

        let id = DocId(self.documents.len());
        self.documents.push(Arc::clone(&doc));
        self.index.insert(doc.path.clone(), id);
        self.edges.push(Vec::new());

        active.push(id);
        let mut refs = Vec::new();
        collect_refs(&doc.body, &mut refs);
        let dir = doc.dir();
        for (kind, source) in refs {
            if self.edges[id.0].iter().any(|e| e.src == source.src) {
                continue;
            }
            let target_path = dir.join(&source.src);
            let target = match self.visit(cache, &target_path, active) {
                Ok(target) => target,
                Err(ArchetypeError::DescriptorLoad { path, reason }) if path == target_path => {
                    return Err(ArchetypeError::DescriptorLoad {
                        path,
                        reason: format!("{reason} (referenced from {})", source.location),
                    })
                }
                Err(e) => return Err(e),
            };
            self.edges[id.0].push(Edge {
                kind,
                src: source.src.clone(),
                target,
            });
        }
        active.pop();

        Ok(id)
    }
}

fn collect_refs<'a>(body: &'a [Directive], out: &mut Vec<(EdgeKind, &'a SourceRef)>) {
    for directive in body {
        match directive {
            Directive::Invoke(r) => out.push((EdgeKind::Invoke, r)),
            Directive::Include(r) => out.push((EdgeKind::Include, r)),
            Directive::Step(step) => collect_refs(&step.body, out),
            Directive::Input(input) => {
                collect_refs(&input.body, out);
                for option in &input.options {
                    collect_refs(&option.body, out);
                }
            }
            Directive::Context(_) | Directive::Output(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, body: &str) {
        std::fs::write(
            dir.join(name),
            format!("<archetype-flow>{body}</archetype-flow>"),
        )
        .unwrap();
    }

    #[test]
    fn caches_by_canonical_path() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("sub")).unwrap();
        write(tmp.path(), "a.xml", "");

        let mut cache = DescriptorCache::new();
        let first = cache.load(&tmp.path().join("a.xml")).unwrap();
        let second = cache.load(&tmp.path().join("sub/../a.xml")).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);

        assert!(cache.invalidate(&tmp.path().join("a.xml")));
        assert!(cache.is_empty());
    }

    #[test]
    fn builds_graph_with_shared_targets() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "root.xml",
            r#"<invoke src="a.xml"/><include src="common.xml"/>"#,
        );
        write(tmp.path(), "a.xml", r#"<include src="common.xml"/>"#);
        write(tmp.path(), "common.xml", "");

        let mut cache = DescriptorCache::new();
        let (graph, root) = InvokeGraph::build(&mut cache, &tmp.path().join("root.xml")).unwrap();
        assert_eq!(graph.len(), 3);
        assert_eq!(graph.edges(root).len(), 2);
        let a = graph.target(root, "a.xml").unwrap();
        assert_eq!(graph.target(a, "common.xml"), graph.target(root, "common.xml"));
    }

    #[test]
    fn detects_invoke_cycles() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "root.xml", r#"<invoke src="a.xml"/>"#);
        write(
            tmp.path(),
            "a.xml",
            r#"<flow-step id="s"><invoke src="b.xml"/></flow-step>"#,
        );
        write(tmp.path(), "b.xml", r#"<include src="a.xml"/>"#);

        let mut cache = DescriptorCache::new();
        let err = InvokeGraph::build(&mut cache, &tmp.path().join("root.xml")).unwrap_err();
        match err {
            ArchetypeError::CyclicInvoke { chain } => {
                assert_eq!(chain.len(), 3);
                assert!(chain[0].ends_with("a.xml"));
                assert!(chain[2].ends_with("a.xml"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_source_names_the_referencing_location() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "root.xml", r#"<invoke src="missing.xml"/>"#);

        let mut cache = DescriptorCache::new();
        let err = InvokeGraph::build(&mut cache, &tmp.path().join("root.xml")).unwrap_err();
        match err {
            ArchetypeError::DescriptorLoad { reason, .. } => {
                assert!(reason.contains("referenced from"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
