//! Scope Tree - lexical visibility for type names.
//!
//! Uses `petgraph::DiGraph` with:
//! - Nodes: `ScopeData` (names bound at that level)
//! - Edges: `Contains` for lexical nesting, `Imports` for file imports
//!
//! The shape is always prelude → file → type → method. A name is looked up
//! in the current node, then in each enclosing node; at every level the
//! files imported from that level are searched too (non-transitively).

use kestrel_core::{DefId, FileId};
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use rustc_hash::FxHashMap;

/// What a scope node belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Prelude,
    File(FileId),
    Type(DefId),
    Method,
}

/// Edge types in the scope graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeEdge {
    /// Enclosing scope contains the nested scope.
    Contains,
    /// A file scope can see the names of another file scope.
    Imports,
}

/// What a name refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeBinding {
    Definition(DefId),
    /// A generic parameter of the enclosing type or method.
    Generic { index: u32, method_level: bool },
}

#[derive(Debug)]
pub struct ScopeData {
    pub kind: ScopeKind,
    pub names: FxHashMap<String, ScopeBinding>,
}

impl ScopeData {
    fn new(kind: ScopeKind) -> Self {
        Self {
            kind,
            names: FxHashMap::default(),
        }
    }
}

#[derive(Debug)]
pub struct ScopeTree {
    graph: DiGraph<ScopeData, ScopeEdge>,
    root: NodeIndex,
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeTree {
    /// Create a tree holding only the prelude scope.
    pub fn new() -> Self {
        let mut graph = DiGraph::new();
        let root = graph.add_node(ScopeData::new(ScopeKind::Prelude));
        Self { graph, root }
    }

    /// The prelude scope every other scope descends from.
    pub fn root(&self) -> NodeIndex {
        self.root
    }

    pub fn get(&self, node: NodeIndex) -> Option<&ScopeData> {
        self.graph.node_weight(node)
    }

    pub fn kind(&self, node: NodeIndex) -> Option<ScopeKind> {
        self.graph.node_weight(node).map(|data| data.kind)
    }

    /// Add a nested scope under `parent`.
    pub fn add_child(&mut self, parent: NodeIndex, kind: ScopeKind) -> NodeIndex {
        let child = self.graph.add_node(ScopeData::new(kind));
        self.graph.add_edge(parent, child, ScopeEdge::Contains);
        child
    }

    /// Bind a name in a scope. Returns `false` if the scope already binds it.
    pub fn declare(&mut self, node: NodeIndex, name: &str, binding: ScopeBinding) -> bool {
        let Some(data) = self.graph.node_weight_mut(node) else {
            return false;
        };
        if data.names.contains_key(name) {
            return false;
        }
        data.names.insert(name.to_string(), binding);
        true
    }

    /// Make the names of `target` visible from `from`.
    pub fn add_import(&mut self, from: NodeIndex, target: NodeIndex) {
        // Avoid duplicate import edges
        for edge in self.graph.edges(from) {
            if matches!(edge.weight(), ScopeEdge::Imports) && edge.target() == target {
                return;
            }
        }
        self.graph.add_edge(from, target, ScopeEdge::Imports);
    }

    /// Scopes imported directly from `node`, in import order.
    pub fn imports(&self, node: NodeIndex) -> Vec<NodeIndex> {
        // petgraph yields outgoing edges newest first
        let mut targets: Vec<NodeIndex> = self
            .graph
            .edges(node)
            .filter(|edge| matches!(edge.weight(), ScopeEdge::Imports))
            .map(|edge| edge.target())
            .collect();
        targets.reverse();
        targets
    }

    /// The lexically enclosing scope.
    pub fn parent(&self, node: NodeIndex) -> Option<NodeIndex> {
        self.graph
            .edges_directed(node, Direction::Incoming)
            .find(|edge| matches!(edge.weight(), ScopeEdge::Contains))
            .map(|edge| edge.source())
    }

    /// The nearest enclosing file scope, including `node` itself.
    pub fn enclosing_file(&self, node: NodeIndex) -> Option<NodeIndex> {
        let mut current = Some(node);
        while let Some(scope) = current {
            if matches!(self.kind(scope), Some(ScopeKind::File(_))) {
                return Some(scope);
            }
            current = self.parent(scope);
        }
        None
    }

    /// Resolve a name as seen from `node`.
    ///
    /// Search order: the node itself, then enclosing scopes up to the
    /// prelude. At each level, names bound directly win over names brought
    /// in by imports; the first import (in import order) that binds the name
    /// wins over later ones.
    pub fn resolve(&self, node: NodeIndex, name: &str) -> Option<ScopeBinding> {
        let mut current = Some(node);
        while let Some(scope) = current {
            let data = self.graph.node_weight(scope)?;
            if let Some(binding) = data.names.get(name) {
                return Some(*binding);
            }
            for imported in self.imports(scope) {
                if let Some(binding) = self
                    .graph
                    .node_weight(imported)
                    .and_then(|d| d.names.get(name))
                {
                    return Some(*binding);
                }
            }
            current = self.parent(scope);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(n: u32) -> ScopeBinding {
        ScopeBinding::Definition(DefId::new(n))
    }

    #[test]
    fn root_is_prelude() {
        let tree = ScopeTree::new();
        assert_eq!(tree.kind(tree.root()), Some(ScopeKind::Prelude));
        assert_eq!(tree.parent(tree.root()), None);
    }

    #[test]
    fn nested_scope_sees_outer_names() {
        let mut tree = ScopeTree::new();
        let root = tree.root();
        assert!(tree.declare(root, "Int", def(0)));
        let file = tree.add_child(root, ScopeKind::File(FileId::new(0)));
        let ty = tree.add_child(file, ScopeKind::Type(DefId::new(5)));
        assert_eq!(tree.resolve(ty, "Int"), Some(def(0)));
        assert_eq!(tree.resolve(ty, "Missing"), None);
    }

    #[test]
    fn inner_binding_shadows_outer() {
        let mut tree = ScopeTree::new();
        let root = tree.root();
        tree.declare(root, "T", def(0));
        let file = tree.add_child(root, ScopeKind::File(FileId::new(0)));
        let ty = tree.add_child(file, ScopeKind::Type(DefId::new(1)));
        let generic = ScopeBinding::Generic {
            index: 0,
            method_level: false,
        };
        tree.declare(ty, "T", generic);
        assert_eq!(tree.resolve(ty, "T"), Some(generic));
        assert_eq!(tree.resolve(file, "T"), Some(def(0)));
    }

    #[test]
    fn duplicate_declaration_is_rejected() {
        let mut tree = ScopeTree::new();
        let root = tree.root();
        assert!(tree.declare(root, "A", def(0)));
        assert!(!tree.declare(root, "A", def(1)));
        assert_eq!(tree.resolve(root, "A"), Some(def(0)));
    }

    #[test]
    fn imports_are_not_transitive() {
        let mut tree = ScopeTree::new();
        let root = tree.root();
        let a = tree.add_child(root, ScopeKind::File(FileId::new(0)));
        let b = tree.add_child(root, ScopeKind::File(FileId::new(1)));
        let c = tree.add_child(root, ScopeKind::File(FileId::new(2)));
        tree.declare(b, "B", def(1));
        tree.declare(c, "C", def(2));
        tree.add_import(a, b);
        tree.add_import(b, c);
        assert_eq!(tree.resolve(a, "B"), Some(def(1)));
        assert_eq!(tree.resolve(a, "C"), None);
        assert_eq!(tree.resolve(b, "C"), Some(def(2)));
    }

    #[test]
    fn duplicate_import_is_ignored() {
        let mut tree = ScopeTree::new();
        let root = tree.root();
        let a = tree.add_child(root, ScopeKind::File(FileId::new(0)));
        let b = tree.add_child(root, ScopeKind::File(FileId::new(1)));
        tree.add_import(a, b);
        tree.add_import(a, b);
        assert_eq!(tree.imports(a), vec![b]);
    }

    #[test]
    fn enclosing_file_walks_up() {
        let mut tree = ScopeTree::new();
        let root = tree.root();
        let file = tree.add_child(root, ScopeKind::File(FileId::new(3)));
        let ty = tree.add_child(file, ScopeKind::Type(DefId::new(1)));
        let method = tree.add_child(ty, ScopeKind::Method);
        assert_eq!(tree.enclosing_file(method), Some(file));
        assert_eq!(tree.enclosing_file(root), None);
    }
}
