//! The compiled resource catalog

use crate::ast::Location;
use crate::value::{ResourceKey, Value};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

/// One declared resource, independent of how it will be enforced
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AbstractResource {
    pub key: ResourceKey,
    pub parameters: BTreeMap<String, Value>,
    /// Observe this resource even when the run applies changes
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub noop: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declared_at: Option<Location>,
}

impl AbstractResource {
    pub fn new(key: ResourceKey, parameters: BTreeMap<String, Value>) -> Self {
        Self {
            key,
            parameters,
            noop: false,
            declared_at: None,
        }
    }

    pub fn with_noop(mut self, noop: bool) -> Self {
        self.noop = noop;
        self
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.declared_at = Some(location);
        self
    }

    pub fn is_container(&self) -> bool {
        self.key.is_container()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    /// Container to member
    Contains,
    /// Source must be enforced before target
    Before,
    /// Before, and a change in source refreshes target
    Notify,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Edge {
    pub source: ResourceKey,
    pub target: ResourceKey,
    pub kind: EdgeKind,
}

impl Edge {
    pub fn new(source: ResourceKey, target: ResourceKey, kind: EdgeKind) -> Self {
        Self { source, target, kind }
    }
}

/// Resources in declaration order plus the edges between them
#[derive(Debug, Clone, Serialize)]
pub struct Catalog {
    node: String,
    resources: Vec<AbstractResource>,
    #[serde(skip)]
    index: HashMap<ResourceKey, usize>,
    edges: Vec<Edge>,
}

impl Catalog {
    pub fn new(node: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            resources: Vec::new(),
            index: HashMap::new(),
            edges: Vec::new(),
        }
    }

    pub fn node(&self) -> &str {
        &self.node
    }

    /// Add a resource. Returns the existing entry if the key is taken.
    pub fn add_resource(&mut self, resource: AbstractResource) -> Result<(), &AbstractResource> {
        if let Some(&existing) = self.index.get(&resource.key) {
            return Err(&self.resources[existing]);
        }
        self.index.insert(resource.key.clone(), self.resources.len());
        self.resources.push(resource);
        Ok(())
    }

    /// Add an edge; duplicates are ignored
    pub fn add_edge(&mut self, edge: Edge) {
        if !self.edges.contains(&edge) {
            self.edges.push(edge);
        }
    }

    pub fn resources(&self) -> &[AbstractResource] {
        &self.resources
    }

    pub fn resources_mut(&mut self) -> impl Iterator<Item = &mut AbstractResource> {
        self.resources.iter_mut()
    }

    pub fn resource(&self, key: &ResourceKey) -> Option<&AbstractResource> {
        self.index.get(key).map(|&i| &self.resources[i])
    }

    pub fn index_of(&self, key: &ResourceKey) -> Option<usize> {
        self.index.get(key).copied()
    }

    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.index.contains_key(key)
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Direct members of a container
    pub fn children<'a>(&'a self, container: &'a ResourceKey) -> impl Iterator<Item = &'a ResourceKey> {
        self.edges
            .iter()
            .filter(move |e| e.kind == EdgeKind::Contains && &e.source == container)
            .map(|e| &e.target)
    }

    /// Leaf resources reachable from `key` through containment. A leaf
    /// resolves to itself; an empty container resolves to nothing.
    pub fn leaves_of(&self, key: &ResourceKey) -> Vec<ResourceKey> {
        let mut leaves = Vec::new();
        let mut seen = HashSet::new();
        self.collect_leaves(key, &mut seen, &mut leaves);
        leaves.sort_by_key(|k| self.index_of(k));
        leaves
    }

    fn collect_leaves(&self, key: &ResourceKey, seen: &mut HashSet<ResourceKey>, leaves: &mut Vec<ResourceKey>) {
        if !seen.insert(key.clone()) {
            return;
        }
        if !key.is_container() {
            leaves.push(key.clone());
            return;
        }
        for child in self.children(key) {
            self.collect_leaves(child, seen, leaves);
        }
    }

    /// Whether `to` is reachable from `from` through containment edges
    pub fn contains_transitively(&self, from: &ResourceKey, to: &ResourceKey) -> bool {
        let mut stack = vec![from];
        let mut seen = HashSet::new();
        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            if seen.insert(current) {
                stack.extend(self.children(current));
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(t: &str, title: &str) -> ResourceKey {
        ResourceKey::new(t, title)
    }

    fn catalog() -> Catalog {
        let mut catalog = Catalog::new("web01");
        for k in [
            key("class", "main"),
            key("file", "/a"),
            key("class", "app"),
            key("file", "/b"),
            key("class", "empty"),
        ] {
            catalog.add_resource(AbstractResource::new(k, BTreeMap::new())).unwrap();
        }
        catalog.add_edge(Edge::new(key("class", "main"), key("file", "/a"), EdgeKind::Contains));
        catalog.add_edge(Edge::new(key("class", "main"), key("class", "app"), EdgeKind::Contains));
        catalog.add_edge(Edge::new(key("class", "app"), key("file", "/b"), EdgeKind::Contains));
        catalog.add_edge(Edge::new(key("class", "main"), key("class", "empty"), EdgeKind::Contains));
        catalog
    }

    #[test]
    fn test_duplicate_resource_is_rejected() {
        let mut catalog = catalog();
        let existing = catalog
            .add_resource(AbstractResource::new(key("File", "/a"), BTreeMap::new()))
            .unwrap_err();
        assert_eq!(existing.key, key("file", "/a"));
        assert_eq!(catalog.len(), 5);
    }

    #[test]
    fn test_leaves_expand_through_containers() {
        let catalog = catalog();
        assert_eq!(catalog.leaves_of(&key("class", "main")), vec![key("file", "/a"), key("file", "/b")]);
        assert_eq!(catalog.leaves_of(&key("file", "/a")), vec![key("file", "/a")]);
        assert!(catalog.leaves_of(&key("class", "empty")).is_empty());
    }

    #[test]
    fn test_contains_transitively() {
        let catalog = catalog();
        assert!(catalog.contains_transitively(&key("class", "main"), &key("file", "/b")));
        assert!(!catalog.contains_transitively(&key("class", "app"), &key("file", "/a")));
    }

    #[test]
    fn test_duplicate_edges_are_ignored() {
        let mut catalog = catalog();
        let before = catalog.edges().len();
        catalog.add_edge(Edge::new(key("class", "main"), key("file", "/a"), EdgeKind::Contains));
        assert_eq!(catalog.edges().len(), before);
    }
}
