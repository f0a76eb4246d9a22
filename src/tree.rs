//! Arena-backed dependency tree shared by the runners, the engine and the reporters.
//!
//! Nodes live in a single `Vec` owned by the tree. Children are stored as
//! ordered [`NodeId`] lists and every node keeps a non-owning index to its
//! parent, so dropping the tree drops everything at once.

use std::collections::BTreeSet;

/// Index of a node inside the [`DependencyTree`] that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// A package at one position in the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Node<T> {
    pub name: String,
    pub version: String,
    /// Per-node payload: `()` for raw trees, an annotation after license checking.
    pub data: T,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl<T> Node<T> {
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// Rooted, ordered tree of packages. The root is the project itself.
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyTree<T = ()> {
    nodes: Vec<Node<T>>,
}

/// Tree as produced by a runner, before license annotation.
pub type RawTree = DependencyTree<()>;

impl RawTree {
    /// Create a raw tree holding only the project root.
    pub fn with_root(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self::new(name, version, ())
    }

    /// Add a dependency below `parent` in a raw tree.
    pub fn push(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> NodeId {
        self.add_child(parent, name, version, ())
    }
}

impl<T> DependencyTree<T> {
    pub fn new(name: impl Into<String>, version: impl Into<String>, data: T) -> Self {
        Self {
            nodes: vec![Node {
                name: name.into(),
                version: version.into(),
                data,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn is_root(&self, id: NodeId) -> bool {
        id.0 == 0
    }

    /// Append a child at the end of `parent`'s children.
    pub fn add_child(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        version: impl Into<String>,
        data: T,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            name: name.into(),
            version: version.into(),
            data,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Panics if `id` was not produced by this tree.
    pub fn node(&self, id: NodeId) -> &Node<T> {
        &self.nodes[id.0]
    }

    /// Mutable access to a node's name, version and payload; links stay private.
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node<T> {
        &mut self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Distance from the root, in edges.
    pub fn depth(&self, id: NodeId) -> usize {
        self.ancestors(id).count()
    }

    /// Length of the longest root-to-leaf path, in edges.
    ///
    /// A height of 0 means the tree is the root alone.
    pub fn height(&self) -> usize {
        let mut depths = vec![0usize; self.nodes.len()];
        let mut height = 0;
        for (id, node) in self.iter() {
            if let Some(parent) = node.parent {
                depths[id.0] = depths[parent.0] + 1;
                height = height.max(depths[id.0]);
            }
        }
        height
    }

    /// Strict ancestors of `id`, nearest first, ending with the root.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_, T> {
        Ancestors {
            tree: self,
            next: self.nodes[id.0].parent,
        }
    }

    /// Pre-order traversal: parent before children, children in insertion order.
    pub fn iter(&self) -> PreOrder<'_, T> {
        PreOrder {
            tree: self,
            stack: vec![self.root()],
        }
    }

    /// Build a tree of identical shape whose payloads are computed by `f`.
    ///
    /// Node ids are stable across the mapping.
    pub fn map<U>(&self, mut f: impl FnMut(NodeId, &Node<T>) -> U) -> DependencyTree<U> {
        let nodes = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, node)| Node {
                name: node.name.clone(),
                version: node.version.clone(),
                data: f(NodeId(i), node),
                parent: node.parent,
                children: node.children.clone(),
            })
            .collect();
        DependencyTree { nodes }
    }

    /// Distinct `(name, version)` pairs of every dependency, root excluded.
    pub fn flatten(&self) -> BTreeSet<(String, String)> {
        self.iter()
            .filter(|(id, _)| !self.is_root(*id))
            .map(|(_, node)| (node.name.clone(), node.version.clone()))
            .collect()
    }
}

/// Lazy pre-order iterator returned by [`DependencyTree::iter`].
pub struct PreOrder<'a, T> {
    tree: &'a DependencyTree<T>,
    stack: Vec<NodeId>,
}

impl<'a, T> Iterator for PreOrder<'a, T> {
    type Item = (NodeId, &'a Node<T>);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let node = self.tree.node(id);
        self.stack.extend(node.children.iter().rev().copied());
        Some((id, node))
    }
}

/// Iterator returned by [`DependencyTree::ancestors`].
pub struct Ancestors<'a, T> {
    tree: &'a DependencyTree<T>,
    next: Option<NodeId>,
}

impl<'a, T> Iterator for Ancestors<'a, T> {
    type Item = (NodeId, &'a Node<T>);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next?;
        let node = self.tree.node(id);
        self.next = node.parent;
        Some((id, node))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Project with a few shared and repeated packages:
    ///
    /// ```text
    /// Name
    /// ├── @company/package1 1.1.1
    /// │   ├── package2 2.2.2
    /// │   │   ├── package5 5.5.5
    /// │   │   └── package7 7.7.7
    /// │   ├── package3 3.3.3
    /// │   │   └── package7 7.7.6
    /// │   ├── package4 4.4.4
    /// │   └── package5 5.5.5
    /// │       └── package6 6.6.6
    /// └── package4 4.4.4
    ///     └── package6 6.6.6
    /// ```
    pub(crate) fn sample_tree() -> RawTree {
        let mut tree = RawTree::with_root("Name", "");
        let root = tree.root();
        let package1 = tree.push(root, "@company/package1", "1.1.1");
        let package4 = tree.push(root, "package4", "4.4.4");

        let package2 = tree.push(package1, "package2", "2.2.2");
        tree.push(package2, "package5", "5.5.5");
        tree.push(package2, "package7", "7.7.7");

        let package3 = tree.push(package1, "package3", "3.3.3");
        tree.push(package3, "package7", "7.7.6");

        tree.push(package1, "package4", "4.4.4");

        let package5 = tree.push(package1, "package5", "5.5.5");
        tree.push(package5, "package6", "6.6.6");

        tree.push(package4, "package6", "6.6.6");
        tree
    }

    fn names<T>(tree: &DependencyTree<T>) -> Vec<String> {
        tree.iter()
            .map(|(_, n)| format!("{}@{}", n.name, n.version))
            .collect()
    }

    #[test]
    fn test_pre_order_keeps_child_order() {
        let tree = sample_tree();
        assert_eq!(
            names(&tree),
            vec![
                "Name@",
                "@company/package1@1.1.1",
                "package2@2.2.2",
                "package5@5.5.5",
                "package7@7.7.7",
                "package3@3.3.3",
                "package7@7.7.6",
                "package4@4.4.4",
                "package5@5.5.5",
                "package6@6.6.6",
                "package4@4.4.4",
                "package6@6.6.6",
            ]
        );
    }

    #[test]
    fn test_iteration_is_restartable() {
        let tree = sample_tree();
        assert_eq!(names(&tree), names(&tree));
        assert_eq!(tree.iter().count(), tree.len());
    }

    #[test]
    fn test_depth_and_height() {
        let tree = sample_tree();
        assert_eq!(tree.depth(tree.root()), 0);
        assert_eq!(tree.height(), 3);

        let package1 = tree.node(tree.root()).children()[0];
        assert_eq!(tree.depth(package1), 1);
        let package2 = tree.node(package1).children()[0];
        let package5 = tree.node(package2).children()[0];
        assert_eq!(tree.depth(package5), 3);
        assert_eq!(tree.node(package5).parent(), Some(package2));
    }

    #[test]
    fn test_root_only_tree_has_zero_height() {
        let tree = RawTree::with_root("app", "1.0.0");
        assert_eq!(tree.height(), 0);
        assert_eq!(tree.len(), 1);
        assert!(tree.flatten().is_empty());
    }

    #[test]
    fn test_flatten_deduplicates_packages() {
        let tree = sample_tree();
        let expected: BTreeSet<(String, String)> = [
            ("@company/package1", "1.1.1"),
            ("package2", "2.2.2"),
            ("package3", "3.3.3"),
            ("package4", "4.4.4"),
            ("package5", "5.5.5"),
            ("package6", "6.6.6"),
            ("package7", "7.7.6"),
            ("package7", "7.7.7"),
        ]
        .into_iter()
        .map(|(n, v)| (n.to_string(), v.to_string()))
        .collect();
        assert_eq!(tree.flatten(), expected);
    }

    #[test]
    fn test_map_preserves_shape() {
        let tree = sample_tree();
        let mapped = tree.map(|id, _| tree.depth(id));
        assert_eq!(names(&mapped), names(&tree));
        for (id, node) in mapped.iter() {
            assert_eq!(node.data, tree.depth(id));
            assert_eq!(node.children(), tree.node(id).children());
        }
    }

    #[test]
    fn test_ancestors_end_at_root() {
        let tree = sample_tree();
        let leaf = tree
            .iter()
            .find(|(_, n)| n.name == "package7" && n.version == "7.7.6")
            .map(|(id, _)| id)
            .unwrap();
        let chain: Vec<&str> = tree.ancestors(leaf).map(|(_, n)| n.name.as_str()).collect();
        assert_eq!(chain, vec!["package3", "@company/package1", "Name"]);
    }
}
