use std::collections::{HashMap, HashSet};

use crate::engine::annotate::AnnotatedTree;
use crate::tree::{DependencyTree, NodeId};

/// Prune every subtree whose nodes are all `Ok`.
///
/// A node survives if it is not `Ok` itself or if one of its descendants is
/// not. The root always survives, so a tree without problems is reduced to
/// the root alone. Sibling order is preserved and the operation is
/// idempotent.
pub fn filter(tree: &AnnotatedTree) -> AnnotatedTree {
    let keep = problem_nodes(tree);

    let root = tree.node(tree.root());
    let mut filtered = DependencyTree::new(&root.name, &root.version, root.data.clone());

    let mut new_ids: HashMap<NodeId, NodeId> = HashMap::new();
    new_ids.insert(tree.root(), filtered.root());

    for (id, node) in tree.iter() {
        if tree.is_root(id) || !keep.contains(&id) {
            continue;
        }
        // Pre-order: a kept node's parent is kept and already copied.
        let Some(parent) = node.parent().and_then(|p| new_ids.get(&p).copied()) else {
            continue;
        };
        let copy = filtered.add_child(parent, &node.name, &node.version, node.data.clone());
        new_ids.insert(id, copy);
    }

    filtered
}

/// Nodes that are not `Ok` or have a descendant that is not `Ok`.
fn problem_nodes(tree: &AnnotatedTree) -> HashSet<NodeId> {
    let order: Vec<NodeId> = tree.iter().map(|(id, _)| id).collect();
    let mut keep = HashSet::new();

    for id in order.into_iter().rev() {
        let node = tree.node(id);
        if !node.data.status.is_ok() || keep.contains(&id) {
            keep.insert(id);
            if let Some(parent) = node.parent() {
                keep.insert(parent);
            }
        }
    }

    keep
}
