use std::collections::{HashMap, HashSet};

use super::{Cid, CommentEdge};

/// A comment positioned in its post's discussion, before any trimming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentNode {
    pub cid: Cid,
    pub parent_cid: Option<Cid>,
    pub children: Vec<CommentNode>,
}

impl CommentNode {
    /// Number of comments in this subtree, the node itself included.
    pub fn size(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(&node.children);
        }
        count
    }
}

/// Takes `nodes` apart one level at a time and returns how many comments
/// they held. Reply chains can be arbitrarily deep, so subtrees that are
/// thrown away go through here instead of the recursive drop.
pub fn dismantle(nodes: impl IntoIterator<Item = CommentNode>) -> usize {
    let mut stack: Vec<CommentNode> = nodes.into_iter().collect();
    let mut count = 0;
    while let Some(mut node) = stack.pop() {
        count += 1;
        stack.append(&mut node.children);
    }
    count
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TreeRequest<'a> {
    /// Only show the subtree rooted at this comment.
    pub root: Option<&'a str>,
    /// When showing a subtree, wrap it in its parent.
    pub provide_context: bool,
    pub sticky: Option<&'a str>,
    /// Set for "load more" pages, which never re-pin the sticky comment.
    pub continuing: bool,
}

/// Builds the nested tree for `edges`, then applies subtree selection or the
/// sticky pin described by `request`.
pub fn assemble(edges: &[CommentEdge], request: &TreeRequest) -> Vec<CommentNode> {
    let mut tree = build_tree(edges);

    match request.root {
        Some(root) => select_subtree(tree, root, request.provide_context),
        None => {
            if let (Some(sticky), false) = (request.sticky, request.continuing) {
                pin_sticky(&mut tree, sticky);
            }
            tree
        }
    }
}

/// Converts a flat edge list into nested comments. Siblings keep the order in
/// which they appear in `edges`.
///
/// Comments whose parent is not part of `edges` are unreachable from the roots
/// and are left out, as are repeated cids after their first appearance.
pub fn build_tree(edges: &[CommentEdge]) -> Vec<CommentNode> {
    // Index children by parent so the conversion is O(n) instead of
    // rescanning the whole list for every node
    let mut seen = HashSet::with_capacity(edges.len());
    let mut children_of = HashMap::<Option<&str>, Vec<&CommentEdge>>::with_capacity(edges.len());

    for edge in edges {
        if !seen.insert(edge.cid.as_str()) {
            continue;
        }
        children_of
            .entry(edge.parent_cid.as_deref())
            .or_default()
            .push(edge);
    }

    struct Frame<'a> {
        edge: &'a CommentEdge,
        pending: std::vec::IntoIter<&'a CommentEdge>,
        built: Vec<CommentNode>,
    }

    let mut roots = Vec::new();
    let mut pending_roots = children_of.remove(&None).unwrap_or_default().into_iter();
    let mut stack: Vec<Frame> = Vec::new();

    loop {
        let next = match stack.last_mut() {
            Some(frame) => frame.pending.next(),
            None => pending_roots.next(),
        };

        match next {
            Some(edge) => {
                let pending = children_of
                    .remove(&Some(edge.cid.as_str()))
                    .unwrap_or_default()
                    .into_iter();
                stack.push(Frame {
                    edge,
                    pending,
                    built: Vec::new(),
                });
            }
            None => {
                let Some(frame) = stack.pop() else {
                    break;
                };
                let node = CommentNode {
                    cid: frame.edge.cid.clone(),
                    parent_cid: frame.edge.parent_cid.clone(),
                    children: frame.built,
                };
                match stack.last_mut() {
                    Some(parent) => parent.built.push(node),
                    None => roots.push(node),
                }
            }
        }
    }

    roots
}

pub fn find_node<'a>(tree: &'a [CommentNode], cid: &str) -> Option<&'a CommentNode> {
    let mut stack: Vec<&CommentNode> = tree.iter().rev().collect();
    while let Some(node) = stack.pop() {
        if node.cid == cid {
            return Some(node);
        }
        stack.extend(node.children.iter().rev());
    }
    None
}

/// Moves the subtree rooted at `cid` out of `tree`, discarding the rest.
fn take_node(tree: Vec<CommentNode>, cid: &str) -> Option<CommentNode> {
    let mut stack = tree;
    let mut found = None;
    while let Some(mut node) = stack.pop() {
        if node.cid == cid {
            found = Some(node);
            break;
        }
        stack.append(&mut node.children);
    }
    dismantle(stack);
    found
}

/// Returns the subtree rooted at `root`, optionally wrapped in its immediate
/// parent (with the parent's other children dropped). Empty when `root` is
/// not in the tree.
pub fn select_subtree(tree: Vec<CommentNode>, root: &str, provide_context: bool) -> Vec<CommentNode> {
    let Some(parent_cid) = find_node(&tree, root).map(|n| n.parent_cid.clone()) else {
        tracing::debug!(root, "requested comment is not part of the tree");
        dismantle(tree);
        return vec![];
    };

    let context = parent_cid
        .filter(|_| provide_context)
        .and_then(|parent_cid| find_node(&tree, &parent_cid))
        .map(|parent| (parent.cid.clone(), parent.parent_cid.clone()));

    let Some(node) = take_node(tree, root) else {
        return vec![];
    };

    match context {
        Some((cid, parent_cid)) => vec![CommentNode {
            cid,
            parent_cid,
            children: vec![node],
        }],
        None => vec![node],
    }
}

/// Moves the root-level comment `sticky` to the front. Nested comments are
/// never pinned.
pub fn pin_sticky(tree: &mut Vec<CommentNode>, sticky: &str) {
    if let Some(pos) = tree.iter().position(|n| n.cid == sticky) {
        let node = tree.remove(pos);
        tree.insert(0, node);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn edges(pairs: &[(&str, Option<&str>)]) -> Vec<CommentEdge> {
        pairs
            .iter()
            .map(|(cid, parent)| CommentEdge::new(*cid, *parent))
            .collect()
    }

    fn cids(nodes: &[CommentNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.cid.as_str()).collect()
    }

    fn count_occurrences(tree: &[CommentNode], counts: &mut HashMap<String, usize>) {
        for node in tree {
            *counts.entry(node.cid.clone()).or_default() += 1;
            count_occurrences(&node.children, counts);
        }
    }

    #[test]
    fn test_build_tree_with_no_comments() {
        let result = build_tree(&[]);
        assert!(result.is_empty(), "Expected no comments in the tree");
    }

    #[test]
    fn test_build_tree_keeps_every_comment_once() {
        let input = edges(&[
            ("c", Some("a")),
            ("a", None),
            ("b", None),
            ("d", Some("c")),
            ("e", Some("a")),
            ("f", Some("b")),
            ("g", Some("d")),
        ]);

        let tree = build_tree(&input);

        let mut counts = HashMap::new();
        count_occurrences(&tree, &mut counts);
        assert_eq!(counts.len(), input.len());
        assert!(counts.values().all(|&c| c == 1));
        assert_eq!(tree.iter().map(CommentNode::size).sum::<usize>(), 7);
    }

    #[test]
    fn test_build_tree_preserves_sibling_order() {
        let tree = build_tree(&edges(&[
            ("a", None),
            ("x", Some("a")),
            ("b", None),
            ("y", Some("a")),
            ("w", Some("a")),
        ]));

        assert_eq!(cids(&tree), vec!["a", "b"]);
        assert_eq!(cids(&tree[0].children), vec!["x", "y", "w"]);
    }

    #[test]
    fn test_orphans_and_cycles_are_dropped() {
        let tree = build_tree(&edges(&[
            ("a", None),
            ("orphan", Some("missing")),
            ("child-of-orphan", Some("orphan")),
            ("loop1", Some("loop2")),
            ("loop2", Some("loop1")),
        ]));

        assert_eq!(cids(&tree), vec!["a"]);
        assert!(tree[0].children.is_empty());
    }

    #[test]
    fn test_sticky_is_pinned_first() {
        let tree = assemble(
            &edges(&[("A", None), ("B", None), ("C", Some("A"))]),
            &TreeRequest {
                sticky: Some("B"),
                ..Default::default()
            },
        );

        assert_eq!(cids(&tree), vec!["B", "A"]);
        assert_eq!(cids(&tree[1].children), vec!["C"]);
    }

    #[test]
    fn test_sticky_is_not_pinned_on_continuation_pages() {
        let tree = assemble(
            &edges(&[("A", None), ("B", None)]),
            &TreeRequest {
                sticky: Some("B"),
                continuing: true,
                ..Default::default()
            },
        );

        assert_eq!(cids(&tree), vec!["A", "B"]);
    }

    #[test]
    fn test_nested_sticky_is_ignored() {
        let tree = assemble(
            &edges(&[("A", None), ("B", None), ("C", Some("A"))]),
            &TreeRequest {
                sticky: Some("C"),
                ..Default::default()
            },
        );

        assert_eq!(cids(&tree), vec!["A", "B"]);
    }

    #[test]
    fn test_select_subtree_with_context() {
        let input = edges(&[
            ("a", None),
            ("b", Some("a")),
            ("sibling", Some("a")),
            ("c", Some("b")),
        ]);

        let tree = assemble(
            &input,
            &TreeRequest {
                root: Some("b"),
                provide_context: true,
                ..Default::default()
            },
        );

        assert_eq!(cids(&tree), vec!["a"]);
        assert_eq!(cids(&tree[0].children), vec!["b"]);
        assert_eq!(cids(&tree[0].children[0].children), vec!["c"]);
    }

    #[test]
    fn test_select_subtree_without_context_or_at_root() {
        let input = edges(&[("a", None), ("b", Some("a")), ("c", Some("b"))]);

        let no_context = assemble(
            &input,
            &TreeRequest {
                root: Some("b"),
                ..Default::default()
            },
        );
        assert_eq!(cids(&no_context), vec!["b"]);

        let already_root = assemble(
            &input,
            &TreeRequest {
                root: Some("a"),
                provide_context: true,
                ..Default::default()
            },
        );
        assert_eq!(cids(&already_root), vec!["a"]);
        assert_eq!(cids(&already_root[0].children), vec!["b"]);
    }

    #[test]
    fn test_select_subtree_missing_root_is_empty() {
        let tree = assemble(
            &edges(&[("a", None)]),
            &TreeRequest {
                root: Some("nope"),
                provide_context: true,
                ..Default::default()
            },
        );
        assert!(tree.is_empty());
    }
}
