use serde::{Deserialize, Serialize};

use super::{
    Cid,
    tree::{CommentNode, dismantle},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrimLimits {
    /// Levels of real comments kept below (and including) the top level.
    pub max_depth: usize,
    pub root_breadth: usize,
    pub nested_breadth: usize,
}

impl Default for TrimLimits {
    fn default() -> Self {
        TrimLimits {
            max_depth: 3,
            root_breadth: 11,
            nested_breadth: 6,
        }
    }
}

/// Stands in for comments left out of a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoreMarker {
    /// `None` when the omitted comments are top-level ones.
    pub parent_cid: Option<Cid>,
    /// Number of comments omitted, nested replies included.
    pub remaining_count: usize,
    /// The last sibling shown before the cut. `None` when the whole set of
    /// children was omitted.
    pub continuation_key: Option<Cid>,
}

/// The shape of a trimmed page: which comments survive and where the "load
/// more" markers go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Skeleton {
    Node { cid: Cid, children: Vec<Skeleton> },
    More(MoreMarker),
}

pub fn trim_tree(
    tree: Vec<CommentNode>,
    limits: &TrimLimits,
    continue_after: Option<&str>,
) -> Vec<Skeleton> {
    let mut trimmer = Trimmer {
        limits,
        continue_after,
    };
    trimmer.trim_level(tree, 0, None)
}

struct Trimmer<'a> {
    limits: &'a TrimLimits,
    /// Consumed by the first sibling list that contains it.
    continue_after: Option<&'a str>,
}

impl Trimmer<'_> {
    fn trim_level(
        &mut self,
        mut siblings: Vec<CommentNode>,
        depth: usize,
        parent: Option<&Cid>,
    ) -> Vec<Skeleton> {
        if depth >= self.limits.max_depth {
            let omitted = dismantle(siblings);
            if omitted == 0 {
                return vec![];
            }
            return vec![Skeleton::More(MoreMarker {
                parent_cid: parent.cloned(),
                remaining_count: omitted,
                continuation_key: None,
            })];
        }

        let mut last_shown: Option<Cid> = None;
        if let Some(after) = self.continue_after {
            if let Some(pos) = siblings.iter().position(|n| n.cid == after) {
                dismantle(siblings.drain(..=pos));
                last_shown = Some(after.to_string());
                self.continue_after = None;
            }
        }

        let breadth = if depth == 0 {
            self.limits.root_breadth
        } else {
            self.limits.nested_breadth
        };

        let mut siblings = siblings.into_iter();
        let mut result = Vec::with_capacity(breadth.min(siblings.len()) + 1);

        for node in siblings.by_ref().take(breadth) {
            let children = self.trim_level(node.children, depth + 1, Some(&node.cid));
            last_shown = Some(node.cid.clone());
            result.push(Skeleton::Node {
                cid: node.cid,
                children,
            });
        }

        let omitted = dismantle(siblings);
        if omitted > 0 {
            result.push(Skeleton::More(MoreMarker {
                parent_cid: parent.cloned(),
                remaining_count: omitted,
                continuation_key: last_shown,
            }));
        }

        result
    }
}

/// Surviving comment ids in depth-first order.
pub fn collect_cids(entries: &[Skeleton]) -> Vec<Cid> {
    let mut result = Vec::new();
    collect_into(entries, &mut result);
    result
}

fn collect_into(entries: &[Skeleton], result: &mut Vec<Cid>) {
    for entry in entries {
        if let Skeleton::Node { cid, children } = entry {
            result.push(cid.clone());
            collect_into(children, result);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::comment::{CommentEdge, tree::build_tree};

    fn chain(len: usize) -> Vec<CommentNode> {
        let edges: Vec<CommentEdge> = (0..len)
            .map(|i| {
                let parent = (i > 0).then(|| format!("c{}", i - 1));
                CommentEdge::new(format!("c{i}"), parent.as_deref())
            })
            .collect();
        build_tree(&edges)
    }

    fn flat_roots(n: usize) -> Vec<CommentNode> {
        let edges: Vec<CommentEdge> = (0..n)
            .map(|i| CommentEdge::new(format!("r{i}"), None))
            .collect();
        build_tree(&edges)
    }

    fn markers(entries: &[Skeleton]) -> Vec<&MoreMarker> {
        let mut result = vec![];
        for entry in entries {
            match entry {
                Skeleton::More(m) => result.push(m),
                Skeleton::Node { children, .. } => result.extend(markers(children)),
            }
        }
        result
    }

    fn max_real_depth(entries: &[Skeleton]) -> usize {
        entries
            .iter()
            .map(|e| match e {
                Skeleton::Node { children, .. } => 1 + max_real_depth(children),
                Skeleton::More(_) => 0,
            })
            .max()
            .unwrap_or(0)
    }

    fn max_real_breadth(entries: &[Skeleton], depth: usize, out: &mut Vec<(usize, usize)>) {
        let real = entries
            .iter()
            .filter(|e| matches!(e, Skeleton::Node { .. }))
            .count();
        out.push((depth, real));
        for entry in entries {
            if let Skeleton::Node { children, .. } = entry {
                max_real_breadth(children, depth + 1, out);
            }
        }
    }

    /// A deterministic bushy tree: node i has parent (i - 1) / fanout.
    fn bushy(n: usize, fanout: usize) -> Vec<CommentNode> {
        let edges: Vec<CommentEdge> = (0..n)
            .map(|i| {
                let parent = (i >= fanout).then(|| format!("n{}", i / fanout - 1));
                CommentEdge::new(format!("n{i}"), parent.as_deref())
            })
            .collect();
        build_tree(&edges)
    }

    #[test]
    fn test_depth_trim_on_chain() {
        let trimmed = trim_tree(chain(5), &TrimLimits::default(), None);

        assert_eq!(max_real_depth(&trimmed), 3);
        let more = markers(&trimmed);
        assert_eq!(more.len(), 1);
        assert_eq!(more[0].remaining_count, 2);
        assert_eq!(more[0].parent_cid.as_deref(), Some("c2"));
        assert_eq!(more[0].continuation_key, None);
    }

    #[test]
    fn test_empty_subtrees_vanish_at_depth_limit() {
        let trimmed = trim_tree(chain(3), &TrimLimits::default(), None);
        assert_eq!(max_real_depth(&trimmed), 3);
        assert!(markers(&trimmed).is_empty());
    }

    #[test]
    fn test_root_breadth_limit() {
        let trimmed = trim_tree(flat_roots(15), &TrimLimits::default(), None);

        assert_eq!(trimmed.len(), 12);
        assert_eq!(
            trimmed[11],
            Skeleton::More(MoreMarker {
                parent_cid: None,
                remaining_count: 4,
                continuation_key: Some("r10".into()),
            })
        );
    }

    #[test]
    fn test_nested_breadth_limit() {
        let mut edges = vec![CommentEdge::new("root", None)];
        for i in 0..9 {
            edges.push(CommentEdge::new(format!("k{i}"), Some("root")));
        }
        edges.push(CommentEdge::new("grandchild", Some("k8")));

        let trimmed = trim_tree(build_tree(&edges), &TrimLimits::default(), None);

        let Skeleton::Node { children, .. } = &trimmed[0] else {
            panic!("expected a comment at the top");
        };
        assert_eq!(children.len(), 7);
        assert_eq!(
            children[6],
            Skeleton::More(MoreMarker {
                parent_cid: Some("root".into()),
                // k6, k7, k8 and k8's reply
                remaining_count: 4,
                continuation_key: Some("k5".into()),
            })
        );
    }

    #[test]
    fn test_trim_bounds_and_conservation() {
        for (n, fanout) in [(10, 2), (100, 3), (500, 7), (1000, 12)] {
            let tree = bushy(n, fanout);
            let limits = TrimLimits::default();
            let trimmed = trim_tree(tree, &limits, None);

            assert!(max_real_depth(&trimmed) <= limits.max_depth);

            let mut breadths = vec![];
            max_real_breadth(&trimmed, 0, &mut breadths);
            for (depth, real) in breadths {
                let cap = if depth == 0 {
                    limits.root_breadth
                } else {
                    limits.nested_breadth
                };
                assert!(real <= cap, "level {depth} has {real} comments");
            }

            let shown = collect_cids(&trimmed).len();
            let omitted: usize = markers(&trimmed).iter().map(|m| m.remaining_count).sum();
            assert_eq!(shown + omitted, n, "n={n} fanout={fanout}");
        }
    }

    #[test]
    fn test_continue_after_at_root() {
        let trimmed = trim_tree(flat_roots(30), &TrimLimits::default(), Some("r10"));

        let shown = collect_cids(&trimmed);
        assert_eq!(shown.first().map(String::as_str), Some("r11"));
        assert_eq!(shown.len(), 11);
        assert_eq!(
            markers(&trimmed)[0],
            &MoreMarker {
                parent_cid: None,
                remaining_count: 8,
                continuation_key: Some("r21".into()),
            }
        );
    }

    #[test]
    fn test_continue_after_inside_selected_subtree() {
        let mut edges = vec![CommentEdge::new("p", None)];
        for i in 0..10 {
            edges.push(CommentEdge::new(format!("k{i}"), Some("p")));
        }
        let subtree = crate::comment::tree::select_subtree(build_tree(&edges), "p", false);

        let trimmed = trim_tree(subtree, &TrimLimits::default(), Some("k5"));

        assert_eq!(
            collect_cids(&trimmed),
            vec!["p", "k6", "k7", "k8", "k9"]
        );
        assert!(markers(&trimmed).is_empty());
    }

    #[test]
    fn test_very_deep_chain_is_built_and_trimmed() {
        let depth = 200_000;
        let tree = chain(depth);
        assert_eq!(tree[0].size(), depth);

        let trimmed = trim_tree(tree, &TrimLimits::default(), None);
        assert_eq!(max_real_depth(&trimmed), 3);
        assert_eq!(markers(&trimmed)[0].remaining_count, depth - 3);

        let subtree = crate::comment::tree::select_subtree(chain(depth), "c100000", true);
        let trimmed = trim_tree(subtree, &TrimLimits::default(), None);
        assert_eq!(collect_cids(&trimmed), vec!["c99999", "c100000", "c100001"]);
        assert_eq!(markers(&trimmed)[0].remaining_count, depth - 100_002);
    }

    #[test]
    fn test_continue_after_unknown_cid_changes_nothing() {
        let plain = trim_tree(flat_roots(5), &TrimLimits::default(), None);
        let continued = trim_tree(flat_roots(5), &TrimLimits::default(), Some("gone"));
        assert_eq!(plain, continued);
    }
}
