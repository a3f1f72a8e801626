//! crates/codoc_core/src/thread.rs
//!
//! Rebuilds reply trees from the flat comment feed.
//!
//! The store only keeps parent pointers. Readers call [`build_thread`] to get
//! nested nodes: a `parent -> children` index is built once, then the tree is
//! assembled without recursion so thread depth is unbounded.

use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::Comment;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadNode {
    pub comment: Comment,
    /// 0 for roots.
    pub depth: usize,
    /// The comment names a parent that is no longer in the feed, so it was
    /// promoted to a root.
    pub orphaned: bool,
    pub replies: Vec<ThreadNode>,
}

impl ThreadNode {
    /// Number of nodes in this subtree, including `self`.
    pub fn subtree_size(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.replies.iter());
        }
        count
    }
}

/// Depth-first, pre-order walk over a forest: each comment with its depth,
/// parents before their replies, siblings in feed order.
pub fn walk(forest: &[ThreadNode]) -> Vec<(usize, &Comment)> {
    let mut out = Vec::new();
    let mut stack: Vec<&ThreadNode> = forest.iter().rev().collect();
    while let Some(node) = stack.pop() {
        out.push((node.depth, &node.comment));
        stack.extend(node.replies.iter().rev());
    }
    out
}

/// Pre-order traversal state: which nodes were reached, at what depth, and
/// which children each node adopted.
struct Traversal {
    visited: Vec<bool>,
    depth: Vec<usize>,
    adopted: Vec<Vec<usize>>,
    order: Vec<usize>,
}

impl Traversal {
    fn visit_from(&mut self, start: usize, children: &[Vec<usize>]) {
        if self.visited[start] {
            return;
        }
        self.visited[start] = true;
        self.depth[start] = 0;
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            self.order.push(node);
            for &child in children[node].iter().rev() {
                if !self.visited[child] {
                    self.visited[child] = true;
                    self.depth[child] = self.depth[node] + 1;
                    self.adopted[node].push(child);
                    stack.push(child);
                }
            }
            self.adopted[node].reverse();
        }
    }
}

/// Turns the flat feed into a forest.
///
/// Roots are comments without a parent and comments whose parent is missing
/// from `comments` (for example because it was deleted). Siblings keep the
/// order they had in `comments`. Every input comment appears exactly once in
/// the output, even if the parent links contain a cycle.
pub fn build_thread(comments: Vec<Comment>) -> Vec<ThreadNode> {
    let n = comments.len();
    let position: HashMap<Uuid, usize> = comments
        .iter()
        .enumerate()
        .map(|(i, c)| (c.id, i))
        .collect();

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut roots: Vec<(usize, bool)> = Vec::new();
    for (i, comment) in comments.iter().enumerate() {
        match comment.parent_comment_id {
            None => roots.push((i, false)),
            Some(parent) => match position.get(&parent) {
                Some(&p) if p != i => children[p].push(i),
                _ => roots.push((i, true)),
            },
        }
    }

    let mut walk_state = Traversal {
        visited: vec![false; n],
        depth: vec![0; n],
        adopted: vec![Vec::new(); n],
        order: Vec::with_capacity(n),
    };
    let mut root_flags: Vec<(usize, bool)> = Vec::with_capacity(roots.len());
    for &(root, orphaned) in &roots {
        walk_state.visit_from(root, &children);
        root_flags.push((root, orphaned));
    }
    // Anything still unvisited sits on a parent cycle. Promote the earliest
    // such comment in feed order and take its subtree from there.
    for i in 0..n {
        if !walk_state.visited[i] {
            walk_state.visit_from(i, &children);
            root_flags.push((i, true));
        }
    }
    let Traversal {
        depth,
        mut adopted,
        order,
        ..
    } = walk_state;

    // Assemble bottom-up: in reverse pre-order every child is finished before
    // its parent needs it.
    let mut slots: Vec<Option<Comment>> = comments.into_iter().map(Some).collect();
    let mut built: Vec<Option<ThreadNode>> = vec![None; n];
    let orphan_flag: HashMap<usize, bool> = root_flags.iter().copied().collect();
    for &node in order.iter().rev() {
        let replies = std::mem::take(&mut adopted[node])
            .into_iter()
            .filter_map(|child| built[child].take())
            .collect();
        if let Some(comment) = slots[node].take() {
            built[node] = Some(ThreadNode {
                comment,
                depth: depth[node],
                orphaned: orphan_flag.get(&node).copied().unwrap_or(false),
                replies,
            });
        }
    }

    root_flags
        .into_iter()
        .filter_map(|(root, _)| built[root].take())
        .collect()
}
