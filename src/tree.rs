//! Comment tree assembly.
//!
//! Both backends keep comments as flat records and build the nested view at
//! read time. A comment whose parent is not part of the same post's records
//! is an orphan: it stays addressable by id but never appears in a tree.

use crate::types::{Comment, CommentId};
use std::collections::{HashMap, HashSet};

/// Flat comments of one post, indexed for tree reconstruction.
pub struct CommentTree {
    /// Comments by ID.
    by_id: HashMap<CommentId, Comment>,
    /// Child IDs per parent, in creation order.
    children: HashMap<CommentId, Vec<CommentId>>,
    /// Top-level IDs, in creation order.
    roots: Vec<CommentId>,
}

impl CommentTree {
    /// Index comments given in creation order.
    ///
    /// Incoming `children` fields are ignored; they are rebuilt from
    /// `parent_id` links.
    pub fn from_flat(comments: impl IntoIterator<Item = Comment>) -> Self {
        let mut by_id = HashMap::new();
        let mut children: HashMap<CommentId, Vec<CommentId>> = HashMap::new();
        let mut roots = Vec::new();

        for mut comment in comments {
            comment.children.clear();
            match &comment.parent_id {
                Some(parent) => children
                    .entry(parent.clone())
                    .or_default()
                    .push(comment.id.clone()),
                None => roots.push(comment.id.clone()),
            }
            by_id.insert(comment.id.clone(), comment);
        }

        Self {
            by_id,
            children,
            roots,
        }
    }

    /// Top-level comments with their replies attached.
    pub fn roots(&self) -> Vec<Comment> {
        let mut visiting = HashSet::new();
        self.roots
            .iter()
            .filter_map(|id| self.materialize(id, &mut visiting))
            .collect()
    }

    /// A single comment with its replies attached, orphans included.
    pub fn subtree(&self, id: &CommentId) -> Option<Comment> {
        let mut visiting = HashSet::new();
        self.materialize(id, &mut visiting)
    }

    /// Comments whose parent is not in this tree.
    pub fn orphans(&self) -> Vec<&Comment> {
        self.by_id
            .values()
            .filter(|c| match &c.parent_id {
                Some(parent) => !self.by_id.contains_key(parent),
                None => false,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    fn materialize(&self, id: &CommentId, visiting: &mut HashSet<CommentId>) -> Option<Comment> {
        // Ids are store-generated, so a cycle means corrupted rows.
        if !visiting.insert(id.clone()) {
            return None;
        }

        let mut comment = self.by_id.get(id)?.clone();
        if let Some(child_ids) = self.children.get(id) {
            comment.children = child_ids
                .iter()
                .filter_map(|child| self.materialize(child, visiting))
                .collect();
        }

        visiting.remove(id);
        Some(comment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PostId;

    fn comment(id: &str, parent: Option<&str>) -> Comment {
        Comment {
            id: CommentId::from(id),
            post_id: PostId::from("p"),
            parent_id: parent.map(CommentId::from),
            content: format!("content of {}", id),
            children: vec![],
        }
    }

    #[test]
    fn test_nested_assembly() {
        let tree = CommentTree::from_flat(vec![
            comment("a", None),
            comment("b", Some("a")),
            comment("c", Some("b")),
            comment("d", None),
            comment("e", Some("a")),
        ]);

        let roots = tree.roots();
        assert_eq!(roots.len(), 2);
        assert_eq!(roots[0].id.as_str(), "a");
        assert_eq!(roots[1].id.as_str(), "d");

        let a = &roots[0];
        assert_eq!(a.children.len(), 2);
        assert_eq!(a.children[0].id.as_str(), "b");
        assert_eq!(a.children[1].id.as_str(), "e");
        assert_eq!(a.children[0].children[0].id.as_str(), "c");
    }

    #[test]
    fn test_orphan_excluded_from_tree() {
        let tree = CommentTree::from_flat(vec![comment("a", None), comment("x", Some("missing"))]);

        let roots = tree.roots();
        assert_eq!(roots.len(), 1);
        assert!(roots[0].children.is_empty());

        // Still addressable on its own
        let orphan = tree.subtree(&CommentId::from("x")).unwrap();
        assert_eq!(orphan.parent_id, Some(CommentId::from("missing")));
        assert_eq!(tree.orphans().len(), 1);
    }

    #[test]
    fn test_replies_under_orphan_stay_hidden() {
        let tree = CommentTree::from_flat(vec![
            comment("x", Some("missing")),
            comment("y", Some("x")),
        ]);

        assert!(tree.roots().is_empty());
        let orphan = tree.subtree(&CommentId::from("x")).unwrap();
        assert_eq!(orphan.children.len(), 1);
    }

    #[test]
    fn test_cycle_does_not_recurse_forever() {
        let tree = CommentTree::from_flat(vec![comment("a", Some("b")), comment("b", Some("a"))]);

        assert!(tree.roots().is_empty());
        let a = tree.subtree(&CommentId::from("a")).unwrap();
        assert_eq!(a.children.len(), 1);
        assert!(a.children[0].children.is_empty());
    }

    #[test]
    fn test_empty() {
        let tree = CommentTree::from_flat(Vec::new());
        assert!(tree.is_empty());
        assert!(tree.roots().is_empty());
        assert!(tree.subtree(&CommentId::from("a")).is_none());
    }
}
