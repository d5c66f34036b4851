//! Property tests for comment attachment and tree assembly.

use commentary::{Comment, CommentId, CommentTree, MemoryStore, Post, PostId, Storage};
use proptest::prelude::*;
use std::collections::HashSet;

/// Where a generated comment hangs.
#[derive(Clone, Debug)]
enum Parent {
    TopLevel,
    /// Index into previously created comments (taken modulo their count).
    Existing(usize),
    Missing,
}

fn parent_strategy() -> impl Strategy<Value = Parent> {
    prop_oneof![
        3 => Just(Parent::TopLevel),
        6 => any::<usize>().prop_map(Parent::Existing),
        1 => Just(Parent::Missing),
    ]
}

fn flatten(comments: &[Comment], out: &mut Vec<CommentId>) {
    for comment in comments {
        out.push(comment.id.clone());
        flatten(&comment.children, out);
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn attachment_invariants_hold(parents in prop::collection::vec(parent_strategy(), 1..40)) {
        let rt = runtime();
        rt.block_on(async {
            let store = MemoryStore::default();
            let post = store.create_post("A", "B", true).await.unwrap();

            let mut created: Vec<Comment> = Vec::new();
            // Comments reachable from the post's top-level sequence
            let mut visible: HashSet<CommentId> = HashSet::new();

            for (i, parent) in parents.iter().enumerate() {
                let parent_id = match parent {
                    Parent::TopLevel => None,
                    Parent::Existing(_) if created.is_empty() => None,
                    Parent::Existing(n) => Some(created[n % created.len()].id.clone()),
                    Parent::Missing => Some(CommentId::from(format!("missing-{}", i))),
                };

                let comment = store
                    .create_comment(&post.id, parent_id.as_ref(), &format!("c{}", i))
                    .await
                    .unwrap();

                let is_visible = match &parent_id {
                    None => true,
                    Some(p) => visible.contains(p),
                };
                if is_visible {
                    visible.insert(comment.id.clone());
                }
                created.push(comment);
            }

            let fetched: Post = store.get_post(&post.id).await.unwrap();
            let mut in_tree = Vec::new();
            flatten(&fetched.comments, &mut in_tree);

            // Every visible comment exactly once, nothing else
            let unique: HashSet<_> = in_tree.iter().cloned().collect();
            prop_assert_eq!(unique.len(), in_tree.len());
            prop_assert_eq!(unique, visible);

            for comment in &created {
                // Always retrievable by id
                let own = store.get_comment(&comment.id).await.unwrap();
                prop_assert_eq!(&own.id, &comment.id);

                match &comment.parent_id {
                    None => {
                        let count = fetched.comments.iter().filter(|c| c.id == comment.id).count();
                        prop_assert_eq!(count, 1);
                    }
                    Some(p) if created.iter().any(|c| &c.id == p) => {
                        let parent = store.get_comment(p).await.unwrap();
                        let count = parent.children.iter().filter(|c| c.id == comment.id).count();
                        prop_assert_eq!(count, 1);
                    }
                    Some(_) => {
                        prop_assert!(!in_tree.contains(&comment.id));
                    }
                }
            }
            Ok(())
        })?;
    }

    #[test]
    fn tree_children_keep_creation_order(parents in prop::collection::vec(0usize..8, 1..30)) {
        let post_id = PostId::from("p");
        let mut flat = vec![Comment::new(post_id.clone(), None, "root")];
        for (i, parent) in parents.iter().enumerate() {
            let parent_id = flat[parent % flat.len()].id.clone();
            flat.push(Comment::new(post_id.clone(), Some(parent_id), format!("c{}", i)));
        }

        let tree = CommentTree::from_flat(flat.clone());
        for comment in &flat {
            let node = tree.subtree(&comment.id).unwrap();
            let expected: Vec<_> = flat
                .iter()
                .filter(|c| c.parent_id.as_ref() == Some(&comment.id))
                .map(|c| c.id.clone())
                .collect();
            let actual: Vec<_> = node.children.iter().map(|c| c.id.clone()).collect();
            prop_assert_eq!(actual, expected);
        }
    }
}
