//! Core types for posts and comments.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a post.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(pub String);

impl PostId {
    /// Allocate a fresh, globally unique id.
    pub fn generate() -> Self {
        PostId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PostId({})", self.0)
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for PostId {
    fn from(id: String) -> Self {
        PostId(id)
    }
}

impl From<&str> for PostId {
    fn from(id: &str) -> Self {
        PostId(id.to_string())
    }
}

/// Unique identifier for a comment.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommentId(pub String);

impl CommentId {
    /// Allocate a fresh, globally unique id.
    pub fn generate() -> Self {
        CommentId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommentId({})", self.0)
    }
}

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for CommentId {
    fn from(id: String) -> Self {
        CommentId(id)
    }
}

impl From<&str> for CommentId {
    fn from(id: &str) -> Self {
        CommentId(id.to_string())
    }
}

/// A post and its comment tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: PostId,
    pub title: String,
    pub content: String,

    /// When false, no comment may be created under this post at any depth.
    pub comments_enabled: bool,

    /// Top-level comments in creation order.
    #[serde(default)]
    pub comments: Vec<Comment>,
}

/// A comment, optionally nested under another comment of the same post.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,

    #[serde(rename = "postId")]
    pub post_id: PostId,

    /// Absent for top-level comments.
    #[serde(rename = "parentID")]
    pub parent_id: Option<CommentId>,

    pub content: String,

    /// Replies in creation order.
    #[serde(default)]
    pub children: Vec<Comment>,
}

impl Comment {
    /// A freshly created comment with no replies yet.
    pub fn new(post_id: PostId, parent_id: Option<CommentId>, content: impl Into<String>) -> Self {
        Self {
            id: CommentId::generate(),
            post_id,
            parent_id,
            content: content.into(),
            children: Vec::new(),
        }
    }

    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }
}
