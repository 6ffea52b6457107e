//! Domain objects and the application build context used by the tests.

use std::any::Any;

use model_builder::{BuildContext, ContextStore};

/// Something that refers to an author.
pub trait HasUser: Send + Sync {
    fn user_id(&self) -> i32;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i32,
}

/// A `User` with extra state, declared to extend `User`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubUser {
    pub base: User,
}

impl SubUser {
    pub fn new(id: i32) -> Self {
        Self { base: User { id } }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub id: i64,
    pub user_id: i32,
    pub at_user_ids: Option<Vec<i32>>,
}

impl Comment {
    pub fn new(id: i64, user_id: i32, at_user_ids: Option<Vec<i32>>) -> Self {
        Self {
            id,
            user_id,
            at_user_ids,
        }
    }
}

impl HasUser for Comment {
    fn user_id(&self) -> i32 {
        self.user_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: i64,
    pub user_id: i32,
    pub comment_ids: Option<Vec<i64>>,
    /// Comments already loaded with the post.
    pub comments: Vec<Comment>,
}

impl Post {
    pub fn new(id: i64, user_id: i32, comment_ids: Option<Vec<i64>>) -> Self {
        Self {
            id,
            user_id,
            comment_ids,
            comments: Vec::new(),
        }
    }
}

impl HasUser for Post {
    fn user_id(&self) -> i32 {
        self.user_id
    }
}

/// Marker type nothing ever resolves.
pub struct Fake;

/// Application context carrying the current visitor.
#[derive(Debug)]
pub struct TestBuildContext {
    visitor_id: i32,
    store: ContextStore,
}

impl TestBuildContext {
    pub fn new(visitor_id: i32) -> Self {
        Self {
            visitor_id,
            store: ContextStore::new(),
        }
    }

    pub fn visitor_id(&self) -> i32 {
        self.visitor_id
    }
}

impl BuildContext for TestBuildContext {
    fn store(&self) -> &ContextStore {
        &self.store
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
