//! In-memory data access layer that records every batch it is asked for.

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;

use super::models::{Comment, Post, User};

/// Users above this id do not exist.
pub const USER_MAX: i32 = 100;

/// Every batch a DAO method received, in call order.
#[derive(Debug)]
pub struct CallLog<K> {
    calls: Mutex<Vec<Vec<K>>>,
}

impl<K> Default for CallLog<K> {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl<K: Clone + Eq + Hash + Debug> CallLog<K> {
    pub fn record(&self, ids: &[K]) {
        self.calls.lock().push(ids.to_vec());
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.lock().is_empty()
    }

    /// Union of every requested id.
    pub fn ids(&self) -> HashSet<K> {
        self.calls.lock().iter().flatten().cloned().collect()
    }

    /// Ids requested more than once across all calls.
    pub fn repeated(&self) -> Vec<K> {
        let mut seen = HashSet::new();
        let mut repeated = Vec::new();
        for id in self.calls.lock().iter().flatten() {
            if !seen.insert(id.clone()) {
                repeated.push(id.clone());
            }
        }
        repeated
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

/// Fixed posts, comments, follow and fan relations.
#[derive(Debug)]
pub struct TestDao {
    posts: HashMap<i64, Post>,
    comments: HashMap<i64, Comment>,
    following: HashMap<i32, HashSet<i32>>,
    fans: HashMap<i32, HashSet<i32>>,
    pub user_calls: CallLog<i32>,
    pub post_calls: CallLog<i64>,
    pub comment_calls: CallLog<i64>,
    pub following_calls: CallLog<i32>,
    pub fans_calls: CallLog<i32>,
}

impl TestDao {
    pub fn new() -> Arc<Self> {
        let posts = [
            Post::new(1, 1, None),
            Post::new(2, 1, Some(vec![1, 2, 3])),
            Post::new(3, 2, Some(vec![4, 5])),
        ];
        let comments = [
            Comment::new(1, 1, None),
            Comment::new(2, 2, None),
            Comment::new(3, 1, None),
            Comment::new(4, 2, Some(vec![2, 3])),
            Comment::new(5, 11, Some(vec![2, 99])),
        ];
        Arc::new(Self {
            posts: posts.into_iter().map(|p| (p.id, p)).collect(),
            comments: comments.into_iter().map(|c| (c.id, c)).collect(),
            following: HashMap::from([(1, HashSet::from([5, 2]))]),
            fans: HashMap::from([(1, HashSet::from([5, 99]))]),
            user_calls: CallLog::default(),
            post_calls: CallLog::default(),
            comment_calls: CallLog::default(),
            following_calls: CallLog::default(),
            fans_calls: CallLog::default(),
        })
    }

    pub fn get_users(&self, ids: &[i32]) -> HashMap<i32, User> {
        self.user_calls.record(ids);
        ids.iter()
            .filter(|id| **id <= USER_MAX)
            .map(|id| (*id, User { id: *id }))
            .collect()
    }

    pub fn get_posts(&self, ids: &[i64]) -> HashMap<i64, Post> {
        self.post_calls.record(ids);
        ids.iter()
            .filter_map(|id| self.posts.get(id).map(|p| (*id, p.clone())))
            .collect()
    }

    pub fn get_comments(&self, ids: &[i64]) -> HashMap<i64, Comment> {
        self.comment_calls.record(ids);
        ids.iter()
            .filter_map(|id| self.comments.get(id).map(|c| (*id, c.clone())))
            .collect()
    }

    pub fn is_following(&self, from: i32, ids: &[i32]) -> HashMap<i32, bool> {
        self.following_calls.record(ids);
        let following = self.following.get(&from);
        ids.iter()
            .map(|id| (*id, following.is_some_and(|f| f.contains(id))))
            .collect()
    }

    pub fn is_fans(&self, from: i32, ids: &[i32]) -> HashMap<i32, bool> {
        self.fans_calls.record(ids);
        ids.iter().map(|id| (*id, self.is_fan(from, *id))).collect()
    }

    pub fn is_fan(&self, from: i32, id: i32) -> bool {
        self.fans.get(&from).is_some_and(|f| f.contains(&id))
    }

    /// Posts as loaded by a page: with their comments attached.
    pub fn posts_with_comments(&self, ids: &[i64]) -> Vec<Post> {
        let mut posts: Vec<Post> = ids.iter().filter_map(|id| self.posts.get(id).cloned()).collect();
        for post in &mut posts {
            let comment_ids = post.comment_ids.clone().unwrap_or_default();
            post.comments = comment_ids
                .iter()
                .filter_map(|id| self.comments.get(id).cloned())
                .collect();
        }
        posts
    }

    pub fn comment(&self, id: i64) -> Option<Comment> {
        self.comments.get(&id).cloned()
    }

    /// Forget every recorded call.
    pub fn reset_calls(&self) {
        self.user_calls.clear();
        self.post_calls.clear();
        self.comment_calls.clear();
        self.following_calls.clear();
        self.fans_calls.clear();
    }
}
