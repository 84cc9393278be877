use std::time::Duration;

use async_trait::async_trait;

use crate::comment::{CommentEdge, CommentSort, Pid};

/// Short-lived cache of a post's comment edges, keyed by post and sort.
#[async_trait]
pub trait CommentCache: Send + Sync {
    async fn get_edges(&self, pid: Pid, sort: CommentSort) -> Option<Vec<CommentEdge>>;

    async fn put_edges(&self, pid: Pid, sort: CommentSort, edges: Vec<CommentEdge>, ttl: Duration);

    /// Drops every cached ordering of the post.
    async fn invalidate_post(&self, pid: Pid);
}

pub struct RetainerCache {
    edges: retainer::Cache<(Pid, CommentSort), Vec<CommentEdge>>,
}

impl RetainerCache {
    pub fn new() -> Self {
        Self {
            edges: retainer::Cache::new(),
        }
    }
}

impl Default for RetainerCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommentCache for RetainerCache {
    async fn get_edges(&self, pid: Pid, sort: CommentSort) -> Option<Vec<CommentEdge>> {
        let entry = self.edges.get(&(pid, sort)).await?;
        Some((*entry).clone())
    }

    async fn put_edges(&self, pid: Pid, sort: CommentSort, edges: Vec<CommentEdge>, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        self.edges.insert((pid, sort), edges, ttl).await;
    }

    async fn invalidate_post(&self, pid: Pid) {
        for sort in [CommentSort::Best, CommentSort::New] {
            self.edges.remove(&(pid, sort)).await;
        }
    }
}

/// Always misses.
pub struct NoCache;

#[async_trait]
impl CommentCache for NoCache {
    async fn get_edges(&self, _pid: Pid, _sort: CommentSort) -> Option<Vec<CommentEdge>> {
        None
    }

    async fn put_edges(&self, _: Pid, _: CommentSort, _: Vec<CommentEdge>, _: Duration) {}

    async fn invalidate_post(&self, _pid: Pid) {}
}
