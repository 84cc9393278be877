//! Persistence port for the discussion engine.
//!
//! The engine never talks to a database directly. It reads comment edges and
//! records and commits votes through [`Store`], so the same logic runs
//! against Postgres in production and against [`memory::MemoryStore`] in
//! tests and benchmarks.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::{
    comment::{
        AccountStatus, Cid, CommentEdge, CommentRecord, CommentSort, CommentStatus, Distinguish,
        ModeratorTier, Pid, Sid, Uid,
    },
    error::Result,
    ranking::vote::{VoteDirection, VoteTarget},
};

pub mod memory;
pub mod postgres;

/// Post metadata key holding the pinned comment's cid.
pub const STICKY_COMMENT_KEY: &str = "sticky_cid";
/// Post metadata key that, when set to "1", stops new comments.
pub const LOCK_COMMENTS_KEY: &str = "lock_comments";

#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub pid: Pid,
    pub sid: Sid,
    pub author_id: Uid,
    pub title: String,
    pub score: i32,
    pub upvotes: i32,
    pub downvotes: i32,
    pub deleted: bool,
    pub posted_at: NaiveDateTime,
    /// Cached count of comments, bumped on every submission.
    pub comments_count: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub uid: Uid,
    pub name: String,
    pub status: AccountStatus,
    /// Lifetime score received on the user's own content.
    pub score: i32,
    /// Lifetime balance of votes the user handed out.
    pub given: i32,
    pub is_admin: bool,
}

/// A comment row as persisted, independent of any viewer.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredComment {
    pub cid: Cid,
    pub pid: Pid,
    pub parent_cid: Option<Cid>,
    pub author_id: Uid,
    pub content: String,
    pub score: i32,
    pub upvotes: i32,
    pub downvotes: i32,
    pub status: CommentStatus,
    pub distinguish: Distinguish,
    pub deleted_by: Option<ModeratorTier>,
    pub delete_reason: Option<String>,
    pub created_at: NaiveDateTime,
    pub last_edited_at: Option<NaiveDateTime>,
}

impl StoredComment {
    pub fn new(
        cid: impl Into<Cid>,
        pid: Pid,
        parent_cid: Option<&str>,
        author_id: impl Into<Uid>,
        content: impl Into<String>,
        created_at: NaiveDateTime,
    ) -> Self {
        StoredComment {
            cid: cid.into(),
            pid,
            parent_cid: parent_cid.map(Into::into),
            author_id: author_id.into(),
            content: content.into(),
            score: 0,
            upvotes: 0,
            downvotes: 0,
            status: CommentStatus::Visible,
            distinguish: Distinguish::None,
            deleted_by: None,
            delete_reason: None,
            created_at,
            last_edited_at: None,
        }
    }
}

/// A previous version of a comment's content.
#[derive(Debug, Clone, PartialEq)]
pub struct HistorySnapshot {
    pub content: String,
    pub edited_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VoteTargetInfo {
    pub target: VoteTarget,
    pub sid: Sid,
    pub author_id: Uid,
    pub deleted: bool,
    /// When the post (or the comment's post) was submitted.
    pub posted_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct VoteOutcome {
    pub target: VoteTarget,
    pub previous: Option<VoteDirection>,
    pub current: Option<VoteDirection>,
    pub score: i32,
    pub upvotes: i32,
    pub downvotes: i32,
    pub author_score: i32,
}

/// Denormalized counters next to what the vote table says they should be.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreTally {
    pub target: VoteTarget,
    pub score: i32,
    pub upvotes: i32,
    pub downvotes: i32,
    pub counted_up: i32,
    pub counted_down: i32,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// All `(cid, parent_cid)` pairs of a post, deleted comments included,
    /// siblings ordered by `sort`.
    async fn fetch_comment_edges(&self, pid: Pid, sort: CommentSort) -> Result<Vec<CommentEdge>>;

    /// Full records for exactly `ids`, with the per-author and per-viewer
    /// flags resolved against `sid` and `viewer`.
    async fn fetch_comment_records(
        &self,
        sid: &str,
        ids: &HashSet<Cid>,
        viewer: Option<&str>,
    ) -> Result<Vec<CommentRecord>>;

    /// Previous versions of `ids`, newest first.
    async fn fetch_comment_history(
        &self,
        ids: &HashSet<Cid>,
    ) -> Result<HashMap<Cid, Vec<HistorySnapshot>>>;

    async fn fetch_comment(&self, cid: &str) -> Result<Option<StoredComment>>;

    /// Inserts the comment and bumps its post's `comments_count`.
    async fn insert_comment(&self, comment: &StoredComment) -> Result<()>;

    /// Replaces the content, keeping the old one as a history snapshot.
    async fn update_comment_content(
        &self,
        cid: &str,
        content: &str,
        edited_at: NaiveDateTime,
    ) -> Result<()>;

    async fn set_comment_status(
        &self,
        cid: &str,
        status: CommentStatus,
        deleted_by: Option<ModeratorTier>,
        reason: Option<&str>,
    ) -> Result<()>;

    async fn fetch_post(&self, pid: Pid) -> Result<Option<Post>>;

    /// Non-deleted posts of a sub, in no particular order.
    async fn fetch_sub_posts(&self, sid: &str) -> Result<Vec<Post>>;

    async fn fetch_post_metadata(&self, pid: Pid, key: &str) -> Result<Option<String>>;

    async fn fetch_user(&self, uid: &str) -> Result<Option<UserRecord>>;

    async fn is_banned(&self, uid: &str, sid: &str) -> Result<bool>;

    /// Moderation level of `uid` in `sid`, if they moderate it.
    async fn mod_power(&self, uid: &str, sid: &str) -> Result<Option<u8>>;

    async fn load_vote_target(&self, target: &VoteTarget) -> Result<Option<VoteTargetInfo>>;

    async fn get_vote(&self, voter: &str, target: &VoteTarget) -> Result<Option<VoteDirection>>;

    /// Resolves the vote transition against the current vote and applies the
    /// vote row change, the target's counters, the voter's given tally and
    /// the author's score as one atomic unit.
    async fn commit_vote(
        &self,
        voter: &str,
        target: &VoteTarget,
        author_id: &str,
        requested: VoteDirection,
    ) -> Result<VoteOutcome>;

    async fn vote_tallies(&self) -> Result<Vec<ScoreTally>>;

    /// Recounts the target's votes and overwrites its counters with the
    /// result, atomically with respect to `commit_vote`. Returns the new
    /// `(score, upvotes, downvotes)`.
    async fn apply_score_repair(&self, target: &VoteTarget) -> Result<(i32, i32, i32)>;
}
