use std::{
    collections::{HashMap, HashSet},
    time::Duration,
};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use tokio::sync::{Mutex, MutexGuard};

use crate::{
    comment::{
        BlockMethod, Cid, CommentEdge, CommentRecord, CommentSort, CommentStatus, ModeratorTier,
        Pid, Sid, Uid,
    },
    error::{Error, Result},
    ranking::vote::{VoteDirection, VoteTarget, VoteTransition},
};

use super::{
    HistorySnapshot, Post, ScoreTally, Store, StoredComment, UserRecord, VoteOutcome,
    VoteTargetInfo,
};

#[derive(Default)]
struct State {
    posts: HashMap<Pid, Post>,
    post_metadata: HashMap<(Pid, String), String>,
    /// Insertion order doubles as creation order for equal timestamps.
    comments: Vec<StoredComment>,
    comment_index: HashMap<Cid, usize>,
    history: HashMap<Cid, Vec<HistorySnapshot>>,
    users: HashMap<Uid, UserRecord>,
    mods: HashMap<(Uid, Sid), u8>,
    bans: HashSet<(Uid, Sid)>,
    /// (viewer, author) -> method
    blocks: HashMap<(Uid, Uid), BlockMethod>,
    comment_votes: HashMap<(Uid, Cid), VoteDirection>,
    post_votes: HashMap<(Uid, Pid), VoteDirection>,
}

impl State {
    fn comment(&self, cid: &str) -> Option<&StoredComment> {
        self.comment_index.get(cid).map(|&i| &self.comments[i])
    }

    fn comment_mut(&mut self, cid: &str) -> Option<&mut StoredComment> {
        match self.comment_index.get(cid) {
            Some(&i) => Some(&mut self.comments[i]),
            None => None,
        }
    }

    fn push_comment(&mut self, comment: StoredComment) {
        self.comment_index
            .insert(comment.cid.clone(), self.comments.len());
        self.comments.push(comment);
    }

    fn bump_user(&mut self, uid: &str, given: i32, score: i32) -> i32 {
        match self.users.get_mut(uid) {
            Some(user) => {
                user.given += given;
                user.score += score;
                user.score
            }
            None => 0,
        }
    }
}

/// Keeps everything in process memory behind one lock. Every operation holds
/// the lock for its whole read-modify-write, which makes each of them
/// atomic with respect to the others.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    latency: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every call, to exercise storage timeouts.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    async fn lock(&self) -> MutexGuard<'_, State> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.state.lock().await
    }

    pub async fn insert_post(&self, post: Post) {
        self.state.lock().await.posts.insert(post.pid, post);
    }

    pub async fn insert_user(&self, user: UserRecord) {
        let mut state = self.state.lock().await;
        state.users.insert(user.uid.clone(), user);
    }

    /// Seeds a comment as-is, without touching the post's comment count.
    pub async fn seed_comment(&self, comment: StoredComment) {
        self.state.lock().await.push_comment(comment);
    }

    pub async fn set_post_metadata(&self, pid: Pid, key: &str, value: &str) {
        self.state
            .lock()
            .await
            .post_metadata
            .insert((pid, key.to_string()), value.to_string());
    }

    pub async fn set_moderator(&self, uid: &str, sid: &str, level: u8) {
        self.state
            .lock()
            .await
            .mods
            .insert((uid.to_string(), sid.to_string()), level);
    }

    pub async fn ban(&self, uid: &str, sid: &str) {
        self.state
            .lock()
            .await
            .bans
            .insert((uid.to_string(), sid.to_string()));
    }

    pub async fn block(&self, viewer: &str, author: &str, method: BlockMethod) {
        self.state
            .lock()
            .await
            .blocks
            .insert((viewer.to_string(), author.to_string()), method);
    }

    pub async fn vote_count(&self, target: &VoteTarget) -> usize {
        let state = self.state.lock().await;
        match target {
            VoteTarget::Post(pid) => state.post_votes.keys().filter(|(_, p)| p == pid).count(),
            VoteTarget::Comment(cid) => {
                state.comment_votes.keys().filter(|(_, c)| c == cid).count()
            }
        }
    }

    pub async fn post(&self, pid: Pid) -> Option<Post> {
        self.state.lock().await.posts.get(&pid).cloned()
    }

    pub async fn user(&self, uid: &str) -> Option<UserRecord> {
        self.state.lock().await.users.get(uid).cloned()
    }

    pub async fn comment(&self, cid: &str) -> Option<StoredComment> {
        self.state.lock().await.comment(cid).cloned()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn fetch_comment_edges(&self, pid: Pid, sort: CommentSort) -> Result<Vec<CommentEdge>> {
        let state = self.lock().await;
        let mut comments: Vec<&StoredComment> =
            state.comments.iter().filter(|c| c.pid == pid).collect();

        match sort {
            CommentSort::Best => comments.sort_by(|a, b| {
                b.score
                    .cmp(&a.score)
                    .then_with(|| a.created_at.cmp(&b.created_at))
            }),
            CommentSort::New => comments.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        }

        Ok(comments
            .into_iter()
            .map(|c| CommentEdge {
                cid: c.cid.clone(),
                parent_cid: c.parent_cid.clone(),
            })
            .collect())
    }

    async fn fetch_comment_records(
        &self,
        sid: &str,
        ids: &HashSet<Cid>,
        viewer: Option<&str>,
    ) -> Result<Vec<CommentRecord>> {
        let state = self.lock().await;

        Ok(state
            .comments
            .iter()
            .filter(|c| ids.contains(&c.cid))
            .map(|c| {
                let author = state.users.get(&c.author_id);
                CommentRecord {
                    cid: c.cid.clone(),
                    pid: c.pid,
                    parent_cid: c.parent_cid.clone(),
                    author_id: c.author_id.clone(),
                    author_name: author.map(|u| u.name.clone()).unwrap_or_default(),
                    author_status: author.map(|u| u.status).unwrap_or_default(),
                    author_is_mod: state
                        .mods
                        .contains_key(&(c.author_id.clone(), sid.to_string())),
                    content: c.content.clone(),
                    score: c.score,
                    upvotes: c.upvotes,
                    downvotes: c.downvotes,
                    status: c.status,
                    distinguish: c.distinguish,
                    created_at: c.created_at,
                    last_edited_at: c.last_edited_at,
                    viewer_vote: viewer.and_then(|v| {
                        state
                            .comment_votes
                            .get(&(v.to_string(), c.cid.clone()))
                            .copied()
                    }),
                    blocked: viewer.and_then(|v| {
                        state
                            .blocks
                            .get(&(v.to_string(), c.author_id.clone()))
                            .copied()
                    }),
                }
            })
            .collect())
    }

    async fn fetch_comment_history(
        &self,
        ids: &HashSet<Cid>,
    ) -> Result<HashMap<Cid, Vec<HistorySnapshot>>> {
        let state = self.lock().await;
        Ok(state
            .history
            .iter()
            .filter(|(cid, _)| ids.contains(*cid))
            .map(|(cid, snapshots)| {
                let mut snapshots = snapshots.clone();
                snapshots.sort_by(|a, b| b.edited_at.cmp(&a.edited_at));
                (cid.clone(), snapshots)
            })
            .collect())
    }

    async fn fetch_comment(&self, cid: &str) -> Result<Option<StoredComment>> {
        Ok(self.lock().await.comment(cid).cloned())
    }

    async fn insert_comment(&self, comment: &StoredComment) -> Result<()> {
        let mut state = self.lock().await;
        let post = state
            .posts
            .get_mut(&comment.pid)
            .ok_or_else(|| Error::NotFound("Post not found".into()))?;
        post.comments_count += 1;
        state.push_comment(comment.clone());
        Ok(())
    }

    async fn update_comment_content(
        &self,
        cid: &str,
        content: &str,
        edited_at: NaiveDateTime,
    ) -> Result<()> {
        let mut state = self.lock().await;
        let comment = state
            .comment_mut(cid)
            .ok_or_else(|| Error::NotFound("Comment not found".into()))?;

        let previous = std::mem::replace(&mut comment.content, content.to_string());
        comment.last_edited_at = Some(edited_at);

        state
            .history
            .entry(cid.to_string())
            .or_default()
            .push(HistorySnapshot {
                content: previous,
                edited_at,
            });
        Ok(())
    }

    async fn set_comment_status(
        &self,
        cid: &str,
        status: CommentStatus,
        deleted_by: Option<ModeratorTier>,
        reason: Option<&str>,
    ) -> Result<()> {
        let mut state = self.lock().await;
        let comment = state
            .comment_mut(cid)
            .ok_or_else(|| Error::NotFound("Comment not found".into()))?;
        comment.status = status;
        comment.deleted_by = deleted_by;
        comment.delete_reason = reason.map(Into::into);
        Ok(())
    }

    async fn fetch_post(&self, pid: Pid) -> Result<Option<Post>> {
        Ok(self.lock().await.posts.get(&pid).cloned())
    }

    async fn fetch_sub_posts(&self, sid: &str) -> Result<Vec<Post>> {
        Ok(self
            .lock()
            .await
            .posts
            .values()
            .filter(|p| p.sid == sid && !p.deleted)
            .cloned()
            .collect())
    }

    async fn fetch_post_metadata(&self, pid: Pid, key: &str) -> Result<Option<String>> {
        Ok(self
            .lock()
            .await
            .post_metadata
            .get(&(pid, key.to_string()))
            .cloned())
    }

    async fn fetch_user(&self, uid: &str) -> Result<Option<UserRecord>> {
        Ok(self.lock().await.users.get(uid).cloned())
    }

    async fn is_banned(&self, uid: &str, sid: &str) -> Result<bool> {
        Ok(self
            .lock()
            .await
            .bans
            .contains(&(uid.to_string(), sid.to_string())))
    }

    async fn mod_power(&self, uid: &str, sid: &str) -> Result<Option<u8>> {
        Ok(self
            .lock()
            .await
            .mods
            .get(&(uid.to_string(), sid.to_string()))
            .copied())
    }

    async fn load_vote_target(&self, target: &VoteTarget) -> Result<Option<VoteTargetInfo>> {
        let state = self.lock().await;
        let info = match target {
            VoteTarget::Post(pid) => state.posts.get(pid).map(|p| VoteTargetInfo {
                target: target.clone(),
                sid: p.sid.clone(),
                author_id: p.author_id.clone(),
                deleted: p.deleted,
                posted_at: p.posted_at,
            }),
            VoteTarget::Comment(cid) => state.comment(cid).and_then(|c| {
                state.posts.get(&c.pid).map(|p| VoteTargetInfo {
                    target: target.clone(),
                    sid: p.sid.clone(),
                    author_id: c.author_id.clone(),
                    deleted: c.status != CommentStatus::Visible,
                    posted_at: p.posted_at,
                })
            }),
        };
        Ok(info)
    }

    async fn get_vote(&self, voter: &str, target: &VoteTarget) -> Result<Option<VoteDirection>> {
        let state = self.lock().await;
        Ok(match target {
            VoteTarget::Post(pid) => state.post_votes.get(&(voter.to_string(), *pid)).copied(),
            VoteTarget::Comment(cid) => state
                .comment_votes
                .get(&(voter.to_string(), cid.clone()))
                .copied(),
        })
    }

    async fn commit_vote(
        &self,
        voter: &str,
        target: &VoteTarget,
        author_id: &str,
        requested: VoteDirection,
    ) -> Result<VoteOutcome> {
        let mut state = self.lock().await;

        let (previous, transition, score, upvotes, downvotes) = match target {
            VoteTarget::Post(pid) => {
                if !state.posts.contains_key(pid) {
                    return Err(Error::NotFound("Post not found".into()));
                }
                let key = (voter.to_string(), *pid);
                let previous = state.post_votes.get(&key).copied();
                let transition = VoteTransition::resolve(previous, requested);
                match transition.resulting() {
                    Some(d) => state.post_votes.insert(key, d),
                    None => state.post_votes.remove(&key),
                };

                let post = state
                    .posts
                    .get_mut(pid)
                    .ok_or_else(|| Error::NotFound("Post not found".into()))?;
                post.score += transition.score_delta();
                post.upvotes += transition.upvote_delta();
                post.downvotes += transition.downvote_delta();
                (previous, transition, post.score, post.upvotes, post.downvotes)
            }
            VoteTarget::Comment(cid) => {
                if state.comment(cid).is_none() {
                    return Err(Error::NotFound("Comment not found".into()));
                }
                let key = (voter.to_string(), cid.clone());
                let previous = state.comment_votes.get(&key).copied();
                let transition = VoteTransition::resolve(previous, requested);
                match transition.resulting() {
                    Some(d) => state.comment_votes.insert(key, d),
                    None => state.comment_votes.remove(&key),
                };

                let comment = state
                    .comment_mut(cid)
                    .ok_or_else(|| Error::NotFound("Comment not found".into()))?;
                comment.score += transition.score_delta();
                comment.upvotes += transition.upvote_delta();
                comment.downvotes += transition.downvote_delta();
                (
                    previous,
                    transition,
                    comment.score,
                    comment.upvotes,
                    comment.downvotes,
                )
            }
        };

        let delta = transition.score_delta();
        state.bump_user(voter, delta, 0);
        let author_score = state.bump_user(author_id, 0, delta);

        Ok(VoteOutcome {
            target: target.clone(),
            previous,
            current: transition.resulting(),
            score,
            upvotes,
            downvotes,
            author_score,
        })
    }

    async fn vote_tallies(&self) -> Result<Vec<ScoreTally>> {
        let state = self.lock().await;

        let mut tallies: Vec<ScoreTally> = state
            .posts
            .values()
            .map(|p| {
                let votes = state.post_votes.iter().filter(|((_, pid), _)| *pid == p.pid);
                let (up, down) = count_directions(votes.map(|(_, d)| *d));
                ScoreTally {
                    target: VoteTarget::Post(p.pid),
                    score: p.score,
                    upvotes: p.upvotes,
                    downvotes: p.downvotes,
                    counted_up: up,
                    counted_down: down,
                }
            })
            .collect();

        tallies.extend(state.comments.iter().map(|c| {
            let votes = state
                .comment_votes
                .iter()
                .filter(|((_, cid), _)| *cid == c.cid);
            let (up, down) = count_directions(votes.map(|(_, d)| *d));
            ScoreTally {
                target: VoteTarget::Comment(c.cid.clone()),
                score: c.score,
                upvotes: c.upvotes,
                downvotes: c.downvotes,
                counted_up: up,
                counted_down: down,
            }
        }));

        Ok(tallies)
    }

    async fn apply_score_repair(&self, target: &VoteTarget) -> Result<(i32, i32, i32)> {
        let mut state = self.lock().await;
        match target {
            VoteTarget::Post(pid) => {
                let (up, down) = count_directions(
                    state
                        .post_votes
                        .iter()
                        .filter(|((_, voted), _)| voted == pid)
                        .map(|(_, d)| *d),
                );
                let post = state
                    .posts
                    .get_mut(pid)
                    .ok_or_else(|| Error::NotFound("Post not found".into()))?;
                post.upvotes = up;
                post.downvotes = down;
                post.score = up - down;
                Ok((post.score, up, down))
            }
            VoteTarget::Comment(cid) => {
                let (up, down) = count_directions(
                    state
                        .comment_votes
                        .iter()
                        .filter(|((_, voted), _)| voted == cid)
                        .map(|(_, d)| *d),
                );
                let comment = state
                    .comment_mut(cid)
                    .ok_or_else(|| Error::NotFound("Comment not found".into()))?;
                comment.upvotes = up;
                comment.downvotes = down;
                comment.score = up - down;
                Ok((comment.score, up, down))
            }
        }
    }
}

fn count_directions(votes: impl Iterator<Item = VoteDirection>) -> (i32, i32) {
    votes.fold((0, 0), |(up, down), d| match d {
        VoteDirection::Up => (up + 1, down),
        VoteDirection::Down => (up, down + 1),
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::comment::AccountStatus;
    use chrono::NaiveDate;

    fn at(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .insert_post(Post {
                pid: 1,
                sid: "rust".into(),
                author_id: "op".into(),
                title: "hello".into(),
                score: 0,
                upvotes: 0,
                downvotes: 0,
                deleted: false,
                posted_at: at(1),
                comments_count: 0,
            })
            .await;
        for uid in ["op", "alice", "bob"] {
            store
                .insert_user(UserRecord {
                    uid: uid.into(),
                    name: uid.into(),
                    status: AccountStatus::Active,
                    score: 0,
                    given: 0,
                    is_admin: false,
                })
                .await;
        }
        let mut low = StoredComment::new("low", 1, None, "alice", "first", at(2));
        low.score = -1;
        let mut high = StoredComment::new("high", 1, None, "bob", "second", at(3));
        high.score = 5;
        store.seed_comment(low).await;
        store.seed_comment(high).await;
        store
            .seed_comment(StoredComment::new("reply", 1, Some("low"), "bob", "re", at(4)))
            .await;
        store
    }

    #[tokio::test]
    async fn test_edges_follow_sort() {
        let store = seeded().await;

        let best = store.fetch_comment_edges(1, CommentSort::Best).await.unwrap();
        let cids: Vec<&str> = best.iter().map(|e| e.cid.as_str()).collect();
        assert_eq!(cids, vec!["high", "reply", "low"]);

        let new = store.fetch_comment_edges(1, CommentSort::New).await.unwrap();
        let cids: Vec<&str> = new.iter().map(|e| e.cid.as_str()).collect();
        assert_eq!(cids, vec!["reply", "high", "low"]);
    }

    #[tokio::test]
    async fn test_records_carry_viewer_flags() {
        let store = seeded().await;
        store.set_moderator("bob", "rust", 1).await;
        store.block("alice", "bob", BlockMethod::Blur).await;
        store
            .commit_vote("alice", &VoteTarget::Comment("high".into()), "bob", VoteDirection::Up)
            .await
            .unwrap();

        let ids: HashSet<Cid> = ["high".to_string()].into_iter().collect();
        let records = store
            .fetch_comment_records("rust", &ids, Some("alice"))
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert!(records[0].author_is_mod);
        assert_eq!(records[0].blocked, Some(BlockMethod::Blur));
        assert_eq!(records[0].viewer_vote, Some(VoteDirection::Up));
        assert_eq!(records[0].author_name, "bob");
    }

    #[tokio::test]
    async fn test_commit_vote_updates_all_counters() {
        let store = seeded().await;
        let target = VoteTarget::Comment("low".into());

        let outcome = store
            .commit_vote("bob", &target, "alice", VoteDirection::Down)
            .await
            .unwrap();
        assert_eq!(outcome.score, -2);
        assert_eq!(outcome.downvotes, 1);
        assert_eq!(outcome.author_score, -1);
        assert_eq!(store.user("bob").await.unwrap().given, -1);

        let outcome = store
            .commit_vote("bob", &target, "alice", VoteDirection::Up)
            .await
            .unwrap();
        assert_eq!(outcome.previous, Some(VoteDirection::Down));
        assert_eq!(outcome.current, Some(VoteDirection::Up));
        assert_eq!(outcome.score, 0);
        assert_eq!((outcome.upvotes, outcome.downvotes), (1, 0));
        assert_eq!(store.user("bob").await.unwrap().given, 1);
        assert_eq!(store.vote_count(&target).await, 1);
    }

    #[tokio::test]
    async fn test_insert_comment_bumps_count_and_edit_keeps_history() {
        let store = seeded().await;
        store
            .insert_comment(&StoredComment::new("new", 1, None, "alice", "v1", at(5)))
            .await
            .unwrap();
        assert_eq!(store.post(1).await.unwrap().comments_count, 1);

        store.update_comment_content("new", "v2", at(6)).await.unwrap();
        store.update_comment_content("new", "v3", at(7)).await.unwrap();

        let ids: HashSet<Cid> = ["new".to_string()].into_iter().collect();
        let history = store.fetch_comment_history(&ids).await.unwrap();
        let contents: Vec<&str> = history["new"].iter().map(|h| h.content.as_str()).collect();
        assert_eq!(contents, vec!["v2", "v1"]);
        assert_eq!(store.comment("new").await.unwrap().content, "v3");
    }
}
