use std::{
    collections::{HashMap, HashSet},
    hash::Hash,
};

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use diesel::{dsl::count_star, prelude::*};
use diesel_async::{
    AsyncConnection, AsyncPgConnection, RunQueryDsl,
    pooled_connection::{AsyncDieselConnectionManager, deadpool::Pool},
};

use crate::{
    comment::{
        AccountStatus, BlockMethod, Cid, CommentEdge, CommentRecord, CommentSort, CommentStatus,
        Distinguish, ModeratorTier, Pid,
    },
    error::{Error, Result},
    models::{
        comment::{Comment, NewComment, UpdateCommentStatus},
        history::{CommentHistory, NewCommentHistory},
        post::Post as PostRow,
        user::User,
        vote::{NewCommentVote, NewPostVote},
    },
    ranking::vote::{VoteDirection, VoteTarget, VoteTransition},
    schema::{
        comment_history, comment_votes, comments, post_metadata, post_votes, posts, sub_bans,
        sub_mods, user_content_blocks, users,
    },
};

use super::{
    HistorySnapshot, Post, ScoreTally, Store, StoredComment, UserRecord, VoteOutcome,
    VoteTargetInfo,
};

pub type PgPool = Pool<AsyncPgConnection>;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn connect(database_url: &str, max_size: usize) -> Result<Self> {
        let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
        let pool = Pool::builder(manager)
            .max_size(max_size)
            .build()
            .map_err(|e| Error::Unavailable(format!("Failed to build connection pool: {e}")))?;
        Ok(Self::new(pool))
    }
}

/// Adds `delta` to the voter's given tally and the author's score, returning
/// the author's new score.
async fn bump_users(
    conn: &mut AsyncPgConnection,
    voter: &str,
    author_id: &str,
    delta: i32,
) -> Result<i32> {
    diesel::update(users::table.find(voter))
        .set(users::given.eq(users::given + delta))
        .execute(conn)
        .await?;

    let author_score = diesel::update(users::table.find(author_id))
        .set(users::score.eq(users::score + delta))
        .returning(users::score)
        .get_result::<i32>(conn)
        .await
        .optional()?;

    Ok(author_score.unwrap_or(0))
}

/// Folds `(key, positive, count)` rows into `(up, down)` per key.
fn fold_counts<K: Eq + Hash>(rows: Vec<(K, bool, i64)>) -> HashMap<K, (i32, i32)> {
    let mut counts: HashMap<K, (i32, i32)> = HashMap::new();
    for (key, positive, count) in rows {
        let entry = counts.entry(key).or_default();
        let count = i32::try_from(count).unwrap_or(i32::MAX);
        if positive {
            entry.0 = count;
        } else {
            entry.1 = count;
        }
    }
    counts
}

/// `(upvotes, downvotes)` from one target's `(positive, count)` groups.
fn split_counts(rows: Vec<(bool, i64)>) -> (i32, i32) {
    fold_counts(rows.into_iter().map(|(positive, count)| ((), positive, count)).collect())
        .remove(&())
        .unwrap_or_default()
}

#[async_trait]
impl Store for PgStore {
    async fn fetch_comment_edges(&self, pid: Pid, sort: CommentSort) -> Result<Vec<CommentEdge>> {
        let mut conn = self.pool.get().await?;

        let query = comments::table
            .filter(comments::pid.eq(pid))
            .select((comments::cid, comments::parent_cid));

        let rows: Vec<(String, Option<String>)> = match sort {
            CommentSort::Best => {
                query
                    .order((comments::score.desc(), comments::created_at.asc()))
                    .load(&mut conn)
                    .await?
            }
            CommentSort::New => {
                query
                    .order(comments::created_at.desc())
                    .load(&mut conn)
                    .await?
            }
        };

        Ok(rows
            .into_iter()
            .map(|(cid, parent_cid)| CommentEdge { cid, parent_cid })
            .collect())
    }

    async fn fetch_comment_records(
        &self,
        sid: &str,
        ids: &HashSet<Cid>,
        viewer: Option<&str>,
    ) -> Result<Vec<CommentRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.pool.get().await?;

        let rows = comments::table
            .inner_join(users::table)
            .filter(comments::cid.eq_any(ids))
            .select((Comment::as_select(), User::as_select()))
            .load::<(Comment, User)>(&mut conn)
            .await?;

        let mut authors: Vec<&str> = rows.iter().map(|(c, _)| c.uid.as_str()).collect();
        authors.sort_unstable();
        authors.dedup();

        let mods: HashSet<String> = sub_mods::table
            .filter(sub_mods::sid.eq(sid))
            .filter(sub_mods::uid.eq_any(authors.iter().copied()))
            .select(sub_mods::uid)
            .load::<String>(&mut conn)
            .await?
            .into_iter()
            .collect();

        let (votes, blocks): (HashMap<String, bool>, HashMap<String, i16>) = match viewer {
            Some(viewer) => {
                let votes = comment_votes::table
                    .filter(comment_votes::uid.eq(viewer))
                    .filter(comment_votes::cid.eq_any(ids))
                    .select((comment_votes::cid, comment_votes::positive))
                    .load::<(String, bool)>(&mut conn)
                    .await?;
                let blocks = user_content_blocks::table
                    .filter(user_content_blocks::uid.eq(viewer))
                    .filter(user_content_blocks::target.eq_any(authors.iter().copied()))
                    .select((user_content_blocks::target, user_content_blocks::method))
                    .load::<(String, i16)>(&mut conn)
                    .await?;
                (votes.into_iter().collect(), blocks.into_iter().collect())
            }
            None => Default::default(),
        };

        Ok(rows
            .into_iter()
            .map(|(comment, author)| CommentRecord {
                author_is_mod: mods.contains(&comment.uid),
                viewer_vote: votes
                    .get(&comment.cid)
                    .map(|p| VoteDirection::from_positive(*p)),
                blocked: blocks.get(&comment.uid).map(|m| BlockMethod::from_code(*m)),
                author_name: author.name,
                author_status: AccountStatus::from_code(author.status),
                cid: comment.cid,
                pid: comment.pid,
                parent_cid: comment.parent_cid,
                author_id: comment.uid,
                content: comment.content,
                score: comment.score,
                upvotes: comment.upvotes,
                downvotes: comment.downvotes,
                status: CommentStatus::from_code(comment.status),
                distinguish: Distinguish::from_code(comment.distinguish),
                created_at: comment.created_at,
                last_edited_at: comment.last_edited_at,
            })
            .collect())
    }

    async fn fetch_comment_history(
        &self,
        ids: &HashSet<Cid>,
    ) -> Result<HashMap<Cid, Vec<HistorySnapshot>>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let mut conn = self.pool.get().await?;

        let rows = comment_history::table
            .filter(comment_history::cid.eq_any(ids))
            .order(comment_history::edited_at.desc())
            .select(CommentHistory::as_select())
            .load(&mut conn)
            .await?;

        let mut history: HashMap<Cid, Vec<HistorySnapshot>> = HashMap::new();
        for row in rows {
            history.entry(row.cid).or_default().push(HistorySnapshot {
                content: row.content,
                edited_at: row.edited_at,
            });
        }
        Ok(history)
    }

    async fn fetch_comment(&self, cid: &str) -> Result<Option<StoredComment>> {
        let mut conn = self.pool.get().await?;
        let row = comments::table
            .find(cid)
            .select(Comment::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(row.map(Into::into))
    }

    async fn insert_comment(&self, comment: &StoredComment) -> Result<()> {
        let mut conn = self.pool.get().await?;
        let new_comment = NewComment::from(comment);

        conn.transaction::<_, Error, _>(|conn| {
            Box::pin(async move {
                let bumped = diesel::update(posts::table.find(new_comment.pid))
                    .set(posts::comments_count.eq(posts::comments_count + 1))
                    .execute(conn)
                    .await?;
                if bumped == 0 {
                    return Err(Error::NotFound("Post not found".into()));
                }

                diesel::insert_into(comments::table)
                    .values(&new_comment)
                    .execute(conn)
                    .await?;
                Ok(())
            })
        })
        .await
    }

    async fn update_comment_content(
        &self,
        cid: &str,
        content: &str,
        edited_at: NaiveDateTime,
    ) -> Result<()> {
        let mut conn = self.pool.get().await?;

        conn.transaction::<_, Error, _>(|conn| {
            Box::pin(async move {
                let previous = comments::table
                    .find(cid)
                    .select(comments::content)
                    .for_update()
                    .first::<String>(conn)
                    .await
                    .optional()?
                    .ok_or_else(|| Error::NotFound("Comment not found".into()))?;

                diesel::insert_into(comment_history::table)
                    .values(&NewCommentHistory {
                        cid,
                        content: &previous,
                        edited_at,
                    })
                    .execute(conn)
                    .await?;

                diesel::update(comments::table.find(cid))
                    .set((
                        comments::content.eq(content),
                        comments::last_edited_at.eq(Some(edited_at)),
                    ))
                    .execute(conn)
                    .await?;
                Ok(())
            })
        })
        .await
    }

    async fn set_comment_status(
        &self,
        cid: &str,
        status: CommentStatus,
        deleted_by: Option<ModeratorTier>,
        reason: Option<&str>,
    ) -> Result<()> {
        let mut conn = self.pool.get().await?;
        let updated = diesel::update(comments::table.find(cid))
            .set(&UpdateCommentStatus {
                status: status.code(),
                deleted_by: deleted_by.map(ModeratorTier::code),
                delete_reason: reason,
            })
            .execute(&mut conn)
            .await?;

        if updated == 0 {
            return Err(Error::NotFound("Comment not found".into()));
        }
        Ok(())
    }

    async fn fetch_post(&self, pid: Pid) -> Result<Option<Post>> {
        let mut conn = self.pool.get().await?;
        let row = posts::table
            .find(pid)
            .select(PostRow::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(row.map(Into::into))
    }

    async fn fetch_sub_posts(&self, sid: &str) -> Result<Vec<Post>> {
        let mut conn = self.pool.get().await?;
        let rows = posts::table
            .filter(posts::sid.eq(sid))
            .filter(posts::deleted.eq(false))
            .select(PostRow::as_select())
            .load(&mut conn)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn fetch_post_metadata(&self, pid: Pid, key: &str) -> Result<Option<String>> {
        let mut conn = self.pool.get().await?;
        Ok(post_metadata::table
            .filter(post_metadata::pid.eq(pid))
            .filter(post_metadata::key.eq(key))
            .select(post_metadata::value)
            .first::<String>(&mut conn)
            .await
            .optional()?)
    }

    async fn fetch_user(&self, uid: &str) -> Result<Option<UserRecord>> {
        let mut conn = self.pool.get().await?;
        let row = users::table
            .find(uid)
            .select(User::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(row.map(Into::into))
    }

    async fn is_banned(&self, uid: &str, sid: &str) -> Result<bool> {
        let mut conn = self.pool.get().await?;
        let now = Utc::now().naive_utc();

        let bans = sub_bans::table
            .filter(sub_bans::uid.eq(uid))
            .filter(sub_bans::sid.eq(sid))
            .filter(sub_bans::active.eq(true))
            .filter(sub_bans::expires.is_null().or(sub_bans::expires.gt(now)))
            .select(count_star())
            .get_result::<i64>(&mut conn)
            .await?;
        Ok(bans > 0)
    }

    async fn mod_power(&self, uid: &str, sid: &str) -> Result<Option<u8>> {
        let mut conn = self.pool.get().await?;
        let level = sub_mods::table
            .filter(sub_mods::uid.eq(uid))
            .filter(sub_mods::sid.eq(sid))
            .select(sub_mods::power_level)
            .first::<i16>(&mut conn)
            .await
            .optional()?;
        Ok(level.map(|l| u8::try_from(l).unwrap_or(u8::MAX)))
    }

    async fn load_vote_target(&self, target: &VoteTarget) -> Result<Option<VoteTargetInfo>> {
        let mut conn = self.pool.get().await?;

        let info = match target {
            VoteTarget::Post(pid) => posts::table
                .find(pid)
                .select((posts::sid, posts::uid, posts::deleted, posts::posted_at))
                .first::<(String, String, bool, NaiveDateTime)>(&mut conn)
                .await
                .optional()?
                .map(|(sid, author_id, deleted, posted_at)| VoteTargetInfo {
                    target: target.clone(),
                    sid,
                    author_id,
                    deleted,
                    posted_at,
                }),
            VoteTarget::Comment(cid) => comments::table
                .inner_join(posts::table)
                .filter(comments::cid.eq(cid))
                .select((posts::sid, comments::uid, comments::status, posts::posted_at))
                .first::<(String, String, i16, NaiveDateTime)>(&mut conn)
                .await
                .optional()?
                .map(|(sid, author_id, status, posted_at)| VoteTargetInfo {
                    target: target.clone(),
                    sid,
                    author_id,
                    deleted: CommentStatus::from_code(status) != CommentStatus::Visible,
                    posted_at,
                }),
        };
        Ok(info)
    }

    async fn get_vote(&self, voter: &str, target: &VoteTarget) -> Result<Option<VoteDirection>> {
        let mut conn = self.pool.get().await?;

        let positive = match target {
            VoteTarget::Post(pid) => {
                post_votes::table
                    .filter(post_votes::uid.eq(voter))
                    .filter(post_votes::pid.eq(pid))
                    .select(post_votes::positive)
                    .first::<bool>(&mut conn)
                    .await
                    .optional()?
            }
            VoteTarget::Comment(cid) => {
                comment_votes::table
                    .filter(comment_votes::uid.eq(voter))
                    .filter(comment_votes::cid.eq(cid))
                    .select(comment_votes::positive)
                    .first::<bool>(&mut conn)
                    .await
                    .optional()?
            }
        };
        Ok(positive.map(VoteDirection::from_positive))
    }

    async fn commit_vote(
        &self,
        voter: &str,
        target: &VoteTarget,
        author_id: &str,
        requested: VoteDirection,
    ) -> Result<VoteOutcome> {
        let mut conn = self.pool.get().await?;
        let now = Utc::now().naive_utc();

        conn.transaction::<_, Error, _>(|conn| {
            Box::pin(async move {
                let (previous, transition, (score, upvotes, downvotes)) = match target {
                    VoteTarget::Post(pid) => {
                        let pid = *pid;
                        posts::table
                            .find(pid)
                            .select(posts::pid)
                            .for_update()
                            .first::<i32>(conn)
                            .await
                            .optional()?
                            .ok_or_else(|| Error::NotFound("Post not found".into()))?;

                        let vote = post_votes::table
                            .filter(post_votes::uid.eq(voter))
                            .filter(post_votes::pid.eq(pid));
                        let previous = vote
                            .clone()
                            .select(post_votes::positive)
                            .first::<bool>(conn)
                            .await
                            .optional()?
                            .map(VoteDirection::from_positive);

                        let transition = VoteTransition::resolve(previous, requested);
                        match transition {
                            VoteTransition::Cast(d) => {
                                diesel::insert_into(post_votes::table)
                                    .values(&NewPostVote {
                                        uid: voter,
                                        pid,
                                        positive: d.is_positive(),
                                        created_at: now,
                                    })
                                    .execute(conn)
                                    .await?;
                            }
                            VoteTransition::Retract(_) => {
                                diesel::delete(vote).execute(conn).await?;
                            }
                            VoteTransition::Flip { to, .. } => {
                                diesel::update(vote)
                                    .set(post_votes::positive.eq(to.is_positive()))
                                    .execute(conn)
                                    .await?;
                            }
                        }

                        let counters = diesel::update(posts::table.find(pid))
                            .set((
                                posts::score.eq(posts::score + transition.score_delta()),
                                posts::upvotes.eq(posts::upvotes + transition.upvote_delta()),
                                posts::downvotes
                                    .eq(posts::downvotes + transition.downvote_delta()),
                            ))
                            .returning((posts::score, posts::upvotes, posts::downvotes))
                            .get_result::<(i32, i32, i32)>(conn)
                            .await?;
                        (previous, transition, counters)
                    }
                    VoteTarget::Comment(cid) => {
                        comments::table
                            .find(cid)
                            .select(comments::cid)
                            .for_update()
                            .first::<String>(conn)
                            .await
                            .optional()?
                            .ok_or_else(|| Error::NotFound("Comment not found".into()))?;

                        let vote = comment_votes::table
                            .filter(comment_votes::uid.eq(voter))
                            .filter(comment_votes::cid.eq(cid));
                        let previous = vote
                            .clone()
                            .select(comment_votes::positive)
                            .first::<bool>(conn)
                            .await
                            .optional()?
                            .map(VoteDirection::from_positive);

                        let transition = VoteTransition::resolve(previous, requested);
                        match transition {
                            VoteTransition::Cast(d) => {
                                diesel::insert_into(comment_votes::table)
                                    .values(&NewCommentVote {
                                        uid: voter,
                                        cid,
                                        positive: d.is_positive(),
                                        created_at: now,
                                    })
                                    .execute(conn)
                                    .await?;
                            }
                            VoteTransition::Retract(_) => {
                                diesel::delete(vote).execute(conn).await?;
                            }
                            VoteTransition::Flip { to, .. } => {
                                diesel::update(vote)
                                    .set(comment_votes::positive.eq(to.is_positive()))
                                    .execute(conn)
                                    .await?;
                            }
                        }

                        let counters = diesel::update(comments::table.find(cid))
                            .set((
                                comments::score.eq(comments::score + transition.score_delta()),
                                comments::upvotes
                                    .eq(comments::upvotes + transition.upvote_delta()),
                                comments::downvotes
                                    .eq(comments::downvotes + transition.downvote_delta()),
                            ))
                            .returning((comments::score, comments::upvotes, comments::downvotes))
                            .get_result::<(i32, i32, i32)>(conn)
                            .await?;
                        (previous, transition, counters)
                    }
                };

                let author_score =
                    bump_users(conn, voter, author_id, transition.score_delta()).await?;

                Ok(VoteOutcome {
                    target: target.clone(),
                    previous,
                    current: transition.resulting(),
                    score,
                    upvotes,
                    downvotes,
                    author_score,
                })
            })
        })
        .await
    }

    async fn vote_tallies(&self) -> Result<Vec<ScoreTally>> {
        let mut conn = self.pool.get().await?;

        let post_counts = fold_counts(
            post_votes::table
                .group_by((post_votes::pid, post_votes::positive))
                .select((post_votes::pid, post_votes::positive, count_star()))
                .load::<(i32, bool, i64)>(&mut conn)
                .await?,
        );
        let comment_counts = fold_counts(
            comment_votes::table
                .group_by((comment_votes::cid, comment_votes::positive))
                .select((comment_votes::cid, comment_votes::positive, count_star()))
                .load::<(String, bool, i64)>(&mut conn)
                .await?,
        );

        let post_rows = posts::table
            .select((posts::pid, posts::score, posts::upvotes, posts::downvotes))
            .load::<(i32, i32, i32, i32)>(&mut conn)
            .await?;
        let comment_rows = comments::table
            .select((
                comments::cid,
                comments::score,
                comments::upvotes,
                comments::downvotes,
            ))
            .load::<(String, i32, i32, i32)>(&mut conn)
            .await?;

        let mut tallies = Vec::with_capacity(post_rows.len() + comment_rows.len());
        for (pid, score, upvotes, downvotes) in post_rows {
            let (counted_up, counted_down) = post_counts.get(&pid).copied().unwrap_or_default();
            tallies.push(ScoreTally {
                target: VoteTarget::Post(pid),
                score,
                upvotes,
                downvotes,
                counted_up,
                counted_down,
            });
        }
        for (cid, score, upvotes, downvotes) in comment_rows {
            let (counted_up, counted_down) =
                comment_counts.get(&cid).copied().unwrap_or_default();
            tallies.push(ScoreTally {
                target: VoteTarget::Comment(cid),
                score,
                upvotes,
                downvotes,
                counted_up,
                counted_down,
            });
        }
        Ok(tallies)
    }

    async fn apply_score_repair(&self, target: &VoteTarget) -> Result<(i32, i32, i32)> {
        let mut conn = self.pool.get().await?;

        conn.transaction::<_, Error, _>(|conn| {
            Box::pin(async move {
                match target {
                    VoteTarget::Post(pid) => {
                        let pid = *pid;
                        posts::table
                            .find(pid)
                            .select(posts::pid)
                            .for_update()
                            .first::<i32>(conn)
                            .await
                            .optional()?
                            .ok_or_else(|| Error::NotFound("Post not found".into()))?;

                        let (up, down) = split_counts(
                            post_votes::table
                                .filter(post_votes::pid.eq(pid))
                                .group_by(post_votes::positive)
                                .select((post_votes::positive, count_star()))
                                .load::<(bool, i64)>(conn)
                                .await?,
                        );

                        diesel::update(posts::table.find(pid))
                            .set((
                                posts::upvotes.eq(up),
                                posts::downvotes.eq(down),
                                posts::score.eq(up - down),
                            ))
                            .execute(conn)
                            .await?;
                        Ok((up - down, up, down))
                    }
                    VoteTarget::Comment(cid) => {
                        let cid = cid.as_str();
                        comments::table
                            .find(cid)
                            .select(comments::cid)
                            .for_update()
                            .first::<String>(conn)
                            .await
                            .optional()?
                            .ok_or_else(|| Error::NotFound("Comment not found".into()))?;

                        let (up, down) = split_counts(
                            comment_votes::table
                                .filter(comment_votes::cid.eq(cid))
                                .group_by(comment_votes::positive)
                                .select((comment_votes::positive, count_star()))
                                .load::<(bool, i64)>(conn)
                                .await?,
                        );

                        diesel::update(comments::table.find(cid))
                            .set((
                                comments::upvotes.eq(up),
                                comments::downvotes.eq(down),
                                comments::score.eq(up - down),
                            ))
                            .execute(conn)
                            .await?;
                        Ok((up - down, up, down))
                    }
                }
            })
        })
        .await
    }
}
